//! Water body detection and classification
//!
//! Identifies below-sea-level cells of the carved heightmap and classifies
//! them as ocean (connected to the grid border) or inland lakes via
//! flood-fill. The road cost model and bridge planner use this to tell a
//! lake crossing from dry land when terrain height alone is ambiguous.

use serde::Serialize;
use std::collections::VecDeque;

use crate::heightmap::{Heightmap, TerrainSampler};

/// Type of water body
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
pub enum WaterBodyType {
    #[default]
    None, // Land cell
    Ocean, // Connected to the grid border
    Lake,  // Isolated inland water body
}

/// Water body identifier (0 = land/none, 1 = ocean, 2+ = lake ID)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct WaterBodyId(pub u16);

impl WaterBodyId {
    pub const NONE: WaterBodyId = WaterBodyId(0);
    pub const OCEAN: WaterBodyId = WaterBodyId(1);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }

    pub fn is_ocean(&self) -> bool {
        self.0 == 1
    }

    pub fn is_lake(&self) -> bool {
        self.0 > 1
    }
}

/// Information about a water body
#[derive(Clone, Debug, Serialize)]
pub struct WaterBody {
    pub id: WaterBodyId,
    pub body_type: WaterBodyType,
    pub cell_count: usize,
    pub min_elevation: f32,
    pub max_elevation: f32,
    /// Bounding box in grid coordinates (min_x, min_z, max_x, max_z)
    pub bounds: (usize, usize, usize, usize),
}

impl WaterBody {
    fn new(id: WaterBodyId, body_type: WaterBodyType) -> Self {
        Self {
            id,
            body_type,
            cell_count: 0,
            min_elevation: f32::MAX,
            max_elevation: f32::MIN,
            bounds: (usize::MAX, usize::MAX, 0, 0),
        }
    }

    fn add_cell(&mut self, ix: usize, iz: usize, elevation: f32) {
        self.cell_count += 1;
        self.min_elevation = self.min_elevation.min(elevation);
        self.max_elevation = self.max_elevation.max(elevation);
        self.bounds.0 = self.bounds.0.min(ix);
        self.bounds.1 = self.bounds.1.min(iz);
        self.bounds.2 = self.bounds.2.max(ix);
        self.bounds.3 = self.bounds.3.max(iz);
    }
}

/// Per-cell water body assignment over the heightmap grid.
#[derive(Clone)]
pub struct WaterMap {
    res: usize,
    step: f32,
    half: f32,
    ids: Vec<WaterBodyId>,
}

impl WaterMap {
    /// Water body ID at a grid sample.
    pub fn id_at_grid(&self, ix: usize, iz: usize) -> WaterBodyId {
        let ix = ix.min(self.res);
        let iz = iz.min(self.res);
        self.ids[iz * (self.res + 1) + ix]
    }

    /// Whether the nearest grid sample to a world position is a lake cell.
    pub fn is_lake_at(&self, x: f32, z: f32) -> bool {
        let max = self.res as f32;
        let ix = ((x + self.half) / self.step).round().clamp(0.0, max) as usize;
        let iz = ((z + self.half) / self.step).round().clamp(0.0, max) as usize;
        self.id_at_grid(ix, iz).is_lake()
    }
}

/// Detect and classify all water bodies on the (carved) heightmap.
///
/// Algorithm:
/// 1. Mark all cells below sea level as water
/// 2. Flood-fill from border water cells to identify the ocean
/// 3. Connected-component analysis on remaining water identifies lakes
pub fn detect_water_bodies(hm: &Heightmap) -> (WaterMap, Vec<WaterBody>) {
    let res = hm.res;
    let per_axis = res + 1;
    let idx = |ix: usize, iz: usize| iz * per_axis + ix;

    let mut is_water = vec![false; per_axis * per_axis];
    for iz in 0..per_axis {
        for ix in 0..per_axis {
            is_water[idx(ix, iz)] = hm.grid_height(ix, iz) < hm.sea_level;
        }
    }

    let mut ids = vec![WaterBodyId::NONE; per_axis * per_axis];
    let mut bodies = Vec::new();

    // Ocean: flood-fill from every water cell on the border
    let mut ocean = WaterBody::new(WaterBodyId::OCEAN, WaterBodyType::Ocean);
    let mut queue = VecDeque::new();
    for i in 0..per_axis {
        for &(ix, iz) in &[(i, 0), (i, res), (0, i), (res, i)] {
            if is_water[idx(ix, iz)] && ids[idx(ix, iz)].is_none() {
                ids[idx(ix, iz)] = WaterBodyId::OCEAN;
                ocean.add_cell(ix, iz, hm.grid_height(ix, iz));
                queue.push_back((ix, iz));
            }
        }
    }
    flood_fill(hm, &is_water, &mut ids, &mut ocean, &mut queue);
    if ocean.cell_count > 0 {
        bodies.push(ocean);
    }

    // Lakes: remaining unassigned water cells, one component per lake
    let mut next_lake = 2u16;
    for iz in 0..per_axis {
        for ix in 0..per_axis {
            if !is_water[idx(ix, iz)] || !ids[idx(ix, iz)].is_none() {
                continue;
            }
            let lake_id = WaterBodyId(next_lake);
            next_lake += 1;

            let mut lake = WaterBody::new(lake_id, WaterBodyType::Lake);
            ids[idx(ix, iz)] = lake_id;
            lake.add_cell(ix, iz, hm.grid_height(ix, iz));
            let mut queue = VecDeque::from([(ix, iz)]);
            flood_fill(hm, &is_water, &mut ids, &mut lake, &mut queue);
            bodies.push(lake);
        }
    }

    (
        WaterMap {
            res,
            step: hm.step,
            half: hm.half,
            ids,
        },
        bodies,
    )
}

/// Expand a water body over 4-connected water cells, assigning its ID.
fn flood_fill(
    hm: &Heightmap,
    is_water: &[bool],
    ids: &mut [WaterBodyId],
    body: &mut WaterBody,
    queue: &mut VecDeque<(usize, usize)>,
) {
    let res = hm.res as i32;
    let per_axis = hm.res + 1;

    while let Some((ix, iz)) = queue.pop_front() {
        for (dx, dz) in [(-1i32, 0i32), (1, 0), (0, -1), (0, 1)] {
            let nx = ix as i32 + dx;
            let nz = iz as i32 + dz;
            if nx < 0 || nz < 0 || nx > res || nz > res {
                continue;
            }
            let (nx, nz) = (nx as usize, nz as usize);
            let i = nz * per_axis + nx;
            if is_water[i] && ids[i].is_none() {
                ids[i] = body.id;
                body.add_cell(nx, nz, hm.grid_height(nx, nz));
                queue.push_back((nx, nz));
            }
        }
    }
}

/// Number of lakes in a detection result.
pub fn count_lakes(bodies: &[WaterBody]) -> usize {
    bodies
        .iter()
        .filter(|b| b.body_type == WaterBodyType::Lake)
        .count()
}

/// A finalized terrain surface: carved heights plus water classification.
///
/// This is what road planning and bridge placement consume; it answers the
/// lake question a bare heightmap cannot.
pub struct SampledTerrain<'a> {
    pub heightmap: &'a Heightmap,
    pub water: &'a WaterMap,
}

impl TerrainSampler for SampledTerrain<'_> {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        self.heightmap.sample_height(x, z)
    }

    fn slope_at(&self, x: f32, z: f32) -> f32 {
        self.heightmap.sample_slope(x, z)
    }

    fn is_in_lake(&self, x: f32, z: f32) -> bool {
        self.water.is_lake_at(x, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submerged_map_is_all_ocean() {
        let hm = Heightmap::new_flat(100.0, 16, 0.0, -5.0);
        let (map, bodies) = detect_water_bodies(&hm);

        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].body_type, WaterBodyType::Ocean);
        assert_eq!(bodies[0].cell_count, 17 * 17);
        assert!(map.id_at_grid(8, 8).is_ocean());
        assert_eq!(count_lakes(&bodies), 0);
    }

    #[test]
    fn test_dry_map_has_no_water() {
        let hm = Heightmap::new_flat(100.0, 16, 0.0, 5.0);
        let (map, bodies) = detect_water_bodies(&hm);

        assert!(bodies.is_empty());
        assert!(map.id_at_grid(0, 0).is_none());
    }

    #[test]
    fn test_inland_depression_is_a_lake() {
        let mut hm = Heightmap::new_flat(160.0, 16, 0.0, 10.0);
        // A 3x3 pit below sea level, nowhere near the border.
        for iz in 6..=8 {
            for ix in 6..=8 {
                hm.set_grid_height(ix, iz, -4.0);
            }
        }
        let (map, bodies) = detect_water_bodies(&hm);

        assert_eq!(count_lakes(&bodies), 1);
        let lake = bodies
            .iter()
            .find(|b| b.body_type == WaterBodyType::Lake)
            .unwrap();
        assert_eq!(lake.cell_count, 9);
        assert_eq!(lake.bounds, (6, 6, 8, 8));
        assert!(map.id_at_grid(7, 7).is_lake());
        assert!(!map.id_at_grid(3, 3).is_lake());

        // World-space query lands on the nearest grid sample.
        assert!(map.is_lake_at(hm.world_x(7), hm.world_z(7)));
        assert!(!map.is_lake_at(hm.world_x(2), hm.world_z(2)));
    }

    #[test]
    fn test_border_water_joins_the_ocean() {
        let mut hm = Heightmap::new_flat(160.0, 16, 0.0, 10.0);
        // A channel running in from the border stays ocean, not lake.
        for ix in 0..=8 {
            hm.set_grid_height(ix, 8, -2.0);
        }
        let (map, bodies) = detect_water_bodies(&hm);

        assert_eq!(count_lakes(&bodies), 0);
        assert!(map.id_at_grid(8, 8).is_ocean());
    }

    #[test]
    fn test_sampled_terrain_answers_lake_queries() {
        let mut hm = Heightmap::new_flat(160.0, 16, 0.0, 10.0);
        for iz in 6..=8 {
            for ix in 6..=8 {
                hm.set_grid_height(ix, iz, -4.0);
            }
        }
        let (water, _) = detect_water_bodies(&hm);
        let terrain = SampledTerrain {
            heightmap: &hm,
            water: &water,
        };

        assert!(terrain.is_in_lake(hm.world_x(7), hm.world_z(7)));
        assert!(!terrain.is_in_lake(hm.world_x(1), hm.world_z(1)));
        assert_eq!(terrain.height_at(hm.world_x(1), hm.world_z(1)), 10.0);
    }
}
