//! Terrain region classification.
//!
//! Samples the heightmap on a coarse stride and buckets cells into
//! plains/hills/mountains/valleys by height band and local slope. Placement
//! logic downstream (settlements, waypoints) reads these buckets; nothing in
//! the pipeline mutates them.

use serde::Serialize;

use crate::heightmap::Heightmap;

/// Coarse terrain classification, one bucket per region kind.
///
/// Coordinates are heightmap grid coordinates at the sampled stride. The four
/// buckets partition the sampled set: every sample lands in exactly one.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RegionMap {
    pub plains: Vec<(usize, usize)>,
    pub hills: Vec<(usize, usize)>,
    pub mountains: Vec<(usize, usize)>,
    pub valleys: Vec<(usize, usize)>,
    /// Grid stride the classifier sampled at
    pub stride: usize,
}

impl RegionMap {
    /// Total number of classified samples.
    pub fn total(&self) -> usize {
        self.plains.len() + self.hills.len() + self.mountains.len() + self.valleys.len()
    }
}

/// Classify terrain regions on a coarse stride.
///
/// The stride scales with resolution (`max(8, res/24)`) so the sample budget
/// stays roughly constant regardless of grid size.
pub fn classify_regions(hm: &Heightmap) -> RegionMap {
    let stride = (hm.res / 24).max(8);
    let sea = hm.sea_level;
    let mut regions = RegionMap {
        stride,
        ..RegionMap::default()
    };

    let mut iz = 0;
    while iz <= hm.res {
        let mut ix = 0;
        while ix <= hm.res {
            let height = hm.grid_height(ix, iz);
            let slope = grid_slope(hm, ix, iz);

            if height < sea + 5.0 {
                if slope < 0.2 {
                    regions.plains.push((ix, iz));
                } else {
                    regions.valleys.push((ix, iz));
                }
            } else if height < sea + 40.0 {
                if slope < 0.3 {
                    regions.plains.push((ix, iz));
                } else if slope < 0.6 {
                    regions.hills.push((ix, iz));
                } else {
                    regions.mountains.push((ix, iz));
                }
            } else if slope < 0.4 {
                regions.hills.push((ix, iz));
            } else {
                regions.mountains.push((ix, iz));
            }

            ix += stride;
        }
        iz += stride;
    }

    regions
}

/// Slope at a grid sample from symmetric finite differences, falling back to
/// one-sided differences on the boundary.
fn grid_slope(hm: &Heightmap, ix: usize, iz: usize) -> f32 {
    let res = hm.res;

    let (x0, x1, x_span) = if ix == 0 {
        (0, 1, 1.0)
    } else if ix == res {
        (res - 1, res, 1.0)
    } else {
        (ix - 1, ix + 1, 2.0)
    };
    let (z0, z1, z_span) = if iz == 0 {
        (0, 1, 1.0)
    } else if iz == res {
        (res - 1, res, 1.0)
    } else {
        (iz - 1, iz + 1, 2.0)
    };

    let dx = (hm.grid_height(x1, iz) - hm.grid_height(x0, iz)) / (x_span * hm.step);
    let dz = (hm.grid_height(ix, z1) - hm.grid_height(ix, z0)) / (z_span * hm.step);

    (dx * dx + dz * dz).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_flat_low_terrain_is_plains() {
        let hm = Heightmap::new_flat(1000.0, 64, 0.0, 1.0);
        let regions = classify_regions(&hm);

        assert!(regions.total() > 0);
        assert_eq!(regions.total(), regions.plains.len(), "flat terrain is all plains");
    }

    #[test]
    fn test_steep_high_terrain_is_mountains() {
        let mut hm = Heightmap::new_flat(100.0, 32, 0.0, 0.0);
        // A 45-degree high-altitude ramp: height = 100 + x-position.
        for iz in 0..=32 {
            for ix in 0..=32 {
                hm.set_grid_height(ix, iz, 100.0 + ix as f32 * hm.step);
            }
        }
        let regions = classify_regions(&hm);

        assert!(regions.plains.is_empty());
        assert!(regions.valleys.is_empty());
        assert_eq!(regions.total(), regions.mountains.len());
    }

    #[test]
    fn test_buckets_partition_samples() {
        let params = crate::heightmap::TerrainParams {
            res: 128,
            ..crate::heightmap::TerrainParams::default()
        };
        let hm = crate::heightmap::generate_heightmap(&params, 31);
        let regions = classify_regions(&hm);

        let mut seen = HashSet::new();
        for bucket in [
            &regions.plains,
            &regions.hills,
            &regions.mountains,
            &regions.valleys,
        ] {
            for &coord in bucket {
                assert!(seen.insert(coord), "coordinate {coord:?} classified twice");
            }
        }

        // Every sample point lies within the grid and on the stride.
        for &(ix, iz) in &seen {
            assert!(ix <= hm.res && iz <= hm.res);
            assert_eq!(ix % regions.stride, 0);
            assert_eq!(iz % regions.stride, 0);
        }

        // The sampled lattice is fully covered.
        let per_axis = hm.res / regions.stride + 1;
        assert_eq!(seen.len(), per_axis * per_axis);
    }

    #[test]
    fn test_stride_floors_at_eight() {
        let hm = Heightmap::new_flat(100.0, 32, 0.0, 0.0);
        let regions = classify_regions(&hm);
        assert_eq!(regions.stride, 8);
    }
}
