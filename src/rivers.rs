//! River network generation with downhill tracing and channel carving.
//!
//! Rivers are traced cell-by-cell from randomly sampled highland sources down
//! to the sea, then carved into the heightmap as smooth tapering channels.
//! This is the only stage that mutates the heightmap; everything after it
//! treats terrain heights as read-only.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::HashSet;

use crate::geom::{lerp, smooth_step, Point2};
use crate::heightmap::Heightmap;

// =============================================================================
// RIVER PARAMETERS
// =============================================================================

/// Parameters for river generation
#[derive(Clone, Debug)]
pub struct RiverParams {
    /// Number of rivers to attempt; the generator may produce fewer
    pub river_count: usize,
    /// Minimum terrain height for an accepted river source
    pub min_source_height: f32,
    /// Sources closer than this to the world origin are rejected
    /// (keeps rivers off the runway strip)
    pub runway_exclusion_radius: f32,
    /// Radius of the central plateau inside which the local-minimum escape
    /// step is attempted
    pub plateau_escape_radius: f32,
    /// How far uphill (in height units) an escape step may go and still be
    /// accepted
    pub escape_epsilon: f32,
    /// Minimum accepted path length as a fraction of grid resolution
    pub min_path_cells_factor: f32,
}

impl Default for RiverParams {
    fn default() -> Self {
        Self {
            river_count: 4,
            min_source_height: 55.0,
            runway_exclusion_radius: 1600.0,
            plateau_escape_radius: 2000.0,
            escape_epsilon: 0.5,
            min_path_cells_factor: 0.01,
        }
    }
}

// Channel taper: width and depth grow from source to mouth
const WIDTH_SOURCE: f32 = 8.0;
const WIDTH_MOUTH: f32 = 26.0;
const DEPTH_SOURCE: f32 = 4.0;
const DEPTH_MOUTH: f32 = 14.0;
const TAPER_POWER: f32 = 0.88;

// Carving: falloff radius relative to channel width, blend strength, and the
// lowest allowed channel floor relative to sea level
const CARVE_RADIUS_SCALE: f32 = 1.15;
const CARVE_BLEND: f32 = 0.65;
const CARVE_FLOOR_OFFSET: f32 = 0.75;

// Every 3rd traced cell becomes a polyline point
const DECIMATION: usize = 3;

// Tracing stops once the channel is effectively at sea level
const SEA_REACHED_MARGIN: f32 = 0.5;

// Source sampling stays inside the central band of the grid
const SOURCE_BAND_LO: f32 = 0.15;
const SOURCE_BAND_HI: f32 = 0.85;

// Attempts per requested river before giving up
const ATTEMPTS_PER_RIVER: usize = 50;

/// A river polyline from source to mouth.
///
/// Points are world XZ positions; heights are left at zero and re-sampled by
/// consumers after carving. Width tapers linearly from `width0` at the source
/// to `width1` at the mouth.
#[derive(Clone, Debug, Serialize)]
pub struct River {
    pub points: Vec<Point2>,
    pub width0: f32,
    pub width1: f32,
}

// =============================================================================
// GENERATION
// =============================================================================

/// Generate rivers and carve their channels into the heightmap.
///
/// Deterministic for a fixed `(heightmap, params, seed)`. May return fewer
/// rivers than requested (including none) when source sampling or tracing
/// keeps failing; that is a valid degraded outcome, not an error.
pub fn generate_rivers(hm: &mut Heightmap, params: &RiverParams, seed: u64) -> Vec<River> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rivers = Vec::new();

    let res = hm.res;
    let band_lo = (res as f32 * SOURCE_BAND_LO) as usize;
    let band_hi = (res as f32 * SOURCE_BAND_HI) as usize;
    let min_cells = ((res as f32 * params.min_path_cells_factor) as usize).max(2);

    let max_attempts = params.river_count * ATTEMPTS_PER_RIVER;
    let mut attempts = 0;

    while rivers.len() < params.river_count && attempts < max_attempts {
        attempts += 1;

        let ix = rng.gen_range(band_lo..=band_hi);
        let iz = rng.gen_range(band_lo..=band_hi);

        let x = hm.world_x(ix);
        let z = hm.world_z(iz);
        if (x * x + z * z).sqrt() < params.runway_exclusion_radius {
            continue;
        }
        if hm.grid_height(ix, iz) < params.min_source_height {
            continue;
        }

        let Some(path) = trace_downhill(hm, ix, iz, params) else {
            continue;
        };
        if path.len() < min_cells {
            continue;
        }

        let points = decimate_path(hm, &path);
        carve_channel(hm, &path);

        rivers.push(River {
            points,
            width0: WIDTH_SOURCE,
            width1: WIDTH_MOUTH,
        });
    }

    rivers
}

/// Trace a downhill path from a source cell.
///
/// Steps to the lowest of the 8 neighbors until the sea is reached or a true
/// local minimum stops the trace. Inside the central plateau radius a stuck
/// trace may take one step directly away from the world center, accepted as
/// long as it is not uphill by more than the escape epsilon; this keeps
/// rivers from dying on the flattened runway plateau. Returns `None` if the
/// trace revisits a cell.
fn trace_downhill(
    hm: &Heightmap,
    source_ix: usize,
    source_iz: usize,
    params: &RiverParams,
) -> Option<Vec<(usize, usize)>> {
    let res = hm.res as i32;
    let mut path = vec![(source_ix, source_iz)];
    let mut visited: HashSet<(usize, usize)> = HashSet::new();
    visited.insert((source_ix, source_iz));

    let (mut cx, mut cz) = (source_ix as i32, source_iz as i32);

    loop {
        let h = hm.grid_height(cx as usize, cz as usize);
        if h <= hm.sea_level + SEA_REACHED_MARGIN {
            return Some(path);
        }

        // Lowest of the 8 neighbors; ties keep the current cell
        let mut best = (cx, cz);
        let mut best_h = h;
        for dz in -1i32..=1 {
            for dx in -1i32..=1 {
                if dx == 0 && dz == 0 {
                    continue;
                }
                let nx = cx + dx;
                let nz = cz + dz;
                if nx < 0 || nz < 0 || nx > res || nz > res {
                    continue;
                }
                let nh = hm.grid_height(nx as usize, nz as usize);
                if nh < best_h {
                    best_h = nh;
                    best = (nx, nz);
                }
            }
        }

        let next = if best != (cx, cz) {
            best
        } else {
            // Local minimum above sea level: plateau escape, one step away
            // from the world center
            let x = hm.world_x(cx as usize);
            let z = hm.world_z(cz as usize);
            if (x * x + z * z).sqrt() >= params.plateau_escape_radius {
                return Some(path);
            }

            let mut dx = if x > 0.0 { 1 } else if x < 0.0 { -1 } else { 0 };
            let dz = if z > 0.0 { 1 } else if z < 0.0 { -1 } else { 0 };
            if dx == 0 && dz == 0 {
                dx = 1;
            }
            let ex = cx + dx;
            let ez = cz + dz;
            if ex < 0 || ez < 0 || ex > res || ez > res {
                return Some(path);
            }
            let eh = hm.grid_height(ex as usize, ez as usize);
            if eh > h + params.escape_epsilon {
                return Some(path);
            }
            (ex, ez)
        };

        if !visited.insert((next.0 as usize, next.1 as usize)) {
            return None;
        }
        path.push((next.0 as usize, next.1 as usize));
        cx = next.0;
        cz = next.1;
    }
}

/// Reduce a traced cell path to a world-space polyline, keeping every 3rd
/// cell plus the mouth. Heights stay at zero; consumers re-sample them from
/// the carved heightmap.
fn decimate_path(hm: &Heightmap, path: &[(usize, usize)]) -> Vec<Point2> {
    let mut points: Vec<Point2> = path
        .iter()
        .step_by(DECIMATION)
        .map(|&(ix, iz)| Point2::new(hm.world_x(ix), hm.world_z(iz)))
        .collect();

    if (path.len() - 1) % DECIMATION != 0 {
        if let Some(&(ix, iz)) = path.last() {
            points.push(Point2::new(hm.world_x(ix), hm.world_z(iz)));
        }
    }

    points
}

/// Carve a tapering channel along a traced path.
///
/// Carving is monotonic: a cell's height only ever decreases, and the channel
/// floor never goes below `sea_level - 0.75`.
fn carve_channel(hm: &mut Heightmap, path: &[(usize, usize)]) {
    let denom = (path.len().saturating_sub(1)).max(1) as f32;
    let res = hm.res as i32;

    for (i, &(ix, iz)) in path.iter().enumerate() {
        let t = (i as f32 / denom).powf(TAPER_POWER);
        let width = lerp(WIDTH_SOURCE, WIDTH_MOUTH, t);
        let depth = lerp(DEPTH_SOURCE, DEPTH_MOUTH, t);

        let px = hm.world_x(ix);
        let pz = hm.world_z(iz);
        let center_h = hm.grid_height(ix, iz);
        let target_center = (center_h - depth).max(hm.sea_level - CARVE_FLOOR_OFFSET);

        let reach = width * CARVE_RADIUS_SCALE;
        let radius = (reach / hm.step).ceil() as i32;

        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let cx = ix as i32 + dx;
                let cz = iz as i32 + dz;
                if cx < 0 || cz < 0 || cx > res || cz > res {
                    continue;
                }
                let wx = hm.world_x(cx as usize);
                let wz = hm.world_z(cz as usize);
                let d = ((wx - px).powi(2) + (wz - pz).powi(2)).sqrt();
                if d > reach {
                    continue;
                }

                let k = 1.0 - smooth_step(0.0, 1.0, d / reach);
                let current = hm.grid_height(cx as usize, cz as usize);
                let carved = lerp(current, target_center, k * CARVE_BLEND);
                if carved < current {
                    hm.set_grid_height(cx as usize, cz as usize, carved);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A cone island: high at the center, sloping below sea level at the rim.
    fn cone_heightmap(size: f32, res: usize, peak: f32) -> Heightmap {
        let mut hm = Heightmap::new_flat(size, res, 0.0, 0.0);
        for iz in 0..=res {
            for ix in 0..=res {
                let x = hm.world_x(ix);
                let z = hm.world_z(iz);
                let dist = (x * x + z * z).sqrt();
                hm.set_grid_height(ix, iz, peak * (1.0 - dist / (size * 0.42)));
            }
        }
        hm
    }

    fn test_params() -> RiverParams {
        RiverParams {
            river_count: 3,
            min_source_height: 50.0,
            runway_exclusion_radius: 0.0,
            plateau_escape_radius: 400.0,
            ..RiverParams::default()
        }
    }

    #[test]
    fn test_rivers_are_deterministic() {
        let base = cone_heightmap(2000.0, 64, 120.0);

        let mut hm1 = base.clone();
        let mut hm2 = base.clone();
        let r1 = generate_rivers(&mut hm1, &test_params(), 99);
        let r2 = generate_rivers(&mut hm2, &test_params(), 99);

        assert_eq!(r1.len(), r2.len());
        for (a, b) in r1.iter().zip(&r2) {
            assert_eq!(a.points.len(), b.points.len());
            for (pa, pb) in a.points.iter().zip(&b.points) {
                assert_eq!(pa, pb);
            }
        }
        assert_eq!(hm1.raw(), hm2.raw(), "carved heightmaps must match exactly");
    }

    #[test]
    fn test_carving_is_monotonic() {
        let before = cone_heightmap(2000.0, 64, 120.0);
        let mut after = before.clone();
        let rivers = generate_rivers(&mut after, &test_params(), 7);
        assert!(!rivers.is_empty(), "cone terrain should accept rivers");

        let floor = after.sea_level - 0.75;
        for iz in 0..=after.res {
            for ix in 0..=after.res {
                let pre = before.grid_height(ix, iz);
                let post = after.grid_height(ix, iz);
                assert!(post <= pre, "carving must never raise terrain at ({ix},{iz})");
                if post < pre {
                    assert!(
                        post >= floor - 1e-4,
                        "carved cell ({ix},{iz}) fell below the channel floor: {post}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_source_threshold_above_terrain_yields_no_rivers() {
        let mut hm = cone_heightmap(2000.0, 64, 120.0);
        let params = RiverParams {
            min_source_height: hm.max_height() + 10.0,
            ..test_params()
        };
        let rivers = generate_rivers(&mut hm, &params, 5);
        assert!(rivers.is_empty());
    }

    #[test]
    fn test_river_reaches_the_sea_on_a_cone() {
        let mut hm = cone_heightmap(2000.0, 64, 120.0);
        let rivers = generate_rivers(&mut hm, &test_params(), 3);
        assert!(!rivers.is_empty());

        for river in &rivers {
            assert!(river.points.len() >= 2);
            let mouth = river.points.last().unwrap();
            let mouth_h = hm.sample_height(mouth.x, mouth.z);
            // Mouth sits at (or was carved to) effectively sea level.
            assert!(
                mouth_h <= hm.sea_level + 0.5 + 1e-3,
                "river mouth should reach the sea, height was {mouth_h}"
            );
        }
    }

    #[test]
    fn test_plateau_escape_walks_off_a_flat_top() {
        // Flat-topped island: a mesa at height 60 surrounded by a slope down
        // below sea level. A trace starting dead center is immediately stuck.
        let size = 2000.0;
        let res = 64;
        let mut hm = Heightmap::new_flat(size, res, 0.0, 0.0);
        let mesa_radius = 220.0;
        for iz in 0..=res {
            for ix in 0..=res {
                let x = hm.world_x(ix);
                let z = hm.world_z(iz);
                let dist = (x * x + z * z).sqrt();
                let h = if dist <= mesa_radius {
                    60.0
                } else {
                    60.0 * (1.0 - (dist - mesa_radius) / (size * 0.3))
                };
                hm.set_grid_height(ix, iz, h);
            }
        }

        let params = RiverParams {
            plateau_escape_radius: 500.0,
            ..test_params()
        };
        let path = trace_downhill(&hm, res / 2, res / 2, &params)
            .expect("escape trace should not cycle");

        let last = *path.last().unwrap();
        let last_h = hm.grid_height(last.0, last.1);
        assert!(
            last_h <= hm.sea_level + 0.5,
            "trace should escape the mesa and reach the sea, ended at height {last_h}"
        );
        assert!(path.len() > (mesa_radius / hm.step) as usize);
    }

    #[test]
    fn test_degenerate_trace_is_rejected_as_too_short() {
        // Terrain already at sea level everywhere: the trace stops instantly
        // and the path is shorter than the minimum, so no rivers come back
        // even though sources pass the height filter.
        let mut hm = Heightmap::new_flat(2000.0, 64, 0.0, 0.4);
        let params = RiverParams {
            min_source_height: 0.0,
            ..test_params()
        };
        let rivers = generate_rivers(&mut hm, &params, 11);
        assert!(rivers.is_empty());
    }
}
