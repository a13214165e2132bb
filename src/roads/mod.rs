//! Road network planning over a finalized terrain surface.
//!
//! Each road is planned independently: grid A* between two world endpoints
//! (see `search`), then smoothing and densification into a render-ready
//! polyline, then bridge span annotation where the path crosses water
//! (see `bridges`).

use serde::Serialize;

use crate::geom::{lerp, Point2, Point3};
use crate::heightmap::TerrainSampler;

pub mod bridges;
pub mod search;

pub use bridges::{BridgeDeck, BridgeParams, BridgeSpan};
pub use search::find_path;

// =============================================================================
// ROAD PARAMETERS
// =============================================================================

/// Parameters for road pathfinding and post-processing
#[derive(Clone, Debug)]
pub struct RoadParams {
    /// Search grid cell size in world units (independent of the heightmap
    /// resolution)
    pub grid_resolution: f32,
    /// Corridor half-width as a multiple of the endpoint distance
    pub corridor_multiplier: f32,
    /// Minimum corridor half-width in world units
    pub corridor_floor: f32,
    /// Extra cost for entering a water cell when bridging is allowed
    pub bridge_cost: f32,
    /// Extra cost for entering a water cell when bridging is not allowed
    pub water_cost: f32,
    /// Slope above this (degrees) starts accruing a gradient penalty
    pub max_gradient_deg: f32,
    /// Strength of the gradient penalty
    pub slope_cost_factor: f32,
    /// A* iteration budget before falling back to a straight line
    pub max_iterations: usize,
    /// Whether water cells may be crossed at bridge cost
    pub allow_bridges: bool,
    /// Number of neighbor-averaging smoothing passes
    pub smoothing_passes: usize,
    /// Maximum distance between consecutive polyline points after
    /// densification
    pub max_segment_length: f32,
    /// Height added above the sampled terrain so the road sits on the
    /// surface
    pub surface_offset: f32,
    /// Base road width; scaled per road type
    pub road_width: f32,
    /// Water surface height for the cost model and span detection
    pub sea_level: f32,
}

impl Default for RoadParams {
    fn default() -> Self {
        Self {
            grid_resolution: 60.0,
            corridor_multiplier: 1.2,
            corridor_floor: 8000.0,
            bridge_cost: 150.0,
            water_cost: 2500.0,
            max_gradient_deg: 14.0,
            slope_cost_factor: 6.0,
            max_iterations: 40_000,
            allow_bridges: true,
            smoothing_passes: 2,
            max_segment_length: 40.0,
            surface_offset: 0.35,
            road_width: 6.0,
            sea_level: 0.0,
        }
    }
}

/// Road classification; wider and straighter-prioritized roads first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RoadType {
    Local,
    Arterial,
    Highway,
}

impl RoadType {
    /// Width multiplier applied to the base road width.
    pub fn width_scale(&self) -> f32 {
        match self {
            RoadType::Local => 1.0,
            RoadType::Arterial => 1.5,
            RoadType::Highway => 2.2,
        }
    }
}

impl std::fmt::Display for RoadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoadType::Local => write!(f, "local"),
            RoadType::Arterial => write!(f, "arterial"),
            RoadType::Highway => write!(f, "highway"),
        }
    }
}

/// A planned road: a world-space polyline with width, classification, and
/// bridge span annotations. Immutable once planned.
#[derive(Clone, Debug, Serialize)]
pub struct RoadSegment {
    pub path: Vec<Point3>,
    pub width: f32,
    pub road_type: RoadType,
    pub from: Point2,
    pub to: Point2,
    pub bridge_spans: Vec<BridgeSpan>,
}

impl RoadSegment {
    pub fn has_bridges(&self) -> bool {
        !self.bridge_spans.is_empty()
    }

    /// Total polyline length in the ground plane.
    pub fn length(&self) -> f32 {
        self.path
            .windows(2)
            .map(|w| w[0].distance_xz(w[1]))
            .sum()
    }
}

// =============================================================================
// PLANNING
// =============================================================================

/// Plan a single road between two endpoints.
pub fn plan_road<T: TerrainSampler>(
    start: Point2,
    end: Point2,
    terrain: &T,
    road_type: RoadType,
    params: &RoadParams,
) -> RoadSegment {
    let mut path = search::find_path(start, end, terrain, params);
    path = smooth_path(&path, terrain, params.smoothing_passes, params.surface_offset);
    path = densify_path(&path, terrain, params.max_segment_length, params.surface_offset);

    let sea = params.sea_level;
    let bridge_spans = bridges::detect_spans(&path, |p| {
        terrain.height_at(p.x, p.z) < sea || terrain.is_in_lake(p.x, p.z)
    });

    RoadSegment {
        width: params.road_width * road_type.width_scale(),
        road_type,
        from: start,
        to: end,
        path,
        bridge_spans,
    }
}

/// Plan roads for a list of endpoint pairs.
///
/// `road_density` is the fraction of pairs that get a road at all;
/// `highway_density` is the fraction of built roads (longest first) promoted
/// to highways, with the same fraction again promoted to arterials.
pub fn plan_roads<T: TerrainSampler>(
    pairs: &[(Point2, Point2)],
    terrain: &T,
    params: &RoadParams,
    road_density: f32,
    highway_density: f32,
) -> Vec<RoadSegment> {
    let keep = ((pairs.len() as f32 * road_density.clamp(0.0, 1.0)).ceil() as usize)
        .min(pairs.len());

    // Longest connections first, so the promotion fractions see them in
    // descending order.
    let mut order: Vec<usize> = (0..pairs.len()).collect();
    order.sort_by(|&a, &b| {
        let la = pairs[a].0.distance(pairs[a].1);
        let lb = pairs[b].0.distance(pairs[b].1);
        lb.partial_cmp(&la).unwrap_or(std::cmp::Ordering::Equal)
    });

    let highways = (keep as f32 * highway_density.clamp(0.0, 1.0)).ceil() as usize;

    order
        .into_iter()
        .take(keep)
        .enumerate()
        .map(|(rank, idx)| {
            let road_type = if rank < highways {
                RoadType::Highway
            } else if rank < highways * 2 {
                RoadType::Arterial
            } else {
                RoadType::Local
            };
            let (start, end) = pairs[idx];
            plan_road(start, end, terrain, road_type, params)
        })
        .collect()
}

// =============================================================================
// POST-PROCESSING
// =============================================================================

/// Neighbor-average smoothing. Interior points are replaced by the mean of
/// themselves and their two neighbors, then all heights are re-sampled from
/// the terrain with a small upward offset. Endpoint positions never move.
pub fn smooth_path<T: TerrainSampler>(
    path: &[Point3],
    terrain: &T,
    passes: usize,
    surface_offset: f32,
) -> Vec<Point3> {
    let mut points = path.to_vec();
    if points.len() < 3 {
        return points;
    }

    for _ in 0..passes {
        let snapshot = points.clone();
        for i in 1..snapshot.len() - 1 {
            let a = snapshot[i - 1];
            let b = snapshot[i];
            let c = snapshot[i + 1];
            points[i] = Point3::new(
                (a.x + b.x + c.x) / 3.0,
                b.y,
                (a.z + b.z + c.z) / 3.0,
            );
        }
    }

    for p in &mut points {
        p.y = terrain.height_at(p.x, p.z) + surface_offset;
    }
    points
}

/// Insert interpolated points so no consecutive pair is farther apart than
/// `max_segment_length`; inserted heights are sampled from the terrain.
pub fn densify_path<T: TerrainSampler>(
    path: &[Point3],
    terrain: &T,
    max_segment_length: f32,
    surface_offset: f32,
) -> Vec<Point3> {
    if path.len() < 2 || max_segment_length <= 0.0 {
        return path.to_vec();
    }

    let mut out = Vec::with_capacity(path.len());
    out.push(path[0]);
    for w in path.windows(2) {
        let (a, b) = (w[0], w[1]);
        let dist = a.distance_xz(b);
        let pieces = (dist / max_segment_length).ceil().max(1.0) as usize;
        for k in 1..pieces {
            let t = k as f32 / pieces as f32;
            let x = lerp(a.x, b.x, t);
            let z = lerp(a.z, b.z, t);
            out.push(Point3::new(x, terrain.height_at(x, z) + surface_offset, z));
        }
        out.push(b);
    }
    out
}
