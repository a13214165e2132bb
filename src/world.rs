//! World generation pipeline and data bundle.
//!
//! Runs the stages in dependency order - heightmap synthesis, river carving,
//! water classification, region classification, road planning - and bundles
//! the immutable results. The heightmap is the only shared mutable resource:
//! the river stage is its sole writer, and every later stage reads it
//! through an immutable borrow.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::geom::Point2;
use crate::heightmap::{generate_heightmap, Heightmap, TerrainParams};
use crate::regions::{classify_regions, RegionMap};
use crate::rivers::{generate_rivers, River, RiverParams};
use crate::roads::{bridges, plan_roads, BridgeDeck, BridgeParams, RoadParams, RoadSegment};
use crate::seeds::WorldSeeds;
use crate::water::{detect_water_bodies, SampledTerrain, WaterBody, WaterMap};

// =============================================================================
// PARAMETERS
// =============================================================================

/// Full configuration for one world build.
///
/// Every field has a default; the orchestrator binary maps its flat CLI
/// keys onto this struct.
#[derive(Clone, Debug)]
pub struct WorldParams {
    /// Master seed; per-system seeds are derived from it
    pub seed: u64,
    pub terrain: TerrainParams,
    pub rivers: RiverParams,
    pub roads: RoadParams,
    pub bridges: BridgeParams,
    /// Fraction of endpoint pairs that get a road
    pub road_density: f32,
    /// Fraction of built roads promoted to highways
    pub highway_density: f32,
    /// Number of fallback waypoint pairs when no endpoints are supplied
    pub waypoint_pairs: usize,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            seed: 0,
            terrain: TerrainParams::default(),
            rivers: RiverParams::default(),
            roads: RoadParams::default(),
            bridges: BridgeParams::default(),
            road_density: 1.0,
            highway_density: 0.2,
            waypoint_pairs: 5,
        }
    }
}

/// Precondition failures that abort a world build.
///
/// Degraded outcomes (fewer rivers than requested, straight-line fallback
/// roads, pillar-less spans) are ordinary results and never raise this.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldGenError {
    /// Terrain resolution too small to form a grid
    InvalidResolution(usize),
    /// Terrain size or amplitude is not a positive finite number
    InvalidTerrainSize(f32),
    /// Road search grid cell size is not a positive finite number
    InvalidGridResolution(f32),
}

impl std::fmt::Display for WorldGenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldGenError::InvalidResolution(res) => {
                write!(f, "terrain resolution must be at least 2, got {res}")
            }
            WorldGenError::InvalidTerrainSize(size) => {
                write!(f, "terrain size must be positive and finite, got {size}")
            }
            WorldGenError::InvalidGridResolution(g) => {
                write!(f, "road grid resolution must be positive and finite, got {g}")
            }
        }
    }
}

impl std::error::Error for WorldGenError {}

// =============================================================================
// WORLD DATA
// =============================================================================

/// All generated world data bundled together.
pub struct WorldData {
    /// Seeds used for generation (allows recreation)
    pub seeds: WorldSeeds,
    /// Elevation grid, carved by the river stage, then read-only
    pub heightmap: Heightmap,
    /// Ocean/lake classification of the carved heightmap
    pub water_map: WaterMap,
    pub water_bodies: Vec<WaterBody>,
    /// Coarse plains/hills/mountains/valleys buckets
    pub regions: RegionMap,
    pub rivers: Vec<River>,
    pub roads: Vec<RoadSegment>,
    /// Bridge planning parameters, kept for on-demand deck derivation
    bridge_params: BridgeParams,
}

impl WorldData {
    /// Convenience accessor for the master seed.
    pub fn seed(&self) -> u64 {
        self.seeds.master
    }

    /// Derive deck geometry for every bridge span of a road. Computed on
    /// demand; spans themselves are annotated during planning.
    pub fn bridge_decks(&self, road: &RoadSegment) -> Vec<BridgeDeck> {
        let terrain = SampledTerrain {
            heightmap: &self.heightmap,
            water: &self.water_map,
        };
        road.bridge_spans
            .iter()
            .map(|span| {
                bridges::plan_deck(
                    &road.path,
                    span,
                    &terrain,
                    self.heightmap.sea_level,
                    &self.bridge_params,
                )
            })
            .collect()
    }

    /// Serializable summary of the generated features (the heightmap grid
    /// itself is omitted).
    pub fn summary(&self) -> WorldSummary<'_> {
        WorldSummary {
            seed: self.seeds.master,
            size: self.heightmap.size,
            res: self.heightmap.res,
            sea_level: self.heightmap.sea_level,
            rivers: &self.rivers,
            roads: &self.roads,
            water_bodies: &self.water_bodies,
        }
    }
}

/// JSON-exportable view of a generated world.
#[derive(Serialize)]
pub struct WorldSummary<'a> {
    pub seed: u64,
    pub size: f32,
    pub res: usize,
    pub sea_level: f32,
    pub rivers: &'a [River],
    pub roads: &'a [RoadSegment],
    pub water_bodies: &'a [WaterBody],
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Generate a complete world.
///
/// `endpoints` are the road connection requests (settlement centers or
/// waypoints) supplied by the caller; when empty, deterministic fallback
/// waypoints are picked from the classified plains.
pub fn generate_world(
    params: &WorldParams,
    endpoints: &[(Point2, Point2)],
) -> Result<WorldData, WorldGenError> {
    validate(params)?;

    let seeds = WorldSeeds::from_master(params.seed);

    let mut heightmap = generate_heightmap(&params.terrain, seeds.heightmap);
    let rivers = generate_rivers(&mut heightmap, &params.rivers, seeds.rivers);

    // Heights are final from here on
    let (water_map, water_bodies) = detect_water_bodies(&heightmap);
    let regions = classify_regions(&heightmap);

    let mut road_params = params.roads.clone();
    road_params.sea_level = params.terrain.sea_level;

    let pairs: Vec<(Point2, Point2)> = if endpoints.is_empty() {
        fallback_waypoints(&regions, &heightmap, params.waypoint_pairs, seeds.roads)
    } else {
        endpoints.to_vec()
    };

    let terrain = SampledTerrain {
        heightmap: &heightmap,
        water: &water_map,
    };
    let roads = plan_roads(
        &pairs,
        &terrain,
        &road_params,
        params.road_density,
        params.highway_density,
    );

    Ok(WorldData {
        seeds,
        heightmap,
        water_map,
        water_bodies,
        regions,
        rivers,
        roads,
        bridge_params: params.bridges.clone(),
    })
}

fn validate(params: &WorldParams) -> Result<(), WorldGenError> {
    if params.terrain.res < 2 {
        return Err(WorldGenError::InvalidResolution(params.terrain.res));
    }
    if !(params.terrain.size.is_finite() && params.terrain.size > 0.0) {
        return Err(WorldGenError::InvalidTerrainSize(params.terrain.size));
    }
    if !(params.roads.grid_resolution.is_finite() && params.roads.grid_resolution > 0.0) {
        return Err(WorldGenError::InvalidGridResolution(params.roads.grid_resolution));
    }
    Ok(())
}

/// Pick deterministic endpoint pairs from the classified regions, for
/// callers with no settlement system of their own. Prefers plains, falls
/// back to hills, and keeps pairs a respectable distance apart.
pub fn fallback_waypoints(
    regions: &RegionMap,
    hm: &Heightmap,
    pair_count: usize,
    seed: u64,
) -> Vec<(Point2, Point2)> {
    let candidates: &[(usize, usize)] = if !regions.plains.is_empty() {
        &regions.plains
    } else if !regions.hills.is_empty() {
        &regions.hills
    } else {
        return Vec::new();
    };
    if candidates.len() < 2 {
        return Vec::new();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let min_separation = hm.size * 0.1;
    let mut pairs = Vec::with_capacity(pair_count);
    let mut attempts = 0;

    while pairs.len() < pair_count && attempts < pair_count * 40 {
        attempts += 1;
        let (ax, az) = candidates[rng.gen_range(0..candidates.len())];
        let (bx, bz) = candidates[rng.gen_range(0..candidates.len())];
        let a = Point2::new(hm.world_x(ax), hm.world_z(az));
        let b = Point2::new(hm.world_x(bx), hm.world_z(bz));
        if a.distance(b) < min_separation {
            continue;
        }
        pairs.push((a, b));
    }

    pairs
}
