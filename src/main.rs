use clap::Parser;

use island_generator::export;
use island_generator::geom::Point2;
use island_generator::heightmap::TerrainParams;
use island_generator::rivers::RiverParams;
use island_generator::roads::{BridgeParams, RoadParams};
use island_generator::water;
use island_generator::world::{self, WorldParams};

#[derive(Parser, Debug)]
#[command(name = "island_generator")]
#[command(about = "Generate a deterministic island world with rivers, roads and bridges")]
struct Args {
    /// Random seed (uses a random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// World edge length in world units
    #[arg(long, default_value = "12000.0")]
    terrain_size: f32,

    /// Heightmap grid resolution
    #[arg(long, default_value = "256")]
    terrain_res: usize,

    /// Terrain amplitude
    #[arg(long, default_value = "180.0")]
    terrain_amp: f32,

    /// Sea level
    #[arg(long, default_value = "0.0")]
    sea_level: f32,

    /// Runway strip half-length
    #[arg(long, default_value = "1400.0")]
    runway_len: f32,

    /// Runway strip half-width
    #[arg(long, default_value = "260.0")]
    runway_w: f32,

    /// Base noise frequency (cycles across the world)
    #[arg(long, default_value = "2.8")]
    noise_freq: f64,

    /// Noise octave count
    #[arg(long, default_value = "5")]
    noise_oct: u32,

    /// Noise gain (amplitude decay per octave)
    #[arg(long, default_value = "0.5")]
    noise_gain: f64,

    /// Noise lacunarity (frequency multiplier per octave)
    #[arg(long, default_value = "2.0")]
    noise_lac: f64,

    /// Number of rivers to attempt
    #[arg(long, default_value = "4")]
    river_count: usize,

    /// Minimum river source height
    #[arg(long, default_value = "55.0")]
    river_source_min: f32,

    /// River source exclusion radius around the runway
    #[arg(long, default_value = "1600.0")]
    river_runway_exclusion: f32,

    /// Base road width
    #[arg(long, default_value = "6.0")]
    road_width: f32,

    /// Road smoothing passes
    #[arg(long, default_value = "2")]
    road_smooth: usize,

    /// Allow roads to cross water on bridges
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    allow_bridges: bool,

    /// Fraction of endpoint pairs that get a road
    #[arg(long, default_value = "1.0")]
    road_density: f32,

    /// Fraction of roads promoted to highways
    #[arg(long, default_value = "0.2")]
    highway_density: f32,

    /// Gradient (degrees) above which roads accrue a slope penalty
    #[arg(long, default_value = "14.0")]
    max_road_gradient: f32,

    /// Bridge deck clearance above the water
    #[arg(long, default_value = "8.0")]
    bridge_clearance: f32,

    /// Number of fallback waypoint pairs to connect with roads
    #[arg(long, default_value = "5")]
    waypoint_pairs: usize,

    /// Export the world map to a PNG (specify output path)
    #[arg(long)]
    export_map: Option<String>,

    /// Pixels per heightmap sample for the map export
    #[arg(long, default_value = "4")]
    export_scale: u32,

    /// Export rivers/roads/bridges as JSON (specify output path)
    #[arg(long)]
    export_json: Option<String>,
}

fn main() {
    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(rand::random);
    println!("Generating island world with seed: {}", seed);
    println!("Terrain: {}x{} samples over {:.0} units", args.terrain_res + 1, args.terrain_res + 1, args.terrain_size);

    let params = WorldParams {
        seed,
        terrain: TerrainParams {
            size: args.terrain_size,
            res: args.terrain_res,
            amplitude: args.terrain_amp,
            sea_level: args.sea_level,
            runway_length: args.runway_len,
            runway_width: args.runway_w,
            noise_frequency: args.noise_freq,
            noise_octaves: args.noise_oct,
            noise_gain: args.noise_gain,
            noise_lacunarity: args.noise_lac,
        },
        rivers: RiverParams {
            river_count: args.river_count,
            min_source_height: args.river_source_min,
            runway_exclusion_radius: args.river_runway_exclusion,
            ..RiverParams::default()
        },
        roads: RoadParams {
            road_width: args.road_width,
            smoothing_passes: args.road_smooth,
            allow_bridges: args.allow_bridges,
            max_gradient_deg: args.max_road_gradient,
            sea_level: args.sea_level,
            ..RoadParams::default()
        },
        bridges: BridgeParams {
            clearance: args.bridge_clearance,
            ..BridgeParams::default()
        },
        road_density: args.road_density,
        highway_density: args.highway_density,
        waypoint_pairs: args.waypoint_pairs,
    };

    // Endpoints come from a settlement system in a full game build; the CLI
    // always uses fallback waypoints picked from the classified plains.
    let endpoints: Vec<(Point2, Point2)> = Vec::new();

    let world = match world::generate_world(&params, &endpoints) {
        Ok(world) => world,
        Err(e) => {
            eprintln!("World generation failed: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Heightmap range: {:.1} to {:.1} (sea level {:.1})",
        world.heightmap.min_height(),
        world.heightmap.max_height(),
        args.sea_level
    );

    let land = world
        .heightmap
        .raw()
        .iter()
        .filter(|&&h| h >= args.sea_level)
        .count();
    let total = world.heightmap.raw().len();
    println!(
        "Land coverage: {}/{} samples ({:.1}%)",
        land,
        total,
        100.0 * land as f64 / total as f64
    );

    println!(
        "Regions: {} plains, {} hills, {} mountains, {} valleys (stride {})",
        world.regions.plains.len(),
        world.regions.hills.len(),
        world.regions.mountains.len(),
        world.regions.valleys.len(),
        world.regions.stride
    );

    println!("Rivers: {}/{} generated", world.rivers.len(), args.river_count);
    for (i, river) in world.rivers.iter().enumerate() {
        println!(
            "  River {}: {} points, width {:.0} to {:.0}",
            i + 1,
            river.points.len(),
            river.width0,
            river.width1
        );
    }

    let lake_count = water::count_lakes(&world.water_bodies);
    println!("Water bodies: {} ({} lakes)", world.water_bodies.len(), lake_count);

    println!("Roads: {}", world.roads.len());
    for (i, road) in world.roads.iter().enumerate() {
        let decks = world.bridge_decks(road);
        let pillar_count: usize = decks.iter().map(|d| d.pillars.len()).sum();
        println!(
            "  Road {} ({}): {:.0} units, {} points, {} bridge spans, {} pillars",
            i + 1,
            road.road_type,
            road.length(),
            road.path.len(),
            road.bridge_spans.len(),
            pillar_count
        );
    }

    if let Some(ref path) = args.export_map {
        match export::export_world_map(&world, path, args.export_scale) {
            Ok(()) => println!("Exported world map to: {}", path),
            Err(e) => eprintln!("Failed to export world map: {}", e),
        }
    }

    if let Some(ref path) = args.export_json {
        let summary = world.summary();
        match serde_json::to_string_pretty(&summary)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()))
        {
            Ok(()) => println!("Exported world data to: {}", path),
            Err(e) => eprintln!("Failed to export world data: {}", e),
        }
    }
}
