//! Heightmap synthesis from layered coherent noise.
//!
//! The terrain surface is built in five layers per grid point:
//! 1. Rolling base terrain from two blended fBm samples
//! 2. An archipelago mask (low-frequency noise x radial falloff) that breaks
//!    the world into irregular landmasses instead of one filled disc
//! 3. Ridged mountains, pushed inland away from coastlines
//! 4. A flattened runway strip around the origin
//! 5. Underwater reshaping for gentler coastal slopes

use noise::{NoiseFn, Perlin};
use rayon::prelude::*;

use crate::geom::{lerp, smooth_step};

// =============================================================================
// TERRAIN PARAMETERS
// =============================================================================

/// Parameters for heightmap synthesis
#[derive(Clone, Debug)]
pub struct TerrainParams {
    /// World edge length in world units (terrain is a centered square)
    pub size: f32,
    /// Grid resolution; the heightmap stores (res+1) x (res+1) samples
    pub res: usize,
    /// Vertical amplitude of the base terrain
    pub amplitude: f32,
    /// Water surface height
    pub sea_level: f32,
    /// Half-length of the flattened runway strip (along X)
    pub runway_length: f32,
    /// Half-width of the flattened runway strip (along Z)
    pub runway_width: f32,
    /// Base noise frequency in cycles across the world
    pub noise_frequency: f64,
    /// Number of fBm octaves
    pub noise_octaves: u32,
    /// Amplitude decay per octave (0.0-1.0)
    pub noise_gain: f64,
    /// Frequency multiplier per octave
    pub noise_lacunarity: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            size: 12000.0,
            res: 256,
            amplitude: 180.0,
            sea_level: 0.0,
            runway_length: 1400.0,
            runway_width: 260.0,
            noise_frequency: 2.8,
            noise_octaves: 5,
            noise_gain: 0.5,
            noise_lacunarity: 2.0,
        }
    }
}

// =============================================================================
// SYNTHESIS CONSTANTS
// =============================================================================

// Base terrain blend weights for the two octave-scaled samples
const BASE_BLEND_A: f32 = 0.58;
const BASE_BLEND_B: f32 = 0.42;

// Frequency multipliers relative to the base frequency
const MASK_FREQ_SCALE: f64 = 0.45; // Archipelago mask (larger features)
const RIDGE_FREQ_SCALE: f64 = 1.7; // Mountain ridgelines (finer features)
const BASE_SECOND_SCALE: f64 = 2.3; // Second base sample

// Archipelago mask smoothstep edges
const MASK_EDGE_LO: f32 = 0.25;
const MASK_EDGE_HI: f32 = 0.65;

// Ridged mountains: rectified noise sharpening power and height scale
const RIDGE_POWER: f32 = 2.2;
const RIDGE_SCALE: f32 = 1.6;

// Inland factor edges: mountains fade in away from coastlines
const INLAND_EDGE_LO: f32 = 0.35;
const INLAND_EDGE_HI: f32 = 0.80;

// Flattened runway target height
const RUNWAY_HEIGHT: f32 = 2.0;

// Underwater reshaping: shelf drop and slope compression
const SHELF_DROP: f32 = 8.0;
const UNDERWATER_SLOPE: f32 = 0.40;

// =============================================================================
// HEIGHTMAP STORAGE
// =============================================================================

/// A square grid of elevation samples centered on the world origin.
///
/// Samples are stored row-major as `index = iz * (res + 1) + ix` for grid
/// coordinates `0 <= ix, iz <= res`. Grid spacing is `step = size / res` and
/// world coordinates run from `-half` to `+half` on both axes.
#[derive(Clone)]
pub struct Heightmap {
    pub res: usize,
    pub size: f32,
    pub step: f32,
    pub half: f32,
    pub sea_level: f32,
    heights: Vec<f32>,
}

impl Heightmap {
    /// Create a heightmap filled with a constant height.
    pub fn new_flat(size: f32, res: usize, sea_level: f32, height: f32) -> Self {
        let samples = (res + 1) * (res + 1);
        Self {
            res,
            size,
            step: size / res as f32,
            half: size / 2.0,
            sea_level,
            heights: vec![height; samples],
        }
    }

    fn index(&self, ix: usize, iz: usize) -> usize {
        iz * (self.res + 1) + ix
    }

    /// Height at a grid sample. Coordinates are clamped to the grid.
    pub fn grid_height(&self, ix: usize, iz: usize) -> f32 {
        let ix = ix.min(self.res);
        let iz = iz.min(self.res);
        self.heights[self.index(ix, iz)]
    }

    /// Overwrite a grid sample.
    pub fn set_grid_height(&mut self, ix: usize, iz: usize, height: f32) {
        let idx = self.index(ix.min(self.res), iz.min(self.res));
        self.heights[idx] = height;
    }

    /// World X coordinate of grid column `ix`.
    pub fn world_x(&self, ix: usize) -> f32 {
        ix as f32 * self.step - self.half
    }

    /// World Z coordinate of grid row `iz`.
    pub fn world_z(&self, iz: usize) -> f32 {
        iz as f32 * self.step - self.half
    }

    /// Total number of samples per axis.
    pub fn samples_per_axis(&self) -> usize {
        self.res + 1
    }

    /// Raw sample storage, row-major.
    pub fn raw(&self) -> &[f32] {
        &self.heights
    }

    /// Highest sample in the map.
    pub fn max_height(&self) -> f32 {
        self.heights.iter().copied().fold(f32::MIN, f32::max)
    }

    /// Lowest sample in the map.
    pub fn min_height(&self) -> f32 {
        self.heights.iter().copied().fold(f32::MAX, f32::min)
    }

    /// Bilinear height lookup by world position. Positions outside the grid
    /// are clamped to the border samples.
    pub fn sample_height(&self, x: f32, z: f32) -> f32 {
        let max = self.res as f32;
        let gx = ((x + self.half) / self.step).clamp(0.0, max);
        let gz = ((z + self.half) / self.step).clamp(0.0, max);

        let ix = (gx.floor() as usize).min(self.res.saturating_sub(1));
        let iz = (gz.floor() as usize).min(self.res.saturating_sub(1));
        let fx = gx - ix as f32;
        let fz = gz - iz as f32;

        let h00 = self.grid_height(ix, iz);
        let h10 = self.grid_height(ix + 1, iz);
        let h01 = self.grid_height(ix, iz + 1);
        let h11 = self.grid_height(ix + 1, iz + 1);

        let h0 = h00 * (1.0 - fx) + h10 * fx;
        let h1 = h01 * (1.0 - fx) + h11 * fx;
        h0 * (1.0 - fz) + h1 * fz
    }

    /// Local slope (gradient magnitude) by central differences of bilinear
    /// samples spaced one grid step apart.
    pub fn sample_slope(&self, x: f32, z: f32) -> f32 {
        let d = self.step;
        let gx = (self.sample_height(x + d, z) - self.sample_height(x - d, z)) / (2.0 * d);
        let gz = (self.sample_height(x, z + d) - self.sample_height(x, z - d)) / (2.0 * d);
        (gx * gx + gz * gz).sqrt()
    }
}

// =============================================================================
// TERRAIN QUERY INTERFACE
// =============================================================================

/// Point queries over a finalized terrain surface.
///
/// Road planning and bridge placement only need these three questions
/// answered; anything that can answer them can drive a road network.
pub trait TerrainSampler {
    /// Terrain height at a world position.
    fn height_at(&self, x: f32, z: f32) -> f32;
    /// Gradient magnitude at a world position.
    fn slope_at(&self, x: f32, z: f32) -> f32;
    /// Whether the position lies inside an inland lake.
    fn is_in_lake(&self, x: f32, z: f32) -> bool;
}

impl TerrainSampler for Heightmap {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        self.sample_height(x, z)
    }

    fn slope_at(&self, x: f32, z: f32) -> f32 {
        self.sample_slope(x, z)
    }

    // A bare heightmap has no connectivity knowledge; lake classification
    // lives in the water module.
    fn is_in_lake(&self, _x: f32, _z: f32) -> bool {
        false
    }
}

// =============================================================================
// MAIN HEIGHTMAP GENERATION
// =============================================================================

/// Generate a heightmap using layered terrain synthesis.
///
/// Fully deterministic for a fixed `(params, seed)` pair: every noise layer
/// is seeded from `seed` with a fixed offset, and the row-parallel fill
/// writes disjoint ranges in grid order.
pub fn generate_heightmap(params: &TerrainParams, seed: u64) -> Heightmap {
    let res = params.res;
    let size = params.size;
    let step = size / res as f32;
    let half = size / 2.0;

    // Separate noise generators per layer, offset-seeded like sibling layers
    // elsewhere in the pipeline
    let base_noise = Perlin::new(seed as u32);
    let mask_noise = Perlin::new((seed as u32).wrapping_add(1111));
    let ridge_noise = Perlin::new((seed as u32).wrapping_add(2222));

    let base_freq = params.noise_frequency;
    let mask_freq = params.noise_frequency * MASK_FREQ_SCALE;
    let ridge_freq = params.noise_frequency * RIDGE_FREQ_SCALE;

    let rows: Vec<Vec<f32>> = (0..res + 1)
        .into_par_iter()
        .map(|iz| {
            let z = iz as f32 * step - half;
            let nz = z as f64 / size as f64;
            let mut row = Vec::with_capacity(res + 1);

            for ix in 0..=res {
                let x = ix as f32 * step - half;
                let nx = x as f64 / size as f64;

                // 1. Rolling base terrain: two octave-scaled fBm samples
                let n1 = fbm(
                    &base_noise,
                    nx * base_freq,
                    nz * base_freq,
                    params.noise_octaves,
                    params.noise_gain,
                    params.noise_lacunarity,
                ) as f32;
                let n2 = fbm(
                    &base_noise,
                    nx * base_freq * BASE_SECOND_SCALE + 5.2,
                    nz * base_freq * BASE_SECOND_SCALE + 3.1,
                    params.noise_octaves.saturating_sub(1).max(1),
                    params.noise_gain,
                    params.noise_lacunarity,
                ) as f32;
                let mut h = (n1 * BASE_BLEND_A + n2 * BASE_BLEND_B) * params.amplitude;

                // 2. Archipelago mask: irregular landmasses, not one disc
                let m = fbm(&mask_noise, nx * mask_freq, nz * mask_freq, 4, 0.55, 2.1) as f32;
                let m01 = (m + 1.0) * 0.5;
                let dist = (x * x + z * z).sqrt();
                let fall = (1.0 - dist / (size * 0.8)).clamp(0.0, 1.0);
                let island = smooth_step(MASK_EDGE_LO, MASK_EDGE_HI, m01) * fall;
                h *= island;

                // 3. Ridged mountains, fading in away from the coastline
                let r = fbm(&ridge_noise, nx * ridge_freq, nz * ridge_freq, 4, 0.5, 2.0) as f32;
                let ridge = r.abs().powf(RIDGE_POWER);
                let inland = smooth_step(INLAND_EDGE_LO, INLAND_EDGE_HI, island);
                h += ridge * inland * params.amplitude * RIDGE_SCALE;

                // 4. Runway flattening: triangular falloff strip at the origin
                let fx = (1.0 - x.abs() / params.runway_length).clamp(0.0, 1.0);
                let fz = (1.0 - z.abs() / params.runway_width).clamp(0.0, 1.0);
                h = lerp(h, RUNWAY_HEIGHT, fx * fz);

                // 5. Gentler underwater slopes to avoid coastal cliffs
                if h < params.sea_level {
                    h = params.sea_level - SHELF_DROP + h * UNDERWATER_SLOPE;
                }

                row.push(h);
            }
            row
        })
        .collect();

    let mut heights = Vec::with_capacity((res + 1) * (res + 1));
    for row in rows {
        heights.extend(row);
    }

    Heightmap {
        res,
        size,
        step,
        half,
        sea_level: params.sea_level,
        heights,
    }
}

// =============================================================================
// NOISE FUNCTIONS
// =============================================================================

/// Fractional Brownian Motion - multi-octave noise
pub(crate) fn fbm(
    noise: &Perlin,
    x: f64,
    y: f64,
    octaves: u32,
    persistence: f64,
    lacunarity: f64,
) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    total / max_value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let params = TerrainParams {
            res: 48,
            ..TerrainParams::default()
        };
        let a = generate_heightmap(&params, 777);
        let b = generate_heightmap(&params, 777);
        assert_eq!(a.raw(), b.raw(), "same seed and params must be byte-identical");
    }

    #[test]
    fn test_different_seeds_differ() {
        let params = TerrainParams {
            res: 32,
            ..TerrainParams::default()
        };
        let a = generate_heightmap(&params, 1);
        let b = generate_heightmap(&params, 2);
        assert_ne!(a.raw(), b.raw());
    }

    #[test]
    fn test_archipelago_scenario() {
        // A typical configuration must produce both ocean and high terrain.
        let params = TerrainParams {
            size: 12000.0,
            res: 64,
            amplitude: 180.0,
            sea_level: 0.0,
            ..TerrainParams::default()
        };
        let hm = generate_heightmap(&params, 42);

        let has_ocean = hm.raw().iter().any(|&h| h < 0.0);
        let has_high_ground = hm.raw().iter().any(|&h| h > 100.0);
        assert!(has_ocean, "expected cells below sea level, min={}", hm.min_height());
        assert!(
            has_high_ground,
            "expected cells above 100, max={}",
            hm.max_height()
        );
    }

    #[test]
    fn test_runway_is_flat() {
        let params = TerrainParams {
            res: 64,
            ..TerrainParams::default()
        };
        let hm = generate_heightmap(&params, 9);
        // The runway mask peaks at the origin, which res=64 samples exactly.
        let center = hm.sample_height(0.0, 0.0);
        assert!(
            (center - 2.0).abs() < 1e-3,
            "runway center should be flattened to 2.0, got {center}"
        );
    }

    #[test]
    fn test_index_layout() {
        let mut hm = Heightmap::new_flat(100.0, 4, 0.0, 0.0);
        hm.set_grid_height(3, 2, 7.5);
        assert_eq!(hm.raw()[2 * 5 + 3], 7.5);
        assert_eq!(hm.grid_height(3, 2), 7.5);
    }

    #[test]
    fn test_bilinear_sampling() {
        let mut hm = Heightmap::new_flat(4.0, 4, 0.0, 0.0);
        // Single raised sample at grid (2, 2), which is world (0, 0).
        hm.set_grid_height(2, 2, 10.0);

        assert_eq!(hm.sample_height(0.0, 0.0), 10.0);
        // Halfway toward the next sample interpolates halfway down.
        let mid = hm.sample_height(0.5, 0.0);
        assert!((mid - 5.0).abs() < 1e-5, "expected 5.0, got {mid}");
    }

    #[test]
    fn test_sampling_clamps_outside_grid() {
        let hm = Heightmap::new_flat(10.0, 4, 0.0, 3.0);
        assert_eq!(hm.sample_height(-500.0, 900.0), 3.0);
    }

    #[test]
    fn test_slope_on_ramp() {
        let mut hm = Heightmap::new_flat(8.0, 8, 0.0, 0.0);
        // Height increases 1 unit per unit X: slope magnitude 1.
        for iz in 0..=8 {
            for ix in 0..=8 {
                hm.set_grid_height(ix, iz, ix as f32);
            }
        }
        let slope = hm.sample_slope(0.0, 0.0);
        assert!((slope - 1.0).abs() < 1e-4, "expected slope 1.0, got {slope}");
    }
}
