//! Bridge planning over road polylines.
//!
//! Scans a finished road polyline for contiguous runs of samples over water,
//! merges them into spans, and derives a deck profile (flat middle, ramped
//! ends) plus pillar placement for each span. Spans are index ranges into
//! the road's path; nothing here creates new road geometry.

use serde::Serialize;

use crate::geom::{lerp, smooth_step, Point3};
use crate::heightmap::TerrainSampler;

/// Parameters for bridge deck and pillar planning
#[derive(Clone, Debug)]
pub struct BridgeParams {
    /// Deck clearance above the highest water level under the span
    pub clearance: f32,
    /// Spacing between pillars along the span
    pub pillar_spacing: f32,
    /// Minimum gap between deck and ground for a pillar to be placed
    pub min_pillar_clearance: f32,
    /// Fraction of the span length used for each end ramp
    pub ramp_fraction: f32,
}

impl Default for BridgeParams {
    fn default() -> Self {
        Self {
            clearance: 8.0,
            pillar_spacing: 60.0,
            min_pillar_clearance: 3.0,
            ramp_fraction: 0.25,
        }
    }
}

/// A contiguous run of road path samples over water.
///
/// Indices are inclusive and refer to the owning road's `path`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BridgeSpan {
    pub start_index: usize,
    pub end_index: usize,
}

impl BridgeSpan {
    /// Number of path samples covered by the span (always at least two).
    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }
}

/// Deck geometry derived from a span: a single flat deck height, the ramped
/// per-sample profile, and pillar base positions.
#[derive(Clone, Debug, Serialize)]
pub struct BridgeDeck {
    /// Flat deck elevation in the middle of the span
    pub deck_height: f32,
    /// Deck elevation per span sample (ramps blend to bank height)
    pub profile: Vec<f32>,
    /// Pillar base positions (Y is the ground height under the pillar)
    pub pillars: Vec<Point3>,
}

// =============================================================================
// SPAN DETECTION
// =============================================================================

/// Detect bridge spans along a polyline.
///
/// A point counts as over water when the caller's predicate says so;
/// consecutive over-water points merge into one span. Isolated single
/// samples are treated as noise and dropped; a span may run to the very end
/// of the polyline.
pub fn detect_spans<F>(path: &[Point3], is_water: F) -> Vec<BridgeSpan>
where
    F: Fn(&Point3) -> bool,
{
    let mut spans = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, point) in path.iter().enumerate() {
        if is_water(point) {
            run_start.get_or_insert(i);
            continue;
        }
        if let Some(start) = run_start.take() {
            if i - start >= 2 {
                spans.push(BridgeSpan {
                    start_index: start,
                    end_index: i - 1,
                });
            }
        }
    }
    if let Some(start) = run_start {
        if path.len() - start >= 2 {
            spans.push(BridgeSpan {
                start_index: start,
                end_index: path.len() - 1,
            });
        }
    }

    spans
}

// =============================================================================
// DECK PLANNING
// =============================================================================

/// Plan the deck for one span.
///
/// The deck height is the highest water level under the span plus the
/// configured clearance. The profile ramps from bank height at each shore
/// into the flat deck over the first/last `ramp_fraction` of the span, so
/// the bridge meets land without a vertical discontinuity. Pillars are
/// placed on a fixed spacing, skipping ramp sections where the deck runs
/// too close to the ground. A short span may legitimately get no pillars.
pub fn plan_deck<T: TerrainSampler>(
    path: &[Point3],
    span: &BridgeSpan,
    terrain: &T,
    sea_level: f32,
    params: &BridgeParams,
) -> BridgeDeck {
    let points = &path[span.start_index..=span.end_index];

    // Highest standing-water surface under the span
    let max_water = points
        .iter()
        .map(|p| terrain.height_at(p.x, p.z).max(sea_level))
        .fold(f32::MIN, f32::max);
    let deck_height = max_water + params.clearance;

    // Bank heights at the shore points just outside the span; an open-ended
    // span has no bank there and stays at deck height
    let bank_start = if span.start_index > 0 {
        path[span.start_index - 1].y
    } else {
        deck_height
    };
    let bank_end = if span.end_index + 1 < path.len() {
        path[span.end_index + 1].y
    } else {
        deck_height
    };

    // Arc length along the span, per sample
    let mut arc = Vec::with_capacity(points.len());
    let mut total = 0.0f32;
    arc.push(0.0);
    for w in points.windows(2) {
        total += w[0].distance_xz(w[1]);
        arc.push(total);
    }

    let ramp_len = total * params.ramp_fraction;
    let profile: Vec<f32> = arc
        .iter()
        .map(|&s| deck_profile_at(s, total, ramp_len, bank_start, bank_end, deck_height))
        .collect();

    let pillars = place_pillars(points, &arc, &profile, terrain, params);

    BridgeDeck {
        deck_height,
        profile,
        pillars,
    }
}

/// Deck elevation at arc position `s`: bank-to-deck smoothstep ramps at both
/// ends, flat deck in the middle.
fn deck_profile_at(
    s: f32,
    total: f32,
    ramp_len: f32,
    bank_start: f32,
    bank_end: f32,
    deck_height: f32,
) -> f32 {
    if ramp_len <= 0.0 {
        return deck_height;
    }
    if s < ramp_len {
        lerp(bank_start, deck_height, smooth_step(0.0, 1.0, s / ramp_len))
    } else if s > total - ramp_len {
        lerp(bank_end, deck_height, smooth_step(0.0, 1.0, (total - s) / ramp_len))
    } else {
        deck_height
    }
}

/// Place pillars every `pillar_spacing` along the span, starting at the
/// first point, wherever the deck clears the ground by more than the
/// minimum.
fn place_pillars<T: TerrainSampler>(
    points: &[Point3],
    arc: &[f32],
    profile: &[f32],
    terrain: &T,
    params: &BridgeParams,
) -> Vec<Point3> {
    let total = *arc.last().unwrap_or(&0.0);
    let mut pillars = Vec::new();

    let mut s = 0.0f32;
    while s <= total {
        if let Some((pos, deck_h)) = sample_along(points, arc, profile, s) {
            let ground = terrain.height_at(pos.x, pos.z);
            if deck_h - ground > params.min_pillar_clearance {
                pillars.push(Point3::new(pos.x, ground, pos.z));
            }
        }
        s += params.pillar_spacing;
    }

    pillars
}

/// Interpolate position and deck height at arc distance `s` along the span.
fn sample_along(
    points: &[Point3],
    arc: &[f32],
    profile: &[f32],
    s: f32,
) -> Option<(Point3, f32)> {
    if points.is_empty() {
        return None;
    }
    if points.len() == 1 || s <= 0.0 {
        return Some((points[0], profile[0]));
    }

    for i in 1..points.len() {
        if s <= arc[i] {
            let seg = arc[i] - arc[i - 1];
            let t = if seg > 0.0 { (s - arc[i - 1]) / seg } else { 0.0 };
            let a = points[i - 1];
            let b = points[i];
            let pos = Point3::new(lerp(a.x, b.x, t), lerp(a.y, b.y, t), lerp(a.z, b.z, t));
            let deck_h = lerp(profile[i - 1], profile[i], t);
            return Some((pos, deck_h));
        }
    }
    Some((*points.last()?, *profile.last()?))
}
