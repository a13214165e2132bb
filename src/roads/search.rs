//! Grid A* search for road routing.
//!
//! Searches a uniform 2D grid laid over the terrain (independent of the
//! heightmap's own resolution) with a cost model that prefers flat, dry
//! ground. The open set is a hand-rolled binary min-heap with a key-to-slot
//! map so that priority updates on relaxation are O(log n) instead of a
//! linear scan; the search is capped and falls back to a straight line
//! rather than failing.

use std::collections::{HashMap, HashSet};

use crate::geom::{Point2, Point3};
use crate::heightmap::TerrainSampler;
use crate::roads::RoadParams;

/// A pathfinding grid cell. Independent of the heightmap grid: the cell size
/// is `RoadParams::grid_resolution`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridKey {
    pub ix: i32,
    pub iz: i32,
}

impl GridKey {
    fn of(p: Point2, cell: f32) -> Self {
        Self {
            ix: (p.x / cell).floor() as i32,
            iz: (p.z / cell).floor() as i32,
        }
    }

    fn center(&self, cell: f32) -> Point2 {
        Point2::new(
            (self.ix as f32 + 0.5) * cell,
            (self.iz as f32 + 0.5) * cell,
        )
    }
}

// =============================================================================
// INDEXED BINARY MIN-HEAP
// =============================================================================

/// Binary min-heap over grid keys ordered by f-score, with an auxiliary
/// key-to-slot map so `push_or_decrease` can re-sift an existing entry
/// instead of scanning for it.
struct IndexedHeap {
    entries: Vec<(GridKey, f32)>,
    slots: HashMap<GridKey, usize>,
}

impl IndexedHeap {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            slots: HashMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a key, or lower its priority if it is already queued with a
    /// higher f-score. Increases are ignored.
    fn push_or_decrease(&mut self, key: GridKey, f_score: f32) {
        if let Some(&slot) = self.slots.get(&key) {
            if f_score < self.entries[slot].1 {
                self.entries[slot].1 = f_score;
                self.sift_up(slot);
            }
            return;
        }
        self.entries.push((key, f_score));
        let slot = self.entries.len() - 1;
        self.slots.insert(key, slot);
        self.sift_up(slot);
    }

    /// Remove and return the entry with the lowest f-score.
    fn pop(&mut self) -> Option<(GridKey, f32)> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.swap(0, last);
        let (key, f_score) = self.entries.pop()?;
        self.slots.remove(&key);
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some((key, f_score))
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.entries.swap(a, b);
        self.slots.insert(self.entries[a].0, a);
        self.slots.insert(self.entries[b].0, b);
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.entries[slot].1 >= self.entries[parent].1 {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        loop {
            let left = slot * 2 + 1;
            let right = slot * 2 + 2;
            let mut smallest = slot;
            if left < self.entries.len() && self.entries[left].1 < self.entries[smallest].1 {
                smallest = left;
            }
            if right < self.entries.len() && self.entries[right].1 < self.entries[smallest].1 {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }
}

// =============================================================================
// COST MODEL
// =============================================================================

/// Terrain properties of a grid cell, sampled once per request at the cell
/// center and memoized.
#[derive(Clone, Copy)]
struct CellSample {
    height: f32,
    slope: f32,
    in_lake: bool,
}

/// Per-request sampler cache; search state never outlives a single call.
struct CellCache<'a, T: TerrainSampler> {
    terrain: &'a T,
    cell: f32,
    samples: HashMap<GridKey, CellSample>,
}

impl<'a, T: TerrainSampler> CellCache<'a, T> {
    fn new(terrain: &'a T, cell: f32) -> Self {
        Self {
            terrain,
            cell,
            samples: HashMap::new(),
        }
    }

    fn get(&mut self, key: GridKey) -> CellSample {
        let cell = self.cell;
        let terrain = self.terrain;
        *self.samples.entry(key).or_insert_with(|| {
            let c = key.center(cell);
            CellSample {
                height: terrain.height_at(c.x, c.z),
                slope: terrain.slope_at(c.x, c.z),
                in_lake: terrain.is_in_lake(c.x, c.z),
            }
        })
    }
}

/// Cost of stepping into a cell, on top of the travel distance.
fn entry_penalty(sample: CellSample, params: &RoadParams, step_cost: f32) -> f32 {
    let over_water = sample.height < params.sea_level || sample.in_lake;
    if over_water {
        return if params.allow_bridges {
            params.bridge_cost
        } else {
            params.water_cost
        };
    }

    let slope_deg = sample.slope.atan().to_degrees();
    if slope_deg > params.max_gradient_deg {
        step_cost * (slope_deg / 45.0) * params.slope_cost_factor
    } else {
        0.0
    }
}

// =============================================================================
// SEARCH
// =============================================================================

/// Axis-aligned corridor around the straight line between the endpoints.
/// Cells whose centers fall outside are never expanded, which bounds the
/// node count on very large worlds.
struct Corridor {
    min_x: f32,
    min_z: f32,
    max_x: f32,
    max_z: f32,
}

impl Corridor {
    fn new(start: Point2, end: Point2, params: &RoadParams) -> Self {
        let half_width = (start.distance(end) * params.corridor_multiplier)
            .max(params.corridor_floor);
        Self {
            min_x: start.x.min(end.x) - half_width,
            min_z: start.z.min(end.z) - half_width,
            max_x: start.x.max(end.x) + half_width,
            max_z: start.z.max(end.z) + half_width,
        }
    }

    fn contains(&self, p: Point2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.z >= self.min_z && p.z <= self.max_z
    }
}

const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Find a road path between two world points.
///
/// Returns a world-space polyline whose first and last points are exactly
/// the requested endpoints; interior points are search-cell centers with
/// terrain-sampled heights. If the search exhausts its iteration budget or
/// the open set empties without reaching the goal, the result degrades to
/// the two-point straight line - never an error.
pub fn find_path<T: TerrainSampler>(
    start: Point2,
    end: Point2,
    terrain: &T,
    params: &RoadParams,
) -> Vec<Point3> {
    let keys = search_grid(start, end, terrain, params);
    build_polyline(start, end, keys, terrain, params)
}

/// Core A* over grid keys. `None` means the caller should fall back to a
/// straight line.
fn search_grid<T: TerrainSampler>(
    start: Point2,
    end: Point2,
    terrain: &T,
    params: &RoadParams,
) -> Option<Vec<GridKey>> {
    let cell = params.grid_resolution;
    let start_key = GridKey::of(start, cell);
    let goal_key = GridKey::of(end, cell);
    if start_key == goal_key {
        return Some(vec![start_key]);
    }

    let corridor = Corridor::new(start, end, params);
    let mut cache = CellCache::new(terrain, cell);

    let mut open = IndexedHeap::new();
    let mut closed: HashSet<GridKey> = HashSet::new();
    let mut came_from: HashMap<GridKey, GridKey> = HashMap::new();
    let mut g_score: HashMap<GridKey, f32> = HashMap::new();

    g_score.insert(start_key, 0.0);
    open.push_or_decrease(start_key, start_key.center(cell).distance(end));

    let mut iterations = 0usize;
    while let Some((current, _)) = open.pop() {
        iterations += 1;
        if iterations > params.max_iterations {
            return None;
        }
        if current == goal_key {
            return Some(reconstruct(came_from, current));
        }
        if !closed.insert(current) {
            continue;
        }

        let current_g = g_score.get(&current).copied().unwrap_or(f32::INFINITY);

        for (dx, dz) in NEIGHBOR_OFFSETS {
            let neighbor = GridKey {
                ix: current.ix + dx,
                iz: current.iz + dz,
            };
            if closed.contains(&neighbor) {
                continue;
            }
            let center = neighbor.center(cell);
            if !corridor.contains(center) {
                continue;
            }

            let step_cost = if dx != 0 && dz != 0 {
                cell * std::f32::consts::SQRT_2
            } else {
                cell
            };
            let sample = cache.get(neighbor);
            let tentative = current_g + step_cost + entry_penalty(sample, params, step_cost);

            let best = g_score.get(&neighbor).copied().unwrap_or(f32::INFINITY);
            if tentative < best {
                came_from.insert(neighbor, current);
                g_score.insert(neighbor, tentative);
                open.push_or_decrease(neighbor, tentative + center.distance(end));
            }
        }
    }

    // Open set exhausted without reaching the goal
    None
}

fn reconstruct(came_from: HashMap<GridKey, GridKey>, goal: GridKey) -> Vec<GridKey> {
    let mut keys = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        keys.push(prev);
        current = prev;
    }
    keys.reverse();
    keys
}

/// Convert grid keys to a world polyline, snapping the ends to the exact
/// requested endpoints so the road does not show grid quantization there.
fn build_polyline<T: TerrainSampler>(
    start: Point2,
    end: Point2,
    keys: Option<Vec<GridKey>>,
    terrain: &T,
    params: &RoadParams,
) -> Vec<Point3> {
    let mut path = Vec::new();
    path.push(Point3::new(start.x, terrain.height_at(start.x, start.z), start.z));

    if let Some(keys) = keys {
        for key in keys.iter().skip(1).take(keys.len().saturating_sub(2)) {
            let c = key.center(params.grid_resolution);
            path.push(Point3::new(c.x, terrain.height_at(c.x, c.z), c.z));
        }
    }

    path.push(Point3::new(end.x, terrain.height_at(end.x, end.z), end.z));
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::Heightmap;

    fn flat_terrain() -> Heightmap {
        Heightmap::new_flat(4000.0, 16, 0.0, 10.0)
    }

    fn test_params() -> RoadParams {
        RoadParams::default()
    }

    #[test]
    fn test_heap_pops_in_priority_order() {
        let mut heap = IndexedHeap::new();
        let keys: Vec<GridKey> = (0..8).map(|i| GridKey { ix: i, iz: 0 }).collect();
        let scores = [5.0, 1.0, 9.0, 3.0, 7.0, 2.0, 8.0, 4.0];
        for (key, &f) in keys.iter().zip(&scores) {
            heap.push_or_decrease(*key, f);
        }

        let mut popped = Vec::new();
        while let Some((_, f)) = heap.pop() {
            popped.push(f);
        }
        let mut sorted = scores.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(popped, sorted);
    }

    #[test]
    fn test_heap_decrease_key_reorders() {
        let mut heap = IndexedHeap::new();
        let a = GridKey { ix: 0, iz: 0 };
        let b = GridKey { ix: 1, iz: 0 };
        heap.push_or_decrease(a, 10.0);
        heap.push_or_decrease(b, 5.0);

        // Lower a below b; a must come out first with the new score.
        heap.push_or_decrease(a, 1.0);
        assert_eq!(heap.pop(), Some((a, 1.0)));
        assert_eq!(heap.pop(), Some((b, 5.0)));
        assert!(heap.is_empty());

        // An "increase" must be ignored.
        heap.push_or_decrease(a, 2.0);
        heap.push_or_decrease(a, 100.0);
        assert_eq!(heap.pop(), Some((a, 2.0)));
    }

    #[test]
    fn test_path_endpoints_are_exact() {
        let hm = flat_terrain();
        let start = Point2::new(-903.7, -411.2);
        let end = Point2::new(887.3, 592.8);
        let path = find_path(start, end, &hm, &test_params());

        assert!(path.len() >= 2);
        assert_eq!(path[0].ground(), start);
        assert_eq!(path.last().unwrap().ground(), end);
    }

    #[test]
    fn test_fallback_on_tiny_iteration_cap() {
        let hm = flat_terrain();
        let params = RoadParams {
            max_iterations: 1,
            ..test_params()
        };
        let start = Point2::new(-900.0, 0.0);
        let end = Point2::new(900.0, 350.0);
        let path = find_path(start, end, &hm, &params);

        // Exactly the two endpoints; no partial path leaks out.
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].ground(), start);
        assert_eq!(path[1].ground(), end);
    }

    #[test]
    fn test_matches_dijkstra_on_distance_only_cost() {
        // Flat dry terrain: no water or slope penalties, so path cost is pure
        // travel distance and A* must match a brute-force Dijkstra.
        let hm = flat_terrain();
        // Small corridor keeps the brute-force reference tractable; both
        // searches see the same cell set.
        let params = RoadParams {
            grid_resolution: 100.0,
            corridor_floor: 300.0,
            ..test_params()
        };
        let start = Point2::new(-750.0, -450.0);
        let end = Point2::new(650.0, 550.0);

        let keys = search_grid(start, end, &hm, &params).expect("solvable grid");
        let a_star_cost = path_cost(&keys, params.grid_resolution);
        let dijkstra_cost = brute_force_dijkstra(start, end, &params);

        assert!(
            (a_star_cost - dijkstra_cost).abs() < 1e-2,
            "A* cost {a_star_cost} differs from Dijkstra cost {dijkstra_cost}"
        );
    }

    fn path_cost(keys: &[GridKey], cell: f32) -> f32 {
        keys.windows(2)
            .map(|w| w[0].center(cell).distance(w[1].center(cell)))
            .sum()
    }

    /// Naive Dijkstra over the same corridor-constrained cells, linear-scan
    /// priority selection. Only usable on tiny test grids.
    fn brute_force_dijkstra(start: Point2, end: Point2, params: &RoadParams) -> f32 {
        let cell = params.grid_resolution;
        let start_key = GridKey::of(start, cell);
        let goal_key = GridKey::of(end, cell);
        let corridor = Corridor::new(start, end, params);

        let mut dist: HashMap<GridKey, f32> = HashMap::new();
        let mut done: HashSet<GridKey> = HashSet::new();
        dist.insert(start_key, 0.0);

        loop {
            let Some((&current, &d)) = dist
                .iter()
                .filter(|(k, _)| !done.contains(k))
                .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            else {
                panic!("Dijkstra exhausted without reaching goal");
            };
            if current == goal_key {
                return d;
            }
            done.insert(current);

            for (dx, dz) in NEIGHBOR_OFFSETS {
                let neighbor = GridKey {
                    ix: current.ix + dx,
                    iz: current.iz + dz,
                };
                if done.contains(&neighbor) || !corridor.contains(neighbor.center(cell)) {
                    continue;
                }
                let step = if dx != 0 && dz != 0 {
                    cell * std::f32::consts::SQRT_2
                } else {
                    cell
                };
                let nd = d + step;
                if nd < dist.get(&neighbor).copied().unwrap_or(f32::INFINITY) {
                    dist.insert(neighbor, nd);
                }
            }
        }
    }

    #[test]
    fn test_unbridged_water_is_avoided_when_possible() {
        // A below-sea channel splits the map; with bridges off and a dry
        // gap in the channel, the path must detour through the gap.
        let mut hm = Heightmap::new_flat(4000.0, 40, 0.0, 10.0);
        let res = hm.res;
        for iz in 0..=res {
            // Channel along x ~ 0, with a gap near the north edge.
            if iz > 4 {
                for ix in 19..=21 {
                    hm.set_grid_height(ix, iz, -6.0);
                }
            }
        }
        let params = RoadParams {
            allow_bridges: false,
            grid_resolution: 100.0,
            ..test_params()
        };
        let start = Point2::new(-800.0, 800.0);
        let end = Point2::new(800.0, 800.0);
        let path = find_path(start, end, &hm, &params);

        for p in &path {
            assert!(
                hm.sample_height(p.x, p.z) >= 0.0,
                "path crossed water at ({}, {}) despite bridges being disallowed",
                p.x,
                p.z
            );
        }
    }
}
