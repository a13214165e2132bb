//! Seed management for world generation
//!
//! Provides separate seeds for each generation system, allowing fine-grained control
//! over which aspects of world generation to vary or keep constant.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Seeds for all world generation systems.
///
/// Each system gets its own seed, derived from a master seed by default.
/// Individual seeds can be overridden for experimentation.
#[derive(Clone, Copy, Debug)]
pub struct WorldSeeds {
    /// Master seed (used for display/reference)
    pub master: u64,
    /// Heightmap synthesis (base terrain, archipelago mask, ridges)
    pub heightmap: u64,
    /// River network generation (source sampling, trace order)
    pub rivers: u64,
    /// Road planning (waypoint selection for fallback endpoints)
    pub roads: u64,
}

impl WorldSeeds {
    /// Create seeds from a master seed, deriving all sub-seeds deterministically.
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            heightmap: derive_seed(master, "heightmap"),
            rivers: derive_seed(master, "rivers"),
            roads: derive_seed(master, "roads"),
        }
    }

    /// Create a builder for customizing individual seeds
    pub fn builder(master: u64) -> WorldSeedsBuilder {
        WorldSeedsBuilder::new(master)
    }
}

impl Default for WorldSeeds {
    fn default() -> Self {
        Self::from_master(rand::random())
    }
}

/// Builder for customizing individual seeds while deriving others from master
pub struct WorldSeedsBuilder {
    seeds: WorldSeeds,
}

impl WorldSeedsBuilder {
    pub fn new(master: u64) -> Self {
        Self {
            seeds: WorldSeeds::from_master(master),
        }
    }

    /// Override the heightmap seed
    pub fn heightmap(mut self, seed: u64) -> Self {
        self.seeds.heightmap = seed;
        self
    }

    /// Override the rivers seed
    pub fn rivers(mut self, seed: u64) -> Self {
        self.seeds.rivers = seed;
        self
    }

    /// Override the roads seed
    pub fn roads(mut self, seed: u64) -> Self {
        self.seeds.roads = seed;
        self
    }

    /// Build the final WorldSeeds
    pub fn build(self) -> WorldSeeds {
        self.seeds
    }
}

/// Derive a sub-seed from a master seed and a system name.
/// Uses hashing to ensure different systems get different but deterministic seeds.
fn derive_seed(master: u64, system: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    system.hash(&mut hasher);
    hasher.finish()
}

impl std::fmt::Display for WorldSeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WorldSeeds {{ master: {}, heightmap: {}, rivers: {}, roads: {} }}",
            self.master, self.heightmap, self.rivers, self.roads,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_derivation() {
        let seeds1 = WorldSeeds::from_master(12345);
        let seeds2 = WorldSeeds::from_master(12345);

        assert_eq!(seeds1.heightmap, seeds2.heightmap);
        assert_eq!(seeds1.rivers, seeds2.rivers);
        assert_eq!(seeds1.roads, seeds2.roads);
    }

    #[test]
    fn test_different_systems_get_different_seeds() {
        let seeds = WorldSeeds::from_master(12345);

        assert_ne!(seeds.heightmap, seeds.rivers);
        assert_ne!(seeds.rivers, seeds.roads);
    }

    #[test]
    fn test_builder_override() {
        let seeds = WorldSeeds::builder(12345).rivers(99999).build();

        assert_eq!(seeds.rivers, 99999);

        let default_seeds = WorldSeeds::from_master(12345);
        assert_eq!(seeds.heightmap, default_seeds.heightmap);
        assert_eq!(seeds.roads, default_seeds.roads);
    }
}
