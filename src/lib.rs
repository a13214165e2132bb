//! Island world generation library
//!
//! Deterministic synthesis of an island world surface (heightmap, rivers,
//! terrain regions) and a road network planned over it with automatic
//! bridge placement. Re-exports modules for use by the orchestrator binary
//! and external consumers.

pub mod export;
pub mod geom;
pub mod heightmap;
pub mod regions;
pub mod rivers;
pub mod roads;
pub mod seeds;
pub mod water;
pub mod world;
