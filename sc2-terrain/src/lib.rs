//! Terrain data for SC2 map editing
//!
//! Modules:
//! 1. `grid` - Decodes the binary height and walkability maps
//! 2. `analyzer` - Height/walkability queries, summary statistics and the
//!    safe-placement search used when positioning units
//!
//! With the `preview` feature, `preview` renders a height grid to an image.

mod error;
mod reader;
pub mod grid;
pub mod analyzer;
#[cfg(feature = "preview")]
pub mod preview;

pub use error::{DecodeError, TerrainFormat};
pub use grid::{
    HeightGrid, WalkabilityGrid, HEADER_SIZE,
    decode_height, decode_walkability, encode_height, encode_walkability,
};
pub use analyzer::{
    TerrainAnalyzer, TerrainSummary, TerrainClass, Position, Placement, PlacementTier,
    BoundBox, SlopeMap, clamp_world, WORLD_MAX, MAX_SLOPE, ATTEMPTS_PER_POSITION,
};
#[cfg(feature = "preview")]
pub use preview::height_preview;
