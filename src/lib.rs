//! SC2 map unit editor
//!
//! Reads the terrain and placed objects out of a StarCraft II map container,
//! rearranges units according to a scene description, and writes the result
//! to a copy of the map.

pub mod archive;
pub mod edit;
pub mod editor;
pub mod error;
pub mod objects;
pub use sc2_terrain as terrain;

pub use error::{Error, Result};
pub use archive::{Archive, ArchiveProvider, ZipContainer, ZipProvider};
pub use edit::{
    apply, apply_with, correct_position, validate_positions, validate_positions_with,
    Addition, BasePosition, EditReport, IdAllocator, ModificationRequest,
    SceneConfig, UnitSpec,
};
pub use editor::{load_objects, load_terrain, unit_census, MapEditor};
pub use objects::{
    Element, LegacySchema, ObjectList, OpaqueRecord, PlacedRecord, Scale,
    UnitRecord, UpgradeGrant,
};
pub use terrain::{
    DecodeError, HeightGrid, Placement, PlacementTier, Position, TerrainAnalyzer,
    TerrainSummary, WalkabilityGrid,
};
