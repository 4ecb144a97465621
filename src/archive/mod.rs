//! Capability surface of the packed map container.
//!
//! The editor never touches the container format itself; it opens an
//! [`Archive`] through an [`ArchiveProvider`], extracts and replaces named
//! entries, then compacts and closes it. [`ZipProvider`] is the bundled
//! backend for zip-packed maps; other backends (MPQ bindings, test doubles)
//! implement the same two traits.

use std::path::Path;

use crate::error::Result;

pub mod zip_container;

pub use zip_container::{ZipContainer, ZipProvider};

/// Object list entry.
pub const OBJECTS: &str = "Objects";
/// Binary height map entry.
pub const HEIGHT_MAP: &str = "t3HeightMap";
/// Binary walkability map entry.
pub const PATHING_MAP: &str = "PathingMap";
/// Granted upgrades entry.
pub const UPGRADES: &str = "Upgrades";

/// An open container.
pub trait Archive {
    fn has(&self, name: &str) -> bool;

    /// Contents of an entry, `None` if it does not exist.
    fn extract(&mut self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Replace an entry, adding it if missing. Other entries are not touched.
    fn replace(&mut self, name: &str, data: &[u8]) -> Result<()>;

    /// Flush pending replacements and reclaim unused space.
    fn compact(&mut self) -> Result<()>;

    /// Flush anything still pending and release the container.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Opens containers by path.
pub trait ArchiveProvider {
    type Archive: Archive;

    fn open(&self, path: &Path) -> Result<Self::Archive>;
}
