//! Map-level operations: read terrain and units out of a map, and write an
//! edited copy.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rand::Rng;
use sc2_terrain::{decode_height, decode_walkability, TerrainAnalyzer};
use tracing::{info, warn};

use crate::archive::{Archive, ArchiveProvider, ZipProvider, HEIGHT_MAP, OBJECTS, PATHING_MAP, UPGRADES};
use crate::edit::{apply_with, validate_positions_with, EditReport, SceneConfig};
use crate::error::{Error, Result};
use crate::objects::{encode_upgrades, ObjectList, PlacedRecord};

/// Reads and edits maps through an [`ArchiveProvider`].
#[derive(Debug, Clone, Default)]
pub struct MapEditor<P = ZipProvider> {
    provider: P,
}

impl MapEditor<ZipProvider> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: ArchiveProvider> MapEditor<P> {
    pub fn with_provider(provider: P) -> Self {
        Self { provider }
    }

    fn open(&self, path: &Path) -> Result<P::Archive> {
        if !path.exists() {
            return Err(Error::MissingSource(path.display().to_string()));
        }
        self.provider.open(path)
    }

    pub fn analyze_terrain(&self, path: &Path) -> Result<TerrainAnalyzer> {
        let mut archive = self.open(path)?;
        let terrain = load_terrain(&mut archive)?;
        archive.close()?;
        Ok(terrain)
    }

    pub fn read_objects(&self, path: &Path) -> Result<ObjectList> {
        let mut archive = self.open(path)?;
        let objects = load_objects(&mut archive)?;
        archive.close()?;
        Ok(objects)
    }

    /// Write a copy of `source` to `dest` with its units rearranged to match
    /// `scene`. The source is never modified.
    pub fn edit_map(&self, source: &Path, dest: &Path, scene: &SceneConfig) -> Result<EditReport> {
        self.edit_map_with(&mut rand::thread_rng(), source, dest, scene)
    }

    pub fn edit_map_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        source: &Path,
        dest: &Path,
        scene: &SceneConfig,
    ) -> Result<EditReport> {
        if !source.exists() {
            return Err(Error::MissingSource(source.display().to_string()));
        }
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::archive(parent.display(), e))?;
        }
        fs::copy(source, dest).map_err(|e| Error::archive(format!("copy to {}", dest.display()), e))?;

        let mut archive = self.provider.open(dest)?;
        let terrain = load_terrain(&mut archive)?;
        let objects = load_objects(&mut archive)?;

        let mut scene = scene.clone();
        let relocated = scene.validate_positions_with(rng, &terrain);
        if relocated > 0 {
            info!(relocated, "moved scene positions off unwalkable terrain");
        }

        let request = scene.to_request();
        let mut report = apply_with(rng, &objects.records, &request, &terrain);
        validate_positions_with(rng, report.added_records_mut(), &terrain);

        let list = ObjectList {
            root: objects.root,
            records: report.records.clone(),
        };
        archive.replace(OBJECTS, &list.encode())?;
        if !scene.upgrades.is_empty() {
            archive.replace(UPGRADES, &encode_upgrades(&scene.upgrades))?;
        }
        archive.compact()?;
        archive.close()?;

        let (p1, p2) = scene.unit_totals();
        info!(
            dest = %dest.display(),
            removed = report.removed,
            replaced = report.replaced,
            added = report.added,
            player1 = p1,
            player2 = p2,
            "edited map"
        );
        Ok(report)
    }
}

/// Build an analyzer from the height and pathing entries. A missing or
/// undecodable entry is logged and left out.
pub fn load_terrain<A: Archive>(archive: &mut A) -> Result<TerrainAnalyzer> {
    let height = match archive.extract(HEIGHT_MAP)? {
        Some(bytes) => decode_height(&bytes)
            .map_err(|e| warn!("ignoring height map: {e}"))
            .ok(),
        None => {
            warn!("map has no {HEIGHT_MAP}, heights default to 0");
            None
        }
    };
    let walkability = match archive.extract(PATHING_MAP)? {
        Some(bytes) => decode_walkability(&bytes)
            .map_err(|e| warn!("ignoring pathing map: {e}"))
            .ok(),
        None => {
            warn!("map has no {PATHING_MAP}, everything is walkable");
            None
        }
    };
    Ok(TerrainAnalyzer::new(height, walkability))
}

/// Decode the object list. A map without one has no objects.
pub fn load_objects<A: Archive>(archive: &mut A) -> Result<ObjectList> {
    match archive.extract(OBJECTS)? {
        Some(bytes) => ObjectList::decode(&bytes),
        None => Ok(ObjectList::default()),
    }
}

/// Unit count per (player, unit type).
pub fn unit_census(records: &[PlacedRecord]) -> BTreeMap<(u32, String), usize> {
    let mut census = BTreeMap::new();
    for unit in records.iter().filter_map(PlacedRecord::as_unit) {
        *census.entry((unit.player, unit.unit_type.clone())).or_insert(0) += 1;
    }
    census
}
