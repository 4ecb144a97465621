use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::{debug, info};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use super::{Archive, ArchiveProvider};

#[derive(Debug, Clone)]
enum Entry {
    /// Still in the source archive, copied through byte-for-byte on rewrite.
    Original {
        index: usize,
        compression: CompressionMethod,
        is_dir: bool,
    },
    Replaced {
        data: Vec<u8>,
        compression: CompressionMethod,
    },
}

/// A zip-packed map.
///
/// Entries keep their order. A rewrite copies every untouched entry raw, with
/// its timestamps, extra fields and compressed bytes intact, and only encodes
/// the entries that were replaced. Changes reach disk on `compact` or `close`;
/// dropping the container without closing discards them.
#[derive(Debug)]
pub struct ZipContainer {
    path: PathBuf,
    source: Option<ZipArchive<Cursor<Vec<u8>>>>,
    entries: IndexMap<String, Entry>,
    dirty: bool,
}

impl ZipContainer {
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| Error::archive(path.display(), e))?;
        let container = Self::from_bytes(path, data)?;
        debug!(path = %path.display(), entries = container.entries.len(), "opened zip container");
        Ok(container)
    }

    fn from_bytes(path: &Path, data: Vec<u8>) -> Result<Self> {
        let zip_err = |e: ZipError| Error::archive(path.display(), format!("ZIP error: {e}"));
        let mut source = ZipArchive::new(Cursor::new(data)).map_err(zip_err)?;

        let mut entries = IndexMap::with_capacity(source.len());
        for index in 0..source.len() {
            let file = source.by_index_raw(index).map_err(zip_err)?;
            let name = file.name().to_string();
            let entry = Entry::Original {
                index,
                compression: file.compression(),
                is_dir: file.is_dir(),
            };
            entries.insert(name, entry);
        }

        Ok(Self {
            path: path.to_path_buf(),
            source: Some(source),
            entries,
            dirty: false,
        })
    }

    /// An empty container that will be written to `path` on close.
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            source: None,
            entries: IndexMap::new(),
            dirty: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Slot of an entry: exact name first, then case-insensitive with either
    /// path separator. Never matches an entry in a different directory.
    fn resolve(&self, name: &str) -> Option<usize> {
        if let Some(slot) = self.entries.get_index_of(name) {
            return Some(slot);
        }
        let wanted = normalize(name);
        self.entries.keys().position(|key| normalize(key) == wanted)
    }

    fn to_bytes(&mut self) -> Result<Vec<u8>> {
        let path = self.path.display().to_string();
        let zip_err = |e: ZipError| Error::archive(&path, format!("ZIP error: {e}"));
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for (name, entry) in &self.entries {
            match entry {
                Entry::Original { index, .. } => {
                    let source = self
                        .source
                        .as_mut()
                        .ok_or_else(|| Error::archive(&path, "entry without a source archive"))?;
                    let file = source.by_index_raw(*index).map_err(zip_err)?;
                    writer.raw_copy_file(file).map_err(zip_err)?;
                }
                Entry::Replaced { data, compression } => {
                    let options = SimpleFileOptions::default().compression_method(*compression);
                    writer.start_file(name.clone(), options).map_err(zip_err)?;
                    writer.write_all(data).map_err(|e| Error::archive(&path, e))?;
                }
            }
        }
        Ok(writer.finish().map_err(zip_err)?.into_inner())
    }

    /// Write to a sibling file, move it over the original, then reload so
    /// every entry is original again.
    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let bytes = self.to_bytes()?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = self.path.with_file_name(format!(".{file_name}.partial"));
        fs::write(&staging, &bytes).map_err(|e| Error::archive(staging.display(), e))?;
        fs::rename(&staging, &self.path).map_err(|e| Error::archive(self.path.display(), e))?;

        info!(path = %self.path.display(), bytes = bytes.len(), "wrote zip container");
        let path = self.path.clone();
        *self = Self::from_bytes(&path, bytes)?;
        Ok(())
    }
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/").to_ascii_lowercase()
}

/// Methods the writer can always produce. Anything else is rewritten deflated.
fn writable(method: CompressionMethod) -> CompressionMethod {
    match method {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    }
}

impl Archive for ZipContainer {
    fn has(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    fn extract(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let Some((key, entry)) = self.resolve(name).and_then(|slot| self.entries.get_index(slot)) else {
            return Ok(None);
        };
        match entry {
            Entry::Replaced { data, .. } => Ok(Some(data.clone())),
            Entry::Original { is_dir: true, .. } => Ok(None),
            Entry::Original { index, .. } => {
                let context = format!("{}:{key}", self.path.display());
                let source = self
                    .source
                    .as_mut()
                    .ok_or_else(|| Error::archive(&context, "entry without a source archive"))?;
                let mut file = source
                    .by_index(*index)
                    .map_err(|e| Error::archive(&context, format!("ZIP error: {e}")))?;
                let mut data = Vec::new();
                file.read_to_end(&mut data).map_err(|e| Error::archive(&context, e))?;
                Ok(Some(data))
            }
        }
    }

    fn replace(&mut self, name: &str, data: &[u8]) -> Result<()> {
        match self.resolve(name) {
            Some(slot) => {
                let compression = match &self.entries[slot] {
                    Entry::Original { compression, .. } | Entry::Replaced { compression, .. } => {
                        writable(*compression)
                    }
                };
                self.entries[slot] = Entry::Replaced { data: data.to_vec(), compression };
            }
            None => {
                self.entries.insert(
                    name.to_string(),
                    Entry::Replaced {
                        data: data.to_vec(),
                        compression: CompressionMethod::Deflated,
                    },
                );
            }
        }
        debug!(name, bytes = data.len(), "replaced entry");
        self.dirty = true;
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        self.flush()
    }

    fn close(mut self) -> Result<()> {
        self.flush()
    }
}

/// Opens zip-packed maps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipProvider;

impl ArchiveProvider for ZipProvider {
    type Archive = ZipContainer;

    fn open(&self, path: &Path) -> Result<ZipContainer> {
        ZipContainer::open(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zip::DateTime;

    fn build(path: &Path, entries: &[(&str, &[u8], CompressionMethod)]) {
        let stamp = DateTime::from_date_and_time(2015, 3, 14, 9, 26, 52).unwrap();
        let file = fs::File::create(path).unwrap();
        let mut writer = ZipWriter::new(file);
        for (name, data, method) in entries {
            let options = SimpleFileOptions::default()
                .compression_method(*method)
                .last_modified_time(stamp);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    /// Compressed bytes, CRC and timestamp of an entry as stored on disk.
    fn raw_entry(path: &Path, name: &str) -> (Vec<u8>, u32, String) {
        let mut archive = ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        let index = archive.index_for_name(name).unwrap();
        let mut file = archive.by_index_raw(index).unwrap();
        let mut raw = Vec::new();
        file.read_to_end(&mut raw).unwrap();
        (raw, file.crc32(), format!("{:?}", file.last_modified()))
    }

    #[test]
    fn test_extract_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.SC2Map");
        build(&path, &[
            ("Objects", b"<PlacedObjects/>", CompressionMethod::Deflated),
            ("Base.SC2Data/GameData/UnitData.xml", b"<Catalog/>", CompressionMethod::Stored),
        ]);

        let mut container = ZipProvider.open(&path).unwrap();
        assert!(container.has("Objects"));
        assert!(container.has("objects"));
        assert!(container.has("Base.SC2Data\\GameData\\UnitData.xml"));
        assert!(!container.has("UnitData.xml"));
        assert!(!container.has("t3HeightMap"));
        assert_eq!(container.extract("Objects").unwrap().as_deref(), Some(&b"<PlacedObjects/>"[..]));
        assert_eq!(container.extract("UnitData.xml").unwrap(), None);
        assert_eq!(container.extract("Missing").unwrap(), None);
        container.close().unwrap();
    }

    #[test]
    fn test_nested_entry_is_not_the_top_level_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.SC2Map");
        let nested = "enUS.SC2Data/LocalizedData/Objects";
        build(&path, &[(nested, b"<Other Keep=\"1\"/>", CompressionMethod::Deflated)]);

        let mut container = ZipProvider.open(&path).unwrap();
        assert!(!container.has("Objects"));
        assert_eq!(container.extract("Objects").unwrap(), None);
        container.replace("Objects", b"<PlacedObjects/>").unwrap();
        container.close().unwrap();

        let mut reopened = ZipContainer::open(&path).unwrap();
        let names: Vec<&str> = reopened.names().collect();
        assert_eq!(names, [nested, "Objects"]);
        assert_eq!(reopened.extract(nested).unwrap().unwrap(), b"<Other Keep=\"1\"/>");
        assert_eq!(reopened.extract("Objects").unwrap().unwrap(), b"<PlacedObjects/>");
    }

    #[test]
    fn test_replace_preserves_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.SC2Map");
        build(&path, &[
            ("MapScript.galaxy", b"void main() {}", CompressionMethod::Stored),
            ("Objects", b"old", CompressionMethod::Deflated),
            ("MapInfo", &[7u8; 300], CompressionMethod::Deflated),
        ]);
        let script_before = raw_entry(&path, "MapScript.galaxy");
        let info_before = raw_entry(&path, "MapInfo");

        let mut container = ZipProvider.open(&path).unwrap();
        container.replace("objects", b"new objects").unwrap();
        container.replace("Upgrades", b"<Upgrades/>").unwrap();
        container.compact().unwrap();
        assert_eq!(container.extract("Objects").unwrap().unwrap(), b"new objects");
        container.close().unwrap();

        let mut reopened = ZipContainer::open(&path).unwrap();
        let names: Vec<&str> = reopened.names().collect();
        assert_eq!(names, ["MapScript.galaxy", "Objects", "MapInfo", "Upgrades"]);
        assert_eq!(reopened.extract("Objects").unwrap().unwrap(), b"new objects");
        assert_eq!(reopened.extract("MapScript.galaxy").unwrap().unwrap(), b"void main() {}");

        assert_eq!(raw_entry(&path, "MapScript.galaxy"), script_before);
        assert_eq!(raw_entry(&path, "MapInfo"), info_before);

        let mut raw = ZipArchive::new(fs::File::open(&path).unwrap()).unwrap();
        assert_eq!(raw.by_name("MapScript.galaxy").unwrap().compression(), CompressionMethod::Stored);
        assert_eq!(raw.by_name("Objects").unwrap().compression(), CompressionMethod::Deflated);
        assert!(!dir.path().join(".map.SC2Map.partial").exists());
    }

    #[test]
    fn test_drop_without_close_discards_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.SC2Map");
        build(&path, &[("Objects", b"old", CompressionMethod::Deflated)]);

        {
            let mut container = ZipContainer::open(&path).unwrap();
            container.replace("Objects", b"new").unwrap();
        }
        let mut reopened = ZipContainer::open(&path).unwrap();
        assert_eq!(reopened.extract("Objects").unwrap().unwrap(), b"old");
    }

    #[test]
    fn test_open_failures() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.SC2Map");
        assert!(matches!(ZipContainer::open(&missing), Err(Error::ArchiveIo(_))));

        let garbage = dir.path().join("garbage.SC2Map");
        fs::write(&garbage, b"definitely not a zip").unwrap();
        assert!(matches!(ZipContainer::open(&garbage), Err(Error::ArchiveIo(_))));
    }
}
