//! Read-only view of every cached skin list.
//!
//! The catalog is rebuilt from disk on each load. It never checks TTLs and
//! never touches the network; whatever the last refresh wrote is served.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cache::{CacheRecord, RECORD_EXTENSION};
use crate::models::SkinRecord;

/// File name prefix of per-hero skin records.
pub const SKINS_FILE_PREFIX: &str = "skins_";

/// All skin records found in the cache directory.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub records: Vec<SkinRecord>,
    pub files_read: usize,
    pub files_skipped: usize,
}

impl CatalogSnapshot {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records for a hero, matched case-insensitively on the whole name.
    pub fn find_by_character(&self, name: &str) -> Vec<&SkinRecord> {
        let wanted = name.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.name.to_lowercase() == wanted)
            .collect()
    }

    /// First record with exactly this skin ID.
    pub fn find_by_skin_id(&self, skin_id: &str) -> Option<&SkinRecord> {
        self.records.iter().find(|r| r.skinid == skin_id)
    }

    /// Records whose skin name contains `fragment`, ignoring case.
    pub fn find_by_skin_name(&self, fragment: &str) -> Vec<&SkinRecord> {
        let wanted = fragment.to_lowercase();
        self.records
            .iter()
            .filter(|r| r.skin_name.to_lowercase().contains(&wanted))
            .collect()
    }

    /// Number of distinct heroes in the snapshot.
    pub fn hero_count(&self) -> usize {
        let mut names: Vec<&str> = self.records.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names.len()
    }
}

/// Loads the catalog from a cache directory.
#[derive(Debug, Clone)]
pub struct CatalogReader {
    cache_dir: PathBuf,
}

impl CatalogReader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn is_skins_file(path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        name.starts_with(SKINS_FILE_PREFIX)
            && path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
    }

    fn read_file(path: &Path) -> Option<Vec<SkinRecord>> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Error reading {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<CacheRecord<Vec<SkinRecord>>>(&content) {
            Ok(record) => Some(record.payload),
            Err(e) => {
                warn!("Skipping malformed cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Read every `skins_*.json` file, in directory order.
    ///
    /// Unreadable or malformed files are skipped and counted. A missing
    /// directory yields an empty snapshot.
    pub fn load_all(&self) -> CatalogSnapshot {
        let mut snapshot = CatalogSnapshot::default();

        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cache directory {} unavailable: {}", self.cache_dir.display(), e);
                return snapshot;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !Self::is_skins_file(&path) {
                continue;
            }
            match Self::read_file(&path) {
                Some(records) => {
                    snapshot.files_read += 1;
                    snapshot.records.extend(records);
                }
                None => snapshot.files_skipped += 1,
            }
        }

        debug!(
            "Loaded {} skin records from {} files ({} skipped)",
            snapshot.records.len(),
            snapshot.files_read,
            snapshot.files_skipped
        );
        snapshot
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let reader = CatalogReader::new(dir.path().join("nope"));
        let snapshot = reader.load_all();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.files_read, 0);
        assert_eq!(snapshot.files_skipped, 0);
    }

    #[test]
    fn test_load_all_concatenates_skin_files() {
        let dir = tempdir().unwrap();
        write_groot_and_iron_man(dir.path());
        // Not a skins file
        std::fs::write(dir.path().join("heroes.json"), r#"{"timestamp":1,"payload":[]}"#)
            .unwrap();

        let snapshot = CatalogReader::new(dir.path()).load_all();
        assert_eq!(snapshot.records.len(), 3);
        assert_eq!(snapshot.files_read, 2);
        assert_eq!(snapshot.files_skipped, 0);
        assert_eq!(snapshot.hero_count(), 2);
    }

    #[test]
    fn test_malformed_files_are_skipped() {
        let dir = tempdir().unwrap();
        write_groot_and_iron_man(dir.path());
        std::fs::write(dir.path().join("skins_Broken.json"), "{not json").unwrap();
        std::fs::write(
            dir.path().join("skins_Shape.json"),
            r#"{"timestamp": 1.0, "payload": {"not": "a list"}}"#,
        )
        .unwrap();

        let snapshot = CatalogReader::new(dir.path()).load_all();
        assert_eq!(snapshot.records.len(), 3);
        assert_eq!(snapshot.files_read, 2);
        assert_eq!(snapshot.files_skipped, 2);
    }

    #[test]
    fn test_all_corrupt_is_distinguishable_from_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("skins_Broken.json"), "[]").unwrap();

        let snapshot = CatalogReader::new(dir.path()).load_all();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.files_skipped, 1);
    }

    #[test]
    fn test_expired_records_are_still_served() {
        let dir = tempdir().unwrap();
        crate::cache::TtlCache::new(dir.path())
            .set_at(
                "skins_Groot",
                &vec![record("Groot", "1011001", "Celestial", "1011002")],
                0.0,
            )
            .unwrap();

        let snapshot = CatalogReader::new(dir.path()).load_all();
        assert_eq!(snapshot.records.len(), 1);
    }

    #[test]
    fn test_queries() {
        let dir = tempdir().unwrap();
        write_groot_and_iron_man(dir.path());
        let snapshot = CatalogReader::new(dir.path()).load_all();

        assert_eq!(snapshot.find_by_character("groot").len(), 2);
        assert_eq!(snapshot.find_by_character("GROOT").len(), 2);
        assert!(snapshot.find_by_character("gro").is_empty());

        let iron = snapshot.find_by_skin_id("1021002").unwrap();
        assert_eq!(iron.name, "Iron Man");
        assert!(snapshot.find_by_skin_id("102100").is_none());

        let matches = snapshot.find_by_skin_name("ceLEST");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].skinid, "1011002");
        assert!(snapshot.find_by_skin_name("nothing").is_empty());
    }
}
