//! File-backed JSON cache with a fixed TTL.
//!
//! Every key maps to `<cache_dir>/<sanitized_key>.json` holding
//! `{"timestamp": <epoch seconds>, "payload": <json>}`. Reads never fail:
//! a missing, corrupt, misshapen or expired record is simply a miss.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default TTL for cached records (2 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Extension used for cache record files.
pub const RECORD_EXTENSION: &str = "json";

/// A cache record as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    pub timestamp: f64,
    pub payload: T,
}

impl<T> CacheRecord<T> {
    fn is_expired(&self, now: f64, ttl: Duration) -> bool {
        now - self.timestamp >= ttl.as_secs_f64()
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Current time as fractional epoch seconds.
pub fn now_epoch_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// File-based TTL cache.
#[derive(Debug, Clone)]
pub struct TtlCache {
    cache_dir: PathBuf,
    ttl: Duration,
}

impl TtlCache {
    /// Create a cache rooted at `cache_dir` with the default TTL.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self::with_ttl(cache_dir, DEFAULT_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(cache_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// On-disk path for a logical key.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", sanitize_key(key), RECORD_EXTENSION))
    }

    /// Get a cached payload if present and fresh.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, now_epoch_secs())
    }

    /// Get a cached payload as of `now` (epoch seconds).
    pub fn get_at<T: DeserializeOwned>(&self, key: &str, now: f64) -> Option<T> {
        let path = self.path_for(key);
        let contents = fs::read_to_string(&path).ok()?;

        let record: CacheRecord<serde_json::Value> = match serde_json::from_str(&contents) {
            Ok(r) => r,
            Err(e) => {
                debug!("Cache record {} is unreadable: {}", path.display(), e);
                return None;
            }
        };

        if record.is_expired(now, self.ttl) {
            debug!("Cache MISS (expired) for {}", key);
            return None;
        }

        match serde_json::from_value(record.payload) {
            Ok(payload) => {
                debug!("Cache HIT for {}", key);
                Some(payload)
            }
            Err(e) => {
                debug!("Cache payload for {} has unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Store a payload, replacing any previous record for the key.
    pub fn set<T: Serialize>(&self, key: &str, payload: &T) -> io::Result<()> {
        self.set_at(key, payload, now_epoch_secs())
    }

    /// Store a payload stamped with an explicit time.
    pub fn set_at<T: Serialize>(&self, key: &str, payload: &T, timestamp: f64) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)?;

        let record = CacheRecord { timestamp, payload };
        let json = serde_json::to_vec_pretty(&record)?;

        // Write beside the target and rename so readers never see half a record
        let path = self.path_for(key);
        let tmp_path = path.with_extension(format!("{}.tmp", RECORD_EXTENSION));
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, &path)?;

        debug!("Cached {} at {}", key, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Hero;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("heroes"), "heroes");
        assert_eq!(sanitize_key("skins_Iron Man"), "skins_Iron_Man");
        assert_eq!(sanitize_key("skins_Cloak & Dagger"), "skins_Cloak___Dagger");
    }

    #[test]
    fn test_sanitize_key_idempotent() {
        for key in ["skins_Jeff the Land Shark", "skins_Dr. Strange", "héroes!"] {
            let once = sanitize_key(key);
            assert_eq!(sanitize_key(&once), once);
        }
    }

    #[test]
    fn test_ttl_boundary() {
        let dir = tempdir().unwrap();
        let cache = TtlCache::with_ttl(dir.path(), Duration::from_secs(100));
        let written_at = 1_700_000_000.0;

        cache.set_at("heroes", &vec!["a"], written_at).unwrap();

        let hit: Option<Vec<String>> = cache.get_at("heroes", written_at + 99.9);
        assert_eq!(hit, Some(vec!["a".to_string()]));

        let miss: Option<Vec<String>> = cache.get_at("heroes", written_at + 100.1);
        assert!(miss.is_none());

        let at_ttl: Option<Vec<String>> = cache.get_at("heroes", written_at + 100.0);
        assert!(at_ttl.is_none());
    }

    #[test]
    fn test_missing_record_is_miss() {
        let dir = tempdir().unwrap();
        let cache = TtlCache::new(dir.path().join("not-created-yet"));
        let value: Option<serde_json::Value> = cache.get("heroes");
        assert!(value.is_none());
    }

    #[test]
    fn test_corrupt_record_is_miss() {
        let dir = tempdir().unwrap();
        let cache = TtlCache::new(dir.path());

        fs::write(cache.path_for("heroes"), "{ not json").unwrap();
        let value: Option<serde_json::Value> = cache.get("heroes");
        assert!(value.is_none());

        fs::write(cache.path_for("heroes"), r#"{"payload": [1, 2]}"#).unwrap();
        let value: Option<Vec<u32>> = cache.get("heroes");
        assert!(value.is_none(), "record without timestamp must miss");
    }

    #[test]
    fn test_wrong_payload_shape_is_miss() {
        let dir = tempdir().unwrap();
        let cache = TtlCache::new(dir.path());
        cache.set("heroes", &serde_json::json!({"unexpected": true})).unwrap();

        let value: Option<Vec<Hero>> = cache.get("heroes");
        assert!(value.is_none());
    }

    #[test]
    fn test_set_creates_dir_and_overwrites() {
        let dir = tempdir().unwrap();
        let cache = TtlCache::new(dir.path().join("nested").join("cache"));

        cache.set("skins_Groot", &vec![1]).unwrap();
        cache.set("skins_Groot", &vec![2, 3]).unwrap();

        let value: Option<Vec<u32>> = cache.get("skins_Groot");
        assert_eq!(value, Some(vec![2, 3]));

        let leftovers: Vec<_> = fs::read_dir(cache.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_heroes_round_trip() {
        let dir = tempdir().unwrap();
        let cache = TtlCache::new(dir.path());
        let heroes = vec![
            Hero::new("Groot", "https://marvelrivals.fandom.com/wiki/Groot"),
            Hero::new("Iron Man", "https://marvelrivals.fandom.com/wiki/Iron_Man"),
        ];

        cache.set("heroes", &heroes).unwrap();
        let loaded: Vec<Hero> = cache.get("heroes").unwrap();

        assert_eq!(loaded, heroes);
        assert!(loaded.iter().all(|h| h.id.is_none()));
    }

    #[test]
    fn test_on_disk_shape() {
        let dir = tempdir().unwrap();
        let cache = TtlCache::new(dir.path());
        cache.set_at("skins_Iron Man", &vec!["x"], 42.5).unwrap();

        let raw = fs::read_to_string(dir.path().join("skins_Iron_Man.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["timestamp"], 42.5);
        assert_eq!(json["payload"][0], "x");
    }
}
