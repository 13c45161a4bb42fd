//! Content-addressed store of parsed LLM replies.
//!
//! Keys are the MD5 hex digest of the exact prompt text, values the parsed
//! JSON reply. Entries are never invalidated; the whole map is loaded at
//! start and written back as one JSON object.

use md5::{Digest, Md5};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Prompt → reply cache persisted as a flat JSON object.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Map<String, Value>,
    dirty: bool,
    path: Option<PathBuf>,
}

impl ResponseCache {
    /// An empty cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file at `path`.
    ///
    /// A missing file starts an empty cache; an unparsable file is reported and
    /// replaced by an empty cache on the next flush.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(entries) => {
                    info!(path = %path.display(), entries = entries.len(), "Loaded response cache");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Cache file not parsable");
                    Map::new()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "No cache file");
                Map::new()
            }
        };

        Self {
            entries,
            dirty: false,
            path: Some(path),
        }
    }

    /// Cache key of a prompt.
    pub fn key_for(prompt: &str) -> String {
        hex::encode(Md5::digest(prompt.as_bytes()))
    }

    pub fn get(&self, prompt: &str) -> Option<&Value> {
        self.entries.get(&Self::key_for(prompt))
    }

    pub fn contains(&self, prompt: &str) -> bool {
        self.entries.contains_key(&Self::key_for(prompt))
    }

    /// Record a reply and mark the cache dirty.
    pub fn insert(&mut self, prompt: &str, value: Value) {
        self.entries.insert(Self::key_for(prompt), value);
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the cache if it changed since the last flush.
    ///
    /// Returns whether anything was written.
    pub fn flush(&mut self) -> AppResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        let Some(path) = &self.path else {
            self.dirty = false;
            return Ok(false);
        };

        let text = serde_json::to_string(&self.entries).map_err(|e| AppError::json(path, e))?;
        std::fs::write(path, text).map_err(|e| AppError::io(path, e))?;
        debug!(path = %path.display(), entries = self.entries.len(), "Flushed response cache");
        self.dirty = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_md5_hex() {
        assert_eq!(
            ResponseCache::key_for(""),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(ResponseCache::key_for("abc").len(), 32);
        assert_ne!(ResponseCache::key_for("a"), ResponseCache::key_for("b"));
    }

    #[test]
    fn test_insert_marks_dirty() {
        let mut cache = ResponseCache::in_memory();
        assert!(!cache.is_dirty());
        cache.insert("prompt", json!({"title": "x", "description": "y"}));
        assert!(cache.is_dirty());
        assert!(cache.contains("prompt"));
        assert_eq!(cache.get("prompt").unwrap()["title"], "x");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::load(dir.path().join("cache4.json"));
        assert!(cache.is_empty());
        assert!(!cache.is_dirty());
    }

    #[test]
    fn test_unparsable_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache4.json");
        std::fs::write(&path, "{not json").unwrap();
        let cache = ResponseCache::load(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_flush_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache4.json");

        let mut cache = ResponseCache::load(&path);
        cache.insert("one", json!([1, 2, 3]));
        assert!(cache.flush().unwrap());
        assert!(!cache.is_dirty());
        // Clean cache is not rewritten
        assert!(!cache.flush().unwrap());

        let reloaded = ResponseCache::load(&path);
        assert_eq!(reloaded.get("one"), Some(&json!([1, 2, 3])));

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get(ResponseCache::key_for("one")).is_some());
    }
}
