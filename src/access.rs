//! Access-key lookup for elevated lobbies and private files
//!
//! Access data is a JSON object keyed by access key:
//! `{"KEY": {"expires": <ms since epoch>, "allowed": ["^/movies/.*"]}}`.
//! The file is re-read on every lookup so edits take effect without a restart.

use crate::error::AccessError;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub type AccessResult<T> = Result<T, AccessError>;

/// A single grant in the access data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessEntry {
    /// Expiry as milliseconds since epoch
    pub expires: i64,
    /// Regex patterns matched against the requested path
    #[serde(default)]
    pub allowed: Vec<String>,
}

impl AccessEntry {
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        self.expires >= now_ms
    }

    /// Whether any allowed pattern matches the path. Bad patterns never match.
    pub fn allows(&self, path: &str) -> bool {
        self.allowed.iter().any(|pattern| match Regex::new(pattern) {
            Ok(re) => re.is_match(path),
            Err(e) => {
                tracing::warn!(pattern, "Ignoring invalid access pattern: {}", e);
                false
            }
        })
    }
}

/// Source of access data
#[async_trait]
pub trait AccessStore: Send + Sync {
    async fn lookup(&self, key: &str) -> AccessResult<Option<AccessEntry>>;
}

/// Access data read from a JSON file on disk
#[derive(Debug, Clone)]
pub struct FileAccessStore {
    path: PathBuf,
}

impl FileAccessStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AccessStore for FileAccessStore {
    async fn lookup(&self, key: &str) -> AccessResult<Option<AccessEntry>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let mut data: HashMap<String, AccessEntry> = serde_json::from_str(&raw)?;
        Ok(data.remove(key))
    }
}

/// Fixed access data, used in tests and when no access file is configured
#[derive(Debug, Clone, Default)]
pub struct MemoryAccessStore {
    entries: HashMap<String, AccessEntry>,
}

impl MemoryAccessStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, entry: AccessEntry) -> Self {
        self.entries.insert(key.to_string(), entry);
        self
    }
}

#[async_trait]
impl AccessStore for MemoryAccessStore {
    async fn lookup(&self, key: &str) -> AccessResult<Option<AccessEntry>> {
        Ok(self.entries.get(key).cloned())
    }
}

/// Look up a key, treating any store failure as "no access"
pub async fn lookup_or_deny(store: &dyn AccessStore, key: &str) -> Option<AccessEntry> {
    if key.is_empty() {
        return None;
    }
    match store.lookup(key).await {
        Ok(entry) => entry,
        Err(e) => {
            tracing::warn!("Access lookup failed, denying: {}", e);
            None
        }
    }
}

/// Whether a lobby's elevated key currently grants anything
pub async fn is_elevated(store: &dyn AccessStore, key: &str, now_ms: i64) -> bool {
    lookup_or_deny(store, key)
        .await
        .is_some_and(|entry| entry.is_valid_at(now_ms))
}

/// Whether a key grants access to a private path
pub async fn can_access_path(store: &dyn AccessStore, key: &str, path: &str, now_ms: i64) -> bool {
    match lookup_or_deny(store, key).await {
        Some(entry) if entry.is_valid_at(now_ms) => entry.allows(path),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(expires: i64, allowed: &[&str]) -> AccessEntry {
        AccessEntry {
            expires,
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_allows_matches_any_pattern() {
        let e = entry(0, &["^/movies/", "\\.srt$"]);
        assert!(e.allows("/movies/a.mp4"));
        assert!(e.allows("/shows/a.srt"));
        assert!(!e.allows("/shows/a.mp4"));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let e = entry(0, &["(unclosed", "^/ok"]);
        assert!(!e.allows("/(unclosed"));
        assert!(e.allows("/ok/file"));
    }

    #[tokio::test]
    async fn test_is_elevated() {
        let store = MemoryAccessStore::new()
            .with_entry("GOOD", entry(2_000, &[]))
            .with_entry("OLD", entry(500, &[]));

        assert!(is_elevated(&store, "GOOD", 1_000).await);
        assert!(!is_elevated(&store, "OLD", 1_000).await);
        assert!(!is_elevated(&store, "MISSING", 1_000).await);
        assert!(!is_elevated(&store, "", 1_000).await);
    }

    #[tokio::test]
    async fn test_file_store_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"K1": {{"expires": 100, "allowed": ["^/a"]}}}}"#
        )
        .unwrap();

        let store = FileAccessStore::new(file.path());
        let found = store.lookup("K1").await.unwrap();
        assert_eq!(found, Some(entry(100, &["^/a"])));
        assert_eq!(store.lookup("K2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_failures_fail_closed() {
        let store = FileAccessStore::new("/definitely/not/here/access.json");
        assert!(store.lookup("K").await.is_err());
        assert!(!is_elevated(&store, "K", 0).await);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let store = FileAccessStore::new(file.path());
        assert!(matches!(
            store.lookup("K").await,
            Err(AccessError::Parse(_))
        ));
        assert!(!can_access_path(&store, "K", "/a", 0).await);
    }

    #[tokio::test]
    async fn test_can_access_path() {
        let store = MemoryAccessStore::new().with_entry("K", entry(1_000, &["^/movies/"]));
        assert!(can_access_path(&store, "K", "/movies/x.mp4", 500).await);
        assert!(!can_access_path(&store, "K", "/secret/x.mp4", 500).await);
        assert!(!can_access_path(&store, "K", "/movies/x.mp4", 1_500).await);
    }
}
