//! Posted-token dedup cache.
//!
//! A persisted set of hashed purchase tokens that have been fully handled
//! (finalized and posted). Membership gates both re-finalization and
//! re-posting. Tokens are stored hashed so the cache never holds a value
//! that could be replayed against the store.
//!
//! Each trait call is treated as atomic on its own; there is deliberately
//! no transactional window across check-then-finalize-then-record, and
//! cross-call de-duplication of fully concurrent calls for the same token
//! is the cache implementation's concern.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::errors::ReceiptError;

/// Lowercase hex SHA-256 of a purchase token; the cache key shape.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Persisted set of hashed tokens already fully handled.
#[async_trait]
pub trait PostedTokenCache: Send + Sync {
    async fn has_token(&self, hashed_token: &str) -> Result<bool, ReceiptError>;
    async fn add_token(&self, hashed_token: &str) -> Result<(), ReceiptError>;
    async fn all_tokens(&self) -> Result<HashSet<String>, ReceiptError>;
}

/// In-memory cache. The backing set lives only as long as the process;
/// suited to tests and to hosts that persist tokens elsewhere.
pub struct MemoryTokenCache {
    tokens: RwLock<HashSet<String>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashSet::new()),
        }
    }
}

impl Default for MemoryTokenCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostedTokenCache for MemoryTokenCache {
    async fn has_token(&self, hashed_token: &str) -> Result<bool, ReceiptError> {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.contains(hashed_token))
    }

    async fn add_token(&self, hashed_token: &str) -> Result<(), ReceiptError> {
        let mut tokens = self.tokens.write().unwrap_or_else(|e| e.into_inner());
        tokens.insert(hashed_token.to_owned());
        Ok(())
    }

    async fn all_tokens(&self) -> Result<HashSet<String>, ReceiptError> {
        let tokens = self.tokens.read().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.clone())
    }
}

/// File-backed cache: a JSON array of hashed tokens under the given base
/// directory, guarded by an exclusive file lock for read-modify-write.
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(base_path: &Path) -> Result<Self, ReceiptError> {
        std::fs::create_dir_all(base_path).map_err(cache_error)?;
        Ok(Self {
            path: base_path.join("posted_tokens.json"),
        })
    }

    fn read_set(contents: &str) -> Result<HashSet<String>, ReceiptError> {
        if contents.trim().is_empty() {
            return Ok(HashSet::new());
        }
        serde_json::from_str(contents).map_err(cache_error)
    }
}

#[async_trait]
impl PostedTokenCache for FileTokenCache {
    async fn has_token(&self, hashed_token: &str) -> Result<bool, ReceiptError> {
        Ok(self.all_tokens().await?.contains(hashed_token))
    }

    async fn add_token(&self, hashed_token: &str) -> Result<(), ReceiptError> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(cache_error)?;
        // Fully qualified to stay unambiguous next to std's own file locks.
        fs2::FileExt::lock_exclusive(&file).map_err(cache_error)?;

        let result: Result<(), ReceiptError> = (|| {
            let mut contents = String::new();
            file.read_to_string(&mut contents).map_err(cache_error)?;
            let mut tokens = Self::read_set(&contents)?;
            if tokens.insert(hashed_token.to_owned()) {
                let mut sorted: Vec<&String> = tokens.iter().collect();
                sorted.sort();
                let serialized = serde_json::to_string_pretty(&sorted).map_err(cache_error)?;
                file.seek(SeekFrom::Start(0)).map_err(cache_error)?;
                file.set_len(0).map_err(cache_error)?;
                file.write_all(serialized.as_bytes()).map_err(cache_error)?;
            }
            Ok(())
        })();

        let _ = fs2::FileExt::unlock(&file);
        result
    }

    async fn all_tokens(&self) -> Result<HashSet<String>, ReceiptError> {
        if !self.path.exists() {
            return Ok(HashSet::new());
        }
        let mut file = OpenOptions::new()
            .read(true)
            .open(&self.path)
            .map_err(cache_error)?;
        fs2::FileExt::lock_shared(&file).map_err(cache_error)?;
        let mut contents = String::new();
        let read = file.read_to_string(&mut contents).map_err(cache_error);
        let _ = fs2::FileExt::unlock(&file);
        read?;
        Self::read_set(&contents)
    }
}

fn cache_error(err: impl std::fmt::Display) -> ReceiptError {
    ReceiptError::Cache(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_hashing_is_stable_and_hex() {
        let hashed = hash_token("purchase-token-1");
        assert_eq!(hashed.len(), 64);
        assert_eq!(hashed, hash_token("purchase-token-1"));
        assert_ne!(hashed, hash_token("purchase-token-2"));
        assert!(hashed.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn memory_cache_round_trips() {
        let cache = MemoryTokenCache::new();
        let hashed = hash_token("tok");

        assert!(!cache.has_token(&hashed).await.unwrap());
        cache.add_token(&hashed).await.unwrap();
        assert!(cache.has_token(&hashed).await.unwrap());
        // Re-adding is a no-op, not an error.
        cache.add_token(&hashed).await.unwrap();
        assert_eq!(cache.all_tokens().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_cache_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let hashed = hash_token("tok");

        {
            let cache = FileTokenCache::new(dir.path()).unwrap();
            assert!(!cache.has_token(&hashed).await.unwrap());
            cache.add_token(&hashed).await.unwrap();
            assert!(cache.has_token(&hashed).await.unwrap());
        }

        let reopened = FileTokenCache::new(dir.path()).unwrap();
        assert!(reopened.has_token(&hashed).await.unwrap());
        assert_eq!(reopened.all_tokens().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn file_cache_accumulates_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileTokenCache::new(dir.path()).unwrap();

        for i in 0..5 {
            cache.add_token(&hash_token(&format!("tok-{i}"))).await.unwrap();
        }
        // Duplicate add leaves the set unchanged.
        cache.add_token(&hash_token("tok-0")).await.unwrap();
        assert_eq!(cache.all_tokens().await.unwrap().len(), 5);
    }
}
