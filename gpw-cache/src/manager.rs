// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cache store manager
//!
//! Owns the storage and exposes the bucket-level operations the lifecycle
//! needs: open the current generation and purge every other one.

use chrono::{DateTime, Utc};
use gpw_core::{CacheVersion, GpwResult, RequestIdentity, Response};
use std::sync::Arc;

use crate::{BucketHandle, CacheStorage};

/// Summary of one bucket
#[derive(Debug, Clone)]
pub struct BucketStats {
    pub name: String,
    pub entries: usize,
    pub total_bytes: u64,
    pub newest: Option<DateTime<Utc>>,
    pub current: bool,
}

/// Cache store manager
#[derive(Clone)]
pub struct CacheManager {
    storage: Arc<dyn CacheStorage>,
}

impl CacheManager {
    pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    /// Open the bucket for `version`, creating it if absent
    pub async fn open(&self, version: &CacheVersion) -> GpwResult<BucketHandle> {
        self.storage.open(&version.bucket_name()).await
    }

    /// Delete every bucket whose name differs from `current`.
    ///
    /// Returns the names of the deleted buckets.
    pub async fn delete_buckets_except(&self, current: &str) -> GpwResult<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.keys().await? {
            if name == current {
                continue;
            }
            if self.storage.delete(&name).await? {
                tracing::debug!("Deleted stale bucket {}", name);
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Search every bucket for `id`, the `preferred` one first
    pub async fn match_any(
        &self,
        id: &RequestIdentity,
        preferred: Option<&str>,
    ) -> GpwResult<Option<Response>> {
        let mut names = self.storage.keys().await?;
        if let Some(preferred) = preferred {
            names.sort_by_key(|n| n != preferred);
        }

        for name in names {
            let bucket = self.storage.open(&name).await?;
            if let Some(resp) = bucket.get(id).await? {
                return Ok(Some(resp));
            }
        }
        Ok(None)
    }

    /// Per-bucket statistics, flagging the bucket named `current`
    pub async fn stats(&self, current: &str) -> GpwResult<Vec<BucketStats>> {
        let mut stats = Vec::new();
        for name in self.storage.keys().await? {
            let bucket = self.storage.open(&name).await?;
            let mut total_bytes = 0u64;
            let mut newest: Option<DateTime<Utc>> = None;

            let keys = bucket.keys().await?;
            for key in &keys {
                if let Some(entry) = bucket.get_entry(key).await? {
                    total_bytes += entry.size();
                    newest = newest.max(Some(entry.cached_at));
                }
            }

            stats.push(BucketStats {
                current: name == current,
                name,
                entries: keys.len(),
                total_bytes,
                newest,
            });
        }
        Ok(stats)
    }
}
