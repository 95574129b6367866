// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-process bucket storage

use async_trait::async_trait;
use gpw_core::{GpwResult, RequestIdentity, Response};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{ensure_cacheable, Bucket, BucketConfig, BucketHandle, CacheStorage, CachedResponse};

/// Bucket kept in memory
pub struct MemoryBucket {
    name: String,
    config: BucketConfig,
    entries: RwLock<HashMap<RequestIdentity, CachedResponse>>,
    seq: AtomicU64,
}

impl MemoryBucket {
    fn new(name: impl Into<String>, config: BucketConfig) -> Self {
        Self {
            name: name.into(),
            config,
            entries: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_entry(&self, id: &RequestIdentity) -> GpwResult<Option<CachedResponse>> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn put(&self, id: &RequestIdentity, response: Response) -> GpwResult<()> {
        ensure_cacheable(id)?;
        let mut entries = self.entries.write().await;
        self.config
            .check_quota(&self.name, entries.len(), entries.contains_key(id))?;

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        entries.insert(id.clone(), CachedResponse::new(id.clone(), response, seq));
        Ok(())
    }

    async fn delete(&self, id: &RequestIdentity) -> GpwResult<bool> {
        Ok(self.entries.write().await.remove(id).is_some())
    }

    async fn keys(&self) -> GpwResult<Vec<RequestIdentity>> {
        let entries = self.entries.read().await;
        let mut ordered: Vec<&CachedResponse> = entries.values().collect();
        ordered.sort_by_key(|e| e.seq);
        Ok(ordered.into_iter().map(|e| e.identity.clone()).collect())
    }

    async fn len(&self) -> GpwResult<usize> {
        Ok(self.entries.read().await.len())
    }
}

/// Bucket storage kept in memory, in bucket creation order
pub struct MemoryStorage {
    id: String,
    config: BucketConfig,
    buckets: Arc<RwLock<Vec<(String, Arc<MemoryBucket>)>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_config(BucketConfig::default())
    }

    pub fn with_config(config: BucketConfig) -> Self {
        Self {
            id: "memory".into(),
            config,
            buckets: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open(&self, name: &str) -> GpwResult<BucketHandle> {
        let mut buckets = self.buckets.write().await;
        if let Some((_, bucket)) = buckets.iter().find(|(n, _)| n == name) {
            return Ok(bucket.clone());
        }

        let bucket = Arc::new(MemoryBucket::new(name, self.config.clone()));
        buckets.push((name.to_string(), bucket.clone()));
        Ok(bucket)
    }

    async fn has(&self, name: &str) -> GpwResult<bool> {
        Ok(self.buckets.read().await.iter().any(|(n, _)| n == name))
    }

    async fn delete(&self, name: &str) -> GpwResult<bool> {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|(n, _)| n != name);
        Ok(buckets.len() != before)
    }

    async fn keys(&self) -> GpwResult<Vec<String>> {
        Ok(self.buckets.read().await.iter().map(|(n, _)| n.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpw_core::{GpwError, Method};

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let storage = MemoryStorage::new();
        let a = storage.open("geo-pwa-cache-v1").await.unwrap();
        a.put(&RequestIdentity::get("/"), Response::ok("/", "shell"))
            .await
            .unwrap();

        let b = storage.open("geo-pwa-cache-v1").await.unwrap();
        assert_eq!(b.len().await.unwrap(), 1);
        assert_eq!(storage.keys().await.unwrap(), vec!["geo-pwa-cache-v1"]);
    }

    #[tokio::test]
    async fn test_put_replaces_existing_identity() {
        let storage = MemoryStorage::new();
        let bucket = storage.open("b").await.unwrap();
        let id = RequestIdentity::get("/index.html");

        bucket.put(&id, Response::ok("/index.html", "old")).await.unwrap();
        bucket.put(&id, Response::ok("/index.html", "new")).await.unwrap();

        assert_eq!(bucket.len().await.unwrap(), 1);
        assert_eq!(bucket.get(&id).await.unwrap().unwrap().text(), "new");
    }

    #[tokio::test]
    async fn test_keys_follow_capture_order() {
        let storage = MemoryStorage::new();
        let bucket = storage.open("b").await.unwrap();
        for url in ["/a", "/b", "/c"] {
            bucket.put(&RequestIdentity::get(url), Response::ok(url, url)).await.unwrap();
        }
        // Rewriting /a moves it to the end
        bucket.put(&RequestIdentity::get("/a"), Response::ok("/a", "again")).await.unwrap();

        let urls: Vec<String> = bucket.keys().await.unwrap().into_iter().map(|k| k.url).collect();
        assert_eq!(urls, vec!["/b", "/c", "/a"]);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let storage = MemoryStorage::new();
        let bucket = storage.open("b").await.unwrap();
        assert!(bucket.get(&RequestIdentity::get("/nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_rejects_non_get() {
        let storage = MemoryStorage::new();
        let bucket = storage.open("b").await.unwrap();
        let err = bucket
            .put(&RequestIdentity::new(Method::Post, "/api"), Response::ok("/api", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, GpwError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let storage = MemoryStorage::with_config(BucketConfig {
            max_entries: Some(1),
            ..Default::default()
        });
        let bucket = storage.open("b").await.unwrap();
        bucket.put(&RequestIdentity::get("/a"), Response::ok("/a", "a")).await.unwrap();

        let err = bucket
            .put(&RequestIdentity::get("/b"), Response::ok("/b", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, GpwError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn test_delete_bucket() {
        let storage = MemoryStorage::new();
        storage.open("old").await.unwrap();
        storage.open("new").await.unwrap();

        assert!(storage.delete("old").await.unwrap());
        assert!(!storage.delete("old").await.unwrap());
        assert!(!storage.has("old").await.unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let storage = MemoryStorage::new();
        let bucket = storage.open("b").await.unwrap();
        let id = RequestIdentity::get("/a");
        bucket.put(&id, Response::ok("/a", "a")).await.unwrap();

        assert!(bucket.delete(&id).await.unwrap());
        assert!(!bucket.delete(&id).await.unwrap());
        assert!(bucket.get(&id).await.unwrap().is_none());
    }
}
