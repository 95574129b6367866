// SPDX-License-Identifier: AGPL-3.0-or-later
//! Sled database backend for durable buckets
//!
//! Each bucket is a sled tree named `bucket:<name>`. Records are JSON with
//! the body LZ4-packed above the configured threshold and verified against
//! its BLAKE3 digest on read.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use gpw_core::{GpwError, GpwResult, RequestIdentity, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::{blob, ensure_cacheable, Bucket, BucketConfig, BucketHandle, CacheStorage, CachedResponse};

const TREE_PREFIX: &str = "bucket:";

fn db_err(e: sled::Error) -> GpwError {
    GpwError::Storage(e.to_string())
}

/// On-disk form of a [`CachedResponse`]
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    identity: RequestIdentity,
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    compressed: bool,
    content_hash: String,
    cached_at: DateTime<Utc>,
    seq: u64,
}

impl StoredRecord {
    fn pack(entry: &CachedResponse, threshold: usize) -> Self {
        let (body, compressed) = blob::pack(&entry.response.body, threshold);
        Self {
            identity: entry.identity.clone(),
            url: entry.response.url.clone(),
            status: entry.response.status,
            headers: entry.response.headers.clone(),
            body,
            compressed,
            content_hash: entry.content_hash.clone(),
            cached_at: entry.cached_at,
            seq: entry.seq,
        }
    }

    fn unpack(self) -> GpwResult<CachedResponse> {
        let body = blob::unpack(&self.body, self.compressed)?;
        if blob::hash_content(&body) != self.content_hash {
            return Err(GpwError::CorruptEntry(self.identity.to_string()));
        }

        Ok(CachedResponse {
            identity: self.identity,
            response: Response {
                url: self.url,
                status: self.status,
                headers: self.headers,
                body: Bytes::from(body),
            },
            cached_at: self.cached_at,
            seq: self.seq,
            content_hash: self.content_hash,
        })
    }
}

/// Bucket backed by a sled tree
pub struct SledBucket {
    name: String,
    db: sled::Db,
    tree: sled::Tree,
    config: BucketConfig,
}

impl SledBucket {
    fn decode(&self, value: &[u8]) -> GpwResult<CachedResponse> {
        let record: StoredRecord = serde_json::from_slice(value)?;
        record.unpack()
    }

    fn records(&self) -> GpwResult<Vec<StoredRecord>> {
        let mut records = Vec::new();
        for item in self.tree.iter() {
            let (_, value) = item.map_err(db_err)?;
            records.push(serde_json::from_slice::<StoredRecord>(&value)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl Bucket for SledBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_entry(&self, id: &RequestIdentity) -> GpwResult<Option<CachedResponse>> {
        match self.tree.get(id.to_key()).map_err(db_err)? {
            Some(value) => self.decode(&value).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, id: &RequestIdentity, response: Response) -> GpwResult<()> {
        ensure_cacheable(id)?;
        let key = id.to_key();
        let replacing = self.tree.contains_key(&key).map_err(db_err)?;
        self.config.check_quota(&self.name, self.tree.len(), replacing)?;

        let seq = self.db.generate_id().map_err(db_err)?;
        let entry = CachedResponse::new(id.clone(), response, seq);
        let value = serde_json::to_vec(&StoredRecord::pack(&entry, self.config.compress_threshold))?;

        self.tree.insert(key, value).map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, id: &RequestIdentity) -> GpwResult<bool> {
        Ok(self.tree.remove(id.to_key()).map_err(db_err)?.is_some())
    }

    async fn keys(&self) -> GpwResult<Vec<RequestIdentity>> {
        let mut records = self.records()?;
        records.sort_by_key(|r| r.seq);
        Ok(records.into_iter().map(|r| r.identity).collect())
    }

    async fn len(&self) -> GpwResult<usize> {
        Ok(self.tree.len())
    }
}

/// Durable bucket storage in a single sled database
pub struct SledStorage {
    id: String,
    db: sled::Db,
    config: BucketConfig,
}

impl SledStorage {
    /// Open or create a sled database at the given path
    pub fn open(path: impl AsRef<Path>, config: BucketConfig) -> GpwResult<Self> {
        let db = sled::open(path).map_err(db_err)?;
        Ok(Self {
            id: "sled".into(),
            db,
            config,
        })
    }

    /// Temporary database, removed on drop
    pub fn temporary(config: BucketConfig) -> GpwResult<Self> {
        let db = sled::Config::new().temporary(true).open().map_err(db_err)?;
        Ok(Self {
            id: "sled".into(),
            db,
            config,
        })
    }

    /// Flush to disk
    pub async fn flush(&self) -> GpwResult<()> {
        self.db.flush_async().await.map_err(db_err)?;
        Ok(())
    }

    /// Get database size on disk
    pub fn size_on_disk(&self) -> GpwResult<u64> {
        self.db.size_on_disk().map_err(db_err)
    }

    fn tree_name(name: &str) -> String {
        format!("{TREE_PREFIX}{name}")
    }
}

#[async_trait]
impl CacheStorage for SledStorage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open(&self, name: &str) -> GpwResult<BucketHandle> {
        let tree = self.db.open_tree(Self::tree_name(name)).map_err(db_err)?;
        Ok(Arc::new(SledBucket {
            name: name.to_string(),
            db: self.db.clone(),
            tree,
            config: self.config.clone(),
        }))
    }

    async fn has(&self, name: &str) -> GpwResult<bool> {
        Ok(self.keys().await?.iter().any(|n| n == name))
    }

    async fn delete(&self, name: &str) -> GpwResult<bool> {
        self.db.drop_tree(Self::tree_name(name)).map_err(db_err)
    }

    async fn keys(&self) -> GpwResult<Vec<String>> {
        Ok(self
            .db
            .tree_names()
            .into_iter()
            .filter_map(|raw| {
                let name = String::from_utf8(raw.to_vec()).ok()?;
                name.strip_prefix(TREE_PREFIX).map(str::to_string)
            })
            .collect())
    }
}
