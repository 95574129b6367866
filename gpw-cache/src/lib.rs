// SPDX-License-Identifier: AGPL-3.0-or-later
//! Versioned cache buckets for the Geo PWA worker
//!
//! Supports two backends:
//! - memory: in-process buckets, gone when the process exits
//! - sled: durable buckets, one tree per bucket (default feature)

use async_trait::async_trait;
use gpw_core::{GpwError, GpwResult, RequestIdentity, Response};
use std::sync::Arc;

pub mod entry;
pub mod manager;
pub mod memory;

#[cfg(feature = "sled")]
pub mod sled_backend;

pub use entry::CachedResponse;
pub use manager::{BucketStats, CacheManager};
pub use memory::MemoryStorage;

#[cfg(feature = "sled")]
pub use sled_backend::SledStorage;

/// Shared handle to an open bucket
pub type BucketHandle = Arc<dyn Bucket>;

/// A named key-value store mapping request identities to responses.
///
/// At most one entry exists per identity; `put` replaces.
#[async_trait]
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;

    /// Look up the stored entry, with its capture metadata
    async fn get_entry(&self, id: &RequestIdentity) -> GpwResult<Option<CachedResponse>>;

    /// Store `response` under `id`, replacing any previous entry
    async fn put(&self, id: &RequestIdentity, response: Response) -> GpwResult<()>;

    async fn delete(&self, id: &RequestIdentity) -> GpwResult<bool>;

    /// Identities in capture order, oldest first
    async fn keys(&self) -> GpwResult<Vec<RequestIdentity>>;

    async fn get(&self, id: &RequestIdentity) -> GpwResult<Option<Response>> {
        Ok(self.get_entry(id).await?.map(|e| e.response))
    }

    async fn len(&self) -> GpwResult<usize> {
        Ok(self.keys().await?.len())
    }
}

/// Storage holding every bucket of an origin
#[async_trait]
pub trait CacheStorage: Send + Sync {
    fn id(&self) -> &str;

    /// Open a bucket, creating it if absent. Idempotent.
    async fn open(&self, name: &str) -> GpwResult<BucketHandle>;

    async fn has(&self, name: &str) -> GpwResult<bool>;

    /// Destroy a bucket and all of its entries
    async fn delete(&self, name: &str) -> GpwResult<bool>;

    /// Names of every existing bucket
    async fn keys(&self) -> GpwResult<Vec<String>>;
}

/// Per-bucket limits
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Maximum number of entries; `None` means unbounded
    pub max_entries: Option<usize>,
    /// Bodies at least this large are compressed by durable backends
    pub compress_threshold: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            max_entries: None,
            compress_threshold: 1024, // 1KB
        }
    }
}

impl BucketConfig {
    /// Reject a new identity when the bucket is already full
    pub(crate) fn check_quota(&self, bucket: &str, len: usize, replacing: bool) -> GpwResult<()> {
        match self.max_entries {
            Some(max) if !replacing && len >= max => Err(GpwError::QuotaExceeded(format!(
                "bucket {bucket} holds {len} of {max} entries"
            ))),
            _ => Ok(()),
        }
    }
}

pub(crate) fn ensure_cacheable(id: &RequestIdentity) -> GpwResult<()> {
    if id.is_cacheable() {
        Ok(())
    } else {
        Err(GpwError::InvalidRequest(format!("cannot cache {id}")))
    }
}

/// Body digests and compression
pub mod blob {
    use gpw_core::{GpwError, GpwResult};
    use lz4_flex::{compress_prepend_size, decompress_size_prepended};

    /// Hash content using BLAKE3
    pub fn hash_content(data: &[u8]) -> String {
        blake3::hash(data).to_hex().to_string()
    }

    /// Compress with LZ4 when at least `threshold` bytes and it actually
    /// shrinks. Returns the stored bytes and whether they are compressed.
    pub fn pack(data: &[u8], threshold: usize) -> (Vec<u8>, bool) {
        if data.len() >= threshold {
            let compressed = compress_prepend_size(data);
            if compressed.len() < data.len() {
                return (compressed, true);
            }
        }
        (data.to_vec(), false)
    }

    pub fn unpack(data: &[u8], compressed: bool) -> GpwResult<Vec<u8>> {
        if compressed {
            decompress_size_prepended(data).map_err(|e| GpwError::CorruptEntry(e.to_string()))
        } else {
            Ok(data.to_vec())
        }
    }
}
