// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stored bucket entries

use chrono::{DateTime, Utc};
use gpw_core::{RequestIdentity, Response};
use serde::{Deserialize, Serialize};

use crate::blob;

/// A response as held in a bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    pub identity: RequestIdentity,
    pub response: Response,
    /// When this entry was written
    pub cached_at: DateTime<Utc>,
    /// Capture order within the bucket; larger is newer
    pub seq: u64,
    /// BLAKE3 digest of the body
    pub content_hash: String,
}

impl CachedResponse {
    pub fn new(identity: RequestIdentity, response: Response, seq: u64) -> Self {
        let content_hash = blob::hash_content(&response.body);
        Self {
            identity,
            response,
            cached_at: Utc::now(),
            seq,
            content_hash,
        }
    }

    pub fn size(&self) -> u64 {
        self.response.body_len()
    }

    /// Seconds since the entry was written
    pub fn age_secs(&self) -> i64 {
        Utc::now().signed_duration_since(self.cached_at).num_seconds()
    }

    pub fn verify(&self) -> bool {
        blob::hash_content(&self.response.body) == self.content_hash
    }
}
