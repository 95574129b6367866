// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cache version tags and the static install manifest

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{GpwError, GpwResult};

/// Generation tag embedded in the bucket name.
///
/// Exactly one tag is current; every bucket carrying another name is stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheVersion {
    pub prefix: String,
    pub version: u32,
}

impl CacheVersion {
    pub fn new(prefix: impl Into<String>, version: u32) -> Self {
        Self {
            prefix: prefix.into(),
            version,
        }
    }

    /// Bucket name, e.g. `geo-pwa-cache-v1`
    pub fn bucket_name(&self) -> String {
        format!("{}-v{}", self.prefix, self.version)
    }

    pub fn is_current(&self, bucket_name: &str) -> bool {
        bucket_name == self.bucket_name()
    }

    /// The following version, or `None` once the counter is exhausted
    pub fn next(&self) -> Option<Self> {
        let version = self.version.checked_add(1)?;
        Some(Self::new(self.prefix.clone(), version))
    }

    /// Parse a bucket name produced by [`CacheVersion::bucket_name`].
    pub fn parse(bucket_name: &str) -> Option<Self> {
        let (prefix, version) = bucket_name.rsplit_once("-v")?;
        if prefix.is_empty() {
            return None;
        }
        let version = version.parse().ok()?;
        Some(Self::new(prefix, version))
    }
}

impl Default for CacheVersion {
    fn default() -> Self {
        Self::new("geo-pwa-cache", 1)
    }
}

impl fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.bucket_name())
    }
}

/// App shell paths that must be in the bucket once install succeeds
pub const DEFAULT_STATIC_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/service-worker.js",
    "/icons/128x128.png",
    "/icons/144x144.png",
    "/icons/152x152.png",
    "/icons/192x192.png",
    "/icons/512x512.png",
    "/icons/apple-touch-icon.png",
    "/icons/favicon.png",
];

/// Ordered, immutable list of root-relative paths cached on install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct StaticManifest {
    paths: Vec<String>,
}

impl StaticManifest {
    /// Build a manifest, keeping the first occurrence of duplicated paths.
    pub fn new<I, S>(paths: I) -> GpwResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for path in paths {
            let path = path.into();
            if !path.starts_with('/') {
                return Err(GpwError::Config(format!(
                    "manifest entry must be root-relative: {path}"
                )));
            }
            if !out.contains(&path) {
                out.push(path);
            }
        }
        Ok(Self { paths: out })
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

impl Default for StaticManifest {
    fn default() -> Self {
        Self {
            paths: DEFAULT_STATIC_ASSETS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TryFrom<Vec<String>> for StaticManifest {
    type Error = GpwError;

    fn try_from(paths: Vec<String>) -> GpwResult<Self> {
        Self::new(paths)
    }
}

impl From<StaticManifest> for Vec<String> {
    fn from(m: StaticManifest) -> Self {
        m.paths
    }
}
