// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker configuration
//!
//! Every key is optional in TOML; missing keys take the defaults below.

use gpw_core::{CacheVersion, GpwError, GpwResult, StaticManifest};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::resolver::RoutingPolicy;

/// Cache bucket naming and limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub prefix: String,
    pub version: u32,
    /// Per-bucket entry limit
    pub max_entries: Option<usize>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let version = CacheVersion::default();
        Self {
            prefix: version.prefix,
            version: version.version,
            max_entries: None,
        }
    }
}

/// Asset index fetched during install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub asset_prefix: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "/assets/index.json".into(),
            asset_prefix: "/assets/".into(),
        }
    }
}

/// Fallbacks used when a push payload leaves a field out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub default_title: String,
    pub default_body: String,
    pub default_url: String,
    pub icon: String,
    pub badge: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            default_title: "Geo PWA".into(),
            default_body: "New content is available.".into(),
            default_url: "/".into(),
            icon: "/icons/192x192.png".into(),
            badge: "/icons/128x128.png".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Whole-request timeout; absent means none
    pub timeout_secs: Option<u64>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout_secs: Some(30),
        }
    }
}

impl NetworkSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin root-relative URLs resolve against
    pub origin: String,
    pub cache: CacheSettings,
    pub manifest: StaticManifest,
    /// Offline fallback for document navigations
    pub app_shell: String,
    pub routing: RoutingPolicy,
    /// Store successful Cache-First network responses
    pub persist_cache_first: bool,
    pub discovery: DiscoveryConfig,
    pub notification: NotificationConfig,
    pub network: NetworkSettings,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".into(),
            cache: CacheSettings::default(),
            manifest: StaticManifest::default(),
            app_shell: "/index.html".into(),
            routing: RoutingPolicy::default(),
            persist_cache_first: false,
            discovery: DiscoveryConfig::default(),
            notification: NotificationConfig::default(),
            network: NetworkSettings::default(),
        }
    }
}

impl WorkerConfig {
    /// Parse and validate TOML
    pub fn from_toml_str(content: &str) -> GpwResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| GpwError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> GpwResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> GpwResult<String> {
        toml::to_string_pretty(self).map_err(|e| GpwError::Serialization(e.to_string()))
    }

    /// The current version tag
    pub fn version(&self) -> CacheVersion {
        CacheVersion::new(self.cache.prefix.clone(), self.cache.version)
    }

    pub fn validate(&self) -> GpwResult<()> {
        if self.cache.prefix.trim().is_empty() {
            return Err(GpwError::Config("cache.prefix must not be empty".into()));
        }
        if !self.app_shell.starts_with('/') {
            return Err(GpwError::Config(format!(
                "app_shell must be root-relative, got {:?}",
                self.app_shell
            )));
        }
        if self.cache.max_entries == Some(0) {
            return Err(GpwError::Config("cache.max_entries must be at least 1".into()));
        }
        if self.discovery.enabled && !self.discovery.asset_prefix.starts_with('/') {
            return Err(GpwError::Config(format!(
                "discovery.asset_prefix must be root-relative, got {:?}",
                self.discovery.asset_prefix
            )));
        }
        Ok(())
    }
}
