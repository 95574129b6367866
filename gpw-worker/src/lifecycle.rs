// SPDX-License-Identifier: AGPL-3.0-or-later
//! Worker lifecycle: state machine, install and activate
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Activated
//!               |             |            |
//!               +-------------+------------+--> Redundant
//! ```
//!
//! A failed activation drops back to `Installed` so the host may retry.

use futures::future::try_join_all;
use gpw_cache::{BucketHandle, CacheManager};
use gpw_core::{ClientHost, GpwError, GpwResult, Network, Request, RequestIdentity, Response};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::config::WorkerConfig;
use crate::discovery;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl WorkerState {
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Parsed, Installing)
                | (Installing, Installed)
                | (Installed, Activating)
                | (Activating, Activated)
                | (Activating, Installed)
                | (Installing | Installed | Activating | Activated, Redundant)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Current state plus the skip-waiting request
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkerState {
        self.state.lock().map(|s| *s).unwrap_or(WorkerState::Redundant)
    }

    /// Move to `next`, returning the previous state
    pub fn transition(&self, next: WorkerState) -> GpwResult<WorkerState> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GpwError::Storage("lifecycle state poisoned".into()))?;
        let prev = *state;
        if !prev.can_transition_to(next) {
            return Err(GpwError::InvalidStateTransition {
                from: prev.to_string(),
                to: next.to_string(),
            });
        }
        *state = next;
        tracing::info!("Worker {} -> {}", prev, next);
        Ok(prev)
    }

    /// Jump from `Parsed` straight to `Activated` for a worker whose
    /// install and activation already happened in an earlier run
    pub fn resume(&self) -> GpwResult<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GpwError::Storage("lifecycle state poisoned".into()))?;
        if *state != WorkerState::Parsed {
            return Err(GpwError::InvalidStateTransition {
                from: state.to_string(),
                to: WorkerState::Activated.to_string(),
            });
        }
        *state = WorkerState::Activated;
        tracing::info!("Worker resumed as activated");
        Ok(())
    }

    /// Ask the host to activate without waiting for old clients to close
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn is_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }
}

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub bucket: String,
    /// Manifest entries stored
    pub cached: usize,
    /// Discovered assets stored
    pub discovered: usize,
    pub skip_waiting: bool,
}

/// Outcome of a successful activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub deleted: Vec<String>,
    pub claimed: usize,
}

/// Fetch every path. Fails on the first transport error or non-2xx answer.
async fn fetch_all(network: &dyn Network, paths: &[String]) -> GpwResult<Vec<(RequestIdentity, Response)>> {
    let fetches = paths.iter().map(|path| async move {
        let request = Request::get(path.clone());
        let response = network.fetch(&request).await.map_err(|e| GpwError::InstallFailed {
            url: path.clone(),
            reason: e.to_string(),
        })?;
        if !response.is_ok() {
            return Err(GpwError::InstallFailed {
                url: path.clone(),
                reason: format!("HTTP {}", response.status),
            });
        }
        Ok((request.identity(), response))
    });
    try_join_all(fetches).await
}

async fn store_all(bucket: &BucketHandle, fetched: Vec<(RequestIdentity, Response)>) -> GpwResult<usize> {
    let count = fetched.len();
    for (id, response) in fetched {
        bucket.put(&id, response).await?;
    }
    Ok(count)
}

/// Paths listed by the asset index. Any failure to obtain it is logged and
/// yields nothing.
async fn discover_assets(network: &dyn Network, config: &WorkerConfig) -> Vec<String> {
    let endpoint = &config.discovery.endpoint;
    let response = match network.fetch(&Request::get(endpoint.clone())).await {
        Ok(response) if response.is_ok() => response,
        Ok(response) => {
            tracing::warn!("Asset index {} answered {}, skipping discovery", endpoint, response.status);
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!("Asset index {} unreachable, skipping discovery: {}", endpoint, e);
            return Vec::new();
        }
    };

    match discovery::parse_index(&response.body) {
        Ok(paths) => discovery::select_assets(paths, &config.discovery.asset_prefix, &config.manifest),
        Err(e) => {
            tracing::warn!("Asset index {} unreadable, skipping discovery: {}", endpoint, e);
            Vec::new()
        }
    }
}

/// The whole manifest batch is fetched before the bucket is opened, so an
/// offline install never creates it.
async fn populate(caches: &CacheManager, network: &dyn Network, config: &WorkerConfig) -> GpwResult<InstallReport> {
    let manifest = fetch_all(network, config.manifest.paths()).await?;
    let bucket = caches.open(&config.version()).await?;
    let cached = store_all(&bucket, manifest).await?;
    tracing::debug!("Cached {} manifest entries in {}", cached, bucket.name());

    let mut discovered = 0;
    if config.discovery.enabled {
        let assets = discover_assets(network, config).await;
        if !assets.is_empty() {
            let fetched = fetch_all(network, &assets).await?;
            discovered = store_all(&bucket, fetched).await?;
            tracing::debug!("Cached {} discovered assets", discovered);
        }
    }

    Ok(InstallReport {
        bucket: bucket.name().to_string(),
        cached,
        discovered,
        skip_waiting: true,
    })
}

/// Whether the current bucket holds every manifest entry, i.e. a previous
/// install ran to completion.
pub async fn is_installed(caches: &CacheManager, config: &WorkerConfig) -> GpwResult<bool> {
    let name = config.version().bucket_name();
    if !caches.storage().has(&name).await? {
        return Ok(false);
    }
    let bucket = caches.open(&config.version()).await?;
    let keys: HashSet<RequestIdentity> = bucket.keys().await?.into_iter().collect();
    Ok(config
        .manifest
        .iter()
        .all(|path| keys.contains(&RequestIdentity::get(path))))
}

/// Pre-populate the current bucket and request skip-waiting.
/// Any failure leaves the worker redundant.
pub async fn install(
    lifecycle: &Lifecycle,
    caches: &CacheManager,
    network: &dyn Network,
    config: &WorkerConfig,
) -> GpwResult<InstallReport> {
    lifecycle.transition(WorkerState::Installing)?;

    let name = config.version().bucket_name();
    let existed = match caches.storage().has(&name).await {
        Ok(existed) => existed,
        Err(e) => {
            lifecycle.transition(WorkerState::Redundant)?;
            return Err(e);
        }
    };

    match populate(caches, network, config).await {
        Ok(report) => {
            lifecycle.skip_waiting();
            lifecycle.transition(WorkerState::Installed)?;
            Ok(report)
        }
        Err(e) => {
            tracing::error!("Install failed: {}", e);
            if !existed {
                discard(caches, &name).await;
            }
            lifecycle.transition(WorkerState::Redundant)?;
            Err(e)
        }
    }
}

/// Drop a bucket created by a failed install
async fn discard(caches: &CacheManager, name: &str) {
    match caches.storage().delete(name).await {
        Ok(true) => tracing::debug!("Discarded incomplete bucket {}", name),
        Ok(false) => {}
        Err(e) => tracing::warn!("Could not discard incomplete bucket {}: {}", name, e),
    }
}

/// Purge stale buckets and claim open clients. Both must succeed.
pub async fn activate(
    lifecycle: &Lifecycle,
    caches: &CacheManager,
    clients: &dyn ClientHost,
    config: &WorkerConfig,
) -> GpwResult<ActivationReport> {
    lifecycle.transition(WorkerState::Activating)?;

    let current = config.version().bucket_name();
    let (deleted, claimed) = tokio::join!(caches.delete_buckets_except(&current), clients.claim());

    match (deleted, claimed) {
        (Ok(deleted), Ok(claimed)) => {
            lifecycle.transition(WorkerState::Activated)?;
            if !deleted.is_empty() {
                tracing::info!("Deleted {} stale buckets", deleted.len());
            }
            Ok(ActivationReport { deleted, claimed })
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Activation failed: {}", e);
            lifecycle.transition(WorkerState::Installed)?;
            Err(e)
        }
    }
}
