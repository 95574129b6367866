// SPDX-License-Identifier: AGPL-3.0-or-later
//! CLI command implementations

use bytes::Bytes;
use chrono::{DateTime, Utc};
use console::style;
use gpw_cache::{BucketConfig, CacheManager, CacheStorage, MemoryStorage, SledStorage};
use gpw_core::{Destination, GpwError, GpwResult, Method, Network, Request, RequestMode};
use gpw_net::{HttpConfig, HttpNetwork, OfflineNetwork};
use gpw_worker::{Effect, HeadlessHost, NotificationClick, ResponseSource, Worker, WorkerConfig, WorkerEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};

const DEFAULT_CONFIG: &str = "gpw.toml";

/// Where buckets live for this run
enum StoreLocation {
    Disk(PathBuf),
    Memory,
}

/// Settings shared by every command
pub struct Context {
    config: WorkerConfig,
    store: StoreLocation,
    verbose: bool,
}

impl Context {
    pub fn load(config: Option<PathBuf>, store: Option<PathBuf>, ephemeral: bool, verbose: bool) -> GpwResult<Self> {
        let config = match config {
            Some(path) => WorkerConfig::load(&path)?,
            None if Path::new(DEFAULT_CONFIG).exists() => WorkerConfig::load(DEFAULT_CONFIG)?,
            None => WorkerConfig::default(),
        };

        let store = if ephemeral {
            StoreLocation::Memory
        } else {
            StoreLocation::Disk(store.unwrap_or_else(default_store_path))
        };

        tracing::debug!("Origin {}, bucket {}", config.origin, config.version());
        Ok(Self { config, store, verbose })
    }

    fn current_bucket(&self) -> String {
        self.config.version().bucket_name()
    }
}

fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("org", "geo-pwa", "gpw")
        .map(|d| d.cache_dir().join("buckets"))
        .unwrap_or_else(|| PathBuf::from("/tmp/gpw-cache"))
}

/// Opened bucket storage; durable stores are flushed before exit
struct Store {
    storage: Arc<dyn CacheStorage>,
    sled: Option<Arc<SledStorage>>,
}

impl Store {
    fn bucket_config(ctx: &Context) -> BucketConfig {
        BucketConfig {
            max_entries: ctx.config.cache.max_entries,
            ..Default::default()
        }
    }

    fn memory(ctx: &Context) -> Self {
        Self {
            storage: Arc::new(MemoryStorage::with_config(Self::bucket_config(ctx))),
            sled: None,
        }
    }

    fn open(ctx: &Context) -> GpwResult<Self> {
        let config = Self::bucket_config(ctx);
        match &ctx.store {
            StoreLocation::Memory => Ok(Self::memory(ctx)),
            StoreLocation::Disk(path) => {
                if ctx.verbose {
                    eprintln!("Store: {}", path.display());
                }
                let sled = Arc::new(SledStorage::open(path, config)?);
                Ok(Self {
                    storage: sled.clone(),
                    sled: Some(sled),
                })
            }
        }
    }

    async fn flush(&self) -> GpwResult<()> {
        if let Some(sled) = &self.sled {
            sled.flush().await?;
        }
        Ok(())
    }
}

fn network(ctx: &Context, offline: bool) -> GpwResult<Arc<dyn Network>> {
    if offline {
        return Ok(Arc::new(OfflineNetwork));
    }
    let network = HttpNetwork::new(HttpConfig {
        origin: ctx.config.origin.clone(),
        timeout: ctx.config.network.timeout(),
        headers: Vec::new(),
    })?;
    Ok(Arc::new(network))
}

fn worker(ctx: &Context, store: &Store, network: Arc<dyn Network>, host: Arc<HeadlessHost>) -> GpwResult<Worker> {
    Worker::builder(ctx.config.clone(), network)
        .storage(store.storage.clone())
        .clients(host.clone())
        .notifications(host)
        .build()
}

/// Format a timestamp for display
fn format_time(dt: Option<DateTime<Utc>>) -> String {
    dt.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_source(source: ResponseSource) -> String {
    match source {
        ResponseSource::Cache => style("cache").green().to_string(),
        ResponseSource::Network => style("network").cyan().to_string(),
        ResponseSource::Fallback => style("fallback").yellow().to_string(),
    }
}

fn format_status(status: u16) -> String {
    if (200..300).contains(&status) {
        style(status).green().to_string()
    } else {
        style(status).red().to_string()
    }
}

/// Install and activate against the configured origin
pub async fn install(ctx: &Context) -> GpwResult<()> {
    let store = Store::open(ctx)?;
    let worker = worker(ctx, &store, network(ctx, false)?, Arc::new(HeadlessHost::new()))?;

    if ctx.verbose {
        eprintln!("Installing from {}", ctx.config.origin);
    }

    let (installed, activated) = worker.start().await?;
    worker.settle().await;
    store.flush().await?;

    println!(
        "Installed {} ({} manifest entries, {} discovered assets)",
        style(&installed.bucket).bold(),
        installed.cached,
        installed.discovered
    );
    for name in &activated.deleted {
        println!("  {} {}", style("deleted").red(), name);
    }
    Ok(())
}

pub struct FetchOptions {
    pub navigate: bool,
    pub destination: Option<Destination>,
    pub method: Method,
    pub offline: bool,
    pub body: bool,
}

impl FetchOptions {
    fn request(&self, url: &str) -> Request {
        let mut request = if self.navigate {
            Request::navigate(url)
        } else {
            Request::get(url).with_mode(RequestMode::NoCors)
        };
        if let Some(destination) = self.destination {
            request = request.with_destination(destination);
        }
        request.with_method(self.method)
    }
}

/// Per-run tally of dispatched fetches
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub total: usize,
    pub failed: usize,
}

impl FetchSummary {
    pub fn all_served(&self) -> bool {
        self.failed == 0
    }
}

/// Dispatch fetch events through the worker
pub async fn fetch(ctx: &Context, urls: &[String], options: &FetchOptions) -> GpwResult<FetchSummary> {
    let store = Store::open(ctx)?;
    let worker = worker(ctx, &store, network(ctx, options.offline)?, Arc::new(HeadlessHost::new()))?;

    if !worker.resume().await? {
        if ctx.verbose {
            eprintln!("No installed bucket, installing first");
        }
        worker.start().await?;
    }

    let mut failed = 0;
    for url in urls {
        match worker.dispatch(WorkerEvent::Fetch(options.request(url))).await {
            Ok(Effect::Respond(outcome)) => {
                println!(
                    "{} {} {} via {} ({})",
                    format_status(outcome.response.status),
                    url,
                    format_source(outcome.source),
                    outcome.strategy,
                    bytesize::ByteSize(outcome.response.body_len())
                );
                if options.body {
                    println!("{}", outcome.response.text());
                }
            }
            Ok(other) => {
                println!("{} {} {:?}", style("?").yellow(), url, other);
            }
            Err(e) => {
                failed += 1;
                println!("{} {} {}", style("ERR").red(), url, e);
            }
        }
    }

    worker.settle().await;
    store.flush().await?;

    Ok(FetchSummary {
        total: urls.len(),
        failed,
    })
}

#[derive(Tabled)]
struct BucketRow {
    #[tabled(rename = "Bucket")]
    name: String,
    #[tabled(rename = "Entries")]
    entries: usize,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Newest")]
    newest: String,
    #[tabled(rename = "Current")]
    current: String,
}

/// List cache buckets
pub async fn buckets(ctx: &Context) -> GpwResult<()> {
    let store = Store::open(ctx)?;
    let caches = CacheManager::new(store.storage.clone());
    let stats = caches.stats(&ctx.current_bucket()).await?;

    if stats.is_empty() {
        println!("(no buckets)");
        return Ok(());
    }

    let rows: Vec<BucketRow> = stats
        .into_iter()
        .map(|s| BucketRow {
            name: s.name,
            entries: s.entries,
            size: bytesize::ByteSize(s.total_bytes).to_string(),
            newest: format_time(s.newest),
            current: if s.current {
                style("yes").green().to_string()
            } else {
                style("stale").red().to_string()
            },
        })
        .collect();

    println!("{}", Table::new(rows));

    if let Some(sled) = &store.sled {
        if let Ok(size) = sled.size_on_disk() {
            println!("On disk: {}", bytesize::ByteSize(size));
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Status")]
    status: u16,
    #[tabled(rename = "Type")]
    content_type: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Cached")]
    cached: String,
}

/// List the entries of one bucket in capture order
pub async fn entries(ctx: &Context, bucket: Option<&str>) -> GpwResult<()> {
    let store = Store::open(ctx)?;
    let name = bucket.map(str::to_string).unwrap_or_else(|| ctx.current_bucket());

    if !store.storage.has(&name).await? {
        return Err(GpwError::InvalidRequest(format!("no bucket named {name}")));
    }
    let bucket = store.storage.open(&name).await?;

    let mut rows = Vec::new();
    for id in bucket.keys().await? {
        if let Some(entry) = bucket.get_entry(&id).await? {
            rows.push(EntryRow {
                method: id.method.to_string(),
                url: id.url.clone(),
                status: entry.response.status,
                content_type: entry.response.content_type().unwrap_or("-").to_string(),
                size: bytesize::ByteSize(entry.size()).to_string(),
                cached: format_time(Some(entry.cached_at)),
            });
        }
    }

    if rows.is_empty() {
        println!("(empty bucket)");
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}

/// Delete stale buckets without running a full activation
pub async fn purge(ctx: &Context) -> GpwResult<()> {
    let store = Store::open(ctx)?;
    let caches = CacheManager::new(store.storage.clone());

    let deleted = caches.delete_buckets_except(&ctx.current_bucket()).await?;
    store.flush().await?;

    if deleted.is_empty() {
        println!("Nothing to purge");
    }
    for name in deleted {
        println!("{} {}", style("deleted").red(), name);
    }
    Ok(())
}

/// Feed a push message to the worker and print the notification
pub async fn push(ctx: &Context, payload: Option<&str>, click: bool) -> GpwResult<()> {
    // Push never reads buckets; leave the on-disk store unlocked
    let store = Store::memory(ctx);
    let host = Arc::new(HeadlessHost::new());
    let worker = worker(ctx, &store, Arc::new(OfflineNetwork), host.clone())?;

    let data = payload.map(|p| Bytes::from(p.to_string()));
    let (tag, intent) = match worker.dispatch(WorkerEvent::Push(data)).await? {
        Effect::Notified { tag, intent } => (tag, intent),
        other => return Err(GpwError::InvalidRequest(format!("push produced {other:?}"))),
    };

    println!("{}", serde_json::to_string_pretty(&intent)?);

    if click {
        let event = WorkerEvent::NotificationClick(NotificationClick {
            tag,
            data: Some(intent.data.clone()),
        });
        if let Effect::Navigated(id) = worker.dispatch(event).await? {
            println!("{} {} at {}", style("opened").green(), id, intent.data.url);
        }
    }
    Ok(())
}

/// Print the effective configuration as TOML
pub fn config(ctx: &Context) -> GpwResult<()> {
    print!("{}", ctx.config.to_toml_string()?);
    Ok(())
}
