// SPDX-License-Identifier: AGPL-3.0-or-later
//! Event dispatch
//!
//! The host hands every event to [`Worker::dispatch`]; each event kind has
//! one handler and yields one [`Effect`].

use bytes::Bytes;
use gpw_cache::{CacheManager, CacheStorage, MemoryStorage};
use gpw_core::{
    ClientHost, ClientId, GpwError, GpwResult, Network, NotificationHost, NotificationIntent, Request,
    RequestIdentity, Response,
};
use std::sync::Arc;

use crate::config::WorkerConfig;
use crate::host::HeadlessHost;
use crate::keepalive::KeepAlive;
use crate::lifecycle::{self, ActivationReport, InstallReport, Lifecycle, WorkerState};
use crate::notification::{self, NotificationClick};
use crate::resolver;
use crate::strategy::{FetchContext, FetchOutcome};

/// Events delivered by the host
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    /// Push message with its raw body, if any
    Push(Option<Bytes>),
    NotificationClick(NotificationClick),
}

/// What handling an event produced
#[derive(Debug, Clone)]
pub enum Effect {
    Installed(InstallReport),
    Activated(ActivationReport),
    /// Answered by a fetch strategy
    Respond(FetchOutcome),
    /// Forwarded to the network untouched; the worker is not active yet
    PassThrough(Response),
    Notified { tag: String, intent: NotificationIntent },
    Navigated(ClientId),
}

/// The offline worker
pub struct Worker {
    config: Arc<WorkerConfig>,
    caches: CacheManager,
    network: Arc<dyn Network>,
    clients: Arc<dyn ClientHost>,
    notifications: Arc<dyn NotificationHost>,
    lifecycle: Lifecycle,
    keep_alive: KeepAlive,
}

impl Worker {
    pub fn builder(config: WorkerConfig, network: Arc<dyn Network>) -> WorkerBuilder {
        WorkerBuilder {
            config,
            network,
            storage: None,
            clients: None,
            notifications: None,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn caches(&self) -> &CacheManager {
        &self.caches
    }

    pub fn state(&self) -> WorkerState {
        self.lifecycle.state()
    }

    pub fn is_skip_waiting(&self) -> bool {
        self.lifecycle.is_skip_waiting()
    }

    /// Handle one event
    pub async fn dispatch(&self, event: WorkerEvent) -> GpwResult<Effect> {
        match event {
            WorkerEvent::Install => self.on_install().await,
            WorkerEvent::Activate => self.on_activate().await,
            WorkerEvent::Fetch(request) => self.on_fetch(request).await,
            WorkerEvent::Push(data) => self.on_push(data).await,
            WorkerEvent::NotificationClick(click) => self.on_notification_click(click).await,
        }
    }

    /// Wait for all background work started by earlier events
    pub async fn settle(&self) {
        self.keep_alive.settle().await;
    }

    /// Resume as activated when a previous run completed the install of the
    /// current bucket. Returns whether the worker resumed.
    pub async fn resume(&self) -> GpwResult<bool> {
        if !lifecycle::is_installed(&self.caches, &self.config).await? {
            return Ok(false);
        }
        self.lifecycle.resume()?;
        Ok(true)
    }

    /// Install, then activate straight away (skip-waiting)
    pub async fn start(&self) -> GpwResult<(InstallReport, ActivationReport)> {
        let installed = match self.dispatch(WorkerEvent::Install).await? {
            Effect::Installed(report) => report,
            other => return Err(unexpected("install", &other)),
        };
        let activated = match self.dispatch(WorkerEvent::Activate).await? {
            Effect::Activated(report) => report,
            other => return Err(unexpected("activate", &other)),
        };
        Ok((installed, activated))
    }

    async fn on_install(&self) -> GpwResult<Effect> {
        let report = lifecycle::install(&self.lifecycle, &self.caches, self.network.as_ref(), &self.config).await?;
        Ok(Effect::Installed(report))
    }

    async fn on_activate(&self) -> GpwResult<Effect> {
        let report = lifecycle::activate(&self.lifecycle, &self.caches, self.clients.as_ref(), &self.config).await?;
        Ok(Effect::Activated(report))
    }

    async fn on_fetch(&self, request: Request) -> GpwResult<Effect> {
        if self.lifecycle.state() != WorkerState::Activated {
            tracing::debug!("Not active, passing {} through", request.url);
            return Ok(Effect::PassThrough(self.network.fetch(&request).await?));
        }

        let strategy = resolver::resolve(&request, self.config.routing);
        let ctx = FetchContext {
            bucket: self.caches.open(&self.config.version()).await?,
            network: self.network.clone(),
            app_shell: RequestIdentity::get(&self.config.app_shell),
            persist_cache_first: self.config.persist_cache_first,
            keep_alive: self.keep_alive.clone(),
        };
        Ok(Effect::Respond(strategy.execute(&request, &ctx).await?))
    }

    async fn on_push(&self, data: Option<Bytes>) -> GpwResult<Effect> {
        let (tag, intent) = notification::handle_push(
            data.as_deref(),
            &self.config.notification,
            self.notifications.as_ref(),
        )
        .await?;
        Ok(Effect::Notified { tag, intent })
    }

    async fn on_notification_click(&self, click: NotificationClick) -> GpwResult<Effect> {
        let client = notification::handle_click(
            &click,
            &self.config.notification,
            self.notifications.as_ref(),
            self.clients.as_ref(),
        )
        .await?;
        Ok(Effect::Navigated(client))
    }
}

fn unexpected(event: &str, effect: &Effect) -> GpwError {
    GpwError::InvalidRequest(format!("{event} produced {effect:?}"))
}

/// Assembles a [`Worker`]. Storage defaults to in-memory buckets and both
/// hosts to a shared [`HeadlessHost`].
pub struct WorkerBuilder {
    config: WorkerConfig,
    network: Arc<dyn Network>,
    storage: Option<Arc<dyn CacheStorage>>,
    clients: Option<Arc<dyn ClientHost>>,
    notifications: Option<Arc<dyn NotificationHost>>,
}

impl WorkerBuilder {
    pub fn storage(mut self, storage: Arc<dyn CacheStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clients(mut self, clients: Arc<dyn ClientHost>) -> Self {
        self.clients = Some(clients);
        self
    }

    pub fn notifications(mut self, notifications: Arc<dyn NotificationHost>) -> Self {
        self.notifications = Some(notifications);
        self
    }

    pub fn build(self) -> GpwResult<Worker> {
        self.config.validate()?;

        let headless = Arc::new(HeadlessHost::new());
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()) as Arc<dyn CacheStorage>);
        let clients = self
            .clients
            .unwrap_or_else(|| headless.clone() as Arc<dyn ClientHost>);
        let notifications = self
            .notifications
            .unwrap_or_else(|| headless as Arc<dyn NotificationHost>);

        Ok(Worker {
            config: Arc::new(self.config),
            caches: CacheManager::new(storage),
            network: self.network,
            clients,
            notifications,
            lifecycle: Lifecycle::new(),
            keep_alive: KeepAlive::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{RoutingPolicy, Strategy};
    use crate::strategy::ResponseSource;
    use gpw_cache::SledStorage;
    use gpw_core::{Destination, NotificationData};
    use gpw_net::MemoryNetwork;

    struct Harness {
        net: Arc<MemoryNetwork>,
        host: Arc<HeadlessHost>,
        worker: Worker,
    }

    fn harness_with(config: WorkerConfig, storage: Arc<dyn CacheStorage>) -> Harness {
        let net = Arc::new(MemoryNetwork::new());
        for path in config.manifest.iter() {
            net.route(path, format!("{path} v1"));
        }
        let host = Arc::new(HeadlessHost::new());
        let worker = Worker::builder(config, net.clone())
            .storage(storage)
            .clients(host.clone())
            .notifications(host.clone())
            .build()
            .unwrap();
        Harness { net, host, worker }
    }

    fn harness() -> Harness {
        harness_with(WorkerConfig::default(), Arc::new(MemoryStorage::new()))
    }

    async fn respond(worker: &Worker, request: Request) -> FetchOutcome {
        match worker.dispatch(WorkerEvent::Fetch(request)).await.unwrap() {
            Effect::Respond(outcome) => outcome,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_before_activation_passes_through() {
        let Harness { net, worker, .. } = harness();
        net.route("/index.html", "live");

        let effect = worker.dispatch(WorkerEvent::Fetch(Request::navigate("/index.html"))).await.unwrap();
        assert!(matches!(effect, Effect::PassThrough(ref r) if r.text() == "live"));
        assert!(worker.caches().storage().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_installs_and_activates() {
        let Harness { host, worker, .. } = harness();
        host.add_client("/");

        let (installed, activated) = worker.start().await.unwrap();
        assert_eq!(installed.cached, 11);
        assert!(worker.is_skip_waiting());
        assert!(activated.deleted.is_empty());
        assert_eq!(host.claimed(), 1);
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn test_offline_navigation_after_install() {
        let Harness { net, worker, .. } = harness();
        worker.start().await.unwrap();
        net.set_online(false);

        let out = respond(&worker, Request::navigate("/missing.html")).await;
        assert_eq!(out.strategy, Strategy::NetworkFirst);
        assert_eq!(out.source, ResponseSource::Fallback);
        assert_eq!(out.response.text(), "/index.html v1");

        let out = respond(&worker, Request::navigate("/manifest.json")).await;
        assert_eq!(out.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_cache_first_only_routing_serves_shell() {
        let config = WorkerConfig {
            routing: RoutingPolicy::CacheFirstOnly,
            ..WorkerConfig::default()
        };
        let Harness { net, worker, .. } = harness_with(config, Arc::new(MemoryStorage::new()));
        worker.start().await.unwrap();
        net.set_online(false);

        let out = respond(&worker, Request::navigate("/missing.html")).await;
        assert!(matches!(out.strategy, Strategy::CacheFirst { .. }));
        assert_eq!(out.response.text(), "/index.html v1");
    }

    #[tokio::test]
    async fn test_assets_refresh_in_background() {
        let Harness { net, worker, .. } = harness();
        worker.start().await.unwrap();
        net.route("/icons/192x192.png", "/icons/192x192.png v2");
        net.hold();

        let req = Request::get("/icons/192x192.png").with_destination(Destination::Image);
        let out = respond(&worker, req.clone()).await;
        assert_eq!(out.strategy, Strategy::StaleWhileRevalidate);
        assert_eq!(out.response.text(), "/icons/192x192.png v1");

        net.release();
        worker.settle().await;
        let out = respond(&worker, req).await;
        assert_eq!(out.response.text(), "/icons/192x192.png v2");
    }

    #[tokio::test]
    async fn test_freshness_online() {
        let Harness { net, worker, .. } = harness();
        worker.start().await.unwrap();
        net.route("/index.html", "/index.html v2");

        let out = respond(&worker, Request::navigate("/index.html")).await;
        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(out.response.text(), "/index.html v2");
    }

    #[tokio::test]
    async fn test_version_bump_purges_old_bucket() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let old = harness_with(WorkerConfig::default(), storage.clone());
        old.worker.start().await.unwrap();

        let mut config = WorkerConfig::default();
        config.cache.version = 2;
        let new = harness_with(config, storage.clone());
        let (_, activated) = new.worker.start().await.unwrap();

        assert_eq!(activated.deleted, vec!["geo-pwa-cache-v1"]);
        assert_eq!(storage.keys().await.unwrap(), vec!["geo-pwa-cache-v2"]);
    }

    #[tokio::test]
    async fn test_installed_bucket_survives_restart_with_sled() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = Arc::new(SledStorage::open(dir.path().join("db"), Default::default()).unwrap());
            let h = harness_with(WorkerConfig::default(), storage.clone());
            h.worker.start().await.unwrap();
            storage.flush().await.unwrap();
        }

        let storage = Arc::new(SledStorage::open(dir.path().join("db"), Default::default()).unwrap());
        assert_eq!(storage.keys().await.unwrap(), vec!["geo-pwa-cache-v1"]);

        let h = harness_with(WorkerConfig::default(), storage.clone());
        assert!(h.worker.resume().await.unwrap());
        h.net.set_online(false);
        let out = respond(&h.worker, Request::navigate("/routes/12")).await;
        assert_eq!(out.source, ResponseSource::Fallback);

        let caches = CacheManager::new(storage);
        let shell = caches
            .match_any(&RequestIdentity::get("/index.html"), Some("geo-pwa-cache-v1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(shell.text(), "/index.html v1");
    }

    #[tokio::test]
    async fn test_resume_needs_existing_bucket() {
        let Harness { worker, .. } = harness();
        assert!(!worker.resume().await.unwrap());
        assert_eq!(worker.state(), WorkerState::Parsed);
    }

    #[tokio::test]
    async fn test_failed_start_does_not_resume_later() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryStorage::new());
        let first = harness_with(WorkerConfig::default(), storage.clone());
        first.net.set_online(false);
        assert!(matches!(first.worker.start().await, Err(GpwError::InstallFailed { .. })));
        assert_eq!(first.worker.state(), WorkerState::Redundant);
        assert!(storage.keys().await.unwrap().is_empty());

        let second = harness_with(WorkerConfig::default(), storage.clone());
        assert!(!second.worker.resume().await.unwrap());
        assert_eq!(second.worker.state(), WorkerState::Parsed);

        second.worker.start().await.unwrap();
        let third = harness_with(WorkerConfig::default(), storage);
        assert!(third.worker.resume().await.unwrap());
        third.net.set_online(false);
        let out = respond(&third.worker, Request::navigate("/")).await;
        assert_eq!(out.source, ResponseSource::Cache);
        assert_eq!(out.response.text(), "/ v1");
    }

    #[tokio::test]
    async fn test_push_and_click() {
        let Harness { host, worker, .. } = harness();
        let data = Bytes::from_static(br#"{"title":"Trail update","url":"/routes/3"}"#);

        let (tag, intent) = match worker.dispatch(WorkerEvent::Push(Some(data))).await.unwrap() {
            Effect::Notified { tag, intent } => (tag, intent),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(intent.title, "Trail update");
        assert_eq!(intent.body, "New content is available.");

        let click = NotificationClick {
            tag: tag.clone(),
            data: Some(intent.data.clone()),
        };
        let effect = worker.dispatch(WorkerEvent::NotificationClick(click)).await.unwrap();
        let Effect::Navigated(id) = effect else {
            panic!("expected navigation");
        };
        assert_eq!(host.closed(), vec![tag]);
        assert!(host.clients().iter().any(|c| c.id == id && c.url == "/routes/3"));
    }

    #[tokio::test]
    async fn test_push_without_payload() {
        let Harness { worker, .. } = harness();
        let effect = worker.dispatch(WorkerEvent::Push(None)).await.unwrap();
        let Effect::Notified { intent, .. } = effect else {
            panic!("expected a notification");
        };
        assert_eq!(intent.title, "Geo PWA");
        assert_eq!(intent.data, NotificationData { url: "/".into() });
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = WorkerConfig {
            app_shell: "index.html".into(),
            ..WorkerConfig::default()
        };
        let result = Worker::builder(config, Arc::new(MemoryNetwork::new())).build();
        assert!(matches!(result, Err(GpwError::Config(_))));
    }
}
