// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fetch strategies
//!
//! Each strategy takes an intercepted request and produces a response from
//! the current bucket, the network, or both. Writes are last-writer-wins
//! per identity.

use gpw_cache::BucketHandle;
use gpw_core::{Destination, GpwError, GpwResult, Network, Request, RequestIdentity, Response};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::keepalive::KeepAlive;
use crate::resolver::{OfflineFallback, Strategy};

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    /// The cached app shell standing in for the requested document
    Fallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Cache => write!(f, "cache"),
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Result of running a strategy
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub strategy: Strategy,
    pub source: ResponseSource,
    pub response: Response,
}

/// Everything a strategy works against for one fetch event
#[derive(Clone)]
pub struct FetchContext {
    pub bucket: BucketHandle,
    pub network: Arc<dyn Network>,
    pub app_shell: RequestIdentity,
    pub persist_cache_first: bool,
    pub keep_alive: KeepAlive,
}

impl Strategy {
    pub async fn execute(&self, request: &Request, ctx: &FetchContext) -> GpwResult<FetchOutcome> {
        let (source, response) = match *self {
            Strategy::CacheFirst { fallback } => cache_first(request, ctx, fallback).await?,
            Strategy::NetworkFirst => network_first(request, ctx).await?,
            Strategy::StaleWhileRevalidate => stale_while_revalidate(request, ctx).await?,
        };
        tracing::debug!("{} {} -> {} ({})", self, request.url, response.status, source);
        Ok(FetchOutcome {
            strategy: *self,
            source,
            response,
        })
    }
}

/// Bucket lookup that treats a corrupt entry as a miss and drops it
async fn lookup(bucket: &BucketHandle, id: &RequestIdentity) -> GpwResult<Option<Response>> {
    match bucket.get(id).await {
        Err(GpwError::CorruptEntry(e)) => {
            tracing::warn!("Dropping corrupt entry {}: {}", id, e);
            bucket.delete(id).await?;
            Ok(None)
        }
        other => other,
    }
}

/// Store a copy of a live response. A failed write never fails the fetch.
async fn store(bucket: &BucketHandle, id: &RequestIdentity, response: &Response) {
    if !id.is_cacheable() {
        return;
    }
    if let Err(e) = bucket.put(id, response.clone()).await {
        tracing::warn!("Could not cache {}: {}", id, e);
    }
}

async fn cache_first(
    request: &Request,
    ctx: &FetchContext,
    fallback: OfflineFallback,
) -> GpwResult<(ResponseSource, Response)> {
    let id = request.identity();
    if let Some(hit) = lookup(&ctx.bucket, &id).await? {
        return Ok((ResponseSource::Cache, hit));
    }

    match ctx.network.fetch(request).await {
        Ok(live) => {
            if ctx.persist_cache_first && live.is_ok() {
                store(&ctx.bucket, &id, &live).await;
            }
            Ok((ResponseSource::Network, live))
        }
        Err(e)
            if fallback == OfflineFallback::DocumentShell
                && request.destination == Destination::Document =>
        {
            tracing::debug!("Serving app shell for {}: {}", request.url, e);
            match lookup(&ctx.bucket, &ctx.app_shell).await? {
                Some(shell) => Ok((ResponseSource::Fallback, shell)),
                None => Err(GpwError::Unavailable(request.url.clone())),
            }
        }
        Err(e) => Err(e),
    }
}

async fn network_first(request: &Request, ctx: &FetchContext) -> GpwResult<(ResponseSource, Response)> {
    let id = request.identity();
    let live = match ctx.network.fetch(request).await {
        Ok(live) if live.is_ok() => {
            store(&ctx.bucket, &id, &live).await;
            return Ok((ResponseSource::Network, live));
        }
        Ok(live) => {
            tracing::debug!("{} answered {}, trying cache", request.url, live.status);
            Some(live)
        }
        Err(e) => {
            tracing::debug!("{} unreachable, trying cache: {}", request.url, e);
            None
        }
    };

    if let Some(hit) = lookup(&ctx.bucket, &id).await? {
        return Ok((ResponseSource::Cache, hit));
    }
    if let Some(shell) = lookup(&ctx.bucket, &ctx.app_shell).await? {
        return Ok((ResponseSource::Fallback, shell));
    }
    match live {
        Some(live) => Ok((ResponseSource::Network, live)),
        None => Err(GpwError::Unavailable(request.url.clone())),
    }
}

/// Fetch and, on 2xx, write into the bucket
async fn revalidate(network: Arc<dyn Network>, bucket: BucketHandle, request: Request) -> GpwResult<Response> {
    let id = request.identity();
    let live = network.fetch(&request).await?;
    if live.is_ok() {
        store(&bucket, &id, &live).await;
    }
    Ok(live)
}

async fn stale_while_revalidate(request: &Request, ctx: &FetchContext) -> GpwResult<(ResponseSource, Response)> {
    let id = request.identity();

    // The live fetch starts before the cache read and outlives this call.
    let (tx, rx) = oneshot::channel();
    {
        let network = ctx.network.clone();
        let bucket = ctx.bucket.clone();
        let request = request.clone();
        ctx.keep_alive.spawn(async move {
            let url = request.url.clone();
            let result = revalidate(network, bucket, request).await;
            if let Err(e) = &result {
                tracing::debug!("Background refresh of {} failed: {}", url, e);
            }
            let _ = tx.send(result);
        });
    }

    if let Some(hit) = lookup(&ctx.bucket, &id).await? {
        return Ok((ResponseSource::Cache, hit));
    }

    match rx.await {
        Ok(Ok(live)) => Ok((ResponseSource::Network, live)),
        _ => match lookup(&ctx.bucket, &id).await? {
            Some(hit) => Ok((ResponseSource::Cache, hit)),
            None => Err(GpwError::Unavailable(request.url.clone())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpw_cache::{CacheStorage, MemoryStorage};
    use gpw_core::Method;
    use gpw_net::MemoryNetwork;

    struct Fixture {
        net: Arc<MemoryNetwork>,
        ctx: FetchContext,
    }

    async fn fixture() -> Fixture {
        let storage = MemoryStorage::new();
        let bucket = storage.open("geo-pwa-cache-v1").await.unwrap();
        let net = Arc::new(MemoryNetwork::new());
        let ctx = FetchContext {
            bucket,
            network: net.clone(),
            app_shell: RequestIdentity::get("/index.html"),
            persist_cache_first: false,
            keep_alive: KeepAlive::new(),
        };
        Fixture { net, ctx }
    }

    async fn seed(ctx: &FetchContext, url: &str, body: &str) {
        ctx.bucket.put(&RequestIdentity::get(url), Response::ok(url, body.to_string())).await.unwrap();
    }

    async fn cached(ctx: &FetchContext, url: &str) -> Option<String> {
        ctx.bucket.get(&RequestIdentity::get(url)).await.unwrap().map(|r| r.text())
    }

    const CACHE_FIRST: Strategy = Strategy::CacheFirst {
        fallback: OfflineFallback::None,
    };
    const CACHE_FIRST_SHELL: Strategy = Strategy::CacheFirst {
        fallback: OfflineFallback::DocumentShell,
    };

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let Fixture { net, ctx } = fixture().await;
        seed(&ctx, "/manifest.json", "cached").await;
        net.route("/manifest.json", "live");

        let out = CACHE_FIRST.execute(&Request::get("/manifest.json"), &ctx).await.unwrap();
        assert_eq!(out.source, ResponseSource::Cache);
        assert_eq!(out.response.text(), "cached");
        assert!(net.fetched().is_empty());
    }

    #[tokio::test]
    async fn test_cache_first_miss_does_not_persist_by_default() {
        let Fixture { net, ctx } = fixture().await;
        net.route("/data.json", "live");

        let out = CACHE_FIRST.execute(&Request::get("/data.json"), &ctx).await.unwrap();
        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(out.response.text(), "live");
        assert_eq!(cached(&ctx, "/data.json").await, None);
    }

    #[tokio::test]
    async fn test_cache_first_persists_when_enabled() {
        let Fixture { net, mut ctx } = fixture().await;
        ctx.persist_cache_first = true;
        net.route("/data.json", "live");

        CACHE_FIRST.execute(&Request::get("/data.json"), &ctx).await.unwrap();
        assert_eq!(cached(&ctx, "/data.json").await.as_deref(), Some("live"));

        // Non-2xx is returned but not stored
        let out = CACHE_FIRST.execute(&Request::get("/gone.json"), &ctx).await.unwrap();
        assert_eq!(out.response.status, 404);
        assert_eq!(cached(&ctx, "/gone.json").await, None);
    }

    #[tokio::test]
    async fn test_cache_first_offline_navigation_gets_shell() {
        let Fixture { net, ctx } = fixture().await;
        seed(&ctx, "/index.html", "<shell>").await;
        net.set_online(false);

        let out = CACHE_FIRST_SHELL.execute(&Request::navigate("/missing.html"), &ctx).await.unwrap();
        assert_eq!(out.source, ResponseSource::Fallback);
        assert_eq!(out.response.text(), "<shell>");
    }

    #[tokio::test]
    async fn test_cache_first_offline_without_fallback_surfaces_error() {
        let Fixture { net, ctx } = fixture().await;
        seed(&ctx, "/index.html", "<shell>").await;
        net.set_online(false);

        // Fallback mode off
        let err = CACHE_FIRST.execute(&Request::navigate("/missing.html"), &ctx).await.unwrap_err();
        assert!(err.is_offline());

        // Fallback mode on, but not a document
        let req = Request::get("/tiles/1.png").with_destination(Destination::Image);
        let err = CACHE_FIRST_SHELL.execute(&req, &ctx).await.unwrap_err();
        assert!(err.is_offline());
    }

    #[tokio::test]
    async fn test_cache_first_offline_without_shell_is_unavailable() {
        let Fixture { net, ctx } = fixture().await;
        net.set_online(false);

        let err = CACHE_FIRST_SHELL.execute(&Request::navigate("/x"), &ctx).await.unwrap_err();
        assert!(matches!(err, GpwError::Unavailable(url) if url == "/x"));
    }

    #[tokio::test]
    async fn test_network_first_online_returns_and_stores_live() {
        let Fixture { net, ctx } = fixture().await;
        seed(&ctx, "/routes", "stale").await;
        net.route("/routes", "fresh");

        let out = Strategy::NetworkFirst.execute(&Request::navigate("/routes"), &ctx).await.unwrap();
        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(out.response.text(), "fresh");
        // Written before the response was handed back
        assert_eq!(cached(&ctx, "/routes").await.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_network_first_offline_uses_cached_entry() {
        let Fixture { net, ctx } = fixture().await;
        seed(&ctx, "/index.html", "<shell>").await;
        seed(&ctx, "/routes", "saved").await;
        net.set_online(false);

        let out = Strategy::NetworkFirst.execute(&Request::navigate("/routes"), &ctx).await.unwrap();
        assert_eq!(out.source, ResponseSource::Cache);
        assert_eq!(out.response.text(), "saved");
    }

    #[tokio::test]
    async fn test_network_first_offline_without_entry_gets_shell() {
        let Fixture { net, ctx } = fixture().await;
        seed(&ctx, "/index.html", "<shell>").await;
        net.set_online(false);

        let out = Strategy::NetworkFirst.execute(&Request::navigate("/never-seen"), &ctx).await.unwrap();
        assert_eq!(out.source, ResponseSource::Fallback);
        assert_eq!(out.response.text(), "<shell>");
    }

    #[tokio::test]
    async fn test_network_first_error_status() {
        let Fixture { net, ctx } = fixture().await;
        net.route_response(Response::new("/broken", 500, "oops"));

        // Nothing cached: the live error response is returned, not stored
        let out = Strategy::NetworkFirst.execute(&Request::navigate("/broken"), &ctx).await.unwrap();
        assert_eq!(out.response.status, 500);
        assert_eq!(cached(&ctx, "/broken").await, None);

        // A cached copy beats the error
        seed(&ctx, "/broken", "last good").await;
        let out = Strategy::NetworkFirst.execute(&Request::navigate("/broken"), &ctx).await.unwrap();
        assert_eq!(out.source, ResponseSource::Cache);
        assert_eq!(out.response.text(), "last good");
    }

    #[tokio::test]
    async fn test_network_first_offline_with_empty_bucket_is_unavailable() {
        let Fixture { net, ctx } = fixture().await;
        net.set_online(false);

        let err = Strategy::NetworkFirst.execute(&Request::navigate("/"), &ctx).await.unwrap_err();
        assert!(matches!(err, GpwError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_network_first_never_stores_non_get() {
        let Fixture { net, ctx } = fixture().await;
        net.route("/api/report", "accepted");

        let req = Request::navigate("/api/report").with_method(Method::Post);
        let out = Strategy::NetworkFirst.execute(&req, &ctx).await.unwrap();
        assert_eq!(out.response.text(), "accepted");
        assert!(ctx.bucket.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_swr_hit_returns_stale_then_refreshes() {
        let Fixture { net, ctx } = fixture().await;
        seed(&ctx, "/assets/app.js", "v1").await;
        net.route("/assets/app.js", "v2");
        net.hold();

        let req = Request::get("/assets/app.js").with_destination(Destination::Script);
        let out = Strategy::StaleWhileRevalidate.execute(&req, &ctx).await.unwrap();
        assert_eq!(out.source, ResponseSource::Cache);
        assert_eq!(out.response.text(), "v1");

        // The live fetch is still parked
        assert_eq!(cached(&ctx, "/assets/app.js").await.as_deref(), Some("v1"));

        net.release();
        ctx.keep_alive.settle().await;
        assert_eq!(cached(&ctx, "/assets/app.js").await.as_deref(), Some("v2"));
        assert_eq!(net.fetch_count("/assets/app.js"), 1);
    }

    #[tokio::test]
    async fn test_swr_miss_waits_for_network() {
        let Fixture { net, ctx } = fixture().await;
        net.route("/assets/map.css", "body{}");

        let req = Request::get("/assets/map.css").with_destination(Destination::Style);
        let out = Strategy::StaleWhileRevalidate.execute(&req, &ctx).await.unwrap();
        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(out.response.text(), "body{}");
        assert_eq!(cached(&ctx, "/assets/map.css").await.as_deref(), Some("body{}"));
    }

    #[tokio::test]
    async fn test_swr_miss_offline_is_unavailable() {
        let Fixture { net, ctx } = fixture().await;
        net.set_online(false);

        let req = Request::get("/assets/font.woff2").with_destination(Destination::Font);
        let err = Strategy::StaleWhileRevalidate.execute(&req, &ctx).await.unwrap_err();
        assert!(matches!(err, GpwError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_swr_failed_refresh_keeps_entry() {
        let Fixture { net, ctx } = fixture().await;
        seed(&ctx, "/assets/logo.png", "old").await;
        net.route_response(Response::new("/assets/logo.png", 503, "busy"));

        let req = Request::get("/assets/logo.png").with_destination(Destination::Image);
        let out = Strategy::StaleWhileRevalidate.execute(&req, &ctx).await.unwrap();
        assert_eq!(out.response.text(), "old");

        ctx.keep_alive.settle().await;
        assert_eq!(cached(&ctx, "/assets/logo.png").await.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_fragment_shares_identity() {
        let Fixture { net, ctx } = fixture().await;
        seed(&ctx, "/manifest.json", "cached").await;

        let out = CACHE_FIRST.execute(&Request::get("/manifest.json#v"), &ctx).await.unwrap();
        assert_eq!(out.response.text(), "cached");
        assert!(net.fetched().is_empty());
    }
}
