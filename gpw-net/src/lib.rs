// SPDX-License-Identifier: AGPL-3.0-or-later
//! Network providers for the Geo PWA worker
//!
//! - http: live HTTP through reqwest (default feature)
//! - memory: scripted responses with an online/offline switch
//! - offline: every fetch fails

#[cfg(feature = "http")]
mod http;
mod memory;

#[cfg(feature = "http")]
pub use http::{HttpConfig, HttpNetwork};
pub use memory::MemoryNetwork;

use async_trait::async_trait;
use gpw_core::{GpwError, GpwResult, Network, Request, Response};

/// Network that is never reachable
#[derive(Debug, Clone, Default)]
pub struct OfflineNetwork;

#[async_trait]
impl Network for OfflineNetwork {
    fn id(&self) -> &str {
        "offline"
    }

    async fn fetch(&self, request: &Request) -> GpwResult<Response> {
        Err(GpwError::Network(format!("offline: {}", request.url)))
    }
}

/// Resolve a root-relative URL against `origin`; absolute URLs pass through.
pub fn resolve_url(origin: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with('/') {
        format!("{}{}", origin.trim_end_matches('/'), url)
    } else {
        format!("{}/{}", origin.trim_end_matches('/'), url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        assert_eq!(resolve_url("http://localhost:8080", "/index.html"), "http://localhost:8080/index.html");
        assert_eq!(resolve_url("http://localhost:8080/", "/"), "http://localhost:8080/");
        assert_eq!(resolve_url("http://localhost:8080", "icons/a.png"), "http://localhost:8080/icons/a.png");
        assert_eq!(resolve_url("http://localhost:8080", "https://tile.osm.org/1/2/3.png"), "https://tile.osm.org/1/2/3.png");
    }

    #[tokio::test]
    async fn test_offline_network_always_fails() {
        let err = OfflineNetwork.fetch(&Request::get("/")).await.unwrap_err();
        assert!(err.is_offline());
    }
}
