// SPDX-License-Identifier: AGPL-3.0-or-later
//! Strategy resolution
//!
//! Classifies an intercepted request into exactly one fetch strategy.

use gpw_core::Request;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What Cache-First substitutes when both cache and network fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfflineFallback {
    /// Surface the failure
    None,
    /// Serve the cached app shell to document requests
    DocumentShell,
}

/// Fetch strategy for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    CacheFirst { fallback: OfflineFallback },
    NetworkFirst,
    StaleWhileRevalidate,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::CacheFirst { .. } => write!(f, "cache-first"),
            Strategy::NetworkFirst => write!(f, "network-first"),
            Strategy::StaleWhileRevalidate => write!(f, "stale-while-revalidate"),
        }
    }
}

/// Request classification rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingPolicy {
    /// Navigations network-first, static assets stale-while-revalidate,
    /// everything else cache-first
    #[default]
    ByRequestType,
    /// Everything cache-first with the app shell as document fallback
    CacheFirstOnly,
}

/// Pick the strategy for `request`. Total over all requests.
pub fn resolve(request: &Request, policy: RoutingPolicy) -> Strategy {
    match policy {
        RoutingPolicy::CacheFirstOnly => Strategy::CacheFirst {
            fallback: OfflineFallback::DocumentShell,
        },
        RoutingPolicy::ByRequestType => {
            if request.is_navigation() {
                Strategy::NetworkFirst
            } else if request.destination.is_static_asset() {
                Strategy::StaleWhileRevalidate
            } else {
                Strategy::CacheFirst {
                    fallback: OfflineFallback::None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpw_core::{Destination, RequestMode};

    #[test]
    fn test_navigation_is_network_first() {
        let req = Request::navigate("/routes/42");
        assert_eq!(resolve(&req, RoutingPolicy::ByRequestType), Strategy::NetworkFirst);

        // Mode wins over destination
        let req = Request::get("/app.js")
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Script);
        assert_eq!(resolve(&req, RoutingPolicy::ByRequestType), Strategy::NetworkFirst);
    }

    #[test]
    fn test_static_assets_are_stale_while_revalidate() {
        for dest in [Destination::Style, Destination::Script, Destination::Image, Destination::Font] {
            let req = Request::get("/assets/x").with_destination(dest);
            assert_eq!(
                resolve(&req, RoutingPolicy::ByRequestType),
                Strategy::StaleWhileRevalidate,
                "{dest:?}"
            );
        }
    }

    #[test]
    fn test_everything_else_is_cache_first_without_fallback() {
        let expected = Strategy::CacheFirst {
            fallback: OfflineFallback::None,
        };
        for dest in [Destination::Document, Destination::Manifest, Destination::Empty, Destination::Other] {
            let req = Request::get("/data.json")
                .with_mode(RequestMode::Cors)
                .with_destination(dest);
            assert_eq!(resolve(&req, RoutingPolicy::ByRequestType), expected);
        }
    }

    #[test]
    fn test_cache_first_only_policy() {
        let expected = Strategy::CacheFirst {
            fallback: OfflineFallback::DocumentShell,
        };
        assert_eq!(resolve(&Request::navigate("/"), RoutingPolicy::CacheFirstOnly), expected);
        let req = Request::get("/a.css").with_destination(Destination::Style);
        assert_eq!(resolve(&req, RoutingPolicy::CacheFirstOnly), expected);
    }
}
