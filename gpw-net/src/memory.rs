// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scripted in-memory network

use async_trait::async_trait;
use bytes::Bytes;
use gpw_core::{GpwError, GpwResult, Network, Request, Response};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

/// Network answering from a route table.
///
/// Unknown routes answer 404 while online. Going offline makes every fetch
/// fail at the transport level. `hold` parks fetches until `release`.
pub struct MemoryNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<Vec<String>>,
    online: AtomicBool,
    gate: watch::Sender<bool>,
    log: Mutex<Vec<Request>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            routes: Mutex::new(HashMap::new()),
            failing: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
            gate,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Serve `body` with status 200 at `url`
    pub fn route(&self, url: &str, body: impl Into<Bytes>) -> &Self {
        self.route_response(Response::ok(url, body))
    }

    pub fn route_response(&self, response: Response) -> &Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(response.url.clone(), response);
        }
        self
    }

    /// Make fetches of `url` fail at the transport level
    pub fn fail(&self, url: &str) -> &Self {
        if let Ok(mut failing) = self.failing.lock() {
            failing.push(url.to_string());
        }
        self
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Park every subsequent fetch until [`MemoryNetwork::release`]
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// URLs fetched so far, in order
    pub fn fetched(&self) -> Vec<String> {
        self.log
            .lock()
            .map(|log| log.iter().map(|r| r.url.clone()).collect())
            .unwrap_or_default()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetched().iter().filter(|u| *u == url).count()
    }
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    fn id(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, request: &Request) -> GpwResult<Response> {
        if let Ok(mut log) = self.log.lock() {
            log.push(request.clone());
        }

        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|e| GpwError::Network(e.to_string()))?;

        if !self.is_online() {
            return Err(GpwError::Network(format!("offline: {}", request.url)));
        }

        let failing = self
            .failing
            .lock()
            .map(|f| f.contains(&request.url))
            .unwrap_or(false);
        if failing {
            return Err(GpwError::Network(format!("connection reset: {}", request.url)));
        }

        let route = self
            .routes
            .lock()
            .ok()
            .and_then(|routes| routes.get(&request.url).cloned());
        Ok(route.unwrap_or_else(|| Response::new(request.url.clone(), 404, "Not Found")))
    }
}
