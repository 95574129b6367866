// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background work that must finish before the worker may stop

use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Set of spawned tasks the worker is kept alive for.
///
/// Tasks are never aborted; [`KeepAlive::settle`] waits them out.
#[derive(Clone, Default)]
pub struct KeepAlive {
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl KeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` and register it
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
    }

    /// Number of registered tasks still running
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .map(|p| p.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Wait for every registered task, including ones registered meanwhile
    pub async fn settle(&self) {
        loop {
            let handles = match self.pending.lock() {
                Ok(mut pending) => std::mem::take(&mut *pending),
                Err(_) => return,
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!("Background task failed: {}", e);
                }
            }
        }
    }
}
