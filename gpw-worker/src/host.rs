// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host without a display
//!
//! Stands in for the browser side when the worker runs from the CLI or in
//! tests: clients are plain records and notifications are logged.

use async_trait::async_trait;
use gpw_core::{ClientHost, ClientId, ClientInfo, GpwError, GpwResult, NotificationHost, NotificationIntent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct HostState {
    clients: Vec<ClientInfo>,
    claimed: usize,
    shown: Vec<(String, NotificationIntent)>,
    closed: Vec<String>,
    focused: Vec<ClientId>,
}

/// Recording client and notification host
#[derive(Default)]
pub struct HeadlessHost {
    state: Mutex<HostState>,
    next_id: AtomicU64,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut HostState) -> T) -> GpwResult<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GpwError::Storage("host state poisoned".into()))?;
        Ok(f(&mut *state))
    }

    fn read<T: Default>(&self, f: impl FnOnce(&HostState) -> T) -> T {
        self.state.lock().map(|s| f(&*s)).unwrap_or_default()
    }

    fn next_client_id(&self) -> ClientId {
        ClientId(format!("client-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    /// Register an already open, uncontrolled client
    pub fn add_client(&self, url: &str) -> ClientId {
        let id = self.next_client_id();
        let info = ClientInfo {
            id: id.clone(),
            url: url.to_string(),
            focused: false,
        };
        let _ = self.with_state(|s| s.clients.push(info));
        id
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.read(|s| s.clients.clone())
    }

    /// Clients taken over by the last claim
    pub fn claimed(&self) -> usize {
        self.read(|s| s.claimed)
    }

    pub fn shown(&self) -> Vec<(String, NotificationIntent)> {
        self.read(|s| s.shown.clone())
    }

    pub fn closed(&self) -> Vec<String> {
        self.read(|s| s.closed.clone())
    }

    pub fn focused(&self) -> Vec<ClientId> {
        self.read(|s| s.focused.clone())
    }
}

#[async_trait]
impl ClientHost for HeadlessHost {
    async fn claim(&self) -> GpwResult<usize> {
        let claimed = self.with_state(|s| {
            s.claimed = s.clients.len();
            s.claimed
        })?;
        tracing::debug!("Claimed {} clients", claimed);
        Ok(claimed)
    }

    async fn list(&self) -> GpwResult<Vec<ClientInfo>> {
        self.with_state(|s| s.clients.clone())
    }

    async fn focus(&self, id: &ClientId) -> GpwResult<()> {
        self.with_state(|s| {
            for client in &mut s.clients {
                client.focused = client.id == *id;
            }
            s.focused.push(id.clone());
        })
    }

    async fn open_window(&self, url: &str) -> GpwResult<ClientId> {
        let id = self.next_client_id();
        let info = ClientInfo {
            id: id.clone(),
            url: url.to_string(),
            focused: true,
        };
        self.with_state(|s| {
            for client in &mut s.clients {
                client.focused = false;
            }
            s.clients.push(info);
        })?;
        tracing::info!("Opened window {} at {}", id, url);
        Ok(id)
    }
}

#[async_trait]
impl NotificationHost for HeadlessHost {
    async fn show(&self, intent: &NotificationIntent) -> GpwResult<String> {
        let tag = self.with_state(|s| {
            let tag = format!("notification-{}", s.shown.len() + 1);
            s.shown.push((tag.clone(), intent.clone()));
            tag
        })?;
        tracing::info!("[{}] {}: {} -> {}", tag, intent.title, intent.body, intent.data.url);
        Ok(tag)
    }

    async fn close(&self, tag: &str) -> GpwResult<()> {
        self.with_state(|s| s.closed.push(tag.to_string()))
    }
}
