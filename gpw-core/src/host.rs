// SPDX-License-Identifier: AGPL-3.0-or-later
//! Host platform seams: controlled clients and notification display

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::GpwResult;

/// Identifier of an open application instance (tab or window)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A window client as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub url: String,
    pub focused: bool,
}

/// The set of open clients. Not owned by the worker.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// Take control of every open client without a reload.
    async fn claim(&self) -> GpwResult<usize>;

    async fn list(&self) -> GpwResult<Vec<ClientInfo>>;

    async fn focus(&self, id: &ClientId) -> GpwResult<()>;

    async fn open_window(&self, url: &str) -> GpwResult<ClientId>;
}

/// Data carried alongside a notification, not shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    pub url: String,
}

/// A notification ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationIntent {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub data: NotificationData,
}

/// Notification display surface
#[async_trait]
pub trait NotificationHost: Send + Sync {
    /// Show a notification, returning a tag the host can close it by.
    async fn show(&self, intent: &NotificationIntent) -> GpwResult<String>;

    async fn close(&self, tag: &str) -> GpwResult<()>;
}
