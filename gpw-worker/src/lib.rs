// SPDX-License-Identifier: AGPL-3.0-or-later
//! Geo PWA offline worker
//!
//! Intercepts requests and answers them from a versioned cache, the network
//! or both, following a per-request strategy. Also turns push messages into
//! notifications and notification clicks into navigations.

pub mod config;
pub mod discovery;
pub mod host;
pub mod keepalive;
pub mod lifecycle;
pub mod notification;
pub mod resolver;
pub mod strategy;
pub mod worker;

pub use config::{CacheSettings, DiscoveryConfig, NetworkSettings, NotificationConfig, WorkerConfig};
pub use host::HeadlessHost;
pub use keepalive::KeepAlive;
pub use lifecycle::{ActivationReport, InstallReport, Lifecycle, WorkerState};
pub use notification::{NotificationClick, PushPayload};
pub use resolver::{resolve, OfflineFallback, RoutingPolicy, Strategy};
pub use strategy::{FetchContext, FetchOutcome, ResponseSource};
pub use worker::{Effect, Worker, WorkerBuilder, WorkerEvent};
