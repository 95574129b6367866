// SPDX-License-Identifier: AGPL-3.0-or-later
//! Geo PWA Worker Core
//!
//! Core traits, types, and abstractions shared by the cache store, the
//! network providers and the worker itself.

pub mod error;
pub mod host;
pub mod manifest;
pub mod network;
pub mod request;
pub mod response;

pub use error::{GpwError, GpwResult};
pub use host::{ClientHost, ClientId, ClientInfo, NotificationData, NotificationHost, NotificationIntent};
pub use manifest::{CacheVersion, StaticManifest};
pub use network::Network;
pub use request::{Destination, Method, Request, RequestIdentity, RequestMode};
pub use response::Response;
