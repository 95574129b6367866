// SPDX-License-Identifier: AGPL-3.0-or-later
//! Network provider trait

use async_trait::async_trait;

use crate::{GpwResult, Request, Response};

/// Live network access.
///
/// A returned `Ok` means the transport succeeded; the response may still
/// carry a non-2xx status. Transport failures (offline, DNS, reset) are
/// reported as `GpwError::Network` or `GpwError::Timeout`.
#[async_trait]
pub trait Network: Send + Sync {
    fn id(&self) -> &str;

    async fn fetch(&self, request: &Request) -> GpwResult<Response>;
}
