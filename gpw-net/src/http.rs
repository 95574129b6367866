// SPDX-License-Identifier: AGPL-3.0-or-later
//! Live HTTP network via reqwest

use async_trait::async_trait;
use gpw_core::{GpwError, GpwResult, Method, Network, Request, Response};
use reqwest::Client;
use std::time::Duration;

use crate::resolve_url;

/// HTTP network configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Origin root-relative URLs are resolved against
    pub origin: String,
    /// Whole-request timeout
    pub timeout: Option<Duration>,
    /// Headers added to every request
    pub headers: Vec<(String, String)>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".into(),
            timeout: Some(Duration::from_secs(30)),
            headers: Vec::new(),
        }
    }
}

/// Network backed by a reqwest client
pub struct HttpNetwork {
    config: HttpConfig,
    http: Client,
}

impl HttpNetwork {
    pub fn new(config: HttpConfig) -> GpwResult<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| GpwError::Config(e.to_string()))?;
        Ok(Self { config, http })
    }

    pub fn origin(&self) -> &str {
        &self.config.origin
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Options => reqwest::Method::OPTIONS,
        }
    }
}

fn transport_err(e: reqwest::Error) -> GpwError {
    if e.is_timeout() {
        GpwError::Timeout
    } else {
        GpwError::Network(e.to_string())
    }
}

#[async_trait]
impl Network for HttpNetwork {
    fn id(&self) -> &str {
        "http"
    }

    async fn fetch(&self, request: &Request) -> GpwResult<Response> {
        let url = resolve_url(&self.config.origin, &request.url);
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self.http.request(Self::method(request.method), &url);
        for (key, value) in self.config.headers.iter().chain(request.headers.iter()) {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(transport_err)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await.map_err(transport_err)?;

        Ok(Response {
            url: request.url.clone(),
            status,
            headers,
            body,
        })
    }
}
