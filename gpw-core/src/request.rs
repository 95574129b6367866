// SPDX-License-Identifier: AGPL-3.0-or-later
//! Intercepted requests and their cache identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{GpwError, GpwResult};

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Default for Method {
    fn default() -> Self {
        Self::Get
    }
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl FromStr for Method {
    type Err = GpwError;

    fn from_str(s: &str) -> GpwResult<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(GpwError::InvalidRequest(format!("unknown method {other}"))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document load
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
}

impl Default for RequestMode {
    fn default() -> Self {
        Self::NoCors
    }
}

/// What the requested resource will be used as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    Document,
    Style,
    Script,
    Image,
    Font,
    Manifest,
    Empty,
    Other,
}

impl Default for Destination {
    fn default() -> Self {
        Self::Empty
    }
}

impl Destination {
    /// Subresources the page renders with (styles, scripts, images, fonts)
    pub fn is_static_asset(&self) -> bool {
        matches!(self, Self::Style | Self::Script | Self::Image | Self::Font)
    }
}

impl FromStr for Destination {
    type Err = GpwError;

    fn from_str(s: &str) -> GpwResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "style" => Ok(Self::Style),
            "script" => Ok(Self::Script),
            "image" => Ok(Self::Image),
            "font" => Ok(Self::Font),
            "manifest" => Ok(Self::Manifest),
            "" | "empty" => Ok(Self::Empty),
            "other" => Ok(Self::Other),
            other => Err(GpwError::InvalidRequest(format!("unknown destination {other}"))),
        }
    }
}

/// Normalized key addressing an entry in a bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestIdentity {
    pub method: Method,
    pub url: String,
}

impl RequestIdentity {
    /// Build an identity, dropping any `#fragment` from the URL.
    pub fn new(method: Method, url: impl AsRef<str>) -> Self {
        let url = url.as_ref();
        let url = url.split_once('#').map(|(u, _)| u).unwrap_or(url);
        Self {
            method,
            url: url.to_string(),
        }
    }

    /// Identity of a plain GET for `url`
    pub fn get(url: impl AsRef<str>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Only GET identities may be stored in a bucket.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::Get
    }

    /// Stable string form used as a storage key
    pub fn to_key(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    pub fn parse_key(key: &str) -> Option<Self> {
        let (method, url) = key.split_once(' ')?;
        let method = method.parse().ok()?;
        Some(Self::new(method, url))
    }
}

impl fmt::Display for RequestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A request intercepted by the worker. Consumed once per fetch event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub url: String,
    #[serde(default)]
    pub mode: RequestMode,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            mode: RequestMode::default(),
            destination: Destination::default(),
            headers: Vec::new(),
        }
    }

    /// A top-level document navigation
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::get(url)
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn identity(&self) -> RequestIdentity {
        RequestIdentity::new(self.method, &self.url)
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}
