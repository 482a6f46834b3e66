//! Capability boundary to the external TLS-fingerprinting engine.
//!
//! The bridge never performs a network exchange itself. It hands an
//! [`EngineRequest`] to an [`EngineClient`] obtained from an [`Engine`] and
//! gets back a raw [`EngineResponse`]. Session cookie jars and cipher state
//! live behind the client handle; the bridge only holds the handle.
//!
//! [`native::NativeEngine`] is a plain reqwest-backed implementation used for
//! development and tests. Real deployments plug in a fingerprinting engine.

pub mod native;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to create client: {0}")]
    ClientConstruction(String),

    #[error("request failed: {0}")]
    Network(String),

    #[error("engine returned no response")]
    EmptyResponse,

    #[error("failed to decompress body: {0}")]
    Decompression(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            EngineError::Network(format!("timed out: {error}"))
        } else if error.is_connect() {
            EngineError::Network(format!("connection failed: {error}"))
        } else {
            EngineError::Network(error.to_string())
        }
    }
}

/// Opaque engine tuning options.
///
/// Carried on every descriptor and forwarded to the engine unexamined. The
/// bridge must not branch on these values; each engine implementation honors
/// what it can and ignores the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ja3_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h2_settings: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudo_header_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_frames: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_http1: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catch_panics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_skip_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_decode: Option<String>,
}

/// Everything an engine needs to build a client for one descriptor.
#[derive(Debug, Clone, Default)]
pub struct ClientSpec {
    pub proxy: Option<String>,
    pub timeout: Option<Duration>,
    pub tuning: TuningOptions,
}

/// A cookie as exchanged across the engine boundary.
///
/// Scoping (domain, path, expiry) is the engine jar's concern; the bridge
/// only ever sets and reads name/value pairs against a request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct EngineRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    pub follow_redirects: bool,
}

/// Raw response as produced by the engine, before normalization.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub status: u16,
    /// Wire protocol label, e.g. `HTTP/1.1` or `HTTP/2.0`.
    pub protocol: String,
    /// Final resolved URL after any engine-internal redirect following.
    pub url: Url,
    /// Verbatim header multimap; repeated names appear as repeated pairs.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// True when the transport already decoded the declared content-encoding.
    pub decompressed: bool,
}

/// Factory for engine clients.
pub trait Engine: Send + Sync {
    /// Build a client honoring the spec's proxy, timeout and tuning options.
    fn create_client(&self, spec: &ClientSpec) -> Result<Arc<dyn EngineClient>, EngineError>;
}

/// One engine-held client: connection state plus a cookie jar.
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Perform the exchange. `Ok(None)` models an engine that completed
    /// without producing a response and is treated as a network failure.
    async fn execute(&self, request: EngineRequest) -> Result<Option<EngineResponse>, EngineError>;

    /// Merge cookies into the jar, scoped to the given URL.
    fn set_cookies(&self, url: &Url, cookies: Vec<Cookie>);

    /// Snapshot of the jar entries that apply to the given URL.
    fn cookies(&self, url: &Url) -> Vec<Cookie>;
}
