//! Wire types for the bridge API.
//!
//! The bridge speaks JSON over loopback HTTP/1.1:
//! - `POST /request` accepts one [`RequestDescriptor`] and returns one
//!   [`ResponseWrapper`]
//! - `POST /multirequest` accepts an array of descriptors and returns an
//!   array of wrappers, same length and order
//! - `GET /ping` returns the literal body `pong`
//!
//! A descriptor submission example (as JSON):
//!
//! ```json
//! {
//!   "url": "https://example.com/login",
//!   "method": "POST",
//!   "headers": {"Accept": "text/html"},
//!   "cookies": {"locale": "en"},
//!   "data": {"user": "a", "pass": "b"},
//!   "params": {"next": "/account"},
//!   "followRedirects": true,
//!   "wantHistory": true,
//!   "detectEncoding": true,
//!   "timeout": 30.0,
//!   "sessionId": "5b2c8f0e-...",
//!   "ja3String": "771,4865-4866-...,0-23-65281,29-23-24,0",
//!   "forceHttp1": false
//! }
//! ```
//!
//! Engine tuning fields ride alongside the bridge fields and are forwarded
//! unexamined; see [`TuningOptions`](crate::engine::TuningOptions).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::engine::{ClientSpec, TuningOptions};

/// Caller-supplied specification of one logical request.
///
/// Mutated in place by the redirect history walker: `url` and
/// `followRedirects` are rewritten between hops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    /// Literal text body, or a form object to urlencode. Wins over `json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// JSON payload; implies an `application/json` content type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    /// Multipart file fields, name to content.
    pub files: BTreeMap<String, String>,
    /// Marks `data` as base64 of raw bytes, decoded before dispatch.
    pub is_byte_request: bool,
    pub params: BTreeMap<String, String>,
    pub follow_redirects: bool,
    pub want_history: bool,
    pub detect_encoding: bool,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub tuning: TuningOptions,
}

impl Default for RequestDescriptor {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: "GET".to_string(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            data: None,
            json: None,
            files: BTreeMap::new(),
            is_byte_request: false,
            params: BTreeMap::new(),
            follow_redirects: true,
            want_history: false,
            detect_encoding: false,
            timeout: None,
            proxy: None,
            session_id: None,
            tuning: TuningOptions::default(),
        }
    }
}

impl RequestDescriptor {
    /// Session id, if one was supplied and non-empty.
    pub fn session(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn client_spec(&self) -> ClientSpec {
        ClientSpec {
            proxy: self.proxy.clone(),
            timeout: self
                .timeout
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
            tuning: self.tuning.clone(),
        }
    }
}

/// One normalized response. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord {
    pub id: String,
    /// Literal text, or base64 of the raw bytes when `isBase64` is set.
    pub body: String,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// HTTP status, or 0 when the dispatch itself failed.
    pub status: u16,
    /// Final resolved URL.
    pub target: String,
    pub used_protocol: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_base64: bool,
}

impl ResponseRecord {
    /// A status-0 record carrying a failure description in the body.
    pub fn error(session_id: Option<String>, message: impl fmt::Display) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            body: message.to_string(),
            cookies: BTreeMap::new(),
            headers: BTreeMap::new(),
            session_id,
            status: 0,
            target: String::new(),
            used_protocol: String::new(),
            is_base64: false,
        }
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// Wrapper for single and multirequest return types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseWrapper {
    pub is_history: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ResponseRecord>>,
}

impl ResponseWrapper {
    pub fn single(record: ResponseRecord) -> Self {
        Self {
            is_history: false,
            response: Some(record),
            history: None,
        }
    }

    pub fn history(records: Vec<ResponseRecord>) -> Self {
        Self {
            is_history: true,
            response: None,
            history: Some(records),
        }
    }

    /// The single logical outcome: the record, or a history's last element.
    pub fn terminal(&self) -> Option<&ResponseRecord> {
        match (&self.response, &self.history) {
            (Some(record), _) => Some(record),
            (None, Some(records)) => records.last(),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}
