//! Drives one descriptor through the engine.
//!
//! Every step of the flow (client resolution, request construction,
//! cookie merge, execution, normalization) is a possible failure point;
//! each failure is
//! converted to a status-0 [`ResponseRecord`] so the caller always receives
//! exactly one record per descriptor. No retries happen at this layer.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::normalize;
use crate::api::models::{RequestDescriptor, ResponseRecord};
use crate::engine::{Cookie, Engine, EngineClient, EngineError, EngineRequest};
use crate::observability::Metrics;
use crate::session::SessionRegistry;

pub struct Dispatcher {
    engine: Arc<dyn Engine>,
    sessions: Arc<SessionRegistry>,
    metrics: Arc<Metrics>,
}

/// A client resolved for one descriptor, with its session binding if any.
pub(crate) struct ResolvedClient {
    pub client: Arc<dyn EngineClient>,
    pub session_id: Option<String>,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<dyn Engine>,
        sessions: Arc<SessionRegistry>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            engine,
            sessions,
            metrics,
        }
    }

    pub(crate) fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Dispatch one descriptor end to end.
    pub async fn dispatch(&self, descriptor: &RequestDescriptor) -> ResponseRecord {
        let resolved = match self.resolve_client(descriptor) {
            Ok(resolved) => resolved,
            Err(error) => {
                self.metrics.engine_error();
                return ResponseRecord::error(
                    descriptor.session().map(str::to_owned),
                    error,
                );
            }
        };

        self.dispatch_on(&resolved, descriptor).await
    }

    /// Resolve the client a descriptor runs on: the session-bound client for
    /// its id (created lazily on first use), or a fresh ephemeral client.
    pub(crate) fn resolve_client(
        &self,
        descriptor: &RequestDescriptor,
    ) -> Result<ResolvedClient, EngineError> {
        match descriptor.session() {
            Some(id) => {
                let spec = descriptor.client_spec();
                let client = self.sessions.get_or_create(id, || {
                    self.metrics.session_created();
                    self.engine.create_client(&spec)
                })?;
                Ok(ResolvedClient {
                    client,
                    session_id: Some(id.to_string()),
                })
            }
            None => Ok(ResolvedClient {
                client: self.engine.create_client(&descriptor.client_spec())?,
                session_id: None,
            }),
        }
    }

    /// Dispatch one descriptor on an already-resolved client. The walker
    /// uses this to keep one client (and jar) across every hop of a walk.
    pub(crate) async fn dispatch_on(
        &self,
        resolved: &ResolvedClient,
        descriptor: &RequestDescriptor,
    ) -> ResponseRecord {
        let session = resolved.session_id.clone();

        let request = match build_request(descriptor) {
            Ok(request) => request,
            Err(error) => {
                self.metrics.engine_error();
                return ResponseRecord::error(session, error);
            }
        };

        if !descriptor.cookies.is_empty() {
            let cookies = descriptor
                .cookies
                .iter()
                .map(|(name, value)| Cookie {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect();
            resolved.client.set_cookies(&request.url, cookies);
        }

        debug!(method = %request.method, url = %request.url, "dispatching");

        let response = match resolved.client.execute(request).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                self.metrics.engine_error();
                return ResponseRecord::error(session, EngineError::EmptyResponse);
            }
            Err(error) => {
                self.metrics.engine_error();
                return ResponseRecord::error(session, error);
            }
        };

        let jar = resolved.client.cookies(&response.url);
        self.metrics.request_dispatched();

        match normalize::build_record(response, jar, descriptor.detect_encoding, session.clone()) {
            Ok(record) => record,
            Err(error) => {
                self.metrics.engine_error();
                ResponseRecord::error(session, error)
            }
        }
    }
}

/// Build the underlying engine request from method/URL/body/headers/params.
pub(crate) fn build_request(
    descriptor: &RequestDescriptor,
) -> Result<EngineRequest, EngineError> {
    if descriptor.url.is_empty() {
        return Err(EngineError::InvalidRequest("missing url".to_string()));
    }

    let mut url = Url::parse(&descriptor.url)
        .map_err(|e| EngineError::InvalidRequest(format!("invalid url {:?}: {e}", descriptor.url)))?;

    if !descriptor.params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in &descriptor.params {
            pairs.append_pair(name, value);
        }
    }

    let method = Method::from_bytes(descriptor.method.to_ascii_uppercase().as_bytes())
        .map_err(|_| {
            EngineError::InvalidRequest(format!("invalid method {:?}", descriptor.method))
        })?;

    let (body, implied_content_type) = build_body(descriptor)?;

    let mut headers: Vec<(String, String)> = descriptor
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    // implied content type only when the caller didn't set one
    if let Some(content_type) = implied_content_type {
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("Content-Type".to_string(), content_type));
        }
    }

    Ok(EngineRequest {
        method,
        url,
        headers,
        body,
        follow_redirects: descriptor.follow_redirects,
    })
}

/// Resolve the body payload and the content type it implies.
///
/// Precedence follows the wire contract: `data` wins, then `files`, then
/// `json`.
fn build_body(
    descriptor: &RequestDescriptor,
) -> Result<(Option<Bytes>, Option<String>), EngineError> {
    if let Some(data) = &descriptor.data {
        return match data {
            Value::String(text) if descriptor.is_byte_request => {
                let raw = BASE64.decode(text.as_bytes()).map_err(|e| {
                    EngineError::InvalidRequest(format!("invalid base64 byte body: {e}"))
                })?;
                Ok((Some(Bytes::from(raw)), None))
            }
            Value::String(text) => Ok((Some(Bytes::from(text.clone())), None)),
            Value::Object(fields) => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (name, value) in fields {
                    match value {
                        Value::String(text) => serializer.append_pair(name, text),
                        other => serializer.append_pair(name, &other.to_string()),
                    };
                }
                Ok((
                    Some(Bytes::from(serializer.finish())),
                    Some("application/x-www-form-urlencoded".to_string()),
                ))
            }
            _ => Err(EngineError::InvalidRequest(
                "data must be a string or an object".to_string(),
            )),
        };
    }

    if !descriptor.files.is_empty() {
        let (body, content_type) = multipart_body(&descriptor.files);
        return Ok((Some(body), Some(content_type)));
    }

    if let Some(json) = &descriptor.json {
        let text = match json {
            Value::String(raw) => raw.clone(),
            other => serde_json::to_string(other)
                .map_err(|e| EngineError::InvalidRequest(format!("invalid json body: {e}")))?,
        };
        return Ok((Some(Bytes::from(text)), Some("application/json".to_string())));
    }

    Ok((None, None))
}

fn multipart_body(files: &std::collections::BTreeMap<String, String>) -> (Bytes, String) {
    let boundary = format!("relaybox-{}", Uuid::new_v4().simple());
    let mut body = String::new();
    for (field, content) in files {
        body.push_str(&format!("--{boundary}\r\n"));
        body.push_str(&format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{field}\"\r\n"
        ));
        body.push_str("Content-Type: application/octet-stream\r\n\r\n");
        body.push_str(content);
        body.push_str("\r\n");
    }
    body.push_str(&format!("--{boundary}--\r\n"));
    (
        Bytes::from(body),
        format!("multipart/form-data; boundary={boundary}"),
    )
}
