use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use http_body_util::BodyExt;
use serde::Serialize;
use tracing::debug;

use super::models::{RequestDescriptor, ResponseWrapper};
use super::state::AppState;
use crate::api::error::ApiError;
use crate::dispatch::{self, fanout};

/// Single dispatch endpoint (POST /request)
///
/// The request body is one RequestDescriptor. Any reachable outcome,
/// including a network or engine failure, returns HTTP 200 with a
/// ResponseWrapper; a failed dispatch is a status-0 record inside it.
/// Only an unreadable or malformed body is a transport error.
pub async fn submit_request(
    State(state): State<AppState>,
    body: axum::body::Body,
) -> Result<Response, ApiError> {
    let body_bytes = read_body(body, state.config.server.max_payload_bytes).await?;
    let descriptor: RequestDescriptor = serde_json::from_slice(&body_bytes)?;

    let wrapper = dispatch::execute(&state.dispatcher, descriptor).await;

    into_json(&wrapper)
}

/// Batch dispatch endpoint (POST /multirequest)
///
/// The request body is a JSON array of RequestDescriptors. Descriptors are
/// dispatched concurrently; the response array has the same length and
/// order as the input, whatever order individual dispatches complete in.
pub async fn submit_multirequest(
    State(state): State<AppState>,
    body: axum::body::Body,
) -> Result<Response, ApiError> {
    let body_bytes = read_body(body, state.config.server.max_payload_bytes).await?;
    let descriptors: Vec<RequestDescriptor> = serde_json::from_slice(&body_bytes)?;

    debug!(count = descriptors.len(), "batch accepted");
    let wrappers: Vec<ResponseWrapper> =
        fanout::dispatch_all(state.dispatcher.clone(), descriptors).await;

    into_json(&wrappers)
}

/// Liveness probe (GET /ping)
pub async fn ping() -> &'static str {
    "pong"
}

/// Reads the request body and validates its size.
async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Vec<u8>, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::InvalidPayload(format!("failed to read body: {err}")))?
        .to_bytes()
        .to_vec();

    if data.len() > max_size {
        return Err(ApiError::PayloadTooLarge(data.len()));
    }

    Ok(data)
}

/// Serializes the outbound payload by hand so a serialization failure maps
/// to an explicit 500 rather than a broken stream.
fn into_json<T: Serialize>(value: &T) -> Result<Response, ApiError> {
    let payload = serde_json::to_vec(value)
        .map_err(|err| ApiError::Internal(format!("failed to serialize response: {err}")))?;

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        payload,
    )
        .into_response())
}
