//! Converts a raw engine response into the wire record.
//!
//! Responsibilities: fallback decompression when the transport left the
//! body encoded, encoding detection (literal text vs base64), header
//! multimap and cookie-jar flattening, id generation.

use std::collections::BTreeMap;
use std::io::Read;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use uuid::Uuid;

use crate::api::models::ResponseRecord;
use crate::engine::{Cookie, EngineError, EngineResponse};

/// Build the wire record for a successful exchange.
pub fn build_record(
    response: EngineResponse,
    jar: Vec<Cookie>,
    detect_encoding: bool,
    session_id: Option<String>,
) -> Result<ResponseRecord, EngineError> {
    let body_bytes = if response.decompressed {
        response.body.clone()
    } else {
        decode_body(&response)?
    };

    let (body, is_base64) = render_body(&body_bytes, detect_encoding);

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &response.headers {
        headers.entry(name.clone()).or_default().push(value.clone());
    }

    // later entries for a name overwrite earlier ones
    let mut cookies = BTreeMap::new();
    for cookie in jar {
        cookies.insert(cookie.name, cookie.value);
    }

    Ok(ResponseRecord {
        id: Uuid::new_v4().to_string(),
        body,
        cookies,
        headers,
        session_id,
        status: response.status,
        target: response.url.to_string(),
        used_protocol: response.protocol,
        is_base64,
    })
}

/// Literal text when the bytes are valid UTF-8 (or detection is off),
/// standard base64 otherwise.
fn render_body(bytes: &[u8], detect_encoding: bool) -> (String, bool) {
    if detect_encoding {
        match std::str::from_utf8(bytes) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (BASE64.encode(bytes), true),
        }
    } else {
        // without detection the body is carried as text; invalid sequences
        // are replaced rather than failing the whole record
        (String::from_utf8_lossy(bytes).into_owned(), false)
    }
}

fn decode_body(response: &EngineResponse) -> Result<Bytes, EngineError> {
    let encoding = response
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-encoding"))
        .map(|(_, value)| value.trim().to_ascii_lowercase());

    match encoding.as_deref() {
        Some("gzip") | Some("x-gzip") => decode_gzip(&response.body),
        Some("deflate") => decode_deflate(&response.body),
        Some("br") => decode_brotli(&response.body),
        _ => Ok(response.body.clone()),
    }
}

fn decode_gzip(data: &[u8]) -> Result<Bytes, EngineError> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| EngineError::Decompression(format!("gzip: {e}")))?;
    Ok(Bytes::from(decoded))
}

fn decode_deflate(data: &[u8]) -> Result<Bytes, EngineError> {
    // servers disagree on whether "deflate" means zlib-wrapped or raw
    let mut decoded = Vec::new();
    if flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut decoded)
        .is_ok()
    {
        return Ok(Bytes::from(decoded));
    }
    decoded.clear();
    flate2::read::DeflateDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| EngineError::Decompression(format!("deflate: {e}")))?;
    Ok(Bytes::from(decoded))
}

fn decode_brotli(data: &[u8]) -> Result<Bytes, EngineError> {
    let mut decoder = brotli::Decompressor::new(data, 4096);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| EngineError::Decompression(format!("brotli: {e}")))?;
    Ok(Bytes::from(decoded))
}
