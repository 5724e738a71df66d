//! Response framing.
//!
//! Every JSON value goes out compact and newline-terminated, one value per
//! line, with the plugin content type and status 200. Driver failures are
//! data, not HTTP errors: the daemon inspects the `Err` field. A body that
//! cannot be decoded gets 400 and one that cannot be encoded gets 500, both
//! with nothing written.

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::protocol::{MANIFEST, PLUGIN_CONTENT_TYPE};

/// Outcome of one plugin exchange, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginReply {
    /// One or more newline-terminated JSON values.
    Json(Vec<u8>),
    /// The request body could not be decoded; nothing is written.
    Malformed,
    /// The driver's value could not be encoded; nothing is written.
    EncodeFailed,
}

impl PluginReply {
    pub fn manifest() -> Self {
        let mut body = Vec::with_capacity(MANIFEST.len() + 1);
        body.extend_from_slice(MANIFEST.as_bytes());
        body.push(b'\n');
        PluginReply::Json(body)
    }

    pub fn body(&self) -> &[u8] {
        match self {
            PluginReply::Json(body) => body,
            PluginReply::Malformed | PluginReply::EncodeFailed => &[],
        }
    }
}

/// Accumulates JSON lines for a single response.
#[derive(Debug, Default)]
pub struct JsonLines {
    buf: Vec<u8>,
}

impl JsonLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        serde_json::to_writer(&mut self.buf, value)?;
        self.buf.push(b'\n');
        Ok(())
    }

    pub fn finish(self) -> PluginReply {
        PluginReply::Json(self.buf)
    }
}

/// Encode a single value as a complete reply.
pub fn encode_reply<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<PluginReply> {
    let mut lines = JsonLines::new();
    lines.push(value)?;
    Ok(lines.finish())
}

impl IntoResponse for PluginReply {
    fn into_response(self) -> Response {
        match self {
            PluginReply::Json(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, PLUGIN_CONTENT_TYPE)],
                body,
            )
                .into_response(),
            PluginReply::Malformed => (StatusCode::BAD_REQUEST, Body::empty()).into_response(),
            PluginReply::EncodeFailed => {
                (StatusCode::INTERNAL_SERVER_ERROR, Body::empty()).into_response()
            }
        }
    }
}
