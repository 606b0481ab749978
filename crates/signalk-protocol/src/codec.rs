//! Inbound frame codec for the SignalK stream.
//!
//! SignalK servers send JSON text frames. This module parses a frame and
//! decides which of the three document shapes it is:
//! - a delta carries `updates`
//! - a hello carries `self` and `roles` and nothing measured
//! - any other object is a full snapshot

use serde_json::Value;
use signalk_core::{Delta, Document, Hello};
use thiserror::Error;

/// Keys a hello message may carry.
const HELLO_KEYS: &[&str] = &["name", "version", "timestamp", "startTime", "self", "roles"];

/// Errors that can occur while decoding an inbound frame.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame is not valid JSON.
    #[error("Invalid JSON frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Valid JSON, but not an object.
    #[error("Unknown document: expected a JSON object")]
    UnknownDocument,

    /// Carries `updates` but does not deserialize as a delta.
    #[error("Invalid delta: {0}")]
    InvalidDelta(#[source] serde_json::Error),

    /// Looks like a hello but does not deserialize as one.
    #[error("Invalid hello: {0}")]
    InvalidHello(#[source] serde_json::Error),
}

/// Decode one text frame.
pub fn decode_frame(text: &str) -> Result<Document, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    classify(value)
}

/// Classify an already parsed document.
pub fn classify(value: Value) -> Result<Document, CodecError> {
    let Value::Object(map) = &value else {
        return Err(CodecError::UnknownDocument);
    };

    if map.contains_key("updates") {
        let delta: Delta = serde_json::from_value(value).map_err(CodecError::InvalidDelta)?;
        return Ok(Document::Delta(delta));
    }

    let is_hello = map.contains_key("self")
        && map.contains_key("roles")
        && map.keys().all(|key| HELLO_KEYS.contains(&key.as_str()));
    if is_hello {
        let hello: Hello = serde_json::from_value(value).map_err(CodecError::InvalidHello)?;
        return Ok(Document::Hello(hello));
    }

    Ok(Document::Full(value))
}
