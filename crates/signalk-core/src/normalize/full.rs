//! Full snapshot normalization.
//!
//! A snapshot is an arbitrarily nested JSON tree. Each node is classified
//! into a [`NodeKind`] and handled by an exhaustive match; structural nodes
//! recurse with the key appended to the current path.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{Mutation, Normalized};
use crate::context::{SelfContext, TOP_LEVEL_GROUPS};
use crate::model::{parse_timestamp, Fact, Meta, NO_SOURCE};
use crate::path::join;

/// Root keys that describe the document rather than measurements.
const DOCUMENT_KEYS: &[&str] = &["self", "version", "sources"];

/// Shape of a snapshot node.
#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeKind<'a> {
    /// `null`: dropped, descent stops.
    Null,
    /// Bare string, number or boolean.
    Primitive(&'a Value),
    /// Object carrying a `timestamp`: a value container.
    TimestampedLeaf(&'a Map<String, Value>),
    /// Anything else: an object or array to descend into.
    Structural(&'a Value),
}

impl<'a> NodeKind<'a> {
    fn classify(node: &'a Value) -> Self {
        match node {
            Value::Null => NodeKind::Null,
            Value::Bool(_) | Value::Number(_) | Value::String(_) => NodeKind::Primitive(node),
            Value::Object(map) if map.contains_key("timestamp") => NodeKind::TimestampedLeaf(map),
            Value::Object(_) | Value::Array(_) => NodeKind::Structural(node),
        }
    }
}

/// Normalize a full snapshot document.
///
/// `known_self` is the identity already learned by the session; the
/// document's own `self` takes precedence. Measurement keys at the root that
/// are not one of the top-level groups are treated as self vessel data and
/// placed under the self prefix. `received` stamps values that carry no
/// timestamp of their own.
pub fn normalize_full(
    doc: &Value,
    known_self: Option<&str>,
    received: DateTime<Utc>,
) -> Normalized {
    let mut out = Normalized::default();

    let Value::Object(root) = doc else {
        tracing::debug!("Ignoring snapshot whose root is not an object");
        return out;
    };

    out.self_identity = root
        .get("self")
        .and_then(Value::as_str)
        .map(String::from);

    let self_prefix = out
        .self_identity
        .as_deref()
        .or(known_self)
        .map(SelfContext::vessel_prefix)
        .unwrap_or_default();

    for (key, child) in root {
        if DOCUMENT_KEYS.contains(&key.as_str()) {
            continue;
        }
        let path = if TOP_LEVEL_GROUPS.contains(&key.as_str()) {
            key.clone()
        } else {
            join(&self_prefix, key)
        };
        walk(child, &path, received, &mut out.mutations);
    }

    out
}

fn walk(node: &Value, path: &str, received: DateTime<Utc>, out: &mut Vec<Mutation>) {
    match NodeKind::classify(node) {
        NodeKind::Null => {}
        NodeKind::Primitive(value) => {
            out.push(Mutation::Value(Fact {
                path: path.to_string(),
                source: NO_SOURCE.to_string(),
                timestamp: received,
                value: value.clone(),
            }));
            out.push(Mutation::DefaultSource {
                path: path.to_string(),
                source: NO_SOURCE.to_string(),
            });
        }
        NodeKind::TimestampedLeaf(map) => leaf(map, path, received, out),
        NodeKind::Structural(Value::Object(map)) => {
            for (key, child) in map {
                walk(child, &join(path, key), received, out);
            }
        }
        NodeKind::Structural(Value::Array(items)) => {
            for (i, child) in items.iter().enumerate() {
                walk(child, &join(path, &i.to_string()), received, out);
            }
        }
        NodeKind::Structural(_) => {}
    }
}

fn leaf_source(map: &Map<String, Value>) -> &str {
    match (map.get("$source"), map.get("source")) {
        (Some(Value::String(source_ref)), _) => source_ref.as_str(),
        (_, Some(Value::Object(source))) => source
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or(NO_SOURCE),
        _ => NO_SOURCE,
    }
}

fn leaf(map: &Map<String, Value>, path: &str, received: DateTime<Utc>, out: &mut Vec<Mutation>) {
    let source = leaf_source(map);
    let timestamp = parse_timestamp(map.get("timestamp").and_then(Value::as_str), received);

    // Per-value default assignment only happens for leaves that carry meta.
    let has_meta = match map.get("meta") {
        Some(meta @ Value::Object(_)) => {
            match serde_json::from_value::<Meta>(meta.clone()) {
                Ok(meta) => out.push(Mutation::Meta {
                    path: path.to_string(),
                    meta,
                }),
                Err(e) => tracing::debug!("Skipping malformed meta at {}: {}", path, e),
            }
            true
        }
        _ => false,
    };

    if let Some(value) = map.get("value") {
        emit_value(path, source, timestamp, value, has_meta, out);
    }

    if let Some(Value::Object(values)) = map.get("values") {
        for (other, record) in values {
            if other == source {
                continue;
            }
            let Some(value) = record.get("value") else {
                continue;
            };
            let timestamp = parse_timestamp(
                record.get("timestamp").and_then(Value::as_str),
                received,
            );
            emit_value(path, other, timestamp, value, false, out);
        }
    }

    out.push(Mutation::DefaultSource {
        path: path.to_string(),
        source: source.to_string(),
    });
}

/// Emit one fact, or one per key for a compound (object) value.
fn emit_value(
    path: &str,
    source: &str,
    timestamp: DateTime<Utc>,
    value: &Value,
    assign_default: bool,
    out: &mut Vec<Mutation>,
) {
    let mut push = |path: String, value: &Value| {
        out.push(Mutation::Value(Fact {
            path: path.clone(),
            source: source.to_string(),
            timestamp,
            value: value.clone(),
        }));
        if assign_default {
            out.push(Mutation::DefaultSource {
                path,
                source: source.to_string(),
            });
        }
    };

    match value {
        Value::Object(fields) => {
            for (key, field) in fields {
                push(join(path, key), field);
            }
        }
        _ => push(path.to_string(), value),
    }
}
