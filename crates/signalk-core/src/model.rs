//! SignalK data model types.
//!
//! These types cover what the data tree consumes from the wire:
//! - Delta messages (typed, deserialized with serde)
//! - Source and metadata descriptions
//! - The flat facts both normalizers reduce documents to

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Source name used when a document does not say where a value came from.
pub const NO_SOURCE: &str = "noSource";

/// A SignalK delta message containing one or more updates.
///
/// Deltas are the incremental half of the wire format. They name a context
/// (which vessel/object) and carry a list of path/value changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// The context path (e.g., "vessels.urn:mrn:signalk:uuid:...")
    /// If None, the delta concerns the self vessel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// The list of updates in this delta. Malformed updates are skipped.
    #[serde(default, deserialize_with = "lenient_entries")]
    pub updates: Vec<Update>,
}

/// A single update within a delta, containing values from one source at one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Reference to source in /sources (e.g., "nmea0183.GP")
    #[serde(rename = "$source", skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,

    /// Embedded source object (alternative to $source)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    /// ISO 8601 timestamp (UTC). Anything but a string reads as absent.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,

    /// The path-value pairs in this update
    #[serde(default, deserialize_with = "lenient_entries")]
    pub values: Vec<PathValue>,

    /// Metadata updates (separate from values)
    #[serde(
        default,
        deserialize_with = "lenient_meta",
        skip_serializing_if = "Option::is_none"
    )]
    pub meta: Option<Vec<PathMeta>>,
}

impl Update {
    /// Resolve the source name: `$source`, then `source.label`, then [`NO_SOURCE`].
    pub fn source_name(&self) -> &str {
        if let Some(source_ref) = &self.source_ref {
            return source_ref;
        }
        match &self.source {
            Some(source) if !source.label.is_empty() => &source.label,
            _ => NO_SOURCE,
        }
    }
}

/// Deserialize a list entry by entry, dropping the entries that do not parse.
fn lenient_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(parse_entries(raw))
}

fn lenient_meta<'de, D>(deserializer: D) -> Result<Option<Vec<PathMeta>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(raw.map(parse_entries))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(ts) => Ok(Some(ts)),
        Value::Null => Ok(None),
        other => {
            tracing::debug!("Ignoring non-string timestamp {}", other);
            Ok(None)
        }
    }
}

fn parse_entries<T: DeserializeOwned>(raw: Vec<Value>) -> Vec<T> {
    raw.into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::debug!("Skipping malformed {}: {}", short_type_name::<T>(), e);
                None
            }
        })
        .collect()
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

/// A single path-value pair within an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    /// The SignalK path (e.g., "navigation.speedOverGround")
    #[serde(default)]
    pub path: String,

    /// The value at this path
    pub value: Value,
}

/// Metadata for a path, as carried in delta updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMeta {
    /// The SignalK path this metadata applies to
    pub path: String,

    /// The metadata value
    pub value: Meta,
}

/// Source information describing where data originated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Source {
    /// Label identifying the source bus (e.g., "N2K-1", "serial-COM1")
    #[serde(default)]
    pub label: String,

    /// Type of source (e.g., "NMEA0183", "NMEA2000", "signalk")
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    /// NMEA 2000 source address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,

    /// NMEA 2000 PGN
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pgn: Option<u32>,

    /// NMEA 0183 sentence type (e.g., "RMC", "GGA")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence: Option<String>,

    /// NMEA 0183 talker ID (e.g., "GP", "II")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talker: Option<String>,
}

/// Metadata describing a SignalK path (units and display hints).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Meta {
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Display name for gauges (no units)
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Long name for displays with more space
    #[serde(rename = "longName", skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,

    /// Short name for compact displays
    #[serde(rename = "shortName", skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,

    /// SI unit string (e.g., "m/s", "rad", "K")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,

    /// Timeout in seconds after which data is stale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    /// Display scale configuration
    #[serde(rename = "displayScale", skip_serializing_if = "Option::is_none")]
    pub display_scale: Option<DisplayScale>,

    /// Alarm zones
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<Zone>>,
}

/// Display scale configuration for gauges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayScale {
    pub lower: f64,
    pub upper: f64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub scale_type: Option<ScaleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
}

/// Scale type for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    Linear,
    Logarithmic,
    Squareroot,
    Power,
}

/// An alarm/warning zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    pub state: AlarmState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Alarm states in order of severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    Nominal,
    Normal,
    Alert,
    Warn,
    Alarm,
    Emergency,
}

/// Hello message a server sends when a client connects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hello {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// SignalK schema version
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Self vessel URN
    #[serde(rename = "self")]
    pub self_urn: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

/// An inbound document, already parsed and classified by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Hello(Hello),
    /// Full snapshot, kept as raw JSON since its shape is open-ended.
    Full(Value),
    Delta(Delta),
}

/// Kind of value recorded under a path.
///
/// Set from the first non-null value a path receives and kept for the
/// rest of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Number,
    String,
    Boolean,
    Object,
    /// No typed value seen yet (null values, metadata-only entries).
    Unknown,
}

impl ValueType {
    /// Infer the kind of a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Number(_) => ValueType::Number,
            Value::String(_) => ValueType::String,
            Value::Bool(_) => ValueType::Boolean,
            Value::Object(_) | Value::Array(_) => ValueType::Object,
            Value::Null => ValueType::Unknown,
        }
    }
}

/// One observation: a value reported by a source for a path at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub path: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub value: Value,
}

/// Parse a wire timestamp, falling back to `received` when missing or invalid.
pub fn parse_timestamp(raw: Option<&str>, received: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return received;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            tracing::debug!("Unparseable timestamp {:?} ({}), using receive time", raw, e);
            received
        }
    }
}
