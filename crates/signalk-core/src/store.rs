//! SignalK data store.
//!
//! The store is a flat index from concrete path to [`PathEntry`]. Each entry
//! keeps the latest value of every source that ever reported the path, the
//! source that answers reads by default, the inferred value type and
//! optional metadata. Paths are never removed within a session.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{Fact, Meta, ValueType};

/// Source name consumers use to ask for the default source.
pub const DEFAULT_SOURCE: &str = "default";

/// Which source a read or subscription wants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SourcePreference {
    /// Whatever source is currently authoritative for the path.
    #[default]
    Default,
    /// A specific source, by name.
    Source(String),
}

impl SourcePreference {
    pub fn as_str(&self) -> &str {
        match self {
            SourcePreference::Default => DEFAULT_SOURCE,
            SourcePreference::Source(name) => name,
        }
    }
}

impl From<&str> for SourcePreference {
    fn from(s: &str) -> Self {
        if s == DEFAULT_SOURCE {
            SourcePreference::Default
        } else {
            SourcePreference::Source(s.to_string())
        }
    }
}

impl From<String> for SourcePreference {
    fn from(s: String) -> Self {
        SourcePreference::from(s.as_str())
    }
}

/// Latest value reported by one source for one path.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub value: Value,
    pub timestamp: DateTime<Utc>,
}

/// Everything known about one path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathEntry {
    sources: BTreeMap<String, SourceRecord>,
    /// Explicit default; `None` means "most recently written source".
    default_source: Option<String>,
    last_source: Option<String>,
    value_type: ValueType,
    meta: Option<Meta>,
}

impl PathEntry {
    fn new(value_type: ValueType) -> Self {
        Self {
            sources: BTreeMap::new(),
            default_source: None,
            last_source: None,
            value_type,
            meta: None,
        }
    }

    /// All source records, ordered by source name.
    pub fn sources(&self) -> &BTreeMap<String, SourceRecord> {
        &self.sources
    }

    /// The explicitly assigned default source, if any.
    pub fn default_source(&self) -> Option<&str> {
        self.default_source.as_deref()
    }

    /// The source that currently answers default reads.
    pub fn effective_default(&self) -> Option<&str> {
        self.default_source
            .as_deref()
            .or(self.last_source.as_deref())
    }

    /// Resolve a preference to the source name that answers it.
    ///
    /// A pinned source that has not reported yet falls back to the default.
    pub fn resolve_source(&self, preference: &SourcePreference) -> Option<&str> {
        match preference {
            SourcePreference::Source(name) => match self.sources.get_key_value(name) {
                Some((known, _)) => Some(known.as_str()),
                None => self.effective_default(),
            },
            SourcePreference::Default => self.effective_default(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    pub fn record(&self, source: &str) -> Option<&SourceRecord> {
        self.sources.get(source)
    }

    fn read(&self, preference: &SourcePreference) -> Option<&Value> {
        let source = self.resolve_source(preference)?;
        self.sources.get(source).map(|record| &record.value)
    }
}

/// Trait for SignalK path store implementations.
pub trait SignalKStore: Send + Sync {
    /// Record a fact. Returns `true` when the path was seen for the first time.
    fn apply_fact(&mut self, fact: &Fact) -> bool;

    /// Make `source` authoritative for `path`.
    ///
    /// Returns `true` only when the default actually changed. Unknown paths
    /// and sources that never reported the path are ignored.
    fn set_default_source(&mut self, path: &str, source: &str) -> bool;

    /// Attach or overwrite metadata for a path.
    fn set_meta(&mut self, path: &str, meta: Meta);

    /// Current value for a path and source preference; `None` if not yet received.
    fn read(&self, path: &str, preference: &SourcePreference) -> Option<&Value>;

    /// Get the entry for a path.
    fn entry(&self, path: &str) -> Option<&PathEntry>;

    /// Metadata attached to a path.
    fn meta(&self, path: &str) -> Option<&Meta> {
        self.entry(path)?.meta()
    }

    /// Names of every source that reported a path.
    fn sources(&self, path: &str) -> BTreeSet<String>;

    /// Known paths whose inferred type matches.
    fn paths_by_type(&self, value_type: ValueType) -> BTreeSet<String>;

    /// Drop every entry (session boundary).
    fn clear(&mut self);
}

/// In-memory SignalK path store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    entries: HashMap<String, PathEntry>,
    /// Path type index, kept in step with `entries`.
    by_type: BTreeMap<ValueType, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all known paths (unordered).
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn index(&mut self, path: &str, value_type: ValueType) {
        self.by_type
            .entry(value_type)
            .or_default()
            .insert(path.to_string());
    }

    fn reindex(&mut self, path: &str, from: ValueType, to: ValueType) {
        if let Some(paths) = self.by_type.get_mut(&from) {
            paths.remove(path);
        }
        self.index(path, to);
    }
}

impl SignalKStore for MemoryStore {
    fn apply_fact(&mut self, fact: &Fact) -> bool {
        let incoming = ValueType::of(&fact.value);
        let mut created = false;
        let mut retyped = None;

        let entry = self.entries.entry(fact.path.clone()).or_insert_with(|| {
            created = true;
            PathEntry::new(incoming)
        });

        if !created && incoming != ValueType::Unknown && entry.value_type != incoming {
            if entry.value_type == ValueType::Unknown {
                retyped = Some(entry.value_type);
                entry.value_type = incoming;
            } else {
                tracing::debug!(
                    "{} is typed {:?}, keeping it despite a {:?} value from {}",
                    fact.path,
                    entry.value_type,
                    incoming,
                    fact.source
                );
            }
        }

        if entry.sources.is_empty() && entry.default_source.is_none() {
            entry.default_source = Some(fact.source.clone());
        }
        entry.sources.insert(
            fact.source.clone(),
            SourceRecord {
                value: fact.value.clone(),
                timestamp: fact.timestamp,
            },
        );
        entry.last_source = Some(fact.source.clone());

        if created {
            self.index(&fact.path, incoming);
        } else if let Some(from) = retyped {
            self.reindex(&fact.path, from, incoming);
        }
        created
    }

    fn set_default_source(&mut self, path: &str, source: &str) -> bool {
        let Some(entry) = self.entries.get_mut(path) else {
            return false;
        };
        if !entry.sources.contains_key(source) {
            tracing::debug!("Ignoring default source {} for {}: never reported", source, path);
            return false;
        }
        if entry.default_source.as_deref() == Some(source) {
            return false;
        }
        entry.default_source = Some(source.to_string());
        true
    }

    fn set_meta(&mut self, path: &str, meta: Meta) {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.meta = Some(meta);
            return;
        }
        let mut entry = PathEntry::new(ValueType::Unknown);
        entry.meta = Some(meta);
        self.entries.insert(path.to_string(), entry);
        self.index(path, ValueType::Unknown);
    }

    fn read(&self, path: &str, preference: &SourcePreference) -> Option<&Value> {
        self.entries.get(path)?.read(preference)
    }

    fn entry(&self, path: &str) -> Option<&PathEntry> {
        self.entries.get(path)
    }

    fn sources(&self, path: &str) -> BTreeSet<String> {
        self.entries
            .get(path)
            .map(|entry| entry.sources.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn paths_by_type(&self, value_type: ValueType) -> BTreeSet<String> {
        self.by_type.get(&value_type).cloned().unwrap_or_default()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.by_type.clear();
    }
}
