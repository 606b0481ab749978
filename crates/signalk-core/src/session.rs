//! Ingestion session.
//!
//! A [`Session`] owns everything that lives for one connection: the self
//! identity, the path store and the subscription registry. Documents are
//! normalized, applied to the store one mutation at a time, and every
//! mutation is fanned out to the matching subscriptions before the next one
//! is applied.
//!
//! All consumer-facing paths may use the `self.` alias; the session resolves
//! them against the identity learned from the first snapshot.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::context::SelfContext;
use crate::model::{Delta, Document, Meta, ValueType};
use crate::normalize::{normalize_delta, normalize_full, Mutation, Normalized};
use crate::path::{join, strip_segment_prefix};
use crate::store::{MemoryStore, PathEntry, SignalKStore, SourcePreference, DEFAULT_SOURCE};
use crate::subscription::{ConsumerId, SubscriptionId, SubscriptionRegistry};

/// One connection's worth of data tree state.
#[derive(Debug, Default)]
pub struct Session {
    self_ctx: SelfContext,
    store: MemoryStore,
    subscriptions: SubscriptionRegistry,
    /// Secondary contexts (e.g. AIS targets) whose deltas are kept.
    tracked: BTreeSet<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The self identity, once a snapshot (or hello) declared it.
    pub fn self_identity(&self) -> Option<&str> {
        self.self_ctx.identity()
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Ingest any classified document. Returns the number of mutations applied.
    pub fn ingest_document(&mut self, document: &Document) -> usize {
        match document {
            Document::Hello(hello) => {
                if !self.self_ctx.is_set() {
                    info!("Self identity {} from hello", hello.self_urn);
                    self.self_ctx.set_self(&hello.self_urn);
                }
                0
            }
            Document::Full(doc) => self.ingest_full(doc),
            Document::Delta(delta) => self.ingest_delta(delta),
        }
    }

    pub fn ingest_full(&mut self, doc: &Value) -> usize {
        self.ingest_full_at(doc, Utc::now())
    }

    /// Ingest a full snapshot; `received` stamps values without timestamps.
    ///
    /// A snapshot declaring a different identity than the current one starts
    /// a new session first.
    pub fn ingest_full_at(&mut self, doc: &Value, received: DateTime<Utc>) -> usize {
        let normalized = normalize_full(doc, self.self_ctx.identity(), received);

        if let Some(identity) = normalized.self_identity.as_deref() {
            let incoming = SelfContext::vessel_prefix(identity);
            match self.self_ctx.prefix() {
                Some(current) if current == incoming => {}
                Some(current) => {
                    info!("Self identity changed from {} to {}, resetting session", current, incoming);
                    self.reset_session();
                    self.self_ctx.set_self(identity);
                }
                None => {
                    info!("Self identity {}", identity);
                    self.self_ctx.set_self(identity);
                }
            }
        }

        self.apply(normalized)
    }

    pub fn ingest_delta(&mut self, delta: &Delta) -> usize {
        self.ingest_delta_at(delta, Utc::now())
    }

    /// Ingest a delta; deltas for contexts that are neither self nor
    /// tracked leave the store untouched.
    pub fn ingest_delta_at(&mut self, delta: &Delta, received: DateTime<Utc>) -> usize {
        let normalized = normalize_delta(delta, &self.self_ctx, &self.tracked, received);
        self.apply(normalized)
    }

    fn apply(&mut self, normalized: Normalized) -> usize {
        let applied = normalized.mutations.len();
        for mutation in normalized.mutations {
            match mutation {
                Mutation::Value(fact) => {
                    if self.store.apply_fact(&fact) {
                        debug!("New path {} from {}", fact.path, fact.source);
                    }
                    tracing::trace!("{} <- {} = {}", fact.path, fact.source, fact.value);
                    let Some(entry) = self.store.entry(&fact.path) else {
                        continue;
                    };
                    for key in subscription_keys(&self.self_ctx, &fact.path) {
                        self.subscriptions
                            .notify_value(&key, &fact.source, &fact.value, entry);
                    }
                }
                Mutation::Meta { path, meta } => self.store.set_meta(&path, meta),
                Mutation::DefaultSource { path, source } => {
                    self.assign_default(&path, &source);
                }
            }
        }
        applied
    }

    fn assign_default(&mut self, concrete: &str, source: &str) -> bool {
        if !self.store.set_default_source(concrete, source) {
            return false;
        }
        let value = self.store.read(concrete, &SourcePreference::Default);
        for key in subscription_keys(&self.self_ctx, concrete) {
            self.subscriptions.notify_default_changed(&key, value);
        }
        true
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Start over: drop all data and the self identity, blank every
    /// subscription's value. Subscriptions stay registered.
    pub fn reset_session(&mut self) {
        info!(
            "Resetting session ({} paths, {} subscriptions)",
            self.store.len(),
            self.subscriptions.len()
        );
        self.store.clear();
        self.self_ctx.clear();
        self.subscriptions.reset();
    }

    /// Keep deltas for a secondary context such as an AIS target.
    pub fn track_context(&mut self, context: &str) {
        self.tracked.insert(SelfContext::vessel_prefix(context));
    }

    pub fn untrack_context(&mut self, context: &str) -> bool {
        self.tracked.remove(&SelfContext::vessel_prefix(context))
    }

    // ========================================================================
    // Consumer API
    // ========================================================================

    /// Observe a path. The listener is called right away with the current
    /// value and then on every change, until [`Session::unsubscribe`].
    pub fn subscribe<F>(
        &mut self,
        consumer: ConsumerId,
        path: &str,
        preference: impl Into<SourcePreference>,
        listener: F,
    ) -> SubscriptionId
    where
        F: FnMut(Option<&Value>) + Send + 'static,
    {
        let preference = preference.into();
        let concrete = self.self_ctx.resolve(path);
        let initial = self.store.read(&concrete, &preference);
        let key = self.subscription_key(path);
        self.subscriptions
            .subscribe(consumer, &key, preference, Box::new(listener), initial)
    }

    /// Stop every subscription `consumer` holds on `path`. Returns how many
    /// were removed.
    pub fn unsubscribe(&mut self, consumer: ConsumerId, path: &str) -> usize {
        // Subscriptions made before the identity was known sit under their
        // concrete spelling.
        let mut keys = vec![self.subscription_key(path), self.self_ctx.resolve(path)];
        keys.push(path.to_string());
        keys.sort();
        keys.dedup();
        keys.iter()
            .map(|key| self.subscriptions.unsubscribe(consumer, key))
            .sum()
    }

    /// Current value for a path; `None` until the path has been received.
    pub fn read(&self, path: &str, preference: impl Into<SourcePreference>) -> Option<&Value> {
        self.store
            .read(&self.self_ctx.resolve(path), &preference.into())
    }

    pub fn entry(&self, path: &str) -> Option<&PathEntry> {
        self.store.entry(&self.self_ctx.resolve(path))
    }

    pub fn meta(&self, path: &str) -> Option<&Meta> {
        self.entry(path)?.meta()
    }

    pub fn sources_for_path(&self, path: &str) -> BTreeSet<String> {
        self.store.sources(&self.self_ctx.resolve(path))
    }

    /// Choices for a source picker: `default` followed by every known source.
    pub fn source_choices(&self, path: &str) -> Vec<String> {
        std::iter::once(DEFAULT_SOURCE.to_string())
            .chain(self.sources_for_path(path))
            .collect()
    }

    /// Make `source` authoritative for `path`. Default-source subscribers
    /// receive the new value when the default actually changes.
    pub fn set_default_source(&mut self, path: &str, source: &str) -> bool {
        let concrete = self.self_ctx.resolve(path);
        self.assign_default(&concrete, source)
    }

    /// Known paths of a type, with own-vessel paths under the `self.` alias.
    pub fn list_paths_by_type(&self, value_type: ValueType) -> BTreeSet<String> {
        self.store
            .paths_by_type(value_type)
            .iter()
            .map(|path| self.self_ctx.unresolve(path))
            .collect()
    }

    /// Like [`Session::list_paths_by_type`], restricted to the self vessel.
    pub fn list_self_paths_by_type(&self, value_type: ValueType) -> BTreeSet<String> {
        self.list_paths_by_type(value_type)
            .into_iter()
            .filter(|path| path.starts_with("self."))
            .collect()
    }

    /// Registry key for a consumer path: the `self.` alias when it applies.
    fn subscription_key(&self, path: &str) -> String {
        let key = self.self_ctx.unresolve(&self.self_ctx.resolve(path));
        match strip_segment_prefix(&key, "vessels.self") {
            Some(rest) => join("self", rest),
            None => key,
        }
    }
}

/// Registry keys a write to `concrete` must be delivered under.
fn subscription_keys(self_ctx: &SelfContext, concrete: &str) -> Vec<String> {
    let alias = self_ctx.unresolve(concrete);
    if alias == concrete {
        vec![alias]
    } else {
        vec![alias, concrete.to_string()]
    }
}
