//! Path subscriptions.
//!
//! Consumers (display widgets) register a listener for one path, optionally
//! pinned to a source. The registry only holds path strings and listeners;
//! values come from the store at notification time. Delivery is synchronous
//! and follows subscription creation order within a path.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use uuid::Uuid;

use crate::store::{PathEntry, SourcePreference};

/// Identity of a consumer, e.g. one widget instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    /// A fresh random consumer id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConsumerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle returned by `subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Callback receiving the current value of a subscribed path.
///
/// `None` means the path (or its source) has no value yet.
pub type Listener = Box<dyn FnMut(Option<&Value>) + Send>;

struct PathSubscription {
    id: SubscriptionId,
    consumer: ConsumerId,
    preference: SourcePreference,
    listener: Listener,
    /// Last value delivered.
    current: Option<Value>,
}

impl PathSubscription {
    fn deliver(&mut self, value: Option<&Value>) {
        self.current = value.cloned();
        (self.listener)(value);
    }

    /// Whether a write by `source` changes what this subscription sees.
    fn follows(&self, source: &str, entry: &PathEntry) -> bool {
        match &self.preference {
            SourcePreference::Source(name) => name == source,
            SourcePreference::Default => entry.effective_default() == Some(source),
        }
    }
}

/// Registry of live path subscriptions, keyed by path.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    by_path: HashMap<String, Vec<PathSubscription>>,
    paths_by_id: HashMap<SubscriptionId, String>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and immediately hand it `initial`.
    pub fn subscribe(
        &mut self,
        consumer: ConsumerId,
        path: &str,
        preference: SourcePreference,
        listener: Listener,
        initial: Option<&Value>,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);

        let mut subscription = PathSubscription {
            id,
            consumer,
            preference,
            listener,
            current: None,
        };
        subscription.deliver(initial);

        tracing::debug!("{} subscribed to {} ({:?})", consumer, path, id);
        self.by_path
            .entry(path.to_string())
            .or_default()
            .push(subscription);
        self.paths_by_id.insert(id, path.to_string());
        id
    }

    /// Remove every subscription `consumer` holds on `path`.
    ///
    /// Returns how many were removed; unknown pairs are a no-op.
    pub fn unsubscribe(&mut self, consumer: ConsumerId, path: &str) -> usize {
        let Some(subscriptions) = self.by_path.get_mut(path) else {
            return 0;
        };
        let before = subscriptions.len();
        let paths_by_id = &mut self.paths_by_id;
        subscriptions.retain(|s| {
            let keep = s.consumer != consumer;
            if !keep {
                paths_by_id.remove(&s.id);
            }
            keep
        });
        let removed = before - subscriptions.len();
        if subscriptions.is_empty() {
            self.by_path.remove(path);
        }
        if removed > 0 {
            tracing::debug!("{} unsubscribed {} listener(s) from {}", consumer, removed, path);
        }
        removed
    }

    /// Deliver a freshly written value to the subscriptions of `path` that
    /// follow `source`. Returns the number of deliveries.
    pub fn notify_value(
        &mut self,
        path: &str,
        source: &str,
        value: &Value,
        entry: &PathEntry,
    ) -> usize {
        let Some(subscriptions) = self.by_path.get_mut(path) else {
            return 0;
        };
        let mut delivered = 0;
        for subscription in subscriptions.iter_mut() {
            if subscription.follows(source, entry) {
                subscription.deliver(Some(value));
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver the new authoritative value to default-source subscriptions
    /// of `path` after its default source changed.
    pub fn notify_default_changed(&mut self, path: &str, value: Option<&Value>) -> usize {
        let Some(subscriptions) = self.by_path.get_mut(path) else {
            return 0;
        };
        let mut delivered = 0;
        for subscription in subscriptions
            .iter_mut()
            .filter(|s| s.preference == SourcePreference::Default)
        {
            subscription.deliver(value);
            delivered += 1;
        }
        delivered
    }

    /// Forget every cached value and tell each listener its path is empty.
    /// Registrations survive.
    pub fn reset(&mut self) {
        for subscription in self.by_path.values_mut().flatten() {
            subscription.deliver(None);
        }
    }

    /// The value last delivered to a subscription.
    pub fn current(&self, id: SubscriptionId) -> Option<&Value> {
        let path = self.paths_by_id.get(&id)?;
        self.by_path
            .get(path)?
            .iter()
            .find(|s| s.id == id)?
            .current
            .as_ref()
    }

    /// Whether the subscription is still registered.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.paths_by_id.contains_key(&id)
    }

    /// Paths with at least one subscription.
    pub fn subscribed_paths(&self) -> BTreeSet<&str> {
        self.by_path.keys().map(String::as_str).collect()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.paths_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths_by_id.is_empty()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscriptions", &self.paths_by_id.len())
            .field("paths", &self.by_path.len())
            .finish()
    }
}
