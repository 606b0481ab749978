//! Document normalizers.
//!
//! Both wire shapes, full snapshots and deltas, reduce to the same ordered
//! list of [`Mutation`]s. Normalizing is pure: nothing here touches the
//! store, so the session decides how mutations are applied and fanned out.

pub mod delta;
pub mod full;

use crate::model::{Fact, Meta};

pub use delta::normalize_delta;
pub use full::normalize_full;

/// One change to the data tree, in document traversal order.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// A value reported by a source.
    Value(Fact),
    /// Metadata attached to a path.
    Meta { path: String, meta: Meta },
    /// A source declared authoritative for a path.
    DefaultSource { path: String, source: String },
}

/// Result of normalizing one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Self identity declared by the document, if any.
    pub self_identity: Option<String>,
    pub mutations: Vec<Mutation>,
}

impl Normalized {
    /// The value facts only, in order.
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.mutations.iter().filter_map(|m| match m {
            Mutation::Value(fact) => Some(fact),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}
