//! Delta normalization.
//!
//! Deltas are already path oriented; the work is deciding whether the
//! context is one we observe and prefixing every path with it.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{Mutation, Normalized};
use crate::context::SelfContext;
use crate::model::{parse_timestamp, Delta, Fact};
use crate::path::join;

/// Tree prefix for a delta, or `None` when the context is not observed.
///
/// A missing context means self. Other contexts are accepted when they are
/// in `tracked` (normalized with [`SelfContext::vessel_prefix`]).
fn context_prefix(
    context: Option<&str>,
    self_ctx: &SelfContext,
    tracked: &BTreeSet<String>,
) -> Option<String> {
    match context {
        None => self_ctx.prefix().map(String::from),
        Some(context) if self_ctx.is_self(context) => self_ctx.prefix().map(String::from),
        Some(context) => {
            let prefix = SelfContext::vessel_prefix(context);
            tracked.contains(&prefix).then_some(prefix)
        }
    }
}

/// Normalize a delta into tree mutations.
///
/// Updates for contexts that are neither self nor tracked produce nothing.
/// Object values are flattened one level, as in snapshots.
pub fn normalize_delta(
    delta: &Delta,
    self_ctx: &SelfContext,
    tracked: &BTreeSet<String>,
    received: DateTime<Utc>,
) -> Normalized {
    let mut out = Normalized::default();

    let Some(prefix) = context_prefix(delta.context.as_deref(), self_ctx, tracked) else {
        tracing::trace!("Ignoring delta for context {:?}", delta.context);
        return out;
    };

    for update in &delta.updates {
        let source = update.source_name();
        let timestamp = parse_timestamp(update.timestamp.as_deref(), received);

        for pv in &update.values {
            let base = join(&prefix, &pv.path);
            match &pv.value {
                Value::Object(fields) => {
                    for (key, value) in fields {
                        out.mutations.push(Mutation::Value(Fact {
                            path: join(&base, key),
                            source: source.to_string(),
                            timestamp,
                            value: value.clone(),
                        }));
                    }
                }
                value => out.mutations.push(Mutation::Value(Fact {
                    path: base,
                    source: source.to_string(),
                    timestamp,
                    value: value.clone(),
                })),
            }
        }

        for pm in update.meta.iter().flatten() {
            out.mutations.push(Mutation::Meta {
                path: join(&prefix, &pm.path),
                meta: pm.value.clone(),
            });
        }
    }

    out
}
