//! # signalk-core
//!
//! Client-side SignalK data tree.
//!
//! This crate provides:
//! - Data model types (Delta, Update, Meta, Source, etc.)
//! - Normalizers turning full snapshots and deltas into flat path facts
//! - A multi-source path store with a per-path default source
//! - Self vessel resolution (`self.` alias)
//! - Live path subscriptions delivered through callbacks
//!
//! This crate contains no I/O and no async code; transports hand it parsed
//! documents through [`Session`].

pub mod context;
pub mod model;
pub mod normalize;
pub mod path;
pub mod session;
pub mod store;
pub mod subscription;

pub use context::SelfContext;
pub use model::*;
pub use normalize::{Mutation, Normalized};
pub use session::Session;
pub use store::{MemoryStore, PathEntry, SignalKStore, SourcePreference, DEFAULT_SOURCE};
pub use subscription::{ConsumerId, Listener, SubscriptionId, SubscriptionRegistry};
