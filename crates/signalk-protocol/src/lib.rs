//! # signalk-protocol
//!
//! Inbound SignalK frame codec.
//!
//! A SignalK stream is a sequence of JSON text frames: one hello, usually a
//! full snapshot, then deltas. This crate turns each frame into a
//! [`signalk_core::Document`] the session can ingest.

pub mod codec;

pub use codec::{classify, decode_frame, CodecError};
