//! # signalk-widgets
//!
//! Display widget engines that consume the SignalK data tree.
//!
//! Widgets subscribe paths on a [`signalk_core::Session`] under their own
//! consumer id and keep display-ready readings. Rendering is left to the
//! caller.

pub mod config;
pub mod units;
pub mod wind;

pub use config::{ConfigError, WindWidgetConfig, MAX_WINDOW_SECONDS};
pub use units::{convert, Quantity};
pub use wind::{AngleReference, WindHistory, WindReadings, WindWidget};
