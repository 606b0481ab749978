//! Unit conversion for display.
//!
//! SignalK values are SI: angles in radians, speeds in m/s. Widgets convert
//! them to the unit the user picked just before display.

use std::f64::consts::PI;

use serde_json::Value;

/// Physical quantity a value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Angle,
    Speed,
}

/// Angle units, SI first.
pub const ANGLE_UNITS: &[&str] = &["rad", "deg"];

/// Speed units, SI first.
pub const SPEED_UNITS: &[&str] = &["m/s", "knots", "km/h", "mph"];

impl Quantity {
    /// Units a value of this quantity can be displayed in.
    pub fn units(self) -> &'static [&'static str] {
        match self {
            Quantity::Angle => ANGLE_UNITS,
            Quantity::Speed => SPEED_UNITS,
        }
    }
}

/// Convert an SI value to `unit`. Returns `None` for units the quantity
/// does not know.
pub fn convert(quantity: Quantity, unit: &str, value: f64) -> Option<f64> {
    let converted = match (quantity, unit) {
        (Quantity::Angle, "rad") => value,
        (Quantity::Angle, "deg") => value * 180.0 / PI,
        (Quantity::Speed, "m/s") => value,
        (Quantity::Speed, "knots") => value * 3600.0 / 1852.0,
        (Quantity::Speed, "km/h") => value * 3.6,
        (Quantity::Speed, "mph") => value * 3600.0 / 1609.344,
        _ => return None,
    };
    Some(converted)
}

/// Convert a JSON value; non-numeric values yield `None`.
pub fn convert_value(quantity: Quantity, unit: &str, value: &Value) -> Option<f64> {
    convert(quantity, unit, value.as_f64()?)
}
