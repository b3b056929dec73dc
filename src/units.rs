//! Pure unit-conversion helpers for physical quantities.
//!
//! Quantities appear in recipe documents either as bare numbers (already in
//! the engine's canonical units — pounds and gallons) or as
//! `{ "amount": 4.5, "unit": "kg" }` objects. Parsing is strict: an
//! unrecognized unit or malformed quantity is a typed error, raised to the
//! calling formula and never caught by the engine.

use std::str::FromStr;

use serde_json::Value;

use crate::error::QuantityError;

/// Units of weight accepted in recipe documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightUnit {
    /// Kilograms.
    Kilograms,
    /// Grams.
    Grams,
    /// Pounds.
    Pounds,
    /// Ounces.
    Ounces,
}

impl FromStr for WeightUnit {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" | "kilogram" | "kilograms" => Ok(WeightUnit::Kilograms),
            "g" | "gram" | "grams" => Ok(WeightUnit::Grams),
            "lb" | "lbs" | "pound" | "pounds" => Ok(WeightUnit::Pounds),
            "oz" | "ounce" | "ounces" => Ok(WeightUnit::Ounces),
            other => Err(QuantityError::UnrecognizedUnit(other.to_string())),
        }
    }
}

impl WeightUnit {
    /// Convert an amount in this unit to pounds.
    pub fn to_pounds(self, amount: f64) -> f64 {
        match self {
            WeightUnit::Kilograms => amount / 0.453_592_37,
            WeightUnit::Grams => amount / 453.592_37,
            WeightUnit::Pounds => amount,
            WeightUnit::Ounces => amount / 16.0,
        }
    }
}

/// Units of volume accepted in recipe documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeUnit {
    /// Liters.
    Liters,
    /// Milliliters.
    Milliliters,
    /// US gallons.
    Gallons,
    /// US quarts.
    Quarts,
}

impl FromStr for VolumeUnit {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l" | "liter" | "liters" | "litre" | "litres" => Ok(VolumeUnit::Liters),
            "ml" | "milliliter" | "milliliters" => Ok(VolumeUnit::Milliliters),
            "gal" | "gallon" | "gallons" => Ok(VolumeUnit::Gallons),
            "qt" | "quart" | "quarts" => Ok(VolumeUnit::Quarts),
            other => Err(QuantityError::UnrecognizedUnit(other.to_string())),
        }
    }
}

impl VolumeUnit {
    /// Convert an amount in this unit to US gallons.
    pub fn to_gallons(self, amount: f64) -> f64 {
        match self {
            VolumeUnit::Liters => amount / 3.785_411_784,
            VolumeUnit::Milliliters => amount / 3_785.411_784,
            VolumeUnit::Gallons => amount,
            VolumeUnit::Quarts => amount / 4.0,
        }
    }
}

/// Read a document weight as pounds.
///
/// Accepts a bare number (already pounds) or an `{ amount, unit }` object.
pub fn weight_lb(value: &Value) -> Result<f64, QuantityError> {
    quantity(value, |unit, amount| {
        Ok(unit.parse::<WeightUnit>()?.to_pounds(amount))
    })
}

/// Read a document volume as US gallons.
///
/// Accepts a bare number (already gallons) or an `{ amount, unit }` object.
pub fn volume_gal(value: &Value) -> Result<f64, QuantityError> {
    quantity(value, |unit, amount| {
        Ok(unit.parse::<VolumeUnit>()?.to_gallons(amount))
    })
}

fn quantity(
    value: &Value,
    convert: impl FnOnce(&str, f64) -> Result<f64, QuantityError>,
) -> Result<f64, QuantityError> {
    if let Some(n) = value.as_f64() {
        return Ok(n);
    }
    let Some(object) = value.as_object() else {
        return Err(QuantityError::Malformed(format!(
            "expected a number or an amount/unit object, got {}",
            value
        )));
    };
    let amount = object
        .get("amount")
        .and_then(Value::as_f64)
        .ok_or_else(|| QuantityError::Malformed("missing numeric `amount`".to_string()))?;
    let unit = object
        .get("unit")
        .and_then(Value::as_str)
        .ok_or_else(|| QuantityError::Malformed("missing `unit` string".to_string()))?;
    convert(unit, amount)
}
