//! Quantity literals such as "300 g" or "2.5 L", normalized to base units.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::DimKind;
use crate::units::{self, Extent};
use crate::units_extra;

/// A literal normalized to its dimension's base unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value_si: f64,
    pub dim: DimKind,
    pub pretty_unit: String,
}

static MASS_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(-?\d+(?:\.\d+)?)\s*(kg|g|lb|oz)$").unwrap());
static LIQUID_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*(mL|ml|L|l|gal)\b").unwrap());
static ENERGY_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*(kWh|kJ|J|kcal|cal)\b").unwrap());
static POWER_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*(kW|W|hp)\b").unwrap());
static PRESSURE_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d+(?:\.\d+)?)\s*(Pa|kPa|bar|psi)\b").unwrap());
static LENGTH_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*(mm|cm|km|m|in|ft|yd|mi)(?:\^?[23]\b|[²³]|\b)").unwrap());

/// Parse a literal in the fixed order mass, liquid volume, energy, power,
/// pressure, then length/area/volume. Returns `None` if nothing fits.
pub fn parse_quantity_literal(text: &str) -> Option<Quantity> {
    let s = text.trim();
    try_mass(s)
        .or_else(|| try_liquid(s))
        .or_else(|| try_energy(s))
        .or_else(|| try_power(s))
        .or_else(|| try_pressure(s))
        .or_else(|| try_length_like(s))
}

fn number(caps: &regex::Captures<'_>) -> Option<f64> {
    caps.get(1)?.as_str().parse::<f64>().ok()
}

fn try_mass(s: &str) -> Option<Quantity> {
    let caps = MASS_LITERAL.captures(s)?;
    let unit = units::canonical_mass(&caps[2])?;
    Some(Quantity {
        value_si: units::convert_mass(number(&caps)?, unit, "kg")?,
        dim: DimKind::Mass,
        pretty_unit: unit.to_string(),
    })
}

fn try_liquid(s: &str) -> Option<Quantity> {
    units_extra::detect_liquid_unit(s)?;
    let caps = LIQUID_LITERAL.captures(s)?;
    let unit = units_extra::canonical_liquid(&caps[2])?;
    Some(Quantity {
        value_si: units_extra::convert_liquid(number(&caps)?, unit, "L")?,
        dim: DimKind::VolumeLiquid,
        pretty_unit: unit.to_string(),
    })
}

fn try_energy(s: &str) -> Option<Quantity> {
    units_extra::detect_energy_unit(s)?;
    let caps = ENERGY_LITERAL.captures(s)?;
    let unit = units_extra::canonical_energy(&caps[2])?;
    Some(Quantity {
        value_si: units_extra::convert_energy(number(&caps)?, unit, "J")?,
        dim: DimKind::Energy,
        pretty_unit: unit.to_string(),
    })
}

fn try_power(s: &str) -> Option<Quantity> {
    units_extra::detect_power_unit(s)?;
    let caps = POWER_LITERAL.captures(s)?;
    let unit = units_extra::canonical_power(&caps[2])?;
    Some(Quantity {
        value_si: units_extra::convert_power(number(&caps)?, unit, "W")?,
        dim: DimKind::Power,
        pretty_unit: unit.to_string(),
    })
}

fn try_pressure(s: &str) -> Option<Quantity> {
    units_extra::detect_pressure_unit(s)?;
    let caps = PRESSURE_LITERAL.captures(s)?;
    let unit = units_extra::canonical_pressure(&caps[2])?;
    Some(Quantity {
        value_si: units_extra::convert_pressure(number(&caps)?, unit, "Pa")?,
        dim: DimKind::Pressure,
        pretty_unit: unit.to_string(),
    })
}

fn try_length_like(s: &str) -> Option<Quantity> {
    let detected = units::detect_length_like(s)?;
    let caps = LENGTH_LITERAL.captures(s)?;
    let unit = units::canonical_length(&caps[2])?;
    let value_si = units::convert_length_pow(number(&caps)?, unit, "m", detected.extent)?;
    let dim = match detected.extent {
        Extent::Length => DimKind::Length,
        Extent::Area => DimKind::Area,
        Extent::Volume => DimKind::Volume,
    };
    Some(Quantity {
        value_si,
        dim,
        pretty_unit: format!("{}{}", unit, detected.extent.superscript()),
    })
}
