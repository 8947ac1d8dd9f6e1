//! Liquid volume, energy, power and pressure.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::units::{convert_linear, FactorTable};

// Liquid volume (base litre)
pub const LIQUID: FactorTable = &[("mL", 0.001), ("L", 1.0), ("gal", 3.785411784)];

static LIQUID_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(ml|mL|l|L|gal)\b").unwrap());

pub fn detect_liquid_unit(text: &str) -> Option<&'static str> {
    let m = LIQUID_TOKEN.captures(text)?;
    canonical_liquid(&m[1])
}

pub fn canonical_liquid(unit: &str) -> Option<&'static str> {
    match unit.to_lowercase().as_str() {
        "ml" => Some("mL"),
        "l" => Some("L"),
        "gal" => Some("gal"),
        _ => None,
    }
}

pub fn convert_liquid(value: f64, from: &str, to: &str) -> Option<f64> {
    convert_linear(LIQUID, value, from, to)
}

pub fn liquid_precision(unit: &str) -> u32 {
    if unit == "mL" { 0 } else { 3 }
}

// Energy (base joule)
pub const ENERGY: FactorTable = &[
    ("J", 1.0),
    ("kJ", 1e3),
    ("cal", 4.184),
    ("kcal", 4184.0),
    ("kWh", 3.6e6),
];

static ENERGY_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(k?J|k?cal|kWh|cal|J)\b").unwrap());

pub fn detect_energy_unit(text: &str) -> Option<&'static str> {
    let m = ENERGY_TOKEN.captures(text)?;
    canonical_energy(&m[1])
}

pub fn canonical_energy(unit: &str) -> Option<&'static str> {
    match unit.to_lowercase().as_str() {
        "j" => Some("J"),
        "kj" => Some("kJ"),
        "cal" => Some("cal"),
        "kcal" => Some("kcal"),
        "kwh" => Some("kWh"),
        _ => None,
    }
}

pub fn convert_energy(value: f64, from: &str, to: &str) -> Option<f64> {
    convert_linear(ENERGY, value, from, to)
}

pub fn energy_precision(unit: &str, value: f64) -> u32 {
    if unit == "J" && value < 10.0 { 3 } else { 2 }
}

// Power (base watt)
pub const POWER: FactorTable = &[("W", 1.0), ("kW", 1e3), ("hp", 745.6998715822702)];

static POWER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(W|kW|kw|HP|hp)\b").unwrap());

pub fn detect_power_unit(text: &str) -> Option<&'static str> {
    let m = POWER_TOKEN.captures(text)?;
    canonical_power(&m[1])
}

pub fn canonical_power(unit: &str) -> Option<&'static str> {
    match unit.to_lowercase().as_str() {
        "w" => Some("W"),
        "kw" => Some("kW"),
        "hp" => Some("hp"),
        _ => None,
    }
}

pub fn convert_power(value: f64, from: &str, to: &str) -> Option<f64> {
    convert_linear(POWER, value, from, to)
}

pub fn power_precision(_unit: &str, _value: f64) -> u32 {
    2
}

// Pressure (base pascal)
pub const PRESSURE: FactorTable = &[
    ("Pa", 1.0),
    ("kPa", 1e3),
    ("bar", 1e5),
    ("psi", 6894.757293),
];

static PRESSURE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(Pa|kPa|bar|psi)\b").unwrap());

pub fn detect_pressure_unit(text: &str) -> Option<&'static str> {
    let m = PRESSURE_TOKEN.captures(text)?;
    canonical_pressure(&m[1])
}

pub fn canonical_pressure(unit: &str) -> Option<&'static str> {
    match unit.to_lowercase().as_str() {
        "pa" => Some("Pa"),
        "kpa" => Some("kPa"),
        "bar" => Some("bar"),
        "psi" => Some("psi"),
        _ => None,
    }
}

pub fn convert_pressure(value: f64, from: &str, to: &str) -> Option<f64> {
    convert_linear(PRESSURE, value, from, to)
}

pub fn pressure_precision(unit: &str, value: f64) -> u32 {
    if unit == "Pa" && value >= 10.0 { 2 } else { 3 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips() {
        for table in [LIQUID, ENERGY, POWER, PRESSURE] {
            for (a, _) in table {
                for (b, _) in table {
                    let there = convert_linear(table, 9.81, a, b).unwrap();
                    let back = convert_linear(table, there, b, a).unwrap();
                    assert!(((back - 9.81) / 9.81).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_detectors() {
        assert_eq!(detect_liquid_unit("2 L"), Some("L"));
        assert_eq!(detect_liquid_unit("250 ml"), Some("mL"));
        assert_eq!(detect_energy_unit("2 kwh"), Some("kWh"));
        assert_eq!(detect_power_unit("3 kW"), Some("kW"));
        // "kWh" is energy, never power
        assert_eq!(detect_power_unit("3 kWh"), None);
        assert_eq!(detect_pressure_unit("30 psi"), Some("psi"));
    }

    #[test]
    fn test_known_factors() {
        assert!((convert_energy(1.0, "kWh", "kJ").unwrap() - 3600.0).abs() < 1e-9);
        assert!((convert_liquid(1.0, "gal", "L").unwrap() - 3.785411784).abs() < 1e-12);
        assert!((convert_pressure(1.0, "bar", "kPa").unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(energy_precision("J", 5.0), 3);
        assert_eq!(pressure_precision("kPa", 500.0), 3);
        assert_eq!(liquid_precision("mL"), 0);
    }
}
