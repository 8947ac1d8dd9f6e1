//! Unit catalog: per-kind factor tables, text detectors and converters.
//!
//! Every linear kind routes through a single base unit so that converting
//! there and back again is exact up to floating-point error. Temperature is
//! affine and always pivots through Kelvin.

use once_cell::sync::Lazy;
use regex::Regex;

/// Factor table: canonical unit code and its size in the kind's base unit.
pub type FactorTable = &'static [(&'static str, f64)];

pub fn factor(table: FactorTable, unit: &str) -> Option<f64> {
    table.iter().find(|(u, _)| *u == unit).map(|(_, f)| *f)
}

pub fn convert_linear(table: FactorTable, value: f64, from: &str, to: &str) -> Option<f64> {
    if from == to {
        return Some(value);
    }
    Some(value * factor(table, from)? / factor(table, to)?)
}

pub fn unit_codes(table: FactorTable) -> impl Iterator<Item = &'static str> {
    table.iter().map(|(u, _)| *u)
}

// Mass (base kg)
pub const MASS: FactorTable = &[
    ("kg", 1.0),
    ("g", 0.001),
    ("lb", 0.45359237),
    ("oz", 0.028349523125),
];

static MASS_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(kg|g|lb|oz)\b").unwrap());

/// First mass token in the text. "gb" is a data unit and never matches.
pub fn detect_mass_unit(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let m = MASS_TOKEN.captures(&lower)?;
    canonical_mass(&m[1])
}

pub fn canonical_mass(unit: &str) -> Option<&'static str> {
    match unit.to_lowercase().as_str() {
        "kg" => Some("kg"),
        "g" => Some("g"),
        "lb" => Some("lb"),
        "oz" => Some("oz"),
        _ => None,
    }
}

pub fn convert_mass(value: f64, from: &str, to: &str) -> Option<f64> {
    convert_linear(MASS, value, from, to)
}

// Temperature (affine, pivot K)
pub const TEMPERATURE_UNITS: [&str; 3] = ["c", "f", "k"];

static TEMP_C: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(\.\d+)?\s*°?\s*c\b").unwrap());
static TEMP_F: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(\.\d+)?\s*°?\s*f\b").unwrap());
static TEMP_K: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+(\.\d+)?\s*°?\s*k\b").unwrap());

/// A temperature unit written right after a number ("30 c", "98.6°f").
pub fn detect_temperature_unit(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    if TEMP_C.is_match(&lower) {
        Some("c")
    } else if TEMP_F.is_match(&lower) {
        Some("f")
    } else if TEMP_K.is_match(&lower) {
        Some("k")
    } else {
        None
    }
}

pub fn canonical_temperature(unit: &str) -> Option<&'static str> {
    match unit.to_lowercase().trim_start_matches('°') {
        "c" | "celsius" => Some("c"),
        "f" | "fahrenheit" => Some("f"),
        "k" | "kelvin" => Some("k"),
        _ => None,
    }
}

fn to_kelvin(value: f64, unit: &str) -> Option<f64> {
    match unit {
        "c" => Some(value + 273.15),
        "f" => Some((value - 32.0) * 5.0 / 9.0 + 273.15),
        "k" => Some(value),
        _ => None,
    }
}

fn from_kelvin(kelvin: f64, unit: &str) -> Option<f64> {
    match unit {
        "c" => Some(kelvin - 273.15),
        "f" => Some((kelvin - 273.15) * 9.0 / 5.0 + 32.0),
        "k" => Some(kelvin),
        _ => None,
    }
}

pub fn convert_temperature(value: f64, from: &str, to: &str) -> Option<f64> {
    if from == to {
        return Some(value);
    }
    from_kelvin(to_kelvin(value, from)?, to)
}

// Data size (base byte); decimal and binary prefixes are separate tables
pub const DATA_SI: FactorTable = &[
    ("b", 1.0),
    ("kb", 1e3),
    ("mb", 1e6),
    ("gb", 1e9),
    ("tb", 1e12),
];

pub const DATA_BINARY: FactorTable = &[
    ("kib", 1024.0),
    ("mib", 1_048_576.0),
    ("gib", 1_073_741_824.0),
    ("tib", 1_099_511_627_776.0),
];

pub const DATA_UNITS: [&str; 9] = ["b", "kb", "mb", "gb", "tb", "kib", "mib", "gib", "tib"];

static DATA_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(b|kb|mb|gb|tb|kib|mib|gib|tib)\b").unwrap());

pub fn detect_data_unit(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let m = DATA_TOKEN.captures(&lower)?;
    canonical_data(&m[1])
}

pub fn canonical_data(unit: &str) -> Option<&'static str> {
    let lower = unit.to_lowercase();
    DATA_UNITS.iter().copied().find(|u| *u == lower)
}

fn data_bytes(unit: &str) -> Option<f64> {
    factor(DATA_SI, unit).or_else(|| factor(DATA_BINARY, unit))
}

pub fn convert_data(value: f64, from: &str, to: &str) -> Option<f64> {
    if from == to {
        return Some(value);
    }
    Some(value * data_bytes(from)? / data_bytes(to)?)
}

/// Display form of a data unit ("mb" -> "MB", "kib" -> "KiB").
pub fn data_label(unit: &str) -> String {
    match unit {
        "b" => "B".to_string(),
        "kib" => "KiB".to_string(),
        "mib" => "MiB".to_string(),
        "gib" => "GiB".to_string(),
        "tib" => "TiB".to_string(),
        other => other.to_uppercase(),
    }
}

// CSS length (base px)
pub const CSS_PPI: f64 = 96.0;
pub const CSS_EM_PX: f64 = 16.0;

pub const CSS: FactorTable = &[("px", 1.0), ("pt", CSS_PPI / 72.0), ("em", CSS_EM_PX)];

static CSS_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(px|pt|em)\b").unwrap());

pub fn detect_css_unit(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let m = CSS_TOKEN.captures(&lower)?;
    unit_codes(CSS).find(|u| *u == &m[1])
}

// Duration (base second)
pub const DURATION: FactorTable = &[
    ("ms", 0.001),
    ("s", 1.0),
    ("min", 60.0),
    ("h", 3600.0),
    ("d", 86400.0),
];

pub const WEEK_SECONDS: f64 = 604_800.0;

pub fn canonical_duration(unit: &str) -> Option<&'static str> {
    match unit.to_lowercase().as_str() {
        "ms" => Some("ms"),
        "s" | "sec" => Some("s"),
        "min" => Some("min"),
        "h" | "hr" => Some("h"),
        "d" | "day" | "days" => Some("d"),
        _ => None,
    }
}

/// Seconds per unit for any duration spelling the expander accepts.
pub fn duration_seconds(unit: &str) -> Option<f64> {
    match unit.to_lowercase().as_str() {
        "wk" | "week" | "weeks" => Some(WEEK_SECONDS),
        other => factor(DURATION, canonical_duration(other)?),
    }
}

pub fn convert_duration(value: f64, from: &str, to: &str) -> Option<f64> {
    convert_linear(DURATION, value, from, to)
}

// Length / area / volume (base metre, raised to the power)
pub const LENGTH: FactorTable = &[
    ("mm", 0.001),
    ("cm", 0.01),
    ("m", 1.0),
    ("km", 1000.0),
    ("in", 0.0254),
    ("ft", 0.3048),
    ("yd", 0.9144),
    ("mi", 1609.344),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    Length,
    Area,
    Volume,
}

impl Extent {
    pub fn power(self) -> i32 {
        match self {
            Extent::Length => 1,
            Extent::Area => 2,
            Extent::Volume => 3,
        }
    }

    pub fn superscript(self) -> &'static str {
        match self {
            Extent::Length => "",
            Extent::Area => "²",
            Extent::Volume => "³",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Extent::Length => "length",
            Extent::Area => "area",
            Extent::Volume => "volume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthLike {
    pub extent: Extent,
    pub unit: &'static str,
}

pub fn canonical_length(word: &str) -> Option<&'static str> {
    match word.to_lowercase().as_str() {
        "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Some("mm"),
        "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => Some("cm"),
        "m" | "meter" | "meters" | "metre" | "metres" => Some("m"),
        "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => Some("km"),
        "in" | "inch" | "inches" => Some("in"),
        "ft" | "foot" | "feet" => Some("ft"),
        "yd" | "yard" | "yards" => Some("yd"),
        "mi" | "mile" | "miles" => Some("mi"),
        _ => None,
    }
}

static VOLUME_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:cubic|cu) ([a-z]+)\b").unwrap());
static AREA_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:square|sq) ([a-z]+)\b").unwrap());
static POWER_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([a-z]+)(?:\s*\^?\s*([23])\b|([²³]))").unwrap());
static LENGTH_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(millimet(?:er|re)s?|centimet(?:er|re)s?|kilomet(?:er|re)s?|met(?:er|re)s?|inch(?:es)?|foot|feet|yards?|miles?|mm|cm|km|m|in|ft|yd|mi)\b",
    )
    .unwrap()
});

/// Length, area or volume unit in free text. Area and volume come from
/// "square"/"cubic" prefixes or a power suffix (`m2`, `m^2`, `m²`).
pub fn detect_length_like(text: &str) -> Option<LengthLike> {
    let s = text.to_lowercase();

    for caps in VOLUME_PREFIX.captures_iter(&s) {
        if let Some(unit) = canonical_length(&caps[1]) {
            return Some(LengthLike { extent: Extent::Volume, unit });
        }
    }
    for caps in AREA_PREFIX.captures_iter(&s) {
        if let Some(unit) = canonical_length(&caps[1]) {
            return Some(LengthLike { extent: Extent::Area, unit });
        }
    }

    for caps in POWER_SUFFIX.captures_iter(&s) {
        let Some(unit) = canonical_length(&caps[1]) else {
            continue;
        };
        let power = match caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str()) {
            Some("2") | Some("²") => Extent::Area,
            Some("3") | Some("³") => Extent::Volume,
            _ => continue,
        };
        return Some(LengthLike { extent: power, unit });
    }

    for m in LENGTH_WORD.find_iter(&s) {
        // "km/h" and "m/s" belong to speed
        if is_speed_suffix(&s[m.end()..]) {
            continue;
        }
        if let Some(unit) = canonical_length(m.as_str()) {
            return Some(LengthLike { extent: Extent::Length, unit });
        }
    }

    None
}

fn is_speed_suffix(rest: &str) -> bool {
    let Some(after) = rest.strip_prefix('/') else {
        return false;
    };
    let word: String = after.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    matches!(word.as_str(), "h" | "s" | "hr" | "hour" | "second")
}

/// Parse a conversion target like "m", "m2", "m^3" or "ft²".
pub fn parse_length_target(raw: &str) -> Option<LengthLike> {
    let lower = raw.to_lowercase();
    let (word, extent) = if let Some(w) = lower.strip_suffix('²') {
        (w.to_string(), Extent::Area)
    } else if let Some(w) = lower.strip_suffix('³') {
        (w.to_string(), Extent::Volume)
    } else if let Some(w) = lower.strip_suffix('2') {
        (w.trim_end_matches('^').to_string(), Extent::Area)
    } else if let Some(w) = lower.strip_suffix('3') {
        (w.trim_end_matches('^').to_string(), Extent::Volume)
    } else {
        (lower.clone(), Extent::Length)
    };
    let unit = canonical_length(&word)?;
    Some(LengthLike { extent, unit })
}

/// Convert `value` expressed in `from^power` into `to^power`.
pub fn convert_length_pow(value: f64, from: &str, to: &str, extent: Extent) -> Option<f64> {
    if from == to {
        return Some(value);
    }
    let p = extent.power();
    Some(value * factor(LENGTH, from)?.powi(p) / factor(LENGTH, to)?.powi(p))
}

// Speed (base m/s)
pub const SPEED: FactorTable = &[
    ("m/s", 1.0),
    ("km/h", 1.0 / 3.6),
    ("mph", 0.44704),
    ("kn", 0.514444),
];

static SPEED_KMH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bkm/h\b|\bkph\b").unwrap());
static SPEED_MS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bm/s\b|\bmps\b").unwrap());
static SPEED_MPH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bmph\b").unwrap());
static SPEED_KN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bknots?\b|\bkn\b").unwrap());

pub fn detect_speed_unit(text: &str) -> Option<&'static str> {
    let s = text.to_lowercase();
    if SPEED_KMH.is_match(&s) {
        Some("km/h")
    } else if SPEED_MS.is_match(&s) {
        Some("m/s")
    } else if SPEED_MPH.is_match(&s) {
        Some("mph")
    } else if SPEED_KN.is_match(&s) {
        Some("kn")
    } else {
        None
    }
}

static SLASH_SPEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:km/h|m/s)\b").unwrap());

/// Blank out `km/h` and `m/s` so their slash never reaches the arithmetic.
pub fn blank_slash_speed_units(text: &str) -> String {
    SLASH_SPEED.replace_all(text, " ").into_owned()
}

pub fn canonical_speed(unit: &str) -> Option<&'static str> {
    match unit.to_lowercase().as_str() {
        "m/s" | "mps" => Some("m/s"),
        "km/h" | "kph" | "kmh" => Some("km/h"),
        "mph" => Some("mph"),
        "kn" | "knot" | "knots" => Some("kn"),
        _ => None,
    }
}

// Angle (base radian)
pub const ANGLE: FactorTable = &[
    ("deg", std::f64::consts::PI / 180.0),
    ("rad", 1.0),
    ("turn", std::f64::consts::TAU),
];

static ANGLE_DEG: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bdeg(?:rees?)?\b").unwrap());
static ANGLE_RAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\brad(?:ians?)?\b").unwrap());
static ANGLE_TURN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bturns?\b").unwrap());

pub fn detect_angle_unit(text: &str) -> Option<&'static str> {
    let s = text.to_lowercase();
    if ANGLE_DEG.is_match(&s) {
        Some("deg")
    } else if ANGLE_RAD.is_match(&s) {
        Some("rad")
    } else if ANGLE_TURN.is_match(&s) {
        Some("turn")
    } else {
        None
    }
}

pub fn canonical_angle(unit: &str) -> Option<&'static str> {
    match unit.to_lowercase().as_str() {
        "deg" | "degree" | "degrees" => Some("deg"),
        "rad" | "radian" | "radians" => Some("rad"),
        "turn" | "turns" => Some("turn"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip(table: FactorTable) {
        for (a, _) in table {
            for (b, _) in table {
                let v = 123.456;
                let there = convert_linear(table, v, a, b).unwrap();
                let back = convert_linear(table, there, b, a).unwrap();
                assert!(((back - v) / v).abs() < 1e-9, "{} -> {} -> {}", a, b, a);
            }
        }
    }

    #[test]
    fn test_linear_round_trips() {
        for table in [MASS, CSS, DURATION, SPEED, ANGLE] {
            assert_round_trip(table);
        }
        assert!((convert_mass(1.0, "lb", "g").unwrap() - 453.59237).abs() < 1e-9);
    }

    #[test]
    fn test_data_round_trips_across_tables() {
        for a in DATA_UNITS {
            for b in DATA_UNITS {
                let back = convert_data(convert_data(7.5, a, b).unwrap(), b, a).unwrap();
                assert!(((back - 7.5) / 7.5).abs() < 1e-9);
            }
        }
        assert!((convert_data(2.0, "gb", "mb").unwrap() - 2000.0).abs() < 1e-9);
        assert!((convert_data(1.0, "mib", "kib").unwrap() - 1024.0).abs() < 1e-9);
    }

    #[test]
    fn test_length_pow_round_trips() {
        for extent in [Extent::Length, Extent::Area, Extent::Volume] {
            for (a, _) in LENGTH {
                for (b, _) in LENGTH {
                    let there = convert_length_pow(42.0, a, b, extent).unwrap();
                    let back = convert_length_pow(there, b, a, extent).unwrap();
                    assert!(((back - 42.0) / 42.0).abs() < 1e-9);
                }
            }
        }
        let sq = convert_length_pow(1.0, "m", "cm", Extent::Area).unwrap();
        assert!((sq - 10_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_temperature_pivots_through_kelvin() {
        assert!((convert_temperature(0.0, "c", "f").unwrap() - 32.0).abs() < 1e-9);
        assert!((convert_temperature(212.0, "f", "c").unwrap() - 100.0).abs() < 1e-9);
        assert!((convert_temperature(0.0, "k", "c").unwrap() + 273.15).abs() < 1e-9);
        for a in TEMPERATURE_UNITS {
            for b in TEMPERATURE_UNITS {
                let back = convert_temperature(convert_temperature(36.6, a, b).unwrap(), b, a).unwrap();
                assert!((back - 36.6).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_detectors_respect_word_boundaries() {
        assert_eq!(detect_mass_unit("2 gb"), None);
        assert_eq!(detect_mass_unit("1500 g"), Some("g"));
        assert_eq!(detect_data_unit("2 GB"), Some("gb"));
        assert_eq!(detect_css_unit("12 pt"), Some("pt"));
        assert_eq!(detect_temperature_unit("0 c"), Some("c"));
        assert_eq!(detect_temperature_unit("5 cm"), None);
        assert_eq!(detect_speed_unit("60 mph"), Some("mph"));
        assert_eq!(detect_angle_unit("90 degrees"), Some("deg"));
    }

    #[test]
    fn test_blank_slash_speed_units() {
        assert_eq!(blank_slash_speed_units("90 km/h").trim(), "90");
        assert_eq!(blank_slash_speed_units("20 M/S * 2").split_whitespace().collect::<Vec<_>>(), ["20", "*", "2"]);
        assert_eq!(blank_slash_speed_units("10 / 2"), "10 / 2");
    }

    #[test]
    fn test_detect_length_like() {
        assert_eq!(
            detect_length_like("3 square feet"),
            Some(LengthLike { extent: Extent::Area, unit: "ft" })
        );
        assert_eq!(
            detect_length_like("2 m3"),
            Some(LengthLike { extent: Extent::Volume, unit: "m" })
        );
        assert_eq!(
            detect_length_like("5 km"),
            Some(LengthLike { extent: Extent::Length, unit: "km" })
        );
        // speed units are not lengths
        assert_eq!(detect_length_like("90 km/h"), None);
    }

    #[test]
    fn test_parse_length_target() {
        assert_eq!(
            parse_length_target("cm2"),
            Some(LengthLike { extent: Extent::Area, unit: "cm" })
        );
        assert_eq!(
            parse_length_target("ft"),
            Some(LengthLike { extent: Extent::Length, unit: "ft" })
        );
        assert_eq!(parse_length_target("kg"), None);
    }
}
