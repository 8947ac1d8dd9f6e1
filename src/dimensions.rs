//! Dimension analysis of the raw line: which unit kinds appear, whether
//! different kinds are added together, and a best-effort composite label.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{DimKind, DimensionsMeta};

#[derive(Debug, Clone, PartialEq)]
pub struct DimAnalysis {
    pub kinds_found: BTreeSet<DimKind>,
    pub has_add_sub: bool,
    pub has_mul: bool,
    pub has_div: bool,
    pub composite: Option<String>,
    pub add_sub_conflicts: Vec<(DimKind, DimKind)>,
}

impl DimAnalysis {
    pub fn to_meta(&self) -> DimensionsMeta {
        DimensionsMeta { kinds_found: self.kinds_found.clone(), composite: self.composite.clone() }
    }

    /// Soft-mode warning strings, one per conflicting pair.
    pub fn warnings(&self) -> Vec<String> {
        self.add_sub_conflicts
            .iter()
            .map(|(l, r)| format!("Adding or subtracting \"{}\" and \"{}\" may be incompatible.", l, r))
            .collect()
    }

    /// Hints attached to the strict-mode error.
    pub fn strict_suggestions(&self) -> Vec<String> {
        self.add_sub_conflicts
            .iter()
            .take(2)
            .map(|(l, r)| format!("Convert to the same dimension before adding: \"{}\" and \"{}\".", l, r))
            .collect()
    }
}

static KIND_PATTERNS: Lazy<Vec<(DimKind, Regex)>> = Lazy::new(|| {
    let table: [(DimKind, &str); 15] = [
        (DimKind::Currency, r"\b[A-Z]{3}\b"),
        (DimKind::Mass, r"(?i)\b(?:mg|g|kg|lb|oz)\b"),
        (DimKind::Area, r"(?i)\b(?:mm|cm|m|km|in|ft|yd|mi)(?:2\b|²)"),
        (DimKind::Volume, r"(?i)\b(?:mm|cm|m|km|in|ft|yd|mi)(?:3\b|³)"),
        (DimKind::VolumeLiquid, r"(?i)\b(?:ml|l|gal)\b"),
        (DimKind::Length, r"(?i)\b(?:mm|cm|m|km|in|ft|yd|mi)\b"),
        (DimKind::Temperature, r"(?i)(?:\b|°)(?:c|f|k)\b"),
        (DimKind::Data, r"(?i)\b(?:b|kb|mb|gb|tb|kib|mib|gib|tib)\b"),
        (DimKind::Css, r"(?i)\b(?:px|pt|em)\b"),
        (DimKind::Speed, r"(?i)\b(?:m/s|km/h|kph|mph|kn)\b"),
        (DimKind::Angle, r"(?i)\b(?:deg|rad|turn|degrees|radians|turns)\b"),
        (DimKind::Duration, r"(?i)\b(?:ms|s|sec|min|h|hr|d|day|days|wk|week|weeks)\b"),
        (DimKind::Energy, r"(?i)\b(?:j|kj|cal|kcal|kwh)\b"),
        (DimKind::Power, r"(?i)\b(?:w|kw|hp)\b"),
        (DimKind::Pressure, r"(?i)\b(?:pa|kpa|bar|psi)\b"),
    ];
    table.iter().map(|(kind, re)| (*kind, Regex::new(re).unwrap())).collect()
});

static PLUS_MINUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|[^*/])\s[+\-]\s").unwrap());

const UNIT_TOKEN: &str = r"(?:[A-Z]{3}|mm|cm|m|km|in|ft|yd|mi|mg|g|kg|lb|oz|ml|l|px|pt|em|b|kb|mb|gb|tb|kib|mib|gib|tib|deg|rad|turn|m/s|km/h|mph|kn)";

static COMPOSITE_DIV: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b{u}\b\s*/\s*\b{u}\b", u = UNIT_TOKEN)).unwrap());
static COMPOSITE_MUL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b{u}\b\s*\*\s*\b{u}\b", u = UNIT_TOKEN)).unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn detect_kinds(s: &str) -> BTreeSet<DimKind> {
    let mut kinds: BTreeSet<DimKind> =
        KIND_PATTERNS.iter().filter(|(_, re)| re.is_match(s)).map(|(kind, _)| *kind).collect();
    if kinds.is_empty() {
        kinds.insert(DimKind::Dimensionless);
    }
    kinds
}

fn infer_composite(s: &str) -> Option<String> {
    if let Some(m) = COMPOSITE_DIV.find(s) {
        return Some(WHITESPACE.replace_all(m.as_str(), "").into_owned());
    }
    COMPOSITE_MUL
        .find(s)
        .map(|m| WHITESPACE.replace_all(m.as_str(), "").replacen('*', "·", 1))
}

/// Analyze the line as the user typed it. Kinds only add to themselves;
/// every pair of distinct kinds in an additive expression is a conflict.
pub fn analyze_dimensions(input: &str) -> DimAnalysis {
    let s = format!(" {} ", input);
    let kinds_found = detect_kinds(&s);
    let has_add_sub = PLUS_MINUS.is_match(&format!(" {} ", s));
    let has_mul = s.contains('*');
    let has_div = s.contains('/');

    let mut add_sub_conflicts = Vec::new();
    if has_add_sub && kinds_found.len() > 1 {
        let kinds: Vec<DimKind> = kinds_found.iter().copied().collect();
        for (i, left) in kinds.iter().enumerate() {
            for right in &kinds[i + 1..] {
                add_sub_conflicts.push((*left, *right));
            }
        }
    }

    let composite = if has_mul || has_div { infer_composite(&s) } else { None };

    DimAnalysis { kinds_found, has_add_sub, has_mul, has_div, composite, add_sub_conflicts }
}
