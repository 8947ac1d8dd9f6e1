//! Variable and context-token substitution.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::format::number_literal;
use crate::quantity::parse_quantity_literal;
use crate::types::VarValue;

/// What a line can see besides its own text: earlier results in the same
/// sheet and the sheet's variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalContext {
    #[serde(default)]
    pub previous_values: Vec<f64>,
    #[serde(default)]
    pub variables: BTreeMap<String, VarValue>,
}

impl EvalContext {
    pub fn with_previous(previous_values: Vec<f64>) -> Self {
        Self { previous_values, variables: BTreeMap::new() }
    }
}

const RESERVED_NAMES: [&str; 8] = ["in", "to", "of", "on", "off", "sum", "avg", "prev"];

/// `apples` -> `apple`, `berries` -> `berry`, `buses` -> `bus`; `glass` stays.
pub fn singularize(id: &str) -> String {
    let x = id.to_lowercase();
    if let Some(stem) = x.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if x.ends_with("ses") {
        return x[..x.len() - 2].to_string();
    }
    if x.ends_with('s') && !x.ends_with("ss") {
        return x[..x.len() - 1].to_string();
    }
    x
}

fn is_currency_shaped(name: &str) -> bool {
    name.len() == 3 && name.chars().all(|c| c.is_ascii_uppercase())
}

/// Numeric stand-in for a variable. Strings go through the quantity parser
/// first (`"300 g"` -> 0.3), then a plain number parse.
pub fn numeric_value(value: &VarValue) -> Option<f64> {
    match value {
        VarValue::Number(n) => n.is_finite().then_some(*n),
        VarValue::Typed(typed) => typed.value_si.is_finite().then_some(typed.value_si),
        VarValue::Text(text) => match parse_quantity_literal(text) {
            Some(q) => Some(q.value_si),
            None => {
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                compact.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        },
    }
}

fn name_pattern(name: &str) -> Option<Regex> {
    let base = regex::escape(&singularize(name));
    let ies = match base.strip_suffix('y') {
        Some(stem) => format!("{}ies", stem),
        None => base.clone(),
    };
    Regex::new(&format!(r"(?i)\b({b}|{b}s|{b}es|{ies})\b", b = base, ies = ies)).ok()
}

/// Replace every variable name (singular or plural, any case) with its
/// numeric value. Reserved words and currency-shaped names are skipped.
pub fn apply_variables(input: &str, variables: &BTreeMap<String, VarValue>) -> String {
    let mut s = input.to_string();
    for (name, value) in variables {
        let lower = name.to_lowercase();
        if RESERVED_NAMES.contains(&lower.as_str()) || is_currency_shaped(name) {
            continue;
        }
        let Some(number) = numeric_value(value) else {
            continue;
        };
        let Some(re) = name_pattern(&lower) else {
            continue;
        };
        s = re.replace_all(&s, number_literal(number).as_str()).into_owned();
    }
    s
}

static PREV: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bprev\b").unwrap());
static SUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bsum\b").unwrap());
static AVG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bavg\b").unwrap());
static NTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\d+)\b").unwrap());

/// `prev`, `sum`, `avg` and `#N` over the sheet's earlier results.
/// Non-finite entries count as zero.
pub fn apply_context_tokens(input: &str, previous: &[f64]) -> String {
    let finite = |v: f64| if v.is_finite() { v } else { 0.0 };
    let prev = previous.last().copied().map_or(0.0, finite);
    let sum: f64 = previous.iter().copied().map(finite).sum();
    let avg = if previous.is_empty() { 0.0 } else { sum / previous.len() as f64 };

    let s = PREV.replace_all(input, number_literal(prev).as_str());
    let s = SUM.replace_all(&s, number_literal(sum).as_str());
    let s = AVG.replace_all(&s, number_literal(avg).as_str());
    NTH.replace_all(&s, |caps: &Captures<'_>| {
        let value = caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| previous.get(i).copied())
            .map_or(0.0, finite);
        number_literal(value)
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DimKind, TypedVar};

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("Apples"), "apple");
        assert_eq!(singularize("berries"), "berry");
        assert_eq!(singularize("buses"), "bus");
        assert_eq!(singularize("glass"), "glass");
    }

    #[test]
    fn test_plural_forms_resolve() {
        let mut vars = BTreeMap::new();
        vars.insert("apple".to_string(), VarValue::from("300g"));
        assert_eq!(apply_variables("5 apples", &vars), "5 0.3");
        assert_eq!(apply_variables("5 Apple", &vars), "5 0.3");

        let mut berries = BTreeMap::new();
        berries.insert("berry".to_string(), VarValue::from(2.0));
        assert_eq!(apply_variables("3 berries", &berries), "3 2");
    }

    #[test]
    fn test_reserved_and_currency_names_skipped() {
        let mut vars = BTreeMap::new();
        vars.insert("sum".to_string(), VarValue::from(1.0));
        vars.insert("USD".to_string(), VarValue::from(2.0));
        vars.insert("rent".to_string(), VarValue::from("1 200"));
        assert_eq!(apply_variables("sum + USD + rent", &vars), "sum + USD + 1200");
    }

    #[test]
    fn test_typed_vars_use_base_value() {
        let mut vars = BTreeMap::new();
        vars.insert(
            "flour".to_string(),
            VarValue::Typed(TypedVar {
                value_si: 0.5,
                pretty_unit: Some("g".into()),
                dim: Some(DimKind::Mass),
                comment: None,
                updated_at: None,
            }),
        );
        assert_eq!(apply_variables("2 * flour", &vars), "2 * 0.5");
    }

    #[test]
    fn test_context_tokens() {
        let prev = [10.0, 20.0, 30.0];
        assert_eq!(apply_context_tokens("prev + avg", &prev), "30 + 20");
        assert_eq!(apply_context_tokens("sum", &prev), "60");
        assert_eq!(apply_context_tokens("#1 + #9", &prev), "10 + 0");
        assert_eq!(apply_context_tokens("prev", &[]), "0");
        assert_eq!(apply_context_tokens("sum", &[1.0, f64::NAN]), "1");
    }
}
