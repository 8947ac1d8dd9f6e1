//! Per-sheet variable scopes and the `name = value # comment` line form.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::quantity::parse_quantity_literal;
use crate::types::{DimKind, TypedVar, VarValue};

/// Scope used when the caller gives no sheet id.
pub const DEFAULT_SHEET: &str = "__default__";

pub type Scope = BTreeMap<String, VarValue>;

/// Variables partitioned by sheet. Scopes are created on first write and
/// never dropped by the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VarStore {
    sheets: HashMap<String, Scope>,
}

fn scope_key(sheet_id: Option<&str>) -> &str {
    match sheet_id {
        Some(id) if !id.is_empty() => id,
        _ => DEFAULT_SHEET,
    }
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_var(&mut self, name: &str, value: VarValue, sheet_id: Option<&str>) {
        self.sheets
            .entry(scope_key(sheet_id).to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    pub fn get_var(&self, name: &str, sheet_id: Option<&str>) -> Option<&VarValue> {
        self.sheets.get(scope_key(sheet_id))?.get(name)
    }

    /// Copy of every variable in the sheet; empty if the sheet is unknown.
    pub fn get_all_vars(&self, sheet_id: Option<&str>) -> Scope {
        self.sheets.get(scope_key(sheet_id)).cloned().unwrap_or_default()
    }

    /// Same as `get_all_vars` but for an explicit, named sheet.
    pub fn export_vars_from_sheet(&self, sheet_id: &str) -> Scope {
        self.sheets.get(sheet_id).cloned().unwrap_or_default()
    }

    /// Merge another sheet's variables into `into`; the imported value wins
    /// on a name clash. Returns how many variables were copied.
    pub fn import_vars(&mut self, from: &str, into: Option<&str>) -> usize {
        let vars = self.export_vars_from_sheet(from);
        let count = vars.len();
        for (name, value) in vars {
            self.set_var(&name, value, into);
        }
        count
    }
}

/// A parsed assignment line.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub name: String,
    pub value: VarValue,
}

static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_\- ]*?)\s*=\s*(.+?)\s*(?:#(.*))?$").unwrap());

/// `apple = 300 g  # market` and friends. The right-hand side is a plain
/// number, then a quantity literal, and otherwise kept as text. It is never
/// evaluated, so it cannot refer to other variables.
pub fn parse_assignment_line(line: &str) -> Option<Assignment> {
    let caps = ASSIGNMENT.captures(line)?;
    let name = caps[1].trim().to_string();
    let rhs = caps[2].trim();
    let comment = caps.get(3).map(|c| c.as_str().trim().to_string()).filter(|c| !c.is_empty());
    let updated_at = Some(chrono::Utc::now().timestamp_millis());

    let compact: String = rhs.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(n) = compact.parse::<f64>().ok().filter(|n| n.is_finite()) {
        let typed = TypedVar {
            value_si: n,
            pretty_unit: None,
            dim: Some(DimKind::Dimensionless),
            comment,
            updated_at,
        };
        return Some(Assignment { name, value: typed.into() });
    }

    if let Some(q) = parse_quantity_literal(rhs) {
        let typed = TypedVar {
            value_si: q.value_si,
            pretty_unit: Some(q.pretty_unit),
            dim: Some(q.dim),
            comment,
            updated_at,
        };
        return Some(Assignment { name, value: typed.into() });
    }

    Some(Assignment { name, value: VarValue::Text(rhs.to_string()) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(value: &VarValue) -> &TypedVar {
        match value {
            VarValue::Typed(t) => t,
            other => panic!("Expected typed variable, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_number() {
        let a = parse_assignment_line("rent = 1 200 # monthly").unwrap();
        assert_eq!(a.name, "rent");
        let t = typed(&a.value);
        assert_eq!(t.value_si, 1200.0);
        assert_eq!(t.dim, Some(DimKind::Dimensionless));
        assert_eq!(t.comment.as_deref(), Some("monthly"));
    }

    #[test]
    fn test_assignment_quantity() {
        let a = parse_assignment_line("apple = 300 g").unwrap();
        let t = typed(&a.value);
        assert!((t.value_si - 0.3).abs() < 1e-12);
        assert_eq!(t.dim, Some(DimKind::Mass));
        assert_eq!(t.pretty_unit.as_deref(), Some("g"));
        assert_eq!(t.comment, None);
    }

    #[test]
    fn test_assignment_text_fallback() {
        let a = parse_assignment_line("total mix = apples + 2").unwrap();
        assert_eq!(a.name, "total mix");
        assert_eq!(a.value, VarValue::Text("apples + 2".into()));
        assert!(parse_assignment_line("2 + 2").is_none());
        assert!(parse_assignment_line("100 usd = eur").is_none());
    }

    #[test]
    fn test_scopes_are_separate() {
        let mut store = VarStore::new();
        store.set_var("x", 1.0.into(), None);
        store.set_var("x", 2.0.into(), Some("Budget"));
        assert_eq!(store.get_var("x", None), Some(&VarValue::Number(1.0)));
        assert_eq!(store.get_var("x", Some("")), Some(&VarValue::Number(1.0)));
        assert_eq!(store.get_var("x", Some("Budget")), Some(&VarValue::Number(2.0)));
        assert!(store.get_all_vars(Some("Nope")).is_empty());
    }

    #[test]
    fn test_import_last_write_wins() {
        let mut store = VarStore::new();
        store.set_var("x", 1.0.into(), Some("A"));
        store.set_var("y", 5.0.into(), Some("A"));
        store.set_var("x", 9.0.into(), Some("B"));
        assert_eq!(store.import_vars("A", Some("B")), 2);
        assert_eq!(store.get_var("x", Some("B")), Some(&VarValue::Number(1.0)));
        assert_eq!(store.import_vars("Missing", Some("B")), 0);
    }
}
