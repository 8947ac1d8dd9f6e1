//! Guard rails checked before the arithmetic core runs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EvalError;

pub const MAX_EXPR_LEN: usize = 10_000;
pub const MAX_PARENS_DEPTH: usize = 64;
pub const MAX_LIST_ITEMS: usize = 10_000;
pub const MAX_RANGE_TERMS: u64 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_expr_len: usize,
    pub max_parens_depth: usize,
    pub max_list_items: usize,
    pub max_range_terms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_expr_len: MAX_EXPR_LEN,
            max_parens_depth: MAX_PARENS_DEPTH,
            max_list_items: MAX_LIST_ITEMS,
            max_range_terms: MAX_RANGE_TERMS,
        }
    }
}

static INNER_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(([^()]*)\)").unwrap());
static INT_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(-?\d+)\s*\.\.\s*(-?\d+)\b").unwrap());

/// Reject pathological input: length, nesting, list size and range size.
pub fn check_expression_guards(expr: &str, limits: &Limits) -> Result<(), EvalError> {
    if expr.chars().count() > limits.max_expr_len {
        return Err(EvalError::ExpressionTooLong);
    }

    let mut depth: i64 = 0;
    for ch in expr.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => continue,
        }
        if depth > limits.max_parens_depth as i64 {
            return Err(EvalError::TooDeep);
        }
        if depth < 0 {
            return Err(EvalError::Unbalanced);
        }
    }
    if depth != 0 {
        return Err(EvalError::Unbalanced);
    }

    for caps in INNER_GROUP.captures_iter(expr) {
        let items = caps[1].split(',').count();
        if items > limits.max_list_items {
            return Err(EvalError::ListTooLarge);
        }
    }

    for caps in INT_RANGE.captures_iter(expr) {
        match (caps[1].parse::<i128>(), caps[2].parse::<i128>()) {
            (Ok(a), Ok(b)) => {
                let terms = (b - a).unsigned_abs() + 1;
                if terms > u128::from(limits.max_range_terms) {
                    return Err(EvalError::RangeTooLarge);
                }
            }
            // Too many digits to even parse
            _ => return Err(EvalError::RangeTooLarge),
        }
    }

    Ok(())
}
