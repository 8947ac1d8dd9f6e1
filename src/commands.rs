//! Line forms that are not expressions: assignments and variable imports.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::EvalOptions;
use crate::context::EvalContext;
use crate::evaluator::Evaluator;
use crate::market::MarketData;
use crate::types::EvaluateResult;
use crate::vars::{parse_assignment_line, VarStore};

static IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)^\s*import\s+vars\s+from\s+["'](.+?)["']\s*$"#).unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CommandOutcome {
    Assign { name: String, stored: bool },
    Import { sheet: String, count: usize },
    Calc { evaluation: EvaluateResult },
}

impl Evaluator {
    /// Run `raw_line` as an assignment, an import, or else an expression
    /// that sees every variable of `options.sheet_id`.
    pub fn evaluate_line_or_command(
        &self,
        raw_line: &str,
        market: &dyn MarketData,
        previous_values: &[f64],
        store: &mut VarStore,
        options: &EvalOptions,
    ) -> CommandOutcome {
        let line = raw_line.trim();
        let sheet = options.sheet_id.as_deref();

        if let Some(assignment) = parse_assignment_line(line) {
            log::debug!("assign '{}' in sheet {:?}", assignment.name, sheet);
            store.set_var(&assignment.name, assignment.value, sheet);
            return CommandOutcome::Assign { name: assignment.name, stored: true };
        }

        if let Some(caps) = IMPORT.captures(line) {
            let from = caps[1].to_string();
            let count = store.import_vars(&from, sheet);
            log::debug!("imported {} vars from '{}'", count, from);
            return CommandOutcome::Import { sheet: from, count };
        }

        let ctx = EvalContext { previous_values: previous_values.to_vec(), variables: store.get_all_vars(sheet) };
        CommandOutcome::Calc { evaluation: self.evaluate(line, market, Some(&ctx), options) }
    }
}
