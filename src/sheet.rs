use crate::commands::CommandOutcome;
use crate::config::EvalOptions;
use crate::evaluator::Evaluator;
use crate::market::MarketData;
use crate::vars::VarStore;

/// A list of lines evaluated top to bottom. Each numeric result becomes
/// visible to later lines through `prev`, `sum`, `avg` and `#N`.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub id: String,
    pub lines: Vec<String>,
    pub outcomes: Vec<Option<CommandOutcome>>,
    previous_values: Vec<f64>,
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("//")
}

impl Sheet {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string(), ..Default::default() }
    }

    pub fn from_text(id: &str, text: &str) -> Self {
        let mut sheet = Self::new(id);
        sheet.lines = text.lines().map(str::to_string).collect();
        sheet
    }

    pub fn push_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    pub fn previous_values(&self) -> &[f64] {
        &self.previous_values
    }

    /// Re-evaluate every line. Blank lines and `#` / `//` comments produce
    /// no outcome and do not count as previous values.
    pub fn evaluate(
        &mut self,
        evaluator: &Evaluator,
        market: &dyn MarketData,
        store: &mut VarStore,
        options: &EvalOptions,
    ) -> &[Option<CommandOutcome>] {
        let options = options.clone().with_sheet(&self.id);
        self.previous_values.clear();
        self.outcomes.clear();

        for line in &self.lines {
            let trimmed = line.trim();
            if trimmed.is_empty() || is_comment(trimmed) {
                self.outcomes.push(None);
                continue;
            }
            let outcome = evaluator.evaluate_line_or_command(trimmed, market, &self.previous_values, store, &options);
            if let CommandOutcome::Calc { evaluation } = &outcome {
                if let Some(result) = &evaluation.result {
                    self.previous_values.push(result.value);
                }
            }
            self.outcomes.push(Some(outcome));
        }
        &self.outcomes
    }

    /// One display string per line, aligned with `lines`.
    pub fn display_lines(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .map(|outcome| match outcome {
                None => String::new(),
                Some(CommandOutcome::Assign { .. }) => String::new(),
                Some(CommandOutcome::Import { sheet, count }) => format!("{} vars from {}", count, sheet),
                Some(CommandOutcome::Calc { evaluation }) => match (&evaluation.result, &evaluation.error) {
                    (Some(result), _) => result.to_string(),
                    (None, Some(error)) => format!("Error: {}", error),
                    (None, None) => String::new(),
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::StaticMarketData;

    #[test]
    fn test_sheet_feeds_previous_values() {
        let evaluator = Evaluator::default();
        let market = StaticMarketData::fallback();
        let mut store = VarStore::new();
        let mut sheet = Sheet::from_text("Notes", "10\n# comment\n\n20\nprev + sum");
        sheet.evaluate(&evaluator, &market, &mut store, &EvalOptions::default());

        assert_eq!(sheet.previous_values(), &[10.0, 20.0, 50.0]);
        let shown = sheet.display_lines();
        assert_eq!(shown[1], "");
        assert_eq!(shown[4], "50.000");
    }

    #[test]
    fn test_sheet_variables_and_errors() {
        let evaluator = Evaluator::default();
        let market = StaticMarketData::fallback();
        let mut store = VarStore::new();
        let mut sheet = Sheet::new("Kitchen");
        sheet.push_line("flour = 2 kg");
        sheet.push_line("flour * 3");
        sheet.push_line("((");
        sheet.evaluate(&evaluator, &market, &mut store, &EvalOptions::default());

        let shown = sheet.display_lines();
        assert_eq!(shown[0], "");
        assert_eq!(shown[1], "6.000");
        assert_eq!(shown[2], "Error: Unbalanced parentheses");
        assert!(store.get_var("flour", Some("Kitchen")).is_some());
    }
}
