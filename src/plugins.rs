//! Extension hooks around the pipeline. A failing or panicking hook is
//! logged and skipped; it never changes the outcome of an evaluation.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::PluginError;
use crate::types::CalculationResult;

/// What an after-evaluate hook sees. Changes to `result` are kept only if
/// the hook returns `Ok`.
#[derive(Debug)]
pub struct AfterEvaluate<'a> {
    pub input: &'a str,
    pub normalized_expression: &'a str,
    pub value: f64,
    pub result: &'a mut CalculationResult,
}

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Rewrite the line after alias normalization and before deal parsing.
    fn before_parse(&self, input: &str) -> Result<String, PluginError> {
        Ok(input.to_string())
    }

    fn after_evaluate(&self, _event: &mut AfterEvaluate<'_>) -> Result<(), PluginError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        log::debug!("registered plugin '{}'", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Thread the text through every hook; a failing hook passes the text on unchanged.
    pub fn run_before_parse(&self, input: &str) -> String {
        let mut current = input.to_string();
        for plugin in &self.plugins {
            let outcome = catch_unwind(AssertUnwindSafe(|| plugin.before_parse(&current)));
            match outcome {
                Ok(Ok(next)) => current = next,
                Ok(Err(err)) => log::warn!("{}", err),
                Err(_) => log::warn!("plugin '{}' panicked in before_parse", plugin.name()),
            }
        }
        current
    }

    /// Run every hook against a copy of `result`, committing each copy only on success.
    pub fn run_after_evaluate(&self, input: &str, normalized_expression: &str, result: &mut CalculationResult) {
        for plugin in &self.plugins {
            let mut draft = result.clone();
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut event = AfterEvaluate {
                    input,
                    normalized_expression,
                    value: draft.value,
                    result: &mut draft,
                };
                plugin.after_evaluate(&mut event)
            }));
            match outcome {
                Ok(Ok(())) => *result = draft,
                Ok(Err(err)) => log::warn!("{}", err),
                Err(_) => log::warn!("plugin '{}' panicked in after_evaluate", plugin.name()),
            }
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.plugins.iter().map(|p| p.name()).collect();
        f.debug_struct("PluginRegistry").field("plugins", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultType;

    struct Shout;

    impl Plugin for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn before_parse(&self, input: &str) -> Result<String, PluginError> {
            Ok(input.replace("dozen", "12"))
        }

        fn after_evaluate(&self, event: &mut AfterEvaluate<'_>) -> Result<(), PluginError> {
            event.result.metadata.extra.insert("shout".into(), serde_json::json!(event.value));
            Ok(())
        }
    }

    struct Broken;

    impl Plugin for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn before_parse(&self, _input: &str) -> Result<String, PluginError> {
            Err(PluginError::new("broken", "nope"))
        }

        fn after_evaluate(&self, event: &mut AfterEvaluate<'_>) -> Result<(), PluginError> {
            event.result.value = -1.0;
            panic!("after_evaluate exploded");
        }
    }

    fn result() -> CalculationResult {
        CalculationResult::new(24.0, "24.000".into(), None, ResultType::Number)
    }

    #[test]
    fn test_before_parse_chain_skips_failures() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(Broken));
        registry.register(Box::new(Shout));
        assert_eq!(registry.run_before_parse("2 dozen"), "2 12");
    }

    #[test]
    fn test_after_evaluate_commits_only_on_success() {
        let mut registry = PluginRegistry::new();
        registry.register(Box::new(Shout));
        registry.register(Box::new(Broken));
        let mut r = result();
        registry.run_after_evaluate("2 dozen", "2 * 12", &mut r);
        assert_eq!(r.value, 24.0);
        assert_eq!(r.metadata.extra.get("shout"), Some(&serde_json::json!(24.0)));
    }
}
