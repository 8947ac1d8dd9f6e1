use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::aliases::normalize_unit_and_currency_aliases;
use crate::classify::{self, Detection, DetectedKind, KindHints, RenderContext, Target};
use crate::config::{EngineConfig, EvalOptions};
use crate::context::{apply_context_tokens, apply_variables, EvalContext};
use crate::datetime;
use crate::deals::{deal_chips, parse_deal_semantics, DealParse};
use crate::dimensions::analyze_dimensions;
use crate::error::EvalError;
use crate::limits::check_expression_guards;
use crate::market::{resolve_dynamic_tokens, MarketData};
use crate::math;
use crate::memo::Lru;
use crate::nlp;
use crate::plugins::{Plugin, PluginRegistry};
use crate::recovery::recover;
use crate::sugars::{self, Lcg, DEFAULT_SEED};
use crate::types::{CalculationResult, DealMeta, EvaluateResult, RangeMeta, RecoveryInfo};
use crate::units;

const GUARD_SUGGESTION: &str = "Try reducing the expression size or splitting it into steps.";
const MAX_ECHOED_CHARS: usize = 2000;

static CURRENCY_QUERY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)=\s*([a-z]{3})\??$").unwrap());

// Text after the sugar chain, plus what was learned on the way
struct Normalized {
    expression: String,
    target: Option<Target>,
    currency_query: Option<String>,
    deal: Option<DealMeta>,
    used_currencies: BTreeSet<String>,
    detection: Detection,
    has_durations: bool,
}

/// The line evaluator. Owns its caches, plugins and per-sheet locales, so
/// independent instances never share state; one instance can be shared
/// across threads.
pub struct Evaluator {
    config: EngineConfig,
    alias_cache: Mutex<Lru<String, String>>,
    deal_cache: Mutex<Lru<String, DealParse>>,
    sheet_locales: Mutex<HashMap<String, String>>,
    plugins: PluginRegistry,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.config)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}

// A poisoned cache is still a valid cache
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn echo(expr: &str) -> String {
    if expr.chars().count() > MAX_ECHOED_CHARS {
        let head: String = expr.chars().take(MAX_ECHOED_CHARS).collect();
        format!("{} …", head)
    } else {
        expr.to_string()
    }
}

fn guard_failure(err: EvalError, expr: &str) -> EvaluateResult {
    log::debug!("guard rejected expression: {}", err);
    EvaluateResult::failed(
        err.to_string(),
        Some(RecoveryInfo {
            suggestions: vec![GUARD_SUGGESTION.to_string()],
            normalized_expression: Some(echo(expr)),
            ..Default::default()
        }),
    )
}

impl Evaluator {
    pub fn new(config: EngineConfig) -> Self {
        let capacity = config.cache_capacity;
        Self {
            config,
            alias_cache: Mutex::new(Lru::new(capacity)),
            deal_cache: Mutex::new(Lru::new(capacity)),
            sheet_locales: Mutex::new(HashMap::new()),
            plugins: PluginRegistry::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.register(plugin);
    }

    /// Locale used for a sheet when the call itself does not name one.
    pub fn set_sheet_locale(&self, sheet_id: &str, locale: &str) {
        lock(&self.sheet_locales).insert(sheet_id.to_string(), locale.to_string());
    }

    pub fn clear_sheet_locale(&self, sheet_id: &str) {
        lock(&self.sheet_locales).remove(sheet_id);
    }

    /// `options.locale`, then the sheet's locale, then the engine default.
    pub fn resolve_locale(&self, options: &EvalOptions) -> String {
        if let Some(locale) = options.locale.as_deref().filter(|l| !l.trim().is_empty()) {
            return locale.to_string();
        }
        if let Some(sheet) = options.sheet_id.as_deref() {
            if let Some(locale) = lock(&self.sheet_locales).get(sheet) {
                return locale.clone();
            }
        }
        self.config.default_locale.clone()
    }

    pub fn clear_caches(&self) {
        lock(&self.alias_cache).clear();
        lock(&self.deal_cache).clear();
    }

    fn aliases(&self, input: &str) -> String {
        let key = input.to_string();
        if let Some(hit) = lock(&self.alias_cache).get(&key) {
            return hit;
        }
        let out = normalize_unit_and_currency_aliases(input);
        lock(&self.alias_cache).set(key, out.clone());
        out
    }

    fn deals(&self, input: &str) -> DealParse {
        let key = input.to_string();
        if let Some(hit) = lock(&self.deal_cache).get(&key) {
            return hit;
        }
        let out = parse_deal_semantics(input);
        lock(&self.deal_cache).set(key, out.clone());
        out
    }

    // The ordered rewrite chain, from raw line to an arithmetic expression
    fn normalize(
        &self,
        input: &str,
        market: &dyn MarketData,
        ctx: Option<&EvalContext>,
        options: &EvalOptions,
    ) -> Normalized {
        let features = options.features;
        let s = if features.allow_rand {
            let mut rng = Lcg::new(features.seed.unwrap_or(DEFAULT_SEED));
            sugars::apply_rand(input, &mut rng)
        } else {
            input.to_string()
        };
        let s = sugars::normalize_fractions(&s);
        let s = nlp::apply_connectors(&s);
        let s = nlp::normalize_range_and_list_fns(&s);
        let s = sugars::normalize_radix(&s);
        let s = sugars::apply_scale_suffixes(&s);
        let s = sugars::apply_math_sugars(&s);
        let s = sugars::apply_constants(&s);
        let s = sugars::strip_numeric_separators(&s);
        let s = sugars::expand_percent_phrases(&s);

        let mut has_durations = sugars::has_duration_tokens(&s);
        let s = if has_durations { sugars::expand_durations(&s) } else { s };

        let (s, target) = classify::split_in_clause(&s);
        let s = sugars::standardize_currency_symbols(&s);
        let s = self.aliases(&s);
        // Aliases can produce duration units ("2 horas" -> "2 h")
        let s = if sugars::has_duration_tokens(&s) {
            has_durations = true;
            sugars::expand_durations(&s)
        } else {
            s
        };
        let s = self.plugins.run_before_parse(&s);

        let DealParse { normalized: s, deal } = self.deals(&s);

        let (s, currency_query) = match CURRENCY_QUERY.captures(&s) {
            Some(caps) => {
                let code = caps[1].to_uppercase();
                let start = caps.get(0).map_or(s.len(), |m| m.start());
                (s[..start].trim().to_string(), Some(code))
            }
            None => (s, None),
        };

        let s = match ctx {
            Some(ctx) => apply_context_tokens(&apply_variables(&s, &ctx.variables), &ctx.previous_values),
            None => s,
        };
        let s = sugars::convert_bare_percent(&s);

        let detection = Detection::scan(&s);
        let s = units::blank_slash_speed_units(&s);
        let (s, used_currencies) = resolve_dynamic_tokens(&s, market);
        let s = sugars::implicit_multiplication_between_numbers(&s);
        let expression = sugars::implicit_multiplication_around_parens(&s);

        Normalized { expression, target, currency_query, deal, used_currencies, detection, has_durations }
    }

    /// Evaluate one line. Never panics on malformed input: the envelope
    /// holds either a result or an error string with recovery hints.
    pub fn evaluate(
        &self,
        raw: &str,
        market: &dyn MarketData,
        ctx: Option<&EvalContext>,
        options: &EvalOptions,
    ) -> EvaluateResult {
        let input = raw.trim();
        if input.is_empty() {
            return EvaluateResult::default();
        }
        let locale = self.resolve_locale(options);
        let now = options.reference_time();

        if let Err(err) = check_expression_guards(input, &self.config.limits) {
            return guard_failure(err, input);
        }

        match datetime::evaluate_dates(input, now, &locale) {
            Some(Ok(result)) => return EvaluateResult::ok(result),
            Some(Err(err)) => return EvaluateResult::failed(err.to_string(), None),
            None => {}
        }

        let dims = analyze_dimensions(input);
        if options.features.strict_dimensions && !dims.add_sub_conflicts.is_empty() {
            return EvaluateResult::failed(
                EvalError::IncompatibleUnits.to_string(),
                Some(RecoveryInfo { suggestions: dims.strict_suggestions(), ..Default::default() }),
            );
        }

        let norm = self.normalize(input, market, ctx, options);
        log::debug!("normalized '{}' -> '{}'", input, norm.expression);

        if let Err(err) = check_expression_guards(&norm.expression, &self.config.limits) {
            return guard_failure(err, &norm.expression);
        }

        let math_expr = math::sanitize(&norm.expression);
        if math_expr.is_empty() {
            return EvaluateResult::failed(
                EvalError::InvalidCalculation.to_string(),
                Some(recover(input, &norm.expression, false)),
            );
        }

        let raw_value = match math::evaluate(&math_expr) {
            Ok(v) => v,
            Err(err) => {
                log::debug!("evaluation failed for '{}': {}", math_expr, err);
                return EvaluateResult::failed(
                    EvalError::InvalidCalculation.to_string(),
                    Some(recover(input, &norm.expression, true)),
                );
            }
        };

        let kind = classify::detect_kind(
            &norm.detection,
            KindHints {
                target: norm.target.as_ref(),
                used_currencies: Some(&norm.used_currencies),
                currency_query: norm.currency_query.as_deref(),
                has_durations: norm.has_durations,
            },
        );
        let approximate = matches!(kind, DetectedKind::Currency { .. }) && market.is_stale(now.timestamp_millis());
        let render_ctx = RenderContext { locale: &locale, market, approximate };
        let Some(mut result) = classify::render(&kind, raw_value, &render_ctx) else {
            return EvaluateResult::failed(
                EvalError::InvalidCalculation.to_string(),
                Some(recover(input, &norm.expression, true)),
            );
        };

        if let Some(range) = nlp::detect_simple_range(input) {
            result.metadata.range = Some(RangeMeta { unit: range.unit.or_else(|| result.unit.clone()), ..range });
        }

        result.metadata.dimensions = Some(dims.to_meta());
        result.metadata.warnings = dims.warnings();
        result.metadata.normalized_expression = Some(math_expr.clone());

        if let Some(deal) = norm.deal {
            let mut conversions = deal_chips(&deal, &locale);
            conversions.append(&mut result.conversions);
            result.conversions = conversions;
            result.metadata.deal = Some(deal);
        }

        self.plugins.run_after_evaluate(input, &math_expr, &mut result);
        EvaluateResult::ok(result)
    }
}

static DEFAULT_EVALUATOR: Lazy<Evaluator> = Lazy::new(Evaluator::default);

/// Evaluate with a process-wide evaluator built from the default config.
pub fn evaluate(
    raw: &str,
    market: &dyn MarketData,
    ctx: Option<&EvalContext>,
    options: &EvalOptions,
) -> EvaluateResult {
    DEFAULT_EVALUATOR.evaluate(raw, market, ctx, options)
}

/// Convenience for callers that only want the result.
pub fn evaluate_to_result(raw: &str, market: &dyn MarketData) -> Option<CalculationResult> {
    evaluate(raw, market, None, &EvalOptions::default()).result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::StaticMarketData;

    #[test]
    fn test_blank_line_is_empty_envelope() {
        let out = Evaluator::default().evaluate("   ", &StaticMarketData::fallback(), None, &EvalOptions::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_locale_resolution_order() {
        let evaluator = Evaluator::default();
        evaluator.set_sheet_locale("Budget", "pt-BR");
        let sheet = EvalOptions::default().with_sheet("Budget");
        assert_eq!(evaluator.resolve_locale(&sheet), "pt-BR");
        assert_eq!(evaluator.resolve_locale(&sheet.clone().with_locale("de-DE")), "de-DE");
        assert_eq!(evaluator.resolve_locale(&EvalOptions::default()), "en-US");
        evaluator.clear_sheet_locale("Budget");
        assert_eq!(evaluator.resolve_locale(&sheet), "en-US");
    }

    #[test]
    fn test_caches_fill_and_clear() {
        let evaluator = Evaluator::default();
        let market = StaticMarketData::fallback();
        evaluator.evaluate("5 bags for 400 usd", &market, None, &EvalOptions::default());
        assert_eq!(lock(&evaluator.deal_cache).len(), 1);
        assert_eq!(lock(&evaluator.alias_cache).len(), 1);
        evaluator.clear_caches();
        assert!(lock(&evaluator.deal_cache).is_empty());
    }

    #[test]
    fn test_echo_truncates() {
        let long = "1".repeat(MAX_ECHOED_CHARS + 5);
        let echoed = echo(&long);
        assert!(echoed.ends_with(" …"));
        assert_eq!(echoed.chars().count(), MAX_ECHOED_CHARS + 2);
        assert_eq!(echo("1+1"), "1+1");
    }
}
