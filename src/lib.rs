//! notecalc: a natural-language line calculator engine.
//!
//! A line such as `5 bags for 400 usd`, `2 * apple in g` or
//! `between 2024-01-01 and 2024-01-11` goes through an ordered chain of text
//! rewrites, a restricted arithmetic core and a kind classifier, and comes
//! back as a typed, locale-formatted [`CalculationResult`] with conversion
//! chips, or as an error string with recovery hints.
//!
//! ```no_run
//! use notecalc::{evaluate, EvalOptions, StaticMarketData};
//!
//! let market = StaticMarketData::fallback();
//! let out = evaluate("1500 g in kg", &market, None, &EvalOptions::default());
//! assert_eq!(out.result.unwrap().unit.as_deref(), Some("kg"));
//! ```

pub mod aliases;
pub mod classify;
pub mod commands;
pub mod config;
pub mod context;
pub mod datetime;
pub mod deals;
pub mod dimensions;
pub mod error;
pub mod evaluator;
pub mod format;
pub mod limits;
pub mod market;
pub mod math;
pub mod memo;
pub mod nlp;
pub mod plugins;
pub mod quantity;
pub mod recovery;
pub mod sheet;
pub mod sugars;
pub mod types;
pub mod units;
pub mod units_extra;
pub mod vars;

pub use commands::CommandOutcome;
pub use config::{EngineConfig, EvalOptions, Features};
pub use context::EvalContext;
pub use error::{EvalError, MathError, PluginError};
pub use evaluator::{evaluate, Evaluator};
pub use market::{MarketData, StaticMarketData};
pub use plugins::{AfterEvaluate, Plugin};
pub use sheet::Sheet;
pub use types::{CalculationResult, EvaluateResult, RecoveryInfo, ResultConversion, ResultType, TypedVar, VarValue};
pub use vars::VarStore;
