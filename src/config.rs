//! Engine settings and per-call options.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::format::DEFAULT_LOCALE;
use crate::limits::Limits;
use crate::memo::DEFAULT_CAPACITY;

/// Settings fixed for the lifetime of an `Evaluator`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Capacity of the alias and deal caches.
    pub cache_capacity: usize,
    pub default_locale: String,
    pub limits: Limits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            default_locale: DEFAULT_LOCALE.to_string(),
            limits: Limits::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Opt-in behaviour for a single evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Features {
    /// Expand `rand()` / `rand(a, b)`.
    pub allow_rand: bool,
    /// Seed for `rand`; 42 when unset.
    pub seed: Option<i64>,
    /// Turn cross-dimension `+`/`-` warnings into an error.
    pub strict_dimensions: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvalOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,
    pub features: Features,
    /// Reference time for date phrases; the local clock when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now: Option<DateTime<Local>>,
}

impl EvalOptions {
    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = Some(locale.to_string());
        self
    }

    pub fn with_sheet(mut self, sheet_id: &str) -> Self {
        self.sheet_id = Some(sheet_id.to_string());
        self
    }

    pub fn with_rand(mut self, seed: i64) -> Self {
        self.features.allow_rand = true;
        self.features.seed = Some(seed);
        self
    }

    pub fn strict(mut self) -> Self {
        self.features.strict_dimensions = true;
        self
    }

    pub fn at(mut self, now: DateTime<Local>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn reference_time(&self) -> DateTime<Local> {
        self.now.unwrap_or_else(Local::now)
    }
}
