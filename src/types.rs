//! Result envelope and value types shared across the pipeline.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic category of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Mass,
    Currency,
    Number,
    Date,
    Css,
    Temperature,
    Data,
    Length,
    Speed,
    Area,
    Volume,
    Angle,
    Duration,
    Energy,
    Power,
    Pressure,
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultType::Mass => "mass",
            ResultType::Currency => "currency",
            ResultType::Number => "number",
            ResultType::Date => "date",
            ResultType::Css => "css",
            ResultType::Temperature => "temperature",
            ResultType::Data => "data",
            ResultType::Length => "length",
            ResultType::Speed => "speed",
            ResultType::Area => "area",
            ResultType::Volume => "volume",
            ResultType::Angle => "angle",
            ResultType::Duration => "duration",
            ResultType::Energy => "energy",
            ResultType::Power => "power",
            ResultType::Pressure => "pressure",
        };
        write!(f, "{}", name)
    }
}

/// Dimension of a token or stored variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimKind {
    Currency,
    Mass,
    Length,
    Area,
    Volume,
    VolumeLiquid,
    Temperature,
    Data,
    Css,
    Speed,
    Angle,
    Duration,
    Energy,
    Power,
    Pressure,
    Dimensionless,
}

impl fmt::Display for DimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DimKind::Currency => "currency",
            DimKind::Mass => "mass",
            DimKind::Length => "length",
            DimKind::Area => "area",
            DimKind::Volume => "volume",
            DimKind::VolumeLiquid => "volume_liquid",
            DimKind::Temperature => "temperature",
            DimKind::Data => "data",
            DimKind::Css => "css",
            DimKind::Speed => "speed",
            DimKind::Angle => "angle",
            DimKind::Duration => "duration",
            DimKind::Energy => "energy",
            DimKind::Power => "power",
            DimKind::Pressure => "pressure",
            DimKind::Dimensionless => "dimensionless",
        };
        write!(f, "{}", name)
    }
}

/// One alternate-unit rendering of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultConversion {
    pub unit: String,
    pub display: String,
}

impl ResultConversion {
    pub fn new(unit: impl Into<String>, display: impl Into<String>) -> Self {
        Self { unit: unit.into(), display: display.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeMeta {
    pub min: f64,
    pub max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Pricing inferred from phrases like "5 bags for 400 usd".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealMeta {
    pub qty: f64,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    pub currency: String,
    pub per: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetweenMeta {
    pub from: String,
    pub to: String,
    pub ms: i64,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionsMeta {
    pub kinds_found: BTreeSet<DimKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composite: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision_applied: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<RangeMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal: Option<DealMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub between: Option<BetweenMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<DimensionsMeta>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approximate: Option<bool>,
    /// Free-form fields added by after-evaluate plugins.
    #[serde(skip_serializing_if = "serde_json::Map::is_empty", default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The evaluator's output for a successful line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub value: f64,
    pub formatted: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(rename = "type")]
    pub kind: ResultType,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub conversions: Vec<ResultConversion>,
    #[serde(default)]
    pub metadata: ResultMetadata,
}

impl CalculationResult {
    pub fn new(value: f64, formatted: String, unit: Option<String>, kind: ResultType) -> Self {
        Self {
            value,
            formatted,
            unit,
            kind,
            conversions: Vec::new(),
            metadata: ResultMetadata::default(),
        }
    }
}

impl fmt::Display for CalculationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unit {
            Some(unit) => write!(f, "{} {}", self.formatted, unit),
            None => write!(f, "{}", self.formatted),
        }
    }
}

/// A stored variable normalized to its dimension's base unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedVar {
    #[serde(rename = "valueSI")]
    pub value_si: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretty_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim: Option<DimKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VarValue {
    Number(f64),
    Typed(TypedVar),
    Text(String),
}

impl From<f64> for VarValue {
    fn from(n: f64) -> Self {
        VarValue::Number(n)
    }
}

impl From<&str> for VarValue {
    fn from(s: &str) -> Self {
        VarValue::Text(s.to_string())
    }
}

impl From<TypedVar> for VarValue {
    fn from(v: TypedVar) -> Self {
        VarValue::Typed(v)
    }
}

/// Advisory details attached to a failed evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInfo {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub unknown_tokens: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub partial: Vec<PartialResult>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_expression: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    pub expr: String,
    pub value: f64,
}

/// `{result}` on success, `{error, recovery}` on failure, all empty for blank input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluateResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CalculationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryInfo>,
}

impl EvaluateResult {
    pub fn ok(result: CalculationResult) -> Self {
        Self { result: Some(result), error: None, recovery: None }
    }

    pub fn failed(error: impl Into<String>, recovery: Option<RecoveryInfo>) -> Self {
        Self { result: None, error: Some(error.into()), recovery }
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_none() && self.error.is_none()
    }
}
