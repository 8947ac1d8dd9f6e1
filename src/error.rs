use thiserror::Error;

/// Failures surfaced to callers as the envelope's `error` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("Expression too long")]
    ExpressionTooLong,
    #[error("Too many nested parentheses")]
    TooDeep,
    #[error("Unbalanced parentheses")]
    Unbalanced,
    #[error("List too large")]
    ListTooLarge,
    #[error("Range too large")]
    RangeTooLarge,
    #[error("Invalid calculation")]
    InvalidCalculation,
    #[error("Incompatible units for addition/subtraction.")]
    IncompatibleUnits,
    #[error("Date out of range")]
    DateOutOfRange,
}

/// Errors from the restricted arithmetic evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MathError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unexpected token at position {0}")]
    UnexpectedToken(usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("function '{name}' takes {expected} arguments, got {got}")]
    Arity { name: String, expected: String, got: usize },
    #[error("result is not a finite number")]
    NonFinite,
    #[error("expression nests too deeply")]
    TooDeep,
}

/// A plugin hook that failed; logged and ignored by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("plugin '{plugin}' failed: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self { plugin: plugin.into(), message: message.into() }
    }
}
