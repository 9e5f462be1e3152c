//! Error type for encoder construction, configuration loading and execution.

use thiserror::Error;

/// Failures surfaced by the recurrent encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The requested rnn type is not one of `rnn`, `lstm`, `gru` (optionally `bi`-prefixed).
    #[error("unsupported configuration: rnn type `{kind}` (expected rnn, lstm or gru, optionally prefixed with `bi`)")]
    UnsupportedConfiguration { kind: String },
    /// One or more configuration values are out of range.
    #[error("invalid encoder configuration: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// Inputs do not follow the documented layout.
    #[error("invalid encoder input: {0}")]
    InvalidInput(String),
    #[error("failed to read encoder config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse encoder config: {0}")]
    ConfigFormat(String),
    /// A tensor operation failed inside Candle.
    #[error(transparent)]
    Backend(#[from] candle_core::Error),
}

impl EncoderError {
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration { kind: kind.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<toml::de::Error> for EncoderError {
    fn from(value: toml::de::Error) -> Self {
        EncoderError::ConfigFormat(value.to_string())
    }
}

impl From<serde_json::Error> for EncoderError {
    fn from(value: serde_json::Error) -> Self {
        EncoderError::ConfigFormat(value.to_string())
    }
}
