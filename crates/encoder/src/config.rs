//! Encoder configuration.
//!
//! The rnn type is written as a short tag: `rnn`, `lstm` or `gru`, with a `bi`
//! prefix for the bidirectional variants (`bilstm`, `bigru`, `birnn`). Tags are
//! parsed once into [`RnnKind`]; anything else is rejected up front with
//! [`EncoderError::UnsupportedConfiguration`].
//!
//! [`EncoderConfig`] can be built in code or loaded from a TOML/JSON file:
//!
//! ```toml
//! kind = "bilstm"
//! hidden_size = 75
//! layer_num = 2
//! dropout_keep_prob = 0.8
//! concat = true
//! ```

use std::{
    fmt, fs,
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EncoderError;

/// Recurrent cell families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// `h' = tanh([x, h]·W + b)`.
    Plain,
    Lstm,
    Gru,
}

impl CellKind {
    fn tag(self) -> &'static str {
        match self {
            CellKind::Plain => "rnn",
            CellKind::Lstm => "lstm",
            CellKind::Gru => "gru",
        }
    }
}

/// Cell family plus directionality, as selected by an rnn type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RnnKind {
    pub cell: CellKind,
    pub bidirectional: bool,
}

impl RnnKind {
    pub fn new(cell: CellKind, bidirectional: bool) -> Self {
        Self {
            cell,
            bidirectional,
        }
    }

    pub fn unidirectional(cell: CellKind) -> Self {
        Self::new(cell, false)
    }

    pub fn bidirectional(cell: CellKind) -> Self {
        Self::new(cell, true)
    }
}

impl FromStr for RnnKind {
    type Err = EncoderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        let (bidirectional, cell_tag) = match tag.strip_prefix("bi") {
            Some(rest) => (true, rest),
            None => (false, tag.as_str()),
        };
        let cell = match cell_tag {
            "rnn" => CellKind::Plain,
            "lstm" => CellKind::Lstm,
            "gru" => CellKind::Gru,
            _ => return Err(EncoderError::unsupported(s)),
        };
        Ok(Self::new(cell, bidirectional))
    }
}

impl fmt::Display for RnnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bidirectional {
            f.write_str("bi")?;
        }
        f.write_str(self.cell.tag())
    }
}

/// Immutable description of a (possibly bidirectional, possibly stacked) encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EncoderConfigFile", into = "EncoderConfigFile")]
pub struct EncoderConfig {
    pub kind: RnnKind,
    pub hidden_size: usize,
    /// Number of stacked cells per direction.
    pub layer_num: usize,
    /// Keep probability for dropout on every cell's input and output; `None` disables it.
    pub dropout_keep_prob: Option<f64>,
    /// Bidirectional only: concatenate forward/backward results instead of summing them.
    pub concat: bool,
}

impl EncoderConfig {
    /// Single-layer configuration without dropout, concatenating directions.
    pub fn new(kind: RnnKind, hidden_size: usize) -> Self {
        Self {
            kind,
            hidden_size,
            layer_num: 1,
            dropout_keep_prob: None,
            concat: true,
        }
    }

    /// Builds a configuration from an rnn type tag such as `"bigru"`.
    pub fn from_tag(tag: &str, hidden_size: usize) -> Result<Self, EncoderError> {
        Ok(Self::new(tag.parse()?, hidden_size))
    }

    pub fn with_layers(mut self, layer_num: usize) -> Self {
        self.layer_num = layer_num;
        self
    }

    pub fn with_dropout(mut self, keep_prob: Option<f64>) -> Self {
        self.dropout_keep_prob = keep_prob;
        self
    }

    pub fn with_concat(mut self, concat: bool) -> Self {
        self.concat = concat;
        self
    }

    /// Loads a configuration from a `.toml` or `.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EncoderError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let file: EncoderConfigFile = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(EncoderError::ConfigFormat(format!(
                    "unsupported configuration extension '{}'",
                    other
                )))
            }
        };
        let config = EncoderConfig::try_from(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EncoderError> {
        let mut errors = Vec::new();

        if self.hidden_size == 0 {
            errors.push("hidden_size must be greater than 0".to_string());
        }
        if self.layer_num == 0 {
            errors.push("layer_num must be greater than 0".to_string());
        }
        if let Some(keep_prob) = self.dropout_keep_prob {
            if !(keep_prob > 0.0 && keep_prob <= 1.0) {
                errors.push(format!(
                    "dropout_keep_prob must be in (0, 1], got {keep_prob}"
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(EncoderError::Validation(errors))
        }
    }

    /// Feature width of the per-timestep outputs.
    pub fn output_dim(&self) -> usize {
        if self.kind.bidirectional && self.concat {
            2 * self.hidden_size
        } else {
            self.hidden_size
        }
    }

    /// Feature width of the combined final state (all layers).
    pub fn state_dim(&self) -> usize {
        self.output_dim() * self.layer_num
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EncoderConfigFile {
    kind: String,
    hidden_size: usize,
    #[serde(default = "default_layer_num")]
    layer_num: usize,
    #[serde(default)]
    dropout_keep_prob: Option<f64>,
    #[serde(default = "default_concat")]
    concat: bool,
}

fn default_layer_num() -> usize {
    1
}

fn default_concat() -> bool {
    true
}

impl TryFrom<EncoderConfigFile> for EncoderConfig {
    type Error = EncoderError;

    fn try_from(file: EncoderConfigFile) -> Result<Self, Self::Error> {
        Ok(Self {
            kind: file.kind.parse()?,
            hidden_size: file.hidden_size,
            layer_num: file.layer_num,
            dropout_keep_prob: file.dropout_keep_prob,
            concat: file.concat,
        })
    }
}

impl From<EncoderConfig> for EncoderConfigFile {
    fn from(config: EncoderConfig) -> Self {
        Self {
            kind: config.kind.to_string(),
            hidden_size: config.hidden_size,
            layer_num: config.layer_num,
            dropout_keep_prob: config.dropout_keep_prob,
            concat: config.concat,
        }
    }
}
