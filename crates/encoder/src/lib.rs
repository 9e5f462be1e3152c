//! Recurrent sequence encoders (plain RNN, LSTM, GRU) for padded batches.
//!
//! An [`Encoder`] is described by an [`EncoderConfig`]: the cell family and
//! direction (parsed from tags such as `"bilstm"`), the hidden size, the number
//! of stacked layers, an optional dropout keep probability and, for
//! bidirectional encoders, whether the two directions are concatenated or
//! summed. Parameters are requested from a [`candle_nn::VarBuilder`] when the
//! encoder is built, so constructing two encoders under the same prefix shares
//! their weights.
//!
//! ```no_run
//! use candle_core::{DType, Device, Tensor};
//! use candle_nn::{VarBuilder, VarMap};
//! use encoder::{Encoder, EncoderConfig};
//!
//! # fn main() -> Result<(), encoder::EncoderError> {
//! let device = Device::Cpu;
//! let varmap = VarMap::new();
//! let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
//!
//! let config = EncoderConfig::from_tag("bigru", 32)?.with_layers(2);
//! let encoder = Encoder::new(config, 16, vb.pp("passage_encoding"))?;
//!
//! let inputs = Tensor::zeros((4, 10, 16), DType::F32, &device)?;
//! let lengths = Tensor::new(&[10u32, 7, 3, 10], &device)?;
//! let encoded = encoder.forward(&inputs, &lengths)?;
//! assert_eq!(encoded.outputs.dims(), &[4, 10, 64]);
//! # Ok(())
//! # }
//! ```

pub mod cell;
pub mod config;
pub mod encoder;
pub mod errors;

pub use cell::{CellState, RnnCell, LSTM_FORGET_BIAS};
pub use config::{CellKind, EncoderConfig, RnnKind};
pub use encoder::{reverse_sequence, rnn, Encoder, EncoderOutput};
pub use errors::EncoderError;
