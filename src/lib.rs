//! Sequence-modeling operators on Candle for reading-comprehension models.
//!
//! The workspace is split by concern and re-exported here:
//!
//! * [`layers`]: masked softmax, scoped dense projection, dropout and mask helpers.
//! * [`attention`]: attention pooling, summary, pointer step and dot attention.
//! * [`losses`]: masked binary and sparse cross entropy.
//! * [`encoder`]: stacked, optionally bidirectional plain RNN / LSTM / GRU encoders.
//!
//! Trainable parameters always live in a caller-owned [`candle_nn::VarMap`];
//! the prefix of the [`candle_nn::VarBuilder`] passed to an operator is the
//! scope its weights are created or reused under.

pub use attention;
pub use encoder;
pub use layers;
pub use losses;

pub use attention::{attention_pooling, dot_attention, pointer, summary};
pub use encoder::{rnn, Encoder, EncoderConfig, EncoderError, EncoderOutput, RnnKind};
pub use layers::{dense, masked_softmax, tensor_to_mask};
pub use losses::{cross_entropy, sparse_cross_entropy};
