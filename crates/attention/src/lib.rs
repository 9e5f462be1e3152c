//! Attention operators for reading-comprehension style sequence models.
//!
//! The crate covers additive attention pooling (and the summary vector built
//! from it), a single pointer-network step, and scaled bilinear attention
//! between two sequences. All operators take `(batch, seq, hidden)` tensors with
//! multiplicative `(batch, seq)` masks (`1.0` keeps a position) and request
//! their parameters through a [`candle_nn::VarBuilder`], so the builder prefix
//! is the scope under which weights are created or reused.

pub mod dot;
pub mod pointer;
pub mod pooling;

pub use dot::{dot_attention, dot_attention_with_weights};
pub use pointer::{pointer, POINTER_SCOPE};
pub use pooling::{attention_pooling, summary, SUMMARY_SCOPE};
