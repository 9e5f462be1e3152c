//! Masking, normalisation and projection primitives shared by the sequence
//! operators in this workspace.
//!
//! Everything here is a stateless function over Candle tensors. Trainable
//! parameters are requested through a [`candle_nn::VarBuilder`] whose prefix
//! acts as the scope name, so repeated calls under one scope share weights.

pub mod checks;
pub mod dense;
pub mod dropout;
pub mod dtypes;
pub mod masks;
pub mod softmax;

pub use dense::{dense, DENSE_SCOPE};
pub use dropout::{dropout, maybe_dropout};
pub use masks::{mask_from_lengths, tensor_to_mask};
pub use softmax::masked_softmax;
