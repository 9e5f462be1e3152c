//! Mask-aware loss functions for sequence labelling and span pointing.

pub mod cross_entropy;
pub mod reduction;

pub use cross_entropy::{cross_entropy, one_hot, sparse_cross_entropy, CLIP_EPSILON};
pub use reduction::masked_mean;
