//! Keep-probability dropout.
//!
//! Operators in this workspace describe dropout by the probability of keeping
//! an element. Kept elements are scaled by `1 / keep_prob`; a keep probability
//! of exactly `1.0` is the identity and allocates nothing.

use candle_core::{Result, Tensor};

use crate::checks;

/// Zeroes elements of `value` with probability `1 - keep_prob`.
pub fn dropout(value: &Tensor, keep_prob: f64) -> Result<Tensor> {
    checks::expect_keep_prob("dropout", keep_prob)?;
    if keep_prob >= 1.0 {
        return Ok(value.clone());
    }
    candle_nn::ops::dropout(value, (1.0 - keep_prob) as f32)
}

/// Like [`dropout`], with `None` meaning no dropout at all.
pub fn maybe_dropout(value: &Tensor, keep_prob: Option<f64>) -> Result<Tensor> {
    match keep_prob {
        Some(keep_prob) => dropout(value, keep_prob),
        None => Ok(value.clone()),
    }
}
