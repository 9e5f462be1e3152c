//! Multiplicative masks derived from padded inputs or per-row lengths.
//!
//! Masks produced here are float tensors holding `1.0` at valid positions and
//! `0.0` at padding, ready to multiply scores or losses. Lengths are `u32`.

use candle_core::{DType, Device, Result, Tensor, D};

use crate::checks;

/// Dtype of the masks returned by this module.
pub const MASK_DTYPE: DType = DType::F32;

/// Dtype of the per-row lengths returned by this module.
pub const LENGTH_DTYPE: DType = DType::U32;

/// Derives a float mask and per-row lengths from a padded tensor.
///
/// Zero is the only padding sentinel: every non-zero entry is valid, so a
/// genuine token id of `0` cannot be told apart from padding. Lengths count the
/// non-zero entries along the last axis, hence for `[5, 7, 0, 0]` the mask is
/// `[1, 1, 0, 0]` and the length is `2`.
pub fn tensor_to_mask(value: &Tensor) -> Result<(Tensor, Tensor)> {
    checks::expect_min_rank("tensor_to_mask.value", value, 1)?;
    let present = value.ne(&value.zeros_like()?)?;
    let mask = present.to_dtype(MASK_DTYPE)?;
    let lengths = present.to_dtype(LENGTH_DTYPE)?.sum(D::Minus1)?;
    Ok((mask, lengths))
}

/// Builds a `(batch, max_len)` mask whose row `b` keeps the first `lengths[b]` positions.
///
/// Lengths beyond `max_len` are clamped by construction.
pub fn mask_from_lengths(lengths: &Tensor, max_len: usize, device: &Device) -> Result<Tensor> {
    checks::expect_rank("mask_from_lengths.lengths", lengths, 1)?;
    let lengths = lengths.to_device(device)?.to_dtype(LENGTH_DTYPE)?;
    let positions = Tensor::arange(0u32, max_len as u32, device)?.unsqueeze(0)?;
    positions
        .broadcast_lt(&lengths.unsqueeze(1)?)?
        .to_dtype(MASK_DTYPE)
}
