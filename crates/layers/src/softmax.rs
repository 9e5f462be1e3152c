//! Multiplicative-mask softmax over the last axis.
//!
//! `masked_softmax` computes `exp(score) * mask / Σ exp(score) * mask` where the
//! sum runs over the trailing axis and is kept as a broadcastable size-one axis.
//! The mask holds `1.0` for valid positions and `0.0` for padding and only needs
//! to broadcast against `score` (for example `[batch, 1, k_len]` against
//! `[batch, q_len, k_len]`).
//!
//! No max-subtraction is applied: callers with unbounded scores are responsible
//! for keeping `exp` finite. Two kinds of row are rejected instead of producing
//! NaN: rows whose mask removes every position, and rows that do keep positions
//! but whose kept scores all underflow `exp` to zero. The error message names
//! which of the two happened.

use candle_core::{DType, Error, Result, Tensor, D};

use crate::{checks, dtypes::PrecisionPolicy};

/// Softmax over the last axis of `score`, restricted to positions where `mask` is non-zero.
pub fn masked_softmax(score: &Tensor, mask: &Tensor) -> Result<Tensor> {
    checks::expect_dtype_in("masked_softmax.score", score, checks::FLOAT_DTYPES)?;
    checks::expect_min_rank("masked_softmax.score", score, 1)?;

    let policy = PrecisionPolicy::for_tensor(score);
    let score = policy.promote(score)?;
    let mask = mask.to_dtype(policy.compute())?.broadcast_as(score.shape())?;
    ensure_unmasked_positions(&mask)?;

    let exp = score.exp()?.mul(&mask)?;
    let denom = exp.sum_keepdim(D::Minus1)?;
    ensure_nonzero_mass(&denom)?;

    let alpha = exp.broadcast_div(&denom)?;
    policy.restore(&alpha)
}

fn count_zero_rows(row_sums: &Tensor) -> Result<u32> {
    row_sums
        .eq(&row_sums.zeros_like()?)?
        .to_dtype(DType::U32)?
        .sum_all()?
        .to_vec0::<u32>()
}

fn ensure_unmasked_positions(mask: &Tensor) -> Result<()> {
    let empty = count_zero_rows(&mask.sum_keepdim(D::Minus1)?)?;
    if empty == 0 {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "masked_softmax: {empty} row(s) have no unmasked positions"
        )))
    }
}

fn ensure_nonzero_mass(denom: &Tensor) -> Result<()> {
    let underflowed = count_zero_rows(denom)?;
    if underflowed == 0 {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "masked_softmax: exp underflows to zero on every unmasked score in {underflowed} row(s)"
        )))
    }
}
