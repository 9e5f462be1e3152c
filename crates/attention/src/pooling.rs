//! Additive attention pooling and the summary vector built on it.
//!
//! Pooling scores every position of a `(batch, seq, dim)` tensor with a
//! two-layer projection (`tanh` hidden layer of `hidden_dim` units followed by a
//! bias-free scalar head), normalises the scores with
//! [`masked_softmax`](layers::masked_softmax) over `seq`, and returns the
//! weighted sum of the input together with the weights.
//!
//! Parameters are requested under `<scope>.summary_sj` (hidden layer) and
//! `<scope>.summary_uj` (scalar head) of the supplied builder.

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;
use layers::{checks, dense, dropout, masked_softmax};

/// Scope conventionally passed to [`summary`].
pub const SUMMARY_SCOPE: &str = "summary";

/// Pools `value` `(batch, seq, dim)` into `(batch, dim)` using learned position scores.
///
/// Returns `(pooled, alpha)` where `alpha` is `(batch, seq)` and is zero wherever
/// `mask` is zero.
pub fn attention_pooling(
    value: &Tensor,
    hidden_dim: usize,
    mask: &Tensor,
    vb: VarBuilder,
) -> Result<(Tensor, Tensor)> {
    let (batch, seq, _) = checks::expect_batch_seq_hidden("attention_pooling.value", value)?;
    checks::expect_shape("attention_pooling.mask", mask, &[batch, seq])?;

    let sj = dense(value, hidden_dim, true, vb.pp("summary_sj"))?.tanh()?;
    let uj = dense(&sj, 1, false, vb.pp("summary_uj"))?.squeeze(2)?;
    let alpha = masked_softmax(&uj, mask)?;
    let pooled = weighted_sum(&alpha, value)?;
    Ok((pooled, alpha))
}

/// Compresses a variable-length sequence into one vector.
///
/// Applies dropout with `keep_prob` (identity at `1.0`) and discards the
/// pooling weights. Callers usually scope it as `vb.pp(SUMMARY_SCOPE)`.
pub fn summary(
    value: &Tensor,
    hidden_dim: usize,
    mask: &Tensor,
    keep_prob: f64,
    vb: VarBuilder,
) -> Result<Tensor> {
    let value = dropout(value, keep_prob)?;
    let (pooled, _) = attention_pooling(&value, hidden_dim, mask, vb)?;
    Ok(pooled)
}

/// `Σ_seq alpha[b, s] * value[b, s, :]` for `alpha` `(batch, seq)`.
pub(crate) fn weighted_sum(alpha: &Tensor, value: &Tensor) -> Result<Tensor> {
    alpha
        .to_dtype(value.dtype())?
        .unsqueeze(2)?
        .broadcast_mul(value)?
        .sum(1)
}
