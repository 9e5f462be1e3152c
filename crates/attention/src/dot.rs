//! Scaled bilinear ("dot") attention between two sequences.
//!
//! `value` `(batch, p_len, d_v)` attends over `memory` `(batch, q_len, d_m)`.
//! Both inputs pass through dropout and are projected (bias-free) into a shared
//! `weight_dim` space under the `value` and `memory` scopes. Alignment scores
//! `value_p · memory_pᵀ / sqrt(weight_dim)` are normalised with a
//! multiplicative mask over `q_len`, and the resulting weights combine the
//! unprojected `memory`, so the output width is `d_m` rather than `weight_dim`.

use candle_core::{Error, Result, Tensor};
use candle_nn::VarBuilder;
use layers::{checks, dense, dropout, masked_softmax};

/// Returns the context `(batch, p_len, d_m)` of `value` attending over `memory`.
///
/// `mask` is `(batch, q_len)` and is broadcast across `p_len`.
pub fn dot_attention(
    value: &Tensor,
    memory: &Tensor,
    mask: &Tensor,
    weight_dim: usize,
    keep_prob: f64,
    vb: VarBuilder,
) -> Result<Tensor> {
    let (alpha, memory) = alignment(value, memory, mask, weight_dim, keep_prob, &vb)?;
    alpha.matmul(&memory)
}

/// Same as [`dot_attention`], also returning the `(batch, p_len, q_len)` alignment weights.
pub fn dot_attention_with_weights(
    value: &Tensor,
    memory: &Tensor,
    mask: &Tensor,
    weight_dim: usize,
    keep_prob: f64,
    vb: VarBuilder,
) -> Result<(Tensor, Tensor)> {
    let (alpha, memory) = alignment(value, memory, mask, weight_dim, keep_prob, &vb)?;
    let context = alpha.matmul(&memory)?;
    Ok((context, alpha))
}

fn alignment(
    value: &Tensor,
    memory: &Tensor,
    mask: &Tensor,
    weight_dim: usize,
    keep_prob: f64,
    vb: &VarBuilder,
) -> Result<(Tensor, Tensor)> {
    let (batch, _, _) = checks::expect_batch_seq_hidden("dot_attention.value", value)?;
    let (memory_batch, q_len, _) = checks::expect_batch_seq_hidden("dot_attention.memory", memory)?;
    checks::expect_same_dtype("dot_attention", value, memory)?;
    if memory_batch != batch {
        return Err(Error::Msg(format!(
            "dot_attention: memory batch {memory_batch} does not match value batch {batch}"
        )));
    }
    checks::expect_shape("dot_attention.mask", mask, &[batch, q_len])?;
    if weight_dim == 0 {
        return Err(Error::Msg("dot_attention: weight_dim must be non-zero".into()));
    }

    let value = dropout(value, keep_prob)?;
    let memory = dropout(memory, keep_prob)?;

    let projected_value = dense(&value, weight_dim, false, vb.pp("value"))?;
    let projected_memory = dense(&memory, weight_dim, false, vb.pp("memory"))?;

    let scale = 1.0 / (weight_dim as f64).sqrt();
    let scores = (projected_value.matmul(&projected_memory.transpose(1, 2)?.contiguous()?)?
        * scale)?;
    let alpha = masked_softmax(&scores, &mask.unsqueeze(1)?)?;
    Ok((alpha, memory))
}
