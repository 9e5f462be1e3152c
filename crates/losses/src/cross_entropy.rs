//! Mask-aware binary and sparse cross entropy.
//!
//! Both losses expect `logit` to already hold probabilities in `[0, 1]` (for
//! example the output of a sigmoid or of a masked softmax) and return the
//! unreduced per-element (binary) or per-position (sparse) loss. Positions
//! whose mask is zero contribute exactly zero. Reductions are left to the
//! caller; see [`masked_mean`](crate::reduction::masked_mean).

use candle_core::{DType, Error, Result, Tensor, D};
use layers::{checks, dtypes::PrecisionPolicy};

/// Probabilities are clipped into `[CLIP_EPSILON, 1 - CLIP_EPSILON]` before taking logs.
pub const CLIP_EPSILON: f64 = 1e-18;

/// Binary cross entropy with a weighted positive term.
///
/// `loss = -target·ln(p)·pos_weight·mask - (1 - target)·ln(1 - p)·mask`
/// where `p` is `logit` clipped away from `0` and `1`. Clipping saturates
/// silently. `target` and `mask` must broadcast against `logit`.
pub fn cross_entropy(
    logit: &Tensor,
    target: &Tensor,
    mask: &Tensor,
    pos_weight: f64,
) -> Result<Tensor> {
    checks::expect_dtype_in("cross_entropy.logit", logit, checks::FLOAT_DTYPES)?;
    let policy = PrecisionPolicy::for_tensor(logit);
    let compute = policy.compute();

    let p = policy
        .promote(logit)?
        .clamp(CLIP_EPSILON, 1.0 - CLIP_EPSILON)?;
    // `1 - CLIP_EPSILON` rounds to 1.0 in f32/f64, so clip the complement too.
    let q = p.affine(-1.0, 1.0)?.clamp(CLIP_EPSILON, 1.0)?;
    let target = target.to_dtype(compute)?;
    let mask = mask.to_dtype(compute)?;

    let loss_t = target.broadcast_mul(&p.log()?)?.affine(-pos_weight, 0.0)?;
    let loss_f = target
        .affine(-1.0, 1.0)?
        .broadcast_mul(&q.log()?)?
        .affine(-1.0, 0.0)?;
    let loss = loss_t.broadcast_add(&loss_f)?.broadcast_mul(&mask)?;
    policy.restore(&loss)
}

/// Cross entropy against integer class indices, summed over the class axis.
///
/// `logit` is `(..., classes)` and `target` holds indices shaped like the
/// leading axes (`U8`, `U32` or `I64`). Each index is expanded to a one-hot row
/// and scored with [`cross_entropy`] (`pos_weight = 1`). A `mask` shaped like
/// `target` is broadcast over the class axis. An index outside
/// `[0, classes)` yields an all-zero one-hot row and that position's loss is
/// zero; it is not an error.
pub fn sparse_cross_entropy(logit: &Tensor, target: &Tensor, mask: &Tensor) -> Result<Tensor> {
    checks::expect_min_rank("sparse_cross_entropy.logit", logit, 1)?;
    let dims = logit.dims();
    let classes = dims[dims.len() - 1];
    let token_dims = &dims[..dims.len() - 1];
    if target.dims() != token_dims {
        return Err(Error::Msg(format!(
            "sparse_cross_entropy: target shape {:?} must match logit leading dims {:?}",
            target.dims(),
            token_dims
        )));
    }

    let one_hot = one_hot(target, classes, logit.dtype())?;
    let mask = if mask.rank() + 1 == logit.rank() {
        mask.unsqueeze(D::Minus1)?
    } else {
        mask.clone()
    };

    let in_range = one_hot.sum(D::Minus1)?;
    cross_entropy(logit, &one_hot, &mask, 1.0)?
        .sum(D::Minus1)?
        .mul(&in_range)
}

/// Expands integer indices into `depth`-wide one-hot rows of `dtype`.
///
/// Indices outside `[0, depth)` produce rows of zeros.
pub fn one_hot(indices: &Tensor, depth: usize, dtype: DType) -> Result<Tensor> {
    let indices = match indices.dtype() {
        DType::I64 => indices.clone(),
        DType::U8 | DType::U32 => indices.to_dtype(DType::I64)?,
        other => {
            return Err(Error::Msg(format!(
                "one_hot: unsupported index dtype {other:?}"
            )))
        }
    };
    let classes = Tensor::arange(0i64, depth as i64, indices.device())?;
    indices
        .unsqueeze(D::Minus1)?
        .broadcast_eq(&classes)?
        .to_dtype(dtype)
}
