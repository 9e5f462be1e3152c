//! Reductions over unreduced, mask-weighted losses.

use candle_core::{DType, Error, Result, Tensor};

/// Averages `loss` over the positions kept by `mask`.
///
/// `mask` must broadcast to `loss`; the denominator counts the broadcast mask,
/// so masked positions neither add loss nor inflate the count. Returns a
/// scalar tensor in `loss`'s dtype.
pub fn masked_mean(loss: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let mask = mask
        .to_dtype(DType::F32)?
        .broadcast_as(loss.shape())?;
    let count = mask.sum_all()?.to_vec0::<f32>()?;
    if count <= 0.0 {
        return Err(Error::Msg(
            "masked_mean: mask keeps no positions to average over".into(),
        ));
    }
    let total = loss.to_dtype(DType::F32)?.sum_all()?;
    total
        .affine(1.0 / count as f64, 0.0)?
        .to_dtype(loss.dtype())
}
