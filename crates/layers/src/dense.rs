//! Position-wise dense projection with scope-named parameters.
//!
//! `dense` applies one shared affine map to every position of a
//! `(batch, seq, in_dim)` tensor (any rank >= 2 works; leading axes are
//! flattened for a single matmul and restored afterwards). Parameters live in
//! the caller's [`VarMap`](candle_nn::VarMap) and are reached through the
//! supplied [`VarBuilder`]: the weight is stored as `<scope>.weight` with shape
//! `(in_dim, out_dim)` and the optional bias as `<scope>.bias`. The first call
//! under a scope creates them, later calls with the same scope and compatible
//! shapes reuse the same variables. A shape clash under an existing name is an
//! error from the variable store.

use candle_core::{Error, Result, Tensor};
use candle_nn::{Init, VarBuilder};

use crate::checks;

/// Scope used by callers that do not need a more specific parameter name.
pub const DENSE_SCOPE: &str = "dense";

/// Glorot/Xavier uniform initialisation for an `(fan_in, fan_out)` weight.
pub fn glorot_uniform(fan_in: usize, fan_out: usize) -> Init {
    let bound = (6.0f64 / (fan_in + fan_out) as f64).sqrt();
    Init::Uniform {
        lo: -bound,
        up: bound,
    }
}

/// Projects the last axis of `value` to `last_dim` features.
pub fn dense(value: &Tensor, last_dim: usize, use_bias: bool, vb: VarBuilder) -> Result<Tensor> {
    checks::expect_min_rank("dense.input", value, 2)?;
    checks::expect_dtype_in("dense.input", value, checks::FLOAT_DTYPES)?;
    if last_dim == 0 {
        return Err(Error::Msg("dense: output dimension must be non-zero".into()));
    }

    let dims = value.dims();
    let in_dim = dims[dims.len() - 1];
    let rows: usize = dims[..dims.len() - 1].iter().product();

    let weight = vb
        .get_with_hints((in_dim, last_dim), "weight", glorot_uniform(in_dim, last_dim))?
        .to_dtype(value.dtype())?;

    let mut out_dims = dims.to_vec();
    out_dims[dims.len() - 1] = last_dim;
    let mut output = value
        .reshape((rows, in_dim))?
        .matmul(&weight)?
        .reshape(out_dims)?;

    if use_bias {
        let bias = vb
            .get_with_hints(last_dim, "bias", Init::Const(0.0))?
            .to_dtype(value.dtype())?;
        output = output.broadcast_add(&bias)?;
    }

    log::debug!(
        "dense scope={} in_dim={} out_dim={} bias={}",
        vb.prefix(),
        in_dim,
        last_dim,
        use_bias
    );
    Ok(output)
}
