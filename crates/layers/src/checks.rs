//! Lightweight validation helpers shared across the operator crates.
//!
//! These routines provide concise shape and dtype assertions that can be wired
//! into operator entry points. They return `candle_core::Result<()>` so call
//! sites can propagate errors without panicking. Every helper takes a `context`
//! string naming the operation so messages point back at the caller.

use candle_core::{DType, Error, Result, Tensor};

/// Float dtypes accepted by the numerical operators.
pub const FLOAT_DTYPES: &[DType] = &[DType::F16, DType::BF16, DType::F32, DType::F64];

/// Ensures a tensor matches the expected dimensions exactly.
pub fn expect_shape(context: &str, tensor: &Tensor, expected: &[usize]) -> Result<()> {
    let actual = tensor.dims();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected shape {:?}, got {:?}",
            expected, actual
        )))
    }
}

/// Ensures a tensor has exactly `rank` dimensions.
pub fn expect_rank(context: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    let actual = tensor.rank();
    if actual == rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected rank {rank}, got {actual} (shape {:?})",
            tensor.dims()
        )))
    }
}

/// Ensures a tensor has at least `rank` dimensions.
pub fn expect_min_rank(context: &str, tensor: &Tensor, rank: usize) -> Result<()> {
    let actual = tensor.rank();
    if actual >= rank {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected rank >= {rank}, got {actual} (shape {:?})",
            tensor.dims()
        )))
    }
}

/// Validates the `(batch, seq, hidden)` convention and returns the three sizes.
pub fn expect_batch_seq_hidden(context: &str, tensor: &Tensor) -> Result<(usize, usize, usize)> {
    tensor.dims3().map_err(|_| {
        Error::Msg(format!(
            "{context}: expected (batch, seq, hidden) layout, got {:?}",
            tensor.dims()
        ))
    })
}

/// Checks the tensor dtype is one of the allowed values.
pub fn expect_dtype_in(context: &str, tensor: &Tensor, allowed: &[DType]) -> Result<()> {
    let dtype = tensor.dtype();
    if allowed.contains(&dtype) {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected dtype in {:?}, got {:?}",
            allowed, dtype
        )))
    }
}

/// Checks two tensors share a dtype.
pub fn expect_same_dtype(context: &str, lhs: &Tensor, rhs: &Tensor) -> Result<()> {
    if lhs.dtype() == rhs.dtype() {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: dtype mismatch {:?} vs {:?}",
            lhs.dtype(),
            rhs.dtype()
        )))
    }
}

/// Validates a dropout keep-probability lies in `(0, 1]`.
pub fn expect_keep_prob(context: &str, keep_prob: f64) -> Result<()> {
    if keep_prob > 0.0 && keep_prob <= 1.0 {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: keep probability must be in (0, 1], got {keep_prob}"
        )))
    }
}
