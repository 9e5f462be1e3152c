//! Precision helpers for the exponent/log heavy operators.
//!
//! Half precision inputs (`f16`/`bf16`) are promoted to `f32` before
//! exponentials, logarithms and reductions, then cast back so the caller sees
//! the dtype it passed in. `f32` and `f64` inputs are computed as-is.

use candle_core::{DType, Result, Tensor};

/// Pairs the caller's storage dtype with the dtype used for computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecisionPolicy {
    storage: DType,
    compute: DType,
}

impl PrecisionPolicy {
    /// Builds a policy from the dtype of an incoming tensor.
    pub fn for_dtype(storage: DType) -> Self {
        let compute = match storage {
            DType::F16 | DType::BF16 => DType::F32,
            other => other,
        };
        Self { storage, compute }
    }

    /// Builds a policy from an incoming tensor.
    pub fn for_tensor(tensor: &Tensor) -> Self {
        Self::for_dtype(tensor.dtype())
    }

    /// Returns the dtype results are handed back in.
    pub fn storage(&self) -> DType {
        self.storage
    }

    /// Returns the dtype used for exponentials, logarithms and sums.
    pub fn compute(&self) -> DType {
        self.compute
    }

    /// Indicates whether the policy promotes the input.
    pub fn is_mixed_precision(&self) -> bool {
        self.storage != self.compute
    }

    /// Casts a tensor to the compute dtype.
    pub fn promote(&self, tensor: &Tensor) -> Result<Tensor> {
        cast_tensor(tensor, self.compute)
    }

    /// Casts a tensor back to the storage dtype (or leaves it unchanged).
    pub fn restore(&self, tensor: &Tensor) -> Result<Tensor> {
        cast_tensor(tensor, self.storage)
    }
}

fn cast_tensor(tensor: &Tensor, dtype: DType) -> Result<Tensor> {
    if tensor.dtype() == dtype {
        Ok(tensor.clone())
    } else {
        tensor.to_dtype(dtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn policy_promotes_reduced_precision_inputs() {
        let policy = PrecisionPolicy::for_dtype(DType::F16);
        assert_eq!(policy.storage(), DType::F16);
        assert_eq!(policy.compute(), DType::F32);
        assert!(policy.is_mixed_precision());

        let policy = PrecisionPolicy::for_dtype(DType::F64);
        assert_eq!(policy.compute(), DType::F64);
        assert!(!policy.is_mixed_precision());
    }

    #[test]
    fn promote_then_restore_round_trips_dtype() -> Result<()> {
        let device = Device::Cpu;
        let base = Tensor::from_vec(vec![0.125f32, -0.75, 3.5], (3,), &device)?;
        let stored = base.to_dtype(DType::BF16)?;
        let policy = PrecisionPolicy::for_tensor(&stored);

        let compute = policy.promote(&stored)?;
        assert_eq!(compute.dtype(), DType::F32);
        let restored = policy.restore(&compute)?;
        assert_eq!(restored.dtype(), DType::BF16);
        assert_eq!(
            restored.to_dtype(DType::F32)?.to_vec1::<f32>()?,
            vec![0.125, -0.75, 3.5]
        );
        Ok(())
    }
}
