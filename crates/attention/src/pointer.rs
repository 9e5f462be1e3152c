//! One step of a pointer network.
//!
//! The decoder state is tiled across the encoder length, concatenated with the
//! encoder states on the feature axis and scored with
//! [`attention_pooling`](crate::pooling::attention_pooling). The resulting
//! distribution over positions both *is* the pointer output and weights the
//! encoder states into the next decoder state. The decoding loop that calls
//! this once per step lives with the caller.

use candle_core::{Error, Result, Tensor};
use candle_nn::VarBuilder;
use layers::checks;

use crate::pooling::{attention_pooling, weighted_sum};

/// Scope conventionally passed to [`pointer`].
pub const POINTER_SCOPE: &str = "pointer";

/// Runs a pointer step over `encoder_state` `(batch, seq, dim_e)` given `decoder_state` `(batch, dim_d)`.
///
/// Returns `(next_decoder_state, alpha)` with shapes `(batch, dim_e)` and
/// `(batch, seq)`. The next state pools the encoder states only, not the
/// concatenated scoring input.
pub fn pointer(
    encoder_state: &Tensor,
    decoder_state: &Tensor,
    hidden_dim: usize,
    mask: &Tensor,
    vb: VarBuilder,
) -> Result<(Tensor, Tensor)> {
    let (batch, seq, _) = checks::expect_batch_seq_hidden("pointer.encoder_state", encoder_state)?;
    checks::expect_rank("pointer.decoder_state", decoder_state, 2)?;
    checks::expect_same_dtype("pointer", encoder_state, decoder_state)?;
    let (decoder_batch, decoder_dim) = decoder_state.dims2()?;
    if decoder_batch != batch {
        return Err(Error::Msg(format!(
            "pointer: decoder batch {decoder_batch} does not match encoder batch {batch}"
        )));
    }

    let tiled = decoder_state
        .unsqueeze(1)?
        .broadcast_as((batch, seq, decoder_dim))?
        .contiguous()?;
    let united = Tensor::cat(&[&tiled, encoder_state], 2)?;

    let (_, alpha) = attention_pooling(&united, hidden_dim, mask, vb)?;
    let next_state = weighted_sum(&alpha, encoder_state)?;
    Ok((next_state, alpha))
}
