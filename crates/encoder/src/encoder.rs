//! Stacked, optionally bidirectional recurrent encoder over padded batches.
//!
//! Inputs are `(batch, seq, input_dim)` with per-row valid lengths `[batch]`.
//! Each direction owns an independent stack of `layer_num` cells (scopes
//! `fw.cell_<l>` and `bw.cell_<l>`). At step `t` a row with `t >= length` keeps
//! its previous state and emits a zero output, so the final state of every
//! layer is the state after the row's last valid step.
//!
//! The backward stack reads each row reversed within its valid length and its
//! outputs are reversed back, so position `t` of both directions refers to the
//! same input token.

use candle_core::{DType, Tensor};
use candle_nn::VarBuilder;
use layers::{mask_from_lengths, maybe_dropout};

use crate::{
    cell::RnnCell,
    config::{EncoderConfig, RnnKind},
    EncoderError,
};

type Result<T> = std::result::Result<T, EncoderError>;

/// Per-timestep outputs plus final states of an [`Encoder`] pass.
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// `(batch, seq, output_dim)`, zero at padded positions.
    pub outputs: Tensor,
    /// `(batch, state_dim)`: every layer's final `h`, forward layers first.
    pub state: Tensor,
    /// Combined final state of each layer, `(batch, output_dim)` apiece.
    pub layer_states: Vec<Tensor>,
}

/// A configured recurrent encoder with its parameters already requested.
#[derive(Debug, Clone)]
pub struct Encoder {
    config: EncoderConfig,
    input_dim: usize,
    dtype: DType,
    forward_cells: Vec<RnnCell>,
    backward_cells: Vec<RnnCell>,
}

impl Encoder {
    pub fn new(config: EncoderConfig, input_dim: usize, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        if input_dim == 0 {
            return Err(EncoderError::Validation(vec![
                "input_dim must be greater than 0".to_string(),
            ]));
        }

        let forward_cells = build_stack(&config, input_dim, vb.pp("fw"))?;
        let backward_cells = if config.kind.bidirectional {
            build_stack(&config, input_dim, vb.pp("bw"))?
        } else {
            Vec::new()
        };

        log::info!(
            "encoder {} hidden={} layers={} keep_prob={:?} concat={} input_dim={}",
            config.kind,
            config.hidden_size,
            config.layer_num,
            config.dropout_keep_prob,
            config.concat,
            input_dim
        );

        Ok(Self {
            config,
            input_dim,
            dtype: vb.dtype(),
            forward_cells,
            backward_cells,
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn kind(&self) -> RnnKind {
        self.config.kind
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.config.output_dim()
    }

    pub fn state_dim(&self) -> usize {
        self.config.state_dim()
    }

    /// Runs the encoder over `inputs` `(batch, seq, input_dim)` with valid `lengths` `[batch]`.
    ///
    /// Lengths may be any integer dtype; values above `seq` are treated as `seq`
    /// and negative values are rejected.
    /// Inputs are cast to the dtype of the variable builder the encoder was
    /// created with.
    pub fn forward(&self, inputs: &Tensor, lengths: &Tensor) -> Result<EncoderOutput> {
        let (batch, seq, features) = inputs.dims3().map_err(|_| {
            EncoderError::invalid_input(format!(
                "inputs must be (batch, seq, features), got {:?}",
                inputs.dims()
            ))
        })?;
        if features != self.input_dim {
            return Err(EncoderError::invalid_input(format!(
                "expected {} input features, got {features}",
                self.input_dim
            )));
        }
        if seq == 0 {
            return Err(EncoderError::invalid_input("sequence length must be non-zero"));
        }
        if lengths.dims() != [batch].as_slice() {
            return Err(EncoderError::invalid_input(format!(
                "lengths must be [{batch}], got {:?}",
                lengths.dims()
            )));
        }

        if batch > 0 && !matches!(lengths.dtype(), DType::U8 | DType::U32) {
            let shortest = lengths.to_dtype(DType::F64)?.min(0)?.to_vec0::<f64>()?;
            if shortest < 0.0 {
                return Err(EncoderError::invalid_input(format!(
                    "lengths must be non-negative, got {shortest}"
                )));
            }
        }

        let device = inputs.device();
        let inputs = inputs.to_dtype(self.dtype)?;
        let valid: Vec<u32> = lengths
            .to_dtype(DType::U32)?
            .to_vec1::<u32>()?
            .into_iter()
            .map(|len| len.min(seq as u32))
            .collect();
        let lengths = Tensor::from_vec(valid.clone(), batch, device)?;
        let step_mask = mask_from_lengths(&lengths, seq, device)?.to_dtype(self.dtype)?;

        let keep_prob = self.config.dropout_keep_prob;
        let (fw_outputs, fw_states) = run_stack(&self.forward_cells, &inputs, &step_mask, keep_prob)?;
        if !self.config.kind.bidirectional {
            let state = Tensor::cat(&fw_states, 1)?;
            return Ok(EncoderOutput {
                outputs: fw_outputs,
                state,
                layer_states: fw_states,
            });
        }

        let reversed = reverse_sequence(&inputs, &valid)?;
        let (bw_outputs, bw_states) =
            run_stack(&self.backward_cells, &reversed, &step_mask, keep_prob)?;
        let bw_outputs = reverse_sequence(&bw_outputs, &valid)?;

        let layer_states = fw_states
            .iter()
            .zip(&bw_states)
            .map(|(fw, bw)| self.combine(fw, bw))
            .collect::<Result<Vec<_>>>()?;

        let (outputs, state) = if self.config.concat {
            let fw_state = Tensor::cat(&fw_states, 1)?;
            let bw_state = Tensor::cat(&bw_states, 1)?;
            (
                Tensor::cat(&[&fw_outputs, &bw_outputs], 2)?,
                Tensor::cat(&[&fw_state, &bw_state], 1)?,
            )
        } else {
            (
                fw_outputs.add(&bw_outputs)?,
                Tensor::cat(&layer_states, 1)?,
            )
        };

        Ok(EncoderOutput {
            outputs,
            state,
            layer_states,
        })
    }

    fn combine(&self, fw: &Tensor, bw: &Tensor) -> Result<Tensor> {
        let combined = if self.config.concat {
            Tensor::cat(&[fw, bw], fw.rank() - 1)?
        } else {
            fw.add(bw)?
        };
        Ok(combined)
    }
}

fn build_stack(config: &EncoderConfig, input_dim: usize, vb: VarBuilder) -> Result<Vec<RnnCell>> {
    (0..config.layer_num)
        .map(|layer| {
            let layer_input = if layer == 0 {
                input_dim
            } else {
                config.hidden_size
            };
            RnnCell::new(
                config.kind.cell,
                layer_input,
                config.hidden_size,
                vb.pp(format!("cell_{layer}")),
            )
            .map_err(EncoderError::from)
        })
        .collect()
}

/// Runs every layer of one direction, returning the top layer outputs and each layer's final `h`.
fn run_stack(
    cells: &[RnnCell],
    inputs: &Tensor,
    step_mask: &Tensor,
    keep_prob: Option<f64>,
) -> Result<(Tensor, Vec<Tensor>)> {
    let (batch, seq, _) = inputs.dims3()?;
    let mut layer_input = inputs.clone();
    let mut final_states = Vec::with_capacity(cells.len());

    for cell in cells {
        let dropped = maybe_dropout(&layer_input, keep_prob)?;
        let mut state = cell.zero_state(batch, dropped.dtype(), dropped.device())?;
        let mut steps = Vec::with_capacity(seq);

        for t in 0..seq {
            let x = dropped.narrow(1, t, 1)?.squeeze(1)?;
            let keep = step_mask.narrow(1, t, 1)?;
            let next = cell.step(&x, &state)?;
            steps.push(next.h.broadcast_mul(&keep)?);
            state = state.blend(&next, &keep)?;
        }

        let outputs = Tensor::stack(&steps, 1)?;
        layer_input = maybe_dropout(&outputs, keep_prob)?;
        final_states.push(state.h);
    }

    Ok((layer_input, final_states))
}

/// Reverses each row of `(batch, seq, dim)` within its first `lengths[b]` steps.
///
/// Positions past a row's length stay where they are.
pub fn reverse_sequence(value: &Tensor, lengths: &[u32]) -> Result<Tensor> {
    let (batch, seq, dim) = value.dims3()?;
    if lengths.len() != batch {
        return Err(EncoderError::invalid_input(format!(
            "reverse_sequence: {} lengths for batch of {batch}",
            lengths.len()
        )));
    }

    let mut index = Vec::with_capacity(batch * seq);
    for &len in lengths {
        let len = (len as usize).min(seq);
        index.extend((0..seq).map(|t| if t < len { (len - 1 - t) as u32 } else { t as u32 }));
    }
    let index = Tensor::from_vec(index, (batch, seq, 1), value.device())?
        .broadcast_as((batch, seq, dim))?
        .contiguous()?;
    Ok(value.contiguous()?.gather(&index, 1)?)
}

/// One-shot encoder: builds an [`Encoder`] from an rnn type tag under `vb` and runs it.
///
/// Calling this twice with the same `vb` reuses the same parameters.
#[allow(clippy::too_many_arguments)]
pub fn rnn(
    rnn_type: &str,
    inputs: &Tensor,
    lengths: &Tensor,
    hidden_size: usize,
    layer_num: usize,
    dropout_keep_prob: Option<f64>,
    concat: bool,
    vb: VarBuilder,
) -> Result<EncoderOutput> {
    let config = EncoderConfig::from_tag(rnn_type, hidden_size)?
        .with_layers(layer_num)
        .with_dropout(dropout_keep_prob)
        .with_concat(concat);
    let input_dim = inputs.dims().last().copied().unwrap_or(0);
    Encoder::new(config, input_dim, vb)?.forward(inputs, lengths)
}
