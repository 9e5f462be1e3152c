//! Recurrent cells with explicit single-step updates.
//!
//! Every cell consumes the concatenation `[x, h]` of the step input
//! `(batch, input_dim)` and the previous hidden state `(batch, hidden)` through
//! a kernel laid out as `(input_dim + hidden, n · hidden)`:
//!
//! * **Plain**: `h' = tanh([x, h]·W + b)`.
//! * **LSTM**: `i, j, f, o = split([x, h]·W + b)`,
//!   `c' = σ(f + forget_bias)·c + σ(i)·tanh(j)`, `h' = σ(o)·tanh(c')`.
//! * **GRU**: `r, u = split(σ([x, h]·W_g + b_g))`,
//!   `ĉ = tanh([x, r·h]·W_c + b_c)`, `h' = u·h + (1 - u)·ĉ`.
//!
//! Parameters are requested once at construction: `kernel`/`bias` for the plain
//! and LSTM cells, `gates.{kernel,bias}` and `candidate.{kernel,bias}` for GRU.
//! GRU gate biases start at `1.0`, all other biases at zero.

use candle_core::{DType, Device, Error, Result, Tensor};
use candle_nn::{ops::sigmoid, Init, VarBuilder};
use layers::dense::glorot_uniform;

use crate::config::CellKind;

/// Added to the LSTM forget gate pre-activation.
pub const LSTM_FORGET_BIAS: f64 = 1.0;

/// Hidden state carried between steps; `c` is only present for LSTM cells.
#[derive(Debug, Clone)]
pub struct CellState {
    pub h: Tensor,
    pub c: Option<Tensor>,
}

impl CellState {
    /// Keeps `next` for rows where `keep` is `1.0` and `self` where it is `0.0`.
    ///
    /// `keep` is `(batch, 1)`.
    pub fn blend(&self, next: &CellState, keep: &Tensor) -> Result<CellState> {
        let h = blend_tensor(&self.h, &next.h, keep)?;
        let c = match (&self.c, &next.c) {
            (Some(prev), Some(next)) => Some(blend_tensor(prev, next, keep)?),
            (None, None) => None,
            _ => return Err(Error::Msg("cell states disagree on memory component".into())),
        };
        Ok(CellState { h, c })
    }
}

fn blend_tensor(prev: &Tensor, next: &Tensor, keep: &Tensor) -> Result<Tensor> {
    prev.broadcast_add(&next.sub(prev)?.broadcast_mul(keep)?)
}

#[derive(Debug, Clone)]
struct Affine {
    kernel: Tensor,
    bias: Tensor,
}

impl Affine {
    fn new(fan_in: usize, fan_out: usize, bias_init: Init, vb: VarBuilder) -> Result<Self> {
        let kernel = vb.get_with_hints((fan_in, fan_out), "kernel", glorot_uniform(fan_in, fan_out))?;
        let bias = vb.get_with_hints(fan_out, "bias", bias_init)?;
        Ok(Self { kernel, bias })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.matmul(&self.kernel)?.broadcast_add(&self.bias)
    }
}

#[derive(Debug, Clone)]
enum CellParams {
    Plain(Affine),
    Lstm(Affine),
    Gru { gates: Affine, candidate: Affine },
}

/// A single recurrent cell of one of the supported families.
#[derive(Debug, Clone)]
pub struct RnnCell {
    kind: CellKind,
    hidden: usize,
    params: CellParams,
}

impl RnnCell {
    /// Creates (or reuses, by scope) the cell parameters under `vb`.
    pub fn new(kind: CellKind, input_dim: usize, hidden: usize, vb: VarBuilder) -> Result<Self> {
        let fan_in = input_dim + hidden;
        let params = match kind {
            CellKind::Plain => {
                CellParams::Plain(Affine::new(fan_in, hidden, Init::Const(0.0), vb.clone())?)
            }
            CellKind::Lstm => {
                CellParams::Lstm(Affine::new(fan_in, 4 * hidden, Init::Const(0.0), vb.clone())?)
            }
            CellKind::Gru => CellParams::Gru {
                gates: Affine::new(fan_in, 2 * hidden, Init::Const(1.0), vb.pp("gates"))?,
                candidate: Affine::new(fan_in, hidden, Init::Const(0.0), vb.pp("candidate"))?,
            },
        };
        log::debug!(
            "rnn cell scope={} kind={:?} input_dim={} hidden={}",
            vb.prefix(),
            kind,
            input_dim,
            hidden
        );
        Ok(Self {
            kind,
            hidden,
            params,
        })
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden
    }

    /// All-zero state for `batch` rows.
    pub fn zero_state(&self, batch: usize, dtype: DType, device: &Device) -> Result<CellState> {
        let h = Tensor::zeros((batch, self.hidden_size()), dtype, device)?;
        let c = match self.kind {
            CellKind::Lstm => Some(h.zeros_like()?),
            _ => None,
        };
        Ok(CellState { h, c })
    }

    /// Advances the cell by one step for input `(batch, input_dim)`.
    pub fn step(&self, input: &Tensor, state: &CellState) -> Result<CellState> {
        let xh = Tensor::cat(&[input, &state.h], 1)?;
        match &self.params {
            CellParams::Plain(affine) => Ok(CellState {
                h: affine.forward(&xh)?.tanh()?,
                c: None,
            }),
            CellParams::Lstm(affine) => {
                let c_prev = state
                    .c
                    .as_ref()
                    .ok_or_else(|| Error::Msg("lstm step requires a memory state".into()))?;
                let gates = affine.forward(&xh)?.chunk(4, 1)?;
                let (i, j, f, o) = (&gates[0], &gates[1], &gates[2], &gates[3]);

                let forget = sigmoid(&f.affine(1.0, LSTM_FORGET_BIAS)?)?;
                let c = forget
                    .mul(c_prev)?
                    .add(&sigmoid(i)?.mul(&j.tanh()?)?)?;
                let h = sigmoid(o)?.mul(&c.tanh()?)?;
                Ok(CellState { h, c: Some(c) })
            }
            CellParams::Gru { gates, candidate } => {
                let hidden = self.hidden;
                let gate_values = sigmoid(&gates.forward(&xh)?)?;
                let r = gate_values.narrow(1, 0, hidden)?;
                let u = gate_values.narrow(1, hidden, hidden)?;

                let reset_h = r.mul(&state.h)?;
                let xrh = Tensor::cat(&[input, &reset_h], 1)?;
                let c = candidate.forward(&xrh)?.tanh()?;

                // h' = u·h + (1 - u)·ĉ = ĉ + u·(h - ĉ)
                let h = c.add(&u.mul(&state.h.sub(&c)?)?)?;
                Ok(CellState { h, c: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;

    fn sigmoid_f32(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    #[test]
    fn parameter_shapes_follow_cell_kind() -> Result<()> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);

        RnnCell::new(CellKind::Plain, 3, 5, vb.pp("plain"))?;
        RnnCell::new(CellKind::Lstm, 3, 5, vb.pp("lstm"))?;
        RnnCell::new(CellKind::Gru, 3, 5, vb.pp("gru"))?;

        let data = varmap.data().lock().unwrap();
        assert_eq!(data["plain.kernel"].as_tensor().dims(), &[8, 5]);
        assert_eq!(data["lstm.kernel"].as_tensor().dims(), &[8, 20]);
        assert_eq!(data["lstm.bias"].as_tensor().dims(), &[20]);
        assert_eq!(data["gru.gates.kernel"].as_tensor().dims(), &[8, 10]);
        assert_eq!(data["gru.candidate.kernel"].as_tensor().dims(), &[8, 5]);
        let gate_bias = data["gru.gates.bias"].as_tensor().to_vec1::<f32>()?;
        assert!(gate_bias.iter().all(|&b| b == 1.0));
        Ok(())
    }

    #[test]
    fn plain_step_matches_formula() -> Result<()> {
        let device = Device::Cpu;
        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let cell = RnnCell::new(CellKind::Plain, 1, 1, vb.pp("cell"))?;
        varmap.set_one("cell.kernel", Tensor::from_vec(vec![0.5f32, -1.0], (2, 1), &device)?)?;
        varmap.set_one("cell.bias", Tensor::from_vec(vec![0.25f32], 1, &device)?)?;
        let cell = RnnCell::new(cell.kind(), 1, 1, vb.pp("cell"))?;

        let state = CellState {
            h: Tensor::from_vec(vec![0.2f32], (1, 1), &device)?,
            c: None,
        };
        let x = Tensor::from_vec(vec![2.0f32], (1, 1), &device)?;
        let next = cell.step(&x, &state)?;

        let expected = (0.5f32 * 2.0 - 1.0 * 0.2 + 0.25).tanh();
        let got = next.h.flatten_all()?.to_vec1::<f32>()?[0];
        assert!((got - expected).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn lstm_step_applies_forget_bias() -> Result<()> {
        let device = Device::Cpu;
        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        RnnCell::new(CellKind::Lstm, 1, 1, vb.pp("cell"))?;
        varmap.set_one("cell.kernel", Tensor::zeros((2, 4), DType::F32, &device)?)?;
        varmap.set_one(
            "cell.bias",
            Tensor::from_vec(vec![0.0f32, 1.0, 0.0, 0.0], 4, &device)?,
        )?;
        let cell = RnnCell::new(CellKind::Lstm, 1, 1, vb.pp("cell"))?;

        let state = CellState {
            h: Tensor::zeros((1, 1), DType::F32, &device)?,
            c: Some(Tensor::from_vec(vec![0.4f32], (1, 1), &device)?),
        };
        let x = Tensor::ones((1, 1), DType::F32, &device)?;
        let next = cell.step(&x, &state)?;

        let c = sigmoid_f32(1.0) * 0.4 + 0.5 * 1.0f32.tanh();
        let h = 0.5 * c.tanh();
        let got_c = next.c.as_ref().unwrap().flatten_all()?.to_vec1::<f32>()?[0];
        let got_h = next.h.flatten_all()?.to_vec1::<f32>()?[0];
        assert!((got_c - c).abs() < 1e-6);
        assert!((got_h - h).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn gru_step_interpolates_with_update_gate() -> Result<()> {
        let device = Device::Cpu;
        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        RnnCell::new(CellKind::Gru, 1, 1, vb.pp("cell"))?;
        varmap.set_one("cell.gates.kernel", Tensor::zeros((2, 2), DType::F32, &device)?)?;
        varmap.set_one("cell.candidate.kernel", Tensor::zeros((2, 1), DType::F32, &device)?)?;
        varmap.set_one("cell.candidate.bias", Tensor::ones(1, DType::F32, &device)?)?;
        let cell = RnnCell::new(CellKind::Gru, 1, 1, vb.pp("cell"))?;

        let x = Tensor::ones((1, 1), DType::F32, &device)?;
        let state = cell.zero_state(1, DType::F32, &device)?;
        let first = cell.step(&x, &state)?;
        let second = cell.step(&x, &first)?;

        let u = sigmoid_f32(1.0);
        let h1 = (1.0 - u) * 1.0f32.tanh();
        let h2 = u * h1 + (1.0 - u) * 1.0f32.tanh();
        let got1 = first.h.flatten_all()?.to_vec1::<f32>()?[0];
        let got2 = second.h.flatten_all()?.to_vec1::<f32>()?[0];
        assert!((got1 - h1).abs() < 1e-6);
        assert!((got2 - h2).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn blend_keeps_previous_state_for_finished_rows() -> Result<()> {
        let device = Device::Cpu;
        let prev = CellState {
            h: Tensor::from_vec(vec![1f32, 1., 2., 2.], (2, 2), &device)?,
            c: None,
        };
        let next = CellState {
            h: Tensor::from_vec(vec![5f32, 5., 7., 7.], (2, 2), &device)?,
            c: None,
        };
        let keep = Tensor::from_vec(vec![1f32, 0.], (2, 1), &device)?;

        let blended = prev.blend(&next, &keep)?;
        assert_eq!(
            blended.h.to_vec2::<f32>()?,
            vec![vec![5.0, 5.0], vec![2.0, 2.0]]
        );
        Ok(())
    }
}
