//! M-weighting filter bank (C2).

use leqm_core::{LeqmError, LeqmResult, Sample};

use crate::coeffs::{self, IirCoeffs, M_WEIGHT_FIR_21};

/// Per-channel Direct-Form-I history: previous inputs and previous outputs.
/// Sized to the longest taps of the coefficient set (6 for the IIR table,
/// 21 for the FIR kernel).
#[derive(Debug, Clone)]
struct FilterState {
    x_hist: [f64; 6],
    y_hist: [f64; 6],
    fir_tail: [f64; 21],
}

impl FilterState {
    fn zero() -> Self {
        Self {
            x_hist: [0.0; 6],
            y_hist: [0.0; 6],
            fir_tail: [0.0; 21],
        }
    }
}

/// Either the tabulated IIR recurrence or a 21-tap FIR kernel, selected at
/// construction time by `--convpoints`.
enum Mode {
    Iir(IirCoeffs),
    Fir([f64; 21]),
}

/// One M-weighting filter bank, one [`FilterState`] per channel.
pub struct FilterBank {
    mode: Mode,
    states: Vec<FilterState>,
}

impl FilterBank {
    /// Allocate a filter bank for `channels` channels at `sample_rate`.
    /// Fails with [`LeqmError::UnsupportedSampleRate`] if the rate has no
    /// tabulated IIR coefficients — per C2, the implementer must not
    /// silently substitute a wrong table.
    pub fn new(sample_rate: u32, channels: usize) -> LeqmResult<Self> {
        let coeffs = coeffs::m_weight_for_rate(sample_rate)?;
        Ok(Self {
            mode: Mode::Iir(coeffs),
            states: vec![FilterState::zero(); channels],
        })
    }

    /// Allocate a filter bank that uses FIR convolution instead of the IIR
    /// recurrence, per `--convpoints`.
    pub fn new_fir(channels: usize) -> Self {
        Self {
            mode: Mode::Fir(M_WEIGHT_FIR_21),
            states: vec![FilterState::zero(); channels],
        }
    }

    pub fn channels(&self) -> usize {
        self.states.len()
    }

    /// Apply the filter to one sample on `channel`, advancing that
    /// channel's history. History shifts happen after each call, as
    /// required by C2.
    pub fn process(&mut self, channel: usize, sample: Sample) -> LeqmResult<Sample> {
        let state = self
            .states
            .get_mut(channel)
            .ok_or(LeqmError::ChannelCountMismatch {
                expected: self.states.len(),
                got: channel + 1,
            })?;

        let out = match &self.mode {
            Mode::Iir(c) => direct_form_i(c, state, sample),
            Mode::Fir(ir) => fir_convolve(ir, state, sample),
        };
        Ok(out)
    }

    pub fn reset(&mut self) {
        for s in &mut self.states {
            *s = FilterState::zero();
        }
    }
}

/// `y[n] = Σ b_k·x[n−k] − Σ_{k≥1} a_k·y[n−k]`, `a[0] = 1`.
/// `state.x_hist[i]` holds `x[n-1-i]`, `state.y_hist[i]` holds `y[n-1-i]`.
fn direct_form_i(c: &IirCoeffs, state: &mut FilterState, x0: f64) -> f64 {
    let mut y0 = c.b[0] * x0;
    for k in 1..6 {
        y0 += c.b[k] * state.x_hist[k - 1];
        y0 -= c.a[k] * state.y_hist[k - 1];
    }

    shift_in(&mut state.x_hist, x0);
    shift_in(&mut state.y_hist, y0);

    y0
}

/// Convolve one sample against the 21-tap kernel, pulling earlier taps from
/// the block-boundary tail retained in `FilterState`.
fn fir_convolve(ir: &[f64; 21], state: &mut FilterState, x0: f64) -> f64 {
    let n = ir.len();
    let mut acc = ir[0] * x0;
    for k in 1..n {
        acc += ir[k] * state.fir_tail[k - 1];
    }
    shift_in(&mut state.fir_tail, x0);
    acc
}

/// Shift a history ring right by one and insert the newest value at the front.
fn shift_in<const N: usize>(hist: &mut [f64; N], newest: f64) {
    for i in (1..N).rev() {
        hist[i] = hist[i - 1];
    }
    hist[0] = newest;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_rate() {
        assert!(FilterBank::new(22050, 2).is_err());
    }

    #[test]
    fn silence_stays_silent() {
        let mut bank = FilterBank::new(48000, 1).unwrap();
        for _ in 0..1000 {
            let y = bank.process(0, 0.0).unwrap();
            assert_eq!(y, 0.0);
        }
    }

    #[test]
    fn stays_finite_on_impulse() {
        let mut bank = FilterBank::new(48000, 1).unwrap();
        let mut y = bank.process(0, 1.0).unwrap();
        assert!(y.is_finite());
        for _ in 0..10000 {
            y = bank.process(0, 0.0).unwrap();
            assert!(y.is_finite());
        }
    }

    #[test]
    fn fir_mode_preserves_tail_across_calls() {
        let mut bank = FilterBank::new_fir(1);
        let out1 = bank.process(0, 1.0).unwrap();
        let out2 = bank.process(0, 0.0).unwrap();
        assert!(out1.is_finite() && out2.is_finite());
    }

    #[test]
    fn unknown_channel_errors() {
        let mut bank = FilterBank::new(48000, 1).unwrap();
        assert!(bank.process(5, 0.0).is_err());
    }
}
