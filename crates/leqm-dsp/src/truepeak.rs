//! True-peak estimator (C10): polyphase FIR oversampling plus max-|x| tracking.

use leqm_core::Sample;
use std::f64::consts::PI;

/// Supported integer oversampling factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OversampleFactor {
    X2 = 2,
    X4 = 4,
    X8 = 8,
}

impl Default for OversampleFactor {
    fn default() -> Self {
        Self::X4
    }
}

impl OversampleFactor {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(n: u32) -> Option<Self> {
        match n {
            2 => Some(Self::X2),
            4 => Some(Self::X4),
            8 => Some(Self::X8),
            _ => None,
        }
    }
}

const TAPS_PER_PHASE: usize = 48;

/// One channel's polyphase upsampling filter bank and running peak.
struct ChannelPeak {
    history: Vec<f64>,
    head: usize,
    max_abs: f64,
}

impl ChannelPeak {
    fn new(history_len: usize) -> Self {
        Self {
            history: vec![0.0; history_len],
            head: 0,
            max_abs: 0.0,
        }
    }
}

/// Polyphase-FIR true-peak estimator. Upsamples each channel by an integer
/// factor and tracks the maximum absolute upsampled value.
pub struct TruePeakEstimator {
    factor: OversampleFactor,
    /// `phases[p]` is the `TAPS_PER_PHASE`-tap polyphase sub-filter for
    /// output phase `p` of the oversampling ratio.
    phases: Vec<Vec<f64>>,
    channels: Vec<ChannelPeak>,
}

impl TruePeakEstimator {
    pub fn new(factor: OversampleFactor, channels: usize) -> Self {
        let phases = design_polyphase(factor.as_u32() as usize, TAPS_PER_PHASE);
        Self {
            factor,
            phases,
            channels: (0..channels)
                .map(|_| ChannelPeak::new(TAPS_PER_PHASE))
                .collect(),
        }
    }

    pub fn oversampling(&self) -> OversampleFactor {
        self.factor
    }

    /// Feed one raw sample on `channel`, updating its running true-peak
    /// estimate across all oversampled phases.
    pub fn process(&mut self, channel: usize, sample: Sample) {
        let state = &mut self.channels[channel];
        state.history[state.head % TAPS_PER_PHASE] = sample;
        state.head += 1;

        for phase in &self.phases {
            let mut acc = 0.0;
            for (k, coeff) in phase.iter().enumerate() {
                let idx = (state.head + TAPS_PER_PHASE - 1 - k) % TAPS_PER_PHASE;
                acc += coeff * state.history[idx];
            }
            let abs_acc = acc.abs();
            if abs_acc > state.max_abs {
                state.max_abs = abs_acc;
            }
        }
    }

    /// Maximum absolute upsampled value seen so far on `channel`.
    pub fn max_abs(&self, channel: usize) -> f64 {
        self.channels[channel].max_abs
    }

    /// `TP = 20·log10(max_abs_upsampled) + REFERENCE_OFFSET_DB`.
    pub fn true_peak_db(&self, channel: usize) -> f64 {
        let m = self.max_abs(channel);
        if m <= 0.0 {
            f64::NEG_INFINITY
        } else {
            20.0 * m.log10() + leqm_core::REFERENCE_OFFSET_DB
        }
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }
}

/// Design `ratio` polyphase sub-filters, each `taps`-long, from a windowed-
/// sinc lowpass prototype at cutoff `1 / ratio` (Nyquist of the original
/// rate), split by phase per standard polyphase decomposition.
fn design_polyphase(ratio: usize, taps: usize) -> Vec<Vec<f64>> {
    let total_taps = taps * ratio;
    let cutoff = 1.0 / ratio as f64;
    let center = (total_taps - 1) as f64 / 2.0;

    let prototype: Vec<f64> = (0..total_taps)
        .map(|n| {
            let m = n as f64 - center;
            let sinc = if m.abs() < 1e-12 {
                cutoff
            } else {
                (PI * cutoff * m).sin() / (PI * m)
            };
            let window = 0.5 - 0.5 * (2.0 * PI * n as f64 / (total_taps - 1) as f64).cos();
            sinc * window
        })
        .collect();

    (0..ratio)
        .map(|phase| {
            let mut sub = Vec::with_capacity(taps);
            let mut i = phase;
            while i < total_taps {
                sub.push(prototype[i] * ratio as f64);
                i += ratio;
            }
            sub.resize(taps, 0.0);
            sub
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_dc_peak_is_bounded_near_0_dbfs_equivalent() {
        let mut est = TruePeakEstimator::new(OversampleFactor::X4, 1);
        for _ in 0..500 {
            est.process(0, 1.0);
        }
        // Polyphase gain should settle near unity for a DC input.
        assert!(est.max_abs(0) > 0.9 && est.max_abs(0) < 1.2);
    }

    #[test]
    fn silence_has_zero_peak() {
        let mut est = TruePeakEstimator::new(OversampleFactor::X4, 1);
        for _ in 0..100 {
            est.process(0, 0.0);
        }
        assert_eq!(est.max_abs(0), 0.0);
        assert_eq!(est.true_peak_db(0), f64::NEG_INFINITY);
    }

    #[test]
    fn factor_from_u32_rejects_non_power_values() {
        assert!(OversampleFactor::from_u32(3).is_none());
        assert_eq!(OversampleFactor::from_u32(4), Some(OversampleFactor::X4));
    }
}
