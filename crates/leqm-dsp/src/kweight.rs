//! K-weighting filter (C3): BS.1770 high-shelf + high-pass cascade, plus
//! per-channel gain weighting.

use leqm_core::{ChannelRole, LeqmError, LeqmResult, Sample};

use crate::coeffs::{self, IirCoeffs2, KWeightCoeffs};

/// Transposed Direct Form II state for one biquad stage.
#[derive(Debug, Clone, Copy, Default)]
struct Tdf2State {
    z1: f64,
    z2: f64,
}

impl Tdf2State {
    #[inline]
    fn process(&mut self, c: &IirCoeffs2, input: f64) -> f64 {
        let out = c.b0 * input + self.z1;
        self.z1 = c.b1 * input - c.a1 * out + self.z2;
        self.z2 = c.b2 * input - c.a2 * out;
        out
    }
}

/// Per-channel two-stage K-weighting state.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    hs: Tdf2State,
    hp: Tdf2State,
}

/// Two chained biquads per channel (high-shelf ≈1.5 kHz, high-pass ≈38 Hz),
/// followed by per-channel BS.1770 gain weighting.
pub struct KWeightFilter {
    coeffs: KWeightCoeffs,
    states: Vec<ChannelState>,
    gains: Vec<f64>,
}

impl KWeightFilter {
    /// Allocate a filter for `channels` channels at `sample_rate`, using the
    /// default BS.1770 layout gains for that channel count.
    pub fn new(sample_rate: u32, channels: usize) -> LeqmResult<Self> {
        let roles = ChannelRole::default_layout(channels);
        let gains = roles.iter().map(|r| r.bs1770_gain()).collect();
        Self::with_gains(sample_rate, gains)
    }

    /// Allocate a filter with an explicit per-channel gain vector, for
    /// non-5.1 layouts (per C3's reconfiguration requirement).
    pub fn with_gains(sample_rate: u32, gains: Vec<f64>) -> LeqmResult<Self> {
        let coeffs = coeffs::k_weight_for_rate(sample_rate)?;
        let channels = gains.len();
        Ok(Self {
            coeffs,
            states: vec![ChannelState::default(); channels],
            gains,
        })
    }

    pub fn channels(&self) -> usize {
        self.states.len()
    }

    /// K-weight one sample on `channel`, returning the gain-weighted value
    /// ready to be squared and accumulated.
    pub fn process(&mut self, channel: usize, sample: Sample) -> LeqmResult<Sample> {
        let state = self
            .states
            .get_mut(channel)
            .ok_or(LeqmError::ChannelCountMismatch {
                expected: self.states.len(),
                got: channel + 1,
            })?;
        let hs_out = state.hs.process(&self.coeffs.hs, sample);
        let hp_out = state.hp.process(&self.coeffs.hp, hs_out);
        Ok(hp_out * self.gains[channel])
    }

    pub fn reset(&mut self) {
        for s in &mut self.states {
            *s = ChannelState::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_finite() {
        let mut f = KWeightFilter::new(48000, 2).unwrap();
        for i in 0..4800 {
            let x = (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / 48000.0).sin();
            assert!(f.process(0, x).unwrap().is_finite());
            assert!(f.process(1, x).unwrap().is_finite());
        }
    }

    #[test]
    fn lfe_contributes_zero_gain() {
        let f = KWeightFilter::new(48000, 6).unwrap();
        assert_eq!(f.gains[3], 0.0); // LFE in the default 5.1 layout
    }

    #[test]
    fn surround_gain_is_1_41() {
        let f = KWeightFilter::new(48000, 6).unwrap();
        assert!((f.gains[4] - 1.41).abs() < 1e-9);
        assert!((f.gains[5] - 1.41).abs() < 1e-9);
    }

    #[test]
    fn unknown_rate_rejected() {
        assert!(KWeightFilter::new(22050, 2).is_err());
    }
}
