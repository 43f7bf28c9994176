//! Reducer (C11): combines global accumulators into final dB-SPL numbers.

use leqm_core::REFERENCE_OFFSET_DB;

use crate::energy::ChannelEnergy;

/// Final measurement numbers, rounded to four decimal digits per §4.11.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ReducedMeasurements {
    pub leq_m: f64,
    pub leq_no_weight: Option<f64>,
    pub mean_power: f64,
    pub mean_power_weighted: f64,
}

/// `Leq(M) = 20*log10(sqrt(csum / n_mono_samples)) + REFERENCE_OFFSET_DB`.
/// `Leq(noW)` uses `sum` (unweighted) in place of `csum`.
pub fn reduce(channels: &[ChannelEnergy], include_unweighted: bool) -> ReducedMeasurements {
    let csum: f64 = channels.iter().map(|c| c.sum_weighted).sum();
    let sum: f64 = channels.iter().map(|c| c.sum_unweighted).sum();
    let n_mono_samples: u64 = channels.iter().map(|c| c.n_samples).sum();

    let mean_power_weighted = if n_mono_samples > 0 {
        csum / n_mono_samples as f64
    } else {
        0.0
    };
    let mean_power = if n_mono_samples > 0 {
        sum / n_mono_samples as f64
    } else {
        0.0
    };

    let leq_m = db_spl(mean_power_weighted);
    let leq_no_weight = include_unweighted.then(|| db_spl(mean_power));

    ReducedMeasurements {
        leq_m: round4(leq_m),
        leq_no_weight: leq_no_weight.map(round4),
        mean_power: round4(mean_power),
        mean_power_weighted: round4(mean_power_weighted),
    }
}

fn db_spl(mean_power: f64) -> f64 {
    if mean_power > 0.0 {
        20.0 * mean_power.sqrt().log10() + REFERENCE_OFFSET_DB
    } else {
        f64::NEG_INFINITY
    }
}

/// Round to four decimal digits for reporting; internal math stays 64-bit
/// throughout (this function is only ever applied to final output values).
pub fn round4(x: f64) -> f64 {
    if x.is_finite() {
        (x * 10_000.0).round() / 10_000.0
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_yields_neg_infinity_not_nan() {
        let channels = vec![ChannelEnergy::default()];
        let out = reduce(&channels, true);
        assert!(out.leq_m.is_infinite() && out.leq_m < 0.0);
        assert!(!out.leq_m.is_nan());
    }

    #[test]
    fn doubling_amplitude_adds_6_02_db() {
        let mut quiet = ChannelEnergy::default();
        quiet.accumulate(0.1, 0.1);
        quiet.n_samples = 48000;
        quiet.sum_weighted = 0.1 * 0.1 * 48000.0;

        let mut loud = ChannelEnergy::default();
        loud.n_samples = 48000;
        loud.sum_weighted = 0.2 * 0.2 * 48000.0;

        let a = reduce(&[quiet], false).leq_m;
        let b = reduce(&[loud], false).leq_m;
        assert!((b - a - 20.0 * 2f64.log10()).abs() < 1e-6);
    }

    #[test]
    fn round4_keeps_four_decimal_digits() {
        assert_eq!(round4(85.123456), 85.1235);
    }
}
