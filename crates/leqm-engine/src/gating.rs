//! Gating engine (C8): absolute gate, relative gate, optional level or
//! dialogue gate, and the final gated LKFS.

use leqm_core::{DEFAULT_ABSOLUTE_GATE, RELATIVE_GATE_OFFSET};

use crate::config::{EngineConfig, GatingMode};
use crate::types::GatingEntry;

/// Outcome of a gating pass.
#[derive(Debug, Clone, Copy)]
pub struct GatingResult {
    /// `None` when zero blocks survive (§4.8 edge case: reported as
    /// `"below_floor"`, not an error).
    pub lkfs: Option<f64>,
    pub surviving_blocks: usize,
    pub total_blocks: usize,
}

/// `L_b = -0.691 + 10*log10(z_b)` for one gating-pool entry.
fn block_loudness(mean_square: f64) -> f64 {
    if mean_square > 0.0 {
        -0.691 + 10.0 * mean_square.log10()
    } else {
        f64::NEG_INFINITY
    }
}

/// Applies the full gating cascade described in §4.8 to a [`GatingEntry`]
/// pool collected by the gated worker (C7).
pub fn apply(pool: &[GatingEntry], config: &EngineConfig) -> GatingResult {
    let total_blocks = pool.len();

    let absolute_gate = DEFAULT_ABSOLUTE_GATE;
    let after_absolute: Vec<&GatingEntry> = pool
        .iter()
        .filter(|e| block_loudness(e.mean_square) >= absolute_gate)
        .collect();

    if after_absolute.is_empty() {
        return GatingResult {
            lkfs: None,
            surviving_blocks: 0,
            total_blocks,
        };
    }

    let ungated_mean: f64 =
        after_absolute.iter().map(|e| e.mean_square).sum::<f64>() / after_absolute.len() as f64;
    let ungated_lufs = block_loudness(ungated_mean);

    let relative_threshold = match config.gating_mode {
        GatingMode::Level => config
            .level_gate_db
            .unwrap_or(ungated_lufs + RELATIVE_GATE_OFFSET),
        _ => ungated_lufs + RELATIVE_GATE_OFFSET,
    };

    let surviving: Vec<&&GatingEntry> = after_absolute
        .iter()
        .filter(|e| block_loudness(e.mean_square) >= relative_threshold)
        .filter(|e| {
            config.gating_mode != GatingMode::Dialogue || e.speech_prob >= config.speech_threshold
        })
        .collect();

    if surviving.is_empty() {
        return GatingResult {
            lkfs: None,
            surviving_blocks: 0,
            total_blocks,
        };
    }

    let surviving_mean: f64 =
        surviving.iter().map(|e| e.mean_square).sum::<f64>() / surviving.len() as f64;
    let lkfs = block_loudness(surviving_mean);

    GatingResult {
        lkfs: Some(lkfs),
        surviving_blocks: surviving.len(),
        total_blocks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(mean_square: f64) -> GatingEntry {
        GatingEntry {
            start_frame: 0,
            mean_square,
            speech_prob: 1.0,
        }
    }

    #[test]
    fn zero_surviving_blocks_reports_none() {
        let pool = vec![entry(0.0), entry(0.0)];
        let result = apply(&pool, &EngineConfig::default());
        assert!(result.lkfs.is_none());
        assert_eq!(result.surviving_blocks, 0);
    }

    #[test]
    fn raising_absolute_gate_never_increases_survivors() {
        // Loud block (~ -3 LUFS) and a quiet block right at -65 LUFS.
        let loud = entry(10f64.powf((-3.0 + 0.691) / 10.0));
        let quiet = entry(10f64.powf((-65.0 + 0.691) / 10.0));
        let pool = vec![loud, quiet];

        let config = EngineConfig::default();
        let result = apply(&pool, &config);
        // Both survive absolute (-70) and the quiet one may or may not
        // survive the relative gate, but count must never exceed total.
        assert!(result.surviving_blocks <= pool.len());
    }

    #[test]
    fn dialogue_gate_requires_speech_probability() {
        let mut e = entry(10f64.powf((-10.0 + 0.691) / 10.0));
        e.speech_prob = 0.0;
        let pool = vec![e];
        let mut config = EngineConfig::default();
        config.gating_mode = GatingMode::Dialogue;
        config.speech_threshold = 0.33;
        let result = apply(&pool, &config);
        assert!(result.lkfs.is_none());
    }
}
