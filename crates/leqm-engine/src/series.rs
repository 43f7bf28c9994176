//! Logging series (C9): the sliding long-window Leq(M,10m) series and the
//! derived Allen metric, built from the per-block Leq(M) log.

use crate::types::{LeqM10Entry, LeqMLogEntry};

/// Sliding mean of the per-block series with window length `W_long` blocks,
/// `W_long = long_period_minutes * 60_000 / buffer_ms`.
pub fn long_window_series(
    leq_log: &[LeqMLogEntry],
    buffer_ms: u32,
    long_period_minutes: f64,
) -> Vec<LeqM10Entry> {
    if leq_log.is_empty() || buffer_ms == 0 {
        return Vec::new();
    }
    let window_blocks = ((long_period_minutes * 60_000.0) / buffer_ms as f64).round() as usize;
    let window_blocks = window_blocks.max(1);

    let mut out = Vec::with_capacity(leq_log.len());
    for start in 0..leq_log.len() {
        let end = (start + window_blocks).min(leq_log.len());
        let slice = &leq_log[start..end];
        let finite: Vec<f64> = slice
            .iter()
            .map(|e| e.leq_m_db)
            .filter(|v| v.is_finite())
            .collect();
        let mean_db = if finite.is_empty() {
            f64::NEG_INFINITY
        } else {
            finite.iter().sum::<f64>() / finite.len() as f64
        };
        out.push(LeqM10Entry {
            start_seconds: leq_log[start].start_seconds,
            mean_db,
        });
        if end == leq_log.len() {
            break;
        }
    }
    out
}

/// `Allen = Σ_{v_k >= threshold} v_k / (total_seconds / 60)`, per §4.9, applied
/// to the per-block short-term log rather than the long-window mean: a
/// sliding `W_long`-block average blends loud and quiet content together, so
/// it can never cross `threshold` once the loud segment is shorter than the
/// window itself (a 5-minute loud segment inside a 10-minute window tops out
/// around the midpoint of the two levels). Each qualifying block contributes
/// its dB value weighted by the block's duration in minutes, so the sum is
/// dB-minutes of loud content, normalized by total program minutes.
pub fn allen_metric(leq_log: &[LeqMLogEntry], threshold_db: f64, total_seconds: f64) -> f64 {
    if total_seconds <= 0.0 || leq_log.is_empty() {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, e) in leq_log.iter().enumerate() {
        if !e.leq_m_db.is_finite() || e.leq_m_db < threshold_db {
            continue;
        }
        let block_seconds = if i + 1 < leq_log.len() {
            leq_log[i + 1].start_seconds - e.start_seconds
        } else {
            total_seconds - e.start_seconds
        };
        sum += e.leq_m_db * (block_seconds / 60.0);
    }
    sum / (total_seconds / 60.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(n: usize, db: f64, step_seconds: f64) -> Vec<LeqMLogEntry> {
        (0..n)
            .map(|i| LeqMLogEntry {
                start_seconds: i as f64 * step_seconds,
                leq_m_db: db,
            })
            .collect()
    }

    #[test]
    fn constant_series_yields_constant_long_window() {
        let entries = log(100, 70.0, 0.75);
        let long = long_window_series(&entries, 750, 10.0);
        assert!(long.iter().all(|e| (e.mean_db - 70.0).abs() < 1e-9));
    }

    #[test]
    fn allen_ignores_values_below_threshold() {
        // 5-minute block at 85 dB, remainder at 70 dB, over 30 minutes.
        let entries = vec![
            LeqMLogEntry {
                start_seconds: 0.0,
                leq_m_db: 85.0,
            },
            LeqMLogEntry {
                start_seconds: 300.0,
                leq_m_db: 70.0,
            },
        ];
        let allen = allen_metric(&entries, 80.0, 30.0 * 60.0);
        assert!((allen - (85.0 * 5.0 / 30.0)).abs() < 1e-6);
    }

    /// Drives the real per-block cadence (750 ms blocks, 30-minute stream)
    /// through [`allen_metric`] end to end, reproducing scenario F: a 5-minute
    /// segment at 85 dB inside 30 minutes otherwise at 70 dB, threshold 80 dB.
    #[test]
    fn allen_metric_reproduces_scenario_f_end_to_end() {
        let buffer_ms = 750u32;
        let total_seconds = 30.0 * 60.0;
        let block_seconds = buffer_ms as f64 / 1000.0;
        let n_blocks = (total_seconds / block_seconds).round() as usize;
        let loud_blocks = ((5.0 * 60.0) / block_seconds).round() as usize;
        let loud_start = (n_blocks - loud_blocks) / 2;

        let entries: Vec<LeqMLogEntry> = (0..n_blocks)
            .map(|i| {
                let db = if i >= loud_start && i < loud_start + loud_blocks {
                    85.0
                } else {
                    70.0
                };
                LeqMLogEntry {
                    start_seconds: i as f64 * block_seconds,
                    leq_m_db: db,
                }
            })
            .collect();

        let allen = allen_metric(&entries, 80.0, total_seconds);
        assert!((allen - (85.0 * 5.0 / 30.0)).abs() < 0.05);

        // The long-window (10-minute) series itself stays below the
        // threshold throughout, confirming Allen must key off the per-block
        // log rather than the window mean for this scenario.
        let long = long_window_series(&entries, buffer_ms, 10.0);
        assert!(long.iter().all(|e| e.mean_db < 80.0));
    }

    #[test]
    fn empty_log_yields_empty_series() {
        assert!(long_window_series(&[], 850, 10.0).is_empty());
    }
}
