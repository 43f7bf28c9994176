//! Top-level orchestrator: decode → schedule → gate → reduce.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use leqm_core::{AudioMeta, LeqmError, LeqmResult, REFERENCE_OFFSET_DB};
use leqm_decode::SampleSource;
use leqm_dsp::{coeffs, OversampleFactor, TruePeakEstimator};
use log::{info, warn};

use crate::config::EngineConfig;
use crate::energy::ChannelEnergy;
use crate::gating::{self, GatingResult};
use crate::reducer::{self, ReducedMeasurements};
use crate::scheduler;
use crate::series;
use crate::types::{LeqM10Entry, LeqMLogEntry};
use crate::worker::{run_gated_pass, SpeechClassifier};

/// Per-channel summary statistics for the output report.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ChannelStat {
    pub channel: usize,
    pub peak_db: f64,
    pub average_db: f64,
}

/// Result of a gated (BS.1770) analysis pass.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct LkfsOutcome {
    pub lkfs: Option<f64>,
    pub below_floor: bool,
    pub surviving_blocks: usize,
    pub total_blocks: usize,
}

impl From<GatingResult> for LkfsOutcome {
    fn from(r: GatingResult) -> Self {
        Self {
            lkfs: r.lkfs,
            below_floor: r.lkfs.is_none(),
            surviving_blocks: r.surviving_blocks,
            total_blocks: r.total_blocks,
        }
    }
}

/// Complete output of one measurement run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MeasurementOutcome {
    pub meta: AudioMeta,
    pub measurements: ReducedMeasurements,
    pub channel_stats: Vec<ChannelStat>,
    pub true_peak_db: Option<Vec<f64>>,
    pub leq_m_log: Option<Vec<LeqMLogEntry>>,
    pub leq_m10_log: Option<Vec<LeqM10Entry>>,
    pub allen_metric: Option<f64>,
    pub lkfs: Option<LkfsOutcome>,
    pub truncated: bool,
    pub silent: bool,
}

/// The non-real-time Leq(M) loudness engine.
pub struct LoudnessEngine {
    config: EngineConfig,
    /// Dialogue classifier collaborator (§9 Open Question #3); `None`
    /// degrades dialogue gating to plain absolute+relative gating.
    speech_classifier: Option<Box<dyn SpeechClassifier>>,
}

impl LoudnessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            speech_classifier: None,
        }
    }

    pub fn with_speech_classifier(mut self, classifier: Box<dyn SpeechClassifier>) -> Self {
        self.speech_classifier = Some(classifier);
        self
    }

    /// Runs the full measurement pipeline against `source` to completion
    /// (or until `cancelled` is observed).
    pub fn run(
        &self,
        source: &mut dyn SampleSource,
        cancelled: Arc<AtomicBool>,
    ) -> LeqmResult<MeasurementOutcome> {
        let meta = source.meta();
        if meta.channels == 0 {
            return Err(LeqmError::ChannelCountMismatch {
                expected: 1,
                got: 0,
            });
        }
        // Fail fast per C2: never silently substitute a wrong table.
        coeffs::m_weight_for_rate(meta.sample_rate)?;
        if self.config.lkfs || self.config.dolby_di {
            coeffs::k_weight_for_rate(meta.sample_rate)?;
        }

        let samples = Arc::new(decode_all(source)?);
        if samples.is_empty() {
            return Err(LeqmError::InsufficientData);
        }
        let meta = meta.with_frames((samples.len() / meta.channels) as u64);

        info!(
            "engine: decoded {} frames, {} channels, {} Hz",
            samples.len() / meta.channels,
            meta.channels,
            meta.sample_rate
        );

        let output = scheduler::run(Arc::clone(&samples), meta, &self.config, Arc::clone(&cancelled));

        let totals = output.global_energy.finalize();
        for e in &totals {
            if e.sum_weighted.is_nan() || e.sum_unweighted.is_nan() {
                return Err(LeqmError::NumericFailure(
                    "NaN encountered in energy accumulator".into(),
                ));
            }
        }

        let measurements = reducer::reduce(&totals, self.config.leq_no_weight);
        let silent = totals.iter().all(|c| c.n_samples == 0 || c.peak_abs == 0.0);

        let channel_stats = channel_stats(&totals);

        let true_peak_db = if self.config.true_peak {
            Some(compute_true_peak(&samples, &meta, &self.config)?)
        } else {
            None
        };

        let (leq_m_log, leq_m10_log, allen_metric) = if self.config.log_leqm || self.config.log_leqm10
        {
            let total_seconds = (samples.len() / meta.channels) as f64 / meta.sample_rate as f64;
            let long = if self.config.log_leqm10 {
                Some(series::long_window_series(
                    &output.leq_log,
                    self.config.buffer_ms,
                    self.config.long_period_minutes,
                ))
            } else {
                None
            };
            let allen = self.config.log_leqm10.then(|| {
                series::allen_metric(&output.leq_log, self.config.allen_threshold_db, total_seconds)
            });
            let log = self.config.log_leqm.then(|| output.leq_log.clone());
            (log, long, allen)
        } else {
            (None, None, None)
        };

        let lkfs = if self.config.lkfs || self.config.dolby_di {
            let classifier = self.speech_classifier.as_deref();
            Some(self.run_gating(&samples, &meta, classifier)?)
        } else {
            None
        };

        if cancelled.load(Ordering::Relaxed) || output.truncated {
            warn!("engine: run truncated by cancellation");
        }

        Ok(MeasurementOutcome {
            meta,
            measurements,
            channel_stats,
            true_peak_db,
            leq_m_log,
            leq_m10_log,
            allen_metric,
            lkfs,
            truncated: output.truncated,
            silent,
        })
    }

    fn run_gating(
        &self,
        samples: &[f64],
        meta: &AudioMeta,
        classifier: Option<&dyn SpeechClassifier>,
    ) -> LeqmResult<LkfsOutcome> {
        let pool = run_gated_pass(
            samples,
            meta.channels,
            meta.sample_rate,
            self.config.hop_ratio,
            classifier,
        );
        Ok(gating::apply(&pool, &self.config).into())
    }
}

fn decode_all(source: &mut dyn SampleSource) -> LeqmResult<Vec<f64>> {
    let mut all = Vec::new();
    const CHUNK_FRAMES: usize = 65536;
    while let Some(chunk) = source.next_block(CHUNK_FRAMES)? {
        all.extend(chunk);
    }
    Ok(all)
}

fn channel_stats(totals: &[ChannelEnergy]) -> Vec<ChannelStat> {
    totals
        .iter()
        .enumerate()
        .map(|(channel, e)| {
            let peak_db = if e.peak_abs > 0.0 {
                20.0 * e.peak_abs.log10() + REFERENCE_OFFSET_DB
            } else {
                f64::NEG_INFINITY
            };
            let average_db = if e.n_samples > 0 {
                let mean_power = e.sum_weighted / e.n_samples as f64;
                if mean_power > 0.0 {
                    20.0 * mean_power.sqrt().log10() + REFERENCE_OFFSET_DB
                } else {
                    f64::NEG_INFINITY
                }
            } else {
                f64::NEG_INFINITY
            };
            ChannelStat {
                channel,
                peak_db: reducer::round4(peak_db),
                average_db: reducer::round4(average_db),
            }
        })
        .collect()
}

fn compute_true_peak(samples: &[f64], meta: &AudioMeta, config: &EngineConfig) -> LeqmResult<Vec<f64>> {
    let factor = OversampleFactor::from_u32(config.oversampling)
        .ok_or_else(|| LeqmError::NumericFailure(format!("unsupported oversampling factor {}", config.oversampling)))?;
    let mut estimator = TruePeakEstimator::new(factor, meta.channels);
    let frames = samples.len() / meta.channels;
    for f in 0..frames {
        for ch in 0..meta.channels {
            estimator.process(ch, samples[f * meta.channels + ch]);
        }
    }
    Ok((0..meta.channels)
        .map(|ch| reducer::round4(estimator.true_peak_db(ch)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct FixedSource {
        meta: AudioMeta,
        blocks: VecDeque<Vec<f64>>,
    }

    impl SampleSource for FixedSource {
        fn meta(&self) -> AudioMeta {
            self.meta
        }
        fn next_block(&mut self, _max_frames: usize) -> LeqmResult<Option<Vec<f64>>> {
            Ok(self.blocks.pop_front())
        }
    }

    fn sine_source(seconds: f64, amplitude: f64, channels: usize) -> FixedSource {
        let sample_rate = 48000u32;
        let n = (seconds * sample_rate as f64) as usize;
        let mut samples = Vec::with_capacity(n * channels);
        for i in 0..n {
            let x = amplitude * (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / sample_rate as f64).sin();
            for _ in 0..channels {
                samples.push(x);
            }
        }
        FixedSource {
            meta: AudioMeta::new(sample_rate, channels),
            blocks: VecDeque::from(vec![samples]),
        }
    }

    #[test]
    fn full_scale_sine_produces_finite_leq_m() {
        let mut src = sine_source(2.0, 1.0, 2);
        let engine = LoudnessEngine::new(EngineConfig::default());
        let outcome = engine
            .run(&mut src, Arc::new(AtomicBool::new(false)))
            .unwrap();
        assert!(outcome.measurements.leq_m.is_finite());
    }

    #[test]
    fn silence_never_produces_nan() {
        let mut src = sine_source(1.0, 0.0, 1);
        let engine = LoudnessEngine::new(EngineConfig::default());
        let outcome = engine
            .run(&mut src, Arc::new(AtomicBool::new(false)))
            .unwrap();
        assert!(!outcome.measurements.leq_m.is_nan());
        assert!(outcome.silent);
    }

    #[test]
    fn unsupported_sample_rate_is_rejected() {
        let mut src = FixedSource {
            meta: AudioMeta::new(22050, 1),
            blocks: VecDeque::from(vec![vec![0.1; 100]]),
        };
        let engine = LoudnessEngine::new(EngineConfig::default());
        let err = engine
            .run(&mut src, Arc::new(AtomicBool::new(false)))
            .unwrap_err();
        assert!(matches!(err, LeqmError::UnsupportedSampleRate(22050)));
    }

    #[test]
    fn doubling_amplitude_increases_leq_m_by_6_02_db() {
        let engine = LoudnessEngine::new(EngineConfig::default());

        let mut quiet = sine_source(1.0, 0.1, 1);
        let a = engine
            .run(&mut quiet, Arc::new(AtomicBool::new(false)))
            .unwrap();

        let mut loud = sine_source(1.0, 0.2, 1);
        let b = engine
            .run(&mut loud, Arc::new(AtomicBool::new(false)))
            .unwrap();

        assert!((b.measurements.leq_m - a.measurements.leq_m - 20.0 * 2f64.log10()).abs() < 0.05);
    }
}
