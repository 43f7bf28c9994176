//! Fixed physical constants shared across the engine.

/// Converts normalized digital RMS to dB SPL at the ISO calibration point
/// (a −20 dBFS sine corresponds to 83 dB SPL). Used by C9 and C11.
pub const REFERENCE_OFFSET_DB: f64 = 108.010299957;

/// Default absolute gate threshold for BS.1770 gating, in LUFS.
pub const DEFAULT_ABSOLUTE_GATE: f64 = -70.0;

/// Relative gate offset below the ungated mean, in LU.
pub const RELATIVE_GATE_OFFSET: f64 = -10.0;

/// Default speech-probability threshold for dialogue gating.
pub const DEFAULT_SPEECH_THRESHOLD: f64 = 0.33;

/// Default Allen-metric threshold, in dB.
pub const DEFAULT_ALLEN_THRESHOLD_DB: f64 = 80.0;

/// Default long-window period for the sliding Leq(M,10m) series, in minutes.
pub const DEFAULT_LONG_PERIOD_MINUTES: f64 = 10.0;

/// Default block size for the ungated worker, in milliseconds.
pub const DEFAULT_BUFFER_MS: u32 = 850;

/// Recommended block size for Allen-mode runs, in milliseconds.
pub const ALLEN_BUFFER_MS: u32 = 750;

/// Gated-block duration, in milliseconds (fixed by BS.1770, not configurable).
pub const GATING_BLOCK_MS: u32 = 400;

/// Default hop ratio for gated blocks (75% overlap, 100 ms hop).
pub const DEFAULT_HOP_RATIO: f64 = 0.25;

/// Default true-peak oversampling factor.
pub const DEFAULT_OVERSAMPLING: u32 = 4;
