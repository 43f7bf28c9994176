//! Shared data-model types (§3): gating pool entries, series records.

/// One worker's weighted-energy contribution to a single time block (§3
/// Block), keyed by that block's absolute start frame. Under `PerChannel`
/// scheduling a given time block is covered by one partial per channel;
/// under `PerTimePartition` scheduling a single partial already spans every
/// channel. The scheduler sums partials sharing a `start_frame` before
/// computing one Leq(M) series entry per block, independent of strategy.
#[derive(Debug, Clone, Copy)]
pub struct LeqBlockPartial {
    pub start_frame: u64,
    pub sum_weighted: f64,
    pub n_samples: u64,
}

/// One entry in the gating pool: a gated block's start frame, K-weighted
/// mean-square, and (if a speech classifier is attached) speech probability.
#[derive(Debug, Clone, Copy)]
pub struct GatingEntry {
    pub start_frame: u64,
    pub mean_square: f64,
    pub speech_prob: f64,
}

/// One entry of the per-block Leq(M) series.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct LeqMLogEntry {
    pub start_seconds: f64,
    pub leq_m_db: f64,
}

/// One entry of the sliding long-window Leq(M,10m) series.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct LeqM10Entry {
    pub start_seconds: f64,
    pub mean_db: f64,
}
