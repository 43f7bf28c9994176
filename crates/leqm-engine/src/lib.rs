//! leqm-engine: scheduling, accumulation, gating and reduction for the
//! Leq(M) / LKFS loudness engine.

mod config;
mod energy;
mod engine;
mod gating;
mod reducer;
mod scheduler;
mod series;
mod types;
mod worker;

pub use config::{EngineConfig, GatingMode};
pub use energy::{ChannelEnergy, EnergyDelta, GlobalEnergy};
pub use engine::{ChannelStat, LkfsOutcome, LoudnessEngine, MeasurementOutcome};
pub use gating::GatingResult;
pub use reducer::ReducedMeasurements;
pub use scheduler::{PartitionPlan, SchedulingStrategy};
pub use series::{allen_metric, long_window_series};
pub use types::{GatingEntry, LeqM10Entry, LeqMLogEntry};
pub use worker::SpeechClassifier;
