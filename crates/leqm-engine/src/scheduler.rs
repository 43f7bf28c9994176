//! Block scheduler (C5): partitions the input into blocks and dispatches
//! them to workers while preserving per-channel filter-state continuity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::bounded;
use leqm_core::{AudioMeta, Sample, REFERENCE_OFFSET_DB};
use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::energy::GlobalEnergy;
use crate::types::{LeqBlockPartial, LeqMLogEntry};
use crate::worker::run_ungated_partition;

/// Partitioning strategy chosen by the scheduler's heuristic (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// One partition per channel; each channel is a single sequential
    /// stream with its own FilterState (no partition-boundary transients).
    PerChannel,
    /// `W` contiguous time partitions, each spanning all channels; filter
    /// continuity holds within a partition and restarts at partition
    /// boundaries (a short warm-up transient is accepted by design).
    PerTimePartition,
}

/// The scheduler's partitioning decision.
pub struct PartitionPlan {
    pub strategy: SchedulingStrategy,
    pub num_partitions: usize,
    /// `partition_to_worker[p]` is the worker thread index owning partition `p`.
    pub partition_to_worker: Vec<usize>,
}

impl PartitionPlan {
    /// Picks a strategy per the §4.5 heuristic: per-channel when there are
    /// at least as many channels as workers, otherwise per-time-partition
    /// with (effectively) `W` partitions shared across channels.
    pub fn choose(channels: usize, workers: usize) -> Self {
        let workers = workers.max(1);
        let channels = channels.max(1);
        if channels >= workers {
            let num_partitions = channels;
            let partition_to_worker = (0..num_partitions).map(|p| p % workers).collect();
            Self {
                strategy: SchedulingStrategy::PerChannel,
                num_partitions,
                partition_to_worker,
            }
        } else {
            let num_partitions = workers;
            let partition_to_worker = (0..num_partitions).collect();
            Self {
                strategy: SchedulingStrategy::PerTimePartition,
                num_partitions,
                partition_to_worker,
            }
        }
    }
}

/// A dispatched block descriptor: indexes into the shared sample buffer
/// rather than owning a private copy, since the whole stream is already
/// resident in memory by the time the scheduler runs.
#[derive(Debug, Clone, Copy)]
struct BlockDescriptor {
    partition: usize,
    sequence: u64,
    start_frame: u64,
    frame_count: usize,
}

/// Output of one scheduler run: the combined energy accumulator plus the
/// finished per-block Leq(M) series (C9), already combined across every
/// channel-partition that covers the same time block.
pub struct SchedulerOutput {
    pub global_energy: GlobalEnergy,
    pub leq_log: Vec<LeqMLogEntry>,
    pub truncated: bool,
}

/// Partitions `samples` (interleaved, `frames * channels` long) into blocks
/// and processes them across `config.resolved_worker_count()` OS threads.
pub fn run(
    samples: Arc<Vec<Sample>>,
    meta: AudioMeta,
    config: &EngineConfig,
    cancelled: Arc<AtomicBool>,
) -> SchedulerOutput {
    let channels = meta.channels;
    let total_frames = (samples.len() / channels) as u64;
    let workers = config.resolved_worker_count();
    let plan = PartitionPlan::choose(channels, workers);
    let block_frames = ((config.buffer_ms as u64 * meta.sample_rate as u64) / 1000).max(1) as usize;

    info!(
        "scheduler: {:?} strategy, {} partitions, {} workers, {} frame blocks",
        plan.strategy, plan.num_partitions, workers, block_frames
    );

    // Each partition's frame range: the whole stream for per-channel
    // scheduling (the "partition" IS the channel), or a contiguous 1/W
    // slice of the timeline for per-time-partition scheduling.
    let partition_ranges: Vec<(u64, u64)> = match plan.strategy {
        SchedulingStrategy::PerChannel => {
            vec![(0, total_frames); plan.num_partitions]
        }
        SchedulingStrategy::PerTimePartition => {
            let n = plan.num_partitions as u64;
            (0..n)
                .map(|p| {
                    let start = total_frames * p / n;
                    let end = total_frames * (p + 1) / n;
                    (start, end)
                })
                .collect()
        }
    };

    // Build every descriptor up front, then fan them out to per-worker
    // bounded channels (capacity 2 per worker, matching the "2*W blocks"
    // bound from §5) interleaving partitions round-robin so no partition
    // starves.
    let mut descriptors_by_partition: Vec<Vec<BlockDescriptor>> =
        vec![Vec::new(); plan.num_partitions];
    for (p, &(start, end)) in partition_ranges.iter().enumerate() {
        let mut seq = 0u64;
        let mut cursor = start;
        while cursor < end {
            let count = block_frames.min((end - cursor) as usize);
            descriptors_by_partition[p].push(BlockDescriptor {
                partition: p,
                sequence: seq,
                start_frame: cursor,
                frame_count: count,
            });
            cursor += count as u64;
            seq += 1;
        }
    }

    let global_energy = Arc::new(GlobalEnergy::new(channels));
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..workers)
        .map(|_| bounded::<BlockDescriptor>(2))
        .unzip();

    let samples_for_feeder = Arc::clone(&samples);
    let max_partition_len = descriptors_by_partition.iter().map(Vec::len).max().unwrap_or(0);
    let feeder = std::thread::spawn({
        let senders = senders.clone();
        let plan_partition_to_worker = plan.partition_to_worker.clone();
        move || {
            let _ = &samples_for_feeder;
            for round in 0..max_partition_len {
                for (p, descs) in descriptors_by_partition.iter().enumerate() {
                    if let Some(d) = descs.get(round) {
                        let worker = plan_partition_to_worker[p];
                        if senders[worker].send(*d).is_err() {
                            return;
                        }
                    }
                }
            }
            drop(senders);
        }
    });

    let mut handles = Vec::with_capacity(workers);
    for (w, receiver) in receivers.into_iter().enumerate() {
        let samples = Arc::clone(&samples);
        let global_energy = Arc::clone(&global_energy);
        let cancelled = Arc::clone(&cancelled);
        let strategy = plan.strategy;
        let config = config.clone();
        handles.push(std::thread::spawn(move || {
            let mut partitions = std::collections::HashMap::new();
            let mut leq_partials = Vec::new();
            while let Ok(desc) = receiver.recv() {
                if cancelled.load(Ordering::Relaxed) {
                    debug!("worker {w}: cancellation observed, draining");
                }
                run_ungated_partition(
                    desc.partition,
                    desc.sequence,
                    desc.start_frame,
                    desc.frame_count,
                    strategy,
                    channels,
                    meta.sample_rate,
                    &samples,
                    &config,
                    &global_energy,
                    &mut partitions,
                    &mut leq_partials,
                );
                if cancelled.load(Ordering::Relaxed) {
                    break;
                }
            }
            leq_partials
        }));
    }

    feeder.join().expect("scheduler feeder thread panicked");
    let mut all_partials = Vec::new();
    for h in handles {
        all_partials.extend(h.join().expect("scheduler worker thread panicked"));
    }
    let leq_log = combine_leq_partials(all_partials, meta.sample_rate);

    let truncated = cancelled.load(Ordering::Relaxed);
    if truncated {
        warn!("scheduler: run was cancelled, emitting truncated result");
    }

    let global_energy =
        Arc::try_unwrap(global_energy).unwrap_or_else(|_| panic!("dangling GlobalEnergy reference"));

    SchedulerOutput {
        global_energy,
        leq_log,
        truncated,
    }
}

/// Combines per-worker [`LeqBlockPartial`] contributions into one finished
/// series entry per time block (C9). Under `PerChannel` scheduling every
/// channel-partition emits a partial at each block's `start_frame`, so
/// grouping by `start_frame` sums the full-stream weighted energy for that
/// block across all channels before the dB conversion; under
/// `PerTimePartition` scheduling each partition already covers every channel
/// and owns a disjoint set of `start_frame`s, so the grouping is a no-op.
fn combine_leq_partials(partials: Vec<LeqBlockPartial>, sample_rate: u32) -> Vec<LeqMLogEntry> {
    let mut by_block: std::collections::BTreeMap<u64, (f64, u64)> = std::collections::BTreeMap::new();
    for p in partials {
        let entry = by_block.entry(p.start_frame).or_insert((0.0, 0));
        entry.0 += p.sum_weighted;
        entry.1 += p.n_samples;
    }
    by_block
        .into_iter()
        .map(|(start_frame, (sum_weighted, n_samples))| {
            let leq_m_db = if n_samples > 0 {
                let mean_square = sum_weighted / n_samples as f64;
                if mean_square > 0.0 {
                    20.0 * mean_square.sqrt().log10() + REFERENCE_OFFSET_DB
                } else {
                    f64::NEG_INFINITY
                }
            } else {
                f64::NEG_INFINITY
            };
            LeqMLogEntry {
                start_seconds: start_frame as f64 / sample_rate as f64,
                leq_m_db,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_channel_chosen_when_channels_meet_workers() {
        let plan = PartitionPlan::choose(8, 4);
        assert_eq!(plan.strategy, SchedulingStrategy::PerChannel);
        assert_eq!(plan.num_partitions, 8);
    }

    #[test]
    fn per_time_partition_chosen_when_workers_exceed_channels() {
        let plan = PartitionPlan::choose(2, 8);
        assert_eq!(plan.strategy, SchedulingStrategy::PerTimePartition);
        assert_eq!(plan.num_partitions, 8);
    }

    #[test]
    fn stereo_two_workers_is_per_channel() {
        let plan = PartitionPlan::choose(2, 2);
        assert_eq!(plan.strategy, SchedulingStrategy::PerChannel);
    }

    /// Under `PerChannel` scheduling, every channel-partition covers the
    /// whole stream and emits a partial at each block's `start_frame`; the
    /// combined series must still have exactly one entry per time block, not
    /// one per (channel, block) pair, and no duplicate `start_seconds`.
    #[test]
    fn per_channel_scheduling_emits_one_series_entry_per_block() {
        let sample_rate = 8000u32;
        let channels = 2usize;
        let seconds = 2.0;
        let n_frames = (sample_rate as f64 * seconds) as usize;
        let samples = Arc::new(vec![0.1f64; n_frames * channels]);
        let meta = AudioMeta::new(sample_rate, channels).with_frames(n_frames as u64);

        let mut config = EngineConfig::default();
        config.buffer_ms = 250;
        config.num_workers = Some(2);

        let output = run(samples, meta, &config, Arc::new(AtomicBool::new(false)));

        let block_frames = ((config.buffer_ms as u64 * sample_rate as u64) / 1000) as usize;
        let expected_blocks = (n_frames + block_frames - 1) / block_frames;
        assert_eq!(output.leq_log.len(), expected_blocks);

        let mut starts: Vec<f64> = output.leq_log.iter().map(|e| e.start_seconds).collect();
        let before = starts.len();
        starts.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        assert_eq!(starts.len(), before, "duplicate start_seconds in series");
    }
}
