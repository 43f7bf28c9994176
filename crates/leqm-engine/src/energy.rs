//! Energy accumulator (C4): per-channel and global sums of squared samples.

use parking_lot::Mutex;

/// Per-channel accumulator a worker fills locally for the duration of one
/// block, then commits once.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelEnergy {
    pub sum_weighted: f64,
    pub sum_unweighted: f64,
    pub peak_abs: f64,
    pub n_samples: u64,
}

impl ChannelEnergy {
    pub fn accumulate(&mut self, raw: f64, weighted: f64) {
        self.sum_weighted += weighted * weighted;
        self.sum_unweighted += raw * raw;
        let abs = raw.abs();
        if abs > self.peak_abs {
            self.peak_abs = abs;
        }
        self.n_samples += 1;
    }

    fn merge(&mut self, other: &ChannelEnergy) {
        self.sum_weighted += other.sum_weighted;
        self.sum_unweighted += other.sum_unweighted;
        if other.peak_abs > self.peak_abs {
            self.peak_abs = other.peak_abs;
        }
        self.n_samples += other.n_samples;
    }
}

/// A worker's complete per-block contribution: one (global channel index,
/// [`ChannelEnergy`]) pair per channel it touched, tagged with the
/// originating partition for deterministic commit ordering. Per-channel
/// scheduling contributes a single entry per block; per-time-partition
/// scheduling contributes one entry per global channel.
#[derive(Debug, Clone)]
pub struct EnergyDelta {
    pub partition: usize,
    pub sequence: u64,
    pub channels: Vec<(usize, ChannelEnergy)>,
}

struct GlobalEnergyInner {
    per_channel: Vec<ChannelEnergy>,
    /// Pending deltas kept until final reduction, so summation can be
    /// ordered by partition index for floating-point reproducibility
    /// (§9, Floating-point associativity).
    pending: Vec<EnergyDelta>,
}

/// Aggregate over all channels, mutated by workers under a single lock and
/// read once at the end by the reducer.
pub struct GlobalEnergy {
    inner: Mutex<GlobalEnergyInner>,
    channels: usize,
}

impl GlobalEnergy {
    pub fn new(channels: usize) -> Self {
        Self {
            inner: Mutex::new(GlobalEnergyInner {
                per_channel: vec![ChannelEnergy::default(); channels],
                pending: Vec::new(),
            }),
            channels,
        }
    }

    /// Merge one worker's per-block delta into the global accumulator.
    /// The critical section is short: a per-channel add and a push to the
    /// pending-deltas list. No per-sample locking.
    pub fn commit(&self, delta: EnergyDelta) {
        let mut inner = self.inner.lock();
        for (idx, d) in &delta.channels {
            inner.per_channel[*idx].merge(d);
        }
        inner.pending.push(delta);
    }

    /// Final per-channel sums, after sorting committed deltas by partition
    /// index and re-summing from scratch for a reproducible order
    /// independent of worker completion order.
    pub fn finalize(&self) -> Vec<ChannelEnergy> {
        let mut inner = self.inner.lock();
        inner.pending.sort_by_key(|d| (d.partition, d.sequence));

        let mut totals = vec![ChannelEnergy::default(); self.channels];
        for delta in &inner.pending {
            for (idx, d) in &delta.channels {
                totals[*idx].merge(d);
            }
        }
        totals
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(partition: usize, sequence: u64, weighted: f64) -> EnergyDelta {
        let mut ch = ChannelEnergy::default();
        ch.accumulate(weighted, weighted);
        EnergyDelta {
            partition,
            sequence,
            channels: vec![(0, ch)],
        }
    }

    #[test]
    fn commit_order_does_not_affect_totals() {
        let a = GlobalEnergy::new(1);
        a.commit(delta(0, 0, 0.5));
        a.commit(delta(1, 0, 0.25));

        let b = GlobalEnergy::new(1);
        b.commit(delta(1, 0, 0.25));
        b.commit(delta(0, 0, 0.5));

        let fa = a.finalize();
        let fb = b.finalize();
        assert_eq!(fa[0].sum_weighted, fb[0].sum_weighted);
        assert_eq!(fa[0].n_samples, fb[0].n_samples);
    }

    #[test]
    fn peak_abs_tracks_maximum() {
        let mut ch = ChannelEnergy::default();
        ch.accumulate(-0.8, -0.8);
        ch.accumulate(0.3, 0.3);
        assert_eq!(ch.peak_abs, 0.8);
    }
}
