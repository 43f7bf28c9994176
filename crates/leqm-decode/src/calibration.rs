//! Per-channel calibration adapter (§6 Input): scales channels before
//! samples reach the scheduler, so the engine itself never has to know
//! about calibration.

use leqm_core::{AudioMeta, LeqmResult};

use crate::source::SampleSource;

/// Wraps any [`SampleSource`], applying a linear per-channel gain vector.
pub struct CalibratedSource<S> {
    inner: S,
    gains: Vec<f64>,
}

impl<S: SampleSource> CalibratedSource<S> {
    /// `gains_db` is one calibration gain in dB per channel; shorter than
    /// the channel count defaults the remainder to unity.
    pub fn new(inner: S, gains_db: &[f64]) -> Self {
        let channels = inner.meta().channels;
        let gains = (0..channels)
            .map(|ch| gains_db.get(ch).map(|db| 10f64.powf(db / 20.0)).unwrap_or(1.0))
            .collect();
        Self { inner, gains }
    }
}

impl<S: SampleSource> SampleSource for CalibratedSource<S> {
    fn meta(&self) -> AudioMeta {
        self.inner.meta()
    }

    fn next_block(&mut self, max_frames: usize) -> LeqmResult<Option<Vec<f64>>> {
        let channels = self.meta().channels;
        match self.inner.next_block(max_frames)? {
            Some(mut samples) => {
                for (i, s) in samples.iter_mut().enumerate() {
                    *s *= self.gains[i % channels];
                }
                Ok(Some(samples))
            }
            None => Ok(None),
        }
    }
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

    #[test]
    fn applies_per_channel_gain() {
        let src = FixedSource {
            meta: AudioMeta::new(48000, 2),
            blocks: VecDeque::from(vec![vec![1.0, 1.0]]),
        };
        let mut cal = CalibratedSource::new(src, &[0.0, 6.0206]);
        let block = cal.next_block(1).unwrap().unwrap();
        assert!((block[0] - 1.0).abs() < 1e-6);
        assert!((block[1] - 2.0).abs() < 1e-3);
    }
}
