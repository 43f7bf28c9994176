//! WAV decoding via `hound`, normalizing integer PCM to `[-1, 1]`.

use leqm_core::{AudioMeta, LeqmError, LeqmResult};
use std::path::Path;

use crate::source::SampleSource;

/// Mandatory decoder path: reads PCM int or float WAV files.
pub struct WavSource {
    reader: hound::WavReader<std::io::BufReader<std::fs::File>>,
    meta: AudioMeta,
    sample_format: hound::SampleFormat,
    bits_per_sample: u16,
}

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> LeqmResult<Self> {
        let reader = hound::WavReader::open(path.as_ref())
            .map_err(|e| LeqmError::DecoderFailure(e.to_string()))?;
        let spec = reader.spec();
        let frames = reader.duration() as u64;
        let meta = AudioMeta::new(spec.sample_rate, spec.channels as usize).with_frames(frames);

        Ok(Self {
            reader,
            meta,
            sample_format: spec.sample_format,
            bits_per_sample: spec.bits_per_sample,
        })
    }
}

impl SampleSource for WavSource {
    fn meta(&self) -> AudioMeta {
        self.meta
    }

    fn next_block(&mut self, max_frames: usize) -> LeqmResult<Option<Vec<f64>>> {
        let channels = self.meta.channels;
        let max_samples = max_frames * channels;
        let mut out = Vec::with_capacity(max_samples);

        match self.sample_format {
            hound::SampleFormat::Float => {
                let mut samples = self.reader.samples::<f32>();
                for _ in 0..max_samples {
                    match samples.next() {
                        Some(Ok(s)) => out.push(s as f64),
                        Some(Err(e)) => return Err(LeqmError::DecoderFailure(e.to_string())),
                        None => break,
                    }
                }
            }
            hound::SampleFormat::Int => {
                let full_scale = (1i64 << (self.bits_per_sample - 1)) as f64;
                let mut samples = self.reader.samples::<i32>();
                for _ in 0..max_samples {
                    match samples.next() {
                        Some(Ok(s)) => out.push(s as f64 / full_scale),
                        Some(Err(e)) => return Err(LeqmError::DecoderFailure(e.to_string())),
                        None => break,
                    }
                }
            }
        }

        if out.is_empty() {
            Ok(None)
        } else {
            Ok(Some(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_int16_normalizes_near_unity() {
        let full_scale = (1i64 << 15) as f64;
        assert!(((i16::MAX as f64) / full_scale - 1.0).abs() < 0.001);
    }
}
