//! Transcoded-PCM decode path via `symphonia`, feature-gated because
//! container decoding beyond WAV is a named non-goal of the measurement
//! core (spec.md §1 Non-goals) — the ambient stack still needs somewhere
//! to put it, the way `rf-offline`'s decoder module wraps `symphonia`.

use std::fs::File;
use std::path::Path;

use leqm_core::{AudioMeta, LeqmError, LeqmResult};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::source::SampleSource;

/// Decodes any `symphonia`-supported container to interleaved `f64` frames.
pub struct TranscodedSource {
    format: Box<dyn symphonia::core::formats::FormatReader>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    meta: AudioMeta,
    pending: std::collections::VecDeque<f64>,
}

impl TranscodedSource {
    pub fn open(path: impl AsRef<Path>) -> LeqmResult<Self> {
        let file = File::open(path.as_ref())?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.as_ref().extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LeqmError::DecoderFailure(e.to_string()))?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.sample_rate.is_some())
            .ok_or_else(|| LeqmError::DecoderFailure("no decodable track".into()))?;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| LeqmError::DecoderFailure(e.to_string()))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| LeqmError::DecoderFailure("unknown sample rate".into()))?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count())
            .ok_or_else(|| LeqmError::DecoderFailure("unknown channel layout".into()))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            meta: AudioMeta::new(sample_rate, channels),
            pending: std::collections::VecDeque::new(),
        })
    }

    fn decode_next_packet(&mut self) -> LeqmResult<bool> {
        let packet = loop {
            match self.format.next_packet() {
                Ok(p) if p.track_id() == self.track_id => break p,
                Ok(_) => continue,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false)
                }
                Err(e) => return Err(LeqmError::DecoderFailure(e.to_string())),
            }
        };

        let decoded = self
            .decoder
            .decode(&packet)
            .map_err(|e| LeqmError::DecoderFailure(e.to_string()))?;

        push_interleaved(&decoded, &mut self.pending);
        Ok(true)
    }
}

fn push_interleaved(decoded: &AudioBufferRef, out: &mut std::collections::VecDeque<f64>) {
    macro_rules! push_planes {
        ($buf:expr) => {{
            let spec = $buf.spec();
            let channels = spec.channels.count();
            let frames = $buf.frames();
            for f in 0..frames {
                for ch in 0..channels {
                    out.push_back($buf.chan(ch)[f] as f64);
                }
            }
        }};
    }

    match decoded {
        AudioBufferRef::F32(buf) => push_planes!(buf),
        AudioBufferRef::F64(buf) => push_planes!(buf),
        AudioBufferRef::S32(buf) => {
            let spec = buf.spec();
            let channels = spec.channels.count();
            for f in 0..buf.frames() {
                for ch in 0..channels {
                    out.push_back(buf.chan(ch)[f] as f64 / i32::MAX as f64);
                }
            }
        }
        AudioBufferRef::S16(buf) => {
            let spec = buf.spec();
            let channels = spec.channels.count();
            for f in 0..buf.frames() {
                for ch in 0..channels {
                    out.push_back(buf.chan(ch)[f] as f64 / i16::MAX as f64);
                }
            }
        }
        _ => {}
    }
}

impl SampleSource for TranscodedSource {
    fn meta(&self) -> AudioMeta {
        self.meta
    }

    fn next_block(&mut self, max_frames: usize) -> LeqmResult<Option<Vec<f64>>> {
        let channels = self.meta.channels;
        let max_samples = max_frames * channels;

        while self.pending.len() < max_samples {
            if !self.decode_next_packet()? {
                break;
            }
        }

        if self.pending.is_empty() {
            return Ok(None);
        }

        let n = max_samples.min(self.pending.len());
        Ok(Some(self.pending.drain(..n).collect()))
    }
}
