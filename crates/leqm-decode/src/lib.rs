//! leqm-decode: decoder collaborators that turn a file on disk into
//! interleaved `f64` frames the engine can consume.

mod calibration;
mod source;
mod wav;

#[cfg(feature = "transcode")]
mod transcode;

pub use calibration::CalibratedSource;
pub use source::SampleSource;
pub use wav::WavSource;

#[cfg(feature = "transcode")]
pub use transcode::TranscodedSource;
