//! The `SampleSource` collaborator contract (§4.12, §9 "Conditional audio
//! backends"): the core accepts any source that yields interleaved `f64`
//! frames, normalized to `[-1, 1]`.

use leqm_core::{AudioMeta, LeqmResult};

/// A decoded audio source. Implementations own their decode state; the
/// engine pulls blocks of frames until `next_block` returns `None`.
pub trait SampleSource {
    /// Stream metadata, known at construction time.
    fn meta(&self) -> AudioMeta;

    /// Pull up to `max_frames` frames (interleaved across `meta().channels`
    /// channels), or `None` at end of stream.
    fn next_block(&mut self, max_frames: usize) -> LeqmResult<Option<Vec<f64>>>;
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn meta(&self) -> AudioMeta {
        (**self).meta()
    }

    fn next_block(&mut self, max_frames: usize) -> LeqmResult<Option<Vec<f64>>> {
        (**self).next_block(max_frames)
    }
}
