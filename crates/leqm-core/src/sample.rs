//! Sample types and stream metadata

/// Type alias for audio samples (always f64 for maximum precision).
pub type Sample = f64;

/// Metadata describing a decoded stream, as handed to the engine by the
/// decoder collaborator.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioMeta {
    pub sample_rate: u32,
    pub channels: usize,
    /// Known frame count, if the source can report it up front.
    pub frames: Option<u64>,
}

impl AudioMeta {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
            frames: None,
        }
    }

    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = Some(frames);
        self
    }
}

/// Role a channel plays in a BS.1770 layout, determining its gating weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChannelRole {
    Left,
    Right,
    Center,
    LeftSurround,
    RightSurround,
    Lfe,
    /// Any other channel; treated with unity gain.
    Other,
}

impl ChannelRole {
    /// ITU-R BS.1770 channel weighting gain. LFE contributes zero.
    pub fn bs1770_gain(self) -> f64 {
        match self {
            ChannelRole::Left | ChannelRole::Right | ChannelRole::Center | ChannelRole::Other => {
                1.0
            }
            ChannelRole::LeftSurround | ChannelRole::RightSurround => 1.41,
            ChannelRole::Lfe => 0.0,
        }
    }

    /// Default channel layout for a given channel count, in the order a
    /// decoder would typically interleave them. Falls back to `Other` for
    /// layouts this table doesn't recognize.
    pub fn default_layout(channels: usize) -> Vec<ChannelRole> {
        match channels {
            1 => vec![ChannelRole::Center],
            2 => vec![ChannelRole::Left, ChannelRole::Right],
            6 => vec![
                ChannelRole::Left,
                ChannelRole::Right,
                ChannelRole::Center,
                ChannelRole::Lfe,
                ChannelRole::LeftSurround,
                ChannelRole::RightSurround,
            ],
            n => vec![ChannelRole::Other; n],
        }
    }
}
