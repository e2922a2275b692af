//! The mixing backend the engine drives.
//!
//! The engine talks to exactly one backend, chosen when it is constructed.
//! Backends own the per-channel voices and report finished channels through
//! the [`CompletionSender`] handed to them in
//! [`attach_completion`](MixerBackend::attach_completion), usually from their
//! own rendering thread.

mod software;

#[cfg(feature = "output")]
mod output;

pub use software::{SoftwareMixer, VoiceSnapshot};

#[cfg(feature = "output")]
pub use output::OutputStream;

use crate::audio_data::SampleData;
use crate::channel_pool::ChannelId;
use crate::completion::CompletionSender;
use crate::error::Result;
use crate::positional::ChannelSpatial;
use std::time::Duration;

/// Largest channel volume; the engine's normalized volume scale is `0..=128`.
pub const MAX_VOLUME: u8 = 128;

/// Settings a voice starts with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Extra repetitions: `0` plays once, `-1` repeats forever.
    pub loops: i32,
    /// Ramp up from silence over this long. Zero starts at full level.
    pub fade_in: Duration,
    pub volume: u8,
    pub spatial: ChannelSpatial,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            loops: 0,
            fade_in: Duration::ZERO,
            volume: MAX_VOLUME,
            spatial: ChannelSpatial::NEUTRAL,
        }
    }
}

impl VoiceParams {
    pub fn loops(mut self, loops: i32) -> Self {
        self.loops = loops;
        self
    }

    pub fn fade_in(mut self, fade_in: Duration) -> Self {
        self.fade_in = fade_in;
        self
    }

    pub fn volume(mut self, volume: u8) -> Self {
        self.volume = volume;
        self
    }

    pub fn spatial(mut self, spatial: ChannelSpatial) -> Self {
        self.spatial = spatial;
        self
    }
}

pub trait MixerBackend: Send {
    /// Installs the sink used to report finished channels.
    fn attach_completion(&mut self, sink: CompletionSender);

    /// Starts `sample` on `channel` with the given initial voice settings.
    fn play(&mut self, channel: ChannelId, sample: SampleData, params: VoiceParams) -> Result<()>;

    /// Stops `channel` immediately. The channel is still reported as finished.
    fn halt(&mut self, channel: ChannelId);

    /// Fades `channel` to silence over `duration`, then finishes it.
    fn fade_out(&mut self, channel: ChannelId, duration: Duration);

    fn pause(&mut self, channel: ChannelId);

    fn resume(&mut self, channel: ChannelId);

    /// Sets the channel volume in `0..=MAX_VOLUME`.
    fn set_volume(&mut self, channel: ChannelId, volume: u8);

    fn set_spatial(&mut self, channel: ChannelId, spatial: ChannelSpatial);

    /// Stops every channel.
    fn halt_all(&mut self);
}
