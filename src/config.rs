//! Configuration for the sound engine

use crate::audio_data::LoadOptions;
use crate::error::{Result, SoundError};

/// Codec extensions handed to the loader when no table is configured.
pub const DEFAULT_EXTENSIONS: &[&str] = &["wav", "ogg", "flac", "mp3", "aiff", "aif"];

#[derive(Debug, Clone)]
pub struct SoundEngineDesc {
    /// Output sample rate in Hz. Decoded samples are resampled to it.
    pub sample_rate: u32,
    /// Frames per output block when an output stream is opened.
    pub block_size: usize,
    /// Output channel count (1 = mono, 2 = stereo).
    pub channels: u16,
    /// Number of mixing channels in the fixed pool.
    pub channel_count: usize,
    pub load_options: LoadOptions,
    /// Lowercase file extensions the loader will try to decode.
    pub supported_extensions: Vec<String>,
}

impl Default for SoundEngineDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 512,
            channels: 2,
            channel_count: 512,
            load_options: LoadOptions::default().target_sample_rate(48000),
            supported_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl SoundEngineDesc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also retargets the load options so cached samples match the mixer rate.
    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self.load_options.target_sample_rate = Some(rate);
        self
    }

    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    pub fn channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn channel_count(mut self, count: usize) -> Self {
        self.channel_count = count;
        self
    }

    pub fn load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    pub fn supported_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_extensions = extensions
            .into_iter()
            .map(|e| e.into().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(SoundError::Configuration(
                "Sample rate must be greater than 0".to_string(),
            ));
        }
        if self.channels == 0 {
            return Err(SoundError::Configuration(
                "Output channel count must be greater than 0".to_string(),
            ));
        }
        if self.channel_count == 0 {
            return Err(SoundError::Configuration(
                "Mixing channel pool must hold at least one channel".to_string(),
            ));
        }
        if self.channel_count > u16::MAX as usize {
            return Err(SoundError::Configuration(format!(
                "Mixing channel pool of {} exceeds the maximum of {}",
                self.channel_count,
                u16::MAX
            )));
        }
        Ok(())
    }
}
