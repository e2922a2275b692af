//! Decoded sample data and the decoder seam used by the sample cache.

mod decoder;
mod load_options;
mod resampler;

pub use decoder::{SampleDecoder, SymphoniaDecoder};
pub use load_options::LoadOptions;
pub use resampler::AudioResampler;

#[cfg(test)]
pub(crate) use decoder::tests as decoder_tests;

use crate::error::{Result, SoundError};
use std::sync::Arc;
use std::time::Duration;

/// A decoded chunk of PCM audio.
///
/// Samples are stored interleaved (`[L0, R0, L1, R1, ...]` for stereo).
/// Cloning is cheap: the sample buffer is shared, so the cache and every
/// mixer voice playing it hold the same allocation.
#[derive(Debug, Clone)]
pub struct SampleData {
    inner: Arc<SampleDataInner>,
}

#[derive(Debug)]
struct SampleDataInner {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
    total_frames: usize,
}

impl SampleData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let total_frames = samples.len() / channels as usize;
        let duration = if sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(total_frames as f64 / sample_rate as f64)
        };
        Self {
            inner: Arc::new(SampleDataInner {
                samples,
                sample_rate,
                channels,
                duration,
                total_frames,
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.total_frames == 0
    }

    /// Left/right pair for a frame. Mono is duplicated, extra channels ignored.
    #[inline]
    pub fn stereo_frame(&self, frame: usize) -> (f32, f32) {
        let channels = self.inner.channels as usize;
        let base = frame * channels;
        match self.inner.samples.get(base..base + channels) {
            Some([mono]) => (*mono, *mono),
            Some([left, right, ..]) => (*left, *right),
            _ => (0.0, 0.0),
        }
    }

    /// Convert to mono by downmixing all channels
    pub fn to_mono(&self) -> Self {
        if self.inner.channels == 1 {
            return self.clone();
        }

        let channels = self.inner.channels as usize;
        let mono_samples: Vec<f32> = self
            .inner
            .samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Self::new(mono_samples, self.inner.sample_rate, 1)
    }

    /// Resample to a different sample rate using rubato
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return Ok(Self::new(Vec::new(), target_sample_rate, self.inner.channels));
        }

        let resampler = AudioResampler::new(
            self.inner.sample_rate,
            target_sample_rate,
            self.inner.channels,
            Some(1024),
        )?;
        let resampled = resampler.resample_interleaved(&self.inner.samples)?;

        Ok(Self::new(resampled, target_sample_rate, self.inner.channels))
    }

    /// Applies mono conversion and resampling as requested by `options`.
    pub fn apply_options(self, options: &LoadOptions) -> Result<Self> {
        let data = if options.convert_to_mono {
            self.to_mono()
        } else {
            self
        };

        match options.target_sample_rate {
            Some(rate) if rate != data.sample_rate() => {
                if rate == 0 {
                    return Err(SoundError::AudioFormat(
                        "Target sample rate must be greater than 0".to_string(),
                    ));
                }
                data.resample(rate)
            }
            _ => Ok(data),
        }
    }
}
