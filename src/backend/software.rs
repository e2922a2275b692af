use super::{MAX_VOLUME, MixerBackend, VoiceParams};
use crate::audio_data::SampleData;
use crate::channel_pool::ChannelId;
use crate::completion::CompletionSender;
use crate::error::{Result, SoundError};
use crate::positional::ChannelSpatial;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::Duration;

/// Linear gain ramp measured in output frames.
#[derive(Debug, Clone)]
struct Fade {
    from: f32,
    to: f32,
    total: usize,
    elapsed: usize,
    finish_when_done: bool,
}

impl Fade {
    fn gain(&self) -> f32 {
        if self.total == 0 {
            return self.to;
        }
        let t = self.elapsed.min(self.total) as f32 / self.total as f32;
        self.from + (self.to - self.from) * t
    }

    fn is_done(&self) -> bool {
        self.elapsed >= self.total
    }
}

#[derive(Debug)]
struct Voice {
    channel: ChannelId,
    data: SampleData,
    cursor: usize,
    loops_remaining: i32,
    volume: u8,
    spatial: ChannelSpatial,
    paused: bool,
    fade: Option<Fade>,
}

impl Voice {
    /// Mixes up to `frames` frames into `out`. Returns true once the voice
    /// has nothing left to play.
    fn mix_into(&mut self, out: &mut [f32], channels: usize, frames: usize) -> bool {
        let total = self.data.total_frames();
        if total == 0 {
            return true;
        }

        let base_gain = self.volume as f32 / MAX_VOLUME as f32
            * (1.0 - self.spatial.distance as f32 / 255.0);
        let left_gain = self.spatial.left as f32 / 255.0;
        let right_gain = self.spatial.right as f32 / 255.0;

        for frame in 0..frames {
            if self.cursor >= total {
                if self.loops_remaining == 0 {
                    return true;
                }
                if self.loops_remaining > 0 {
                    self.loops_remaining -= 1;
                }
                self.cursor = 0;
            }

            if let Some(fade) = &self.fade {
                if fade.is_done() {
                    if fade.finish_when_done {
                        return true;
                    }
                    self.fade = None;
                }
            }
            let fade_gain = match self.fade.as_mut() {
                Some(fade) => {
                    let gain = fade.gain();
                    fade.elapsed += 1;
                    gain
                }
                None => 1.0,
            };

            let gain = base_gain * fade_gain;
            let (left, right) = self.data.stereo_frame(self.cursor);
            let out_frame = &mut out[frame * channels..(frame + 1) * channels];
            if channels == 1 {
                out_frame[0] += (left * left_gain + right * right_gain) * 0.5 * gain;
            } else {
                out_frame[0] += left * left_gain * gain;
                out_frame[1] += right * right_gain * gain;
            }

            self.cursor += 1;
        }

        self.cursor >= total && self.loops_remaining == 0
    }

    fn current_fade_gain(&self) -> f32 {
        self.fade.as_ref().map_or(1.0, Fade::gain)
    }
}

/// Read-only view of a voice, for inspection and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSnapshot {
    pub channel: ChannelId,
    pub volume: u8,
    pub spatial: ChannelSpatial,
    pub paused: bool,
    pub loops_remaining: i32,
    pub cursor: usize,
    pub fading_out: bool,
}

#[derive(Debug)]
struct MixerState {
    voices: Vec<Option<Voice>>,
    sink: Option<CompletionSender>,
    sample_rate: u32,
}

impl MixerState {
    fn voice_mut(&mut self, channel: ChannelId) -> Option<&mut Voice> {
        self.voices
            .get_mut(channel.index())
            .and_then(Option::as_mut)
            .filter(|voice| voice.channel == channel)
    }

    fn finish(&mut self, channel: ChannelId) {
        let Some(slot) = self.voices.get_mut(channel.index()) else {
            return;
        };
        if slot.as_ref().is_some_and(|voice| voice.channel == channel) {
            *slot = None;
            if let Some(sink) = &self.sink {
                sink.notify(channel);
            }
        }
    }

    fn frames_for(&self, duration: Duration) -> usize {
        ((duration.as_secs_f64() * self.sample_rate as f64).round() as usize).max(1)
    }
}

/// In-process channel mixer.
///
/// Holds one voice per channel index. The engine configures voices from the
/// update thread; [`render`](SoftwareMixer::render) runs on the audio thread,
/// mixes every active voice and reports voices that ran out through the
/// completion sink. Clones share the same voice table.
#[derive(Debug, Clone)]
pub struct SoftwareMixer {
    state: Arc<Mutex<MixerState>>,
}

impl SoftwareMixer {
    pub fn new(channel_count: usize, sample_rate: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MixerState {
                voices: (0..channel_count).map(|_| None).collect(),
                sink: None,
                sample_rate,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MixerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mixes all active voices into `buffer` (interleaved, `channels` wide).
    ///
    /// Never blocks: if the engine is holding the voice table this block is
    /// rendered as silence. Returns the number of frames rendered.
    pub fn render(&self, buffer: &mut [f32], channels: u16) -> usize {
        buffer.fill(0.0);

        let mut guard = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                log::debug!("Mixer busy, rendering silence");
                return 0;
            }
        };

        let channels = channels.max(1) as usize;
        let frames = buffer.len() / channels;
        let state = &mut *guard;

        for slot in state.voices.iter_mut() {
            let Some(voice) = slot.as_mut() else {
                continue;
            };
            if voice.paused {
                continue;
            }
            if voice.mix_into(buffer, channels, frames) {
                let channel = voice.channel;
                *slot = None;
                if let Some(sink) = &state.sink {
                    sink.notify(channel);
                }
            }
        }

        frames
    }

    pub fn voice(&self, index: usize) -> Option<VoiceSnapshot> {
        let state = self.lock();
        state
            .voices
            .get(index)
            .and_then(Option::as_ref)
            .map(|voice| VoiceSnapshot {
                channel: voice.channel,
                volume: voice.volume,
                spatial: voice.spatial,
                paused: voice.paused,
                loops_remaining: voice.loops_remaining,
                cursor: voice.cursor,
                fading_out: voice.fade.as_ref().is_some_and(|f| f.finish_when_done),
            })
    }

    pub fn active_voices(&self) -> usize {
        self.lock().voices.iter().filter(|v| v.is_some()).count()
    }

    pub fn sample_rate(&self) -> u32 {
        self.lock().sample_rate
    }
}

impl MixerBackend for SoftwareMixer {
    fn attach_completion(&mut self, sink: CompletionSender) {
        self.lock().sink = Some(sink);
    }

    fn play(&mut self, channel: ChannelId, sample: SampleData, params: VoiceParams) -> Result<()> {
        let mut state = self.lock();
        let fade = (!params.fade_in.is_zero()).then(|| Fade {
            from: 0.0,
            to: 1.0,
            total: state.frames_for(params.fade_in),
            elapsed: 0,
            finish_when_done: false,
        });

        let slot = state.voices.get_mut(channel.index()).ok_or_else(|| {
            SoundError::Engine(format!("{} is outside the mixer's voice table", channel))
        })?;
        if let Some(previous) = slot.as_ref() {
            log::debug!(
                "{} replaces a voice still held by {}",
                channel,
                previous.channel
            );
        }
        *slot = Some(Voice {
            channel,
            data: sample,
            cursor: 0,
            loops_remaining: params.loops.max(-1),
            volume: params.volume.min(MAX_VOLUME),
            spatial: params.spatial,
            paused: false,
            fade,
        });
        Ok(())
    }

    fn halt(&mut self, channel: ChannelId) {
        self.lock().finish(channel);
    }

    fn fade_out(&mut self, channel: ChannelId, duration: Duration) {
        let mut state = self.lock();
        if duration.is_zero() {
            state.finish(channel);
            return;
        }
        let total = state.frames_for(duration);
        if let Some(voice) = state.voice_mut(channel) {
            voice.fade = Some(Fade {
                from: voice.current_fade_gain(),
                to: 0.0,
                total,
                elapsed: 0,
                finish_when_done: true,
            });
        }
    }

    fn pause(&mut self, channel: ChannelId) {
        if let Some(voice) = self.lock().voice_mut(channel) {
            voice.paused = true;
        }
    }

    fn resume(&mut self, channel: ChannelId) {
        if let Some(voice) = self.lock().voice_mut(channel) {
            voice.paused = false;
        }
    }

    fn set_volume(&mut self, channel: ChannelId, volume: u8) {
        if let Some(voice) = self.lock().voice_mut(channel) {
            voice.volume = volume.min(MAX_VOLUME);
        }
    }

    fn set_spatial(&mut self, channel: ChannelId, spatial: ChannelSpatial) {
        if let Some(voice) = self.lock().voice_mut(channel) {
            voice.spatial = spatial;
        }
    }

    fn halt_all(&mut self) {
        let mut state = self.lock();
        let state = &mut *state;
        for slot in state.voices.iter_mut() {
            if let Some(voice) = slot.take() {
                if let Some(sink) = &state.sink {
                    sink.notify(voice.channel);
                }
            }
        }
    }
}
