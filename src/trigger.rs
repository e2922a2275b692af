//! Static trigger descriptors.
//!
//! A trigger is authored once and executed many times against audio objects.
//! The engine stores each one in an arena slot together with the number of
//! playback instances still referring to it, so destroying a trigger while
//! it is playing is deferred until the last instance has finished.

use crate::arena::Handle;
use crate::backend::MAX_VOLUME;
use crate::cache::SampleId;
use crate::positional::Attenuation;
use std::time::Duration;

pub type TriggerId = Handle<TriggerSlot>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActionType {
    #[default]
    Start,
    Stop,
    Pause,
    Resume,
}

impl ActionType {
    /// Parses an authoring tag. Unknown tags start playback.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "start" | "play" => Self::Start,
            "stop" => Self::Stop,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            other => {
                log::debug!("Unknown trigger tag '{}', treating it as start", other);
                Self::Start
            }
        }
    }
}

/// Trigger description as handed over by the authoring layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerDesc {
    pub tag: String,
    pub file_name: String,
    pub path: Option<String>,
    pub attenuation_enabled: bool,
    pub min_attenuation: f32,
    pub max_attenuation: f32,
    pub panning: bool,
    /// Gain in decibels; `0.0` is unity.
    pub volume_db: f32,
    /// Total number of plays. `1` plays once, `0` or less repeats forever.
    pub loop_count: i32,
    pub fade_in_secs: f32,
    pub fade_out_secs: f32,
}

impl Default for TriggerDesc {
    fn default() -> Self {
        Self {
            tag: "start".to_string(),
            file_name: String::new(),
            path: None,
            attenuation_enabled: false,
            min_attenuation: 0.0,
            max_attenuation: 0.0,
            panning: false,
            volume_db: 0.0,
            loop_count: 1,
            fade_in_secs: 0.0,
            fade_out_secs: 0.0,
        }
    }
}

impl TriggerDesc {
    pub fn new(tag: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn attenuation(mut self, min: f32, max: f32) -> Self {
        self.attenuation_enabled = true;
        self.min_attenuation = min;
        self.max_attenuation = max;
        self
    }

    pub fn panning(mut self, enabled: bool) -> Self {
        self.panning = enabled;
        self
    }

    pub fn volume_db(mut self, db: f32) -> Self {
        self.volume_db = db;
        self
    }

    pub fn loop_count(mut self, count: i32) -> Self {
        self.loop_count = count;
        self
    }

    pub fn fade_in(mut self, secs: f32) -> Self {
        self.fade_in_secs = secs;
        self
    }

    pub fn fade_out(mut self, secs: f32) -> Self {
        self.fade_out_secs = secs;
        self
    }

    pub fn action(&self) -> ActionType {
        ActionType::from_tag(&self.tag)
    }

    /// The file name joined onto the optional directory.
    pub fn sample_path(&self) -> String {
        match self.path.as_deref().map(|p| p.trim_end_matches(['/', '\\'])) {
            Some(dir) if !dir.is_empty() => format!("{}/{}", dir, self.file_name),
            _ => self.file_name.clone(),
        }
    }
}

/// Converts decibels to the `0..=128` channel volume scale.
pub fn db_to_volume(db: f32) -> u8 {
    (10f32.powf(db / 20.0) * MAX_VOLUME as f32)
        .round()
        .clamp(0.0, MAX_VOLUME as f32) as u8
}

/// Converts an authored total play count into the mixer's repeat count.
pub fn engine_loops(num_loops: i32) -> i32 {
    (num_loops - 1).max(-1)
}

/// Channel volume for `base` scaled by an object's per-sample multiplier.
pub fn effective_volume(base: u8, multiplier: f32, muted: bool) -> u8 {
    if muted {
        return 0;
    }
    let volume = (base as f32 * multiplier).round();
    if volume.is_nan() {
        return 0;
    }
    volume.clamp(0.0, MAX_VOLUME as f32) as u8
}

fn secs_to_duration(secs: f32) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f32(secs).unwrap_or_else(|_| {
        log::warn!("Fade of {} seconds is out of range, clamping", secs);
        Duration::MAX
    })
}

/// Immutable playback parameters of one trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackEvent {
    action: ActionType,
    sample: SampleId,
    volume: u8,
    loops: i32,
    fade_in: Duration,
    fade_out: Duration,
    attenuation: Option<Attenuation>,
    panning: bool,
}

impl PlaybackEvent {
    pub fn from_desc(desc: &TriggerDesc, sample: SampleId) -> Self {
        let action = desc.action();
        if action != ActionType::Start {
            return Self::control(action, sample);
        }
        Self {
            action,
            sample,
            volume: db_to_volume(desc.volume_db),
            loops: engine_loops(desc.loop_count),
            fade_in: secs_to_duration(desc.fade_in_secs),
            fade_out: secs_to_duration(desc.fade_out_secs),
            attenuation: desc
                .attenuation_enabled
                .then(|| Attenuation::new(desc.min_attenuation, desc.max_attenuation)),
            panning: desc.panning,
        }
    }

    /// Plays `sample` once at full volume, unpositioned.
    pub fn start(sample: SampleId) -> Self {
        Self {
            action: ActionType::Start,
            sample,
            volume: MAX_VOLUME,
            loops: 0,
            fade_in: Duration::ZERO,
            fade_out: Duration::ZERO,
            attenuation: None,
            panning: false,
        }
    }

    /// A stop, pause or resume of whatever plays `sample`.
    pub fn control(action: ActionType, sample: SampleId) -> Self {
        Self {
            action,
            ..Self::start(sample)
        }
    }

    pub fn action(&self) -> ActionType {
        self.action
    }

    pub fn sample(&self) -> SampleId {
        self.sample
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn loops(&self) -> i32 {
        self.loops
    }

    pub fn fade_in(&self) -> Duration {
        self.fade_in
    }

    pub fn fade_out(&self) -> Duration {
        self.fade_out
    }

    pub fn attenuation(&self) -> Option<&Attenuation> {
        self.attenuation.as_ref()
    }

    pub fn panning(&self) -> bool {
        self.panning
    }
}

/// Arena slot for a trigger.
#[derive(Debug)]
pub struct TriggerSlot {
    pub(crate) event: PlaybackEvent,
    pub(crate) live_instances: usize,
    pub(crate) marked_for_destruction: bool,
}

impl TriggerSlot {
    pub(crate) fn new(event: PlaybackEvent) -> Self {
        Self {
            event,
            live_instances: 0,
            marked_for_destruction: false,
        }
    }

    pub fn event(&self) -> &PlaybackEvent {
        &self.event
    }

    pub fn live_instances(&self) -> usize {
        self.live_instances
    }

    pub fn is_marked_for_destruction(&self) -> bool {
        self.marked_for_destruction
    }
}

/// Maps an RTPC-style parameter value onto a sample's volume multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterDesc {
    pub sample: SampleId,
    pub multiplier: f32,
    pub shift: f32,
}

impl ParameterDesc {
    pub fn new(sample: SampleId, multiplier: f32, shift: f32) -> Self {
        Self {
            sample,
            multiplier,
            shift,
        }
    }

    pub fn volume_for(&self, value: f32) -> f32 {
        self.multiplier * value + self.shift
    }
}

/// A switch state that pins a sample's volume multiplier to a fixed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwitchStateDesc {
    pub sample: SampleId,
    pub value: f32,
}

impl SwitchStateDesc {
    pub fn new(sample: SampleId, value: f32) -> Self {
        Self { sample, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_tag() {
        assert_eq!(ActionType::from_tag("Stop"), ActionType::Stop);
        assert_eq!(ActionType::from_tag(" pause "), ActionType::Pause);
        assert_eq!(ActionType::from_tag("resume"), ActionType::Resume);
        assert_eq!(ActionType::from_tag("start"), ActionType::Start);
        assert_eq!(ActionType::from_tag("whatever"), ActionType::Start);
    }

    #[test]
    fn test_db_to_volume() {
        assert_eq!(db_to_volume(0.0), 128);
        assert_eq!(db_to_volume(-6.0), 64);
        assert_eq!(db_to_volume(-20.0), 13);
        assert_eq!(db_to_volume(12.0), 128);
        assert_eq!(db_to_volume(-200.0), 0);
    }

    #[test]
    fn test_engine_loops() {
        assert_eq!(engine_loops(1), 0);
        assert_eq!(engine_loops(3), 2);
        assert_eq!(engine_loops(0), -1);
        assert_eq!(engine_loops(-5), -1);
    }

    #[test]
    fn test_effective_volume() {
        assert_eq!(effective_volume(100, 0.5, false), 50);
        assert_eq!(effective_volume(100, 3.0, false), 128);
        assert_eq!(effective_volume(100, -1.0, false), 0);
        assert_eq!(effective_volume(100, f32::NAN, false), 0);
        assert_eq!(effective_volume(100, 1.0, true), 0);
    }

    #[test]
    fn test_start_event_from_desc() {
        let desc = TriggerDesc::new("start", "door.wav")
            .path("sfx/")
            .attenuation(10.0, 2.0)
            .panning(true)
            .volume_db(-6.0)
            .loop_count(2)
            .fade_in(0.5)
            .fade_out(1.0);
        assert_eq!(desc.sample_path(), "sfx/door.wav");

        let sample = SampleId::from_path(&desc.sample_path());
        let event = PlaybackEvent::from_desc(&desc, sample);
        assert_eq!(event.action(), ActionType::Start);
        assert_eq!(event.sample(), sample);
        assert_eq!(event.volume(), 64);
        assert_eq!(event.loops(), 1);
        assert_eq!(event.fade_in(), Duration::from_millis(500));
        assert_eq!(event.fade_out(), Duration::from_secs(1));
        assert!(event.panning());
        let range = event.attenuation().unwrap();
        assert_eq!((range.min(), range.max()), (2.0, 10.0));
    }

    #[test]
    fn test_out_of_range_fades_do_not_panic() {
        let desc = TriggerDesc::new("start", "a.wav")
            .fade_in(1e20)
            .fade_out(f32::INFINITY);
        let event = PlaybackEvent::from_desc(&desc, SampleId::from_raw(1));
        assert_eq!(event.fade_in(), Duration::MAX);
        assert_eq!(event.fade_out(), Duration::MAX);

        let desc = TriggerDesc::new("start", "a.wav")
            .fade_in(f32::NAN)
            .fade_out(-3.0);
        let event = PlaybackEvent::from_desc(&desc, SampleId::from_raw(1));
        assert_eq!(event.fade_in(), Duration::ZERO);
        assert_eq!(event.fade_out(), Duration::ZERO);
    }

    #[test]
    fn test_control_event_carries_only_sample() {
        let desc = TriggerDesc::new("stop", "door.wav")
            .volume_db(-20.0)
            .fade_out(2.0);
        let event = PlaybackEvent::from_desc(&desc, SampleId::from_raw(7));
        assert_eq!(event.action(), ActionType::Stop);
        assert_eq!(event.sample(), SampleId::from_raw(7));
        assert_eq!(event.fade_out(), Duration::ZERO);
        assert!(event.attenuation().is_none());
    }

    #[test]
    fn test_sample_path_without_directory() {
        assert_eq!(TriggerDesc::new("start", "a.ogg").sample_path(), "a.ogg");
        assert_eq!(
            TriggerDesc::new("start", "a.ogg").path("").sample_path(),
            "a.ogg"
        );
        assert_eq!(
            TriggerDesc::new("start", "a.ogg")
                .path("music\\")
                .sample_path(),
            "music/a.ogg"
        );
    }

    #[test]
    fn test_parameter_mapping() {
        let parameter = ParameterDesc::new(SampleId::from_raw(1), 0.5, 0.25);
        assert_eq!(parameter.volume_for(1.0), 0.75);
        assert_eq!(parameter.volume_for(0.0), 0.25);
    }
}
