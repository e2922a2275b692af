//! Audio objects and the playback they own.

use crate::arena::Handle;
use crate::cache::SampleId;
use crate::channel_pool::ChannelId;
use crate::math::Pose;
use crate::trigger::TriggerId;
use std::collections::HashMap;
use std::fmt;

pub type ObjectId = Handle<AudioObject>;
pub type InstanceId = Handle<PlaybackInstance>;

/// Caller-supplied token identifying one trigger execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request({})", self.0)
    }
}

/// Caller-supplied id of a standalone file playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileInstanceId(pub u32);

impl fmt::Display for FileInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    Playing,
    /// Every channel has finished; reported and dropped on the next update.
    ToBeRemoved,
}

/// One execution of a start trigger and the channels it plays on.
#[derive(Debug)]
pub struct PlaybackInstance {
    pub(crate) trigger: TriggerId,
    pub(crate) object: ObjectId,
    pub(crate) request: RequestId,
    pub(crate) channels: Vec<ChannelId>,
    pub(crate) state: InstanceState,
}

impl PlaybackInstance {
    pub(crate) fn new(
        trigger: TriggerId,
        object: ObjectId,
        request: RequestId,
        channel: ChannelId,
    ) -> Self {
        Self {
            trigger,
            object,
            request,
            channels: vec![channel],
            state: InstanceState::Playing,
        }
    }

    pub fn trigger(&self) -> TriggerId {
        self.trigger
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Drops `channel` from the instance. Returns false if it was not here.
    pub(crate) fn detach(&mut self, channel: ChannelId) -> bool {
        let Some(pos) = self.channels.iter().position(|c| *c == channel) else {
            return false;
        };
        self.channels.swap_remove(pos);
        if self.channels.is_empty() {
            self.state = InstanceState::ToBeRemoved;
        }
        true
    }
}

/// A file played directly on an object, outside any trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct StandaloneFile {
    pub id: FileInstanceId,
    pub sample: SampleId,
    pub channel: ChannelId,
}

/// A positioned emitter.
#[derive(Debug, Default)]
pub struct AudioObject {
    pose: Pose,
    pub(crate) instances: Vec<InstanceId>,
    pub(crate) files: Vec<StandaloneFile>,
    volumes: HashMap<SampleId, f32>,
}

impl AudioObject {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            ..Default::default()
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    pub fn instances(&self) -> &[InstanceId] {
        &self.instances
    }

    pub fn files(&self) -> &[StandaloneFile] {
        &self.files
    }

    /// Volume multiplier for `sample`, 1.0 unless set.
    pub fn volume_multiplier(&self, sample: SampleId) -> f32 {
        self.volumes.get(&sample).copied().unwrap_or(1.0)
    }

    pub(crate) fn set_volume_multiplier(&mut self, sample: SampleId, value: f32) {
        self.volumes.insert(sample, value);
    }

    pub fn is_playing(&self) -> bool {
        !self.instances.is_empty() || !self.files.is_empty()
    }
}
