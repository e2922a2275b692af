//! Channel-pool sound mixing engine: sample caching, per-channel distance
//! and pan from 3D positions, and completion hand-off from the mixer thread
//! to a single update tick.

pub mod arena;
pub mod audio_data;
pub mod backend;
pub mod cache;
pub mod channel_pool;
pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod math;
pub mod object;
pub mod positional;
pub mod trigger;

pub use backend::{MixerBackend, SoftwareMixer, VoiceParams};
pub use cache::{SampleCache, SampleId};
pub use channel_pool::{ChannelId, ChannelPool};
pub use config::SoundEngineDesc;
pub use engine::{SoundEngine, TriggerOutcome};
pub use error::{Result, SoundError};
pub use events::SoundEvent;
pub use math::{Listener, Pose, Quat, Vec3};
pub use object::{AudioObject, FileInstanceId, InstanceId, ObjectId, RequestId};
pub use trigger::{
    ActionType, ParameterDesc, PlaybackEvent, SwitchStateDesc, TriggerDesc, TriggerId,
};

#[cfg(feature = "output")]
pub use backend::OutputStream;
