//! Error types for the mixing engine

use crate::cache::SampleId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SoundError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No free mixing channel available")]
    ChannelsExhausted,

    #[error("Sample {0} is not available")]
    SampleUnavailable(SampleId),

    #[error("Invalid {0} handle")]
    InvalidHandle(&'static str),

    #[error("Engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, SoundError>;
