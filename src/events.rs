//! Notifications delivered to the host.

use crate::object::{FileInstanceId, InstanceId, ObjectId, RequestId};

#[derive(Debug, Clone, PartialEq)]
pub enum SoundEvent {
    /// Every channel of a started trigger has finished.
    TriggerFinished {
        object: ObjectId,
        instance: InstanceId,
        request: RequestId,
    },
    /// Outcome of a standalone file playback request.
    FileStarted {
        object: ObjectId,
        file: FileInstanceId,
        success: bool,
    },
    /// A standalone file was stopped by the host.
    FileStopped {
        object: ObjectId,
        file: FileInstanceId,
    },
    /// A standalone file reached its end.
    FileFinished {
        object: ObjectId,
        file: FileInstanceId,
    },
}

impl SoundEvent {
    pub fn object(&self) -> ObjectId {
        match self {
            Self::TriggerFinished { object, .. }
            | Self::FileStarted { object, .. }
            | Self::FileStopped { object, .. }
            | Self::FileFinished { object, .. } => *object,
        }
    }

    pub fn file(&self) -> Option<FileInstanceId> {
        match self {
            Self::FileStarted { file, .. }
            | Self::FileStopped { file, .. }
            | Self::FileFinished { file, .. } => Some(*file),
            Self::TriggerFinished { .. } => None,
        }
    }

    pub fn is_file_event(&self) -> bool {
        self.file().is_some()
    }
}
