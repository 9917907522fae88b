// Error taxonomy for the soundboard core
// Validation errors are user-facing, persistence errors are fatal for the command that hit them

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SoundboardError {
    #[error("sound '{0}' not found")]
    SoundNotFound(String),

    /// Warning-level: a custom binding replaced an earlier one.
    #[error("{combo} was bound to '{previous}', now rebound")]
    DuplicateBinding { combo: String, previous: String },

    #[error("invalid key combo '{input}': {reason}")]
    InvalidKeyCombo { input: String, reason: String },

    #[error("volume {value} is outside {min}..={max}")]
    InvalidVolume { value: f32, min: f32, max: f32 },

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("unsupported or corrupted audio in {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("playlist '{0}' not found")]
    PlaylistNotFound(String),

    #[error("playlist '{0}' already exists (use --replace to overwrite)")]
    PlaylistNameCollision(String),

    #[error("queue is empty")]
    QueueEmpty,

    #[error("failed to persist {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SoundboardError {
    pub(crate) fn invalid_combo(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKeyCombo {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable identifier printed next to the message so scripts can match on it.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SoundNotFound(_) => "sound-not-found",
            Self::DuplicateBinding { .. } => "duplicate-binding",
            Self::InvalidKeyCombo { .. } => "invalid-key-combo",
            Self::InvalidVolume { .. } => "invalid-volume",
            Self::DeviceUnavailable(_) => "device-unavailable",
            Self::UnsupportedFormat { .. } => "unsupported-format",
            Self::PlaylistNotFound(_) => "playlist-not-found",
            Self::PlaylistNameCollision(_) => "playlist-name-collision",
            Self::QueueEmpty => "queue-empty",
            Self::Persistence { .. } => "persistence",
            Self::Io(_) => "io",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SoundNotFound(_) => 2,
            Self::DuplicateBinding { .. } => 3,
            Self::InvalidKeyCombo { .. } => 4,
            Self::InvalidVolume { .. } => 5,
            Self::DeviceUnavailable(_) => 6,
            Self::UnsupportedFormat { .. } => 7,
            Self::PlaylistNotFound(_) => 8,
            Self::PlaylistNameCollision(_) => 9,
            Self::QueueEmpty => 10,
            Self::Persistence { .. } | Self::Io(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, SoundboardError>;
