pub mod backend;
pub mod player;
pub mod playlist;
pub mod queue;
#[cfg(feature = "audio")]
pub mod rodio_backend;
pub mod scanner;
pub mod sound;

pub use backend::{AudioBackend, OutputDevice, StreamHandle, StreamRequest};
pub use player::{effective_volume, PlaybackController, PlaybackStatus, PlayerEvent, SessionId};
pub use playlist::PlaylistStore;
pub use queue::{Queue, SkipOutcome};
#[cfg(feature = "audio")]
pub use rodio_backend::RodioBackend;
pub use scanner::{Catalog, ScanReport, ScanWarning, SoundScanner};
pub use sound::{CatalogRecord, Sound};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Wav,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "ogg" | "oga" => AudioFormat::Ogg,
            "mp4" | "m4a" | "aac" => AudioFormat::Mp4,
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp4 => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Unknown => "?",
        }
    }
}
