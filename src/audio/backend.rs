use super::player::{PlayerEvent, SessionId};
use crate::error::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Substrings that mark an output device as a virtual cable.
pub const VIRTUAL_CABLE_KEYWORDS: [&str; 4] = ["cable", "virtual", "vb-audio", "voicemeeter"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDevice {
    pub id: usize,
    pub name: String,
    pub is_default: bool,
    /// 0 when the device reports no usable output config.
    pub output_channels: u16,
}

impl OutputDevice {
    pub fn can_play(&self) -> bool {
        self.output_channels > 0
    }

    pub fn is_virtual_cable(&self) -> bool {
        let name = self.name.to_lowercase();
        VIRTUAL_CABLE_KEYWORDS.iter().any(|k| name.contains(k))
    }
}

pub fn find_virtual_cable(devices: &[OutputDevice]) -> Option<&OutputDevice> {
    devices.iter().find(|d| d.is_virtual_cable() && d.can_play())
}

/// Everything a backend needs to start one clip.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub session: SessionId,
    pub path: PathBuf,
    pub device: Option<usize>,
    pub volume: f32,
}

/// Returned once the stream is actually running.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    cancel: Arc<AtomicBool>,
    pub duration: Option<Duration>,
}

impl StreamHandle {
    pub fn new(cancel: Arc<AtomicBool>, duration: Option<Duration>) -> Self {
        Self { cancel, duration }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Output side of playback. Implementations must send `PlayerEvent::Finished` on
/// `events` when a clip ends on its own, and nothing when it was cancelled.
pub trait AudioBackend: Send + Sync {
    fn devices(&self) -> Result<Vec<OutputDevice>>;

    fn start(
        &self,
        request: StreamRequest,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<StreamHandle>;
}

/// Stand-in for builds without the `audio` feature. Every start fails.
#[cfg(not(feature = "audio"))]
#[derive(Debug, Default)]
pub struct SilentBackend;

#[cfg(not(feature = "audio"))]
impl AudioBackend for SilentBackend {
    fn devices(&self) -> Result<Vec<OutputDevice>> {
        Ok(Vec::new())
    }

    fn start(
        &self,
        _request: StreamRequest,
        _events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<StreamHandle> {
        Err(crate::error::SoundboardError::DeviceUnavailable(
            "built without the `audio` feature".to_string(),
        ))
    }
}
