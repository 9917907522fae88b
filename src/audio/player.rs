use super::backend::{AudioBackend, OutputDevice, StreamHandle, StreamRequest};
use super::sound::Sound;
use crate::error::{Result, SoundboardError};
use crate::metadata::MetadataStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The clip of this session ran to its end.
    Finished(SessionId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackStatus {
    Idle,
    Playing {
        session: SessionId,
        sound: String,
        elapsed: Duration,
        duration: Option<Duration>,
        volume: f32,
    },
}

struct Session {
    id: SessionId,
    sound: String,
    started_at: Instant,
    volume: f32,
    handle: StreamHandle,
}

/// Global volume times the per-sound trim, kept inside [0, 1].
pub fn effective_volume(global: f32, multiplier: f32) -> f32 {
    (global * multiplier).clamp(0.0, 1.0)
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the one live playback session. Starting a sound preempts whatever was playing.
pub struct PlaybackController {
    backend: Arc<dyn AudioBackend>,
    metadata: Arc<Mutex<MetadataStore>>,
    session: Mutex<Option<Session>>,
    next_session: AtomicU64,
    events: mpsc::UnboundedSender<PlayerEvent>,
}

impl PlaybackController {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        metadata: Arc<Mutex<MetadataStore>>,
    ) -> (Self, mpsc::UnboundedReceiver<PlayerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            backend,
            metadata,
            session: Mutex::new(None),
            next_session: AtomicU64::new(1),
            events,
        };
        (controller, receiver)
    }

    pub fn devices(&self) -> Result<Vec<OutputDevice>> {
        self.backend.devices()
    }

    pub fn play(&self, sound: &Sound, device: Option<usize>, global_volume: f32) -> Result<SessionId> {
        let mut session = lock(&self.session);
        if let Some(previous) = session.take() {
            previous.handle.cancel();
            debug!("Preempted '{}' (session {})", previous.sound, previous.id);
        }

        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        let volume = effective_volume(global_volume, sound.volume);
        let request = StreamRequest {
            session: id,
            path: sound.file_path.clone(),
            device,
            volume,
        };
        let handle = self.backend.start(request, self.events.clone())?;

        // Counted at start; a clip cut short still counts
        if let Err(e) = lock(&self.metadata).increment_play_count(&sound.name) {
            handle.cancel();
            return Err(e);
        }

        info!("Playing '{}' at volume {:.2} (session {})", sound.name, volume, id);
        *session = Some(Session {
            id,
            sound: sound.name.clone(),
            started_at: Instant::now(),
            volume,
            handle,
        });
        Ok(id)
    }

    /// Cancel the live session, if any. Returns the name of what was stopped.
    pub fn stop(&self) -> Option<String> {
        let previous = lock(&self.session).take()?;
        previous.handle.cancel();
        info!("Stopped '{}' (session {})", previous.sound, previous.id);
        Some(previous.sound)
    }

    pub fn status(&self) -> PlaybackStatus {
        match lock(&self.session).as_ref() {
            Some(s) => PlaybackStatus::Playing {
                session: s.id,
                sound: s.sound.clone(),
                elapsed: s.started_at.elapsed(),
                duration: s.handle.duration,
                volume: s.volume,
            },
            None => PlaybackStatus::Idle,
        }
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.session).is_some()
    }

    /// Consume a completion notice. Only the live session's notice ends it.
    pub fn complete(&self, id: SessionId) -> bool {
        let mut session = lock(&self.session);
        match session.as_ref() {
            Some(s) if s.id == id => {
                info!("Finished '{}' (session {})", s.sound, id);
                *session = None;
                true
            }
            _ => {
                debug!("Ignoring stale completion for session {}", id);
                false
            }
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Some(session) = lock(&self.session).take() {
            warn!("Controller dropped while '{}' was playing", session.sound);
            session.handle.cancel();
        }
    }
}

/// Classify a failed start without exposing backend internals to callers.
pub(crate) fn is_decode_failure(error: &SoundboardError) -> bool {
    matches!(error, SoundboardError::UnsupportedFormat { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::fake::{FakeBackend, FakeFailure};
    use crate::audio::{AudioFormat, Sound};
    use tempfile::{tempdir, TempDir};

    fn sound(name: &str, volume: f32) -> Sound {
        Sound {
            name: name.to_string(),
            file_path: format!("/sounds/{}.wav", name).into(),
            format: AudioFormat::Wav,
            duration: None,
            tags: Default::default(),
            favorite: false,
            volume,
            play_count: 0,
        }
    }

    fn controller() -> (
        TempDir,
        Arc<FakeBackend>,
        Arc<Mutex<MetadataStore>>,
        PlaybackController,
        mpsc::UnboundedReceiver<PlayerEvent>,
    ) {
        let dir = tempdir().unwrap();
        let metadata = Arc::new(Mutex::new(
            MetadataStore::load(&dir.path().join("metadata.json")).unwrap(),
        ));
        let backend = FakeBackend::new();
        let (controller, events) = PlaybackController::new(backend.clone(), metadata.clone());
        (dir, backend, metadata, controller, events)
    }

    #[test]
    fn test_effective_volume_is_clamped() {
        assert_eq!(effective_volume(1.0, 2.0), 1.0);
        assert_eq!(effective_volume(0.5, 1.5), 0.75);
        assert_eq!(effective_volume(0.0, 2.0), 0.0);
    }

    #[tokio::test]
    async fn test_play_counts_and_reports_status() {
        let (_dir, backend, metadata, controller, _events) = controller();

        let id = controller.play(&sound("airhorn", 2.0), Some(1), 0.8).unwrap();

        assert_eq!(backend.requests()[0].volume, 1.0);
        assert_eq!(backend.requests()[0].device, Some(1));
        assert_eq!(metadata.lock().unwrap().get("airhorn").play_count, 1);
        match controller.status() {
            PlaybackStatus::Playing { session, sound, .. } => {
                assert_eq!(session, id);
                assert_eq!(sound, "airhorn");
            }
            PlaybackStatus::Idle => panic!("expected playing"),
        }
    }

    #[tokio::test]
    async fn test_new_play_preempts_previous_session() {
        let (_dir, backend, _metadata, controller, _events) = controller();

        let first = controller.play(&sound("airhorn", 1.0), None, 1.0).unwrap();
        let second = controller.play(&sound("boom", 1.0), None, 1.0).unwrap();

        assert!(backend.cancelled(first));
        assert!(!backend.cancelled(second));
        assert!(!controller.complete(first));
        assert!(controller.complete(second));
        assert_eq!(controller.status(), PlaybackStatus::Idle);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_a_no_op() {
        let (_dir, _backend, metadata, controller, _events) = controller();
        assert_eq!(controller.stop(), None);
        assert_eq!(controller.stop(), None);
        assert_eq!(metadata.lock().unwrap().get("airhorn").play_count, 0);
    }

    #[tokio::test]
    async fn test_stop_wins_over_late_completion() {
        let (_dir, backend, _metadata, controller, mut events) = controller();
        let id = controller.play(&sound("cheer", 1.0), None, 1.0).unwrap();

        assert_eq!(controller.stop().as_deref(), Some("cheer"));
        backend.finish_last();

        assert_eq!(events.recv().await, Some(PlayerEvent::Finished(id)));
        assert!(!controller.complete(id));
    }

    #[tokio::test]
    async fn test_failed_start_leaves_count_and_session_alone() {
        let (_dir, backend, metadata, controller, _events) = controller();
        backend.fail_on("broken", FakeFailure::Decode);

        let err = controller.play(&sound("broken", 1.0), None, 1.0).unwrap_err();

        assert!(is_decode_failure(&err));
        assert!(!controller.is_playing());
        assert_eq!(metadata.lock().unwrap().get("broken").play_count, 0);
    }

    #[tokio::test]
    async fn test_device_failure_is_reported() {
        let (_dir, backend, _metadata, controller, _events) = controller();
        backend.set_device_down(true);
        let err = controller.play(&sound("boom", 1.0), Some(7), 1.0).unwrap_err();
        assert_eq!(err.kind(), "device-unavailable");
    }
}
