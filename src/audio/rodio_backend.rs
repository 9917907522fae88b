use super::backend::{AudioBackend, OutputDevice, StreamHandle, StreamRequest};
use super::player::PlayerEvent;
use crate::error::{Result, SoundboardError};
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Plays each clip on its own thread with its own output stream.
#[derive(Debug, Default)]
pub struct RodioBackend;

impl RodioBackend {
    pub fn new() -> Self {
        Self
    }
}

fn open_stream(device: Option<usize>) -> Result<(OutputStream, OutputStreamHandle)> {
    match device {
        Some(id) => {
            let host = rodio::cpal::default_host();
            let device = host
                .output_devices()
                .map_err(|e| SoundboardError::DeviceUnavailable(e.to_string()))?
                .nth(id)
                .ok_or_else(|| SoundboardError::DeviceUnavailable(format!("no output device #{}", id)))?;
            OutputStream::try_from_device(&device)
                .map_err(|e| SoundboardError::DeviceUnavailable(format!("device #{}: {}", id, e)))
        }
        None => OutputStream::try_default().map_err(|e| SoundboardError::DeviceUnavailable(e.to_string())),
    }
}

fn decode(path: &std::path::Path) -> Result<Decoder<BufReader<File>>> {
    let unsupported = |reason: String| SoundboardError::UnsupportedFormat {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| unsupported(e.to_string()))?;
    Decoder::new(BufReader::new(file)).map_err(|e| unsupported(e.to_string()))
}

impl AudioBackend for RodioBackend {
    fn devices(&self) -> Result<Vec<OutputDevice>> {
        let host = rodio::cpal::default_host();
        let default_name = host.default_output_device().and_then(|d| d.name().ok());
        let devices = host
            .output_devices()
            .map_err(|e| SoundboardError::DeviceUnavailable(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(id, device)| {
                let name = device.name().unwrap_or_else(|_| format!("Unknown device {}", id));
                let is_default = default_name.as_deref() == Some(name.as_str());
                let output_channels = device.default_output_config().map(|c| c.channels()).unwrap_or(0);
                OutputDevice { id, name, is_default, output_channels }
            })
            .collect())
    }

    fn start(
        &self,
        request: StreamRequest,
        events: mpsc::UnboundedSender<PlayerEvent>,
    ) -> Result<StreamHandle> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<Option<Duration>>>();
        let thread_cancel = cancel.clone();
        let StreamRequest {
            session,
            path,
            device,
            volume,
        } = request;

        // The output stream is not Send, so everything lives on the clip thread
        thread::Builder::new()
            .name(format!("muc-clip-{}", session))
            .spawn(move || {
                let (_stream, handle) = match open_stream(device) {
                    Ok(opened) => opened,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let source = match decode(&path) {
                    Ok(source) => source,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let duration = source.total_duration();
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => sink,
                    Err(e) => {
                        let _ = ready_tx.send(Err(SoundboardError::DeviceUnavailable(e.to_string())));
                        return;
                    }
                };
                sink.set_volume(volume);
                sink.append(source);
                let _ = ready_tx.send(Ok(duration));

                while !sink.empty() {
                    if thread_cancel.load(Ordering::SeqCst) {
                        sink.stop();
                        debug!("Session {} cancelled", session);
                        return;
                    }
                    thread::sleep(POLL_INTERVAL);
                }

                if !thread_cancel.load(Ordering::SeqCst) && events.send(PlayerEvent::Finished(session)).is_err() {
                    warn!("Nobody listening for completion of session {}", session);
                }
            })?;

        let duration = ready_rx
            .recv()
            .map_err(|_| SoundboardError::DeviceUnavailable("playback thread exited early".into()))??;
        Ok(StreamHandle::new(cancel, duration))
    }
}
