// The one entry point every producer goes through: CLI commands, hotkeys and
// completion messages from the audio backend.
// Lock order: sequencer -> queue -> session -> metadata

use crate::audio::backend::find_virtual_cable;
use crate::audio::player::{is_decode_failure, lock};
use crate::audio::{
    AudioBackend, Catalog, OutputDevice, PlaybackController, PlaybackStatus, PlayerEvent,
    PlaylistStore, Queue, ScanWarning, SessionId, SkipOutcome, Sound, SoundScanner,
};
use crate::audio::sound::normalize_query_name;
use crate::config::{Config, HotkeyMode, Paths};
use crate::error::{Result, SoundboardError};
use crate::hotkeys::{default_bindings, resolve, BindingTable, CustomBindings, KeyCombo};
use crate::library::{CatalogView, SearchIndex};
use crate::metadata::MetadataStore;
use crate::persist;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What happens when the live clip finishes on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Sequencer {
    Idle,
    Queue,
    Auto { order: Vec<String>, pos: usize },
}

pub struct Soundboard {
    paths: Paths,
    config: Mutex<Config>,
    catalog: RwLock<Catalog>,
    scan_warnings: Mutex<Vec<ScanWarning>>,
    metadata: Arc<Mutex<MetadataStore>>,
    playlists: Mutex<PlaylistStore>,
    queue: Mutex<Queue>,
    sequencer: Mutex<Sequencer>,
    player: PlaybackController,
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<PlayerEvent>>,
}

// Sounds that can't be played are stepped over inside a sequence
fn skippable(error: &SoundboardError) -> bool {
    is_decode_failure(error) || matches!(error, SoundboardError::SoundNotFound(_))
}

impl Soundboard {
    /// Load every persisted file under `paths` and scan the sounds directory.
    pub fn open(paths: Paths, backend: Arc<dyn AudioBackend>) -> Result<Self> {
        let config = Config::load(&paths.config_file())?;
        let metadata = Arc::new(Mutex::new(MetadataStore::load(&paths.metadata_file())?));
        let playlists = PlaylistStore::load(&paths.playlists_file())?;
        let queue: Queue = persist::read_json_or_default(&paths.queue_file())?;

        let report = SoundScanner::new().scan(&config.sounds_dir);
        let (player, events) = PlaybackController::new(backend, metadata.clone());

        info!("Soundboard ready with {} sounds from {}", report.catalog.len(), config.sounds_dir.display());
        Ok(Self {
            paths,
            config: Mutex::new(config),
            catalog: RwLock::new(report.catalog),
            scan_warnings: Mutex::new(report.warnings),
            metadata,
            playlists: Mutex::new(playlists),
            queue: Mutex::new(queue.sanitize()),
            sequencer: Mutex::new(Sequencer::Idle),
            player,
            events: tokio::sync::Mutex::new(events),
        })
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn config(&self) -> Config {
        lock(&self.config).clone()
    }

    fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    // ---- catalog ----

    /// Rebuild the catalog from the configured directory. Metadata is untouched.
    pub fn rescan(&self) -> Vec<ScanWarning> {
        let dir = lock(&self.config).sounds_dir.clone();
        let report = SoundScanner::new().scan(&dir);
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = report.catalog;
        *lock(&self.scan_warnings) = report.warnings.clone();

        for (combo, sound) in self.custom_bindings().dangling(&self.view()) {
            warn!("Hotkey {} points at missing sound '{}'", combo, sound);
        }
        report.warnings
    }

    pub fn scan_warnings(&self) -> Vec<ScanWarning> {
        lock(&self.scan_warnings).clone()
    }

    /// Fresh merge of catalog and metadata.
    pub fn view(&self) -> CatalogView {
        let catalog = self.catalog();
        let metadata = lock(&self.metadata);
        CatalogView::merge(&catalog, &metadata)
    }

    pub fn sound(&self, name: &str) -> Result<Sound> {
        let name = normalize_query_name(name);
        let catalog = self.catalog();
        let record = catalog
            .get(&name)
            .ok_or_else(|| SoundboardError::SoundNotFound(name.clone()))?;
        let metadata = lock(&self.metadata).get(&name);
        Ok(Sound::from_parts(record, metadata))
    }

    fn require_name(&self, name: &str) -> Result<String> {
        let name = normalize_query_name(name);
        if self.catalog().contains(&name) {
            Ok(name)
        } else {
            Err(SoundboardError::SoundNotFound(name))
        }
    }

    pub fn search(&self, query: &str) -> Vec<Sound> {
        let view = self.view();
        SearchIndex::new(&view)
            .search(query)
            .iter()
            .filter_map(|name| view.get(name).cloned())
            .collect()
    }

    // ---- metadata ----

    pub fn add_tags(&self, sound: &str, tags: &[String]) -> Result<()> {
        let name = self.require_name(sound)?;
        lock(&self.metadata).add_tags(&name, tags)
    }

    pub fn remove_tags(&self, sound: &str, tags: &[String]) -> Result<()> {
        let name = self.require_name(sound)?;
        lock(&self.metadata).remove_tags(&name, tags)
    }

    pub fn set_tags(&self, sound: &str, tags: &[String]) -> Result<()> {
        let name = self.require_name(sound)?;
        lock(&self.metadata).set_tags(&name, tags)
    }

    pub fn set_favorite(&self, sound: &str, favorite: bool) -> Result<()> {
        let name = self.require_name(sound)?;
        lock(&self.metadata).set_favorite(&name, favorite)
    }

    pub fn set_sound_volume(&self, sound: &str, multiplier: f32) -> Result<()> {
        let name = self.require_name(sound)?;
        lock(&self.metadata).set_volume(&name, multiplier)
    }

    pub fn all_tags(&self) -> BTreeMap<String, usize> {
        lock(&self.metadata).all_tags()
    }

    /// Metadata entries whose file is gone. Kept until the file comes back.
    pub fn orphaned(&self) -> Vec<String> {
        let catalog = self.catalog();
        let orphans = lock(&self.metadata).orphaned(&catalog);
        orphans
    }

    // ---- config ----

    pub fn volume(&self) -> f32 {
        lock(&self.config).volume
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        lock(&self.config).set_volume(volume)?;
        info!("Global volume set to {:.2}", volume);
        Ok(())
    }

    pub fn set_sounds_dir(&self, dir: PathBuf) -> Result<Vec<ScanWarning>> {
        lock(&self.config).set_sounds_dir(dir)?;
        Ok(self.rescan())
    }

    pub fn devices(&self) -> Result<Vec<OutputDevice>> {
        self.player.devices()
    }

    /// Pick the output device: the given id, or the first virtual cable found.
    pub fn setup(&self, device: Option<usize>) -> Result<OutputDevice> {
        let devices = self.devices()?;
        let chosen = match device {
            Some(id) => devices
                .iter()
                .find(|d| d.id == id)
                .ok_or_else(|| SoundboardError::DeviceUnavailable(format!("no output device #{}", id)))?,
            None => find_virtual_cable(&devices).ok_or_else(|| {
                SoundboardError::DeviceUnavailable(
                    "no virtual audio cable found; pick one with --device".to_string(),
                )
            })?,
        };
        if !chosen.can_play() {
            return Err(SoundboardError::DeviceUnavailable(format!(
                "device #{} {} has no output channels",
                chosen.id, chosen.name
            )));
        }

        lock(&self.config).set_output_device(chosen.id)?;
        info!("Output device set to #{} {}", chosen.id, chosen.name);
        Ok(chosen.clone())
    }

    // ---- hotkeys ----

    pub fn custom_bindings(&self) -> CustomBindings {
        CustomBindings::from_config(&lock(&self.config).hotkeys)
    }

    pub fn hotkey_mode(&self) -> HotkeyMode {
        lock(&self.config).hotkey_mode
    }

    pub fn set_hotkey_mode(&self, mode: HotkeyMode) -> Result<()> {
        lock(&self.config).set_hotkey_mode(mode)
    }

    /// The active table for the configured mode.
    pub fn bindings(&self) -> BindingTable {
        let view = self.view();
        let config = lock(&self.config);
        let custom = CustomBindings::from_config(&config.hotkeys);
        resolve(config.hotkey_mode, &default_bindings(&view), &custom)
    }

    pub fn dangling_bindings(&self) -> Vec<(KeyCombo, String)> {
        self.custom_bindings().dangling(&self.view())
    }

    /// Bind and persist. Returns the canonical combo and the sound it replaced, if any.
    pub fn bind(&self, combo: &str, sound: &str) -> Result<(KeyCombo, Option<String>)> {
        let view = self.view();
        let mut config = lock(&self.config);
        let mut custom = CustomBindings::from_config(&config.hotkeys);
        let (combo, previous) = custom.bind(combo, sound, &view)?;
        config.set_hotkeys(custom.to_config())?;

        if let Some(previous) = &previous {
            let notice = SoundboardError::DuplicateBinding {
                combo: combo.to_string(),
                previous: previous.clone(),
            };
            warn!("{}", notice);
        }
        info!("Bound {} to '{}'", combo, normalize_query_name(sound));
        Ok((combo, previous))
    }

    pub fn unbind(&self, combo: &str) -> Result<Option<String>> {
        let mut config = lock(&self.config);
        let mut custom = CustomBindings::from_config(&config.hotkeys);
        let removed = custom.unbind(combo)?;
        if removed.is_some() {
            config.set_hotkeys(custom.to_config())?;
        }
        Ok(removed)
    }

    pub fn unbind_sound(&self, sound: &str) -> Result<Vec<KeyCombo>> {
        let mut config = lock(&self.config);
        let mut custom = CustomBindings::from_config(&config.hotkeys);
        let removed = custom.unbind_sound(sound);
        if !removed.is_empty() {
            config.set_hotkeys(custom.to_config())?;
        }
        Ok(removed)
    }

    pub fn reset_hotkeys(&self) -> Result<()> {
        let mut config = lock(&self.config);
        let mut custom = CustomBindings::from_config(&config.hotkeys);
        custom.reset();
        config.set_hotkeys(custom.to_config())?;
        info!("Custom hotkeys cleared");
        Ok(())
    }

    // ---- playback ----

    fn start_sound(&self, name: &str) -> Result<SessionId> {
        let sound = self.sound(name)?;
        let (device, volume) = {
            let config = lock(&self.config);
            (config.output_device_id, config.volume)
        };
        self.player.play(&sound, device, volume)
    }

    // Drop out of queue or auto sequencing without touching the queue contents
    fn leave_sequence(&self, seq: &mut Sequencer) {
        if *seq == Sequencer::Queue {
            lock(&self.queue).mark_stopped();
        }
        *seq = Sequencer::Idle;
    }

    /// Play one sound right now, cutting off anything else.
    pub fn play(&self, name: &str) -> Result<SessionId> {
        let mut seq = lock(&self.sequencer);
        let name = self.require_name(name)?;
        self.leave_sequence(&mut seq);
        self.start_sound(&name)
    }

    /// Stop playback and any sequence. No-op when idle.
    pub fn stop(&self) -> Option<String> {
        let mut seq = lock(&self.sequencer);
        self.leave_sequence(&mut seq);
        self.player.stop()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.player.status()
    }

    /// Something is playing or a sequence is waiting on a completion.
    pub fn is_busy(&self) -> bool {
        let seq = lock(&self.sequencer);
        *seq != Sequencer::Idle || self.player.is_playing()
    }

    // ---- queue ----

    pub fn queue(&self) -> Queue {
        let mut queue = lock(&self.queue);
        if let Err(e) = self.sync_queue(&mut queue) {
            warn!("Could not re-read the queue: {}", e);
        }
        queue.clone()
    }

    // Pick up whatever other processes wrote to queue.json since we last looked
    fn sync_queue(&self, queue: &mut Queue) -> Result<()> {
        let on_disk: Queue = persist::read_json_or_default(&self.paths.queue_file())?;
        *queue = on_disk.sanitize().synced_with(queue);
        Ok(())
    }

    fn commit_queue(&self, queue: &mut Queue, next: Queue) -> Result<()> {
        persist::write_json(&self.paths.queue_file(), &next)?;
        *queue = next;
        Ok(())
    }

    /// Append sounds. Nothing is added unless every name exists.
    pub fn queue_add(&self, names: &[String]) -> Result<Vec<String>> {
        let names = names
            .iter()
            .map(|n| self.require_name(n))
            .collect::<Result<Vec<_>>>()?;

        let mut queue = lock(&self.queue);
        self.sync_queue(&mut queue)?;
        let mut next = queue.clone();
        next.add(names.iter().cloned());
        self.commit_queue(&mut queue, next)?;
        info!("Queued {} sounds ({} total)", names.len(), queue.len());
        Ok(names)
    }

    pub fn queue_clear(&self) -> Result<()> {
        let mut seq = lock(&self.sequencer);
        if *seq == Sequencer::Queue {
            self.player.stop();
            *seq = Sequencer::Idle;
        }
        let mut queue = lock(&self.queue);
        let mut next = queue.clone();
        next.clear();
        self.commit_queue(&mut queue, next)?;
        info!("Queue cleared");
        Ok(())
    }

    pub fn queue_shuffle(&self) -> Result<()> {
        let mut queue = lock(&self.queue);
        self.sync_queue(&mut queue)?;
        let mut next = queue.clone();
        next.shuffle();
        self.commit_queue(&mut queue, next)
    }

    /// Move past the current entry. If the queue is playing, the next entry starts now.
    pub fn queue_skip(&self) -> Result<SkipOutcome> {
        let mut seq = lock(&self.sequencer);
        let mut queue = lock(&self.queue);
        self.sync_queue(&mut queue)?;

        let mut next = queue.clone();
        let outcome = next.skip()?;
        self.commit_queue(&mut queue, next)?;

        if *seq == Sequencer::Queue {
            match &outcome {
                SkipOutcome::Advanced(_) => self.play_from_cursor(&mut seq, &mut queue)?,
                SkipOutcome::Exhausted => {
                    self.player.stop();
                    *seq = Sequencer::Idle;
                    info!("Queue exhausted");
                }
            }
        }
        Ok(outcome)
    }

    /// Start sequential playback from the cursor. Returns false for an empty queue.
    pub fn queue_play(&self) -> Result<bool> {
        let mut seq = lock(&self.sequencer);
        let mut queue = lock(&self.queue);
        self.sync_queue(&mut queue)?;
        if queue.is_empty() {
            info!("Queue is empty, nothing to play");
            return Ok(false);
        }
        if queue.cursor().is_none() {
            let mut next = queue.clone();
            next.rewind();
            self.commit_queue(&mut queue, next)?;
        }

        self.play_from_cursor(&mut seq, &mut queue)?;
        Ok(*seq == Sequencer::Queue)
    }

    fn play_from_cursor(&self, seq: &mut Sequencer, queue: &mut Queue) -> Result<()> {
        loop {
            let Some(name) = queue.current().map(str::to_string) else {
                *seq = Sequencer::Idle;
                info!("Queue exhausted");
                return Ok(());
            };

            match self.start_sound(&name) {
                Ok(_) => {
                    queue.mark_started();
                    *seq = Sequencer::Queue;
                    return Ok(());
                }
                Err(e) if skippable(&e) => {
                    warn!("Skipping queued '{}': {}", name, e);
                    let mut next = queue.clone();
                    next.advance();
                    if let Err(e) = self.commit_queue(queue, next) {
                        *seq = Sequencer::Idle;
                        return Err(e);
                    }
                }
                Err(e) => {
                    *seq = Sequencer::Idle;
                    queue.mark_stopped();
                    return Err(e);
                }
            }
        }
    }

    // ---- auto-play ----

    /// Play the whole catalog, by name or shuffled. Returns false when there is nothing to play.
    pub fn auto(&self, sequential: bool) -> Result<bool> {
        let mut seq = lock(&self.sequencer);
        self.leave_sequence(&mut seq);

        let mut order = self.view().names();
        if !sequential {
            order.shuffle(&mut rand::thread_rng());
        }
        if order.is_empty() {
            info!("No sounds to auto-play");
            return Ok(false);
        }

        info!("Auto-playing {} sounds ({})", order.len(), if sequential { "sorted" } else { "shuffled" });
        *seq = Sequencer::Auto { order, pos: 0 };
        self.play_auto_from(&mut seq)?;
        Ok(*seq != Sequencer::Idle)
    }

    fn play_auto_from(&self, seq: &mut Sequencer) -> Result<()> {
        loop {
            let name = match &*seq {
                Sequencer::Auto { order, pos } => order.get(*pos).cloned(),
                _ => None,
            };
            let Some(name) = name else {
                *seq = Sequencer::Idle;
                info!("Auto-play finished");
                return Ok(());
            };

            match self.start_sound(&name) {
                Ok(_) => return Ok(()),
                Err(e) if skippable(&e) => {
                    warn!("Skipping '{}' during auto-play: {}", name, e);
                    if let Sequencer::Auto { pos, .. } = &mut *seq {
                        *pos += 1;
                    }
                }
                Err(e) => {
                    *seq = Sequencer::Idle;
                    return Err(e);
                }
            }
        }
    }

    // ---- playlists ----

    /// Snapshot the live queue under `name`.
    pub fn playlist_save(&self, name: &str, replace: bool) -> Result<usize> {
        let entries = {
            let mut queue = lock(&self.queue);
            self.sync_queue(&mut queue)?;
            queue.entries().to_vec()
        };
        let count = entries.len();
        lock(&self.playlists).save(name, entries, replace)?;
        Ok(count)
    }

    /// Replace the live queue with a playlist, cursor back at the start.
    pub fn playlist_load(&self, name: &str) -> Result<usize> {
        let entries = lock(&self.playlists).get(name)?.to_vec();

        let mut seq = lock(&self.sequencer);
        if *seq == Sequencer::Queue {
            self.player.stop();
            *seq = Sequencer::Idle;
        }
        let mut queue = lock(&self.queue);
        let count = entries.len();
        self.commit_queue(&mut queue, Queue::from_entries(entries))?;
        info!("Loaded playlist '{}' into the queue ({} sounds)", name.trim(), count);
        Ok(count)
    }

    pub fn playlist_list(&self) -> Vec<(String, usize)> {
        lock(&self.playlists)
            .list()
            .into_iter()
            .map(|(name, len)| (name.to_string(), len))
            .collect()
    }

    pub fn playlist_show(&self, name: &str) -> Result<Vec<String>> {
        Ok(lock(&self.playlists).get(name)?.to_vec())
    }

    pub fn playlist_duration(&self, name: &str) -> Result<Option<Duration>> {
        let view = self.view();
        lock(&self.playlists).total_duration(name, &view)
    }

    pub fn playlist_delete(&self, name: &str) -> Result<()> {
        lock(&self.playlists).delete(name)
    }

    // ---- events ----

    pub async fn next_event(&self) -> Option<PlayerEvent> {
        self.events.lock().await.recv().await
    }

    /// Apply one backend notice: advance the queue or auto-play when the live clip ended.
    pub fn handle_event(&self, event: PlayerEvent) -> Result<()> {
        let PlayerEvent::Finished(id) = event;
        let mut seq = lock(&self.sequencer);
        if !self.player.complete(id) {
            return Ok(());
        }

        let auto = match &mut *seq {
            Sequencer::Idle => return Ok(()),
            Sequencer::Queue => false,
            Sequencer::Auto { pos, .. } => {
                *pos += 1;
                true
            }
        };
        if auto {
            return self.play_auto_from(&mut seq);
        }

        let mut queue = lock(&self.queue);
        let synced = self.sync_queue(&mut queue).and_then(|()| {
            // a skip or clear from another process already moved the cursor
            if !queue.is_started() {
                return Ok(());
            }
            let mut next = queue.clone();
            next.advance();
            self.commit_queue(&mut queue, next)
        });
        if let Err(e) = synced {
            *seq = Sequencer::Idle;
            return Err(e);
        }
        self.play_from_cursor(&mut seq, &mut queue)
    }

    /// Keep handling completions until nothing is playing or queued up.
    pub async fn run_until_idle(&self) -> Result<()> {
        while self.is_busy() {
            match self.next_event().await {
                Some(event) => self.handle_event(event)?,
                None => break,
            }
        }
        debug!("Playback idle");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::fake::{FakeBackend, FakeFailure};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn board_with(names: &[&str]) -> (TempDir, Arc<FakeBackend>, Soundboard) {
        let dir = tempdir().unwrap();
        let sounds = dir.path().join("sounds");
        fs::create_dir_all(&sounds).unwrap();
        for name in names {
            fs::write(sounds.join(format!("{}.wav", name)), b"riff").unwrap();
        }

        let paths = Paths::new(dir.path().join("home"));
        Config::load(&paths.config_file())
            .unwrap()
            .set_sounds_dir(sounds)
            .unwrap();

        let backend = FakeBackend::new();
        let board = Soundboard::open(paths, backend.clone()).unwrap();
        (dir, backend, board)
    }

    async fn finish_current(backend: &FakeBackend, board: &Soundboard) -> Result<()> {
        backend.finish_last();
        let event = board.next_event().await.unwrap();
        board.handle_event(event)
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_queue_advances_on_completion_and_skip() {
        let (_dir, backend, board) = board_with(&["a", "b", "c"]);
        board.queue_add(&strings(&["a", "b", "c"])).unwrap();

        assert!(board.queue_play().unwrap());
        assert_eq!(backend.played(), vec!["a"]);

        finish_current(&backend, &board).await.unwrap();
        assert_eq!(board.queue().cursor(), Some(1));
        assert_eq!(backend.played(), vec!["a", "b"]);
        let b_session = backend.requests()[1].session;

        assert_eq!(board.queue_skip().unwrap(), SkipOutcome::Advanced("c".into()));
        assert!(backend.cancelled(b_session));
        assert_eq!(backend.played(), vec!["a", "b", "c"]);
        assert_eq!(board.queue().cursor(), Some(2));

        finish_current(&backend, &board).await.unwrap();
        assert_eq!(board.queue().cursor(), None);
        assert!(!board.is_busy());
        assert!(matches!(board.queue_skip(), Err(SoundboardError::QueueEmpty)));
    }

    #[tokio::test]
    async fn test_stop_when_idle_changes_nothing() {
        let (_dir, _backend, board) = board_with(&["a", "b"]);
        board.queue_add(&strings(&["a", "b"])).unwrap();

        assert_eq!(board.stop(), None);
        assert_eq!(board.queue().cursor(), Some(0));
        assert_eq!(board.sound("a").unwrap().play_count, 0);
    }

    #[tokio::test]
    async fn test_stopped_queue_does_not_advance() {
        let (_dir, backend, board) = board_with(&["a", "b"]);
        board.queue_add(&strings(&["a", "b"])).unwrap();
        board.queue_play().unwrap();

        assert_eq!(board.stop().as_deref(), Some("a"));
        // a late completion for the stopped clip is discarded
        finish_current(&backend, &board).await.unwrap();

        assert_eq!(backend.played(), vec!["a"]);
        assert_eq!(board.queue().cursor(), Some(0));
        assert!(!board.is_busy());
    }

    #[tokio::test]
    async fn test_decode_failure_is_skipped_in_queue() {
        let (_dir, backend, board) = board_with(&["a", "b", "c"]);
        backend.fail_on("/b.wav", FakeFailure::Decode);
        board.queue_add(&strings(&["a", "b", "c"])).unwrap();
        board.queue_play().unwrap();

        finish_current(&backend, &board).await.unwrap();

        assert_eq!(backend.played(), vec!["a", "c"]);
        assert_eq!(board.queue().cursor(), Some(2));
    }

    #[tokio::test]
    async fn test_device_failure_ends_the_sequence() {
        let (_dir, backend, board) = board_with(&["a", "b", "c"]);
        backend.fail_on("/b.wav", FakeFailure::Device);
        board.queue_add(&strings(&["a", "b", "c"])).unwrap();
        board.queue_play().unwrap();

        let err = finish_current(&backend, &board).await.unwrap_err();

        assert_eq!(err.kind(), "device-unavailable");
        assert!(!board.is_busy());
        assert_eq!(board.queue().cursor(), Some(1));
    }

    #[tokio::test]
    async fn test_manual_play_takes_over_from_queue() {
        let (_dir, backend, board) = board_with(&["a", "b", "c"]);
        board.queue_add(&strings(&["a", "b"])).unwrap();
        board.queue_play().unwrap();

        board.play("C").unwrap();
        finish_current(&backend, &board).await.unwrap();

        assert_eq!(backend.played(), vec!["a", "c"]);
        assert!(!board.is_busy());
        assert_eq!(board.sound("c").unwrap().play_count, 1);
    }

    #[tokio::test]
    async fn test_auto_sequential_plays_everything_in_order() {
        let (_dir, backend, board) = board_with(&["cheer", "airhorn", "boom"]);
        assert!(board.auto(true).unwrap());

        finish_current(&backend, &board).await.unwrap();
        finish_current(&backend, &board).await.unwrap();
        finish_current(&backend, &board).await.unwrap();

        assert_eq!(backend.played(), vec!["airhorn", "boom", "cheer"]);
        assert!(!board.is_busy());
    }

    #[tokio::test]
    async fn test_auto_shuffled_plays_each_sound_once() {
        let (_dir, backend, board) = board_with(&["a", "b", "c", "d"]);
        board.auto(false).unwrap();
        board.run_until_idle_with(&backend).await;

        let mut played = backend.played();
        played.sort();
        assert_eq!(played, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_play_unknown_sound() {
        let (_dir, backend, board) = board_with(&["a"]);
        let err = board.play("nope").unwrap_err();
        assert!(matches!(err, SoundboardError::SoundNotFound(n) if n == "nope"));
        assert!(backend.played().is_empty());
        assert!(board.queue_add(&strings(&["a", "nope"])).is_err());
        assert!(board.queue().is_empty());
    }

    #[tokio::test]
    async fn test_queue_and_bindings_survive_reopen() {
        let (dir, _backend, board) = board_with(&["airhorn", "boom", "cheer"]);
        board.queue_add(&strings(&["boom", "cheer"])).unwrap();
        board.queue_skip().unwrap();
        board.bind("f1", "cheer").unwrap();
        let (_, previous) = board.bind("F1", "boom").unwrap();
        assert_eq!(previous.as_deref(), Some("cheer"));
        drop(board);

        let board = Soundboard::open(Paths::new(dir.path().join("home")), FakeBackend::new()).unwrap();
        assert_eq!(board.queue().entries(), strings(&["boom", "cheer"]).as_slice());
        assert_eq!(board.queue().cursor(), Some(1));
        assert_eq!(board.bindings().sound_for(&KeyCombo::function(1)), Some("boom"));
        assert_eq!(board.bindings().sound_for(&KeyCombo::function(3)), Some("cheer"));
    }

    #[tokio::test]
    async fn test_queue_edits_from_another_process_are_kept() {
        let (_dir, _backend, board) = board_with(&["a", "b", "c"]);
        let other = Soundboard::open(board.paths().clone(), FakeBackend::new()).unwrap();

        board.queue_add(&strings(&["a"])).unwrap();
        other.queue_add(&strings(&["b"])).unwrap();
        board.queue_add(&strings(&["c"])).unwrap();

        let reopened = Soundboard::open(board.paths().clone(), FakeBackend::new()).unwrap();
        assert_eq!(reopened.queue().entries(), strings(&["a", "b", "c"]).as_slice());
        assert_eq!(board.queue().entries(), strings(&["a", "b", "c"]).as_slice());
    }

    #[tokio::test]
    async fn test_playing_queue_follows_edits_from_another_process() {
        let (_dir, backend, board) = board_with(&["a", "b", "c"]);
        let other = Soundboard::open(board.paths().clone(), FakeBackend::new()).unwrap();
        board.queue_add(&strings(&["a"])).unwrap();
        board.queue_play().unwrap();

        other.queue_add(&strings(&["b"])).unwrap();
        finish_current(&backend, &board).await.unwrap();
        assert_eq!(backend.played(), vec!["a", "b"]);

        // skipped elsewhere while b plays: nothing left once b ends
        assert_eq!(other.queue_skip().unwrap(), SkipOutcome::Exhausted);
        finish_current(&backend, &board).await.unwrap();
        assert_eq!(backend.played(), vec!["a", "b"]);
        assert!(!board.is_busy());
    }

    #[tokio::test]
    async fn test_reset_hotkeys_drops_custom_bindings() {
        let (_dir, _backend, board) = board_with(&["a", "b"]);
        board.bind("ctrl+a", "a").unwrap();
        board.reset_hotkeys().unwrap();

        assert!(board.custom_bindings().is_empty());
        assert_eq!(board.bindings().sound_for(&KeyCombo::parse("ctrl+a").unwrap()), None);
        assert_eq!(board.bindings().sound_for(&KeyCombo::function(2)), Some("b"));
    }

    #[tokio::test]
    async fn test_playlist_load_replaces_queue_and_resets_cursor() {
        let (_dir, _backend, board) = board_with(&["a", "b", "c"]);
        board.queue_add(&strings(&["c", "a"])).unwrap();
        assert_eq!(board.playlist_save("mix", false).unwrap(), 2);
        assert!(matches!(
            board.playlist_save("mix", false),
            Err(SoundboardError::PlaylistNameCollision(_))
        ));

        board.queue_clear().unwrap();
        board.queue_add(&strings(&["b"])).unwrap();
        board.queue_skip().unwrap();

        board.playlist_load("mix").unwrap();
        assert_eq!(board.queue().entries(), strings(&["c", "a"]).as_slice());
        assert_eq!(board.queue().cursor(), Some(0));
    }

    #[tokio::test]
    async fn test_setup_finds_virtual_cable() {
        let (_dir, _backend, board) = board_with(&[]);
        let device = board.setup(None).unwrap();
        assert_eq!(device.id, 1);
        assert_eq!(board.config().output_device_id, Some(1));
        assert!(board.setup(Some(9)).is_err());

        let err = board.setup(Some(2)).unwrap_err();
        assert_eq!(err.kind(), "device-unavailable");
        assert_eq!(board.config().output_device_id, Some(1));
    }

    #[tokio::test]
    async fn test_metadata_requires_known_sound() {
        let (_dir, _backend, board) = board_with(&["boom"]);
        board.set_favorite("Boom", true).unwrap();
        assert!(board.sound("boom").unwrap().favorite);
        assert!(matches!(
            board.set_sound_volume("nope", 1.0),
            Err(SoundboardError::SoundNotFound(_))
        ));
        assert!(matches!(
            board.set_sound_volume("boom", 2.5),
            Err(SoundboardError::InvalidVolume { .. })
        ));
    }

    impl Soundboard {
        // Drive the fake backend until every started clip has finished
        async fn run_until_idle_with(&self, backend: &FakeBackend) {
            while self.is_busy() {
                finish_current(backend, self).await.unwrap();
            }
        }
    }
}
