// muc - hotkey soundboard
// Every command opens the soundboard, does one thing, and exits.
// play / queue play / auto / listen stay up until playback is done.

use anyhow::Result;
use clap::{Parser, Subcommand};
use muc::audio::{AudioBackend, OutputDevice, PlaybackStatus, SkipOutcome, Sound};
use muc::config::{HotkeyMode, Paths};
use muc::hotkeys::BindingTable;
use muc::logging::init_logging;
use muc::Soundboard;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "muc", version)]
#[command(about = "Hotkey soundboard - bind keys to short clips and play them into any output device")]
struct Cli {
    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory (default: $MUC_HOME or ~/.muc)
    #[arg(long, global = true, value_name = "DIR")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Choose the output device (auto-detects a virtual cable) and sounds folder
    Setup {
        #[arg(long)]
        device: Option<usize>,
        #[arg(long, value_name = "DIR")]
        sounds: Option<PathBuf>,
    },
    /// List output devices
    Devices,
    /// List sounds
    Sounds {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        favorites: bool,
    },
    /// Fuzzy search over names and tags
    Search {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Show everything known about one sound
    Info { sound: String },
    /// List tags in use
    Tags,
    /// Edit a sound's tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Mark a sound as favorite
    Favorite {
        sound: String,
        #[arg(long)]
        off: bool,
    },
    /// List favorites
    Favorites,
    /// Show or set the global volume (0.0 - 1.0)
    Volume { level: Option<f32> },
    /// Show or set a sound's volume multiplier (0.0 - 2.0)
    SoundVolume {
        sound: String,
        multiplier: Option<f32>,
    },
    /// Bind a key combo like <ctrl>+<shift>+a or f5 to a sound
    Bind { key: String, sound: String },
    /// Remove a custom binding by combo, or every binding of a sound
    Unbind {
        #[arg(required_unless_present = "sound")]
        key: Option<String>,
        #[arg(long, conflicts_with = "key")]
        sound: Option<String>,
    },
    /// Show the active hotkeys
    Hotkeys,
    /// Drop all custom hotkeys
    HotkeysReset,
    /// Which bindings are active: default, custom or merged
    HotkeyMode { mode: HotkeyMode },
    /// Listen for hotkeys until Esc (system-wide with the `global-keys` feature)
    Listen,
    /// Play one sound
    Play { sound: String },
    /// Stop playback
    Stop,
    /// Manage the play queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Save and load queue snapshots
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },
    /// Play every sound, shuffled unless --sequential
    Auto {
        #[arg(long)]
        sequential: bool,
    },
}

#[derive(Subcommand)]
enum TagAction {
    Add {
        sound: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    Remove {
        sound: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Replace all tags (none clears them)
    Set { sound: String, tags: Vec<String> },
}

#[derive(Subcommand)]
enum QueueAction {
    Add {
        #[arg(required = true)]
        sounds: Vec<String>,
    },
    Show,
    Clear,
    Shuffle,
    Skip,
    Play,
}

#[derive(Subcommand)]
enum PlaylistAction {
    /// Save the current queue
    Save {
        name: String,
        #[arg(long)]
        replace: bool,
    },
    /// Replace the queue with a playlist
    Load { name: String },
    List,
    Show { name: String },
    Delete { name: String },
}

#[cfg(feature = "audio")]
fn backend() -> Arc<dyn AudioBackend> {
    Arc::new(muc::audio::RodioBackend::new())
}

#[cfg(not(feature = "audio"))]
fn backend() -> Arc<dyn AudioBackend> {
    Arc::new(muc::audio::backend::SilentBackend)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = Paths::resolve(cli.home.clone());

    // Keep the guard until the very end so the file writer flushes
    let guard = init_logging(&paths.log_dir(), cli.verbose)?;
    info!("muc {} starting, home {}", env!("CARGO_PKG_VERSION"), paths.home.display());

    let code = match run(cli.command, paths).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            eprintln!("error[{}]: {}", e.kind(), e);
            e.exit_code()
        }
    };

    drop(guard);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(command: Command, paths: Paths) -> muc::Result<()> {
    let board = Soundboard::open(paths, backend())?;

    match command {
        Command::Setup { device, sounds } => {
            if let Some(dir) = sounds {
                for warning in board.set_sounds_dir(dir)? {
                    eprintln!("warning: {}", warning);
                }
            }
            let chosen = board.setup(device)?;
            println!("Output device: #{} {}", chosen.id, chosen.name);
            println!(
                "Sounds: {} ({} found)",
                board.config().sounds_dir.display(),
                board.view().len()
            );
        }
        Command::Devices => {
            let selected = board.config().output_device_id;
            print_devices(&board.devices()?, selected);
        }
        Command::Sounds { tag, favorites } => {
            for warning in board.scan_warnings() {
                eprintln!("warning: {}", warning);
            }
            let view = board.view();
            let sounds = view.filter(tag.as_deref(), favorites);
            print_sounds(&sounds);
            println!("{} of {} sounds", sounds.len(), view.len());
        }
        Command::Search { query } => {
            let results = board.search(&query.join(" "));
            if results.is_empty() {
                println!("No matches");
            }
            print_sounds(&results.iter().collect::<Vec<_>>());
        }
        Command::Info { sound } => print_info(&board, &board.sound(&sound)?),
        Command::Tags => {
            let tags = board.all_tags();
            if tags.is_empty() {
                println!("No tags yet");
            }
            for (tag, count) in tags {
                println!("{:<20} {}", tag, count);
            }
            let orphans = board.orphaned();
            if !orphans.is_empty() {
                println!("\nMetadata kept for missing files: {}", orphans.join(", "));
            }
        }
        Command::Tag { action } => match action {
            TagAction::Add { sound, tags } => {
                board.add_tags(&sound, &tags)?;
                print_tags(&board.sound(&sound)?);
            }
            TagAction::Remove { sound, tags } => {
                board.remove_tags(&sound, &tags)?;
                print_tags(&board.sound(&sound)?);
            }
            TagAction::Set { sound, tags } => {
                board.set_tags(&sound, &tags)?;
                print_tags(&board.sound(&sound)?);
            }
        },
        Command::Favorite { sound, off } => {
            board.set_favorite(&sound, !off)?;
            let sound = board.sound(&sound)?;
            println!("{} {}", sound.name, if sound.favorite { "★" } else { "☆" });
        }
        Command::Favorites => print_sounds(&board.view().filter(None, true)),
        Command::Volume { level } => {
            if let Some(level) = level {
                board.set_volume(level)?;
            }
            println!("Volume: {:.0}%", board.volume() * 100.0);
        }
        Command::SoundVolume { sound, multiplier } => {
            if let Some(multiplier) = multiplier {
                board.set_sound_volume(&sound, multiplier)?;
            }
            let sound = board.sound(&sound)?;
            println!("{}: x{:.2}", sound.name, sound.volume);
        }
        Command::Bind { key, sound } => {
            let (combo, previous) = board.bind(&key, &sound)?;
            if let Some(previous) = previous {
                eprintln!("warning: {} was bound to '{}'", combo, previous);
            }
            println!("{} -> {}", combo, board.sound(&sound)?.name);
        }
        Command::Unbind { key, sound } => {
            if let Some(sound) = sound {
                let removed = board.unbind_sound(&sound)?;
                println!("Removed {} binding(s)", removed.len());
            } else if let Some(key) = key {
                match board.unbind(&key)? {
                    Some(previous) => println!("Unbound {} (was '{}')", key, previous),
                    None => println!("No custom binding on {}", key),
                }
            }
        }
        Command::Hotkeys => {
            println!("Mode: {}", board.hotkey_mode());
            print_bindings(&board.bindings());
            for (combo, sound) in board.dangling_bindings() {
                eprintln!("warning: {} points at missing sound '{}'", combo, sound);
            }
        }
        Command::HotkeysReset => {
            board.reset_hotkeys()?;
            println!("Custom hotkeys cleared");
        }
        Command::HotkeyMode { mode } => {
            board.set_hotkey_mode(mode)?;
            println!("Hotkey mode: {}", mode);
        }
        Command::Listen => listen(&board).await?,
        Command::Play { sound } => {
            board.play(&sound)?;
            print_status(&board);
            wait_for_playback(&board).await?;
        }
        Command::Stop => match board.stop() {
            Some(name) => println!("Stopped {}", name),
            None => println!("Nothing playing"),
        },
        Command::Queue { action } => queue_command(&board, action).await?,
        Command::Playlist { action } => playlist_command(&board, action)?,
        Command::Auto { sequential } => {
            if board.auto(sequential)? {
                print_status(&board);
                wait_for_playback(&board).await?;
            } else {
                println!("No sounds to play");
            }
        }
    }
    Ok(())
}

async fn queue_command(board: &Soundboard, action: QueueAction) -> muc::Result<()> {
    match action {
        QueueAction::Add { sounds } => {
            let added = board.queue_add(&sounds)?;
            println!("Queued: {}", added.join(", "));
        }
        QueueAction::Show => {
            let queue = board.queue();
            if queue.is_empty() {
                println!("Queue is empty");
            }
            for (i, name) in queue.entries().iter().enumerate() {
                let marker = if queue.cursor() == Some(i) { ">" } else { " " };
                println!("{} {:>3}. {}", marker, i + 1, name);
            }
            if !queue.is_empty() && queue.cursor().is_none() {
                println!("(finished)");
            }
        }
        QueueAction::Clear => {
            board.queue_clear()?;
            println!("Queue cleared");
        }
        QueueAction::Shuffle => {
            board.queue_shuffle()?;
            println!("Shuffled {} remaining", board.queue().remaining().len());
        }
        QueueAction::Skip => match board.queue_skip()? {
            SkipOutcome::Advanced(next) => println!("Next: {}", next),
            SkipOutcome::Exhausted => println!("End of queue"),
        },
        QueueAction::Play => {
            if board.queue_play()? {
                print_status(board);
                wait_for_playback(board).await?;
            } else {
                println!("Queue is empty");
            }
        }
    }
    Ok(())
}

fn playlist_command(board: &Soundboard, action: PlaylistAction) -> muc::Result<()> {
    match action {
        PlaylistAction::Save { name, replace } => {
            let count = board.playlist_save(&name, replace)?;
            println!("Saved '{}' ({} sounds)", name, count);
        }
        PlaylistAction::Load { name } => {
            let count = board.playlist_load(&name)?;
            println!("Queue replaced with '{}' ({} sounds)", name, count);
        }
        PlaylistAction::List => {
            let playlists = board.playlist_list();
            if playlists.is_empty() {
                println!("No playlists");
            }
            for (name, count) in playlists {
                println!("{:<24} {} sounds", name, count);
            }
        }
        PlaylistAction::Show { name } => {
            for (i, sound) in board.playlist_show(&name)?.iter().enumerate() {
                println!("{:>3}. {}", i + 1, sound);
            }
            if let Some(total) = board.playlist_duration(&name)? {
                println!("Total: {}", muc::audio::sound::format_duration(total));
            }
        }
        PlaylistAction::Delete { name } => {
            board.playlist_delete(&name)?;
            println!("Deleted '{}'", name);
        }
    }
    Ok(())
}

/// Drive completions until playback is idle; Ctrl+C stops early.
async fn wait_for_playback(board: &Soundboard) -> muc::Result<()> {
    tokio::select! {
        result = board.run_until_idle() => result,
        _ = tokio::signal::ctrl_c() => {
            board.stop();
            println!("\nStopped");
            Ok(())
        }
    }
}

#[cfg(feature = "listener")]
async fn listen(board: &Soundboard) -> muc::Result<()> {
    use muc::hotkeys::listener::terminal::{spawn_key_reader, RawModeGuard};
    use muc::hotkeys::HotkeyListener;
    use tokio::sync::mpsc;

    let listener = HotkeyListener::new(board);
    print_bindings(listener.bindings());
    println!("Listening for hotkeys. Esc to quit.");

    let (tx, rx) = mpsc::unbounded_channel();
    #[cfg(feature = "global-keys")]
    muc::hotkeys::listener::global::spawn_global_reader(tx.clone());

    let raw = RawModeGuard::enable()?;
    let reader = spawn_key_reader(tx, cfg!(feature = "global-keys"));
    listener.run(rx).await;
    drop(raw);

    match reader.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Key reader failed: {}", e),
        Err(e) => error!("Key reader panicked: {}", e),
    }
    Ok(())
}

#[cfg(not(feature = "listener"))]
async fn listen(_board: &Soundboard) -> muc::Result<()> {
    Err(muc::SoundboardError::DeviceUnavailable(
        "built without the `listener` feature".to_string(),
    ))
}

fn print_devices(devices: &[OutputDevice], selected: Option<usize>) {
    if devices.is_empty() {
        println!("No output devices found");
    }
    for device in devices {
        let mut notes = Vec::new();
        if device.is_default {
            notes.push("default");
        }
        if device.is_virtual_cable() {
            notes.push("virtual cable");
        }
        if selected == Some(device.id) {
            notes.push("selected");
        }
        let notes = if notes.is_empty() { String::new() } else { format!(" ({})", notes.join(", ")) };
        println!("{:>3}  {:<48} {} out{}", device.id, device.name, device.output_channels, notes);
    }
}

fn print_sounds(sounds: &[&Sound]) {
    for sound in sounds {
        let star = if sound.favorite { "★" } else { " " };
        let tags: Vec<&str> = sound.tags.iter().map(String::as_str).collect();
        println!(
            "{} {:<28} {:>8}  {:<5} {}",
            star,
            sound.name,
            sound.duration_string(),
            sound.format.label(),
            tags.join(", ")
        );
    }
}

fn print_tags(sound: &Sound) {
    let tags: Vec<&str> = sound.tags.iter().map(String::as_str).collect();
    println!("{}: [{}]", sound.name, tags.join(", "));
}

fn print_info(board: &Soundboard, sound: &Sound) {
    println!("Name:      {}", sound.name);
    println!("File:      {}", sound.file_path.display());
    println!("Format:    {}", sound.format.label());
    println!("Duration:  {}", sound.duration_string());
    println!("Favorite:  {}", if sound.favorite { "yes" } else { "no" });
    println!("Volume:    x{:.2}", sound.volume);
    println!("Plays:     {}", sound.play_count);
    print_tags(sound);

    let keys: Vec<String> = board
        .bindings()
        .iter()
        .filter(|(_, b)| b.sound == sound.name)
        .map(|(combo, _)| combo.to_string())
        .collect();
    if !keys.is_empty() {
        println!("Hotkeys:   {}", keys.join(", "));
    }
}

fn print_bindings(table: &BindingTable) {
    if table.is_empty() {
        println!("No hotkeys");
    }
    for (combo, binding) in table.iter() {
        println!("{:<24} {:<28} [{}]", combo.to_string(), binding.sound, binding.source);
    }
}

fn print_status(board: &Soundboard) {
    if let PlaybackStatus::Playing { sound, duration, volume, .. } = board.status() {
        let length = duration
            .map(muc::audio::sound::format_duration)
            .unwrap_or_else(|| "-".to_string());
        println!("▶ {} ({}, volume {:.0}%)", sound, length, volume * 100.0);
    }
}
