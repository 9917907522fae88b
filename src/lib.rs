// muc - hotkey soundboard core
// Scan a folder of clips, tag them, bind them to keys and fire them at any output device

pub mod audio;     // scanning, playback sessions, queue and playlists
pub mod config;    // config.json and where everything lives
pub mod error;     // one error enum for the whole library
pub mod hotkeys;   // combos, bindings and the key listener
pub mod library;   // merged catalog view and search
pub mod logging;   // tracing setup for the binary
pub mod metadata;  // tags, favorites, volume trims, play counts
mod persist;
pub mod soundboard;

pub use audio::{AudioBackend, PlaybackStatus, Sound};
pub use config::{Config, HotkeyMode, Paths};
pub use error::{Result, SoundboardError};
pub use hotkeys::{HotkeyListener, KeyCombo};
pub use library::CatalogView;
pub use soundboard::Soundboard;
