// Configuration management for muc
// Loaded once at startup; every setter persists before returning

use crate::error::{Result, SoundboardError};
use crate::persist;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;

pub const GLOBAL_VOLUME_MAX: f32 = 1.0;

/// Which binding sets are active when the listener resolves hotkeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotkeyMode {
    Default,
    Custom,
    #[default]
    Merged,
}

impl std::str::FromStr for HotkeyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(HotkeyMode::Default),
            "custom" => Ok(HotkeyMode::Custom),
            "merged" => Ok(HotkeyMode::Merged),
            other => Err(format!("unknown hotkey mode '{}' (default|custom|merged)", other)),
        }
    }
}

impl std::fmt::Display for HotkeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HotkeyMode::Default => "default",
            HotkeyMode::Custom => "custom",
            HotkeyMode::Merged => "merged",
        };
        f.write_str(s)
    }
}

/// Where everything lives: `--home`, then `$MUC_HOME`, then `~/.muc`.
#[derive(Debug, Clone)]
pub struct Paths {
    pub home: PathBuf,
}

impl Paths {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        if let Some(home) = explicit {
            return Self::new(home);
        }
        if let Some(home) = env::var_os("MUC_HOME") {
            return Self::new(PathBuf::from(home));
        }
        let home = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".muc");
        Self::new(home)
    }

    pub fn config_file(&self) -> PathBuf {
        self.home.join("config.json")
    }

    pub fn metadata_file(&self) -> PathBuf {
        self.home.join("metadata.json")
    }

    pub fn playlists_file(&self) -> PathBuf {
        self.home.join("playlists.json")
    }

    pub fn queue_file(&self) -> PathBuf {
        self.home.join("queue.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.home.join("logs")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_device_id: Option<usize>,
    pub sounds_dir: PathBuf,
    pub volume: f32,
    /// Custom bindings, canonical combo string -> sound name.
    pub hotkeys: BTreeMap<String, String>,
    pub hotkey_mode: HotkeyMode,

    #[serde(skip)]
    path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_device_id: None,
            sounds_dir: env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("sounds"),
            volume: 1.0,
            hotkeys: BTreeMap::new(),
            hotkey_mode: HotkeyMode::default(),
            path: PathBuf::new(),
        }
    }
}

impl Config {
    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: Config = persist::read_json_or_default(path)?;
        config.path = path.to_path_buf();
        // Hand-edited files can carry out-of-range values; keep what we can use
        config.volume = config.volume.clamp(0.0, GLOBAL_VOLUME_MAX);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        persist::write_json(&self.path, self)?;
        info!("Saved config to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_output_device(&mut self, device_id: usize) -> Result<()> {
        self.update(|c| c.output_device_id = Some(device_id))
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<()> {
        if !(0.0..=GLOBAL_VOLUME_MAX).contains(&volume) {
            return Err(SoundboardError::InvalidVolume {
                value: volume,
                min: 0.0,
                max: GLOBAL_VOLUME_MAX,
            });
        }
        self.update(|c| c.volume = volume)
    }

    pub fn set_sounds_dir(&mut self, dir: PathBuf) -> Result<()> {
        self.update(|c| c.sounds_dir = dir)
    }

    pub fn set_hotkey_mode(&mut self, mode: HotkeyMode) -> Result<()> {
        self.update(|c| c.hotkey_mode = mode)
    }

    pub fn set_hotkeys(&mut self, hotkeys: BTreeMap<String, String>) -> Result<()> {
        self.update(|c| c.hotkeys = hotkeys)
    }

    // Apply to a copy, persist, then commit so a failed write changes nothing
    fn update<F: FnOnce(&mut Config)>(&mut self, f: F) -> Result<()> {
        let mut next = self.clone();
        f(&mut next);
        next.save()?;
        *self = next;
        Ok(())
    }
}
