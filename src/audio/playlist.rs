use crate::error::{Result, SoundboardError};
use crate::library::CatalogView;
use crate::persist;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Named snapshots of the queue, kept in `playlists.json` as `{name: [sound, ...]}`.
#[derive(Debug)]
pub struct PlaylistStore {
    path: PathBuf,
    playlists: BTreeMap<String, Vec<String>>,
}

impl PlaylistStore {
    pub fn load(path: &Path) -> Result<Self> {
        let playlists: BTreeMap<String, Vec<String>> = persist::read_json_or_default(path)?;
        info!("Loaded {} playlists from {}", playlists.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            playlists,
        })
    }

    /// Save a snapshot under `name`. An existing playlist is only overwritten with `replace`.
    pub fn save(&mut self, name: &str, entries: Vec<String>, replace: bool) -> Result<()> {
        let name = name.trim().to_string();
        if self.playlists.contains_key(&name) && !replace {
            return Err(SoundboardError::PlaylistNameCollision(name));
        }

        let mut next = self.playlists.clone();
        let count = entries.len();
        next.insert(name.clone(), entries);
        persist::write_json(&self.path, &next)?;
        self.playlists = next;
        info!("Saved playlist '{}' with {} sounds", name, count);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&[String]> {
        self.playlists
            .get(name.trim())
            .map(Vec::as_slice)
            .ok_or_else(|| SoundboardError::PlaylistNotFound(name.trim().to_string()))
    }

    /// Names with their lengths, ascending by name.
    pub fn list(&self) -> Vec<(&str, usize)> {
        self.playlists
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.len()))
            .collect()
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if !self.playlists.contains_key(name) {
            return Err(SoundboardError::PlaylistNotFound(name.to_string()));
        }

        let mut next = self.playlists.clone();
        next.remove(name);
        persist::write_json(&self.path, &next)?;
        self.playlists = next;
        info!("Deleted playlist '{}'", name);
        Ok(())
    }

    /// Sum of the known durations of the entries still in the catalog.
    pub fn total_duration(&self, name: &str, view: &CatalogView) -> Result<Option<Duration>> {
        let total: Duration = self
            .get(name)?
            .iter()
            .filter_map(|sound| view.get(sound).and_then(|s| s.duration))
            .sum();
        Ok((!total.is_zero()).then_some(total))
    }
}
