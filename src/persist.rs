// JSON file helpers shared by config, metadata, playlists and the live queue
// Writes go to a sibling temp file first so a crash never leaves half a document behind

use crate::error::{Result, SoundboardError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read `path` as JSON, or `T::default()` when the file doesn't exist yet.
pub(crate) fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        debug!("{} not found, starting from defaults", path.display());
        return Ok(T::default());
    }

    let content = fs::read_to_string(path).map_err(|e| SoundboardError::persistence(path, e))?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(&content)
        .map_err(|e| SoundboardError::persistence(path, format!("malformed JSON: {}", e)))
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SoundboardError::persistence(parent, e))?;
    }

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| SoundboardError::persistence(path, e))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| SoundboardError::persistence(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| SoundboardError::persistence(path, e))?;
    Ok(())
}
