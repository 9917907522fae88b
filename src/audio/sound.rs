use super::AudioFormat;
use crate::metadata::SoundMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Lowercase, extension-stripped file stem. The key shared by catalog and metadata.
pub fn normalize_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?.trim();
    if stem.is_empty() {
        return None;
    }
    Some(stem.to_lowercase())
}

/// Normalize a user-typed name the same way the scanner normalizes file stems.
pub fn normalize_query_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Structural facts about one file, rebuilt on every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub name: String,
    pub file_path: PathBuf,
    pub format: AudioFormat,
    pub duration: Option<Duration>,
}

impl CatalogRecord {
    pub fn new(name: String, file_path: PathBuf) -> Self {
        let format = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Unknown);

        Self {
            name,
            file_path,
            format,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration;
        self
    }
}

/// A catalog record with its user metadata attached. What everything above the catalog sees.
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    pub name: String,
    pub file_path: PathBuf,
    pub format: AudioFormat,
    pub duration: Option<Duration>,
    pub tags: BTreeSet<String>,
    pub favorite: bool,
    pub volume: f32,
    pub play_count: u64,
}

impl Sound {
    pub fn from_parts(record: &CatalogRecord, metadata: SoundMetadata) -> Self {
        Self {
            name: record.name.clone(),
            file_path: record.file_path.clone(),
            format: record.format.clone(),
            duration: record.duration,
            tags: metadata.tags,
            favorite: metadata.favorite,
            volume: metadata.volume,
            play_count: metadata.play_count,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag.trim().to_lowercase())
    }

    pub fn duration_string(&self) -> String {
        match self.duration {
            Some(d) => format_duration(d),
            None => "-".to_string(),
        }
    }
}

pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let minutes = total / 60;
    let seconds = total % 60;
    let tenths = d.subsec_millis() / 100;
    format!("{}:{:02}.{}", minutes, seconds, tenths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name_lowercases_and_strips_extension() {
        assert_eq!(normalize_name(Path::new("/s/AirHorn.WAV")), Some("airhorn".to_string()));
        assert_eq!(normalize_name(Path::new("/s/sub/Boom Boom.mp3")), Some("boom boom".to_string()));
        assert_eq!(normalize_name(Path::new("/s/.wav")), Some(".wav".to_string()));
        assert_eq!(normalize_name(Path::new("/")), None);
    }

    #[test]
    fn test_record_picks_format_from_extension() {
        let record = CatalogRecord::new("cheer".into(), PathBuf::from("/s/cheer.M4A"));
        assert_eq!(record.format, AudioFormat::Mp4);
        assert_eq!(record.duration, None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(83_450)), "1:23.4");
        assert_eq!(format_duration(Duration::ZERO), "0:00.0");
    }
}
