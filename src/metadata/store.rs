use super::{normalize_tags, SoundMetadata, SOUND_VOLUME_MAX};
use crate::audio::Catalog;
use crate::error::{Result, SoundboardError};
use crate::persist;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Metadata keyed by sound name, written through to disk on every change.
///
/// Entries whose sound disappeared from the catalog are kept as-is, so a file that comes
/// back under the same name picks its tags and counts back up.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    entries: BTreeMap<String, SoundMetadata>,
}

impl MetadataStore {
    pub fn load(path: &Path) -> Result<Self> {
        let entries: BTreeMap<String, SoundMetadata> = persist::read_json_or_default(path)?;
        info!("Loaded metadata for {} sounds from {}", entries.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Write every entry to disk.
    pub fn save(&self) -> Result<()> {
        persist::write_json(&self.path, &self.entries)
    }

    pub fn get(&self, name: &str) -> SoundMetadata {
        self.entries.get(name).cloned().unwrap_or_default()
    }

    pub fn set_tags<I, S>(&mut self, name: &str, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = normalize_tags(tags);
        self.mutate(name, |meta| meta.tags = tags)
    }

    pub fn add_tags<I, S>(&mut self, name: &str, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = normalize_tags(tags);
        self.mutate(name, |meta| meta.tags.extend(tags))
    }

    pub fn remove_tags<I, S>(&mut self, name: &str, tags: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = normalize_tags(tags);
        self.mutate(name, |meta| meta.tags.retain(|t| !tags.contains(t)))
    }

    pub fn set_favorite(&mut self, name: &str, favorite: bool) -> Result<()> {
        self.mutate(name, |meta| meta.favorite = favorite)
    }

    pub fn set_volume(&mut self, name: &str, multiplier: f32) -> Result<()> {
        if !(0.0..=SOUND_VOLUME_MAX).contains(&multiplier) {
            return Err(SoundboardError::InvalidVolume {
                value: multiplier,
                min: 0.0,
                max: SOUND_VOLUME_MAX,
            });
        }
        self.mutate(name, |meta| meta.volume = multiplier)
    }

    pub fn increment_play_count(&mut self, name: &str) -> Result<u64> {
        self.mutate(name, |meta| meta.play_count = meta.play_count.saturating_add(1))?;
        Ok(self.get(name).play_count)
    }

    /// Names that have metadata but no file in `catalog`.
    pub fn orphaned(&self, catalog: &Catalog) -> Vec<String> {
        self.entries
            .keys()
            .filter(|name| !catalog.contains(name))
            .cloned()
            .collect()
    }

    /// Every tag in use with the number of sounds carrying it.
    pub fn all_tags(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for meta in self.entries.values() {
            for tag in &meta.tags {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    // A failed write puts the previous entries back, so memory keeps matching disk
    fn mutate<F: FnOnce(&mut SoundMetadata)>(&mut self, name: &str, f: F) -> Result<()> {
        let mut next = self.entries.clone();
        let entry = next.entry(name.to_string()).or_default();
        f(entry);
        if entry.is_default() {
            next.remove(name);
        }

        let previous = std::mem::replace(&mut self.entries, next);
        if let Err(e) = self.save() {
            self.entries = previous;
            return Err(e);
        }
        debug!("Updated metadata for '{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CatalogRecord;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> MetadataStore {
        MetadataStore::load(&dir.join("metadata.json")).unwrap()
    }

    #[test]
    fn test_get_defaults_for_unknown_sound() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let meta = store.get("airhorn");
        assert!(meta.tags.is_empty());
        assert!(!meta.favorite);
        assert_eq!(meta.volume, 1.0);
        assert_eq!(meta.play_count, 0);
    }

    #[test]
    fn test_volume_round_trips_and_rejects_out_of_range() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());

        store.set_volume("boom", 1.75).unwrap();
        assert_eq!(store.get("boom").volume, 1.75);

        let err = store.set_volume("boom", 2.5).unwrap_err();
        assert!(matches!(err, SoundboardError::InvalidVolume { .. }));
        assert_eq!(store.get("boom").volume, 1.75);

        let reloaded = store_in(dir.path());
        assert_eq!(reloaded.get("boom").volume, 1.75);
    }

    #[test]
    fn test_every_mutation_is_durable() {
        let dir = tempdir().unwrap();
        {
            let mut store = store_in(dir.path());
            store.set_tags("cheer", ["Crowd", "happy"]).unwrap();
            store.add_tags("cheer", ["loud"]).unwrap();
            store.remove_tags("cheer", ["HAPPY"]).unwrap();
            store.set_favorite("cheer", true).unwrap();
            store.increment_play_count("cheer").unwrap();
            store.increment_play_count("cheer").unwrap();
        }

        let store = store_in(dir.path());
        let meta = store.get("cheer");
        assert_eq!(meta.tags.iter().cloned().collect::<Vec<_>>(), vec!["crowd", "loud"]);
        assert!(meta.favorite);
        assert_eq!(meta.play_count, 2);
    }

    #[test]
    fn test_file_matches_documented_schema() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.set_tags("airhorn", ["meme"]).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("metadata.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["airhorn"]["tags"][0], "meme");
        assert_eq!(json["airhorn"]["favorite"], false);
        assert_eq!(json["airhorn"]["volume"], 1.0);
        assert_eq!(json["airhorn"]["play_count"], 0);
    }

    #[test]
    fn test_orphans_are_kept_and_reported() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.set_favorite("gone", true).unwrap();
        store.set_favorite("here", true).unwrap();

        let catalog = Catalog::from_records(vec![CatalogRecord::new("here".into(), dir.path().join("here.wav"))]);

        assert_eq!(store.orphaned(&catalog), vec!["gone".to_string()]);
        assert!(store.get("gone").favorite);
    }

    #[test]
    fn test_save_writes_current_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let mut store = MetadataStore::load(&path).unwrap();
        store.set_favorite("boom", true).unwrap();
        std::fs::remove_file(&path).unwrap();

        store.save().unwrap();
        assert!(MetadataStore::load(&path).unwrap().get("boom").favorite);
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a dir").unwrap();

        let mut store = MetadataStore::load(&blocker.join("metadata.json")).unwrap();
        let err = store.set_favorite("boom", true).unwrap_err();

        assert_eq!(err.kind(), "persistence");
        assert!(!store.get("boom").favorite);
    }

    #[test]
    fn test_all_tags_counts_usage() {
        let dir = tempdir().unwrap();
        let mut store = store_in(dir.path());
        store.set_tags("a", ["meme", "loud"]).unwrap();
        store.set_tags("b", ["meme"]).unwrap();

        let tags = store.all_tags();
        assert_eq!(tags.get("meme"), Some(&2));
        assert_eq!(tags.get("loud"), Some(&1));
    }
}
