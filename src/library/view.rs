use crate::audio::{Catalog, Sound};
use crate::metadata::MetadataStore;
use std::collections::BTreeMap;

/// Catalog records joined with their metadata. Built fresh on demand, never cached.
#[derive(Debug, Clone, Default)]
pub struct CatalogView {
    sounds: BTreeMap<String, Sound>,
}

impl CatalogView {
    /// Catalog supplies path/format/duration, metadata supplies the user fields,
    /// missing metadata means defaults.
    pub fn merge(catalog: &Catalog, metadata: &MetadataStore) -> Self {
        let sounds = catalog
            .records()
            .map(|record| {
                let sound = Sound::from_parts(record, metadata.get(&record.name));
                (record.name.clone(), sound)
            })
            .collect();
        Self { sounds }
    }

    pub fn from_sounds(sounds: impl IntoIterator<Item = Sound>) -> Self {
        Self {
            sounds: sounds.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// All sounds, ascending by name.
    pub fn list(&self) -> Vec<&Sound> {
        self.sounds.values().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.sounds.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<&Sound> {
        self.sounds.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sounds.contains_key(name)
    }

    pub fn filter(&self, tag: Option<&str>, favorites_only: bool) -> Vec<&Sound> {
        self.sounds
            .values()
            .filter(|s| !favorites_only || s.favorite)
            .filter(|s| tag.map_or(true, |t| s.has_tag(t)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CatalogRecord;
    use tempfile::tempdir;

    fn catalog(names: &[&str]) -> Catalog {
        Catalog::from_records(
            names
                .iter()
                .map(|n| CatalogRecord::new(n.to_string(), format!("/sounds/{}.wav", n).into())),
        )
    }

    #[test]
    fn test_merge_attaches_metadata_and_defaults_the_rest() {
        let dir = tempdir().unwrap();
        let mut store = MetadataStore::load(&dir.path().join("metadata.json")).unwrap();
        store.set_tags("boom", ["loud"]).unwrap();
        store.set_favorite("boom", true).unwrap();
        store.set_favorite("orphan", true).unwrap();

        let view = CatalogView::merge(&catalog(&["cheer", "airhorn", "boom"]), &store);

        assert_eq!(view.names(), vec!["airhorn", "boom", "cheer"]);
        assert!(view.get("boom").unwrap().favorite);
        assert!(view.get("boom").unwrap().has_tag("LOUD"));
        assert_eq!(view.get("airhorn").unwrap().volume, 1.0);
        assert!(view.get("orphan").is_none());
    }

    #[test]
    fn test_merge_reflects_latest_metadata_write() {
        let dir = tempdir().unwrap();
        let mut store = MetadataStore::load(&dir.path().join("metadata.json")).unwrap();
        let cat = catalog(&["airhorn"]);

        assert_eq!(CatalogView::merge(&cat, &store).get("airhorn").unwrap().play_count, 0);
        store.increment_play_count("airhorn").unwrap();
        assert_eq!(CatalogView::merge(&cat, &store).get("airhorn").unwrap().play_count, 1);
    }

    #[test]
    fn test_filter_by_tag_and_favorites() {
        let dir = tempdir().unwrap();
        let mut store = MetadataStore::load(&dir.path().join("metadata.json")).unwrap();
        store.set_tags("airhorn", ["meme"]).unwrap();
        store.set_tags("boom", ["meme"]).unwrap();
        store.set_favorite("boom", true).unwrap();
        store.set_favorite("cheer", true).unwrap();

        let view = CatalogView::merge(&catalog(&["airhorn", "boom", "cheer"]), &store);
        let names = |v: Vec<&Sound>| v.into_iter().map(|s| s.name.clone()).collect::<Vec<_>>();

        assert_eq!(names(view.filter(Some("meme"), false)), vec!["airhorn", "boom"]);
        assert_eq!(names(view.filter(None, true)), vec!["boom", "cheer"]);
        assert_eq!(names(view.filter(Some("meme"), true)), vec!["boom"]);
        assert_eq!(view.filter(None, false).len(), 3);
    }
}
