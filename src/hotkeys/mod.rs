// Hotkey bindings: generated defaults, persisted custom overrides and the merge between them

pub mod combo;
pub mod listener;

pub use combo::{BaseKey, KeyCombo, Modifier, NamedKey};
pub use listener::{HotkeyListener, ListenerInput};

use crate::audio::sound::normalize_query_name;
use crate::config::HotkeyMode;
use crate::error::{Result, SoundboardError};
use crate::library::CatalogView;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

pub const DEFAULT_BINDING_COUNT: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    Default,
    Custom,
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingSource::Default => f.write_str("default"),
            BindingSource::Custom => f.write_str("custom"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub sound: String,
    pub source: BindingSource,
}

/// At most one sound per combo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    entries: BTreeMap<KeyCombo, Binding>,
}

impl BindingTable {
    pub fn get(&self, combo: &KeyCombo) -> Option<&Binding> {
        self.entries.get(combo)
    }

    pub fn sound_for(&self, combo: &KeyCombo) -> Option<&str> {
        self.get(combo).map(|b| b.sound.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyCombo, &Binding)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, combo: KeyCombo, sound: String, source: BindingSource) {
        self.entries.insert(combo, Binding { sound, source });
    }
}

/// First ten sounds by name on F1..F10. Recomputed from the view, never stored.
pub fn default_bindings(view: &CatalogView) -> BindingTable {
    let mut table = BindingTable::default();
    for (n, name) in (1..=DEFAULT_BINDING_COUNT).zip(view.names()) {
        table.insert(KeyCombo::function(n), name, BindingSource::Default);
    }
    table
}

/// Combine the two sets according to `mode`. Custom wins on collision when merged.
pub fn resolve(mode: HotkeyMode, defaults: &BindingTable, custom: &CustomBindings) -> BindingTable {
    let mut table = BindingTable::default();
    if matches!(mode, HotkeyMode::Default | HotkeyMode::Merged) {
        table.entries.extend(defaults.iter().map(|(c, b)| (c.clone(), b.clone())));
    }
    if matches!(mode, HotkeyMode::Custom | HotkeyMode::Merged) {
        for (combo, sound) in custom.iter() {
            table.insert(combo.clone(), sound.to_string(), BindingSource::Custom);
        }
    }
    table
}

/// User-defined combo -> sound bindings, as stored in the config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomBindings {
    entries: BTreeMap<KeyCombo, String>,
}

impl CustomBindings {
    /// Entries that no longer parse are skipped with a warning.
    pub fn from_config(raw: &BTreeMap<String, String>) -> Self {
        let mut entries = BTreeMap::new();
        for (combo, sound) in raw {
            match KeyCombo::parse(combo) {
                Ok(parsed) => {
                    entries.insert(parsed, sound.clone());
                }
                Err(e) => warn!("Ignoring stored hotkey: {}", e),
            }
        }
        Self { entries }
    }

    pub fn to_config(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(combo, sound)| (combo.to_string(), sound.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&KeyCombo, &str)> {
        self.entries.iter().map(|(c, s)| (c, s.as_str()))
    }

    pub fn get(&self, combo: &KeyCombo) -> Option<&str> {
        self.entries.get(combo).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bind `combo` to `sound`, replacing any earlier custom binding on the same combo.
    /// Returns the canonical combo and the sound it used to point at.
    pub fn bind(
        &mut self,
        combo: &str,
        sound: &str,
        view: &CatalogView,
    ) -> Result<(KeyCombo, Option<String>)> {
        let combo = KeyCombo::parse(combo)?;
        let sound = normalize_query_name(sound);
        if !view.contains(&sound) {
            return Err(SoundboardError::SoundNotFound(sound));
        }
        let previous = self.entries.insert(combo.clone(), sound);
        Ok((combo, previous))
    }

    pub fn unbind(&mut self, combo: &str) -> Result<Option<String>> {
        let combo = KeyCombo::parse(combo)?;
        Ok(self.entries.remove(&combo))
    }

    /// Drop every binding that targets `sound`; returns the combos removed.
    pub fn unbind_sound(&mut self, sound: &str) -> Vec<KeyCombo> {
        let sound = normalize_query_name(sound);
        let removed: Vec<KeyCombo> = self
            .entries
            .iter()
            .filter(|(_, s)| **s == sound)
            .map(|(c, _)| c.clone())
            .collect();
        for combo in &removed {
            self.entries.remove(combo);
        }
        removed
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Bindings whose sound has gone missing from the view. Reported, never removed.
    pub fn dangling(&self, view: &CatalogView) -> Vec<(KeyCombo, String)> {
        self.entries
            .iter()
            .filter(|(_, sound)| !view.contains(sound))
            .map(|(c, s)| (c.clone(), s.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFormat, Sound};

    fn view(names: &[&str]) -> CatalogView {
        CatalogView::from_sounds(names.iter().map(|name| Sound {
            name: name.to_string(),
            file_path: format!("/sounds/{}.wav", name).into(),
            format: AudioFormat::Wav,
            duration: None,
            tags: Default::default(),
            favorite: false,
            volume: 1.0,
            play_count: 0,
        }))
    }

    fn f(n: u8) -> KeyCombo {
        KeyCombo::function(n)
    }

    #[test]
    fn test_defaults_cover_first_ten_sorted_sounds() {
        let names: Vec<String> = (0..12).map(|i| format!("s{:02}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let table = default_bindings(&view(&refs));

        assert_eq!(table.len(), 10);
        assert_eq!(table.sound_for(&f(1)), Some("s00"));
        assert_eq!(table.sound_for(&f(10)), Some("s09"));
        assert_eq!(table.sound_for(&f(11)), None);
    }

    #[test]
    fn test_custom_binding_shadows_default_in_merged_mode() {
        let view = view(&["airhorn", "boom", "cheer"]);
        let defaults = default_bindings(&view);
        assert_eq!(defaults.sound_for(&f(1)), Some("airhorn"));
        assert_eq!(defaults.sound_for(&f(2)), Some("boom"));
        assert_eq!(defaults.sound_for(&f(3)), Some("cheer"));

        let mut custom = CustomBindings::default();
        let (combo, previous) = custom.bind("f1", "cheer", &view).unwrap();
        assert_eq!(combo, f(1));
        assert_eq!(previous, None);

        let table = resolve(HotkeyMode::Merged, &defaults, &custom);
        assert_eq!(table.sound_for(&f(1)), Some("cheer"));
        assert_eq!(table.get(&f(1)).unwrap().source, BindingSource::Custom);
        assert_eq!(table.sound_for(&f(2)), Some("boom"));
        assert_eq!(table.sound_for(&f(3)), Some("cheer"));
    }

    #[test]
    fn test_resolve_modes_ignore_the_other_set() {
        let view = view(&["airhorn", "boom", "cheer"]);
        let defaults = default_bindings(&view);
        let mut custom_a = CustomBindings::default();
        custom_a.bind("ctrl+a", "boom", &view).unwrap();
        let mut custom_b = CustomBindings::default();
        custom_b.bind("f2", "airhorn", &view).unwrap();

        assert_eq!(
            resolve(HotkeyMode::Default, &defaults, &custom_a),
            resolve(HotkeyMode::Default, &defaults, &custom_b)
        );
        assert_eq!(
            resolve(HotkeyMode::Custom, &defaults, &custom_a),
            resolve(HotkeyMode::Custom, &BindingTable::default(), &custom_a)
        );
        assert_eq!(resolve(HotkeyMode::Custom, &defaults, &custom_a).len(), 1);
    }

    #[test]
    fn test_rebinding_returns_previous_target() {
        let view = view(&["airhorn", "boom"]);
        let mut custom = CustomBindings::default();
        custom.bind("ctrl+1", "airhorn", &view).unwrap();
        let (_, previous) = custom.bind("<CTRL>+1", "boom", &view).unwrap();
        assert_eq!(previous.as_deref(), Some("airhorn"));
        assert_eq!(custom.len(), 1);
    }

    #[test]
    fn test_bind_validates_combo_and_sound() {
        let view = view(&["airhorn"]);
        let mut custom = CustomBindings::default();
        let err = custom.bind("ctrl+", "airhorn", &view).unwrap_err();
        assert_eq!(err.kind(), "invalid-key-combo");
        let err = custom.bind("f4", "nope", &view).unwrap_err();
        assert!(matches!(err, SoundboardError::SoundNotFound(name) if name == "nope"));
        assert!(custom.is_empty());
    }

    #[test]
    fn test_unbind_sound_and_reset() {
        let view = view(&["airhorn", "boom"]);
        let mut custom = CustomBindings::default();
        custom.bind("f1", "boom", &view).unwrap();
        custom.bind("f2", "boom", &view).unwrap();
        custom.bind("f3", "airhorn", &view).unwrap();

        assert_eq!(custom.unbind_sound("BOOM"), vec![f(1), f(2)]);
        assert_eq!(custom.unbind("f3").unwrap().as_deref(), Some("airhorn"));
        assert_eq!(custom.unbind("f3").unwrap(), None);

        custom.bind("f5", "airhorn", &view).unwrap();
        custom.reset();
        assert!(custom.is_empty());
    }

    #[test]
    fn test_dangling_bindings_are_reported_not_removed() {
        let mut custom = CustomBindings::default();
        custom.bind("f1", "boom", &view(&["boom"])).unwrap();

        let rescanned = view(&["airhorn"]);
        assert_eq!(custom.dangling(&rescanned), vec![(f(1), "boom".to_string())]);
        assert_eq!(custom.get(&f(1)), Some("boom"));
    }

    #[test]
    fn test_config_round_trip_skips_malformed_entries() {
        let mut raw = BTreeMap::new();
        raw.insert("Shift+Ctrl+X".to_string(), "boom".to_string());
        raw.insert("not a key".to_string(), "boom".to_string());

        let custom = CustomBindings::from_config(&raw);
        assert_eq!(custom.len(), 1);
        let stored = custom.to_config();
        assert_eq!(stored.get("<ctrl>+<shift>+x").map(String::as_str), Some("boom"));
    }
}
