// Per-sound user metadata - tags, favorites, volume trims, play counts
// Lives apart from the catalog so rescans never touch it

pub mod store;

pub use store::MetadataStore;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const SOUND_VOLUME_MAX: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundMetadata {
    pub tags: BTreeSet<String>,
    pub favorite: bool,
    pub volume: f32,
    pub play_count: u64,
}

impl Default for SoundMetadata {
    fn default() -> Self {
        Self {
            tags: BTreeSet::new(),
            favorite: false,
            volume: 1.0,
            play_count: 0,
        }
    }
}

impl SoundMetadata {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Lowercase, trim, drop empties and duplicates.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
