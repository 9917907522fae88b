use crate::error::{Result, SoundboardError};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipOutcome {
    /// The cursor moved onto this entry.
    Advanced(String),
    /// The cursor walked off the end.
    Exhausted,
}

/// The live play queue.
///
/// `cursor` is the entry currently playing or next to play; `None` means
/// there is nothing left (empty or exhausted). Stored as `queue.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Queue {
    entries: Vec<String>,
    cursor: Option<usize>,

    // Whether the cursor entry is the one on air right now
    #[serde(skip)]
    started: bool,
}

impl Queue {
    pub fn from_entries(entries: Vec<String>) -> Self {
        let cursor = if entries.is_empty() { None } else { Some(0) };
        Self {
            entries,
            cursor,
            started: false,
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&str> {
        self.cursor.and_then(|i| self.entries.get(i)).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries still to play, including the one under the cursor.
    pub fn remaining(&self) -> &[String] {
        match self.cursor {
            Some(i) => &self.entries[i.min(self.entries.len())..],
            None => &[],
        }
    }

    /// Append entries. An exhausted queue resumes at the first new entry.
    pub fn add<I: IntoIterator<Item = String>>(&mut self, names: I) {
        let before = self.entries.len();
        self.entries.extend(names);
        if self.cursor.is_none() && self.entries.len() > before {
            self.cursor = Some(before);
            self.started = false;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.started = false;
    }

    /// Shuffle the part that hasn't played yet. A playing cursor entry stays put.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let Some(cursor) = self.cursor else {
            return;
        };
        let from = if self.started { cursor + 1 } else { cursor };
        if from < self.entries.len() {
            self.entries[from..].shuffle(rng);
        }
    }

    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// Move past the cursor entry.
    pub fn skip(&mut self) -> Result<SkipOutcome> {
        if self.cursor.is_none() {
            return Err(SoundboardError::QueueEmpty);
        }
        Ok(match self.advance() {
            Some(name) => SkipOutcome::Advanced(name.to_string()),
            None => SkipOutcome::Exhausted,
        })
    }

    /// Step to the next entry after a completion or skip.
    pub(crate) fn advance(&mut self) -> Option<&str> {
        self.started = false;
        let next = self.cursor.map_or(0, |i| i + 1);
        self.cursor = (next < self.entries.len()).then_some(next);
        self.current()
    }

    /// Rewind an exhausted queue to its first entry.
    pub(crate) fn rewind(&mut self) {
        self.cursor = if self.entries.is_empty() { None } else { Some(0) };
        self.started = false;
    }

    /// The cursor entry is the one on air.
    pub(crate) fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.started = false;
    }

    /// Take the on-air flag from `live` when this copy still points at the same entry.
    pub(crate) fn synced_with(mut self, live: &Queue) -> Self {
        self.started = live.started && self.cursor == live.cursor && self.current() == live.current();
        self
    }

    /// Repair a cursor that points past the end of a hand-edited file.
    pub(crate) fn sanitize(mut self) -> Self {
        if self.cursor.map_or(false, |i| i >= self.entries.len()) {
            self.cursor = None;
        }
        self
    }
}
