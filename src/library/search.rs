use super::CatalogView;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::cmp::Ordering;
use tracing::debug;

// Shorter queries must match by prefix or subsequence, never by edit distance
const MIN_FUZZY_QUERY_LEN: usize = 3;

/// Fuzzy lookup over sound names and tags.
pub struct SearchIndex<'a> {
    view: &'a CatalogView,
    matcher: SkimMatcherV2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rank {
    prefix: bool,
    distance: usize,
    favorite: bool,
    name: String,
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .prefix
            .cmp(&self.prefix)
            .then(self.distance.cmp(&other.distance))
            .then(other.favorite.cmp(&self.favorite))
            .then(self.name.cmp(&other.name))
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> SearchIndex<'a> {
    pub fn new(view: &'a CatalogView) -> Self {
        Self {
            view,
            matcher: SkimMatcherV2::default(),
        }
    }

    /// Ranked sound names: prefix hits, then closest spelling, then favorites, then by name.
    pub fn search(&self, query: &str) -> Vec<String> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        let query_len = query.chars().count();
        let max_distance = if query_len >= MIN_FUZZY_QUERY_LEN { (query_len / 3).max(1) } else { 0 };

        let mut ranked: Vec<Rank> = Vec::new();
        for sound in self.view.list() {
            let best = std::iter::once(sound.name.as_str())
                .chain(sound.tags.iter().map(String::as_str))
                .filter_map(|field| self.score_field(&query, field, max_distance))
                .min();

            if let Some((prefix_miss, distance)) = best {
                ranked.push(Rank {
                    prefix: !prefix_miss,
                    distance,
                    favorite: sound.favorite,
                    name: sound.name.clone(),
                });
            }
        }

        ranked.sort();
        debug!("Search '{}' matched {} sounds", query, ranked.len());
        ranked.into_iter().map(|r| r.name).collect()
    }

    // (is not a prefix, edit distance), or None when the field doesn't match at all
    fn score_field(&self, query: &str, field: &str, max_distance: usize) -> Option<(bool, usize)> {
        let field = field.to_lowercase();
        let prefix = field.starts_with(query);

        let head: String = field.chars().take(query.chars().count()).collect();
        let distance = strsim::levenshtein(query, &field).min(strsim::levenshtein(query, &head));

        let subsequence = self.matcher.fuzzy_match(&field, query).is_some();
        let near_miss = max_distance > 0 && distance <= max_distance;
        if prefix || subsequence || near_miss {
            Some((!prefix, distance))
        } else {
            None
        }
    }
}
