//! Domain types for extracted target links.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category assigned to an accepted link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkCategory {
    /// Interactive content: `index.html` carrying a `data_url=` parameter.
    Game,
    /// Audio file link (.mp3, .wav, .ogg).
    Audio,
    /// Video file link (.mp4, .avi, .mov, .wmv, .flv, .webm).
    Video,
    /// Any other includable web link.
    Generic,
}

/// A classified target link.
///
/// Identity is the cleaned string, compared case-sensitively;
/// classification is case-insensitive but does not alter the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// The raw match as it appeared in the source, before cleaning.
    pub raw: String,
    /// The cleaned URL. Keys the link inside a [`LinkSet`].
    pub clean: String,
    /// Category assigned by the classifier.
    pub category: LinkCategory,
}

impl Link {
    /// Create a new link.
    pub fn new(raw: impl Into<String>, clean: impl Into<String>, category: LinkCategory) -> Self {
        Self {
            raw: raw.into(),
            clean: clean.into(),
            category,
        }
    }
}

/// Deduplicated collection of target links from one extraction pass.
///
/// Iteration order is lexicographic by cleaned URL. The rewriter applies
/// a first-match policy per paragraph, so the order must be fixed:
/// nondeterministic iteration would change rewrite outcomes on ties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkSet {
    links: BTreeMap<String, Link>,
}

impl LinkSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a link, keyed by its cleaned URL. Returns `false` if a
    /// link with the same cleaned URL was already present (first wins).
    pub fn insert(&mut self, link: Link) -> bool {
        if self.links.contains_key(&link.clean) {
            return false;
        }
        self.links.insert(link.clean.clone(), link);
        true
    }

    /// Whether a cleaned URL is already in the set.
    pub fn contains(&self, clean: &str) -> bool {
        self.links.contains_key(clean)
    }

    /// Number of unique links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Links in lexicographic order by cleaned URL.
    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Cleaned URLs in iteration order.
    pub fn clean_urls(&self) -> Vec<String> {
        self.links.keys().cloned().collect()
    }

    /// Look up a link by its cleaned URL.
    pub fn get(&self, clean: &str) -> Option<&Link> {
        self.links.get(clean)
    }
}

impl FromIterator<Link> for LinkSet {
    fn from_iter<I: IntoIterator<Item = Link>>(iter: I) -> Self {
        let mut set = LinkSet::new();
        for link in iter {
            set.insert(link);
        }
        set
    }
}
