//! Lexical highlight matching against a page's text regions.
//!
//! Two policies pick which regions to mark:
//! - `Coverage`, for free-text queries: regions containing enough of the
//!   query's distinctive words, ranked by how many they contain
//! - `Ratio`, for known-relevant snippets: regions containing at least two
//!   thirds of the snippet's distinctive words, ranked by that ratio
//!
//! Matching is case-insensitive substring containment per word.

pub mod regions;
pub mod schedule;
pub mod tabs;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use regions::{HtmlPage, RegionError, RegionId, TextRegion, TextRegionProvider};

/// Class carried by marked regions in the host page.
pub const HIGHLIGHT_CLASS: &str = "web-memory-highlight";

/// Minimum length of a distinctive word (characters)
const MIN_WORD_LENGTH: usize = 5;

/// Parent elements whose text is never content
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript"];

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("word regex is valid"));

/// Region selection policy.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchPolicy {
    /// Free-text query highlighting
    Coverage,
    /// Snippet highlighting; stoplist words are ignored unless nothing else is left
    Ratio { stoplist: Vec<String> },
}

/// Wire name of a policy; the ratio stoplist comes from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    #[default]
    Coverage,
    Ratio,
}

impl MatchPolicy {
    pub fn from_kind(kind: PolicyKind, stoplist: &[String]) -> Self {
        match kind {
            PolicyKind::Coverage => MatchPolicy::Coverage,
            PolicyKind::Ratio => MatchPolicy::Ratio {
                stoplist: stoplist.to_vec(),
            },
        }
    }

    fn max_words(&self) -> usize {
        match self {
            MatchPolicy::Coverage => 5,
            MatchPolicy::Ratio { .. } => 3,
        }
    }

    fn max_regions(&self) -> usize {
        match self {
            MatchPolicy::Coverage => 20,
            MatchPolicy::Ratio { .. } => 5,
        }
    }
}

/// Per-region score, computed at highlight time and never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightCandidate {
    pub id: RegionId,
    pub match_count: usize,
    pub match_ratio: f32,
}

/// Regions chosen for marking, best first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub ids: Vec<RegionId>,
    /// Region to bring into view
    pub focus: Option<RegionId>,
    /// Distinctive words the regions were matched on
    pub words: Vec<String>,
}

impl Selection {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Lower-cased words of at least 5 characters, deduplicated, in order of
/// first appearance.
pub fn long_words(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut words: Vec<String> = Vec::new();

    for m in WORD_RE.find_iter(&lowered) {
        let word = m.as_str();
        if word.chars().count() >= MIN_WORD_LENGTH && !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }

    words
}

/// Distinctive words a policy matches on.
pub fn distinctive_words(text: &str, policy: &MatchPolicy) -> Vec<String> {
    let all = long_words(text);

    let mut words = match policy {
        MatchPolicy::Coverage => all,
        MatchPolicy::Ratio { stoplist } => {
            let filtered: Vec<String> = all
                .iter()
                .filter(|word| !stoplist.iter().any(|stop| stop.eq_ignore_ascii_case(word)))
                .cloned()
                .collect();

            if filtered.is_empty() {
                all
            } else {
                filtered
            }
        }
    };

    words.truncate(policy.max_words());
    words
}

fn is_content_region(region: &TextRegion) -> bool {
    !region.highlighted
        && !region.text.trim().is_empty()
        && !NON_CONTENT_TAGS
            .iter()
            .any(|tag| region.parent_tag.eq_ignore_ascii_case(tag))
}

/// Score regions against `query` and pick the ones to mark.
///
/// An empty selection is a normal outcome: nothing qualified.
pub fn select_regions(regions: &[TextRegion], query: &str, policy: &MatchPolicy) -> Selection {
    let words = distinctive_words(query, policy);
    if words.is_empty() {
        return Selection::default();
    }

    let total = words.len();
    let min_matches = match policy {
        MatchPolicy::Coverage if total == 1 => 1,
        MatchPolicy::Coverage => 2,
        // at least two thirds, rounded up
        MatchPolicy::Ratio { .. } => (total * 2).div_ceil(3),
    };

    let mut candidates: Vec<HighlightCandidate> = regions
        .iter()
        .filter(|region| is_content_region(region))
        .filter_map(|region| {
            let text = region.text.to_lowercase();
            let match_count = words.iter().filter(|w| text.contains(w.as_str())).count();

            (match_count >= min_matches).then(|| HighlightCandidate {
                id: region.id,
                match_count,
                match_ratio: match_count as f32 / total as f32,
            })
        })
        .collect();

    match policy {
        MatchPolicy::Coverage => candidates.sort_by(|a, b| b.match_count.cmp(&a.match_count)),
        MatchPolicy::Ratio { .. } => candidates.sort_by(|a, b| {
            b.match_ratio
                .total_cmp(&a.match_ratio)
                .then_with(|| b.match_count.cmp(&a.match_count))
        }),
    }
    candidates.truncate(policy.max_regions());

    let ids: Vec<RegionId> = candidates.iter().map(|c| c.id).collect();
    Selection {
        focus: ids.first().copied(),
        ids,
        words,
    }
}

/// Undo every mark currently present on the page.
pub fn clear_highlights<P: TextRegionProvider + ?Sized>(page: &mut P) -> Result<usize, RegionError> {
    let marked = page.marked();
    for id in &marked {
        page.restore(*id)?;
    }
    Ok(marked.len())
}

/// Clear previous marks, then mark the regions selected for `query`.
///
/// Calling this repeatedly with the same query leaves the page in the same
/// state as calling it once.
pub fn apply_highlight<P: TextRegionProvider + ?Sized>(
    page: &mut P,
    query: &str,
    policy: &MatchPolicy,
) -> Result<Selection, RegionError> {
    let cleared = clear_highlights(page)?;
    if cleared > 0 {
        log::debug!("restored {cleared} previously highlighted regions");
    }

    let regions = page.regions();
    let mut selection = select_regions(&regions, query, policy);

    if selection.words.is_empty() {
        log::debug!("no distinctive words in query, nothing to highlight");
        return Ok(selection);
    }

    let mut marked = Vec::with_capacity(selection.ids.len());
    for id in &selection.ids {
        match page.mark(*id) {
            Ok(()) => marked.push(*id),
            Err(err) => log::warn!("failed to highlight region {id}: {err}"),
        }
    }

    selection.focus = marked.first().copied();
    selection.ids = marked;

    match selection.focus {
        Some(focus) => {
            page.scroll_into_view(focus);
            log::info!(
                "highlighted {} regions for words {:?}",
                selection.ids.len(),
                selection.words
            );
        }
        None => log::info!("no regions matched {:?}", selection.words),
    }

    Ok(selection)
}
