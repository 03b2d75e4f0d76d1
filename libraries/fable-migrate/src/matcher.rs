//! Entity matching with confidence scoring
//!
//! Matches foreign users and catalog items to local entities under
//! uncertainty. Matching is strictly tiered and short-circuits at the first
//! tier that succeeds: admin override, exact external identifier, structural
//! equality (path), then fuzzy similarity. When nothing matches, a ranked
//! suggestion list is built so a human reviewer always has something to
//! choose from.

use crate::foreign::{ForeignBook, ForeignUser};
use fable_core::{LibraryStore, User};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strsim::normalized_levenshtein;

/// Ordered certainty level of a cross-system match
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    None,
    Weak,
    Strong,
    Definitive,
}

impl MatchConfidence {
    /// Only `strong` and `definitive` matches are eligible for unattended
    /// import; `weak`/`none` always require a human-specified mapping.
    pub fn should_auto_import(self) -> bool {
        matches!(self, Self::Strong | Self::Definitive)
    }
}

/// One ranked candidate for human disambiguation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSuggestion {
    pub local_id: String,
    pub label: String,
    pub score: f64,
}

/// Outcome of matching one foreign entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMatch {
    pub foreign_id: String,
    pub local_id: Option<String>,
    pub confidence: MatchConfidence,
    pub reason: String,
    pub suggestions: Vec<MatchSuggestion>,
}

impl EntityMatch {
    fn matched(foreign_id: &str, local_id: &str, confidence: MatchConfidence, reason: &str) -> Self {
        Self {
            foreign_id: foreign_id.to_string(),
            local_id: Some(local_id.to_string()),
            confidence,
            reason: reason.to_string(),
            suggestions: Vec::new(),
        }
    }

    fn unmatched(foreign_id: &str, reason: &str, suggestions: Vec<MatchSuggestion>) -> Self {
        Self {
            foreign_id: foreign_id.to_string(),
            local_id: None,
            confidence: MatchConfidence::None,
            reason: reason.to_string(),
            suggestions,
        }
    }
}

/// Matching configuration: admin overrides, per-strategy toggles, and the
/// fuzzy title-similarity threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Explicit foreign-ID to local-ID mappings; always win
    #[serde(default)]
    pub user_overrides: HashMap<String, String>,
    #[serde(default)]
    pub book_overrides: HashMap<String, String>,

    pub match_by_external_id: bool,
    pub match_by_path: bool,
    pub match_by_fuzzy_title: bool,

    /// Minimum normalized-title similarity for the fuzzy tier
    pub title_similarity_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            user_overrides: HashMap::new(),
            book_overrides: HashMap::new(),
            match_by_external_id: true,
            match_by_path: true,
            match_by_fuzzy_title: true,
            title_similarity_threshold: 0.80,
        }
    }
}

/// Contributor-name similarity floor for the fuzzy tier
const CONTRIBUTOR_SIMILARITY_FLOOR: f64 = 0.85;
/// Title similarity at or above which a fuzzy match is strong
const STRONG_TITLE_SIMILARITY: f64 = 0.95;
/// User name-similarity floor for the unique-name tier
const USER_NAME_SIMILARITY: f64 = 0.9;
/// Combined-score floor for suggestions
const SUGGESTION_FLOOR: f64 = 0.5;
/// Fixed floor of the duration tolerance (ms)
const DURATION_TOLERANCE_FLOOR_MS: i64 = 60_000;
/// Suggestions kept per unmatched entity
const MAX_SUGGESTIONS: usize = 5;

/// Similarity as `1 - (edit distance / max(len))`; identical empty strings
/// score 1.0, one-empty-one-nonempty scores 0.0
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

/// Normalize a name for comparison: lowercase, trim, strip punctuation,
/// collapse whitespace
pub fn normalize_name(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a title: like [`normalize_name`], plus stripping a leading
/// article ("the", "a", "an")
pub fn normalize_title(s: &str) -> String {
    let normalized = normalize_name(s);
    for article in ["the ", "a ", "an "] {
        if let Some(rest) = normalized.strip_prefix(article) {
            return rest.to_string();
        }
    }
    normalized
}

/// Duration tolerance: max of 2% of the foreign duration or a fixed floor
fn duration_tolerance_ms(foreign_duration_ms: i64) -> i64 {
    (foreign_duration_ms / 50).max(DURATION_TOLERANCE_FLOOR_MS)
}

/// One locally-known book with its matching keys pre-resolved
#[derive(Debug, Clone)]
pub struct IndexedBook {
    pub id: String,
    pub title: String,
    pub normalized_title: String,
    pub path: String,
    pub external_id: Option<String>,
    pub duration_ms: i64,
    pub contributor_names: Vec<String>,
}

/// Preload cache for bulk catalog matching.
///
/// Built once per migration run: all local books indexed by external
/// identifier, by path, and by normalized title (bucketed, since multiple
/// items can share one). Bulk matching uses this cache instead of per-item
/// lookups against live storage.
pub struct MatchIndex {
    books: Vec<IndexedBook>,
    by_external_id: HashMap<String, usize>,
    by_path: HashMap<String, usize>,
    by_title: HashMap<String, Vec<usize>>,
}

impl MatchIndex {
    /// Snapshot the local catalog into an index
    pub async fn build(store: &dyn LibraryStore) -> fable_core::Result<Self> {
        let contributor_names: HashMap<String, String> = store
            .contributors()
            .list_all()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();

        let mut books = Vec::new();
        for book in store.books().list_all().await? {
            if book.deleted_at.is_some() {
                continue;
            }
            let names = book
                .author_ids
                .iter()
                .chain(book.narrator_ids.iter())
                .filter_map(|id| contributor_names.get(id))
                .map(|name| normalize_name(name))
                .collect();
            books.push(IndexedBook {
                id: book.id.as_str().to_string(),
                title: book.title.clone(),
                normalized_title: normalize_title(&book.title),
                path: book.path,
                external_id: book.external_id,
                duration_ms: book.duration_ms,
                contributor_names: names,
            });
        }

        let mut by_external_id = HashMap::new();
        let mut by_path = HashMap::new();
        let mut by_title: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, book) in books.iter().enumerate() {
            if let Some(ext) = &book.external_id {
                by_external_id.insert(ext.clone(), i);
            }
            by_path.insert(book.path.clone(), i);
            by_title.entry(book.normalized_title.clone()).or_default().push(i);
        }

        Ok(Self {
            books,
            by_external_id,
            by_path,
            by_title,
        })
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// Match one foreign catalog item against the preloaded local catalog
pub fn match_book(foreign: &ForeignBook, index: &MatchIndex, config: &MatcherConfig) -> EntityMatch {
    // Tier 1: admin override.
    if let Some(local_id) = config.book_overrides.get(&foreign.id) {
        return EntityMatch::matched(&foreign.id, local_id, MatchConfidence::Definitive, "admin override");
    }

    // Tier 2: exact external identifier.
    if config.match_by_external_id {
        if let Some(ext) = &foreign.external_id {
            if let Some(&i) = index.by_external_id.get(ext) {
                return EntityMatch::matched(
                    &foreign.id,
                    &index.books[i].id,
                    MatchConfidence::Definitive,
                    "external identifier match",
                );
            }
        }
    }

    // Tier 3: structural equality - identical filesystem path.
    if config.match_by_path {
        if let Some(path) = &foreign.path {
            if let Some(&i) = index.by_path.get(path) {
                return EntityMatch::matched(
                    &foreign.id,
                    &index.books[i].id,
                    MatchConfidence::Strong,
                    "identical path",
                );
            }
        }
    }

    let foreign_title = normalize_title(&foreign.title);
    let foreign_duration_ms = (foreign.duration_sec * 1000.0).round() as i64;
    let foreign_contributors: Vec<String> = foreign
        .authors
        .iter()
        .chain(foreign.narrators.iter())
        .map(|n| normalize_name(n))
        .collect();

    // Tier 4: fuzzy similarity over the whole catalog. An exact normalized
    // title hit in the bucket index skips the edit-distance computation.
    if config.match_by_fuzzy_title {
        let exact_bucket = index.by_title.get(&foreign_title);

        let mut best: Option<(usize, f64)> = None;
        for (i, book) in index.books.iter().enumerate() {
            let title_sim = if exact_bucket.is_some_and(|b| b.contains(&i)) {
                1.0
            } else {
                similarity(&foreign_title, &book.normalized_title)
            };
            if title_sim < config.title_similarity_threshold {
                continue;
            }
            let contributor_ok = foreign_contributors.iter().any(|fc| {
                book.contributor_names
                    .iter()
                    .any(|lc| similarity(fc, lc) >= CONTRIBUTOR_SIMILARITY_FLOOR)
            });
            if !contributor_ok {
                continue;
            }
            let delta = (book.duration_ms - foreign_duration_ms).abs();
            if delta > duration_tolerance_ms(foreign_duration_ms) {
                continue;
            }
            if best.map_or(true, |(_, s)| title_sim > s) {
                best = Some((i, title_sim));
            }
        }

        if let Some((i, title_sim)) = best {
            let book = &index.books[i];
            let delta = (book.duration_ms - foreign_duration_ms).abs();
            let confidence = if title_sim >= STRONG_TITLE_SIMILARITY && delta <= DURATION_TOLERANCE_FLOOR_MS {
                MatchConfidence::Strong
            } else {
                MatchConfidence::Weak
            };
            let mut result = EntityMatch::matched(
                &foreign.id,
                &book.id,
                confidence,
                &format!("fuzzy title match ({title_sim:.2})"),
            );
            if confidence == MatchConfidence::Weak {
                result.suggestions = book_suggestions(index, &foreign_title, &foreign_contributors, foreign_duration_ms);
            }
            return result;
        }
    }

    // Tier 5: no match; rank suggestions so the reviewer has options.
    EntityMatch::unmatched(
        &foreign.id,
        "no confident match",
        book_suggestions(index, &foreign_title, &foreign_contributors, foreign_duration_ms),
    )
}

/// All candidates scoring above a loose combined floor, best first
fn book_suggestions(
    index: &MatchIndex,
    foreign_title: &str,
    foreign_contributors: &[String],
    foreign_duration_ms: i64,
) -> Vec<MatchSuggestion> {
    let mut scored: Vec<MatchSuggestion> = index
        .books
        .iter()
        .filter_map(|book| {
            let title_sim = similarity(foreign_title, &book.normalized_title);
            let contributor_sim = foreign_contributors
                .iter()
                .flat_map(|fc| book.contributor_names.iter().map(move |lc| similarity(fc, lc)))
                .fold(0.0_f64, f64::max);
            let delta = (book.duration_ms - foreign_duration_ms).abs() as f64;
            let duration_score = if foreign_duration_ms > 0 {
                (1.0 - delta / foreign_duration_ms as f64).max(0.0)
            } else {
                0.0
            };
            let score = 0.6 * title_sim + 0.25 * contributor_sim + 0.15 * duration_score;
            (score >= SUGGESTION_FLOOR).then(|| MatchSuggestion {
                local_id: book.id.clone(),
                label: book.title.clone(),
                score,
            })
        })
        .collect();
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(MAX_SUGGESTIONS);
    scored
}

/// Match one foreign user against the local accounts
pub fn match_user(foreign: &ForeignUser, locals: &[User], config: &MatcherConfig) -> EntityMatch {
    // Tier 1: admin override.
    if let Some(local_id) = config.user_overrides.get(&foreign.id) {
        return EntityMatch::matched(&foreign.id, local_id, MatchConfidence::Definitive, "admin override");
    }

    let locals: Vec<&User> = locals.iter().filter(|u| u.deleted_at.is_none()).collect();

    // Tier 2: exact email.
    if let Some(email) = &foreign.email {
        let email = email.to_lowercase();
        if let Some(user) = locals.iter().find(|u| u.email.to_lowercase() == email) {
            return EntityMatch::matched(&foreign.id, user.id.as_str(), MatchConfidence::Definitive, "email match");
        }
    }

    // Tier 3: unique name similarity. More than one local clearing the
    // threshold is demoted to no-match rather than silently picking one.
    let foreign_name = normalize_name(&foreign.username);
    let close: Vec<(&User, f64)> = locals
        .iter()
        .map(|u| (*u, similarity(&foreign_name, &normalize_name(&u.display_name))))
        .filter(|(_, sim)| *sim >= USER_NAME_SIMILARITY)
        .collect();

    match close.as_slice() {
        [(user, sim)] => {
            return EntityMatch::matched(
                &foreign.id,
                user.id.as_str(),
                MatchConfidence::Strong,
                &format!("unique name match ({sim:.2})"),
            )
        }
        [] => {}
        _ => {
            let suggestions = close
                .iter()
                .map(|(u, sim)| MatchSuggestion {
                    local_id: u.id.as_str().to_string(),
                    label: u.display_name.clone(),
                    score: *sim,
                })
                .collect();
            return EntityMatch::unmatched(&foreign.id, "ambiguous name match", suggestions);
        }
    }

    // No match; offer the closest names as suggestions.
    let mut suggestions: Vec<MatchSuggestion> = locals
        .iter()
        .filter_map(|u| {
            let sim = similarity(&foreign_name, &normalize_name(&u.display_name));
            (sim >= SUGGESTION_FLOOR).then(|| MatchSuggestion {
                local_id: u.id.as_str().to_string(),
                label: u.display_name.clone(),
                score: sim,
            })
        })
        .collect();
    suggestions.sort_by(|a, b| b.score.total_cmp(&a.score));
    suggestions.truncate(MAX_SUGGESTIONS);
    EntityMatch::unmatched(&foreign.id, "no confident match", suggestions)
}
