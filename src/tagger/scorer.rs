//! MatchScorer - lexical similarity between a control label and a phrase
//!
//! Three tiers, highest first:
//! - word-boundary occurrence of the phrase in the label: 1.0
//! - plain substring occurrence: 0.8
//! - word overlap ratio over phrase words longer than two characters
//!
//! Everything is lowercased and trimmed before comparison, so case never
//! changes a score.

use crate::tagger::keywords::{boundary_regex, normalize, KeywordEntry};

/// Score for a phrase found at word boundaries
pub const BOUNDARY_SCORE: f64 = 1.0;
/// Score for a phrase found only as a raw substring
pub const SUBSTRING_SCORE: f64 = 0.8;

/// Phrase words this short are ignored by the overlap tier
const MIN_OVERLAP_WORD_CHARS: usize = 3;

/// Stateless scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchScorer;

impl MatchScorer {
    /// Score `label` against an arbitrary phrase. Compiles the boundary
    /// pattern on demand; prefer [`MatchScorer::score_entry`] in loops.
    pub fn score(label: &str, phrase: &str) -> f64 {
        let label = normalize(label);
        let phrase = normalize(phrase);
        if label.is_empty() || phrase.is_empty() {
            return 0.0;
        }

        if label.contains(&phrase) {
            return match boundary_regex(&phrase) {
                Ok(re) if re.is_match(&label) => BOUNDARY_SCORE,
                _ => SUBSTRING_SCORE,
            };
        }
        word_overlap(&label, &phrase)
    }

    /// Score an already-normalized label against an index entry, reusing the
    /// entry's precompiled boundary regex.
    pub fn score_entry(normalized_label: &str, entry: &KeywordEntry) -> f64 {
        if normalized_label.is_empty() {
            return 0.0;
        }

        if normalized_label.contains(&entry.phrase) {
            if entry.boundary().is_match(normalized_label) {
                return BOUNDARY_SCORE;
            }
            return SUBSTRING_SCORE;
        }
        word_overlap(normalized_label, &entry.phrase)
    }
}

fn split_words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
}

/// Fraction of qualifying phrase words that overlap some label word in either
/// direction. Divides by 1 when no phrase word qualifies.
fn word_overlap(label: &str, phrase: &str) -> f64 {
    let label_words: Vec<&str> = split_words(label).collect();

    let mut qualifying = 0usize;
    let mut matched = 0usize;
    for phrase_word in split_words(phrase) {
        if phrase_word.chars().count() < MIN_OVERLAP_WORD_CHARS {
            continue;
        }
        qualifying += 1;
        if label_words
            .iter()
            .any(|lw| lw.contains(phrase_word) || phrase_word.contains(lw))
        {
            matched += 1;
        }
    }

    matched as f64 / qualifying.max(1) as f64
}
