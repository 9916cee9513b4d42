//! KeywordIndex - phrase → tag key mapping built once from the catalog
//!
//! Each phrase carries a precompiled word-boundary regex for label scoring,
//! and the whole phrase set is compiled into one Aho-Corasick automaton for
//! page-text keyword detection.
//!
//! Iteration order is insertion order (tag order, then phrase order within a
//! tag). The resolver's tie-break depends on it, so it must stay stable.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::tagger::catalog::{TagCatalog, TagKey};
use crate::tagger::error::{TaggerError, TaggerResult};

// =============================================================================
// Phrase table (configuration input)
// =============================================================================

/// Synonym phrases for one tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagPhrases {
    pub tag: TagKey,
    pub phrases: Vec<String>,
}

/// Ordered phrase configuration. JSON form:
/// `[{ "tag": "f1", "phrases": ["tailgating", ...] }, ...]`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhraseTable {
    pub groups: Vec<TagPhrases>,
}

const STANDARD_PHRASES: &[(&str, &[&str])] = &[
    ("f1", &["tailgating", "close following", "following too closely", "tailgate"]),
    ("f2", &["lane cutoff", "cut off", "lane cut-off", "cutoff"]),
    ("f3", &["unsafe lane change", "lane change", "improper lane", "lane changing"]),
    ("f4", &["stop sign violation", "stop sign", "stop-sign", "rolling stop"]),
    ("f5", &["red light violation", "running red light", "red light", "light violation"]),
    ("f6", &["forward collision warning", "collision warning", "fcw", "collision-warning"]),
    ("f7", &["near collision", "near miss", "near-collision", "almost collision"]),
    ("f8", &["unsafe parking", "parking violation", "unsafe-parking", "improper parking"]),
    ("f9", &["alert driving", "alert-driving", "defensive driving", "attentive"]),
    ("f10", &["safe distancing", "safe distance", "proper following", "safe-distancing"]),
    ("f11", &["possible collision", "potential collision", "possible-collision", "collision risk"]),
    ("f12", &["collision", "crash", "accident", "impact"]),
    ("d1", &["driver distraction", "distracted driving", "distraction", "inattentive"]),
    ("d2", &["cellphone usage", "phone use", "cellphone", "mobile phone", "texting"]),
    ("d3", &["drowsiness", "fatigue", "sleepy driving", "tired", "microsleep"]),
    ("d4", &["seatbelt violation", "seat belt", "unbuckled", "belt violation", "no seatbelt"]),
    ("d5", &["smoking while driving", "smoking", "cigarette", "tobacco use", "vaping"]),
];

impl PhraseTable {
    /// Built-in phrases matching the standard catalog
    pub fn standard() -> Self {
        let groups = STANDARD_PHRASES
            .iter()
            .map(|(tag, phrases)| TagPhrases {
                tag: TagKey::new(tag),
                phrases: phrases.iter().map(|p| p.to_string()).collect(),
            })
            .collect();
        Self { groups }
    }

    pub fn from_json(json: &str) -> TaggerResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// =============================================================================
// KeywordIndex
// =============================================================================

/// One normalized phrase and the tags it is evidence for
#[derive(Debug, Clone)]
pub struct KeywordEntry {
    pub phrase: String,
    pub tag_keys: Vec<TagKey>,
    boundary: Regex,
}

impl KeywordEntry {
    /// Word-boundary pattern for this phrase (phrase is regex-escaped)
    pub fn boundary(&self) -> &Regex {
        &self.boundary
    }
}

/// A phrase found in the page text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedKeyword {
    pub phrase: String,
    pub source_tag_keys: Vec<TagKey>,
}

/// Read-only phrase index
#[derive(Debug, Clone)]
pub struct KeywordIndex {
    entries: Vec<KeywordEntry>,
    by_phrase: HashMap<String, usize>,
    automaton: AhoCorasick,
}

/// Lowercase + trim, the normalization shared by phrases and labels
pub(crate) fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

pub(crate) fn boundary_regex(phrase: &str) -> TaggerResult<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(phrase)))
        .map_err(|e| TaggerError::Config(format!("bad phrase '{}': {}", phrase, e)))
}

impl KeywordIndex {
    /// Build the index. Fails on an empty phrase or a tag key the catalog
    /// doesn't know. Phrases differing only in case are merged.
    pub fn build(catalog: &TagCatalog, table: &PhraseTable) -> TaggerResult<Self> {
        let mut entries: Vec<KeywordEntry> = Vec::new();
        let mut by_phrase: HashMap<String, usize> = HashMap::new();

        for group in &table.groups {
            if !catalog.contains(&group.tag) {
                return Err(TaggerError::Config(format!(
                    "phrase table references unknown tag '{}'",
                    group.tag
                )));
            }

            for raw in &group.phrases {
                let phrase = normalize(raw);
                if phrase.is_empty() {
                    return Err(TaggerError::Config(format!(
                        "empty phrase for tag '{}'",
                        group.tag
                    )));
                }

                if let Some(&idx) = by_phrase.get(&phrase) {
                    let keys = &mut entries[idx].tag_keys;
                    if !keys.contains(&group.tag) {
                        keys.push(group.tag.clone());
                    }
                    continue;
                }

                let boundary = boundary_regex(&phrase)?;
                by_phrase.insert(phrase.clone(), entries.len());
                entries.push(KeywordEntry {
                    phrase,
                    tag_keys: vec![group.tag.clone()],
                    boundary,
                });
            }
        }

        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .ascii_case_insensitive(true)
            .build(entries.iter().map(|e| e.phrase.as_str()))
            .map_err(|e| TaggerError::Config(format!("KeywordIndex build error: {}", e)))?;

        Ok(Self {
            entries,
            by_phrase,
            automaton,
        })
    }

    /// Standard catalog + built-in phrases
    pub fn standard() -> TaggerResult<Self> {
        Self::build(&TagCatalog::standard(), &PhraseTable::standard())
    }

    /// Tag keys for a phrase (empty if absent)
    pub fn lookup(&self, phrase: &str) -> &[TagKey] {
        self.by_phrase
            .get(&normalize(phrase))
            .map(|&idx| self.entries[idx].tag_keys.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_phrases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.phrase.as_str())
    }

    pub fn entries(&self) -> &[KeywordEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every phrase occurring anywhere in `page_text` (plain substring,
    /// case-insensitive), once each, in index order.
    pub fn detect(&self, page_text: &str) -> Vec<DetectedKeyword> {
        let mut hit = vec![false; self.entries.len()];
        for m in self.automaton.find_overlapping_iter(page_text) {
            hit[m.pattern().as_usize()] = true;
        }

        self.entries
            .iter()
            .zip(hit)
            .filter(|(_, found)| *found)
            .map(|(entry, _)| DetectedKeyword {
                phrase: entry.phrase.clone(),
                source_tag_keys: entry.tag_keys.clone(),
            })
            .collect()
    }
}
