//! CheckboxResolver - assigns each page control to at most one tag
//!
//! For every control, every phrase in the index is scored against the
//! control's label. The first strictly-highest phrase wins and its first tag
//! key becomes the assignment, provided the score clears the confidence floor.
//! Ties therefore resolve to whichever phrase comes first in index order.

use serde::{Deserialize, Serialize};

use crate::tagger::catalog::TagKey;
use crate::tagger::host::{ControlHandle, PageControl};
use crate::tagger::keywords::{normalize, KeywordIndex};
use crate::tagger::scorer::MatchScorer;

/// Scores at or below this are treated as noise
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.7;
/// Labels shorter than this (after trimming) carry too little evidence
pub const DEFAULT_MIN_LABEL_LEN: usize = 3;

// =============================================================================
// Types
// =============================================================================

/// One control assigned to one tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchAssignment {
    pub tag_key: TagKey,
    pub control: PageControl,
    pub score: f64,
}

/// All controls assigned to a single tag, in discovery order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagAssignments {
    pub tag_key: TagKey,
    pub matches: Vec<MatchAssignment>,
}

/// tag → controls mapping; tags appear in order of first assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignments {
    groups: Vec<TagAssignments>,
}

impl Assignments {
    pub fn push(&mut self, assignment: MatchAssignment) {
        match self
            .groups
            .iter_mut()
            .find(|g| g.tag_key == assignment.tag_key)
        {
            Some(group) => group.matches.push(assignment),
            None => self.groups.push(TagAssignments {
                tag_key: assignment.tag_key.clone(),
                matches: vec![assignment],
            }),
        }
    }

    /// Controls assigned to `key` (empty if none)
    pub fn for_tag(&self, key: &TagKey) -> &[MatchAssignment] {
        self.groups
            .iter()
            .find(|g| &g.tag_key == key)
            .map(|g| g.matches.as_slice())
            .unwrap_or(&[])
    }

    pub fn groups(&self) -> &[TagAssignments] {
        &self.groups
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchAssignment> {
        self.groups.iter().flat_map(|g| g.matches.iter())
    }

    /// Number of tags with at least one control
    pub fn tag_count(&self) -> usize {
        self.groups.len()
    }

    /// Total number of assigned controls
    pub fn control_count(&self) -> usize {
        self.groups.iter().map(|g| g.matches.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Update the recorded checked state of `handle` wherever it appears
    pub fn set_checked(&mut self, handle: ControlHandle, checked: bool) {
        for group in &mut self.groups {
            for m in group.matches.iter_mut().filter(|m| m.control.handle == handle) {
                m.control.checked = checked;
            }
        }
    }
}

// =============================================================================
// CheckboxResolver
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct CheckboxResolver {
    confidence_floor: f64,
    min_label_len: usize,
}

impl Default for CheckboxResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_FLOOR, DEFAULT_MIN_LABEL_LEN)
    }
}

impl CheckboxResolver {
    pub fn new(confidence_floor: f64, min_label_len: usize) -> Self {
        Self {
            confidence_floor,
            min_label_len,
        }
    }

    /// Best tag for one control, or `None` when the label is too short or no
    /// phrase scores above the floor.
    pub fn resolve_one(&self, control: &PageControl, index: &KeywordIndex) -> Option<MatchAssignment> {
        let label = normalize(&control.label_text);
        if label.chars().count() < self.min_label_len {
            return None;
        }

        let mut best: Option<(&TagKey, f64)> = None;
        for entry in index.entries() {
            let score = MatchScorer::score_entry(&label, entry);
            let beats = best.map_or(true, |(_, s)| score > s);
            if beats {
                if let Some(key) = entry.tag_keys.first() {
                    best = Some((key, score));
                }
            }
        }

        let (key, score) = best?;
        if score <= self.confidence_floor {
            return None;
        }
        Some(MatchAssignment {
            tag_key: key.clone(),
            control: control.clone(),
            score,
        })
    }

    /// Resolve a full control list from scratch
    pub fn resolve(&self, controls: &[PageControl], index: &KeywordIndex) -> Assignments {
        let mut assignments = Assignments::default();
        for control in controls {
            if let Some(a) = self.resolve_one(control, index) {
                assignments.push(a);
            }
        }
        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::catalog::TagCatalog;
    use crate::tagger::keywords::{PhraseTable, TagPhrases};

    fn control(id: u32, label: &str) -> PageControl {
        PageControl {
            handle: ControlHandle(id),
            label_text: label.to_string(),
            checked: false,
        }
    }

    #[test]
    fn test_lane_cutoff_resolves_to_f2() {
        let index = KeywordIndex::standard().unwrap();
        let resolver = CheckboxResolver::default();
        let a = resolver
            .resolve_one(&control(1, "Lane Cutoff / Cut-off violation"), &index)
            .unwrap();
        assert_eq!(a.tag_key, TagKey::new("f2"));
        assert!(a.score >= 0.8);
    }

    #[test]
    fn test_short_labels_skipped() {
        let index = KeywordIndex::standard().unwrap();
        let resolver = CheckboxResolver::default();
        assert!(resolver.resolve_one(&control(1, "  ok "), &index).is_none());
        assert!(resolver.resolve_one(&control(2, ""), &index).is_none());
    }

    #[test]
    fn test_nothing_assigned_at_or_below_floor() {
        let index = KeywordIndex::standard().unwrap();
        let resolver = CheckboxResolver::default();
        let controls = vec![
            control(1, "Weather: overcast"),
            control(2, "minor violation"), // best overlap is 0.5
            control(3, "Reviewed by supervisor"),
        ];
        assert!(resolver.resolve(&controls, &index).is_empty());
    }

    #[test]
    fn test_floor_is_exclusive() {
        let catalog = TagCatalog::standard();
        let table = PhraseTable {
            groups: vec![TagPhrases {
                tag: TagKey::new("f3"),
                phrases: vec!["lane change".into()],
            }],
        };
        let index = KeywordIndex::build(&catalog, &table).unwrap();
        // one of two words overlaps: 0.5
        let half = CheckboxResolver::new(0.5, 3);
        assert!(half.resolve_one(&control(1, "lane keeping"), &index).is_none());
        let lower = CheckboxResolver::new(0.49, 3);
        assert!(lower.resolve_one(&control(1, "lane keeping"), &index).is_some());
    }

    #[test]
    fn test_each_control_assigned_at_most_once() {
        let index = KeywordIndex::standard().unwrap();
        let resolver = CheckboxResolver::default();
        let controls = vec![
            control(1, "Forward collision warning / near miss / crash"),
            control(2, "Texting and smoking"),
            control(3, "Tailgating"),
        ];
        let assignments = resolver.resolve(&controls, &index);

        let mut seen = std::collections::HashSet::new();
        for a in assignments.iter() {
            assert!(seen.insert(a.control.handle), "control assigned twice");
        }
        assert_eq!(assignments.control_count(), 3);
    }

    #[test]
    fn test_tie_goes_to_first_phrase() {
        let index = KeywordIndex::standard().unwrap();
        let resolver = CheckboxResolver::default();
        // "texting" (d2) and "smoking" (d5) both match at a boundary; d2's
        // phrases come first in index order
        let a = resolver
            .resolve_one(&control(1, "Texting and smoking"), &index)
            .unwrap();
        assert_eq!(a.tag_key, TagKey::new("d2"));
    }

    #[test]
    fn test_multiple_controls_per_tag_keep_order() {
        let index = KeywordIndex::standard().unwrap();
        let resolver = CheckboxResolver::default();
        let controls = vec![
            control(10, "Cellphone - handheld"),
            control(11, "Weather"),
            control(12, "Cellphone - hands free"),
        ];
        let assignments = resolver.resolve(&controls, &index);
        let handles: Vec<u32> = assignments
            .for_tag(&TagKey::new("d2"))
            .iter()
            .map(|a| a.control.handle.0)
            .collect();
        assert_eq!(handles, vec![10, 12]);
        assert_eq!(assignments.tag_count(), 1);
    }

    #[test]
    fn test_resolve_is_stateless() {
        let index = KeywordIndex::standard().unwrap();
        let resolver = CheckboxResolver::default();
        let controls = vec![control(1, "Drowsiness"), control(2, "Seat belt")];
        assert_eq!(resolver.resolve(&controls, &index), resolver.resolve(&controls, &index));
    }
}
