//! ControlRegistry: identity-keyed memory of processed controls
//!
//! Replaces marking controls in the DOM. Each handle remembers the hash of the
//! label it was resolved with and the resulting assignment, so a rescan can
//! skip scoring controls whose label is unchanged. Entries for handles that a
//! completed scan no longer discovers are pruned, which keeps the registry from
//! holding on to controls the page has removed.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::tagger::catalog::TagKey;
use crate::tagger::host::ControlHandle;

// =============================================================================
// Types
// =============================================================================

/// A cached resolver decision for one control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub tag_key: TagKey,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    label_hash: u64,
    resolution: Option<Resolution>,
    /// Auto-activated once already; never clicked again by policy
    activated: bool,
}

/// A control's outcome from one scan, staged until the scan commits
#[derive(Debug, Clone)]
pub struct ProcessedControl {
    pub handle: ControlHandle,
    pub label_hash: u64,
    pub resolution: Option<Resolution>,
}

/// Cache effectiveness counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryStats {
    pub lookups: u64,
    pub hits: u64,
    pub pruned: u64,
}

// =============================================================================
// ControlRegistry
// =============================================================================

#[derive(Debug, Default)]
pub struct ControlRegistry {
    entries: HashMap<ControlHandle, RegistryEntry>,
    stats: RegistryStats,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash of label content
    pub fn label_hash(label: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        label.hash(&mut hasher);
        hasher.finish()
    }

    /// Cached resolution for `handle` if it was last resolved with the same
    /// label. The outer `Option` is the cache hit; the inner one is the
    /// decision itself (a hit may be "no tag").
    pub fn cached(&self, handle: ControlHandle, label_hash: u64) -> Option<&Option<Resolution>> {
        self.entries
            .get(&handle)
            .filter(|e| e.label_hash == label_hash)
            .map(|e| &e.resolution)
    }

    /// Apply one completed scan: upsert every processed control, carry over
    /// `retained` handles (still discovered, label unreadable) unchanged, and
    /// prune everything else. `hits` is the number of cache hits the scan used.
    pub fn commit(&mut self, processed: Vec<ProcessedControl>, retained: &[ControlHandle], hits: u64) {
        self.stats.lookups += processed.len() as u64;
        self.stats.hits += hits;

        let mut next: HashMap<ControlHandle, RegistryEntry> =
            HashMap::with_capacity(processed.len() + retained.len());
        for p in processed {
            let activated = self
                .entries
                .get(&p.handle)
                .map(|e| e.activated && e.label_hash == p.label_hash)
                .unwrap_or(false);
            next.insert(
                p.handle,
                RegistryEntry {
                    label_hash: p.label_hash,
                    resolution: p.resolution,
                    activated,
                },
            );
        }
        for handle in retained {
            if let Some(entry) = self.entries.remove(handle) {
                next.entry(*handle).or_insert(entry);
            }
        }

        let pruned = self.entries.keys().filter(|h| !next.contains_key(h)).count();
        self.stats.pruned += pruned as u64;
        self.entries = next;
    }

    pub fn mark_activated(&mut self, handle: ControlHandle) {
        if let Some(entry) = self.entries.get_mut(&handle) {
            entry.activated = true;
        }
    }

    pub fn is_activated(&self, handle: ControlHandle) -> bool {
        self.entries.get(&handle).map(|e| e.activated).unwrap_or(false)
    }

    pub fn contains(&self, handle: ControlHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    /// Hit rate as percentage
    pub fn hit_rate(&self) -> f64 {
        if self.stats.lookups == 0 {
            return 0.0;
        }
        (self.stats.hits as f64 / self.stats.lookups as f64) * 100.0
    }
}
