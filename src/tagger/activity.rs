//! Bounded activity log shown in the overlay
//!
//! Newest entries first. Once the log reaches capacity the oldest entry is
//! dropped.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub at_ms: u64,
    /// `HH:MM:SS` (UTC)
    pub time_label: String,
    pub kind: ActivityKind,
    pub message: String,
}

impl ActivityRecord {
    pub fn new(at_ms: u64, kind: ActivityKind, message: impl Into<String>) -> Self {
        Self {
            at_ms,
            time_label: time_label(at_ms),
            kind,
            message: message.into(),
        }
    }
}

fn time_label(at_ms: u64) -> String {
    i64::try_from(at_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

#[derive(Debug, Clone)]
pub struct ActivityLog {
    capacity: usize,
    entries: VecDeque<ActivityRecord>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Record and return a copy for the presenter
    pub fn push(&mut self, at_ms: u64, kind: ActivityKind, message: impl Into<String>) -> ActivityRecord {
        let record = ActivityRecord::new(at_ms, kind, message);
        if self.entries.len() == self.capacity {
            self.entries.pop_back();
        }
        self.entries.push_front(record.clone());
        record
    }

    /// Newest first
    pub fn entries(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&ActivityRecord> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
