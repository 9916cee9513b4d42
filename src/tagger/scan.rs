//! ScanCycle: one guarded, debounced, chunked detection pass
//!
//! # State machine
//! Idle → Scanning → Idle. A scan starts only from Idle; a trigger that fires
//! while a scan is in flight is dropped (counted as suppressed), never queued.
//!
//! # Chunking
//! Controls are resolved `chunk_size` at a time. After each chunk that leaves
//! work behind, the cycle returns [`ScanStep::Yielded`] and the host schedules
//! a zero-delay continuation that calls [`ScanCycle::resume`].
//!
//! # Atomicity
//! Results accumulate in the in-flight job and replace the published
//! [`ScanSnapshot`] only when the last chunk completes. An aborted scan leaves
//! the previous snapshot and the control registry untouched.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::tagger::buttons::{detect_submit_buttons, SubmitButton};
use crate::tagger::catalog::TagKey;
use crate::tagger::config::TaggerConfig;
use crate::tagger::error::TaggerError;
use crate::tagger::host::{ButtonRef, ControlDiscovery, ControlHandle, ControlRef, PageControl, PageTextSource};
use crate::tagger::keywords::{DetectedKeyword, KeywordIndex};
use crate::tagger::registry::{ControlRegistry, ProcessedControl, Resolution};
use crate::tagger::resolver::{Assignments, CheckboxResolver, MatchAssignment};
use crate::tagger::timers::{Debouncer, IntervalTimer};

// =============================================================================
// Types
// =============================================================================

/// Per-scan statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanStats {
    pub total_us: u64,
    pub controls_seen: usize,
    /// Controls scored this scan (cache misses)
    pub controls_scored: usize,
    pub cache_hits: usize,
    /// Controls whose label lookup failed
    pub controls_skipped: usize,
    pub chunks: usize,
    pub yields: usize,
}

/// Published result of the last completed scan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    /// 0 until the first scan completes
    pub sequence: u64,
    pub completed_at_ms: u64,
    pub detected: Vec<DetectedKeyword>,
    pub assignments: Assignments,
    pub submit_buttons: Vec<SubmitButton>,
    pub stats: ScanStats,
}

impl ScanSnapshot {
    pub fn detected_phrases(&self) -> Vec<String> {
        self.detected.iter().map(|d| d.phrase.clone()).collect()
    }

    /// Whether any detected keyword points at `key`
    pub fn is_detected(&self, key: &TagKey) -> bool {
        self.detected.iter().any(|d| d.source_tag_keys.contains(key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Scanning,
}

/// Outcome of driving the cycle once
#[derive(Debug)]
pub enum ScanStep {
    /// Nothing due
    Idle,
    /// A scan is in flight and waiting for `resume`
    Busy,
    /// A trigger fired during an in-flight scan and was dropped
    Suppressed,
    /// A chunk finished and more remain; schedule `resume`
    Yielded,
    /// The scan finished and its snapshot is now published
    Completed { sequence: u64 },
    /// The scan failed; the previous snapshot is still published
    Aborted(TaggerError),
}

/// Lifetime counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounters {
    pub started: u64,
    pub completed: u64,
    pub aborted: u64,
    pub suppressed: u64,
    pub yields: u64,
}

struct ScanJob {
    started: instant::Instant,
    detected: Vec<DetectedKeyword>,
    buttons: Vec<ButtonRef>,
    pending: Vec<ControlRef>,
    cursor: usize,
    assignments: Assignments,
    processed: Vec<ProcessedControl>,
    /// Discovered but unreadable this scan; keep whatever the registry knew
    retained: Vec<ControlHandle>,
    stats: ScanStats,
}

// =============================================================================
// ScanCycle
// =============================================================================

pub struct ScanCycle {
    resolver: CheckboxResolver,
    chunk_size: usize,
    job: Option<ScanJob>,
    debounce: Debouncer,
    interval: IntervalTimer,
    auto_detection: bool,
    registry: ControlRegistry,
    current: ScanSnapshot,
    last_scan_ms: Option<u64>,
    counters: ScanCounters,
}

impl ScanCycle {
    pub fn new(config: &TaggerConfig) -> Self {
        Self {
            resolver: CheckboxResolver::new(config.confidence_floor, config.min_label_len),
            chunk_size: config.chunk_size.max(1),
            job: None,
            debounce: Debouncer::new(config.debounce_ms),
            interval: IntervalTimer::new(config.scan_interval_ms),
            auto_detection: config.auto_detection_default,
            registry: ControlRegistry::new(),
            current: ScanSnapshot::default(),
            last_scan_ms: None,
            counters: ScanCounters::default(),
        }
    }

    /// Start the periodic trigger (if auto-detection is on)
    pub fn start(&mut self, now: u64) {
        if self.auto_detection {
            self.interval.start(now);
        }
    }

    pub fn set_auto_detection(&mut self, enabled: bool, now: u64) {
        self.auto_detection = enabled;
        if enabled {
            if !self.interval.is_running() {
                self.interval.start(now);
            }
        } else {
            self.interval.stop();
            self.debounce.cancel();
        }
    }

    pub fn auto_detection(&self) -> bool {
        self.auto_detection
    }

    /// External "page changed" notification. Ignored while auto-detection
    /// is off.
    pub fn notify_change(&mut self, now: u64) {
        if self.auto_detection {
            self.debounce.trigger(now);
        }
    }

    /// Debounced scan request that ignores the auto-detection switch
    pub fn request_scan(&mut self, now: u64) {
        self.debounce.trigger(now);
    }

    pub fn phase(&self) -> ScanPhase {
        if self.job.is_some() {
            ScanPhase::Scanning
        } else {
            ScanPhase::Idle
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.job.is_some()
    }

    /// Drive timers; starts a scan when the debounce window elapses
    pub fn tick(
        &mut self,
        now: u64,
        index: &KeywordIndex,
        page: &dyn PageTextSource,
        discovery: &dyn ControlDiscovery,
    ) -> ScanStep {
        if self.interval.poll(now) && self.auto_detection && !self.is_scanning() {
            self.debounce.trigger(now);
        }

        if !self.debounce.poll(now) {
            return if self.is_scanning() { ScanStep::Busy } else { ScanStep::Idle };
        }
        self.scan_now(now, index, page, discovery)
    }

    /// Start a scan immediately, bypassing the debouncer
    pub fn scan_now(
        &mut self,
        now: u64,
        index: &KeywordIndex,
        page: &dyn PageTextSource,
        discovery: &dyn ControlDiscovery,
    ) -> ScanStep {
        if self.is_scanning() {
            self.counters.suppressed += 1;
            debug!("[ScanCycle] trigger suppressed: scan already in flight");
            return ScanStep::Suppressed;
        }
        self.begin(now, index, page, discovery)
    }

    fn begin(
        &mut self,
        now: u64,
        index: &KeywordIndex,
        page: &dyn PageTextSource,
        discovery: &dyn ControlDiscovery,
    ) -> ScanStep {
        self.counters.started += 1;
        let started = instant::Instant::now();

        let text = match page.normalized_text() {
            Ok(text) => text,
            Err(e) => return self.abort(TaggerError::Scan(format!("page text unavailable: {}", e))),
        };
        let detected = index.detect(&text);

        let pending = match discovery.find_checkbox_like_controls() {
            Ok(controls) => controls,
            Err(e) => return self.abort(TaggerError::Scan(format!("control discovery failed: {}", e))),
        };

        let buttons = discovery.find_buttons().unwrap_or_else(|e| {
            warn!("[ScanCycle] button discovery failed, continuing without: {}", e);
            Vec::new()
        });

        debug!(
            "[ScanCycle] scan #{} started: {} keywords, {} controls",
            self.counters.started,
            detected.len(),
            pending.len()
        );

        let stats = ScanStats {
            controls_seen: pending.len(),
            ..ScanStats::default()
        };
        self.job = Some(ScanJob {
            started,
            detected,
            buttons,
            pending,
            cursor: 0,
            assignments: Assignments::default(),
            processed: Vec::new(),
            retained: Vec::new(),
            stats,
        });

        self.resume(now, index, discovery)
    }

    /// Resolve the next chunk of the in-flight scan
    pub fn resume(&mut self, now: u64, index: &KeywordIndex, discovery: &dyn ControlDiscovery) -> ScanStep {
        let Some(job) = self.job.as_mut() else {
            return ScanStep::Idle;
        };

        let end = (job.cursor + self.chunk_size).min(job.pending.len());
        for control in &job.pending[job.cursor..end] {
            let label = match discovery.label_text(control.handle) {
                Ok(label) => label,
                Err(e) => {
                    debug!("[ScanCycle] skipping control {:?}: {}", control.handle, e);
                    job.stats.controls_skipped += 1;
                    job.retained.push(control.handle);
                    continue;
                }
            };

            let label_hash = ControlRegistry::label_hash(&label);
            let resolution = match self.registry.cached(control.handle, label_hash) {
                Some(cached) => {
                    job.stats.cache_hits += 1;
                    cached.clone()
                }
                None => {
                    job.stats.controls_scored += 1;
                    let candidate = PageControl {
                        handle: control.handle,
                        label_text: label.clone(),
                        checked: control.checked,
                    };
                    self.resolver.resolve_one(&candidate, index).map(|a| Resolution {
                        tag_key: a.tag_key,
                        score: a.score,
                    })
                }
            };

            if let Some(r) = &resolution {
                job.assignments.push(MatchAssignment {
                    tag_key: r.tag_key.clone(),
                    control: PageControl {
                        handle: control.handle,
                        label_text: label,
                        checked: control.checked,
                    },
                    score: r.score,
                });
            }
            job.processed.push(ProcessedControl {
                handle: control.handle,
                label_hash,
                resolution,
            });
        }
        job.cursor = end;
        job.stats.chunks += 1;

        if job.cursor < job.pending.len() {
            job.stats.yields += 1;
            self.counters.yields += 1;
            return ScanStep::Yielded;
        }
        self.commit(now)
    }

    fn commit(&mut self, now: u64) -> ScanStep {
        let Some(job) = self.job.take() else {
            return ScanStep::Idle;
        };

        let mut stats = job.stats;
        stats.total_us = job.started.elapsed().as_micros() as u64;
        self.registry.commit(job.processed, &job.retained, stats.cache_hits as u64);

        self.counters.completed += 1;
        let sequence = self.counters.completed;
        self.current = ScanSnapshot {
            sequence,
            completed_at_ms: now,
            detected: job.detected,
            assignments: job.assignments,
            submit_buttons: detect_submit_buttons(&job.buttons),
            stats,
        };
        self.last_scan_ms = Some(now);

        debug!(
            "[ScanCycle] scan #{} complete: {} keywords, {} controls matched",
            sequence,
            self.current.detected.len(),
            self.current.assignments.control_count()
        );
        ScanStep::Completed { sequence }
    }

    fn abort(&mut self, error: TaggerError) -> ScanStep {
        self.job = None;
        self.counters.aborted += 1;
        warn!("[ScanCycle] scan aborted: {}", error);
        ScanStep::Aborted(error)
    }

    pub fn snapshot(&self) -> &ScanSnapshot {
        &self.current
    }

    pub fn last_scan_ms(&self) -> Option<u64> {
        self.last_scan_ms
    }

    pub fn counters(&self) -> &ScanCounters {
        &self.counters
    }

    pub fn registry(&self) -> &ControlRegistry {
        &self.registry
    }

    pub fn mark_activated(&mut self, handle: ControlHandle) {
        self.registry.mark_activated(handle);
    }

    pub fn is_activated(&self, handle: ControlHandle) -> bool {
        self.registry.is_activated(handle)
    }

    /// Reflect an actuation the engine performed in the published snapshot
    pub fn set_control_checked(&mut self, handle: ControlHandle, checked: bool) {
        self.current.assignments.set_checked(handle, checked);
    }

}
