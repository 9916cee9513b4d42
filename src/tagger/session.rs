//! TaggerSession - the overlay engine
//!
//! Owns the keyword index, scan cycle, selection store and shortcut router,
//! and talks to the page only through the injected [`Collaborators`].
//!
//! # Flow
//! ```text
//! host timer ─► tick(now) ─► ScanCycle ─► Completed ─► detection policy
//!                                                    ─► Presenter.on_scan_result
//! operator   ─► toggle_tag / submit / handle_key ─► TagSelectionStore
//!                                                 ─► Presenter + Persistence
//! ```
//!
//! Time is whatever the host last passed in. Operations that take no `now`
//! stamp their activity records with the most recent clock value.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::tagger::activity::{ActivityKind, ActivityLog};
use crate::tagger::catalog::{TagCatalog, TagGroup, TagKey};
use crate::tagger::commands::Command;
use crate::tagger::config::{DetectionPolicy, TaggerConfig};
use crate::tagger::error::TaggerResult;
use crate::tagger::host::{Collaborators, ControlHandle, SubmissionRecord};
use crate::tagger::keywords::KeywordIndex;
use crate::tagger::scan::{ScanCycle, ScanSnapshot, ScanStep};
use crate::tagger::selection::TagSelectionStore;
use crate::tagger::settings::{PanelPosition, PanelSize, PersistedState};
use crate::tagger::shortcuts::{KeyInput, ShortcutAction, ShortcutRouter};
use crate::tagger::timers::Deadline;

// =============================================================================
// Tag view
// =============================================================================

/// Page-control status of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    None,
    /// Matched controls exist, none checked
    Found,
    /// At least one matched control is checked
    Checked,
}

/// Everything the presenter needs to draw one tag chip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagView {
    pub key: TagKey,
    pub name: String,
    pub group: TagGroup,
    pub selected: bool,
    /// A keyword for this tag is on the page and the tag is not selected
    pub detected: bool,
    pub control: ControlState,
    pub control_count: usize,
}

// =============================================================================
// Session
// =============================================================================

pub struct TaggerSession {
    config: TaggerConfig,
    catalog: TagCatalog,
    index: KeywordIndex,
    scan: ScanCycle,
    store: TagSelectionStore,
    shortcuts: ShortcutRouter,
    activity: ActivityLog,
    speed: f64,
    panel_position: Option<PanelPosition>,
    panel_size: Option<PanelSize>,
    clear_after_submit: Deadline,
    last_detected: Vec<String>,
    clock: u64,
    host: Collaborators,
}

impl TaggerSession {
    pub fn new(
        config: TaggerConfig,
        catalog: TagCatalog,
        index: KeywordIndex,
        host: Collaborators,
    ) -> TaggerResult<Self> {
        config.validate()?;
        Ok(Self {
            scan: ScanCycle::new(&config),
            shortcuts: ShortcutRouter::new(config.driver_shortcut_timeout_ms),
            activity: ActivityLog::new(config.max_log_entries),
            store: TagSelectionStore::new(),
            speed: 1.0,
            panel_position: None,
            panel_size: None,
            clear_after_submit: Deadline::new(),
            last_detected: Vec::new(),
            clock: 0,
            config,
            catalog,
            index,
            host,
        })
    }

    /// Standard catalog, built-in phrases, default config
    pub fn standard(host: Collaborators) -> TaggerResult<Self> {
        Self::new(
            TaggerConfig::default(),
            TagCatalog::standard(),
            KeywordIndex::standard()?,
            host,
        )
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Restore persisted state, start the scan timers and publish initial views
    pub fn start(&mut self, now: u64) {
        self.clock = now;

        let raw = self.host.persistence.load_raw().unwrap_or_else(|e| {
            warn!("[TaggerSession] load failed, using defaults: {}", e);
            None
        });
        let state = PersistedState::load_or_default(raw.as_deref());

        let known: Vec<TagKey> = state
            .selected_tag_keys
            .iter()
            .filter(|k| k.is_no_tag() || self.catalog.contains(k))
            .cloned()
            .collect();
        if known.len() != state.selected_tag_keys.len() {
            debug!(
                "[TaggerSession] dropped {} unknown persisted tag keys",
                state.selected_tag_keys.len() - known.len()
            );
        }
        self.store.restore(&known);

        self.speed = self.config.clamp_speed(state.playback_speed);
        self.apply_playback_rate();

        let auto = if raw.is_some() {
            state.auto_detection_enabled
        } else {
            self.config.auto_detection_default
        };
        self.panel_position = state.panel_position;
        self.panel_size = state.panel_size;

        self.scan.set_auto_detection(auto, now);
        self.scan.start(now);
        self.scan.request_scan(now);

        info!(
            "[TaggerSession] started: {} tags restored, speed {}x, auto-detection {}",
            self.store.len(),
            self.speed,
            auto
        );
        self.host.presenter.on_selection_changed(self.store.keys());
        self.host.presenter.on_speed_changed(self.speed);
        self.publish_tag_view();
        self.log_activity(ActivityKind::Info, "Behavior tagger ready");
    }

    /// Drive timers. Call from a host interval; on `Yielded` schedule `resume`.
    pub fn tick(&mut self, now: u64) -> ScanStep {
        self.clock = now;

        if self.shortcuts.expire(now) {
            debug!("[TaggerSession] driver shortcut timed out");
        }
        if self.clear_after_submit.fire(now) {
            self.store.clear();
            self.log_activity(ActivityKind::Info, "All tags cleared");
            self.selection_changed();
        }

        let step = self.scan.tick(
            now,
            &self.index,
            self.host.page.as_ref(),
            self.host.discovery.as_ref(),
        );
        self.after_step(step)
    }

    /// Continue a yielded scan
    pub fn resume(&mut self, now: u64) -> ScanStep {
        self.clock = now;
        let step = self.scan.resume(now, &self.index, self.host.discovery.as_ref());
        self.after_step(step)
    }

    /// External "page changed" notification (e.g. a MutationObserver batch)
    pub fn notify_page_changed(&mut self, now: u64) {
        self.clock = now;
        self.scan.notify_change(now);
    }

    /// Debounced scan regardless of the auto-detection switch
    pub fn request_scan(&mut self, now: u64) {
        self.clock = now;
        self.scan.request_scan(now);
    }

    fn after_step(&mut self, step: ScanStep) -> ScanStep {
        match &step {
            ScanStep::Completed { .. } => self.on_scan_completed(),
            ScanStep::Aborted(e) => {
                let message = format!("Scan error: {}", e);
                self.log_activity(ActivityKind::Error, message);
            }
            _ => {}
        }
        step
    }

    fn on_scan_completed(&mut self) {
        if self.config.detection_policy == DetectionPolicy::AutoActivate {
            self.auto_activate();
        }

        let detected = self.scan.snapshot().detected_phrases();
        if detected != self.last_detected {
            if !detected.is_empty() {
                let message = format!("Detected {} keywords", detected.len());
                self.log_activity(ActivityKind::Info, message);
            }
            self.last_detected = detected;
        }

        self.host.presenter.on_scan_result(self.scan.snapshot());
        self.publish_tag_view();
    }

    /// Activate every matched, unchecked control whose tag was detected on the
    /// page, once per control, and auto-assign those tags.
    fn auto_activate(&mut self) {
        let snapshot = self.scan.snapshot();
        let mut tags: Vec<TagKey> = Vec::new();
        let mut targets: Vec<(TagKey, ControlHandle)> = Vec::new();
        for group in snapshot.assignments.groups() {
            if !snapshot.is_detected(&group.tag_key) {
                continue;
            }
            tags.push(group.tag_key.clone());
            for m in &group.matches {
                if !self.scan.is_activated(m.control.handle) {
                    targets.push((group.tag_key.clone(), m.control.handle));
                }
            }
        }

        for (tag, handle) in targets {
            match self.live_checked(handle) {
                // Already on: nothing to click, and never click it later
                Some(true) => self.scan.mark_activated(handle),
                Some(false) => {
                    if self.actuate(&tag, handle, false) {
                        self.scan.mark_activated(handle);
                    }
                }
                None => {}
            }
        }

        let mut changed = false;
        for tag in &tags {
            if self.store.auto_assign(tag) {
                info!("[TaggerSession] auto-assigned {}", tag);
                changed = true;
            }
        }
        if changed {
            self.selection_changed();
        }
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// Toggle a tag. Selecting a tag also checks its matched, unchecked
    /// controls. Unknown keys are ignored and return false.
    pub fn toggle_tag(&mut self, key: &TagKey, force_select: bool) -> bool {
        if !key.is_no_tag() && !self.catalog.contains(key) {
            debug!("[TaggerSession] ignoring unknown tag '{}'", key);
            return false;
        }

        let selected = self.store.toggle(key, force_select);
        if selected && !key.is_no_tag() {
            self.activate_unchecked(key);
        }

        let name = self.tag_name(key);
        let action = if selected { "Selected" } else { "Deselected" };
        info!("[TaggerSession] {} {}", action, key);
        self.log_activity(ActivityKind::Success, format!("{}: {}", action, name));
        self.selection_changed();
        selected
    }

    pub fn select_no_tag(&mut self) {
        self.store.select_no_tag();
        self.log_activity(ActivityKind::Info, "Selected: No Tag");
        self.host.presenter.notify("No Tag selected");
        self.selection_changed();
    }

    pub fn clear_tags(&mut self) {
        self.store.clear();
        self.log_activity(ActivityKind::Info, "All tags cleared");
        self.selection_changed();
    }

    /// Force-select every tag a detected keyword points at and check their
    /// controls. Returns the tags selected.
    pub fn select_keyword(&mut self, phrase: &str) -> Vec<TagKey> {
        let tags = self.index.lookup(phrase).to_vec();
        if tags.is_empty() {
            debug!("[TaggerSession] keyword '{}' not in index", phrase);
            return tags;
        }
        for tag in &tags {
            self.toggle_tag(tag, true);
        }
        self.log_activity(
            ActivityKind::Success,
            format!("Clicked keyword: {} → Selected related tags", phrase.trim()),
        );
        tags
    }

    /// Flip the `index`-th control matched to `key`. False when absent or the
    /// activation failed.
    pub fn activate_control(&mut self, key: &TagKey, index: usize) -> bool {
        let Some(handle) = self
            .scan
            .snapshot()
            .assignments
            .for_tag(key)
            .get(index)
            .map(|m| m.control.handle)
        else {
            return false;
        };
        let Some(checked) = self.live_checked(handle) else {
            return false;
        };
        let ok = self.actuate(key, handle, checked);
        if ok {
            self.publish_tag_view();
        }
        ok
    }

    /// Click the `index`-th detected submit button
    pub fn press_submit_button(&mut self, index: usize) -> bool {
        let Some(button) = self.scan.snapshot().submit_buttons.get(index).cloned() else {
            return false;
        };
        match self.host.actuator.activate(button.handle) {
            Ok(()) => {
                self.log_activity(ActivityKind::Success, format!("Clicked submit button: {}", button.text));
                true
            }
            Err(e) => {
                warn!("[TaggerSession] submit button click failed: {}", e);
                self.log_activity(ActivityKind::Error, format!("Failed to click button: {}", e));
                false
            }
        }
    }

    fn activate_unchecked(&mut self, key: &TagKey) {
        let handles: Vec<ControlHandle> = self
            .scan
            .snapshot()
            .assignments
            .for_tag(key)
            .iter()
            .map(|m| m.control.handle)
            .collect();
        for handle in handles {
            if self.live_checked(handle) == Some(false) {
                self.actuate(key, handle, false);
            }
        }
    }

    /// Read a control's checked state from the page and fold it into the
    /// published snapshot. `None` when the control can no longer be read.
    fn live_checked(&mut self, handle: ControlHandle) -> Option<bool> {
        match self.host.discovery.is_checked(handle) {
            Ok(checked) => {
                self.scan.set_control_checked(handle, checked);
                Some(checked)
            }
            Err(e) => {
                debug!("[TaggerSession] control {:?} unreadable, not clicking: {}", handle, e);
                None
            }
        }
    }

    /// Activate one control. `checked` is its state before the click.
    fn actuate(&mut self, key: &TagKey, handle: ControlHandle, checked: bool) -> bool {
        let name = self.tag_name(key);
        match self.host.actuator.activate(handle) {
            Ok(()) => {
                self.scan.set_control_checked(handle, !checked);
                let action = if checked { "Unchecked" } else { "Checked" };
                self.log_activity(ActivityKind::Success, format!("{} checkbox for: {}", action, name));
                true
            }
            Err(e) => {
                warn!("[TaggerSession] activation of {:?} failed: {}", handle, e);
                self.log_activity(ActivityKind::Error, format!("Failed to click checkbox: {}", e));
                false
            }
        }
    }

    // -------------------------------------------------------------------------
    // Playback, settings, submission
    // -------------------------------------------------------------------------

    /// Change playback speed by `delta`, clamped. Returns the new speed.
    pub fn adjust_speed(&mut self, delta: f64) -> f64 {
        self.speed = self.config.clamp_speed(self.speed + delta);
        self.apply_playback_rate();
        self.host.presenter.on_speed_changed(self.speed);
        self.log_activity(ActivityKind::Info, format!("Speed: {}x", self.speed));
        self.persist();
        self.speed
    }

    fn apply_playback_rate(&mut self) {
        if let Err(e) = self.host.media.set_playback_rate(self.speed) {
            warn!("[TaggerSession] playback rate not applied: {}", e);
        }
    }

    pub fn toggle_fullscreen(&mut self) {
        if let Err(e) = self.host.media.toggle_fullscreen() {
            warn!("[TaggerSession] fullscreen failed: {}", e);
            self.log_activity(ActivityKind::Error, "Fullscreen failed");
        }
    }

    pub fn set_auto_detection(&mut self, enabled: bool) {
        self.scan.set_auto_detection(enabled, self.clock);
        let state = if enabled { "enabled" } else { "disabled" };
        self.log_activity(ActivityKind::Info, format!("Auto-detection {}", state));
        self.persist();
    }

    /// Remember panel geometry set by the presenter's drag/resize handling
    pub fn set_panel_geometry(&mut self, position: Option<PanelPosition>, size: Option<PanelSize>) {
        self.panel_position = position;
        self.panel_size = size;
        self.persist();
    }

    /// Record the current selection. Empty selections are refused with a
    /// notification. Tags clear `clear_after_submit_ms` later.
    pub fn submit(&mut self, now: u64) -> Option<SubmissionRecord> {
        self.clock = now;
        if self.store.is_empty() {
            self.host.presenter.notify("No tags selected to submit");
            return None;
        }

        let tag_names: Vec<String> = self.store.keys().iter().map(|k| self.tag_name(k)).collect();
        let snapshot = self.scan.snapshot();
        let record = SubmissionRecord {
            timestamp: now,
            tag_names,
            speed: self.speed,
            page_url: self.host.page.page_url(),
            detected_keywords: snapshot.detected_phrases(),
            matched_control_count: snapshot.assignments.control_count(),
            submit_button_count: snapshot.submit_buttons.len(),
        };

        if let Err(e) = self.host.submissions.record(&record) {
            warn!("[TaggerSession] submission not stored: {}", e);
            self.log_activity(ActivityKind::Error, format!("Storage failed: {}", e));
        }

        info!("[TaggerSession] submitted {} tags", record.tag_names.len());
        self.log_activity(
            ActivityKind::Success,
            format!("Submitted {} tags", record.tag_names.len()),
        );
        self.host
            .presenter
            .notify(&format!("Submitted: {}", record.tag_names.join(", ")));
        self.clear_after_submit.arm(now, self.config.clear_after_submit_ms);
        Some(record)
    }

    // -------------------------------------------------------------------------
    // Input
    // -------------------------------------------------------------------------

    pub fn handle_command(&mut self, now: u64, command: Command) {
        self.clock = now;
        debug!("[TaggerSession] command {}", command);
        match command {
            Command::ToggleFullscreen => self.toggle_fullscreen(),
            Command::IncreaseSpeed => {
                self.adjust_speed(self.config.speed_step);
            }
            Command::DecreaseSpeed => {
                self.adjust_speed(-self.config.speed_step);
            }
            Command::SubmitTags => {
                self.submit(now);
            }
        }
    }

    /// Route a key press. Returns true when the key was consumed and the host
    /// should suppress its default action.
    pub fn handle_key(&mut self, now: u64, input: &KeyInput) -> bool {
        self.clock = now;
        let Some(action) = self.shortcuts.route(now, input) else {
            return false;
        };
        match action {
            ShortcutAction::IncreaseSpeed => {
                self.adjust_speed(self.config.speed_step);
            }
            ShortcutAction::DecreaseSpeed => {
                self.adjust_speed(-self.config.speed_step);
            }
            ShortcutAction::Submit => {
                self.submit(now);
            }
            ShortcutAction::ToggleFullscreen => self.toggle_fullscreen(),
            ShortcutAction::ToggleTag(key) => {
                self.toggle_tag(&key, false);
            }
            ShortcutAction::AwaitDriverDigit => self.host.presenter.notify("Press 1-5 for driver tag"),
        }
        true
    }

    // -------------------------------------------------------------------------
    // Views
    // -------------------------------------------------------------------------

    pub fn tag_view(&self) -> Vec<TagView> {
        let snapshot = self.scan.snapshot();
        self.catalog
            .tags()
            .iter()
            .map(|tag| {
                let selected = self.store.contains(&tag.key);
                let matches = snapshot.assignments.for_tag(&tag.key);
                let control = if matches.is_empty() {
                    ControlState::None
                } else if matches.iter().any(|m| m.control.checked) {
                    ControlState::Checked
                } else {
                    ControlState::Found
                };
                TagView {
                    key: tag.key.clone(),
                    name: tag.name.clone(),
                    group: tag.group,
                    selected,
                    detected: !selected && snapshot.is_detected(&tag.key),
                    control,
                    control_count: matches.len(),
                }
            })
            .collect()
    }

    pub fn selection(&self) -> &[TagKey] {
        self.store.keys()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn auto_detection(&self) -> bool {
        self.scan.auto_detection()
    }

    pub fn snapshot(&self) -> &ScanSnapshot {
        self.scan.snapshot()
    }

    pub fn scan(&self) -> &ScanCycle {
        &self.scan
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn catalog(&self) -> &TagCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &TaggerConfig {
        &self.config
    }

    pub fn is_awaiting_driver_digit(&self) -> bool {
        self.shortcuts.is_waiting()
    }

    /// State as it would be persisted right now
    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            selected_tag_keys: self.store.snapshot(),
            playback_speed: self.speed,
            auto_detection_enabled: self.scan.auto_detection(),
            panel_position: self.panel_position,
            panel_size: self.panel_size,
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn tag_name(&self, key: &TagKey) -> String {
        self.catalog
            .display_name(key)
            .map(str::to_string)
            .unwrap_or_else(|| key.to_string())
    }

    fn selection_changed(&mut self) {
        self.host.presenter.on_selection_changed(self.store.keys());
        self.publish_tag_view();
        self.persist();
    }

    fn publish_tag_view(&mut self) {
        let view = self.tag_view();
        self.host.presenter.on_tag_view(&view);
    }

    fn persist(&mut self) {
        let blob = match self.persisted_state().to_json() {
            Ok(blob) => blob,
            Err(e) => {
                warn!("[TaggerSession] state not serializable: {}", e);
                return;
            }
        };
        if let Err(e) = self.host.persistence.save_raw(&blob) {
            warn!("[TaggerSession] save failed: {}", e);
        }
    }

    fn log_activity(&mut self, kind: ActivityKind, message: impl Into<String>) {
        let record = self.activity.push(self.clock, kind, message);
        self.host.presenter.on_activity(&record);
    }
}
