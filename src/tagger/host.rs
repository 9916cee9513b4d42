//! Host interfaces - everything the engine needs from the page and the
//! extension, and nothing more.
//!
//! The engine never touches the DOM directly. A host (the WASM shim in a real
//! browser, in-memory fakes in tests) implements these traits and the session
//! receives them boxed through [`Collaborators`].

use serde::{Deserialize, Serialize};

use crate::tagger::activity::ActivityRecord;
use crate::tagger::catalog::TagKey;
use crate::tagger::error::{TaggerError, TaggerResult};
use crate::tagger::scan::ScanSnapshot;
use crate::tagger::session::TagView;

// =============================================================================
// Page-side data
// =============================================================================

/// Opaque, stable identity of a control on the page. Assigned by the host
/// (e.g. from a WeakMap of elements) and reused across scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlHandle(pub u32);

/// A checkbox-like control as discovered, before its label is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRef {
    pub handle: ControlHandle,
    pub checked: bool,
}

/// A control with its resolved label text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageControl {
    pub handle: ControlHandle,
    pub label_text: String,
    pub checked: bool,
}

/// How a button was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ButtonKind {
    /// `<input type="submit">`
    InputSubmit,
    /// `<button type="submit">`
    ButtonSubmit,
    /// Any other `<button>`
    Plain,
}

/// A button as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonRef {
    pub handle: ControlHandle,
    pub kind: ButtonKind,
    pub text: String,
}

/// What gets recorded when the operator submits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    /// Milliseconds since the epoch
    pub timestamp: u64,
    pub tag_names: Vec<String>,
    pub speed: f64,
    pub page_url: String,
    pub detected_keywords: Vec<String>,
    pub matched_control_count: usize,
    pub submit_button_count: usize,
}

// =============================================================================
// Collaborator traits
// =============================================================================

pub trait PageTextSource {
    /// Full visible text of the document, lowercased
    fn normalized_text(&self) -> TaggerResult<String>;

    fn page_url(&self) -> String {
        String::new()
    }
}

pub trait ControlDiscovery {
    fn find_checkbox_like_controls(&self) -> TaggerResult<Vec<ControlRef>>;

    /// Label for a control: explicit `<label for>`, then a wrapping label,
    /// then the nearest textual container. First non-empty result wins.
    fn label_text(&self, handle: ControlHandle) -> TaggerResult<String>;

    fn find_buttons(&self) -> TaggerResult<Vec<ButtonRef>> {
        Ok(Vec::new())
    }

    /// Checked state as the page has it now, not as last scanned
    fn is_checked(&self, handle: ControlHandle) -> TaggerResult<bool> {
        self.find_checkbox_like_controls()?
            .into_iter()
            .find(|c| c.handle == handle)
            .map(|c| c.checked)
            .ok_or_else(|| TaggerError::Discovery(format!("control {} no longer on the page", handle.0)))
    }
}

pub trait ControlActuator {
    /// Simulate a user click + change on the control
    fn activate(&mut self, handle: ControlHandle) -> TaggerResult<()>;
}

pub trait Presenter {
    fn on_scan_result(&mut self, snapshot: &ScanSnapshot);

    fn on_selection_changed(&mut self, selected: &[TagKey]);

    fn on_tag_view(&mut self, _view: &[TagView]) {}

    fn on_activity(&mut self, _record: &ActivityRecord) {}

    fn on_speed_changed(&mut self, _speed: f64) {}

    /// Transient toast message
    fn notify(&mut self, _message: &str) {}
}

/// Opaque key-value blob storage
pub trait Persistence {
    fn load_raw(&self) -> TaggerResult<Option<String>>;

    fn save_raw(&mut self, blob: &str) -> TaggerResult<()>;
}

pub trait SubmissionSink {
    fn record(&mut self, record: &SubmissionRecord) -> TaggerResult<()>;
}

pub trait MediaControl {
    /// Apply a playback rate to every video on the page
    fn set_playback_rate(&mut self, rate: f64) -> TaggerResult<()>;

    fn toggle_fullscreen(&mut self) -> TaggerResult<()>;
}

/// Injected collaborators for a session
pub struct Collaborators {
    pub page: Box<dyn PageTextSource>,
    pub discovery: Box<dyn ControlDiscovery>,
    pub actuator: Box<dyn ControlActuator>,
    pub presenter: Box<dyn Presenter>,
    pub persistence: Box<dyn Persistence>,
    pub submissions: Box<dyn SubmissionSink>,
    pub media: Box<dyn MediaControl>,
}
