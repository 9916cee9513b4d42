//! WASM bindings: `TaggerCore`
//!
//! The content script builds one `TaggerCore` with a callbacks object and
//! drives it from its own timers and event listeners:
//!
//! ```javascript,ignore
//! import init, { TaggerCore, initLogging } from 'tagcore';
//!
//! await init();
//! initLogging();
//!
//! const core = new TaggerCore({
//!   getPageText: () => document.body.textContent.toLowerCase(),
//!   getPageUrl: () => location.href,
//!   findControls: () => controls.scan(),          // [{ handle, checked }]
//!   getLabelText: (handle) => controls.label(handle),
//!   findButtons: () => controls.buttons(),        // [{ handle, kind, text }]
//!   isChecked: (handle) => controls.isChecked(handle),
//!   activate: (handle) => controls.click(handle),
//!   onScanResult: (snapshot) => panel.renderScan(snapshot),
//!   onSelectionChanged: (keys) => panel.renderSelection(keys),
//!   onTagView: (views) => panel.renderTags(views),
//!   onActivity: (record) => panel.log(record),
//!   onSpeedChanged: (speed) => panel.renderSpeed(speed),
//!   notify: (message) => panel.toast(message),
//!   load: () => localStorage.getItem('behaviorTaggerSettings'),
//!   save: (blob) => localStorage.setItem('behaviorTaggerSettings', blob),
//!   recordSubmission: (record) => submissions.push(record),
//!   setPlaybackRate: (rate) => videos.forEach(v => (v.playbackRate = rate)),
//!   toggleFullscreen: () => fullscreen.toggle(),
//! });
//!
//! core.start();
//! setInterval(function drive() {
//!   let step = core.tick();
//!   const cont = () => { if (core.resume() === 'yielded') setTimeout(cont, 0); };
//!   if (step === 'yielded') setTimeout(cont, 0);
//! }, 100);
//! new MutationObserver(() => core.notifyPageChanged()).observe(document.body, { childList: true, subtree: true });
//! ```
//!
//! Missing callbacks are treated as no-ops returning `undefined`.

use js_sys::{Date, Function, Object, Reflect};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use tracing::warn;
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::tagger::activity::ActivityRecord;
use crate::tagger::catalog::{TagCatalog, TagKey};
use crate::tagger::commands::Command;
use crate::tagger::config::TaggerConfig;
use crate::tagger::error::{TaggerError, TaggerResult};
use crate::tagger::host::{
    ButtonRef, Collaborators, ControlActuator, ControlDiscovery, ControlHandle, ControlRef, MediaControl,
    PageTextSource, Persistence, Presenter, SubmissionRecord, SubmissionSink,
};
use crate::tagger::keywords::{KeywordIndex, PhraseTable};
use crate::tagger::scan::{ScanSnapshot, ScanStep};
use crate::tagger::session::{TagView, TaggerSession};
use crate::tagger::settings::{PanelPosition, PanelSize};
use crate::tagger::shortcuts::KeyInput;

// =============================================================================
// Helpers
// =============================================================================

fn now_ms() -> u64 {
    Date::now() as u64
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_message(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| value.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{:?}", value))
}

fn step_name(step: &ScanStep) -> &'static str {
    match step {
        ScanStep::Idle => "idle",
        ScanStep::Busy => "busy",
        ScanStep::Suppressed => "suppressed",
        ScanStep::Yielded => "yielded",
        ScanStep::Completed { .. } => "completed",
        ScanStep::Aborted(_) => "aborted",
    }
}

// =============================================================================
// JsHost: collaborator traits over a JS callbacks object
// =============================================================================

#[derive(Clone)]
struct JsHost {
    callbacks: Object,
}

impl JsHost {
    fn function(&self, name: &str) -> Option<Function> {
        Reflect::get(&self.callbacks, &JsValue::from_str(name))
            .ok()?
            .dyn_into::<Function>()
            .ok()
    }

    fn call(&self, name: &str, args: &[JsValue], err: fn(String) -> TaggerError) -> TaggerResult<JsValue> {
        let Some(f) = self.function(name) else {
            return Ok(JsValue::UNDEFINED);
        };
        let result = match args {
            [] => f.call0(&self.callbacks),
            [a] => f.call1(&self.callbacks, a),
            [a, b, ..] => f.call2(&self.callbacks, a, b),
        };
        result.map_err(|e| err(format!("{}: {}", name, js_message(&e))))
    }

    fn call_with<T: DeserializeOwned>(
        &self,
        name: &str,
        args: &[JsValue],
        err: fn(String) -> TaggerError,
    ) -> TaggerResult<T> {
        let value = self.call(name, args, err)?;
        serde_wasm_bindgen::from_value(value).map_err(|e| err(format!("{}: {}", name, e)))
    }

    /// Presenter calls are fire-and-forget
    fn present<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        let result = to_js(value)
            .map_err(|e| js_message(&e))
            .and_then(|v| self.call(name, &[v], TaggerError::Discovery).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!("[TaggerCore] {} callback failed: {}", name, e);
        }
    }
}

impl PageTextSource for JsHost {
    fn normalized_text(&self) -> TaggerResult<String> {
        let text: Option<String> = self.call_with("getPageText", &[], TaggerError::Discovery)?;
        Ok(text.unwrap_or_default().to_lowercase())
    }

    fn page_url(&self) -> String {
        self.call_with::<Option<String>>("getPageUrl", &[], TaggerError::Discovery)
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}

impl ControlDiscovery for JsHost {
    fn find_checkbox_like_controls(&self) -> TaggerResult<Vec<ControlRef>> {
        let controls: Option<Vec<ControlRef>> = self.call_with("findControls", &[], TaggerError::Discovery)?;
        Ok(controls.unwrap_or_default())
    }

    fn label_text(&self, handle: ControlHandle) -> TaggerResult<String> {
        let label: Option<String> =
            self.call_with("getLabelText", &[JsValue::from(handle.0)], TaggerError::Discovery)?;
        label.ok_or_else(|| TaggerError::Discovery(format!("no label for control {}", handle.0)))
    }

    fn find_buttons(&self) -> TaggerResult<Vec<ButtonRef>> {
        let buttons: Option<Vec<ButtonRef>> = self.call_with("findButtons", &[], TaggerError::Discovery)?;
        Ok(buttons.unwrap_or_default())
    }

    fn is_checked(&self, handle: ControlHandle) -> TaggerResult<bool> {
        let checked: Option<bool> = self.call_with("isChecked", &[JsValue::from(handle.0)], TaggerError::Discovery)?;
        if let Some(checked) = checked {
            return Ok(checked);
        }
        // No isChecked callback: fall back to a fresh discovery pass
        self.find_checkbox_like_controls()?
            .into_iter()
            .find(|c| c.handle == handle)
            .map(|c| c.checked)
            .ok_or_else(|| TaggerError::Discovery(format!("control {} no longer on the page", handle.0)))
    }
}

impl ControlActuator for JsHost {
    fn activate(&mut self, handle: ControlHandle) -> TaggerResult<()> {
        self.call("activate", &[JsValue::from(handle.0)], TaggerError::Actuation)
            .map(|_| ())
    }
}

impl Presenter for JsHost {
    fn on_scan_result(&mut self, snapshot: &ScanSnapshot) {
        self.present("onScanResult", snapshot);
    }

    fn on_selection_changed(&mut self, selected: &[TagKey]) {
        self.present("onSelectionChanged", selected);
    }

    fn on_tag_view(&mut self, view: &[TagView]) {
        self.present("onTagView", view);
    }

    fn on_activity(&mut self, record: &ActivityRecord) {
        self.present("onActivity", record);
    }

    fn on_speed_changed(&mut self, speed: f64) {
        self.present("onSpeedChanged", &speed);
    }

    fn notify(&mut self, message: &str) {
        self.present("notify", message);
    }
}

impl Persistence for JsHost {
    fn load_raw(&self) -> TaggerResult<Option<String>> {
        let value = self.call("load", &[], TaggerError::Persistence)?;
        Ok(value.as_string())
    }

    fn save_raw(&mut self, blob: &str) -> TaggerResult<()> {
        self.call("save", &[JsValue::from_str(blob)], TaggerError::Persistence)
            .map(|_| ())
    }
}

impl SubmissionSink for JsHost {
    fn record(&mut self, record: &SubmissionRecord) -> TaggerResult<()> {
        let value = to_js(record).map_err(|e| TaggerError::Submission(js_message(&e)))?;
        self.call("recordSubmission", &[value], TaggerError::Submission)
            .map(|_| ())
    }
}

impl MediaControl for JsHost {
    fn set_playback_rate(&mut self, rate: f64) -> TaggerResult<()> {
        self.call("setPlaybackRate", &[JsValue::from_f64(rate)], TaggerError::Actuation)
            .map(|_| ())
    }

    fn toggle_fullscreen(&mut self) -> TaggerResult<()> {
        self.call("toggleFullscreen", &[], TaggerError::Actuation).map(|_| ())
    }
}

impl JsHost {
    fn collaborators(&self) -> Collaborators {
        Collaborators {
            page: Box::new(self.clone()),
            discovery: Box::new(self.clone()),
            actuator: Box::new(self.clone()),
            presenter: Box::new(self.clone()),
            persistence: Box::new(self.clone()),
            submissions: Box::new(self.clone()),
            media: Box::new(self.clone()),
        }
    }
}

// =============================================================================
// TaggerCore
// =============================================================================

#[wasm_bindgen]
pub struct TaggerCore {
    session: TaggerSession,
}

#[wasm_bindgen]
impl TaggerCore {
    /// `config_json` is a partial `TaggerConfig`; `phrases_json` an ordered
    /// `[{ tag, phrases }]` table. Either may be omitted for the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(
        callbacks: Object,
        config_json: Option<String>,
        phrases_json: Option<String>,
    ) -> Result<TaggerCore, JsValue> {
        let config = match config_json {
            Some(json) => TaggerConfig::from_json(&json),
            None => Ok(TaggerConfig::default()),
        }
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

        let catalog = TagCatalog::standard();
        let table = match phrases_json {
            Some(json) => PhraseTable::from_json(&json),
            None => Ok(PhraseTable::standard()),
        }
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let index = KeywordIndex::build(&catalog, &table).map_err(|e| JsValue::from_str(&e.to_string()))?;

        let host = JsHost { callbacks };
        let session = TaggerSession::new(config, catalog, index, host.collaborators())
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(TaggerCore { session })
    }

    pub fn start(&mut self) {
        self.session.start(now_ms());
    }

    /// Returns the step name; on `"yielded"` schedule `resume()` with a
    /// zero-delay timeout.
    pub fn tick(&mut self) -> String {
        step_name(&self.session.tick(now_ms())).to_string()
    }

    pub fn resume(&mut self) -> String {
        step_name(&self.session.resume(now_ms())).to_string()
    }

    #[wasm_bindgen(js_name = notifyPageChanged)]
    pub fn notify_page_changed(&mut self) {
        self.session.notify_page_changed(now_ms());
    }

    #[wasm_bindgen(js_name = requestScan)]
    pub fn request_scan(&mut self) {
        self.session.request_scan(now_ms());
    }

    // ========================================================================
    // Selection
    // ========================================================================

    #[wasm_bindgen(js_name = toggleTag)]
    pub fn toggle_tag(&mut self, key: &str, force_select: bool) -> bool {
        self.session.toggle_tag(&TagKey::new(key), force_select)
    }

    #[wasm_bindgen(js_name = selectNoTag)]
    pub fn select_no_tag(&mut self) {
        self.session.select_no_tag();
    }

    #[wasm_bindgen(js_name = clearTags)]
    pub fn clear_tags(&mut self) {
        self.session.clear_tags();
    }

    /// Returns the selected tag keys
    #[wasm_bindgen(js_name = selectKeyword)]
    pub fn select_keyword(&mut self, phrase: &str) -> Result<JsValue, JsValue> {
        let tags = self.session.select_keyword(phrase);
        to_js(&tags)
    }

    #[wasm_bindgen(js_name = activateControl)]
    pub fn activate_control(&mut self, key: &str, index: usize) -> bool {
        self.session.activate_control(&TagKey::new(key), index)
    }

    #[wasm_bindgen(js_name = pressSubmitButton)]
    pub fn press_submit_button(&mut self, index: usize) -> bool {
        self.session.press_submit_button(index)
    }

    // ========================================================================
    // Playback, settings, submission
    // ========================================================================

    #[wasm_bindgen(js_name = adjustSpeed)]
    pub fn adjust_speed(&mut self, delta: f64) -> f64 {
        self.session.adjust_speed(delta)
    }

    #[wasm_bindgen(js_name = setAutoDetection)]
    pub fn set_auto_detection(&mut self, enabled: bool) {
        self.session.set_auto_detection(enabled);
    }

    /// `{ top, left }` and `{ width, height }`; pass `null` to forget either
    #[wasm_bindgen(js_name = setPanelGeometry)]
    pub fn set_panel_geometry(&mut self, position: JsValue, size: JsValue) -> Result<(), JsValue> {
        let position: Option<PanelPosition> =
            serde_wasm_bindgen::from_value(position).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let size: Option<PanelSize> =
            serde_wasm_bindgen::from_value(size).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.session.set_panel_geometry(position, size);
        Ok(())
    }

    /// The submission record, or `null` when nothing was selected
    pub fn submit(&mut self) -> Result<JsValue, JsValue> {
        match self.session.submit(now_ms()) {
            Some(record) => to_js(&record),
            None => Ok(JsValue::NULL),
        }
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Extension command by name, e.g. `"submit-tags"`
    #[wasm_bindgen(js_name = handleCommand)]
    pub fn handle_command(&mut self, name: &str) -> Result<(), JsValue> {
        let command: Command = name.parse().map_err(|e: TaggerError| JsValue::from_str(&e.to_string()))?;
        self.session.handle_command(now_ms(), command);
        Ok(())
    }

    /// `{ key, ctrlKey, altKey, shiftKey, repeat }`. Returns true when the
    /// caller should `preventDefault()`.
    #[wasm_bindgen(js_name = handleKey)]
    pub fn handle_key(&mut self, event: JsValue) -> Result<bool, JsValue> {
        let input: KeyInput = serde_wasm_bindgen::from_value(event).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(self.session.handle_key(now_ms(), &input))
    }

    // ========================================================================
    // Views
    // ========================================================================

    #[wasm_bindgen(js_name = tagView)]
    pub fn tag_view(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.tag_view())
    }

    pub fn selection(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.selection())
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_js(self.session.snapshot())
    }

    pub fn speed(&self) -> f64 {
        self.session.speed()
    }

    #[wasm_bindgen(js_name = autoDetection)]
    pub fn auto_detection(&self) -> bool {
        self.session.auto_detection()
    }

    /// Scan counters and registry cache stats
    pub fn stats(&self) -> Result<JsValue, JsValue> {
        let scan = self.session.scan();
        let stats = serde_json::json!({
            "scans": scan.counters(),
            "registry": scan.registry().stats(),
            "registrySize": scan.registry().len(),
            "hitRate": scan.registry().hit_rate(),
            "lastScanMs": scan.last_scan_ms(),
        });
        to_js(&stats)
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Line-buffered writer that emits each formatted event to `console.log`
struct ConsoleWriter {
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            let line = String::from_utf8_lossy(&self.buf);
            web_sys::console::log_1(&JsValue::from_str(line.trim_end()));
            self.buf.clear();
        }
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let _ = io::Write::flush(self);
    }
}

struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter { buf: Vec::new() }
    }
}

/// Route `tracing` output to the browser console. Safe to call twice.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging() {
    let installed = tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter)
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
    if installed.is_err() {
        web_sys::console::log_1(&JsValue::from_str("[TaggerCore] logging already initialized"));
    }
}
