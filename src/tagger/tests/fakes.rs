//! In-memory page for tests. One shared model implements every host trait so
//! a test can mutate the "DOM" between ticks and inspect what the engine did.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::rc::Rc;

use crate::tagger::activity::ActivityRecord;
use crate::tagger::catalog::TagKey;
use crate::tagger::error::{TaggerError, TaggerResult};
use crate::tagger::host::{
    ButtonKind, ButtonRef, Collaborators, ControlActuator, ControlDiscovery, ControlHandle, ControlRef,
    MediaControl, PageTextSource, Persistence, Presenter, SubmissionRecord, SubmissionSink,
};
use crate::tagger::scan::ScanSnapshot;
use crate::tagger::session::TagView;

#[derive(Debug, Clone)]
pub struct FakeControl {
    pub handle: ControlHandle,
    pub label: String,
    pub checked: bool,
    /// Listed by discovery but its label lookup fails
    pub detached: bool,
}

#[derive(Debug, Default)]
pub struct PageModel {
    pub text: String,
    pub url: String,
    pub controls: Vec<FakeControl>,
    pub buttons: Vec<ButtonRef>,

    pub fail_text: bool,
    pub fail_discovery: bool,
    pub fail_activation: HashSet<ControlHandle>,
    pub fail_load: bool,
    pub fail_save: bool,
    pub fail_media: bool,

    pub activations: Vec<ControlHandle>,
    pub label_reads: usize,

    pub scans: Vec<ScanSnapshot>,
    pub selections: Vec<Vec<TagKey>>,
    pub tag_views: Vec<Vec<TagView>>,
    pub activity: Vec<ActivityRecord>,
    pub notifications: Vec<String>,
    pub speeds: Vec<f64>,

    pub storage: Option<String>,
    pub saves: usize,
    pub submissions: Vec<SubmissionRecord>,
    pub playback_rates: Vec<f64>,
    pub fullscreen_toggles: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FakeHost(Rc<RefCell<PageModel>>);

impl FakeHost {
    pub fn new(text: &str) -> Self {
        let host = Self::default();
        host.model_mut().text = text.to_string();
        host.model_mut().url = "https://review.example/clip/42".to_string();
        host
    }

    pub fn model(&self) -> Ref<'_, PageModel> {
        self.0.borrow()
    }

    pub fn model_mut(&self) -> RefMut<'_, PageModel> {
        self.0.borrow_mut()
    }

    pub fn collaborators(&self) -> Collaborators {
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

    pub fn set_text(&self, text: &str) {
        self.model_mut().text = text.to_string();
    }

    pub fn add_control(&self, id: u32, label: &str, checked: bool) {
        self.model_mut().controls.push(FakeControl {
            handle: ControlHandle(id),
            label: label.to_string(),
            checked,
            detached: false,
        });
    }

    pub fn remove_control(&self, id: u32) {
        self.model_mut().controls.retain(|c| c.handle != ControlHandle(id));
    }

    pub fn detach_control(&self, id: u32) {
        let mut model = self.model_mut();
        if let Some(c) = model.controls.iter_mut().find(|c| c.handle == ControlHandle(id)) {
            c.detached = true;
        }
    }

    pub fn set_label(&self, id: u32, label: &str) {
        let mut model = self.model_mut();
        if let Some(c) = model.controls.iter_mut().find(|c| c.handle == ControlHandle(id)) {
            c.label = label.to_string();
        }
    }

    pub fn is_checked(&self, id: u32) -> bool {
        self.model()
            .controls
            .iter()
            .any(|c| c.handle == ControlHandle(id) && c.checked)
    }

    pub fn add_button(&self, id: u32, kind: ButtonKind, text: &str) {
        self.model_mut().buttons.push(ButtonRef {
            handle: ControlHandle(id),
            kind,
            text: text.to_string(),
        });
    }

    pub fn store(&self, blob: &str) {
        self.model_mut().storage = Some(blob.to_string());
    }
}

impl PageTextSource for FakeHost {
    fn normalized_text(&self) -> TaggerResult<String> {
        let model = self.model();
        if model.fail_text {
            return Err(TaggerError::Discovery("document body unavailable".into()));
        }
        Ok(model.text.to_lowercase())
    }

    fn page_url(&self) -> String {
        self.model().url.clone()
    }
}

impl ControlDiscovery for FakeHost {
    fn find_checkbox_like_controls(&self) -> TaggerResult<Vec<ControlRef>> {
        let model = self.model();
        if model.fail_discovery {
            return Err(TaggerError::Discovery("querySelectorAll threw".into()));
        }
        Ok(model
            .controls
            .iter()
            .map(|c| ControlRef {
                handle: c.handle,
                checked: c.checked,
            })
            .collect())
    }

    fn label_text(&self, handle: ControlHandle) -> TaggerResult<String> {
        let mut model = self.model_mut();
        model.label_reads += 1;
        match model.controls.iter().find(|c| c.handle == handle) {
            Some(c) if !c.detached => Ok(c.label.clone()),
            _ => Err(TaggerError::Discovery(format!("control {} detached", handle.0))),
        }
    }

    fn find_buttons(&self) -> TaggerResult<Vec<ButtonRef>> {
        Ok(self.model().buttons.clone())
    }
}

impl ControlActuator for FakeHost {
    fn activate(&mut self, handle: ControlHandle) -> TaggerResult<()> {
        let mut model = self.model_mut();
        if model.fail_activation.contains(&handle) {
            return Err(TaggerError::Actuation(format!("click on {} threw", handle.0)));
        }
        model.activations.push(handle);
        if let Some(c) = model.controls.iter_mut().find(|c| c.handle == handle) {
            c.checked = !c.checked;
        }
        Ok(())
    }
}

impl Presenter for FakeHost {
    fn on_scan_result(&mut self, snapshot: &ScanSnapshot) {
        self.model_mut().scans.push(snapshot.clone());
    }

    fn on_selection_changed(&mut self, selected: &[TagKey]) {
        self.model_mut().selections.push(selected.to_vec());
    }

    fn on_tag_view(&mut self, view: &[TagView]) {
        self.model_mut().tag_views.push(view.to_vec());
    }

    fn on_activity(&mut self, record: &ActivityRecord) {
        self.model_mut().activity.push(record.clone());
    }

    fn on_speed_changed(&mut self, speed: f64) {
        self.model_mut().speeds.push(speed);
    }

    fn notify(&mut self, message: &str) {
        self.model_mut().notifications.push(message.to_string());
    }
}

impl Persistence for FakeHost {
    fn load_raw(&self) -> TaggerResult<Option<String>> {
        let model = self.model();
        if model.fail_load {
            return Err(TaggerError::Persistence("storage access denied".into()));
        }
        Ok(model.storage.clone())
    }

    fn save_raw(&mut self, blob: &str) -> TaggerResult<()> {
        let mut model = self.model_mut();
        if model.fail_save {
            return Err(TaggerError::Persistence("quota exceeded".into()));
        }
        model.storage = Some(blob.to_string());
        model.saves += 1;
        Ok(())
    }
}

impl SubmissionSink for FakeHost {
    fn record(&mut self, record: &SubmissionRecord) -> TaggerResult<()> {
        self.model_mut().submissions.push(record.clone());
        Ok(())
    }
}

impl MediaControl for FakeHost {
    fn set_playback_rate(&mut self, rate: f64) -> TaggerResult<()> {
        let mut model = self.model_mut();
        if model.fail_media {
            return Err(TaggerError::Actuation("no video element".into()));
        }
        model.playback_rates.push(rate);
        Ok(())
    }

    fn toggle_fullscreen(&mut self) -> TaggerResult<()> {
        let mut model = self.model_mut();
        if model.fail_media {
            return Err(TaggerError::Actuation("fullscreen request rejected".into()));
        }
        model.fullscreen_toggles += 1;
        Ok(())
    }
}
