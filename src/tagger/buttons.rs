//! Submit button detection
//!
//! Explicit submit inputs and buttons always count. Other buttons count when
//! their text mentions one of the submit-like verbs.

use serde::{Deserialize, Serialize};

use crate::tagger::host::{ButtonKind, ButtonRef, ControlHandle};

const SUBMIT_WORDS: &[&str] = &["submit", "send", "save", "confirm", "apply"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitButton {
    pub handle: ControlHandle,
    pub text: String,
    pub kind: ButtonKind,
}

/// Classify one button; `None` for plain buttons without submit-like text
pub fn classify(button: &ButtonRef) -> Option<SubmitButton> {
    let text = button.text.trim();
    match button.kind {
        ButtonKind::InputSubmit | ButtonKind::ButtonSubmit => Some(SubmitButton {
            handle: button.handle,
            text: if text.is_empty() { "Submit".to_string() } else { text.to_string() },
            kind: button.kind,
        }),
        ButtonKind::Plain => {
            let lower = text.to_lowercase();
            SUBMIT_WORDS
                .iter()
                .any(|w| lower.contains(w))
                .then(|| SubmitButton {
                    handle: button.handle,
                    text: text.to_string(),
                    kind: ButtonKind::Plain,
                })
        }
    }
}

/// Classify a button list, keeping each handle once (first classification wins)
pub fn detect_submit_buttons(buttons: &[ButtonRef]) -> Vec<SubmitButton> {
    let mut found: Vec<SubmitButton> = Vec::new();
    for button in buttons {
        if found.iter().any(|b| b.handle == button.handle) {
            continue;
        }
        if let Some(submit) = classify(button) {
            found.push(submit);
        }
    }
    found
}
