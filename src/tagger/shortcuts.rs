//! Keyboard shortcut routing
//!
//! | Keys          | Action                      |
//! |---------------|-----------------------------|
//! | Ctrl+↑ / ↓    | speed up / down             |
//! | Ctrl+Space    | submit                      |
//! | Alt+F         | toggle fullscreen           |
//! | F1..F12       | toggle road-facing tag      |
//! | D, then 1..5  | toggle driver-facing tag    |
//!
//! The driver shortcut is two keys. Pressing `d` arms a deadline; the next
//! key disarms it (a digit 1..5 selects the tag) and so does expiry.

use serde::{Deserialize, Serialize};

use crate::tagger::catalog::TagKey;
use crate::tagger::timers::Deadline;

/// A key press as reported by the host (`KeyboardEvent` fields)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyInput {
    pub key: String,
    #[serde(alias = "ctrlKey")]
    pub ctrl: bool,
    #[serde(alias = "altKey")]
    pub alt: bool,
    #[serde(alias = "shiftKey")]
    pub shift: bool,
    pub repeat: bool,
}

impl KeyInput {
    pub fn plain(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn ctrl(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn alt(key: &str) -> Self {
        Self {
            key: key.to_string(),
            alt: true,
            ..Self::default()
        }
    }

    fn unmodified(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortcutAction {
    IncreaseSpeed,
    DecreaseSpeed,
    Submit,
    ToggleFullscreen,
    ToggleTag(TagKey),
    /// `d` pressed; waiting for the digit
    AwaitDriverDigit,
}

#[derive(Debug, Clone)]
pub struct ShortcutRouter {
    timeout_ms: u64,
    pending_driver: Deadline,
}

impl ShortcutRouter {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            pending_driver: Deadline::new(),
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.pending_driver.is_armed()
    }

    /// Drop an expired driver wait. Returns true if it timed out now.
    pub fn expire(&mut self, now: u64) -> bool {
        self.pending_driver.fire(now)
    }

    pub fn route(&mut self, now: u64, input: &KeyInput) -> Option<ShortcutAction> {
        if input.repeat {
            return None;
        }
        self.expire(now);

        if self.pending_driver.cancel() {
            if let Some(action) = driver_digit(input) {
                return Some(action);
            }
        }

        match input.key.as_str() {
            "ArrowUp" if input.ctrl => Some(ShortcutAction::IncreaseSpeed),
            "ArrowDown" if input.ctrl => Some(ShortcutAction::DecreaseSpeed),
            " " | "Spacebar" if input.ctrl => Some(ShortcutAction::Submit),
            "f" | "F" if input.alt => Some(ShortcutAction::ToggleFullscreen),
            "d" | "D" if input.unmodified() => {
                self.pending_driver.arm(now, self.timeout_ms);
                Some(ShortcutAction::AwaitDriverDigit)
            }
            key if input.unmodified() => function_key(key),
            _ => None,
        }
    }
}

/// `F1`..`F12` → `f1`..`f12`
fn function_key(key: &str) -> Option<ShortcutAction> {
    let n: u8 = key.strip_prefix('F')?.parse().ok()?;
    (1..=12)
        .contains(&n)
        .then(|| ShortcutAction::ToggleTag(TagKey::new(format!("f{}", n))))
}

fn driver_digit(input: &KeyInput) -> Option<ShortcutAction> {
    match input.key.as_str() {
        d @ ("1" | "2" | "3" | "4" | "5") => Some(ShortcutAction::ToggleTag(TagKey::new(format!("d{}", d)))),
        _ => None,
    }
}
