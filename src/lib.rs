//! TagCore: Keyword Checkbox Matcher + Tag Selection Engine
//!
//! A Rust/WASM engine behind the behavior-tagging overlay. It watches a review
//! page for known behavior keywords, maps the page's checkboxes to tags by
//! label, and keeps the operator's tag selection, speed and panel layout.
//!
//! # Architecture
//!
//! ## Matching
//! - `catalog.rs` - TagCatalog: the fixed F1-F12 / D1-D5 tag set plus "no-tag"
//! - `keywords.rs` - KeywordIndex: phrase table compiled to Aho-Corasick
//! - `scorer.rs` - MatchScorer: word-boundary / substring / word-overlap scoring
//! - `resolver.rs` - CheckboxResolver: best tag per control, ranked per tag
//!
//! ## Scanning
//! - `registry.rs` - ControlRegistry: identity-keyed label cache
//! - `scan.rs` - ScanCycle: debounced, chunked, non-reentrant scan cycle
//! - `timers.rs` - Debouncer / IntervalTimer / Deadline over explicit time
//!
//! ## Session
//! - `selection.rs` - TagSelectionStore: ordered selection with no-tag exclusivity
//! - `session.rs` - TaggerSession: operator actions, submission, activity log
//! - `shortcuts.rs` / `commands.rs` - keyboard and extension-command routing
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { TaggerCore, initLogging } from 'tagcore';
//!
//! await init();
//! initLogging();
//!
//! const core = new TaggerCore(callbacks);   // see `tagger::wasm`
//! core.start();
//!
//! document.addEventListener('keydown', (e) => {
//!   if (core.handleKey(e)) e.preventDefault();
//! });
//!
//! core.toggleTag('f2', false);
//! const record = core.submit();   // null when nothing is selected
//! ```

pub mod tagger;

pub use tagger::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("tagcore v{}", env!("CARGO_PKG_VERSION"))
}
