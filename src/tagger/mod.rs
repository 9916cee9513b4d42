//! Tagger: keyword detection, checkbox matching and tag selection
//!
//! One `TaggerSession` owns everything. The host (content script or a test
//! fake) supplies page access through the traits in `host` and drives time
//! explicitly with `tick(now)`.
//!
//! - `catalog` / `keywords` - tag set and the phrase automaton
//! - `scorer` / `resolver` - label scoring and best-tag assignment
//! - `registry` / `scan` - per-control cache and the chunked scan cycle
//! - `selection` / `settings` - selected tags and their persisted form
//! - `shortcuts` / `commands` - keyboard and extension-command routing
//! - `wasm` - JS bindings

pub mod error;
pub mod catalog;
pub mod keywords;
pub mod scorer;
pub mod resolver;
pub mod host;
pub mod registry;
pub mod timers;
pub mod config;
pub mod buttons;
pub mod scan;
pub mod activity;
pub mod selection;
pub mod settings;
pub mod shortcuts;
pub mod commands;
pub mod session;
pub mod wasm;

pub use error::*;
pub use catalog::*;
pub use keywords::*;
pub use scorer::*;
pub use resolver::*;
pub use host::*;
pub use registry::*;
pub use timers::*;
pub use config::*;
pub use buttons::*;
pub use scan::*;
pub use activity::*;
pub use selection::*;
pub use settings::*;
pub use shortcuts::*;
pub use commands::*;
pub use session::*;
pub use wasm::*;

#[cfg(test)]
mod tests;
