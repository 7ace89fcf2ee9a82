//! Response-driven extraction
//!
//! Each module extracts from text in one format. These are pure functions;
//! logging of found and not-found values and storing them is the plugin's job.

mod html_extractor;
mod json_extractor;
mod regex_extractor;

pub use html_extractor::*;
pub use json_extractor::*;
pub use regex_extractor::*;
