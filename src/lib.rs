//! Value extraction and composition for authentication flows
//!
//! Plugins turn an HTTP exchange and a set of user credentials into the
//! string values of the next request:
//! - response-driven: regular expressions, HTML attributes, JSON fields,
//!   cookies and headers
//! - context-driven: user data variables, shell commands, console prompts
//! - composition: altering and combining other plugins' values
//!
//! The flow layer decides what to send and when; it resolves inputs with
//! [`PluginSet::resolve_inputs`] before a request and outputs with
//! [`PluginSet::resolve_outputs`] after the response.

pub mod config;
pub mod context;
pub mod error;
pub mod extractors;
pub mod flags;
pub mod json_path;
pub mod plugin;
pub mod plugin_set;
pub mod response;
pub mod tag_matcher;

pub use config::{PartSpec, PluginConfig, PluginSpec};
pub use error::{Error, Result};
pub use flags::Flags;
pub use json_path::{JsonPath, Step};
pub use plugin::{Artifact, CustomFn, JsonSource, Part, Plugin, PluginId, Strategy, Transform};
pub use plugin_set::PluginSet;
pub use response::HttpResponse;
pub use tag_matcher::TagMatcher;
