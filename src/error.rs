//! Error types
//!
//! "Not found" is never an error in this crate: extraction that finds nothing
//! yields `Ok(None)` and a warning. The variants here cover broken input,
//! broken definitions and failing external processes.

use thiserror::Error;

/// Errors raised while building or resolving plugins
#[derive(Debug, Error)]
pub enum Error {
    /// The text handed to a Json plugin is not a JSON document
    #[error("plugin '{plugin}': input is not valid JSON: {source}")]
    MalformedJson {
        plugin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("plugin '{plugin}': invalid regular expression: {source}")]
    InvalidRegex {
        plugin: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid JSON path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The command could not be started at all
    #[error("plugin '{plugin}': failed to run `{command}`: {source}")]
    CommandSpawn {
        plugin: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("plugin '{plugin}': `{command}` exited with {status}")]
    CommandFailed {
        plugin: String,
        command: String,
        status: std::process::ExitStatus,
    },

    #[error("plugin '{plugin}': no input available: {reason}")]
    PromptInput { plugin: String, reason: String },

    #[error("invalid plugin configuration: {0}")]
    Config(#[source] serde_json::Error),

    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    #[error("plugin '{0}' is defined more than once")]
    DuplicatePlugin(String),

    #[error("dependency cycle through plugin '{0}'")]
    DependencyCycle(String),

    /// A plugin referenced an id that was not inserted before it
    #[error("plugin '{plugin}' references a plugin that is not in the set yet")]
    ForwardReference { plugin: String },

    #[error("plugin '{plugin}' cannot be resolved {phase}")]
    WrongPhase { plugin: String, phase: &'static str },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
