//! Plugins: named values resolved before a request or after a response
//!
//! A [`Plugin`] pairs a name and its current value with a [`Strategy`] that
//! says how the value is produced. Plugins live in a
//! [`PluginSet`](crate::PluginSet), which resolves them and lets composition
//! plugins read the values of the plugins they reference.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use base64::Engine;
use regex::Regex;

use crate::context::{lookup_variable, prompt_line, run_command};
use crate::error::{Error, Result};
use crate::extractors::{extract_html, extract_json, extract_regex};
use crate::flags::Flags;
use crate::json_path::JsonPath;
use crate::plugin_set::PluginSet;
use crate::response::HttpResponse;
use crate::tag_matcher::TagMatcher;

/// Handle to a plugin inside a [`PluginSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginId(pub(crate) usize);

impl PluginId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The part of the HTTP request a plugin's value is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Cookie,
    Header,
}

/// Caller-supplied strategy, evaluated against the set's current values
#[derive(Clone)]
pub struct CustomFn(Arc<dyn Fn(&PluginSet) -> Option<String> + Send + Sync>);

impl CustomFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&PluginSet) -> Option<String> + Send + Sync + 'static,
    {
        CustomFn(Arc::new(f))
    }

    pub fn call(&self, set: &PluginSet) -> Option<String> {
        (self.0)(set)
    }
}

impl fmt::Debug for CustomFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomFn(..)")
    }
}

/// How an Alter plugin rewrites its source's value
#[derive(Clone)]
pub enum Transform {
    Prepend(String),
    Append(String),
    Custom(Arc<dyn Fn(&str) -> Option<String> + Send + Sync>),
}

impl Transform {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Transform::Custom(Arc::new(f))
    }

    pub fn apply(&self, value: &str) -> Option<String> {
        match self {
            Transform::Prepend(prefix) => Some(format!("{}{}", prefix, value)),
            Transform::Append(suffix) => Some(format!("{}{}", value, suffix)),
            Transform::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Prepend(prefix) => f.debug_tuple("Prepend").field(prefix).finish(),
            Transform::Append(suffix) => f.debug_tuple("Append").field(suffix).finish(),
            Transform::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// One item of a Combine plugin
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Part {
    Literal(String),
    Plugin(PluginId),
}

impl From<&str> for Part {
    fn from(literal: &str) -> Self {
        Part::Literal(literal.to_string())
    }
}

impl From<String> for Part {
    fn from(literal: String) -> Self {
        Part::Literal(literal)
    }
}

impl From<PluginId> for Part {
    fn from(id: PluginId) -> Self {
        Part::Plugin(id)
    }
}

/// Where a Json plugin reads its document from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonSource {
    Response,
    Plugin(PluginId),
}

/// How a plugin produces its value
#[derive(Debug, Clone)]
pub enum Strategy {
    Regex { regex: Regex, group: usize },
    Html { matcher: TagMatcher, extract: String },
    Json { path: JsonPath, source: JsonSource },
    Variable,
    Command { command: String },
    Prompt,
    CookieFromResponse,
    HeaderFromResponse,
    /// Returns the plugin's own stored value
    Stored,
    /// Latest value of another plugin
    FromPlugin(PluginId),
    /// `"Bearer " + token` while the token has a value
    Bearer(PluginId),
    Alter { source: PluginId, transform: Transform },
    Combine(Vec<Part>),
    Custom(CustomFn),
}

impl Strategy {
    pub fn kind(&self) -> &'static str {
        match self {
            Strategy::Regex { .. } => "Regex",
            Strategy::Html { .. } => "Html",
            Strategy::Json { .. } => "Json",
            Strategy::Variable => "Variable",
            Strategy::Command { .. } => "Command",
            Strategy::Prompt => "Prompt",
            Strategy::CookieFromResponse => "Cookie",
            Strategy::HeaderFromResponse => "Header",
            Strategy::Stored => "Stored",
            Strategy::FromPlugin(_) => "FromPlugin",
            Strategy::Bearer(_) => "Bearer",
            Strategy::Alter { .. } => "Alter",
            Strategy::Combine(_) => "Combine",
            Strategy::Custom(_) => "Custom",
        }
    }

    /// Whether a response that lacks the value leaves the previous one in
    /// place. Json extraction clears it instead, so a token the server
    /// stopped returning is not sent again.
    pub fn keeps_value_on_miss(&self) -> bool {
        !matches!(self, Strategy::Json { .. })
    }

    /// Plugins whose values this strategy reads, in order
    pub fn references(&self) -> Vec<PluginId> {
        match self {
            Strategy::Json {
                source: JsonSource::Plugin(id),
                ..
            } => vec![*id],
            Strategy::FromPlugin(id) | Strategy::Bearer(id) => vec![*id],
            Strategy::Alter { source, .. } => vec![*source],
            Strategy::Combine(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    Part::Plugin(id) => Some(*id),
                    Part::Literal(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A named value and the strategy that produces it
#[derive(Debug, Clone)]
pub struct Plugin {
    name: String,
    value: Option<String>,
    flags: Flags,
    artifact: Option<Artifact>,
    strategy: Strategy,
}

impl Plugin {
    fn new(name: impl Into<String>, flags: Flags, strategy: Strategy) -> Self {
        Self {
            name: name.into(),
            value: None,
            flags,
            artifact: None,
            strategy,
        }
    }

    fn artifact_of(mut self, artifact: Artifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    /// First match of `pattern` in the response body, parenthesized group
    /// `group` counting from 0
    pub fn regex(name: impl Into<String>, pattern: &str, group: usize) -> Result<Self> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidRegex {
            plugin: name.clone(),
            source,
        })?;
        Ok(Self::new(name, Flags::NEEDS_RESPONSE, Strategy::Regex { regex, group }))
    }

    /// Attribute `extract` of the last `tag` element whose attributes match
    /// the given patterns
    pub fn html<I, K, V>(
        name: impl Into<String>,
        tag: &str,
        attributes: I,
        extract: impl Into<String>,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let name = name.into();
        let matcher = TagMatcher::new(tag, attributes).map_err(|source| Error::InvalidRegex {
            plugin: name.clone(),
            source,
        })?;
        Ok(Self::new(
            name,
            Flags::NEEDS_RESPONSE,
            Strategy::Html {
                matcher,
                extract: extract.into(),
            },
        ))
    }

    /// Field at `path` in the JSON response body
    pub fn json(name: impl Into<String>, path: &str) -> Result<Self> {
        Ok(Self::new(
            name,
            Flags::NEEDS_RESPONSE,
            Strategy::Json {
                path: JsonPath::parse(path)?,
                source: JsonSource::Response,
            },
        ))
    }

    /// Field at `path` in the JSON held by another plugin
    pub fn json_from(source: PluginId, name: impl Into<String>, path: &str) -> Result<Self> {
        Ok(Self::new(
            name,
            Flags::DEPENDS_ON_OTHER_PLUGINS,
            Strategy::Json {
                path: JsonPath::parse(path)?,
                source: JsonSource::Plugin(source),
            },
        ))
    }

    /// Value of the user data entry with the same name
    pub fn variable(name: impl Into<String>) -> Self {
        Self::new(name, Flags::NEEDS_USERDATA, Strategy::Variable)
    }

    /// Output of a shell command line
    pub fn command(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(
            name,
            Flags::empty(),
            Strategy::Command {
                command: command.into(),
            },
        )
    }

    /// Line typed on the console, asked for with the name as label
    pub fn prompt(name: impl Into<String>) -> Self {
        Self::new(name, Flags::empty(), Strategy::Prompt)
    }

    /// Cookie with this name from the response's cookie jar
    pub fn cookie(name: impl Into<String>) -> Self {
        Self::new(name, Flags::NEEDS_RESPONSE, Strategy::CookieFromResponse)
            .artifact_of(Artifact::Cookie)
    }

    /// Cookie with a value fixed by the flow definition
    pub fn cookie_with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Flags::empty(), Strategy::Stored)
            .artifact_of(Artifact::Cookie)
            .with_initial_value(value)
    }

    /// Cookie computed by a caller-supplied function
    pub fn cookie_with(name: impl Into<String>, f: CustomFn) -> Self {
        Self::new(name, Flags::empty(), Strategy::Custom(f)).artifact_of(Artifact::Cookie)
    }

    /// Cookie carrying the latest value of another plugin
    pub fn cookie_from(source: PluginId, name: impl Into<String>) -> Self {
        Self::new(name, Flags::empty(), Strategy::FromPlugin(source))
            .artifact_of(Artifact::Cookie)
    }

    /// Header with this name from the response
    pub fn header(name: impl Into<String>) -> Self {
        Self::new(name, Flags::NEEDS_RESPONSE, Strategy::HeaderFromResponse)
            .artifact_of(Artifact::Header)
    }

    /// Header with a value fixed by the flow definition
    pub fn header_with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Flags::empty(), Strategy::Stored)
            .artifact_of(Artifact::Header)
            .with_initial_value(value)
    }

    /// Header computed by a caller-supplied function
    pub fn header_with(name: impl Into<String>, f: CustomFn) -> Self {
        Self::new(name, Flags::empty(), Strategy::Custom(f)).artifact_of(Artifact::Header)
    }

    /// Header carrying the latest value of another plugin
    pub fn header_from(source: PluginId, name: impl Into<String>) -> Self {
        Self::new(name, Flags::empty(), Strategy::FromPlugin(source))
            .artifact_of(Artifact::Header)
    }

    /// `Authorization: Basic <base64(username:password)>`
    pub fn basic_auth(username: &str, password: &str) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", username, password));
        Self::header_with_value("Authorization", format!("Basic {}", encoded))
    }

    /// `Authorization: Bearer <token>`, absent while the token is absent
    pub fn bearer_auth(token: PluginId) -> Self {
        Self::new("Authorization", Flags::empty(), Strategy::Bearer(token))
            .artifact_of(Artifact::Header)
    }

    /// Value of `source` rewritten by `transform`
    pub fn alter(name: impl Into<String>, source: PluginId, transform: Transform) -> Self {
        Self::new(
            name,
            Flags::DEPENDS_ON_OTHER_PLUGINS,
            Strategy::Alter { source, transform },
        )
    }

    pub fn prepend(name: impl Into<String>, source: PluginId, prefix: impl Into<String>) -> Self {
        Self::alter(name, source, Transform::Prepend(prefix.into()))
    }

    pub fn append(name: impl Into<String>, source: PluginId, suffix: impl Into<String>) -> Self {
        Self::alter(name, source, Transform::Append(suffix.into()))
    }

    /// Concatenation of literals and plugin values
    ///
    /// The name is built from the parts themselves, so two Combine plugins
    /// share a name only when they combine the same sequence.
    pub fn combine<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        let parts: Vec<Part> = parts.into_iter().map(Into::into).collect();
        let key: Vec<String> = parts
            .iter()
            .map(|part| match part {
                Part::Literal(literal) => format!("{:?}", literal),
                Part::Plugin(id) => id.to_string(),
            })
            .collect();
        Self::new(
            format!("Combine({})", key.join(",")),
            Flags::DEPENDS_ON_OTHER_PLUGINS,
            Strategy::Combine(parts),
        )
    }

    /// Placeholder whose value is set directly, e.g. for fuzzing
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Flags::empty(), Strategy::Stored)
    }

    /// Seeds the value held before the first resolution
    pub fn with_initial_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn artifact(&self) -> Option<Artifact> {
        self.artifact
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn needs_userdata(&self) -> bool {
        self.flags.contains(Flags::NEEDS_USERDATA)
    }

    pub fn needs_response(&self) -> bool {
        self.flags.contains(Flags::NEEDS_RESPONSE)
    }

    pub fn depends_on_other_plugins(&self) -> bool {
        self.flags.contains(Flags::DEPENDS_ON_OTHER_PLUGINS)
    }

    /// Plugins that must be resolved before this one; empty unless
    /// DEPENDS_ON_OTHER_PLUGINS is set
    pub fn dependencies(&self) -> Vec<PluginId> {
        if self.depends_on_other_plugins() {
            self.strategy.references()
        } else {
            Vec::new()
        }
    }

    pub(crate) fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    /// Evaluate a strategy that does not need a response
    pub(crate) fn evaluate_pre_request(
        &self,
        set: &PluginSet,
        user_data: &HashMap<String, String>,
    ) -> Result<Option<String>> {
        let value = match &self.strategy {
            Strategy::Variable => {
                let value = lookup_variable(user_data, &self.name);
                if value.is_none() {
                    tracing::warn!(plugin = %self.name, "variable not found in user data");
                }
                value
            }
            Strategy::Command { command } => Some(run_command(&self.name, command)?),
            Strategy::Prompt => {
                let stdin = io::stdin();
                let mut reader = stdin.lock();
                let mut writer = io::stdout();
                Some(prompt_line(&self.name, &mut reader, &mut writer)?)
            }
            Strategy::Json {
                path,
                source: JsonSource::Plugin(source),
            } => match set.value(*source) {
                Some(text) => extract_json(text, path).map_err(|err| Error::MalformedJson {
                    plugin: self.name.clone(),
                    source: err,
                })?,
                None => {
                    tracing::warn!(plugin = %self.name, "source plugin has no value");
                    None
                }
            },
            Strategy::FromPlugin(source) => set.value(*source).map(String::from),
            Strategy::Bearer(token) => set.value(*token).map(|t| format!("Bearer {}", t)),
            Strategy::Alter { source, transform } => set.value(*source).and_then(|v| transform.apply(v)),
            Strategy::Combine(parts) => {
                let mut combined = String::new();
                for part in parts {
                    match part {
                        Part::Literal(literal) => combined.push_str(literal),
                        Part::Plugin(id) => combined.push_str(set.value(*id).unwrap_or("")),
                    }
                }
                Some(combined)
            }
            Strategy::Custom(f) => f.call(set),
            Strategy::Stored
            | Strategy::Regex { .. }
            | Strategy::Html { .. }
            | Strategy::Json {
                source: JsonSource::Response,
                ..
            }
            | Strategy::CookieFromResponse
            | Strategy::HeaderFromResponse => self.value.clone(),
        };

        Ok(value)
    }

    /// Evaluate a response-driven strategy
    pub(crate) fn evaluate_response(&self, response: &HttpResponse) -> Result<Option<String>> {
        let value = match &self.strategy {
            Strategy::Regex { regex, group } => extract_regex(response.text(), regex, *group),
            Strategy::Html { matcher, extract } => extract_html(response.text(), matcher, extract),
            Strategy::Json {
                path,
                source: JsonSource::Response,
            } => extract_json(response.text(), path).map_err(|source| Error::MalformedJson {
                plugin: self.name.clone(),
                source,
            })?,
            Strategy::CookieFromResponse => response.cookie(&self.name).map(String::from),
            Strategy::HeaderFromResponse => response.header(&self.name),
            _ => {
                return Err(Error::WrongPhase {
                    plugin: self.name.clone(),
                    phase: "from a response",
                })
            }
        };

        Ok(value)
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artifact.is_some() {
            return write!(f, "{{{}: {}}}", self.name, self.value().unwrap_or("null"));
        }

        match &self.strategy {
            Strategy::Regex { regex, group } => write!(f, "Regex:{}:{}", regex.as_str(), group),
            Strategy::Html { matcher, extract } => write!(f, "Html:{}:{}", matcher.tag(), extract),
            Strategy::Json { path, .. } => write!(f, "Json:{}", path),
            other => write!(f, "{}:{}", other.kind(), self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_per_constructor() {
        assert!(Plugin::regex("r", "x", 0).unwrap().needs_response());
        assert!(Plugin::json("j", "a.b").unwrap().needs_response());
        assert!(Plugin::variable("username").needs_userdata());
        assert!(Plugin::command("c", "true").flags().is_empty());
        assert!(Plugin::prompt("p").flags().is_empty());
        assert!(Plugin::cookie("session").needs_response());
        assert!(Plugin::cookie_with_value("session", "x").flags().is_empty());
        assert!(Plugin::header_from(PluginId(0), "X-Token").flags().is_empty());
        assert!(Plugin::prepend("p", PluginId(0), "X-").depends_on_other_plugins());
        assert!(Plugin::json_from(PluginId(0), "j", "a").unwrap().depends_on_other_plugins());
        assert!(Plugin::empty("fuzz").flags().is_empty());
    }

    #[test]
    fn test_basic_auth_value() {
        let header = Plugin::basic_auth("user", "pass");
        assert_eq!(header.name(), "Authorization");
        assert_eq!(header.value(), Some("Basic dXNlcjpwYXNz"));
        assert_eq!(header.artifact(), Some(Artifact::Header));
    }

    #[test]
    fn test_combine_names_are_structural() {
        let a = Plugin::combine([Part::from("ab"), Part::from("c")]);
        let b = Plugin::combine([Part::from("a"), Part::from("bc")]);
        let c = Plugin::combine([Part::from("Bearer "), Part::from(PluginId(3))]);
        let d = Plugin::combine([Part::from("Bearer "), Part::from(PluginId(3))]);

        assert_ne!(a.name(), b.name());
        assert_eq!(c.name(), d.name());
        assert_eq!(c.name(), r#"Combine("Bearer ",#3)"#);
    }

    #[test]
    fn test_dependencies_follow_flag() {
        let combine = Plugin::combine([Part::from(PluginId(1)), Part::from("-"), Part::from(PluginId(2))]);
        assert_eq!(combine.dependencies(), vec![PluginId(1), PluginId(2)]);

        let header = Plugin::header_from(PluginId(1), "X-Token");
        assert!(header.dependencies().is_empty());
        assert_eq!(header.strategy().references(), vec![PluginId(1)]);
    }

    #[test]
    fn test_transforms() {
        assert_eq!(Transform::Prepend("X-".into()).apply("token"), Some("X-token".to_string()));
        assert_eq!(Transform::Append("!".into()).apply("token"), Some("token!".to_string()));
        let upper = Transform::custom(|v| Some(v.to_uppercase()));
        assert_eq!(upper.apply("token"), Some("TOKEN".to_string()));
    }

    #[test]
    fn test_invalid_definitions() {
        assert!(matches!(Plugin::regex("r", "(", 0), Err(Error::InvalidRegex { .. })));
        assert!(matches!(
            Plugin::html("h", "input", [("name", "[")], "value"),
            Err(Error::InvalidRegex { .. })
        ));
        assert!(matches!(Plugin::json("j", "a..b"), Err(Error::InvalidPath { .. })));
    }

    #[test]
    fn test_display() {
        let cookie = Plugin::cookie_with_value("session", "abc");
        assert_eq!(cookie.to_string(), "{session: abc}");
        assert_eq!(Plugin::cookie("session").to_string(), "{session: null}");
        assert_eq!(Plugin::regex("r", "id=(\\d+)", 0).unwrap().to_string(), "Regex:id=(\\d+):0");
        assert_eq!(Plugin::json("j", "a[0]").unwrap().to_string(), "Json:a[0]");
        assert_eq!(Plugin::variable("username").to_string(), "Variable:username");
    }
}
