//! Serializable plugin definitions
//!
//! A flow definition lists its plugins as JSON objects tagged by `type`.
//! Plugins reference each other by name and may be listed in any order;
//! [`PluginConfig::build`] orders them and rejects cycles.
//!
//! ```json
//! {
//!   "plugins": [
//!     {"type": "variable", "name": "username"},
//!     {"type": "json", "name": "access_token", "path": "data.token"},
//!     {"type": "bearer_auth", "token": "access_token"}
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plugin::{Part, Plugin, PluginId, Transform};
use crate::plugin_set::PluginSet;

const AUTHORIZATION: &str = "Authorization";

/// Definition of one plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginSpec {
    Regex {
        name: String,
        pattern: String,
        #[serde(default)]
        group: usize,
    },
    Html {
        name: String,
        tag: String,
        #[serde(default)]
        attributes: BTreeMap<String, String>,
        extract: String,
    },
    Json {
        name: String,
        path: String,
        /// Read the document from this plugin instead of the response
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    Variable {
        name: String,
    },
    Command {
        name: String,
        command: String,
    },
    Prompt {
        name: String,
    },
    Cookie {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    Header {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
    },
    BasicAuth {
        username: String,
        password: String,
    },
    BearerAuth {
        token: String,
    },
    Alter {
        name: String,
        source: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prepend: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        append: Option<String>,
    },
    Combine {
        /// Replaces the name derived from the parts
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        parts: Vec<PartSpec>,
    },
    Empty {
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartSpec {
    Literal(String),
    Plugin(String),
}

impl PluginSpec {
    /// Name other definitions use to reference this one
    pub fn key(&self) -> Option<&str> {
        match self {
            PluginSpec::Regex { name, .. }
            | PluginSpec::Html { name, .. }
            | PluginSpec::Json { name, .. }
            | PluginSpec::Variable { name }
            | PluginSpec::Command { name, .. }
            | PluginSpec::Prompt { name }
            | PluginSpec::Cookie { name, .. }
            | PluginSpec::Header { name, .. }
            | PluginSpec::Alter { name, .. }
            | PluginSpec::Empty { name } => Some(name.as_str()),
            PluginSpec::BasicAuth { .. } | PluginSpec::BearerAuth { .. } => Some(AUTHORIZATION),
            PluginSpec::Combine { name, .. } => name.as_deref(),
        }
    }

    /// Names of the definitions this one reads from
    pub fn references(&self) -> Vec<&str> {
        match self {
            PluginSpec::Json { from, .. }
            | PluginSpec::Cookie { from, .. }
            | PluginSpec::Header { from, .. } => from.as_deref().into_iter().collect(),
            PluginSpec::BearerAuth { token } => vec![token.as_str()],
            PluginSpec::Alter { source, .. } => vec![source.as_str()],
            PluginSpec::Combine { parts, .. } => parts
                .iter()
                .filter_map(|part| match part {
                    PartSpec::Plugin(name) => Some(name.as_str()),
                    PartSpec::Literal(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Build the plugin, looking referenced plugins up in `ids`
    fn to_plugin(&self, ids: &HashMap<String, PluginId>) -> Result<Plugin> {
        let id_of = |name: &str| {
            ids.get(name)
                .copied()
                .ok_or_else(|| Error::UnknownPlugin(name.to_string()))
        };

        let plugin = match self {
            PluginSpec::Regex {
                name,
                pattern,
                group,
            } => Plugin::regex(name.as_str(), pattern, *group)?,
            PluginSpec::Html {
                name,
                tag,
                attributes,
                extract,
            } => Plugin::html(name.as_str(), tag, attributes, extract.as_str())?,
            PluginSpec::Json { name, path, from } => match from {
                Some(source) => Plugin::json_from(id_of(source)?, name.as_str(), path)?,
                None => Plugin::json(name.as_str(), path)?,
            },
            PluginSpec::Variable { name } => Plugin::variable(name.as_str()),
            PluginSpec::Command { name, command } => Plugin::command(name.as_str(), command.as_str()),
            PluginSpec::Prompt { name } => Plugin::prompt(name.as_str()),
            PluginSpec::Cookie { name, value, from } => match (value, from) {
                (_, Some(source)) => Plugin::cookie_from(id_of(source)?, name.as_str()),
                (Some(value), None) => Plugin::cookie_with_value(name.as_str(), value.as_str()),
                (None, None) => Plugin::cookie(name.as_str()),
            },
            PluginSpec::Header { name, value, from } => match (value, from) {
                (_, Some(source)) => Plugin::header_from(id_of(source)?, name.as_str()),
                (Some(value), None) => Plugin::header_with_value(name.as_str(), value.as_str()),
                (None, None) => Plugin::header(name.as_str()),
            },
            PluginSpec::BasicAuth { username, password } => Plugin::basic_auth(username, password),
            PluginSpec::BearerAuth { token } => Plugin::bearer_auth(id_of(token)?),
            PluginSpec::Alter {
                name,
                source,
                prepend,
                append,
            } => {
                let source = id_of(source)?;
                match (prepend.clone(), append.clone()) {
                    (Some(prefix), None) => Plugin::prepend(name.as_str(), source, prefix),
                    (None, Some(suffix)) => Plugin::append(name.as_str(), source, suffix),
                    (Some(prefix), Some(suffix)) => Plugin::alter(
                        name.as_str(),
                        source,
                        Transform::custom(move |value| Some(format!("{}{}{}", prefix, value, suffix))),
                    ),
                    (None, None) => Plugin::alter(name.as_str(), source, Transform::Append(String::new())),
                }
            }
            PluginSpec::Combine { name, parts } => {
                let parts = parts
                    .iter()
                    .map(|part| match part {
                        PartSpec::Literal(literal) => Ok(Part::Literal(literal.clone())),
                        PartSpec::Plugin(name) => id_of(name).map(Part::Plugin),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let plugin = Plugin::combine(parts);
                match name {
                    Some(name) => plugin.with_name(name.as_str()),
                    None => plugin,
                }
            }
            PluginSpec::Empty { name } => Plugin::empty(name.as_str()),
        };

        Ok(plugin)
    }
}

/// The plugins of one flow definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub plugins: Vec<PluginSpec>,
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    InProgress,
    Done,
}

impl PluginConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(Error::Config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(Error::Config)
    }

    /// Build a [`PluginSet`], inserting every definition after the ones it
    /// references
    pub fn build(&self) -> Result<PluginSet> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, spec) in self.plugins.iter().enumerate() {
            if let Some(key) = spec.key() {
                if index.insert(key, i).is_some() {
                    return Err(Error::DuplicatePlugin(key.to_string()));
                }
            }
        }

        let mut set = PluginSet::new();
        let mut ids: HashMap<String, PluginId> = HashMap::new();
        let mut visits: HashMap<usize, Visit> = HashMap::new();

        for i in 0..self.plugins.len() {
            self.visit(i, &index, &mut visits, &mut ids, &mut set)?;
        }

        Ok(set)
    }

    fn visit(
        &self,
        i: usize,
        index: &HashMap<&str, usize>,
        visits: &mut HashMap<usize, Visit>,
        ids: &mut HashMap<String, PluginId>,
        set: &mut PluginSet,
    ) -> Result<()> {
        let spec = &self.plugins[i];
        match visits.get(&i) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => {
                let name = spec.key().unwrap_or("combine");
                return Err(Error::DependencyCycle(name.to_string()));
            }
            None => {}
        }

        visits.insert(i, Visit::InProgress);
        for reference in spec.references() {
            let target = *index
                .get(reference)
                .ok_or_else(|| Error::UnknownPlugin(reference.to_string()))?;
            self.visit(target, index, visits, ids, set)?;
        }

        let id = set.insert(spec.to_plugin(ids)?)?;
        if let Some(key) = spec.key() {
            ids.insert(key.to_string(), id);
        }
        visits.insert(i, Visit::Done);

        tracing::trace!(plugin = ?spec.key(), id = %id, "plugin defined");
        Ok(())
    }
}
