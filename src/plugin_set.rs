//! The plugins of one flow and their resolution
//!
//! A plugin may only reference plugins inserted before it, so the references
//! inside a set always form a DAG and insertion order is a valid resolution
//! order. Resolution is synchronous and single-threaded; give every flow its
//! own set.

use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::plugin::{Artifact, Plugin, PluginId};
use crate::response::HttpResponse;

#[derive(Debug, Clone, Default)]
pub struct PluginSet {
    plugins: Vec<Plugin>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin. Every plugin it references must already be in the set.
    pub fn insert(&mut self, plugin: Plugin) -> Result<PluginId> {
        let next = self.plugins.len();
        if plugin.strategy().references().iter().any(|id| id.0 >= next) {
            return Err(Error::ForwardReference {
                plugin: plugin.name().to_string(),
            });
        }

        self.plugins.push(plugin);
        Ok(PluginId(next))
    }

    pub fn get(&self, id: PluginId) -> Option<&Plugin> {
        self.plugins.get(id.0)
    }

    fn plugin(&self, id: PluginId) -> Result<&Plugin> {
        self.get(id).ok_or_else(|| Error::UnknownPlugin(id.to_string()))
    }

    /// Current value of a plugin, `None` for unknown ids
    pub fn value(&self, id: PluginId) -> Option<&str> {
        self.get(id).and_then(Plugin::value)
    }

    /// Overwrites a plugin's value, e.g. to inject fuzzing input into an
    /// Empty plugin
    pub fn set_value(&mut self, id: PluginId, value: Option<String>) -> Result<()> {
        let plugin = self
            .plugins
            .get_mut(id.0)
            .ok_or_else(|| Error::UnknownPlugin(id.to_string()))?;
        plugin.set_value(value);
        Ok(())
    }

    /// Most recently inserted plugin with this name
    pub fn find(&self, name: &str) -> Option<PluginId> {
        self.plugins
            .iter()
            .rposition(|p| p.name() == name)
            .map(PluginId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PluginId, &Plugin)> {
        self.plugins
            .iter()
            .enumerate()
            .map(|(i, p)| (PluginId(i), p))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Name and value of every cookie or header plugin that has a value
    pub fn artifact_values(&self, artifact: Artifact) -> Vec<(&str, &str)> {
        self.plugins
            .iter()
            .filter(|p| p.artifact() == Some(artifact))
            .filter_map(|p| p.value().map(|v| (p.name(), v)))
            .collect()
    }

    /// Resolve a plugin before the request is sent
    ///
    /// The value is always overwritten with the result. Plugins that need a
    /// response are not evaluated here; they keep the value extracted from
    /// the last response.
    pub fn resolve_pre_request(
        &mut self,
        id: PluginId,
        user_data: &HashMap<String, String>,
    ) -> Result<Option<String>> {
        let plugin = self.plugin(id)?;
        if plugin.needs_response() {
            return Ok(plugin.value().map(String::from));
        }

        let value = plugin.evaluate_pre_request(self, user_data)?;
        tracing::trace!(plugin = %plugin.name(), value = ?value, "resolved input");

        self.plugins[id.0].set_value(value.clone());
        Ok(value)
    }

    /// Extract a plugin's value from a received response
    ///
    /// A found value replaces the stored one. When nothing is found a warning
    /// is logged and `Ok(None)` is returned; Json plugins drop their stored
    /// value, the others keep it.
    pub fn resolve_post_response(
        &mut self,
        id: PluginId,
        response: &HttpResponse,
    ) -> Result<Option<String>> {
        let plugin = self.plugin(id)?;
        if !plugin.needs_response() {
            return Err(Error::WrongPhase {
                plugin: plugin.name().to_string(),
                phase: "from a response",
            });
        }

        match plugin.evaluate_response(response)? {
            Some(value) => {
                tracing::debug!(plugin = %plugin.name(), value = %value, "found output");
                self.plugins[id.0].set_value(Some(value.clone()));
                Ok(Some(value))
            }
            None => {
                tracing::warn!(plugin = %plugin.name(), "couldn't extract output");
                if !plugin.strategy().keeps_value_on_miss() {
                    self.plugins[id.0].set_value(None);
                }
                Ok(None)
            }
        }
    }

    /// Resolve the inputs of a request, dependencies first
    pub fn resolve_inputs(
        &mut self,
        ids: &[PluginId],
        user_data: &HashMap<String, String>,
    ) -> Result<()> {
        for id in self.closure(ids)? {
            self.resolve_pre_request(id, user_data)?;
        }
        Ok(())
    }

    /// Extract the outputs of a response
    ///
    /// Response-driven plugins among `ids` and their dependencies are
    /// extracted, then every plugin reading other plugins is recomputed so
    /// it sees the new values. Context-driven dependencies keep their values.
    ///
    /// A failing plugin does not stop the others: every plugin is still
    /// resolved and the first error is returned afterwards.
    pub fn resolve_outputs(&mut self, ids: &[PluginId], response: &HttpResponse) -> Result<()> {
        let no_user_data = HashMap::new();
        let mut first_error = None;

        for id in self.closure(ids)? {
            let plugin = self.plugin(id)?;
            let result = if plugin.needs_response() {
                self.resolve_post_response(id, response)
            } else if !plugin.strategy().references().is_empty() {
                self.resolve_pre_request(id, &no_user_data)
            } else {
                continue;
            };

            if let Err(err) = result {
                tracing::warn!(plugin = %id, error = %err, "output failed");
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// `ids` plus everything they reference, in resolution order
    fn closure(&self, ids: &[PluginId]) -> Result<BTreeSet<PluginId>> {
        let mut seen = BTreeSet::new();
        let mut stack = ids.to_vec();

        while let Some(id) = stack.pop() {
            let plugin = self.plugin(id)?;
            if seen.insert(id) {
                stack.extend(plugin.strategy().references());
            }
        }

        Ok(seen)
    }
}
