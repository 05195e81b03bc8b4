use provenant_graph::{GraphDesc, Parameters};
use serde::{Deserialize, Serialize};

/// Partial update of a stored graph descriptor.
///
/// `None` fields are left untouched; `attrs` entries are merged into the
/// existing attributes, and a `null` value removes the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attrs: Parameters,
}

impl DescPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.attrs.is_empty()
    }

    /// Apply the patch and stamp the descriptor's `modified` time.
    pub fn apply(&self, desc: &mut GraphDesc) {
        if let Some(name) = &self.name {
            desc.name = name.clone();
        }
        if let Some(description) = &self.description {
            desc.description = description.clone();
        }
        for (key, value) in &self.attrs {
            if value.is_null() {
                desc.attrs.remove(key);
            } else {
                desc.attrs.insert(key.clone(), value.clone());
            }
        }
        desc.touch();
    }
}
