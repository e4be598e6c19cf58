//! Serde shapes for the slice of the decision document that is read.
//!
//! Every level is decoded on its own from a borrowed `serde_json::Value`, so a
//! malformed proposition, item or experience only drops itself.

use serde::Deserialize;
use serde_json::{Map, Value};

pub(crate) const DECISIONS_HANDLE_TYPE: &str = "personalization:decisions";
pub(crate) const MANIFEST_FORMAT: &str = "application/json";

#[derive(Debug, Deserialize)]
pub(crate) struct DecisionDocument {
    #[serde(default)]
    pub handle: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HandleEntry {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub payload: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Proposition {
    #[serde(default)]
    pub items: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Item {
    #[serde(default)]
    pub data: Option<ItemData>,
    #[serde(default)]
    pub meta: Option<Map<String, Value>>,
}

impl Item {
    pub fn activity_name(&self) -> Option<String> {
        self.meta
            .as_ref()?
            .get("activity.name")?
            .as_str()
            .map(str::to_string)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemData {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub content: Option<ManifestEnvelope>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ManifestEnvelope {
    #[serde(rename = "manifestContent", default)]
    pub manifest_content: Option<ManifestContent>,
    #[serde(rename = "manifestPath", default)]
    pub manifest_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ManifestContent {
    #[serde(default)]
    pub experiences: Option<ExperienceTable>,
    #[serde(default)]
    pub data: Option<Vec<Value>>,
}

impl ManifestContent {
    /// `experiences.data` when present, else the top-level `data` table.
    pub fn rows(&self) -> &[Value] {
        if let Some(rows) = self.experiences.as_ref().and_then(|t| t.data.as_deref()) {
            return rows;
        }
        self.data.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExperienceTable {
    #[serde(default)]
    pub data: Option<Vec<Value>>,
}

/// Decodes one level of the document without cloning it.
pub(crate) fn decode<'a, T: Deserialize<'a>>(value: &'a Value) -> Result<T, serde_json::Error> {
    T::deserialize(value)
}
