//! Decision normalization: the experimentation service's loosely shaped JSON
//! into ordered `Fragment` and `Command` records.
//!
//! The walk is `handle[type=personalization:decisions].payload` ->
//! propositions -> items (JSON manifests only) -> experiences -> variants.
//! Anything that does not have the expected shape is skipped, never fatal.

mod path;
mod shape;

use core_types::{Action, Command, Fragment, ProcessedData, SelectorKind};
use serde_json::{Map, Value};
use std::fmt;

use crate::shape::{
    DECISIONS_HANDLE_TYPE, DecisionDocument, HandleEntry, Item, MANIFEST_FORMAT, Proposition,
    decode,
};

pub use crate::path::normalize_path;

const LOG_TARGET: &str = "decisions";

/// Experience keys that are never variants (compared case-insensitively).
const RESERVED_KEYS: [&str; 5] = [
    "action",
    "selector",
    "pagefilter",
    "page filter",
    "page filter optional",
];

#[derive(Debug)]
pub enum DecisionError {
    Json(serde_json::Error),
}

impl fmt::Display for DecisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionError::Json(err) => write!(f, "decision document is not JSON: {err}"),
        }
    }
}

impl std::error::Error for DecisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecisionError::Json(err) => Some(err),
        }
    }
}

/// Parses `raw` as JSON and normalizes it. Only non-JSON text is an error.
pub fn normalize_str(raw: &str) -> Result<ProcessedData, DecisionError> {
    let value: Value = serde_json::from_str(raw).map_err(DecisionError::Json)?;
    Ok(normalize(&value))
}

/// Classifies a raw selector: path-like targets are fragments.
pub fn selector_kind(selector: &str) -> SelectorKind {
    let sel = selector.trim().to_ascii_lowercase();
    if sel.starts_with('/') || sel.starts_with("http") {
        SelectorKind::Fragment
    } else {
        SelectorKind::Other
    }
}

/// Flattens a decision document into fragments and commands, preserving
/// proposition, item, experience and variant order.
pub fn normalize(raw: &Value) -> ProcessedData {
    let mut out = ProcessedData::default();

    let propositions = find_propositions(raw);
    if propositions.is_empty() {
        log::info!(target: LOG_TARGET, "no propositions in decision response");
        return out;
    }
    log::info!(target: LOG_TARGET, "found {} propositions", propositions.len());

    for (index, raw_prop) in propositions.iter().enumerate() {
        let proposition: Proposition = match decode(raw_prop) {
            Ok(p) => p,
            Err(err) => {
                log::debug!(target: LOG_TARGET, "skipping proposition {index}: {err}");
                continue;
            }
        };
        for raw_item in proposition.items.as_deref().unwrap_or(&[]) {
            match decode::<Item>(raw_item) {
                Ok(item) => collect_item(&item, &mut out),
                Err(err) => {
                    log::debug!(target: LOG_TARGET, "skipping item in proposition {index}: {err}")
                }
            }
        }
    }

    log::debug!(
        target: LOG_TARGET,
        "normalized {} fragments, {} commands",
        out.fragments.len(),
        out.commands.len()
    );
    out
}

fn find_propositions(raw: &Value) -> Vec<Value> {
    let Ok(doc) = decode::<DecisionDocument>(raw) else {
        return Vec::new();
    };
    doc.handle
        .iter()
        .filter_map(|handle| decode::<HandleEntry>(handle).ok())
        .find(|entry| entry.kind.as_deref() == Some(DECISIONS_HANDLE_TYPE))
        .and_then(|entry| entry.payload)
        .unwrap_or_default()
}

fn collect_item(item: &Item, out: &mut ProcessedData) {
    let Some(data) = item.data.as_ref() else {
        return;
    };
    if data.format.as_deref() != Some(MANIFEST_FORMAT) {
        return;
    }
    let Some(envelope) = data.content.as_ref() else {
        return;
    };
    let Some(manifest) = envelope.manifest_content.as_ref() else {
        return;
    };

    let activity_id = item.activity_name();
    for row in manifest.rows() {
        let Some(experience) = row.as_object() else {
            log::debug!(target: LOG_TARGET, "skipping non-object experience row");
            continue;
        };
        collect_experience(
            experience,
            envelope.manifest_path.as_deref(),
            activity_id.as_deref(),
            out,
        );
    }
}

fn collect_experience(
    experience: &Map<String, Value>,
    manifest_id: Option<&str>,
    activity_id: Option<&str>,
    out: &mut ProcessedData,
) {
    let (Some(raw_action), Some(selector)) = (
        experience.get("action").and_then(Value::as_str),
        experience.get("selector").and_then(Value::as_str),
    ) else {
        log::debug!(target: LOG_TARGET, "experience without action/selector skipped");
        return;
    };

    let action = Action::from_raw(raw_action);
    let kind = selector_kind(selector);

    for (key, value) in experience {
        if is_reserved_key(key) {
            continue;
        }
        let Some(value) = applicable_variant(value) else {
            continue;
        };

        match kind {
            SelectorKind::Fragment => {
                let anchor = selector.split(" #_").next().unwrap_or(selector);
                out.fragments.push(Fragment {
                    selector: normalize_path(anchor),
                    source_path: normalize_path(value),
                    action: action.clone(),
                    manifest_id: manifest_id.map(str::to_string),
                    activity_id: activity_id.map(str::to_string),
                });
            }
            SelectorKind::Other if action.is_command() => {
                out.commands.push(Command {
                    action: action.clone(),
                    selector: selector.to_string(),
                    content: value.to_string(),
                    selector_kind: kind,
                    manifest_id: manifest_id.map(str::to_string),
                    activity_id: activity_id.map(str::to_string),
                });
            }
            SelectorKind::Other => {
                log::debug!(
                    target: LOG_TARGET,
                    "variant {key:?} dropped: action {action} is not a command"
                );
            }
        }
    }
}

fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.iter().any(|r| key.eq_ignore_ascii_case(r))
}

/// A variant applies when it is a non-empty string other than `"false"`.
fn applicable_variant(value: &Value) -> Option<&str> {
    let s = value.as_str()?;
    if s.is_empty() || s.eq_ignore_ascii_case("false") {
        return None;
    }
    Some(s)
}
