use std::collections::HashMap;
use std::fmt;

/// Mutation kind carried by decisions and resolved commands.
///
/// `Fragment` is never produced by [`Action::from_raw`]; the command builder
/// assigns it to commands whose content came from a fetched fragment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Remove,
    Replace,
    UpdateAttribute,
    Fragment,
    Other(String),
}

impl Action {
    /// Lower-cases `raw` and strips the first `content`, `fragment` and
    /// `tosection` occurrence, in that order.
    pub fn from_raw(raw: &str) -> Action {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replacen("content", "", 1)
            .replacen("fragment", "", 1)
            .replacen("tosection", "", 1);
        match normalized.as_str() {
            "remove" => Action::Remove,
            "replace" => Action::Replace,
            "updateattribute" => Action::UpdateAttribute,
            _ => Action::Other(normalized),
        }
    }

    /// Whether a non-fragment experience with this action becomes a command.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Action::Remove | Action::Replace | Action::UpdateAttribute
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Remove => f.write_str("remove"),
            Action::Replace => f.write_str("replace"),
            Action::UpdateAttribute => f.write_str("updateattribute"),
            Action::Fragment => f.write_str("fragment"),
            Action::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectorKind {
    /// Path-like target (`/...` or `http...`), content comes from a fetch.
    Fragment,
    Other,
}

/// Content swap whose markup lives at another path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fragment {
    /// Normalized path of the anchor being replaced.
    pub selector: String,
    /// Normalized path the replacement markup is fetched from.
    pub source_path: String,
    pub action: Action,
    pub manifest_id: Option<String>,
    pub activity_id: Option<String>,
}

/// Mutation against a DSL selector, not yet translated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub selector: String,
    pub content: String,
    pub selector_kind: SelectorKind,
    pub manifest_id: Option<String>,
    pub activity_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessedData {
    pub fragments: Vec<Fragment>,
    pub commands: Vec<Command>,
}

impl ProcessedData {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.commands.is_empty()
    }
}

/// A command ready for the rewriter: structural selector and final content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub action: Action,
    pub css_selector: String,
    pub content: String,
    pub attribute_name: Option<String>,
    /// Anchor path of a fragment command, also named by its comment marker.
    pub fragment_path: Option<String>,
}

/// Fetched fragment markup keyed by the fragment's anchor path.
pub type FragmentContent = HashMap<String, String>;
