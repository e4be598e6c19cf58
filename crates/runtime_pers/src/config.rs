use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use net::{DEFAULT_TIMEOUT_MS, DEFAULT_USER_AGENT, FetchConfig};
use serde::Deserialize;

pub const DEFAULT_BASE_ORIGIN: &str = "https://www.example.com";
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8192;
pub const DEFAULT_PROVENANCE_META: &str = r#"<meta name="edge-personalized" content="true" />"#;
pub const DEFAULT_PROVENANCE_SCRIPT: &str =
    "<script>window.edgePersonalizationApplied = true;</script>";

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse(err) => Some(err),
        }
    }
}

/// Read-only settings shared by every request.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PersonalizerConfig {
    /// Origin relative fragment paths are fetched from.
    pub base_origin: String,
    /// Bytes read from the page per rewriter write.
    pub read_chunk_size: usize,
    pub fetch: FetchSettings,
    pub provenance: ProvenanceConfig,
}

impl Default for PersonalizerConfig {
    fn default() -> Self {
        PersonalizerConfig {
            base_origin: DEFAULT_BASE_ORIGIN.to_string(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            fetch: FetchSettings::default(),
            provenance: ProvenanceConfig::default(),
        }
    }
}

impl PersonalizerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: String,
    pub timeout_ms: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl From<&FetchSettings> for FetchConfig {
    fn from(settings: &FetchSettings) -> Self {
        FetchConfig {
            user_agent: settings.user_agent.clone(),
            timeout_ms: settings.timeout_ms,
        }
    }
}

/// Markup appended to `<head>` on every personalized response.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProvenanceConfig {
    pub meta: String,
    pub script: String,
}

impl Default for ProvenanceConfig {
    fn default() -> Self {
        ProvenanceConfig {
            meta: DEFAULT_PROVENANCE_META.to_string(),
            script: DEFAULT_PROVENANCE_SCRIPT.to_string(),
        }
    }
}
