//! Edge personalization of streamed HTML pages.
//!
//! A request goes through four stages: the decision document is normalized
//! into commands and fragments, fragments are fetched, everything is
//! resolved into structural selectors, and the page is rewritten in one
//! streaming pass. Any failure before the rewrite falls back to passing the
//! page through untouched.

pub mod apply;
pub mod build;
pub mod config;
pub mod resolve;

use std::fmt;
use std::io::{self, Read, Write};
use std::time::Instant;

use core_types::{ProcessedData, ResolvedCommand};
use net::{ContentFetcher, FetchConfig, FetchError, HttpFetcher};
use serde_json::Value;
use url::Url;

pub use crate::apply::{ApplyError, ApplyStats, apply, apply_chunked, apply_str};
pub use crate::build::build;
pub use crate::config::{ConfigError, PersonalizerConfig, ProvenanceConfig};
pub use crate::resolve::{ResolvedFragment, resolve_fragment, resolve_fragments};

const LOG_TARGET: &str = "runtime_pers";

#[derive(Debug)]
pub enum PersonalizeError {
    /// Reading the page or writing the output failed.
    Io(io::Error),
}

impl fmt::Display for PersonalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersonalizeError::Io(err) => write!(f, "personalization stream failed: {err}"),
        }
    }
}

impl std::error::Error for PersonalizeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersonalizeError::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for PersonalizeError {
    fn from(err: io::Error) -> Self {
        PersonalizeError::Io(err)
    }
}

impl From<ApplyError> for PersonalizeError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Io(err) => PersonalizeError::Io(err),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Personalized(ApplyStats),
    /// The page was copied through unchanged.
    Passthrough,
}

/// Whether the request URL opts into edge personalization.
pub fn should_personalize(url: &Url) -> bool {
    let first = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    };
    first("edge-pers").is_some()
        || first("target").is_some_and(|v| v == "on")
        || first("hybrid-pers").is_some_and(|v| v == "on")
        || first("hybrid_test").is_some_and(|v| v == "true")
        || first("perf_test").is_some_and(|v| v == "true")
}

pub struct Personalizer {
    config: PersonalizerConfig,
    fetcher: Box<dyn ContentFetcher>,
}

impl Personalizer {
    pub fn new(config: PersonalizerConfig, fetcher: Box<dyn ContentFetcher>) -> Self {
        Personalizer { config, fetcher }
    }

    /// A personalizer fetching fragments over HTTP with the configured client.
    pub fn with_http(config: PersonalizerConfig) -> Result<Self, FetchError> {
        let fetcher = HttpFetcher::new(&FetchConfig::from(&config.fetch))?;
        Ok(Self::new(config, Box::new(fetcher)))
    }

    pub fn config(&self) -> &PersonalizerConfig {
        &self.config
    }

    /// Normalizes decisions, fetches fragments and resolves selectors.
    pub fn prepare(&self, document: &Value) -> Vec<ResolvedCommand> {
        let start = Instant::now();
        let data: ProcessedData = decisions::normalize(document);
        log::info!(
            target: LOG_TARGET,
            "normalized decisions: {} commands, {} fragments in {}ms",
            data.commands.len(),
            data.fragments.len(),
            start.elapsed().as_millis()
        );

        let content = resolve_fragments(&data.fragments, &self.config.base_origin, &*self.fetcher);
        let commands = build(&data, &content);
        log::debug!(target: LOG_TARGET, "{} resolved commands", commands.len());
        commands
    }

    /// Rewrites `page` into `out`. Without decisions the page is passed
    /// through unchanged.
    pub fn personalize<R: Read, W: Write>(
        &self,
        page: R,
        document: Option<&Value>,
        out: W,
    ) -> Result<Outcome, PersonalizeError> {
        let Some(document) = document else {
            log::info!(target: LOG_TARGET, "no usable decisions; passing page through");
            passthrough(page, out)?;
            return Ok(Outcome::Passthrough);
        };

        let commands = self.prepare(document);
        let start = Instant::now();
        let stats = apply_chunked(
            page,
            &commands,
            &self.config.provenance,
            self.config.read_chunk_size,
            out,
        )?;
        log::info!(
            target: LOG_TARGET,
            "rewrote page in {}ms: {} registered, {} skipped, {} matches",
            start.elapsed().as_millis(),
            stats.registered,
            stats.skipped,
            stats.matched
        );
        Ok(Outcome::Personalized(stats))
    }
}

/// Copies the page unchanged.
pub fn passthrough(mut page: impl Read, mut out: impl Write) -> io::Result<u64> {
    let copied = io::copy(&mut page, &mut out)?;
    out.flush()?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn personalization_gate() {
        assert!(should_personalize(&url("https://x.test/p?edge-pers")));
        assert!(should_personalize(&url("https://x.test/p?hybrid-pers=off&target=on")));
        assert!(should_personalize(&url("https://x.test/p?hybrid_test=true")));
        assert!(should_personalize(&url("https://x.test/p?perf_test=true")));
        assert!(!should_personalize(&url("https://x.test/p")));
        assert!(!should_personalize(&url("https://x.test/p?target=off&perf_test=1")));
    }

    #[test]
    fn only_the_first_value_of_a_key_counts() {
        assert!(!should_personalize(&url("https://x.test/p?target=off&target=on")));
        assert!(should_personalize(&url("https://x.test/p?target=on&target=off")));
        assert!(!should_personalize(&url("https://x.test/p?perf_test=no&perf_test=true")));
    }

    #[test]
    fn passthrough_copies_bytes() {
        let mut out = Vec::new();
        let copied = passthrough(&b"<p>a</p>"[..], &mut out).unwrap();
        assert_eq!(copied, 8);
        assert_eq!(out, b"<p>a</p>");
    }
}
