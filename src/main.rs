//! `edgepers`: personalize an HTML page with a decision document.
//!
//! Set RUST_LOG=runtime_pers=debug (or trace, for the rewriter) for detail.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use net::FetchError;
use runtime_pers::{
    ConfigError, Outcome, PersonalizeError, Personalizer, PersonalizerConfig, should_personalize,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use url::Url;

const LOG_TARGET: &str = "edgepers";

#[derive(Parser, Debug)]
#[command(name = "edgepers", version)]
#[command(about = "Apply personalization decisions to an HTML page in one streaming pass")]
struct Args {
    /// HTML page to rewrite, or `-` for stdin
    #[arg(long, value_name = "PATH")]
    page: PathBuf,

    /// Decision document (JSON) returned by the experimentation service
    #[arg(long, value_name = "PATH")]
    decisions: PathBuf,

    /// TOML configuration; defaults apply when omitted
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Origin fragment paths are fetched from (overrides config and --url)
    #[arg(long, value_name = "URL")]
    origin: Option<String>,

    /// URL the page was requested with; its query decides whether to personalize
    #[arg(long, value_name = "URL")]
    url: Option<Url>,

    /// Personalize even when --url does not opt in
    #[arg(long)]
    force: bool,

    /// Where to write the result (default: stdout)
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Client(FetchError),
    Open { path: PathBuf, source: io::Error },
    Stream(PersonalizeError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(err) => write!(f, "{err}"),
            CliError::Client(err) => write!(f, "{err}"),
            CliError::Open { path, source } => write!(f, "cannot open {}: {source}", path.display()),
            CliError::Stream(err) => write!(f, "{err}"),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!(target: LOG_TARGET, "{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let mut config = match &args.config {
        Some(path) => PersonalizerConfig::load(path).map_err(CliError::Config)?,
        None => PersonalizerConfig::default(),
    };
    if let Some(origin) = &args.origin {
        config.base_origin = origin.clone();
    } else if let Some(url) = &args.url {
        config.base_origin = url.origin().ascii_serialization();
    }
    log::debug!(target: LOG_TARGET, "base origin {}", config.base_origin);

    let gated_off = match &args.url {
        Some(url) if !args.force && !should_personalize(url) => {
            log::info!(target: LOG_TARGET, "{url} does not opt into personalization");
            true
        }
        _ => false,
    };
    let decisions = if gated_off {
        None
    } else {
        read_decisions(&args.decisions)
    };

    let personalizer = Personalizer::with_http(config).map_err(CliError::Client)?;
    let page = open_page(&args.page)?;
    let out = open_output(args.output.as_deref())?;

    let outcome = personalizer
        .personalize(page, decisions.as_ref(), out)
        .map_err(CliError::Stream)?;
    if let Outcome::Personalized(stats) = outcome {
        log::info!(
            target: LOG_TARGET,
            "{} commands applied ({} matches, {} skipped)",
            stats.registered,
            stats.matched,
            stats.skipped
        );
    }
    Ok(())
}

/// A missing or malformed document means "no personalization", not failure.
fn read_decisions(path: &Path) -> Option<Value> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            log::warn!(target: LOG_TARGET, "cannot read decisions {}: {err}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!(target: LOG_TARGET, "decisions {} are not JSON: {err}", path.display());
            None
        }
    }
}

fn open_page(path: &Path) -> Result<Box<dyn Read>, CliError> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).map_err(|source| CliError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(file))
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, CliError> {
    let Some(path) = path else {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    };
    let file = File::create(path).map_err(|source| CliError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Box::new(BufWriter::new(file)))
}
