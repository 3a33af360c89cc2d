mod output;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use hashren_core::{Algorithm, ClaimMode, Coordinator, DigestLength, Disposition, RunConfig};
use indicatif::{ProgressBar, ProgressStyle};
use output::{OutputWriter, RunOutput, RunSettings};
use std::io::{self, BufRead, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// hashren - rename files after their content digest
#[derive(Parser)]
#[command(name = "hashren")]
#[command(
    about = "Rename files to a SHAKE-128 digest of their content and delete duplicates",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Directory to process (recursively)
    directory: PathBuf,

    /// Digest length in bytes (defaults to HASHREN_DIGEST_LENGTH env var or 12)
    #[arg(short, long)]
    length: Option<String>,

    /// Ask for the digest length on the terminal
    #[arg(short, long, conflicts_with = "length")]
    interactive: bool,

    /// Number of worker threads (defaults to available parallelism)
    #[arg(short, long)]
    jobs: Option<NonZeroUsize>,

    /// How canonical names are claimed
    #[arg(long, value_enum, default_value_t = ClaimArg::Auto)]
    claim: ClaimArg,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Show a progress spinner
    #[arg(long)]
    progress: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClaimArg {
    /// Hard link, falling back to locked rename where links are unsupported
    Auto,
    /// Hard link only
    Link,
    /// Rename under a per-name lock
    Serialized,
}

impl From<ClaimArg> for ClaimMode {
    fn from(arg: ClaimArg) -> Self {
        match arg {
            ClaimArg::Auto => ClaimMode::Auto,
            ClaimArg::Link => ClaimMode::Link,
            ClaimArg::Serialized => ClaimMode::Serialized,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = OutputWriter::new(cli.json);

    if let Err(err) = run(cli, &output) {
        output.write_error(&err, 1);
        std::process::exit(1);
    }
}

fn run(cli: Cli, output: &OutputWriter) -> Result<()> {
    setup_logging(cli.verbose)?;

    let digest_length = if cli.interactive {
        prompt_digest_length()
    } else {
        let raw = cli
            .length
            .or_else(|| std::env::var("HASHREN_DIGEST_LENGTH").ok());
        parse_digest_length(raw.as_deref())
    };

    let mut config = RunConfig::new(&cli.directory)
        .with_digest_length(digest_length)
        .with_claim_mode(cli.claim.into());
    if let Some(jobs) = cli.jobs {
        config = config.with_concurrency(jobs);
    }

    let settings = RunSettings {
        root: cli.directory.display().to_string(),
        algorithm: Algorithm::Shake128.as_str().to_string(),
        digest_bytes: config.digest_length.get(),
        workers: config.concurrency.get(),
        claim: config.claim_mode.as_str().to_string(),
    };

    let progress = (cli.progress && !output.is_json()).then(progress_spinner);
    let mut coordinator = Coordinator::new(config);
    if let Some(bar) = &progress {
        let bar = bar.clone();
        coordinator = coordinator.with_observer(Arc::new(
            move |_: &Path, _: &hashren_core::Result<Disposition>| bar.inc(1),
        ));
    }

    // Setup signal handler for graceful shutdown
    let shutdown_flag = coordinator.shutdown_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing files in progress...");
        shutdown_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set signal handler")?;

    let started_at = Utc::now();
    let start = Instant::now();
    let summary = coordinator
        .run()
        .with_context(|| format!("Failed to process {}", cli.directory.display()))?;

    if let Some(bar) = &progress {
        bar.finish_and_clear();
    }

    let data = RunOutput {
        success: true,
        result_code: 0,
        started_at,
        elapsed_ms: start.elapsed().as_millis() as u64,
        settings,
        summary,
    };
    output.write(&data, || data.to_text())
}

/// Parse a digest length, falling back to the default with a warning.
fn parse_digest_length(raw: Option<&str>) -> DigestLength {
    match raw {
        None => DigestLength::DEFAULT,
        Some(value) => value.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Using default digest length of {}", DigestLength::DEFAULT);
            DigestLength::DEFAULT
        }),
    }
}

/// Ask for the digest length; empty input keeps the default.
fn prompt_digest_length() -> DigestLength {
    if !atty::is(atty::Stream::Stdin) {
        warn!("Standard input is not a terminal, using default digest length");
        return DigestLength::DEFAULT;
    }

    eprint!(
        "Enter checksum filename length (default: {}): ",
        DigestLength::DEFAULT
    );
    let _ = io::stderr().flush();

    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        warn!(error = %e, "Failed to read digest length, using default");
        return DigestLength::DEFAULT;
    }

    let line = line.trim();
    parse_digest_length((!line.is_empty()).then_some(line))
}

fn progress_spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] Renaming files: {pos} ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("hashren=debug,hashren_core=debug,warn")
        } else {
            EnvFilter::new("hashren=info,hashren_core=warn,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_digest_length_falls_back() {
        assert_eq!(parse_digest_length(None), DigestLength::DEFAULT);
        assert_eq!(parse_digest_length(Some("16")).get(), 16);
        assert_eq!(parse_digest_length(Some("zero")), DigestLength::DEFAULT);
        assert_eq!(parse_digest_length(Some("0")), DigestLength::DEFAULT);
        assert_eq!(parse_digest_length(Some("1000")), DigestLength::DEFAULT);
    }

    #[test]
    fn test_cli_parses_options() {
        let cli = Cli::try_parse_from([
            "hashren", "--length", "8", "-j", "3", "--claim", "serialized", "--json", "/data",
        ])
        .unwrap();
        assert_eq!(cli.directory, PathBuf::from("/data"));
        assert_eq!(cli.length.as_deref(), Some("8"));
        assert_eq!(cli.jobs.map(NonZeroUsize::get), Some(3));
        assert_eq!(ClaimMode::from(cli.claim), ClaimMode::Serialized);
        assert!(cli.json);
    }

    #[test]
    fn test_cli_rejects_zero_jobs_and_missing_directory() {
        assert!(Cli::try_parse_from(["hashren", "-j", "0", "/data"]).is_err());
        assert!(Cli::try_parse_from(["hashren"]).is_err());
        assert!(Cli::try_parse_from(["hashren", "-i", "-l", "4", "/data"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
