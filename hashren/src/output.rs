//! Output formatting for the run summary.
//!
//! Provides abstraction layer for outputting results in text or JSON format.

use anyhow::Result;
use chrono::{DateTime, Utc};
use hashren_core::{Failure, Summary};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Writer for command output with format abstraction.
pub struct OutputWriter {
    format: OutputFormat,
    stdout: io::Stdout,
}

impl OutputWriter {
    /// Create a new OutputWriter.
    pub fn new(json: bool) -> Self {
        Self {
            format: if json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            stdout: io::stdout(),
        }
    }

    /// Check if JSON mode is enabled.
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Write output using the configured format.
    ///
    /// The `text_fn` closure is called only in text mode to generate the
    /// human-readable output.
    pub fn write<T: Serialize>(
        &self,
        data: &T,
        text_fn: impl FnOnce() -> String,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                writeln!(&self.stdout, "{}", json)?;
            }
            OutputFormat::Text => {
                let text = text_fn();
                if !text.is_empty() {
                    write!(&self.stdout, "{}", text)?;
                }
            }
        }
        Ok(())
    }

    /// Write an error message to stderr.
    ///
    /// In JSON mode, writes a JSON error object with success=false.
    /// In text mode, writes the error message directly.
    pub fn write_error(&self, error: &anyhow::Error, result_code: u8) {
        match self.format {
            OutputFormat::Json => {
                let error_output = ErrorOutput {
                    success: false,
                    result_code,
                    error: format!("{:#}", error),
                };
                if let Ok(json) = serde_json::to_string_pretty(&error_output) {
                    let _ = writeln!(io::stderr(), "{}", json);
                }
            }
            OutputFormat::Text => {
                let _ = writeln!(io::stderr(), "Error: {:#}", error);
            }
        }
    }
}

// ============================================================================
// Data Transfer Objects (DTOs) for JSON output
// ============================================================================

/// Error output structure.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub success: bool,
    pub result_code: u8,
    pub error: String,
}

/// Settings a run was started with.
#[derive(Debug, Serialize)]
pub struct RunSettings {
    pub root: String,
    pub algorithm: String,
    pub digest_bytes: usize,
    pub workers: usize,
    pub claim: String,
}

/// Output for a completed run.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub success: bool,
    pub result_code: u8,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub settings: RunSettings,
    #[serde(flatten)]
    pub summary: Summary,
}

impl RunOutput {
    /// Human-readable report.
    pub fn to_text(&self) -> String {
        let summary = &self.summary;
        let mut out = String::new();

        if summary.total() == 0 && !summary.interrupted {
            let _ = writeln!(out, "No files found in {}", self.settings.root);
            return out;
        }

        let _ = writeln!(
            out,
            "Processed {} files in {} ({:.2}s)",
            summary.total(),
            self.settings.root,
            self.elapsed_ms as f64 / 1000.0
        );
        let _ = writeln!(out, "  unchanged: {}", summary.no_op);
        let _ = writeln!(out, "  renamed:   {}", summary.renamed);
        let _ = writeln!(out, "  deleted:   {}", summary.deleted);
        let _ = writeln!(out, "  failed:    {}", summary.failed);

        if !summary.failures.is_empty() {
            let _ = writeln!(out, "Failures:");
            for Failure { path, error } in &summary.failures {
                let _ = writeln!(out, "  {}: {}", path.display(), error);
            }
        }

        if summary.interrupted {
            let _ = writeln!(out, "Interrupted: remaining files were not processed");
        }

        out
    }
}
