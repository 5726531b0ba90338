//! # lyra-cli
//!
//! Command-line entry point for the Lyra pipeline.
//!
//! One invocation reads the raw song metadata and log event trees and
//! writes all five star-schema tables; there are no incremental or
//! partial-run flags. The exit status is zero only if every table write
//! completed.
//!
//! ## Configuration
//!
//! Flags may also come from environment variables:
//!
//! - `LYRA_INPUT_URL` - root directory of the raw input trees
//! - `LYRA_OUTPUT_URL` - root directory for the output tables
//! - `LYRA_CREDENTIALS` - optional INI-style credentials file

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};

use lyra_core::observability::LogFormat;
use lyra_core::StorageConfig;
use lyra_etl::pipeline::{self, PipelineConfig, RunSummary};

/// Lyra - star-schema pipeline for song-play analytics.
#[derive(Debug, Parser)]
#[command(name = "lyra")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Root directory containing the `song_data/` and `log_data/` trees.
    #[arg(long, env = "LYRA_INPUT_URL")]
    pub input_url: PathBuf,

    /// Root directory the five table directories are written beneath.
    #[arg(long, env = "LYRA_OUTPUT_URL")]
    pub output_url: PathBuf,

    /// Optional INI-style credentials file for the storage backend.
    #[arg(long, env = "LYRA_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value = "pretty")]
    pub log_format: LogFormatArg,
}

/// CLI-facing log format selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    /// JSON structured logs.
    Json,
    /// Pretty-printed logs.
    Pretty,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Json => Self::Json,
            LogFormatArg::Pretty => Self::Pretty,
        }
    }
}

impl Cli {
    /// Builds the storage configuration for the raw input trees.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file cannot be read or parsed.
    pub fn input_config(&self) -> anyhow::Result<StorageConfig> {
        self.config_for(&self.input_url)
    }

    /// Builds the storage configuration for the output tables.
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file cannot be read or parsed.
    pub fn output_config(&self) -> anyhow::Result<StorageConfig> {
        self.config_for(&self.output_url)
    }

    fn config_for(&self, root: &Path) -> anyhow::Result<StorageConfig> {
        let config = StorageConfig::local(root.display().to_string());
        match &self.credentials {
            Some(path) => config
                .with_credentials_file(path)
                .context("loading credentials file"),
            None => Ok(config),
        }
    }
}

/// Runs the pipeline for the parsed CLI invocation.
///
/// # Errors
///
/// Returns the first read, transform, or write failure; the caller maps
/// this to a nonzero exit status.
pub async fn execute(cli: &Cli) -> anyhow::Result<RunSummary> {
    // Both configurations are resolved (credentials included) before any
    // backend touches storage, scoped to this run.
    let input = cli.input_config()?.build_backend();
    let output = cli.output_config()?.build_backend();

    let summary = pipeline::run(input.as_ref(), output.as_ref(), &PipelineConfig::default())
        .await
        .context("pipeline run failed")?;

    println!(
        "wrote songs={} artists={} users={} time={} songplays={} (dropped {} malformed records)",
        summary.songs_rows,
        summary.artists_rows,
        summary.users_rows,
        summary.time_rows,
        summary.fact_rows,
        summary.malformed_records,
    );
    Ok(summary)
}
