//! Command-line interface for hash-runs.
//!
//! Available commands:
//!
//! - **runs**: report aligned runs of sectors that match known source files
//! - **sets**: report which source files are likely present, ignoring layout
//!
//! Both read a bulk_extractor report directory containing
//! `identified_blocks.txt` and `identified_blocks_explained.txt` (either may
//! be gzip-compressed with a `.gz` suffix).
//!
//! ## Usage
//!
//! ```text
//! # Runs report, CSV to a file
//! hash-runs --format csv runs report/ --output report/hash-runs-report.csv
//!
//! # Verify and merge null gaps against the original image
//! hash-runs runs report/ --image disk.raw
//!
//! # Consider every source, not just ones with a unique hash
//! hash-runs runs report/ --all
//!
//! # Hash-sets report as JSON
//! hash-runs --format json sets report/
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::catalog::index::{CandidatePolicy, CandidateSelector, DEFAULT_CANDIDATE_MAX_COUNT};
use crate::catalog::store::SourceCatalog;
use crate::parsing::{explained, open_input, resolve_input};

pub mod runs;
pub mod sets;

/// Association stream inside a report directory
pub const EXPLAINED_FILE: &str = "identified_blocks_explained.txt";

/// Disk-observation stream inside a report directory
pub const IDENTIFIED_FILE: &str = "identified_blocks.txt";

#[derive(Parser)]
#[command(name = "hash-runs")]
#[command(version)]
#[command(about = "Find runs of disk sectors that match known source files")]
#[command(
    long_about = "hash-runs correlates sector hashes found on a disk image with a database of known source files.\n\nIt reports:\n- Aligned runs of sectors that are very likely fragments of a known file\n- Completeness of each fragment relative to the whole file\n- The allocated file currently occupying each fragment, when filesystem metadata is available"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output (debug tracing of every run)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report runs of sectors matching known source files
    Runs(runs::RunsArgs),

    /// Report which source files are likely present
    Sets(sets::SetsArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
    Csv,
}

/// Candidate selection options shared by all commands
#[derive(Args, Debug, Clone)]
pub struct CandidateArgs {
    /// Consider every source touched by any hash; disable candidate selection
    #[arg(long)]
    pub all: bool,

    /// A source is a candidate if one of its hashes has a global count at or below this
    #[arg(long, default_value_t = DEFAULT_CANDIDATE_MAX_COUNT)]
    pub candidate_max_count: u64,

    /// Let flagged hashes make their sources candidates
    #[arg(long)]
    pub allow_flagged: bool,
}

impl CandidateArgs {
    #[must_use]
    pub fn policy(&self) -> CandidatePolicy {
        CandidatePolicy {
            include_all: self.all,
            max_count: self.candidate_max_count,
            allow_flagged: self.allow_flagged,
        }
    }
}

/// Run both passes over the association stream of `report_dir`
///
/// # Errors
///
/// Returns an error if the stream is missing or cannot be read.
pub fn load_catalog(report_dir: &Path, policy: CandidatePolicy) -> anyhow::Result<SourceCatalog> {
    let path = resolve_input(report_dir, EXPLAINED_FILE)?;

    tracing::info!("Reading {} for candidate selection", path.display());
    let mut records = explained::read_records(open_input(&path)?);
    let candidates = CandidateSelector::new(policy).select(records.by_ref())?;
    records.report_skipped();
    tracing::info!("Scanned {} line(s) of {}", records.lines_read(), path.display());

    tracing::info!("Re-reading {} to build source database", path.display());
    let records = explained::read_records(open_input(&path)?);
    Ok(SourceCatalog::load(records, candidates)?)
}

/// Open `--output` or fall back to stdout
///
/// # Errors
///
/// Returns an error if the output file cannot be created.
pub fn open_output(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        None => Ok(Box::new(BufWriter::new(std::io::stdout().lock()))),
    }
}

/// Quote a CSV field if it contains a delimiter, quote or line break
#[must_use]
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
