//! Runs command - report aligned runs of sectors matching known source files.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use tracing::{info, warn};

use crate::catalog::disk::DiskIndex;
use crate::catalog::index::CandidatePolicy;
use crate::cli::{
    csv_field, load_catalog, open_output, CandidateArgs, OutputFormat, IDENTIFIED_FILE,
};
use crate::evidence::image::{ImageSource, RawImage};
use crate::evidence::layout::{LayoutError, LayoutLookup, TskDatabase};
use crate::matching::engine::{
    RunConfig, RunEngine, DEFAULT_MAX_COUNT, DEFAULT_MAX_GAP_BLOCKS, DEFAULT_MIN_RUN,
    DEFAULT_NULL_GAP_WEIGHT,
};
use crate::matching::scoring::{Reporter, RunReport};
use crate::parsing::{identified, open_input, resolve_input};

/// Column headings shared by the tabular formats
const COLUMNS: [&str; 9] = [
    "Identified File",
    "Score",
    "Physical Block Start",
    "Logical Block Start",
    "Logical Block End",
    "(mod 8)",
    "Percent Complete",
    "Source File",
    "Source Size",
];

/// Arguments for the runs command
#[derive(Args)]
pub struct RunsArgs {
    /// bulk_extractor report directory
    #[arg(required = true)]
    pub report_dir: PathBuf,

    #[command(flatten)]
    pub candidates: CandidateArgs,

    /// Do not report runs shorter than this many blocks
    #[arg(long, default_value_t = DEFAULT_MIN_RUN)]
    pub min_run: usize,

    /// At least one block in each run must have a global count at or below this
    #[arg(long, default_value_t = DEFAULT_MAX_COUNT)]
    pub max_count: u64,

    /// Raw disk image used to verify and merge zero-filled gaps between runs
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Name of the tsk_loaddb database inside the report directory
    #[arg(long, default_value = "tsk_db.sqlite3")]
    pub dbname: String,

    /// Score credited for each verified null block absorbed by a merge
    #[arg(long, default_value_t = DEFAULT_NULL_GAP_WEIGHT)]
    pub null_gap_weight: f64,

    /// Never verify gaps longer than this many blocks
    #[arg(long, default_value_t = DEFAULT_MAX_GAP_BLOCKS)]
    pub max_gap_blocks: u64,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RunsArgs {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            min_run: self.min_run,
            max_count: self.max_count,
            null_gap_weight: self.null_gap_weight,
            max_gap_blocks: self.max_gap_blocks,
        }
    }
}

/// Execute the runs command
///
/// # Errors
///
/// Returns an error if the report directory or its input streams cannot be
/// read, or the output cannot be written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: RunsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    if !args.report_dir.is_dir() {
        anyhow::bail!("{} does not exist", args.report_dir.display());
    }

    let policy = args.candidates.policy();
    let config = args.run_config();

    let catalog = load_catalog(&args.report_dir, policy.clone())?;
    if verbose {
        eprintln!("Total candidates: {}", catalog.candidates().len());
    }

    let identified_path = resolve_input(&args.report_dir, IDENTIFIED_FILE)?;
    info!("Reading {}", identified_path.display());
    let mut observations = identified::read_observations(open_input(&identified_path)?);
    let disk = DiskIndex::load_relevant(observations.by_ref(), &catalog)?;
    observations.report_skipped();
    if disk.is_empty() && !catalog.is_empty() {
        warn!("No observation in {} matches a candidate hash", identified_path.display());
    }

    let mut image = args.image.as_deref().and_then(|path| match RawImage::open(path) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!("{e}; gaps will not be merged");
            None
        }
    });

    let layout = open_layout(&args);

    let engine = RunEngine::with_config(&catalog, &disk, config.clone());
    let runs = engine.find_runs(image.as_mut().map(|i| i as &mut dyn ImageSource));

    let mut reporter = Reporter::new(&catalog);
    if let Some(layout) = layout.as_ref() {
        reporter = reporter.with_layout(layout as &dyn LayoutLookup);
    }
    let rows = reporter.report(&runs);

    // An empty report is still written, so `--output` always leaves a file
    let mut out = open_output(args.output.as_ref())?;
    if rows.is_empty() && matches!(format, OutputFormat::Text) {
        eprintln!("No runs found.");
    }
    match format {
        OutputFormat::Text => write_text(&mut out, &rows)?,
        OutputFormat::Json => write_json(&mut out, &rows, &policy, &config)?,
        OutputFormat::Tsv => write_tsv(&mut out, &rows)?,
        OutputFormat::Csv => write_csv(&mut out, &rows)?,
    }
    out.flush()?;

    if let Some(path) = &args.output {
        info!("Wrote {} row(s) to {}", rows.len(), path.display());
    }
    Ok(())
}

fn open_layout(args: &RunsArgs) -> Option<TskDatabase> {
    let path = args.report_dir.join(&args.dbname);
    match TskDatabase::open(&path) {
        Ok(db) => {
            info!("Reading {}", path.display());
            Some(db)
        }
        Err(LayoutError::NotFound(_)) => {
            info!("Will not report allocated files; no file {}", path.display());
            None
        }
        Err(e) => {
            warn!("Cannot open {}: {e}; allocated files will not be reported", path.display());
            None
        }
    }
}

fn percent_text(row: &RunReport) -> String {
    row.percent_complete
        .map(|p| format!("{p:.2}"))
        .unwrap_or_default()
}

fn write_text(out: &mut dyn Write, rows: &[RunReport]) -> std::io::Result<()> {
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            writeln!(out, "\n{}", "─".repeat(60))?;
        }
        writeln!(out, "\n#{} {}", i + 1, row.identified_file)?;
        writeln!(out, "   Score: {:.3} (mod 8 = {})", row.score, row.mod8)?;
        writeln!(out, "   Physical block start: {}", row.physical_block_start)?;
        let percent = row
            .percent_complete
            .map_or_else(|| "-".to_string(), |p| format!("{p:.1}%"));
        writeln!(
            out,
            "   Logical blocks: {}..={} ({} found, {} complete)",
            row.logical_block_start, row.logical_block_end, row.blocks_found, percent
        )?;
        if row.null_gap_blocks > 0 {
            writeln!(out, "   Null gap blocks merged: {}", row.null_gap_blocks)?;
        }
        if let Some(name) = &row.source_file {
            match row.source_size {
                Some(size) => writeln!(out, "   Allocated file: {name} ({size} bytes)")?,
                None => writeln!(out, "   Allocated file: {name}")?,
            }
        }
    }
    Ok(())
}

fn write_json(
    out: &mut dyn Write,
    rows: &[RunReport],
    policy: &CandidatePolicy,
    config: &RunConfig,
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "generated_at": chrono::Utc::now().to_rfc3339(),
        "candidate_policy": policy,
        "run_config": config,
        "runs": rows,
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
    Ok(())
}

fn write_tsv(out: &mut dyn Write, rows: &[RunReport]) -> std::io::Result<()> {
    writeln!(out, "{}", COLUMNS.join("\t"))?;
    for row in rows {
        writeln!(
            out,
            "{}\t{:.4}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.identified_file.replace(['\t', '\n'], " "),
            row.score,
            row.physical_block_start,
            row.logical_block_start,
            row.logical_block_end,
            row.mod8,
            percent_text(row),
            row.source_file.as_deref().unwrap_or_default(),
            row.source_size.map(|s| s.to_string()).unwrap_or_default(),
        )?;
    }
    Ok(())
}

fn write_csv(out: &mut dyn Write, rows: &[RunReport]) -> std::io::Result<()> {
    writeln!(out, "{}", COLUMNS.map(csv_field).join(","))?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            csv_field(&row.identified_file),
            row.score,
            row.physical_block_start,
            row.logical_block_start,
            row.logical_block_end,
            row.mod8,
            percent_text(row),
            csv_field(row.source_file.as_deref().unwrap_or_default()),
            row.source_size.map(|s| s.to_string()).unwrap_or_default(),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SourceId;

    fn row(name: &str, percent: Option<f64>) -> RunReport {
        RunReport {
            identified_file: name.to_string(),
            source_id: SourceId(1),
            score: 4.0,
            physical_block_start: 100,
            logical_block_start: 0,
            logical_block_end: 3,
            mod8: 4,
            blocks_found: 4,
            null_gap_blocks: 0,
            percent_complete: percent,
            source_file: Some("/docs/a, b.doc".to_string()),
            source_size: Some(20000),
        }
    }

    fn render(
        f: fn(&mut dyn Write, &[RunReport]) -> std::io::Result<()>,
        rows: &[RunReport],
    ) -> String {
        let mut buf = Vec::new();
        f(&mut buf, rows).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_write_csv() {
        let text = render(write_csv, &[row("/ref/one.bin", Some(50.0))]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Identified File,Score,Physical Block Start"));
        assert_eq!(lines[1], "/ref/one.bin,4,100,0,3,4,50.00,\"/docs/a, b.doc\",20000");
    }

    #[test]
    fn test_write_tsv_unknown_percent() {
        let text = render(write_tsv, &[row("one", None)]);
        let fields: Vec<&str> = text.lines().nth(1).unwrap().split('\t').collect();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields[1], "4.0000");
        assert_eq!(fields[6], "");
    }

    #[test]
    fn test_write_text() {
        let text = render(write_text, &[row("one", Some(50.0)), row("two", None)]);
        assert!(text.contains("#1 one"));
        assert!(text.contains("50.0% complete"));
        assert!(text.contains("#2 two"));
        assert!(text.contains("(4 found, - complete)"));
        assert!(text.contains("Allocated file: /docs/a, b.doc (20000 bytes)"));
    }

    #[test]
    fn test_write_json() {
        let mut buf = Vec::new();
        write_json(
            &mut buf,
            &[row("one", Some(50.0))],
            &CandidatePolicy::default(),
            &RunConfig::default(),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["runs"][0]["identified_file"], "one");
        assert_eq!(value["runs"][0]["percent_complete"], 50.0);
        assert_eq!(value["run_config"]["min_run"], 2);
        assert!(value["generated_at"].is_string());
    }
}
