//! Sets command - rank candidate source files by hash evidence alone.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;

use crate::cli::{csv_field, load_catalog, open_output, CandidateArgs, OutputFormat};
use crate::matching::scoring::{hash_sets, SetReport};

const COLUMNS: [&str; 4] = ["Source File", "Source ID", "Raw Score", "Normalized Score"];

/// Arguments for the sets command
#[derive(Args)]
pub struct SetsArgs {
    /// bulk_extractor report directory
    #[arg(required = true)]
    pub report_dir: PathBuf,

    #[command(flatten)]
    pub candidates: CandidateArgs,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the sets command
///
/// # Errors
///
/// Returns an error if the association stream cannot be read or the output
/// cannot be written.
#[allow(clippy::needless_pass_by_value)] // CLI entry point, values from clap
pub fn run(args: SetsArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    if !args.report_dir.is_dir() {
        anyhow::bail!("{} does not exist", args.report_dir.display());
    }

    let policy = args.candidates.policy();
    let catalog = load_catalog(&args.report_dir, policy.clone())?;
    let rows = hash_sets(&catalog);
    if verbose {
        eprintln!("Total candidates: {}", rows.len());
    }

    // An empty report is still written, so `--output` always leaves a file
    let mut out = open_output(args.output.as_ref())?;
    if rows.is_empty() && matches!(format, OutputFormat::Text) {
        eprintln!("No candidate sources.");
    }
    match format {
        OutputFormat::Text => write_text(&mut out, &rows)?,
        OutputFormat::Json => {
            let output = serde_json::json!({
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "candidate_policy": &policy,
                "sets": rows,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        OutputFormat::Tsv => write_delimited(&mut out, &rows, "\t")?,
        OutputFormat::Csv => write_delimited(&mut out, &rows, ",")?,
    }
    out.flush()?;
    Ok(())
}

fn normalized_text(row: &SetReport) -> String {
    row.normalized_score
        .map(|n| format!("{n:.4}"))
        .unwrap_or_default()
}

fn write_text(out: &mut dyn Write, rows: &[SetReport]) -> std::io::Result<()> {
    writeln!(out, "{:>10}  {:>10}  File", "Normalized", "Raw")?;
    for row in rows {
        let normalized = row
            .normalized_score
            .map_or_else(|| "-".to_string(), |n| format!("{n:.4}"));
        writeln!(out, "{normalized:>10}  {:>10.3}  {}", row.raw_score, row.filename)?;
    }
    Ok(())
}

fn write_delimited(
    out: &mut dyn Write,
    rows: &[SetReport],
    delimiter: &str,
) -> std::io::Result<()> {
    let field = |value: &str| {
        if delimiter == "," {
            csv_field(value)
        } else {
            value.replace(['\t', '\n'], " ")
        }
    };
    writeln!(out, "{}", COLUMNS.map(&field).join(delimiter))?;
    for row in rows {
        writeln!(
            out,
            "{}{delimiter}{}{delimiter}{}{delimiter}{}",
            field(&row.filename),
            row.source_id,
            row.raw_score,
            normalized_text(row),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SourceId;

    fn rows() -> Vec<SetReport> {
        vec![
            SetReport {
                filename: "two, copy".to_string(),
                source_id: SourceId(2),
                raw_score: 2.0,
                normalized_score: Some(1.0),
            },
            SetReport {
                filename: "tiny".to_string(),
                source_id: SourceId(3),
                raw_score: 0.25,
                normalized_score: None,
            },
        ]
    }

    #[test]
    fn test_write_csv() {
        let mut buf = Vec::new();
        write_delimited(&mut buf, &rows(), ",").unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Source File,Source ID,Raw Score,Normalized Score");
        assert_eq!(lines[1], "\"two, copy\",2,2,1.0000");
        assert_eq!(lines[2], "tiny,3,0.25,");
    }

    #[test]
    fn test_write_text() {
        let mut buf = Vec::new();
        write_text(&mut buf, &rows()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("1.0000"));
        assert!(text.lines().nth(2).unwrap().trim_start().starts_with('-'));
    }
}
