use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::catalog::store::SourceCatalog;
use crate::core::run::Run;
use crate::core::types::{SourceId, BLOCK_SIZE};
use crate::evidence::layout::LayoutLookup;

/// Safely convert a block count to f64 for percentage calculations
#[inline]
fn count_to_f64(count: u64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// One row of the hash-runs report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub identified_file: String,
    pub source_id: SourceId,
    pub score: f64,
    pub physical_block_start: u64,
    pub logical_block_start: u64,
    pub logical_block_end: u64,
    pub mod8: u8,
    pub blocks_found: u64,
    pub null_gap_blocks: u64,
    /// `None` when the source size is unknown
    pub percent_complete: Option<f64>,
    /// Allocated file currently occupying the run's first sector
    pub source_file: Option<String>,
    pub source_size: Option<u64>,
}

/// Turns retained runs into ordered report rows
pub struct Reporter<'a> {
    catalog: &'a SourceCatalog,
    layout: Option<&'a dyn LayoutLookup>,
}

impl<'a> Reporter<'a> {
    pub fn new(catalog: &'a SourceCatalog) -> Self {
        Self {
            catalog,
            layout: None,
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: &'a dyn LayoutLookup) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Score every run and order the rows.
    ///
    /// Sources appear by descending aggregate score (ties by filename, then
    /// id); rows within a source by logical start, then physical start, then
    /// alignment class.
    pub fn report(&self, runs: &[Run]) -> Vec<RunReport> {
        let rank: HashMap<SourceId, usize> = self
            .catalog
            .ranked_sources()
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();

        let mut rows: Vec<(usize, RunReport)> = runs
            .iter()
            .map(|run| {
                let position = rank.get(&run.source).copied().unwrap_or(usize::MAX);
                (position, self.row(run))
            })
            .collect();

        rows.sort_by(|(ra, a), (rb, b)| {
            ra.cmp(rb)
                .then_with(|| a.source_id.cmp(&b.source_id))
                .then_with(|| a.logical_block_start.cmp(&b.logical_block_start))
                .then_with(|| a.physical_block_start.cmp(&b.physical_block_start))
                .then_with(|| a.mod8.cmp(&b.mod8))
        });
        rows.into_iter().map(|(_, row)| row).collect()
    }

    fn row(&self, run: &Run) -> RunReport {
        let source = self.catalog.source(run.source);
        let blocks_found = run.len() as u64;
        let allocated = self.layout.and_then(|layout| {
            match layout.file_at(run.physical_start()) {
                Ok(hit) => hit,
                Err(e) => {
                    debug!("Layout lookup failed at sector {}: {e}", run.physical_start());
                    None
                }
            }
        });
        let (source_file, source_size) =
            allocated.map_or((None, None), |file| (file.name, file.size));

        RunReport {
            identified_file: source.filename.clone(),
            source_id: run.source,
            score: run.score,
            physical_block_start: run.physical_start(),
            logical_block_start: run.logical_start,
            logical_block_end: run.logical_end,
            mod8: run.mod8(),
            blocks_found,
            null_gap_blocks: run.null_gap_blocks() as u64,
            percent_complete: source.percent_complete(blocks_found),
            source_file,
            source_size,
        }
    }
}

/// One row of the hash-sets report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetReport {
    pub filename: String,
    pub source_id: SourceId,
    pub raw_score: f64,
    /// `raw_score / whole blocks in the file`, capped at 1; `None` for files
    /// smaller than one block or of unknown size
    pub normalized_score: Option<f64>,
}

/// Which candidate sources are most likely present, ignoring physical layout
pub fn hash_sets(catalog: &SourceCatalog) -> Vec<SetReport> {
    let mut rows: Vec<SetReport> = catalog
        .candidates()
        .iter()
        .map(|&id| {
            let source = catalog.source(id);
            let raw_score = catalog.source_score(id);
            let whole_blocks = source.filesize / BLOCK_SIZE;
            let normalized_score = (whole_blocks > 0)
                .then(|| (raw_score / count_to_f64(whole_blocks)).min(1.0));
            SetReport {
                filename: source.filename,
                source_id: id,
                raw_score,
                normalized_score,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        let na = a.normalized_score.unwrap_or(-1.0);
        let nb = b.normalized_score.unwrap_or(-1.0);
        nb.total_cmp(&na)
            .then_with(|| b.raw_score.total_cmp(&a.raw_score))
            .then_with(|| a.filename.cmp(&b.filename))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::index::CandidateSet;
    use crate::core::run::Triple;
    use crate::evidence::layout::{AllocatedFile, LayoutError};
    use crate::parsing::explained::read_records;
    use std::io::Cursor;

    const STREAM: &str = concat!(
        "[\"a\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 0}]]\n",
        "[\"b\", {\"count\": 1}, [{\"source_id\": 2, \"file_offset\": 0}, {\"source_id\": 2, \"file_offset\": 4096}]]\n",
        "[\"c\", {\"count\": 4}, [{\"source_id\": 3, \"file_offset\": 0}]]\n",
        "{\"source_id\": 1, \"filename\": \"one\", \"filesize\": 32768}\n",
        "{\"source_id\": 2, \"filename\": \"two\", \"filesize\": 4096}\n",
        "{\"source_id\": 3, \"filename\": \"three\", \"filesize\": 100}\n",
    );

    fn catalog() -> SourceCatalog {
        SourceCatalog::load(
            read_records(Cursor::new(STREAM)),
            CandidateSet::from([SourceId(1), SourceId(2), SourceId(3)]),
        )
        .unwrap()
    }

    fn run(source: u64, start_sector: u64, start_block: u64, len: u64) -> Run {
        let triples = (0..len)
            .map(|i| Triple::hashed(start_sector + i * 8, [start_block + i], 1))
            .collect();
        Run::new(SourceId(source), triples, 0.0)
    }

    struct FixedLayout;

    impl LayoutLookup for FixedLayout {
        fn file_at(&self, sector: u64) -> Result<Option<AllocatedFile>, LayoutError> {
            Ok((sector == 100).then(|| AllocatedFile {
                name: Some("/Users/x/one.bin".to_string()),
                size: Some(16384),
            }))
        }
    }

    #[test]
    fn test_report_row_values() {
        let catalog = catalog();
        let rows = Reporter::new(&catalog).report(&[run(1, 100, 0, 4)]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.identified_file, "one");
        assert!((row.score - 4.0).abs() < 1e-9);
        assert_eq!(row.physical_block_start, 100);
        assert_eq!((row.logical_block_start, row.logical_block_end), (0, 3));
        assert_eq!(row.mod8, 4);
        assert_eq!(row.percent_complete, Some(50.0));
        assert_eq!(row.source_file, None);
    }

    #[test]
    fn test_report_ordering() {
        let catalog = catalog();
        // Source 2 has the highest aggregate score (2.0), then 1 (1.0), then 3
        let runs = vec![
            run(1, 500, 4, 2),
            run(3, 900, 0, 2),
            run(1, 100, 0, 2),
            run(2, 300, 0, 2),
        ];
        let rows = Reporter::new(&catalog).report(&runs);
        let order: Vec<(u64, u64)> = rows
            .iter()
            .map(|r| (r.source_id.0, r.logical_block_start))
            .collect();
        assert_eq!(order, vec![(2, 0), (1, 0), (1, 4), (3, 0)]);
    }

    #[test]
    fn test_report_is_idempotent() {
        let catalog = catalog();
        let runs = vec![run(1, 500, 4, 2), run(2, 300, 0, 2), run(1, 100, 0, 2)];
        let reporter = Reporter::new(&catalog);
        assert_eq!(reporter.report(&runs), reporter.report(&runs));
    }

    #[test]
    fn test_layout_labels_first_sector() {
        let catalog = catalog();
        let layout = FixedLayout;
        let rows = Reporter::new(&catalog)
            .with_layout(&layout)
            .report(&[run(1, 100, 0, 2), run(1, 200, 5, 2)]);
        assert_eq!(rows[0].source_file.as_deref(), Some("/Users/x/one.bin"));
        assert_eq!(rows[0].source_size, Some(16384));
        assert_eq!(rows[1].source_file, None);
    }

    #[test]
    fn test_hash_sets() {
        let catalog = catalog();
        let rows = hash_sets(&catalog);
        let names: Vec<&str> = rows.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["two", "one", "three"]);
        // two: raw 2.0 over 1 block, capped
        assert_eq!(rows[0].normalized_score, Some(1.0));
        // one: raw 1.0 over 8 blocks
        assert_eq!(rows[1].normalized_score, Some(0.125));
        // three: smaller than a block
        assert_eq!(rows[2].normalized_score, None);
        assert!((rows[2].raw_score - 0.25).abs() < 1e-9);
    }
}
