use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::disk::DiskIndex;
use crate::catalog::store::SourceCatalog;
use crate::core::run::Run;
use crate::evidence::image::ImageSource;
use crate::matching::merge::GapMerger;
use crate::matching::runs::{retain_run, RunDetector};

/// Default minimum number of triples in a reported run
pub const DEFAULT_MIN_RUN: usize = 2;

/// Default ceiling: some hash in a run must have a global count at or below this
pub const DEFAULT_MAX_COUNT: u64 = 10;

/// Default score contribution of one verified null gap block
pub const DEFAULT_NULL_GAP_WEIGHT: f64 = 0.25;

/// Default largest gap, in blocks, read from the image for one merge attempt
pub const DEFAULT_MAX_GAP_BLOCKS: u64 = 1024;

/// Configuration for run detection and merging
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    /// Minimum number of triples in a retained run
    pub min_run: usize,
    /// At least one hash of a retained run must have a count at or below this
    pub max_count: u64,
    /// Score added per zero-filled gap block absorbed by a merge
    pub null_gap_weight: f64,
    /// Gaps longer than this many blocks are never verified or merged
    pub max_gap_blocks: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_run: DEFAULT_MIN_RUN,
            max_count: DEFAULT_MAX_COUNT,
            null_gap_weight: DEFAULT_NULL_GAP_WEIGHT,
            max_gap_blocks: DEFAULT_MAX_GAP_BLOCKS,
        }
    }
}

/// Runs the detector over every candidate source, then merges and filters.
///
/// All indices are borrowed read-only; the engine owns nothing but its config.
pub struct RunEngine<'a> {
    catalog: &'a SourceCatalog,
    disk: &'a DiskIndex,
    config: RunConfig,
}

impl<'a> RunEngine<'a> {
    /// Create an engine with default configuration
    pub fn new(catalog: &'a SourceCatalog, disk: &'a DiskIndex) -> Self {
        Self::with_config(catalog, disk, RunConfig::default())
    }

    pub fn with_config(catalog: &'a SourceCatalog, disk: &'a DiskIndex, config: RunConfig) -> Self {
        Self {
            catalog,
            disk,
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Detect, merge (when an image is available) and retain runs for all
    /// candidate sources, in source ranking order.
    pub fn find_runs(&self, mut image: Option<&mut dyn ImageSource>) -> Vec<Run> {
        let detector = RunDetector::new(self.catalog, self.disk, &self.config);
        let mut retained = Vec::new();

        for source in self.catalog.ranked_sources() {
            let mut runs = detector.candidate_runs(source);
            if runs.is_empty() {
                continue;
            }

            if let Some(image) = image.as_deref_mut() {
                let before = runs.len();
                runs = GapMerger::new(image, self.config.null_gap_weight, self.config.max_gap_blocks)
                    .merge_runs(runs);
                if runs.len() < before {
                    debug!(
                        "Source {source}: merged {before} run(s) into {}",
                        runs.len()
                    );
                }
            }

            runs.retain(|run| retain_run(run, &self.config));
            for run in &runs {
                trace_run(self.catalog, run);
            }
            retained.extend(runs);
        }

        info!("Retained {} run(s)", retained.len());
        retained
    }
}

fn trace_run(catalog: &SourceCatalog, run: &Run) {
    debug!(
        "{} mod8={} score={:.3} sectors {}..={} blocks {}..={}",
        catalog.source(run.source).filename,
        run.mod8(),
        run.score,
        run.physical_start(),
        run.physical_end(),
        run.logical_start,
        run.logical_end
    );
    for triple in &run.triples {
        debug!(
            "  sector {} blocks {:?} {:?}",
            triple.disk_sector, triple.file_blocks, triple.evidence
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::index::{CandidatePolicy, CandidateSelector};
    use crate::evidence::image::RawImage;
    use crate::parsing::explained::read_records;
    use crate::parsing::identified::read_observations;
    use std::io::Cursor;

    /// Source 1 has blocks 0,1 at sectors 100,108 and blocks 3,4 at 124,132;
    /// block 2 (sector 116) is missing from the observations.
    const EXPLAINED: &str = concat!(
        "[\"b0\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 0}]]\n",
        "[\"b1\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 4096}]]\n",
        "[\"b3\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 12288}]]\n",
        "[\"b4\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 16384}]]\n",
        "[\"common\", {\"count\": 40, \"flags\": \"H\"}, [{\"source_id\": 2, \"file_offset\": 0}, {\"source_id\": 2, \"file_offset\": 4096}]]\n",
        "{\"source_id\": 1, \"filename\": \"/ref/one.bin\", \"filesize\": 32768}\n",
        "{\"source_id\": 2, \"filename\": \"/ref/common.bin\", \"filesize\": 8192}\n",
    );
    const IDENTIFIED: &str = "51200\tb0\t1\n55296\tb1\t1\n63488\tb3\t1\n67584\tb4\t1\n0\tcommon\t40H\n4096\tcommon\t40H\n";

    fn indices(policy: CandidatePolicy) -> (SourceCatalog, DiskIndex) {
        let candidates = CandidateSelector::new(policy)
            .select(read_records(Cursor::new(EXPLAINED)))
            .unwrap();
        let catalog = SourceCatalog::load(read_records(Cursor::new(EXPLAINED)), candidates).unwrap();
        let disk =
            DiskIndex::load_relevant(read_observations(Cursor::new(IDENTIFIED)), &catalog).unwrap();
        (catalog, disk)
    }

    #[test]
    fn test_without_image_runs_stay_separate() {
        let (catalog, disk) = indices(CandidatePolicy::default());
        let runs = RunEngine::new(&catalog, &disk).find_runs(None);
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_null_gap_merges_into_five_triples() {
        let (catalog, disk) = indices(CandidatePolicy::default());
        let mut image = RawImage::new(Cursor::new(vec![0u8; 200 * 512]));
        let runs = RunEngine::new(&catalog, &disk).find_runs(Some(&mut image));
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].len(), 5);
        assert_eq!((runs[0].logical_start, runs[0].logical_end), (0, 4));
    }

    #[test]
    fn test_merge_checked_before_min_run() {
        let (catalog, disk) = indices(CandidatePolicy::default());
        let config = RunConfig {
            min_run: 5,
            ..RunConfig::default()
        };
        let engine = RunEngine::with_config(&catalog, &disk, config);
        assert!(engine.find_runs(None).is_empty());

        let mut image = RawImage::new(Cursor::new(vec![0u8; 200 * 512]));
        assert_eq!(engine.find_runs(Some(&mut image)).len(), 1);
    }

    #[test]
    fn test_lone_block_past_null_gap_is_merged() {
        // Blocks 0,1 at sectors 100,108; block 2 unobserved; block 3 alone at 124
        let explained = concat!(
            "[\"b0\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 0}]]\n",
            "[\"b1\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 4096}]]\n",
            "[\"b3\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 12288}]]\n",
            "{\"source_id\": 1, \"filename\": \"/ref/one.bin\", \"filesize\": 32768}\n",
        );
        let identified = "51200\tb0\t1\n55296\tb1\t1\n63488\tb3\t1\n";
        let candidates = CandidateSelector::new(CandidatePolicy::default())
            .select(read_records(Cursor::new(explained)))
            .unwrap();
        let catalog = SourceCatalog::load(read_records(Cursor::new(explained)), candidates).unwrap();
        let disk =
            DiskIndex::load_relevant(read_observations(Cursor::new(identified)), &catalog).unwrap();
        let engine = RunEngine::new(&catalog, &disk);

        let unmerged = engine.find_runs(None);
        assert_eq!(unmerged.len(), 1);
        assert_eq!(unmerged[0].len(), 2);

        let mut image = RawImage::new(Cursor::new(vec![0u8; 200 * 512]));
        let merged = engine.find_runs(Some(&mut image));
        let summary: Vec<(u64, usize, u64, u64)> = merged
            .iter()
            .map(|r| (r.physical_start(), r.len(), r.logical_start, r.logical_end))
            .collect();
        assert_eq!(summary, vec![(100, 4, 0, 3)]);
        assert!((merged[0].score - 3.25).abs() < 1e-9);
    }

    #[test]
    fn test_common_only_source_yields_nothing() {
        let policy = CandidatePolicy {
            include_all: true,
            ..CandidatePolicy::default()
        };
        let (catalog, disk) = indices(policy);
        assert_eq!(catalog.candidates().len(), 2);
        let runs = RunEngine::new(&catalog, &disk).find_runs(None);
        assert!(runs.iter().all(|r| r.source.0 == 1));
    }
}
