use tracing::{debug, warn};

use crate::catalog::disk::DiskIndex;
use crate::catalog::store::SourceCatalog;
use crate::core::run::{exists_a_larger, Run, Triple};
use crate::core::types::{SourceId, SECTORS_PER_BLOCK};
use crate::matching::engine::RunConfig;

/// Number of sector-to-block alignment classes
pub const ALIGNMENT_CLASSES: usize = 8;

/// Triples of one source, bucketed by `disk_sector % 8` and sorted by sector
pub type AlignedTriples = [Vec<Triple>; ALIGNMENT_CLASSES];

/// Reconstructs aligned runs of matching sectors for candidate sources
pub struct RunDetector<'a> {
    catalog: &'a SourceCatalog,
    disk: &'a DiskIndex,
    config: &'a RunConfig,
}

impl<'a> RunDetector<'a> {
    pub fn new(catalog: &'a SourceCatalog, disk: &'a DiskIndex, config: &'a RunConfig) -> Self {
        Self {
            catalog,
            disk,
            config,
        }
    }

    /// Cross-reference a source's hashes against the disk index.
    ///
    /// Hashes whose global count is missing or zero cannot be scored and are
    /// left out.
    pub fn gather(&self, source: SourceId) -> AlignedTriples {
        let mut buckets: AlignedTriples = Default::default();
        let mut rejected = 0usize;

        for hash in self.catalog.hashes_for_source(source) {
            let Some(file_blocks) = self.catalog.file_blocks(hash, source) else {
                continue;
            };
            let count = self.catalog.hash_count(hash).unwrap_or(0);
            for sector in self.disk.sectors(hash) {
                if count == 0 {
                    rejected += 1;
                    debug!("Hash {hash} at sector {sector} has no global count");
                    continue;
                }
                let triple = Triple::hashed(sector, file_blocks.iter().copied(), count);
                buckets[usize::from(triple.mod8())].push(triple);
            }
        }

        if rejected > 0 {
            warn!(
                "Rejected {rejected} observation(s) for source {source} with zero global count"
            );
        }

        for bucket in &mut buckets {
            bucket.sort_by(|a, b| {
                a.disk_sector
                    .cmp(&b.disk_sector)
                    .then_with(|| a.file_blocks.cmp(&b.file_blocks))
                    .then_with(|| a.count().cmp(&b.count()))
            });
        }
        buckets
    }

    /// Every maximal segment of consecutive triples, before any retention rule.
    ///
    /// Lone triples are included so the gap merger can join them to a
    /// neighbouring run; [`retain_run`] drops any that stay alone.
    pub fn candidate_runs(&self, source: SourceId) -> Vec<Run> {
        self.gather(source)
            .iter()
            .flat_map(|bucket| split_runs(source, bucket, self.config.null_gap_weight))
            .collect()
    }

    /// Runs of `source` that pass the retention rules
    pub fn detect(&self, source: SourceId) -> Vec<Run> {
        self.candidate_runs(source)
            .into_iter()
            .filter(|run| retain_run(run, self.config))
            .collect()
    }
}

/// Can `next` extend a run currently ending at `last`?
#[must_use]
pub fn extends(last: &Triple, next: &Triple) -> bool {
    last.disk_sector + SECTORS_PER_BLOCK == next.disk_sector
        && exists_a_larger(&last.file_blocks, &next.file_blocks)
}

/// Greedily cut a sorted single-class bucket into maximal runs.
///
/// A triple that extends neither neighbour becomes a run of its own.
#[must_use]
pub fn split_runs(source: SourceId, bucket: &[Triple], null_gap_weight: f64) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut current: Vec<Triple> = Vec::new();

    for triple in bucket {
        if let Some(last) = current.last() {
            if !extends(last, triple) {
                let closed = std::mem::take(&mut current);
                runs.push(Run::new(source, closed, null_gap_weight));
            }
        }
        current.push(triple.clone());
    }
    if !current.is_empty() {
        runs.push(Run::new(source, current, null_gap_weight));
    }
    runs
}

/// Retention rules for a finished (possibly merged) run:
/// - at least `min_run` triples
/// - at least one globally unique hash
/// - at least one hash with count at or below `max_count`
#[must_use]
pub fn retain_run(run: &Run, config: &RunConfig) -> bool {
    run.len() >= config.min_run.max(2)
        && run.has_singleton()
        && run.min_count().is_some_and(|c| c <= config.max_count)
}
