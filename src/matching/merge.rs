use tracing::{debug, warn};

use crate::core::run::{Run, Triple};
use crate::core::types::SECTORS_PER_BLOCK;
use crate::evidence::image::{block_is_null, ImageError, ImageSource};

/// Joins runs separated only by zero-filled (unallocated) disk blocks
pub struct GapMerger<'a> {
    image: &'a mut dyn ImageSource,
    null_gap_weight: f64,
    max_gap_blocks: u64,
}

impl<'a> GapMerger<'a> {
    pub fn new(image: &'a mut dyn ImageSource, null_gap_weight: f64, max_gap_blocks: u64) -> Self {
        Self {
            image,
            null_gap_weight,
            max_gap_blocks,
        }
    }

    /// Merge the runs of one source wherever the gap between neighbours
    /// verifies as null.
    ///
    /// Runs are grouped by alignment class and processed in physical order; a
    /// merged run may absorb further runs. Output is ordered by class, then
    /// physical start.
    pub fn merge_runs(&mut self, mut runs: Vec<Run>) -> Vec<Run> {
        runs.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then_with(|| a.mod8().cmp(&b.mod8()))
                .then_with(|| a.physical_start().cmp(&b.physical_start()))
        });

        let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
        for run in runs {
            let Some(previous) = merged.last_mut() else {
                merged.push(run);
                continue;
            };
            match self.try_merge(previous, &run) {
                Some(combined) => *previous = combined,
                None => merged.push(run),
            }
        }
        merged
    }

    /// Combine `a` and the later run `b` if they tile one fragment and every
    /// block between them is zero-filled.
    pub fn try_merge(&mut self, a: &Run, b: &Run) -> Option<Run> {
        let gap_blocks = gap_between(a, b, self.max_gap_blocks)?;

        for k in 1..=gap_blocks {
            let sector = a.physical_end() + k * SECTORS_PER_BLOCK;
            match block_is_null(&mut *self.image, sector) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Gap block at sector {sector} is not null; runs stay separate");
                    return None;
                }
                Err(e) => {
                    log_read_failure(&e);
                    return None;
                }
            }
        }

        let mut triples = Vec::with_capacity(a.len() + b.len() + usize::try_from(gap_blocks).ok()?);
        triples.extend(a.triples.iter().cloned());
        triples.extend((1..=gap_blocks).map(|k| {
            Triple::null_gap(
                a.physical_end() + k * SECTORS_PER_BLOCK,
                a.logical_end + k,
            )
        }));
        triples.extend(b.triples.iter().cloned());

        #[allow(clippy::cast_precision_loss)]
        let gap_score = gap_blocks as f64 * self.null_gap_weight;

        debug!(
            "Merged runs at sectors {} and {} across {gap_blocks} null block(s)",
            a.physical_start(),
            b.physical_start()
        );

        Some(Run {
            source: a.source,
            triples,
            score: a.score + b.score + gap_score,
            logical_start: a.logical_start,
            logical_end: b.logical_end,
        })
    }
}

fn log_read_failure(e: &ImageError) {
    warn!("Gap verification read failed, runs stay separate: {e}");
}

/// Number of whole blocks strictly between `a` and `b` if the two runs tile a
/// single fragment, `None` otherwise.
///
/// Tiling requires the same source and alignment class, `b` to start after
/// `a` ends, the physical start delta to equal eight times the logical start
/// delta, and the gap to fill exactly the logical blocks between `a`'s end and
/// `b`'s start.
#[must_use]
pub fn gap_between(a: &Run, b: &Run, max_gap_blocks: u64) -> Option<u64> {
    if a.is_empty() || b.is_empty() || a.source != b.source || a.mod8() != b.mod8() {
        return None;
    }
    if b.physical_start() <= a.physical_end() || b.logical_start <= a.logical_start {
        return None;
    }

    let physical_delta = b.physical_start() - a.physical_start();
    let logical_delta = b.logical_start - a.logical_start;
    if logical_delta.checked_mul(SECTORS_PER_BLOCK)? != physical_delta {
        return None;
    }

    let gap_blocks = (b.physical_start() - a.physical_end()) / SECTORS_PER_BLOCK - 1;
    if a.logical_end.checked_add(gap_blocks + 1)? != b.logical_start {
        return None;
    }
    if gap_blocks > max_gap_blocks {
        return None;
    }
    Some(gap_blocks)
}
