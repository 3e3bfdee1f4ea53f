use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::types::{FileBlock, SectorNumber, SourceId, SECTORS_PER_BLOCK};

/// What placed a triple into a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Evidence {
    /// A matched sector hash with its global occurrence count (always >= 1)
    Hash { count: u64 },
    /// A zero-filled gap block verified against the raw image
    NullGap,
}

/// One matched disk location: `(disk_sector, file_block_set, hash_global_count)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Triple {
    pub disk_sector: SectorNumber,
    pub file_blocks: BTreeSet<FileBlock>,
    pub evidence: Evidence,
}

impl Triple {
    pub fn hashed(
        disk_sector: SectorNumber,
        file_blocks: impl IntoIterator<Item = FileBlock>,
        count: u64,
    ) -> Self {
        Self {
            disk_sector,
            file_blocks: file_blocks.into_iter().collect(),
            evidence: Evidence::Hash { count },
        }
    }

    #[must_use]
    pub fn null_gap(disk_sector: SectorNumber, file_block: FileBlock) -> Self {
        Self {
            disk_sector,
            file_blocks: BTreeSet::from([file_block]),
            evidence: Evidence::NullGap,
        }
    }

    /// Global count of the matched hash, `None` for gap blocks
    #[must_use]
    pub fn count(&self) -> Option<u64> {
        match self.evidence {
            Evidence::Hash { count } => Some(count),
            Evidence::NullGap => None,
        }
    }

    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.count() == Some(1)
    }

    /// Contribution of this triple to a run score
    #[must_use]
    pub fn weight(&self, null_gap_weight: f64) -> f64 {
        match self.evidence {
            Evidence::Hash { count: 0 } => 0.0,
            #[allow(clippy::cast_precision_loss)]
            Evidence::Hash { count } => 1.0 / count as f64,
            Evidence::NullGap => null_gap_weight,
        }
    }

    #[must_use]
    pub fn mod8(&self) -> u8 {
        #[allow(clippy::cast_possible_truncation)]
        let class = (self.disk_sector % SECTORS_PER_BLOCK) as u8;
        class
    }
}

/// True if some block in `later` is exactly one past some block in `earlier`
#[must_use]
pub fn exists_a_larger(earlier: &BTreeSet<FileBlock>, later: &BTreeSet<FileBlock>) -> bool {
    earlier.iter().any(|f| later.contains(&(f + 1)))
}

/// An aligned sequence of matched sectors believed to be one fragment of a source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Run {
    pub source: SourceId,
    pub triples: Vec<Triple>,
    pub score: f64,
    pub logical_start: FileBlock,
    pub logical_end: FileBlock,
}

impl Run {
    /// Build a run from triples already known to be aligned and consecutive.
    ///
    /// The logical start is the lowest block of the first triple that steps into
    /// the second; the logical end is the lowest block of the last triple that
    /// is stepped into from the one before it.
    ///
    /// # Panics
    ///
    /// Panics if `triples` is empty.
    #[must_use]
    pub fn new(source: SourceId, triples: Vec<Triple>, null_gap_weight: f64) -> Self {
        assert!(!triples.is_empty(), "a run needs at least one triple");

        let n = triples.len();
        let first = &triples[0].file_blocks;
        let last = &triples[n - 1].file_blocks;
        let (logical_start, logical_end) = if n == 1 {
            let only = first.iter().next().copied().unwrap_or_default();
            (only, only)
        } else {
            let second = &triples[1].file_blocks;
            let penultimate = &triples[n - 2].file_blocks;
            let start = first
                .iter()
                .copied()
                .find(|f| second.contains(&(f + 1)))
                .or_else(|| first.iter().next().copied())
                .unwrap_or_default();
            let end = last
                .iter()
                .copied()
                .find(|f| *f > 0 && penultimate.contains(&(f - 1)))
                .or_else(|| last.iter().next().copied())
                .unwrap_or_default();
            (start, end)
        };

        let score = triples.iter().map(|t| t.weight(null_gap_weight)).sum();

        Self {
            source,
            triples,
            score,
            logical_start,
            logical_end,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    #[must_use]
    pub fn physical_start(&self) -> SectorNumber {
        self.triples.first().map_or(0, |t| t.disk_sector)
    }

    #[must_use]
    pub fn physical_end(&self) -> SectorNumber {
        self.triples.last().map_or(0, |t| t.disk_sector)
    }

    #[must_use]
    pub fn mod8(&self) -> u8 {
        self.triples.first().map_or(0, Triple::mod8)
    }

    #[must_use]
    pub fn has_singleton(&self) -> bool {
        self.triples.iter().any(Triple::is_singleton)
    }

    /// Lowest hash count in the run, ignoring gap blocks
    #[must_use]
    pub fn min_count(&self) -> Option<u64> {
        self.triples.iter().filter_map(Triple::count).min()
    }

    /// Number of gap blocks absorbed by merging
    #[must_use]
    pub fn null_gap_blocks(&self) -> usize {
        self.triples
            .iter()
            .filter(|t| t.evidence == Evidence::NullGap)
            .count()
    }
}
