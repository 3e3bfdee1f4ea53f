use serde::{Deserialize, Serialize};

use crate::core::types::{total_blocks, SourceId};

/// A reference file from the known-file catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub id: SourceId,

    /// Catalogue filename with delimiter characters removed
    pub filename: String,

    /// Size in bytes; 0 when neither the catalogue nor the local filesystem knows it
    pub filesize: u64,
}

impl SourceFile {
    pub fn new(id: SourceId, filename: impl Into<String>, filesize: u64) -> Self {
        Self {
            id,
            filename: filename.into(),
            filesize,
        }
    }

    /// Placeholder for a source referenced by hash records but never described
    #[must_use]
    pub fn unnamed(id: SourceId) -> Self {
        Self::new(id, format!("source-{id}"), 0)
    }

    #[must_use]
    pub fn total_blocks(&self) -> u64 {
        total_blocks(self.filesize)
    }

    /// Percentage of the file covered by `found_blocks`, capped at 100.
    ///
    /// Returns `None` when the size is unknown.
    #[must_use]
    pub fn percent_complete(&self, found_blocks: u64) -> Option<f64> {
        let total = self.total_blocks();
        if total == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let pct = found_blocks as f64 * 100.0 / total as f64;
        Some(pct.min(100.0))
    }
}
