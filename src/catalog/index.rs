use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::core::types::SourceId;
use crate::parsing::explained::{AssociationRecord, HashMeta};
use crate::parsing::ParseError;

/// Default highest global count a hash may have and still qualify a source
pub const DEFAULT_CANDIDATE_MAX_COUNT: u64 = 1;

/// Sources worth correlating against the image
pub type CandidateSet = BTreeSet<SourceId>;

/// Which hashes are distinctive enough to make their sources candidates
#[derive(Debug, Clone, Serialize)]
pub struct CandidatePolicy {
    /// Every source touched by any hash is a candidate
    pub include_all: bool,

    /// Highest global count a qualifying hash may have
    pub max_count: u64,

    /// Let flagged hashes qualify sources too
    pub allow_flagged: bool,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self {
            include_all: false,
            max_count: DEFAULT_CANDIDATE_MAX_COUNT,
            allow_flagged: false,
        }
    }
}

impl CandidatePolicy {
    /// Does a hash with this metadata qualify the sources it occurs in?
    #[must_use]
    pub fn qualifies(&self, meta: &HashMeta) -> bool {
        if self.include_all {
            return true;
        }
        if meta.count == 0 || meta.count > self.max_count {
            return false;
        }
        self.allow_flagged || meta.flag_set().is_empty()
    }
}

/// First pass over the association stream: decides which sources to load
pub struct CandidateSelector {
    policy: CandidatePolicy,
}

impl CandidateSelector {
    pub fn new(policy: CandidatePolicy) -> Self {
        Self { policy }
    }

    /// Collect the candidate sources from a record stream.
    ///
    /// Source records are ignored in this pass.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error raised by the stream.
    pub fn select<I>(&self, records: I) -> Result<CandidateSet, ParseError>
    where
        I: IntoIterator<Item = Result<AssociationRecord, ParseError>>,
    {
        let mut candidates = CandidateSet::new();
        let mut qualifying_hashes = 0usize;

        for record in records {
            let AssociationRecord::Hash(hash_record) = record? else {
                continue;
            };
            if !self.policy.qualifies(&hash_record.meta) {
                continue;
            }
            qualifying_hashes += 1;
            for source in &hash_record.sources {
                if candidates.insert(source.source_id) {
                    debug!(
                        "Source {} qualified by hash {}",
                        source.source_id, hash_record.hash
                    );
                }
            }
        }

        info!(
            "Selected {} candidate source(s) from {} qualifying hash(es)",
            candidates.len(),
            qualifying_hashes
        );
        Ok(candidates)
    }
}
