use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::catalog::index::CandidateSet;
use crate::core::source::SourceFile;
use crate::core::types::{FileBlock, FlagSet, HashDigest, SourceId};
use crate::parsing::explained::{AssociationRecord, HashRecord, SourceRecord};
use crate::parsing::ParseError;
use crate::utils::validation::local_filesize;

/// In-memory indices over the hashes and sources relevant to the candidate set.
///
/// Built once by [`SourceCatalog::load`] and read-only afterwards.
#[derive(Debug, Default)]
pub struct SourceCatalog {
    candidates: CandidateSet,

    /// Hash -> global occurrence count
    hash_count: HashMap<HashDigest, u64>,

    /// Hash -> provenance flags
    hash_flags: HashMap<HashDigest, FlagSet>,

    /// Hash -> source -> logical blocks at which the hash occurs in that source
    hash_source_file_blocks: HashMap<HashDigest, HashMap<SourceId, BTreeSet<FileBlock>>>,

    /// Source -> hashes it contains
    hashes_for_source: HashMap<SourceId, BTreeSet<HashDigest>>,

    /// Source -> catalogue metadata
    sources: HashMap<SourceId, SourceFile>,

    /// Source -> sum of 1/count over its hash associations
    source_scores: HashMap<SourceId, f64>,
}

impl SourceCatalog {
    /// Create an empty catalog that will accept records for `candidates`
    pub fn new(candidates: CandidateSet) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    /// Second pass over the association stream: index every hash that touches
    /// a candidate source, and the metadata of every candidate source.
    ///
    /// # Errors
    ///
    /// Returns the first I/O error raised by the stream.
    pub fn load<I>(records: I, candidates: CandidateSet) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = Result<AssociationRecord, ParseError>>,
    {
        let mut catalog = Self::new(candidates);
        for record in records {
            catalog.add_record(record?);
        }
        info!(
            "Indexed {} hash(es) across {} candidate source(s)",
            catalog.hash_count.len(),
            catalog.candidates.len()
        );
        Ok(catalog)
    }

    pub fn add_record(&mut self, record: AssociationRecord) {
        match record {
            AssociationRecord::Hash(hash_record) => self.add_hash(hash_record),
            AssociationRecord::Source(source_record) => self.add_source(source_record),
        }
    }

    fn add_hash(&mut self, record: HashRecord) {
        if !record
            .sources
            .iter()
            .any(|s| self.candidates.contains(&s.source_id))
        {
            return;
        }
        if self.hash_count.contains_key(&record.hash) {
            debug!("Ignoring repeated record for hash {}", record.hash);
            return;
        }

        let count = record.meta.count;
        let mut per_source: HashMap<SourceId, BTreeSet<FileBlock>> = HashMap::new();
        for source in record
            .sources
            .iter()
            .filter(|s| self.candidates.contains(&s.source_id))
        {
            per_source
                .entry(source.source_id)
                .or_default()
                .insert(source.file_block());
            self.hashes_for_source
                .entry(source.source_id)
                .or_default()
                .insert(record.hash.clone());
            if count > 0 {
                #[allow(clippy::cast_precision_loss)]
                let weight = 1.0 / count as f64;
                *self.source_scores.entry(source.source_id).or_default() += weight;
            }
        }

        self.hash_flags
            .insert(record.hash.clone(), record.meta.flag_set());
        self.hash_source_file_blocks
            .insert(record.hash.clone(), per_source);
        self.hash_count.insert(record.hash, count);
    }

    fn add_source(&mut self, record: SourceRecord) {
        if !self.candidates.contains(&record.source_id) {
            return;
        }
        let filesize = record
            .filesize
            .unwrap_or_else(|| local_filesize(&record.filename));
        self.sources.insert(
            record.source_id,
            SourceFile::new(record.source_id, record.filename, filesize),
        );
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn contains_hash(&self, hash: &HashDigest) -> bool {
        self.hash_count.contains_key(hash)
    }

    pub fn hash_count(&self, hash: &HashDigest) -> Option<u64> {
        self.hash_count.get(hash).copied()
    }

    pub fn hash_flags(&self, hash: &HashDigest) -> Option<&FlagSet> {
        self.hash_flags.get(hash)
    }

    /// Logical blocks at which `hash` occurs in `source`
    pub fn file_blocks(&self, hash: &HashDigest, source: SourceId) -> Option<&BTreeSet<FileBlock>> {
        self.hash_source_file_blocks.get(hash)?.get(&source)
    }

    pub fn hashes_for_source(&self, source: SourceId) -> impl Iterator<Item = &HashDigest> {
        self.hashes_for_source.get(&source).into_iter().flatten()
    }

    /// Catalogue metadata, or a placeholder if the source was never described
    pub fn source(&self, source: SourceId) -> SourceFile {
        self.sources
            .get(&source)
            .cloned()
            .unwrap_or_else(|| SourceFile::unnamed(source))
    }

    /// Source-level aggregate score accumulated while loading
    pub fn source_score(&self, source: SourceId) -> f64 {
        self.source_scores.get(&source).copied().unwrap_or_default()
    }

    /// Candidate sources ordered by descending aggregate score, then filename, then id
    pub fn ranked_sources(&self) -> Vec<SourceId> {
        let mut ranked: Vec<(f64, String, SourceId)> = self
            .candidates
            .iter()
            .map(|&id| (self.source_score(id), self.source(id).filename, id))
            .collect();
        ranked.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.cmp(&b.2))
        });
        ranked.into_iter().map(|(_, _, id)| id).collect()
    }
}
