use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::catalog::store::SourceCatalog;
use crate::core::types::{HashDigest, SectorNumber};
use crate::parsing::identified::Observation;
use crate::parsing::ParseError;

/// Hash -> every disk sector on the target image where that hash was seen
#[derive(Debug, Default)]
pub struct DiskIndex {
    hash_disk_sectors: HashMap<HashDigest, BTreeSet<SectorNumber>>,
    observations: usize,
    disagreements: usize,
}

impl DiskIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every observation of the stream
    ///
    /// # Errors
    ///
    /// Returns the first I/O error raised by the stream.
    pub fn load<I>(observations: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = Result<Observation, ParseError>>,
    {
        Self::load_filtered(observations, |_| true)
    }

    /// Index only observations of hashes the catalog knows about.
    ///
    /// The association stream's count is the one used for scoring; an
    /// observation whose own count or flags differ is still indexed and
    /// tallied in [`disagreements`](Self::disagreements).
    ///
    /// # Errors
    ///
    /// Returns the first I/O error raised by the stream.
    pub fn load_relevant<I>(observations: I, catalog: &SourceCatalog) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = Result<Observation, ParseError>>,
    {
        let mut disagreements = 0usize;
        let mut index = Self::load_filtered(observations, |observation| {
            if !catalog.contains_hash(&observation.hash) {
                return false;
            }
            if !agrees_with_catalog(observation, catalog) {
                disagreements += 1;
            }
            true
        })?;
        if disagreements > 0 {
            info!(
                "{disagreements} observation(s) disagree with the association stream on count or flags"
            );
        }
        index.disagreements = disagreements;
        Ok(index)
    }

    fn load_filtered<I, F>(observations: I, mut keep: F) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = Result<Observation, ParseError>>,
        F: FnMut(&Observation) -> bool,
    {
        let mut index = Self::new();
        for observation in observations {
            let observation = observation?;
            if keep(&observation) {
                index.insert(&observation);
            }
        }
        info!(
            "Indexed {} observation(s) of {} distinct hash(es)",
            index.observations,
            index.hash_disk_sectors.len()
        );
        Ok(index)
    }

    pub fn insert(&mut self, observation: &Observation) {
        let inserted = self
            .hash_disk_sectors
            .entry(observation.hash.clone())
            .or_default()
            .insert(observation.sector());
        if inserted {
            self.observations += 1;
        }
    }

    /// Sectors where `hash` was seen, empty if never
    pub fn sectors(&self, hash: &HashDigest) -> impl Iterator<Item = SectorNumber> + '_ {
        self.hash_disk_sectors
            .get(hash)
            .into_iter()
            .flatten()
            .copied()
    }

    /// Number of distinct (hash, sector) pairs
    pub fn len(&self) -> usize {
        self.observations
    }

    pub fn is_empty(&self) -> bool {
        self.observations == 0
    }

    /// Observations whose count or flags differ from the association stream
    pub fn disagreements(&self) -> usize {
        self.disagreements
    }
}

fn agrees_with_catalog(observation: &Observation, catalog: &SourceCatalog) -> bool {
    let known_count = catalog.hash_count(&observation.hash);
    let known_flags = catalog.hash_flags(&observation.hash);
    let count_agrees = match (observation.count, known_count) {
        (Some(seen), Some(known)) => seen == known,
        _ => true,
    };
    let flags_agree = observation.flags.is_empty()
        || known_flags.map_or(true, |known| *known == observation.flags);

    if !(count_agrees && flags_agree) {
        debug!(
            "Hash {} at sector {}: observed count {:?} flags '{}', catalog count {:?} flags '{}'",
            observation.hash,
            observation.sector(),
            observation.count,
            observation.flags,
            known_count,
            known_flags.map(ToString::to_string).unwrap_or_default()
        );
    }
    count_agrees && flags_agree
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::identified::read_observations;
    use std::io::Cursor;

    #[test]
    fn test_load_groups_sectors_by_hash() {
        let text = "51200\taa\t1\n55296\taa\t1\n51200\taa\t1\n4096\tbb\t2H\nbad line\n";
        let index = DiskIndex::load(read_observations(Cursor::new(text))).unwrap();
        assert_eq!(
            index.sectors(&HashDigest::new("aa")).collect::<Vec<_>>(),
            vec![100, 108]
        );
        assert_eq!(
            index.sectors(&HashDigest::new("bb")).collect::<Vec<_>>(),
            vec![8]
        );
        assert_eq!(index.sectors(&HashDigest::new("cc")).count(), 0);
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
    }

    #[test]
    fn test_load_relevant_filters_and_tallies_disagreements() {
        use crate::catalog::index::CandidateSet;
        use crate::core::types::SourceId;
        use crate::parsing::explained::read_records;

        let explained = concat!(
            "[\"aa\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 0}]]\n",
            "[\"bb\", {\"count\": 3, \"flags\": \"H\"}, [{\"source_id\": 1, \"file_offset\": 4096}]]\n",
        );
        let catalog = SourceCatalog::load(
            read_records(Cursor::new(explained)),
            CandidateSet::from([SourceId(1)]),
        )
        .unwrap();

        // aa agrees; bb's count differs; second bb's flags differ; cc is unknown
        let text = "0\taa\t1\n4096\tbb\t2H\n8192\tbb\t3W\n12288\tbb\t3H\n16384\tcc\t1\n";
        let index = DiskIndex::load_relevant(read_observations(Cursor::new(text)), &catalog).unwrap();
        assert_eq!(index.len(), 4);
        assert_eq!(index.sectors(&HashDigest::new("cc")).count(), 0);
        assert_eq!(index.disagreements(), 2);
    }

    #[test]
    fn test_sub_sector_offsets_truncate() {
        let text = "513\taa\t1\n1023\taa\t1\n";
        let index = DiskIndex::load(read_observations(Cursor::new(text))).unwrap();
        assert_eq!(
            index.sectors(&HashDigest::new("aa")).collect::<Vec<_>>(),
            vec![1]
        );
    }
}
