//! Parser for the association stream (`identified_blocks_explained.txt`).
//!
//! Two record shapes are interleaved:
//!
//! ```text
//! ["<hash>", {"count": 2, "flags": "H"}, [{"source_id": 1, "file_offset": 8192}, ...]]
//! {"source_id": 1, "filename": "/corpus/a.jpg", "filesize": 32768}
//! ```
//!
//! They are decoded once, here, into [`AssociationRecord`].

use std::io::BufRead;

use serde::Deserialize;

use crate::core::types::{FileBlock, FlagSet, HashDigest, SourceId, BLOCK_SIZE};
use crate::parsing::{ParseError, RecordReader};
use crate::utils::validation::clean_target_filename;

/// Occurrence metadata attached to a hash record
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HashMeta {
    /// Global occurrence count; 0 when absent, which disqualifies the hash
    #[serde(default)]
    pub count: u64,

    #[serde(default)]
    pub flags: Option<String>,
}

impl HashMeta {
    #[must_use]
    pub fn flag_set(&self) -> FlagSet {
        self.flags.as_deref().map(FlagSet::parse).unwrap_or_default()
    }
}

/// One `{source_id, file_offset}` entry of a hash record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SourceOffset {
    pub source_id: SourceId,
    pub file_offset: u64,
}

impl SourceOffset {
    #[must_use]
    pub fn file_block(&self) -> FileBlock {
        self.file_offset / BLOCK_SIZE
    }
}

/// A hash together with every source position it occurs at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRecord {
    pub hash: HashDigest,
    pub meta: HashMeta,
    pub sources: Vec<SourceOffset>,
}

/// Catalogue metadata for one source file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceRecord {
    pub source_id: SourceId,
    pub filename: String,
    #[serde(default)]
    pub filesize: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationRecord {
    Hash(HashRecord),
    Source(SourceRecord),
}

/// Decode one line of the association stream.
///
/// Blank lines and `#` comments yield `Ok(None)`.
///
/// # Errors
///
/// Returns `ParseError::InvalidRecord` if the line is neither record shape.
pub fn parse_record(line: &str) -> Result<Option<AssociationRecord>, ParseError> {
    let line = line.trim();
    match line.as_bytes().first() {
        None | Some(b'#') => Ok(None),
        Some(b'[') => {
            let (hash, meta, sources): (HashDigest, HashMeta, Vec<SourceOffset>) =
                serde_json::from_str(line)
                    .map_err(|e| ParseError::InvalidRecord(format!("hash record: {e}")))?;
            Ok(Some(AssociationRecord::Hash(HashRecord {
                hash,
                meta,
                sources,
            })))
        }
        Some(b'{') => {
            let mut record: SourceRecord = serde_json::from_str(line)
                .map_err(|e| ParseError::InvalidRecord(format!("source record: {e}")))?;
            record.filename = clean_target_filename(&record.filename);
            Ok(Some(AssociationRecord::Source(record)))
        }
        Some(_) => Err(ParseError::InvalidRecord(format!(
            "unrecognized record start: {}",
            line.chars().take(16).collect::<String>()
        ))),
    }
}

/// Stream the association records of `reader`, skipping malformed lines
pub fn read_records<R: BufRead>(reader: R) -> RecordReader<R, AssociationRecord> {
    RecordReader::new(reader, parse_record, "association stream")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_hash_record() {
        let line = r#"["a1b2", {"count": 2, "flags": "H"}, [{"source_id": 5, "file_offset": 8192}, {"source_id": 6, "file_offset": 0}]]"#;
        let Some(AssociationRecord::Hash(record)) = parse_record(line).unwrap() else {
            panic!("expected hash record");
        };
        assert_eq!(record.hash.as_str(), "a1b2");
        assert_eq!(record.meta.count, 2);
        assert!(record.meta.flag_set().contains('H'));
        assert_eq!(record.sources.len(), 2);
        assert_eq!(record.sources[0].source_id, SourceId(5));
        assert_eq!(record.sources[0].file_block(), 2);
    }

    #[test]
    fn test_parse_hash_record_without_flags_or_count() {
        let line = r#"["ff", {}, []]"#;
        let Some(AssociationRecord::Hash(record)) = parse_record(line).unwrap() else {
            panic!("expected hash record");
        };
        assert_eq!(record.meta.count, 0);
        assert!(record.meta.flag_set().is_empty());
    }

    #[test]
    fn test_parse_source_record() {
        let line = "{\"source_id\": 3, \"filename\": \"/corpus/\u{10001c}a.jpg\"}";
        let Some(AssociationRecord::Source(record)) = parse_record(line).unwrap() else {
            panic!("expected source record");
        };
        assert_eq!(record.source_id, SourceId(3));
        assert_eq!(record.filename, "/corpus/a.jpg");
        assert_eq!(record.filesize, None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_record("# hashdb explain").unwrap().is_none());
        assert!(parse_record("   ").unwrap().is_none());
        assert!(parse_record("[\"truncated\", {").is_err());
        assert!(parse_record("hello").is_err());
        assert!(parse_record(r#"{"filename": "no id"}"#).is_err());
    }

    #[test]
    fn test_read_records_skips_malformed() {
        let text = concat!(
            "# command: hashdb explain_identified_blocks\n",
            "[\"aa\", {\"count\": 1}, [{\"source_id\": 1, \"file_offset\": 0}]]\n",
            "[\"bb\", {\"count\": 1}, [{\"source_id\": 1\n",
            "{\"source_id\": 1, \"filename\": \"x\", \"filesize\": 10}\n",
        );
        let mut reader = read_records(Cursor::new(text));
        let records: Vec<_> = reader.by_ref().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(reader.skipped(), 1);
    }
}
