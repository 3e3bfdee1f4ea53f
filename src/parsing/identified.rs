//! Parser for the disk-observation stream (`identified_blocks.txt`).
//!
//! Each line is `disk_offset<TAB>hash<TAB>meta`. The meta field is either a bare
//! count with trailing flag letters (`2`, `1H`, `14 W`) or a JSON object with
//! `count`/`flags` keys. Only the offset and hash are required; a meta field
//! that does not yield a count still records the observation.

use std::io::BufRead;

use crate::core::types::{FlagSet, HashDigest, SectorNumber, SECTOR_SIZE};
use crate::parsing::explained::HashMeta;
use crate::parsing::{ParseError, RecordReader};
use crate::utils::validation::split_count_annotation;

/// One sighting of a hash on the target image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub disk_offset: u64,
    pub hash: HashDigest,
    pub count: Option<u64>,
    pub flags: FlagSet,
}

impl Observation {
    #[must_use]
    pub fn sector(&self) -> SectorNumber {
        self.disk_offset / SECTOR_SIZE
    }
}

fn parse_meta(meta: &str) -> (Option<u64>, FlagSet) {
    let meta = meta.trim();
    if meta.starts_with('{') {
        return match serde_json::from_str::<HashMeta>(meta) {
            Ok(parsed) => {
                let flags = parsed.flag_set();
                (Some(parsed.count).filter(|c| *c > 0), flags)
            }
            Err(_) => (None, FlagSet::new()),
        };
    }
    split_count_annotation(meta)
}

/// Decode one observation line.
///
/// Blank lines and `#` comments yield `Ok(None)`.
///
/// # Errors
///
/// Returns `ParseError::InvalidRecord` on a wrong field count and
/// `ParseError::InvalidField` if the offset is not a plain integer (for
/// example a `1234-GZIP-56` forensic path).
pub fn parse_observation(line: &str) -> Result<Option<Observation>, ParseError> {
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != 3 {
        return Err(ParseError::InvalidRecord(format!(
            "expected 3 tab-separated fields, found {}",
            fields.len()
        )));
    }

    let disk_offset: u64 =
        fields[0]
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidField {
                field: "disk_offset",
                value: fields[0].to_string(),
            })?;

    let hash = fields[1].trim();
    if hash.is_empty() {
        return Err(ParseError::InvalidField {
            field: "hash",
            value: String::new(),
        });
    }

    let (count, flags) = parse_meta(fields[2]);

    Ok(Some(Observation {
        disk_offset,
        hash: HashDigest::new(hash),
        count,
        flags,
    }))
}

/// Stream the observations of `reader`, skipping malformed lines
pub fn read_observations<R: BufRead>(reader: R) -> RecordReader<R, Observation> {
    RecordReader::new(reader, parse_observation, "disk-observation stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_count() {
        let obs = parse_observation("51200\tabcd\t1").unwrap().unwrap();
        assert_eq!(obs.disk_offset, 51200);
        assert_eq!(obs.sector(), 100);
        assert_eq!(obs.hash.as_str(), "abcd");
        assert_eq!(obs.count, Some(1));
        assert!(obs.flags.is_empty());
    }

    #[test]
    fn test_parse_count_with_flags() {
        let obs = parse_observation("4096\tabcd\t14 HW").unwrap().unwrap();
        assert_eq!(obs.count, Some(14));
        assert!(obs.flags.contains('H'));
        assert!(obs.flags.contains('W'));
    }

    #[test]
    fn test_parse_json_meta() {
        let obs = parse_observation("0\tabcd\t{\"count\":3,\"flags\":\"R\"}")
            .unwrap()
            .unwrap();
        assert_eq!(obs.count, Some(3));
        assert!(obs.flags.contains('R'));
    }

    #[test]
    fn test_parse_unparsable_meta_keeps_observation() {
        let obs = parse_observation("512\tabcd\t???").unwrap().unwrap();
        assert_eq!(obs.sector(), 1);
        assert_eq!(obs.count, None);
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(parse_observation("# banner").unwrap().is_none());
        assert!(parse_observation("512\tabcd").is_err());
        assert!(parse_observation("512\tabcd\t1\textra").is_err());
        assert!(parse_observation("1024-GZIP-0\tabcd\t1").is_err());
        assert!(parse_observation("512\t\t1").is_err());
    }
}
