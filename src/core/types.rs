use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Size of one physical disk sector in bytes
pub const SECTOR_SIZE: u64 = 512;

/// Size of one logical file block in bytes
pub const BLOCK_SIZE: u64 = 4096;

/// Number of sectors spanned by one file block
pub const SECTORS_PER_BLOCK: u64 = BLOCK_SIZE / SECTOR_SIZE;

/// Physical sector number on the target image (`disk_offset / SECTOR_SIZE`)
pub type SectorNumber = u64;

/// Logical block number within a source file (`file_offset / BLOCK_SIZE`)
pub type FileBlock = u64;

/// A content digest, kept in the textual form it appears in the input streams
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashDigest(pub String);

impl HashDigest {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HashDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a file in the known-file catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub u64);

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provenance markers attached to a hash (e.g. `H`, `W`, `R`).
///
/// Flags are single ASCII letters. Anything else in an annotation string
/// (whitespace, punctuation) is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FlagSet(BTreeSet<char>);

impl FlagSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every ASCII letter of `annotation` as a flag
    #[must_use]
    pub fn parse(annotation: &str) -> Self {
        Self(
            annotation
                .chars()
                .filter(char::is_ascii_alphabetic)
                .collect(),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, flag: char) -> bool {
        self.0.contains(&flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = char> + '_ {
        self.0.iter().copied()
    }
}

impl std::fmt::Display for FlagSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for flag in self.iter() {
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

/// Number of file blocks needed to hold `filesize` bytes
#[must_use]
pub fn total_blocks(filesize: u64) -> u64 {
    filesize.div_ceil(BLOCK_SIZE)
}
