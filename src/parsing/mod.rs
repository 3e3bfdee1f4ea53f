//! Decoders for the two line-oriented input streams.
//!
//! - **Association stream** (`identified_blocks_explained.txt`): JSON lines that
//!   either describe a hash and the sources it occurs in, or describe a source
//!   file. See [`explained`].
//! - **Disk-observation stream** (`identified_blocks.txt`): tab-separated
//!   `disk_offset, hash, count[flags]` lines. See [`identified`].
//!
//! Both streams are forensic output and expected to contain noise: a line that
//! does not decode is counted and skipped, never fatal. Only I/O errors end a
//! read.
//!
//! Either file may be gzip-compressed; [`resolve_input`] picks up a `.gz`
//! sibling when the plain file is missing and [`open_input`] decompresses
//! transparently.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::{debug, warn};

pub mod explained;
pub mod identified;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid field '{field}': {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("Input not found: {0}")]
    NotFound(PathBuf),
}

/// Decode one line; `Ok(None)` for lines that carry nothing (blank, comments)
pub type LineDecoder<T> = fn(&str) -> Result<Option<T>, ParseError>;

/// Iterator over the decodable records of a line stream.
///
/// Undecodable lines are logged at debug level and counted; see [`skipped`](Self::skipped).
pub struct RecordReader<R, T> {
    reader: R,
    decode: LineDecoder<T>,
    label: &'static str,
    line: String,
    line_number: usize,
    skipped: usize,
}

impl<R: BufRead, T> RecordReader<R, T> {
    pub fn new(reader: R, decode: LineDecoder<T>, label: &'static str) -> Self {
        Self {
            reader,
            decode,
            label,
            line: String::new(),
            line_number: 0,
            skipped: 0,
        }
    }

    /// Number of lines skipped so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of lines read so far
    pub fn lines_read(&self) -> usize {
        self.line_number
    }

    /// Emit a single warning if any lines were skipped
    pub fn report_skipped(&self) {
        if self.skipped > 0 {
            warn!(
                "Skipped {} malformed line(s) of {} in {}",
                self.skipped, self.line_number, self.label
            );
        }
    }
}

impl<R: BufRead, T> Iterator for RecordReader<R, T> {
    type Item = Result<T, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    // Not UTF-8; the partial line is discarded with the rest
                    self.line_number += 1;
                    self.skipped += 1;
                    debug!("{} line {}: {e}", self.label, self.line_number);
                    continue;
                }
                Err(e) => return Some(Err(e.into())),
            }
            self.line_number += 1;

            match (self.decode)(self.line.trim_end_matches(['\n', '\r'])) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => {}
                Err(e) => {
                    self.skipped += 1;
                    debug!("{} line {}: {e}", self.label, self.line_number);
                }
            }
        }
    }
}

#[allow(clippy::case_sensitive_file_extension_comparisons)]
fn is_gzipped(path: &Path) -> bool {
    path.to_string_lossy().to_lowercase().ends_with(".gz")
}

/// Locate `name` in `dir`, falling back to `name.gz`
///
/// # Errors
///
/// Returns `ParseError::NotFound` if neither file exists.
pub fn resolve_input(dir: &Path, name: &str) -> Result<PathBuf, ParseError> {
    let plain = dir.join(name);
    if plain.exists() {
        return Ok(plain);
    }
    let gz = dir.join(format!("{name}.gz"));
    if gz.exists() {
        return Ok(gz);
    }
    Err(ParseError::NotFound(plain))
}

/// Open a possibly gzip-compressed input for buffered line reading
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be opened.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>, ParseError> {
    let file = File::open(path)?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
