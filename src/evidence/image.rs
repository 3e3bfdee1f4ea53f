use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{SectorNumber, BLOCK_SIZE, SECTOR_SIZE};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to open image {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read {len} bytes at offset {offset}: {source}")]
    Read {
        offset: u64,
        len: usize,
        source: std::io::Error,
    },
}

/// Random access to the bytes of the original disk image
pub trait ImageSource {
    /// Read exactly `len` bytes starting at `offset`
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Read` if the range cannot be read in full.
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, ImageError>;
}

/// A raw (`dd`-style) image read through any seekable reader
pub struct RawImage<R> {
    inner: R,
}

impl RawImage<File> {
    /// Open a raw image file
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Open` if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, ImageError> {
        let inner = File::open(path).map_err(|source| ImageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { inner })
    }
}

impl<R: Read + Seek> RawImage<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read + Seek> ImageSource for RawImage<R> {
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>, ImageError> {
        let wrap = |source| ImageError::Read {
            offset,
            len,
            source,
        };
        self.inner.seek(SeekFrom::Start(offset)).map_err(wrap)?;
        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).map_err(wrap)?;
        Ok(buf)
    }
}

#[must_use]
pub fn is_all_null(buf: &[u8]) -> bool {
    buf.iter().all(|&b| b == 0)
}

/// Is the 4096-byte block starting at `sector` entirely zero bytes?
///
/// # Errors
///
/// Propagates read errors, including reads past the end of the image.
pub fn block_is_null<S: ImageSource + ?Sized>(
    image: &mut S,
    sector: SectorNumber,
) -> Result<bool, ImageError> {
    #[allow(clippy::cast_possible_truncation)]
    let buf = image.read_at(sector * SECTOR_SIZE, BLOCK_SIZE as usize)?;
    Ok(is_all_null(&buf))
}
