use std::path::Path;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::Serialize;
use thiserror::Error;

use crate::core::types::{SectorNumber, SECTOR_SIZE};

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("SQLite error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Layout database not found: {0}")]
    NotFound(String),
}

/// The allocated file occupying a physical location, as far as it is known
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocatedFile {
    pub name: Option<String>,
    pub size: Option<u64>,
}

/// Filesystem metadata keyed by physical byte offset
pub trait LayoutLookup {
    /// The allocated file whose extent contains `sector`, if any
    ///
    /// # Errors
    ///
    /// Returns a `LayoutError` if the backing store cannot be queried.
    fn file_at(&self, sector: SectorNumber) -> Result<Option<AllocatedFile>, LayoutError>;
}

/// A Sleuth Kit `tsk_loaddb` database opened read-only
#[derive(Debug)]
pub struct TskDatabase {
    conn: Connection,
}

impl TskDatabase {
    /// Open an existing database without modifying it.
    ///
    /// # Errors
    ///
    /// Returns `LayoutError::NotFound` if the file does not exist, or
    /// `LayoutError::Sql` if SQLite cannot open it.
    pub fn open(path: &Path) -> Result<Self, LayoutError> {
        if !path.is_file() {
            return Err(LayoutError::NotFound(path.display().to_string()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Wrap an already open connection
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }
}

impl LayoutLookup for TskDatabase {
    fn file_at(&self, sector: SectorNumber) -> Result<Option<AllocatedFile>, LayoutError> {
        let byte_start = i64::try_from(sector * SECTOR_SIZE).unwrap_or(i64::MAX);

        // Layout extents are relative to their filesystem; img_offset places
        // the filesystem within the image.
        let mut stmt = self.conn.prepare_cached(
            r"
            SELECT B.parent_path || B.name, B.size
            FROM tsk_file_layout AS A
            JOIN tsk_files AS B ON A.obj_id = B.obj_id
            JOIN tsk_fs_info AS C ON B.fs_obj_id = C.obj_id
            WHERE A.byte_start + C.img_offset <= ?1
              AND A.byte_start + C.img_offset + A.byte_len > ?1
            LIMIT 1
            ",
        )?;
        let row = stmt
            .query_row(params![byte_start], |row| {
                Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<i64>>(1)?))
            })
            .optional()?;

        Ok(row.map(|(name, size)| {
            let name = name.filter(|n| !n.is_empty());
            let size = if name.is_some() {
                size.and_then(|s| u64::try_from(s).ok())
            } else {
                None
            };
            AllocatedFile { name, size }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> TskDatabase {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r"
            CREATE TABLE tsk_fs_info (obj_id INTEGER PRIMARY KEY, img_offset INTEGER);
            CREATE TABLE tsk_files (obj_id INTEGER PRIMARY KEY, fs_obj_id INTEGER,
                                    parent_path TEXT, name TEXT, size INTEGER);
            CREATE TABLE tsk_file_layout (obj_id INTEGER, byte_start INTEGER, byte_len INTEGER);

            INSERT INTO tsk_fs_info VALUES (1, 32256);
            INSERT INTO tsk_files VALUES (10, 1, '/docs/', 'report.doc', 20000);
            INSERT INTO tsk_files VALUES (11, 1, NULL, NULL, 4096);
            INSERT INTO tsk_file_layout VALUES (10, 0, 8192);
            INSERT INTO tsk_file_layout VALUES (10, 16384, 4096);
            INSERT INTO tsk_file_layout VALUES (11, 40960, 4096);
            ",
        )
        .unwrap();
        TskDatabase::from_connection(conn)
    }

    #[test]
    fn test_file_at_accounts_for_image_offset() {
        let db = sample_db();
        // img_offset 32256 is sector 63
        let hit = db.file_at(63).unwrap().unwrap();
        assert_eq!(hit.name.as_deref(), Some("/docs/report.doc"));
        assert_eq!(hit.size, Some(20000));

        // Second extent: 32256 + 16384 = 48640 -> sector 95
        assert!(db.file_at(95).unwrap().is_some());

        // Between extents
        assert!(db.file_at(63 + 16).unwrap().is_none());
        assert!(db.file_at(0).unwrap().is_none());
    }

    #[test]
    fn test_nameless_file_has_no_size() {
        let db = sample_db();
        // 32256 + 40960 = 73216 -> sector 143
        let hit = db.file_at(143).unwrap().unwrap();
        assert_eq!(hit, AllocatedFile::default());
    }

    #[test]
    fn test_open_missing_database() {
        assert!(matches!(
            TskDatabase::open(Path::new("/no/such/tsk_db.sqlite3")),
            Err(LayoutError::NotFound(_))
        ));
    }
}
