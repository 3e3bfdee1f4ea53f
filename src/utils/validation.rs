//! Centralized validation and helper functions.

use std::path::Path;

use crate::core::types::FlagSet;

/// Private-use character hashdb places between path components of catalogue filenames
pub const FILENAME_DELIMITER: char = '\u{10001c}';

/// Remove hashdb delimiter characters from a catalogue filename.
///
/// # Examples
///
/// ```
/// use hash_runs::utils::validation::clean_target_filename;
///
/// assert_eq!(clean_target_filename("dir/\u{10001c}file.doc"), "dir/file.doc");
/// assert_eq!(clean_target_filename("plain.txt"), "plain.txt");
/// ```
#[must_use]
pub fn clean_target_filename(filename: &str) -> String {
    filename.replace(FILENAME_DELIMITER, "")
}

/// Split a `count[flags]` field into its numeric count and flag letters.
///
/// Letters and whitespace are stripped before the count is parsed. A count of
/// zero or an unparsable remainder yields `None`.
///
/// # Examples
///
/// ```
/// use hash_runs::utils::validation::split_count_annotation;
///
/// let (count, flags) = split_count_annotation("12 HW");
/// assert_eq!(count, Some(12));
/// assert!(flags.contains('W'));
/// ```
#[must_use]
pub fn split_count_annotation(field: &str) -> (Option<u64>, FlagSet) {
    let flags = FlagSet::parse(field);
    let digits: String = field
        .chars()
        .filter(|c| !c.is_ascii_alphabetic() && !c.is_whitespace())
        .collect();
    let count = digits.parse::<u64>().ok().filter(|c| *c > 0);
    (count, flags)
}

/// Size of `filename` on the local filesystem, or 0 if it cannot be found
#[must_use]
pub fn local_filesize(filename: &str) -> u64 {
    if filename.is_empty() {
        return 0;
    }
    std::fs::metadata(Path::new(filename))
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map_or(0, |m| m.len())
}
