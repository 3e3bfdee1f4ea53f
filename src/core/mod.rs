//! Core data types for block-level hash correlation.
//!
//! - [`HashDigest`], [`SourceId`], [`FlagSet`]: identifiers and provenance markers
//! - [`SourceFile`]: a file from the known-file catalogue
//! - [`Triple`], [`Run`]: matched disk locations and the aligned runs built from them
//!
//! ## Geometry
//!
//! The target image is addressed in 512-byte sectors, source files in
//! 4096-byte blocks. One block spans eight sectors, so sectors that belong to
//! one contiguous fragment of a file all share the same `sector % 8` value
//! (the *mod8 alignment class*).
//!
//! | Unit   | Size | Number                      |
//! |--------|------|-----------------------------|
//! | Sector | 512  | `disk_offset / 512`         |
//! | Block  | 4096 | `file_offset / 4096`        |

pub mod run;
pub mod source;
pub mod types;
