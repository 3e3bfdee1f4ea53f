//! # hash-runs
//!
//! A library for finding fragments of known files on a disk image from
//! sector hashes.
//!
//! A hash scanner such as bulk_extractor reports, for every 512-byte sector of
//! an image, the hash of the 4096-byte block starting there whenever that hash
//! is in a database of known source files. A single matching hash says little;
//! many files share common blocks. `hash-runs` looks for *runs*: consecutive
//! blocks on disk that match consecutive blocks of the same source file, at the
//! same sector alignment, with at least one hash unique to that file.
//!
//! ## Features
//!
//! - **Candidate selection**: only sources with a distinctive hash are indexed
//! - **Run detection**: aligned, forward-stepping runs per alignment class
//! - **Null gap merging**: runs split by zero-filled blocks are joined after
//!   verifying the gap on the raw image
//! - **Scoring**: `Σ 1/count` so rare hashes dominate
//! - **Filesystem labels**: the allocated file at each run, from a
//!   Sleuth Kit database
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! use hash_runs::catalog::index::{CandidatePolicy, CandidateSelector};
//! use hash_runs::parsing::{explained::read_records, identified::read_observations};
//! use hash_runs::{DiskIndex, Reporter, RunEngine, SourceCatalog};
//!
//! let open = |name: &str| BufReader::new(File::open(name).unwrap());
//!
//! let candidates = CandidateSelector::new(CandidatePolicy::default())
//!     .select(read_records(open("identified_blocks_explained.txt")))
//!     .unwrap();
//! let catalog =
//!     SourceCatalog::load(read_records(open("identified_blocks_explained.txt")), candidates)
//!         .unwrap();
//! let disk =
//!     DiskIndex::load_relevant(read_observations(open("identified_blocks.txt")), &catalog)
//!         .unwrap();
//!
//! let runs = RunEngine::new(&catalog, &disk).find_runs(None);
//! for row in Reporter::new(&catalog).report(&runs) {
//!     println!("{}: {:.2}", row.identified_file, row.score);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Candidate selection, source catalog and disk index
//! - [`core`]: Core data types for sources, triples and runs
//! - [`evidence`]: Raw image access and filesystem layout lookup
//! - [`matching`]: Run detection, merging and scoring
//! - [`parsing`]: Readers for the report directory streams
//! - [`cli`]: Command-line interface implementation

pub mod catalog;
pub mod cli;
pub mod core;
pub mod evidence;
pub mod matching;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use catalog::disk::DiskIndex;
pub use catalog::store::SourceCatalog;
pub use core::run::{Run, Triple};
pub use core::source::SourceFile;
pub use core::types::*;
pub use matching::engine::{RunConfig, RunEngine};
pub use matching::scoring::{Reporter, RunReport};
