//! Run detection, gap merging and scoring.
//!
//! - [`RunDetector`](runs::RunDetector): cross-references one source's hashes
//!   with the disk index and cuts the aligned, forward-stepping runs
//! - [`GapMerger`](merge::GapMerger): joins runs separated by zero-filled blocks
//!   verified on the raw image
//! - [`Reporter`](scoring::Reporter): scores and orders the surviving runs
//! - [`RunEngine`](engine::RunEngine): drives the above over every candidate
//!
//! A run's score is `Σ 1/count` over its hashed triples plus a small fixed
//! weight per merged null block, so rare hashes dominate and common ones only
//! corroborate.

pub mod engine;
pub mod merge;
pub mod runs;
pub mod scoring;
