//! Read-only indices built from the input streams.
//!
//! Loading is an explicit two-phase protocol over the association stream,
//! which bounds memory to the sources that can matter:
//!
//! 1. [`CandidateSelector::select`](index::CandidateSelector::select) reads the
//!    stream once and returns the [`CandidateSet`](index::CandidateSet).
//! 2. [`SourceCatalog::load`](store::SourceCatalog::load) reads it again and
//!    indexes only hashes touching a candidate.
//!
//! The disk-observation stream is then indexed by [`DiskIndex`](disk::DiskIndex),
//! optionally restricted to hashes the catalog holds.

pub mod disk;
pub mod index;
pub mod store;
