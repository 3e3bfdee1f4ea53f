//! Optional access to the original evidence.
//!
//! - [`image`]: random-access reads of the raw disk image, used only to verify
//!   that gaps between runs are zero-filled.
//! - [`layout`]: filesystem metadata (a Sleuth Kit `tsk_loaddb` database) used
//!   to label which allocated file currently sits at the start of a run.
//!
//! Both are optional. When either cannot be opened the analysis continues
//! without it.

pub mod image;
pub mod layout;
