//! Stratum index structures
//!
//! The inverted tag index maps postings (metric-wide and per tag pair) to
//! roaring bitmaps of series ids, with write-through persistence to the
//! store and boolean set algebra for combining postings.

pub mod tag_index;

pub use tag_index::{intersect, union, TagIndex};
