//! Title reconciliation across sources.
//!
//! Sources disagree on punctuation, casing, subtitles and sometimes spelling.
//! Titles are compared in normalized form ([`normalize`]), scored with a
//! length-relative edit distance ([`similarity`]) and reduced to a single
//! candidate by [`select_best`].

mod normalize;
mod select;
mod similarity;

pub use normalize::normalize;
pub use select::{select_best, MATCH_THRESHOLD};
pub use similarity::{edit_distance, similarity};
