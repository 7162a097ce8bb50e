//! Git-hosted project mining and commit activity analysis.
//!
//! Projects hosted in git carry their ticket keys in commit subjects, so
//! their commits are mined directly with git2 instead of going through the
//! export linkage pipeline. The activity module summarizes commit cadence
//! for either source.

pub mod activity;
pub mod mining;
