//! Core types, configuration, and error handling for Stratum.
//!
//! This crate provides the shared foundation used by all other Stratum crates:
//! - [`StratumError`] — unified error type using `thiserror`
//! - [`StratumConfig`] — configuration loaded from `.stratum.toml`
//! - Shared types: [`Commit`], [`Change`], [`Issue`], [`IssueKind`],
//!   [`Project`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{LinkageConfig, ResolverConfig, StatsConfig, StratumConfig, TrackerFiles};
pub use error::StratumError;
pub use types::{Change, Commit, Issue, IssueKind, OutputFormat, Project};

/// A convenience `Result` type for Stratum operations.
pub type Result<T> = std::result::Result<T, StratumError>;
