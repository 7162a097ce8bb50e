//! Architectural layer statistics over attributed commits.
//!
//! Every touched file is mapped to a model, view, or controller layer by a
//! per-project rule set. Commits are then folded into feature and issue
//! aggregates and summarized as frequency histograms.
//!
//! # Examples
//!
//! ```
//! use stratum_core::{Change, Commit, Issue, IssueKind, Project};
//! use stratum_layers::aggregate::{AggregateOptions, Aggregator};
//! use stratum_layers::classify::classifier_for;
//!
//! let commit = Commit {
//!     feature: "Billing".into(),
//!     issue: Issue::new("301", IssueKind::Bug),
//!     change: Change::default(),
//!     files: vec!["/siop-jpa/Invoice.java".into(), "/siop-war/invoice.xhtml".into()],
//! };
//! let classifier = classifier_for(Project::Siop);
//! let stats = Aggregator::new(classifier.as_ref(), AggregateOptions::default()).aggregate(&[commit]);
//! assert_eq!(stats.commits, 1);
//! assert_eq!(stats.commits_per_layer_combination["mv"], 1);
//! ```

pub mod aggregate;
pub mod classify;
pub mod combination;
pub mod report;
