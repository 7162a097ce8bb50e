//! Commit cadence and per-author activity.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::Serialize;
use stratum_core::{Commit, StratumError};

use crate::mining::ISO_DATE_FORMAT;

/// Canonical linked-export timestamp layout.
const CANONICAL_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Commits attributed to one author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorActivity {
    pub author: String,
    pub commits: usize,
}

/// Summary of how often and how broadly a project commits.
///
/// # Examples
///
/// ```
/// use stratum_core::{Change, Commit};
/// use stratum_gitpulse::activity::analyze_activity;
///
/// let commit = |modified: &str, files: usize| Commit {
///     change: Change { author: "ana".into(), modified: modified.into(), ..Change::default() },
///     files: vec!["a".to_string(); files],
///     ..Commit::default()
/// };
/// let report = analyze_activity(&[commit("15/03/2010 18:00", 3), commit("15/03/2010 14:00", 1)]).unwrap();
/// assert_eq!(report.mean_files_per_commit, 2.0);
/// assert_eq!(report.mean_interval_hours, 4.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReport {
    pub commits: usize,
    pub mean_files_per_commit: f64,
    /// Mean gap between consecutive commits; zero with fewer than two.
    pub mean_interval_hours: f64,
    /// Ascending by commit count, then by name.
    pub authors: Vec<AuthorActivity>,
}

/// Parse a commit timestamp in either the canonical or the git ISO layout.
///
/// Canonical timestamps carry no offset and are read as UTC.
///
/// # Errors
///
/// Returns [`StratumError::Timestamp`] when neither layout matches.
pub fn parse_timestamp(modified: &str) -> Result<DateTime<FixedOffset>, StratumError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(modified, CANONICAL_FORMAT) {
        return Ok(naive.and_utc().fixed_offset());
    }
    DateTime::parse_from_str(modified, ISO_DATE_FORMAT)
        .map_err(|_| StratumError::Timestamp(modified.to_string()))
}

/// Order commits by time and summarize them.
///
/// # Errors
///
/// Returns [`StratumError::Timestamp`] for an unparseable commit timestamp.
pub fn analyze_activity(commits: &[Commit]) -> Result<ActivityReport, StratumError> {
    let mut timed = commits
        .iter()
        .map(|c| Ok((parse_timestamp(&c.change.modified)?, c)))
        .collect::<Result<Vec<_>, StratumError>>()?;
    timed.sort_by_key(|(time, _)| *time);

    let files: usize = timed.iter().map(|(_, c)| c.files.len()).sum();
    let gaps: f64 = timed
        .windows(2)
        .map(|pair| (pair[1].0 - pair[0].0).num_seconds() as f64 / 3600.0)
        .sum();

    let mut per_author: HashMap<&str, usize> = HashMap::new();
    for (_, commit) in &timed {
        *per_author.entry(commit.change.author.as_str()).or_default() += 1;
    }
    let mut authors: Vec<AuthorActivity> = per_author
        .into_iter()
        .map(|(author, commits)| AuthorActivity {
            author: author.to_string(),
            commits,
        })
        .collect();
    authors.sort_by(|a, b| a.commits.cmp(&b.commits).then_with(|| a.author.cmp(&b.author)));

    let n = timed.len();
    Ok(ActivityReport {
        commits: n,
        mean_files_per_commit: if n == 0 { 0.0 } else { files as f64 / n as f64 },
        mean_interval_hours: if n < 2 { 0.0 } else { gaps / (n - 1) as f64 },
        authors,
    })
}
