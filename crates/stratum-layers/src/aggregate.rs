//! Feature- and issue-level aggregation of classified commits.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use stratum_core::{Commit, IssueKind, StatsConfig};

use crate::classify::LayerClassifier;
use crate::combination::LayerSet;

/// Filters applied while aggregating.
///
/// # Examples
///
/// ```
/// use stratum_core::{IssueKind, StatsConfig};
/// use stratum_layers::aggregate::AggregateOptions;
///
/// let options = AggregateOptions::from_config(&StatsConfig { min_files: 3, ..StatsConfig::default() })
///     .with_issue_kind(Some(IssueKind::Bug));
/// assert_eq!(options.min_files, 3);
/// assert_eq!(options.issue_kind, Some(IssueKind::Bug));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Only count commits attributed to this kind.
    pub issue_kind: Option<IssueKind>,
    /// Only count commits with a non-empty issue id.
    pub issues_only: bool,
    /// Drop features and issues with fewer distinct classified files.
    pub min_files: usize,
}

impl AggregateOptions {
    pub fn from_config(config: &StatsConfig) -> Self {
        Self {
            issue_kind: None,
            issues_only: config.issues_only,
            min_files: config.min_files,
        }
    }

    pub fn with_issue_kind(mut self, kind: Option<IssueKind>) -> Self {
        self.issue_kind = kind;
        self
    }

    fn retains(&self, commit: &Commit) -> bool {
        if self.issue_kind.is_some_and(|kind| kind != commit.issue.kind) {
            return false;
        }
        !(self.issues_only && commit.issue.is_unattributed())
    }
}

/// Frequency statistics over a commit set.
///
/// Histograms named `x_per_y` map "number of x" to "number of y with that
/// many x"; `x_per_layer_combination` maps a combination label to a count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub commits: usize,
    pub commits_with_issues: usize,
    pub features: usize,
    pub issues: usize,
    /// Classified file occurrences per layer code.
    pub files: BTreeMap<String, usize>,
    pub commits_per_layer_combination: BTreeMap<String, usize>,
    pub layers_per_commit: BTreeMap<usize, usize>,
    pub users_per_issue: BTreeMap<usize, usize>,
    pub commits_per_issue: BTreeMap<usize, usize>,
    pub layers_per_issue: BTreeMap<usize, usize>,
    pub issues_per_layer_combination: BTreeMap<String, usize>,
    pub users_per_feature: BTreeMap<usize, usize>,
    pub commits_per_feature: BTreeMap<usize, usize>,
    pub layers_per_feature: BTreeMap<usize, usize>,
    pub issues_per_feature: BTreeMap<usize, usize>,
    pub features_per_layer_combination: BTreeMap<String, usize>,
    /// Retained commits per issue kind.
    pub kinds: BTreeMap<IssueKind, usize>,
}

/// Running totals for one feature or issue key.
#[derive(Debug, Clone, Default)]
struct Group {
    commits: usize,
    users: BTreeSet<String>,
    layers: LayerSet,
    files: HashSet<String>,
    issues: BTreeSet<String>,
}

impl Group {
    fn keeps(&self, min_files: usize) -> bool {
        min_files == 0 || self.files.len() >= min_files
    }
}

/// Folds commits into [`Stats`] with one classifier and one set of filters.
pub struct Aggregator<'a> {
    classifier: &'a dyn LayerClassifier,
    options: AggregateOptions,
}

impl<'a> Aggregator<'a> {
    pub fn new(classifier: &'a dyn LayerClassifier, options: AggregateOptions) -> Self {
        Self {
            classifier,
            options,
        }
    }

    /// Scan `commits` once and summarize them.
    pub fn aggregate(&self, commits: &[Commit]) -> Stats {
        let mut stats = Stats::default();
        let mut features: BTreeMap<&str, Group> = BTreeMap::new();
        let mut issues: BTreeMap<&str, Group> = BTreeMap::new();

        for commit in commits.iter().filter(|c| self.options.retains(c)) {
            stats.commits += 1;
            if !commit.issue.is_unattributed() {
                stats.commits_with_issues += 1;
            }
            *stats.kinds.entry(commit.issue.kind).or_default() += 1;

            let feature = features.entry(commit.feature.as_str()).or_default();
            feature.commits += 1;
            feature.users.insert(commit.change.author.clone());
            feature.issues.insert(commit.issue.id.clone());

            let issue = issues.entry(commit.issue.id.as_str()).or_default();
            issue.commits += 1;
            issue.users.insert(commit.change.author.clone());

            let mut layers = LayerSet::default();
            for path in &commit.files {
                let Some(layer) = self.classifier.classify(path) else {
                    continue;
                };
                layers.insert(layer);
                *stats.files.entry(layer.code().to_string()).or_default() += 1;
                feature.files.insert(path.clone());
                issue.files.insert(path.clone());
            }
            feature.layers = feature.layers.union(layers);
            issue.layers = issue.layers.union(layers);
            bump(&mut stats.layers_per_commit, layers.len());
            bump(
                &mut stats.commits_per_layer_combination,
                layers.combination().to_string(),
            );
        }

        let min_files = self.options.min_files;
        for group in features.values().filter(|g| g.keeps(min_files)) {
            stats.features += 1;
            bump(&mut stats.commits_per_feature, group.commits);
            bump(&mut stats.users_per_feature, group.users.len());
            bump(&mut stats.layers_per_feature, group.layers.len());
            bump(&mut stats.issues_per_feature, group.issues.len());
            bump(
                &mut stats.features_per_layer_combination,
                group.layers.combination().to_string(),
            );
        }
        for group in issues.values().filter(|g| g.keeps(min_files)) {
            stats.issues += 1;
            bump(&mut stats.commits_per_issue, group.commits);
            bump(&mut stats.users_per_issue, group.users.len());
            bump(&mut stats.layers_per_issue, group.layers.len());
            bump(
                &mut stats.issues_per_layer_combination,
                group.layers.combination().to_string(),
            );
        }

        tracing::info!(
            commits = stats.commits,
            features = stats.features,
            issues = stats.issues,
            "aggregated commits"
        );
        stats
    }
}

fn bump<K: Ord>(histogram: &mut BTreeMap<K, usize>, key: K) {
    *histogram.entry(key).or_default() += 1;
}
