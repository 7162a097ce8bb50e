//! Text, JSON, and Markdown rendering of [`Stats`].

use std::collections::BTreeMap;
use std::fmt::{Display, Write};

use stratum_core::{OutputFormat, StratumError};

use crate::aggregate::Stats;

/// Render `stats` in the requested format.
///
/// # Errors
///
/// Returns [`StratumError::Serialization`] if JSON serialization fails.
pub fn render(stats: &Stats, format: OutputFormat) -> Result<String, StratumError> {
    match format {
        OutputFormat::Text => Ok(format_text(stats)),
        OutputFormat::Json => format_json(stats),
        OutputFormat::Markdown => Ok(format_markdown(stats)),
    }
}

/// One `Name: value` line per statistic, then the per-kind tally.
///
/// # Examples
///
/// ```
/// use stratum_layers::aggregate::Stats;
/// use stratum_layers::report::format_text;
///
/// let out = format_text(&Stats::default());
/// assert!(out.starts_with("Commits: 0\n"));
/// assert!(out.contains("LayersPerCommit: {}\n"));
/// ```
pub fn format_text(stats: &Stats) -> String {
    let mut out = String::new();
    for (name, value) in rows(stats) {
        let _ = writeln!(out, "{name}: {value}");
    }
    let _ = writeln!(out, "Kinds: {}", inline(&stats.kinds));
    out
}

/// Pretty-printed camelCase JSON.
///
/// # Examples
///
/// ```
/// use stratum_layers::aggregate::Stats;
/// use stratum_layers::report::format_json;
///
/// let json = format_json(&Stats::default()).unwrap();
/// assert!(json.contains("\"commitsWithIssues\": 0"));
/// ```
pub fn format_json(stats: &Stats) -> Result<String, StratumError> {
    serde_json::to_string_pretty(stats).map_err(StratumError::from)
}

/// Summary list followed by one table per histogram.
pub fn format_markdown(stats: &Stats) -> String {
    let mut out = String::from("# Layer Statistics\n\n");
    let _ = writeln!(out, "- **Commits:** {}", stats.commits);
    let _ = writeln!(out, "- **Commits with issues:** {}", stats.commits_with_issues);
    let _ = writeln!(out, "- **Features:** {}", stats.features);
    let _ = writeln!(out, "- **Issues:** {}", stats.issues);
    out.push('\n');

    table(&mut out, "Files per layer", "Layer", &stats.files);
    table(&mut out, "Commits per layer combination", "Combination", &stats.commits_per_layer_combination);
    table(&mut out, "Layers per commit", "Layers", &stats.layers_per_commit);
    table(&mut out, "Commits per feature", "Commits", &stats.commits_per_feature);
    table(&mut out, "Users per feature", "Users", &stats.users_per_feature);
    table(&mut out, "Layers per feature", "Layers", &stats.layers_per_feature);
    table(&mut out, "Issues per feature", "Issues", &stats.issues_per_feature);
    table(&mut out, "Features per layer combination", "Combination", &stats.features_per_layer_combination);
    table(&mut out, "Commits per issue", "Commits", &stats.commits_per_issue);
    table(&mut out, "Users per issue", "Users", &stats.users_per_issue);
    table(&mut out, "Layers per issue", "Layers", &stats.layers_per_issue);
    table(&mut out, "Issues per layer combination", "Combination", &stats.issues_per_layer_combination);
    table(&mut out, "Commits per issue kind", "Kind", &stats.kinds);
    out
}

fn rows(stats: &Stats) -> Vec<(&'static str, String)> {
    vec![
        ("Commits", stats.commits.to_string()),
        ("CommitsWithIssues", stats.commits_with_issues.to_string()),
        ("Features", stats.features.to_string()),
        ("Issues", stats.issues.to_string()),
        ("Files", inline(&stats.files)),
        ("CommitsPerLayerCombination", inline(&stats.commits_per_layer_combination)),
        ("LayersPerCommit", inline(&stats.layers_per_commit)),
        ("UsersPerIssue", inline(&stats.users_per_issue)),
        ("CommitsPerIssue", inline(&stats.commits_per_issue)),
        ("LayersPerIssue", inline(&stats.layers_per_issue)),
        ("IssuesPerLayerCombination", inline(&stats.issues_per_layer_combination)),
        ("UsersPerFeature", inline(&stats.users_per_feature)),
        ("CommitsPerFeature", inline(&stats.commits_per_feature)),
        ("LayersPerFeature", inline(&stats.layers_per_feature)),
        ("IssuesPerFeature", inline(&stats.issues_per_feature)),
        ("FeaturesPerLayerCombination", inline(&stats.features_per_layer_combination)),
    ]
}

fn inline<K: Display>(histogram: &BTreeMap<K, usize>) -> String {
    let entries: Vec<String> = histogram.iter().map(|(k, v)| format!("{k}: {v}")).collect();
    format!("{{{}}}", entries.join(", "))
}

fn table<K: Display>(out: &mut String, title: &str, column: &str, histogram: &BTreeMap<K, usize>) {
    let _ = writeln!(out, "## {title}\n");
    if histogram.is_empty() {
        out.push_str("_none_\n\n");
        return;
    }
    let _ = writeln!(out, "| {column} | Count |");
    let _ = writeln!(out, "|---|---|");
    for (key, count) in histogram {
        let key = key.to_string();
        let key = if key.is_empty() { "(none)" } else { key.as_str() };
        let _ = writeln!(out, "| {key} | {count} |");
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use stratum_core::IssueKind;

    use super::*;

    fn stats() -> Stats {
        Stats {
            commits: 4,
            commits_with_issues: 3,
            features: 2,
            issues: 3,
            files: BTreeMap::from([("m".to_string(), 2), ("v".to_string(), 1)]),
            commits_per_layer_combination: BTreeMap::from([
                (String::new(), 1),
                ("mv".to_string(), 3),
            ]),
            layers_per_commit: BTreeMap::from([(0, 1), (2, 3)]),
            kinds: BTreeMap::from([(IssueKind::Bug, 3), (IssueKind::Unknown, 1)]),
            ..Stats::default()
        }
    }

    #[test]
    fn text_has_one_line_per_statistic() {
        let out = format_text(&stats());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 17);
        assert_eq!(lines[0], "Commits: 4");
        assert_eq!(lines[1], "CommitsWithIssues: 3");
        assert_eq!(lines[4], "Files: {m: 2, v: 1}");
        assert_eq!(lines[5], "CommitsPerLayerCombination: {: 1, mv: 3}");
        assert_eq!(lines[6], "LayersPerCommit: {0: 1, 2: 3}");
        assert_eq!(lines[16], "Kinds: {bug: 3, unknown: 1}");
    }

    #[test]
    fn json_uses_camel_case_and_string_keys() {
        let json = format_json(&stats()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["commitsWithIssues"], 3);
        assert_eq!(value["layersPerCommit"]["2"], 3);
        assert_eq!(value["kinds"]["bug"], 3);
        assert_eq!(value["commitsPerLayerCombination"][""], 1);
    }

    #[test]
    fn markdown_tables() {
        let md = format_markdown(&stats());
        assert!(md.starts_with("# Layer Statistics"));
        assert!(md.contains("- **Commits:** 4"));
        assert!(md.contains("## Commits per layer combination"));
        assert!(md.contains("| (none) | 1 |"));
        assert!(md.contains("| mv | 3 |"));
        assert!(md.contains("## Users per feature\n\n_none_"));
    }

    #[test]
    fn render_dispatches_on_format() {
        let s = stats();
        assert_eq!(render(&s, OutputFormat::Text).unwrap(), format_text(&s));
        assert!(render(&s, OutputFormat::Json).unwrap().starts_with('{'));
        assert!(render(&s, OutputFormat::Markdown).unwrap().contains("| Layer | Count |"));
    }
}
