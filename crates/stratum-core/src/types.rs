use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of tracker issue a commit is attributed to.
///
/// # Examples
///
/// ```
/// use stratum_core::IssueKind;
///
/// let k: IssueKind = serde_json::from_str("\"bug\"").unwrap();
/// assert_eq!(k, IssueKind::Bug);
///
/// // An empty kind reads as unknown.
/// let k: IssueKind = serde_json::from_str("\"\"").unwrap();
/// assert_eq!(k, IssueKind::Unknown);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    /// A defect report.
    Bug,
    /// A user story or improvement.
    Story,
    /// No issue, or an issue missing from the tracker index.
    #[default]
    #[serde(alias = "")]
    Unknown,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Bug => write!(f, "bug"),
            IssueKind::Story => write!(f, "story"),
            IssueKind::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for IssueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bug" => Ok(IssueKind::Bug),
            "story" => Ok(IssueKind::Story),
            "unknown" | "" => Ok(IssueKind::Unknown),
            other => Err(format!("unknown issue kind: {other}")),
        }
    }
}

/// A tracker issue reference.
///
/// An empty `id` means the commit is unattributed.
///
/// # Examples
///
/// ```
/// use stratum_core::{Issue, IssueKind};
///
/// let issue = Issue::new("812", IssueKind::Story);
/// assert!(!issue.is_unattributed());
/// assert!(Issue::default().is_unattributed());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Tracker identifier, without any `#` prefix.
    #[serde(default)]
    pub id: String,
    /// Issue classification.
    #[serde(default)]
    pub kind: IssueKind,
}

impl Issue {
    pub fn new(id: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    pub fn is_unattributed(&self) -> bool {
        self.id.is_empty()
    }
}

/// Representative metadata of one logical commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// Author name as exported.
    pub author: String,
    /// Normalized (truncated) comment or commit subject.
    pub comment: String,
    /// Canonical timestamp (`dd/mm/yyyy HH:MM`) or git ISO date.
    pub modified: String,
    /// Raw version-control identifiers that make up this commit.
    #[serde(default)]
    pub raw_ids: Vec<String>,
}

/// The final unit of analysis: a changeset with its attribution and files.
///
/// # Examples
///
/// ```
/// use stratum_core::{Change, Commit, Issue, IssueKind};
///
/// let commit = Commit {
///     feature: "Billing".into(),
///     issue: Issue::new("42", IssueKind::Bug),
///     change: Change {
///         author: "ana".into(),
///         comment: "fix rounding".into(),
///         modified: "15/03/2010 14:30".into(),
///         raw_ids: vec!["_a1".into()],
///     },
///     files: vec!["siop/siop-ejb/src/Billing.java".into()],
/// };
/// let json = serde_json::to_value(&commit).unwrap();
/// assert_eq!(json["change"]["rawIds"][0], "_a1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commit {
    /// Feature name; empty when unknown.
    #[serde(default)]
    pub feature: String,
    /// Attributed issue.
    #[serde(default)]
    pub issue: Issue,
    /// Commit metadata.
    pub change: Change,
    /// Touched file paths in discovery order, duplicates preserved.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Target project whose data and layer rules are being analyzed.
///
/// # Examples
///
/// ```
/// use stratum_core::Project;
///
/// let p: Project = "ofbiz".parse().unwrap();
/// assert_eq!(p.ticket_pattern(), Some(r"OFBIZ-\d+"));
/// assert!(Project::Siop.ticket_pattern().is_none());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Project {
    /// Linked VCS export + tracker CSVs.
    #[default]
    Siop,
    /// Apache OFBiz, git + JIRA issue list.
    Ofbiz,
    /// OpenMRS core, git + JIRA issue list.
    Openmrs,
}

impl Project {
    /// Ticket-id pattern found in commit subjects of git-hosted projects.
    pub fn ticket_pattern(self) -> Option<&'static str> {
        match self {
            Project::Siop => None,
            Project::Ofbiz => Some(r"OFBIZ-\d+"),
            Project::Openmrs => Some(r"TRUNK-\d+"),
        }
    }

    /// Whether commits come from a git repository rather than linked exports.
    pub fn is_git_hosted(self) -> bool {
        self.ticket_pattern().is_some()
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Project::Siop => write!(f, "siop"),
            Project::Ofbiz => write!(f, "ofbiz"),
            Project::Openmrs => write!(f, "openmrs"),
        }
    }
}

impl FromStr for Project {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "siop" => Ok(Project::Siop),
            "ofbiz" => Ok(Project::Ofbiz),
            "openmrs" => Ok(Project::Openmrs),
            other => Err(format!("unknown project: {other}")),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use stratum_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable key/value text.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!(
            "markdown".parse::<OutputFormat>().unwrap(),
            OutputFormat::Markdown
        );
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn issue_kind_round_trips_through_display() {
        for kind in [IssueKind::Bug, IssueKind::Story, IssueKind::Unknown] {
            assert_eq!(kind.to_string().parse::<IssueKind>().unwrap(), kind);
        }
        assert!("epic".parse::<IssueKind>().is_err());
    }

    #[test]
    fn commit_deserializes_with_missing_attribution() {
        let json = r#"{"change":{"author":"ana","comment":"","modified":"01/01/2010 00:15"}}"#;
        let commit: Commit = serde_json::from_str(json).unwrap();
        assert!(commit.issue.is_unattributed());
        assert_eq!(commit.issue.kind, IssueKind::Unknown);
        assert!(commit.feature.is_empty());
        assert!(commit.files.is_empty());
        assert!(commit.change.raw_ids.is_empty());
    }

    #[test]
    fn project_parsing() {
        assert_eq!("SIOP".parse::<Project>().unwrap(), Project::Siop);
        assert_eq!("openmrs".parse::<Project>().unwrap(), Project::Openmrs);
        assert!("linux".parse::<Project>().is_err());
        assert!(Project::Openmrs.is_git_hosted());
        assert!(!Project::Siop.is_git_hosted());
    }
}
