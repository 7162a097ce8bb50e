use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StratumError;
use crate::types::Project;

/// Top-level configuration loaded from `.stratum.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use stratum_core::StratumConfig;
///
/// let config = StratumConfig::default();
/// assert_eq!(config.resolver.concurrency, 8);
/// assert!(!config.linkage.strict_references);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StratumConfig {
    /// Record-linkage settings.
    #[serde(default)]
    pub linkage: LinkageConfig,
    /// External change-listing settings.
    #[serde(default)]
    pub resolver: ResolverConfig,
    /// Aggregation defaults for `stratum stats`.
    #[serde(default)]
    pub stats: StatsConfig,
}

impl StratumConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::Io`] if the file cannot be read, or
    /// [`StratumError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, StratumError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::Toml`] if parsing fails, or
    /// [`StratumError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_core::StratumConfig;
    ///
    /// let toml = r#"
    /// [resolver]
    /// concurrency = 2
    /// "#;
    /// let config = StratumConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.resolver.concurrency, 2);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, StratumError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), StratumError> {
        if self.resolver.concurrency == 0 {
            return Err(StratumError::Config(
                "resolver.concurrency must be at least 1".into(),
            ));
        }
        if self.resolver.command.is_empty() {
            return Err(StratumError::Config("resolver.command is empty".into()));
        }
        if !self.resolver.command.iter().any(|arg| arg.contains("{id}")) {
            return Err(StratumError::Config(
                "resolver.command must contain an {id} placeholder".into(),
            ));
        }
        Ok(())
    }
}

/// Record-linkage configuration.
///
/// # Examples
///
/// ```
/// use stratum_core::LinkageConfig;
///
/// let config = LinkageConfig::default();
/// assert_eq!(config.ticket_pattern, r"#(\d+)");
/// assert_eq!(config.files.defects, "defects.csv");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkageConfig {
    /// Abort on the first tracker row whose changeset is missing (default: false).
    #[serde(default)]
    pub strict_references: bool,
    /// Pattern extracting a ticket id from unattributed commit comments.
    #[serde(default = "default_ticket_pattern")]
    pub ticket_pattern: String,
    /// Tracker CSV file names inside the export directory.
    #[serde(default)]
    pub files: TrackerFiles,
}

fn default_ticket_pattern() -> String {
    r"#(\d+)".into()
}

impl Default for LinkageConfig {
    fn default() -> Self {
        Self {
            strict_references: false,
            ticket_pattern: default_ticket_pattern(),
            files: TrackerFiles::default(),
        }
    }
}

/// Names of the tracker exports read next to the monthly JSON dumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerFiles {
    #[serde(default = "default_defects")]
    pub defects: String,
    #[serde(default = "default_stories")]
    pub stories: String,
    #[serde(default = "default_features")]
    pub features: String,
    #[serde(default = "default_issues")]
    pub issues: String,
}

fn default_defects() -> String {
    "defects.csv".into()
}

fn default_stories() -> String {
    "stories.csv".into()
}

fn default_features() -> String {
    "features.csv".into()
}

fn default_issues() -> String {
    "siop-issues.csv".into()
}

impl Default for TrackerFiles {
    fn default() -> Self {
        Self {
            defects: default_defects(),
            stories: default_stories(),
            features: default_features(),
            issues: default_issues(),
        }
    }
}

/// External change-listing configuration.
///
/// # Examples
///
/// ```
/// use stratum_core::ResolverConfig;
///
/// let config = ResolverConfig::default();
/// assert_eq!(config.command[0], "lscm");
/// assert_eq!(config.timeout_secs, 120);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Program and arguments; `{id}` is replaced with the raw change id.
    #[serde(default = "default_command")]
    pub command: Vec<String>,
    /// Maximum concurrent invocations (default: 8).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-invocation timeout in seconds (default: 120).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_command() -> Vec<String> {
    ["lscm", "list", "changes", "-r", "siop", "{id}", "-j"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_concurrency() -> usize {
    8
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Defaults for the aggregate report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Project whose layer rules apply.
    #[serde(default)]
    pub project: Project,
    /// Drop features/issues touching fewer classified files than this.
    #[serde(default)]
    pub min_files: usize,
    /// Only count commits attributed to an issue.
    #[serde(default)]
    pub issues_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = StratumConfig::default();
        assert!(!config.linkage.strict_references);
        assert_eq!(config.linkage.ticket_pattern, r"#(\d+)");
        assert_eq!(config.linkage.files.stories, "stories.csv");
        assert_eq!(config.linkage.files.features, "features.csv");
        assert_eq!(config.linkage.files.issues, "siop-issues.csv");
        assert_eq!(config.resolver.concurrency, 8);
        assert_eq!(config.resolver.timeout_secs, 120);
        assert!(config.resolver.command.contains(&"{id}".to_string()));
        assert_eq!(config.stats.project, Project::Siop);
        assert_eq!(config.stats.min_files, 0);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[linkage]
strict_references = true
ticket_pattern = "SIOP-(\\d+)"

[linkage.files]
defects = "bugs.csv"

[resolver]
command = ["scm", "changes", "{id}", "--json"]
concurrency = 4
timeout_secs = 30

[stats]
project = "openmrs"
min_files = 3
issues_only = true
"#;
        let config = StratumConfig::from_toml(toml).unwrap();
        assert!(config.linkage.strict_references);
        assert_eq!(config.linkage.ticket_pattern, r"SIOP-(\d+)");
        assert_eq!(config.linkage.files.defects, "bugs.csv");
        assert_eq!(config.linkage.files.stories, "stories.csv");
        assert_eq!(config.resolver.command[0], "scm");
        assert_eq!(config.resolver.concurrency, 4);
        assert_eq!(config.resolver.timeout_secs, 30);
        assert_eq!(config.stats.project, Project::Openmrs);
        assert_eq!(config.stats.min_files, 3);
        assert!(config.stats.issues_only);
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = StratumConfig::from_toml("").unwrap();
        assert_eq!(config.resolver.concurrency, 8);
        assert_eq!(config.linkage.files.defects, "defects.csv");
    }

    #[test]
    fn invalid_toml_returns_error() {
        assert!(StratumConfig::from_toml("{{invalid}}").is_err());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = StratumConfig::from_toml("[resolver]\nconcurrency = 0\n").unwrap_err();
        assert!(matches!(err, StratumError::Config(_)));
    }

    #[test]
    fn command_without_placeholder_is_rejected() {
        let err = StratumConfig::from_toml("[resolver]\ncommand = [\"lscm\", \"list\"]\n")
            .unwrap_err();
        assert!(err.to_string().contains("{id}"));
    }
}
