//! Commit extraction from git-hosted projects via git2.
//!
//! Walks history oldest-first and turns every commit into a [`Commit`] whose
//! issue comes from a ticket key in the subject line and whose kind comes
//! from an exported `key,type` issue list.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, FixedOffset};
use git2::{DiffOptions, Repository, Sort};
use regex::Regex;
use stratum_core::{Change, Commit, Issue, IssueKind, Project, StratumError};

/// `git log --date=iso` layout.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Options for history mining.
///
/// # Examples
///
/// ```
/// use stratum_gitpulse::mining::MiningOptions;
///
/// let opts = MiningOptions::default();
/// assert!(opts.branch.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MiningOptions {
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
}

/// Issue key to tracker type (`Bug`, `Improvement`, ...).
///
/// # Examples
///
/// ```
/// use stratum_core::IssueKind;
/// use stratum_gitpulse::mining::IssueTypes;
///
/// let types = IssueTypes::from_reader("OFBIZ-1,Bug\nOFBIZ-2,Improvement\n".as_bytes()).unwrap();
/// assert_eq!(types.kind_of("OFBIZ-1"), IssueKind::Bug);
/// assert_eq!(types.kind_of("OFBIZ-2"), IssueKind::Story);
/// assert_eq!(types.kind_of("OFBIZ-3"), IssueKind::Unknown);
/// ```
#[derive(Debug, Clone, Default)]
pub struct IssueTypes(HashMap<String, String>);

impl IssueTypes {
    /// Read a headerless `key,type` CSV.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::FileNotFound`] if `path` does not exist and
    /// [`StratumError::Csv`] on malformed rows.
    pub fn from_path(path: &Path) -> Result<Self, StratumError> {
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StratumError::FileNotFound(path.to_path_buf()),
            _ => StratumError::Io(e),
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, StratumError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut types = HashMap::new();
        for record in reader.records() {
            let record = record?;
            if let (Some(key), Some(kind)) = (record.get(0), record.get(1)) {
                types.insert(key.to_string(), kind.to_string());
            }
        }
        Ok(Self(types))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Bug` is a bug, any other listed type a story, an unlisted key unknown.
    pub fn kind_of(&self, key: &str) -> IssueKind {
        match self.0.get(key).map(String::as_str) {
            Some("Bug") => IssueKind::Bug,
            Some(_) => IssueKind::Story,
            None => IssueKind::Unknown,
        }
    }
}

/// Mines commits of one git-hosted project.
pub struct GitMiner {
    ticket: Regex,
    issue_types: IssueTypes,
}

impl GitMiner {
    pub fn new(ticket: Regex, issue_types: IssueTypes) -> Self {
        Self {
            ticket,
            issue_types,
        }
    }

    /// A miner using `project`'s ticket key pattern.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::Config`] for projects that are not git-hosted.
    pub fn for_project(project: Project, issue_types: IssueTypes) -> Result<Self, StratumError> {
        let pattern = project.ticket_pattern().ok_or_else(|| {
            StratumError::Config(format!("{project} commits come from linked exports, not git"))
        })?;
        let ticket = Regex::new(pattern)
            .map_err(|e| StratumError::Config(format!("invalid ticket pattern {pattern}: {e}")))?;
        Ok(Self::new(ticket, issue_types))
    }

    /// The first ticket key in `subject`, or an unattributed issue.
    pub fn issue_for(&self, subject: &str) -> Issue {
        match self.ticket.find(subject) {
            Some(m) => Issue::new(m.as_str(), self.issue_types.kind_of(m.as_str())),
            None => Issue::default(),
        }
    }

    /// Walk the repository at `repo_path`, oldest commit first.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::Git`] if the repository cannot be opened or walked.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use stratum_core::Project;
    /// use stratum_gitpulse::mining::{GitMiner, IssueTypes, MiningOptions};
    ///
    /// let types = IssueTypes::from_path(Path::new("ofbiz-issues.csv")).unwrap();
    /// let miner = GitMiner::for_project(Project::Ofbiz, types).unwrap();
    /// let commits = miner.mine(Path::new("ofbiz"), &MiningOptions::default()).unwrap();
    /// for c in &commits {
    ///     println!("{} {} ({} files)", c.change.modified, c.issue.id, c.files.len());
    /// }
    /// ```
    pub fn mine(&self, repo_path: &Path, options: &MiningOptions) -> Result<Vec<Commit>, StratumError> {
        let repo = Repository::open(repo_path)
            .map_err(|e| StratumError::Git(format!("failed to open repository: {e}")))?;

        let mut revwalk = repo
            .revwalk()
            .map_err(|e| StratumError::Git(format!("failed to create revwalk: {e}")))?;
        revwalk
            .set_sorting(Sort::TOPOLOGICAL | Sort::TIME | Sort::REVERSE)
            .map_err(|e| StratumError::Git(format!("failed to sort revwalk: {e}")))?;

        if let Some(ref branch) = options.branch {
            let reference = repo
                .resolve_reference_from_short_name(branch)
                .map_err(|e| StratumError::Git(format!("failed to resolve branch '{branch}': {e}")))?;
            let oid = reference
                .target()
                .ok_or_else(|| StratumError::Git("branch has no target".into()))?;
            revwalk
                .push(oid)
                .map_err(|e| StratumError::Git(format!("failed to push oid: {e}")))?;
        } else {
            revwalk
                .push_head()
                .map_err(|e| StratumError::Git(format!("failed to push HEAD: {e}")))?;
        }

        let mut commits = Vec::new();
        for oid_result in revwalk {
            let oid = oid_result.map_err(|e| StratumError::Git(format!("revwalk error: {e}")))?;
            let commit = repo
                .find_commit(oid)
                .map_err(|e| StratumError::Git(format!("failed to find commit: {e}")))?;

            let subject = commit
                .message()
                .unwrap_or("")
                .lines()
                .next()
                .unwrap_or("")
                .to_string();
            let author = commit.author().name().unwrap_or("unknown").to_string();

            commits.push(Commit {
                feature: String::new(),
                issue: self.issue_for(&subject),
                change: Change {
                    author,
                    comment: subject,
                    modified: iso_date(&commit.time())?,
                    raw_ids: vec![oid.to_string()],
                },
                files: changed_paths(&repo, &commit)?,
            });
        }

        tracing::info!(
            repo = %repo_path.display(),
            commits = commits.len(),
            with_issues = commits.iter().filter(|c| !c.issue.is_unattributed()).count(),
            "mined git history"
        );
        Ok(commits)
    }
}

/// Format a git timestamp in its own offset.
///
/// # Errors
///
/// Returns [`StratumError::Git`] for out-of-range times or offsets.
pub fn iso_date(time: &git2::Time) -> Result<String, StratumError> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .ok_or_else(|| StratumError::Git(format!("invalid offset {}", time.offset_minutes())))?;
    let utc = DateTime::from_timestamp(time.seconds(), 0)
        .ok_or_else(|| StratumError::Git(format!("invalid commit time {}", time.seconds())))?;
    Ok(utc.with_timezone(&offset).format(ISO_DATE_FORMAT).to_string())
}

/// Paths changed against the first parent; every path for a root commit.
fn changed_paths(repo: &Repository, commit: &git2::Commit) -> Result<Vec<String>, StratumError> {
    let commit_tree = commit
        .tree()
        .map_err(|e| StratumError::Git(format!("failed to get commit tree: {e}")))?;

    let parent_tree = if commit.parent_count() > 0 {
        let parent = commit
            .parent(0)
            .map_err(|e| StratumError::Git(format!("failed to get parent: {e}")))?;
        Some(
            parent
                .tree()
                .map_err(|e| StratumError::Git(format!("failed to get parent tree: {e}")))?,
        )
    } else {
        None
    };

    let mut diff_opts = DiffOptions::new();
    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&commit_tree), Some(&mut diff_opts))
        .map_err(|e| StratumError::Git(format!("failed to compute diff: {e}")))?;

    Ok(diff
        .deltas()
        .filter_map(|delta| {
            delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .filter(|p| !p.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use git2::{Signature, Time};

    use super::*;

    fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str, seconds: i64) {
        let root = repo.workdir().unwrap().to_path_buf();
        let mut index = repo.index().unwrap();
        for (path, content) in files {
            let full = root.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(&full, content).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::new("ana", "ana@example.com", &Time::new(seconds, -180)).unwrap();
        let parents: Vec<git2::Commit> = repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
    }

    fn ofbiz_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        commit_files(
            &repo,
            &[
                ("applications/order/entitydef/entitymodel.xml", "<a/>"),
                ("build.xml", "<b/>"),
            ],
            "Initial import",
            1_262_347_200,
        );
        commit_files(
            &repo,
            &[("applications/order/widget/OrderScreens.xml", "<s/>")],
            "Fixed: OFBIZ-101 broken order screen\n\nlonger body",
            1_262_350_800,
        );
        commit_files(
            &repo,
            &[("build.xml", "<b2/>")],
            "Improved: OFBIZ-202 build cleanup",
            1_262_354_400,
        );
        dir
    }

    fn types() -> IssueTypes {
        IssueTypes::from_reader("OFBIZ-101,Bug\nOFBIZ-202,Improvement\n".as_bytes()).unwrap()
    }

    #[test]
    fn mines_oldest_first_with_issues() {
        let dir = ofbiz_repo();
        let miner = GitMiner::for_project(Project::Ofbiz, types()).unwrap();
        let commits = miner.mine(dir.path(), &MiningOptions::default()).unwrap();

        assert_eq!(commits.len(), 3);
        assert_eq!(commits[0].change.comment, "Initial import");
        assert!(commits[0].issue.is_unattributed());
        assert_eq!(commits[0].files.len(), 2);

        assert_eq!(commits[1].change.comment, "Fixed: OFBIZ-101 broken order screen");
        assert_eq!(commits[1].issue, Issue::new("OFBIZ-101", IssueKind::Bug));
        assert_eq!(
            commits[1].files,
            vec!["applications/order/widget/OrderScreens.xml"]
        );

        assert_eq!(commits[2].issue.kind, IssueKind::Story);
        assert_eq!(commits[2].files, vec!["build.xml"]);
        assert!(commits.iter().all(|c| c.feature.is_empty()));
        assert_eq!(commits[2].change.raw_ids[0].len(), 40);
    }

    #[test]
    fn dates_keep_author_offset() {
        let dir = ofbiz_repo();
        let miner = GitMiner::for_project(Project::Ofbiz, types()).unwrap();
        let commits = miner.mine(dir.path(), &MiningOptions::default()).unwrap();
        assert_eq!(commits[0].change.modified, "2010-01-01 09:00:00 -0300");
    }

    #[test]
    fn siop_is_not_git_hosted() {
        let err = GitMiner::for_project(Project::Siop, IssueTypes::default()).err().unwrap();
        assert!(matches!(err, StratumError::Config(_)));
    }

    #[test]
    fn openmrs_ticket_keys() {
        let miner = GitMiner::for_project(Project::Openmrs, IssueTypes::default()).unwrap();
        let issue = miner.issue_for("TRUNK-42: and TRUNK-43");
        assert_eq!(issue.id, "TRUNK-42");
        assert_eq!(issue.kind, IssueKind::Unknown);
        assert!(miner.issue_for("OFBIZ-1").is_unattributed());
    }

    #[test]
    fn missing_repository_is_git_error() {
        let dir = tempfile::tempdir().unwrap();
        let miner = GitMiner::for_project(Project::Ofbiz, IssueTypes::default()).unwrap();
        let err = miner
            .mine(&dir.path().join("nope"), &MiningOptions::default())
            .unwrap_err();
        assert!(matches!(err, StratumError::Git(_)));
    }

    #[test]
    fn missing_issue_list_is_reported() {
        let err = IssueTypes::from_path(Path::new("/nonexistent/issues.csv")).unwrap_err();
        assert!(matches!(err, StratumError::FileNotFound(_)));
    }
}
