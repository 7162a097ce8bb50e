//! Expanding raw change identifiers into touched file paths.
//!
//! The version-control export does not list files, so each raw identifier is
//! sent to an external change-listing command. Calls run concurrently on the
//! tokio runtime, bounded by a semaphore, each under its own timeout. Any
//! failure aborts the whole resolution.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use stratum_core::{Commit, ResolverConfig, StratumError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::attribution::AttributedChangeset;
use crate::grouper::ExportDocument;

const ID_PLACEHOLDER: &str = "{id}";

/// Capability to list the files touched by one raw change.
pub trait ChangeLister: Send + Sync + 'static {
    /// File paths of `raw_id`, in listing order.
    fn list_files(
        &self,
        raw_id: &str,
    ) -> impl Future<Output = Result<Vec<String>, StratumError>> + Send;
}

/// Runs an external command per raw identifier and decodes its JSON output.
///
/// # Examples
///
/// ```
/// use stratum_linkage::files::CommandLister;
///
/// let lister = CommandLister::new(vec!["lscm".into(), "list".into(), "{id}".into()]).unwrap();
/// assert_eq!(lister.argv("_abc"), vec!["lscm", "list", "_abc"]);
/// ```
#[derive(Debug, Clone)]
pub struct CommandLister {
    command: Vec<String>,
}

impl CommandLister {
    /// # Errors
    ///
    /// Returns [`StratumError::Config`] for an empty command.
    pub fn new(command: Vec<String>) -> Result<Self, StratumError> {
        if command.is_empty() {
            return Err(StratumError::Config("resolver.command is empty".into()));
        }
        Ok(Self { command })
    }

    pub fn from_config(config: &ResolverConfig) -> Result<Self, StratumError> {
        Self::new(config.command.clone())
    }

    /// The command line for `raw_id`, placeholder substituted.
    pub fn argv(&self, raw_id: &str) -> Vec<String> {
        self.command
            .iter()
            .map(|arg| arg.replace(ID_PLACEHOLDER, raw_id))
            .collect()
    }
}

impl ChangeLister for CommandLister {
    async fn list_files(&self, raw_id: &str) -> Result<Vec<String>, StratumError> {
        let service_error = |message: String| StratumError::Service {
            raw_id: raw_id.to_string(),
            message,
        };

        let argv = self.argv(raw_id);
        let Some((program, args)) = argv.split_first() else {
            return Err(service_error("empty command".into()));
        };

        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| service_error(format!("failed to run {program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(service_error(format!("{}: {}", output.status, stderr.trim())));
        }

        let document: ExportDocument = serde_json::from_slice(&output.stdout)
            .map_err(|e| service_error(format!("malformed listing: {e}")))?;
        Ok(document.file_paths())
    }
}

/// Concurrency and timeout for [`resolve_files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self::from_config(&ResolverConfig::default())
    }
}

impl ResolveOptions {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Expand every changeset into a [`Commit`].
///
/// Output order follows `changesets`; each commit's files are the
/// concatenation of its raw identifiers' listings in raw-id order, so the
/// result does not depend on `options.concurrency`. `on_progress` receives
/// `(completed, total)` after each call.
///
/// # Errors
///
/// Returns the first [`StratumError::Service`] produced by a failed,
/// panicked, or timed-out call. Outstanding calls are aborted.
pub async fn resolve_files<L: ChangeLister>(
    changesets: Vec<AttributedChangeset>,
    lister: Arc<L>,
    options: &ResolveOptions,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<Vec<Commit>, StratumError> {
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let timeout = options.timeout;

    let mut listings: Vec<Vec<Vec<String>>> = changesets
        .iter()
        .map(|c| vec![Vec::new(); c.group.raw_ids.len()])
        .collect();
    let total: usize = listings.iter().map(Vec::len).sum();

    let mut set = JoinSet::new();
    for (commit_idx, changeset) in changesets.iter().enumerate() {
        for (raw_idx, raw_id) in changeset.group.raw_ids.iter().enumerate() {
            let lister = Arc::clone(&lister);
            let semaphore = Arc::clone(&semaphore);
            let raw_id = raw_id.clone();
            set.spawn(async move {
                let result = list_one(lister.as_ref(), &semaphore, &raw_id, timeout).await;
                (commit_idx, raw_idx, raw_id, result)
            });
        }
    }
    tracing::info!(
        commits = changesets.len(),
        calls = total,
        concurrency = options.concurrency,
        "resolving files"
    );

    let mut done = 0;
    while let Some(joined) = set.join_next().await {
        let (commit_idx, raw_idx, raw_id, result) = joined.map_err(|e| StratumError::Service {
            raw_id: "<unknown>".into(),
            message: format!("listing task failed: {e}"),
        })?;
        let files = result?;
        tracing::debug!(raw_id = %raw_id, files = files.len(), "listed change");
        listings[commit_idx][raw_idx] = files;
        done += 1;
        on_progress(done, total);
    }

    Ok(changesets
        .into_iter()
        .zip(listings)
        .map(|(changeset, files)| changeset.into_commit(files.concat()))
        .collect())
}

async fn list_one<L: ChangeLister>(
    lister: &L,
    semaphore: &Semaphore,
    raw_id: &str,
    timeout: Duration,
) -> Result<Vec<String>, StratumError> {
    let _permit = semaphore
        .acquire()
        .await
        .map_err(|e| StratumError::Service {
            raw_id: raw_id.to_string(),
            message: e.to_string(),
        })?;
    match tokio::time::timeout(timeout, lister.list_files(raw_id)).await {
        Ok(result) => result,
        Err(_) => Err(StratumError::Service {
            raw_id: raw_id.to_string(),
            message: format!("timed out after {}s", timeout.as_secs_f64()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use stratum_core::{Issue, IssueKind};

    use super::*;
    use crate::attribution::AttributionRecord;
    use crate::grouper::ChangesetGroup;

    struct StubLister {
        files: HashMap<String, Vec<String>>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl StubLister {
        fn new<'a>(entries: impl IntoIterator<Item = (&'a str, Vec<&'a str>)>) -> Self {
            Self {
                files: entries
                    .into_iter()
                    .map(|(id, files)| {
                        (id.to_string(), files.into_iter().map(String::from).collect())
                    })
                    .collect(),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl ChangeLister for StubLister {
        async fn list_files(&self, raw_id: &str) -> Result<Vec<String>, StratumError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.files
                .get(raw_id)
                .cloned()
                .ok_or_else(|| StratumError::Service {
                    raw_id: raw_id.to_string(),
                    message: "exit status: 1".into(),
                })
        }
    }

    fn changeset(key: &str, raw_ids: &[&str]) -> AttributedChangeset {
        AttributedChangeset {
            group: ChangesetGroup {
                key: key.into(),
                comment: key.into(),
                author: "ana".into(),
                modified: "15/03/2010 14:30".into(),
                raw_ids: raw_ids.iter().map(|s| s.to_string()).collect(),
            },
            attribution: AttributionRecord {
                feature: "Billing".into(),
                issue: Issue::new("301", IssueKind::Bug),
            },
        }
    }

    fn options(concurrency: usize) -> ResolveOptions {
        ResolveOptions {
            concurrency,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn files_concatenate_in_raw_id_order() {
        let lister = Arc::new(StubLister::new(vec![
            ("_a", vec!["siop/siop-war/a.xhtml", "siop/siop-jpa/A.java"]),
            ("_b", vec!["siop/siop-war/a.xhtml"]),
            ("_c", vec![]),
        ]));
        let commits = resolve_files(
            vec![changeset("one", &["_a", "_b"]), changeset("two", &["_c"])],
            lister,
            &options(4),
            |_, _| {},
        )
        .await
        .unwrap();

        assert_eq!(commits.len(), 2);
        assert_eq!(
            commits[0].files,
            vec![
                "siop/siop-war/a.xhtml",
                "siop/siop-jpa/A.java",
                "siop/siop-war/a.xhtml"
            ]
        );
        assert!(commits[1].files.is_empty());
        assert_eq!(commits[0].feature, "Billing");
        assert_eq!(commits[0].change.raw_ids, vec!["_a", "_b"]);
    }

    #[tokio::test]
    async fn output_is_independent_of_concurrency() {
        let entries: Vec<(String, Vec<&str>)> = (0..12)
            .map(|i| (format!("_{i}"), vec!["siop/siop-ejb/X.java", "siop/siop-war/y.xhtml"]))
            .collect();
        let refs = || entries.iter().map(|(id, files)| (id.as_str(), files.clone()));
        let changesets = || {
            vec![
                changeset("a", &["_0", "_1", "_2", "_3"]),
                changeset("b", &["_4", "_5"]),
                changeset("c", &["_6", "_7", "_8", "_9", "_10", "_11"]),
            ]
        };

        let serial = resolve_files(
            changesets(),
            Arc::new(StubLister::new(refs())),
            &options(1),
            |_, _| {},
        )
        .await
        .unwrap();
        let parallel = resolve_files(
            changesets(),
            Arc::new(StubLister::new(refs()).with_delay(Duration::from_millis(2))),
            &options(8),
            |_, _| {},
        )
        .await
        .unwrap();
        assert_eq!(serial, parallel);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let ids: Vec<String> = (0..10).map(|i| format!("_{i}")).collect();
        let lister = Arc::new(
            StubLister::new(ids.iter().map(|id| (id.as_str(), vec![])))
                .with_delay(Duration::from_millis(5)),
        );
        let raw: Vec<&str> = ids.iter().map(String::as_str).collect();

        resolve_files(
            vec![changeset("a", &raw)],
            Arc::clone(&lister),
            &options(3),
            |_, _| {},
        )
        .await
        .unwrap();
        assert!(lister.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn progress_reports_every_call() {
        let lister = Arc::new(StubLister::new(vec![("_a", vec![]), ("_b", vec![]), ("_c", vec![])]));
        let mut seen = Vec::new();
        resolve_files(
            vec![changeset("a", &["_a", "_b"]), changeset("b", &["_c"])],
            lister,
            &options(2),
            |done, total| seen.push((done, total)),
        )
        .await
        .unwrap();
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn failure_aborts_resolution() {
        let lister = Arc::new(StubLister::new(vec![("_a", vec!["x"])]));
        let err = resolve_files(
            vec![changeset("a", &["_a", "_missing"])],
            lister,
            &options(2),
            |_, _| {},
        )
        .await
        .unwrap_err();
        match err {
            StratumError::Service { raw_id, .. } => assert_eq!(raw_id, "_missing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let lister = Arc::new(StubLister::new(vec![("_a", vec![])]).with_delay(Duration::from_secs(2)));
        let options = ResolveOptions {
            concurrency: 1,
            timeout: Duration::from_millis(20),
        };
        let err = resolve_files(vec![changeset("a", &["_a"])], lister, &options, |_, _| {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn options_follow_config() {
        let config = ResolverConfig {
            concurrency: 3,
            timeout_secs: 9,
            ..ResolverConfig::default()
        };
        let options = ResolveOptions::from_config(&config);
        assert_eq!(options.concurrency, 3);
        assert_eq!(options.timeout, Duration::from_secs(9));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_lister_decodes_stdout() {
        let lister = CommandLister::new(vec![
            "sh".into(),
            "-c".into(),
            r#"printf '{"changes":[{"changes":[{"path":"/siop/siop-war/%s.xhtml"}]}]}' "$0""#
                .into(),
            "{id}".into(),
        ])
        .unwrap();
        let files = lister.list_files("page").await.unwrap();
        assert_eq!(files, vec!["/siop/siop-war/page.xhtml"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_lister_rejects_nonzero_exit() {
        let lister = CommandLister::new(vec![
            "sh".into(),
            "-c".into(),
            "echo boom >&2; exit 3".into(),
            "{id}".into(),
        ])
        .unwrap();
        let err = lister.list_files("_a").await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("_a"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandLister::new(vec![]).is_err());
    }
}
