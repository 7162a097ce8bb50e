//! One export directory in, one commit set out.

use std::path::Path;
use std::sync::Arc;

use stratum_core::{Commit, LinkageConfig, StratumConfig, StratumError};

use crate::attribution::{Attribution, AttributionConflict, AttributionResolver, UnresolvedReference};
use crate::files::{resolve_files, ChangeLister, ResolveOptions};
use crate::grouper::{group_changesets, load_exports};
use crate::normalize::KeyNormalizer;
use crate::tracker::TrackerData;

/// Attribution of every changeset group found in an export directory.
#[derive(Debug, Clone, Default)]
pub struct Linkage {
    pub attribution: Attribution,
    /// Raw changes ignored by the month guard.
    pub skipped: usize,
}

/// Group the monthly exports in `dir` and attribute them from its tracker CSVs.
///
/// # Errors
///
/// Propagates malformed exports, tracker rows, and timestamps, plus
/// unresolved references when `config.strict_references` is set.
pub fn link(dir: &Path, config: &LinkageConfig) -> Result<Linkage, StratumError> {
    let normalizer = KeyNormalizer::default();
    let resolver = AttributionResolver::from_config(normalizer, config)?;

    let batches = load_exports(dir)?;
    if batches.is_empty() {
        tracing::warn!(dir = %dir.display(), "no monthly exports found");
    }
    let index = group_changesets(resolver.normalizer(), &batches)?;
    let tracker = TrackerData::load(dir, &config.files)?;
    let attribution = resolver.resolve(&index, &tracker)?;

    Ok(Linkage {
        attribution,
        skipped: index.skipped(),
    })
}

/// Final output of the linkage pipeline.
#[derive(Debug, Clone, Default)]
pub struct Consolidation {
    /// One commit per changeset key, in key order.
    pub commits: Vec<Commit>,
    pub conflicts: Vec<AttributionConflict>,
    pub unresolved: Vec<UnresolvedReference>,
    pub skipped: usize,
}

/// Link `dir` and expand every commit's raw identifiers through `lister`.
///
/// # Errors
///
/// Everything [`link`] returns, plus the first change-listing failure.
pub async fn consolidate<L: ChangeLister>(
    dir: &Path,
    config: &StratumConfig,
    lister: Arc<L>,
    on_progress: impl FnMut(usize, usize),
) -> Result<Consolidation, StratumError> {
    let Linkage {
        attribution,
        skipped,
    } = link(dir, &config.linkage)?;
    let Attribution {
        changesets,
        conflicts,
        unresolved,
    } = attribution;

    let options = ResolveOptions::from_config(&config.resolver);
    let commits = resolve_files(changesets, lister, &options, on_progress).await?;

    Ok(Consolidation {
        commits,
        conflicts,
        unresolved,
        skipped,
    })
}
