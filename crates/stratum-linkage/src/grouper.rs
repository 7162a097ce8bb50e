//! Monthly export loading and changeset grouping.
//!
//! The version-control export is one JSON file per calendar month. A logical
//! commit shows up as many raw changes sharing comment, author, and timestamp;
//! those collapse into one [`ChangesetGroup`] per normalized key.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use stratum_core::{Change, StratumError};

use crate::normalize::{KeyNormalizer, MonthName};

/// One exported change, as found in monthly dumps and change listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawChange {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub comment: String,
    /// Locale timestamp such as `15-mar-2010 02:30 PM`.
    #[serde(default, alias = "Modified")]
    pub modified: String,
    /// Opaque raw identifier.
    #[serde(default)]
    pub uuid: String,
    /// Touched files; only populated by change listings.
    #[serde(default)]
    pub changes: Vec<FileEntry>,
}

/// A file path inside a change listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileEntry {
    #[serde(default)]
    pub path: String,
}

/// Top-level shape of an export or change-listing document.
///
/// # Examples
///
/// ```
/// use stratum_linkage::grouper::ExportDocument;
///
/// let doc: ExportDocument = serde_json::from_str(
///     r#"{"changes":[{"author":"ana","comment":"x","modified":"15-mar-2010 02:30 PM","uuid":"_1"}]}"#,
/// ).unwrap();
/// assert_eq!(doc.changes[0].uuid, "_1");
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportDocument {
    #[serde(default)]
    pub changes: Vec<RawChange>,
}

impl ExportDocument {
    /// Every nested file path, in document order.
    pub fn file_paths(&self) -> Vec<String> {
        self.changes
            .iter()
            .flat_map(|change| change.changes.iter().map(|f| f.path.clone()))
            .collect()
    }
}

/// The changes read from one monthly export file.
#[derive(Debug, Clone)]
pub struct ExportBatch {
    /// File name (not path) of the export; it embeds the month.
    pub file_name: String,
    pub changes: Vec<RawChange>,
}

impl ExportBatch {
    /// Whether a change timestamped in `month` belongs to this file.
    ///
    /// Adjacent monthly exports overlap at their edges, so each file only
    /// contributes the changes of its own month. The file name must end in the
    /// locale abbreviation or the English month name.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_linkage::grouper::ExportBatch;
    /// use stratum_linkage::normalize::LocaleTables;
    ///
    /// let tables = LocaleTables::pt_br();
    /// let batch = ExportBatch { file_name: "siop-changesets-2010-March.json".into(), changes: vec![] };
    /// assert!(batch.covers(tables.month("mar").unwrap()));
    /// assert!(!batch.covers(tables.month("abr").unwrap()));
    /// ```
    pub fn covers(&self, month: &MonthName) -> bool {
        let name = self.file_name.to_lowercase();
        let stem = name.strip_suffix(".json").unwrap_or(&name);
        stem.ends_with(&month.abbrev) || stem.ends_with(&month.english.to_lowercase())
    }
}

/// Read every `*.json` export in `dir`, in file-name order.
///
/// # Errors
///
/// Returns [`StratumError::Export`] when a file is not a valid export and
/// [`StratumError::Io`] when it cannot be read.
pub fn load_exports(dir: &Path) -> Result<Vec<ExportBatch>, StratumError> {
    if !dir.is_dir() {
        return Err(StratumError::FileNotFound(dir.to_path_buf()));
    }
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped).join("*.json");
    let pattern = pattern.to_string_lossy();
    let mut paths = glob::glob(&pattern)
        .map_err(|e| StratumError::Config(format!("invalid export pattern {pattern}: {e}")))?
        .map(|entry| entry.map_err(|e| StratumError::Io(e.into_error())))
        .collect::<Result<Vec<PathBuf>, StratumError>>()?;
    paths.sort();

    let mut batches = Vec::with_capacity(paths.len());
    for path in paths {
        let content = std::fs::read_to_string(&path)?;
        let document: ExportDocument =
            serde_json::from_str(&content).map_err(|source| StratumError::Export {
                file: path.clone(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        tracing::debug!(file = %file_name, changes = document.changes.len(), "loaded export");
        batches.push(ExportBatch {
            file_name,
            changes: document.changes,
        });
    }
    Ok(batches)
}

/// Raw changes that collapse to one normalized key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesetGroup {
    pub key: String,
    /// Normalized comment of the first change seen.
    pub comment: String,
    pub author: String,
    /// Canonical `dd/mm/yyyy HH:MM` timestamp.
    pub modified: String,
    /// Raw identifiers in scan order.
    pub raw_ids: Vec<String>,
}

impl ChangesetGroup {
    pub fn to_change(&self) -> Change {
        Change {
            author: self.author.clone(),
            comment: self.comment.clone(),
            modified: self.modified.clone(),
            raw_ids: self.raw_ids.clone(),
        }
    }
}

/// Groups keyed by normalized key, plus a raw-id side index.
#[derive(Debug, Clone, Default)]
pub struct ChangesetIndex {
    groups: BTreeMap<String, ChangesetGroup>,
    by_raw_id: HashMap<String, String>,
    skipped: usize,
}

impl ChangesetIndex {
    pub fn get(&self, key: &str) -> Option<&ChangesetGroup> {
        self.groups.get(key)
    }

    /// Groups in key order.
    pub fn groups(&self) -> impl Iterator<Item = &ChangesetGroup> {
        self.groups.values()
    }

    /// Raw identifier to the key of the group it was folded into.
    pub fn raw_ids(&self) -> &HashMap<String, String> {
        &self.by_raw_id
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Changes ignored because they belong to another month's export.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Incrementally folds export batches into a [`ChangesetIndex`].
///
/// # Examples
///
/// ```
/// use stratum_linkage::grouper::{ChangesetGrouper, ExportBatch, RawChange};
/// use stratum_linkage::normalize::KeyNormalizer;
///
/// let normalizer = KeyNormalizer::default();
/// let change = |uuid: &str| RawChange {
///     author: "ana".into(),
///     comment: "fix".into(),
///     modified: "15-mar-2010 02:30 PM".into(),
///     uuid: uuid.into(),
///     changes: vec![],
/// };
/// let batch = ExportBatch {
///     file_name: "siop-2010-March.json".into(),
///     changes: vec![change("_a"), change("_b")],
/// };
///
/// let mut grouper = ChangesetGrouper::new(&normalizer);
/// grouper.add_batch(&batch).unwrap();
/// let index = grouper.finish();
/// assert_eq!(index.len(), 1);
/// assert_eq!(index.groups().next().unwrap().raw_ids, vec!["_a", "_b"]);
/// ```
pub struct ChangesetGrouper<'a> {
    normalizer: &'a KeyNormalizer,
    index: ChangesetIndex,
}

impl<'a> ChangesetGrouper<'a> {
    pub fn new(normalizer: &'a KeyNormalizer) -> Self {
        Self {
            normalizer,
            index: ChangesetIndex::default(),
        }
    }

    /// Fold one monthly batch into the index.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::InFile`] wrapping a timestamp error when a
    /// change carries a malformed timestamp.
    pub fn add_batch(&mut self, batch: &ExportBatch) -> Result<(), StratumError> {
        for change in &batch.changes {
            self.add_change(batch, change)
                .map_err(|e| StratumError::InFile {
                    file: PathBuf::from(&batch.file_name),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    fn add_change(&mut self, batch: &ExportBatch, change: &RawChange) -> Result<(), StratumError> {
        let normalizer = self.normalizer;
        let month = normalizer.month_of(&change.modified)?;
        if !batch.covers(month) {
            self.index.skipped += 1;
            return Ok(());
        }

        let key = normalizer.key(&change.comment, &change.author, &change.modified)?;

        match self.index.groups.get_mut(&key) {
            Some(group) => group.raw_ids.push(change.uuid.clone()),
            None => {
                let group = ChangesetGroup {
                    key: key.clone(),
                    comment: normalizer.normalize_comment(&change.comment),
                    author: change.author.clone(),
                    modified: normalizer.canonical_timestamp(&change.modified)?,
                    raw_ids: vec![change.uuid.clone()],
                };
                self.index.groups.insert(key.clone(), group);
            }
        }
        self.index.by_raw_id.insert(change.uuid.clone(), key);
        Ok(())
    }

    pub fn finish(self) -> ChangesetIndex {
        tracing::info!(
            groups = self.index.groups.len(),
            raw_changes = self.index.by_raw_id.len(),
            skipped = self.index.skipped,
            "grouped changesets"
        );
        self.index
    }
}

/// Group every batch in order.
///
/// # Errors
///
/// See [`ChangesetGrouper::add_batch`].
pub fn group_changesets(
    normalizer: &KeyNormalizer,
    batches: &[ExportBatch],
) -> Result<ChangesetIndex, StratumError> {
    let mut grouper = ChangesetGrouper::new(normalizer);
    for batch in batches {
        grouper.add_batch(batch)?;
    }
    Ok(grouper.finish())
}
