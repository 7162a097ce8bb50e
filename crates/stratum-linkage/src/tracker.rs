//! Positional readers for the issue-tracker CSV exports.
//!
//! The tracker export has no stable header names, so columns are read by
//! position. Any row whose second column is the literal `Id` is a header and
//! is skipped.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use stratum_core::{IssueKind, StratumError, TrackerFiles};

const HEADER_MARKER: &str = "Id";

const DEFECT_ID: usize = 1;
const DEFECT_FEATURE: usize = 3;
const DEFECT_CHANGESETS: usize = 4;

const STORY_ID: usize = 8;
const STORY_CHANGESETS: usize = 9;

const FEATURE_STORY_ID: usize = 1;
const FEATURE_NAME: usize = 10;

const ISSUE_ID: usize = 0;
const ISSUE_BUG_FLAG: usize = 1;

/// A defect row: its own feature plus the changesets that fixed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectRow {
    pub id: String,
    pub feature: String,
    pub descriptors: Vec<String>,
}

/// A story row; its feature comes from the feature export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRow {
    pub id: String,
    pub descriptors: Vec<String>,
}

/// Everything the attribution step needs from the tracker.
#[derive(Debug, Clone, Default)]
pub struct TrackerData {
    pub defects: Vec<DefectRow>,
    pub stories: Vec<StoryRow>,
    /// Story id to feature name.
    pub features: HashMap<String, String>,
    /// Issue id to kind, for comments that only mention a ticket.
    pub issue_kinds: HashMap<String, IssueKind>,
}

impl TrackerData {
    /// Read the four tracker exports from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::FileNotFound`] for a missing file,
    /// [`StratumError::Csv`] for CSV syntax errors, and
    /// [`StratumError::Tracker`] for rows lacking required columns.
    pub fn load(dir: &Path, files: &TrackerFiles) -> Result<Self, StratumError> {
        let data = Self {
            defects: read_defects(&dir.join(&files.defects))?,
            stories: read_stories(&dir.join(&files.stories))?,
            features: read_features(&dir.join(&files.features))?,
            issue_kinds: read_issue_kinds(&dir.join(&files.issues))?,
        };
        tracing::info!(
            defects = data.defects.len(),
            stories = data.stories.len(),
            features = data.features.len(),
            issues = data.issue_kinds.len(),
            "loaded tracker exports"
        );
        Ok(data)
    }
}

pub fn read_defects(path: &Path) -> Result<Vec<DefectRow>, StratumError> {
    parse_defects(open(path)?, path)
}

pub fn read_stories(path: &Path) -> Result<Vec<StoryRow>, StratumError> {
    parse_stories(open(path)?, path)
}

pub fn read_features(path: &Path) -> Result<HashMap<String, String>, StratumError> {
    parse_features(open(path)?, path)
}

pub fn read_issue_kinds(path: &Path) -> Result<HashMap<String, IssueKind>, StratumError> {
    parse_issue_kinds(open(path)?, path)
}

/// Parse defect rows; `file` is only used in error messages.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use stratum_linkage::tracker::parse_defects;
///
/// let csv = "Type,Id,Summary,Feature,Changesets\n\
///            Defect,301,Crash,Billing: invoices,\"9 - fix - ana - 15/03/2010 14:30\"\n";
/// let rows = parse_defects(csv.as_bytes(), Path::new("defects.csv")).unwrap();
/// assert_eq!(rows[0].id, "301");
/// assert_eq!(rows[0].feature, "Billing");
/// assert_eq!(rows[0].descriptors.len(), 1);
/// ```
pub fn parse_defects<R: Read>(reader: R, file: &Path) -> Result<Vec<DefectRow>, StratumError> {
    let mut rows = Vec::new();
    for_each_row(reader, file, DEFECT_CHANGESETS + 1, |record| {
        rows.push(DefectRow {
            id: record[DEFECT_ID].to_string(),
            feature: feature_name(&record[DEFECT_FEATURE]),
            descriptors: split_descriptors(&record[DEFECT_CHANGESETS]),
        });
    })?;
    Ok(rows)
}

/// Parse story rows. The id column carries a one-character prefix (`#812`).
pub fn parse_stories<R: Read>(reader: R, file: &Path) -> Result<Vec<StoryRow>, StratumError> {
    let mut rows = Vec::new();
    for_each_row(reader, file, STORY_CHANGESETS + 1, |record| {
        rows.push(StoryRow {
            id: strip_prefix_char(&record[STORY_ID]),
            descriptors: split_descriptors(&record[STORY_CHANGESETS]),
        });
    })?;
    Ok(rows)
}

/// Parse the story id to feature name mapping.
pub fn parse_features<R: Read>(
    reader: R,
    file: &Path,
) -> Result<HashMap<String, String>, StratumError> {
    let mut features = HashMap::new();
    for_each_row(reader, file, FEATURE_NAME + 1, |record| {
        features.insert(
            record[FEATURE_STORY_ID].to_string(),
            feature_name(&record[FEATURE_NAME]),
        );
    })?;
    Ok(features)
}

/// Parse the flat issue list; a bug flag of `1` marks a defect.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use stratum_core::IssueKind;
/// use stratum_linkage::tracker::parse_issue_kinds;
///
/// let kinds = parse_issue_kinds("301,1\n812,0\n".as_bytes(), Path::new("issues.csv")).unwrap();
/// assert_eq!(kinds["301"], IssueKind::Bug);
/// assert_eq!(kinds["812"], IssueKind::Story);
/// ```
pub fn parse_issue_kinds<R: Read>(
    reader: R,
    file: &Path,
) -> Result<HashMap<String, IssueKind>, StratumError> {
    let mut kinds = HashMap::new();
    for_each_row(reader, file, ISSUE_BUG_FLAG + 1, |record| {
        let kind = if &record[ISSUE_BUG_FLAG] == "1" {
            IssueKind::Bug
        } else {
            IssueKind::Story
        };
        kinds.insert(record[ISSUE_ID].to_string(), kind);
    })?;
    Ok(kinds)
}

/// Split a descriptor cell into one descriptor per non-blank line.
pub fn split_descriptors(cell: &str) -> Vec<String> {
    cell.split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(String::from)
        .collect()
}

/// `"Billing: invoices"` names the feature `"Billing"`.
pub fn feature_name(cell: &str) -> String {
    cell.split(':').next().unwrap_or_default().to_string()
}

fn strip_prefix_char(cell: &str) -> String {
    let mut chars = cell.chars();
    chars.next();
    chars.as_str().to_string()
}

fn open(path: &Path) -> Result<std::fs::File, StratumError> {
    std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StratumError::FileNotFound(path.to_path_buf()),
        _ => StratumError::Io(e),
    })
}

fn for_each_row<R: Read>(
    reader: R,
    file: &Path,
    min_columns: usize,
    mut f: impl FnMut(&csv::StringRecord),
) -> Result<(), StratumError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.get(1) == Some(HEADER_MARKER) {
            continue;
        }
        if record.len() < min_columns {
            return Err(StratumError::Tracker {
                file: PathBuf::from(file),
                message: format!(
                    "row {} has {} columns, expected at least {min_columns}",
                    row + 1,
                    record.len()
                ),
            });
        }
        f(&record);
    }
    Ok(())
}
