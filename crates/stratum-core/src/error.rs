use std::path::PathBuf;

/// Errors that can occur across Stratum.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette` diagnostics at the boundary.
///
/// # Examples
///
/// ```
/// use stratum_core::StratumError;
///
/// let err = StratumError::Timestamp("15-xyz-2010 02:30 PM".into());
/// assert!(err.to_string().contains("15-xyz-2010"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StratumError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// A change timestamp in neither of the accepted export shapes.
    #[error("malformed timestamp: {0:?}")]
    Timestamp(String),

    /// A monthly export file that could not be decoded.
    #[error("malformed export {}: {source}", .file.display())]
    Export {
        /// Offending export file.
        file: PathBuf,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// A tracker CSV row missing the columns it should carry.
    #[error("malformed tracker file {}: {message}", .file.display())]
    Tracker {
        /// Offending CSV file.
        file: PathBuf,
        /// What was wrong with the row.
        message: String,
    },

    /// A record-level failure, annotated with the input file it came from.
    #[error("{}: {source}", .file.display())]
    InFile {
        /// File holding the offending record.
        file: PathBuf,
        /// What went wrong with the record.
        source: Box<StratumError>,
    },

    /// CSV syntax failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A tracker row references a changeset that was never exported.
    #[error("changeset not found for key {key:?}")]
    UnresolvedReference {
        /// The key derived from the tracker row.
        key: String,
    },

    /// The external change-listing service failed for one raw identifier.
    #[error("change listing failed for {raw_id}: {message}")]
    Service {
        /// Raw change identifier that was being expanded.
        raw_id: String,
        /// Exit status, stderr, or timeout description.
        message: String,
    },

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: StratumError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = StratumError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn tracker_error_names_file() {
        let err = StratumError::Tracker {
            file: PathBuf::from("dump/defects.csv"),
            message: "row 3 has 2 columns, expected at least 5".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("dump/defects.csv"));
        assert!(msg.contains("row 3"));
    }

    #[test]
    fn in_file_wraps_inner_error() {
        let err = StratumError::InFile {
            file: PathBuf::from("siop-changesets-2010-March.json"),
            source: Box::new(StratumError::Timestamp("yesterday".into())),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("siop-changesets-2010-March.json: "));
        assert!(msg.contains("yesterday"));
    }

    #[test]
    fn unresolved_reference_shows_key() {
        let err = StratumError::UnresolvedReference {
            key: "fix login - ana - 15/03/2010 14:30".into(),
        };
        assert!(err.to_string().contains("fix login - ana"));
    }

    #[test]
    fn service_error_shows_raw_id() {
        let err = StratumError::Service {
            raw_id: "_abc123".into(),
            message: "exit status: 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "change listing failed for _abc123: exit status: 1"
        );
    }
}
