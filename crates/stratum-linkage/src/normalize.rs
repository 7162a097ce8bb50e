//! Normalized join keys.
//!
//! A key is `lowercase("{comment} - {author} - {dd/mm/yyyy HH:MM}")`. Raw
//! exports carry a pt-BR, 12-hour timestamp that is canonicalized here; tracker
//! descriptors already carry the canonical form and only need their comment
//! reconstructed.

use std::collections::HashMap;

use stratum_core::StratumError;

/// Comments are compared on this many leading characters only; the tracker
/// export cuts them at the same length.
pub const COMMENT_LIMIT: usize = 56;

/// Separator between descriptor and key fields.
pub const FIELD_SEPARATOR: &str = " - ";

/// A month as it appears in export timestamps and export file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthName {
    /// Locale abbreviation used inside timestamps (`mar`).
    pub abbrev: String,
    /// Two-digit month number (`03`).
    pub number: String,
    /// English name used in export file names (`March`).
    pub english: String,
}

/// Immutable locale tables driving timestamp canonicalization.
///
/// # Examples
///
/// ```
/// use stratum_linkage::normalize::LocaleTables;
///
/// let tables = LocaleTables::pt_br();
/// assert_eq!(tables.month("ABR").unwrap().number, "04");
/// assert_eq!(tables.pm_hour("03"), Some("15"));
/// assert_eq!(tables.pm_hour("12"), Some("12"));
/// ```
#[derive(Debug, Clone)]
pub struct LocaleTables {
    months: Vec<MonthName>,
    pm_hours: HashMap<String, String>,
    no_comment: String,
}

impl LocaleTables {
    /// Tables for the Brazilian Portuguese export locale.
    pub fn pt_br() -> Self {
        const MONTHS: [(&str, &str); 12] = [
            ("jan", "January"),
            ("fev", "February"),
            ("mar", "March"),
            ("abr", "April"),
            ("mai", "May"),
            ("jun", "June"),
            ("jul", "July"),
            ("ago", "August"),
            ("set", "September"),
            ("out", "October"),
            ("nov", "November"),
            ("dez", "December"),
        ];
        let months = MONTHS
            .iter()
            .enumerate()
            .map(|(i, (abbrev, english))| MonthName {
                abbrev: (*abbrev).into(),
                number: format!("{:02}", i + 1),
                english: (*english).into(),
            })
            .collect();

        // 12 PM stays 12; 12 AM is handled separately.
        let pm_hours = (1..=12u8)
            .map(|h| {
                let to = if h == 12 { 12 } else { h + 12 };
                (format!("{h:02}"), format!("{to:02}"))
            })
            .collect();

        Self {
            months,
            pm_hours,
            no_comment: "<nenhum comentário>".into(),
        }
    }

    /// Look up a month by its locale abbreviation, ignoring case.
    pub fn month(&self, abbrev: &str) -> Option<&MonthName> {
        let abbrev = abbrev.to_lowercase();
        self.months.iter().find(|m| m.abbrev == abbrev)
    }

    /// Translate a two-digit PM hour to 24-hour form.
    pub fn pm_hour(&self, hour: &str) -> Option<&str> {
        self.pm_hours.get(hour).map(String::as_str)
    }

    /// The sentinel both sources use for an empty comment.
    pub fn no_comment(&self) -> &str {
        &self.no_comment
    }
}

impl Default for LocaleTables {
    fn default() -> Self {
        Self::pt_br()
    }
}

/// Builds normalized keys from raw changes and tracker descriptors.
///
/// # Examples
///
/// ```
/// use stratum_linkage::normalize::KeyNormalizer;
///
/// let normalizer = KeyNormalizer::default();
/// let key = normalizer.key("Fix Login", "Ana", "15-mar-2010 02:30 PM").unwrap();
/// assert_eq!(key, "fix login - ana - 15/03/2010 14:30");
///
/// let from_tracker = normalizer
///     .descriptor_key("1042 - Fix Login - Ana - 15/03/2010 14:30")
///     .unwrap();
/// assert_eq!(from_tracker, key);
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyNormalizer {
    tables: LocaleTables,
}

impl KeyNormalizer {
    pub fn new(tables: LocaleTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &LocaleTables {
        &self.tables
    }

    /// Truncate to [`COMMENT_LIMIT`] characters and blank the "no comment" sentinel.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_linkage::normalize::KeyNormalizer;
    ///
    /// let n = KeyNormalizer::default();
    /// assert_eq!(n.normalize_comment("<NENHUM COMENTÁRIO>"), "");
    /// assert_eq!(n.normalize_comment(&"x".repeat(80)).len(), 56);
    /// ```
    pub fn normalize_comment(&self, comment: &str) -> String {
        let truncated: String = comment.chars().take(COMMENT_LIMIT).collect();
        if truncated.to_lowercase() == self.tables.no_comment().to_lowercase() {
            String::new()
        } else {
            truncated
        }
    }

    /// Convert an export timestamp to `dd/mm/yyyy HH:MM`.
    ///
    /// Accepts `DD-mon-YYYY HH:MM AM|PM` and `YYYY-mon-DD HH:MM AM|PM`.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::Timestamp`] for any other shape, an unknown
    /// month, or an out-of-range clock.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_linkage::normalize::KeyNormalizer;
    ///
    /// let n = KeyNormalizer::default();
    /// assert_eq!(n.canonical_timestamp("2010-mar-15 02:30 PM").unwrap(), "15/03/2010 14:30");
    /// assert_eq!(n.canonical_timestamp("2010-jan-01 12:15 AM").unwrap(), "01/01/2010 00:15");
    /// assert!(n.canonical_timestamp("2010-03-15T14:30").is_err());
    /// ```
    pub fn canonical_timestamp(&self, raw: &str) -> Result<String, StratumError> {
        let parts = self.split_timestamp(raw)?;
        let malformed = || StratumError::Timestamp(raw.to_string());

        if !is_digits(parts.hour, 1..=2) || !is_minute(parts.minute) {
            return Err(malformed());
        }
        let hour: u8 = parts.hour.parse().map_err(|_| malformed())?;
        if !(1..=12).contains(&hour) {
            return Err(malformed());
        }
        let hour = format!("{hour:02}");

        let hour = match parts.meridiem.to_uppercase().as_str() {
            "AM" if hour == "12" => "00".to_string(),
            "AM" => hour,
            "PM" => self.tables.pm_hour(&hour).ok_or_else(malformed)?.to_string(),
            _ => return Err(malformed()),
        };

        Ok(format!(
            "{:0>2}/{}/{} {}:{}",
            parts.day, parts.month.number, parts.year, hour, parts.minute
        ))
    }

    /// The month a raw timestamp falls in.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::Timestamp`] when the timestamp is malformed.
    pub fn month_of(&self, raw: &str) -> Result<&MonthName, StratumError> {
        Ok(self.split_timestamp(raw)?.month)
    }

    /// Build the key for a raw exported change.
    ///
    /// # Errors
    ///
    /// Returns [`StratumError::Timestamp`] when `timestamp` is malformed.
    pub fn key(&self, comment: &str, author: &str, timestamp: &str) -> Result<String, StratumError> {
        let modified = self.canonical_timestamp(timestamp)?;
        Ok(compose_key(&self.normalize_comment(comment), author, &modified))
    }

    /// Rebuild the key from a tracker changeset descriptor.
    ///
    /// Descriptors look like `{prefix} - {comment} - {author} - {time}`, where
    /// the comment may itself contain the separator. Everything between the
    /// first segment and the last two is the comment. Returns `None` when there
    /// are fewer than three segments.
    ///
    /// # Examples
    ///
    /// ```
    /// use stratum_linkage::normalize::KeyNormalizer;
    ///
    /// let n = KeyNormalizer::default();
    /// let key = n.descriptor_key("77 - merge - part 2 - Bia - 02/04/2010 09:05").unwrap();
    /// assert_eq!(key, "merge - part 2 - bia - 02/04/2010 09:05");
    /// assert!(n.descriptor_key("just text").is_none());
    /// ```
    pub fn descriptor_key(&self, descriptor: &str) -> Option<String> {
        let segments: Vec<&str> = descriptor.split(FIELD_SEPARATOR).collect();
        let n = segments.len();
        if n < 3 {
            return None;
        }
        let comment = segments[1..n - 2].join(FIELD_SEPARATOR);
        Some(compose_key(
            &self.normalize_comment(&comment),
            segments[n - 2],
            segments[n - 1],
        ))
    }

    fn split_timestamp<'a>(&self, raw: &'a str) -> Result<TimestampParts<'a, '_>, StratumError> {
        let malformed = || StratumError::Timestamp(raw.to_string());

        let fields: Vec<&str> = raw.split_whitespace().collect();
        let &[date, clock, meridiem] = fields.as_slice() else {
            return Err(malformed());
        };

        let date: Vec<&str> = date.split('-').collect();
        let &[first, month, last] = date.as_slice() else {
            return Err(malformed());
        };
        let (day, year) = if first.len() == 4 {
            (last, first)
        } else {
            (first, last)
        };
        if !is_digits(day, 1..=2) || !is_digits(year, 4..=4) {
            return Err(malformed());
        }
        let month = self.tables.month(month).ok_or_else(malformed)?;

        let Some((hour, minute)) = clock.split_once(':') else {
            return Err(malformed());
        };

        Ok(TimestampParts {
            day,
            month,
            year,
            hour,
            minute,
            meridiem,
        })
    }
}

struct TimestampParts<'a, 't> {
    day: &'a str,
    month: &'t MonthName,
    year: &'a str,
    hour: &'a str,
    minute: &'a str,
    meridiem: &'a str,
}

/// Join already-normalized fields into a key.
pub fn compose_key(comment: &str, author: &str, modified: &str) -> String {
    format!("{comment}{FIELD_SEPARATOR}{author}{FIELD_SEPARATOR}{modified}").to_lowercase()
}

fn is_digits(s: &str, len: std::ops::RangeInclusive<usize>) -> bool {
    len.contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_minute(s: &str) -> bool {
    is_digits(s, 2..=2) && s < "60"
}
