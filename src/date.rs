use std::cmp::Ordering;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

// Four-digit year, then optional one- or two-digit month and day. chrono alone also takes
// signed and short years.
static DATE_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}(?:/\d{1,2}(?:/\d{1,2})?)?$").unwrap());

/// Comparable form of a record's "Publication date".
///
/// Partial dates are anchored to the first day of the missing unit, so `2021/05` compares as
/// `2021-05-01` and `2021` as `2021-01-01`.
pub type ParsedDate = NaiveDate;

/// Direction in which each bucket of the output is sorted.
///
/// Undated records always end up at the bottom of a bucket: newest-first sorting substitutes the
/// earliest representable date for them, oldest-first sorting the latest one.
#[derive(clap::ValueEnum, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Most recent publications first.
    #[default]
    Newest,
    /// Oldest publications first.
    Oldest,
}

impl SortOrder {
    /// Value substituted for missing or unparsable dates.
    pub fn sentinel(self) -> ParsedDate {
        match self {
            SortOrder::Newest => NaiveDate::MIN,
            SortOrder::Oldest => NaiveDate::MAX,
        }
    }

    /// Sort key for a raw date string, falling back to [`Self::sentinel`].
    pub fn sort_key(self, date: Option<&str>) -> ParsedDate {
        date.and_then(parse_date).unwrap_or(self.sentinel())
    }

    /// Compare two keys in this direction.
    pub fn compare(self, a: &ParsedDate, b: &ParsedDate) -> Ordering {
        match self {
            SortOrder::Newest => b.cmp(a),
            SortOrder::Oldest => a.cmp(b),
        }
    }
}

/// Parse a scholar-style date: `YYYY/MM/DD`, `YYYY/MM` or `YYYY`, tried in that order.
pub fn parse_date(raw: &str) -> Option<ParsedDate> {
    let s = raw.trim();
    if !DATE_SHAPE_RE.is_match(s) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y/%m/%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{s}/01"), "%Y/%m/%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{s}/01/01"), "%Y/%m/%d"))
        .ok()
}
