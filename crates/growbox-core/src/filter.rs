//! Client-side filtering of operation-log records.
//!
//! The server narrows records by date, device, status and reason. Two
//! filters it does not support run locally, in this order:
//!
//! 1. a duration predicate such as `>5` (minutes), see [`DurationPredicate`]
//! 2. a case-insensitive free-text search, see [`matches_free_text`]

use std::fmt;

use growbox_types::HistoryRecord;

/// Comparison operator of a duration predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationOp {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

impl DurationOp {
    /// Operators in match order: two-character operators before their
    /// one-character prefixes.
    pub const MATCH_ORDER: [DurationOp; 5] = [
        DurationOp::Ge,
        DurationOp::Le,
        DurationOp::Gt,
        DurationOp::Lt,
        DurationOp::Eq,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            DurationOp::Ge => ">=",
            DurationOp::Le => "<=",
            DurationOp::Gt => ">",
            DurationOp::Lt => "<",
            DurationOp::Eq => "=",
        }
    }
}

impl fmt::Display for DurationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A parsed `<op><minutes>` duration filter.
///
/// ```
/// use growbox_core::filter::{DurationOp, DurationPredicate};
///
/// let p = DurationPredicate::parse(">=5").unwrap();
/// assert_eq!(p.op, DurationOp::Ge);
/// assert_eq!(p.seconds, 300);
///
/// assert!(p.matches(Some(300)));
/// assert!(!p.matches(None)); // running records fail inequalities
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationPredicate {
    pub op: DurationOp,
    /// Operand converted from minutes to seconds.
    pub seconds: i64,
}

impl DurationPredicate {
    /// Parse `<op><integer>`; the operator defaults to `=`.
    ///
    /// Returns `None` for empty or malformed input, which means "no filter".
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        let (op, rest) = DurationOp::MATCH_ORDER
            .into_iter()
            .find_map(|op| input.strip_prefix(op.symbol()).map(|rest| (op, rest)))
            .unwrap_or((DurationOp::Eq, input));
        let minutes: i64 = rest.trim().parse().ok()?;
        let seconds = minutes.checked_mul(60)?;
        Some(Self { op, seconds })
    }

    /// Whether a record with this duration passes.
    ///
    /// A running record (no duration) passes only `=0`.
    pub fn matches(&self, duration: Option<i64>) -> bool {
        let Some(d) = duration else {
            return self.op == DurationOp::Eq && self.seconds == 0;
        };
        match self.op {
            DurationOp::Ge => d >= self.seconds,
            DurationOp::Le => d <= self.seconds,
            DurationOp::Gt => d > self.seconds,
            DurationOp::Lt => d < self.seconds,
            DurationOp::Eq => d == self.seconds,
        }
    }
}

/// Whether `needle` (already lowercased) occurs in the record's display name,
/// reason or formatted start/end time.
pub fn matches_free_text(record: &HistoryRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let contains = |haystack: &str| haystack.to_lowercase().contains(needle);
    contains(record.display_device())
        || record.reason.as_deref().is_some_and(contains)
        || contains(&record.formatted_start())
        || contains(&record.formatted_end())
}

/// Apply the duration predicate, then the free-text search.
///
/// Malformed duration input applies no duration filter; empty search text
/// applies no search. Order of the input is preserved.
pub fn apply_client_filters(
    records: &[HistoryRecord],
    duration: Option<&str>,
    free_text: Option<&str>,
) -> Vec<HistoryRecord> {
    let predicate = duration.and_then(DurationPredicate::parse);
    let needle = free_text.map(str::to_lowercase).unwrap_or_default();

    records
        .iter()
        .filter(|r| predicate.is_none_or(|p| p.matches(r.duration)))
        .filter(|r| matches_free_text(r, &needle))
        .cloned()
        .collect()
}

/// Render a duration in seconds as `1h 2m 3s`; `None` is "Running".
pub fn format_duration(seconds: Option<i64>) -> String {
    let Some(total) = seconds else {
        return growbox_types::RUNNING_LABEL.to_string();
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 || (hours == 0 && minutes == 0) {
        parts.push(format!("{secs}s"));
    }
    parts.join(" ")
}
