//! Date normalisation for registry records.
//!
//! The registry reports dates in several shapes depending on the field and
//! the wire encoding in use:
//!
//! - Plain date: `2023-04-11`
//! - Timestamp: `2023-04-11T00:00:00`, `2023-04-11T09:30:00+03:00`,
//!   `2023-04-11 09:30:00`
//! - Display format: `11.04.2023`
//!
//! All of them collapse to `YYYY-MM-DD`. Anything else, including a missing
//! value, becomes the empty string so snapshots never carry a null date.

use chrono::NaiveDate;

/// Normalise a raw date string into `YYYY-MM-DD`, or `""` when it can't be read.
///
/// # Algorithm
///
/// 1. Trim surrounding whitespace.
/// 2. Cut at the first `T` or space (drops any time component).
/// 3. Parse the remainder as ISO (`%Y-%m-%d`), then as `%d.%m.%Y`.
/// 4. Re-format as `%Y-%m-%d`; on failure return `""`.
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }

    let date_part = s
        .split(['T', ' '])
        .next()
        .unwrap_or_default();

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%d.%m.%Y"))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}
