//! Change detection between two case snapshots.
//!
//! The detector is deliberately coarse: a case has changed when it gained
//! hearings or appeals. Registry data is append-only, so a shrinking list is
//! noise, and field-level edits (a corrected subject matter, a new stage)
//! are not reported. The first snapshot of a case is never a change.

use crate::case::CaseSnapshot;

/// Outcome of comparing two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeReport {
    pub changed: bool,
    /// Human-readable delta, present only when `changed` is true.
    pub summary: Option<String>,
}

impl ChangeReport {
    fn unchanged() -> Self {
        Self {
            changed: false,
            summary: None,
        }
    }
}

/// Compare `previous` (absent on the first check) against `current`.
pub fn detect(previous: Option<&CaseSnapshot>, current: &CaseSnapshot) -> ChangeReport {
    let Some(previous) = previous else {
        return ChangeReport::unchanged();
    };

    let new_hearings = current
        .hearing_count()
        .saturating_sub(previous.hearing_count());
    let new_appeals = current
        .appeal_count()
        .saturating_sub(previous.appeal_count());

    if new_hearings == 0 && new_appeals == 0 {
        return ChangeReport::unchanged();
    }

    let mut parts = Vec::with_capacity(2);
    if new_hearings > 0 {
        parts.push(plural(new_hearings, "new hearing", "new hearings"));
    }
    if new_appeals > 0 {
        parts.push(plural(new_appeals, "new appeal", "new appeals"));
    }

    ChangeReport {
        changed: true,
        summary: Some(parts.join(", ")),
    }
}

/// Shorthand for `detect(previous, current).changed`.
pub fn has_changed(previous: Option<&CaseSnapshot>, current: &CaseSnapshot) -> bool {
    detect(previous, current).changed
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}
