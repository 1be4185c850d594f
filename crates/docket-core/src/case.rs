//! Canonical case snapshot types.
//!
//! A [`CaseSnapshot`] is the comparable capture of a case at one point in
//! time, produced by [`normalize`](crate::normalize::normalize) from a raw
//! registry record. Every scalar is a `String` (empty when the registry left
//! it out) so equality is total over the whole field set.

use serde::{Deserialize, Serialize};

/// A party to the proceeding and its procedural quality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub name: String,
    /// Plaintiff, defendant, creditor, ...
    pub role: String,
}

/// A court session belonging to a case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hearing {
    /// `YYYY-MM-DD`, or empty when unknown.
    pub date: String,
    pub time: String,
    pub panel: String,
    pub solution_summary: String,
    pub solution_full_text: String,
    /// `YYYY-MM-DD`, or empty when unknown.
    pub pronouncement_date: String,
}

/// A declared challenge against a ruling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appeal {
    /// `YYYY-MM-DD`, or empty when unknown.
    pub declaration_date: String,
    pub declaring_party: String,
    pub appeal_type: String,
    pub higher_court_case_number: String,
}

/// Normalised state of a case as returned by the registry.
///
/// Hearings are held newest first. Parties and appeals keep registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSnapshot {
    pub case_number: String,
    pub institution: String,
    /// Number the case carried before re-registration, if any.
    pub legacy_number: String,
    /// Filing date, `YYYY-MM-DD` or empty.
    pub registered_on: String,
    pub stage: String,
    pub category: String,
    pub subject_matter: String,
    pub department: String,
    pub parties: Vec<Party>,
    pub hearings: Vec<Hearing>,
    pub appeals: Vec<Appeal>,
}

impl CaseSnapshot {
    pub fn hearing_count(&self) -> usize {
        self.hearings.len()
    }

    pub fn appeal_count(&self) -> usize {
        self.appeals.len()
    }

    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    /// Most recent non-empty hearing date, i.e. the case's last activity.
    pub fn latest_hearing_date(&self) -> Option<&str> {
        self.hearings
            .iter()
            .map(|h| h.date.as_str())
            .filter(|d| !d.is_empty())
            .max()
    }
}
