//! Snapshot normaliser: raw registry record → [`CaseSnapshot`].
//!
//! The registry's wire encodings are loose. Fields come and go, scalars are
//! sometimes numbers, and a sub-list with one element may degrade to a bare
//! object, optionally wrapped in its element-type key
//! (`{"DosarSedinta": {...}}`). Normalisation is total: every input yields a
//! snapshot, and the same input always yields the same snapshot.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::case::{Appeal, CaseSnapshot, Hearing, Party};
use crate::date::normalize_date;

const PARTIES_KEY: &str = "parti";
const PARTIES_WRAPPER: &str = "DosarParte";
const HEARINGS_KEY: &str = "sedinte";
const HEARINGS_WRAPPER: &str = "DosarSedinta";
const APPEALS_KEY: &str = "caiAtac";
const APPEALS_WRAPPER: &str = "DosarCaleAtac";

/// An untyped case record as returned by the registry.
///
/// Always a JSON object; constructing one from anything else fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct RawCaseRecord(Map<String, Value>);

impl RawCaseRecord {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The case number as reported by the registry, if present.
    pub fn case_number(&self) -> Option<&str> {
        self.0.get("numar").and_then(Value::as_str)
    }

    /// The institution key as reported by the registry, if present.
    pub fn institution(&self) -> Option<&str> {
        self.0.get("institutie").and_then(Value::as_str)
    }
}

impl TryFrom<Value> for RawCaseRecord {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(format!("expected a case object, got {}", json_kind(&other))),
        }
    }
}

impl From<RawCaseRecord> for Value {
    fn from(record: RawCaseRecord) -> Self {
        Value::Object(record.0)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A sub-list as it appears on the wire: absent, a bare object, or a list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OneOrMany<'a> {
    Empty,
    Single(&'a Map<String, Value>),
    Many(&'a [Value]),
}

impl<'a> OneOrMany<'a> {
    /// Classify a raw field, unwrapping an element-type wrapper key first.
    pub fn from_field(value: Option<&'a Value>, wrapper: &str) -> Self {
        match value {
            Some(Value::Array(items)) if !items.is_empty() => Self::Many(items),
            Some(Value::Object(map)) => match map.get(wrapper) {
                Some(inner) => Self::from_field(Some(inner), wrapper),
                None if map.is_empty() => Self::Empty,
                None => Self::Single(map),
            },
            _ => Self::Empty,
        }
    }

    /// Resolve to a sequence of element records. Non-object elements are dropped.
    pub fn records(self) -> Vec<&'a Map<String, Value>> {
        match self {
            Self::Empty => Vec::new(),
            Self::Single(map) => vec![map],
            Self::Many(items) => {
                let records: Vec<_> = items.iter().filter_map(Value::as_object).collect();
                if records.len() < items.len() {
                    debug!(dropped = items.len() - records.len(), "skipped non-object list elements");
                }
                records
            }
        }
    }
}

/// Read a scalar as text. Absent, null, and structured values become `""`.
fn text(fields: &Map<String, Value>, key: &str) -> String {
    match fields.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn date(fields: &Map<String, Value>, key: &str) -> String {
    normalize_date(&text(fields, key))
}

fn list<'a>(fields: &'a Map<String, Value>, key: &str, wrapper: &str) -> Vec<&'a Map<String, Value>> {
    OneOrMany::from_field(fields.get(key), wrapper).records()
}

/// Convert a raw registry record into a canonical [`CaseSnapshot`].
///
/// Hearings are sorted newest first (stable, so same-day sessions keep
/// registry order). Nothing is deduplicated.
pub fn normalize(raw: &RawCaseRecord) -> CaseSnapshot {
    let fields = raw.fields();

    let parties = list(fields, PARTIES_KEY, PARTIES_WRAPPER)
        .into_iter()
        .map(|p| Party {
            name: text(p, "nume"),
            role: text(p, "calitateParte"),
        })
        .collect();

    let mut hearings: Vec<Hearing> = list(fields, HEARINGS_KEY, HEARINGS_WRAPPER)
        .into_iter()
        .map(|s| Hearing {
            date: date(s, "data"),
            time: text(s, "ora"),
            panel: text(s, "complet"),
            solution_summary: text(s, "solutie"),
            solution_full_text: text(s, "solutieSumar"),
            pronouncement_date: date(s, "dataPronuntare"),
        })
        .collect();
    hearings.sort_by(|a, b| b.date.cmp(&a.date));

    let appeals = list(fields, APPEALS_KEY, APPEALS_WRAPPER)
        .into_iter()
        .map(|c| Appeal {
            declaration_date: date(c, "dataDeclarare"),
            declaring_party: text(c, "parteDeclaratoare"),
            appeal_type: text(c, "tipCaleAtac"),
            higher_court_case_number: text(c, "dosarInstantaSuperioara"),
        })
        .collect();

    CaseSnapshot {
        case_number: text(fields, "numar"),
        institution: text(fields, "institutie"),
        legacy_number: text(fields, "numarVechi"),
        registered_on: date(fields, "data"),
        stage: text(fields, "stadiuProcesual"),
        category: text(fields, "categorieCaz"),
        subject_matter: text(fields, "obiect"),
        department: text(fields, "departament"),
        parties,
        hearings,
        appeals,
    }
}
