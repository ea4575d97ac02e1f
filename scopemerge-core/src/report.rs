//! Run outcomes: written cells, mismatches, ambiguities and skipped entities

use crate::reader::{CellReference, CellValue};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// Reason recorded when a label has no structural match and no special case
pub const NO_MATCH_FOUND: &str = "No match found";
/// Reason recorded when a special case's value cell was already written in this run
pub const SPECIAL_CASE_TAKEN: &str = "Special case cell already written";

/// A label that could not be written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MismatchRecord {
    /// Input folder name
    pub entity: String,
    /// Scope sheet the label came from
    pub scope: String,
    pub label: String,
    pub reason: String,
}

/// Mismatch accumulator; a given (entity, scope, label) is recorded once
#[derive(Debug, Clone, Default)]
pub struct MismatchLog {
    records: Vec<MismatchRecord>,
    seen: HashSet<(String, String, String)>,
}

impl MismatchLog {
    /// Record a mismatch. Returns false when the triple was already recorded.
    pub fn record(&mut self, entity: &str, scope: &str, label: &str, reason: &str) -> bool {
        let key = (entity.to_string(), scope.to_string(), label.to_string());
        if !self.seen.insert(key) {
            return false;
        }

        log::info!("No destination for '{}' ({} / {}): {}", label, entity, scope, reason);
        self.records.push(MismatchRecord {
            entity: entity.to_string(),
            scope: scope.to_string(),
            label: label.to_string(),
            reason: reason.to_string(),
        });
        true
    }

    pub fn records(&self) -> &[MismatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<MismatchRecord> {
        self.records
    }
}

/// How a destination cell was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    /// Exact or substring match on a summary label cell
    Structural,
    /// Fallback through a special-case rule; `name` is the key the value is filed under
    SpecialCase { id: String, name: String },
}

/// A value written into the summary workbook
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrittenCell {
    pub entity: String,
    /// Summary sheet the value went to
    pub sheet: String,
    pub scope: String,
    pub label: String,
    pub cell: CellReference,
    pub value: CellValue,
    pub destination: Destination,
    /// The extracted value was empty and a placeholder was written instead
    pub placeholder: bool,
}

/// A label with several structural matches and no tie-break
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousLabel {
    pub entity: String,
    pub sheet: String,
    pub scope: String,
    pub label: String,
    pub candidates: Vec<CellReference>,
}

/// An entity left out of the run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntity {
    pub entity: String,
    pub reason: String,
}

/// Everything a run did, for display and auditing
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Entities whose labels were written, with their summary sheet
    pub processed: Vec<(String, String)>,
    /// Entities that could not be read
    pub skipped: Vec<SkippedEntity>,
    /// Entities without a summary sheet
    pub unmatched: Vec<String>,
    pub written: Vec<WrittenCell>,
    pub ambiguous: Vec<AmbiguousLabel>,
    pub mismatches: Vec<MismatchRecord>,
    /// Saved summary workbook, `None` for a dry run
    pub output: Option<PathBuf>,
}

impl RunReport {
    /// Whether every extracted label ended up in the summary
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
            && self.unmatched.is_empty()
            && self.ambiguous.is_empty()
            && self.mismatches.is_empty()
    }

    pub fn placeholder_count(&self) -> usize {
        self.written.iter().filter(|w| w.placeholder).count()
    }
}
