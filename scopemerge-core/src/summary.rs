//! Placement of extracted values into the summary workbook

use crate::error::ReconcileError;
use crate::extract::EntityData;
use crate::normalize::normalize;
use crate::reader::{CellReference, CellValue, Sheet, Workbook};
use crate::report::{
    AmbiguousLabel, Destination, MismatchLog, MismatchRecord, NO_MATCH_FOUND, SPECIAL_CASE_TAKEN,
    WrittenCell,
};
use crate::special_case::{SpecialCase, SpecialCaseTable};
use std::collections::HashSet;

/// Header row of the mismatch sheet
pub const MISMATCH_HEADERS: [&str; 4] = ["Input folder name", "Scope", "Entry name", "Value"];

/// Label cells found for one extracted label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    NoMatch,
    UniqueMatch(CellReference),
    /// Candidates in row-major scan order
    AmbiguousMatch(Vec<CellReference>),
}

/// Scan the sheet's bounding box row by row for cells holding the label,
/// either as the whole trimmed value or as a substring.
pub fn find_label_cells(sheet: &Sheet, label: &str) -> MatchOutcome {
    let mut found: Vec<CellReference> = sheet
        .positions()
        .filter(|&(row, col)| {
            let value = sheet.value_at(row, col);
            if value.is_empty() {
                return false;
            }
            let text = value.to_string();
            normalize(&text) == label || text.contains(label)
        })
        .map(|(row, col)| CellReference::new(row, col))
        .collect();

    match found.len() {
        0 => MatchOutcome::NoMatch,
        1 => MatchOutcome::UniqueMatch(found.remove(0)),
        _ => MatchOutcome::AmbiguousMatch(found),
    }
}

/// Pick among several label cells by scope convention: Scope 1 rows come
/// first in the summary layout, Scope 3 rows last.
pub fn resolve_ambiguity(scope: &str, candidates: &[CellReference]) -> Option<CellReference> {
    let scope = scope.to_lowercase();
    if scope.contains("scope 1") {
        candidates.first().copied()
    } else if scope.contains("scope 3") {
        candidates.last().copied()
    } else {
        None
    }
}

/// Writes extracted labels of every entity into its summary sheet and keeps
/// track of what happened to each label
#[derive(Debug)]
pub struct SummaryWriter<'a> {
    special_cases: &'a SpecialCaseTable,
    /// Written in place of empty values when set
    placeholder: Option<CellValue>,
    mismatches: MismatchLog,
    written: Vec<WrittenCell>,
    ambiguous: Vec<AmbiguousLabel>,
    /// Value cells written in this run, per summary sheet
    claimed: HashSet<(String, u32, u32)>,
}

impl<'a> SummaryWriter<'a> {
    pub fn new(special_cases: &'a SpecialCaseTable, placeholder: Option<CellValue>) -> Self {
        Self {
            special_cases,
            placeholder,
            mismatches: MismatchLog::default(),
            written: Vec::new(),
            ambiguous: Vec::new(),
            claimed: HashSet::new(),
        }
    }

    /// Write every label of an entity into `sheet_name`. Returns the number of cells written.
    pub fn write_entity(
        &mut self,
        workbook: &mut Workbook,
        sheet_name: &str,
        entity: &EntityData,
    ) -> Result<usize, ReconcileError> {
        let sheet = workbook
            .get_sheet_mut(sheet_name)
            .ok_or_else(|| ReconcileError::SheetNotFound(sheet_name.to_string()))?;

        let before = self.written.len();
        for (scope, data) in &entity.scopes {
            for (label, value) in data.iter() {
                self.write_label(sheet, &entity.name, scope, label, value);
            }
        }

        let count = self.written.len() - before;
        log::info!("Wrote {} value(s) for '{}' into '{}'", count, entity.name, sheet_name);
        Ok(count)
    }

    /// Place one label's value one column right of its label cell, or record why it cannot be placed
    pub fn write_label(
        &mut self,
        sheet: &mut Sheet,
        entity: &str,
        scope: &str,
        label: &str,
        value: &CellValue,
    ) {
        let (anchor, destination) = match find_label_cells(sheet, label) {
            MatchOutcome::UniqueMatch(cell) => (cell, Destination::Structural),
            MatchOutcome::AmbiguousMatch(candidates) => match resolve_ambiguity(scope, &candidates) {
                Some(cell) => (cell, Destination::Structural),
                None => {
                    log::warn!(
                        "'{}' ({} / {}) matches {} cells in '{}'; skipped",
                        label,
                        entity,
                        scope,
                        candidates.len(),
                        sheet.name
                    );
                    self.ambiguous.push(AmbiguousLabel {
                        entity: entity.to_string(),
                        sheet: sheet.name.clone(),
                        scope: scope.to_string(),
                        label: label.to_string(),
                        candidates,
                    });
                    return;
                }
            },
            MatchOutcome::NoMatch => {
                let Some(case) = self.special_cases.resolve(label) else {
                    self.mismatches.record(entity, scope, label, NO_MATCH_FOUND);
                    return;
                };
                match self.special_case_anchor(sheet, case) {
                    Ok(cell) => {
                        log::debug!("'{}' handled as special case '{}' ({})", label, case.id, case.name);
                        let destination = Destination::SpecialCase {
                            id: case.id.clone(),
                            name: case.name.clone(),
                        };
                        (cell, destination)
                    }
                    Err(e) => {
                        log::warn!("'{}' ({} / {}) not written: {}", label, entity, scope, e);
                        self.mismatches.record(entity, scope, label, SPECIAL_CASE_TAKEN);
                        return;
                    }
                }
            }
        };

        let (value, placeholder) = if !value.is_empty() {
            (value.clone(), false)
        } else if let Some(placeholder) = &self.placeholder {
            (placeholder.clone(), true)
        } else {
            log::debug!("'{}' ({} / {}) has no value; {} left untouched", label, entity, scope, anchor);
            return;
        };

        let target = CellReference::new(anchor.row, anchor.col + 1);
        log::debug!("{}!{} = {} ('{}')", sheet.name, target, value, label);
        sheet.set_value(target.row, target.col, value.clone());
        self.claimed.insert((sheet.name.clone(), target.row, target.col));

        self.written.push(WrittenCell {
            entity: entity.to_string(),
            sheet: sheet.name.clone(),
            scope: scope.to_string(),
            label: label.to_string(),
            cell: target,
            value,
            destination,
            placeholder,
        });
    }

    /// The special case's fixed anchor, unless its value cell was already written in this run
    fn special_case_anchor(&self, sheet: &Sheet, case: &SpecialCase) -> Result<CellReference, ReconcileError> {
        let anchor = case.anchor();
        let value_col = anchor.col + 1;

        if self.claimed.contains(&(sheet.name.clone(), anchor.row, value_col)) {
            return Err(ReconcileError::SpecialCaseTaken {
                id: case.id.clone(),
                cell: CellReference::new(anchor.row, value_col).to_string(),
            });
        }
        Ok(anchor)
    }

    pub fn mismatches(&self) -> &MismatchLog {
        &self.mismatches
    }

    pub fn written(&self) -> &[WrittenCell] {
        &self.written
    }

    pub fn ambiguous(&self) -> &[AmbiguousLabel] {
        &self.ambiguous
    }

    pub fn finish(self) -> (Vec<WrittenCell>, Vec<AmbiguousLabel>, Vec<MismatchRecord>) {
        (self.written, self.ambiguous, self.mismatches.into_records())
    }
}

/// Append one row per record below the sheet's last row. A new or empty
/// sheet gets the header row first. Nothing is written without records.
pub fn write_mismatch_sheet(workbook: &mut Workbook, sheet_name: &str, records: &[MismatchRecord]) {
    if records.is_empty() {
        return;
    }

    let sheet = workbook.add_sheet(sheet_name);
    let mut row = match sheet.last_data_cell() {
        Some((last_row, _)) => last_row + 1,
        None => {
            for (col, header) in (1..).zip(MISMATCH_HEADERS) {
                sheet.set_value(1, col, header.into());
            }
            2
        }
    };

    for record in records {
        let values = [&record.entity, &record.scope, &record.label, &record.reason];
        for (col, value) in (1..).zip(values) {
            sheet.set_value(row, col, value.as_str().into());
        }
        row += 1;
    }

    log::info!("Listed {} mismatch(es) in '{}'", records.len(), sheet_name);
}
