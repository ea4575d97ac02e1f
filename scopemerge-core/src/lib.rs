//! scopemerge-core: reconciles per-entity scope workbooks into a summary workbook
//!
//! Labeled values are recovered from color-coded scope sheets, entity folders
//! are fuzzy-matched to summary sheets, and every value is placed next to its
//! label in the summary. Labels that cannot be placed are listed in a
//! mismatch sheet.

pub mod config;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod matching;
pub mod normalize;
pub mod reader;
pub mod report;
pub mod special_case;
pub mod summary;
pub mod writer;

use reader::workbook::same_sheet_name;
use std::path::Path;

pub use config::{RunPaths, Settings};
pub use error::ReconcileError;
pub use extract::{CellMarker, EntityData, FillColorMarker, ScopeData};
pub use matching::{MatchTable, StringMatch, match_lists};
pub use reader::{Cell, CellReference, CellValue, Sheet, Workbook};
pub use report::{MismatchRecord, RunReport, SkippedEntity};
pub use special_case::{SpecialCase, SpecialCaseTable};
pub use summary::{MatchOutcome, SummaryWriter};

/// Main reconciliation interface
pub struct Reconciler {
    paths: RunPaths,
    marker: Box<dyn CellMarker>,
    special_cases: SpecialCaseTable,
    placeholder: Option<CellValue>,
    mismatch_sheet: String,
}

impl Reconciler {
    /// Build a reconciler from settings, resolving folders against `base_dir`
    pub fn from_settings(settings: &Settings, base_dir: &Path) -> Result<Self, ReconcileError> {
        let paths = settings.paths(base_dir);

        let special_cases = match &paths.special_cases_file {
            Some(file) => SpecialCaseTable::from_file(file)
                .map_err(|e| ReconcileError::FatalConfig(format!("{:#}", e)))?,
            None => SpecialCaseTable::default(),
        };

        Ok(Self {
            paths,
            marker: Box::new(FillColorMarker::new(&settings.marker_color)),
            special_cases,
            placeholder: settings
                .generate_placeholders
                .then(|| settings.placeholder_value.clone()),
            mismatch_sheet: settings.mismatch_sheet.clone(),
        })
    }

    /// Replace the special-case table
    pub fn with_special_cases(mut self, special_cases: SpecialCaseTable) -> Self {
        self.special_cases = special_cases;
        self
    }

    /// Replace the marked-cell predicate
    pub fn with_marker(mut self, marker: impl CellMarker + 'static) -> Self {
        self.marker = Box::new(marker);
        self
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Run the whole reconciliation. With `dry_run` nothing is saved.
    ///
    /// Only configuration problems, an unreadable summary workbook and a
    /// failed save are errors; everything else ends up in the report.
    pub fn run(&self, dry_run: bool) -> Result<RunReport, ReconcileError> {
        let summary_path = &self.paths.summary_file;
        let mut summary = reader::read_workbook(summary_path).map_err(|source| {
            ReconcileError::SummaryUnavailable {
                path: summary_path.clone(),
                source,
            }
        })?;

        let inputs = discovery::discover_inputs(&self.paths.input_dir)?;
        let mut report = RunReport::default();

        let mut entities = Vec::with_capacity(inputs.len());
        for input in &inputs {
            match extract::extract_entity(input, self.marker.as_ref()) {
                Ok(entity) => {
                    log::info!(
                        "Extracted {} label(s) from {} scope sheet(s) for '{}'",
                        entity.label_count(),
                        entity.scopes.len(),
                        entity.name
                    );
                    entities.push(entity);
                }
                Err(e) => {
                    let reason = format!("{:#}", anyhow::Error::from(e));
                    log::warn!("Skipping '{}': {}", input.name, reason);
                    report.skipped.push(SkippedEntity {
                        entity: input.name.clone(),
                        reason,
                    });
                }
            }
        }

        let matches = self.match_entities(&entities, &summary);
        let mut summary_writer = SummaryWriter::new(&self.special_cases, self.placeholder.clone());

        for entity in &entities {
            let Some(sheet_name) = matches.target_for(&entity.name) else {
                log::warn!("No summary sheet for '{}'", entity.name);
                report.unmatched.push(entity.name.clone());
                continue;
            };

            match summary_writer.write_entity(&mut summary, sheet_name, entity) {
                Ok(_) => report
                    .processed
                    .push((entity.name.clone(), sheet_name.to_string())),
                Err(e) => {
                    log::warn!("Skipping '{}': {}", entity.name, e);
                    report.skipped.push(SkippedEntity {
                        entity: entity.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        summary::write_mismatch_sheet(
            &mut summary,
            &self.mismatch_sheet,
            summary_writer.mismatches().records(),
        );
        let (written, ambiguous, mismatches) = summary_writer.finish();
        report.written = written;
        report.ambiguous = ambiguous;
        report.mismatches = mismatches;

        if dry_run {
            log::info!("Dry run; {} not written", self.paths.output_file.display());
        } else {
            let output = &self.paths.output_file;
            writer::save_workbook(&summary, output).map_err(|source| ReconcileError::SaveFailed {
                path: output.clone(),
                source,
            })?;
            report.output = Some(output.clone());
        }

        Ok(report)
    }

    /// One summary sheet per entity; the mismatch sheet is never a candidate
    fn match_entities(&self, entities: &[EntityData], summary: &Workbook) -> MatchTable {
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        let sheets: Vec<&str> = summary
            .sheet_names()
            .into_iter()
            .filter(|name| !same_sheet_name(name, &self.mismatch_sheet))
            .collect();

        match match_lists(&names, &sheets, true) {
            Ok(table) => {
                for m in table.iter() {
                    if let Some(target) = &m.target {
                        log::info!("'{}' -> sheet '{}' (score {:.3})", m.source, target, m.score);
                    }
                }
                table
            }
            Err(e) => {
                log::warn!("Entity matching skipped: {}", e);
                MatchTable::default()
            }
        }
    }
}
