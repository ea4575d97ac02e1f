//! Writer module for saving edited workbooks

mod xlsx_writer;

pub use xlsx_writer::{
    CellEdits, NewSheet, WorkbookModifications, modify_workbook_xlsx, write_workbook_xlsx,
};

use crate::reader::Workbook;
use anyhow::{Context, Result};
use std::fs;
use std::io::{Seek, Write};
use std::path::Path;
use tempfile::NamedTempFile;

fn is_xlsx(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xlsm"))
}

/// Modify a workbook file (supports multiple operations)
pub fn modify_workbook<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    modifications: &WorkbookModifications,
) -> Result<()> {
    let input = input_path.as_ref();

    // Determine file type by extension
    if !is_xlsx(input) {
        anyhow::bail!("Unsupported file format: {}", input.display());
    }
    modify_workbook_xlsx(input, output_path.as_ref(), modifications)
}

/// Like [`modify_workbook`], writing the package into any seekable sink
pub fn write_workbook<P: AsRef<Path>, W: Write + Seek>(
    input_path: P,
    output: W,
    modifications: &WorkbookModifications,
) -> Result<()> {
    let input = input_path.as_ref();
    if !is_xlsx(input) {
        anyhow::bail!("Unsupported file format: {}", input.display());
    }
    write_workbook_xlsx(input, output, modifications)
}

/// Collect the unsaved state of a workbook: edited cells of existing sheets
/// and every sheet added since it was read
pub fn pending_modifications(workbook: &Workbook) -> WorkbookModifications {
    let mut modifications = WorkbookModifications::default();

    for sheet in &workbook.sheets {
        match &sheet.sheet_path {
            Some(_) if !sheet.edited.is_empty() => {
                let edits = sheet
                    .edited
                    .iter()
                    .map(|&pos| (pos, sheet.cells.get(&pos).map(|c| c.value.clone()).unwrap_or_default()))
                    .collect();
                modifications.cell_edits.insert(sheet.name.clone(), edits);
            }
            Some(_) => {}
            None => modifications.new_sheets.push(NewSheet {
                name: sheet.name.clone(),
                cells: sheet
                    .cells
                    .iter()
                    .filter(|(_, c)| !c.value.is_empty())
                    .map(|(&pos, c)| (pos, c.value.clone()))
                    .collect(),
            }),
        }
    }

    modifications
}

/// Save a workbook read from disk to `output_path`, which may be its source.
///
/// The package goes to a uniquely named temporary file in the output folder,
/// is synced to disk and then persisted over `output_path`. On failure the
/// temporary file is removed when it goes out of scope.
pub fn save_workbook<P: AsRef<Path>>(workbook: &Workbook, output_path: P) -> Result<()> {
    let output = output_path.as_ref();
    let modifications = pending_modifications(workbook);

    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output folder {}", dir.display()))?;

    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create a temporary file in {}", dir.display()))?;
    write_workbook(&workbook.path, temp.as_file_mut(), &modifications)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    temp.as_file_mut().flush()?;
    temp.as_file().sync_all()?;
    temp.persist(output)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", output.display()))?;

    log::info!(
        "Saved {} ({} edited sheet(s), {} new sheet(s))",
        output.display(),
        modifications.cell_edits.len(),
        modifications.new_sheets.len()
    );
    Ok(())
}
