//! Excel file reader: values through calamine, fills through the package XML

use anyhow::{Context, Result};
use calamine::{Data, Reader, Xlsx, open_workbook};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;

pub mod workbook;
pub mod xml_parser;

pub use workbook::{Cell, CellReference, CellValue, Sheet, Workbook};

/// Whether the path has an extension the reader understands
pub fn is_supported_workbook<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("xlsx") || s.eq_ignore_ascii_case("xlsm"))
        .unwrap_or(false)
}

/// Read a workbook from a file path
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let path = path.as_ref();

    if !is_supported_workbook(path) {
        anyhow::bail!("Unsupported file format: {}", path.display());
    }

    let mut excel: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    // Fills live in the package XML, which calamine does not expose
    let file = File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).context("Failed to open zip archive")?;
    let sheet_paths = xml_parser::get_xlsx_sheet_paths(&mut archive)?;
    let fills = xml_parser::parse_styles(&mut archive).unwrap_or_default();

    let mut sheets = Vec::with_capacity(sheet_paths.len());
    for (name, sheet_path) in sheet_paths {
        let range = excel
            .worksheet_range(&name)
            .with_context(|| format!("Failed to read sheet '{}' in {}", name, path.display()))?;

        let mut sheet = Sheet::new(name);
        sheet.cells = parse_cells(&range);

        let styles = xml_parser::extract_cell_style_indices_from_xlsx(&mut archive, &sheet_path)?;
        apply_fills(&mut sheet.cells, &styles, &fills);

        sheet.sheet_path = Some(sheet_path);
        sheets.push(sheet);
    }

    log::debug!("Read {} sheet(s) from {}", sheets.len(), path.display());

    Ok(Workbook {
        path: path.to_path_buf(),
        sheets,
    })
}

fn parse_cells(range: &calamine::Range<Data>) -> HashMap<(u32, u32), Cell> {
    let mut cells = HashMap::new();
    let Some((start_row, start_col)) = range.start() else {
        return cells;
    };

    for (rel_row, rel_col, data) in range.used_cells() {
        // calamine positions are 0-based and relative to the range start
        let row = start_row + rel_row as u32 + 1;
        let col = start_col + rel_col as u32 + 1;
        cells.insert((row, col), Cell::new(row, col, parse_cell_value(data)));
    }

    cells
}

/// Attach fill identifiers; styled cells without a value are kept as empty cells
fn apply_fills(
    cells: &mut HashMap<(u32, u32), Cell>,
    styles: &HashMap<(u32, u32), usize>,
    fills: &[Option<String>],
) {
    for (&(row, col), &style_idx) in styles {
        if let Some(Some(fill)) = fills.get(style_idx) {
            cells
                .entry((row, col))
                .or_insert_with(|| Cell::new(row, col, CellValue::Empty))
                .fill = Some(fill.clone());
        }
    }
}

fn parse_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::Error(e) => CellValue::Text(e.to_string()),
        Data::Empty => CellValue::Empty,
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}
