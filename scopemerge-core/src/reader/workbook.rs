//! Workbook data structures

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

/// Represents a complete workbook
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    /// Source file the workbook was read from. Saving streams unchanged parts from here.
    pub path: PathBuf,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Get a sheet by name, ignoring case
    pub fn get_sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| same_sheet_name(&s.name, name))
    }

    /// Get a mutable sheet by name, ignoring case
    pub fn get_sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| same_sheet_name(&s.name, name))
    }

    /// Get all sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Append a new sheet, or return the existing one with the same name in any case.
    ///
    /// Appended sheets have no package part yet; the writer creates one on save.
    pub fn add_sheet(&mut self, name: &str) -> &mut Sheet {
        let index = match self.sheets.iter().position(|s| same_sheet_name(&s.name, name)) {
            Some(index) => index,
            None => {
                self.sheets.push(Sheet::new(name.to_string()));
                self.sheets.len() - 1
            }
        };
        &mut self.sheets[index]
    }

    /// Whether any sheet carries unsaved edits
    pub fn is_dirty(&self) -> bool {
        self.sheets
            .iter()
            .any(|s| s.sheet_path.is_none() || !s.edited.is_empty())
    }
}

/// Sheet names are unique within a workbook regardless of case
pub fn same_sheet_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Represents a worksheet. Rows and columns are 1-based.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub cells: HashMap<(u32, u32), Cell>,
    /// Internal path to the sheet XML file in the ZIP archive
    pub sheet_path: Option<String>,
    /// Cells written since the workbook was read
    pub edited: BTreeSet<(u32, u32)>,
}

impl Sheet {
    pub fn new(name: String) -> Self {
        Self {
            name,
            cells: HashMap::new(),
            sheet_path: None,
            edited: BTreeSet::new(),
        }
    }

    /// Get a cell at the given position
    pub fn get_cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    /// Value at the given position; missing cells read as empty
    pub fn value_at(&self, row: u32, col: u32) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.get_cell(row, col).map(|c| &c.value).unwrap_or(&EMPTY)
    }

    /// Write a value, creating the cell if needed, and mark it as edited
    pub fn set_value(&mut self, row: u32, col: u32, value: CellValue) {
        self.cells
            .entry((row, col))
            .or_insert_with(|| Cell::new(row, col, CellValue::Empty))
            .value = value;
        self.edited.insert((row, col));
    }

    /// Bounding box `(max_row, max_col)` over cells that hold a value or a fill
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let used: Vec<_> = self
            .cells
            .values()
            .filter(|c| !c.value.is_empty() || c.fill.is_some())
            .collect();

        let max_row = used.iter().map(|c| c.row).max()?;
        let max_col = used.iter().map(|c| c.col).max()?;

        Some((max_row, max_col))
    }

    /// Get the last cell with actual data (bottom-right corner of data range)
    pub fn last_data_cell(&self) -> Option<(u32, u32)> {
        let non_empty_cells: Vec<_> = self
            .cells
            .values()
            .filter(|c| !c.value.is_empty())
            .collect();

        let max_row = non_empty_cells.iter().map(|c| c.row).max()?;
        let max_col = non_empty_cells.iter().map(|c| c.col).max()?;

        Some((max_row, max_col))
    }

    /// Row-major iteration over every position of the bounding box
    pub fn positions(&self) -> impl Iterator<Item = (u32, u32)> + use<> {
        let (max_row, max_col) = self.dimensions().unwrap_or((0, 0));
        (1..=max_row).flat_map(move |row| (1..=max_col).map(move |col| (row, col)))
    }
}

/// Represents a single cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
    pub value: CellValue,
    /// Background fill identifier, e.g. `FFDDEBF7` or `theme:4`
    pub fill: Option<String>,
}

impl Cell {
    pub fn new(row: u32, col: u32, value: CellValue) -> Self {
        Self {
            row,
            col,
            value,
            fill: None,
        }
    }

    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }
}

/// Cell value types
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl CellValue {
    /// Check if the cell is empty. Whitespace-only text counts as a value.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            // Integral floats print without the trailing ".0", as spreadsheets show them
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
        }
    }
}

/// Cell reference (e.g., A1, B2), 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellReference {
    pub row: u32,
    pub col: u32,
}

impl CellReference {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Convert to Excel-style reference (e.g., "A1")
    pub fn to_excel_ref(&self) -> String {
        format!("{}{}", col_to_letter(self.col), self.row)
    }

    /// Parse an Excel-style reference; `None` for malformed input
    pub fn parse(cell_ref: &str) -> Option<Self> {
        crate::reader::xml_parser::parse_cell_ref(cell_ref).map(|(row, col)| Self { row, col })
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_excel_ref())
    }
}

/// Convert a 1-based column number to letters (1 -> A, 27 -> AA)
pub fn col_to_letter(mut col: u32) -> String {
    let mut result = String::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        result.insert(0, (b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    result
}
