//! Label/value recovery from color-coded scope sheets

use crate::discovery::EntityInputs;
use crate::error::ReconcileError;
use crate::normalize::trim_trailing_space;
use crate::reader::{self, Cell, CellReference, CellValue, Sheet, Workbook};
use serde::Serialize;
use std::collections::HashMap;

/// Fill color of labeled data cells in the standard input template
pub const DEFAULT_MARKER_COLOR: &str = "FFDDEBF7";

/// Decides whether a cell belongs to a labeled data unit
pub trait CellMarker {
    fn is_marked(&self, cell: &Cell) -> bool;
}

impl<F> CellMarker for F
where
    F: Fn(&Cell) -> bool,
{
    fn is_marked(&self, cell: &Cell) -> bool {
        self(cell)
    }
}

/// Marks cells whose fill identifier contains the configured color, ignoring case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillColorMarker {
    color: String,
}

impl FillColorMarker {
    pub fn new(color: impl AsRef<str>) -> Self {
        Self {
            color: color.as_ref().to_uppercase(),
        }
    }

    pub fn color(&self) -> &str {
        &self.color
    }
}

impl Default for FillColorMarker {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_COLOR)
    }
}

impl CellMarker for FillColorMarker {
    fn is_marked(&self, cell: &Cell) -> bool {
        cell.fill
            .as_deref()
            .is_some_and(|fill| fill.to_uppercase().contains(&self.color))
    }
}

/// Label to value mapping of one scope sheet, in scan order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScopeData {
    labels: Vec<String>,
    values: HashMap<String, CellValue>,
}

impl ScopeData {
    /// Record a value. An existing label keeps its position and returns the
    /// value it held before.
    pub fn insert(&mut self, label: impl Into<String>, value: CellValue) -> Option<CellValue> {
        let label = label.into();
        match self.values.insert(label.clone(), value) {
            Some(previous) => Some(previous),
            None => {
                self.labels.push(label);
                None
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<&CellValue> {
        self.values.get(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.labels
            .iter()
            .filter_map(|label| self.values.get(label).map(|v| (label.as_str(), v)))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Merge another extraction into this one; its values win
    pub fn merge(&mut self, other: ScopeData) {
        let ScopeData { labels, mut values } = other;
        for label in labels {
            if let Some(value) = values.remove(&label) {
                self.insert(label, value);
            }
        }
    }
}

/// Extracted scope sheets of one entity, in discovery order
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityData {
    pub name: String,
    pub scopes: Vec<(String, ScopeData)>,
}

impl EntityData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scopes: Vec::new(),
        }
    }

    pub fn scope(&self, name: &str) -> Option<&ScopeData> {
        self.scopes.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn label_count(&self) -> usize {
        self.scopes.iter().map(|(_, d)| d.len()).sum()
    }

    fn add_scope(&mut self, name: &str, data: ScopeData) {
        match self.scopes.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => existing.merge(data),
            None => self.scopes.push((name.to_string(), data)),
        }
    }
}

/// Whether a sheet holds scope data
pub fn is_scope_sheet(name: &str) -> bool {
    name.to_lowercase().contains("scope")
}

/// Scan one sheet with a previous/current/next window over each row.
///
/// Column 1 is never a current cell since it has no predecessor. Cells
/// outside the sheet read as empty and unmarked.
pub fn extract_sheet<M: CellMarker + ?Sized>(sheet: &Sheet, marker: &M) -> ScopeData {
    let mut data = ScopeData::default();
    let marked = |row: u32, col: u32| sheet.get_cell(row, col).is_some_and(|c| marker.is_marked(c));

    for (row, col) in sheet.positions().filter(|&(_, col)| col > 1) {
        if marked(row, col - 1) || !marked(row, col) {
            continue;
        }

        let previous = sheet.value_at(row, col - 1);
        let next = sheet.value_at(row, col + 1);

        let key = if !next.is_empty() {
            if marked(row, col + 1) { next } else { previous }
        } else if !previous.is_empty() {
            previous
        } else {
            continue;
        };

        let key = key.to_string();
        let key = trim_trailing_space(&key);
        if key.is_empty() {
            continue;
        }

        let value = sheet.value_at(row, col).clone();
        log::debug!("{}!{}: '{}' = {}", sheet.name, CellReference::new(row, col), key, value);

        if let Some(previous) = data.insert(key, value) {
            log::warn!(
                "Label '{}' appears more than once in sheet '{}'; {} replaced by the later value",
                key,
                sheet.name,
                previous
            );
        }
    }

    data
}

/// Extract every scope sheet of an already opened workbook into `entity`
pub fn extract_workbook<M: CellMarker + ?Sized>(
    workbook: &Workbook,
    marker: &M,
    entity: &mut EntityData,
) {
    for sheet in workbook.sheets.iter().filter(|s| is_scope_sheet(&s.name)) {
        let data = extract_sheet(sheet, marker);
        log::debug!(
            "Extracted {} label(s) from '{}' in {}",
            data.len(),
            sheet.name,
            workbook.path.display()
        );
        entity.add_scope(&sheet.name, data);
    }
}

/// Open every workbook of an entity and extract its scope sheets.
///
/// One unreadable workbook fails the whole entity.
pub fn extract_entity<M: CellMarker + ?Sized>(
    inputs: &EntityInputs,
    marker: &M,
) -> Result<EntityData, ReconcileError> {
    let mut entity = EntityData::new(&inputs.name);

    for path in &inputs.files {
        log::info!("Reading {}", path.display());
        let workbook = reader::read_workbook(path).map_err(|source| ReconcileError::InputUnreadable {
            path: path.clone(),
            source,
        })?;
        extract_workbook(&workbook, marker, &mut entity);
    }

    Ok(entity)
}
