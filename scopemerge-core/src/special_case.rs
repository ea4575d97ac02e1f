//! Fallback destinations for labels that never match a summary cell

use crate::reader::CellReference;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Largest row index of an xlsx worksheet
pub const MAX_ROWS: u32 = 1_048_576;
/// Largest column index of an xlsx worksheet (`XFD`)
pub const MAX_COLS: u32 = 16_384;

/// A token rule: every token must occur in the label, ignoring case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialCase {
    pub id: String,
    pub tokens: Vec<String>,
    /// Anchor label cell in the summary sheet, 1-based
    pub row: u32,
    pub col: u32,
    /// Key recorded for writes through this rule
    pub name: String,
}

impl SpecialCase {
    pub fn matches(&self, label: &str) -> bool {
        let label = label.to_lowercase();
        self.tokens
            .iter()
            .all(|token| label.contains(&token.to_lowercase()))
    }

    pub fn anchor(&self) -> CellReference {
        CellReference::new(self.row, self.col)
    }
}

/// Ordered rule set; the first matching rule wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialCaseTable {
    #[serde(rename = "case", default)]
    cases: Vec<SpecialCase>,
}

impl SpecialCaseTable {
    pub fn new(cases: Vec<SpecialCase>) -> Result<Self> {
        let table = Self { cases };
        table.validate()?;
        Ok(table)
    }

    /// Load and validate a table from a TOML file of `[[case]]` entries
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read special cases: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid special cases file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: SpecialCaseTable = toml::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();

        for case in &self.cases {
            if !ids.insert(case.id.as_str()) {
                anyhow::bail!("Configuration error: duplicate special case id '{}'", case.id);
            }
            if case.tokens.is_empty() || case.tokens.iter().any(|t| t.trim().is_empty()) {
                anyhow::bail!(
                    "Configuration error: special case '{}' needs at least one non-empty token",
                    case.id
                );
            }
            if case.row == 0 || case.col == 0 {
                anyhow::bail!(
                    "Configuration error: special case '{}' has a zero row or column; coordinates are 1-based",
                    case.id
                );
            }
            // The value cell one column to the right must fit in the sheet too
            if case.row > MAX_ROWS || case.col >= MAX_COLS {
                anyhow::bail!(
                    "Configuration error: special case '{}' at row {}, column {} is outside the sheet ({} rows, {} columns)",
                    case.id,
                    case.row,
                    case.col,
                    MAX_ROWS,
                    MAX_COLS
                );
            }
        }

        Ok(())
    }

    /// First rule whose tokens all occur in the label
    pub fn resolve(&self, label: &str) -> Option<&SpecialCase> {
        self.cases.iter().find(|case| case.matches(label))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpecialCase> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl Default for SpecialCaseTable {
    /// Purchased electricity, heat and cooling, each as source and as quantity in kWh
    fn default() -> Self {
        let case = |id: &str, tokens: [&str; 2], row: u32, name: &str| SpecialCase {
            id: id.to_string(),
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            row,
            col: 2,
            name: name.to_string(),
        };

        Self {
            cases: vec![
                case("electricity-source", ["källa", "inköpt el"], 20, "Inköpt el, källa"),
                case("electricity-kwh", ["inköpt el", "kwh"], 21, "Inköpt el (kWh)"),
                case("heat-source", ["källa", "inköpt värme"], 23, "Inköpt värme, källa"),
                case("heat-kwh", ["inköpt värme", "kwh"], 24, "Inköpt värme (kWh)"),
                case("cooling-source", ["källa", "inköpt kyla"], 26, "Inköpt kyla, källa"),
                case("cooling-kwh", ["inköpt kyla", "kwh"], 27, "Inköpt kyla (kWh)"),
            ],
        }
    }
}
