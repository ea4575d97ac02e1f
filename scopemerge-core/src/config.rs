//! Run settings loaded from `settings.json`

use crate::extract::DEFAULT_MARKER_COLOR;
use crate::reader::CellValue;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_MISMATCH_SHEET: &str = "Mismatched Data";

/// Settings file contents. Keys keep their human-readable names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "Input file folder name")]
    pub input_folder: String,
    /// Folder holding both the summary workbook and the output
    #[serde(rename = "Output file folder name")]
    pub output_folder: String,
    #[serde(rename = "Summary file name")]
    pub summary_file: String,
    #[serde(rename = "Output file name")]
    pub output_file: String,
    /// Write a placeholder when an extracted value is empty
    #[serde(rename = "Generate placeholder values", default)]
    pub generate_placeholders: bool,
    #[serde(rename = "Placeholder value", default = "default_placeholder")]
    pub placeholder_value: CellValue,
    #[serde(rename = "Marker color", default = "default_marker_color")]
    pub marker_color: String,
    /// TOML special-case table, relative to the settings file
    #[serde(rename = "Special cases file", default)]
    pub special_cases_file: Option<PathBuf>,
    #[serde(rename = "Mismatch sheet name", default = "default_mismatch_sheet")]
    pub mismatch_sheet: String,
    /// Directory of the settings file, set on load
    #[serde(skip)]
    pub config_dir: PathBuf,
}

fn default_placeholder() -> CellValue {
    CellValue::Number(0.0)
}

fn default_marker_color() -> String {
    DEFAULT_MARKER_COLOR.to_string()
}

fn default_mismatch_sheet() -> String {
    DEFAULT_MISMATCH_SHEET.to_string()
}

/// File system locations of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub input_dir: PathBuf,
    pub summary_file: PathBuf,
    pub output_file: PathBuf,
    pub special_cases_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let mut settings = Self::from_json_str(&content)
            .with_context(|| format!("Invalid settings file: {}", path.display()))?;
        settings.config_dir = absolute_parent(path);
        Ok(settings)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("Input file folder name", &self.input_folder),
            ("Output file folder name", &self.output_folder),
            ("Summary file name", &self.summary_file),
            ("Output file name", &self.output_file),
            ("Marker color", &self.marker_color),
            ("Mismatch sheet name", &self.mismatch_sheet),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("Configuration error: '{}' must not be empty", key);
            }
        }
        Ok(())
    }

    /// Folders resolve against the parent of the settings directory, so a
    /// `config/settings.json` sits next to the `Input` and `Output` folders.
    pub fn default_base_dir(&self) -> PathBuf {
        self.config_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config_dir.clone())
    }

    pub fn paths(&self, base_dir: &Path) -> RunPaths {
        let output_dir = base_dir.join(&self.output_folder);
        RunPaths {
            input_dir: base_dir.join(&self.input_folder),
            summary_file: output_dir.join(&self.summary_file),
            output_file: output_dir.join(&self.output_file),
            special_cases_file: self
                .special_cases_file
                .as_ref()
                .map(|file| self.config_dir.join(file)),
        }
    }
}

fn absolute_parent(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}
