//! Configuration for a transcription run

use crate::error::{Error, Result};
use crate::extractor::ScanBounds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where the dashboard writer puts a value relative to its label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Row of the label, column of the firm header
    #[default]
    FirmColumn,
    /// Cell immediately right of the label inside the firm block
    Adjacent,
    /// First numeric cell within `look_right_max` right of the label,
    /// falling back to the adjacent cell
    SearchRight,
}

/// Main run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    pub dashboard_template_name: String,
    pub output_dashboard_name: String,
    /// Round workbook filename prefix, followed by the round number
    pub input_prefix: String,
    /// Source sheet prefix, followed by the firm id
    pub financial_sheet_prefix: String,
    pub firms: Vec<String>,
    /// Dashboard sheet prefix, followed by the round number
    pub year_sheet_prefix: String,
    /// Dashboard firm header prefix, followed by the firm id
    pub firm_prefix: String,
    pub scan_max_rows: u32,
    pub scan_max_cols: u32,
    pub look_right_max: u32,
    pub write_policy: WritePolicy,
    pub numeric_text_values: bool,
    pub match_case: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            dashboard_template_name: "StratSim_Dashboard_2025-FL_Section01.xlsx".to_string(),
            output_dashboard_name: "StratSim_Dashboard_UPDATED.xlsx".to_string(),
            input_prefix: "Competition - Financial Summary - Year ".to_string(),
            financial_sheet_prefix: "Financial Details for ".to_string(),
            firms: ["A", "B", "C", "D", "E", "F", "G"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            year_sheet_prefix: "Year ".to_string(),
            firm_prefix: "FIRM ".to_string(),
            scan_max_rows: 250,
            scan_max_cols: 30,
            look_right_max: 4,
            write_policy: WritePolicy::default(),
            numeric_text_values: false,
            match_case: false,
        }
    }
}

/// Origin of a loaded configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl TransferConfig {
    /// Load configuration from a JSON or TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let parsed = if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        };
        parsed.map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the file if present, otherwise fall back to the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<(Self, ConfigSource)> {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::from_file(path)?, ConfigSource::File(path.to_path_buf())))
        } else {
            Ok((Self::default().validate()?, ConfigSource::Defaults))
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        // Derived struct deserialization would also take a positional array
        if !raw.is_object() {
            return Err(Error::Config("config must be a JSON object".to_string()));
        }
        let config: TransferConfig =
            serde_json::from_value(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TransferConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    /// Normalize firm ids and check every option
    pub fn validate(mut self) -> Result<Self> {
        if self.firms.is_empty() {
            return Err(Error::Config(
                "'firms' must be a non-empty list like [\"A\", \"B\"]".to_string(),
            ));
        }
        self.firms = self
            .firms
            .iter()
            .map(|f| f.trim().to_uppercase())
            .collect();
        if self.firms.iter().any(|f| f.is_empty()) {
            return Err(Error::Config("'firms' must not contain blank ids".to_string()));
        }

        for (key, value) in [
            ("dashboard_template_name", &self.dashboard_template_name),
            ("output_dashboard_name", &self.output_dashboard_name),
            ("input_prefix", &self.input_prefix),
            ("financial_sheet_prefix", &self.financial_sheet_prefix),
            ("year_sheet_prefix", &self.year_sheet_prefix),
            ("firm_prefix", &self.firm_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("'{key}' must be a non-empty string")));
            }
        }

        for (key, value) in [
            ("scan_max_rows", self.scan_max_rows),
            ("scan_max_cols", self.scan_max_cols),
            ("look_right_max", self.look_right_max),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("'{key}' must be at least 1")));
            }
        }

        Ok(self)
    }

    pub fn scan_bounds(&self) -> ScanBounds {
        ScanBounds {
            max_rows: self.scan_max_rows,
            max_cols: self.scan_max_cols,
            look_right_max: self.look_right_max,
        }
    }

    /// Source sheet holding a firm's financial details
    pub fn firm_sheet_name(&self, firm: &str) -> String {
        format!("{}{}", self.financial_sheet_prefix, firm)
    }

    /// Dashboard header marking a firm's block
    pub fn firm_label(&self, firm: &str) -> String {
        format!("{}{}", self.firm_prefix, firm)
    }

    /// Dashboard sheet for a round
    pub fn year_sheet_name(&self, round: u32) -> String {
        format!("{}{}", self.year_sheet_prefix, round)
    }

    pub fn template_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.dashboard_template_name)
    }

    pub fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.output_dashboard_name)
    }
}
