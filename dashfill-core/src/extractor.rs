//! Metric extraction from a bounded region of a firm sheet
//!
//! A metric is any text cell that does not read as a number, paired with the
//! nearest numeric cell to its right in the same row. Nothing else about the
//! layout is assumed: block titles, fixed rows and fixed columns are ignored.
//!
//! The scan is row-major (top to bottom, then left to right). When a name is
//! paired with a value the scan resumes just after the value, so captions
//! between a name and its number are not mistaken for names. When the same
//! name occurs twice, the later occurrence replaces the earlier value.

use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::reader::numeric::parse_number;
use crate::reader::{CellValue, Sheet, Workbook};
use serde::Serialize;
use std::collections::HashMap;

/// Scan limits shared by the extractor and the dashboard writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBounds {
    /// Number of rows scanned from the top of the sheet
    pub max_rows: u32,
    /// Number of columns scanned from the left of the sheet
    pub max_cols: u32,
    /// How many columns to the right of a name a value may sit
    pub look_right_max: u32,
}

impl Default for ScanBounds {
    fn default() -> Self {
        Self {
            max_rows: 250,
            max_cols: 30,
            look_right_max: 4,
        }
    }
}

impl ScanBounds {
    /// Rows and columns worth scanning on `sheet`: the bounds clipped to its used range
    pub fn limits(&self, sheet: &Sheet) -> (u32, u32) {
        let (rows, cols) = sheet.used_range.unwrap_or((0, 0));
        (self.max_rows.min(rows), self.max_cols.min(cols))
    }
}

/// Normalized lookup key for a metric name
pub fn metric_key(name: &str, match_case: bool) -> String {
    let trimmed = name.trim();
    if match_case {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// A metric name with the value found next to it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub name: String,
    pub value: f64,
    /// 0-based row of the name cell
    pub row: u32,
    /// 0-based column of the name cell
    pub col: u32,
}

/// Name to value table for one firm in one round
#[derive(Debug, Clone, Default)]
pub struct MetricMapping {
    records: Vec<MetricRecord>,
    index: HashMap<String, usize>,
    match_case: bool,
}

impl MetricMapping {
    pub fn new(match_case: bool) -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            match_case,
        }
    }

    /// Insert a record; a record with the same key is replaced in place
    pub fn insert(&mut self, record: MetricRecord) {
        let key = self.key(&record.name);
        if let Some(&slot) = self.index.get(&key) {
            self.records[slot] = record;
            return;
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
    }

    pub fn get(&self, name: &str) -> Option<&MetricRecord> {
        self.index
            .get(&self.key(name))
            .map(|&slot| &self.records[slot])
    }

    /// Key used by this mapping for `name`
    pub fn key(&self, name: &str) -> String {
        metric_key(name, self.match_case)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in order of first appearance
    pub fn iter(&self) -> impl Iterator<Item = &MetricRecord> {
        self.records.iter()
    }
}

/// Locates (name, value) pairs inside a bounded region
#[derive(Debug, Clone)]
pub struct Extractor {
    bounds: ScanBounds,
    numeric_text_values: bool,
    match_case: bool,
}

impl Extractor {
    pub fn new(bounds: ScanBounds) -> Self {
        Self {
            bounds,
            numeric_text_values: false,
            match_case: false,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self {
            bounds: config.scan_bounds(),
            numeric_text_values: config.numeric_text_values,
            match_case: config.match_case,
        }
    }

    /// Accept numeric-looking text cells as values
    pub fn with_numeric_text_values(mut self, enabled: bool) -> Self {
        self.numeric_text_values = enabled;
        self
    }

    pub fn with_match_case(mut self, enabled: bool) -> Self {
        self.match_case = enabled;
        self
    }

    /// Extract from the named sheet of a workbook
    pub fn extract_from(&self, workbook: &Workbook, sheet_name: &str) -> Result<MetricMapping> {
        let sheet = workbook
            .get_sheet(sheet_name)
            .ok_or_else(|| Error::MissingSheet {
                sheet: sheet_name.to_string(),
                workbook: workbook.path.clone(),
            })?;
        Ok(self.extract(sheet))
    }

    /// Extract every metric found in the scan region of `sheet`
    pub fn extract(&self, sheet: &Sheet) -> MetricMapping {
        let mut mapping = MetricMapping::new(self.match_case);
        let (max_rows, max_cols) = self.bounds.limits(sheet);

        for row in 0..max_rows {
            let mut col = 0;
            while col < max_cols {
                let Some(name) = candidate_name(sheet.value(row, col)) else {
                    col += 1;
                    continue;
                };

                match self.find_value_right(sheet, row, col) {
                    Some((value_col, value)) => {
                        mapping.insert(MetricRecord {
                            name: name.to_string(),
                            value,
                            row,
                            col,
                        });
                        col = value_col + 1;
                    }
                    None => col += 1,
                }
            }
        }

        mapping
    }

    /// First numeric cell within `look_right_max` columns right of `col`
    pub fn find_value_right(&self, sheet: &Sheet, row: u32, col: u32) -> Option<(u32, f64)> {
        (1..=self.bounds.look_right_max)
            .map(|offset| col + offset)
            .take_while(|&c| c < self.bounds.max_cols)
            .find_map(|c| self.numeric_value(sheet.value(row, c)).map(|v| (c, v)))
    }

    fn numeric_value(&self, value: &CellValue) -> Option<f64> {
        match value {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) if self.numeric_text_values => parse_number(s),
            _ => None,
        }
    }
}

/// Trimmed name when the cell can name a metric
pub fn candidate_name(value: &CellValue) -> Option<&str> {
    value
        .trimmed_text()
        .filter(|text| parse_number(text).is_none())
}
