//! Firm header and label detection on a dashboard year sheet

use crate::extractor::{ScanBounds, candidate_name, metric_key};
use crate::reader::{CellValue, Sheet};
use std::collections::HashSet;
use std::ops::Range;

/// Where the firm blocks and metric labels sit on one year sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearLayout {
    pub sheet: String,
    pub bounds: ScanBounds,
    /// Row holding the most firm headers
    pub header_row: Option<u32>,
    /// Every firm header on the header row (normalized text, column), left to right.
    /// A repeated header keeps all its columns; lookups use the first.
    pub firm_headers: Vec<(String, u32)>,
    /// Length of the first contiguous run inside `firm_headers`
    pub contiguous_headers: usize,
    /// Column holding the metric labels, for the firm-column placement
    pub label_column: Option<u32>,
}

impl YearLayout {
    /// Detect the layout of `sheet` within `bounds`
    pub fn detect(sheet: &Sheet, bounds: ScanBounds, firm_prefix: &str) -> Self {
        let prefix = normalize_header(firm_prefix);
        let header_row = find_firm_header_row(sheet, bounds, &prefix);

        let (firm_headers, contiguous_headers) = match header_row {
            Some(row) => firm_headers(sheet, bounds, row, &prefix),
            None => (Vec::new(), 0),
        };
        let label_column =
            header_row.and_then(|row| find_label_column(sheet, bounds, row, &prefix));

        Self {
            sheet: sheet.name.clone(),
            bounds,
            header_row,
            firm_headers,
            contiguous_headers,
            label_column,
        }
    }

    /// Column of a firm header inside the first contiguous run
    pub fn firm_column(&self, firm_label: &str) -> Option<u32> {
        let wanted = normalize_header(firm_label);
        self.firm_headers[..self.contiguous_headers]
            .iter()
            .find(|(header, _)| *header == wanted)
            .map(|(_, col)| *col)
    }

    /// Columns owned by a firm: from its header up to the next header
    pub fn firm_block(&self, firm_label: &str) -> Option<Range<u32>> {
        let wanted = normalize_header(firm_label);
        let position = self
            .firm_headers
            .iter()
            .position(|(header, _)| *header == wanted)?;
        let start = self.firm_headers[position].1;
        let end = self
            .firm_headers
            .iter()
            .map(|(_, col)| *col)
            .filter(|&col| col > start)
            .min()
            .unwrap_or(self.bounds.max_cols);
        Some(start..end)
    }

    /// Labels of the label column with their rows, first occurrence wins
    pub fn label_rows(&self, sheet: &Sheet, firm_prefix: &str, match_case: bool) -> Vec<(u32, String)> {
        let (Some(col), Some(header_row)) = (self.label_column, self.header_row) else {
            return Vec::new();
        };
        let prefix = normalize_header(firm_prefix);

        let (max_rows, _) = self.bounds.limits(sheet);
        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        for row in (0..max_rows).filter(|&r| r != header_row) {
            if let Some(label) = dashboard_label(sheet.value(row, col), &prefix) {
                if seen.insert(metric_key(label, match_case)) {
                    labels.push((row, label.to_string()));
                }
            }
        }
        labels
    }
}

/// Uppercased, trimmed header text used for firm header comparisons
pub fn normalize_header(text: &str) -> String {
    text.trim().to_uppercase()
}

fn is_firm_header(value: &CellValue, prefix: &str) -> bool {
    value
        .trimmed_text()
        .is_some_and(|text| normalize_header(text).starts_with(prefix))
}

/// Label text of a dashboard cell: a metric-like name that is not a firm header
pub fn dashboard_label<'a>(value: &'a CellValue, prefix: &str) -> Option<&'a str> {
    candidate_name(value).filter(|text| !normalize_header(text).starts_with(prefix))
}

/// Row with the most firm headers; the topmost row wins ties
pub fn find_firm_header_row(sheet: &Sheet, bounds: ScanBounds, prefix: &str) -> Option<u32> {
    let (max_rows, max_cols) = bounds.limits(sheet);
    let mut best: Option<(u32, usize)> = None;

    for row in 0..max_rows {
        let count = (0..max_cols)
            .filter(|&col| is_firm_header(sheet.value(row, col), prefix))
            .count();
        if count > best.map_or(0, |(_, c)| c) {
            best = Some((row, count));
        }
    }

    best.map(|(row, _)| row)
}

/// Firm headers on `row` and the length of their first contiguous run
fn firm_headers(sheet: &Sheet, bounds: ScanBounds, row: u32, prefix: &str) -> (Vec<(String, u32)>, usize) {
    let mut headers: Vec<(String, u32)> = Vec::new();
    let mut contiguous = None;
    let mut run_started = false;

    for col in 0..bounds.limits(sheet).1 {
        let value = sheet.value(row, col);
        if !is_firm_header(value, prefix) {
            if run_started && contiguous.is_none() {
                contiguous = Some(headers.len());
            }
            continue;
        }
        run_started = true;

        if let Some(text) = value.trimmed_text() {
            headers.push((normalize_header(text), col));
        }
    }

    let contiguous = contiguous.unwrap_or(headers.len());
    (headers, contiguous)
}

/// Column with the most label cells, ignoring firm header columns
fn find_label_column(sheet: &Sheet, bounds: ScanBounds, header_row: u32, prefix: &str) -> Option<u32> {
    let (max_rows, max_cols) = bounds.limits(sheet);
    let mut best: Option<(u32, usize)> = None;

    for col in 0..max_cols {
        if is_firm_header(sheet.value(header_row, col), prefix) {
            continue;
        }
        let score = (0..max_rows)
            .filter(|&row| row != header_row)
            .filter(|&row| dashboard_label(sheet.value(row, col), prefix).is_some())
            .count();
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((col, score));
        }
    }

    best.map(|(col, _)| col)
}
