//! Dashboard template handling and cell placement

mod dashboard_writer;
mod formula;
mod layout;
mod xlsx_writer;

pub use dashboard_writer::{DashboardWriter, FirmPlan};
pub use layout::YearLayout;
pub use xlsx_writer::{CellEdits, PatchedSheet, fill_workbook_xlsx, patch_sheet_xml};

use crate::error::{Error, Result};
use crate::reader::{self, CellValue, Sheet, Workbook};
use std::path::{Path, PathBuf};

/// Copy a workbook with numeric edits applied, dispatching on the file format
pub fn fill_workbook<P: AsRef<Path>, Q: AsRef<Path>>(
    input_path: P,
    output_path: Q,
    edits: &CellEdits,
) -> Result<()> {
    let input = input_path.as_ref();

    match extension(input).as_deref() {
        Some("xlsx") | Some("xlsm") => fill_workbook_xlsx(input, output_path.as_ref(), edits),
        _ => Err(Error::UnsupportedFormat {
            path: input.to_path_buf(),
        }),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
}

/// The dashboard template opened for editing
///
/// Reads go through an in-memory copy of the template grid that reflects
/// every write. Nothing touches disk until [`DashboardWorkbook::save`],
/// which consumes the workbook so it can only happen once.
#[derive(Debug)]
pub struct DashboardWorkbook {
    template: PathBuf,
    grid: Workbook,
    edits: CellEdits,
}

impl DashboardWorkbook {
    pub fn open<P: AsRef<Path>>(template: P) -> Result<Self> {
        let template = template.as_ref();
        if !template.is_file() {
            return Err(Error::MissingFile {
                path: template.to_path_buf(),
            });
        }
        if !matches!(extension(template).as_deref(), Some("xlsx") | Some("xlsm")) {
            return Err(Error::UnsupportedFormat {
                path: template.to_path_buf(),
            });
        }

        let grid = reader::read_workbook(template)?;
        tracing::info!(
            "opened dashboard {} ({} sheets)",
            template.display(),
            grid.sheets.len()
        );

        Ok(Self {
            template: template.to_path_buf(),
            grid,
            edits: CellEdits::new(),
        })
    }

    pub fn template_path(&self) -> &Path {
        &self.template
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.grid.get_sheet(name)
    }

    /// Record a numeric value for a cell; later writes to the same cell win
    pub fn write_number(&mut self, sheet_name: &str, row: u32, col: u32, value: f64) -> Result<()> {
        let Some(sheet) = self.grid.get_sheet_mut(sheet_name) else {
            return Err(Error::MissingSheet {
                sheet: sheet_name.to_string(),
                workbook: self.template.clone(),
            });
        };

        sheet.set_value(row, col, CellValue::Number(value));
        self.edits
            .entry(sheet_name.to_string())
            .or_default()
            .insert((row, col), value);
        Ok(())
    }

    /// Number of distinct cells written so far
    pub fn edit_count(&self) -> usize {
        self.edits.values().map(|cells| cells.len()).sum()
    }

    /// Write the filled dashboard to `output`
    pub fn save<P: AsRef<Path>>(self, output: P) -> Result<()> {
        let output = output.as_ref();
        fill_workbook(&self.template, output, &self.edits)?;
        tracing::info!(
            "saved {} cells to {}",
            self.edit_count(),
            output.display()
        );
        Ok(())
    }
}
