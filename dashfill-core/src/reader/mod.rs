//! Excel file reader using calamine

use crate::error::{Error, Result};
use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};
use std::path::Path;

pub mod numeric;
pub mod workbook;

pub use workbook::{Cell, CellValue, Sheet, Workbook};

/// Read every sheet of a workbook into the tagged cell grid
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    read_workbook_sheets(path, |_| true)
}

/// Read only the sheets whose name satisfies `wanted`
pub fn read_workbook_sheets<P, F>(path: P, wanted: F) -> Result<Workbook>
where
    P: AsRef<Path>,
    F: Fn(&str) -> bool,
{
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::MissingFile {
            path: path.to_path_buf(),
        });
    }

    let mut excel: Sheets<_> = open_workbook_auto(path).map_err(|source| Error::Workbook {
        path: path.to_path_buf(),
        source,
    })?;

    let mut sheets = Vec::new();
    for sheet_name in excel.sheet_names() {
        if !wanted(&sheet_name) {
            continue;
        }
        let range = excel
            .worksheet_range(&sheet_name)
            .map_err(|source| Error::Workbook {
                path: path.to_path_buf(),
                source,
            })?;
        sheets.push(parse_sheet(&sheet_name, &range));
    }

    Ok(Workbook {
        path: path.to_path_buf(),
        sheets,
    })
}

/// Convert a calamine range into a sheet with absolute 0-based positions
pub fn parse_sheet(name: &str, range: &Range<Data>) -> Sheet {
    let mut sheet = Sheet::new(name);

    // Range coordinates are relative to the first used cell
    let Some((start_row, start_col)) = range.start() else {
        return sheet;
    };

    for (rel_row, rel_col, data) in range.used_cells() {
        let value = parse_cell_value(data);
        if value.is_blank() {
            continue;
        }
        sheet.set_value(start_row + rel_row as u32, start_col + rel_col as u32, value);
    }

    sheet
}

fn parse_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        // Excel dates are serial numbers
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) | Data::Empty => CellValue::Blank,
    }
}
