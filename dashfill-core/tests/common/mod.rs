#![allow(dead_code)]

use dashfill_core::report::CellReference;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const TEMPLATE: &str = "StratSim_Dashboard_2025-FL_Section01.xlsx";
pub const OUTPUT: &str = "StratSim_Dashboard_UPDATED.xlsx";

pub fn round_file(round: u32) -> String {
    format!("Competition - Financial Summary - Year {round}.xlsx")
}

/// Cell content for a mock worksheet
#[derive(Debug, Clone, Copy)]
pub enum Cell<'a> {
    Num(f64),
    Text(&'a str),
    /// Number with style index 1
    Styled(f64),
    /// Formula with its cached value
    Formula(&'a str, f64),
}

pub type MockSheet<'a> = (&'a str, &'a [(&'a str, Cell<'a>)]);

// Helper to create a minimal valid XLSX file for testing
pub fn create_mock_xlsx(path: &Path, sheets: &[MockSheet<'_>], calc_chain: bool) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    // 1. [Content_Types].xml
    zip.start_file("[Content_Types].xml", options)?;
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
"#,
    );
    for (i, _) in sheets.iter().enumerate() {
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i + 1
        ));
    }
    if calc_chain {
        content_types.push_str(r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/>"#);
    }
    content_types.push_str("</Types>");
    zip.write_all(content_types.as_bytes())?;

    // 2. _rels/.rels
    zip.start_file("_rels/.rels", options)?;
    zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#.as_bytes())?;

    // 3. xl/workbook.xml
    zip.start_file("xl/workbook.xml", options)?;
    let mut workbook_xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
"#,
    );
    for (i, (name, _)) in sheets.iter().enumerate() {
        workbook_xml.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            name,
            i + 1,
            i + 1
        ));
    }
    workbook_xml.push_str("</sheets></workbook>");
    zip.write_all(workbook_xml.as_bytes())?;

    // 4. xl/_rels/workbook.xml.rels
    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    let mut rels_xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#,
    );
    for (i, _) in sheets.iter().enumerate() {
        rels_xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i + 1, i + 1
        ));
    }
    rels_xml.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        sheets.len() + 1
    ));
    if calc_chain {
        rels_xml.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/>"#,
            sheets.len() + 2
        ));
    }
    rels_xml.push_str("</Relationships>");
    zip.write_all(rels_xml.as_bytes())?;

    // 5. xl/styles.xml
    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="4"/></cellXfs></styleSheet>"#.as_bytes())?;

    // 6. sheets
    for (i, (_, cells)) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        zip.write_all(sheet_xml(cells).as_bytes())?;
    }

    // 7. calculation chain
    if calc_chain {
        zip.start_file("xl/calcChain.xml", options)?;
        zip.write_all(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><c r="A1" i="1"/></calcChain>"#.as_bytes())?;
    }

    zip.finish()?;
    Ok(())
}

fn sheet_xml(cells: &[(&str, Cell<'_>)]) -> String {
    let mut rows: BTreeMap<u32, BTreeMap<u32, String>> = BTreeMap::new();
    for (cell_ref, cell) in cells {
        let position = CellReference::parse(cell_ref).expect("valid cell reference");
        let xml = match cell {
            Cell::Num(n) => format!(r#"<c r="{cell_ref}"><v>{n}</v></c>"#),
            Cell::Text(t) => format!(r#"<c r="{cell_ref}" t="inlineStr"><is><t>{t}</t></is></c>"#),
            Cell::Styled(n) => format!(r#"<c r="{cell_ref}" s="1"><v>{n}</v></c>"#),
            Cell::Formula(f, n) => format!(r#"<c r="{cell_ref}"><f>{f}</f><v>{n}</v></c>"#),
        };
        rows.entry(position.row)
            .or_default()
            .insert(position.col, xml);
    }

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row, cells) in rows {
        xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
        for cell in cells.values() {
            xml.push_str(cell);
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Raw bytes of an archive entry, `None` when absent
pub fn read_zip_entry(path: &Path, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let mut archive = zip::ZipArchive::new(File::open(path)?)?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut buffer = Vec::new();
    entry.read_to_end(&mut buffer)?;
    Ok(Some(buffer))
}

pub fn read_zip_text(path: &Path, name: &str) -> anyhow::Result<String> {
    let bytes = read_zip_entry(path, name)?
        .ok_or_else(|| anyhow::anyhow!("{name} missing from {}", path.display()))?;
    Ok(String::from_utf8(bytes)?)
}

/// Value of one cell read back through calamine, `None` when blank
pub fn cell_value(path: &Path, sheet: &str, cell_ref: &str) -> anyhow::Result<Option<calamine::Data>> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto(path)?;
    let range = workbook.worksheet_range(sheet)?;
    let position = CellReference::parse(cell_ref).expect("valid cell reference");
    Ok(range
        .get_value((position.row, position.col))
        .filter(|data| !matches!(data, Data::Empty))
        .cloned())
}
