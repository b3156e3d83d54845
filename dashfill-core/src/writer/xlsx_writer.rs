//! XLSX writer that patches numeric cells into a copy of a template
//!
//! Only the worksheet parts holding edited cells are rewritten. Every other
//! archive entry is copied byte for byte, so styles, formulas, drawings and
//! defined names of the template survive untouched.

use super::formula::SharedFormula;
use crate::error::{Error, Result};
use crate::report::CellReference;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

/// Numeric edits per sheet name, keyed by 0-based (row, col)
pub type CellEdits = BTreeMap<String, BTreeMap<(u32, u32), f64>>;

/// Copy `input_path` to `output_path` with `edits` applied
///
/// The archive is assembled in memory before anything is written, so the
/// output may be the template itself.
pub fn fill_workbook_xlsx(input_path: &Path, output_path: &Path, edits: &CellEdits) -> Result<()> {
    let file = File::open(input_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;

    let workbook_xml = read_file_from_zip(&mut archive, WORKBOOK_PART)?;
    let rels_xml = read_file_from_zip(&mut archive, WORKBOOK_RELS_PART)?;
    let sheet_parts = resolve_sheet_parts(&workbook_xml, &rels_xml)?;

    // Rewritten parts by archive entry name
    let mut patched: HashMap<String, String> = HashMap::new();
    let mut replaced_formula = false;

    for (sheet_name, cells) in edits {
        if cells.is_empty() {
            continue;
        }
        let part = sheet_parts
            .get(sheet_name)
            .ok_or_else(|| Error::MissingSheet {
                sheet: sheet_name.clone(),
                workbook: input_path.to_path_buf(),
            })?;

        let xml = read_file_from_zip(&mut archive, part)?;
        let sheet = patch_sheet_xml(&xml, cells)?;
        tracing::debug!("patched {} cells in {}", cells.len(), part);

        replaced_formula |= sheet.replaced_formula;
        patched.insert(part.clone(), sheet.xml);
    }

    // A stale calculation chain makes Excel repair the file
    let drop_calc_chain = replaced_formula && archive.by_name(CALC_CHAIN_PART).is_ok();
    if drop_calc_chain {
        let content_types = read_file_from_zip(&mut archive, CONTENT_TYPES_PART)?;
        let content_types = remove_elements(&content_types, b"Override", b"PartName", |part| {
            part == "/xl/calcChain.xml"
        })?;
        let rels = remove_elements(&rels_xml, b"Relationship", b"Target", |target| {
            target == "calcChain.xml" || target == "/xl/calcChain.xml"
        })?;
        patched.insert(CONTENT_TYPES_PART.to_string(), content_types);
        patched.insert(WORKBOOK_RELS_PART.to_string(), rels);
        tracing::debug!("dropped {} after replacing formula cells", CALC_CHAIN_PART);
    }

    let names = (0..archive.len())
        .map(|i| archive.by_index_raw(i).map(|f| f.name().to_string()))
        .collect::<zip::result::ZipResult<Vec<_>>>()?;

    let mut zip_writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (index, name) in names.iter().enumerate() {
        if drop_calc_chain && name == CALC_CHAIN_PART {
            continue;
        }

        match patched.get(name) {
            Some(content) => {
                zip_writer.start_file(name.as_str(), patched_file_options())?;
                zip_writer.write_all(content.as_bytes())?;
            }
            None => zip_writer.raw_copy_file(archive.by_index_raw(index)?)?,
        }
    }

    let buffer = zip_writer.finish()?.into_inner();
    fs::write(output_path, buffer)?;
    Ok(())
}

// Fixed timestamp so that identical runs give identical bytes
fn patched_file_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
}

// Helper functions

fn read_file_from_zip<R: Read + Seek>(archive: &mut ZipArchive<R>, filename: &str) -> Result<String> {
    let mut file = archive.by_name(filename)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Map sheet names to their worksheet part inside the archive
fn resolve_sheet_parts(workbook_xml: &str, rels_xml: &str) -> Result<HashMap<String, String>> {
    let targets = relationship_targets(rels_xml)?;
    let mut reader = Reader::from_str(workbook_xml);
    let mut buf = Vec::new();
    let mut parts = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rel_id = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    match attr.key.local_name().as_ref() {
                        b"name" => name = Some(attr.unescape_value()?.into_owned()),
                        // r:id
                        b"id" => rel_id = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }

                if let (Some(name), Some(target)) = (name, rel_id.and_then(|id| targets.get(&id)))
                {
                    parts.insert(name, part_path(target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(parts)
}

fn relationship_targets(rels_xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(rels_xml);
    let mut buf = Vec::new();
    let mut targets = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id")?, attribute(&e, b"Target")?) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(targets)
}

/// Relationship targets are relative to `xl/` unless absolute
fn part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

/// Drop every empty `element` whose `key` attribute satisfies `matches`
fn remove_elements<F>(xml: &str, element: &[u8], key: &[u8], matches: F) -> Result<String>
where
    F: Fn(&str) -> bool,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Empty(e) if e.local_name().as_ref() == element => {
                let skip = attribute(&e, key)?.is_some_and(|value| matches(&value));
                if !skip {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Event::Eof => break,
            e => writer.write_event(e)?,
        }
        buf.clear();
    }

    into_string(writer)
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Copy of `e` without the `keys` attributes
fn without_attributes(e: &BytesStart<'_>, keys: &[&str]) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut copy = BytesStart::new(name);
    for attr in e.attributes() {
        let attr = attr?;
        if !keys.iter().any(|key| key.as_bytes() == attr.key.as_ref()) {
            copy.push_attribute(attr);
        }
    }
    Ok(copy)
}

fn element_prefix(e: &BytesStart<'_>) -> Option<String> {
    e.name()
        .prefix()
        .map(|prefix| String::from_utf8_lossy(prefix.as_ref()).into_owned())
}

fn into_string(writer: Writer<Cursor<Vec<u8>>>) -> Result<String> {
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| Error::MalformedXml(e.to_string()))
}

/// Worksheet XML after patching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedSheet {
    pub xml: String,
    /// Whether a replaced cell held a formula
    pub replaced_formula: bool,
}

/// Write `edits` into a worksheet XML document
///
/// A replaced cell keeps its style index and loses its type, formula and old
/// value. Missing rows and cells are created in sheet order and the sheet
/// dimension grows to cover them. When the master cell of a shared formula
/// is replaced, its followers get the formula written out in full.
pub fn patch_sheet_xml(xml: &str, edits: &BTreeMap<(u32, u32), f64>) -> Result<PatchedSheet> {
    let mut pending: BTreeMap<u32, BTreeMap<u32, f64>> = BTreeMap::new();
    for (&(row, col), &value) in edits {
        pending.entry(row).or_default().insert(col, value);
    }

    let mut patcher = SheetPatcher {
        writer: Writer::new(Cursor::new(Vec::new())),
        edited_area: edited_area(edits),
        pending,
        prefix: None,
        current_row: None,
        current_cell: (0, 0),
        next_row: 0,
        next_col: 0,
        shared: HashMap::new(),
        replaced_formula: false,
    };

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut in_sheet_data = false;
    // Depth inside a replaced cell whose content is dropped
    let mut skip_depth = 0usize;
    // Group index and text of a replaced shared-formula master
    let mut master: Option<(String, String)> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;

        if skip_depth > 0 {
            match &event {
                Event::Start(e) => {
                    if e.local_name().as_ref() == b"f" {
                        patcher.replaced_formula = true;
                        master = shared_master_index(e)?.map(|si| (si, String::new()));
                    }
                    skip_depth += 1;
                }
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"f" {
                        patcher.replaced_formula = true;
                    }
                }
                Event::Text(text) => {
                    if let Some((_, formula)) = master.as_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| Error::MalformedXml(e.to_string()))?;
                        formula.push_str(&text);
                    }
                }
                Event::End(e) => {
                    if e.local_name().as_ref() == b"f" {
                        if let Some((si, text)) = master.take() {
                            let (row, col) = patcher.current_cell;
                            patcher.shared.insert(si, SharedFormula { text, row, col });
                        }
                    }
                    skip_depth -= 1;
                }
                Event::Eof => {
                    return Err(Error::MalformedXml("unterminated cell element".to_string()));
                }
                _ => {}
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                let dimension = patcher.widen_dimension(e)?;
                patcher.write(Event::Empty(dimension))?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                patcher.prefix = element_prefix(&e);
                in_sheet_data = true;
                patcher.write(Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                patcher.prefix = element_prefix(&e);
                let end = e.to_end().into_owned();
                patcher.write(Event::Start(e))?;
                patcher.flush_rows(None)?;
                patcher.write(Event::End(end))?;
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"sheetData" => {
                patcher.flush_rows(None)?;
                in_sheet_data = false;
                patcher.write(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                patcher.open_row(e, false)?;
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                patcher.open_row(e, true)?;
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                patcher.close_row()?;
                patcher.write(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                if patcher.cell(e, false)? {
                    skip_depth = 1;
                }
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                patcher.cell(e, true)?;
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"f" => {
                patcher.formula(e)?;
            }
            Event::Eof => break,
            e => patcher.write(e)?,
        }
        buf.clear();
    }

    if !patcher.pending.is_empty() {
        return Err(Error::MalformedXml("worksheet has no sheetData element".to_string()));
    }

    Ok(PatchedSheet {
        replaced_formula: patcher.replaced_formula,
        xml: into_string(patcher.writer)?,
    })
}

/// Smallest (first, last) corners covering every edit
fn edited_area(edits: &BTreeMap<(u32, u32), f64>) -> Option<(CellReference, CellReference)> {
    let rows = edits.keys().map(|&(row, _)| row);
    let cols = edits.keys().map(|&(_, col)| col);
    Some((
        CellReference::new(rows.clone().min()?, cols.clone().min()?),
        CellReference::new(rows.max()?, cols.max()?),
    ))
}

/// Group index of a shared-formula master, which carries the text and range
fn shared_master_index(e: &BytesStart<'_>) -> Result<Option<String>> {
    if attribute(e, b"t")?.as_deref() != Some("shared") || attribute(e, b"ref")?.is_none() {
        return Ok(None);
    }
    attribute(e, b"si")
}

struct SheetPatcher {
    writer: Writer<Cursor<Vec<u8>>>,
    edited_area: Option<(CellReference, CellReference)>,
    /// Edits for rows not reached yet
    pending: BTreeMap<u32, BTreeMap<u32, f64>>,
    /// Namespace prefix used by `sheetData`, reused for new elements
    prefix: Option<String>,
    /// Open row with edits and its remaining cells
    current_row: Option<(u32, BTreeMap<u32, f64>)>,
    /// Position of the last cell seen
    current_cell: (u32, u32),
    next_row: u32,
    next_col: u32,
    /// Shared formulas whose master was replaced, by group index
    shared: HashMap<String, SharedFormula>,
    replaced_formula: bool,
}

impl SheetPatcher {
    fn write(&mut self, event: Event<'_>) -> Result<()> {
        self.writer.write_event(event)?;
        Ok(())
    }

    fn qualified(&self, local: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    /// `dimension` element grown to cover the edited cells
    fn widen_dimension(&self, e: BytesStart<'_>) -> Result<BytesStart<'static>> {
        let current = attribute(&e, b"ref")?;
        let bounds = current.as_deref().and_then(|reference| {
            let (first, last) = reference.split_once(':').unwrap_or((reference, reference));
            Some((CellReference::parse(first)?, CellReference::parse(last)?))
        });

        let (Some((first, last)), Some((edit_first, edit_last))) = (bounds, self.edited_area) else {
            return Ok(e.into_owned());
        };
        let first = CellReference::new(first.row.min(edit_first.row), first.col.min(edit_first.col));
        let last = CellReference::new(last.row.max(edit_last.row), last.col.max(edit_last.col));
        let widened = if first == last {
            first.to_excel_ref()
        } else {
            format!("{}:{}", first.to_excel_ref(), last.to_excel_ref())
        };
        if current.as_deref() == Some(widened.as_str()) {
            return Ok(e.into_owned());
        }

        let mut dimension = without_attributes(&e, &["ref"])?;
        dimension.push_attribute(("ref", widened.as_str()));
        Ok(dimension)
    }

    /// Write out a shared-formula follower whose master was replaced
    fn formula(&mut self, e: BytesStart<'_>) -> Result<()> {
        let group = match attribute(&e, b"t")?.as_deref() {
            Some("shared") => attribute(&e, b"si")?.and_then(|si| self.shared.get(&si)),
            _ => None,
        };
        let Some(group) = group else {
            return self.write(Event::Empty(e));
        };

        let (row, col) = self.current_cell;
        let text = group.text_at(row, col);
        let start = without_attributes(&e, &["t", "si", "ref"])?;
        let end = start.to_end().into_owned();
        self.write(Event::Start(start))?;
        self.write(Event::Text(BytesText::new(&text)))?;
        self.write(Event::End(end))
    }

    /// Emit new rows for pending edits above `before` (all when `None`)
    fn flush_rows(&mut self, before: Option<u32>) -> Result<()> {
        let rows: Vec<u32> = self
            .pending
            .keys()
            .copied()
            .take_while(|&row| before.map_or(true, |limit| row < limit))
            .collect();

        for row in rows {
            let Some(cells) = self.pending.remove(&row) else {
                continue;
            };
            let row_name = self.qualified("row");
            let mut start = BytesStart::new(row_name.as_str());
            start.push_attribute(("r", (row + 1).to_string().as_str()));
            self.write(Event::Start(start))?;
            for (col, value) in cells {
                self.write_cell(row, col, value, None)?;
            }
            self.write(Event::End(BytesEnd::new(row_name.as_str())))?;
        }
        Ok(())
    }

    fn open_row(&mut self, e: BytesStart<'_>, empty: bool) -> Result<()> {
        let row = match attribute(&e, b"r")? {
            Some(r) => r
                .trim()
                .parse::<u32>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .ok_or_else(|| Error::MalformedXml(format!("invalid row number '{r}'")))?,
            None => self.next_row,
        };
        self.next_row = row + 1;
        self.next_col = 0;

        self.flush_rows(Some(row))?;

        match (self.pending.remove(&row), empty) {
            (Some(cells), true) => {
                let end = e.to_end().into_owned();
                self.write(Event::Start(without_attributes(&e, &["spans"])?))?;
                for (col, value) in cells {
                    self.write_cell(row, col, value, None)?;
                }
                self.write(Event::End(end))?;
            }
            (Some(cells), false) => {
                self.write(Event::Start(without_attributes(&e, &["spans"])?))?;
                self.current_row = Some((row, cells));
            }
            (None, true) => self.write(Event::Empty(e))?,
            (None, false) => self.write(Event::Start(e))?,
        }
        Ok(())
    }

    /// Emit the edits of the open row that come after its last cell
    fn close_row(&mut self) -> Result<()> {
        if let Some((row, cells)) = self.current_row.take() {
            for (col, value) in cells {
                self.write_cell(row, col, value, None)?;
            }
        }
        Ok(())
    }

    /// Handle an existing cell; returns true when its content must be skipped
    fn cell(&mut self, e: BytesStart<'_>, empty: bool) -> Result<bool> {
        let col = match attribute(&e, b"r")? {
            Some(r) => CellReference::parse(r.trim())
                .map(|cell| cell.col)
                .ok_or_else(|| Error::MalformedXml(format!("invalid cell reference '{r}'")))?,
            None => self.next_col,
        };
        self.next_col = col + 1;
        self.current_cell = (self.next_row.saturating_sub(1), col);

        let Some((row, mut cells)) = self.current_row.take() else {
            self.write(if empty { Event::Empty(e) } else { Event::Start(e) })?;
            return Ok(false);
        };

        let before: Vec<(u32, f64)> = cells.range(..col).map(|(c, v)| (*c, *v)).collect();
        for (c, _) in &before {
            cells.remove(c);
        }
        let replacement = cells.remove(&col);
        self.current_row = Some((row, cells));

        for (c, value) in before {
            self.write_cell(row, c, value, None)?;
        }

        match replacement {
            Some(value) => {
                let style = attribute(&e, b"s")?;
                self.write_cell(row, col, value, style.as_deref())?;
                Ok(!empty)
            }
            None => {
                self.write(if empty { Event::Empty(e) } else { Event::Start(e) })?;
                Ok(false)
            }
        }
    }

    fn write_cell(&mut self, row: u32, col: u32, value: f64, style: Option<&str>) -> Result<()> {
        let cell_name = self.qualified("c");
        let value_name = self.qualified("v");
        let reference = CellReference::new(row, col).to_excel_ref();

        let mut start = BytesStart::new(cell_name.as_str());
        start.push_attribute(("r", reference.as_str()));
        if let Some(style) = style {
            start.push_attribute(("s", style));
        }

        self.write(Event::Start(start))?;
        self.write(Event::Start(BytesStart::new(value_name.as_str())))?;
        self.write(Event::Text(BytesText::new(&value.to_string())))?;
        self.write(Event::End(BytesEnd::new(value_name.as_str())))?;
        self.write(Event::End(BytesEnd::new(cell_name.as_str())))?;
        Ok(())
    }
}
