//! XLSX writer: patches cell values and appends sheets without touching other parts

use crate::reader::workbook::{col_to_letter, same_sheet_name};
use crate::reader::xml_parser::{get_xlsx_sheet_paths, parse_cell_ref};
use crate::reader::CellValue;
use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use zip::{ZipArchive, ZipWriter, write::FileOptions};

const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const WORKSHEET_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const WORKSHEET_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

/// Cell values keyed by 1-based `(row, col)`
pub type CellEdits = BTreeMap<(u32, u32), CellValue>;

/// A sheet to append after the existing ones
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSheet {
    pub name: String,
    pub cells: CellEdits,
}

/// Struct used to define modifications to be applied to a workbook
#[derive(Debug, Default)]
pub struct WorkbookModifications {
    /// Values to set in existing sheets, by sheet name
    pub cell_edits: HashMap<String, CellEdits>,
    pub new_sheets: Vec<NewSheet>,
}

impl WorkbookModifications {
    pub fn is_empty(&self) -> bool {
        self.cell_edits.values().all(|edits| edits.is_empty()) && self.new_sheets.is_empty()
    }
}

/// Part names and ids assigned to an appended sheet
struct NewSheetPart<'a> {
    sheet: &'a NewSheet,
    part: String,
    r_id: String,
    sheet_id: u32,
}

/// Modify an XLSX file by applying specified modifications
pub fn modify_workbook_xlsx(
    input_path: &Path,
    output_path: &Path,
    modifications: &WorkbookModifications,
) -> Result<()> {
    let output = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    write_workbook_xlsx(input_path, output, modifications)
}

/// Stream the modified package of `input_path` into `output`
pub fn write_workbook_xlsx<W: Write + Seek>(
    input_path: &Path,
    output: W,
    modifications: &WorkbookModifications,
) -> Result<()> {
    let file = File::open(input_path)?;
    let reader = BufReader::new(file);
    let mut archive = ZipArchive::new(reader)?;

    // Resolve edited sheet names to their parts
    let sheet_paths: HashMap<String, String> = get_xlsx_sheet_paths(&mut archive)?.into_iter().collect();
    let mut edits_by_part: HashMap<&str, &CellEdits> = HashMap::new();
    for (name, edits) in &modifications.cell_edits {
        if edits.is_empty() {
            continue;
        }
        let part = sheet_paths
            .get(name)
            .with_context(|| format!("Sheet '{}' not found in {}", name, input_path.display()))?;
        edits_by_part.insert(part.as_str(), edits);
    }

    // Cached formula results in edited sheets may no longer hold; let the app rebuild its chain
    let drop_calc_chain = !edits_by_part.is_empty();

    let workbook_xml = read_file_from_zip(&mut archive, "xl/workbook.xml")?;
    let rels_xml = read_file_from_zip(&mut archive, "xl/_rels/workbook.xml.rels")?;
    let new_parts = plan_new_sheets(&archive, &workbook_xml, &rels_xml, modifications)?;

    let mut zip_writer = ZipWriter::new(output);

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();

        if drop_calc_chain && name == CALC_CHAIN_PART {
            continue;
        }

        let content = if let Some(edits) = edits_by_part.get(name.as_str()) {
            let mut xml = String::new();
            file.read_to_string(&mut xml)?;
            Some(patch_sheet_data(&xml, edits).with_context(|| format!("Failed to update {}", name))?)
        } else if name == "xl/workbook.xml" && !new_parts.is_empty() {
            Some(add_sheets_to_workbook_xml(&workbook_xml, &new_parts)?)
        } else if name == "xl/_rels/workbook.xml.rels" && (!new_parts.is_empty() || drop_calc_chain) {
            Some(update_workbook_relationships(&rels_xml, &new_parts, drop_calc_chain)?)
        } else if name == "[Content_Types].xml" && (!new_parts.is_empty() || drop_calc_chain) {
            let mut xml = String::new();
            file.read_to_string(&mut xml)?;
            Some(update_content_types(&xml, &new_parts, drop_calc_chain)?)
        } else {
            None
        };

        zip_writer.start_file(&name, FileOptions::<()>::default())?;
        match content {
            Some(content) => zip_writer.write_all(content.as_bytes())?,
            None => {
                // Copy file as is
                let mut buffer = Vec::new();
                file.read_to_end(&mut buffer)?;
                zip_writer.write_all(&buffer)?;
            }
        }
    }

    for new_part in &new_parts {
        zip_writer.start_file(&new_part.part, FileOptions::<()>::default())?;
        zip_writer.write_all(new_sheet_xml(&new_part.sheet.cells)?.as_bytes())?;
    }

    zip_writer.finish()?;
    Ok(())
}

// Helper functions

fn read_file_from_zip<R: Read + Seek>(archive: &mut ZipArchive<R>, filename: &str) -> Result<String> {
    let mut file = archive
        .by_name(filename)
        .with_context(|| format!("Failed to find {}", filename))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.to_string()));
        }
    }
    Ok(None)
}

fn plan_new_sheets<'a, R: Read + Seek>(
    archive: &ZipArchive<R>,
    workbook_xml: &str,
    rels_xml: &str,
    modifications: &'a WorkbookModifications,
) -> Result<Vec<NewSheetPart<'a>>> {
    if modifications.new_sheets.is_empty() {
        return Ok(Vec::new());
    }

    let existing_parts: HashSet<&str> = archive.file_names().collect();
    let (existing_names, max_sheet_id) = parse_sheet_info(workbook_xml)?;
    let rel_ids = parse_relationship_ids(rels_xml)?;

    let mut next_part = 1;
    let mut next_rel = rel_ids.len() + 1;
    let mut sheet_id = max_sheet_id;
    let mut parts = Vec::with_capacity(modifications.new_sheets.len());

    for sheet in &modifications.new_sheets {
        if existing_names.iter().any(|n| same_sheet_name(n, &sheet.name)) {
            anyhow::bail!("Sheet '{}' already exists", sheet.name);
        }

        while existing_parts.contains(format!("xl/worksheets/sheet{}.xml", next_part).as_str()) {
            next_part += 1;
        }
        while rel_ids.contains(&format!("rId{}", next_rel)) {
            next_rel += 1;
        }
        sheet_id += 1;

        parts.push(NewSheetPart {
            sheet,
            part: format!("xl/worksheets/sheet{}.xml", next_part),
            r_id: format!("rId{}", next_rel),
            sheet_id,
        });
        next_part += 1;
        next_rel += 1;
    }

    Ok(parts)
}

/// Sheet names and the highest sheetId in workbook.xml
fn parse_sheet_info(workbook_xml: &str) -> Result<(Vec<String>, u32)> {
    let mut reader = Reader::from_str(workbook_xml);
    let mut names = Vec::new();
    let mut max_id = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"sheet" => {
                if let Some(name) = attribute(&e, b"name")? {
                    names.push(name);
                }
                if let Some(id) = attribute(&e, b"sheetId")? {
                    max_id = max_id.max(id.parse::<u32>()?);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
            _ => {}
        }
    }

    Ok((names, max_id))
}

fn parse_relationship_ids(rels_xml: &str) -> Result<HashSet<String>> {
    let mut reader = Reader::from_str(rels_xml);
    let mut ids = HashSet::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Relationship" => {
                if let Some(id) = attribute(&e, b"Id")? {
                    ids.insert(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
            _ => {}
        }
    }

    Ok(ids)
}

fn add_sheets_to_workbook_xml(xml: &str, new_parts: &[NewSheetPart]) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    loop {
        match reader.read_event() {
            Ok(Event::End(e)) if e.name().as_ref() == b"sheets" => {
                for new_part in new_parts {
                    let sheet_id = new_part.sheet_id.to_string();
                    let mut sheet = BytesStart::new("sheet");
                    sheet.push_attribute(("name", new_part.sheet.name.as_str()));
                    sheet.push_attribute(("sheetId", sheet_id.as_str()));
                    sheet.push_attribute(("r:id", new_part.r_id.as_str()));
                    writer.write_event(Event::Empty(sheet))?;
                }
                writer.write_event(Event::End(e))?;
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
    }

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn update_workbook_relationships(
    xml: &str,
    new_parts: &[NewSheetPart],
    drop_calc_chain: bool,
) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Relationship" => {
                let is_calc_chain = attribute(&e, b"Type")?
                    .is_some_and(|t| t.ends_with("/calcChain"));
                if !(drop_calc_chain && is_calc_chain) {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"Relationships" => {
                for new_part in new_parts {
                    let target = new_part.part.trim_start_matches("xl/");
                    let mut rel = BytesStart::new("Relationship");
                    rel.push_attribute(("Id", new_part.r_id.as_str()));
                    rel.push_attribute(("Type", WORKSHEET_REL_TYPE));
                    rel.push_attribute(("Target", target));
                    writer.write_event(Event::Empty(rel))?;
                }
                writer.write_event(Event::End(e))?;
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
    }

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn update_content_types(
    xml: &str,
    new_parts: &[NewSheetPart],
    drop_calc_chain: bool,
) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let calc_chain_part = format!("/{}", CALC_CHAIN_PART);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) if e.name().as_ref() == b"Override" => {
                let part_name = attribute(&e, b"PartName")?.unwrap_or_default();
                if !(drop_calc_chain && part_name == calc_chain_part) {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"Types" => {
                for new_part in new_parts {
                    let part_name = format!("/{}", new_part.part);
                    let mut entry = BytesStart::new("Override");
                    entry.push_attribute(("PartName", part_name.as_str()));
                    entry.push_attribute(("ContentType", WORKSHEET_CONTENT_TYPE));
                    writer.write_event(Event::Empty(entry))?;
                }
                writer.write_event(Event::End(e))?;
            }
            Ok(Event::Eof) => break,
            Ok(e) => writer.write_event(e)?,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        }
    }

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn new_sheet_xml(cells: &CellEdits) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    let mut worksheet = BytesStart::new("worksheet");
    worksheet.push_attribute(("xmlns", SPREADSHEETML_NS));
    writer.write_event(Event::Start(worksheet))?;

    if cells.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new("sheetData")))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new("sheetData")))?;
        let mut pending = cells.clone();
        flush_rows(&mut writer, &mut pending, u32::MAX)?;
        writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

/// Rewrite `<sheetData>`, replacing edited cells and inserting new cells and
/// rows in row and column order. Replaced cells keep their style.
fn patch_sheet_data(xml: &str, edits: &CellEdits) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut pending = edits.clone();

    let mut in_sheet_data = false;
    let mut current_row: Option<u32> = None;
    let mut last_row = 0;
    let mut last_col = 0;
    // Inside a cell being replaced; its children are dropped
    let mut skipping_cell = false;

    loop {
        let event = match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(event) => event,
            Err(e) => return Err(anyhow::anyhow!("Error parsing XML: {}", e)),
        };

        if skipping_cell {
            if matches!(&event, Event::End(e) if e.name().as_ref() == b"c") {
                skipping_cell = false;
            }
            continue;
        }

        let has_children = matches!(event, Event::Start(_));

        match event {
            Event::Start(e) if e.name().as_ref() == b"sheetData" => {
                in_sheet_data = true;
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if e.name().as_ref() == b"sheetData" => {
                writer.write_event(Event::Start(e))?;
                flush_rows(&mut writer, &mut pending, u32::MAX)?;
                writer.write_event(Event::End(BytesEnd::new("sheetData")))?;
            }
            Event::End(e) if e.name().as_ref() == b"sheetData" => {
                flush_rows(&mut writer, &mut pending, u32::MAX)?;
                in_sheet_data = false;
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) if in_sheet_data && e.name().as_ref() == b"row" => {
                let row = row_number(&e, last_row)?;
                flush_rows(&mut writer, &mut pending, row)?;
                writer.write_event(Event::Start(e))?;
                current_row = Some(row);
                last_row = row;
                last_col = 0;
            }
            Event::Empty(e) if in_sheet_data && e.name().as_ref() == b"row" => {
                let row = row_number(&e, last_row)?;
                flush_rows(&mut writer, &mut pending, row)?;
                let cells = take_row(&mut pending, row);
                if cells.is_empty() {
                    writer.write_event(Event::Empty(e))?;
                } else {
                    writer.write_event(Event::Start(e))?;
                    for (col, value) in cells {
                        write_cell(&mut writer, row, col, &value, None)?;
                    }
                    writer.write_event(Event::End(BytesEnd::new("row")))?;
                }
                last_row = row;
            }
            Event::End(e) if in_sheet_data && e.name().as_ref() == b"row" => {
                if let Some(row) = current_row.take() {
                    for (col, value) in take_row(&mut pending, row) {
                        write_cell(&mut writer, row, col, &value, None)?;
                    }
                }
                writer.write_event(Event::End(e))?;
            }
            Event::Start(e) | Event::Empty(e)
                if e.name().as_ref() == b"c" && current_row.is_some() =>
            {
                let row = current_row.unwrap_or(last_row);
                let col = match attribute(&e, b"r")?.and_then(|r| parse_cell_ref(&r)) {
                    Some((_, col)) => col,
                    None => last_col + 1,
                };
                // New cells to the left of this one go first
                let before: Vec<_> = pending
                    .range((row, 0)..(row, col))
                    .map(|(&(_, c), v)| (c, v.clone()))
                    .collect();
                for (c, value) in before {
                    pending.remove(&(row, c));
                    write_cell(&mut writer, row, c, &value, None)?;
                }

                match pending.remove(&(row, col)) {
                    Some(value) => {
                        let style = attribute(&e, b"s")?;
                        write_cell(&mut writer, row, col, &value, style.as_deref())?;
                        skipping_cell = has_children;
                    }
                    None if has_children => writer.write_event(Event::Start(e))?,
                    None => writer.write_event(Event::Empty(e))?,
                }
                last_col = col;
            }
            event => writer.write_event(event)?,
        }
    }

    let result = writer.into_inner().into_inner();
    Ok(String::from_utf8(result)?)
}

fn row_number(e: &BytesStart, last_row: u32) -> Result<u32> {
    match attribute(e, b"r")? {
        Some(r) => Ok(r.parse::<u32>().with_context(|| format!("Invalid row number '{}'", r))?),
        None => Ok(last_row + 1),
    }
}

fn take_row(pending: &mut CellEdits, row: u32) -> Vec<(u32, CellValue)> {
    let cols: Vec<u32> = pending
        .range((row, 0)..=(row, u32::MAX))
        .map(|(&(_, col), _)| col)
        .collect();
    cols.into_iter()
        .filter_map(|col| pending.remove(&(row, col)).map(|value| (col, value)))
        .collect()
}

/// Write every pending row above `before_row` as a new `<row>`
fn flush_rows<W: Write>(writer: &mut Writer<W>, pending: &mut CellEdits, before_row: u32) -> Result<()> {
    while let Some((&(row, _), _)) = pending.first_key_value() {
        if row >= before_row {
            break;
        }
        let row_attr = row.to_string();
        let mut start = BytesStart::new("row");
        start.push_attribute(("r", row_attr.as_str()));
        writer.write_event(Event::Start(start))?;
        for (col, value) in take_row(pending, row) {
            write_cell(writer, row, col, &value, None)?;
        }
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }
    Ok(())
}

fn write_cell<W: Write>(
    writer: &mut Writer<W>,
    row: u32,
    col: u32,
    value: &CellValue,
    style: Option<&str>,
) -> Result<()> {
    let reference = format!("{}{}", col_to_letter(col), row);
    let mut cell = BytesStart::new("c");
    cell.push_attribute(("r", reference.as_str()));
    if let Some(style) = style {
        cell.push_attribute(("s", style));
    }

    match value {
        CellValue::Empty => {
            writer.write_event(Event::Empty(cell))?;
        }
        CellValue::Number(n) => {
            writer.write_event(Event::Start(cell))?;
            write_text_element(writer, "v", &n.to_string(), false)?;
            writer.write_event(Event::End(BytesEnd::new("c")))?;
        }
        CellValue::Boolean(b) => {
            cell.push_attribute(("t", "b"));
            writer.write_event(Event::Start(cell))?;
            write_text_element(writer, "v", if *b { "1" } else { "0" }, false)?;
            writer.write_event(Event::End(BytesEnd::new("c")))?;
        }
        CellValue::Text(s) => {
            cell.push_attribute(("t", "inlineStr"));
            writer.write_event(Event::Start(cell))?;
            writer.write_event(Event::Start(BytesStart::new("is")))?;
            let preserve = s.trim() != s;
            write_text_element(writer, "t", s, preserve)?;
            writer.write_event(Event::End(BytesEnd::new("is")))?;
            writer.write_event(Event::End(BytesEnd::new("c")))?;
        }
    }

    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
    preserve_space: bool,
) -> Result<()> {
    let mut start = BytesStart::new(name);
    if preserve_space {
        start.push_attribute(("xml:space", "preserve"));
    }
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}
