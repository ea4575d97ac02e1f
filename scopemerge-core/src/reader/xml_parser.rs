//! XML parsing utilities for extracting sheet parts and cell fills from XLSX files

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::BufReader;
use zip::ZipArchive;

/// Parse a cell reference like "A1" into (row, col) as 1-based indices
pub fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let mut col = 0u32;
    let mut row_str = String::new();

    for ch in cell_ref.chars() {
        if ch.is_ascii_alphabetic() {
            if !row_str.is_empty() {
                return None;
            }
            col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        } else if ch.is_ascii_digit() {
            row_str.push(ch);
        } else if ch != '$' {
            return None;
        }
    }

    if row_str.is_empty() || col == 0 {
        return None;
    }

    let row = row_str.parse::<u32>().ok()?;
    if row == 0 {
        return None;
    }

    Some((row, col))
}

/// Resolve every sheet name to its XML path in the XLSX archive, in workbook order
pub fn get_xlsx_sheet_paths(
    archive: &mut ZipArchive<impl std::io::Read + std::io::Seek>,
) -> Result<Vec<(String, String)>> {
    // 1. Sheet names and rIds from xl/workbook.xml
    let mut sheets = Vec::new();
    {
        let workbook_xml = archive
            .by_name("xl/workbook.xml")
            .context("Failed to find xl/workbook.xml")?;
        let mut reader = Reader::from_reader(BufReader::new(workbook_xml));
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"sheet" => {
                    let mut name = String::new();
                    let mut r_id = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"name" => name = attr.unescape_value()?.to_string(),
                            b"r:id" => r_id = attr.unescape_value()?.to_string(),
                            _ => {}
                        }
                    }
                    sheets.push((name, r_id));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
    }

    // 2. Resolve rIds in xl/_rels/workbook.xml.rels
    let mut targets: HashMap<String, String> = HashMap::new();
    {
        let rels_xml = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .context("Failed to find xl/_rels/workbook.xml.rels")?;
        let mut reader = Reader::from_reader(BufReader::new(rels_xml));
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Relationship" => {
                    let mut id = String::new();
                    let mut target = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Id" => id = attr.unescape_value()?.to_string(),
                            b"Target" => target = attr.unescape_value()?.to_string(),
                            _ => {}
                        }
                    }
                    targets.insert(id, target);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
    }

    sheets
        .into_iter()
        .map(|(name, r_id)| {
            let target = targets.get(&r_id).with_context(|| {
                format!("Relationship '{}' not found for sheet '{}'", r_id, name)
            })?;
            Ok((name, normalize_part_path(target)))
        })
        .collect()
}

/// Targets are relative to `xl/` unless absolute
fn normalize_part_path(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// Parse `xl/styles.xml` into the fill identifier of every cell format (`cellXfs` entry)
pub fn parse_styles(
    archive: &mut ZipArchive<impl std::io::Read + std::io::Seek>,
) -> Result<Vec<Option<String>>> {
    let styles_xml = match archive.by_name("xl/styles.xml") {
        Ok(file) => file,
        Err(_) => return Ok(Vec::new()),
    };

    let mut reader = Reader::from_reader(BufReader::new(styles_xml));
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut fills: Vec<Option<String>> = Vec::new();
    let mut xfs = Vec::new();
    let mut in_fills = false;
    let mut in_cell_xfs = false;
    let mut solid = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let is_start = matches!(event, Event::Start(_));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => match e.name().as_ref() {
                b"fills" => in_fills = is_start,
                b"fill" if in_fills => {
                    fills.push(None);
                    solid = false;
                }
                b"patternFill" if in_fills => {
                    solid = e.attributes().flatten().any(|a| {
                        a.key.as_ref() == b"patternType" && a.value.as_ref() != b"none"
                    });
                }
                b"fgColor" if in_fills && solid => {
                    if let Some(last) = fills.last_mut() {
                        *last = color_identifier(e)?;
                    }
                }
                b"cellXfs" => in_cell_xfs = is_start,
                b"xf" if in_cell_xfs => {
                    let mut fill_id = 0usize;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"fillId"
                            && let Ok(val) = attr.unescape_value()?.parse::<usize>()
                        {
                            fill_id = val;
                        }
                    }
                    xfs.push(fills.get(fill_id).cloned().flatten());
                }
                _ => {}
            },
            Event::End(ref e) => match e.name().as_ref() {
                b"fills" => in_fills = false,
                b"cellXfs" => in_cell_xfs = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(xfs)
}

/// Opaque identifier for a `<fgColor>` element
fn color_identifier(e: &BytesStart) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"rgb" => return Ok(Some(value.to_ascii_uppercase())),
            b"theme" => return Ok(Some(format!("theme:{}", value))),
            b"indexed" => return Ok(Some(format!("indexed:{}", value))),
            _ => {}
        }
    }
    Ok(None)
}

/// Extract cell style indices from a worksheet part
pub fn extract_cell_style_indices_from_xlsx(
    archive: &mut ZipArchive<impl std::io::Read + std::io::Seek>,
    sheet_path: &str,
) -> Result<HashMap<(u32, u32), usize>> {
    let mut cell_styles = HashMap::new();

    let sheet_xml = match archive.by_name(sheet_path) {
        Ok(file) => file,
        Err(_) => return Ok(cell_styles),
    };

    let mut reader = Reader::from_reader(BufReader::new(sheet_xml));
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut current_row = 0u32;
    let mut current_col = 0u32;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                b"row" => {
                    // Rows without `r` follow the previous row
                    let mut row = current_row + 1;
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"r"
                            && let Ok(r) = attr.unescape_value()?.parse::<u32>()
                        {
                            row = r;
                        }
                    }
                    current_row = row;
                    current_col = 0;
                }
                b"c" => {
                    let mut position = None;
                    let mut style_index = None;

                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"r" => position = parse_cell_ref(&attr.unescape_value()?),
                            b"s" => style_index = attr.unescape_value()?.parse::<usize>().ok(),
                            _ => {}
                        }
                    }

                    // Cells without `r` follow the previous cell in the same row
                    let (row, col) = position.unwrap_or((current_row, current_col + 1));
                    current_col = col;

                    if let Some(style_index) = style_index {
                        cell_styles.insert((row, col), style_index);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(cell_styles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn archive_with(parts: &[(&str, &str)]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            for (name, content) in parts {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        ZipArchive::new(Cursor::new(buf)).unwrap()
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((1, 1)));
        assert_eq!(parse_cell_ref("B2"), Some((2, 2)));
        assert_eq!(parse_cell_ref("Z26"), Some((26, 26)));
        assert_eq!(parse_cell_ref("AA1"), Some((1, 27)));
        assert_eq!(parse_cell_ref("$AB$10"), Some((10, 28)));
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("1A"), None);
        assert_eq!(parse_cell_ref("Sheet!A1"), None);
    }

    #[test]
    fn test_parse_styles_resolves_fills() {
        let styles = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fills count="4">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
<fill><patternFill patternType="solid"><fgColor rgb="ffddebf7"/><bgColor indexed="64"/></patternFill></fill>
<fill><patternFill patternType="solid"><fgColor theme="4" tint="0.79"/></patternFill></fill>
</fills>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="2"/></cellStyleXfs>
<cellXfs count="3">
<xf numFmtId="0" fontId="0" fillId="0" xfId="0"/>
<xf numFmtId="0" fontId="0" fillId="2" xfId="0" applyFill="1"/>
<xf numFmtId="0" fontId="0" fillId="3" xfId="0" applyFill="1"/>
</cellXfs>
</styleSheet>"#;
        let mut archive = archive_with(&[("xl/styles.xml", styles)]);

        let xfs = parse_styles(&mut archive).unwrap();

        assert_eq!(
            xfs,
            vec![None, Some("FFDDEBF7".to_string()), Some("theme:4".to_string())]
        );
    }

    #[test]
    fn test_sheet_paths_follow_workbook_order() {
        let workbook = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>
<sheet name="Scope 3" sheetId="2" r:id="rId5"/>
<sheet name="Scope 1" sheetId="1" r:id="rId1"/>
</sheets></workbook>"#;
        let rels = r#"<Relationships>
<Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId5" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;
        let mut archive = archive_with(&[
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", rels),
        ]);

        let paths = get_xlsx_sheet_paths(&mut archive).unwrap();

        assert_eq!(
            paths,
            vec![
                ("Scope 3".to_string(), "xl/worksheets/sheet2.xml".to_string()),
                ("Scope 1".to_string(), "xl/worksheets/sheet1.xml".to_string()),
            ]
        );
    }

    #[test]
    fn test_cell_style_indices() {
        let sheet = r#"<worksheet><sheetData>
<row r="2"><c r="B2" s="1" t="s"><v>0</v></c><c r="C2" s="2"/></row>
<row r="3"><c r="A3"><v>4</v></c></row>
</sheetData></worksheet>"#;
        let mut archive = archive_with(&[("xl/worksheets/sheet1.xml", sheet)]);

        let styles =
            extract_cell_style_indices_from_xlsx(&mut archive, "xl/worksheets/sheet1.xml").unwrap();

        assert_eq!(styles.len(), 2);
        assert_eq!(styles.get(&(2, 2)), Some(&1));
        assert_eq!(styles.get(&(2, 3)), Some(&2));
    }
}
