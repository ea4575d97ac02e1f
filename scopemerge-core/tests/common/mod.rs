#![allow(dead_code)]

use scopemerge_core::reader::workbook::col_to_letter;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

pub const MARKER: &str = "FFDDEBF7";

/// Cell content for mock workbooks
#[derive(Debug, Clone)]
pub enum Mock {
    Text(&'static str),
    Number(f64),
    /// No value, only a style
    Blank,
}

/// `(row, col, content, marked)`, 1-based
pub type MockCell = (u32, u32, Mock, bool);

pub fn text(row: u32, col: u32, value: &'static str) -> MockCell {
    (row, col, Mock::Text(value), false)
}

pub fn marked(row: u32, col: u32, value: Mock) -> MockCell {
    (row, col, value, true)
}

// Helper to create a minimal valid XLSX file with shared strings and a marker fill
pub fn create_mock_xlsx(path: &Path, sheets: &[(&str, Vec<MockCell>)]) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
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
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
"#,
    );
    for (i, _) in sheets.iter().enumerate() {
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i + 1
        ));
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
    rels_xml.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
        sheets.len() + 2
    ));
    rels_xml.push_str("</Relationships>");
    zip.write_all(rels_xml.as_bytes())?;

    // 5. xl/styles.xml: xf 1 carries the marker fill
    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts>
<fills count="3">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
<fill><patternFill patternType="solid"><fgColor rgb="{}"/><bgColor indexed="64"/></patternFill></fill>
</fills>
<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="2">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="0" fontId="0" fillId="2" borderId="0" xfId="0" applyFill="1"/>
</cellXfs>
</styleSheet>"#,
            MARKER
        )
        .as_bytes(),
    )?;

    // 6. sheets, collecting shared strings on the way
    let mut strings: Vec<&str> = Vec::new();
    for (i, (_, cells)) in sheets.iter().enumerate() {
        let mut rows: BTreeMap<u32, Vec<&MockCell>> = BTreeMap::new();
        for cell in cells {
            rows.entry(cell.0).or_default().push(cell);
        }

        let mut sheet_xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (row, mut cells) in rows {
            cells.sort_by_key(|c| c.1);
            sheet_xml.push_str(&format!(r#"<row r="{}">"#, row));
            for (_, col, value, is_marked) in cells {
                let reference = format!("{}{}", col_to_letter(*col), row);
                let style = if *is_marked { r#" s="1""# } else { "" };
                match value {
                    Mock::Text(s) => {
                        let index = match strings.iter().position(|x| x == s) {
                            Some(index) => index,
                            None => {
                                strings.push(*s);
                                strings.len() - 1
                            }
                        };
                        sheet_xml.push_str(&format!(
                            r#"<c r="{}"{} t="s"><v>{}</v></c>"#,
                            reference, style, index
                        ));
                    }
                    Mock::Number(n) => {
                        sheet_xml.push_str(&format!(r#"<c r="{}"{}><v>{}</v></c>"#, reference, style, n));
                    }
                    Mock::Blank => {
                        sheet_xml.push_str(&format!(r#"<c r="{}"{}/>"#, reference, style));
                    }
                }
            }
            sheet_xml.push_str("</row>");
        }
        sheet_xml.push_str("</sheetData></worksheet>");

        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)?;
        zip.write_all(sheet_xml.as_bytes())?;
    }

    // 7. xl/sharedStrings.xml
    zip.start_file("xl/sharedStrings.xml", options)?;
    let mut sst = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        strings.len()
    );
    for s in &strings {
        sst.push_str(&format!("<si><t>{}</t></si>", s));
    }
    sst.push_str("</sst>");
    zip.write_all(sst.as_bytes())?;

    zip.finish()?;
    Ok(())
}

/// Names of every part in a package
pub fn part_names(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = File::open(path)?;
    let zip = zip::ZipArchive::new(file)?;
    Ok(zip.file_names().map(str::to_string).collect())
}

/// Content of one package part
pub fn read_part(path: &Path, part: &str) -> anyhow::Result<String> {
    use std::io::Read;

    let file = File::open(path)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut content = String::new();
    zip.by_name(part)?.read_to_string(&mut content)?;
    Ok(content)
}
