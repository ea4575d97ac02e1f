mod common;

use common::{MARKER, Mock, create_mock_xlsx, marked, part_names, read_part, text};
use scopemerge_core::reader::{CellValue, Workbook, read_workbook};
use scopemerge_core::writer::{
    CellEdits, NewSheet, WorkbookModifications, modify_workbook, save_workbook,
};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

fn summary(path: &Path) -> anyhow::Result<()> {
    create_mock_xlsx(
        path,
        &[(
            "Acme Corp",
            vec![
                text(2, 2, "CO2e emissions (kg)"),
                marked(2, 3, Mock::Number(1.0)),
                text(4, 2, "Diesel (l)"),
            ],
        )],
    )
}

/// Copy a package and add a calculation chain to it
fn with_calc_chain(input: &Path, output: &Path) -> anyhow::Result<()> {
    let mut archive = ZipArchive::new(File::open(input)?)?;
    let mut zip = ZipWriter::new(File::create(output)?);
    let options = SimpleFileOptions::default();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();
        let mut content = String::new();
        file.read_to_string(&mut content)?;

        let content = match name.as_str() {
            "xl/_rels/workbook.xml.rels" => content.replace(
                "</Relationships>",
                r#"<Relationship Id="rId99" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/calcChain" Target="calcChain.xml"/></Relationships>"#,
            ),
            "[Content_Types].xml" => content.replace(
                "</Types>",
                r#"<Override PartName="/xl/calcChain.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.calcChain+xml"/></Types>"#,
            ),
            _ => content,
        };
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }

    zip.start_file("xl/calcChain.xml", options)?;
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><calcChain xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><c r="C4" i="1"/></calcChain>"#)?;
    zip.finish()?;
    Ok(())
}

fn edits(sheet: &str, cells: &[((u32, u32), CellValue)]) -> WorkbookModifications {
    let cells: CellEdits = cells.iter().cloned().collect();
    WorkbookModifications {
        cell_edits: HashMap::from([(sheet.to_string(), cells)]),
        new_sheets: Vec::new(),
    }
}

#[test]
fn test_edit_keeps_cell_style() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("Summary.xlsx");
    let output = dir.path().join("Filled.xlsx");
    summary(&input)?;

    let modifications = edits(
        "Acme Corp",
        &[
            ((2, 3), CellValue::Number(42.0)),
            ((4, 3), CellValue::Text("n/a".into())),
        ],
    );
    modify_workbook(&input, &output, &modifications)?;

    let xml = read_part(&output, "xl/worksheets/sheet1.xml")?;
    assert!(xml.contains(r#"<c r="C2" s="1"><v>42</v></c>"#));
    assert!(xml.contains(r#"<c r="C4" t="inlineStr"><is><t>n/a</t></is></c>"#));

    let workbook = read_workbook(&output)?;
    let sheet = workbook.get_sheet("Acme Corp").unwrap();
    assert_eq!(sheet.value_at(2, 3), &CellValue::Number(42.0));
    assert_eq!(sheet.get_cell(2, 3).unwrap().fill.as_deref(), Some(MARKER));
    assert_eq!(sheet.value_at(4, 3), &CellValue::Text("n/a".into()));
    assert_eq!(sheet.value_at(4, 2), &CellValue::Text("Diesel (l)".into()));
    Ok(())
}

#[test]
fn test_new_sheet_is_registered() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("Summary.xlsx");
    let output = dir.path().join("Filled.xlsx");
    summary(&input)?;

    let modifications = WorkbookModifications {
        cell_edits: HashMap::new(),
        new_sheets: vec![NewSheet {
            name: "Mismatched Data".into(),
            cells: CellEdits::from([
                ((1, 1), CellValue::Text("Input folder name".into())),
                ((2, 1), CellValue::Text("Acme".into())),
                ((2, 2), CellValue::Number(3.0)),
            ]),
        }],
    };
    modify_workbook(&input, &output, &modifications)?;

    assert!(part_names(&output)?.contains(&"xl/worksheets/sheet2.xml".to_string()));
    assert!(read_part(&output, "xl/workbook.xml")?.contains(r#"name="Mismatched Data""#));
    assert!(read_part(&output, "[Content_Types].xml")?.contains("/xl/worksheets/sheet2.xml"));

    let workbook = read_workbook(&output)?;
    assert_eq!(workbook.sheet_names(), vec!["Acme Corp", "Mismatched Data"]);
    let sheet = workbook.get_sheet("Mismatched Data").unwrap();
    assert_eq!(sheet.value_at(1, 1), &CellValue::Text("Input folder name".into()));
    assert_eq!(sheet.value_at(2, 2), &CellValue::Number(3.0));
    Ok(())
}

#[test]
fn test_new_sheet_with_taken_name_fails() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("Summary.xlsx");
    let output = dir.path().join("Filled.xlsx");
    summary(&input)?;

    let modifications = WorkbookModifications {
        cell_edits: HashMap::new(),
        new_sheets: vec![NewSheet {
            name: "Acme Corp".into(),
            cells: CellEdits::new(),
        }],
    };

    assert!(modify_workbook(&input, &output, &modifications).is_err());
    Ok(())
}

#[test]
fn test_calc_chain_dropped_only_when_cells_change() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let plain = dir.path().join("plain.xlsx");
    let input = dir.path().join("Summary.xlsx");
    summary(&plain)?;
    with_calc_chain(&plain, &input)?;

    let edited = dir.path().join("edited.xlsx");
    modify_workbook(&input, &edited, &edits("Acme Corp", &[((2, 3), CellValue::Number(5.0))]))?;
    assert!(!part_names(&edited)?.contains(&"xl/calcChain.xml".to_string()));
    assert!(!read_part(&edited, "xl/_rels/workbook.xml.rels")?.contains("calcChain"));
    assert!(!read_part(&edited, "[Content_Types].xml")?.contains("calcChain"));

    let untouched = dir.path().join("untouched.xlsx");
    modify_workbook(&input, &untouched, &WorkbookModifications::default())?;
    assert!(part_names(&untouched)?.contains(&"xl/calcChain.xml".to_string()));
    Ok(())
}

#[test]
fn test_save_workbook_in_place() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Summary.xlsx");
    summary(&path)?;

    let mut workbook = read_workbook(&path)?;
    workbook
        .get_sheet_mut("Acme Corp")
        .unwrap()
        .set_value(4, 3, CellValue::Number(7.25));
    save_workbook(&workbook, &path)?;

    let saved = read_workbook(&path)?;
    assert_eq!(saved.get_sheet("Acme Corp").unwrap().value_at(4, 3), &CellValue::Number(7.25));
    assert_eq!(fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}

#[test]
fn test_failed_save_leaves_nothing_behind() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("out/Filled.xlsx");
    let workbook = Workbook {
        path: dir.path().join("missing.xlsx"),
        sheets: Vec::new(),
    };

    assert!(save_workbook(&workbook, &output).is_err());
    assert!(!output.exists());
    // The temporary package is cleaned up
    assert_eq!(fs::read_dir(dir.path().join("out"))?.count(), 0);
    Ok(())
}

#[test]
fn test_failed_save_keeps_previous_output() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let output = dir.path().join("Filled.xlsx");
    summary(&output)?;
    let before = fs::read(&output)?;
    let workbook = Workbook {
        path: dir.path().join("missing.xlsx"),
        sheets: Vec::new(),
    };

    assert!(save_workbook(&workbook, &output).is_err());
    assert_eq!(fs::read(&output)?, before);
    assert_eq!(fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}
