#![allow(dead_code)]

use abi_admissions_pipeline::extract::{Extraction, Extractor, TITLE_ROWS};
use abi_admissions_pipeline::table::Grid;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::CompressionMethod;

pub fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

/// One year-block as it appears on a regional sheet: group row with the
/// merged `Rate` cell, metric row, then category rows
pub fn year_block(year: &str, data: &[&[&str]]) -> Grid {
    let mut rows = vec![
        row(&[year, "", "", "", "Rate", "", ""]),
        row(&["Category", "Female", "Male", "Total", "Female", "Male", "Total"]),
    ];
    rows.extend(data.iter().map(|r| row(r)));
    rows
}

/// Title rows followed by the blocks, separated by blank rows
pub fn regional_sheet(blocks: Vec<Grid>) -> Grid {
    let mut sheet = vec![row(&["Admissions to hospital for acquired brain injury"])];
    sheet.resize(TITLE_ROWS, Vec::new());
    for (i, block) in blocks.into_iter().enumerate() {
        if i > 0 {
            sheet.push(row(&["", "", ""]));
        }
        sheet.extend(block);
    }
    sheet
}

/// Write a region's year-files under `processed_root` from an in-memory sheet
pub fn seed_region(processed_root: &Path, region: &str, sheet: &[Vec<String>]) -> Extraction {
    Extractor::new(processed_root)
        .extract_grid(region, sheet)
        .expect("Failed to extract test sheet")
}

const SPREADSHEET_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const RELATIONSHIP_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const PACKAGE_RELATIONSHIP_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Write a minimal xlsx workbook with the given (name, rows) sheets in order.
///
/// Cells that parse as numbers are stored as numbers, everything else as
/// inline strings. Empty cells and empty rows are left out of the sheet XML,
/// so a sheet whose first rows are blank reaches calamine as a trimmed range.
pub fn write_workbook(path: &Path, sheets: &[(&str, &Grid)]) {
    let mut buf = Vec::new();
    let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
    let options: FileOptions<'_, ()> = FileOptions::default().compression_method(CompressionMethod::Stored);

    let mut overrides = String::new();
    let mut sheet_entries = String::new();
    let mut sheet_rels = String::new();
    for (i, (name, _)) in sheets.iter().enumerate() {
        let n = i + 1;
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        sheet_entries.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            xml_escape(name)
        ));
        sheet_rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="{RELATIONSHIP_NS}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }

    let parts = [
        (
            "[Content_Types].xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
            ),
        ),
        (
            "_rels/.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PACKAGE_RELATIONSHIP_NS}"><Relationship Id="rId1" Type="{RELATIONSHIP_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
            ),
        ),
        (
            "xl/workbook.xml".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{SPREADSHEET_NS}" xmlns:r="{RELATIONSHIP_NS}"><sheets>{sheet_entries}</sheets></workbook>"#
            ),
        ),
        (
            "xl/_rels/workbook.xml.rels".to_string(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PACKAGE_RELATIONSHIP_NS}">{sheet_rels}</Relationships>"#
            ),
        ),
    ];
    for (name, xml) in parts {
        zip.start_file(name, options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
    }
    for (i, (_, rows)) in sheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", i + 1), options)
            .unwrap();
        zip.write_all(sheet_xml(rows).as_bytes()).unwrap();
    }
    zip.finish().unwrap();

    fs::write(path, buf).unwrap();
}

fn sheet_xml(rows: &Grid) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{SPREADSHEET_NS}"><sheetData>"#
    );
    for (r, cells) in rows.iter().enumerate() {
        let cells: Vec<String> = cells
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(c, value)| {
                let reference = format!("{}{}", column_letters(c), r + 1);
                if value.trim().parse::<f64>().is_ok() {
                    format!(r#"<c r="{reference}"><v>{}</v></c>"#, value.trim())
                } else {
                    format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        xml_escape(value)
                    )
                }
            })
            .collect();
        if !cells.is_empty() {
            xml.push_str(&format!(r#"<row r="{}">{}</row>"#, r + 1, cells.concat()));
        }
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

/// Zero-based column index to spreadsheet letters: 0 -> A, 27 -> AB
fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A valid two-sheet regional workbook: a contents sheet, then the table
pub fn write_regional_workbook(path: &Path, sheet: &Grid) {
    let contents = vec![row(&["Contents"]), row(&["Table 1", "Admissions by region"])];
    write_workbook(path, &[("Contents", &contents), ("Table 1", sheet)]);
}
