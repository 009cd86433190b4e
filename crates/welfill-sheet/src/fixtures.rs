//! Minimal workbook builder for tests
//!
//! Produces small but valid `.xlsx` packages: one part per sheet, inline
//! string cells with style index 1, and optional workbook defined names.

use quick_xml::escape::escape;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// One sheet of a fixture workbook
#[derive(Debug, Clone, Default)]
pub struct FixtureSheet {
    /// Tab name
    pub name: String,
    /// `(A1 reference, text)` pairs; an empty text writes a styled blank cell
    pub cells: Vec<(String, String)>,
}

impl FixtureSheet {
    /// Sheet with the given cells
    pub fn new(name: &str, cells: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            cells: cells
                .iter()
                .map(|(r, v)| (r.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// Write a workbook with `sheets` and `(name, formula)` defined names to `path`
pub fn write_workbook(
    path: &Path,
    sheets: &[FixtureSheet],
    defined_names: &[(&str, &str)],
) -> io::Result<()> {
    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default();

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );
    for i in 1..=sheets.len() {
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i
        ));
    }
    content_types.push_str("</Types>");
    put(&mut zip, "[Content_Types].xml", &content_types, options)?;

    put(
        &mut zip,
        "_rels/.rels",
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
        options,
    )?;

    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut workbook_rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(sheet.name.as_str()),
            n,
            n
        ));
        workbook_rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            n, n
        ));
    }
    workbook.push_str("</sheets>");
    if !defined_names.is_empty() {
        workbook.push_str("<definedNames>");
        for (name, formula) in defined_names {
            workbook.push_str(&format!(
                r#"<definedName name="{}">{}</definedName>"#,
                escape(*name),
                escape(*formula)
            ));
        }
        workbook.push_str("</definedNames>");
    }
    workbook.push_str("</workbook>");
    workbook_rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
        sheets.len() + 1
    ));
    put(&mut zip, "xl/workbook.xml", &workbook, options)?;
    put(&mut zip, "xl/_rels/workbook.xml.rels", &workbook_rels, options)?;
    put(&mut zip, "xl/styles.xml", STYLES, options)?;

    for (i, sheet) in sheets.iter().enumerate() {
        put(
            &mut zip,
            &format!("xl/worksheets/sheet{}.xml", i + 1),
            &sheet_xml(sheet),
            options,
        )?;
    }

    zip.finish()?;
    Ok(())
}

fn put(
    zip: &mut ZipWriter<File>,
    name: &str,
    content: &str,
    options: SimpleFileOptions,
) -> io::Result<()> {
    zip.start_file(name, options)?;
    zip.write_all(content.as_bytes())
}

fn sheet_xml(sheet: &FixtureSheet) -> String {
    let mut rows: std::collections::BTreeMap<u32, Vec<(u32, &str, &str)>> = Default::default();
    for (reference, value) in &sheet.cells {
        if let Ok(cell) = welfill_domain::CellRef::parse(reference) {
            rows.entry(cell.row)
                .or_default()
                .push((cell.col, reference.as_str(), value.as_str()));
        }
    }

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row, mut cells) in rows {
        cells.sort_by_key(|(col, _, _)| *col);
        xml.push_str(&format!(r#"<row r="{}">"#, row));
        for (_, reference, value) in cells {
            if value.is_empty() {
                xml.push_str(&format!(r#"<c r="{}" s="1"/>"#, reference));
            } else {
                xml.push_str(&format!(
                    r#"<c r="{}" s="1" t="inlineStr"><is><t>{}</t></is></c>"#,
                    reference,
                    escape(value)
                ));
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str(r#"</sheetData><mergeCells count="1"><mergeCell ref="H1:I1"/></mergeCells></worksheet>"#);
    xml
}

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment wrapText="1" vertical="top"/></xf></cellXfs></styleSheet>"#;
