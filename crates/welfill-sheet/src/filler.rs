//! Template filling
//!
//! Copies a template workbook and writes resolved field values into the
//! mapped cells. Only the affected worksheet parts (and the styles part, when
//! a multi-line value needs a wrapping format) are rewritten; every other
//! package entry is copied raw, so formatting, images and macros survive.

use crate::error::SheetError;
use crate::package::WorkbookIndex;
use crate::sheet_xml::rewrite_sheet;
use crate::styles::WrapStyles;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use welfill_domain::{CellRef, CellTarget, FieldMapping, OutputArtifact, ResolvedFieldMapping};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Writes filled copies of templates into an output directory
#[derive(Debug, Clone)]
pub struct TemplateFiller {
    output_dir: PathBuf,
}

impl TemplateFiller {
    /// Create a filler writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Directory outputs are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Fill `template_path` and write it as `output_name`
    ///
    /// Coordinate targets go to the sheet named by the mapping's
    /// `_sheet_name` (the first sheet when absent or unknown); named targets
    /// go wherever the defined name points. Fields without a value leave
    /// their cell untouched. Values containing a line break are shown
    /// wrapped. The output appears atomically: it is written to a temporary
    /// sibling and renamed into place.
    pub fn fill(
        &self,
        template_path: &Path,
        resolved: &ResolvedFieldMapping,
        mapping: &FieldMapping,
        output_name: &str,
    ) -> Result<OutputArtifact, SheetError> {
        let file = File::open(template_path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        let index = WorkbookIndex::read(&mut archive)?;

        let writes = plan_writes(&index, resolved, mapping)?;
        let cell_count: usize = writes.values().map(BTreeMap::len).sum();
        debug!(
            "Writing {} cell(s) across {} sheet(s) of '{}'",
            cell_count,
            writes.len(),
            template_path.display()
        );

        let mut styles = match index.styles_part() {
            Some(part) => WrapStyles::load(&mut archive, part)?,
            None => None,
        };
        let mut rewritten: HashMap<String, Vec<u8>> = HashMap::new();
        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)?.name().to_string();
            if let Some(cells) = writes.get(&name) {
                let mut xml = Vec::new();
                archive.by_index(i)?.read_to_end(&mut xml)?;
                let sheet = rewrite_sheet(&xml, cells, styles.as_mut())?;
                rewritten.insert(name, sheet);
            }
        }
        if let Some(styles) = styles.filter(WrapStyles::is_modified) {
            debug!("Added wrapping cell formats to '{}'", styles.part());
            rewritten.insert(styles.part().to_string(), styles.render()?);
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".welfill-")
            .suffix(".partial")
            .tempfile_in(&self.output_dir)?;
        let mut writer = ZipWriter::new(staging);

        for i in 0..archive.len() {
            let name = archive.by_index_raw(i)?.name().to_string();
            match rewritten.remove(&name) {
                Some(content) => {
                    let options = SimpleFileOptions::default()
                        .compression_method(CompressionMethod::Deflated);
                    writer.start_file(name, options)?;
                    writer.write_all(&content)?;
                }
                None => {
                    writer.raw_copy_file(archive.by_index_raw(i)?)?;
                }
            }
        }

        let staging = writer.finish()?;
        let file_path = self.output_dir.join(output_name);
        staging
            .persist(&file_path)
            .map_err(|e| SheetError::Io(e.error))?;

        info!("Wrote {} ({} cell(s))", file_path.display(), cell_count);

        Ok(OutputArtifact {
            file_path,
            logical_name: output_name.to_string(),
        })
    }
}

/// Group the values to write by worksheet part
fn plan_writes(
    index: &WorkbookIndex,
    resolved: &ResolvedFieldMapping,
    mapping: &FieldMapping,
) -> Result<HashMap<String, BTreeMap<CellRef, String>>, SheetError> {
    let first = index
        .sheets()
        .first()
        .ok_or_else(|| SheetError::Format("Workbook has no sheets".to_string()))?;
    let target_sheet = match resolved.sheet_name() {
        Some(name) => index.sheet(name).unwrap_or_else(|| {
            warn!(
                "Sheet '{}' not found, writing to first sheet '{}'",
                name, first.name
            );
            first
        }),
        None => first,
    };

    let mut writes: HashMap<String, BTreeMap<CellRef, String>> = HashMap::new();
    for (target, field) in mapping.iter() {
        let Some(value) = resolved.get(field) else {
            continue;
        };

        let (part, cell) = match target {
            CellTarget::Cell(cell) => (target_sheet.part.clone(), *cell),
            CellTarget::Named(name) => {
                let (sheet, cell) = index
                    .resolve_defined_name(name)
                    .ok_or_else(|| SheetError::DefinedNameNotFound(name.clone()))?;
                let part = index
                    .sheet(sheet)
                    .map(|s| s.part.clone())
                    .ok_or_else(|| SheetError::SheetNotFound(sheet.to_string()))?;
                (part, cell)
            }
        };

        writes
            .entry(part)
            .or_default()
            .insert(cell, value.to_string());
    }

    Ok(writes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{write_workbook, FixtureSheet};
    use crate::prior::read_prior_record;
    use calamine::{open_workbook_auto, Data, Reader};
    use tempfile::TempDir;
    use welfill_domain::{FieldValues, TemplateDescriptor};

    fn mapping(entries: &[(&str, &str)]) -> FieldMapping {
        FieldMapping::new(
            entries
                .iter()
                .map(|(t, f)| (CellTarget::parse(t).unwrap(), f.to_string()))
                .collect(),
        )
        .unwrap()
    }

    fn resolved(pairs: &[(&str, &str)], sheet: Option<&str>) -> ResolvedFieldMapping {
        let values: FieldValues = pairs.iter().copied().collect();
        ResolvedFieldMapping::new(values, sheet)
    }

    fn template_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("template.xlsx");
        write_workbook(
            &path,
            &[
                FixtureSheet::new("表紙", &[("A1", "cover")]),
                FixtureSheet::new(
                    "記録",
                    &[("A1", "氏名"), ("B1", ""), ("A2", "作成者"), ("B2", "")],
                ),
            ],
            &[("StaffCell", "'記録'!$B$2"), ("CoverNote", "表紙!$C$5")],
        )
        .unwrap();
        path
    }

    fn cell(path: &Path, sheet: &str, row: u32, col: u32) -> Option<String> {
        let mut workbook = open_workbook_auto(path).unwrap();
        let range = workbook.worksheet_range(sheet).unwrap();
        match range.get_value((row, col)) {
            Some(Data::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn sheet_xml(path: &Path, part: &str) -> String {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut xml = String::new();
        archive
            .by_name(part)
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    #[test]
    fn test_fill_writes_mapped_cells() {
        let dir = TempDir::new().unwrap();
        let template = template_file(&dir);
        let filler = TemplateFiller::new(dir.path().join("out"));

        let artifact = filler
            .fill(
                &template,
                &resolved(&[("氏名", "山田 太郎"), ("作成者", "佐藤")], Some("記録")),
                &mapping(&[("B1", "氏名"), ("StaffCell", "作成者"), ("CoverNote", "備考")]),
                "result.xlsx",
            )
            .unwrap();

        assert_eq!(artifact.logical_name, "result.xlsx");
        assert!(artifact.file_path.ends_with("out/result.xlsx"));
        assert_eq!(cell(&artifact.file_path, "記録", 0, 1).as_deref(), Some("山田 太郎"));
        assert_eq!(cell(&artifact.file_path, "記録", 1, 1).as_deref(), Some("佐藤"));
        // Unmapped content survives
        assert_eq!(cell(&artifact.file_path, "記録", 0, 0).as_deref(), Some("氏名"));
        assert_eq!(cell(&artifact.file_path, "表紙", 0, 0).as_deref(), Some("cover"));
        // Field without a value leaves the cover sheet untouched
        assert_eq!(cell(&artifact.file_path, "表紙", 4, 2), None);

        // Template is not modified
        assert_eq!(cell(&template, "記録", 0, 1), None);
    }

    #[test]
    fn test_fill_keeps_style_and_other_parts() {
        let dir = TempDir::new().unwrap();
        let template = template_file(&dir);
        let filler = TemplateFiller::new(dir.path());

        let artifact = filler
            .fill(
                &template,
                &resolved(&[("氏名", "山田")], Some("記録")),
                &mapping(&[("B1", "氏名")]),
                "styled.xlsx",
            )
            .unwrap();

        let xml = sheet_xml(&artifact.file_path, "xl/worksheets/sheet2.xml");
        assert!(xml.contains(r#"<c r="B1" s="1" t="inlineStr">"#));
        assert!(xml.contains(r#"<mergeCell ref="H1:I1"/>"#));
        assert_eq!(
            sheet_xml(&artifact.file_path, "xl/styles.xml"),
            sheet_xml(&template, "xl/styles.xml")
        );
        assert_eq!(
            sheet_xml(&artifact.file_path, "xl/worksheets/sheet1.xml"),
            sheet_xml(&template, "xl/worksheets/sheet1.xml")
        );
    }

    #[test]
    fn test_multi_line_value_wraps() {
        let dir = TempDir::new().unwrap();
        let template = template_file(&dir);
        let filler = TemplateFiller::new(dir.path());
        let values = resolved(&[("会議出席者", "a\nb"), ("氏名", "山田")], Some("記録"));
        let cells = mapping(&[("D9", "会議出席者"), ("B1", "氏名")]);

        let artifact = filler.fill(&template, &values, &cells, "wrapped.xlsx").unwrap();

        let sheet = sheet_xml(&artifact.file_path, "xl/worksheets/sheet2.xml");
        assert!(sheet.contains(r#"<c r="D9" s="2" t="inlineStr">"#));
        assert!(sheet.contains("a\nb</t>"));
        assert!(sheet.contains(r#"<c r="B1" s="1" t="inlineStr">"#));

        let styles = sheet_xml(&artifact.file_path, "xl/styles.xml");
        assert!(styles.contains(r#"<cellXfs count="3">"#));
        assert!(styles.contains(
            r#"<cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#
        ));
        assert!(styles.contains(
            r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyAlignment="1"><alignment wrapText="1"/></xf></cellXfs>"#
        ));
        assert_eq!(cell(&artifact.file_path, "記録", 8, 3).as_deref(), Some("a\nb"));

        // A second fill reuses the wrapping format instead of adding another
        let again = filler
            .fill(&artifact.file_path, &values, &cells, "wrapped_again.xlsx")
            .unwrap();
        assert!(sheet_xml(&again.file_path, "xl/styles.xml").contains(r#"<cellXfs count="3">"#));
    }

    #[test]
    fn test_fill_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let template = template_file(&dir);
        let filler = TemplateFiller::new(dir.path());
        let values = resolved(&[("氏名", "山田"), ("作成者", "佐藤")], Some("記録"));
        let cells = mapping(&[("B1", "氏名"), ("B2", "作成者"), ("D9", "作成者")]);

        let once = filler.fill(&template, &values, &cells, "once.xlsx").unwrap();
        let twice = filler
            .fill(&once.file_path, &values, &cells, "twice.xlsx")
            .unwrap();

        assert_eq!(
            sheet_xml(&once.file_path, "xl/worksheets/sheet2.xml"),
            sheet_xml(&twice.file_path, "xl/worksheets/sheet2.xml")
        );
        assert_eq!(cell(&twice.file_path, "記録", 8, 3).as_deref(), Some("佐藤"));
    }

    #[test]
    fn test_unknown_sheet_falls_back_to_first() {
        let dir = TempDir::new().unwrap();
        let template = template_file(&dir);
        let filler = TemplateFiller::new(dir.path());

        let artifact = filler
            .fill(
                &template,
                &resolved(&[("氏名", "山田")], Some("存在しない")),
                &mapping(&[("B3", "氏名")]),
                "fallback.xlsx",
            )
            .unwrap();

        assert_eq!(cell(&artifact.file_path, "表紙", 2, 1).as_deref(), Some("山田"));
    }

    #[test]
    fn test_unresolvable_name_fails() {
        let dir = TempDir::new().unwrap();
        let template = template_file(&dir);
        let filler = TemplateFiller::new(dir.path());

        let result = filler.fill(
            &template,
            &resolved(&[("氏名", "山田")], None),
            &mapping(&[("NoSuchName", "氏名")]),
            "broken.xlsx",
        );
        assert!(matches!(result, Err(SheetError::DefinedNameNotFound(_))));
        assert!(!dir.path().join("broken.xlsx").exists());
    }

    #[test]
    fn test_missing_template_fails() {
        let dir = TempDir::new().unwrap();
        let filler = TemplateFiller::new(dir.path());
        let result = filler.fill(
            &dir.path().join("missing.xlsx"),
            &resolved(&[], None),
            &mapping(&[]),
            "x.xlsx",
        );
        assert!(matches!(result, Err(SheetError::Io(_))));
    }

    #[test]
    fn test_filled_output_reads_back_as_prior_record() {
        let dir = TempDir::new().unwrap();
        let template = template_file(&dir);
        let filler = TemplateFiller::new(dir.path());
        let cells = mapping(&[("B1", "氏名"), ("StaffCell", "作成者")]);

        let artifact = filler
            .fill(
                &template,
                &resolved(&[("氏名", "山田 花子"), ("作成者", "佐藤")], Some("記録")),
                &cells,
                "interim.xlsx",
            )
            .unwrap();

        let descriptor = TemplateDescriptor {
            id: "interim".to_string(),
            display_name: "中間".to_string(),
            source_file: template.clone(),
            sheet_name: Some("記録".to_string()),
            field_mapping: cells,
            prior_stage: None,
            extraction_hint: None,
        };
        let prior = read_prior_record(&artifact.file_path, &descriptor).unwrap();
        assert_eq!(prior.get("氏名"), Some("山田 花子"));
        assert_eq!(prior.get("作成者"), Some("佐藤"));
    }
}
