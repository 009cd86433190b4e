//! OOXML package index
//!
//! Reads just enough of a workbook package to locate things: the ordered
//! sheet list with each sheet's XML part, and the workbook's defined names.

use crate::error::SheetError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use welfill_domain::CellRef;
use zip::ZipArchive;

const PACKAGE_RELS: &str = "_rels/.rels";
const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// One worksheet entry from `workbook.xml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    /// Sheet tab name
    pub name: String,
    /// Zip entry name of the sheet XML, e.g. `xl/worksheets/sheet1.xml`
    pub part: String,
}

/// A workbook-level defined name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    /// Name as written in the workbook
    pub name: String,
    /// Formula text, e.g. `'利用者情報'!$B$3`
    pub formula: String,
    /// Set when the name is scoped to a single sheet
    pub local_sheet: Option<usize>,
}

/// Sheets and defined names of one workbook
#[derive(Debug, Clone, Default)]
pub struct WorkbookIndex {
    sheets: Vec<SheetEntry>,
    defined_names: Vec<DefinedName>,
    styles: Option<String>,
}

impl WorkbookIndex {
    /// Index the workbook at `path`
    pub fn open(path: &Path) -> Result<Self, SheetError> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        Self::read(&mut archive)
    }

    /// Index an already opened package
    pub fn read<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Self, SheetError> {
        let workbook_part = match read_entry(archive, PACKAGE_RELS)? {
            Some(rels) => parse_relationships(&rels)?
                .into_iter()
                .find(|rel| rel.kind.ends_with("/officeDocument"))
                .map(|rel| resolve_target("", &rel.target))
                .unwrap_or_else(|| DEFAULT_WORKBOOK_PART.to_string()),
            None => DEFAULT_WORKBOOK_PART.to_string(),
        };

        let workbook_xml = read_entry(archive, &workbook_part)?.ok_or_else(|| {
            SheetError::Format(format!("Missing workbook part '{}'", workbook_part))
        })?;
        let (raw_sheets, defined_names) = parse_workbook(&workbook_xml)?;

        let (base_dir, file_name) = match workbook_part.rsplit_once('/') {
            Some((dir, file)) => (dir.to_string(), file),
            None => (String::new(), workbook_part.as_str()),
        };
        let rels_part = if base_dir.is_empty() {
            format!("_rels/{}.rels", file_name)
        } else {
            format!("{}/_rels/{}.rels", base_dir, file_name)
        };
        let rels_xml = read_entry(archive, &rels_part)?.ok_or_else(|| {
            SheetError::Format(format!("Missing workbook relationships '{}'", rels_part))
        })?;
        let rels = parse_relationships(&rels_xml)?;
        let styles = rels
            .iter()
            .find(|rel| rel.kind.ends_with("/styles"))
            .map(|rel| resolve_target(&base_dir, &rel.target));
        let targets: HashMap<String, String> = rels
            .into_iter()
            .map(|rel| (rel.id, rel.target))
            .collect();

        let mut sheets = Vec::with_capacity(raw_sheets.len());
        for (name, rel_id) in raw_sheets {
            let target = targets.get(&rel_id).ok_or_else(|| {
                SheetError::Format(format!("Sheet '{}' has no relationship '{}'", name, rel_id))
            })?;
            sheets.push(SheetEntry {
                name,
                part: resolve_target(&base_dir, target),
            });
        }

        Ok(Self {
            sheets,
            defined_names,
            styles,
        })
    }

    /// Sheets in tab order
    pub fn sheets(&self) -> &[SheetEntry] {
        &self.sheets
    }

    /// Sheet tab names in order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Look up a sheet by tab name
    pub fn sheet(&self, name: &str) -> Option<&SheetEntry> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Zip entry name of the styles part, when the workbook has one
    pub fn styles_part(&self) -> Option<&str> {
        self.styles.as_deref()
    }

    /// All defined names
    pub fn defined_names(&self) -> &[DefinedName] {
        &self.defined_names
    }

    /// Resolve a defined name to the sheet and top-left cell it refers to
    ///
    /// Workbook-scoped names win over sheet-scoped ones. Returns `None` for
    /// unknown names and for names that do not point at a cell on a sheet
    /// (constants, formulas, `#REF!`).
    pub fn resolve_defined_name(&self, name: &str) -> Option<(&str, CellRef)> {
        let mut candidates: Vec<&DefinedName> = self
            .defined_names
            .iter()
            .filter(|d| d.name.eq_ignore_ascii_case(name))
            .collect();
        candidates.sort_by_key(|d| d.local_sheet.is_some());

        candidates.into_iter().find_map(|d| {
            let (sheet, cell) = parse_cell_formula(&d.formula)?;
            let entry = self.sheets.iter().find(|s| s.name == sheet)?;
            Some((entry.name.as_str(), cell))
        })
    }
}

/// Split a defined-name formula like `'My Sheet'!$B$2:$C$3` into sheet name
/// and the range's top-left cell
pub(crate) fn parse_cell_formula(formula: &str) -> Option<(String, CellRef)> {
    let formula = formula.trim().trim_start_matches('=');
    let (sheet, range) = formula.rsplit_once('!')?;
    let sheet = match sheet.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => sheet.to_string(),
    };
    let first = range.split(':').next()?;
    let cell = CellRef::parse(first).ok()?;
    Some((sheet, cell))
}

pub(crate) fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, SheetError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Some(content))
}

/// Resolve a relationship target against the directory of its source part
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

struct Relationship {
    id: String,
    kind: String,
    target: String,
}

fn parse_relationships(xml: &str) -> Result<Vec<Relationship>, SheetError> {
    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = attribute(&e, b"Id")?;
                let kind = attribute(&e, b"Type")?;
                let target = attribute(&e, b"Target")?;
                if let (Some(id), Some(target)) = (id, target) {
                    rels.push(Relationship {
                        id,
                        kind: kind.unwrap_or_default(),
                        target,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rels)
}

type RawSheets = Vec<(String, String)>;

fn parse_workbook(xml: &str) -> Result<(RawSheets, Vec<DefinedName>), SheetError> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    let mut defined_names = Vec::new();
    let mut open_name: Option<(String, Option<usize>)> = None;
    let mut formula = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name")?;
                let rel_id = relationship_id(&e)?;
                if let (Some(name), Some(rel_id)) = (name, rel_id) {
                    sheets.push((name, rel_id));
                }
            }
            Event::Start(e) if e.local_name().as_ref() == b"definedName" => {
                let local_sheet = attribute(&e, b"localSheetId")?.and_then(|v| v.parse().ok());
                if let Some(name) = attribute(&e, b"name")? {
                    open_name = Some((name, local_sheet));
                    formula.clear();
                }
            }
            Event::Text(t) if open_name.is_some() => {
                formula.push_str(&t.unescape()?);
            }
            Event::End(e) if e.local_name().as_ref() == b"definedName" => {
                if let Some((name, local_sheet)) = open_name.take() {
                    defined_names.push(DefinedName {
                        name,
                        formula: formula.trim().to_string(),
                        local_sheet,
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((sheets, defined_names))
}

/// Unprefixed attribute value
fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, SheetError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| SheetError::Xml(e.to_string()))?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// The `r:id` attribute, whatever prefix the relationships namespace uses
fn relationship_id(element: &BytesStart<'_>) -> Result<Option<String>, SheetError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| SheetError::Xml(e.to_string()))?;
        if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}
