//! Prior-stage record reading
//!
//! A final-stage document starts from what an earlier record already holds.
//! This reads an uploaded workbook back through a template's cell mapping.

use crate::error::SheetError;
use crate::package::parse_cell_formula;
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::Timelike;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use welfill_domain::{CellRef, CellTarget, FieldValues, TemplateDescriptor};

/// Read the values `template`'s mapping points at in the workbook at `path`
///
/// Coordinate targets are read from the template's sheet when the workbook
/// has it, otherwise from the first sheet. Named targets are resolved through
/// the workbook's own defined names; names it lacks are skipped. When a field
/// is mapped to several cells, the first non-empty one wins.
///
/// Works for `.xlsx` and legacy `.xls` workbooks.
pub fn read_prior_record(
    path: &Path,
    template: &TemplateDescriptor,
) -> Result<FieldValues, SheetError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| SheetError::Read(e.to_string()))?;

    let sheet_names = workbook.sheet_names();
    let primary = template
        .sheet_name
        .as_ref()
        .filter(|name| sheet_names.contains(name))
        .or_else(|| sheet_names.first())
        .cloned()
        .ok_or_else(|| SheetError::Format("Workbook has no sheets".to_string()))?;
    let defined_names = workbook.defined_names().to_vec();

    let mut ranges: HashMap<String, Range<Data>> = HashMap::new();
    let mut values = FieldValues::new();

    for (target, field) in template.field_mapping.iter() {
        if values.contains(field) {
            continue;
        }

        let (sheet, cell) = match target {
            CellTarget::Cell(cell) => (primary.clone(), *cell),
            CellTarget::Named(name) => match lookup_name(&defined_names, name) {
                Some(found) => found,
                None => {
                    debug!("Defined name '{}' not in prior workbook", name);
                    continue;
                }
            },
        };

        if !ranges.contains_key(&sheet) {
            if !sheet_names.contains(&sheet) {
                debug!("Sheet '{}' not in prior workbook", sheet);
                continue;
            }
            let range = workbook
                .worksheet_range(&sheet)
                .map_err(|e| SheetError::Read(e.to_string()))?;
            ranges.insert(sheet.clone(), range);
        }

        let text = ranges
            .get(&sheet)
            .and_then(|range| range.get_value((cell.row - 1, cell.col - 1)))
            .and_then(cell_text);
        if let Some(text) = text {
            values.insert(field, text);
        }
    }

    debug!(
        "Read {} value(s) from prior workbook '{}'",
        values.len(),
        path.display()
    );
    Ok(values)
}

fn lookup_name(defined_names: &[(String, String)], name: &str) -> Option<(String, CellRef)> {
    defined_names
        .iter()
        .filter(|(n, _)| n.eq_ignore_ascii_case(name))
        .find_map(|(_, formula)| parse_cell_formula(formula))
}

/// Render a cell as the text a person would read in it
fn cell_text(value: &Data) -> Option<String> {
    match value {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::DateTime(dt) => dt.as_datetime().map(|d| {
            if d.time().num_seconds_from_midnight() == 0 {
                d.format("%Y-%m-%d").to_string()
            } else {
                d.format("%Y-%m-%d %H:%M").to_string()
            }
        }),
        other => Some(other.to_string()),
    }
}
