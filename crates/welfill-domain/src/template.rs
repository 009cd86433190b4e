//! Template descriptors - static configuration for one document type

use crate::cell::CellTarget;
use std::collections::HashSet;
use std::path::PathBuf;

/// Ordered `(cell target, field name)` pairs for one template
///
/// Order is the configuration order, so fills are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(CellTarget, String)>,
}

impl FieldMapping {
    /// Build a mapping, rejecting duplicate cell targets
    ///
    /// # Examples
    ///
    /// ```
    /// use welfill_domain::{CellTarget, FieldMapping};
    ///
    /// let mapping = FieldMapping::new(vec![
    ///     (CellTarget::parse("B2").unwrap(), "氏名".to_string()),
    ///     (CellTarget::parse("$B$2").unwrap(), "作成者".to_string()),
    /// ]);
    /// assert!(mapping.is_err());
    /// ```
    pub fn new(entries: Vec<(CellTarget, String)>) -> Result<Self, String> {
        let mut seen = HashSet::new();
        for (target, _) in &entries {
            if !seen.insert(target.clone()) {
                return Err(format!("Duplicate cell reference: {}", target));
            }
        }
        Ok(Self { entries })
    }

    /// Iterate over `(target, field name)` pairs in configuration order
    pub fn iter(&self) -> impl Iterator<Item = (&CellTarget, &str)> {
        self.entries.iter().map(|(t, f)| (t, f.as_str()))
    }

    /// Distinct field names in first-seen order
    ///
    /// This is the template's field vocabulary as presented to the extractor.
    pub fn field_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .map(|(_, f)| f.as_str())
            .filter(|f| seen.insert(*f))
            .collect()
    }

    /// Whether any cell maps to `field`
    pub fn contains_field(&self, field: &str) -> bool {
        self.entries.iter().any(|(_, f)| f == field)
    }

    /// Number of mapped cells
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping has no cells
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A configured document type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDescriptor {
    /// Registry key (e.g. `monitoring_final`)
    pub id: String,

    /// Human-readable name, used in output filenames
    pub display_name: String,

    /// Resolved path of the template workbook
    pub source_file: PathBuf,

    /// Sheet to write into; `None` means the workbook's first sheet
    pub sheet_name: Option<String>,

    /// Cell → field mapping
    pub field_mapping: FieldMapping,

    /// Template whose mapping reads a prior-stage workbook.
    ///
    /// Set only for final/confirmation variants of a multi-stage record.
    pub prior_stage: Option<String>,

    /// Optional style guidance appended to the extraction prompt
    pub extraction_hint: Option<String>,
}

impl TemplateDescriptor {
    /// Whether this template chains off a previously produced record
    pub fn is_final_stage(&self) -> bool {
        self.prior_stage.is_some()
    }
}
