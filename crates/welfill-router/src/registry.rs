//! Template registry
//!
//! Loaded once at startup from the template configuration (JSON) and shared
//! read-only afterwards. Each entry is checked against its workbook so that a
//! bad configuration fails at boot rather than on the first request.
//!
//! ```json
//! {
//!   "monitoring_final": {
//!     "filename": "template/monitoring_final.xlsx",
//!     "name": "モニタリング(最終)",
//!     "sheet_name": "記録",
//!     "mapping": { "B3": "氏名", "B5": "支援内容" },
//!     "prior_stage": "monitoring_interim"
//!   }
//! }
//! ```

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use welfill_domain::{CellTarget, FieldMapping, TemplateDescriptor};
use welfill_sheet::WorkbookIndex;

/// Registry error
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Failed to read the configuration file
    #[error("Failed to read template config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid JSON of the expected shape
    #[error("Failed to parse template config: {0}")]
    Json(#[from] serde_json::Error),

    /// An entry failed validation
    #[error("Invalid template '{0}': {1}")]
    Invalid(String, String),

    /// Template id not configured
    #[error("Invalid template ID: {0}")]
    UnknownTemplate(String),
}

/// JSON object read in document order, rejecting repeated keys
struct OrderedMap<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut seen = HashSet::new();
                let mut entries = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if !seen.insert(key.clone()) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate key '{}'",
                            key
                        )));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}

/// One entry of the template configuration
#[derive(Deserialize)]
struct TemplateEntry {
    filename: String,
    name: String,
    #[serde(default)]
    sheet_name: Option<String>,
    mapping: OrderedMap<String>,
    #[serde(default)]
    prior_stage: Option<String>,
    #[serde(default)]
    extraction_hint: Option<String>,
}

/// Immutable id → template lookup
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, TemplateDescriptor>,
}

impl TemplateRegistry {
    /// Load and validate the configuration at `config_path`
    ///
    /// Relative template filenames resolve against the parent of
    /// `template_dir`; when nothing exists there, `template_dir/<basename>`
    /// is tried.
    pub fn load(config_path: &Path, template_dir: &Path) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(config_path)?;
        let registry = Self::from_json(&contents, template_dir)?;
        info!(
            "Loaded {} template(s) from {}",
            registry.len(),
            config_path.display()
        );
        Ok(registry)
    }

    /// Parse and validate configuration text
    pub fn from_json(contents: &str, template_dir: &Path) -> Result<Self, RegistryError> {
        let entries: OrderedMap<TemplateEntry> = serde_json::from_str(contents)?;

        let mut templates = BTreeMap::new();
        for (id, entry) in entries.0 {
            let descriptor = build_descriptor(&id, entry, template_dir)?;
            templates.insert(id, descriptor);
        }

        let registry = Self { templates };
        registry.check_prior_stages()?;
        Ok(registry)
    }

    /// Build a registry from descriptors without touching the filesystem
    pub fn from_descriptors(descriptors: Vec<TemplateDescriptor>) -> Self {
        Self {
            templates: descriptors
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
        }
    }

    /// Look up a template by id
    pub fn lookup(&self, id: &str) -> Result<&TemplateDescriptor, RegistryError> {
        self.templates
            .get(id)
            .ok_or_else(|| RegistryError::UnknownTemplate(id.to_string()))
    }

    /// Template whose mapping reads `template`'s prior-stage workbook
    pub fn prior_template_of(&self, template: &TemplateDescriptor) -> Option<&TemplateDescriptor> {
        template
            .prior_stage
            .as_deref()
            .and_then(|id| self.templates.get(id))
    }

    /// All templates, ordered by id
    pub fn list(&self) -> impl Iterator<Item = &TemplateDescriptor> {
        self.templates.values()
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates are configured
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    fn check_prior_stages(&self) -> Result<(), RegistryError> {
        for template in self.templates.values() {
            if let Some(prior) = &template.prior_stage {
                if prior == &template.id || !self.templates.contains_key(prior) {
                    return Err(RegistryError::Invalid(
                        template.id.clone(),
                        format!("prior_stage '{}' is not another configured template", prior),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn build_descriptor(
    id: &str,
    entry: TemplateEntry,
    template_dir: &Path,
) -> Result<TemplateDescriptor, RegistryError> {
    let invalid = |msg: String| RegistryError::Invalid(id.to_string(), msg);

    if entry.name.trim().is_empty() {
        return Err(invalid("name must not be empty".to_string()));
    }
    if entry.name.contains(['/', '\\']) {
        return Err(invalid(format!(
            "name '{}' contains a path separator",
            entry.name
        )));
    }
    // Output names containing ".." are refused by the download route
    if entry.name.contains("..") {
        return Err(invalid(format!("name '{}' contains '..'", entry.name)));
    }

    let mut cells = Vec::with_capacity(entry.mapping.0.len());
    for (reference, field) in entry.mapping.0 {
        let target = CellTarget::parse(&reference)
            .map_err(|e| invalid(format!("mapping key '{}': {}", reference, e)))?;
        cells.push((target, field));
    }
    let field_mapping = FieldMapping::new(cells).map_err(invalid)?;

    let source_file = resolve_template_path(&entry.filename, template_dir)
        .ok_or_else(|| invalid(format!("template file '{}' not found", entry.filename)))?;

    let index = WorkbookIndex::open(&source_file)
        .map_err(|e| invalid(format!("{}: {}", source_file.display(), e)))?;

    if let Some(sheet) = &entry.sheet_name {
        if index.sheet(sheet).is_none() {
            return Err(invalid(format!(
                "sheet '{}' not in {} (has: {})",
                sheet,
                source_file.display(),
                index.sheet_names().join(", ")
            )));
        }
    }

    for (target, _) in field_mapping.iter() {
        if let CellTarget::Named(name) = target {
            if index.resolve_defined_name(name).is_none() {
                return Err(invalid(format!(
                    "defined name '{}' does not resolve to a cell in {}",
                    name,
                    source_file.display()
                )));
            }
        }
    }

    debug!(
        "Template '{}' → {} ({} field(s))",
        id,
        source_file.display(),
        field_mapping.len()
    );

    Ok(TemplateDescriptor {
        id: id.to_string(),
        display_name: entry.name,
        source_file,
        sheet_name: entry.sheet_name,
        field_mapping,
        prior_stage: entry.prior_stage,
        extraction_hint: entry.extraction_hint,
    })
}

/// Locate a configured template file
fn resolve_template_path(filename: &str, template_dir: &Path) -> Option<PathBuf> {
    let given = Path::new(filename);
    let primary = if given.is_absolute() {
        given.to_path_buf()
    } else {
        template_dir
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(given)
    };
    if primary.is_file() {
        return Some(primary);
    }

    let fallback = template_dir.join(given.file_name()?);
    fallback.is_file().then_some(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use welfill_sheet::fixtures::{write_workbook, FixtureSheet};

    fn template_dir() -> TempDir {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("template");
        std::fs::create_dir(&dir).unwrap();
        write_workbook(
            &dir.join("assessment.xlsx"),
            &[FixtureSheet::new("Sheet1", &[("A1", "氏名")])],
            &[("利用者欄", "Sheet1!$B$2")],
        )
        .unwrap();
        root
    }

    fn load(root: &TempDir, json: &str) -> Result<TemplateRegistry, RegistryError> {
        TemplateRegistry::from_json(json, &root.path().join("template"))
    }

    #[test]
    fn test_load_preserves_mapping_order() {
        let root = template_dir();
        let registry = load(
            &root,
            r#"{
                "assessment": {
                    "filename": "template/assessment.xlsx",
                    "name": "アセスメント",
                    "sheet_name": "Sheet1",
                    "mapping": {"C3": "支援内容", "A1": "氏名", "利用者欄": "利用者様"}
                }
            }"#,
        )
        .unwrap();

        let template = registry.lookup("assessment").unwrap();
        assert_eq!(template.display_name, "アセスメント");
        assert_eq!(
            template.field_mapping.field_names(),
            vec!["支援内容", "氏名", "利用者様"]
        );
        assert!(template.source_file.ends_with("template/assessment.xlsx"));
    }

    #[test]
    fn test_basename_fallback() {
        let root = template_dir();
        let registry = load(
            &root,
            r#"{"a": {"filename": "/old/location/assessment.xlsx", "name": "A", "mapping": {}}}"#,
        )
        .unwrap();
        assert_eq!(
            registry.lookup("a").unwrap().source_file,
            root.path().join("template").join("assessment.xlsx")
        );
    }

    #[test]
    fn test_unknown_template() {
        let registry = TemplateRegistry::default();
        assert!(matches!(
            registry.lookup("missing"),
            Err(RegistryError::UnknownTemplate(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_rejects_missing_file() {
        let root = template_dir();
        let result = load(
            &root,
            r#"{"a": {"filename": "template/nope.xlsx", "name": "A", "mapping": {}}}"#,
        );
        assert!(matches!(result, Err(RegistryError::Invalid(id, _)) if id == "a"));
    }

    #[test]
    fn test_rejects_unknown_sheet() {
        let root = template_dir();
        let result = load(
            &root,
            r#"{"a": {"filename": "template/assessment.xlsx", "name": "A", "sheet_name": "記録", "mapping": {}}}"#,
        );
        assert!(matches!(result, Err(RegistryError::Invalid(_, msg)) if msg.contains("記録")));
    }

    #[test]
    fn test_rejects_unresolvable_defined_name() {
        let root = template_dir();
        let result = load(
            &root,
            r#"{"a": {"filename": "template/assessment.xlsx", "name": "A", "mapping": {"担当者欄": "作成者"}}}"#,
        );
        assert!(matches!(result, Err(RegistryError::Invalid(_, msg)) if msg.contains("担当者欄")));
    }

    #[test]
    fn test_rejects_duplicate_cells() {
        let root = template_dir();
        let result = load(
            &root,
            r#"{"a": {"filename": "template/assessment.xlsx", "name": "A", "mapping": {"B2": "氏名", "$B$2": "利用者様"}}}"#,
        );
        assert!(matches!(result, Err(RegistryError::Invalid(_, _))));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let root = template_dir();
        let entry = r#"{"filename": "template/assessment.xlsx", "name": "A", "mapping": {}}"#;
        let result = load(&root, &format!(r#"{{"a": {}, "a": {}}}"#, entry, entry));
        assert!(matches!(result, Err(RegistryError::Json(_))));
    }

    #[test]
    fn test_rejects_path_separator_in_name() {
        let root = template_dir();
        let result = load(
            &root,
            r#"{"a": {"filename": "template/assessment.xlsx", "name": "../A", "mapping": {}}}"#,
        );
        assert!(matches!(result, Err(RegistryError::Invalid(_, _))));
    }

    #[test]
    fn test_rejects_double_dot_in_name() {
        let root = template_dir();
        let result = load(
            &root,
            r#"{"a": {"filename": "template/assessment.xlsx", "name": "記録..v2", "mapping": {}}}"#,
        );
        assert!(matches!(
            result,
            Err(RegistryError::Invalid(id, reason)) if id == "a" && reason.contains("..")
        ));

        let registry = load(
            &root,
            r#"{"a": {"filename": "template/assessment.xlsx", "name": "記録.v2", "mapping": {}}}"#,
        )
        .unwrap();
        assert_eq!(registry.lookup("a").unwrap().display_name, "記録.v2");
    }

    #[test]
    fn test_prior_stage_must_exist() {
        let root = template_dir();
        let result = load(
            &root,
            r#"{"final": {"filename": "template/assessment.xlsx", "name": "F", "mapping": {}, "prior_stage": "interim"}}"#,
        );
        assert!(matches!(result, Err(RegistryError::Invalid(id, _)) if id == "final"));

        let registry = load(
            &root,
            r#"{
                "interim": {"filename": "template/assessment.xlsx", "name": "I", "mapping": {}},
                "final": {"filename": "template/assessment.xlsx", "name": "F", "mapping": {}, "prior_stage": "interim"}
            }"#,
        )
        .unwrap();
        let final_stage = registry.lookup("final").unwrap();
        assert_eq!(registry.prior_template_of(final_stage).unwrap().id, "interim");
        let ids: Vec<_> = registry.list().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["final", "interim"]);
    }
}
