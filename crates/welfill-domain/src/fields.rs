//! Field value mappings flowing through the pipeline

use crate::vocabulary::{ManualField, SHEET_NAME_FIELD};
use std::collections::BTreeMap;

/// Flat `field name → value` mapping
///
/// Values are plain strings. Blank values are never stored, so "present"
/// always means "has content".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValues(BTreeMap<String, String>);

impl FieldValues {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, overwriting any previous one
    ///
    /// Returns `false` (and stores nothing) when the value is blank.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) -> bool {
        let value = value.into();
        if value.trim().is_empty() {
            return false;
        }
        self.0.insert(field.into(), value);
        true
    }

    /// Value for `field`, if present
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether `field` has a value
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Fill every field that is missing here from `lower`
    ///
    /// Existing values are never replaced.
    pub fn backfill_from(&mut self, lower: &FieldValues) {
        for (field, value) in &lower.0 {
            self.0
                .entry(field.clone())
                .or_insert_with(|| value.clone());
        }
    }

    /// Drop every field for which `keep` returns false
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|field, _| keep(field));
    }

    /// Iterate in field-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow as an ordered map
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = FieldValues::new();
        for (k, v) in iter {
            values.insert(k, v);
        }
        values
    }
}

/// User-typed values keyed by manual field
///
/// Built straight from form input; blank entries are dropped on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualOverrides(BTreeMap<ManualField, String>);

impl ManualOverrides {
    /// Create an empty set of overrides
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a manual value; blank values are ignored
    pub fn set(&mut self, field: ManualField, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            return;
        }
        self.0.insert(field, value);
    }

    /// Value for `field`, if supplied
    pub fn get(&self, field: ManualField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    /// Iterate in `ManualField` order
    pub fn iter(&self) -> impl Iterator<Item = (ManualField, &str)> {
        self.0.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Whether nothing was supplied
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of supplied fields
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<V: Into<String>> FromIterator<(ManualField, V)> for ManualOverrides {
    fn from_iter<I: IntoIterator<Item = (ManualField, V)>>(iter: I) -> Self {
        let mut overrides = ManualOverrides::new();
        for (field, value) in iter {
            overrides.set(field, value);
        }
        overrides
    }
}

/// Final mapping consumed by the filler and the namer
///
/// Carries the target sheet name in the reserved [`SHEET_NAME_FIELD`]
/// pseudo-field so the filler needs no second registry lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFieldMapping {
    values: FieldValues,
}

impl ResolvedFieldMapping {
    /// Wrap merged values, attaching the target sheet name
    pub fn new(mut values: FieldValues, sheet_name: Option<&str>) -> Self {
        values.0.remove(SHEET_NAME_FIELD);
        if let Some(sheet) = sheet_name {
            values.insert(SHEET_NAME_FIELD, sheet);
        }
        Self { values }
    }

    /// Value for a template field; the reserved pseudo-field is not visible here
    pub fn get(&self, field: &str) -> Option<&str> {
        if field == SHEET_NAME_FIELD {
            return None;
        }
        self.values.get(field)
    }

    /// Target sheet name, if the template declares one
    pub fn sheet_name(&self) -> Option<&str> {
        self.values.get(SHEET_NAME_FIELD)
    }

    /// Template fields in name order, excluding the reserved pseudo-field
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().filter(|(k, _)| *k != SHEET_NAME_FIELD)
    }

    /// The full flat mapping, pseudo-field included
    pub fn as_values(&self) -> &FieldValues {
        &self.values
    }
}
