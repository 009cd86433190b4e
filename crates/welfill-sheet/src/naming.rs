//! Output file naming
//!
//! Outputs are named `{yy.mm.dd}_{template name}【{user name}】.xlsx` so a
//! folder of records sorts by date and reads at a glance.

use chrono::NaiveDate;
use welfill_domain::vocabulary::{NAME_CANDIDATE_KEYS, NAME_FURIGANA_FALLBACK_KEY, UNSET_NAME};
use welfill_domain::{ResolvedFieldMapping, TemplateDescriptor};

/// The service user's name as recorded in `resolved`
///
/// First set value among [`NAME_CANDIDATE_KEYS`], then the furigana key,
/// then [`UNSET_NAME`].
pub fn user_name(resolved: &ResolvedFieldMapping) -> &str {
    NAME_CANDIDATE_KEYS
        .iter()
        .chain(std::iter::once(&NAME_FURIGANA_FALLBACK_KEY))
        .find_map(|key| resolved.get(key))
        .unwrap_or(UNSET_NAME)
}

/// Keep only letters and digits of any script, ASCII and full-width spaces,
/// `_` and `-`
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '\u{3000}' | '_' | '-'))
        .collect()
}

/// File name for a filled `template` produced on `today`
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use welfill_domain::{FieldMapping, FieldValues, ResolvedFieldMapping, TemplateDescriptor};
/// use welfill_sheet::naming::output_file_name;
///
/// let template = TemplateDescriptor {
///     id: "assessment".to_string(),
///     display_name: "アセスメント".to_string(),
///     source_file: "template/assessment.xlsx".into(),
///     sheet_name: None,
///     field_mapping: FieldMapping::default(),
///     prior_stage: None,
///     extraction_hint: None,
/// };
/// let values: FieldValues = [("氏名", "山田 太郎")].into_iter().collect();
/// let resolved = ResolvedFieldMapping::new(values, None);
/// let today = NaiveDate::from_ymd_opt(2026, 5, 20).unwrap();
///
/// assert_eq!(
///     output_file_name(&template, &resolved, today),
///     "26.05.20_アセスメント【山田 太郎】.xlsx"
/// );
/// ```
pub fn output_file_name(
    template: &TemplateDescriptor,
    resolved: &ResolvedFieldMapping,
    today: NaiveDate,
) -> String {
    let mut name = sanitize_name(user_name(resolved));
    if name.is_empty() {
        name = UNSET_NAME.to_string();
    }
    format!(
        "{}_{}【{}】.xlsx",
        today.format("%y.%m.%d"),
        template.display_name,
        name
    )
}
