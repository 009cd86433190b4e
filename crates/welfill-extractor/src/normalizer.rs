//! Input normalization
//!
//! Merges free text, manual form fields and uploads into one
//! [`ExtractionInput`] plus the [`ManualOverrides`] the merger applies later.

use crate::error::ExtractorError;
use tracing::{debug, info, warn};
use welfill_domain::{
    Attachment, AttachmentKind, ExtractionInput, ManualField, ManualOverrides, TemplateDescriptor,
};

/// Header line of the basic-information block
pub const BASIC_INFO_HEADER: &str = "【基本情報 (Basic Information provided by User)】";

/// Instruction line closing the basic-information block
pub const BASIC_INFO_INSTRUCTION: &str =
    "IMPORTANT: Please use the above 'Basic Information' to fill the corresponding fields in the output JSON.";

/// Render the manual fields as a `label: value` block for the extractor
///
/// Returns `None` when no manual field is set. Lines follow
/// [`ManualField::ALL`] order so the block is deterministic.
pub fn basic_information_block(manual: &ManualOverrides) -> Option<String> {
    if manual.is_empty() {
        return None;
    }

    let mut block = String::from("\n\n");
    block.push_str(BASIC_INFO_HEADER);
    block.push('\n');
    for field in ManualField::ALL {
        if let Some(value) = manual.get(field) {
            block.push_str(&format!("{}: {}\n", field.label(), value));
        }
    }
    block.push_str(BASIC_INFO_INSTRUCTION);
    block.push('\n');
    Some(block)
}

/// Normalize one request's inputs
///
/// - Blank manual fields are dropped.
/// - The basic-information block is appended once, after the user's text.
/// - For final-stage templates, the first uploaded workbook that yields
///   values is read through `prior_template`'s cell mapping (falling back to
///   `template`'s own mapping).
///
/// # Errors
///
/// [`ExtractorError::NoInputProvided`] when the text is empty and there is no
/// attachment after normalization. Whitespace-only text still counts as input.
pub fn normalize<I>(
    text: Option<&str>,
    manual_fields: I,
    attachments: Vec<Attachment>,
    template: &TemplateDescriptor,
    prior_template: Option<&TemplateDescriptor>,
) -> Result<(ExtractionInput, ManualOverrides), ExtractorError>
where
    I: IntoIterator<Item = (ManualField, String)>,
{
    let manual: ManualOverrides = manual_fields.into_iter().collect();

    let mut free_text = text.unwrap_or_default().to_string();
    if let Some(block) = basic_information_block(&manual) {
        free_text.push_str(&block);
    }

    if free_text.is_empty() && attachments.is_empty() {
        return Err(ExtractorError::NoInputProvided);
    }

    let prior_structured_data = if template.is_final_stage() {
        let mapping_source = prior_template.unwrap_or(template);
        read_first_prior_record(&attachments, mapping_source)
    } else {
        None
    };

    debug!(
        "Normalized input: {} chars, {} attachment(s), {} manual field(s)",
        free_text.chars().count(),
        attachments.len(),
        manual.len()
    );

    Ok((
        ExtractionInput {
            free_text,
            attachments,
            prior_structured_data,
        },
        manual,
    ))
}

fn read_first_prior_record(
    attachments: &[Attachment],
    mapping_source: &TemplateDescriptor,
) -> Option<welfill_domain::FieldValues> {
    for attachment in attachments
        .iter()
        .filter(|a| a.kind == AttachmentKind::Spreadsheet)
    {
        match welfill_sheet::read_prior_record(&attachment.path, mapping_source) {
            Ok(values) if !values.is_empty() => {
                info!(
                    "Read {} prior value(s) from '{}'",
                    values.len(),
                    attachment.original_name
                );
                return Some(values);
            }
            Ok(_) => {
                debug!("No prior values in '{}'", attachment.original_name);
            }
            Err(e) => {
                warn!(
                    "Failed to read prior record '{}': {}",
                    attachment.original_name, e
                );
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use welfill_domain::FieldMapping;

    fn template(prior_stage: Option<&str>) -> TemplateDescriptor {
        TemplateDescriptor {
            id: "monitoring".to_string(),
            display_name: "モニタリング".to_string(),
            source_file: "template/monitoring.xlsx".into(),
            sheet_name: None,
            field_mapping: FieldMapping::default(),
            prior_stage: prior_stage.map(str::to_string),
            extraction_hint: None,
        }
    }

    #[test]
    fn test_block_appended_once_after_text() {
        let manual = vec![
            (ManualField::StaffName, "佐藤".to_string()),
            (ManualField::UserName, "山田".to_string()),
        ];
        let (input, overrides) =
            normalize(Some("本文"), manual, Vec::new(), &template(None), None).unwrap();

        assert!(input.free_text.starts_with("本文\n\n"));
        assert_eq!(input.free_text.matches(BASIC_INFO_HEADER).count(), 1);
        assert!(input.free_text.trim_end().ends_with(BASIC_INFO_INSTRUCTION));

        // Enum order, not input order
        let user = input.free_text.find("利用者名 (User Name): 山田").unwrap();
        let staff = input.free_text.find("作成担当者 (Staff Name): 佐藤").unwrap();
        assert!(user < staff);
        assert_eq!(overrides.len(), 2);
    }

    #[test]
    fn test_blank_manual_fields_dropped() {
        let manual = vec![(ManualField::UserName, "   ".to_string())];
        let (input, overrides) =
            normalize(Some("本文"), manual, Vec::new(), &template(None), None).unwrap();
        assert_eq!(input.free_text, "本文");
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_no_input() {
        let result = normalize(Some(""), Vec::new(), Vec::new(), &template(None), None);
        assert!(matches!(result, Err(ExtractorError::NoInputProvided)));

        let result = normalize(None, Vec::new(), Vec::new(), &template(None), None);
        assert!(matches!(result, Err(ExtractorError::NoInputProvided)));

        // Blank manual fields add nothing
        let manual = vec![(ManualField::UserName, " ".to_string())];
        let result = normalize(None, manual, Vec::new(), &template(None), None);
        assert!(matches!(result, Err(ExtractorError::NoInputProvided)));
    }

    #[test]
    fn test_whitespace_text_is_input() {
        let (input, overrides) =
            normalize(Some("  \n"), Vec::new(), Vec::new(), &template(None), None).unwrap();
        assert_eq!(input.free_text, "  \n");
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_manual_fields_alone_are_input() {
        let manual = vec![(ManualField::Date, "2026-05-20".to_string())];
        let (input, _) = normalize(None, manual, Vec::new(), &template(None), None).unwrap();
        assert!(input.free_text.contains("日付 (Date): 2026-05-20"));
    }

    #[test]
    fn test_attachment_alone_is_input() {
        let attachments = vec![Attachment::new("/tmp/none.png", "photo.png")];
        let (input, _) =
            normalize(None, Vec::new(), attachments, &template(None), None).unwrap();
        assert!(input.free_text.is_empty());
        assert_eq!(input.attachments.len(), 1);
        assert!(input.prior_structured_data.is_none());
    }

    #[test]
    fn test_unreadable_prior_workbook_is_skipped() {
        let attachments = vec![Attachment::new("/nonexistent/interim.xlsx", "interim.xlsx")];
        let (input, _) = normalize(
            Some("x"),
            Vec::new(),
            attachments,
            &template(Some("monitoring_interim")),
            None,
        )
        .unwrap();
        assert!(input.prior_structured_data.is_none());
    }
}
