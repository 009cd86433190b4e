//! LLM prompt engineering for field extraction

use welfill_domain::FieldValues;

/// Builds prompts for the LLM to fill a template's fields
pub struct PromptBuilder<'a> {
    template_name: &'a str,
    fields: Vec<&'a str>,
    text: &'a str,
    hint: Option<&'a str>,
    prior: Option<&'a FieldValues>,
}

impl<'a> PromptBuilder<'a> {
    /// Create a new prompt builder for a template and its field vocabulary
    pub fn new(template_name: &'a str, fields: Vec<&'a str>, text: &'a str) -> Self {
        Self {
            template_name,
            fields,
            text,
            hint: None,
            prior: None,
        }
    }

    /// Add template-specific writing guidance
    pub fn with_hint(mut self, hint: Option<&'a str>) -> Self {
        self.hint = hint.filter(|h| !h.trim().is_empty());
        self
    }

    /// Add values recorded in a prior-stage record
    pub fn with_prior(mut self, prior: Option<&'a FieldValues>) -> Self {
        self.prior = prior.filter(|p| !p.is_empty());
        self
    }

    /// Build the complete extraction prompt
    pub fn build(&self) -> String {
        let mut prompt = String::new();

        // 1. Instruction
        prompt.push_str(EXTRACTION_INSTRUCTIONS);
        prompt.push_str("\n\n");
        prompt.push_str(&format!("Form: {}\n\n", self.template_name));

        // 2. Field vocabulary
        prompt.push_str("Fields (use these exact names as JSON keys):\n");
        for field in &self.fields {
            prompt.push_str(&format!("- {}\n", field));
        }
        prompt.push('\n');

        // 3. Template guidance
        if let Some(hint) = self.hint {
            prompt.push_str("Writing style for this form:\n");
            prompt.push_str(hint.trim());
            prompt.push_str("\n\n");
        }

        // 4. Prior-stage values
        if let Some(prior) = self.prior {
            prompt.push_str(
                "Values recorded in the earlier (interim) record. Carry them over unless the notes say otherwise:\n",
            );
            let json = serde_json::to_string_pretty(prior.as_map())
                .unwrap_or_else(|_| "{}".to_string());
            prompt.push_str(&json);
            prompt.push_str("\n\n");
        }

        // 5. The notes
        prompt.push_str("Notes to analyze (attached images and documents follow):\n");
        prompt.push_str("---\n");
        prompt.push_str(self.text);
        prompt.push_str("\n---\n\n");

        // 6. Output format reminder
        prompt.push_str(OUTPUT_FORMAT_REMINDER);

        prompt
    }
}

const EXTRACTION_INSTRUCTIONS: &str = r#"You are filling in a Japanese welfare service record form from a caregiver's notes.
Read the notes and every attached image or document (photographs of handwritten forms are common) and extract a value for each field of the form.

Rules:
- Write values in Japanese, in the register used by official care records
- Keep facts exactly as written; do not invent names, dates or numbers
- Omit a field entirely when the notes give no information for it
- If a "基本情報 (Basic Information)" block is present, its values take priority over anything inferred"#;

const OUTPUT_FORMAT_REMINDER: &str = r#"Output format (a single flat JSON object only, no additional text):
{
  "field name": "value"
}

Remember: keys must be field names from the list above, values must be strings (use \n for line breaks). Return ONLY valid JSON, no markdown code blocks, no explanations."#;
