//! Welfill Extractor
//!
//! Turns caregiver notes, photographs and prior records into template field
//! values using an LLM.
//!
//! # Architecture
//!
//! ```text
//! form + uploads → normalize → ExtractionInput → Extractor → LLM → FieldValues
//! ```
//!
//! # Key Features
//!
//! - **Input normalization**: manual form fields are rendered into a
//!   basic-information block the model is told to prefer
//! - **Prior-stage chaining**: final templates read an uploaded interim
//!   workbook and pass its values along
//! - **Vocabulary filtering**: only the template's own field names survive
//!   parsing
//!
//! # Example Usage
//!
//! ```no_run
//! use welfill_extractor::{normalize, Extractor, ExtractorConfig};
//! use welfill_llm::MockProvider;
//! # use welfill_domain::TemplateDescriptor;
//!
//! # async fn example(template: TemplateDescriptor) -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = Extractor::new(MockProvider::new("{}"), ExtractorConfig::default());
//!
//! let (input, manual) = normalize(Some("本日の様子..."), Vec::new(), Vec::new(), &template, None)?;
//! let values = extractor.extract(input, template).await?;
//!
//! println!("Extracted {} fields ({} manual overrides)", values.len(), manual.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod normalizer;
mod parser;
mod prompt;


pub use config::ExtractorConfig;
pub use error::ExtractorError;
pub use extractor::Extractor;
pub use normalizer::{basic_information_block, normalize, BASIC_INFO_HEADER, BASIC_INFO_INSTRUCTION};
pub use parser::parse_llm_response;
