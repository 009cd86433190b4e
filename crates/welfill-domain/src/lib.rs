//! Welfill Domain Layer
//!
//! Core model for turning caregiver notes into filled spreadsheet records.
//! This crate has ZERO external dependencies and defines the value types,
//! the closed field vocabulary, and the trait boundaries that the other
//! crates implement.
//!
//! ## Key Concepts
//!
//! - **Template descriptor**: a document type's source workbook, sheet and
//!   cell mapping
//! - **Field values**: flat `field name → string` mappings produced by
//!   extraction and consumed by the filler
//! - **Manual overrides**: values typed by the user, which always win over
//!   extracted values
//! - **Vocabulary**: static alias tables that fan one manual concept out to
//!   every legacy field key that templates use for it

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod cell;
pub mod fields;
pub mod input;
pub mod template;
pub mod traits;
pub mod vocabulary;

// Re-exports for convenience
pub use artifact::OutputArtifact;
pub use cell::{CellRef, CellTarget};
pub use fields::{FieldValues, ManualOverrides, ResolvedFieldMapping};
pub use input::{Attachment, AttachmentKind, ExtractionInput};
pub use template::{FieldMapping, TemplateDescriptor};
pub use vocabulary::ManualField;
