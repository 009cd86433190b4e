//! Per-request extraction input

use crate::fields::FieldValues;
use std::path::{Path, PathBuf};

/// Broad category of an uploaded file, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Photograph or scan
    Image,
    /// PDF document
    Pdf,
    /// Plain text
    Text,
    /// Excel workbook
    Spreadsheet,
    /// Anything else; not sent to the extractor
    Other,
}

impl AttachmentKind {
    /// Classify a file by its extension (case-insensitive)
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "webp" | "heic" | "heif" | "gif" => AttachmentKind::Image,
            "pdf" => AttachmentKind::Pdf,
            "txt" | "md" | "csv" => AttachmentKind::Text,
            "xlsx" | "xlsm" | "xls" => AttachmentKind::Spreadsheet,
            _ => AttachmentKind::Other,
        }
    }
}

/// An uploaded file saved to scratch storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Where the upload was saved
    pub path: PathBuf,
    /// Filename as sent by the client
    pub original_name: String,
    /// Category derived from `original_name`
    pub kind: AttachmentKind,
}

impl Attachment {
    /// Describe an upload saved at `path`
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        let original_name = original_name.into();
        let kind = AttachmentKind::from_file_name(&original_name);
        Self {
            path: path.into(),
            original_name,
            kind,
        }
    }

    /// MIME type used when the file is sent inline to the extractor
    pub fn mime_type(&self) -> &'static str {
        let ext = Path::new(&self.original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "heic" => "image/heic",
            "heif" => "image/heif",
            "gif" => "image/gif",
            "pdf" => "application/pdf",
            "txt" => "text/plain",
            "md" => "text/markdown",
            "csv" => "text/csv",
            "xlsx" | "xlsm" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "xls" => "application/vnd.ms-excel",
            _ => "application/octet-stream",
        }
    }
}

/// Everything the extractor sees for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionInput {
    /// User text followed by the basic-information block
    pub free_text: String,

    /// Uploaded files in upload order
    pub attachments: Vec<Attachment>,

    /// Values read from a prior-stage record (final templates only)
    pub prior_structured_data: Option<FieldValues>,
}
