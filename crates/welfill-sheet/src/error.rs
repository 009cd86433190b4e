//! Error types for workbook reading and writing

use thiserror::Error;

/// Errors that can occur while reading or filling workbooks
#[derive(Error, Debug)]
pub enum SheetError {
    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Malformed package XML
    #[error("XML error: {0}")]
    Xml(String),

    /// Workbook could not be read as a spreadsheet
    #[error("Workbook read error: {0}")]
    Read(String),

    /// The workbook has no sheet with this name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    /// A mapped defined name is missing or does not point at a cell
    #[error("Defined name not found or not a single cell: {0}")]
    DefinedNameNotFound(String),

    /// Structurally invalid workbook
    #[error("Invalid workbook: {0}")]
    Format(String),
}

impl From<quick_xml::Error> for SheetError {
    fn from(e: quick_xml::Error) -> Self {
        SheetError::Xml(e.to_string())
    }
}
