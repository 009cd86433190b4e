//! Welfill Sheet - Spreadsheet I/O
//!
//! Everything that touches workbook files lives here: reading prior-stage
//! records, stamping resolved values into template copies, and naming the
//! results.
//!
//! # Architecture
//!
//! ```text
//! template.xlsx ──► WorkbookIndex ──► plan writes per sheet part
//!                                          │
//!                   zip entries ──raw copy─┼──► staging file ──rename──► output
//!                   sheet XML ──streamed rewrite─┘
//! ```
//!
//! Templates are edited at the package level rather than loaded into a
//! spreadsheet model. Anything the filler does not write (styles, merged
//! ranges, column widths, drawings, print setup) is carried over unchanged.
//! The one exception is `cellXfs`: multi-line values get a wrapping copy of
//! their cell's format appended there.
//! Prior-stage records are read with `calamine`, so both `.xlsx` and legacy
//! `.xls` uploads work.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filler;
pub mod naming;
pub mod package;
pub mod prior;
mod sheet_xml;
mod styles;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use error::SheetError;
pub use filler::TemplateFiller;
pub use naming::output_file_name;
pub use package::WorkbookIndex;
pub use prior::read_prior_record;
