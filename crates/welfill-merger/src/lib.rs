//! Welfill Merger - Override resolution
//!
//! Combines extracted values with what the user typed into one
//! [`ResolvedFieldMapping`].
//!
//! # Precedence
//!
//! ```text
//! prior-stage record  <  extracted values  <  manual fields (+ derived dates)
//! ```
//!
//! Manual fields are authoritative. Each one is written under every key
//! templates use for that concept, and a manual date is rendered into every
//! date format the templates expect, including the Japanese era calendar.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod era;
pub mod merger;

pub use era::{EraCalendar, EraError};
pub use merger::OverrideMerger;
