//! Generated output files

use std::path::PathBuf;

/// A filled workbook waiting to be downloaded
///
/// Owned by the request that created it until the download path takes it
/// over and deletes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Location in the output directory
    pub file_path: PathBuf,
    /// Filename presented to the user
    pub logical_name: String,
}
