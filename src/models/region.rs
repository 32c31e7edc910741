//! Region work item.

use std::fmt;

use serde::{Deserialize, Serialize};

/// File extension of the graph files produced by the toolchain.
pub const GRAPH_EXTENSION: &str = "osrm";

/// One unit of work: a region whose extract is downloaded and processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Human-readable name.
    pub name: String,
    /// Code used in the remote URL and as the prefix of every local file.
    pub code: String,
}

impl Region {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }

    /// URL of this region's latest extract: `{base_url}/{code}-latest.{extension}`.
    pub fn source_url(&self, base_url: &str, extension: &str) -> String {
        format!(
            "{}/{}-latest.{}",
            base_url.trim_end_matches('/'),
            self.code,
            extension
        )
    }

    /// Local file name of the downloaded extract.
    pub fn artifact_name(&self, extension: &str) -> String {
        format!("{}.{}", self.code, extension)
    }

    /// Base graph file name the toolchain derives from the extract.
    pub fn graph_name(&self) -> String {
        format!("{}.{}", self.code, GRAPH_EXTENSION)
    }

    /// Whether a file on disk belongs to this region.
    pub fn owns_file(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.code)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
