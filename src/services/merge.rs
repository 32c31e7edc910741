//! Combined dataset built from one region's graph files.
//!
//! The toolchain has no real merge: the combined dataset is a copy of one
//! region's file set under a new name, finished with one more toolchain run.

use std::path::Path;

use tracing::{debug, info};

use crate::error::MergeError;
use crate::models::GRAPH_EXTENSION;
use crate::regions::ALL_STATES;
use crate::services::files;
use crate::services::toolchain::{ToolStep, Toolchain};

/// Default name of the combined dataset.
pub const DEFAULT_COMBINED_NAME: &str = "all-states";

/// Toolchain step that finishes the combined dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MergeStep {
    /// Multi-level Dijkstra (osrm-customize)
    #[default]
    Customize,
    /// Contraction hierarchies (osrm-contract)
    Contract,
}

impl MergeStep {
    pub fn tool_step(self) -> ToolStep {
        match self {
            MergeStep::Customize => ToolStep::Customize,
            MergeStep::Contract => ToolStep::Contract,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    /// Stem of the combined file set, e.g. `all-states` for `all-states.osrm`.
    pub combined_name: String,
    /// Region code whose files seed the combined set; first in name order if unset.
    pub template: Option<String>,
    pub final_step: MergeStep,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            combined_name: DEFAULT_COMBINED_NAME.to_string(),
            template: None,
            final_step: MergeStep::default(),
        }
    }
}

/// What a merge produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Stem of the template region.
    pub template: String,
    /// Names of the files written under the combined name.
    pub files_copied: Vec<String>,
    /// Graph file the final step ran on.
    pub combined_graph: String,
}

/// Build the combined dataset inside `data_dir`.
pub async fn merge(
    data_dir: &Path,
    options: &MergeOptions,
    toolchain: &dyn Toolchain,
) -> Result<MergeReport, MergeError> {
    if !tokio::fs::try_exists(data_dir).await.unwrap_or(false) {
        return Err(MergeError::MissingDataDir(data_dir.to_path_buf()));
    }

    let names = files::list_files(data_dir)
        .await
        .map_err(|source| MergeError::ReadDir {
            path: data_dir.to_path_buf(),
            source,
        })?;

    let graph_suffix = format!(".{}", GRAPH_EXTENSION);
    let combined_graph = format!("{}{}", options.combined_name, graph_suffix);
    let graphs: Vec<&String> = names
        .iter()
        .filter(|name| name.ends_with(&graph_suffix) && **name != combined_graph)
        .collect();
    info!("Found {} region graphs in {}", graphs.len(), data_dir.display());

    let stems: Vec<&str> = graphs
        .iter()
        .map(|name| name.trim_end_matches(&graph_suffix))
        .collect();
    check_combined_name(data_dir, &options.combined_name, &stems, &names)?;

    let template = match options.template {
        Some(ref code) => {
            let wanted = format!("{}{}", code, graph_suffix);
            graphs
                .iter()
                .find(|name| ***name == wanted)
                .ok_or_else(|| MergeError::TemplateNotFound(code.clone()))?
        }
        None => graphs
            .first()
            .ok_or_else(|| MergeError::NothingToMerge(data_dir.to_path_buf()))?,
    };
    let stem = template.trim_end_matches(&graph_suffix).to_string();
    let prefix = format!("{}.", stem);

    let mut files_copied = Vec::new();
    for name in names
        .iter()
        .filter(|name| name.starts_with(&prefix) && !name.contains(".timestamp"))
    {
        let target = format!("{}{}", options.combined_name, &name[stem.len()..]);
        let from = data_dir.join(name);
        let to = data_dir.join(&target);
        debug!("Copying {} -> {}", name, target);
        tokio::fs::copy(&from, &to)
            .await
            .map_err(|source| MergeError::Copy { from, to, source })?;
        files_copied.push(target);
    }
    info!(
        "Copied {} files from {} to {}",
        files_copied.len(),
        stem,
        options.combined_name
    );

    toolchain
        .run(options.final_step.tool_step(), data_dir, &combined_graph)
        .await?;

    Ok(MergeReport {
        template: stem,
        files_copied,
        combined_graph,
    })
}

/// Reject names whose files would overwrite a region's graph or make the
/// download skip check treat a region as processed.
fn check_combined_name(
    data_dir: &Path,
    combined_name: &str,
    region_stems: &[&str],
    names: &[String],
) -> Result<(), MergeError> {
    let lowered = combined_name.to_ascii_lowercase();
    let clash = ALL_STATES
        .iter()
        .copied()
        .chain(region_stems.iter().copied())
        .find(|code| lowered.starts_with(&code.to_ascii_lowercase()));
    if let Some(region) = clash {
        return Err(MergeError::NameClash {
            name: combined_name.to_string(),
            region: region.to_string(),
        });
    }

    // osrm-extract writes a .timestamp that merges never copy.
    let sidecar = format!("{}.{}.timestamp", combined_name, GRAPH_EXTENSION);
    if names.iter().any(|name| *name == sidecar) {
        return Err(MergeError::RegionSidecar(data_dir.join(sidecar)));
    }
    Ok(())
}
