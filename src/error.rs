//! Error types for each pipeline layer.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::services::toolchain::ToolStep;

/// Failure of a single download attempt, or of the whole retry loop.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("no response within {0:?}")]
    ConnectTimeout(Duration),
    #[error("HTTP {}: {}", .status.as_u16(), .status.canonical_reason().unwrap_or("unknown status"))]
    Status { status: StatusCode },
    #[error("download exceeded the {0:?} time limit")]
    Timeout(Duration),
    #[error("stream interrupted: {0}")]
    Transfer(#[source] reqwest::Error),
    #[error("failed writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("download failed after {attempts} attempts, last error: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// The error of the final attempt, unwrapping retry exhaustion.
    pub fn last_error(&self) -> &FetchError {
        match self {
            FetchError::Exhausted { last, .. } => last.last_error(),
            other => other,
        }
    }
}

/// Failure of an external toolchain invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("'{program}' not found in PATH: {message}")]
    NotFound { program: String, message: String },
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{step} exited with {}", exit_description(.code))]
    Exit { step: ToolStep, code: Option<i32> },
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_string(),
    }
}

/// Reason a single region ended up `Failed`.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("failed to list {}: {source}", .path.display())]
    ListDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("download failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("processing failed: {0}")]
    Tool(#[from] ToolError),
}

/// Fault that aborts a whole batch run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot use directory {}: {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Fault that aborts a merge.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("data directory {} does not exist, download regions first", .0.display())]
    MissingDataDir(PathBuf),
    #[error("no .osrm files found in {}, download regions first", .0.display())]
    NothingToMerge(PathBuf),
    #[error("no .osrm file found for template region '{0}'")]
    TemplateNotFound(String),
    #[error("combined name '{name}' clashes with region '{region}', choose another name")]
    NameClash { name: String, region: String },
    #[error("{} belongs to a region extract, choose another combined name", .0.display())]
    RegionSidecar(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Configuration file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}
