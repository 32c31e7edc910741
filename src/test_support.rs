//! Fixtures shared by unit tests.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::services::batch::PipelineConfig;
use crate::services::toolchain::{ToolStep, Toolchain};

/// Toolchain that records calls and writes the files `osrm-extract` would.
pub struct StubToolchain {
    calls: Mutex<Vec<(ToolStep, String)>>,
    fail_at: Option<ToolStep>,
}

impl StubToolchain {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_at: None,
        }
    }

    pub fn failing_at(step: ToolStep) -> Self {
        Self {
            fail_at: Some(step),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<(ToolStep, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Toolchain for StubToolchain {
    async fn run(&self, step: ToolStep, workdir: &Path, input: &str) -> Result<(), ToolError> {
        self.calls.lock().unwrap().push((step, input.to_string()));
        if self.fail_at == Some(step) {
            return Err(ToolError::Exit {
                step,
                code: Some(1),
            });
        }
        if step == ToolStep::Extract {
            let stem = input.split('.').next().unwrap_or(input);
            std::fs::write(workdir.join(format!("{stem}.osrm")), b"graph").unwrap();
            std::fs::write(workdir.join(format!("{stem}.osrm.nodes")), b"nodes").unwrap();
        }
        Ok(())
    }
}

/// Pipeline config rooted in `root` with existing data and scratch directories.
pub fn test_config(root: &Path, base_url: &str) -> PipelineConfig {
    let config = PipelineConfig {
        data_dir: root.join("data"),
        scratch_dir: root.join("temp"),
        base_url: base_url.to_string(),
        extension: "osm.pbf".to_string(),
        pacing: Duration::ZERO,
    };
    std::fs::create_dir_all(&config.data_dir).unwrap();
    std::fs::create_dir_all(&config.scratch_dir).unwrap();
    config
}
