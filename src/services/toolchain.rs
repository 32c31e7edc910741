//! OSRM toolchain invoked through a container runner.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::ToolError;

/// One OSRM command-line tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStep {
    Extract,
    Partition,
    Customize,
    Contract,
}

impl ToolStep {
    /// Steps run for every region, in order.
    pub const REGION_PIPELINE: [ToolStep; 3] =
        [ToolStep::Extract, ToolStep::Partition, ToolStep::Customize];

    pub fn binary(self) -> &'static str {
        match self {
            ToolStep::Extract => "osrm-extract",
            ToolStep::Partition => "osrm-partition",
            ToolStep::Customize => "osrm-customize",
            ToolStep::Contract => "osrm-contract",
        }
    }
}

impl fmt::Display for ToolStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Runs OSRM tools against files in a working directory.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Run `step` on `input`, a file name inside `workdir`.
    ///
    /// Blocks until the tool exits; a non-zero exit is an error.
    async fn run(&self, step: ToolStep, workdir: &Path, input: &str) -> Result<(), ToolError>;
}

/// How the container runner is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Container runner executable.
    pub runner: String,
    /// Image providing the OSRM binaries.
    pub image: String,
    /// Profile passed to osrm-extract, as a path inside the container.
    pub profile: String,
    /// Where the working directory is mounted inside the container.
    pub mount_point: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            runner: "docker".to_string(),
            image: "ghcr.io/project-osrm/osrm-backend".to_string(),
            profile: "/opt/car.lua".to_string(),
            mount_point: "/data".to_string(),
        }
    }
}

/// [`Toolchain`] that runs each step as `docker run` against the OSRM image.
#[derive(Debug, Clone)]
pub struct DockerToolchain {
    config: ToolchainConfig,
}

impl DockerToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// Resolve the runner in PATH, failing early when it is not installed.
    pub fn ensure_available(&self) -> Result<PathBuf, ToolError> {
        which::which(&self.config.runner).map_err(|e| ToolError::NotFound {
            program: self.config.runner.clone(),
            message: e.to_string(),
        })
    }

    /// Arguments passed to the runner for one step.
    pub fn command_args(&self, step: ToolStep, workdir: &Path, input: &str) -> Vec<String> {
        let mount = self.config.mount_point.trim_end_matches('/');
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:{}", workdir.display(), mount),
            self.config.image.clone(),
            step.binary().to_string(),
        ];
        if step == ToolStep::Extract {
            args.push("-p".to_string());
            args.push(self.config.profile.clone());
        }
        args.push(format!("{}/{}", mount, input));
        args
    }
}

#[async_trait]
impl Toolchain for DockerToolchain {
    async fn run(&self, step: ToolStep, workdir: &Path, input: &str) -> Result<(), ToolError> {
        let program = self.config.runner.clone();
        let workdir = std::path::absolute(workdir).map_err(|source| ToolError::Spawn {
            program: program.clone(),
            source,
        })?;
        let args = self.command_args(step, &workdir, input);

        info!("Running {} on {}", step, input);
        debug!("{} {}", program, args.join(" "));

        let status = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|source| ToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ToolError::Exit {
                step,
                code: status.code(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_args_include_profile() {
        let toolchain = DockerToolchain::new(ToolchainConfig::default());
        let args =
            toolchain.command_args(ToolStep::Extract, Path::new("/tmp/work"), "tr.osm.pbf");
        assert_eq!(
            args,
            vec![
                "run",
                "--rm",
                "-v",
                "/tmp/work:/data",
                "ghcr.io/project-osrm/osrm-backend",
                "osrm-extract",
                "-p",
                "/opt/car.lua",
                "/data/tr.osm.pbf",
            ]
        );
    }

    #[test]
    fn test_later_steps_take_graph_file() {
        let toolchain = DockerToolchain::new(ToolchainConfig {
            mount_point: "/mnt/".to_string(),
            ..ToolchainConfig::default()
        });
        let args = toolchain.command_args(ToolStep::Partition, Path::new("/w"), "tr.osrm");
        assert_eq!(args[3], "/w:/mnt");
        assert_eq!(args[5], "osrm-partition");
        assert_eq!(args.last().map(String::as_str), Some("/mnt/tr.osrm"));
        assert!(!args.contains(&"-p".to_string()));
    }

    #[test]
    fn test_region_pipeline_order() {
        let names: Vec<_> = ToolStep::REGION_PIPELINE.iter().map(|s| s.binary()).collect();
        assert_eq!(names, vec!["osrm-extract", "osrm-partition", "osrm-customize"]);
    }

    #[test]
    fn test_missing_runner_is_reported() {
        let toolchain = DockerToolchain::new(ToolchainConfig {
            runner: "osrm-prep-no-such-runner".to_string(),
            ..ToolchainConfig::default()
        });
        assert!(matches!(
            toolchain.ensure_available(),
            Err(ToolError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let toolchain = DockerToolchain::new(ToolchainConfig {
            runner: "osrm-prep-no-such-runner".to_string(),
            ..ToolchainConfig::default()
        });
        let err = toolchain
            .run(ToolStep::Customize, Path::new("."), "tr.osrm")
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_checked() {
        let ok = DockerToolchain::new(ToolchainConfig {
            runner: "true".to_string(),
            ..ToolchainConfig::default()
        });
        ok.run(ToolStep::Extract, Path::new("."), "tr.osm.pbf")
            .await
            .unwrap();

        let failing = DockerToolchain::new(ToolchainConfig {
            runner: "false".to_string(),
            ..ToolchainConfig::default()
        });
        let err = failing
            .run(ToolStep::Partition, Path::new("."), "tr.osrm")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Exit {
                step: ToolStep::Partition,
                code: Some(1)
            }
        ));
    }
}
