//! Configuration management for osrm-prep using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::RetryPolicy;
use crate::regions::RegionSet;
use crate::services::{PipelineConfig, ToolchainConfig};

/// Name used for config file discovery (`osrm-prep.toml`, `osrm-prep.yaml`, ...).
pub const CONFIG_NAME: &str = "osrm-prep";

/// Where region extracts are downloaded from.
pub const DEFAULT_BASE_URL: &str = "https://download.geofabrik.de/north-america/us";

/// Extension of the downloaded extracts.
pub const DEFAULT_EXTENSION: &str = "osm.pbf";

pub const ENV_DATA_DIR: &str = "OSRM_PREP_DATA_DIR";
pub const ENV_SCRATCH_DIR: &str = "OSRM_PREP_SCRATCH_DIR";
pub const ENV_BASE_URL: &str = "OSRM_PREP_BASE_URL";
pub const ENV_RUNNER: &str = "OSRM_PREP_DOCKER";

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Final location of the processed graph files.
    pub data_dir: PathBuf,
    /// Downloads and in-progress toolchain output.
    pub scratch_dir: PathBuf,
    /// Base URL of the extract server.
    pub base_url: String,
    /// Extension of the remote extracts.
    pub extension: String,
    /// Retry policy; the region set's preset when unset.
    pub retry: Option<RetryPolicy>,
    /// Pause between regions in milliseconds; the region set's default when unset.
    pub pacing_ms: Option<u64>,
    /// Container runner and OSRM image.
    pub toolchain: ToolchainConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            scratch_dir: PathBuf::from("temp"),
            base_url: DEFAULT_BASE_URL.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            retry: None,
            pacing_ms: None,
            toolchain: ToolchainConfig::default(),
        }
    }
}

impl Settings {
    /// Retry policy for a run over `set`.
    pub fn retry_policy(&self, set: RegionSet) -> RetryPolicy {
        self.retry.clone().unwrap_or_else(|| set.retry_policy())
    }

    /// Directories and source for a run over `set`.
    pub fn pipeline_config(&self, set: RegionSet) -> PipelineConfig {
        PipelineConfig {
            data_dir: self.data_dir.clone(),
            scratch_dir: self.scratch_dir.clone(),
            base_url: self.base_url.clone(),
            extension: self.extension.clone(),
            pacing: self
                .pacing_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| set.pacing()),
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Scratch directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<String>,
    /// Base URL of the extract server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Extension of the remote extracts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Pause between regions in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing_ms: Option<u64>,
    /// Download retry policy. Missing fields take the standard values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    /// Toolchain invocation. Missing fields take the defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<ToolchainConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Falls back to defaults when no config file is found or it cannot be parsed.
    pub async fn load() -> Self {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file: {}", e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse config file contents, choosing the format from `path`'s extension.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_error(e.to_string())),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| parse_error(e.to_string())),
            _ => serde_json::from_str(contents).map_err(|e| parse_error(e.to_string())),
        }
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = Self::resolve_path(data_dir, base_dir);
        }
        if let Some(ref scratch_dir) = self.scratch_dir {
            settings.scratch_dir = Self::resolve_path(scratch_dir, base_dir);
        }
        if let Some(ref base_url) = self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(ref extension) = self.extension {
            settings.extension = extension.trim_start_matches('.').to_string();
        }
        if let Some(pacing_ms) = self.pacing_ms {
            settings.pacing_ms = Some(pacing_ms);
        }
        if let Some(ref retry) = self.retry {
            settings.retry = Some(retry.clone());
        }
        if let Some(ref toolchain) = self.toolchain {
            settings.toolchain = toolchain.clone();
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (skips discovery).
    pub config_path: Option<PathBuf>,
    /// Resolve relative paths from the CWD instead of the config file location.
    pub use_cwd: bool,
}

/// Apply `OSRM_PREP_*` overrides; `lookup` returns a variable's value if set.
pub fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(ENV_DATA_DIR) {
        tracing::debug!("Using {} from environment: {}", ENV_DATA_DIR, dir);
        settings.data_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
    }
    if let Some(dir) = lookup(ENV_SCRATCH_DIR) {
        tracing::debug!("Using {} from environment: {}", ENV_SCRATCH_DIR, dir);
        settings.scratch_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
    }
    if let Some(url) = lookup(ENV_BASE_URL) {
        tracing::debug!("Using {} from environment: {}", ENV_BASE_URL, url);
        settings.base_url = url;
    }
    if let Some(runner) = lookup(ENV_RUNNER) {
        tracing::debug!("Using {} from environment: {}", ENV_RUNNER, runner);
        settings.toolchain.runner = runner;
    }
}

/// Load settings: defaults, then the config file, then the environment.
///
/// An explicitly given config file must load; a discovered one that fails
/// to parse is ignored with a warning.
pub async fn load_settings_with_options(options: LoadOptions) -> Result<Settings, ConfigError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd
    } else {
        config.base_dir().unwrap_or(cwd)
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    apply_env_overrides(&mut settings, |key| {
        std::env::var(key).ok().filter(|s| !s.is_empty())
    });

    Ok(settings)
}
