// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Kernel configuration via `mediagraph.yaml`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{GraphError, Result};

/// Environment variable overriding the plugin search directory.
pub const PLUGIN_DIR_ENV: &str = "MEDIAGRAPH_PLUGIN_DIR";

/// Plugin directory used when neither the environment nor the config names one.
pub const DEFAULT_PLUGIN_DIR: &str = match option_env!("MEDIAGRAPH_DEFAULT_PLUGIN_DIR") {
    Some(dir) => dir,
    None => "/usr/lib/mediagraph/plugins",
};

/// Data thread settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLoopConfig {
    /// Period between processing cycles. `0` runs cycles only on request.
    pub cycle_period_ms: u64,
    pub thread_name: String,
}

impl Default for DataLoopConfig {
    fn default() -> Self {
        Self {
            cycle_period_ms: 10,
            thread_name: "mediagraph-data".to_string(),
        }
    }
}

/// Kernel configuration from `mediagraph.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Directory searched for plugin libraries.
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,

    #[serde(default)]
    pub data_loop: DataLoopConfig,
}

impl KernelConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "mediagraph.yaml";

    /// Load configuration from a directory. Returns error if file is missing
    /// or cannot be parsed.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            GraphError::Configuration(format!("Failed to read {}: {}", config_path.display(), e))
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            GraphError::Configuration(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;

        tracing::info!("Loaded kernel config from {}", config_path.display());
        Ok(config)
    }

    /// Load configuration from a directory, returning defaults if the file is
    /// missing or unparseable.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(Self::FILE_NAME);
        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                dir.display()
            );
            return Self::default();
        }

        match Self::load(dir) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Resolve the plugin search directory.
    ///
    /// Resolution order:
    /// 1. `MEDIAGRAPH_PLUGIN_DIR` environment variable
    /// 2. `plugin_dir` from the config file
    /// 3. the compiled-in default
    pub fn plugin_search_dir(&self) -> PathBuf {
        resolve_plugin_dir(std::env::var_os(PLUGIN_DIR_ENV), self.plugin_dir.as_deref())
    }
}

fn resolve_plugin_dir(env_value: Option<OsString>, configured: Option<&Path>) -> PathBuf {
    if let Some(dir) = env_value.filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(dir) = configured {
        return dir.to_path_buf();
    }
    PathBuf::from(DEFAULT_PLUGIN_DIR)
}
