//! Configuration management for devoptd.
//!
//! Loads settings from `<config_dir>/devenv-optimizer/config.toml` (or a path
//! given on the command line) and falls back to defaults.

use anyhow::{Context, Result};
use devopt_common::llm_client::LlmConfig;
use devopt_common::paths;
use devopt_common::reconciler::{DesiredEdit, EditTable};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which recommendation engine the session uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Delegate advice to the hosted text-generation model
    #[default]
    Ai,
    /// Fixed threshold rules, no network access
    Rules,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Editor settings location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Overrides the per-platform settings.json path
    #[serde(default)]
    pub settings_path: Option<PathBuf>,
}

impl EditorConfig {
    pub fn resolved_settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(paths::default_settings_path)
    }
}

/// Telemetry collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Processes kept in a snapshot, highest CPU first
    #[serde(default = "default_process_limit")]
    pub process_limit: usize,
}

fn default_process_limit() -> usize {
    100
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            process_limit: default_process_limit(),
        }
    }
}

/// Settings reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Extension count above which an advisory is reported
    #[serde(default = "default_extension_threshold")]
    pub extension_threshold: usize,

    /// Appended after the standard edits
    #[serde(default)]
    pub extra_edits: Vec<DesiredEdit>,
}

fn default_extension_threshold() -> usize {
    10
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            extension_threshold: default_extension_threshold(),
            extra_edits: Vec::new(),
        }
    }
}

impl ReconcileConfig {
    pub fn edit_table(&self) -> EditTable {
        let mut table = EditTable::standard().with_extra_edits(&self.extra_edits);
        for advisory in &mut table.advisories {
            advisory.threshold = self.extension_threshold;
        }
        table
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineKind,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub editor: EditorConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl Config {
    /// Load config from an explicit path (must exist) or the default location
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from_path(path),
            None => {
                let path = paths::default_config_path();
                if !path.exists() {
                    info!("No config at {}, using defaults", path.display());
                    return Ok(Config::default());
                }
                Ok(Self::load_from_path(&path).unwrap_or_else(|e| {
                    warn!("Config unreadable, using defaults: {:#}", e);
                    Config::default()
                }))
            }
        }
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
