//! Configuration for the `bencao` binary.
//!
//! [`BencaoConfig`] loads from a TOML file, environment variables and
//! defaults using the `confyg` crate.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `BENCAO_CONFIG` environment variable
//! 3. XDG default: `~/.config/bencao/config.toml`
//! 4. Built-in defaults

use bencao_core::{expand_tilde, Error, Result};
use bencao_vector::VectorConfig;
use bencao_versions::VersionsConfig;
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prefix of every environment variable the config reads.
pub const ENV_PREFIX: &str = "BENCAO";

// ============================================================================
// Configuration structs
// ============================================================================

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BencaoConfig {
    /// Snapshot storage and publishing.
    pub versions: VersionsConfig,

    /// Vector engine and embedding provider.
    pub vector: VectorConfig,

    /// Document source and schedule.
    pub etl: EtlConfig,
}

/// Document source and publish schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    /// Directory scanned for documents.
    pub source_dir: String,

    /// Minutes between scheduled publishes.
    pub interval_minutes: u64,

    /// File extensions loaded as documents, without the dot.
    pub extensions: Vec<String>,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            source_dir: "data".to_string(),
            interval_minutes: 30,
            extensions: vec!["txt".to_string(), "md".to_string()],
        }
    }
}

// ============================================================================
// Config loading
// ============================================================================

impl BencaoConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path) {
            if path.exists() {
                builder
                    .add_file(&path.to_string_lossy())
                    .map_err(|e| Error::config(format!("config file: {e}")))?;
            }
        }

        let mut env_opts = env::Options::with_top_level(ENV_PREFIX);
        env_opts.add_section("versions");
        env_opts.add_section("vector");
        env_opts.add_section("etl");
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))
    }

    /// Resolve the config file path from explicit flag, env var, or XDG default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("BENCAO_CONFIG") {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    /// Return the XDG default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("bencao").join("config.toml"))
    }

    /// Snapshot base directory with `~` expanded.
    pub fn base_dir(&self) -> PathBuf {
        expand_tilde(&self.versions.base_dir)
    }

    /// Document source directory with `~` expanded.
    pub fn source_dir(&self) -> PathBuf {
        expand_tilde(&self.etl.source_dir)
    }

    /// Serialize this config to a pretty-printed TOML string.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten this config into environment variable pairs with `BENCAO_` prefix.
    pub fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let value: toml::Value =
            toml::Value::try_from(self).map_err(|e| Error::config(e.to_string()))?;
        let mut vars = Vec::new();
        flatten_toml_value(&value, ENV_PREFIX, &mut vars);
        Ok(vars)
    }
}

/// Recursively flatten a TOML value into `KEY=value` pairs.
fn flatten_toml_value(value: &toml::Value, prefix: &str, out: &mut Vec<(String, String)>) {
    match value {
        toml::Value::Table(table) => {
            for (key, val) in table {
                let env_key = format!("{}_{}", prefix, key.to_uppercase());
                flatten_toml_value(val, &env_key, out);
            }
        }
        toml::Value::Array(arr) => {
            if let Ok(json) = serde_json::to_string(arr) {
                out.push((prefix.to_string(), json));
            }
        }
        toml::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        toml::Value::Integer(i) => out.push((prefix.to_string(), i.to_string())),
        toml::Value::Float(f) => out.push((prefix.to_string(), f.to_string())),
        toml::Value::Boolean(b) => out.push((prefix.to_string(), b.to_string())),
        toml::Value::Datetime(dt) => out.push((prefix.to_string(), dt.to_string())),
    }
}

// ============================================================================
// Tests
// ============================================================================
