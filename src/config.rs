//! VM configuration
//!
//! Initial capacities for the per-coroutine stacks and for new vectors.
//! Loaded in layers, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. A TOML file: the explicit `config_path`, or `glos.toml` in the working
//!    directory when present
//! 3. `GLOS__*` environment variables (`.env` is read first), e.g.
//!    `GLOS__VALUE_STACK_CAPACITY=256`
//!
//! Capacities are only starting points; every stack grows on demand.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub value_stack_capacity: usize,
    pub call_stack_capacity: usize,
    pub delimiter_stack_capacity: usize,
    pub vector_capacity: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            value_stack_capacity: 128,
            call_stack_capacity: 16,
            delimiter_stack_capacity: 16,
            vector_capacity: 4,
        }
    }
}

impl VmConfig {
    pub fn builder() -> VmConfigBuilder {
        VmConfigBuilder::default()
    }

    /// Render as TOML, in the same shape the file layer accepts
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("Failed to render configuration")
    }
}

#[derive(Debug, Default)]
pub struct VmConfigBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
}

impl VmConfigBuilder {
    /// Explicit config file; it must exist when given
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Ignore `.env` and `GLOS__*` variables
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.skip_env = skip;
        self
    }

    pub fn build(self) -> Result<VmConfig> {
        let defaults = VmConfig::default();
        let mut builder = Config::builder()
            .set_default("value_stack_capacity", defaults.value_stack_capacity as i64)?
            .set_default("call_stack_capacity", defaults.call_stack_capacity as i64)?
            .set_default(
                "delimiter_stack_capacity",
                defaults.delimiter_stack_capacity as i64,
            )?
            .set_default("vector_capacity", defaults.vector_capacity as i64)?;

        builder = match &self.config_path {
            Some(path) => builder.add_source(File::from(path.as_path()).required(true)),
            None => builder.add_source(File::with_name("glos.toml").required(false)),
        };

        if !self.skip_env {
            dotenvy::dotenv().ok();
            builder = builder.add_source(
                Environment::with_prefix("GLOS")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config = builder.build().with_context(|| match &self.config_path {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;

        config
            .try_deserialize()
            .context("Invalid configuration values")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("glos-{}-{}.toml", name, std::process::id()));
        fs::write(&path, contents).expect("write temp config");
        path
    }

    #[test]
    fn test_defaults() {
        let config = VmConfig::builder().skip_env(true).build().expect("defaults load");
        assert_eq!(config, VmConfig::default());
        assert_eq!(config.value_stack_capacity, 128);
        assert_eq!(config.call_stack_capacity, 16);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = temp_file("override", "value_stack_capacity = 512\nvector_capacity = 8\n");
        let config = VmConfig::builder()
            .config_path(Some(path.clone()))
            .skip_env(true)
            .build()
            .expect("file loads");
        fs::remove_file(path).ok();

        assert_eq!(config.value_stack_capacity, 512);
        assert_eq!(config.vector_capacity, 8);
        assert_eq!(config.delimiter_stack_capacity, 16);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = VmConfig::builder()
            .config_path(Some(PathBuf::from("/nonexistent/glos.toml")))
            .skip_env(true)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/glos.toml"));
    }

    #[test]
    fn test_env_overrides_file() {
        let path = temp_file("env", "call_stack_capacity = 32\n");
        std::env::set_var("GLOS__CALL_STACK_CAPACITY", "64");
        let config = VmConfig::builder()
            .config_path(Some(path.clone()))
            .build()
            .expect("env loads");
        std::env::remove_var("GLOS__CALL_STACK_CAPACITY");
        fs::remove_file(path).ok();

        assert_eq!(config.call_stack_capacity, 64);
    }

    #[test]
    fn test_toml_rendering_round_trips() {
        let rendered = VmConfig::default().to_toml().expect("render");
        assert!(rendered.contains("value_stack_capacity = 128"));
        let back: VmConfig = toml::from_str(&rendered).expect("parse rendered");
        assert_eq!(back, VmConfig::default());
    }
}
