//! Configuration loading
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. Config file (`actionflow.toml` in the working directory, or an explicit path)
//! 3. Environment variables (`ACTIONFLOW__RUNNER__DEFAULT_OUTPUT_VAR`, ...)
//!
//! A `.env` file is loaded into the environment first when present.

use std::path::{Path, PathBuf};

use config::{Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::actions::{ApiConfig, DEFAULT_OUTPUT_VAR};

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "actionflow.toml";
pub const ENV_PREFIX: &str = "ACTIONFLOW";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunnerSettings {
    /// `outputVar` key used for steps that don't name one
    #[serde(default = "default_output_var")]
    pub default_output_var: String,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            default_output_var: default_output_var(),
        }
    }
}

fn default_output_var() -> String {
    DEFAULT_OUTPUT_VAR.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiSettings {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_params: Option<Map<String, JsonValue>>,
}

impl ApiSettings {
    /// `initApi` options equivalent to these settings, if any are set
    pub fn to_api_config(&self) -> Option<ApiConfig> {
        if self.base_url.is_none() && self.default_params.is_none() {
            return None;
        }
        Some(ApiConfig {
            base_url: self.base_url.clone(),
            default_params: self.default_params.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerSettings,
    #[serde(default)]
    pub api: ApiSettings,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.default_output_var.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "runner.default_output_var must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    default_output_var: Option<String>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Explicit config file; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Override applied after every other layer
    pub fn default_output_var(mut self, name: Option<String>) -> Self {
        self.default_output_var = name;
        self
    }

    /// Ignore `.env` and `ACTIONFLOW__*` variables
    pub fn skip_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("runner.default_output_var", DEFAULT_OUTPUT_VAR)?;

        builder = match &self.config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.clone()));
                }
                builder.add_source(
                    File::from(path.as_path())
                        .format(FileFormat::Toml)
                        .required(true),
                )
            }
            None => builder.add_source(
                File::from(Path::new(DEFAULT_CONFIG_FILE))
                    .format(FileFormat::Toml)
                    .required(false),
            ),
        };

        if !self.skip_env {
            let _ = dotenvy::dotenv();
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            );
        }

        if let Some(name) = self.default_output_var {
            builder = builder.set_override("runner.default_output_var", name)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("actionflow-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn defaults_without_file() {
        let config = Config::builder().skip_env().build().unwrap();
        assert_eq!(config.runner.default_output_var, "temp");
        assert_eq!(config.api, ApiSettings::default());
        assert!(config.api.to_api_config().is_none());
    }

    #[test]
    fn reads_toml_file() {
        let path = write_config(
            r#"
[runner]
default_output_var = "last"

[api]
base_url = "https://example.test"

[api.default_params]
tenant = "A"
"#,
        );

        let config = Config::builder()
            .config_path(Some(path.clone()))
            .skip_env()
            .build()
            .unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.runner.default_output_var, "last");
        let api = config.api.to_api_config().unwrap();
        assert_eq!(api.base_url.as_deref(), Some("https://example.test"));
        assert_eq!(
            api.default_params.unwrap().get("tenant"),
            Some(&JsonValue::String("A".to_string()))
        );
    }

    #[test]
    fn explicit_override_wins() {
        let config = Config::builder()
            .skip_env()
            .default_output_var(Some("result".to_string()))
            .build()
            .unwrap();
        assert_eq!(config.runner.default_output_var, "result");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::builder()
            .config_path(Some(PathBuf::from("/nonexistent/actionflow.toml")))
            .skip_env()
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn empty_output_var_is_rejected() {
        let err = Config::builder()
            .skip_env()
            .default_output_var(Some("  ".to_string()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
