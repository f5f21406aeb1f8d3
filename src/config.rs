//! Configuration management for the rescorer

use crate::feature_extractor::AccessStrategy;
use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

/// Model file format, selects the evaluator
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// JSON linear / logistic regression model
    #[default]
    Linear,
    /// ONNX graph run through ONNX Runtime
    Onnx,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub models: ModelsConfig,
    #[serde(default)]
    pub rescore: RescoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model deployment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory model files are resolved against
    pub models_dir: String,
    /// Model file name inside `models_dir`
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub format: ModelFormat,
    /// Number of threads for ONNX inference (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_model_name() -> String {
    "lr.json".to_string()
}

fn default_onnx_threads() -> usize {
    1
}

fn default_window_size() -> usize {
    10
}

/// Rescoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RescoreConfig {
    /// Window size used when a request does not name one
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Field access order inside a segment
    #[serde(default)]
    pub access_strategy: AccessStrategy,
}

impl Default for RescoreConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            access_strategy: AccessStrategy::Auto,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models: ModelsConfig {
                models_dir: "models".to_string(),
                model_name: default_model_name(),
                format: ModelFormat::Linear,
                onnx_threads: 1,
            },
            rescore: RescoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
