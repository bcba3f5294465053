//! Service configuration, loaded from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use ssv_client::ClientConfig;
use ssv_core::DEFAULT_SCORE_CAP;

use crate::error::{AppError, AppResult};

/// Tuning knobs of the state engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Maximum number of row indices per row-fetch call.
    pub row_batch_size: usize,
    /// Upper bound of the `-10 * log10(p)` correlation score.
    pub correlation_score_cap: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            row_batch_size: 100,
            correlation_score_cap: DEFAULT_SCORE_CAP,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> AppResult<()> {
        if self.row_batch_size == 0 {
            return Err(AppError::InvalidConfig(
                "row_batch_size must be at least 1".to_string(),
            ));
        }
        if !(self.correlation_score_cap.is_finite() && self.correlation_score_cap > 0.0) {
            return Err(AppError::InvalidConfig(format!(
                "correlation_score_cap must be a positive number, got {}",
                self.correlation_score_cap
            )));
        }
        Ok(())
    }
}

/// Whole-application configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Load and validate a configuration file.
pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: AppConfig =
        serde_yaml::from_str(&content).map_err(|e| AppError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    config.service.validate()?;
    Ok(config)
}

/// Save configuration to a YAML file.
pub fn save_config(path: &Path, config: &AppConfig) -> AppResult<()> {
    let content = serde_yaml::to_string(config).map_err(|e| AppError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    std::fs::write(path, content).map_err(|e| AppError::ConfigWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
