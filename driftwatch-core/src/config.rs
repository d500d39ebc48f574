//! Configuration for drift calculators and the `driftwatch` command line.
//!
//! Calculator configs are plain serde structs validated at construction time.
//! [`DriftwatchConfig`] is the file-level configuration, loaded with `figment`:
//! defaults -> user config file -> workspace config file -> environment -> overrides.
//! Files are read from `~/.config/driftwatch/config.toml` and/or
//! `.driftwatch/config.toml` in the workspace directory.

use crate::algorithms::pca::NComponents;
use crate::chunk::{ChunkPeriod, ChunkingPolicy};
use crate::error::DriftError;
use crate::features::imputer::ImputeStrategy;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Mutually exclusive chunking settings shared by every calculator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_number: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_period: Option<ChunkPeriod>,
}

impl ChunkingConfig {
    pub fn policy(&self) -> Result<ChunkingPolicy, DriftError> {
        ChunkingPolicy::from_options(self.chunk_size, self.chunk_number, self.chunk_period)
    }
}

/// Construction parameters of the data reconstruction drift calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorConfig {
    /// Features used to compute the aggregate reconstruction error.
    pub feature_column_names: Vec<String>,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column_name: String,
    /// Components kept by the reduction model (count, variance fraction or `"mle"`).
    #[serde(default)]
    pub n_components: NComponents,
    #[serde(flatten)]
    pub chunking: ChunkingConfig,
    /// Defaults to `most_frequent`; only `most_frequent` and `constant` are accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imputer_categorical: Option<ImputeStrategy>,
    /// Defaults to `mean`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imputer_continuous: Option<ImputeStrategy>,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            feature_column_names: Vec::new(),
            timestamp_column_name: default_timestamp_column(),
            n_components: NComponents::default(),
            chunking: ChunkingConfig::default(),
            imputer_categorical: None,
            imputer_continuous: None,
        }
    }
}

impl CalculatorConfig {
    pub fn new(feature_column_names: Vec<String>, timestamp_column_name: impl Into<String>) -> Self {
        Self {
            feature_column_names,
            timestamp_column_name: timestamp_column_name.into(),
            ..Self::default()
        }
    }

    /// Check every setting that does not depend on data and resolve the chunking policy.
    pub fn validate(&self) -> Result<ChunkingPolicy, DriftError> {
        validate_columns(&self.feature_column_names, &self.timestamp_column_name)?;
        self.n_components.validate()?;
        self.chunking.policy()
    }
}

/// Construction parameters of the univariate statistical drift calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnivariateConfig {
    pub feature_column_names: Vec<String>,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column_name: String,
    #[serde(flatten)]
    pub chunking: ChunkingConfig,
}

impl UnivariateConfig {
    pub fn new(feature_column_names: Vec<String>, timestamp_column_name: impl Into<String>) -> Self {
        Self {
            feature_column_names,
            timestamp_column_name: timestamp_column_name.into(),
            chunking: ChunkingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<ChunkingPolicy, DriftError> {
        validate_columns(&self.feature_column_names, &self.timestamp_column_name)?;
        self.chunking.policy()
    }
}

/// Construction parameters of the target distribution calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub target_column_name: String,
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column_name: String,
    #[serde(flatten)]
    pub chunking: ChunkingConfig,
}

impl TargetConfig {
    pub fn new(target_column_name: impl Into<String>, timestamp_column_name: impl Into<String>) -> Self {
        Self {
            target_column_name: target_column_name.into(),
            timestamp_column_name: timestamp_column_name.into(),
            chunking: ChunkingConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<ChunkingPolicy, DriftError> {
        if self.target_column_name.trim().is_empty() {
            return Err(DriftError::config("target_column_name must not be empty"));
        }
        if self.timestamp_column_name.trim().is_empty() {
            return Err(DriftError::config("timestamp_column_name must not be empty"));
        }
        self.chunking.policy()
    }
}

fn validate_columns(features: &[String], timestamp: &str) -> Result<(), DriftError> {
    if features.is_empty() {
        return Err(DriftError::config("feature_column_names must not be empty"));
    }
    if let Some(blank) = features.iter().position(|f| f.trim().is_empty()) {
        return Err(DriftError::config(format!(
            "feature_column_names contains an empty name at position {blank}"
        )));
    }
    if timestamp.trim().is_empty() {
        return Err(DriftError::config("timestamp_column_name must not be empty"));
    }
    Ok(())
}

fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

// --- File-level configuration ---

/// Top-level configuration for the `driftwatch` binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriftwatchConfig {
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub reconstruction: ReconstructionSettings,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Column roles in the monitored data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnsConfig {
    /// Feature columns. Empty means "every column except timestamp, target and period".
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            timestamp: default_timestamp_column(),
            target: None,
        }
    }
}

/// Settings specific to the data reconstruction calculator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionSettings {
    #[serde(default)]
    pub n_components: NComponents,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imputer_categorical: Option<ImputeStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imputer_continuous: Option<ImputeStrategy>,
}

/// How results are printed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl DriftwatchConfig {
    /// Reconstruction calculator config using `features` for the feature list.
    pub fn calculator_config(&self, features: Vec<String>) -> CalculatorConfig {
        CalculatorConfig {
            feature_column_names: features,
            timestamp_column_name: self.columns.timestamp.clone(),
            n_components: self.reconstruction.n_components,
            chunking: self.chunking.clone(),
            imputer_categorical: self.reconstruction.imputer_categorical.clone(),
            imputer_continuous: self.reconstruction.imputer_continuous.clone(),
        }
    }

    pub fn univariate_config(&self, features: Vec<String>) -> UnivariateConfig {
        UnivariateConfig {
            feature_column_names: features,
            timestamp_column_name: self.columns.timestamp.clone(),
            chunking: self.chunking.clone(),
        }
    }

    pub fn target_config(&self, target: impl Into<String>) -> TargetConfig {
        TargetConfig {
            target_column_name: target.into(),
            timestamp_column_name: self.columns.timestamp.clone(),
            chunking: self.chunking.clone(),
        }
    }
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".driftwatch").join("config.toml")
}

/// Path of the user-level config file, if a home directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "driftwatch", "driftwatch")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration with layered sources.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&DriftwatchConfig>,
) -> Result<DriftwatchConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(DriftwatchConfig::default()));

    // User-level config
    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (DRIFTWATCH_COLUMNS__TIMESTAMP, DRIFTWATCH_CHUNKING__CHUNK_SIZE, etc.)
    figment = figment.merge(Env::prefixed("DRIFTWATCH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
