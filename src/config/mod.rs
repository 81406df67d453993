//! Configuration module for tfprobe
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

use crate::region;
use crate::terraform::default_retryable_errors;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("static regex");
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let var_name = &cap[1];

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);

    result
}

// ============================================================================
// Validation Helpers
// ============================================================================

fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
///
/// Every section has defaults, so an empty document is a valid
/// configuration that targets real AWS with the module in `./infra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub terraform: TerraformConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub expect: ExpectConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.terraform.binary.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "terraform.binary cannot be empty".into(),
            ));
        }

        if self.terraform.max_retries > MAX_RETRIES_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "terraform.max_retries {} exceeds limit of {}",
                self.terraform.max_retries, MAX_RETRIES_LIMIT
            )));
        }

        for pattern in self.terraform.retryable_errors.keys() {
            if let Err(e) = regex_lite::Regex::new(pattern) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid retryable error pattern '{}': {}",
                    pattern, e
                )));
            }
        }

        if let Some(ref endpoint) = self.aws.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(
                    "Invalid aws.endpoint: must start with http:// or https://".into(),
                ));
            }
        }

        if self.aws.access_key.is_some() != self.aws.secret_key.is_some() {
            return Err(ConfigError::ValidationError(
                "aws.access_key and aws.secret_key must be set together".into(),
            ));
        }

        if region::candidate_regions(&self.aws.approved_regions, &self.aws.forbidden_regions)
            .is_empty()
        {
            return Err(ConfigError::ValidationError(
                "Region filters leave no region to test in".into(),
            ));
        }

        if self.scenario.name_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "scenario.name_prefix cannot be empty".into(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level '{}': must be one of trace, debug, info, warn, error",
                    other
                )))
            }
        }

        Ok(())
    }
}

const MAX_RETRIES_LIMIT: u32 = 20;

/// Terraform invocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformConfig {
    /// Terraform (or OpenTofu) executable. Default: "terraform"
    #[serde(default = "default_terraform_binary")]
    pub binary: String,

    /// Module directory to apply. Default: "infra"
    #[serde(default = "default_terraform_dir")]
    pub dir: PathBuf,

    /// Retries for errors matching `retryable_errors`. Default: 3
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between retries in seconds. Default: 5
    #[serde(default = "default_time_between_retries")]
    pub time_between_retries_secs: u64,

    /// Regex pattern -> human readable reason
    #[serde(default = "default_retryable_errors")]
    pub retryable_errors: BTreeMap<String, String>,

    /// Extra environment variables for every terraform command
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl TerraformConfig {
    pub fn time_between_retries(&self) -> Duration {
        Duration::from_secs(self.time_between_retries_secs)
    }
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: default_terraform_binary(),
            dir: default_terraform_dir(),
            max_retries: default_max_retries(),
            time_between_retries_secs: default_time_between_retries(),
            retryable_errors: default_retryable_errors(),
            env: BTreeMap::new(),
        }
    }
}

fn default_terraform_binary() -> String {
    "terraform".to_string()
}

fn default_terraform_dir() -> PathBuf {
    PathBuf::from("infra")
}

fn default_max_retries() -> u32 {
    3
}

fn default_time_between_retries() -> u64 {
    5
}

/// AWS access configuration
///
/// # Example
///
/// ```yaml
/// aws:
///   endpoint: "${LOCALSTACK_ENDPOINT:-http://localhost:4566}"
///   force_path_style: true
///   access_key: "test"
///   secret_key: "test"
///   approved_regions: ["us-east-1", "eu-west-1"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// Regions to choose from. Empty means the stable region list.
    #[serde(default)]
    pub approved_regions: Vec<String>,
    #[serde(default)]
    pub forbidden_regions: Vec<String>,
    /// Custom S3 endpoint, e.g. LocalStack
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            approved_regions: Vec::new(),
            forbidden_regions: Vec::new(),
            endpoint: None,
            force_path_style: default_force_path_style(),
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_force_path_style() -> bool {
    true
}

/// Inputs handed to the Terraform module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_with_policy")]
    pub with_policy: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            environment: default_environment(),
            with_policy: default_with_policy(),
        }
    }
}

fn default_name_prefix() -> String {
    "terratest-aws-s3-example".to_string()
}

fn default_environment() -> String {
    "Automated Testing".to_string()
}

fn default_with_policy() -> bool {
    true
}

/// Expected bucket properties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectConfig {
    #[serde(default = "default_versioning_status")]
    pub versioning_status: String,
    #[serde(default = "default_require_policy")]
    pub require_policy: bool,
    /// Appended to the bucket id to form the logging target bucket
    #[serde(default = "default_logging_target_suffix")]
    pub logging_target_suffix: String,
    #[serde(default = "default_logging_prefix")]
    pub logging_prefix: String,
}

impl ExpectConfig {
    pub fn logging_target_for(&self, bucket_id: &str) -> String {
        format!("{}{}", bucket_id, self.logging_target_suffix)
    }
}

impl Default for ExpectConfig {
    fn default() -> Self {
        Self {
            versioning_status: default_versioning_status(),
            require_policy: default_require_policy(),
            logging_target_suffix: default_logging_target_suffix(),
            logging_prefix: default_logging_prefix(),
        }
    }
}

fn default_versioning_status() -> String {
    "Enabled".to_string()
}

fn default_require_policy() -> bool {
    true
}

fn default_logging_target_suffix() -> String {
    "-logs".to_string()
}

fn default_logging_prefix() -> String {
    "TFStateLogs/".to_string()
}

/// Console logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback level when RUST_LOG is unset. Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
