//! Terraform invocation options

use crate::config::TerraformConfig;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that usually disappear on a second attempt.
///
/// Keys are regular expressions matched against the combined stdout and
/// stderr of a failed command; values explain the match in log output.
pub fn default_retryable_errors() -> BTreeMap<String, String> {
    let transient_plugin = "Failed to retrieve plugin due to transient network error.";
    [
        (".*read: connection reset by peer.*", "Failed to reach remote repository."),
        (".*transport is closing.*", "Failed to reach remote API."),
        (".*unable to verify signature.*", transient_plugin),
        (".*unable to verify checksum.*", transient_plugin),
        (".*no provider exists with the given name.*", transient_plugin),
        (".*registry service is unreachable.*", transient_plugin),
        (".*Error installing provider.*", transient_plugin),
        (".*Failed to query available provider packages.*", transient_plugin),
        (".*timeout while waiting for plugin to start.*", transient_plugin),
        (".*timed out waiting for server handshake.*", transient_plugin),
        ("could not query provider registry for", transient_plugin),
        (
            "Provider produced inconsistent result after apply",
            "Provider eventual consistency error.",
        ),
    ]
    .into_iter()
    .map(|(pattern, reason)| (pattern.to_string(), reason.to_string()))
    .collect()
}

/// Everything needed to run terraform against one module
#[derive(Debug, Clone)]
pub struct TerraformOptions {
    pub binary: String,
    pub dir: PathBuf,
    /// Passed as `-var key=value`, in key order
    pub vars: BTreeMap<String, Value>,
    pub env: BTreeMap<String, String>,
    pub retryable_errors: BTreeMap<String, String>,
    pub max_retries: u32,
    pub time_between_retries: Duration,
    pub no_color: bool,
}

impl TerraformOptions {
    /// Options for `dir` with no variables and no retries
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            binary: "terraform".to_string(),
            dir: dir.as_ref().to_path_buf(),
            vars: BTreeMap::new(),
            env: BTreeMap::new(),
            retryable_errors: BTreeMap::new(),
            max_retries: 0,
            time_between_retries: Duration::ZERO,
            no_color: true,
        }
    }

    pub fn from_config(config: &TerraformConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            dir: config.dir.clone(),
            vars: BTreeMap::new(),
            env: config.env.clone(),
            retryable_errors: config.retryable_errors.clone(),
            max_retries: config.max_retries,
            time_between_retries: config.time_between_retries(),
            no_color: true,
        }
    }

    /// Fill in the standard retry policy where none is configured
    pub fn with_default_retryable_errors(mut self) -> Self {
        if self.retryable_errors.is_empty() {
            self.retryable_errors = default_retryable_errors();
        }
        if self.max_retries == 0 {
            self.max_retries = 3;
        }
        if self.time_between_retries.is_zero() {
            self.time_between_retries = Duration::from_secs(5);
        }
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// `-var` arguments in a stable order
    pub(crate) fn var_args(&self) -> Vec<String> {
        self.vars
            .iter()
            .flat_map(|(key, value)| ["-var".to_string(), format!("{}={}", key, format_var(value))])
            .collect()
    }
}

/// Render a variable the way terraform parses `-var` values.
///
/// Strings are passed raw; lists and maps are valid HCL when written as JSON.
fn format_var(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_var_args_are_sorted_and_formatted() {
        let options = TerraformOptions::new("infra")
            .var("region", "us-east-1")
            .var("with_policy", true)
            .var("count", 2)
            .var("zones", json!(["a", "b"]));

        assert_eq!(
            options.var_args(),
            vec![
                "-var",
                "count=2",
                "-var",
                "region=us-east-1",
                "-var",
                "with_policy=true",
                "-var",
                r#"zones=["a","b"]"#,
            ]
        );
    }

    #[test]
    fn test_with_default_retryable_errors_fills_gaps() {
        let options = TerraformOptions::new("infra").with_default_retryable_errors();
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.time_between_retries, Duration::from_secs(5));
        assert!(options
            .retryable_errors
            .contains_key("Provider produced inconsistent result after apply"));
    }

    #[test]
    fn test_with_default_retryable_errors_keeps_explicit_values() {
        let mut options = TerraformOptions::new("infra");
        options.max_retries = 1;
        options.retryable_errors.insert("boom".into(), "flaky".into());
        let options = options.with_default_retryable_errors();
        assert_eq!(options.max_retries, 1);
        assert_eq!(options.retryable_errors.len(), 1);
    }

    #[test]
    fn test_default_patterns_compile() {
        for pattern in default_retryable_errors().keys() {
            assert!(regex_lite::Regex::new(pattern).is_ok(), "{}", pattern);
        }
    }
}
