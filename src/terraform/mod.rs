//! Terraform driver
//!
//! Wraps the `terraform` CLI: `init`, `apply`, `output` and `destroy`, each run
//! as a blocking child process through a [`CommandRunner`]. Async callers go
//! through [`Deployment`], which moves the commands onto tokio's blocking pool. Failed commands are
//! retried only when their output matches one of the configured retryable
//! error patterns.
//!
//! # Example
//!
//! ```no_run
//! use tfprobe::terraform::{Terraform, TerraformOptions};
//!
//! # fn example() -> Result<(), tfprobe::terraform::TerraformError> {
//! let options = TerraformOptions::new("infra")
//!     .var("region", "us-east-1")
//!     .with_default_retryable_errors();
//!
//! let terraform = Terraform::system();
//! terraform.init_and_apply(&options)?;
//! let bucket_id = terraform.output(&options, "bucket_id")?;
//! println!("{}", bucket_id);
//! terraform.destroy(&options)?;
//! # Ok(())
//! # }
//! ```

mod deployment;
mod options;
mod runner;

pub use deployment::Deployment;
pub use options::{default_retryable_errors, TerraformOptions};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Terraform errors
#[derive(Error, Debug)]
pub enum TerraformError {
    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed with exit code {exit_code:?} after {attempts} attempt(s): {stderr}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        attempts: u32,
        stderr: String,
    },

    #[error("Output '{0}' not found")]
    OutputNotFound(String),

    #[error("Output '{key}' is not valid JSON: {source}")]
    OutputDecode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid retryable error pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Terraform task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Runs terraform commands against a module
#[derive(Clone)]
pub struct Terraform {
    runner: Arc<dyn CommandRunner>,
}

impl Terraform {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Terraform backed by real child processes
    pub fn system() -> Self {
        Self::new(Arc::new(SystemRunner))
    }

    /// Run `terraform init`
    #[tracing::instrument(name = "terraform.init", skip(self, options), fields(dir = %options.dir.display()), err)]
    pub fn init(&self, options: &TerraformOptions) -> Result<String, TerraformError> {
        let mut args = vec!["init".to_string(), "-upgrade=false".to_string()];
        args.push("-input=false".to_string());
        if options.no_color {
            args.push("-no-color".to_string());
        }
        self.run_with_retry(options, args)
    }

    /// Run `terraform apply` with the option variables
    #[tracing::instrument(name = "terraform.apply", skip(self, options), fields(dir = %options.dir.display()), err)]
    pub fn apply(&self, options: &TerraformOptions) -> Result<String, TerraformError> {
        let mut args = vec![
            "apply".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ];
        if options.no_color {
            args.push("-no-color".to_string());
        }
        args.extend(options.var_args());
        args.push("-lock=false".to_string());
        self.run_with_retry(options, args)
    }

    /// Run `init` followed by `apply`
    pub fn init_and_apply(&self, options: &TerraformOptions) -> Result<String, TerraformError> {
        self.init(options)?;
        self.apply(options)
    }

    /// Read a single output and return it as a plain string
    ///
    /// String outputs are returned unquoted, other JSON values in their
    /// textual JSON form.
    #[tracing::instrument(name = "terraform.output", skip(self, options), err)]
    pub fn output(&self, options: &TerraformOptions, key: &str) -> Result<String, TerraformError> {
        let args = vec![
            "output".to_string(),
            "-no-color".to_string(),
            "-json".to_string(),
            key.to_string(),
        ];

        let raw = match self.run_with_retry(options, args) {
            Ok(raw) => raw,
            Err(TerraformError::CommandFailed { stderr, .. }) if is_missing_output(&stderr) => {
                return Err(TerraformError::OutputNotFound(key.to_string()));
            }
            Err(e) => return Err(e),
        };

        let value: Value =
            serde_json::from_str(raw.trim()).map_err(|source| TerraformError::OutputDecode {
                key: key.to_string(),
                source,
            })?;

        match value {
            Value::Null => Err(TerraformError::OutputNotFound(key.to_string())),
            Value::String(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }

    /// Run `terraform destroy` with the option variables
    #[tracing::instrument(name = "terraform.destroy", skip(self, options), fields(dir = %options.dir.display()), err)]
    pub fn destroy(&self, options: &TerraformOptions) -> Result<String, TerraformError> {
        let mut args = vec![
            "destroy".to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
        ];
        if options.no_color {
            args.push("-no-color".to_string());
        }
        args.extend(options.var_args());
        args.push("-lock=false".to_string());
        self.run_with_retry(options, args)
    }

    fn command(&self, options: &TerraformOptions, args: Vec<String>) -> CommandSpec {
        let mut env = options.env.clone();
        env.entry("TF_IN_AUTOMATION".to_string())
            .or_insert_with(|| "1".to_string());
        CommandSpec {
            program: options.binary.clone(),
            args,
            dir: options.dir.clone(),
            env,
        }
    }

    /// Run a command, retrying while the failure matches a retryable pattern.
    /// Returns stdout of the successful attempt.
    fn run_with_retry(
        &self,
        options: &TerraformOptions,
        args: Vec<String>,
    ) -> Result<String, TerraformError> {
        let spec = self.command(options, args);
        let patterns = compile_patterns(options)?;
        let max_attempts = options.max_retries + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::info!(command = %spec, attempt, "Running terraform");

            let output = self.runner.run(&spec).map_err(|source| TerraformError::Spawn {
                command: spec.to_string(),
                source,
            })?;

            if output.is_success() {
                return Ok(output.stdout);
            }

            let combined = output.combined();
            let retryable = patterns
                .iter()
                .find(|(re, _)| re.is_match(&combined))
                .map(|(_, reason)| reason.as_str());

            match retryable {
                Some(reason) if attempt < max_attempts => {
                    tracing::warn!(
                        command = %spec,
                        attempt,
                        reason,
                        "Retryable terraform error, retrying in {:?}",
                        options.time_between_retries
                    );
                    std::thread::sleep(options.time_between_retries);
                }
                _ => {
                    return Err(TerraformError::CommandFailed {
                        command: spec.to_string(),
                        exit_code: output.exit_code,
                        attempts: attempt,
                        stderr: output.stderr.trim().to_string(),
                    });
                }
            }
        }
    }
}

fn compile_patterns(
    options: &TerraformOptions,
) -> Result<Vec<(regex_lite::Regex, String)>, TerraformError> {
    options
        .retryable_errors
        .iter()
        .map(|(pattern, reason)| {
            regex_lite::Regex::new(pattern)
                .map(|re| (re, reason.clone()))
                .map_err(|e| TerraformError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

fn is_missing_output(stderr: &str) -> bool {
    stderr.contains("not found") || stderr.contains("could not be found")
}

#[cfg(test)]
mod tests {
    use super::runner::MockCommandRunner;
    use super::*;
    use mockall::predicate::function;
    use mockall::Sequence;

    fn options() -> TerraformOptions {
        TerraformOptions::new("infra").var("region", "eu-west-1")
    }

    #[test]
    fn test_apply_builds_expected_command() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(function(|spec: &CommandSpec| {
                spec.program == "terraform"
                    && spec.args
                        == vec![
                            "apply",
                            "-input=false",
                            "-auto-approve",
                            "-no-color",
                            "-var",
                            "region=eu-west-1",
                            "-lock=false",
                        ]
                    && spec.env.get("TF_IN_AUTOMATION").map(String::as_str) == Some("1")
            }))
            .times(1)
            .returning(|_| Ok(CommandOutput::success("Apply complete!")));

        let terraform = Terraform::new(Arc::new(runner));
        assert_eq!(terraform.apply(&options()).unwrap(), "Apply complete!");
    }

    #[test]
    fn test_output_unquotes_strings() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_| Ok(CommandOutput::success("\"my-bucket-abc123\"\n")));

        let terraform = Terraform::new(Arc::new(runner));
        let value = terraform.output(&options(), "bucket_id").unwrap();
        assert_eq!(value, "my-bucket-abc123");
    }

    #[test]
    fn test_output_renders_non_strings_as_json() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_| Ok(CommandOutput::success("[\"a\",\"b\"]")));

        let terraform = Terraform::new(Arc::new(runner));
        assert_eq!(terraform.output(&options(), "list").unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_missing_output_is_reported() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|_| {
            Ok(CommandOutput::failure(
                1,
                "Error: Output \"bucket_id\" not found",
            ))
        });

        let terraform = Terraform::new(Arc::new(runner));
        let err = terraform.output(&options(), "bucket_id").unwrap_err();
        assert!(matches!(err, TerraformError::OutputNotFound(key) if key == "bucket_id"));
    }

    #[test]
    fn test_retryable_error_is_retried() {
        let mut runner = MockCommandRunner::new();
        let mut seq = Sequence::new();
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(CommandOutput::failure(
                    1,
                    "Error: Provider produced inconsistent result after apply",
                ))
            });
        runner
            .expect_run()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(CommandOutput::success("ok")));

        let mut options = options();
        options.max_retries = 2;
        options.retryable_errors = default_retryable_errors();

        let terraform = Terraform::new(Arc::new(runner));
        assert_eq!(terraform.apply(&options).unwrap(), "ok");
    }

    #[test]
    fn test_non_retryable_error_fails_immediately() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|_| Ok(CommandOutput::failure(1, "Error: invalid bucket name")));

        let mut options = options();
        options.max_retries = 3;
        options.retryable_errors = default_retryable_errors();

        let terraform = Terraform::new(Arc::new(runner));
        let err = terraform.apply(&options).unwrap_err();
        assert!(matches!(
            err,
            TerraformError::CommandFailed { attempts: 1, exit_code: Some(1), .. }
        ));
    }

    #[test]
    fn test_retries_are_bounded() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(3).returning(|_| {
            Ok(CommandOutput::failure(1, "Error: registry service is unreachable"))
        });

        let mut options = options();
        options.max_retries = 2;
        options.retryable_errors = default_retryable_errors();

        let terraform = Terraform::new(Arc::new(runner));
        let err = terraform.init(&options).unwrap_err();
        assert!(matches!(err, TerraformError::CommandFailed { attempts: 3, .. }));
    }

    #[test]
    fn test_spawn_failure_is_not_retried() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|_| {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no terraform"))
        });

        let mut options = options();
        options.max_retries = 3;

        let terraform = Terraform::new(Arc::new(runner));
        assert!(matches!(
            terraform.init(&options),
            Err(TerraformError::Spawn { .. })
        ));
    }
}
