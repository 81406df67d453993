//! Common test infrastructure
//!
//! - `ScriptedTerraform`: a `CommandRunner` that answers terraform commands
//!   from a script and records every invocation
//! - Mock S3 responses for GetBucketVersioning, GetBucketPolicy and
//!   GetBucketLogging on a wiremock server
//! - Config builders pointing at the mock server

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tfprobe::config::Config;
use tfprobe::scenario::ScenarioInputs;
use tfprobe::terraform::{CommandOutput, CommandRunner, CommandSpec, Terraform};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_BUCKET: &str = "terratest-aws-s3-example-abc123";
pub const TEST_REGION: &str = "us-east-1";

pub const SAMPLE_POLICY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":"*","Action":"s3:GetObject","Resource":"arn:aws:s3:::terratest-aws-s3-example-abc123/*"}]}"#;

/// Terraform stand-in with scripted answers per subcommand
///
/// Subcommands without a scripted answer succeed with empty output, except
/// `output`, which returns the configured bucket id.
pub struct ScriptedTerraform {
    calls: Mutex<Vec<CommandSpec>>,
    script: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    bucket_id: String,
    delay: Duration,
}

impl ScriptedTerraform {
    pub fn new(bucket_id: &str) -> Arc<Self> {
        Self::with_delay(bucket_id, Duration::ZERO)
    }

    /// Like `new`, but every command blocks the calling thread for `delay`
    pub fn with_delay(bucket_id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(HashMap::new()),
            bucket_id: bucket_id.to_string(),
            delay,
        })
    }

    /// Queue an answer for the next call of `subcommand`
    pub fn respond(&self, subcommand: &str, output: CommandOutput) {
        self.script
            .lock()
            .unwrap()
            .entry(subcommand.to_string())
            .or_default()
            .push_back(output);
    }

    pub fn terraform(self: &Arc<Self>) -> Terraform {
        Terraform::new(self.clone())
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Subcommands in invocation order
    pub fn subcommands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.subcommand().map(str::to_string))
            .collect()
    }

    pub fn count(&self, subcommand: &str) -> usize {
        self.subcommands().iter().filter(|s| *s == subcommand).count()
    }
}

impl CommandRunner for ScriptedTerraform {
    fn run(&self, command: &CommandSpec) -> std::io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let subcommand = command.subcommand().unwrap_or_default().to_string();
        if let Some(output) = self
            .script
            .lock()
            .unwrap()
            .get_mut(&subcommand)
            .and_then(VecDeque::pop_front)
        {
            return Ok(output);
        }

        Ok(match subcommand.as_str() {
            "output" => CommandOutput::success(format!("\"{}\"\n", self.bucket_id)),
            _ => CommandOutput::success(""),
        })
    }
}

/// Config whose AWS endpoint is the mock server
pub fn mock_config(endpoint: &str) -> Config {
    let mut config = Config::default();
    config.aws.endpoint = Some(endpoint.to_string());
    config.aws.access_key = Some("test".to_string());
    config.aws.secret_key = Some("test".to_string());
    config.aws.force_path_style = true;
    config.aws.approved_regions = vec![TEST_REGION.to_string()];
    config.terraform.time_between_retries_secs = 0;
    config
}

pub fn test_inputs() -> ScenarioInputs {
    ScenarioInputs {
        bucket_name: TEST_BUCKET.to_string(),
        environment: "Automated Testing".to_string(),
        region: TEST_REGION.to_string(),
        with_policy: true,
    }
}

// ============================================================================
// Mock S3 responses
// ============================================================================

fn xml(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(body)
}

pub async fn mount_versioning(server: &MockServer, bucket: &str, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/", bucket)))
        .and(query_param("versioning", ""))
        .respond_with(xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<VersioningConfiguration xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Status>{}</Status></VersioningConfiguration>"#,
            status
        )))
        .mount(server)
        .await;
}

pub async fn mount_policy(server: &MockServer, bucket: &str, policy: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/", bucket)))
        .and(query_param("policy", ""))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(policy),
        )
        .mount(server)
        .await;
}

pub async fn mount_no_policy(server: &MockServer, bucket: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/", bucket)))
        .and(query_param("policy", ""))
        .respond_with(
            ResponseTemplate::new(404)
                .insert_header("content-type", "application/xml")
                .set_body_string(format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchBucketPolicy</Code><Message>The bucket policy does not exist</Message><BucketName>{}</BucketName><RequestId>test</RequestId></Error>"#,
                    bucket
                )),
        )
        .mount(server)
        .await;
}

pub async fn mount_logging(server: &MockServer, bucket: &str, target: &str, prefix: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/", bucket)))
        .and(query_param("logging", ""))
        .respond_with(xml(format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<BucketLoggingStatus xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><LoggingEnabled><TargetBucket>{}</TargetBucket><TargetPrefix>{}</TargetPrefix></LoggingEnabled></BucketLoggingStatus>"#,
            target, prefix
        )))
        .mount(server)
        .await;
}

pub async fn mount_logging_disabled(server: &MockServer, bucket: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/", bucket)))
        .and(query_param("logging", ""))
        .respond_with(xml(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<BucketLoggingStatus xmlns="http://s3.amazonaws.com/doc/2006-03-01/"/>"#
                .to_string(),
        ))
        .mount(server)
        .await;
}

/// A bucket configured the way the module should configure it
pub async fn mount_healthy_bucket(server: &MockServer, bucket: &str) {
    mount_versioning(server, bucket, "Enabled").await;
    mount_policy(server, bucket, SAMPLE_POLICY).await;
    mount_logging(server, bucket, &format!("{}-logs", bucket), "TFStateLogs/").await;
}
