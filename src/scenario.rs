//! Provision-and-verify scenario for the S3 bucket module
//!
//! One run is the fixed sequence
//!
//! ```text
//! provision -> read output -> verify -> teardown
//! ```
//!
//! Provisioning and output failures abort the run. Property mismatches are
//! collected and reported together. Teardown always runs: explicitly at the
//! end of [`BucketScenario::run`], and through the [`Deployment`] guard if the
//! run is unwound by a panic.

use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::random;
use crate::region;
use crate::s3::{InspectError, S3Inspector};
use crate::terraform::{Deployment, Terraform, TerraformOptions};
use crate::verify::{Check, Verification};

/// Terraform output holding the bucket name
pub const BUCKET_ID_OUTPUT: &str = "bucket_id";

/// How bucket properties are read back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStrategy {
    /// Through the `S3Inspector` helper methods
    Helper,
    /// Through direct SDK client calls
    Client,
}

impl fmt::Display for VerifyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyStrategy::Helper => write!(f, "helper"),
            VerifyStrategy::Client => write!(f, "client"),
        }
    }
}

impl FromStr for VerifyStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "helper" => Ok(VerifyStrategy::Helper),
            "client" => Ok(VerifyStrategy::Client),
            other => Err(format!(
                "unknown strategy '{}': must be 'helper' or 'client'",
                other
            )),
        }
    }
}

/// Values generated for one run and handed to the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioInputs {
    pub bucket_name: String,
    pub environment: String,
    pub region: String,
    pub with_policy: bool,
}

/// What a successful run observed
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    pub inputs: ScenarioInputs,
    pub bucket_id: String,
    pub strategy: VerifyStrategy,
    pub checks: Vec<Check>,
}

pub struct BucketScenario {
    config: Config,
    terraform: Terraform,
}

impl BucketScenario {
    pub fn new(config: Config) -> Self {
        Self::with_terraform(config, Terraform::system())
    }

    pub fn with_terraform(config: Config, terraform: Terraform) -> Self {
        Self { config, terraform }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generate a unique bucket name and pick the region
    pub fn prepare(&self) -> Result<ScenarioInputs> {
        let region = region::random_stable_region(
            &self.config.aws.approved_regions,
            &self.config.aws.forbidden_regions,
        )?;

        Ok(ScenarioInputs {
            bucket_name: random::resource_name(&self.config.scenario.name_prefix),
            environment: self.config.scenario.environment.clone(),
            region,
            with_policy: self.config.scenario.with_policy,
        })
    }

    /// Terraform options carrying the module variables for `inputs`
    pub fn options(&self, inputs: &ScenarioInputs) -> TerraformOptions {
        let mut options = TerraformOptions::from_config(&self.config.terraform)
            .var("tag_bucket_name", inputs.bucket_name.as_str())
            .var("tag_bucket_environment", inputs.environment.as_str())
            .var("with_policy", inputs.with_policy.to_string())
            .var("region", inputs.region.as_str());

        if let Some(ref endpoint) = self.config.aws.endpoint {
            options = options.var("aws_endpoint", endpoint.as_str());
        }
        options
    }

    /// Run the whole sequence with freshly generated inputs
    pub async fn run(&self, strategy: VerifyStrategy) -> Result<ScenarioReport> {
        let inputs = self.prepare()?;
        self.run_with_inputs(inputs, strategy).await
    }

    #[tracing::instrument(
        name = "scenario.run",
        skip(self, inputs),
        fields(bucket = %inputs.bucket_name, region = %inputs.region, strategy = %strategy)
    )]
    pub async fn run_with_inputs(
        &self,
        inputs: ScenarioInputs,
        strategy: VerifyStrategy,
    ) -> Result<ScenarioReport> {
        let deployment = Deployment::new(self.terraform.clone(), self.options(&inputs));

        let outcome = self.provision_and_verify(&deployment, &inputs, strategy).await;
        let teardown = deployment.teardown().await;

        match (outcome, teardown) {
            (Ok(report), Ok(())) => {
                tracing::info!(bucket_id = %report.bucket_id, "Scenario passed");
                Ok(report)
            }
            (Ok(_), Err(e)) => Err(Error::Teardown(e)),
            (Err(e), teardown) => {
                if let Err(teardown_err) = teardown {
                    tracing::error!(error = %teardown_err, "Teardown failed after scenario error");
                }
                Err(e)
            }
        }
    }

    async fn provision_and_verify(
        &self,
        deployment: &Deployment,
        inputs: &ScenarioInputs,
        strategy: VerifyStrategy,
    ) -> Result<ScenarioReport> {
        deployment.provision().await?;
        let bucket_id = deployment.read_output(BUCKET_ID_OUTPUT).await?;
        tracing::info!(bucket_id = %bucket_id, "Provisioned bucket");

        let inspector = S3Inspector::connect(&self.config.aws, &inputs.region).await;
        let verification = match strategy {
            VerifyStrategy::Helper => self.verify_with_helper(&inspector, &bucket_id).await?,
            VerifyStrategy::Client => self.verify_with_client(&inspector, &bucket_id).await?,
        };

        let checks = verification.finish()?;
        Ok(ScenarioReport {
            inputs: inputs.clone(),
            bucket_id,
            strategy,
            checks,
        })
    }

    async fn verify_with_helper(
        &self,
        inspector: &S3Inspector,
        bucket_id: &str,
    ) -> Result<Verification> {
        let expect = &self.config.expect;
        let mut verification = Verification::new();

        let status = inspector.bucket_versioning(bucket_id).await?;
        verification.equal("versioning status", &expect.versioning_status, status);

        if expect.require_policy {
            match inspector.assert_bucket_policy_exists(bucket_id).await {
                Ok(()) => verification.present("bucket policy", true),
                Err(InspectError::PolicyMissing(_)) => verification.present("bucket policy", false),
                Err(e) => return Err(e.into()),
            };
        }

        let target = inspector.bucket_logging_target(bucket_id).await?;
        let prefix = inspector.bucket_logging_target_prefix(bucket_id).await?;
        verification.equal(
            "logging target bucket",
            expect.logging_target_for(bucket_id),
            target,
        );
        verification.equal("logging target prefix", &expect.logging_prefix, prefix);

        Ok(verification)
    }

    async fn verify_with_client(
        &self,
        inspector: &S3Inspector,
        bucket_id: &str,
    ) -> Result<Verification> {
        let expect = &self.config.expect;
        let client = inspector.client();
        let mut verification = Verification::new();

        let versioning = client
            .get_bucket_versioning()
            .bucket(bucket_id)
            .send()
            .await
            .map_err(|e| InspectError::sdk("GetBucketVersioning", bucket_id, e))?;
        verification.equal(
            "versioning status",
            &expect.versioning_status,
            versioning.status().map(|s| s.as_str()).unwrap_or_default(),
        );

        if expect.require_policy {
            let policy = client
                .get_bucket_policy()
                .bucket(bucket_id)
                .send()
                .await
                .map_err(|e| InspectError::sdk("GetBucketPolicy", bucket_id, e))?;
            verification.not_empty("bucket policy", policy.policy().unwrap_or_default());
        }

        let logging = client
            .get_bucket_logging()
            .bucket(bucket_id)
            .send()
            .await
            .map_err(|e| InspectError::sdk("GetBucketLogging", bucket_id, e))?;
        let enabled = logging
            .logging_enabled()
            .ok_or_else(|| InspectError::LoggingNotEnabled(bucket_id.to_string()))?;
        verification.equal(
            "logging target bucket",
            expect.logging_target_for(bucket_id),
            enabled.target_bucket(),
        );
        verification.equal(
            "logging target prefix",
            &expect.logging_prefix,
            enabled.target_prefix(),
        );

        Ok(verification)
    }
}
