//! S3 inspection module
//!
//! Reads the configuration of a provisioned bucket through the AWS SDK.
//!
//! # Example
//!
//! ```no_run
//! use tfprobe::config::AwsConfig;
//! use tfprobe::s3::S3Inspector;
//!
//! # async fn example() -> Result<(), tfprobe::s3::InspectError> {
//! let aws = AwsConfig {
//!     endpoint: Some("http://localhost:4566".to_string()),
//!     access_key: Some("test".to_string()),
//!     secret_key: Some("test".to_string()),
//!     ..Default::default()
//! };
//!
//! let inspector = S3Inspector::connect(&aws, "us-east-1").await;
//! let status = inspector.bucket_versioning("my-bucket").await?;
//! println!("Versioning: {}", status);
//! # Ok(())
//! # }
//! ```
//!
//! # Tracing
//!
//! | Operation | Span Name |
//! |-----------|-----------|
//! | GetBucketVersioning | `s3.get_bucket_versioning` |
//! | GetBucketPolicy | `s3.get_bucket_policy` |
//! | GetBucketLogging | `s3.get_bucket_logging` |

mod client;

pub use client::build_client;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use thiserror::Error;

use crate::config::AwsConfig;

/// S3 inspection errors
#[derive(Error, Debug)]
pub enum InspectError {
    #[error("{operation} on bucket '{bucket}' failed: {message}")]
    Sdk {
        operation: &'static str,
        bucket: String,
        message: String,
    },

    #[error("Bucket '{0}' has no policy attached")]
    PolicyMissing(String),

    #[error("Server access logging is not enabled on bucket '{0}'")]
    LoggingNotEnabled(String),
}

impl InspectError {
    pub(crate) fn sdk(
        operation: &'static str,
        bucket: &str,
        err: impl std::error::Error,
    ) -> Self {
        Self::Sdk {
            operation,
            bucket: bucket.to_string(),
            message: DisplayErrorContext(err).to_string(),
        }
    }
}

/// Access logging destination of a bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingTarget {
    pub target_bucket: String,
    pub target_prefix: String,
}

/// Read-only view of bucket configuration
#[derive(Debug, Clone)]
pub struct S3Inspector {
    client: Client,
    region: String,
}

impl S3Inspector {
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Build an SDK client for `region` from the AWS configuration
    pub async fn connect(aws: &AwsConfig, region: &str) -> Self {
        Self::new(build_client(aws, region).await, region)
    }

    /// The underlying SDK client, for direct API calls
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Versioning status (`Enabled`, `Suspended`), or empty if never configured
    #[tracing::instrument(
        name = "s3.get_bucket_versioning",
        skip(self),
        fields(s3.bucket = %bucket, aws.region = %self.region),
        err
    )]
    pub async fn bucket_versioning(&self, bucket: &str) -> Result<String, InspectError> {
        let response = self
            .client
            .get_bucket_versioning()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| InspectError::sdk("GetBucketVersioning", bucket, e))?;

        let status = response
            .status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default();
        tracing::debug!(status = %status, "GetBucketVersioning completed");
        Ok(status)
    }

    /// Policy document attached to the bucket
    #[tracing::instrument(
        name = "s3.get_bucket_policy",
        skip(self),
        fields(s3.bucket = %bucket, aws.region = %self.region),
        err
    )]
    pub async fn bucket_policy(&self, bucket: &str) -> Result<String, InspectError> {
        let response = self
            .client
            .get_bucket_policy()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| InspectError::sdk("GetBucketPolicy", bucket, e))?;

        Ok(response.policy().unwrap_or_default().to_string())
    }

    /// Fail unless the bucket has a non-empty policy
    pub async fn assert_bucket_policy_exists(&self, bucket: &str) -> Result<(), InspectError> {
        let policy = self.bucket_policy(bucket).await?;
        if policy.trim().is_empty() {
            return Err(InspectError::PolicyMissing(bucket.to_string()));
        }
        Ok(())
    }

    /// Where the bucket writes its server access logs
    #[tracing::instrument(
        name = "s3.get_bucket_logging",
        skip(self),
        fields(s3.bucket = %bucket, aws.region = %self.region),
        err
    )]
    pub async fn bucket_logging(&self, bucket: &str) -> Result<LoggingTarget, InspectError> {
        let response = self
            .client
            .get_bucket_logging()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| InspectError::sdk("GetBucketLogging", bucket, e))?;

        let enabled = response
            .logging_enabled()
            .ok_or_else(|| InspectError::LoggingNotEnabled(bucket.to_string()))?;

        Ok(LoggingTarget {
            target_bucket: enabled.target_bucket().to_string(),
            target_prefix: enabled.target_prefix().to_string(),
        })
    }

    pub async fn bucket_logging_target(&self, bucket: &str) -> Result<String, InspectError> {
        Ok(self.bucket_logging(bucket).await?.target_bucket)
    }

    pub async fn bucket_logging_target_prefix(&self, bucket: &str) -> Result<String, InspectError> {
        Ok(self.bucket_logging(bucket).await?.target_prefix)
    }
}
