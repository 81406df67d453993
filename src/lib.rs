//! tfprobe Library
//!
//! Provisions an S3 bucket from a Terraform module, checks what was built,
//! and tears it down again.
//!
//! # Features
//!
//! - **Terraform driver**: `init`/`apply`/`output`/`destroy` with retryable error handling
//! - **Guaranteed teardown**: `Deployment` destroys on drop, even when a test panics
//! - **Bucket checks**: versioning, policy and access logging via the AWS SDK
//! - **LocalStack ready**: custom endpoint and path-style addressing
//!
//! # Example
//!
//! ```no_run
//! use tfprobe::{config::Config, scenario::{BucketScenario, VerifyStrategy}};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("tfprobe.yaml")?;
//!     let report = BucketScenario::new(config).run(VerifyStrategy::Helper).await?;
//!     println!("{} passed {} checks", report.bucket_id, report.checks.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod random;
pub mod region;
pub mod s3;
pub mod scenario;
pub mod terraform;
pub mod verify;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use scenario::{BucketScenario, VerifyStrategy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
