//! Crate-level error type

use thiserror::Error;

use crate::config::ConfigError;
use crate::region::RegionError;
use crate::s3::InspectError;
use crate::terraform::TerraformError;
use crate::verify::VerificationError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Region(#[from] RegionError),

    #[error("Provisioning failed: {0}")]
    Terraform(#[from] TerraformError),

    #[error("Bucket inspection failed: {0}")]
    Inspect(#[from] InspectError),

    #[error("Verification failed: {0}")]
    Verification(#[from] VerificationError),

    #[error("Teardown failed: {0}")]
    Teardown(#[source] TerraformError),
}

pub type Result<T> = std::result::Result<T, Error>;
