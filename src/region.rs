//! AWS region selection
//!
//! Tests run in a randomly chosen region so the module is exercised across
//! regions over time. The choice is made once per scenario and the same value
//! is used for both `terraform apply` and the SDK client.

use rand::Rng;
use thiserror::Error;

/// Environment variable that pins the region, bypassing random selection.
pub const REGION_OVERRIDE_ENV: &str = "TFPROBE_REGION";

/// Regions that have been generally available long enough to rely on.
pub const STABLE_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-central-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-south-1",
    "ca-central-1",
    "sa-east-1",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegionError {
    #[error("No region left after applying approved/forbidden filters")]
    NoCandidates,

    #[error("Region '{0}' from TFPROBE_REGION is not an approved, non-forbidden region")]
    OverrideNotAllowed(String),
}

/// Regions eligible for selection.
///
/// `approved` replaces the stable list when non-empty; `forbidden` is then
/// subtracted.
pub fn candidate_regions(approved: &[String], forbidden: &[String]) -> Vec<String> {
    let base: Vec<String> = if approved.is_empty() {
        STABLE_REGIONS.iter().map(|r| r.to_string()).collect()
    } else {
        approved.to_vec()
    };

    base.into_iter()
        .filter(|region| !forbidden.contains(region))
        .collect()
}

/// Pick a region, honouring [`REGION_OVERRIDE_ENV`] when set.
///
/// The override must itself be one of the candidate regions.
pub fn random_stable_region(
    approved: &[String],
    forbidden: &[String],
) -> Result<String, RegionError> {
    let candidates = candidate_regions(approved, forbidden);

    if let Ok(region) = std::env::var(REGION_OVERRIDE_ENV) {
        let region = region.trim();
        if !region.is_empty() {
            if !candidates.iter().any(|c| c == region) {
                return Err(RegionError::OverrideNotAllowed(region.to_string()));
            }
            tracing::info!(region = %region, "Using region from {}", REGION_OVERRIDE_ENV);
            return Ok(region.to_string());
        }
    }

    if candidates.is_empty() {
        return Err(RegionError::NoCandidates);
    }

    let index = rand::rng().random_range(0..candidates.len());
    let region = candidates[index].clone();
    tracing::info!(region = %region, candidates = candidates.len(), "Selected region");
    Ok(region)
}
