//! SDK client construction

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;

use crate::config::AwsConfig;

/// Build an S3 client pinned to `region`.
///
/// Static credentials and a custom endpoint (LocalStack, MinIO) are applied
/// when configured; otherwise the default AWS credential chain is used.
pub async fn build_client(aws: &AwsConfig, region: &str) -> Client {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

    if let (Some(access_key), Some(secret_key)) = (&aws.access_key, &aws.secret_key) {
        loader = loader.credentials_provider(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "tfprobe-config",
        ));
    }

    if let Some(ref endpoint) = aws.endpoint {
        tracing::debug!(endpoint = %endpoint, "Using custom S3 endpoint");
        loader = loader.endpoint_url(endpoint.clone());
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(aws.force_path_style)
        .build();

    Client::from_conf(s3_config)
}
