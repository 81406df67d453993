//! Random identifiers for test resources

use rand::Rng;

const BASE62_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const UNIQUE_ID_LENGTH: usize = 6;

/// Generate a short id that is unlikely to collide between concurrent runs.
///
/// Six base-62 characters give roughly 56 billion combinations. The result is
/// mixed case; lowercase it before using it in an S3 bucket name.
pub fn unique_id() -> String {
    let mut rng = rand::rng();
    (0..UNIQUE_ID_LENGTH)
        .map(|_| BASE62_CHARS[rng.random_range(0..BASE62_CHARS.len())] as char)
        .collect()
}

/// Build a lowercase resource name of the form `<prefix>-<unique id>`.
pub fn resource_name(prefix: &str) -> String {
    format!("{}-{}", prefix, unique_id().to_lowercase())
}
