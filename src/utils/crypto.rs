use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::config::SignatureAlgorithm;

pub fn calculate_sha1(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn calculate_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Signs API parameters the way Cloudinary expects: `k=v` pairs sorted by
/// key, joined with `&`, followed by the secret, hex digested.
pub fn sign_params(
    params: &BTreeMap<&str, String>,
    api_secret: &str,
    algorithm: SignatureAlgorithm,
) -> String {
    let mut to_sign = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");
    to_sign.push_str(api_secret);

    match algorithm {
        SignatureAlgorithm::Sha1 => calculate_sha1(to_sign.as_bytes()),
        SignatureAlgorithm::Sha256 => calculate_sha256(to_sign.as_bytes()),
    }
}
