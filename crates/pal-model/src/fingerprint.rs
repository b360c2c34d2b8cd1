//! Content-based hashing for requests.

use sha2::{Digest, Sha256};

use crate::request::SimRequest;
use crate::ModelResult;

/// Stable SHA-256 digest of a request's canonical JSON form.
pub fn request_fingerprint(request: &SimRequest) -> ModelResult<String> {
    let mut hasher = Sha256::new();
    let request_json = serde_json::to_string(request)?;
    hasher.update(request_json.as_bytes());
    let result = hasher.finalize();
    Ok(format!("{:x}", result))
}
