/// Payload digests for persisted cache entries
use sha2::{Digest, Sha256};

pub fn payload_digest(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    let result = hasher.finalize();
    format!("{:x}", result)
}
