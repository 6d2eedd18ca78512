use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA-256 of a response body, carried in `X-Signature`.
pub fn sign(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Hex SHA-256 of a body, used as the `ETag` value.
pub fn sha256_hex(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Canonical KV key material: base64url (unpadded) SHA-256 of the item
/// identity. Hashing instead of truncating keeps long URLs collision-free.
pub fn content_key(identity: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(identity.as_bytes()))
}

/// Timing-safe equality for signature checks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
