//! Webhook payload signing.
//!
//! Notifications are authenticated with an HMAC-SHA256 digest over the
//! exact serialized payload bytes, hex-encoded into the
//! `X-Webhook-Signature` header. The receiver recomputes the digest over
//! the body it received; any altered byte changes the signature.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the HMAC-SHA256 signature for a webhook payload.
///
/// The `secret` is the shared signing secret; `payload` is the exact JSON
/// body being delivered. Returns the hex-encoded signature string.
pub fn sign_payload(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}
