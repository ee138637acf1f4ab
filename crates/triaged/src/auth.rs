//! Trust boundary checks.
//!
//! Three structurally distinct boundaries that must never collapse into
//! one: the inbound webhook secret, the async-task provider's delivery
//! signature, and the internal bearer secret on operator endpoints. A
//! forged job payload must never be accepted as an authenticated webhook.
//!
//! Signatures are always computed over the exact raw body bytes;
//! normalization runs only after authentication succeeds.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify the inbound webhook boundary.
///
/// No configured secret means unauthenticated mode for local/dev: always
/// pass. With a secret, the header must carry either
/// `sha256=<hex(HMAC-SHA256(secret, raw_body))>` or the secret itself
/// (optionally as `Bearer <secret>`).
pub fn verify_webhook(header: Option<&str>, raw_body: &[u8], secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(header) = header else {
        return false;
    };

    if let Some(hex_sig) = header.strip_prefix("sha256=") {
        return verify_hmac_hex(secret, raw_body, hex_sig);
    }

    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    constant_time_eq(token.as_bytes(), secret.as_bytes())
}

/// Verify the async-task provider's delivery signature. Always HMAC; a
/// plain token is not accepted on this boundary.
pub fn verify_queue_signature(header: Option<&str>, raw_body: &[u8], secret: &str) -> bool {
    let Some(header) = header else {
        return false;
    };
    let Some(hex_sig) = header.strip_prefix("sha256=") else {
        return false;
    };
    verify_hmac_hex(secret, raw_body, hex_sig)
}

/// Sign a job body for the async-task provider.
pub fn sign_queue_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify the internal bearer secret on operator endpoints. Absent config
/// is an explicit open/no-op pass.
pub fn verify_internal_bearer(header: Option<&str>, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(header) = header else {
        return false;
    };
    let token = header.strip_prefix("Bearer ").unwrap_or(header).trim();
    constant_time_eq(token.as_bytes(), secret.as_bytes())
}

fn verify_hmac_hex(secret: &str, body: &[u8], hex_sig: &str) -> bool {
    let Ok(sig) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&sig).is_ok()
}

/// Length-leaking only; content comparison is constant time.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Mask a secret for logging (first 8 chars only).
pub fn mask_token(token: &str) -> String {
    if token.len() > 8 {
        format!("{}...", &token[..8])
    } else {
        "***".to_string()
    }
}
