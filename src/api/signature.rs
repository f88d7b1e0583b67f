//! Request signing for the management API
//!
//! Every request carries four headers. The signature is an HMAC-SHA256,
//! keyed by the API secret, over `token&timestamp&nonce&METHOD&path`, then
//! base64 encoded. The path must be the exact literal used in the URL.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::hmac;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub const AUTH_TOKEN: &str = "Auth-Token";
pub const AUTH_TIMESTAMP: &str = "Auth-Timestamp";
pub const AUTH_NONCE: &str = "Auth-Nonce";
pub const AUTH_SIGNATURE: &str = "Auth-Signature";

/// Header values for one signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub token: String,
    pub timestamp: String,
    pub nonce: String,
    pub signature: String,
}

impl AuthHeaders {
    /// Sign a request with the current time and a fresh 128-bit nonce
    pub fn new(token: &str, secret: &str, method: &str, path: &str) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let nonce = Uuid::new_v4().simple().to_string();
        Self::with_nonce(token, secret, method, path, timestamp, nonce)
    }

    /// Sign with a caller-supplied timestamp and nonce
    pub fn with_nonce(
        token: &str,
        secret: &str,
        method: &str,
        path: &str,
        timestamp: u64,
        nonce: String,
    ) -> Self {
        let timestamp = timestamp.to_string();
        let message = signing_string(token, &timestamp, &nonce, method, path);
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let tag = hmac::sign(&key, message.as_bytes());

        Self {
            token: token.to_string(),
            timestamp,
            nonce,
            signature: STANDARD.encode(tag.as_ref()),
        }
    }

    /// Header name/value pairs in wire order
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            (AUTH_TOKEN, self.token.as_str()),
            (AUTH_TIMESTAMP, self.timestamp.as_str()),
            (AUTH_NONCE, self.nonce.as_str()),
            (AUTH_SIGNATURE, self.signature.as_str()),
        ]
    }
}

fn signing_string(token: &str, timestamp: &str, nonce: &str, method: &str, path: &str) -> String {
    let method = method.to_uppercase();
    [token, timestamp, nonce, method.as_str(), path].join("&")
}
