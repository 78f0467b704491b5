// =============================================================================
// KuCoin request signing — HMAC-SHA256, base64-encoded (API key version 2)
// =============================================================================
//
// SECURITY: the secret is only ever fed to the MAC. Neither the secret nor the
// passphrase is logged, formatted into errors, or kept in `AuthHeaders` Debug
// output.
// =============================================================================

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, CONTENT_TYPE};
use sha2::Sha256;

use crate::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Value of the `KC-API-KEY-VERSION` header for signed passphrases.
pub const KEY_VERSION: &str = "2";

fn hmac_base64(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(payload);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Signature of `timestamp + method + path + body`.
///
/// `path` includes any query string; `body` is the exact bytes sent (empty
/// for GET).
pub fn sign(timestamp: &str, method: &str, path: &str, body: &str, secret: &str) -> String {
    let prehash = format!("{timestamp}{method}{path}{body}");
    hmac_base64(secret, prehash.as_bytes())
}

/// Passphrase signed with the API secret, as required by key version 2.
pub fn sign_passphrase(passphrase: &str, secret: &str) -> String {
    hmac_base64(secret, passphrase.as_bytes())
}

/// The five `KC-API-*` headers for one private REST call.
#[derive(Clone)]
pub struct AuthHeaders {
    pub key: String,
    pub sign: String,
    pub timestamp: String,
    pub passphrase: String,
}

impl AuthHeaders {
    pub fn new(
        credentials: &Credentials,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> Self {
        Self {
            key: credentials.api_key.clone(),
            sign: sign(timestamp, method, path, body, &credentials.api_secret),
            timestamp: timestamp.to_string(),
            passphrase: sign_passphrase(&credentials.api_passphrase, &credentials.api_secret),
        }
    }

    /// Headers for a JSON request body.
    pub fn to_header_map(&self) -> Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert("KC-API-KEY", HeaderValue::from_str(&self.key)?);
        headers.insert("KC-API-SIGN", HeaderValue::from_str(&self.sign)?);
        headers.insert("KC-API-TIMESTAMP", HeaderValue::from_str(&self.timestamp)?);
        headers.insert("KC-API-PASSPHRASE", HeaderValue::from_str(&self.passphrase)?);
        headers.insert("KC-API-KEY-VERSION", HeaderValue::from_static(KEY_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

impl std::fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("key", &"<redacted>")
            .field("sign", &"<redacted>")
            .field("timestamp", &self.timestamp)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
