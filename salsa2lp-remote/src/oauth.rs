//! OAuth 1.0 PLAINTEXT signing, as accepted by the Launchpad API.
//!
//! PLAINTEXT signatures are `<consumer_secret>&<token_secret>`. Launchpad
//! consumers have an empty secret, so the signature is `&<token_secret>`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Realm sent in every `Authorization` header.
pub const REALM: &str = "https://api.launchpad.net/";

/// The synchronizer's own OAuth identity against the hosting API.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &self.access_token)
            .field("access_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// `Authorization` header value for one request.
    pub fn authorization_header(&self) -> String {
        self.header_with(&nonce(), Utc::now().timestamp())
    }

    pub(crate) fn header_with(&self, nonce: &str, timestamp: i64) -> String {
        let signature = plaintext_signature(&self.consumer_secret, &self.access_secret);
        let timestamp = timestamp.to_string();
        let params: [(&str, &str); 7] = [
            ("oauth_consumer_key", self.consumer_key.as_str()),
            ("oauth_token", self.access_token.as_str()),
            ("oauth_signature_method", "PLAINTEXT"),
            ("oauth_signature", signature.as_str()),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_version", "1.0"),
        ];
        let mut header = format!("OAuth realm=\"{REALM}\"");
        for (key, value) in params {
            header.push_str(&format!(", {key}=\"{}\"", encode(value)));
        }
        header
    }
}

/// `<consumer_secret>&<token_secret>`, unencoded.
pub fn plaintext_signature(consumer_secret: &str, token_secret: &str) -> String {
    format!("{consumer_secret}&{token_secret}")
}

/// Percent-encode a header parameter value.
pub(crate) fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn nonce() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{nanos:x}{seq:x}{:x}", std::process::id())
}
