//! Persisted OAuth credentials and the interactive token exchange.
//!
//! The file uses the launchpadlib layout so existing credential files keep
//! working:
//!
//! ```text
//! [1]
//! consumer_key = salsa2lp-sync
//! consumer_secret =
//! access_token = ...
//! access_secret = ...
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use salsa2lp_core::cancel::CancelFlag;

use crate::error::{io_err, CredentialError};
use crate::oauth::{plaintext_signature, Credentials};

const SECTION: &str = "[1]";

/// Where the operator grants access to a request token.
pub const AUTHORIZE_URL: &str = "https://launchpad.net/+authorize-token";

// ---------------------------------------------------------------------------
// Token endpoint
// ---------------------------------------------------------------------------

/// An unauthorized request token awaiting operator approval.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
}

impl std::fmt::Debug for RequestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestToken")
            .field("token", &self.token)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl RequestToken {
    /// URL the operator opens to grant access.
    pub fn authorize_url(&self) -> String {
        format!("{AUTHORIZE_URL}?oauth_token={}", self.token)
    }
}

/// The three-legged OAuth exchange endpoints.
pub trait TokenEndpoint {
    fn request_token(&self, consumer_key: &str) -> Result<RequestToken, CredentialError>;

    /// `Ok(None)` while the operator has not yet authorized `request`.
    fn access_token(
        &self,
        consumer_key: &str,
        request: &RequestToken,
    ) -> Result<Option<(String, String)>, CredentialError>;
}

/// Launchpad's `+request-token` / `+access-token` endpoints over HTTPS.
pub struct HttpTokenEndpoint {
    agent: ureq::Agent,
    web_root: String,
}

impl HttpTokenEndpoint {
    pub fn new(agent: ureq::Agent) -> Self {
        Self::with_root(agent, "https://launchpad.net")
    }

    pub fn with_root(agent: ureq::Agent, web_root: impl Into<String>) -> Self {
        Self {
            agent,
            web_root: web_root.into(),
        }
    }

    fn post(&self, path: &str, form: &[(&str, &str)]) -> Result<ureq::Response, ureq::Error> {
        self.agent
            .post(&format!("{}/{path}", self.web_root))
            .send_form(form)
    }
}

impl TokenEndpoint for HttpTokenEndpoint {
    fn request_token(&self, consumer_key: &str) -> Result<RequestToken, CredentialError> {
        let signature = plaintext_signature("", "");
        let body = self
            .post(
                "+request-token",
                &[
                    ("oauth_consumer_key", consumer_key),
                    ("oauth_signature_method", "PLAINTEXT"),
                    ("oauth_signature", signature.as_str()),
                ],
            )
            .map_err(|e| CredentialError::Exchange(e.to_string()))?
            .into_string()
            .map_err(|e| CredentialError::Exchange(e.to_string()))?;
        let (token, secret) = parse_token_response(&body)?;
        Ok(RequestToken { token, secret })
    }

    fn access_token(
        &self,
        consumer_key: &str,
        request: &RequestToken,
    ) -> Result<Option<(String, String)>, CredentialError> {
        let signature = plaintext_signature("", &request.secret);
        let response = self.post(
            "+access-token",
            &[
                ("oauth_token", request.token.as_str()),
                ("oauth_consumer_key", consumer_key),
                ("oauth_signature_method", "PLAINTEXT"),
                ("oauth_signature", signature.as_str()),
            ],
        );
        match response {
            Ok(resp) => {
                let body = resp
                    .into_string()
                    .map_err(|e| CredentialError::Exchange(e.to_string()))?;
                parse_token_response(&body).map(Some)
            }
            // Not yet authorized.
            Err(ureq::Error::Status(401 | 403, _)) => Ok(None),
            Err(e) => Err(CredentialError::Exchange(e.to_string())),
        }
    }
}

/// `oauth_token=..&oauth_token_secret=..`
pub fn parse_token_response(body: &str) -> Result<(String, String), CredentialError> {
    let fields: HashMap<String, String> = url::form_urlencoded::parse(body.trim().as_bytes())
        .into_owned()
        .collect();
    match (fields.get("oauth_token"), fields.get("oauth_token_secret")) {
        (Some(token), Some(secret)) => Ok((token.clone(), secret.clone())),
        _ => Err(CredentialError::Exchange(format!(
            "token response lacks oauth_token/oauth_token_secret: {body:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Exchange policy
// ---------------------------------------------------------------------------

/// Bounds on polling for operator authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangePolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ExchangePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 600,
            interval: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// CredentialStore
// ---------------------------------------------------------------------------

/// The credentials file plus the consumer key it belongs to.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    consumer_key: String,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, consumer_key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            consumer_key: consumer_key.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored credentials, or `None` when the file does not exist yet.
    pub fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&self.path, e)),
        };
        parse_credentials(&contents, &self.path).map(Some)
    }

    /// Write atomically (temp file + rename), readable by the owner only.
    pub fn save(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = open_private(&tmp).map_err(|e| io_err(&tmp, e))?;
            file.write_all(render_credentials(credentials).as_bytes())
                .and_then(|()| file.sync_all())
                .map_err(|e| io_err(&tmp, e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| io_err(&self.path, e))?;
        tracing::debug!("saved credentials to {}", self.path.display());
        Ok(())
    }

    /// Load the stored credentials, or run the exchange and persist the result.
    ///
    /// `show_url` is called once with the authorization URL the operator has
    /// to open. Polling stops after `policy.max_attempts` unanswered attempts
    /// or when `cancel` is raised.
    pub fn obtain(
        &self,
        endpoint: &dyn TokenEndpoint,
        policy: ExchangePolicy,
        cancel: &CancelFlag,
        mut show_url: impl FnMut(&str),
    ) -> Result<Credentials, CredentialError> {
        if let Some(existing) = self.load()? {
            return Ok(existing);
        }

        let request = endpoint.request_token(&self.consumer_key)?;
        show_url(&request.authorize_url());

        for attempt in 1..=policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(CredentialError::Cancelled);
            }
            if let Some((token, secret)) = endpoint.access_token(&self.consumer_key, &request)? {
                let credentials = Credentials {
                    consumer_key: self.consumer_key.clone(),
                    consumer_secret: String::new(),
                    access_token: token,
                    access_secret: secret,
                };
                self.save(&credentials)?;
                tracing::info!("access granted after {attempt} attempt(s)");
                return Ok(credentials);
            }
            if attempt < policy.max_attempts {
                thread::sleep(policy.interval);
            }
        }
        Err(CredentialError::NotAuthorized {
            attempts: policy.max_attempts,
        })
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::File::create(path)
}

fn render_credentials(c: &Credentials) -> String {
    format!(
        "{SECTION}\nconsumer_key = {}\nconsumer_secret = {}\naccess_token = {}\naccess_secret = {}\n\n",
        c.consumer_key, c.consumer_secret, c.access_token, c.access_secret
    )
}

fn parse_credentials(contents: &str, path: &Path) -> Result<Credentials, CredentialError> {
    let mut in_section = false;
    let mut values: HashMap<&str, &str> = HashMap::new();
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') {
            in_section = line == SECTION;
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim(), value.trim());
        }
    }

    let get = |key: &str| -> Result<String, CredentialError> {
        values
            .get(key)
            .map(|v| v.to_string())
            .ok_or_else(|| CredentialError::Malformed {
                path: path.to_path_buf(),
                message: format!("missing `{key}` in section {SECTION}"),
            })
    };
    Ok(Credentials {
        consumer_key: get("consumer_key")?,
        consumer_secret: values.get("consumer_secret").unwrap_or(&"").to_string(),
        access_token: get("access_token")?,
        access_secret: get("access_secret")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_launchpadlib_file() {
        let text = "[1]\nconsumer_key = salsa2lp-sync\nconsumer_secret = \naccess_token = AAA\naccess_secret = BBB\n\n";
        let c = parse_credentials(text, Path::new("c.txt")).expect("parse");
        assert_eq!(c.consumer_key, "salsa2lp-sync");
        assert_eq!(c.consumer_secret, "");
        assert_eq!(c.access_token, "AAA");
        assert_eq!(c.access_secret, "BBB");
    }

    #[test]
    fn keys_outside_section_are_ignored() {
        let text = "access_token = stray\n[2]\naccess_token = other\n";
        let err = parse_credentials(text, Path::new("c.txt")).unwrap_err();
        assert!(matches!(err, CredentialError::Malformed { .. }));
    }

    #[test]
    fn token_response_parsing() {
        let (t, s) = parse_token_response("oauth_token=abc&oauth_token_secret=d%26f\n").expect("ok");
        assert_eq!(t, "abc");
        assert_eq!(s, "d&f");
        assert!(parse_token_response("oauth_token=abc").is_err());
    }

    #[test]
    fn authorize_url_names_token() {
        let req = RequestToken {
            token: "xyz".into(),
            secret: "s".into(),
        };
        assert_eq!(
            req.authorize_url(),
            "https://launchpad.net/+authorize-token?oauth_token=xyz"
        );
    }
}
