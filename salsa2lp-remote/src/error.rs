//! Error types for salsa2lp-remote.

use std::path::PathBuf;

use thiserror::Error;

use salsa2lp_sync::HostingError;

/// Errors from package discovery.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never got a response.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The server answered with an error status.
    #[error("{url}: HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body did not decode.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("invalid URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors from loading, saving, or obtaining OAuth credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credentials file exists but lacks a required key.
    #[error("malformed credentials file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// The token endpoint failed in a way polling cannot fix.
    #[error("credential exchange failed: {0}")]
    Exchange(String),

    /// The operator never authorized the request token.
    #[error("request token was not authorized after {attempts} attempts")]
    NotAuthorized { attempts: u32 },

    #[error("credential exchange cancelled")]
    Cancelled,
}

/// Convenience constructor for [`CredentialError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CredentialError {
    CredentialError::Io {
        path: path.into(),
        source,
    }
}

/// Map a ureq failure onto [`HostingError`], keeping the response body.
pub(crate) fn hosting_err(operation: &'static str, err: ureq::Error) -> HostingError {
    match err {
        ureq::Error::Status(status, response) => HostingError::Status {
            operation,
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => HostingError::Request {
            operation,
            message: t.to_string(),
        },
    }
}

/// Map a ureq failure onto [`RemoteError`].
pub(crate) fn remote_err(url: &str, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, response) => RemoteError::Status {
            url: url.to_string(),
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(t) => RemoteError::Request {
            url: url.to_string(),
            message: t.to_string(),
        },
    }
}
