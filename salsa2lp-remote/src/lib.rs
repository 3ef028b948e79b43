//! Network-facing collaborators: Launchpad hosting API, OAuth credentials,
//! Salsa package discovery.

pub mod credentials;
pub mod error;
pub mod launchpad;
pub mod oauth;
pub mod salsa;

pub use credentials::{
    CredentialStore, ExchangePolicy, HttpTokenEndpoint, RequestToken, TokenEndpoint,
};
pub use error::{CredentialError, RemoteError};
pub use launchpad::{http_agent, LaunchpadClient};
pub use oauth::Credentials;
pub use salsa::{Discovery, SalsaDiscovery};
