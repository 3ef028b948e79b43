//! Destination hosting API (repositories, access tokens, build recipes).

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use salsa2lp_core::types::PackageName;

/// A repository on the destination host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    /// Stable path, e.g. `~lomiri/+git/lomiri-clock-app`.
    pub path: String,
    /// API resource link used for follow-up calls.
    pub resource: String,
}

/// Scopes an access token can be issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Push,
    Pull,
}

impl TokenScope {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenScope::Push => "repository:push",
            TokenScope::Pull => "repository:pull",
        }
    }
}

/// Short-lived credential for git access to one repository.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A build recipe as stored by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecipe {
    pub name: String,
    pub text: String,
    pub resource: String,
}

/// Everything needed to create a daily-build recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    pub name: String,
    /// Team owning the recipe.
    pub owner: String,
    pub text: String,
    pub description: String,
    /// Archive (PPA) the daily builds go to.
    pub archive: String,
    pub distribution: String,
    pub series: String,
    pub build_daily: bool,
}

/// Errors from the hosting API.
#[derive(Debug, Error)]
pub enum HostingError {
    /// The request never got a response.
    #[error("{operation}: request failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    /// The host answered with an error status.
    #[error("{operation}: HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The response body was not what the API documents.
    #[error("{operation}: unexpected response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// A referenced object (team, archive, series) does not exist.
    #[error("{what} not found")]
    NotFound { what: String },
}

/// Operations on the destination host.
pub trait HostingApi: Send + Sync {
    /// Look a repository up by path; `None` when it does not exist.
    fn find_repository(&self, path: &str) -> Result<Option<RemoteRepository>, HostingError>;

    fn create_repository(
        &self,
        team: &str,
        name: &PackageName,
    ) -> Result<RemoteRepository, HostingError>;

    /// Account name of the authenticated user.
    fn identity(&self) -> Result<String, HostingError>;

    fn issue_access_token(
        &self,
        repository: &RemoteRepository,
        scopes: &[TokenScope],
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken, HostingError>;

    fn find_recipe(
        &self,
        team: &str,
        name: &PackageName,
    ) -> Result<Option<RemoteRecipe>, HostingError>;

    fn create_recipe(&self, recipe: &NewRecipe) -> Result<RemoteRecipe, HostingError>;

    fn update_recipe_text(&self, recipe: &RemoteRecipe, text: &str) -> Result<(), HostingError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn token_debug_hides_secret() {
        let token = AccessToken {
            secret: "hunter2".into(),
            expires_at: Utc::now(),
        };
        assert!(!format!("{token:?}").contains("hunter2"));
    }

    #[test]
    fn token_expiry() {
        let now = Utc::now();
        let token = AccessToken {
            secret: "s".into(),
            expires_at: now + Duration::seconds(10),
        };
        assert!(!token.is_expired(now));
        assert!(token.is_expired(now + Duration::seconds(10)));
    }
}
