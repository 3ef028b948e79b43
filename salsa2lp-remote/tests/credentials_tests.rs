//! Credential persistence and the bounded authorization exchange.

use std::cell::Cell;
use std::fs;
use std::time::Duration;

use salsa2lp_core::cancel::CancelFlag;
use salsa2lp_remote::{
    CredentialError, CredentialStore, Credentials, ExchangePolicy, RequestToken, TokenEndpoint,
};
use tempfile::TempDir;

/// Authorizes after `grant_after` polls; counts calls.
struct ScriptedEndpoint {
    grant_after: u32,
    polls: Cell<u32>,
    requests: Cell<u32>,
}

impl ScriptedEndpoint {
    fn new(grant_after: u32) -> Self {
        Self {
            grant_after,
            polls: Cell::new(0),
            requests: Cell::new(0),
        }
    }
}

impl TokenEndpoint for ScriptedEndpoint {
    fn request_token(&self, _consumer_key: &str) -> Result<RequestToken, CredentialError> {
        self.requests.set(self.requests.get() + 1);
        Ok(RequestToken {
            token: "req-token".into(),
            secret: "req-secret".into(),
        })
    }

    fn access_token(
        &self,
        _consumer_key: &str,
        request: &RequestToken,
    ) -> Result<Option<(String, String)>, CredentialError> {
        assert_eq!(request.token, "req-token");
        self.polls.set(self.polls.get() + 1);
        if self.polls.get() >= self.grant_after {
            Ok(Some(("access-token".into(), "access-secret".into())))
        } else {
            Ok(None)
        }
    }
}

fn fast(max_attempts: u32) -> ExchangePolicy {
    ExchangePolicy {
        max_attempts,
        interval: Duration::ZERO,
    }
}

#[test]
fn exchange_persists_and_second_call_loads() {
    let dir = TempDir::new().expect("dir");
    let path = dir.path().join("cfg").join("Credentials.txt");
    let store = CredentialStore::new(&path, "salsa2lp-sync");
    let endpoint = ScriptedEndpoint::new(3);
    let mut shown = Vec::new();

    let creds = store
        .obtain(&endpoint, fast(10), &CancelFlag::new(), |url| shown.push(url.to_string()))
        .expect("obtain");
    assert_eq!(creds.access_token, "access-token");
    assert_eq!(endpoint.polls.get(), 3);
    assert_eq!(
        shown,
        vec!["https://launchpad.net/+authorize-token?oauth_token=req-token".to_string()]
    );
    assert!(path.is_file());
    assert!(!path.with_extension("tmp").exists());

    let again = store
        .obtain(&endpoint, fast(10), &CancelFlag::new(), |_| panic!("no prompt expected"))
        .expect("load");
    assert_eq!(again, creds);
    assert_eq!(endpoint.requests.get(), 1, "no second exchange");
}

#[test]
fn exchange_gives_up_after_max_attempts() {
    let dir = TempDir::new().expect("dir");
    let store = CredentialStore::new(dir.path().join("Credentials.txt"), "salsa2lp-sync");
    let endpoint = ScriptedEndpoint::new(u32::MAX);
    let err = store
        .obtain(&endpoint, fast(5), &CancelFlag::new(), |_| {})
        .unwrap_err();
    assert!(matches!(err, CredentialError::NotAuthorized { attempts: 5 }), "got: {err}");
    assert_eq!(endpoint.polls.get(), 5);
    assert!(!store.path().exists());
}

#[test]
fn exchange_stops_on_cancel() {
    let dir = TempDir::new().expect("dir");
    let store = CredentialStore::new(dir.path().join("Credentials.txt"), "salsa2lp-sync");
    let endpoint = ScriptedEndpoint::new(u32::MAX);
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = store.obtain(&endpoint, fast(5), &cancel, |_| {}).unwrap_err();
    assert!(matches!(err, CredentialError::Cancelled));
    assert_eq!(endpoint.polls.get(), 0);
}

#[test]
fn saved_file_is_launchpadlib_compatible() {
    let dir = TempDir::new().expect("dir");
    let store = CredentialStore::new(dir.path().join("Credentials.txt"), "salsa2lp-sync");
    let creds = Credentials {
        consumer_key: "salsa2lp-sync".into(),
        consumer_secret: String::new(),
        access_token: "AAA".into(),
        access_secret: "BBB".into(),
    };
    store.save(&creds).expect("save");
    let text = fs::read_to_string(store.path()).expect("read");
    assert!(text.starts_with("[1]\n"));
    assert!(text.contains("access_token = AAA\n"));
    assert_eq!(store.load().expect("load"), Some(creds));
}

#[cfg(unix)]
#[test]
fn saved_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;
    let dir = TempDir::new().expect("dir");
    let store = CredentialStore::new(dir.path().join("Credentials.txt"), "salsa2lp-sync");
    store
        .save(&Credentials {
            consumer_key: "k".into(),
            consumer_secret: String::new(),
            access_token: "t".into(),
            access_secret: "s".into(),
        })
        .expect("save");
    let mode = fs::metadata(store.path()).expect("meta").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn missing_file_loads_as_none() {
    let dir = TempDir::new().expect("dir");
    let store = CredentialStore::new(dir.path().join("nope.txt"), "salsa2lp-sync");
    assert_eq!(store.load().expect("load"), None);
}
