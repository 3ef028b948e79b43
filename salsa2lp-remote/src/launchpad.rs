//! Launchpad REST client implementing [`HostingApi`].
//!
//! Talks to the `devel` web service. Entries are addressed by their
//! `self_link`; named operations go through `ws.op`.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

use salsa2lp_core::types::PackageName;
use salsa2lp_sync::{
    AccessToken, HostingApi, HostingError, NewRecipe, RemoteRecipe, RemoteRepository, TokenScope,
};

use crate::error::hosting_err;
use crate::oauth::Credentials;

pub const API_ROOT: &str = "https://api.launchpad.net/devel/";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared agent with the request timeout applied.
pub fn http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("salsa2lp-sync/", env!("CARGO_PKG_VERSION")))
        .build()
}

#[derive(Debug, Deserialize)]
struct Entry {
    self_link: String,
}

#[derive(Debug, Deserialize)]
struct Person {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Recipe {
    self_link: String,
    name: String,
    recipe_text: String,
}

pub struct LaunchpadClient {
    agent: ureq::Agent,
    api_root: String,
    credentials: Credentials,
    identity: OnceLock<String>,
}

impl LaunchpadClient {
    pub fn new(agent: ureq::Agent, credentials: Credentials) -> Self {
        Self::with_root(agent, credentials, API_ROOT)
    }

    pub fn with_root(agent: ureq::Agent, credentials: Credentials, api_root: &str) -> Self {
        let mut api_root = api_root.to_string();
        if !api_root.ends_with('/') {
            api_root.push('/');
        }
        Self {
            agent,
            api_root,
            credentials,
            identity: OnceLock::new(),
        }
    }

    /// Absolute link for a path relative to the API root.
    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path.trim_start_matches('/'))
    }

    fn team_link(&self, team: &str) -> String {
        self.link(&format!("~{team}"))
    }

    fn get(
        &self,
        operation: &'static str,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<Value>, HostingError> {
        let mut request = self
            .agent
            .get(url)
            .set("Authorization", &self.credentials.authorization_header())
            .set("Accept", "application/json");
        for (k, v) in query {
            request = request.query(k, v);
        }
        match request.call() {
            Ok(resp) => decode(operation, resp).map(|v| (!v.is_null()).then_some(v)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(hosting_err(operation, e)),
        }
    }

    fn post(
        &self,
        operation: &'static str,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<ureq::Response, HostingError> {
        tracing::debug!("POST {url} ws.op={operation}");
        self.agent
            .post(url)
            .set("Authorization", &self.credentials.authorization_header())
            .set("Accept", "application/json")
            .send_form(form)
            .map_err(|e| hosting_err(operation, e))
    }

    fn lookup_link(
        &self,
        operation: &'static str,
        url: &str,
        query: &[(&str, &str)],
        what: String,
    ) -> Result<String, HostingError> {
        let value = self
            .get(operation, url, query)?
            .ok_or(HostingError::NotFound { what })?;
        Ok(from_value::<Entry>(operation, value)?.self_link)
    }
}

fn decode(operation: &'static str, resp: ureq::Response) -> Result<Value, HostingError> {
    let body = resp.into_string().map_err(|e| HostingError::Decode {
        operation,
        message: e.to_string(),
    })?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|e| HostingError::Decode {
        operation,
        message: e.to_string(),
    })
}

fn from_value<T: for<'de> Deserialize<'de>>(
    operation: &'static str,
    value: Value,
) -> Result<T, HostingError> {
    serde_json::from_value(value).map_err(|e| HostingError::Decode {
        operation,
        message: e.to_string(),
    })
}

/// Repository path from a `.../~team/+git/name` link.
pub fn repository_path_from_link(link: &str) -> Option<&str> {
    link.find('~').map(|idx| &link[idx..])
}

/// `scopes` as the JSON list the web service expects.
pub fn scopes_param(scopes: &[TokenScope]) -> String {
    let list: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
    Value::from(list).to_string()
}

impl HostingApi for LaunchpadClient {
    fn find_repository(&self, path: &str) -> Result<Option<RemoteRepository>, HostingError> {
        let found = self.get(
            "getByPath",
            &self.link("+git"),
            &[("ws.op", "getByPath"), ("path", path)],
        )?;
        found
            .map(|v| {
                from_value::<Entry>("getByPath", v).map(|e| RemoteRepository {
                    path: path.to_string(),
                    resource: e.self_link,
                })
            })
            .transpose()
    }

    fn create_repository(
        &self,
        team: &str,
        name: &PackageName,
    ) -> Result<RemoteRepository, HostingError> {
        let owner = self.team_link(team);
        let resp = self.post(
            "new",
            &self.link("+git"),
            &[
                ("ws.op", "new"),
                ("name", name.as_str()),
                ("owner", owner.as_str()),
                ("target", owner.as_str()),
            ],
        )?;
        // Factory operations answer 201 with the new entry's location.
        let resource = match resp.header("Location").map(str::to_string) {
            Some(location) => location,
            None => from_value::<Entry>("new", decode("new", resp)?)?.self_link,
        };
        let path = repository_path_from_link(&resource)
            .map(str::to_string)
            .unwrap_or_else(|| format!("~{team}/+git/{name}"));
        Ok(RemoteRepository { path, resource })
    }

    fn identity(&self) -> Result<String, HostingError> {
        if let Some(name) = self.identity.get() {
            return Ok(name.clone());
        }
        let me = self
            .get("me", &self.link("people/+me"), &[])?
            .ok_or_else(|| HostingError::NotFound {
                what: "people/+me".to_string(),
            })?;
        let name = from_value::<Person>("me", me)?.name;
        Ok(self.identity.get_or_init(|| name).clone())
    }

    fn issue_access_token(
        &self,
        repository: &RemoteRepository,
        scopes: &[TokenScope],
        expires_at: DateTime<Utc>,
    ) -> Result<AccessToken, HostingError> {
        let description = format!("Access token for {}", self.identity()?);
        let scopes = scopes_param(scopes);
        let expires = expires_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        let resp = self.post(
            "issueAccessToken",
            &repository.resource,
            &[
                ("ws.op", "issueAccessToken"),
                ("description", description.as_str()),
                ("scopes", scopes.as_str()),
                ("date_expires", expires.as_str()),
            ],
        )?;
        let secret = from_value::<String>("issueAccessToken", decode("issueAccessToken", resp)?)?;
        Ok(AccessToken { secret, expires_at })
    }

    fn find_recipe(
        &self,
        team: &str,
        name: &PackageName,
    ) -> Result<Option<RemoteRecipe>, HostingError> {
        let found = self.get(
            "getRecipe",
            &self.team_link(team),
            &[("ws.op", "getRecipe"), ("name", name.as_str())],
        )?;
        found
            .map(|v| {
                from_value::<Recipe>("getRecipe", v).map(|r| RemoteRecipe {
                    name: r.name,
                    text: r.recipe_text,
                    resource: r.self_link,
                })
            })
            .transpose()
    }

    fn create_recipe(&self, recipe: &NewRecipe) -> Result<RemoteRecipe, HostingError> {
        let owner = self.team_link(&recipe.owner);
        let archive = self.lookup_link(
            "getPPAByName",
            &owner,
            &[("ws.op", "getPPAByName"), ("name", recipe.archive.as_str())],
            format!("archive ~{}/{}", recipe.owner, recipe.archive),
        )?;
        let series = self.lookup_link(
            "getSeries",
            &self.link(&recipe.distribution),
            &[("ws.op", "getSeries"), ("name_or_version", recipe.series.as_str())],
            format!("series {} {}", recipe.distribution, recipe.series),
        )?;
        let registrant = self.link(&format!("~{}", self.identity()?));
        let distroseries = Value::from(vec![series]).to_string();
        let build_daily = recipe.build_daily.to_string();

        self.post(
            "createRecipe",
            &owner,
            &[
                ("ws.op", "createRecipe"),
                ("name", recipe.name.as_str()),
                ("description", recipe.description.as_str()),
                ("recipe_text", recipe.text.as_str()),
                ("distroseries", distroseries.as_str()),
                ("registrant", registrant.as_str()),
                ("daily_build_archive", archive.as_str()),
                ("build_daily", build_daily.as_str()),
            ],
        )?;

        self.find_recipe(&recipe.owner, &PackageName::from(recipe.name.as_str()))?
            .ok_or_else(|| HostingError::NotFound {
                what: format!("recipe {} after creation", recipe.name),
            })
    }

    fn update_recipe_text(&self, recipe: &RemoteRecipe, text: &str) -> Result<(), HostingError> {
        self.agent
            .request("PATCH", recipe.resource.as_str())
            .set("Authorization", &self.credentials.authorization_header())
            .set("Accept", "application/json")
            .send_json(serde_json::json!({ "recipe_text": text }))
            .map_err(|e| hosting_err("lp_save", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(root: &str) -> LaunchpadClient {
        let creds = Credentials {
            consumer_key: "salsa2lp-sync".into(),
            consumer_secret: String::new(),
            access_token: "t".into(),
            access_secret: "s".into(),
        };
        LaunchpadClient::with_root(http_agent(), creds, root)
    }

    #[test]
    fn links_are_rooted() {
        let c = client("https://api.example.test/devel");
        assert_eq!(c.link("+git"), "https://api.example.test/devel/+git");
        assert_eq!(c.team_link("lomiri"), "https://api.example.test/devel/~lomiri");
    }

    #[test]
    fn repository_path_from_self_link() {
        assert_eq!(
            repository_path_from_link("https://api.launchpad.net/devel/~lomiri/+git/mypkg"),
            Some("~lomiri/+git/mypkg")
        );
        assert_eq!(repository_path_from_link("https://x/y"), None);
    }

    #[test]
    fn scopes_are_json_list() {
        assert_eq!(
            scopes_param(&[TokenScope::Push, TokenScope::Pull]),
            r#"["repository:push","repository:pull"]"#
        );
    }

    #[test]
    fn recipe_entry_decodes() {
        let v = serde_json::json!({
            "self_link": "https://api.launchpad.net/devel/~lomiri/+recipe/mypkg",
            "name": "mypkg",
            "recipe_text": "# git-build-recipe format 0.4 deb-version 1.0~{revtime}\n",
            "build_daily": true,
        });
        let r: Recipe = from_value("getRecipe", v).expect("decode");
        assert_eq!(r.name, "mypkg");
        assert!(r.recipe_text.starts_with("# git-build-recipe"));
    }

    #[test]
    fn missing_fields_are_decode_errors() {
        let err = from_value::<Entry>("getByPath", serde_json::json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, HostingError::Decode { .. }));
    }
}
