//! Package discovery through the Salsa (GitLab v4) API.

use serde::Deserialize;

use salsa2lp_core::types::{PackageRef, SourceGroup};

use crate::error::{remote_err, RemoteError};

/// Projects requested per page; GitLab's maximum.
pub const PAGE_SIZE: usize = 100;

/// Produces the packages a batch should process.
pub trait Discovery {
    fn list_packages(&self) -> Result<Vec<PackageRef>, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct Project {
    path: String,
}

/// Lists every project in one group, ordered by name.
pub struct SalsaDiscovery {
    agent: ureq::Agent,
    api_root: String,
    group: SourceGroup,
}

impl SalsaDiscovery {
    pub fn new(agent: ureq::Agent, host: &str, group: SourceGroup) -> Self {
        Self {
            agent,
            api_root: format!("https://{host}/api/v4"),
            group,
        }
    }

    /// URL of one page of the group's project list.
    pub fn page_url(&self, page: usize) -> Result<String, RemoteError> {
        let base = format!("{}/groups/{}/projects", self.api_root, self.group);
        let mut url = url::Url::parse(&base).map_err(|source| RemoteError::Url {
            url: base.clone(),
            source,
        })?;
        url.query_pairs_mut()
            .append_pair("per_page", &PAGE_SIZE.to_string())
            .append_pair("order_by", "name")
            .append_pair("sort", "asc")
            .append_pair("page", &page.to_string());
        Ok(url.into())
    }

    fn fetch_page(&self, page: usize) -> Result<(Vec<Project>, Option<usize>), RemoteError> {
        let url = self.page_url(page)?;
        let resp = self.agent.get(&url).call().map_err(|e| remote_err(&url, e))?;
        let next = resp
            .header("X-Next-Page")
            .and_then(|v| v.trim().parse::<usize>().ok());
        let projects: Vec<Project> = resp.into_json().map_err(|e| RemoteError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;
        Ok((projects, next))
    }
}

impl Discovery for SalsaDiscovery {
    fn list_packages(&self) -> Result<Vec<PackageRef>, RemoteError> {
        let mut packages = Vec::new();
        let mut page = 1;
        loop {
            let (projects, next) = self.fetch_page(page)?;
            let count = projects.len();
            packages.extend(collect_page(projects, &self.group));
            match next_page(page, count, next) {
                Some(n) => page = n,
                None => break,
            }
        }
        tracing::info!("discovered {} packages in {}", packages.len(), self.group);
        Ok(packages)
    }
}

fn collect_page(projects: Vec<Project>, group: &SourceGroup) -> Vec<PackageRef> {
    projects
        .into_iter()
        .map(|p| PackageRef::new(p.path, group.clone()))
        .collect()
}

/// Follow `X-Next-Page` when present; otherwise stop on a short page.
fn next_page(current: usize, count: usize, header: Option<usize>) -> Option<usize> {
    match header {
        Some(n) if n > current => Some(n),
        Some(_) => None,
        None if count == PAGE_SIZE => Some(current + 1),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn page_url_has_paging_and_order() {
        let d = SalsaDiscovery::new(
            ureq::agent(),
            "salsa.debian.org",
            SourceGroup::from("ubports-team"),
        );
        assert_eq!(
            d.page_url(3).expect("url"),
            "https://salsa.debian.org/api/v4/groups/ubports-team/projects?per_page=100&order_by=name&sort=asc&page=3"
        );
    }

    #[rstest]
    #[case(1, 100, Some(2), Some(2))]
    #[case(2, 40, None, None)]
    #[case(1, 100, None, Some(2))]
    #[case(4, 100, Some(4), None)]
    fn paging(
        #[case] current: usize,
        #[case] count: usize,
        #[case] header: Option<usize>,
        #[case] expected: Option<usize>,
    ) {
        assert_eq!(next_page(current, count, header), expected);
    }

    #[test]
    fn project_paths_become_packages() {
        let projects: Vec<Project> = serde_json::from_str(
            r#"[{"path":"lomiri","name":"Lomiri","id":1},{"path":"qtmir","name":"qtmir","id":2}]"#,
        )
        .expect("json");
        let refs = collect_page(projects, &SourceGroup::from("ubports-team"));
        let names: Vec<&str> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["lomiri", "qtmir"]);
        assert!(refs.iter().all(|r| r.source_group.as_str() == "ubports-team"));
    }
}
