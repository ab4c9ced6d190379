//! Fetching each resource from GitHub and boiling it down to the records
//! we keep.

pub mod pagination;
pub mod probe;
pub mod types;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt::{self, Debug, Formatter};

use crate::config::ApiConfig;
use crate::http::Api;
use crate::repo::RepoId;

pub use self::pagination::{cursor_paginated, offset_paginated, Pages};
use self::types::*;

const STARS_QUERY: &str = r#"
query ($owner: String!, $repo: String!, $after: String) {
  repository(owner: $owner, name: $repo) {
    stargazers(first: 100, after: $after) {
      edges {
        starredAt
        node { login }
      }
      pageInfo { endCursor hasNextPage }
    }
  }
}
"#;

const ISSUES_QUERY: &str = r#"
query ($owner: String!, $repo: String!, $after: String) {
  repository(owner: $owner, name: $repo) {
    issues(first: 100, after: $after) {
      edges {
        node {
          number title state createdAt closedAt
          author { login }
        }
      }
      pageInfo { endCursor hasNextPage }
    }
  }
}
"#;

/// An interface to the resources GitHub keeps about a repository.
#[derive(Clone)]
pub struct GitHub {
    api: Api,
    per_page: u32,
    commit_details: bool,
}

impl GitHub {
    pub fn new(api: Api, cfg: &ApiConfig) -> GitHub {
        GitHub {
            api,
            per_page: cfg.per_page,
            commit_details: cfg.commit_details,
        }
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    fn route(repo: &RepoId, tail: &str) -> String {
        format!("/repos/{}/{}{}", repo.owner, repo.name, tail)
    }

    fn paginated<R, T>(&self, repo: &RepoId, tail: &str, params: &[(&str, String)]) -> Pages<T>
    where
        R: DeserializeOwned,
        T: From<R>,
    {
        offset_paginated(
            &self.api,
            &GitHub::route(repo, tail),
            params,
            self.per_page,
            |v| parse::<R>(v).map(T::from),
        )
    }

    /// The core repository lookup. `None` means the repository is
    /// inaccessible (renamed, deleted, private).
    pub fn repository(&self, repo: &RepoId) -> Option<RawRepository> {
        let value = self.api.rest(&GitHub::route(repo, ""), &[])?;
        parse(&value)
    }

    /// Look the repository up and count its commits.
    ///
    /// Counting means walking the full commit history, so the listing is
    /// handed back as well for anyone who wants to keep it.
    pub fn general_info(&self, repo: &RepoId) -> Option<(GeneralInfo, Pages<Commit>)> {
        let raw = self.repository(repo)?;
        let commits = self.list_commits(repo);
        debug!("{} has {} commits", repo, commits.items.len());

        Some((GeneralInfo::new(raw, commits.items.len()), commits))
    }

    /// Every commit on the default branch, without per-commit details.
    pub fn list_commits(&self, repo: &RepoId) -> Pages<Commit> {
        self.paginated::<RawCommit, Commit>(repo, "/commits", &[])
    }

    /// Every commit, with files and line stats filled in if configured.
    pub fn commits(&self, repo: &RepoId) -> Pages<Commit> {
        let listing = self.list_commits(repo);
        self.add_commit_details(repo, listing)
    }

    pub fn add_commit_details(&self, repo: &RepoId, listing: Pages<Commit>) -> Pages<Commit> {
        if !self.commit_details {
            return listing;
        }

        debug!("Fetching details for {} commits of {}", listing.items.len(), repo);

        listing.map(|commit| {
            let detail = commit
                .sha
                .as_ref()
                .and_then(|sha| {
                    let route = GitHub::route(repo, &format!("/commits/{}", sha));
                    self.api.rest(&route, &[])
                })
                .and_then(|v| parse::<RawCommit>(&v));

            match detail {
                Some(detail) => commit.with_details(detail),
                None => commit,
            }
        })
    }

    pub fn forks(&self, repo: &RepoId) -> Pages<Fork> {
        self.paginated::<RawFork, Fork>(repo, "/forks", &[])
    }

    pub fn contributors(&self, repo: &RepoId) -> Pages<Contributor> {
        self.paginated::<Contributor, Contributor>(repo, "/contributors", &[])
    }

    pub fn pull_requests(&self, repo: &RepoId) -> Pages<PullRequest> {
        let params = [("state", String::from("all"))];
        self.paginated::<RawPullRequest, PullRequest>(repo, "/pulls", &params)
    }

    /// Direct collaborators with admin or maintain rights. Listing
    /// collaborators needs push access, so this is usually empty.
    pub fn maintainers(&self, repo: &RepoId) -> Pages<Maintainer> {
        offset_paginated(
            &self.api,
            &GitHub::route(repo, "/collaborators"),
            &[("affiliation", String::from("direct"))],
            self.per_page,
            |v| parse::<RawCollaborator>(v).and_then(Maintainer::from_collaborator),
        )
    }

    pub fn labels(&self, repo: &RepoId) -> Pages<Label> {
        self.paginated::<Label, Label>(repo, "/labels", &[])
    }

    fn repo_variables(repo: &RepoId) -> Value {
        let mut vars = Map::new();
        vars.insert(String::from("owner"), Value::from(repo.owner.as_str()));
        vars.insert(String::from("repo"), Value::from(repo.name.as_str()));
        Value::Object(vars)
    }

    pub fn stars(&self, repo: &RepoId) -> Pages<Star> {
        cursor_paginated(
            &self.api,
            STARS_QUERY,
            GitHub::repo_variables(repo),
            "/data/repository/stargazers",
            |v| parse::<RawStar>(v).map(Star::from),
        )
    }

    pub fn issues(&self, repo: &RepoId) -> Pages<Issue> {
        cursor_paginated(
            &self.api,
            ISSUES_QUERY,
            GitHub::repo_variables(repo),
            "/data/repository/issues",
            |v| parse::<RawIssueEdge>(v).map(Issue::from),
        )
    }

    pub fn license(&self, repo: &RepoId) -> License {
        self.api
            .rest(&GitHub::route(repo, "/license"), &[])
            .and_then(|v| parse::<RawLicenseFile>(&v))
            .map(License::from)
            .unwrap_or_default()
    }

    pub fn readme(&self, repo: &RepoId) -> Readme {
        self.api
            .rest(&GitHub::route(repo, "/readme"), &[])
            .filter(Value::is_object)
            .and_then(|v| parse::<Readme>(&v))
            .unwrap_or_default()
    }

    pub fn languages(&self, repo: &RepoId) -> Languages {
        self.api
            .rest(&GitHub::route(repo, "/languages"), &[])
            .and_then(|v| parse::<Languages>(&v))
            .unwrap_or_default()
    }

    pub fn owner_info(&self, repo: &RepoId) -> OwnerInfo {
        self.api
            .rest(&format!("/users/{}", repo.owner), &[])
            .and_then(|v| parse::<OwnerInfo>(&v))
            .unwrap_or_default()
    }
}

impl Debug for GitHub {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("GitHub")
            .field("api", &self.api)
            .field("per_page", &self.per_page)
            .field("commit_details", &self.commit_details)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::http::mock::MockTransport;
    use crate::http::{Response, Unlimited};

    pub const BASE: &str = "https://api.github.com";
    pub const GRAPHQL: &str = "https://api.github.com/graphql";

    pub fn github(mock: &MockTransport) -> GitHub {
        let api = Api::new(mock.clone(), Unlimited, BASE, GRAPHQL);
        let cfg = ApiConfig {
            commit_details: false,
            ..Default::default()
        };

        GitHub::new(api, &cfg)
    }

    fn rclcpp() -> RepoId {
        RepoId::new("ros2", "rclcpp")
    }

    fn raw_commit(sha: &str, login: Option<&str>, date: &str) -> Value {
        json!({
            "sha": sha,
            "commit": {
                "author": {"name": "Some Dev", "date": date},
                "message": "Fix the thing",
            },
            "author": login.map(|l| json!({"login": l})),
        })
    }

    #[test]
    fn commits_are_simplified() {
        let mock = MockTransport::new();
        mock.on_get(
            &format!("{}/repos/ros2/rclcpp/commits", BASE),
            vec![
                Response::ok(&json!([
                    raw_commit("abc", Some("dev"), "2020-01-01T00:00:00Z"),
                    raw_commit("def", None, "2019-01-01T00:00:00Z"),
                ])),
                Response::ok(&json!([])),
            ],
        );

        let got = github(&mock).commits(&rclcpp());

        assert_eq!(got.items.len(), 2);
        assert_eq!(got.items[0].sha.as_ref().unwrap(), "abc");
        assert_eq!(got.items[0].author_login.as_ref().unwrap(), "dev");
        assert_eq!(got.items[0].author_name.as_ref().unwrap(), "Some Dev");
        assert_eq!(got.items[1].author_login, None);
        assert!(got.items[1].files_changed.is_empty());
    }

    #[test]
    fn commit_details_fill_in_files_and_stats() {
        let mock = MockTransport::new();
        mock.on_get(
            &format!("{}/repos/ros2/rclcpp/commits", BASE),
            vec![
                Response::ok(&json!([raw_commit("abc", Some("dev"), "2020-01-01T00:00:00Z")])),
                Response::ok(&json!([])),
            ],
        );
        mock.on_get(
            &format!("{}/repos/ros2/rclcpp/commits/abc", BASE),
            vec![Response::ok(&json!({
                "sha": "abc",
                "files": [{"filename": "src/node.cpp"}, {"filename": "README.md"}],
                "stats": {"additions": 10, "deletions": 2, "total": 12},
            }))],
        );
        let api = Api::new(mock.clone(), Unlimited, BASE, GRAPHQL);
        let gh = GitHub::new(api, &ApiConfig::default());

        let got = gh.commits(&rclcpp());

        let commit = &got.items[0];
        assert_eq!(commit.files_changed, vec!["src/node.cpp", "README.md"]);
        assert_eq!(commit.stats.total, 12);
        assert_eq!(commit.author_login.as_ref().unwrap(), "dev");
    }

    #[test]
    fn general_info_embeds_the_commit_count() {
        let mock = MockTransport::new();
        mock.on_get(
            &format!("{}/repos/ros2/rclcpp", BASE),
            vec![Response::ok(&json!({
                "full_name": "ros2/rclcpp",
                "license": {"spdx_id": "Apache-2.0", "name": "Apache License 2.0"},
                "stargazers_count": 400,
                "topics": ["ros2"],
            }))],
        );
        mock.on_get(
            &format!("{}/repos/ros2/rclcpp/commits", BASE),
            vec![
                Response::ok(&json!([
                    raw_commit("a", None, "2020-01-01T00:00:00Z"),
                    raw_commit("b", None, "2020-01-02T00:00:00Z"),
                ])),
                Response::ok(&json!([raw_commit("c", None, "2020-01-03T00:00:00Z")])),
                Response::ok(&json!([])),
            ],
        );

        let (info, commits) = github(&mock).general_info(&rclcpp()).unwrap();

        assert_eq!(info.commits_count, 3);
        assert_eq!(commits.items.len(), 3);
        assert_eq!(info.license.unwrap(), "Apache-2.0");
        assert_eq!(info.stargazers_count, Some(400));
    }

    #[test]
    fn missing_repositories_have_no_general_info() {
        let mock = MockTransport::new();

        assert!(github(&mock).general_info(&rclcpp()).is_none());
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn single_object_resources_default_when_absent() {
        let mock = MockTransport::new();
        let gh = github(&mock);

        assert_eq!(gh.license(&rclcpp()), License::default());
        assert_eq!(gh.readme(&rclcpp()), Readme::default());
        assert!(gh.languages(&rclcpp()).is_empty());
        assert_eq!(gh.owner_info(&rclcpp()), OwnerInfo::default());
    }

    #[test]
    fn only_admins_and_maintainers_are_kept() {
        let mock = MockTransport::new();
        mock.on_get(
            &format!("{}/repos/ros2/rclcpp/collaborators", BASE),
            vec![
                Response::ok(&json!([
                    {"login": "boss", "permissions": {"admin": true, "maintain": true}},
                    {"login": "helper", "permissions": {"admin": false, "maintain": true}},
                    {"login": "dev", "permissions": {"admin": false, "maintain": false, "push": true}},
                ])),
                Response::ok(&json!([])),
            ],
        );

        let got = github(&mock).maintainers(&rclcpp());

        let roles: Vec<(String, String)> = got
            .items
            .into_iter()
            .map(|m| (m.login.unwrap(), m.role))
            .collect();
        assert_eq!(
            roles,
            vec![
                (String::from("boss"), String::from("admin")),
                (String::from("helper"), String::from("maintain")),
            ]
        );
    }

    #[test]
    fn issues_come_from_graphql() {
        let mock = MockTransport::new();
        mock.on_query(
            GRAPHQL,
            "issues(",
            vec![Response::ok(&json!({
                "data": {"repository": {"issues": {
                    "edges": [{"node": {
                        "number": 7,
                        "title": "Crash on startup",
                        "state": "CLOSED",
                        "createdAt": "2021-05-01T00:00:00Z",
                        "closedAt": "2021-05-02T00:00:00Z",
                        "author": {"login": "reporter"},
                    }}],
                    "pageInfo": {"endCursor": "x", "hasNextPage": false},
                }}}
            }))],
        );

        let got = github(&mock).issues(&rclcpp());

        assert_eq!(
            got.items,
            vec![Issue {
                number: Some(7),
                title: Some(String::from("Crash on startup")),
                state: Some(String::from("CLOSED")),
                created_at: Some(String::from("2021-05-01T00:00:00Z")),
                closed_at: Some(String::from("2021-05-02T00:00:00Z")),
                author: Some(String::from("reporter")),
            }]
        );
    }
}
