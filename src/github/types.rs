//! The shapes GitHub hands back, and the simplified records we keep.

use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Login {
    pub login: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLicense {
    pub spdx_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRepository {
    pub full_name: Option<String>,
    pub html_url: Option<String>,
    pub description: Option<String>,
    pub archived: Option<bool>,
    pub fork: Option<bool>,
    pub default_branch: Option<String>,
    pub license: Option<RawLicense>,
    pub size: Option<u64>,
    pub language: Option<String>,
    pub topics: Option<Vec<String>>,
    pub stargazers_count: Option<u64>,
    pub forks_count: Option<u64>,
    pub open_issues_count: Option<u64>,
    pub subscribers_count: Option<u64>,
    pub watchers_count: Option<u64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub pushed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralInfo {
    pub full_name: Option<String>,
    pub html_url: Option<String>,
    pub description: Option<String>,
    pub archived: Option<bool>,
    pub fork: Option<bool>,
    pub default_branch: Option<String>,
    pub license: Option<String>,
    pub size: Option<u64>,
    pub language: Option<String>,
    pub topics: Option<Vec<String>>,
    pub stargazers_count: Option<u64>,
    pub forks_count: Option<u64>,
    pub open_issues_count: Option<u64>,
    pub subscribers_count: Option<u64>,
    pub watchers_count: Option<u64>,
    pub commits_count: usize,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub pushed_at: Option<String>,
}

impl GeneralInfo {
    pub fn new(raw: RawRepository, commits_count: usize) -> GeneralInfo {
        let license = raw.license.and_then(|l| l.spdx_id.or(l.name));

        GeneralInfo {
            full_name: raw.full_name,
            html_url: raw.html_url,
            description: raw.description,
            archived: raw.archived,
            fork: raw.fork,
            default_branch: raw.default_branch,
            license,
            size: raw.size,
            language: raw.language,
            topics: raw.topics,
            stargazers_count: raw.stargazers_count,
            forks_count: raw.forks_count,
            open_issues_count: raw.open_issues_count,
            subscribers_count: raw.subscribers_count,
            watchers_count: raw.watchers_count,
            commits_count,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            pushed_at: raw.pushed_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCommit {
    pub sha: Option<String>,
    pub commit: RawCommitDetail,
    pub author: Option<Login>,
    pub files: Option<Vec<RawFile>>,
    pub stats: Option<CommitStats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCommitDetail {
    pub author: Option<RawSignature>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSignature {
    pub name: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFile {
    pub filename: String,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitStats {
    pub additions: u64,
    pub deletions: u64,
    pub total: u64,
}

/// A simplified commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commit {
    pub sha: Option<String>,
    pub author_name: Option<String>,
    pub author_login: Option<String>,
    pub date: Option<String>,
    pub message: Option<String>,
    pub files_changed: Vec<String>,
    pub stats: CommitStats,
}

impl Commit {
    /// Fill in the files and line counts from a single-commit lookup.
    pub fn with_details(mut self, detail: RawCommit) -> Commit {
        if let Some(files) = detail.files {
            self.files_changed = files.into_iter().map(|f| f.filename).collect();
        }
        if let Some(stats) = detail.stats {
            self.stats = stats;
        }

        self
    }
}

impl From<RawCommit> for Commit {
    fn from(raw: RawCommit) -> Commit {
        let signature = raw.commit.author.unwrap_or_default();

        Commit {
            sha: raw.sha,
            author_name: signature.name,
            author_login: raw.author.and_then(|a| a.login),
            date: signature.date,
            message: raw.commit.message,
            files_changed: raw
                .files
                .map(|files| files.into_iter().map(|f| f.filename).collect())
                .unwrap_or_default(),
            stats: raw.stats.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFork {
    pub created_at: Option<String>,
    pub owner: Option<Login>,
    pub full_name: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fork {
    pub forked_at: Option<String>,
    pub owner: Option<String>,
    pub full_name: Option<String>,
    pub html_url: Option<String>,
}

impl From<RawFork> for Fork {
    fn from(raw: RawFork) -> Fork {
        Fork {
            forked_at: raw.created_at,
            owner: raw.owner.and_then(|o| o.login),
            full_name: raw.full_name,
            html_url: raw.html_url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contributor {
    pub login: Option<String>,
    pub contributions: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPullRequest {
    pub id: Option<u64>,
    pub number: Option<u64>,
    pub state: Option<String>,
    pub title: Option<String>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
    pub user: Option<Login>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: Option<u64>,
    pub number: Option<u64>,
    pub state: Option<String>,
    pub title: Option<String>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
    pub user: Option<String>,
}

impl From<RawPullRequest> for PullRequest {
    fn from(raw: RawPullRequest) -> PullRequest {
        PullRequest {
            id: raw.id,
            number: raw.number,
            state: raw.state,
            title: raw.title,
            created_at: raw.created_at,
            closed_at: raw.closed_at,
            merged_at: raw.merged_at,
            user: raw.user.and_then(|u| u.login),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawCollaborator {
    pub login: Option<String>,
    pub role_name: Option<String>,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub admin: bool,
    pub maintain: bool,
}

/// A collaborator with administrative or maintainer rights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    pub login: Option<String>,
    pub role: String,
}

impl Maintainer {
    /// Only admins and maintainers count; everyone else is `None`.
    pub fn from_collaborator(raw: RawCollaborator) -> Option<Maintainer> {
        let role = if raw.permissions.admin {
            "admin"
        } else if raw.permissions.maintain {
            "maintain"
        } else {
            return None;
        };

        Some(Maintainer {
            login: raw.login,
            role: role.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawStar {
    pub starred_at: Option<String>,
    pub node: Option<Login>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub starred_at: Option<String>,
    pub user: Option<String>,
}

impl From<RawStar> for Star {
    fn from(raw: RawStar) -> Star {
        Star {
            starred_at: raw.starred_at,
            user: raw.node.and_then(|n| n.login),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIssueEdge {
    pub node: RawIssue,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawIssue {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub state: Option<String>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub author: Option<Login>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub state: Option<String>,
    pub created_at: Option<String>,
    pub closed_at: Option<String>,
    pub author: Option<String>,
}

impl From<RawIssueEdge> for Issue {
    fn from(edge: RawIssueEdge) -> Issue {
        let raw = edge.node;

        Issue {
            number: raw.number,
            title: raw.title,
            state: raw.state,
            created_at: raw.created_at,
            closed_at: raw.closed_at,
            author: raw.author.and_then(|a| a.login),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub spdx_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLicenseFile {
    pub license: Option<RawLicense>,
}

impl From<RawLicenseFile> for License {
    fn from(raw: RawLicenseFile) -> License {
        let lic = raw.license.unwrap_or_default();

        License {
            spdx_id: lic.spdx_id,
            name: lic.name,
        }
    }
}

/// An entry from the contents API, either a file or a directory listing
/// member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentEntry {
    pub name: Option<String>,
    pub path: Option<String>,
    pub download_url: Option<String>,
}

pub type Readme = ContentEntry;

/// Whether one of a handful of conventional files exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbedFile {
    pub found: bool,
    pub path: Option<String>,
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeOfConduct {
    pub found: bool,
    pub path: Option<String>,
    pub download_url: Option<String>,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueTemplate {
    pub has_issue_template: bool,
    pub files: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrTemplate {
    pub has_pr_template: bool,
    pub path: Option<String>,
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
    pub name: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    pub count: usize,
    pub labels: Vec<Label>,
}

impl From<Vec<Label>> for Labels {
    fn from(labels: Vec<Label>) -> Labels {
        Labels {
            count: labels.len(),
            labels,
        }
    }
}

pub type Languages = BTreeMap<String, u64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnerInfo {
    pub login: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
    pub blog: Option<String>,
    pub location: Option<String>,
    pub public_repos: Option<u64>,
    pub followers: Option<u64>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawWeek {
    pub week: i64,
    pub total: u64,
}

/// Commits made in the week starting on `week` (a `YYYY-MM-DD` date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyCommits {
    pub week: String,
    pub total: u64,
}

impl From<RawWeek> for WeeklyCommits {
    fn from(raw: RawWeek) -> WeeklyCommits {
        WeeklyCommits {
            week: match Utc.timestamp_opt(raw.week, 0).single() {
                Some(start) => start.format("%Y-%m-%d").to_string(),
                None => raw.week.to_string(),
            },
            total: raw.total,
        }
    }
}

/// Deserialize a single record, skipping anything that doesn't fit.
pub fn parse<T: DeserializeOwned>(value: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("Skipping a malformed record, {}", e);
            None
        }
    }
}
