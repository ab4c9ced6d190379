//! Looking for conventional community files (contributing guides, codes of
//! conduct, templates) which may live at one of several paths.
//!
//! Candidates are always tried in order and the first hit wins. Not finding
//! anything is a perfectly normal answer, never an error.

use serde_json::Value;

use super::types::{parse, CodeOfConduct, ContentEntry, IssueTemplate, PrTemplate, ProbedFile};
use super::GitHub;
use crate::repo::RepoId;

pub const CONTRIBUTING: &[&str] = &[
    "CONTRIBUTING.md",
    ".github/CONTRIBUTING.md",
    "docs/CONTRIBUTING.md",
    "contributing.md",
];

pub const CODE_OF_CONDUCT: &[&str] = &[
    "CODE_OF_CONDUCT.md",
    ".github/CODE_OF_CONDUCT.md",
    "docs/CODE_OF_CONDUCT.md",
    "code-of-conduct.md",
    ".github/code-of-conduct.md",
];

pub const PR_TEMPLATE: &[&str] = &[
    ".github/PULL_REQUEST_TEMPLATE.md",
    "PULL_REQUEST_TEMPLATE.md",
    ".github/pull_request_template.md",
    "pull_request_template.md",
    ".github/PULL_REQUEST_TEMPLATE",
];

const ISSUE_TEMPLATE_DIR: &str = ".github/ISSUE_TEMPLATE";
const PR_TEMPLATE_DIR: &str = ".github/PULL_REQUEST_TEMPLATE";

/// How much of a code of conduct to keep.
const PREVIEW_CHARS: usize = 500;

/// A file that was found while probing.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub path: String,
    pub download_url: String,
}

impl GitHub {
    fn contents(&self, repo: &RepoId, path: &str) -> Option<Value> {
        let route = format!("/repos/{}/{}/contents/{}", repo.owner, repo.name, path);
        self.api.rest(&route, &[])
    }

    /// Try each candidate path in turn, returning the first one which is a
    /// downloadable file.
    pub fn probe(&self, repo: &RepoId, candidates: &[&str]) -> Option<Hit> {
        for path in candidates {
            let entry = match self.contents(repo, path) {
                Some(ref v) if v.is_object() => parse::<ContentEntry>(v),
                _ => None,
            };

            if let Some(download_url) = entry.and_then(|e| e.download_url) {
                debug!("Found {} in {}", path, repo);
                return Some(Hit {
                    path: path.to_string(),
                    download_url,
                });
            }
        }

        None
    }

    /// List a directory, giving `None` if it doesn't exist (or is a file).
    fn list_dir(&self, repo: &RepoId, path: &str) -> Option<Vec<ContentEntry>> {
        match self.contents(repo, path) {
            Some(Value::Array(entries)) => {
                Some(entries.iter().filter_map(parse::<ContentEntry>).collect())
            }
            _ => None,
        }
    }

    pub fn contributing(&self, repo: &RepoId) -> ProbedFile {
        match self.probe(repo, CONTRIBUTING) {
            Some(hit) => ProbedFile {
                found: true,
                path: Some(hit.path),
                download_url: Some(hit.download_url),
            },
            None => ProbedFile::default(),
        }
    }

    /// Look for a code of conduct, keeping a short preview of its text.
    pub fn code_of_conduct(&self, repo: &RepoId) -> CodeOfConduct {
        let hit = match self.probe(repo, CODE_OF_CONDUCT) {
            Some(hit) => hit,
            None => return CodeOfConduct::default(),
        };

        let preview = self
            .api
            .download(&hit.download_url)
            .map(|text| text.chars().take(PREVIEW_CHARS).collect());

        CodeOfConduct {
            found: true,
            path: Some(hit.path),
            download_url: Some(hit.download_url),
            preview,
        }
    }

    pub fn issue_template(&self, repo: &RepoId) -> IssueTemplate {
        let entries = match self.list_dir(repo, ISSUE_TEMPLATE_DIR) {
            Some(entries) => entries,
            None => return IssueTemplate::default(),
        };

        let has_issue_template = entries.iter().any(|e| {
            e.name
                .as_ref()
                .map(|n| n.to_lowercase().contains("issue"))
                .unwrap_or(false)
        });

        IssueTemplate {
            has_issue_template,
            files: entries.into_iter().map(|e| e.name).collect(),
        }
    }

    pub fn pr_template(&self, repo: &RepoId) -> PrTemplate {
        if let Some(hit) = self.probe(repo, PR_TEMPLATE) {
            return PrTemplate {
                has_pr_template: true,
                path: Some(hit.path),
                download_url: Some(hit.download_url),
            };
        }

        match self.list_dir(repo, PR_TEMPLATE_DIR) {
            Some(ref entries) if !entries.is_empty() => PrTemplate {
                has_pr_template: true,
                path: Some(format!("{}/", PR_TEMPLATE_DIR)),
                download_url: None,
            },
            _ => PrTemplate::default(),
        }
    }
}
