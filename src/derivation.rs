//! Resources computed from data we've already fetched, without touching
//! the network.
//!
//! The only one so far is each author's first commit, labelled with a rough
//! guess at what kind of change it was. The guess comes from an ordered
//! [`RULES`] table: the first rule that matches wins, and every message rule
//! comes before every file rule so the commit message always dominates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use crate::github::types::Commit;

/// What a commit mostly touched.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Code,
    Docs,
    Config,
    Test,
    Ci,
}

impl Display for CommitType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match *self {
            CommitType::Code => "code",
            CommitType::Docs => "docs",
            CommitType::Config => "config",
            CommitType::Test => "test",
            CommitType::Ci => "ci",
        };
        f.write_str(name)
    }
}

/// How a [`Rule`] decides whether it applies.
#[derive(Copy, Clone)]
pub enum Matcher {
    /// Any word in the commit message is one of these.
    Keywords(&'static [&'static str]),
    /// Every changed file satisfies the predicate (and there's at least one).
    Files(fn(&str) -> bool),
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Matcher::Keywords(words) => f.debug_tuple("Keywords").field(&words).finish(),
            Matcher::Files(_) => f.debug_tuple("Files").finish(),
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Rule {
    pub label: CommitType,
    pub matcher: Matcher,
}

impl Rule {
    pub fn matches(&self, commit: &Commit) -> bool {
        match self.matcher {
            Matcher::Keywords(keywords) => {
                let message = commit.message.as_ref().map(|m| m.to_lowercase());
                message
                    .as_ref()
                    .map(|m| words(m).any(|w| keywords.contains(&w)))
                    .unwrap_or(false)
            }
            Matcher::Files(predicate) => {
                !commit.files_changed.is_empty()
                    && commit.files_changed.iter().all(|f| predicate(f))
            }
        }
    }
}

const CI_WORDS: &[&str] = &[
    "ci", "workflow", "workflows", "travis", "jenkins", "jenkinsfile", "pipeline", "docker",
    "dockerfile", "appveyor", "circleci", "actions",
];
const DOCS_WORDS: &[&str] = &[
    "doc", "docs", "documentation", "readme", "changelog", "typo", "typos", "docstring",
    "doxygen", "comment", "comments",
];
const TEST_WORDS: &[&str] = &[
    "test", "tests", "testing", "unittest", "gtest", "pytest", "coverage",
];
const CONFIG_WORDS: &[&str] = &[
    "config", "configuration", "configure", "settings", "cmake", "dependency", "dependencies",
    "deps", "bump",
];

/// The classification rules, highest priority first.
pub const RULES: &[Rule] = &[
    Rule {
        label: CommitType::Ci,
        matcher: Matcher::Keywords(CI_WORDS),
    },
    Rule {
        label: CommitType::Docs,
        matcher: Matcher::Keywords(DOCS_WORDS),
    },
    Rule {
        label: CommitType::Test,
        matcher: Matcher::Keywords(TEST_WORDS),
    },
    Rule {
        label: CommitType::Config,
        matcher: Matcher::Keywords(CONFIG_WORDS),
    },
    Rule {
        label: CommitType::Ci,
        matcher: Matcher::Files(is_ci_file),
    },
    Rule {
        label: CommitType::Docs,
        matcher: Matcher::Files(is_doc_file),
    },
    Rule {
        label: CommitType::Test,
        matcher: Matcher::Files(is_test_file),
    },
    Rule {
        label: CommitType::Config,
        matcher: Matcher::Files(is_config_file),
    },
];

fn words<'a>(message: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
}

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_lowercase()
}

fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    let dot = name.rfind('.')?;
    Some(name[dot + 1..].to_string())
}

fn is_ci_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    let name = file_name(path);

    lower.starts_with(".github/")
        || lower.starts_with(".circleci/")
        || name == ".travis.yml"
        || name == ".gitlab-ci.yml"
        || name == "jenkinsfile"
        || name == "appveyor.yml"
        || name.starts_with("dockerfile")
        || name.starts_with("docker-compose")
        || name == ".dockerignore"
        || lower.split('/').any(|segment| segment == "docker")
}

fn is_doc_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    let name = file_name(path);

    if name == "cmakelists.txt" {
        return false;
    }

    let doc_ext = match extension(path) {
        Some(ref ext) => ["md", "rst", "txt", "adoc", "markdown", "dox"].contains(&ext.as_str()),
        None => false,
    };

    doc_ext
        || lower.starts_with("doc/")
        || lower.starts_with("docs/")
        || name.starts_with("readme")
        || name.starts_with("changelog")
        || name.starts_with("license")
}

fn is_test_file(path: &str) -> bool {
    let lower = path.to_lowercase();
    let name = file_name(path);
    let stem = name.split('.').next().unwrap_or("");

    lower
        .split('/')
        .any(|segment| segment == "test" || segment == "tests" || segment == "testing")
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_tests")
}

fn is_config_file(path: &str) -> bool {
    let name = file_name(path);

    if ["cmakelists.txt", "package.xml", "setup.cfg", ".gitignore"].contains(&name.as_str()) {
        return true;
    }

    match extension(path) {
        Some(ref ext) => [
            "yml", "yaml", "json", "toml", "xml", "ini", "cfg", "conf", "cmake", "repos", "rosinstall",
        ]
        .contains(&ext.as_str()),
        None => false,
    }
}

/// Work out what kind of change a commit was.
pub fn classify(commit: &Commit) -> CommitType {
    RULES
        .iter()
        .find(|rule| rule.matches(commit))
        .map(|rule| rule.label)
        .unwrap_or(CommitType::Code)
}

/// Who made a commit: their login if GitHub linked it to an account,
/// otherwise the name on the commit.
pub fn author_identity(commit: &Commit) -> String {
    fn present(id: &Option<String>) -> Option<&str> {
        id.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    present(&commit.author_login)
        .or_else(|| present(&commit.author_name))
        .unwrap_or("unknown")
        .to_string()
}

/// Parse an ISO-8601 timestamp or a bare `YYYY-MM-DD` date. Anything
/// without an offset is taken to be UTC.
fn parse_date(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// An author's earliest commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstCommit {
    pub author: String,
    pub commit_type: CommitType,
    #[serde(flatten)]
    pub commit: Commit,
}

/// Pick out each author's chronologically first commit.
///
/// Commits with a readable date always beat ones without, and ties (or a
/// group with no readable dates at all) go to whichever came first in
/// `commits`. The result is ordered by each author's first appearance.
pub fn first_commits_by_author(commits: &[Commit]) -> Vec<FirstCommit> {
    let mut order: Vec<String> = Vec::new();
    let mut earliest: HashMap<String, (usize, Option<DateTime<Utc>>)> = HashMap::new();

    for (index, commit) in commits.iter().enumerate() {
        let author = author_identity(commit);
        let date = commit.date.as_ref().and_then(|d| parse_date(d));

        match earliest.get(&author) {
            None => {
                order.push(author.clone());
                earliest.insert(author, (index, date));
            }
            Some(&(_, current)) => {
                let better = match (date, current) {
                    (Some(new), Some(old)) => new < old,
                    (Some(_), None) => true,
                    _ => false,
                };

                if better {
                    earliest.insert(author, (index, date));
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|author| {
            let &(index, _) = earliest.get(&author)?;
            let commit = commits[index].clone();

            Some(FirstCommit {
                commit_type: classify(&commit),
                author,
                commit,
            })
        })
        .collect()
}
