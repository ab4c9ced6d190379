//! Repository identifiers and the resolved-repository input list.

use failure::{Error, ResultExt};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

const GITHUB_HOST: &str = "github.com/";

/// A GitHub repository, identified by its owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new<O, N>(owner: O, name: N) -> RepoId
    where
        O: Into<String>,
        N: Into<String>,
    {
        RepoId {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse an `"owner/name"` string. Anything after the second segment is
    /// ignored.
    pub fn from_full_name(full_name: &str) -> Option<RepoId> {
        let mut parts = full_name.trim().split('/');
        let owner = parts.next()?.trim();
        let name = parts.next()?.trim();

        RepoId::non_empty(owner, name)
    }

    /// Extract the owner and name from something shaped like
    /// `https://github.com/owner/name[/...][#...][?...]`.
    pub fn from_url(url: &str) -> Option<RepoId> {
        let start = url.find(GITHUB_HOST)? + GITHUB_HOST.len();
        let rest = &url[start..];

        let mut parts = rest.splitn(2, '/');
        let owner = parts.next()?;
        let tail = parts.next()?;
        let end = tail
            .find(|c: char| c == '/' || c == '#' || c == '?')
            .unwrap_or(tail.len());
        let name = &tail[..end];
        let name = name.trim_end_matches(".git");

        RepoId::non_empty(owner, name)
    }

    fn non_empty(owner: &str, name: &str) -> Option<RepoId> {
        if owner.is_empty() || name.is_empty() {
            None
        } else {
            Some(RepoId::new(owner, name))
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// The directory this repository's snapshots live in. `/` can't be used
    /// as the separator, so owner and name are joined with `__`.
    pub fn dir_name(&self) -> String {
        format!("{}__{}", self.owner, self.name)
    }
}

impl Display for RepoId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One row of the resolved-repository list, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputRow {
    pub columns: BTreeMap<String, String>,
}

impl InputRow {
    pub fn new<I, K, V>(columns: I) -> InputRow
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        InputRow {
            columns: columns
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.columns
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Work out which repository this row refers to, preferring
    /// `full_name`, then `html_url`, then `url`.
    pub fn repo_id(&self) -> Option<RepoId> {
        if let Some(full_name) = self.get("full_name") {
            if full_name.contains('/') {
                if let Some(id) = RepoId::from_full_name(full_name) {
                    return Some(id);
                }
            }
        }

        ["html_url", "url"]
            .iter()
            .filter_map(|key| self.get(key))
            .filter_map(RepoId::from_url)
            .next()
    }

    pub fn keys(&self) -> Vec<&str> {
        self.columns.keys().map(|k| k.as_str()).collect()
    }
}

/// Read the resolved-repository CSV (with a header row).
pub fn read_rows<P: AsRef<Path>>(path: P) -> Result<Vec<InputRow>, Error> {
    let path = path.as_ref();
    debug!("Reading repositories from {}", path.display());

    let mut reader = csv::Reader::from_path(path)
        .with_context(|_| format!("Unable to open {}", path.display()))?;

    let mut rows = Vec::new();

    for record in reader.deserialize() {
        let columns: BTreeMap<String, String> =
            record.context("Unable to parse a row of the repository list")?;
        rows.push(InputRow { columns });
    }

    debug!("Read {} rows", rows.len());
    Ok(rows)
}
