//! The errors encountered in this crate.

use crate::repo::RepoId;

/// The GitHub credential wasn't supplied.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "No API token found, set the {} environment variable", variable)]
pub struct MissingCredential {
    pub variable: String,
}

/// The core repository lookup failed, so nothing else about the repository
/// can be trusted (renamed, deleted, or made private).
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Unable to look up {}", repo)]
pub struct RepositoryUnavailable {
    pub repo: RepoId,
}

/// The server responded with a non-successful status code.
#[derive(Debug, Clone, PartialEq, Fail)]
#[fail(display = "Request to {} failed with {}", url, status)]
pub struct FailedRequest {
    pub status: u16,
    pub url: String,
}
