//! The fixed catalog of resources captured for every repository.

use std::fmt::{self, Display, Formatter};

/// Where a snapshot's data came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[serde(alias = "github_rest")]
    Rest,
    #[serde(alias = "github_graphql")]
    Graphql,
    Derived,
}

/// One independently fetchable (or derivable) piece of a repository's
/// snapshot.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    GeneralInfo,
    Commits,
    Forks,
    Stars,
    Contributors,
    PullRequests,
    Issues,
    License,
    Readme,
    Contributing,
    Languages,
    WeeklyCommitActivity,
    CodeOfConduct,
    IssueTemplate,
    PrTemplate,
    Labels,
    Maintainers,
    OwnerInfo,
    FirstCommitsByAuthor,
}

impl Resource {
    /// Every resource, in the order they get fetched. `GeneralInfo` comes
    /// first because a failed lookup aborts the rest of the repository.
    pub const ALL: [Resource; 19] = [
        Resource::GeneralInfo,
        Resource::Commits,
        Resource::Forks,
        Resource::Stars,
        Resource::Contributors,
        Resource::PullRequests,
        Resource::Issues,
        Resource::License,
        Resource::Readme,
        Resource::Contributing,
        Resource::Languages,
        Resource::WeeklyCommitActivity,
        Resource::CodeOfConduct,
        Resource::IssueTemplate,
        Resource::PrTemplate,
        Resource::Labels,
        Resource::Maintainers,
        Resource::OwnerInfo,
        Resource::FirstCommitsByAuthor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Resource::GeneralInfo => "general_info",
            Resource::Commits => "commits",
            Resource::Forks => "forks",
            Resource::Stars => "stars",
            Resource::Contributors => "contributors",
            Resource::PullRequests => "pull_requests",
            Resource::Issues => "issues",
            Resource::License => "license",
            Resource::Readme => "readme",
            Resource::Contributing => "contributing",
            Resource::Languages => "languages",
            Resource::WeeklyCommitActivity => "weekly_commit_activity",
            Resource::CodeOfConduct => "code_of_conduct",
            Resource::IssueTemplate => "issue_template",
            Resource::PrTemplate => "pr_template",
            Resource::Labels => "labels",
            Resource::Maintainers => "maintainers",
            Resource::OwnerInfo => "owner_info",
            Resource::FirstCommitsByAuthor => "first_commits_by_author",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }

    pub fn source(self) -> Source {
        match self {
            Resource::Stars | Resource::Issues => Source::Graphql,
            Resource::FirstCommitsByAuthor => Source::Derived,
            _ => Source::Rest,
        }
    }

    pub fn is_derived(self) -> bool {
        self.source() == Source::Derived
    }

    /// A human readable description of the endpoint the data comes from,
    /// recorded in each snapshot's metadata.
    pub fn endpoint(self) -> &'static str {
        match self {
            Resource::GeneralInfo => "/repos/{owner}/{repo}",
            Resource::Commits => "/repos/{owner}/{repo}/commits",
            Resource::Forks => "/repos/{owner}/{repo}/forks",
            Resource::Stars => "repository.stargazers(edges{starredAt,node{login}})",
            Resource::Contributors => "/repos/{owner}/{repo}/contributors",
            Resource::PullRequests => "/repos/{owner}/{repo}/pulls?state=all",
            Resource::Issues => "repository.issues(edges{node{...}})",
            Resource::License => "/repos/{owner}/{repo}/license",
            Resource::Readme => "/repos/{owner}/{repo}/readme",
            Resource::Contributing => "/repos/{owner}/{repo}/contents/<CONTRIBUTING*>",
            Resource::Languages => "/repos/{owner}/{repo}/languages",
            Resource::WeeklyCommitActivity => "/repos/{owner}/{repo}/stats/commit_activity",
            Resource::CodeOfConduct => "/repos/{owner}/{repo}/contents/<CODE_OF_CONDUCT*>",
            Resource::IssueTemplate => "/repos/{owner}/{repo}/contents/.github/ISSUE_TEMPLATE",
            Resource::PrTemplate => "/repos/{owner}/{repo}/contents/<PR_TEMPLATE*>",
            Resource::Labels => "/repos/{owner}/{repo}/labels",
            Resource::Maintainers => "/repos/{owner}/{repo}/collaborators?affiliation=direct",
            Resource::OwnerInfo => "/users/{owner}",
            Resource::FirstCommitsByAuthor => "derived:commits",
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
