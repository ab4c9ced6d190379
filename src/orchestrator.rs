//! Bringing a single repository's snapshot up to date.

use failure::{Error, ResultExt};
use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};

use crate::derivation;
use crate::errors::RepositoryUnavailable;
use crate::github::types::{Commit, Labels};
use crate::github::{GitHub, Pages};
use crate::poll::Poller;
use crate::repo::RepoId;
use crate::resource::Resource;
use crate::store::{Origin, SnapshotStore};

/// Where a repository is in its trip through the [`Orchestrator`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    Scanning,
    FetchingRequired,
    Derived,
    Complete,
    Failed,
}

/// What happened to a repository which made it to [`State::Complete`].
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The resources which were (re)written during this run, in the order
    /// they were written.
    pub written: Vec<Resource>,
}

impl Outcome {
    /// Was everything already on disk?
    pub fn already_complete(&self) -> bool {
        self.written.is_empty()
    }
}

/// The data for one resource, ready to be written.
struct Fetched {
    data: Value,
    truncated: bool,
}

impl Fetched {
    fn whole<T: Serialize>(item: &T) -> Result<Fetched, Error> {
        Ok(Fetched {
            data: serde_json::to_value(item)?,
            truncated: false,
        })
    }

    fn pages<T: Serialize>(pages: &Pages<T>) -> Result<Fetched, Error> {
        Ok(Fetched {
            data: serde_json::to_value(&pages.items)?,
            truncated: pages.truncated,
        })
    }
}

/// Fetches whatever a repository's snapshot is missing and writes it to a
/// [`SnapshotStore`]. Nothing is remembered between repositories.
pub struct Orchestrator<S> {
    store: S,
    github: GitHub,
    poller: Poller,
}

impl<S: SnapshotStore> Orchestrator<S> {
    pub fn new(store: S, github: GitHub, poller: Poller) -> Orchestrator<S> {
        Orchestrator {
            store,
            github,
            poller,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The resources which don't have a valid snapshot yet, in catalog
    /// order.
    pub fn missing(&self, repo: &RepoId) -> Vec<Resource> {
        Resource::ALL
            .iter()
            .cloned()
            .filter(|&r| !self.store.exists_and_valid(repo, r))
            .collect()
    }

    /// Fill in every missing resource for `repo`.
    ///
    /// Only a failed `general_info` lookup (or being unable to write to the
    /// store) is an error. Every other resource is best-effort.
    pub fn run(&self, repo: &RepoId) -> Result<Outcome, Error> {
        let mut state = State::Scanning;
        let missing = self.missing(repo);
        let mut written = Vec::new();

        if missing.is_empty() {
            transition(repo, &mut state, State::Complete);
            return Ok(Outcome { written });
        }

        debug!(
            "{} is missing {}",
            repo,
            missing
                .iter()
                .map(|r| r.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        transition(repo, &mut state, State::FetchingRequired);

        // Counting commits for `general_info` walks the whole history, so
        // hang onto it in case `commits` needs fetching too.
        let mut listing = None;

        for &resource in missing.iter().filter(|r| !r.is_derived()) {
            let fetched = match self.fetch(repo, resource, &mut listing) {
                Ok(f) => f,
                Err(e) => {
                    transition(repo, &mut state, State::Failed);
                    return Err(e);
                }
            };

            self.save(repo, resource, fetched)?;
            written.push(resource);
        }

        if missing.contains(&Resource::FirstCommitsByAuthor) {
            transition(repo, &mut state, State::Derived);
            let derived = self
                .first_commits_by_author(repo)
                .with_context(|_| format!("Unable to derive first commits for {}", repo))?;

            self.save(repo, Resource::FirstCommitsByAuthor, derived)?;
            written.push(Resource::FirstCommitsByAuthor);
        }

        transition(repo, &mut state, State::Complete);
        Ok(Outcome { written })
    }

    fn fetch(
        &self,
        repo: &RepoId,
        resource: Resource,
        listing: &mut Option<Pages<Commit>>,
    ) -> Result<Fetched, Error> {
        let gh = &self.github;
        debug!("Fetching {} for {}", resource, repo);

        match resource {
            Resource::GeneralInfo => match gh.general_info(repo) {
                Some((info, commits)) => {
                    // a short listing means a short commit count
                    let truncated = commits.truncated;
                    *listing = Some(commits);
                    Ok(Fetched {
                        data: serde_json::to_value(&info)?,
                        truncated,
                    })
                }
                None => Err(RepositoryUnavailable { repo: repo.clone() }.into()),
            },
            Resource::Commits => {
                let commits = match listing.take() {
                    Some(listing) => gh.add_commit_details(repo, listing),
                    None => gh.commits(repo),
                };
                Fetched::pages(&commits)
            }
            Resource::Forks => Fetched::pages(&gh.forks(repo)),
            Resource::Stars => Fetched::pages(&gh.stars(repo)),
            Resource::Contributors => Fetched::pages(&gh.contributors(repo)),
            Resource::PullRequests => Fetched::pages(&gh.pull_requests(repo)),
            Resource::Issues => Fetched::pages(&gh.issues(repo)),
            Resource::License => Fetched::whole(&gh.license(repo)),
            Resource::Readme => Fetched::whole(&gh.readme(repo)),
            Resource::Contributing => Fetched::whole(&gh.contributing(repo)),
            Resource::Languages => Fetched::whole(&gh.languages(repo)),
            Resource::WeeklyCommitActivity => {
                Fetched::whole(&self.poller.weekly_commit_activity(gh.api(), repo))
            }
            Resource::CodeOfConduct => Fetched::whole(&gh.code_of_conduct(repo)),
            Resource::IssueTemplate => Fetched::whole(&gh.issue_template(repo)),
            Resource::PrTemplate => Fetched::whole(&gh.pr_template(repo)),
            Resource::Labels => {
                let labels = gh.labels(repo);
                Ok(Fetched {
                    data: serde_json::to_value(Labels::from(labels.items))?,
                    truncated: labels.truncated,
                })
            }
            Resource::Maintainers => Fetched::pages(&gh.maintainers(repo)),
            Resource::OwnerInfo => Fetched::whole(&gh.owner_info(repo)),
            Resource::FirstCommitsByAuthor => self.first_commits_by_author(repo),
        }
    }

    /// Derive each author's first commit from the stored `commits`
    /// snapshot.
    fn first_commits_by_author(&self, repo: &RepoId) -> Result<Fetched, Error> {
        let snapshot = self
            .store
            .read(repo, Resource::Commits)?
            .ok_or_else(|| failure::err_msg("There is no commits snapshot"))?;

        let commits: Vec<Commit> = serde_json::from_value(snapshot.data)
            .context("The commits snapshot isn't a list of commits")?;
        let firsts = derivation::first_commits_by_author(&commits);
        debug!("{} has {} distinct authors", repo, firsts.len());

        Fetched::whole(&firsts)
    }

    fn save(&self, repo: &RepoId, resource: Resource, fetched: Fetched) -> Result<(), Error> {
        let origin = Origin::of(resource).truncated(fetched.truncated);
        self.store
            .write(repo, resource, fetched.data, origin)
            .with_context(|_| format!("Unable to save {} for {}", resource, repo))?;

        Ok(())
    }
}

fn transition(repo: &RepoId, state: &mut State, next: State) {
    debug!("{}: {:?} -> {:?}", repo, state, next);
    *state = next;
}

impl<S: Debug> Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("store", &self.store)
            .field("github", &self.github)
            .field("poller", &self.poller)
            .finish()
    }
}
