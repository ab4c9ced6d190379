//! Incremental, resumable snapshots of everything GitHub knows about a list
//! of repositories.
//!
//! Each repository gets a directory of JSON files, one per [`Resource`].
//! Anything already captured is left alone, so an interrupted batch can be
//! restarted and will only fetch what's still missing.

#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;

pub mod config;
pub mod derivation;
pub mod driver;
pub mod errors;
pub mod github;
pub mod http;
pub mod orchestrator;
pub mod poll;
pub mod repo;
pub mod resource;
pub mod store;

pub use crate::config::Config;
pub use crate::driver::{Driver, Summary};
pub use crate::errors::{FailedRequest, MissingCredential, RepositoryUnavailable};
pub use crate::github::GitHub;
pub use crate::orchestrator::{Orchestrator, Outcome, State};
pub use crate::poll::Poller;
pub use crate::repo::{InputRow, RepoId};
pub use crate::resource::Resource;
pub use crate::store::{FsStore, Snapshot, SnapshotStore};
