//! Statistics GitHub computes in the background.
//!
//! The first request for a repository's commit activity usually comes back
//! `202 Accepted` while GitHub works the numbers out, so we keep asking
//! (with a fixed delay) until they're ready or we run out of patience.

use serde_json::Value;
use std::fmt::{self, Debug, Formatter};
use std::thread;
use std::time::Duration;

use crate::config::StatsConfig;
use crate::github::types::{parse, RawWeek, WeeklyCommits};
use crate::http::{Api, Request};
use crate::repo::RepoId;

/// The status GitHub uses for "still computing, try again later".
const COMPUTING: u16 = 202;

/// Something that can pause the current thread.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Polls the weekly commit activity endpoint. Retries and backoff belong
/// entirely to whoever owns the `Poller`.
pub struct Poller {
    retries: u32,
    delay: Duration,
    sleeper: Box<dyn Sleeper>,
}

impl Poller {
    pub fn new<S: Sleeper + 'static>(retries: u32, delay: Duration, sleeper: S) -> Poller {
        Poller {
            retries,
            delay,
            sleeper: Box::new(sleeper),
        }
    }

    pub fn from_config(cfg: &StatsConfig) -> Poller {
        Poller::new(cfg.retries, cfg.delay(), ThreadSleeper)
    }

    /// Get the weekly commit totals for the last year. Anything other than
    /// success (including running out of retries) gives an empty list.
    pub fn weekly_commit_activity(&self, api: &Api, repo: &RepoId) -> Vec<WeeklyCommits> {
        let url = api.rest_url(&format!(
            "/repos/{}/{}/stats/commit_activity",
            repo.owner, repo.name
        ));

        for attempt in 1..=self.retries {
            let response = match api.send(&Request::get(url.as_str())) {
                Some(r) => r,
                None => return Vec::new(),
            };

            match response.status {
                200 => return normalize(response.into_json(&url).ok()),
                COMPUTING if attempt < self.retries => {
                    info!(
                        "Commit activity for {} is still being generated, waiting {:?} ({}/{})",
                        repo, self.delay, attempt, self.retries
                    );
                    self.sleeper.sleep(self.delay);
                }
                COMPUTING => {}
                other => {
                    warn!("Commit activity for {} failed with {}", repo, other);
                    return Vec::new();
                }
            }
        }

        warn!(
            "Gave up waiting for the commit activity of {} after {} attempts",
            repo, self.retries
        );
        Vec::new()
    }
}

fn normalize(body: Option<Value>) -> Vec<WeeklyCommits> {
    match body {
        Some(Value::Array(weeks)) => weeks
            .iter()
            .filter_map(parse::<RawWeek>)
            .map(WeeklyCommits::from)
            .collect(),
        _ => Vec::new(),
    }
}

impl Debug for Poller {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Poller")
            .field("retries", &self.retries)
            .field("delay", &self.delay)
            .finish()
    }
}
