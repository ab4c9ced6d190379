use failure::Error;
use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};

use crate::orchestrator::{Orchestrator, Outcome};
use crate::repo::{InputRow, RepoId};
use crate::store::SnapshotStore;

/// Walks a batch of repositories, one at a time, making sure one bad
/// repository never stops the rest.
#[derive(Debug)]
pub struct Driver<S> {
    orchestrator: Orchestrator<S>,
}

impl<S: SnapshotStore> Driver<S> {
    pub fn new(orchestrator: Orchestrator<S>) -> Driver<S> {
        Driver { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator<S> {
        &self.orchestrator
    }

    /// Snapshot every repository in `rows`, in order. Failed repositories
    /// aren't retried, running the batch again picks up where this one
    /// left off.
    pub fn run(&self, rows: &[InputRow]) -> Summary {
        info!("Processing {} rows", rows.len());
        let mut summary = Summary::new(rows.len());

        for (i, row) in rows.iter().enumerate() {
            let repo = match row.repo_id() {
                Some(repo) => repo,
                None => {
                    warn!(
                        "Skipping row {}, no repository in columns {:?}",
                        i + 1,
                        row.keys()
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            info!("[{}/{}] {}", i + 1, rows.len(), repo);

            match self.snapshot(&repo) {
                Ok(outcome) => {
                    if outcome.already_complete() {
                        debug!("{} was already complete", repo);
                        summary.already_complete += 1;
                    }
                    summary.processed += 1;
                }
                Err(e) => {
                    warn!("Snapshotting {} failed, {}", repo, e);
                    summary.failures.push((repo, e));
                }
            }
        }

        info!("{}", summary.tally());
        summary
    }

    /// Run the orchestrator, turning a panic into an ordinary error so it
    /// only costs us the one repository.
    fn snapshot(&self, repo: &RepoId) -> Result<Outcome, Error> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.orchestrator.run(repo))) {
            Ok(result) => result,
            Err(payload) => Err(failure::err_msg(format!(
                "Panicked while snapshotting {}: {}",
                repo,
                panic_message(&*payload)
            ))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

/// The outcome of a batch.
#[derive(Debug)]
pub struct Summary {
    /// How many input rows there were.
    pub total: usize,
    /// Repositories which are now complete, including those which already
    /// were.
    pub processed: usize,
    /// Rows without a usable repository identifier.
    pub skipped: usize,
    pub already_complete: usize,
    pub failures: Vec<(RepoId, Error)>,
}

impl Summary {
    fn new(total: usize) -> Summary {
        Summary {
            total,
            processed: 0,
            skipped: 0,
            already_complete: 0,
            failures: Vec::new(),
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn tally(&self) -> String {
        format!(
            "processed={} skipped={} failed={} total_rows={}",
            self.processed,
            self.skipped,
            self.failed(),
            self.total
        )
    }

    pub fn display<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        if !self.failures.is_empty() {
            writeln!(
                writer,
                "There were {} errors snapshotting repositories",
                self.failures.len()
            )?;
        }

        for &(ref repo, ref err) in &self.failures {
            writeln!(writer, "Error: {} failed with {}", repo, err)?;
            for cause in err.iter_chain().skip(1) {
                writeln!(writer, "\tCaused By: {}", cause)?;
            }
        }

        writeln!(writer, "{}", self.tally())?;

        Ok(())
    }
}
