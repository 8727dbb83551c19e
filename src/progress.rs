use crossbeam_channel::Receiver;
use indicatif::ProgressBar;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How often, in indexed emails, the running totals are printed.
pub const REPORT_EVERY: usize = 100;

pub fn create_progress_bar(quiet: bool, len: usize) -> ProgressBar {
    if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(len as u64)
    }
}

/// What happened to a single work item. Workers send exactly one of these
/// per item they take off the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The email was written to the store. `deleted` tells whether the file
    /// was also removed afterwards.
    Indexed { path: PathBuf, deleted: bool },
    /// The email is not older than the cutoff.
    Skipped,
    /// The email could not be parsed or written.
    Failed,
    /// Result of removing an already indexed file in the delete phase.
    Removed { deleted: bool },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunCounters {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deleted: usize,
}

impl RunCounters {
    pub fn processed(&self) -> usize {
        self.indexed + self.skipped + self.failed
    }
}

/// Counters of a phase once its pool has drained.
#[derive(Debug, Default)]
pub struct Tally {
    pub counters: RunCounters,
    /// Paths of the indexed emails, in completion order.
    pub indexed_paths: Vec<PathBuf>,
}

/// Sole owner of the counters of a phase. It consumes the outcomes the
/// workers send until every sender is gone.
pub struct Aggregator {
    tally: Tally,
    total: usize,
    quiet: bool,
    progress: ProgressBar,
}

impl Aggregator {
    pub fn new(total: usize, quiet: bool) -> Self {
        Aggregator {
            tally: Tally::default(),
            total,
            quiet,
            progress: create_progress_bar(quiet, total),
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        let counters = &mut self.tally.counters;
        match outcome {
            Outcome::Indexed { path, deleted } => {
                counters.indexed += 1;
                if deleted {
                    counters.deleted += 1;
                }
                self.tally.indexed_paths.push(path);
                if counters.indexed % REPORT_EVERY == 0 {
                    self.report_progress();
                }
            }
            Outcome::Skipped => counters.skipped += 1,
            Outcome::Failed => counters.failed += 1,
            Outcome::Removed { deleted } => {
                if deleted {
                    counters.deleted += 1;
                }
            }
        }
        self.progress.inc(1);
    }

    fn report_progress(&self) {
        if self.quiet {
            return;
        }
        let line = progress_line(&self.tally.counters, self.total);
        self.progress.suspend(|| println!("{}", line));
    }

    pub fn run(mut self, outcomes: Receiver<Outcome>) -> Tally {
        for outcome in outcomes {
            self.record(outcome);
        }
        self.finish()
    }

    pub fn finish(self) -> Tally {
        self.progress.finish_and_clear();
        self.tally
    }
}

fn progress_line(counters: &RunCounters, total: usize) -> String {
    let percent = if total == 0 {
        100
    } else {
        counters.processed() * 100 / total
    };
    format!(
        "Indexed: {}, Skipped: {}, Failed: {}, Completed: {}%",
        counters.indexed, counters.skipped, counters.failed, percent
    )
}

/// Rounds to the nearest whole second.
pub fn round_to_secs(elapsed: Duration) -> Duration {
    Duration::from_secs(((elapsed.as_millis() + 500) / 1000) as u64)
}

/// The final report of the index phase.
pub struct Summary {
    pub counters: RunCounters,
    pub elapsed: Duration,
    /// Whether files were removed along with indexing.
    pub with_deleted: bool,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let c = &self.counters;
        write!(
            f,
            "Done! Indexed: {}, Skipped: {}, Failed: {}",
            c.indexed, c.skipped, c.failed
        )?;
        if self.with_deleted {
            write!(f, ", Deleted: {}", c.deleted)?;
        }
        write!(f, " in {}s", round_to_secs(self.elapsed).as_secs())
    }
}
