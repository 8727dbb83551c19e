use crate::classify::{Cutoff, DateTally};
use crate::collect;
use crate::confirm::Confirm;
use crate::email::EmailParser;
use crate::execute::{self, IndexJob, PoolConfig};
use crate::progress::{create_progress_bar, RunCounters, Summary};
use crate::store::DocumentStore;
use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// When indexed files get removed from the maildir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Each file right after it is indexed, without asking again.
    Inline,
    /// All indexed files in a second pass, after asking once more.
    Staged,
}

pub enum Mode<'a> {
    /// Only count emails on each side of the cutoff.
    Stats,
    Index {
        store: &'a dyn DocumentStore,
        delete: DeleteMode,
    },
}

/// How a run ended, when it did not fail.
#[derive(Debug, PartialEq, Eq)]
pub enum Finish {
    Aborted,
    Stats(DateTally),
    Archived(RunCounters),
}

pub struct Pipeline<'a, C, W> {
    pub maildir: PathBuf,
    pub cutoff: Cutoff,
    pub pool: PoolConfig,
    pub parser: &'a dyn EmailParser,
    pub confirm: C,
    pub out: W,
}

impl<'a, C: Confirm, W: Write> Pipeline<'a, C, W> {
    pub fn run(&mut self, mode: Mode) -> Result<Finish> {
        let paths = self.scan()?;

        let action = match mode {
            Mode::Stats => "check stats for",
            Mode::Index { .. } => "index",
        };
        let question = format!("Do you want to proceed to {} {} emails?", action, paths.len());
        if !self.confirm.confirm(&question) {
            writeln!(self.out, "---exit---")?;
            return Ok(Finish::Aborted);
        }

        match mode {
            Mode::Stats => self.count_dates(&paths).map(Finish::Stats),
            Mode::Index { store, delete } => {
                self.archive(store, delete, paths).map(Finish::Archived)
            }
        }
    }

    fn scan(&mut self) -> Result<Vec<PathBuf>> {
        writeln!(self.out, "Scanning mailbox: {}", self.maildir.display())?;
        let paths = collect::list_emails(&self.maildir)
            .with_context(|| format!("Failed to scan emails in {}", self.maildir.display()))?;
        if paths.is_empty() {
            bail!("No email found in {}", self.maildir.display());
        }
        writeln!(self.out, "Found {} email files", paths.len())?;
        Ok(paths)
    }

    /// Unparsable emails are left out of the counts.
    fn count_dates(&mut self, paths: &[PathBuf]) -> Result<DateTally> {
        let progress = create_progress_bar(self.pool.quiet, paths.len());
        let parser = self.parser;
        let cutoff = self.cutoff;
        let tally = paths
            .par_iter()
            .fold(DateTally::default, |mut tally, path| {
                match parser.parse(path) {
                    Ok(email) => tally.record(&email, &cutoff),
                    Err(e) => debug!("Ignoring {}: {}", path.display(), e),
                }
                progress.inc(1);
                tally
            })
            .reduce(DateTally::default, DateTally::merge);
        progress.finish_and_clear();

        writeln!(self.out, "\n\n//////////RESULT////////////\n")?;
        writeln!(self.out, "Before {}: {}", self.cutoff, tally.before)?;
        writeln!(self.out, "After {}: {}", self.cutoff, tally.after)?;
        Ok(tally)
    }

    fn archive(
        &mut self,
        store: &dyn DocumentStore,
        delete: DeleteMode,
        paths: Vec<PathBuf>,
    ) -> Result<RunCounters> {
        let start = Instant::now();
        let job = IndexJob {
            parser: self.parser,
            store,
            cutoff: self.cutoff,
            delete_inline: delete == DeleteMode::Inline,
        };
        info!("Indexing {} emails with {} workers", paths.len(), self.pool.workers);
        let tally = execute::index_emails(&self.pool, &job, paths)?;
        let mut counters = tally.counters;
        let summary = Summary {
            counters,
            elapsed: start.elapsed(),
            with_deleted: delete == DeleteMode::Inline,
        };
        writeln!(self.out, "\n{}", summary)?;

        if delete == DeleteMode::Staged && counters.indexed > 0 {
            let question = format!("Do you want to delete the {} indexed files?", counters.indexed);
            if self.confirm.confirm(&question) {
                counters.deleted = self.delete(tally.indexed_paths)?;
            }
        }
        writeln!(self.out, "---exit---")?;
        Ok(counters)
    }

    fn delete(&mut self, paths: Vec<PathBuf>) -> Result<usize> {
        info!("Deleting {} indexed emails", paths.len());
        let deleted = execute::delete_emails(&self.pool, paths)?.counters.deleted;
        writeln!(self.out, "Done deleting {} emails", deleted)?;
        Ok(deleted)
    }
}
