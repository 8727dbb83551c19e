use crate::classify::{should_index, Cutoff};
use crate::document::to_document;
use crate::email::EmailParser;
use crate::progress::{Aggregator, Outcome, Tally};
use crate::store::DocumentStore;
use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded};
use rayon::ThreadPoolBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub workers: usize,
    /// Capacity of the work queue. The producer blocks when it is full.
    pub queue_capacity: usize,
    pub quiet: bool,
}

/// A path to process, with its position in the scan result.
#[derive(Debug)]
pub struct WorkItem {
    pub index: usize,
    pub path: PathBuf,
}

/// Everything the workers of the index phase share. None of it is mutated.
pub struct IndexJob<'a> {
    pub parser: &'a dyn EmailParser,
    pub store: &'a dyn DocumentStore,
    pub cutoff: Cutoff,
    /// Remove each file right after it has been indexed.
    pub delete_inline: bool,
}

/// Feeds `paths` in order through a bounded queue to `config.workers`
/// workers, each applying `process` to the items it takes, and returns the
/// aggregated outcomes once every worker has exited.
fn run_pool<F>(config: &PoolConfig, paths: Vec<PathBuf>, process: F) -> Result<Tally>
where
    F: Fn(usize, WorkItem) -> Outcome + Sync,
{
    // One more thread for the producer, the aggregator stays on ours.
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.workers + 1)
        .thread_name(|i| format!("archive-worker-{}", i))
        .build()
        .context("Failed to start worker pool")?;
    let (work_tx, work_rx) = bounded::<WorkItem>(config.queue_capacity);
    let (outcome_tx, outcome_rx) = unbounded();
    let aggregator = Aggregator::new(paths.len(), config.quiet);
    let process = &process;

    let tally = pool.in_place_scope(move |s| {
        s.spawn(move |_| {
            for (index, path) in paths.into_iter().enumerate() {
                if work_tx.send(WorkItem { index, path }).is_err() {
                    break;
                }
            }
            // Dropping work_tx closes the queue.
        });
        for worker in 0..config.workers {
            let work_rx = work_rx.clone();
            let outcome_tx = outcome_tx.clone();
            s.spawn(move |_| {
                for item in work_rx {
                    trace!("worker {} takes #{} {:?}", worker, item.index, item.path);
                    if outcome_tx.send(process(worker, item)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(work_rx);
        drop(outcome_tx);
        aggregator.run(outcome_rx)
    });
    Ok(tally)
}

fn remove_email(worker: usize, path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!("Worker {}: Failed to delete {}: {}", worker, path.display(), e);
            false
        }
    }
}

fn index_email(job: &IndexJob, worker: usize, item: WorkItem) -> Outcome {
    let email = match job.parser.parse(&item.path) {
        Ok(email) => email,
        Err(e) => {
            warn!("Worker {}: Failed to parse {}: {}", worker, item.path.display(), e);
            return Outcome::Failed;
        }
    };
    if !should_index(&email, &job.cutoff) {
        return Outcome::Skipped;
    }
    let (doc, id) = to_document(&email);
    if let Err(e) = job.store.write(&id, &doc) {
        warn!("Worker {}: Failed to index {}: {}", worker, item.path.display(), e);
        return Outcome::Failed;
    }
    let deleted = job.delete_inline && remove_email(worker, &item.path);
    Outcome::Indexed {
        path: item.path,
        deleted,
    }
}

/// Parses, filters and indexes every path.
pub fn index_emails(config: &PoolConfig, job: &IndexJob, paths: Vec<PathBuf>) -> Result<Tally> {
    run_pool(config, paths, |worker, item| index_email(job, worker, item))
}

/// Removes every path, which should all have been indexed before.
pub fn delete_emails(config: &PoolConfig, paths: Vec<PathBuf>) -> Result<Tally> {
    run_pool(config, paths, |worker, item| Outcome::Removed {
        deleted: remove_email(worker, &item.path),
    })
}
