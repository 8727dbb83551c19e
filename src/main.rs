mod args;
mod classify;
mod collect;
mod confirm;
mod document;
mod email;
mod execute;
mod pipeline;
mod progress;
mod store;

use anyhow::{Context, Result};
use args::Args;
use confirm::Prompter;
use email::MailParser;
use execute::PoolConfig;
use pipeline::{DeleteMode, Finish, Mode, Pipeline};
use std::io;
use std::process;
use store::{DocumentStore, ElasticStore};

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = do_main(&Args::parse_args()) {
        tracing::error!("{:#}", e);
        process::exit(1);
    }
}

fn do_main(args: &Args) -> Result<()> {
    let parser = MailParser::new(args.owner());
    let stdin = io::stdin();
    let mut pipeline = Pipeline {
        maildir: args.maildir.clone(),
        cutoff: args.before,
        pool: PoolConfig {
            workers: args.workers,
            queue_capacity: args.queue_capacity,
            quiet: args.quiet,
        },
        parser: &parser,
        confirm: Prompter::new(stdin.lock(), io::stdout()),
        out: io::stdout(),
    };

    let store;
    let mode = if args.stats {
        Mode::Stats
    } else {
        store = ElasticStore::connect(&args.es_host, &args.es_index)
            .with_context(|| format!("Failed to connect to Elasticsearch at {}", args.es_host))?;
        store
            .ensure_schema()
            .with_context(|| format!("Failed to create index {}", args.es_index))?;
        Mode::Index {
            store: &store,
            delete: if args.delete {
                DeleteMode::Inline
            } else {
                DeleteMode::Staged
            },
        }
    };

    match pipeline.run(mode)? {
        Finish::Aborted => tracing::info!("Aborted by user"),
        Finish::Stats(tally) => tracing::debug!("{:?}", tally),
        Finish::Archived(counters) => tracing::info!("Archived: {:?}", counters),
    }
    Ok(())
}
