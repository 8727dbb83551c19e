use crate::classify::Cutoff;
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::env;
use std::path::PathBuf;

/// Environment names used by earlier deployments, with their current
/// replacement.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("ESHost", "ES_HOST"),
    ("ESIndex", "ES_INDEX"),
    ("MailBasePath", "MAIL_BASE_PATH"),
];

/// Values of legacy environment names to export under their current name.
/// A current name that is already set wins.
fn legacy_env(lookup: impl Fn(&str) -> Option<String>) -> Vec<(&'static str, String)> {
    LEGACY_ENV
        .iter()
        .filter(|(_, name)| lookup(name).is_none())
        .filter_map(|&(legacy, name)| lookup(legacy).map(|value| (name, value)))
        .collect()
}

#[derive(Debug, Parser)]
#[clap(name = "maildir-archive")]
#[clap(author, version, about)]
pub struct Args {
    /// cPanel account name.
    #[clap(long)]
    pub account: String,
    /// Email domain.
    #[clap(long)]
    pub domain: String,
    /// Email user, which is also the maildir name.
    #[clap(long)]
    pub user: String,
    /// Actual email owner, defaults to --user.
    #[clap(long)]
    pub actual_user: Option<String>,
    /// Archive emails before this date (YYYY-MM-DD).
    #[clap(long, default_value = "2024-01-01", value_parser = Cutoff::parse)]
    pub before: Cutoff,
    /// Show date statistics without indexing.
    #[clap(long)]
    pub stats: bool,
    /// Delete each email right after indexing it successfully.
    #[clap(long, conflicts_with = "stats")]
    pub delete: bool,
    /// Suppress any progress bar if set.
    #[clap(short, long)]
    pub quiet: bool,
    /// Number of concurrent workers.
    #[clap(
        long,
        default_value_t = 20,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=1024)
    )]
    pub workers: usize,
    /// Number of paths allowed to wait in the work queue.
    #[clap(
        long,
        default_value_t = 100,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..=1_000_000)
    )]
    pub queue_capacity: usize,
    /// Elasticsearch endpoint.
    #[clap(long, env = "ES_HOST", default_value = "http://localhost:9200")]
    pub es_host: String,
    /// Elasticsearch index the emails go into.
    #[clap(long, env = "ES_INDEX", default_value = "mail-archive")]
    pub es_index: String,
    /// Directory holding the cPanel accounts.
    #[clap(long, env = "MAIL_BASE_PATH", default_value = "/home")]
    pub mail_base: PathBuf,
    /// The maildir of the user, which is mail_base/account/mail/domain/user.
    #[clap(skip)]
    pub maildir: PathBuf,
}

impl Args {
    pub fn parse_args() -> Self {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!("no .env file loaded: {}", e);
        }
        for (name, value) in legacy_env(|name| env::var(name).ok()) {
            tracing::warn!("using deprecated environment variable for {}", name);
            env::set_var(name, value);
        }
        let mut result: Self = Self::parse();
        result.maildir = result.mail_path();
        result
    }

    fn mail_path(&self) -> PathBuf {
        self.mail_base
            .join(&self.account)
            .join("mail")
            .join(&self.domain)
            .join(&self.user)
    }

    /// Address the archived emails are attributed to.
    pub fn owner(&self) -> String {
        let owner = self.actual_user.as_deref().unwrap_or(&self.user);
        format!("{}@{}", owner, self.domain)
    }
}
