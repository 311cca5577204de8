use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::{env, path::PathBuf, time::Duration};
use uuid::Uuid;

use crate::providers::waiter::{DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/managed_buckets.db";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Managed object-storage buckets across cloud providers")]
pub struct Args {
    /// Database URL (overrides MANAGED_BUCKETS_DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Seconds to wait for a bucket to appear or disappear (overrides MANAGED_BUCKETS_WAIT_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub wait_timeout_secs: Option<u64>,

    /// Seconds between existence polls (overrides MANAGED_BUCKETS_POLL_INTERVAL_SECS)
    #[arg(long, global = true)]
    pub poll_interval_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run migrations and exit
    Migrate,
    /// Register and provision a bucket
    Create(BucketArgs),
    /// Delete a managed bucket
    Delete(BucketArgs),
    /// List the buckets visible to a secret, reconciled with the registry
    List(OwnerArgs),
}

#[derive(ClapArgs, Debug, Clone, PartialEq)]
pub struct OwnerArgs {
    /// JSON secret file: {"type": "amazon|google|azure", "values": {...}}
    #[arg(long)]
    pub secret: PathBuf,

    /// Id of the user the buckets belong to
    #[arg(long)]
    pub owner: Uuid,

    #[arg(long, default_value = "")]
    pub login: String,
}

#[derive(ClapArgs, Debug, Clone, PartialEq)]
pub struct BucketArgs {
    #[command(flatten)]
    pub owner: OwnerArgs,

    /// JSON request file: {"name": "...", "properties": {"amazon": {...}}}
    #[arg(long)]
    pub request: PathBuf,
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Result<Duration> {
    match lookup(key) {
        Some(value) => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        // Parse CLI once
        let args = Args::parse();
        let cfg = Self::merge(&args, |key| env::var(key).ok())?;
        Ok((cfg, args.command))
    }

    /// Merge CLI overrides over values found through `lookup`.
    pub fn merge(args: &Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // --- Environment fallback ---
        let env_db = lookup("MANAGED_BUCKETS_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());
        let env_timeout = parse_secs(&lookup, "MANAGED_BUCKETS_WAIT_TIMEOUT_SECS", DEFAULT_WAIT_TIMEOUT)?;
        let env_interval = parse_secs(&lookup, "MANAGED_BUCKETS_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL)?;

        // --- Merge ---
        Ok(Self {
            database_url: args.database_url.clone().unwrap_or(env_db),
            wait_timeout: args.wait_timeout_secs.map(Duration::from_secs).unwrap_or(env_timeout),
            poll_interval: args.poll_interval_secs.map(Duration::from_secs).unwrap_or(env_interval),
        })
    }

    /// Local file behind a `sqlite://` URL, if it names one.
    pub fn database_path(&self) -> Option<PathBuf> {
        let path = self
            .database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        let path = path.split('?').next().unwrap_or_default();
        if path.is_empty() || path.starts_with(":memory:") {
            return None;
        }
        Some(PathBuf::from(path))
    }
}
