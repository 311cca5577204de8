use anyhow::{Context, Result};
use managed_buckets::{
    CommonObjectStore, ObjectStoreFactory, SqliteRegistry, WaitPolicy,
    config::{AppConfig, BucketArgs, Command, OwnerArgs},
    models::{CreateBucketRequest, Owner, Secret},
};
use serde::de::DeserializeOwned;
use std::{fs, path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting managed-buckets with config: {:?}", cfg);

    // --- Ensure database directory exists ---
    if let Some(parent) = cfg.database_path().as_deref().and_then(Path::parent) {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {}", parent.display()))?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    // --- Initialize registry ---
    tracing::debug!("Connecting using raw URL => {}", cfg.database_url);
    let registry = SqliteRegistry::connect(&cfg.database_url)
        .await
        .with_context(|| format!("opening registry at {}", cfg.database_url))?;

    let executed = registry.migrate().await.context("running migrations")?;
    if command == Command::Migrate {
        tracing::info!("Database migration complete ({} statements).", executed);
        return Ok(());
    }

    // --- Cancel in-flight waits on Ctrl-C ---
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling pending wait");
                cancel.cancel();
            }
        }
    });
    let wait = WaitPolicy::new(cfg.wait_timeout, cfg.poll_interval).with_cancellation(cancel);

    let factory = ObjectStoreFactory::new(Arc::new(registry), reqwest::Client::new());

    match command {
        Command::Migrate => {}
        Command::Create(args) => {
            let (secret, owner, request) = load_bucket_args(&args)?;
            let store = factory.create_common_object_store_buckets(&request, &secret, &owner)?;
            store.create_bucket(&request.name, &wait).await?;
            tracing::info!("Created bucket {} at {}", request.name, store.provider());
        }
        Command::Delete(args) => {
            let (secret, owner, request) = load_bucket_args(&args)?;
            let store = factory.create_common_object_store_buckets(&request, &secret, &owner)?;
            store.delete_bucket(&request.name, &wait).await?;
            tracing::info!("Deleted bucket {} at {}", request.name, store.provider());
        }
        Command::List(args) => {
            let (secret, owner) = load_owner_args(&args)?;
            let store = factory.list_common_object_store_buckets(&secret, &owner)?;
            let inventory = store.list_buckets().await?;
            println!("{}", serde_json::to_string_pretty(&inventory)?);
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn load_owner_args(args: &OwnerArgs) -> Result<(Secret, Owner)> {
    let secret: Secret = read_json(&args.secret)?;
    Ok((secret, Owner::new(args.owner, args.login.clone())))
}

fn load_bucket_args(args: &BucketArgs) -> Result<(Secret, Owner, CreateBucketRequest)> {
    let (secret, owner) = load_owner_args(&args.owner)?;
    let request = read_json(&args.request)?;
    Ok((secret, owner, request))
}
