//! Command-line driver for staged package uploads.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use stager_core::config::AppConfig;
use stager_core::{ObjectAddress, OwnerId};
use stager_deploy::{CommitKind, CommitTarget, Publisher};
use stager_staging::{StageBatch, StagingRegistry, split_payload};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stagerctl")]
#[command(about = "Stage and publish chunked packages")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "STAGER_CONFIG",
        default_value = "config/stager.toml"
    )]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a payload would be split into stage calls
    Plan {
        /// Package metadata file
        #[arg(long)]
        metadata: PathBuf,
        /// Maximum payload bytes per call (overrides config)
        #[arg(long)]
        max_call_bytes: Option<usize>,
        /// Module files, in index order
        #[arg(value_name = "MODULE", required = true)]
        modules: Vec<PathBuf>,
    },
    /// Stage a payload and commit it to the configured sink
    Publish {
        /// Owner identity publishing the package
        #[arg(long)]
        owner: String,
        /// Package metadata file
        #[arg(long)]
        metadata: PathBuf,
        /// Commit target: account, object or upgrade
        #[arg(long, default_value = "account")]
        target: String,
        /// Object address to upgrade (upgrade only)
        #[arg(long)]
        object: Option<String>,
        /// Maximum payload bytes per call (overrides config)
        #[arg(long)]
        max_call_bytes: Option<usize>,
        /// Module files, in index order
        #[arg(value_name = "MODULE", required = true)]
        modules: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Cli { config, command } = Cli::parse();
    let config = load_config(Path::new(&config))?;

    match command {
        Commands::Plan {
            metadata,
            max_call_bytes,
            modules,
        } => {
            let max_call_bytes = max_call_bytes.unwrap_or(config.client.max_call_bytes);
            handle_plan(&metadata, &modules, max_call_bytes).await
        }
        Commands::Publish {
            owner,
            metadata,
            target,
            object,
            max_call_bytes,
            modules,
        } => {
            let max_call_bytes = max_call_bytes.unwrap_or(config.client.max_call_bytes);
            handle_publish(
                &config,
                &owner,
                &metadata,
                &target,
                object.as_deref(),
                &modules,
                max_call_bytes,
            )
            .await
        }
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path.display());
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("STAGER_").ignore(&["CONFIG"]).split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn read_payload(metadata: &Path, modules: &[PathBuf]) -> Result<(Bytes, Vec<Bytes>)> {
    let meta = tokio::fs::read(metadata)
        .await
        .with_context(|| format!("failed to read metadata {}", metadata.display()))?;

    let mut bodies = Vec::with_capacity(modules.len());
    for path in modules {
        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read module {}", path.display()))?;
        bodies.push(Bytes::from(body));
    }
    Ok((Bytes::from(meta), bodies))
}

async fn handle_plan(metadata: &Path, modules: &[PathBuf], max_call_bytes: usize) -> Result<()> {
    let (meta, bodies) = read_payload(metadata, modules).await?;
    let batches = split_payload(&meta, &bodies, max_call_bytes).context("failed to plan upload")?;

    for (n, batch) in batches.iter().enumerate() {
        println!("{}", describe_batch(n, batch));
    }
    Ok(())
}

fn describe_batch(n: usize, batch: &StageBatch) -> String {
    let indices = batch
        .indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "call {n}: metadata={} indices=[{indices}] bytes={}",
        batch.metadata.len(),
        batch.payload_bytes()
    )
}

async fn handle_publish(
    config: &AppConfig,
    owner: &str,
    metadata: &Path,
    target: &str,
    object: Option<&str>,
    modules: &[PathBuf],
    max_call_bytes: usize,
) -> Result<()> {
    let owner = OwnerId::new(owner).context("invalid owner")?;
    let kind: CommitKind = target.parse()?;
    let object = object
        .map(ObjectAddress::from_hex)
        .transpose()
        .context("invalid object address")?;
    let target = CommitTarget::from_kind(kind, object)?;

    let (meta, bodies) = read_payload(metadata, modules).await?;
    let mut batches =
        split_payload(&meta, &bodies, max_call_bytes).context("failed to plan upload")?;
    let last = batches
        .pop()
        .context("upload plan produced no calls")?;

    let sink = stager_deploy::from_config(&config.deploy)
        .await
        .context("failed to initialize deployment sink")?;
    let registry = Arc::new(StagingRegistry::from_config(&config.staging));
    let publisher = Publisher::new(registry, sink);

    tracing::info!(
        owner = %owner,
        target = %kind,
        calls = batches.len() + 1,
        modules = bodies.len(),
        "Publishing package"
    );

    let result = async {
        for batch in &batches {
            publisher.stage_chunk(&owner, batch).await?;
        }
        publisher.commit(&owner, &last, target).await
    }
    .await;

    match result {
        Ok(receipt) => {
            println!("{}", serde_json::to_string_pretty(&receipt)?);
            Ok(())
        }
        Err(e) => {
            if let Err(cleanup_err) = publisher.cleanup(&owner).await {
                tracing::debug!(error = %cleanup_err, "Nothing to clean up");
            }
            Err(anyhow::Error::new(e).context("publish failed"))
        }
    }
}
