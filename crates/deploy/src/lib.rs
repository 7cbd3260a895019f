//! Commit dispatch and deployment sinks for the staging engine.
//!
//! This crate provides:
//! - The `DeploymentSink` trait packages are handed to
//! - `Publisher`, which stages a final batch, assembles and deploys atomically
//! - Sinks: local filesystem and dry run

pub mod backends;
pub mod dispatch;
pub mod error;
pub mod sink;

pub use backends::{DryRunSink, FilesystemSink, ModuleEntry, PackageManifest};
pub use dispatch::{Publisher, deploy};
pub use error::{DeployError, DeployResult};
pub use sink::{CommitKind, CommitReceipt, CommitTarget, DeploymentSink};

use stager_core::config::DeployConfig;
use std::sync::Arc;

/// Create a deployment sink from configuration.
pub async fn from_config(config: &DeployConfig) -> DeployResult<Arc<dyn DeploymentSink>> {
    config.validate().map_err(DeployError::Config)?;

    match config {
        DeployConfig::Filesystem { path } => {
            let sink = FilesystemSink::new(path).await?;
            Ok(Arc::new(sink))
        }
        DeployConfig::DryRun => Ok(Arc::new(DryRunSink::new())),
    }
}
