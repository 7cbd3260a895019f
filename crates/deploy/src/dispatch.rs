//! Commit dispatchers: stage, assemble, hand off to a sink, clean up.

use crate::error::DeployResult;
use crate::sink::{CommitReceipt, CommitTarget, DeploymentSink};
use stager_core::{ObjectAddress, OwnerId};
use stager_staging::{AreaStatus, Payload, StageBatch, StagingRegistry};
use std::sync::Arc;
use std::time::Instant;

/// Entry point for every staging and commit operation.
#[derive(Clone)]
pub struct Publisher {
    registry: Arc<StagingRegistry>,
    sink: Arc<dyn DeploymentSink>,
}

impl Publisher {
    /// Create a publisher over a registry and a deployment sink.
    pub fn new(registry: Arc<StagingRegistry>, sink: Arc<dyn DeploymentSink>) -> Self {
        Self { registry, sink }
    }

    /// Stage one batch for `owner`.
    pub async fn stage_chunk(
        &self,
        owner: &OwnerId,
        batch: &StageBatch,
    ) -> DeployResult<AreaStatus> {
        Ok(self.registry.stage_chunk(owner, batch).await?)
    }

    /// Stage a final batch and publish the package under `owner`'s account.
    pub async fn stage_and_publish_to_account(
        &self,
        owner: &OwnerId,
        batch: &StageBatch,
    ) -> DeployResult<CommitReceipt> {
        self.commit(owner, batch, CommitTarget::Account).await
    }

    /// Stage a final batch and publish the package to a new object.
    pub async fn stage_and_publish_to_object(
        &self,
        owner: &OwnerId,
        batch: &StageBatch,
    ) -> DeployResult<CommitReceipt> {
        self.commit(owner, batch, CommitTarget::NewObject).await
    }

    /// Stage a final batch and replace the package at `object`.
    pub async fn stage_and_upgrade_object(
        &self,
        owner: &OwnerId,
        batch: &StageBatch,
        object: ObjectAddress,
    ) -> DeployResult<CommitReceipt> {
        self.commit(owner, batch, CommitTarget::UpgradeObject(object))
            .await
    }

    /// Abort `owner`'s upload, discarding everything staged.
    pub async fn cleanup(&self, owner: &OwnerId) -> DeployResult<()> {
        Ok(self.registry.cleanup(owner).await?)
    }

    /// Snapshot `owner`'s upload.
    pub async fn status(&self, owner: &OwnerId) -> DeployResult<AreaStatus> {
        Ok(self.registry.status(owner).await?)
    }

    /// Stage `batch`, assemble, deploy to `target` and clean up.
    ///
    /// The whole call is one unit of work: if staging, assembly or the sink
    /// fails, the owner's area is left exactly as it was before the call and
    /// the commit can be retried.
    #[tracing::instrument(
        skip(self, batch, target),
        fields(owner = %owner, commit = %target.kind(), chunks = batch.indices.len())
    )]
    pub async fn commit(
        &self,
        owner: &OwnerId,
        batch: &StageBatch,
        target: CommitTarget,
    ) -> DeployResult<CommitReceipt> {
        let start = Instant::now();
        let mut txn = self.registry.begin(owner).await;
        txn.stage(batch)?;
        let payload = txn.assemble()?;

        let receipt = match deploy(self.sink.as_ref(), owner, &payload, &target).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    code = e.code(),
                    "Deployment failed, staging area kept for retry"
                );
                return Err(e);
            }
        };

        txn.destroy()?;
        tracing::info!(
            version = receipt.version,
            object = ?receipt.object,
            modules = receipt.module_count,
            total_bytes = receipt.total_bytes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Package committed"
        );
        Ok(receipt)
    }
}

/// Forward an assembled payload to the sink entry point for `target`.
pub async fn deploy(
    sink: &dyn DeploymentSink,
    owner: &OwnerId,
    payload: &Payload,
    target: &CommitTarget,
) -> DeployResult<CommitReceipt> {
    match target {
        CommitTarget::Account => sink.publish_to_account(owner, payload).await,
        CommitTarget::NewObject => sink.publish_to_object(owner, payload).await,
        CommitTarget::UpgradeObject(object) => sink.upgrade_object(owner, payload, object).await,
    }
}
