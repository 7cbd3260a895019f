//! Deployment sink that installs nothing.

use crate::error::DeployResult;
use crate::sink::{CommitKind, CommitReceipt, DeploymentSink};
use async_trait::async_trait;
use stager_core::{ObjectAddress, OwnerId};
use stager_staging::Payload;
use uuid::Uuid;

/// Logs the shape of each payload and reports success.
///
/// Nothing is persisted, so receipts carry version 0.
#[derive(Debug, Default)]
pub struct DryRunSink;

impl DryRunSink {
    /// Create a dry-run sink.
    pub fn new() -> Self {
        Self
    }

    fn receipt(
        kind: CommitKind,
        owner: &OwnerId,
        object: Option<ObjectAddress>,
        payload: &Payload,
    ) -> CommitReceipt {
        tracing::info!(
            owner = %owner,
            kind = %kind,
            object = ?object,
            metadata_bytes = payload.metadata.len(),
            modules = payload.modules.len(),
            total_bytes = payload.total_bytes(),
            "Dry run: package not installed"
        );
        CommitReceipt {
            kind,
            owner: owner.clone(),
            object,
            version: 0,
            module_count: payload.modules.len(),
            total_bytes: payload.total_bytes(),
        }
    }
}

#[async_trait]
impl DeploymentSink for DryRunSink {
    async fn publish_to_account(
        &self,
        owner: &OwnerId,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt> {
        Ok(Self::receipt(CommitKind::Account, owner, None, payload))
    }

    async fn publish_to_object(
        &self,
        owner: &OwnerId,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt> {
        let object = ObjectAddress::derive(owner, Uuid::new_v4().as_bytes());
        Ok(Self::receipt(CommitKind::NewObject, owner, Some(object), payload))
    }

    async fn upgrade_object(
        &self,
        owner: &OwnerId,
        payload: &Payload,
        object: &ObjectAddress,
    ) -> DeployResult<CommitReceipt> {
        Ok(Self::receipt(
            CommitKind::UpgradeObject,
            owner,
            Some(*object),
            payload,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_dry_run_reports_payload_shape() {
        let sink = DryRunSink::new();
        let owner = OwnerId::new("alice").unwrap();
        let payload = Payload {
            metadata: Bytes::from_static(b"meta"),
            modules: vec![Bytes::from_static(b"abc")],
        };

        let receipt = sink.publish_to_account(&owner, &payload).await.unwrap();
        assert_eq!(receipt.version, 0);
        assert_eq!(receipt.module_count, 1);
        assert_eq!(receipt.total_bytes, 7);

        let object = ObjectAddress::from_bytes([1; 32]);
        let upgraded = sink.upgrade_object(&owner, &payload, &object).await.unwrap();
        assert_eq!(upgraded.object, Some(object));

        let created = sink.publish_to_object(&owner, &payload).await.unwrap();
        assert!(created.object.is_some());
    }
}
