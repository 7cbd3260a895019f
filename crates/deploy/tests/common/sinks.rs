//! In-memory deployment sinks for dispatcher tests.

use async_trait::async_trait;
use stager_core::{ObjectAddress, OwnerId};
use stager_deploy::{CommitKind, CommitReceipt, DeployError, DeployResult, DeploymentSink};
use stager_staging::Payload;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One call received by a sink.
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub struct RecordedCall {
    pub kind: CommitKind,
    pub owner: OwnerId,
    pub object: Option<ObjectAddress>,
    pub payload: Payload,
}

/// Sink that records every payload it receives.
///
/// The first `fail_times` calls are rejected before anything is recorded.
#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<RecordedCall>>,
    fail_times: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` calls.
    pub fn failing(n: usize) -> Self {
        let sink = Self::default();
        sink.fail_times.store(n, Ordering::SeqCst);
        sink
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(
        &self,
        kind: CommitKind,
        owner: &OwnerId,
        object: Option<ObjectAddress>,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt> {
        let should_fail = self
            .fail_times
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(DeployError::Rejected("sink unavailable".to_string()));
        }

        let mut calls = self.calls.lock().unwrap();
        calls.push(RecordedCall {
            kind,
            owner: owner.clone(),
            object,
            payload: payload.clone(),
        });
        Ok(CommitReceipt {
            kind,
            owner: owner.clone(),
            object,
            version: calls.len() as u64,
            module_count: payload.modules.len(),
            total_bytes: payload.total_bytes(),
        })
    }
}

#[async_trait]
impl DeploymentSink for RecordingSink {
    async fn publish_to_account(
        &self,
        owner: &OwnerId,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt> {
        self.record(CommitKind::Account, owner, None, payload)
    }

    async fn publish_to_object(
        &self,
        owner: &OwnerId,
        payload: &Payload,
    ) -> DeployResult<CommitReceipt> {
        let object = ObjectAddress::derive(owner, b"recording");
        self.record(CommitKind::NewObject, owner, Some(object), payload)
    }

    async fn upgrade_object(
        &self,
        owner: &OwnerId,
        payload: &Payload,
        object: &ObjectAddress,
    ) -> DeployResult<CommitReceipt> {
        self.record(CommitKind::UpgradeObject, owner, Some(*object), payload)
    }
}
