//! Process-wide registry of per-owner staging areas.
//!
//! Every operation runs inside a [`StagingTxn`]: the transaction holds the
//! owner's lock for its whole lifetime and stages into the owner's area in
//! place, recording the prior buffer lengths it touches. Its changes stay only
//! after [`StagingTxn::keep`] or [`StagingTxn::destroy`]; dropping the
//! transaction in any other way (an early `?` return, a failed deployment)
//! truncates the area back to where it was, or removes an area it created.

use crate::area::{AreaStatus, Checkpoint, StageBatch, StagingArea, StagingLimits};
use crate::assemble::Payload;
use crate::error::{StagingError, StagingResult};
use dashmap::DashMap;
use stager_core::OwnerId;
use stager_core::config::StagingConfig;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Committed state of one owner.
#[derive(Debug, Default)]
struct SlotState {
    area: Option<StagingArea>,
    /// Set once the slot has been unlinked from the registry map. Waiters that
    /// acquire a retired slot must look the owner up again.
    retired: bool,
}

type Slot = Arc<Mutex<SlotState>>;

/// Association from owner identity to at most one live staging area.
pub struct StagingRegistry {
    slots: DashMap<OwnerId, Slot>,
    limits: StagingLimits,
}

impl Default for StagingRegistry {
    fn default() -> Self {
        Self::from_config(&StagingConfig::default())
    }
}

impl StagingRegistry {
    /// Create an empty registry enforcing `limits`.
    pub fn new(limits: StagingLimits) -> Self {
        Self {
            slots: DashMap::new(),
            limits,
        }
    }

    /// Create an empty registry from configuration.
    pub fn from_config(config: &StagingConfig) -> Self {
        Self::new(StagingLimits::from(config))
    }

    /// Start an atomic unit of work on `owner`'s staging state.
    ///
    /// Waits for any transaction already running for the same owner.
    /// Transactions for different owners never contend.
    pub async fn begin(&self, owner: &OwnerId) -> StagingTxn<'_> {
        loop {
            let slot = self.slots.entry(owner.clone()).or_default().value().clone();
            let guard = slot.clone().lock_owned().await;
            if guard.retired {
                continue;
            }
            let rollback = match &guard.area {
                Some(area) => Rollback::Restore(area.checkpoint()),
                None => Rollback::Remove,
            };
            return StagingTxn {
                registry: self,
                owner: owner.clone(),
                slot,
                guard,
                rollback: Some(rollback),
            };
        }
    }

    /// Apply one batch to `owner`'s area, creating the area on demand.
    #[tracing::instrument(skip(self, batch), fields(owner = %owner, chunks = batch.indices.len()))]
    pub async fn stage_chunk(
        &self,
        owner: &OwnerId,
        batch: &StageBatch,
    ) -> StagingResult<AreaStatus> {
        let mut txn = self.begin(owner).await;
        let status = txn.stage(batch)?.status();
        txn.keep();
        Ok(status)
    }

    /// Snapshot `owner`'s area.
    pub async fn status(&self, owner: &OwnerId) -> StagingResult<AreaStatus> {
        let txn = self.begin(owner).await;
        let status = txn.area().map(StagingArea::status);
        status.ok_or_else(|| StagingError::NotFound(owner.clone()))
    }

    /// Destroy `owner`'s area, aborting the upload in progress.
    #[tracing::instrument(skip(self), fields(owner = %owner))]
    pub async fn cleanup(&self, owner: &OwnerId) -> StagingResult<()> {
        let txn = self.begin(owner).await;
        txn.destroy()?;
        tracing::info!("Staging area cleaned up");
        Ok(())
    }
}

/// Exclusive, all-or-nothing access to one owner's staging state.
pub struct StagingTxn<'a> {
    registry: &'a StagingRegistry,
    owner: OwnerId,
    slot: Slot,
    guard: OwnedMutexGuard<SlotState>,
    /// How to undo this transaction; `None` once kept or destroyed.
    rollback: Option<Rollback>,
}

#[derive(Debug)]
enum Rollback {
    /// The owner had no area when the transaction began.
    Remove,
    /// Truncate the existing area back to its prior state.
    Restore(Checkpoint),
}

impl StagingTxn<'_> {
    /// The area as seen by this transaction.
    pub fn area(&self) -> Option<&StagingArea> {
        self.guard.area.as_ref()
    }

    /// Apply one batch, creating the area if the owner has none.
    ///
    /// Malformed batches and batches that would exceed the registry limits are
    /// rejected before anything changes.
    pub fn stage(&mut self, batch: &StageBatch) -> StagingResult<&mut StagingArea> {
        batch.validate()?;
        match &self.guard.area {
            Some(area) => self.registry.limits.check(area, batch)?,
            None => self
                .registry
                .limits
                .check(&StagingArea::new(self.owner.clone()), batch)?,
        }

        let created = self.guard.area.is_none();
        let owner = &self.owner;
        let area = self
            .guard
            .area
            .get_or_insert_with(|| StagingArea::new(owner.clone()));
        match self.rollback.as_mut() {
            Some(Rollback::Restore(checkpoint)) => area.stage_recorded(batch, checkpoint)?,
            _ => area.stage(batch)?,
        }

        tracing::debug!(
            owner = %owner,
            created,
            chunks = batch.indices.len(),
            metadata_len = batch.metadata.len(),
            last_index = area.last_index(),
            staged_bytes = area.staged_bytes(),
            "Staged batch"
        );
        Ok(area)
    }

    /// Assemble the area as seen by this transaction.
    pub fn assemble(&self) -> StagingResult<Payload> {
        let area = self
            .guard
            .area
            .as_ref()
            .ok_or_else(|| StagingError::NotFound(self.owner.clone()))?;
        crate::assemble::assemble(area)
    }

    /// Make this transaction's changes permanent.
    pub fn keep(mut self) {
        self.rollback = None;
    }

    /// Remove the area.
    ///
    /// Fails with [`StagingError::NotFound`] if the owner has no area, in
    /// which case nothing changes.
    pub fn destroy(mut self) -> StagingResult<()> {
        if self.guard.area.take().is_none() {
            return Err(StagingError::NotFound(self.owner.clone()));
        }
        self.rollback = None;
        Ok(())
    }
}

impl Drop for StagingTxn<'_> {
    fn drop(&mut self) {
        match self.rollback.take() {
            Some(Rollback::Remove) => self.guard.area = None,
            Some(Rollback::Restore(checkpoint)) => {
                if let Some(area) = self.guard.area.as_mut() {
                    area.restore(checkpoint);
                }
            }
            None => {}
        }

        // Owners without an area do not keep a slot in the map.
        if self.guard.area.is_none() && !self.guard.retired {
            self.guard.retired = true;
            self.registry
                .slots
                .remove_if(&self.owner, |_, slot| Arc::ptr_eq(slot, &self.slot));
        }
    }
}
