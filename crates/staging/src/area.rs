//! Staging areas and the batches applied to them.

use crate::chunks::ChunkStore;
use crate::error::{StagingError, StagingResult};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use stager_core::OwnerId;
use stager_core::config::StagingConfig;
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

/// Arguments of one stage call.
///
/// `indices` and `chunks` are parallel arrays: `chunks[i]` is staged at
/// `indices[i]`. A length mismatch is rejected before anything is applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StageBatch {
    /// Metadata fragment appended to the area's metadata (may be empty).
    pub metadata: Bytes,
    /// Chunk indices.
    pub indices: Vec<u16>,
    /// Chunk bytes.
    pub chunks: Vec<Bytes>,
}

impl StageBatch {
    /// Create a batch from its parts.
    pub fn new(metadata: impl Into<Bytes>, indices: Vec<u16>, chunks: Vec<Bytes>) -> Self {
        Self {
            metadata: metadata.into(),
            indices,
            chunks,
        }
    }

    /// Create a batch that carries only chunks.
    pub fn from_chunks(indices: Vec<u16>, chunks: Vec<Bytes>) -> Self {
        Self::new(Bytes::new(), indices, chunks)
    }

    /// Metadata plus chunk bytes carried by this batch.
    pub fn payload_bytes(&self) -> usize {
        self.metadata.len() + self.chunks.iter().map(Bytes::len).sum::<usize>()
    }

    /// Check that indices and chunks pair up.
    pub fn validate(&self) -> StagingResult<()> {
        if self.indices.len() != self.chunks.len() {
            return Err(StagingError::LengthMismatch {
                indices: self.indices.len(),
                chunks: self.chunks.len(),
            });
        }
        Ok(())
    }
}

/// Resource limits enforced on every staging area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StagingLimits {
    /// Maximum metadata plus chunk bytes in one area.
    pub max_staged_bytes: Option<u64>,
    /// Maximum distinct chunk indices in one area.
    pub max_chunk_indices: Option<u32>,
}

impl StagingLimits {
    /// No limits.
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Check that applying `batch` to `area` stays within limits.
    pub fn check(&self, area: &StagingArea, batch: &StageBatch) -> StagingResult<()> {
        if let Some(max) = self.max_staged_bytes {
            let after = area.staged_bytes() + batch.payload_bytes() as u64;
            if after > max {
                return Err(StagingError::LimitExceeded(format!(
                    "staging area for {} would hold {after} bytes (max: {max})",
                    area.owner()
                )));
            }
        }
        if let Some(max) = self.max_chunk_indices {
            let new_indices: BTreeSet<u16> = batch
                .indices
                .iter()
                .copied()
                .filter(|i| !area.chunks().contains(*i))
                .collect();
            let after = area.chunks().len() + new_indices.len();
            if after > max as usize {
                return Err(StagingError::LimitExceeded(format!(
                    "staging area for {} would hold {after} chunk indices (max: {max})",
                    area.owner()
                )));
            }
        }
        Ok(())
    }
}

impl From<&StagingConfig> for StagingLimits {
    fn from(config: &StagingConfig) -> Self {
        Self {
            max_staged_bytes: config.max_staged_bytes,
            max_chunk_indices: config.max_chunk_indices,
        }
    }
}

/// Accumulation buffer for one owner's in-progress upload.
#[derive(Clone, Debug)]
pub struct StagingArea {
    owner: OwnerId,
    metadata: BytesMut,
    chunks: ChunkStore,
    last_index: u16,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl StagingArea {
    /// Create an empty staging area.
    pub fn new(owner: OwnerId) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            owner,
            metadata: BytesMut::new(),
            chunks: ChunkStore::new(),
            last_index: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply one batch.
    ///
    /// Metadata is appended when non-empty. Each chunk is appended to the
    /// entry at its index, creating the entry (and raising `last_index`) when
    /// the index is new. Nothing is applied if the batch is malformed.
    pub fn stage(&mut self, batch: &StageBatch) -> StagingResult<()> {
        batch.validate()?;

        if !batch.metadata.is_empty() {
            self.metadata.extend_from_slice(&batch.metadata);
        }
        for (&index, data) in batch.indices.iter().zip(&batch.chunks) {
            if self.chunks.insert_or_append(index, data) && index > self.last_index {
                self.last_index = index;
            }
        }
        self.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    /// Record the state needed to undo later stages.
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            metadata_len: self.metadata.len(),
            last_index: self.last_index,
            updated_at: self.updated_at,
            chunk_lens: BTreeMap::new(),
        }
    }

    /// Apply one batch, recording in `checkpoint` what it touches.
    pub(crate) fn stage_recorded(
        &mut self,
        batch: &StageBatch,
        checkpoint: &mut Checkpoint,
    ) -> StagingResult<()> {
        batch.validate()?;
        for &index in &batch.indices {
            checkpoint
                .chunk_lens
                .entry(index)
                .or_insert_with(|| self.chunks.get(index).map(<[u8]>::len));
        }
        self.stage(batch)
    }

    /// Undo every stage recorded since `checkpoint` was taken.
    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.metadata.truncate(checkpoint.metadata_len);
        for (index, prior) in checkpoint.chunk_lens {
            match prior {
                Some(len) => self.chunks.truncate(index, len),
                None => self.chunks.remove(index),
            }
        }
        self.last_index = checkpoint.last_index;
        self.updated_at = checkpoint.updated_at;
    }

    /// Owner of this area.
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Metadata accumulated so far.
    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    /// Staged chunks.
    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Highest index ever staged (0 before any chunk).
    pub fn last_index(&self) -> u16 {
        self.last_index
    }

    /// Metadata plus chunk bytes held by this area.
    pub fn staged_bytes(&self) -> u64 {
        self.metadata.len() as u64 + self.chunks.total_bytes()
    }

    /// When the area was created.
    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    /// When the area was last staged into.
    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    /// Indices in `0..=last_index` with no staged chunk.
    pub fn missing_indices(&self) -> Vec<u16> {
        if self.chunks.is_empty() {
            return vec![0];
        }
        (0..=self.last_index)
            .filter(|i| !self.chunks.contains(*i))
            .collect()
    }

    /// Take a serializable snapshot of this area.
    pub fn status(&self) -> AreaStatus {
        AreaStatus {
            owner: self.owner.clone(),
            metadata_len: self.metadata.len() as u64,
            received_indices: self.chunks.indices().collect(),
            missing_indices: self.missing_indices(),
            last_index: self.last_index,
            staged_bytes: self.staged_bytes(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Undo record for an existing area.
///
/// Buffers only ever grow while staging, so the prior lengths are enough to
/// roll back without copying staged bytes.
#[derive(Debug)]
pub(crate) struct Checkpoint {
    metadata_len: usize,
    last_index: u16,
    updated_at: OffsetDateTime,
    /// Prior length of every touched index, `None` when the index was new.
    chunk_lens: BTreeMap<u16, Option<usize>>,
}

/// Snapshot of a staging area, used to report progress and resume uploads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaStatus {
    /// Owner of the area.
    pub owner: OwnerId,
    /// Metadata bytes accumulated.
    pub metadata_len: u64,
    /// Indices with at least one staged chunk, ascending.
    pub received_indices: Vec<u16>,
    /// Indices in `0..=last_index` that assembly would reject as missing.
    pub missing_indices: Vec<u16>,
    /// Highest index staged.
    pub last_index: u16,
    /// Metadata plus chunk bytes held.
    pub staged_bytes: u64,
    /// When the area was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the area was last staged into.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl AreaStatus {
    /// Whether assembly would currently succeed.
    pub fn is_complete(&self) -> bool {
        self.missing_indices.is_empty()
    }
}
