//! Chunked upload staging for stager.
//!
//! This crate provides:
//! - Index-keyed chunk buffers that append on repeated indices
//! - Per-owner staging areas accumulating metadata and chunks over many calls
//! - A process-wide registry with all-or-nothing per-owner transactions
//! - Gap-checking assembly of staged chunks into an ordered payload
//! - Client-side splitting of a payload into size-limited stage calls

pub mod area;
pub mod assemble;
pub mod chunks;
pub mod error;
pub mod plan;
pub mod registry;

pub use area::{AreaStatus, StageBatch, StagingArea, StagingLimits};
pub use assemble::{Payload, assemble};
pub use chunks::ChunkStore;
pub use error::{StagingError, StagingResult};
pub use plan::split_payload;
pub use registry::{StagingRegistry, StagingTxn};
