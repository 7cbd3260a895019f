//! Common test utilities and fixtures.

pub mod sinks;

#[allow(unused_imports)]
pub use sinks::*;

use bytes::Bytes;
use stager_core::OwnerId;
use stager_staging::StageBatch;

/// Parse an owner identity.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn owner(s: &str) -> OwnerId {
    OwnerId::new(s).expect("valid owner")
}

/// Build a batch carrying one chunk per `(index, bytes)` pair.
#[allow(dead_code)]
pub fn batch(metadata: &'static [u8], pairs: &[(u16, &'static [u8])]) -> StageBatch {
    StageBatch::new(
        Bytes::from_static(metadata),
        pairs.iter().map(|(i, _)| *i).collect(),
        pairs.iter().map(|(_, b)| Bytes::from_static(b)).collect(),
    )
}
