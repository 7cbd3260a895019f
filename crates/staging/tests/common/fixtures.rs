//! Test fixtures for staging tests.

use bytes::Bytes;
use stager_core::OwnerId;
use stager_staging::StageBatch;

/// Parse an owner identity.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn owner(s: &str) -> OwnerId {
    OwnerId::new(s).expect("valid owner")
}

/// Deterministic module bytes for index `i`.
#[allow(dead_code)]
pub fn module_bytes(i: u16, len: usize) -> Bytes {
    Bytes::from(
        (0..len)
            .map(|n| (i as usize * 31 + n) as u8)
            .collect::<Vec<u8>>(),
    )
}

/// Split `data` into `parts` contiguous pieces (the last may be shorter).
#[allow(dead_code)]
pub fn split_into(data: &Bytes, parts: usize) -> Vec<Bytes> {
    let size = data.len().div_ceil(parts).max(1);
    (0..data.len())
        .step_by(size)
        .map(|start| data.slice(start..(start + size).min(data.len())))
        .collect()
}

/// Build a batch carrying one chunk per `(index, bytes)` pair.
#[allow(dead_code)]
pub fn batch(metadata: &'static [u8], pairs: Vec<(u16, Bytes)>) -> StageBatch {
    let (indices, chunks) = pairs.into_iter().unzip();
    StageBatch::new(Bytes::from_static(metadata), indices, chunks)
}
