//! Ordered payload assembly.

use crate::area::StagingArea;
use crate::error::{StagingError, StagingResult};
use bytes::Bytes;

/// An assembled package: metadata plus modules in index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    /// Package metadata.
    pub metadata: Bytes,
    /// Module bytes; `modules[i]` is everything staged at index `i`.
    pub modules: Vec<Bytes>,
}

impl Payload {
    /// Metadata plus module bytes.
    pub fn total_bytes(&self) -> u64 {
        self.metadata.len() as u64 + self.modules.iter().map(|m| m.len() as u64).sum::<u64>()
    }
}

/// Assemble the modules of `area` in index order.
///
/// Every index in `0..=last_index` must be present. The first absent index
/// aborts assembly; no partial result is ever returned. An area that never
/// received a chunk fails at index 0.
pub fn assemble(area: &StagingArea) -> StagingResult<Payload> {
    let last_index = area.last_index();
    let mut modules = Vec::with_capacity(usize::from(last_index) + 1);
    for index in 0..=last_index {
        let data = area
            .chunks()
            .get(index)
            .ok_or(StagingError::MissingChunk { index, last_index })?;
        modules.push(Bytes::copy_from_slice(data));
    }

    tracing::debug!(
        owner = %area.owner(),
        modules = modules.len(),
        metadata_len = area.metadata().len(),
        "Assembled staged payload"
    );

    Ok(Payload {
        metadata: Bytes::copy_from_slice(area.metadata()),
        modules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::StageBatch;
    use stager_core::OwnerId;

    fn area_with(batches: &[StageBatch]) -> StagingArea {
        let mut area = StagingArea::new(OwnerId::new("alice").unwrap());
        for batch in batches {
            area.stage(batch).unwrap();
        }
        area
    }

    fn b(data: &'static [u8]) -> Bytes {
        Bytes::from_static(data)
    }

    #[test]
    fn test_assemble_orders_by_index() {
        let area = area_with(&[
            StageBatch::new("meta", vec![2, 0], vec![b(b"c"), b(b"a")]),
            StageBatch::from_chunks(vec![1], vec![b(b"b")]),
        ]);
        let payload = assemble(&area).unwrap();
        assert_eq!(payload.metadata, b(b"meta"));
        assert_eq!(payload.modules, vec![b(b"a"), b(b"b"), b(b"c")]);
        assert_eq!(payload.total_bytes(), 7);
    }

    #[test]
    fn test_assemble_concatenates_repeated_index() {
        let area = area_with(&[
            StageBatch::from_chunks(vec![0], vec![b(b"AB")]),
            StageBatch::from_chunks(vec![0], vec![b(b"CD")]),
        ]);
        let payload = assemble(&area).unwrap();
        assert_eq!(payload.modules, vec![b(b"ABCD")]);
    }

    #[test]
    fn test_assemble_rejects_gap() {
        let area = area_with(&[StageBatch::from_chunks(vec![0, 2], vec![b(b"a"), b(b"c")])]);
        match assemble(&area) {
            Err(StagingError::MissingChunk { index, last_index }) => {
                assert_eq!(index, 1);
                assert_eq!(last_index, 2);
            }
            other => panic!("expected missing chunk, got {other:?}"),
        }
    }

    #[test]
    fn test_assemble_rejects_missing_first_index() {
        let area = area_with(&[StageBatch::from_chunks(vec![1], vec![b(b"b")])]);
        assert!(matches!(
            assemble(&area),
            Err(StagingError::MissingChunk { index: 0, .. })
        ));
    }

    #[test]
    fn test_assemble_rejects_area_without_chunks() {
        let area = area_with(&[StageBatch::new("meta only", vec![], vec![])]);
        assert!(matches!(
            assemble(&area),
            Err(StagingError::MissingChunk {
                index: 0,
                last_index: 0
            })
        ));
    }
}
