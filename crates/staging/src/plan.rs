//! Client-side splitting of a payload into stage calls.

use crate::area::StageBatch;
use crate::error::{StagingError, StagingResult};
use bytes::{Bytes, BytesMut};

/// Maximum number of modules addressable by a `u16` index.
pub const MAX_MODULES: usize = u16::MAX as usize + 1;

/// Split a payload into stage batches carrying at most `max_call_bytes` each.
///
/// Metadata is sent first, then modules in index order. A module that does not
/// fit in the current batch is split across consecutive batches at the same
/// index. Every module index is staged at least once, including empty
/// modules. Callers send all but the last batch as plain stage calls and the
/// last one through a commit.
pub fn split_payload(
    metadata: &[u8],
    modules: &[Bytes],
    max_call_bytes: usize,
) -> StagingResult<Vec<StageBatch>> {
    if max_call_bytes == 0 {
        return Err(StagingError::InvalidPlan(
            "max_call_bytes must be greater than zero".to_string(),
        ));
    }
    if modules.is_empty() {
        return Err(StagingError::InvalidPlan(
            "payload has no modules".to_string(),
        ));
    }
    if modules.len() > MAX_MODULES {
        return Err(StagingError::InvalidPlan(format!(
            "payload has {} modules (max: {MAX_MODULES})",
            modules.len()
        )));
    }

    let mut planner = Planner::new(max_call_bytes);

    let mut rest = metadata;
    while !rest.is_empty() {
        let take = planner.room().min(rest.len());
        planner.push_metadata(&rest[..take]);
        rest = &rest[take..];
    }

    for (position, module) in modules.iter().enumerate() {
        let index = u16::try_from(position).map_err(|_| {
            StagingError::InvalidPlan(format!("module position {position} exceeds u16"))
        })?;
        let mut offset = 0;
        loop {
            let take = planner.room().min(module.len() - offset);
            planner.push_chunk(index, module.slice(offset..offset + take));
            offset += take;
            if offset == module.len() {
                break;
            }
        }
    }

    Ok(planner.finish())
}

struct Planner {
    max_call_bytes: usize,
    batches: Vec<StageBatch>,
    metadata: BytesMut,
    indices: Vec<u16>,
    chunks: Vec<Bytes>,
    used: usize,
}

impl Planner {
    fn new(max_call_bytes: usize) -> Self {
        Self {
            max_call_bytes,
            batches: Vec::new(),
            metadata: BytesMut::new(),
            indices: Vec::new(),
            chunks: Vec::new(),
            used: 0,
        }
    }

    /// Bytes still available in the current batch, flushing it when full.
    fn room(&mut self) -> usize {
        if self.used == self.max_call_bytes {
            self.flush();
        }
        self.max_call_bytes - self.used
    }

    fn push_metadata(&mut self, data: &[u8]) {
        self.metadata.extend_from_slice(data);
        self.used += data.len();
    }

    fn push_chunk(&mut self, index: u16, data: Bytes) {
        self.used += data.len();
        self.indices.push(index);
        self.chunks.push(data);
    }

    fn flush(&mut self) {
        self.batches.push(StageBatch::new(
            self.metadata.split().freeze(),
            std::mem::take(&mut self.indices),
            std::mem::take(&mut self.chunks),
        ));
        self.used = 0;
    }

    fn finish(mut self) -> Vec<StageBatch> {
        if self.used > 0 || !self.indices.is_empty() {
            self.flush();
        }
        self.batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::StagingArea;
    use crate::assemble::assemble;
    use stager_core::OwnerId;

    fn replay(batches: &[StageBatch]) -> crate::assemble::Payload {
        let mut area = StagingArea::new(OwnerId::new("planner").unwrap());
        for batch in batches {
            area.stage(batch).unwrap();
        }
        assemble(&area).unwrap()
    }

    #[test]
    fn test_small_payload_fits_one_batch() {
        let modules = vec![Bytes::from_static(b"m0"), Bytes::from_static(b"m1")];
        let batches = split_payload(b"meta", &modules, 1024).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].indices, vec![0, 1]);
        assert_eq!(batches[0].metadata, Bytes::from_static(b"meta"));
    }

    #[test]
    fn test_batches_respect_budget_and_reassemble() {
        let metadata = vec![7u8; 25];
        let modules = vec![
            Bytes::from(vec![1u8; 40]),
            Bytes::from(vec![2u8; 3]),
            Bytes::from(vec![3u8; 17]),
        ];
        let batches = split_payload(&metadata, &modules, 10).unwrap();

        assert_eq!(batches.len(), 9);
        for batch in &batches {
            assert!(batch.payload_bytes() <= 10);
            batch.validate().unwrap();
        }

        let payload = replay(&batches);
        assert_eq!(&payload.metadata[..], &metadata[..]);
        assert_eq!(payload.modules, modules);
    }

    #[test]
    fn test_large_module_split_across_batches_at_same_index() {
        let modules = vec![Bytes::from(vec![9u8; 25])];
        let batches = split_payload(b"", &modules, 10).unwrap();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.indices == vec![0]));
        assert_eq!(replay(&batches).modules, modules);
    }

    #[test]
    fn test_empty_module_still_staged() {
        let modules = vec![Bytes::new(), Bytes::from_static(b"x")];
        let batches = split_payload(b"m", &modules, 10).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].indices, vec![0, 1]);
        assert_eq!(replay(&batches).modules, modules);
    }

    #[test]
    fn test_invalid_plans() {
        let modules = vec![Bytes::from_static(b"x")];
        assert!(matches!(
            split_payload(b"m", &modules, 0),
            Err(StagingError::InvalidPlan(_))
        ));
        assert!(matches!(
            split_payload(b"m", &[], 10),
            Err(StagingError::InvalidPlan(_))
        ));
    }
}
