//! Index-keyed chunk buffers.

use bytes::BytesMut;
use std::collections::BTreeMap;

/// Mapping from chunk index to the bytes staged at that index.
///
/// Entries are never replaced: staging more bytes at an index that already
/// exists appends to it. Indices may be sparse while staging.
#[derive(Clone, Debug, Default)]
pub struct ChunkStore {
    entries: BTreeMap<u16, BytesMut>,
    total_bytes: u64,
}

impl ChunkStore {
    /// Create an empty chunk store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `data` at `index`, appending when the index already exists.
    ///
    /// Returns `true` when a new entry was created.
    pub fn insert_or_append(&mut self, index: u16, data: &[u8]) -> bool {
        self.total_bytes += data.len() as u64;
        match self.entries.get_mut(&index) {
            Some(existing) => {
                existing.extend_from_slice(data);
                false
            }
            None => {
                self.entries.insert(index, BytesMut::from(data));
                true
            }
        }
    }

    /// Shorten the entry at `index` to `len` bytes.
    pub(crate) fn truncate(&mut self, index: u16, len: usize) {
        if let Some(entry) = self.entries.get_mut(&index)
            && entry.len() > len
        {
            self.total_bytes -= (entry.len() - len) as u64;
            entry.truncate(len);
        }
    }

    /// Drop the entry at `index`.
    pub(crate) fn remove(&mut self, index: u16) {
        if let Some(entry) = self.entries.remove(&index) {
            self.total_bytes -= entry.len() as u64;
        }
    }

    /// Check whether an entry exists at `index`.
    pub fn contains(&self, index: u16) -> bool {
        self.entries.contains_key(&index)
    }

    /// Get the bytes staged at `index`.
    pub fn get(&self, index: u16) -> Option<&[u8]> {
        self.entries.get(&index).map(|b| &b[..])
    }

    /// Number of distinct indices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no chunk has been staged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total bytes across all entries.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Populated indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_then_append_same_index() {
        let mut store = ChunkStore::new();
        assert!(store.insert_or_append(0, b"AB"));
        assert!(!store.insert_or_append(0, b"CD"));
        assert_eq!(store.get(0), Some(&b"ABCD"[..]));
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 4);
    }

    #[test]
    fn test_sparse_indices() {
        let mut store = ChunkStore::new();
        store.insert_or_append(7, b"x");
        store.insert_or_append(2, b"y");
        assert!(store.contains(2));
        assert!(store.contains(7));
        assert!(!store.contains(3));
        assert_eq!(store.indices().collect::<Vec<_>>(), vec![2, 7]);
    }

    #[test]
    fn test_truncate_and_remove_track_total() {
        let mut store = ChunkStore::new();
        store.insert_or_append(0, b"ABCD");
        store.insert_or_append(1, b"xy");
        store.truncate(0, 2);
        assert_eq!(store.get(0), Some(&b"AB"[..]));
        assert_eq!(store.total_bytes(), 4);

        store.remove(1);
        assert!(!store.contains(1));
        assert_eq!(store.total_bytes(), 2);
    }

    #[test]
    fn test_empty_chunk_creates_entry() {
        let mut store = ChunkStore::new();
        assert!(store.is_empty());
        assert!(store.insert_or_append(0, b""));
        assert!(store.contains(0));
        assert_eq!(store.get(0), Some(&b""[..]));
        assert_eq!(store.total_bytes(), 0);
    }
}
