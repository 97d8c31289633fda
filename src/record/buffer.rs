use crate::record::LinkRecord;
use std::collections::linked_list::{self, LinkedList};

/// Ordered batch of records collected by the producer
///
/// Appending a record or concatenating another buffer is O(1): nodes are
/// relinked, never copied. Handing a chunk to the consumer is a move via
/// [`ChunkBuffer::take`], which leaves an empty buffer in place so the producer
/// can keep going without ever touching the nodes it gave away.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    records: LinkedList<LinkRecord>,
}

impl ChunkBuffer {
    /// Creates an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in the buffer
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the buffer holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Appends one record at the tail
    pub fn push(&mut self, record: LinkRecord) {
        self.records.push_back(record);
    }

    /// Moves every record of `other` to the tail of this buffer
    ///
    /// `other` is left empty. The last record of `self` is immediately
    /// followed by the first record of `other`.
    pub fn append(&mut self, other: &mut ChunkBuffer) {
        self.records.append(&mut other.records);
    }

    /// Hands off the current contents, leaving a fresh empty buffer behind
    pub fn take(&mut self) -> ChunkBuffer {
        std::mem::take(self)
    }

    /// First record in insertion order
    pub fn first(&self) -> Option<&LinkRecord> {
        self.records.front()
    }

    /// Last record in insertion order
    pub fn last(&self) -> Option<&LinkRecord> {
        self.records.back()
    }

    /// Iterates over the records in insertion order
    pub fn iter(&self) -> linked_list::Iter<'_, LinkRecord> {
        self.records.iter()
    }
}

impl IntoIterator for ChunkBuffer {
    type Item = LinkRecord;
    type IntoIter = linked_list::IntoIter<LinkRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChunkBuffer {
    type Item = &'a LinkRecord;
    type IntoIter = linked_list::Iter<'a, LinkRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Extend<LinkRecord> for ChunkBuffer {
    fn extend<I: IntoIterator<Item = LinkRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

impl FromIterator<LinkRecord> for ChunkBuffer {
    fn from_iter<I: IntoIterator<Item = LinkRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
