use std::fmt;
use std::ops::Range;

/// A contiguous, half-open range of reads covered by one minimizer index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexDescriptor {
    first_read_id: u32,
    number_of_reads: u32,
}

impl IndexDescriptor {
    pub const fn new(first_read_id: u32, number_of_reads: u32) -> Self {
        Self {
            first_read_id,
            number_of_reads,
        }
    }

    #[inline]
    pub fn first_read_id(&self) -> u32 {
        self.first_read_id
    }

    #[inline]
    pub fn number_of_reads(&self) -> u32 {
        self.number_of_reads
    }

    /// One past the last read id.
    #[inline]
    pub fn end_read_id(&self) -> u32 {
        self.first_read_id + self.number_of_reads
    }

    pub fn read_ids(&self) -> Range<u32> {
        self.first_read_id..self.end_read_id()
    }
}

impl fmt::Display for IndexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.first_read_id, self.end_read_id())
    }
}

/// Symmetry rule for all-to-all runs: a pair is only processed once, from the
/// side whose query starts first.
#[inline]
pub fn should_process_pair(
    query: &IndexDescriptor,
    target: &IndexDescriptor,
    all_to_all: bool,
) -> bool {
    !all_to_all || target.first_read_id() >= query.first_read_id()
}

/// One unit of matching work: every query descriptor against every target
/// descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexBatch {
    pub query_indices: Vec<IndexDescriptor>,
    pub target_indices: Vec<IndexDescriptor>,
}

impl IndexBatch {
    pub fn new(query_indices: Vec<IndexDescriptor>, target_indices: Vec<IndexDescriptor>) -> Self {
        Self {
            query_indices,
            target_indices,
        }
    }

    /// Query/target pairs to match, with symmetric duplicates removed in
    /// all-to-all mode.
    pub fn index_pairs(&self, all_to_all: bool) -> Vec<(IndexDescriptor, IndexDescriptor)> {
        let mut pairs = Vec::with_capacity(self.query_indices.len() * self.target_indices.len());
        for query in &self.query_indices {
            for target in &self.target_indices {
                if should_process_pair(query, target, all_to_all) {
                    pairs.push((*query, *target));
                }
            }
        }
        pairs
    }

    pub fn is_empty(&self) -> bool {
        self.query_indices.is_empty() || self.target_indices.is_empty()
    }
}

/// A host-sized batch together with the device-sized batches carved out of it.
///
/// Every descriptor referenced by a device batch also appears in `host_batch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOfIndices {
    pub host_batch: IndexBatch,
    pub device_batches: Vec<IndexBatch>,
}
