//! Index descriptors and their grouping into host and device batches.

pub mod generator;
pub mod types;

pub use generator::{
    BatchBudgets, RoleBudget, estimate_index_bytes, generate_batches, index_bytes_per_base,
};
pub use types::{BatchOfIndices, IndexBatch, IndexDescriptor, should_process_pair};
