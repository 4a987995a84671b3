//! Partitioning of the read sets into host- and device-sized batches.
//!
//! Reads are grouped greedily, in read-id order, on three nested levels:
//!
//! ```text
//! reads ──(index_bytes)──▶ IndexDescriptor
//! descriptors ──(device_bytes)──▶ device batch
//! device batches ──(host_bytes)──▶ host batch
//! ```
//!
//! Every level is sized by the estimated memory footprint of the minimizer
//! index built over its reads. A `BatchOfIndices` is then emitted for each
//! (query host batch, target host batch) combination, carrying the cross
//! product of their device batches.

use std::ops::Range;

use super::types::{BatchOfIndices, IndexBatch, IndexDescriptor};
use crate::core::io::SequenceSource;
use crate::error::{MapperError, Result};
use crate::index::minimizer::Representation;

/// Memory budgets for one role (query or target), in estimated index bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleBudget {
    /// Upper bound for the index of a single descriptor
    pub index_bytes: u64,
    /// Upper bound for all descriptors of one device batch
    pub device_bytes: u64,
    /// Upper bound for all descriptors of one host batch
    pub host_bytes: u64,
}

impl RoleBudget {
    pub fn validate(&self, role: &str) -> Result<()> {
        if self.index_bytes == 0 || self.device_bytes == 0 || self.host_bytes == 0 {
            return Err(MapperError::Configuration(format!(
                "{} memory budgets must be non-zero ({:?})",
                role, self
            )));
        }
        if self.index_bytes > self.device_bytes || self.device_bytes > self.host_bytes {
            return Err(MapperError::Configuration(format!(
                "{} budgets must satisfy index <= device <= host ({:?})",
                role, self
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchBudgets {
    pub query: RoleBudget,
    pub target: RoleBudget,
    /// Estimated index bytes per sequenced base
    pub bytes_per_base: f64,
}

/// Expected index bytes per base for a given minimizer window.
///
/// Random sequence yields about `2 / (w + 1)` minimizers per base.
pub fn index_bytes_per_base(window_size: usize) -> f64 {
    2.0 * std::mem::size_of::<Representation>() as f64 / (window_size as f64 + 1.0)
}

#[inline]
pub fn estimate_index_bytes(basepairs: u64, bytes_per_base: f64) -> u64 {
    (basepairs as f64 * bytes_per_base).ceil() as u64
}

/// Split `sizes` into consecutive runs whose sums stay within `budget`.
/// An item larger than the budget gets a run of its own.
fn greedy_ranges(sizes: &[u64], budget: u64) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0usize;
    let mut accumulated = 0u64;

    for (i, &size) in sizes.iter().enumerate() {
        if i > start && accumulated.saturating_add(size) > budget {
            ranges.push(start..i);
            start = i;
            accumulated = 0;
        }
        accumulated = accumulated.saturating_add(size);
    }
    if start < sizes.len() {
        ranges.push(start..sizes.len());
    }
    ranges
}

/// Host batch of one role: its device batches, each a run of descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
struct HostPartition {
    device_batches: Vec<Vec<IndexDescriptor>>,
}

impl HostPartition {
    fn descriptors(&self) -> Vec<IndexDescriptor> {
        self.device_batches.iter().flatten().copied().collect()
    }
}

fn partition_role(
    source: &dyn SequenceSource,
    budget: &RoleBudget,
    bytes_per_base: f64,
    role: &str,
) -> Result<Vec<HostPartition>> {
    let number_of_reads = source.number_of_reads();
    let mut read_bytes = Vec::with_capacity(number_of_reads);
    let mut oversized_reads = 0usize;

    for read_id in 0..number_of_reads {
        let length = source.read_length(read_id as u32)?;
        let bytes = estimate_index_bytes(length as u64, bytes_per_base).max(1);
        if bytes > budget.index_bytes {
            oversized_reads += 1;
        }
        read_bytes.push(bytes);
    }

    if oversized_reads > 0 {
        log::warn!(
            "{} {} read(s) exceed the per-index budget of {} bytes and get an index of their own",
            oversized_reads,
            role,
            budget.index_bytes
        );
    }

    let descriptors: Vec<(IndexDescriptor, u64)> = greedy_ranges(&read_bytes, budget.index_bytes)
        .into_iter()
        .map(|range| {
            let bytes = read_bytes[range.clone()].iter().sum();
            (
                IndexDescriptor::new(range.start as u32, range.len() as u32),
                bytes,
            )
        })
        .collect();

    let descriptor_bytes: Vec<u64> = descriptors.iter().map(|(_, bytes)| *bytes).collect();
    let device_batches: Vec<(Vec<IndexDescriptor>, u64)> =
        greedy_ranges(&descriptor_bytes, budget.device_bytes)
            .into_iter()
            .map(|range| {
                let bytes = descriptor_bytes[range.clone()].iter().sum();
                let batch = descriptors[range].iter().map(|(d, _)| *d).collect();
                (batch, bytes)
            })
            .collect();

    let device_bytes: Vec<u64> = device_batches.iter().map(|(_, bytes)| *bytes).collect();
    let hosts = greedy_ranges(&device_bytes, budget.host_bytes)
        .into_iter()
        .map(|range| HostPartition {
            device_batches: device_batches[range]
                .iter()
                .map(|(batch, _)| batch.clone())
                .collect(),
        })
        .collect::<Vec<_>>();

    log::debug!(
        "{}: {} reads -> {} indices, {} device batches, {} host batches",
        role,
        number_of_reads,
        descriptors.len(),
        device_batches.len(),
        hosts.len()
    );

    Ok(hosts)
}

/// True when the symmetry rule rejects every (query, target) combination,
/// i.e. all targets start before the first query.
fn symmetric_pairs_empty(query: &[IndexDescriptor], target: &[IndexDescriptor]) -> bool {
    match (query.first(), target.last()) {
        (Some(first_query), Some(last_target)) => {
            last_target.first_read_id() < first_query.first_read_id()
        }
        _ => true,
    }
}

/// Partition the query and target read sets into batches of indices.
///
/// In all-to-all mode the target set is the query set: the query partition is
/// reused for targets and combinations that the symmetry rule would leave
/// empty are not emitted. Output order is deterministic.
pub fn generate_batches(
    query_source: &dyn SequenceSource,
    target_source: &dyn SequenceSource,
    budgets: &BatchBudgets,
    all_to_all: bool,
) -> Result<Vec<BatchOfIndices>> {
    budgets.query.validate("query")?;
    if !all_to_all {
        budgets.target.validate("target")?;
    }

    let query_hosts = partition_role(query_source, &budgets.query, budgets.bytes_per_base, "query")?;
    let target_hosts = if all_to_all {
        query_hosts.clone()
    } else {
        partition_role(
            target_source,
            &budgets.target,
            budgets.bytes_per_base,
            "target",
        )?
    };

    let mut batches = Vec::new();
    for query_host in &query_hosts {
        let host_queries = query_host.descriptors();
        for target_host in &target_hosts {
            let host_targets = target_host.descriptors();
            if all_to_all && symmetric_pairs_empty(&host_queries, &host_targets) {
                continue;
            }

            let mut device_batches = Vec::new();
            for device_queries in &query_host.device_batches {
                for device_targets in &target_host.device_batches {
                    if all_to_all && symmetric_pairs_empty(device_queries, device_targets) {
                        continue;
                    }
                    device_batches.push(IndexBatch::new(
                        device_queries.clone(),
                        device_targets.clone(),
                    ));
                }
            }

            batches.push(BatchOfIndices {
                host_batch: IndexBatch::new(host_queries.clone(), host_targets),
                device_batches,
            });
        }
    }

    Ok(batches)
}
