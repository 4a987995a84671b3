// ferrous-overlap/tests/batching_properties_test.rs
//
// Partition properties of the batch generator over randomly sized read sets.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use ferrous_overlap::batching::{
    BatchBudgets, IndexDescriptor, RoleBudget, generate_batches, index_bytes_per_base,
};
use ferrous_overlap::core::io::{FastaParser, Read, SequenceSource};

fn random_source(rng: &mut StdRng, reads: usize) -> FastaParser {
    FastaParser::from_reads(
        (0..reads)
            .map(|i| {
                let len = rng.gen_range(50..3000);
                Read::new(format!("r{}", i), vec![b'A'; len])
            })
            .collect(),
    )
}

fn random_budgets(rng: &mut StdRng) -> BatchBudgets {
    let index_bytes = rng.gen_range(1_000..20_000u64);
    let device_bytes = index_bytes * rng.gen_range(1..4u64);
    let host_bytes = device_bytes * rng.gen_range(1..4u64);
    let budget = RoleBudget {
        index_bytes,
        device_bytes,
        host_bytes,
    };
    BatchBudgets {
        query: budget,
        target: budget,
        bytes_per_base: index_bytes_per_base(10),
    }
}

/// Descriptors sorted by first read must tile `0..end` without gaps.
fn assert_tiles(mut descriptors: Vec<IndexDescriptor>, end: u32) {
    descriptors.sort_by_key(|d| d.first_read_id());
    descriptors.dedup();
    let mut next = 0u32;
    for descriptor in descriptors {
        assert_eq!(descriptor.first_read_id(), next, "gap or overlap at {}", descriptor);
        assert!(descriptor.number_of_reads() > 0);
        next = descriptor.end_read_id();
    }
    assert_eq!(next, end);
}

#[test]
fn test_device_batches_partition_their_host_batch() {
    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..20 {
        let (n_query, n_target) = (rng.gen_range(1..60), rng.gen_range(1..60));
        let query = random_source(&mut rng, n_query);
        let target = random_source(&mut rng, n_target);
        let budgets = random_budgets(&mut rng);
        let batches = generate_batches(&query, &target, &budgets, false).unwrap();

        for batch in &batches {
            let mut device_queries: Vec<IndexDescriptor> = batch
                .device_batches
                .iter()
                .flat_map(|b| b.query_indices.iter().copied())
                .collect();
            let mut device_targets: Vec<IndexDescriptor> = batch
                .device_batches
                .iter()
                .flat_map(|b| b.target_indices.iter().copied())
                .collect();
            device_queries.sort_by_key(|d| d.first_read_id());
            device_queries.dedup();
            device_targets.sort_by_key(|d| d.first_read_id());
            device_targets.dedup();
            assert_eq!(device_queries, batch.host_batch.query_indices);
            assert_eq!(device_targets, batch.host_batch.target_indices);
        }

        let all_queries: Vec<IndexDescriptor> = batches
            .iter()
            .flat_map(|b| b.host_batch.query_indices.iter().copied())
            .collect();
        assert_tiles(all_queries, query.number_of_reads() as u32);
    }
}

#[test]
fn test_every_read_pair_is_scheduled_exactly_once() {
    let mut rng = StdRng::seed_from_u64(99);
    for all_to_all in [false, true] {
        for _ in 0..10 {
            let (n_query, n_target) = (rng.gen_range(1..40), rng.gen_range(1..40));
            let query = random_source(&mut rng, n_query);
            let target = if all_to_all {
                query.clone()
            } else {
                random_source(&mut rng, n_target)
            };
            let budgets = random_budgets(&mut rng);
            let batches = generate_batches(&query, &target, &budgets, all_to_all).unwrap();

            let mut scheduled: HashMap<(u32, u32), usize> = HashMap::new();
            for batch in &batches {
                for device_batch in &batch.device_batches {
                    for (q, t) in device_batch.index_pairs(all_to_all) {
                        for q_read in q.read_ids() {
                            for t_read in t.read_ids() {
                                if all_to_all && t_read <= q_read {
                                    continue;
                                }
                                *scheduled.entry((q_read, t_read)).or_default() += 1;
                            }
                        }
                    }
                }
            }

            let n_q = query.number_of_reads() as u32;
            let n_t = target.number_of_reads() as u32;
            let expected = if all_to_all {
                (n_q as usize * (n_q as usize - 1)) / 2
            } else {
                n_q as usize * n_t as usize
            };
            assert_eq!(scheduled.len(), expected);
            assert!(scheduled.values().all(|&count| count == 1));
        }
    }
}
