//! Base-level alignment of the overlaps of one device batch.
//!
//! Overlaps are split into contiguous ranges of `batch_size` claimed through
//! a shared atomic cursor by `engines` scoped threads. Each thread owns its
//! stream and its engine; engines are reset between ranges, never shared.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use crate::core::alignment::{
    Aligner, AlignerFactory, AlignmentStatus, AlignmentType, alignment_cost_bytes,
};
use crate::core::io::SequenceSource;
use crate::core::utils::oriented;
use crate::defaults;
use crate::device::{DeviceAllocator, DeviceId, Stream, set_device};
use crate::error::{MapperError, Result};
use crate::overlap::{Overlap, RelativeStrand};

/// How a set of overlaps is spread over alignment engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentSizing {
    /// Alignments that fit in the memory share given to alignment
    pub max_alignments: usize,
    /// Overlaps each engine claims at a time
    pub batch_size: usize,
    /// Engines actually started
    pub engines: usize,
}

/// Size alignment batches so all engines together stay within
/// [`ALIGNMENT_MEMORY_FRACTION`](defaults::ALIGNMENT_MEMORY_FRACTION) of the
/// largest free device block, assuming every pair is as long as the longest.
pub fn alignment_batch_size(
    total_overlaps: usize,
    max_query_length: usize,
    max_target_length: usize,
    free_memory: u64,
    num_engines: usize,
    device: DeviceId,
) -> Result<AlignmentSizing> {
    let cost = alignment_cost_bytes(max_query_length, max_target_length);
    let budget = defaults::ALIGNMENT_MEMORY_FRACTION * free_memory as f64;
    let max_alignments = if cost > 0.0 {
        (budget / cost).floor() as usize
    } else {
        total_overlaps
    };

    if max_alignments == 0 {
        return Err(MapperError::ResourceExhausted {
            device,
            requested: cost.ceil() as u64,
            available: free_memory,
            context: format!(
                "one alignment of {} x {} bases",
                max_query_length, max_target_length
            ),
        });
    }

    let capped = total_overlaps.min(max_alignments).max(1);
    let engines = num_engines.clamp(1, capped);
    Ok(AlignmentSizing {
        max_alignments,
        batch_size: (capped / engines).max(1),
        engines,
    })
}

/// CIGARs for `overlaps`, index-aligned.
///
/// Reverse-strand overlaps are aligned against the reverse complement of the
/// target interval. Any rejected submission aborts the whole call.
pub fn align_overlaps(
    overlaps: &[Overlap],
    query_source: &dyn SequenceSource,
    target_source: &dyn SequenceSource,
    num_engines: usize,
    factory: &dyn AlignerFactory,
    allocator: &DeviceAllocator,
) -> Result<Vec<String>> {
    if overlaps.is_empty() {
        return Ok(Vec::new());
    }
    let device = allocator.device();
    let max_query_length = overlaps
        .iter()
        .map(|o| o.query_length() as usize)
        .max()
        .unwrap_or(0);
    let max_target_length = overlaps
        .iter()
        .map(|o| o.target_length() as usize)
        .max()
        .unwrap_or(0);

    let sizing = alignment_batch_size(
        overlaps.len(),
        max_query_length,
        max_target_length,
        allocator.largest_free_block(),
        num_engines,
        device,
    )?;
    log::debug!(
        "{}: aligning {} overlaps (max {} x {}) with {} engines, batches of {}",
        device,
        overlaps.len(),
        max_query_length,
        max_target_length,
        sizing.engines,
        sizing.batch_size
    );

    let cursor = AtomicUsize::new(0);
    let abort = AtomicBool::new(false);
    let worker = || -> Result<Vec<(usize, Vec<String>)>> {
        set_device(device);
        let stream = Stream::new(device)?;
        let result = run_engine(
            overlaps,
            query_source,
            target_source,
            factory,
            allocator,
            &stream,
            (max_query_length, max_target_length),
            sizing.batch_size,
            &cursor,
            &abort,
        );
        if result.is_err() {
            abort.store(true, Ordering::Relaxed);
        }
        stream.synchronize()?;
        result
    };

    let outcomes: Vec<Result<Vec<(usize, Vec<String>)>>> = thread::scope(|s| {
        let handles: Vec<_> = (0..sizing.engines).map(|_| s.spawn(worker)).collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(MapperError::WorkerPanic(format!(
                        "alignment engine thread on {}",
                        device
                    )))
                })
            })
            .collect()
    });

    let mut cigars = vec![String::new(); overlaps.len()];
    for outcome in outcomes {
        for (start, batch) in outcome? {
            for (offset, cigar) in batch.into_iter().enumerate() {
                cigars[start + offset] = cigar;
            }
        }
    }
    Ok(cigars)
}

#[allow(clippy::too_many_arguments)]
fn run_engine(
    overlaps: &[Overlap],
    query_source: &dyn SequenceSource,
    target_source: &dyn SequenceSource,
    factory: &dyn AlignerFactory,
    allocator: &DeviceAllocator,
    stream: &Stream,
    (max_query_length, max_target_length): (usize, usize),
    batch_size: usize,
    cursor: &AtomicUsize,
    abort: &AtomicBool,
) -> Result<Vec<(usize, Vec<String>)>> {
    let device = allocator.device();
    let mut aligner = factory.create(
        max_query_length,
        max_target_length,
        batch_size,
        AlignmentType::Global,
        allocator,
        stream,
        device,
    )?;
    let mut produced = Vec::new();

    while !abort.load(Ordering::Relaxed) {
        let start = cursor.fetch_add(batch_size, Ordering::Relaxed);
        if start >= overlaps.len() {
            break;
        }
        let end = (start + batch_size).min(overlaps.len());

        for (offset, overlap) in overlaps[start..end].iter().enumerate() {
            let overlap_index = start + offset;
            let (query, target) = overlap_sequences(overlap, query_source, target_source)
                .ok_or_else(|| MapperError::AlignmentSubmission {
                    device,
                    overlap_index,
                    detail: "overlap extends past the end of its read".to_string(),
                })?;
            let target = oriented(target, overlap.relative_strand == RelativeStrand::Reverse);

            let status = aligner.add_alignment(query, &target);
            if status != AlignmentStatus::Success {
                return Err(MapperError::AlignmentSubmission {
                    device,
                    overlap_index,
                    detail: status.describe().to_string(),
                });
            }
        }

        aligner.align_all()?;
        aligner.sync_alignments()?;
        let alignments = aligner.get_alignments();
        if alignments.len() != end - start {
            return Err(MapperError::AlignmentSubmission {
                device,
                overlap_index: start,
                detail: format!(
                    "engine returned {} alignments for {} submitted",
                    alignments.len(),
                    end - start
                ),
            });
        }
        produced.push((start, alignments.to_vec()));
        aligner.reset();
    }
    Ok(produced)
}

fn overlap_sequences<'s>(
    overlap: &Overlap,
    query_source: &'s dyn SequenceSource,
    target_source: &'s dyn SequenceSource,
) -> Option<(&'s [u8], &'s [u8])> {
    let query = query_source.get_sequence_by_id(overlap.query_read_id).ok()?;
    let target = target_source.get_sequence_by_id(overlap.target_read_id).ok()?;
    Some((
        query
            .sequence
            .get(overlap.query_start as usize..overlap.query_end as usize)?,
        target
            .sequence
            .get(overlap.target_start as usize..overlap.target_end as usize)?,
    ))
}
