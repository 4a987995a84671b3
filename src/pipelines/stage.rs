//! Overlap detection for one device batch.
//!
//! Every index pair of the batch runs through the same steps on the device
//! thread:
//!
//! ```text
//! Matcher (anchors) → Overlapper (chains) → [alignment engines] → result queue
//! ```
//!
//! The matcher's device memory is released before alignment starts so the
//! engines see as much free memory as possible.

use super::alignment::align_overlaps;
use super::queue::ResultProducer;
use super::statistics::PipelineStatistics;
use crate::batching::IndexBatch;
use crate::core::alignment::AlignerFactory;
use crate::core::io::SequenceSource;
use crate::device::{DeviceAllocator, Stream};
use crate::error::Result;
use crate::index::IndexCacheDevice;
use crate::overlap::{Matcher, OverlapThresholds, Overlapper, OverlapsAndCigars};

/// Per-device stage state. Created once per device thread.
pub struct OverlapStage<'a> {
    allocator: &'a DeviceAllocator,
    stream: &'a Stream,
    query_source: &'a dyn SequenceSource,
    target_source: &'a dyn SequenceSource,
    aligner_factory: &'a dyn AlignerFactory,
    overlapper: Overlapper,
    thresholds: OverlapThresholds,
    num_alignment_engines: usize,
    all_to_all: bool,
}

impl<'a> OverlapStage<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        allocator: &'a DeviceAllocator,
        stream: &'a Stream,
        query_source: &'a dyn SequenceSource,
        target_source: &'a dyn SequenceSource,
        aligner_factory: &'a dyn AlignerFactory,
        kmer_size: usize,
        thresholds: OverlapThresholds,
        num_alignment_engines: usize,
        all_to_all: bool,
    ) -> Self {
        Self {
            allocator,
            stream,
            query_source,
            target_source,
            aligner_factory,
            overlapper: Overlapper::new(kmer_size as u32),
            thresholds,
            num_alignment_engines,
            all_to_all,
        }
    }

    /// Match every index pair of `batch` and queue one result per pair.
    ///
    /// `device_cache` must already hold exactly the batch's descriptors.
    pub fn process_device_batch(
        &self,
        device_cache: &IndexCacheDevice<'_>,
        batch: &IndexBatch,
        producer: &ResultProducer<OverlapsAndCigars>,
        stats: &mut PipelineStatistics,
    ) -> Result<()> {
        for (query_descriptor, target_descriptor) in batch.index_pairs(self.all_to_all) {
            let query_index = device_cache.get_index_from_query_cache(&query_descriptor)?;
            let target_index = device_cache.get_index_from_target_cache(&target_descriptor)?;

            let overlaps = {
                let matcher = Matcher::new(
                    self.allocator,
                    &query_index,
                    &target_index,
                    self.stream,
                    self.all_to_all,
                )?;
                stats.total_anchors += matcher.anchors().len();
                self.overlapper
                    .get_overlaps(matcher.anchors(), &self.thresholds)
            };

            let cigars = if self.num_alignment_engines > 0 {
                let cigars = align_overlaps(
                    &overlaps,
                    self.query_source,
                    self.target_source,
                    self.num_alignment_engines,
                    self.aligner_factory,
                    self.allocator,
                )?;
                stats.total_alignments += cigars.len();
                cigars
            } else {
                Vec::new()
            };

            log::debug!(
                "{}: {} x {} gave {} overlaps",
                self.allocator.device(),
                query_descriptor,
                target_descriptor,
                overlaps.len()
            );
            stats.index_pairs_matched += 1;
            stats.total_overlaps += overlaps.len();
            producer.add_new_element(OverlapsAndCigars { overlaps, cigars })?;
        }
        stats.device_batches_processed += 1;
        Ok(())
    }
}
