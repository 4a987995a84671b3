//! Run statistics, accumulated per device and merged at the end of a run.

use std::fmt;

use crate::index::CacheStatistics;

/// Counters for one mapping run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStatistics {
    pub devices: usize,
    pub batches_processed: usize,
    pub device_batches_processed: usize,
    pub index_pairs_matched: usize,
    pub total_anchors: usize,
    pub total_overlaps: usize,
    pub total_alignments: usize,
    pub records_written: usize,
    pub host_indices_built: usize,
    pub device_uploads: usize,
    pub device_reuses: usize,
    pub peak_device_bytes: u64,
    pub wall_time_secs: f64,
    pub cpu_time_secs: f64,
}

impl PipelineStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the counters of another device into `self`.
    ///
    /// Timings are not summed; the caller measures them once for the run.
    pub fn merge(&mut self, other: &PipelineStatistics) {
        self.devices += other.devices;
        self.batches_processed += other.batches_processed;
        self.device_batches_processed += other.device_batches_processed;
        self.index_pairs_matched += other.index_pairs_matched;
        self.total_anchors += other.total_anchors;
        self.total_overlaps += other.total_overlaps;
        self.total_alignments += other.total_alignments;
        self.records_written += other.records_written;
        self.host_indices_built += other.host_indices_built;
        self.device_uploads += other.device_uploads;
        self.device_reuses += other.device_reuses;
        self.peak_device_bytes = self.peak_device_bytes.max(other.peak_device_bytes);
    }

    pub fn record_host_cache(&mut self, cache: &CacheStatistics) {
        self.host_indices_built += cache.created;
    }

    pub fn record_device_cache(&mut self, cache: &CacheStatistics) {
        self.device_uploads += cache.created;
        self.device_reuses += cache.reused + cache.aliased;
    }
}

impl fmt::Display for PipelineStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batches ({} device batches, {} index pairs) on {} device(s), \
             {} anchors, {} overlaps, {} alignments, {} records written, \
             {} indices built, {} uploads ({} reused), peak device memory {} bytes, \
             {:.3}s wall, {:.3}s CPU",
            self.batches_processed,
            self.device_batches_processed,
            self.index_pairs_matched,
            self.devices,
            self.total_anchors,
            self.total_overlaps,
            self.total_alignments,
            self.records_written,
            self.host_indices_built,
            self.device_uploads,
            self.device_reuses,
            self.peak_device_bytes,
            self.wall_time_secs,
            self.cpu_time_secs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sums_counters_and_keeps_peak() {
        let mut total = PipelineStatistics::new();
        let a = PipelineStatistics {
            devices: 1,
            batches_processed: 2,
            total_overlaps: 10,
            peak_device_bytes: 500,
            wall_time_secs: 3.0,
            ..Default::default()
        };
        let b = PipelineStatistics {
            devices: 1,
            batches_processed: 3,
            total_overlaps: 5,
            peak_device_bytes: 700,
            ..Default::default()
        };
        total.merge(&a);
        total.merge(&b);

        assert_eq!(total.devices, 2);
        assert_eq!(total.batches_processed, 5);
        assert_eq!(total.total_overlaps, 15);
        assert_eq!(total.peak_device_bytes, 700);
        assert_eq!(total.wall_time_secs, 0.0);
    }

    #[test]
    fn test_cache_counters() {
        let mut stats = PipelineStatistics::new();
        stats.record_host_cache(&CacheStatistics {
            created: 4,
            reused: 1,
            aliased: 2,
            evicted: 0,
        });
        stats.record_device_cache(&CacheStatistics {
            created: 3,
            reused: 2,
            aliased: 1,
            evicted: 1,
        });
        assert_eq!(stats.host_indices_built, 4);
        assert_eq!(stats.device_uploads, 3);
        assert_eq!(stats.device_reuses, 3);
    }

    #[test]
    fn test_display_mentions_overlaps() {
        let stats = PipelineStatistics {
            total_overlaps: 42,
            ..Default::default()
        };
        assert!(stats.to_string().contains("42 overlaps"));
    }
}
