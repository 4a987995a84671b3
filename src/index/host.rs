use std::sync::Arc;

use super::minimizer::{Representation, minimizers};
use crate::batching::IndexDescriptor;
use crate::core::io::SequenceSource;
use crate::device::{DeviceAllocation, DeviceAllocator, DeviceId, Stream};
use crate::error::{MapperError, Result};

/// Minimizer index over one descriptor's reads, resident in host memory.
///
/// Representations are sorted by `(hash, read_id, position)` so two indices
/// can be matched with a single merge join.
#[derive(Debug, Clone)]
pub struct HostIndex {
    descriptor: IndexDescriptor,
    representations: Vec<Representation>,
    number_of_basepairs: u64,
    filtered_representations: usize,
}

impl HostIndex {
    /// Build the index; `filtering_parameter < 1.0` drops every hash whose
    /// share of all representations is at least that fraction.
    pub fn build(
        source: &dyn SequenceSource,
        descriptor: IndexDescriptor,
        kmer_size: usize,
        window_size: usize,
        filtering_parameter: f64,
    ) -> Result<Self> {
        let mut representations = Vec::new();
        let mut number_of_basepairs = 0u64;

        for read_id in descriptor.read_ids() {
            let read = source.get_sequence_by_id(read_id)?;
            number_of_basepairs += read.len() as u64;
            representations.extend(minimizers(&read.sequence, read_id, kmer_size, window_size));
        }
        representations.sort_unstable();

        let before = representations.len();
        if filtering_parameter < 1.0 && !representations.is_empty() {
            representations = filter_frequent(representations, filtering_parameter);
        }
        let filtered_representations = before - representations.len();

        Ok(Self {
            descriptor,
            representations,
            number_of_basepairs,
            filtered_representations,
        })
    }

    #[inline]
    pub fn descriptor(&self) -> IndexDescriptor {
        self.descriptor
    }

    #[inline]
    pub fn representations(&self) -> &[Representation] {
        &self.representations
    }

    pub fn number_of_basepairs(&self) -> u64 {
        self.number_of_basepairs
    }

    pub fn filtered_representations(&self) -> usize {
        self.filtered_representations
    }

    /// Bytes the index occupies once copied to a device.
    pub fn footprint_bytes(&self) -> u64 {
        (self.representations.len() * std::mem::size_of::<Representation>()) as u64
    }
}

/// Drop runs of equal hashes holding at least `fraction` of all entries.
fn filter_frequent(sorted: Vec<Representation>, fraction: f64) -> Vec<Representation> {
    let total = sorted.len() as f64;
    let mut kept = Vec::with_capacity(sorted.len());
    let mut start = 0usize;
    while start < sorted.len() {
        let hash = sorted[start].hash;
        let end = start + sorted[start..].partition_point(|r| r.hash == hash);
        if ((end - start) as f64) / total < fraction {
            kept.extend_from_slice(&sorted[start..end]);
        }
        start = end;
    }
    kept
}

/// Device-resident copy of a [`HostIndex`].
///
/// Holds device memory for as long as any cache or lookup references it.
#[derive(Debug)]
pub struct DeviceIndex {
    host: Arc<HostIndex>,
    allocation: DeviceAllocation,
}

impl DeviceIndex {
    #[inline]
    pub fn descriptor(&self) -> IndexDescriptor {
        self.host.descriptor()
    }

    #[inline]
    pub fn representations(&self) -> &[Representation] {
        self.host.representations()
    }

    pub fn device(&self) -> DeviceId {
        self.allocation.device()
    }

    pub fn device_bytes(&self) -> u64 {
        self.allocation.bytes()
    }
}

/// Constructs host indices and their device copies.
///
/// The caches are the only callers; they guarantee that each descriptor is
/// built at most once per host batch.
pub trait IndexBuilder: Send + Sync {
    fn build_host_index(
        &self,
        source: &dyn SequenceSource,
        descriptor: IndexDescriptor,
    ) -> Result<Arc<HostIndex>>;

    fn upload_to_device(
        &self,
        host_index: &Arc<HostIndex>,
        allocator: &DeviceAllocator,
        stream: &Stream,
    ) -> Result<Arc<DeviceIndex>>;
}

/// Default builder: (w,k) minimizers with optional frequency filtering.
#[derive(Debug, Clone)]
pub struct MinimizerIndexBuilder {
    kmer_size: usize,
    window_size: usize,
    filtering_parameter: f64,
}

impl MinimizerIndexBuilder {
    pub fn new(kmer_size: usize, window_size: usize, filtering_parameter: f64) -> Result<Self> {
        if kmer_size == 0 || kmer_size > crate::defaults::MAX_KMER_SIZE {
            return Err(MapperError::Configuration(format!(
                "k-mer size must be in 1..={}, got {}",
                crate::defaults::MAX_KMER_SIZE,
                kmer_size
            )));
        }
        if window_size == 0 {
            return Err(MapperError::Configuration(
                "window size must be positive".to_string(),
            ));
        }
        if !(filtering_parameter > 0.0 && filtering_parameter <= 1.0) {
            return Err(MapperError::Configuration(format!(
                "filtering parameter must be in (0, 1], got {}",
                filtering_parameter
            )));
        }
        Ok(Self {
            kmer_size,
            window_size,
            filtering_parameter,
        })
    }
}

impl IndexBuilder for MinimizerIndexBuilder {
    fn build_host_index(
        &self,
        source: &dyn SequenceSource,
        descriptor: IndexDescriptor,
    ) -> Result<Arc<HostIndex>> {
        let index = HostIndex::build(
            source,
            descriptor,
            self.kmer_size,
            self.window_size,
            self.filtering_parameter,
        )?;
        log::trace!(
            "Built index {}: {} representations over {} bp ({} filtered)",
            descriptor,
            index.representations().len(),
            index.number_of_basepairs(),
            index.filtered_representations()
        );
        Ok(Arc::new(index))
    }

    fn upload_to_device(
        &self,
        host_index: &Arc<HostIndex>,
        allocator: &DeviceAllocator,
        stream: &Stream,
    ) -> Result<Arc<DeviceIndex>> {
        let _transfer = stream.begin_work()?;
        let allocation = allocator.allocate(
            host_index.footprint_bytes(),
            &format!("index {}", host_index.descriptor()),
        )?;
        Ok(Arc::new(DeviceIndex {
            host: Arc::clone(host_index),
            allocation,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::{FastaParser, Read};
    use crate::device::set_device;

    fn source() -> FastaParser {
        FastaParser::from_reads(vec![
            Read::new("a", b"ACGGTTAGCCATGACGTTAGCAGGACTTAGCC".to_vec()),
            Read::new("b", b"GATCGATTACGGATCAGGCTAACGTTGCA".to_vec()),
            Read::new("c", b"TTGACCAGTAGGCATCAGTTACAGG".to_vec()),
        ])
    }

    #[test]
    fn test_index_is_sorted_and_restricted_to_descriptor() {
        let source = source();
        let index = HostIndex::build(&source, IndexDescriptor::new(1, 2), 5, 3, 1.0).unwrap();
        assert!(!index.representations().is_empty());
        assert!(index.representations().windows(2).all(|w| w[0] <= w[1]));
        assert!(index.representations().iter().all(|r| r.read_id == 1 || r.read_id == 2));
        assert_eq!(index.number_of_basepairs(), 29 + 25);
    }

    #[test]
    fn test_frequency_filter_drops_repeats() {
        let reads = FastaParser::from_reads(vec![
            Read::new("rep", b"ACGTT".repeat(10)),
            Read::new("uniq", b"GATCGATTACGGATCAGGCTAACGTTGCA".to_vec()),
        ]);
        let unfiltered = HostIndex::build(&reads, IndexDescriptor::new(0, 2), 5, 2, 1.0).unwrap();
        let filtered = HostIndex::build(&reads, IndexDescriptor::new(0, 2), 5, 2, 0.05).unwrap();
        assert!(filtered.representations().len() < unfiltered.representations().len());
        assert_eq!(
            filtered.filtered_representations(),
            unfiltered.representations().len() - filtered.representations().len()
        );
    }

    #[test]
    fn test_upload_charges_device_memory() {
        set_device(DeviceId(0));
        let source = source();
        let builder = MinimizerIndexBuilder::new(5, 3, 1.0).unwrap();
        let host = builder
            .build_host_index(&source, IndexDescriptor::new(0, 3))
            .unwrap();
        let allocator = DeviceAllocator::new(DeviceId(0), 1 << 20);
        let stream = Stream::new(DeviceId(0)).unwrap();

        let device = builder.upload_to_device(&host, &allocator, &stream).unwrap();
        assert_eq!(device.device_bytes(), host.footprint_bytes());
        assert_eq!(allocator.free_memory(), (1 << 20) - host.footprint_bytes());
        assert_eq!(device.representations().len(), host.representations().len());

        drop(device);
        assert_eq!(allocator.free_memory(), 1 << 20);
    }

    #[test]
    fn test_builder_rejects_bad_parameters() {
        assert!(MinimizerIndexBuilder::new(0, 10, 1.0).is_err());
        assert!(MinimizerIndexBuilder::new(33, 10, 1.0).is_err());
        assert!(MinimizerIndexBuilder::new(15, 0, 1.0).is_err());
        assert!(MinimizerIndexBuilder::new(15, 10, 0.0).is_err());
    }
}
