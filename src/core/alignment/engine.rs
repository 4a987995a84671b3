//! Batched alignment engines.
//!
//! An [`Aligner`] collects query/target pairs up to its batch capacity,
//! computes them asynchronously on its device with [`Aligner::align_all`] and
//! hands the CIGARs back, in submission order, after
//! [`Aligner::sync_alignments`]. Engines are reset and reused between batches
//! and are never shared between threads.
//!
//! The CPU engine runs each batch as one unit of work on its device stream,
//! spread over a rayon pool dedicated to that device.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, bounded};
use rayon::prelude::*;

use super::cigar;
use super::global::align_global;
use crate::defaults;
use crate::device::{DeviceAllocation, DeviceAllocator, DeviceId, Stream, set_device};
use crate::error::{MapperError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentType {
    /// End-to-end over both sequences
    Global,
}

/// Outcome of [`Aligner::add_alignment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentStatus {
    Success,
    /// The batch already holds `batch_capacity` pairs
    ExceededMaxAlignments,
    /// Query or target longer than the engine was sized for
    ExceededMaxLength,
}

impl AlignmentStatus {
    pub fn describe(self) -> &'static str {
        match self {
            AlignmentStatus::Success => "success",
            AlignmentStatus::ExceededMaxAlignments => "batch capacity exceeded",
            AlignmentStatus::ExceededMaxLength => "sequence longer than engine maximum",
        }
    }
}

/// Device memory one alignment of the given maximum lengths needs.
pub fn alignment_cost_bytes(max_query_length: usize, max_target_length: usize) -> f64 {
    defaults::ALIGNMENT_BYTES_PER_CELL * max_query_length as f64 * max_target_length as f64
}

pub trait Aligner: Send {
    fn add_alignment(&mut self, query: &[u8], target: &[u8]) -> AlignmentStatus;

    /// Start computing every submitted pair; returns without waiting.
    fn align_all(&mut self) -> Result<()>;

    /// Block until the batch started by `align_all` has finished.
    fn sync_alignments(&mut self) -> Result<()>;

    /// CIGARs of the last synchronized batch, in submission order.
    fn get_alignments(&self) -> &[String];

    fn reset(&mut self);
}

pub trait AlignerFactory: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn create<'a>(
        &self,
        max_query_length: usize,
        max_target_length: usize,
        batch_capacity: usize,
        alignment_type: AlignmentType,
        allocator: &DeviceAllocator,
        stream: &'a Stream,
        device: DeviceId,
    ) -> Result<Box<dyn Aligner + 'a>>;
}

type AlignmentPair = (Vec<u8>, Vec<u8>);

/// Host-backed engine.
pub struct CpuAligner<'a> {
    device: DeviceId,
    stream: &'a Stream,
    pool: Arc<rayon::ThreadPool>,
    max_query_length: usize,
    max_target_length: usize,
    batch_capacity: usize,
    pending: Vec<AlignmentPair>,
    in_flight: Option<Receiver<Vec<String>>>,
    alignments: Vec<String>,
    _buffer: DeviceAllocation,
}

impl Aligner for CpuAligner<'_> {
    fn add_alignment(&mut self, query: &[u8], target: &[u8]) -> AlignmentStatus {
        if self.pending.len() >= self.batch_capacity {
            return AlignmentStatus::ExceededMaxAlignments;
        }
        if query.len() > self.max_query_length || target.len() > self.max_target_length {
            return AlignmentStatus::ExceededMaxLength;
        }
        self.pending.push((query.to_vec(), target.to_vec()));
        AlignmentStatus::Success
    }

    fn align_all(&mut self) -> Result<()> {
        let pairs = std::mem::take(&mut self.pending);
        let token = self.stream.begin_work()?;
        let (tx, rx) = bounded(1);

        log::trace!("{}: aligning batch of {}", self.device, pairs.len());
        self.pool.spawn(move || {
            let _token = token;
            let cigars: Vec<String> = pairs
                .par_iter()
                .map(|(query, target)| cigar::to_string(&align_global(query, target).cigar))
                .collect();
            // receiver gone means the engine was reset without syncing
            let _ = tx.send(cigars);
        });
        self.in_flight = Some(rx);
        Ok(())
    }

    fn sync_alignments(&mut self) -> Result<()> {
        if let Some(rx) = self.in_flight.take() {
            self.alignments = rx.recv().map_err(|_| {
                MapperError::WorkerPanic(format!("alignment kernel on {}", self.device))
            })?;
        }
        Ok(())
    }

    fn get_alignments(&self) -> &[String] {
        &self.alignments
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.alignments.clear();
        self.in_flight = None;
    }
}

/// Creates [`CpuAligner`]s, sharing one rayon pool per device.
pub struct CpuAlignerFactory {
    threads_per_device: usize,
    pools: Mutex<HashMap<DeviceId, Arc<rayon::ThreadPool>>>,
}

impl CpuAlignerFactory {
    /// `threads_per_device == 0` picks the number of CPU cores.
    pub fn new(threads_per_device: usize) -> Self {
        let threads_per_device = if threads_per_device == 0 {
            num_cpus::get()
        } else {
            threads_per_device
        };
        Self {
            threads_per_device,
            pools: Mutex::new(HashMap::new()),
        }
    }

    fn pool(&self, device: DeviceId) -> Result<Arc<rayon::ThreadPool>> {
        let mut pools = self.pools.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = pools.get(&device) {
            return Ok(Arc::clone(pool));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads_per_device)
            .thread_name(move |i| format!("align-d{}-{}", device.0, i))
            .start_handler(move |_| set_device(device))
            .build()
            .map_err(|e| {
                MapperError::Configuration(format!(
                    "failed to start alignment threads for {}: {}",
                    device, e
                ))
            })?;
        log::debug!(
            "Started {} alignment threads for {}",
            self.threads_per_device,
            device
        );
        let pool = Arc::new(pool);
        pools.insert(device, Arc::clone(&pool));
        Ok(pool)
    }
}

impl AlignerFactory for CpuAlignerFactory {
    fn create<'a>(
        &self,
        max_query_length: usize,
        max_target_length: usize,
        batch_capacity: usize,
        alignment_type: AlignmentType,
        allocator: &DeviceAllocator,
        stream: &'a Stream,
        device: DeviceId,
    ) -> Result<Box<dyn Aligner + 'a>> {
        match alignment_type {
            AlignmentType::Global => {}
        }
        if batch_capacity == 0 {
            return Err(MapperError::Configuration(
                "alignment batch capacity must be positive".to_string(),
            ));
        }
        let buffer_bytes =
            (batch_capacity as f64 * alignment_cost_bytes(max_query_length, max_target_length))
                .ceil() as u64;
        let buffer = allocator.allocate(buffer_bytes, "alignment batch")?;

        Ok(Box::new(CpuAligner {
            device,
            stream,
            pool: self.pool(device)?,
            max_query_length,
            max_target_length,
            batch_capacity,
            pending: Vec::with_capacity(batch_capacity),
            in_flight: None,
            alignments: Vec::new(),
            _buffer: buffer,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alignment::global::traceback_bytes;

    fn engine_fixture() -> (DeviceAllocator, Stream, CpuAlignerFactory) {
        set_device(DeviceId(0));
        (
            DeviceAllocator::new(DeviceId(0), 1 << 20),
            Stream::new(DeviceId(0)).unwrap(),
            CpuAlignerFactory::new(2),
        )
    }

    #[test]
    fn test_batch_round_trip_keeps_submission_order() {
        let (allocator, stream, factory) = engine_fixture();
        let mut aligner = factory
            .create(16, 16, 3, AlignmentType::Global, &allocator, &stream, DeviceId(0))
            .unwrap();

        assert_eq!(aligner.add_alignment(b"ACGTACGT", b"ACGTACGT"), AlignmentStatus::Success);
        assert_eq!(aligner.add_alignment(b"ACGTTTACGT", b"ACGTACGT"), AlignmentStatus::Success);
        assert_eq!(aligner.add_alignment(b"ACGT", b"ACGTAC"), AlignmentStatus::Success);
        assert_eq!(
            aligner.add_alignment(b"A", b"A"),
            AlignmentStatus::ExceededMaxAlignments
        );

        aligner.align_all().unwrap();
        aligner.sync_alignments().unwrap();
        assert_eq!(stream.pending_work(), 0);
        let cigars = aligner.get_alignments();
        assert_eq!(cigars.len(), 3);
        assert_eq!(cigars[0], "8M");
        assert_eq!(cigars[1], "3M2I5M");
        assert_eq!(cigars[2], "4M2D");

        aligner.reset();
        assert!(aligner.get_alignments().is_empty());
        assert_eq!(aligner.add_alignment(b"A", b"A"), AlignmentStatus::Success);
    }

    #[test]
    fn test_oversized_pairs_are_rejected() {
        let (allocator, stream, factory) = engine_fixture();
        let mut aligner = factory
            .create(4, 4, 2, AlignmentType::Global, &allocator, &stream, DeviceId(0))
            .unwrap();
        assert_eq!(
            aligner.add_alignment(b"ACGTA", b"ACGT"),
            AlignmentStatus::ExceededMaxLength
        );
        assert_eq!(
            aligner.add_alignment(b"ACGT", b"ACGTA"),
            AlignmentStatus::ExceededMaxLength
        );
    }

    #[test]
    fn test_engine_buffer_is_charged_to_device() {
        let (allocator, stream, factory) = engine_fixture();
        let aligner = factory
            .create(100, 200, 10, AlignmentType::Global, &allocator, &stream, DeviceId(0))
            .unwrap();
        // one full traceback per pair of the batch
        let used = (1 << 20) - allocator.free_memory();
        assert_eq!(used, 10 * traceback_bytes(100, 200) as u64);
        drop(aligner);
        assert_eq!(allocator.free_memory(), 1 << 20);

        assert!(matches!(
            factory.create(1000, 1000, 2, AlignmentType::Global, &allocator, &stream, DeviceId(0)),
            Err(MapperError::ResourceExhausted { .. })
        ));
    }

    #[test]
    fn test_sync_without_align_is_a_no_op() {
        let (allocator, stream, factory) = engine_fixture();
        let mut aligner = factory
            .create(8, 8, 1, AlignmentType::Global, &allocator, &stream, DeviceId(0))
            .unwrap();
        aligner.sync_alignments().unwrap();
        assert!(aligner.get_alignments().is_empty());
    }
}
