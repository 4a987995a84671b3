//! Multi-device driver.
//!
//! # Pipeline Flow
//!
//! ```text
//! generate_batches → BatchQueue ─┬─ device 0: host cache → device cache → OverlapStage → queue → writer
//!                                ├─ device 1: ...
//!                                └─ device N-1
//! ```
//!
//! Each device thread owns its allocator, stream and both caches and pops
//! batches until the shared queue is empty. A device thread that fails stops
//! pulling batches; the others carry on and the run reports the first error
//! once every device has finished.

use std::io::Write;
use std::thread;

use super::queue::{BatchQueue, ResultProducer, result_queue};
use super::stage::OverlapStage;
use super::statistics::PipelineStatistics;
use super::writer::{SharedOutput, write_overlaps};
use crate::batching::{BatchOfIndices, IndexDescriptor, generate_batches};
use crate::core::alignment::AlignerFactory;
use crate::core::io::SequenceSource;
use crate::core::utils::{PipelineTimer, cputime};
use crate::device::{DeviceAllocator, DeviceId, Stream, set_device};
use crate::error::{MapperError, Result};
use crate::index::{IndexBuilder, IndexCacheDevice, IndexCacheHost};
use crate::map_opt::MapOpt;
use crate::overlap::OverlapsAndCigars;

/// Drives a complete mapping run over all configured devices.
pub struct MappingOrchestrator<'a> {
    opt: &'a MapOpt,
    query_source: &'a dyn SequenceSource,
    target_source: &'a dyn SequenceSource,
    builder: &'a dyn IndexBuilder,
    aligner_factory: &'a dyn AlignerFactory,
}

impl<'a> MappingOrchestrator<'a> {
    pub fn new(
        opt: &'a MapOpt,
        query_source: &'a dyn SequenceSource,
        target_source: &'a dyn SequenceSource,
        builder: &'a dyn IndexBuilder,
        aligner_factory: &'a dyn AlignerFactory,
    ) -> Self {
        Self {
            opt,
            query_source,
            target_source,
            builder,
            aligner_factory,
        }
    }

    /// Map every query read against every target read and write PAF records
    /// to `output`.
    pub fn run(&self, output: Box<dyn Write + Send>) -> Result<PipelineStatistics> {
        self.opt.validate()?;
        let timer = PipelineTimer::start();
        let start_cpu = cputime();

        if self.query_source.number_of_reads() == 0 || self.target_source.number_of_reads() == 0 {
            log::warn!("Nothing to map: query or target holds no reads");
        }

        let batches = generate_batches(
            self.query_source,
            self.target_source,
            &self.opt.batch_budgets(),
            self.opt.all_to_all,
        )?;
        let device_batches: usize = batches.iter().map(|b| b.device_batches.len()).sum();
        log::info!(
            "Generated {} batches ({} device batches) for {} device(s)",
            batches.len(),
            device_batches,
            self.opt.num_devices
        );

        let queue = BatchQueue::new(batches);
        let output = SharedOutput::new(output);

        let outcomes: Vec<(DeviceId, Result<PipelineStatistics>)> = thread::scope(|s| {
            let handles: Vec<_> = (0..self.opt.num_devices)
                .map(|i| {
                    let device = DeviceId(i as u32);
                    let queue = &queue;
                    let output = &output;
                    let handle = thread::Builder::new()
                        .name(format!("device-{}", i))
                        .spawn_scoped(s, move || self.run_device(device, queue, output));
                    (device, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(device, handle)| {
                    let outcome = match handle {
                        Ok(handle) => handle.join().unwrap_or_else(|_| {
                            Err(MapperError::WorkerPanic(format!("worker thread of {}", device)))
                        }),
                        Err(e) => Err(MapperError::io(
                            format!("spawning worker thread of {}", device),
                            e,
                        )),
                    };
                    (device, outcome)
                })
                .collect()
        });

        let mut stats = PipelineStatistics::new();
        let mut first_error = None;
        for (device, outcome) in outcomes {
            match outcome {
                Ok(device_stats) => {
                    log::info!("{} complete: {}", device, device_stats);
                    stats.merge(&device_stats);
                }
                Err(e) => {
                    log::error!("{} failed: {}", device, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        if queue.remaining() > 0 {
            log::warn!("{} batches were left unprocessed", queue.remaining());
        }

        stats.wall_time_secs = timer.stop();
        stats.cpu_time_secs = cputime() - start_cpu;
        log::info!("Mapping complete: {}", stats);
        Ok(stats)
    }

    /// Worker body for one device: pulls batches until the queue is empty.
    fn run_device(
        &self,
        device: DeviceId,
        queue: &BatchQueue,
        output: &SharedOutput,
    ) -> Result<PipelineStatistics> {
        set_device(device);
        let allocator = DeviceAllocator::new(device, self.opt.device_memory_bytes);
        let stream = Stream::new(device)?;
        let mut stats = PipelineStatistics {
            devices: 1,
            ..Default::default()
        };

        let (producer, consumer) = result_queue::<OverlapsAndCigars>(device);
        let (processed, written) = thread::scope(|s| {
            let writer = s.spawn(|| {
                write_overlaps(
                    device,
                    consumer,
                    output,
                    self.query_source,
                    self.target_source,
                    self.opt.kmer_size,
                )
            });

            let processed = self.process_batches(device, queue, &allocator, &stream, &producer, &mut stats);
            match &processed {
                Ok(()) => producer.signal_pushed_last_element(),
                Err(_) => drop(producer),
            }

            let written = writer.join().unwrap_or_else(|_| {
                Err(MapperError::WorkerPanic(format!("writer thread of {}", device)))
            });
            (processed, written)
        });
        stream.synchronize()?;

        // A closed queue on the worker side is a symptom; report the writer's cause.
        match (processed, written) {
            (Err(MapperError::QueueClosed(_)), Err(writer_error)) => return Err(writer_error),
            (Err(e), _) => return Err(e),
            (Ok(()), Err(e)) => return Err(e),
            (Ok(()), Ok(records)) => stats.records_written = records,
        }
        stats.peak_device_bytes = allocator.peak_usage();
        Ok(stats)
    }

    fn process_batches(
        &self,
        device: DeviceId,
        queue: &BatchQueue,
        allocator: &DeviceAllocator,
        stream: &Stream,
        producer: &ResultProducer<OverlapsAndCigars>,
        stats: &mut PipelineStatistics,
    ) -> Result<()> {
        let opt = self.opt;
        let mut host_cache = IndexCacheHost::new(
            self.builder,
            self.query_source,
            self.target_source,
            opt.all_to_all,
        );
        let mut device_cache = IndexCacheDevice::new(self.builder, allocator, stream, opt.all_to_all);
        let stage = OverlapStage::new(
            allocator,
            stream,
            self.query_source,
            self.target_source,
            self.aligner_factory,
            opt.kmer_size,
            opt.thresholds(),
            opt.num_alignment_engines,
            opt.all_to_all,
        );

        // Pop only when ready to work on the batch; siblings compete for the rest.
        while let Some((batch_number, batch)) = queue.pop() {
            let (next_queries, next_targets) = first_device_batch(&batch);

            if log::log_enabled!(log::Level::Debug) {
                let reads = |descriptors: &[IndexDescriptor]| -> u32 {
                    descriptors.iter().map(|d| d.number_of_reads()).sum()
                };
                log::debug!(
                    "{}: batch {}/{}: {} query reads x {} target reads in {} device batches",
                    device,
                    batch_number + 1,
                    queue.total(),
                    reads(&batch.host_batch.query_indices),
                    reads(&batch.host_batch.target_indices),
                    batch.device_batches.len()
                );
            }
            host_cache.generate_query_cache_content(&batch.host_batch.query_indices, next_queries)?;
            host_cache.generate_target_cache_content(&batch.host_batch.target_indices, next_targets)?;

            for device_batch in &batch.device_batches {
                device_cache.generate_query_cache_content(&host_cache, &device_batch.query_indices)?;
                device_cache.generate_target_cache_content(&host_cache, &device_batch.target_indices)?;
                stage.process_device_batch(&device_cache, device_batch, producer, stats)?;
            }
            stats.batches_processed += 1;
        }

        stats.record_host_cache(&host_cache.statistics());
        stats.record_device_cache(&device_cache.statistics());
        Ok(())
    }
}

/// Descriptors the device cache uploads first once the host cache is ready.
fn first_device_batch(batch: &BatchOfIndices) -> (&[IndexDescriptor], &[IndexDescriptor]) {
    match batch.device_batches.first() {
        Some(device_batch) => (
            device_batch.query_indices.as_slice(),
            device_batch.target_indices.as_slice(),
        ),
        None => (&[], &[]),
    }
}
