//! The overlap pipeline: batch queue, per-device workers and writers.
//!
//! - `orchestrator`: spawns one worker per device and merges their results
//! - `stage`: match + overlap (+ align) for one device batch
//! - `alignment`: spreads the overlaps of a device batch over alignment engines
//! - `queue`: global batch queue and per-device result queues
//! - `writer`: per-device PAF writer
//! - `statistics`: run counters

pub mod alignment;
pub mod orchestrator;
pub mod queue;
pub mod stage;
pub mod statistics;
pub mod writer;

pub use alignment::{AlignmentSizing, align_overlaps, alignment_batch_size};
pub use orchestrator::MappingOrchestrator;
pub use queue::{BatchQueue, ResultConsumer, ResultProducer, result_queue};
pub use stage::OverlapStage;
pub use statistics::PipelineStatistics;
pub use writer::{SharedOutput, write_overlaps};
