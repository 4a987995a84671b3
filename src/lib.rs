pub mod batching; // Index descriptors and host/device batch generation
pub mod core; // Alignment engines, sequence I/O, shared utilities
pub mod defaults;
pub mod device; // Emulated device: affinity, memory accounting, streams
pub mod error;
pub mod index; // Minimizer indices and their host/device caches
pub mod map_opt;
pub mod overlap; // Anchor matching, chaining, overlap merging
pub mod pipelines;
