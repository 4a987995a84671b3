// src/defaults.rs

// Indexing Constants
pub const KMER_SIZE: usize = 15;
pub const WINDOW_SIZE: usize = 10;
pub const FILTERING_PARAMETER: f64 = 1.0;
pub const MAX_KMER_SIZE: usize = 32;

// Batching Constants (MiB of estimated index memory)
pub const INDEX_SIZE_MIB: u64 = 32;
pub const DEVICE_BATCH_SIZE_MIB: u64 = 256;
pub const HOST_BATCH_SIZE_MIB: u64 = 2048;
pub const DEVICE_MEMORY_MIB: u64 = 4096;

// Overlap Detection Constants
pub const MIN_RESIDUES: u32 = 3;
pub const MIN_OVERLAP_LEN: u32 = 250;
pub const MIN_BASES_PER_RESIDUE: u32 = 1000;
pub const MIN_OVERLAP_FRACTION: f32 = 0.8;
pub const CHAIN_MAX_GAP: u32 = 1000;
pub const CHAIN_BANDWIDTH: u32 = 500;

// Device Constants
pub const NUM_DEVICES: usize = 1;
pub const NUM_ALIGNMENT_ENGINES: usize = 0;

/// Device bytes per DP cell of one alignment (one traceback byte)
pub const ALIGNMENT_BYTES_PER_CELL: f64 = 1.0;
/// Fraction of free device memory handed to alignment engines
pub const ALIGNMENT_MEMORY_FRACTION: f64 = 0.85;

// Other Constants
pub const VERBOSITY: i32 = 3;
pub const MIB: u64 = 1024 * 1024;
