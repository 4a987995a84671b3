//! Minimizer indices and the two-level (host, device) index cache.

pub mod cache;
pub mod host;
pub mod minimizer;

pub use cache::{CacheRole, CacheStatistics, IndexCacheDevice, IndexCacheHost};
pub use host::{DeviceIndex, HostIndex, IndexBuilder, MinimizerIndexBuilder};
pub use minimizer::{Representation, Strand};
