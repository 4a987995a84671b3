//! Two-level index cache.
//!
//! ```text
//!            builds                       uploads
//! sequences ───────▶ IndexCacheHost ─────────────▶ IndexCacheDevice ──▶ matcher
//!                    (whole host batch)            (current device batch)
//! ```
//!
//! The host level keeps every index of the current host batch so that the
//! device batches carved out of it never rebuild anything. The device level
//! holds only what the pending device batch matches against and evicts
//! everything else before uploading, since device memory is the scarce
//! resource. Both levels hand out `Arc`s: an index stays alive while any
//! cache state or lookup still refers to it.
//!
//! In all-to-all mode queries and targets are the same reads, so each level
//! looks in the other role's map before building or uploading.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::host::{DeviceIndex, HostIndex, IndexBuilder};
use crate::batching::IndexDescriptor;
use crate::core::io::SequenceSource;
use crate::device::{DeviceAllocator, Stream};
use crate::error::{MapperError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheRole {
    Query,
    Target,
}

impl fmt::Display for CacheRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheRole::Query => write!(f, "query"),
            CacheRole::Target => write!(f, "target"),
        }
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    /// Indices constructed (host) or uploaded (device)
    pub created: usize,
    /// Requests satisfied by an entry of the same role
    pub reused: usize,
    /// Requests satisfied by the other role's entry (all-to-all only)
    pub aliased: usize,
    pub evicted: usize,
}

/// Host-resident indices of the current host batch.
pub struct IndexCacheHost<'a> {
    builder: &'a dyn IndexBuilder,
    query_source: &'a dyn SequenceSource,
    target_source: &'a dyn SequenceSource,
    all_to_all: bool,
    query_cache: HashMap<IndexDescriptor, Arc<HostIndex>>,
    target_cache: HashMap<IndexDescriptor, Arc<HostIndex>>,
    stats: CacheStatistics,
}

impl<'a> IndexCacheHost<'a> {
    pub fn new(
        builder: &'a dyn IndexBuilder,
        query_source: &'a dyn SequenceSource,
        target_source: &'a dyn SequenceSource,
        all_to_all: bool,
    ) -> Self {
        Self {
            builder,
            query_source,
            target_source,
            all_to_all,
            query_cache: HashMap::new(),
            target_cache: HashMap::new(),
            stats: CacheStatistics::default(),
        }
    }

    /// Make `descriptors` the query cache content, building what is missing.
    ///
    /// Entries outside `descriptors` are evicted unless listed in
    /// `needed_on_device_next`.
    pub fn generate_query_cache_content(
        &mut self,
        descriptors: &[IndexDescriptor],
        needed_on_device_next: &[IndexDescriptor],
    ) -> Result<()> {
        self.generate_content(CacheRole::Query, descriptors, needed_on_device_next)
    }

    pub fn generate_target_cache_content(
        &mut self,
        descriptors: &[IndexDescriptor],
        needed_on_device_next: &[IndexDescriptor],
    ) -> Result<()> {
        self.generate_content(CacheRole::Target, descriptors, needed_on_device_next)
    }

    fn generate_content(
        &mut self,
        role: CacheRole,
        descriptors: &[IndexDescriptor],
        needed_on_device_next: &[IndexDescriptor],
    ) -> Result<()> {
        let (own, other, source) = match role {
            CacheRole::Query => (&mut self.query_cache, &self.target_cache, self.query_source),
            CacheRole::Target => (&mut self.target_cache, &self.query_cache, self.target_source),
        };
        // Built aside so a failed build leaves the role's content untouched
        let previous = &*own;
        let mut content = HashMap::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if content.contains_key(descriptor) {
                continue;
            }
            let index = if let Some(index) = previous.get(descriptor) {
                self.stats.reused += 1;
                Arc::clone(index)
            } else if let Some(index) = other.get(descriptor).filter(|_| self.all_to_all) {
                self.stats.aliased += 1;
                Arc::clone(index)
            } else {
                self.stats.created += 1;
                self.builder.build_host_index(source, *descriptor)?
            };
            content.insert(*descriptor, index);
        }

        for descriptor in needed_on_device_next {
            if !content.contains_key(descriptor) {
                if let Some(index) = previous.get(descriptor) {
                    content.insert(*descriptor, Arc::clone(index));
                }
            }
        }

        let evicted = previous
            .keys()
            .filter(|descriptor| !content.contains_key(descriptor))
            .count();
        self.stats.evicted += evicted;

        log::debug!(
            "Host {} cache: {} indices ({} evicted)",
            role,
            content.len(),
            evicted
        );
        *own = content;
        Ok(())
    }

    pub fn get_index_from_query_cache(&self, descriptor: &IndexDescriptor) -> Result<Arc<HostIndex>> {
        self.lookup(CacheRole::Query, descriptor)
    }

    pub fn get_index_from_target_cache(&self, descriptor: &IndexDescriptor) -> Result<Arc<HostIndex>> {
        self.lookup(CacheRole::Target, descriptor)
    }

    fn lookup(&self, role: CacheRole, descriptor: &IndexDescriptor) -> Result<Arc<HostIndex>> {
        let cache = match role {
            CacheRole::Query => &self.query_cache,
            CacheRole::Target => &self.target_cache,
        };
        cache
            .get(descriptor)
            .cloned()
            .ok_or(MapperError::NotFound {
                cache: "host",
                role,
                descriptor: *descriptor,
            })
    }

    /// Descriptors currently cached for `role`, in read order.
    pub fn cached_descriptors(&self, role: CacheRole) -> Vec<IndexDescriptor> {
        let cache = match role {
            CacheRole::Query => &self.query_cache,
            CacheRole::Target => &self.target_cache,
        };
        let mut descriptors: Vec<_> = cache.keys().copied().collect();
        descriptors.sort_unstable();
        descriptors
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.stats
    }
}

/// Device-resident indices of the current device batch.
pub struct IndexCacheDevice<'a> {
    builder: &'a dyn IndexBuilder,
    allocator: &'a DeviceAllocator,
    stream: &'a Stream,
    all_to_all: bool,
    query_cache: HashMap<IndexDescriptor, Arc<DeviceIndex>>,
    target_cache: HashMap<IndexDescriptor, Arc<DeviceIndex>>,
    stats: CacheStatistics,
}

impl<'a> IndexCacheDevice<'a> {
    pub fn new(
        builder: &'a dyn IndexBuilder,
        allocator: &'a DeviceAllocator,
        stream: &'a Stream,
        all_to_all: bool,
    ) -> Self {
        Self {
            builder,
            allocator,
            stream,
            all_to_all,
            query_cache: HashMap::new(),
            target_cache: HashMap::new(),
            stats: CacheStatistics::default(),
        }
    }

    /// Make exactly `descriptors` resident as queries, uploading from
    /// `host_cache` what is not on the device yet.
    pub fn generate_query_cache_content(
        &mut self,
        host_cache: &IndexCacheHost<'_>,
        descriptors: &[IndexDescriptor],
    ) -> Result<()> {
        self.generate_content(CacheRole::Query, host_cache, descriptors)
    }

    pub fn generate_target_cache_content(
        &mut self,
        host_cache: &IndexCacheHost<'_>,
        descriptors: &[IndexDescriptor],
    ) -> Result<()> {
        self.generate_content(CacheRole::Target, host_cache, descriptors)
    }

    fn generate_content(
        &mut self,
        role: CacheRole,
        host_cache: &IndexCacheHost<'_>,
        descriptors: &[IndexDescriptor],
    ) -> Result<()> {
        let (own, other) = match role {
            CacheRole::Query => (&mut self.query_cache, &self.target_cache),
            CacheRole::Target => (&mut self.target_cache, &self.query_cache),
        };
        let mut previous = std::mem::take(own);
        let mut content = HashMap::with_capacity(descriptors.len());
        let mut missing = Vec::new();

        for descriptor in descriptors {
            if content.contains_key(descriptor) || missing.contains(descriptor) {
                continue;
            }
            if let Some(index) = previous.remove(descriptor) {
                self.stats.reused += 1;
                content.insert(*descriptor, index);
            } else if let Some(index) = other.get(descriptor).filter(|_| self.all_to_all) {
                self.stats.aliased += 1;
                content.insert(*descriptor, Arc::clone(index));
            } else {
                missing.push(*descriptor);
            }
        }

        // Free device memory before uploading replacements
        let evicted = previous.len();
        self.stats.evicted += evicted;
        drop(previous);

        // Evicted entries are gone once their memory is released; on a failed
        // upload the role keeps every index that is still resident.
        let mut failure = None;
        for descriptor in missing {
            let host_index = match role {
                CacheRole::Query => host_cache.get_index_from_query_cache(&descriptor),
                CacheRole::Target => host_cache.get_index_from_target_cache(&descriptor),
            };
            let uploaded = host_index.and_then(|host_index| {
                self.builder
                    .upload_to_device(&host_index, self.allocator, self.stream)
            });
            match uploaded {
                Ok(device_index) => {
                    self.stats.created += 1;
                    content.insert(descriptor, device_index);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            *own = content;
            return Err(e);
        }

        log::debug!(
            "{} {} cache: {} indices resident ({} evicted, {} bytes free)",
            self.allocator.device(),
            role,
            content.len(),
            evicted,
            self.allocator.free_memory()
        );
        *own = content;
        Ok(())
    }

    pub fn get_index_from_query_cache(&self, descriptor: &IndexDescriptor) -> Result<Arc<DeviceIndex>> {
        self.lookup(CacheRole::Query, descriptor)
    }

    pub fn get_index_from_target_cache(&self, descriptor: &IndexDescriptor) -> Result<Arc<DeviceIndex>> {
        self.lookup(CacheRole::Target, descriptor)
    }

    fn lookup(&self, role: CacheRole, descriptor: &IndexDescriptor) -> Result<Arc<DeviceIndex>> {
        let cache = match role {
            CacheRole::Query => &self.query_cache,
            CacheRole::Target => &self.target_cache,
        };
        cache
            .get(descriptor)
            .cloned()
            .ok_or(MapperError::NotFound {
                cache: "device",
                role,
                descriptor: *descriptor,
            })
    }

    pub fn cached_descriptors(&self, role: CacheRole) -> Vec<IndexDescriptor> {
        let cache = match role {
            CacheRole::Query => &self.query_cache,
            CacheRole::Target => &self.target_cache,
        };
        let mut descriptors: Vec<_> = cache.keys().copied().collect();
        descriptors.sort_unstable();
        descriptors
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.stats
    }
}
