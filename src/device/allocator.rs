use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{DeviceId, ensure_current_device};
use crate::error::{MapperError, Result};

#[derive(Debug)]
struct AllocatorState {
    device: DeviceId,
    capacity: u64,
    used: AtomicU64,
    peak: AtomicU64,
}

/// Memory accounting for one device.
///
/// Cloning yields another handle to the same device memory. Allocations are
/// RAII: the bytes return to the pool when the [`DeviceAllocation`] drops,
/// whichever thread drops it.
#[derive(Debug, Clone)]
pub struct DeviceAllocator {
    state: Arc<AllocatorState>,
}

impl DeviceAllocator {
    pub fn new(device: DeviceId, capacity: u64) -> Self {
        Self {
            state: Arc::new(AllocatorState {
                device,
                capacity,
                used: AtomicU64::new(0),
                peak: AtomicU64::new(0),
            }),
        }
    }

    #[inline]
    pub fn device(&self) -> DeviceId {
        self.state.device
    }

    pub fn total_memory(&self) -> u64 {
        self.state.capacity
    }

    pub fn free_memory(&self) -> u64 {
        self.state.capacity - self.state.used.load(Ordering::Acquire)
    }

    /// Emulated memory does not fragment, so the largest block is all of it.
    pub fn largest_free_block(&self) -> u64 {
        self.free_memory()
    }

    pub fn peak_usage(&self) -> u64 {
        self.state.peak.load(Ordering::Relaxed)
    }

    /// Reserve `bytes` of device memory.
    ///
    /// Must be called from a thread pinned to this device.
    pub fn allocate(&self, bytes: u64, purpose: &str) -> Result<DeviceAllocation> {
        ensure_current_device(self.state.device)?;

        let mut used = self.state.used.load(Ordering::Acquire);
        loop {
            let available = self.state.capacity - used;
            if bytes > available {
                return Err(MapperError::ResourceExhausted {
                    device: self.state.device,
                    requested: bytes,
                    available,
                    context: purpose.to_string(),
                });
            }
            match self.state.used.compare_exchange_weak(
                used,
                used + bytes,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => used = actual,
            }
        }
        self.state.peak.fetch_max(used + bytes, Ordering::Relaxed);

        log::trace!(
            "{}: allocated {} bytes for {} ({} free)",
            self.state.device,
            bytes,
            purpose,
            self.free_memory()
        );

        Ok(DeviceAllocation {
            state: Arc::clone(&self.state),
            bytes,
        })
    }
}

/// A block of device memory; released on drop.
#[derive(Debug)]
pub struct DeviceAllocation {
    state: Arc<AllocatorState>,
    bytes: u64,
}

impl DeviceAllocation {
    #[inline]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    #[inline]
    pub fn device(&self) -> DeviceId {
        self.state.device
    }
}

impl Drop for DeviceAllocation {
    fn drop(&mut self) {
        self.state.used.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}
