//! Device abstraction: identifiers, thread affinity, memory and streams.
//!
//! Devices are emulated in host memory. Each device has a fixed memory
//! capacity that every device-resident object (indices, matcher workspaces,
//! alignment buffers) is charged against, and execution streams that track
//! outstanding work. Affinity is thread-local: every thread that touches a
//! device must call [`set_device`] first, and allocator and stream entry
//! points refuse calls from threads pinned elsewhere.

pub mod allocator;
pub mod stream;

use std::cell::Cell;
use std::fmt;

use crate::error::{MapperError, Result};

pub use allocator::{DeviceAllocation, DeviceAllocator};
pub use stream::{Stream, WorkToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {}", self.0)
    }
}

thread_local! {
    static CURRENT_DEVICE: Cell<Option<DeviceId>> = const { Cell::new(None) };
}

/// Pin the calling thread to `device`.
pub fn set_device(device: DeviceId) {
    CURRENT_DEVICE.with(|current| current.set(Some(device)));
}

pub fn current_device() -> Option<DeviceId> {
    CURRENT_DEVICE.with(|current| current.get())
}

/// Fail unless the calling thread is pinned to `device`.
pub fn ensure_current_device(device: DeviceId) -> Result<()> {
    let current = current_device();
    if current == Some(device) {
        Ok(())
    } else {
        Err(MapperError::DeviceAffinity {
            expected: device,
            current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affinity_is_thread_local() {
        set_device(DeviceId(3));
        assert_eq!(current_device(), Some(DeviceId(3)));
        assert!(ensure_current_device(DeviceId(3)).is_ok());

        let other = std::thread::spawn(|| {
            let before = current_device();
            let check = ensure_current_device(DeviceId(3)).is_err();
            (before, check)
        })
        .join()
        .unwrap();
        assert_eq!(other, (None, true));
    }

    #[test]
    fn test_wrong_device_is_rejected() {
        set_device(DeviceId(0));
        match ensure_current_device(DeviceId(1)) {
            Err(MapperError::DeviceAffinity { expected, current }) => {
                assert_eq!(expected, DeviceId(1));
                assert_eq!(current, Some(DeviceId(0)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
