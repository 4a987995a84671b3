use std::sync::{Arc, Condvar, Mutex, PoisonError};

use super::{DeviceId, ensure_current_device};
use crate::error::Result;

#[derive(Debug, Default)]
struct PendingWork {
    count: Mutex<usize>,
    idle: Condvar,
}

/// Execution stream of one device.
///
/// Work submitted on the stream holds a [`WorkToken`] until it completes;
/// [`Stream::synchronize`] blocks until no token is outstanding.
#[derive(Debug)]
pub struct Stream {
    device: DeviceId,
    pending: Arc<PendingWork>,
}

impl Stream {
    pub fn new(device: DeviceId) -> Result<Self> {
        ensure_current_device(device)?;
        Ok(Self {
            device,
            pending: Arc::new(PendingWork::default()),
        })
    }

    #[inline]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Register one unit of asynchronous work on this stream.
    pub fn begin_work(&self) -> Result<WorkToken> {
        ensure_current_device(self.device)?;
        let mut count = self
            .pending
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count += 1;
        Ok(WorkToken {
            pending: Arc::clone(&self.pending),
        })
    }

    pub fn pending_work(&self) -> usize {
        *self
            .pending
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until all work submitted on this stream has completed.
    pub fn synchronize(&self) -> Result<()> {
        ensure_current_device(self.device)?;
        let mut count = self
            .pending
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            count = self
                .pending
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Ok(())
    }
}

/// Marks one in-flight work item; completes when dropped.
#[derive(Debug)]
pub struct WorkToken {
    pending: Arc<PendingWork>,
}

impl Drop for WorkToken {
    fn drop(&mut self) {
        let mut count = self
            .pending
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count -= 1;
        if *count == 0 {
            self.pending.idle.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::set_device;
    use std::time::Duration;

    #[test]
    fn test_synchronize_waits_for_outstanding_work() {
        set_device(DeviceId(0));
        let stream = Stream::new(DeviceId(0)).unwrap();
        let token = stream.begin_work().unwrap();
        assert_eq!(stream.pending_work(), 1);

        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            drop(token);
        });

        stream.synchronize().unwrap();
        assert_eq!(stream.pending_work(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn test_idle_stream_synchronizes_immediately() {
        set_device(DeviceId(2));
        let stream = Stream::new(DeviceId(2)).unwrap();
        stream.synchronize().unwrap();
    }

    #[test]
    fn test_stream_requires_affinity() {
        set_device(DeviceId(0));
        assert!(Stream::new(DeviceId(1)).is_err());
    }
}
