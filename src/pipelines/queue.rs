//! Work and result queues shared between threads.
//!
//! - [`BatchQueue`]: the global supply of `BatchOfIndices`, filled once up
//!   front and drained concurrently by the device threads.
//! - [`result_queue`]: per-device handoff of finished results from the device
//!   thread to its writer thread.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::batching::BatchOfIndices;
use crate::device::DeviceId;
use crate::error::{MapperError, Result};

/// Sending half of a result queue.
///
/// The consumer sees the end of the stream once this handle is gone, either
/// through [`ResultProducer::signal_pushed_last_element`] or by being dropped
/// on an error path.
#[derive(Debug)]
pub struct ResultProducer<T> {
    device: DeviceId,
    sender: Sender<T>,
}

/// Receiving half of a result queue.
#[derive(Debug)]
pub struct ResultConsumer<T> {
    receiver: Receiver<T>,
}

/// Unbounded single-consumer queue for one device.
pub fn result_queue<T>(device: DeviceId) -> (ResultProducer<T>, ResultConsumer<T>) {
    let (sender, receiver) = unbounded();
    (
        ResultProducer { device, sender },
        ResultConsumer { receiver },
    )
}

impl<T> ResultProducer<T> {
    /// Enqueue without blocking. Fails only when the consumer is gone.
    pub fn add_new_element(&self, element: T) -> Result<()> {
        self.sender
            .send(element)
            .map_err(|_| MapperError::QueueClosed(self.device))
    }

    pub fn signal_pushed_last_element(self) {
        log::debug!("{}: last result queued", self.device);
    }
}

impl<T> ResultConsumer<T> {
    /// Next element in FIFO order; blocks while the queue is empty and the
    /// producer is alive, `None` once it is gone and the queue is drained.
    pub fn get_next_element(&self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

/// Pre-filled supply of batches, tagged with their generation index.
#[derive(Debug)]
pub struct BatchQueue {
    receiver: Receiver<(usize, BatchOfIndices)>,
    total: usize,
}

impl BatchQueue {
    pub fn new(batches: Vec<BatchOfIndices>) -> Self {
        let total = batches.len();
        let (sender, receiver) = unbounded();
        for entry in batches.into_iter().enumerate() {
            // receiver is alive in this scope
            let _ = sender.send(entry);
        }
        Self { receiver, total }
    }

    /// Take the next batch; `None` once every batch has been handed out.
    pub fn pop(&self) -> Option<(usize, BatchOfIndices)> {
        self.receiver.try_recv().ok()
    }

    pub fn remaining(&self) -> usize {
        self.receiver.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
