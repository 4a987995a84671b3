//! Per-device PAF writer.
//!
//! Each device thread has one writer thread draining its result queue. The
//! records of one queue element are formatted without holding any lock and
//! written to the shared output in a single `write_all`, so lines from
//! different devices never interleave.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

use super::queue::ResultConsumer;
use crate::core::io::{SequenceSource, format_paf_records};
use crate::device::{DeviceId, set_device};
use crate::error::{MapperError, Result};
use crate::overlap::{OverlapsAndCigars, post_process_overlaps};

/// Output shared by the writer threads of all devices.
pub struct SharedOutput {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl SharedOutput {
    pub fn new(inner: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Write `buffer` as one uninterrupted block.
    pub fn write_block(&self, buffer: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .write_all(buffer)
            .map_err(|e| MapperError::io("writing PAF records", e))
    }

    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .flush()
            .map_err(|e| MapperError::io("flushing PAF output", e))
    }
}

/// Drain `consumer` until its producer is gone, writing every element.
///
/// Returns the number of records written. On error the consumer is dropped,
/// which makes the device thread's next push fail.
pub fn write_overlaps(
    device: DeviceId,
    consumer: ResultConsumer<OverlapsAndCigars>,
    output: &SharedOutput,
    query_source: &dyn SequenceSource,
    target_source: &dyn SequenceSource,
    kmer_size: usize,
) -> Result<usize> {
    set_device(device);
    let mut records = 0usize;

    while let Some(OverlapsAndCigars {
        mut overlaps,
        mut cigars,
    }) = consumer.get_next_element()
    {
        post_process_overlaps(&mut overlaps, &mut cigars);
        if overlaps.is_empty() {
            continue;
        }
        let buffer = format_paf_records(&overlaps, &cigars, query_source, target_source, kmer_size)?;
        output.write_block(buffer.as_bytes())?;
        records += overlaps.len();
    }

    output.flush()?;
    log::debug!("{}: writer finished after {} records", device, records);
    Ok(records)
}
