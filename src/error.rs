//! Error type for the overlap pipeline.
//!
//! Library code returns `MapperError`; the command-line front end wraps it in
//! `anyhow` for context. Every failure is local to the device thread that
//! raised it: sibling devices keep running and the run reports the first
//! error once all of them have finished.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::batching::IndexDescriptor;
use crate::device::DeviceId;
use crate::index::CacheRole;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MapperError>;

#[derive(Debug)]
pub enum MapperError {
    /// Invalid options, detected before any worker thread starts.
    Configuration(String),

    /// I/O failure with a short description of what was being done.
    Io {
        context: String,
        source: io::Error,
    },

    /// Malformed sequence input.
    Parse { path: PathBuf, detail: String },

    /// A read id outside the sequence source.
    UnknownRead { read_id: u32, number_of_reads: usize },

    /// Cache lookup for a descriptor that was never requested.
    NotFound {
        cache: &'static str,
        role: CacheRole,
        descriptor: IndexDescriptor,
    },

    /// Device memory cannot satisfy the request.
    ResourceExhausted {
        device: DeviceId,
        requested: u64,
        available: u64,
        context: String,
    },

    /// An alignment engine rejected a query/target pair.
    AlignmentSubmission {
        device: DeviceId,
        overlap_index: usize,
        detail: String,
    },

    /// A device call was issued from a thread pinned elsewhere.
    DeviceAffinity {
        expected: DeviceId,
        current: Option<DeviceId>,
    },

    /// The consumer side of a result queue is gone.
    QueueClosed(DeviceId),

    /// A worker thread panicked.
    WorkerPanic(String),
}

impl MapperError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        MapperError::Io {
            context: context.into(),
            source,
        }
    }
}

impl fmt::Display for MapperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapperError::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
            MapperError::Io { context, source } => write!(f, "I/O error while {}: {}", context, source),
            MapperError::Parse { path, detail } => {
                write!(f, "Failed to parse '{}': {}", path.display(), detail)
            }
            MapperError::UnknownRead {
                read_id,
                number_of_reads,
            } => write!(
                f,
                "Read id {} is out of range (source holds {} reads)",
                read_id, number_of_reads
            ),
            MapperError::NotFound {
                cache,
                role,
                descriptor,
            } => write!(
                f,
                "Index {} not present in {} {} cache",
                descriptor, cache, role
            ),
            MapperError::ResourceExhausted {
                device,
                requested,
                available,
                context,
            } => write!(
                f,
                "Out of memory on {} ({}): requested {} bytes, {} available",
                device, context, requested, available
            ),
            MapperError::AlignmentSubmission {
                device,
                overlap_index,
                detail,
            } => write!(
                f,
                "Alignment engine on {} rejected overlap {}: {}",
                device, overlap_index, detail
            ),
            MapperError::DeviceAffinity { expected, current } => match current {
                Some(current) => write!(
                    f,
                    "Device call for {} issued from a thread pinned to {}",
                    expected, current
                ),
                None => write!(
                    f,
                    "Device call for {} issued from a thread with no device set",
                    expected
                ),
            },
            MapperError::QueueClosed(device) => {
                write!(f, "Writer for {} stopped before the worker finished", device)
            }
            MapperError::WorkerPanic(what) => write!(f, "Worker thread panicked: {}", what),
        }
    }
}

impl std::error::Error for MapperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MapperError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_descriptor_and_role() {
        let err = MapperError::NotFound {
            cache: "host",
            role: CacheRole::Target,
            descriptor: IndexDescriptor::new(10, 5),
        };
        let msg = err.to_string();
        assert!(msg.contains("[10, 15)"), "{}", msg);
        assert!(msg.contains("target"), "{}", msg);
    }

    #[test]
    fn test_io_error_exposes_source() {
        use std::error::Error;
        let err = MapperError::io("writing PAF", io::Error::other("disk full"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("writing PAF"));
    }
}
