use crate::error::{MapperError, Result};

/// One sequenced read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub name: String,
    pub sequence: Vec<u8>,
}

impl Read {
    pub fn new(name: impl Into<String>, sequence: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            sequence,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Random-access view of a read set, shared read-only by all device threads.
pub trait SequenceSource: Send + Sync {
    fn number_of_reads(&self) -> usize;

    fn get_sequence_by_id(&self, read_id: u32) -> Result<&Read>;

    fn read_length(&self, read_id: u32) -> Result<usize> {
        Ok(self.get_sequence_by_id(read_id)?.len())
    }
}

/// Error for a read id past the end of a source.
pub(crate) fn unknown_read(read_id: u32, number_of_reads: usize) -> MapperError {
    MapperError::UnknownRead {
        read_id,
        number_of_reads,
    }
}
