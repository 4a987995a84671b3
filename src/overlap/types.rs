use std::fmt;

/// Orientation of the target relative to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelativeStrand {
    Forward,
    Reverse,
}

impl RelativeStrand {
    #[inline]
    pub fn as_char(self) -> char {
        match self {
            RelativeStrand::Forward => '+',
            RelativeStrand::Reverse => '-',
        }
    }
}

impl fmt::Display for RelativeStrand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A single shared minimizer between a query read and a target read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub query_read_id: u32,
    pub target_read_id: u32,
    pub query_position: u32,
    pub target_position: u32,
    pub relative_strand: RelativeStrand,
}

/// Candidate matching region between two reads. Positions are half-open
/// offsets within each read; for reverse-strand overlaps the target interval
/// is given on the forward strand of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub query_read_id: u32,
    pub target_read_id: u32,
    pub query_start: u32,
    pub query_end: u32,
    pub target_start: u32,
    pub target_end: u32,
    pub relative_strand: RelativeStrand,
    pub num_residues: u32,
}

impl Overlap {
    #[inline]
    pub fn query_length(&self) -> u32 {
        self.query_end - self.query_start
    }

    #[inline]
    pub fn target_length(&self) -> u32 {
        self.target_end - self.target_start
    }

    /// Length of the longer of the two intervals.
    #[inline]
    pub fn overlap_length(&self) -> u32 {
        self.query_length().max(self.target_length())
    }
}

/// Results of one index pair, handed from a device worker to its writer.
///
/// `cigars` is either empty (no alignment engines) or index-aligned with
/// `overlaps`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapsAndCigars {
    pub overlaps: Vec<Overlap>,
    pub cigars: Vec<String>,
}

impl OverlapsAndCigars {
    pub fn has_cigars(&self) -> bool {
        !self.cigars.is_empty()
    }
}
