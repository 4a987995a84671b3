//! Anchor matching, overlap detection and post-processing.

pub mod matcher;
pub mod overlapper;
pub mod types;

pub use matcher::Matcher;
pub use overlapper::{OverlapThresholds, Overlapper, post_process_overlaps};
pub use types::{Anchor, Overlap, OverlapsAndCigars, RelativeStrand};
