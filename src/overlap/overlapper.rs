//! Anchor chaining and overlap post-processing.
//!
//! Anchors of one (query read, target read, strand) group are visited in
//! query order and appended to the open chain whose last anchor they continue
//! best: forward chains advance along `t - q`, reverse chains along `t + q`.
//! A chain is continued only while both gaps stay within
//! [`CHAIN_MAX_GAP`](crate::defaults::CHAIN_MAX_GAP) and the diagonal drifts
//! less than [`CHAIN_BANDWIDTH`](crate::defaults::CHAIN_BANDWIDTH).

use super::types::{Anchor, Overlap, RelativeStrand};
use crate::defaults;

/// Filters applied to every chained overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapThresholds {
    pub min_residues: u32,
    pub min_overlap_len: u32,
    pub min_bases_per_residue: u32,
    pub min_overlap_fraction: f32,
}

impl Default for OverlapThresholds {
    fn default() -> Self {
        Self {
            min_residues: defaults::MIN_RESIDUES,
            min_overlap_len: defaults::MIN_OVERLAP_LEN,
            min_bases_per_residue: defaults::MIN_BASES_PER_RESIDUE,
            min_overlap_fraction: defaults::MIN_OVERLAP_FRACTION,
        }
    }
}

impl OverlapThresholds {
    pub fn accepts(&self, overlap: &Overlap) -> bool {
        let overlap_len = overlap.overlap_length();
        if overlap.num_residues < self.min_residues || overlap.num_residues == 0 {
            return false;
        }
        if overlap_len / overlap.num_residues >= self.min_bases_per_residue {
            return false;
        }
        if overlap.query_length() < self.min_overlap_len
            || overlap.target_length() < self.min_overlap_len
        {
            return false;
        }
        let overlap_len = overlap_len as f32;
        overlap.query_length() as f32 / overlap_len >= self.min_overlap_fraction
            && overlap.target_length() as f32 / overlap_len >= self.min_overlap_fraction
    }
}

#[derive(Debug, Clone, Copy)]
struct Chain {
    first: Anchor,
    last: Anchor,
    anchors: u32,
}

impl Chain {
    fn start(anchor: Anchor) -> Self {
        Self {
            first: anchor,
            last: anchor,
            anchors: 1,
        }
    }

    /// Diagonal drift if `next` may extend this chain.
    fn drift(&self, next: &Anchor) -> Option<i64> {
        let (lq, lt) = (self.last.query_position as i64, self.last.target_position as i64);
        let (nq, nt) = (next.query_position as i64, next.target_position as i64);
        let max_gap = defaults::CHAIN_MAX_GAP as i64;

        if nq <= lq || nq - lq > max_gap {
            return None;
        }
        let (target_gap, drift) = match next.relative_strand {
            RelativeStrand::Forward => (nt - lt, ((nt - nq) - (lt - lq)).abs()),
            RelativeStrand::Reverse => (lt - nt, ((nt + nq) - (lt + lq)).abs()),
        };
        if target_gap <= 0 || target_gap > max_gap || drift > defaults::CHAIN_BANDWIDTH as i64 {
            return None;
        }
        Some(drift)
    }

    fn to_overlap(self, kmer_size: u32) -> Overlap {
        let (target_start, target_end) = match self.first.relative_strand {
            RelativeStrand::Forward => (
                self.first.target_position,
                self.last.target_position + kmer_size,
            ),
            RelativeStrand::Reverse => (
                self.last.target_position,
                self.first.target_position + kmer_size,
            ),
        };
        Overlap {
            query_read_id: self.first.query_read_id,
            target_read_id: self.first.target_read_id,
            query_start: self.first.query_position,
            query_end: self.last.query_position + kmer_size,
            target_start,
            target_end,
            relative_strand: self.first.relative_strand,
            num_residues: self.anchors,
        }
    }
}

/// Turns anchors into filtered overlaps.
#[derive(Debug, Clone, Copy)]
pub struct Overlapper {
    kmer_size: u32,
}

impl Overlapper {
    pub fn new(kmer_size: u32) -> Self {
        Self { kmer_size }
    }

    pub fn get_overlaps(&self, anchors: &[Anchor], thresholds: &OverlapThresholds) -> Vec<Overlap> {
        let mut sorted = anchors.to_vec();
        sorted.sort_unstable_by_key(|a| {
            (
                a.query_read_id,
                a.target_read_id,
                a.relative_strand,
                a.query_position,
                a.target_position,
            )
        });

        let mut overlaps = Vec::new();
        for group in sorted.chunk_by(|a, b| {
            a.query_read_id == b.query_read_id
                && a.target_read_id == b.target_read_id
                && a.relative_strand == b.relative_strand
        }) {
            for chain in chain_group(group) {
                let overlap = chain.to_overlap(self.kmer_size);
                if thresholds.accepts(&overlap) {
                    overlaps.push(overlap);
                }
            }
        }
        overlaps
    }
}

fn chain_group(group: &[Anchor]) -> Vec<Chain> {
    let max_gap = defaults::CHAIN_MAX_GAP;
    let mut open: Vec<Chain> = Vec::new();
    let mut closed = Vec::new();

    for anchor in group {
        // chains that fell behind can never be extended again
        let mut i = 0;
        while i < open.len() {
            if open[i].last.query_position + max_gap < anchor.query_position {
                closed.push(open.swap_remove(i));
            } else {
                i += 1;
            }
        }

        let best = open
            .iter()
            .enumerate()
            .filter_map(|(i, chain)| chain.drift(anchor).map(|drift| (i, drift)))
            .min_by_key(|&(_, drift)| drift);
        match best {
            Some((i, _)) => {
                open[i].last = *anchor;
                open[i].anchors += 1;
            }
            None => open.push(Chain::start(*anchor)),
        }
    }
    closed.extend(open);
    closed
}

/// Merge overlaps of one read pair that continue each other on the same
/// strand into a single overlap spanning their union.
///
/// `cigars` is either empty or index-aligned with `overlaps` and stays so;
/// a merged overlap gets an empty cigar since neither input covers it.
pub fn post_process_overlaps(overlaps: &mut Vec<Overlap>, cigars: &mut Vec<String>) {
    if overlaps.len() < 2 {
        return;
    }
    let with_cigars = !cigars.is_empty();
    let mut records: Vec<(Overlap, String)> = if with_cigars {
        overlaps.drain(..).zip(cigars.drain(..)).collect()
    } else {
        overlaps.drain(..).map(|o| (o, String::new())).collect()
    };
    records.sort_by_key(|(o, _)| {
        (
            o.query_read_id,
            o.target_read_id,
            o.relative_strand,
            o.query_start,
            o.target_start,
        )
    });

    let mut merged: Vec<(Overlap, String)> = Vec::with_capacity(records.len());
    for (next, cigar) in records {
        if let Some((current, current_cigar)) = merged.last_mut() {
            if continues(current, &next) {
                current.query_start = current.query_start.min(next.query_start);
                current.query_end = current.query_end.max(next.query_end);
                current.target_start = current.target_start.min(next.target_start);
                current.target_end = current.target_end.max(next.target_end);
                current.num_residues += next.num_residues;
                current_cigar.clear();
                continue;
            }
        }
        merged.push((next, cigar));
    }

    for (overlap, cigar) in merged {
        overlaps.push(overlap);
        if with_cigars {
            cigars.push(cigar);
        }
    }
}

fn continues(current: &Overlap, next: &Overlap) -> bool {
    if current.query_read_id != next.query_read_id
        || current.target_read_id != next.target_read_id
        || current.relative_strand != next.relative_strand
        || next.query_start > current.query_end
    {
        return false;
    }
    match current.relative_strand {
        RelativeStrand::Forward => {
            next.target_start <= current.target_end && next.target_start >= current.target_start
        }
        RelativeStrand::Reverse => {
            next.target_end >= current.target_start && next.target_end <= current.target_end
        }
    }
}
