//! (w,k) minimizer extraction.
//!
//! K-mers are 2-bit packed, canonicalized against their reverse complement
//! and passed through an invertible integer hash before windowing, so that
//! low-complexity k-mers (poly-A and friends) do not dominate the minimizer
//! set. K-mers containing ambiguous bases are never selected.

use std::collections::VecDeque;

/// Strand on which the canonical k-mer of a minimizer was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    Reverse,
}

/// One minimizer occurrence inside an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Representation {
    pub hash: u64,
    pub read_id: u32,
    pub position: u32,
    pub strand: Strand,
}

#[inline(always)]
fn base_to_bits(base: u8) -> Option<u64> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Invertible 64-bit hash restricted to `mask` (Thomas Wang's integer hash).
#[inline]
pub fn hash64(key: u64, mask: u64) -> u64 {
    let mut key = (!key).wrapping_add(key << 21) & mask;
    key ^= key >> 24;
    key = (key.wrapping_add(key << 3)).wrapping_add(key << 8) & mask;
    key ^= key >> 14;
    key = (key.wrapping_add(key << 2)).wrapping_add(key << 4) & mask;
    key ^= key >> 28;
    key = key.wrapping_add(key << 31) & mask;
    key
}

/// Hash and strand of every k-mer start position; `None` where the k-mer
/// contains an ambiguous base.
fn kmer_hashes(sequence: &[u8], kmer_size: usize) -> Vec<Option<(u64, Strand)>> {
    if sequence.len() < kmer_size {
        return Vec::new();
    }

    let mask = if kmer_size == 32 {
        u64::MAX
    } else {
        (1u64 << (2 * kmer_size)) - 1
    };
    let shift = 2 * (kmer_size as u64 - 1);

    let mut hashes = Vec::with_capacity(sequence.len() - kmer_size + 1);
    let mut forward = 0u64;
    let mut reverse = 0u64;
    let mut valid_run = 0usize;

    for (i, &base) in sequence.iter().enumerate() {
        match base_to_bits(base) {
            Some(bits) => {
                forward = ((forward << 2) | bits) & mask;
                reverse = (reverse >> 2) | ((3 - bits) << shift);
                valid_run += 1;
            }
            None => valid_run = 0,
        }

        if i + 1 >= kmer_size {
            if valid_run >= kmer_size && forward != reverse {
                let (canonical, strand) = if forward < reverse {
                    (forward, Strand::Forward)
                } else {
                    (reverse, Strand::Reverse)
                };
                hashes.push(Some((hash64(canonical, mask), strand)));
            } else {
                // ambiguous or palindromic k-mer
                hashes.push(None);
            }
        }
    }
    hashes
}

/// Minimizers of `sequence`: the smallest hash in every window of
/// `window_size` consecutive k-mers, leftmost on ties, each position
/// reported once.
///
/// Sequences shorter than a full window contribute the minimizer of the
/// k-mers they do have.
pub fn minimizers(
    sequence: &[u8],
    read_id: u32,
    kmer_size: usize,
    window_size: usize,
) -> Vec<Representation> {
    let hashes = kmer_hashes(sequence, kmer_size);
    if hashes.is_empty() {
        return Vec::new();
    }

    let window = window_size.min(hashes.len()).max(1);
    let mut result: Vec<Representation> = Vec::with_capacity(2 * hashes.len() / (window + 1) + 1);
    // Monotone queue of candidate positions with non-decreasing hashes
    let mut candidates: VecDeque<usize> = VecDeque::with_capacity(window);

    for (position, entry) in hashes.iter().enumerate() {
        if let Some((hash, _)) = entry {
            while let Some(&back) = candidates.back() {
                match hashes[back] {
                    Some((back_hash, _)) if back_hash > *hash => {
                        candidates.pop_back();
                    }
                    _ => break,
                }
            }
            candidates.push_back(position);
        }

        if position + 1 < window {
            continue;
        }
        let window_start = position + 1 - window;
        while candidates.front().is_some_and(|&front| front < window_start) {
            candidates.pop_front();
        }

        if let Some(&best) = candidates.front() {
            let already_reported = result
                .last()
                .is_some_and(|last| last.position as usize == best);
            if !already_reported {
                if let Some((hash, strand)) = hashes[best] {
                    result.push(Representation {
                        hash,
                        read_id,
                        position: best as u32,
                        strand,
                    });
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reverse_complement(seq: &[u8]) -> Vec<u8> {
        seq.iter()
            .rev()
            .map(|b| match b {
                b'A' => b'T',
                b'C' => b'G',
                b'G' => b'C',
                b'T' => b'A',
                x => *x,
            })
            .collect()
    }

    const SEQ: &[u8] = b"ACGGTTAGCCATGACGTTAGCAGGACTTAGCCGATCGATTACGGATCAGGCTA";

    #[test]
    fn test_hash_is_bijective_on_small_domain() {
        let mask = (1u64 << 10) - 1;
        let mut seen: Vec<u64> = (0..=mask).map(|k| hash64(k, mask)).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), (mask + 1) as usize);
    }

    #[test]
    fn test_every_window_is_covered() {
        let k = 5;
        let w = 4;
        let mins = minimizers(SEQ, 0, k, w);
        assert!(!mins.is_empty());
        let n_kmers = SEQ.len() - k + 1;
        for start in 0..=(n_kmers - w) {
            assert!(
                mins.iter()
                    .any(|m| (m.position as usize) >= start && (m.position as usize) < start + w),
                "window starting at {} has no minimizer",
                start
            );
        }
        for pair in mins.windows(2) {
            assert!(pair[0].position < pair[1].position);
        }
    }

    #[test]
    fn test_reverse_complement_has_same_hashes() {
        let k = 7;
        let w = 5;
        let mut forward: Vec<u64> = minimizers(SEQ, 0, k, w).iter().map(|m| m.hash).collect();
        let mut reverse: Vec<u64> = minimizers(&reverse_complement(SEQ), 0, k, w)
            .iter()
            .map(|m| m.hash)
            .collect();
        forward.sort_unstable();
        forward.dedup();
        reverse.sort_unstable();
        reverse.dedup();
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_ambiguous_bases_are_skipped() {
        let k = 4;
        let seq = b"ACGTNNNNACGGTA";
        for m in minimizers(seq, 9, k, 2) {
            let kmer = &seq[m.position as usize..m.position as usize + k];
            assert!(!kmer.contains(&b'N'));
            assert_eq!(m.read_id, 9);
        }
    }

    #[test]
    fn test_short_sequences() {
        assert!(minimizers(b"ACG", 0, 5, 3).is_empty());
        assert_eq!(minimizers(b"ACGTA", 0, 5, 3).len(), 1);
    }
}
