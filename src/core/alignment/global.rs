//! Unit-cost global alignment.
//!
//! Scores are edit distances: mismatches, insertions and deletions cost one
//! each. The traceback matrix stores one direction byte per inner cell (the
//! first row and column are implied); the score matrix is kept as two rolling
//! rows. Ties prefer the diagonal, then insertions, so identical sequences
//! always yield a single `M` run.

use super::cigar::{CigarOp, push_op, reverse};

const DIAGONAL: u8 = 0;
const UP: u8 = 1;
const LEFT: u8 = 2;

/// Result of aligning a query against a target end to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalAlignment {
    pub cigar: Vec<(u8, i32)>,
    pub edit_distance: u32,
}

/// Bytes of traceback [`align_global`] allocates for a pair of these lengths.
#[inline]
pub fn traceback_bytes(query_length: usize, target_length: usize) -> usize {
    query_length * target_length
}

/// Needleman-Wunsch with unit costs, returning the CIGAR of the query
/// against the target.
pub fn align_global(query: &[u8], target: &[u8]) -> GlobalAlignment {
    let (n, m) = (query.len(), target.len());
    if n == 0 || m == 0 {
        let mut cigar = Vec::new();
        push_op(&mut cigar, CigarOp::I, n as i32);
        push_op(&mut cigar, CigarOp::D, m as i32);
        return GlobalAlignment {
            cigar,
            edit_distance: (n + m) as u32,
        };
    }

    let mut traceback = vec![DIAGONAL; traceback_bytes(n, m)];
    let mut previous: Vec<u32> = (0..=m as u32).collect();
    let mut current = vec![0u32; m + 1];

    for i in 1..=n {
        current[0] = i as u32;
        let row = (i - 1) * m;
        let q = query[i - 1];
        for j in 1..=m {
            let diagonal = previous[j - 1] + u32::from(q != target[j - 1]);
            let up = previous[j] + 1;
            let left = current[j - 1] + 1;

            let (score, direction) = if diagonal <= up && diagonal <= left {
                (diagonal, DIAGONAL)
            } else if up <= left {
                (up, UP)
            } else {
                (left, LEFT)
            };
            current[j] = score;
            traceback[row + j - 1] = direction;
        }
        std::mem::swap(&mut previous, &mut current);
    }
    let edit_distance = previous[m];

    let mut cigar = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let direction = match (i, j) {
            (0, _) => LEFT,
            (_, 0) => UP,
            _ => traceback[(i - 1) * m + j - 1],
        };
        match direction {
            DIAGONAL => {
                push_op(&mut cigar, CigarOp::M, 1);
                i -= 1;
                j -= 1;
            }
            UP => {
                push_op(&mut cigar, CigarOp::I, 1);
                i -= 1;
            }
            _ => {
                push_op(&mut cigar, CigarOp::D, 1);
                j -= 1;
            }
        }
    }

    GlobalAlignment {
        cigar: reverse(&cigar),
        edit_distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alignment::cigar::{query_length, target_length, to_string};

    #[test]
    fn test_identical_sequences_are_one_match_run() {
        let seq: Vec<u8> = b"ACGTTGCA".iter().cycle().take(100).copied().collect();
        let aln = align_global(&seq, &seq);
        assert_eq!(to_string(&aln.cigar), "100M");
        assert_eq!(aln.edit_distance, 0);
    }

    #[test]
    fn test_mismatch_stays_in_match_run() {
        let aln = align_global(b"ACGTACGT", b"ACGAACGT");
        assert_eq!(to_string(&aln.cigar), "8M");
        assert_eq!(aln.edit_distance, 1);
    }

    #[test]
    fn test_insertion_and_deletion() {
        let aln = align_global(b"ACGTTTACGT", b"ACGTACGT");
        assert_eq!(aln.edit_distance, 2);
        assert_eq!(query_length(&aln.cigar), 10);
        assert_eq!(target_length(&aln.cigar), 8);
        assert!(to_string(&aln.cigar).contains("2I"));

        let aln = align_global(b"ACGTACGT", b"ACGTTTACGT");
        assert_eq!(aln.edit_distance, 2);
        assert!(to_string(&aln.cigar).contains("2D"));
    }

    #[test]
    fn test_leading_gaps_follow_the_implied_border() {
        let aln = align_global(b"TTACGT", b"ACGT");
        assert_eq!(to_string(&aln.cigar), "2I4M");
        assert_eq!(aln.edit_distance, 2);

        let aln = align_global(b"ACGT", b"GGACGT");
        assert_eq!(to_string(&aln.cigar), "2D4M");
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(to_string(&align_global(b"", b"ACG").cigar), "3D");
        assert_eq!(to_string(&align_global(b"AC", b"").cigar), "2I");
        assert!(align_global(b"", b"").cigar.is_empty());
    }
}
