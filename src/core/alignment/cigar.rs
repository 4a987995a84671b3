//! CIGAR operations for overlap alignments.
//!
//! CIGARs are kept as run-length pairs `(op, len)` while they are built and
//! rendered to text only when handed to the writer.

use std::fmt::Write;

/// CIGAR operation type with zero-cost conversion to/from bytes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CigarOp {
    M = b'M', // Match/mismatch
    I = b'I', // Insertion to target
    D = b'D', // Deletion from target
}

impl CigarOp {
    #[inline(always)]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'M' => Some(Self::M),
            b'I' => Some(Self::I),
            b'D' => Some(Self::D),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }

    /// Returns true if this operation consumes query bases
    #[inline(always)]
    pub const fn consumes_query(self) -> bool {
        matches!(self, Self::M | Self::I)
    }

    /// Returns true if this operation consumes target bases
    #[inline(always)]
    pub const fn consumes_target(self) -> bool {
        matches!(self, Self::M | Self::D)
    }
}

/// Append `len` copies of `op`, extending the last run when it matches.
#[inline]
pub fn push_op(cigar: &mut Vec<(u8, i32)>, op: CigarOp, len: i32) {
    if len <= 0 {
        return;
    }
    match cigar.last_mut() {
        Some(last) if last.0 == op.to_byte() => last.1 += len,
        _ => cigar.push((op.to_byte(), len)),
    }
}

/// Reverse a CIGAR (used after a traceback that walks from the end).
#[inline]
pub fn reverse(cigar: &[(u8, i32)]) -> Vec<(u8, i32)> {
    cigar.iter().copied().rev().collect()
}

/// Target bases covered by the CIGAR.
pub fn target_length(cigar: &[(u8, i32)]) -> i32 {
    cigar
        .iter()
        .filter(|&&(op, _)| CigarOp::from_byte(op).is_some_and(CigarOp::consumes_target))
        .map(|&(_, len)| len)
        .sum()
}

/// Query bases covered by the CIGAR.
pub fn query_length(cigar: &[(u8, i32)]) -> i32 {
    cigar
        .iter()
        .filter(|&&(op, _)| CigarOp::from_byte(op).is_some_and(CigarOp::consumes_query))
        .map(|&(_, len)| len)
        .sum()
}

/// Render as text (e.g. "50M2I48M"); an empty CIGAR renders as "".
pub fn to_string(cigar: &[(u8, i32)]) -> String {
    let mut result = String::with_capacity(cigar.len() * 4);
    for &(op, len) in cigar {
        // writing to a String cannot fail
        let _ = write!(&mut result, "{}{}", len, op as char);
    }
    result
}

/// Parse textual CIGAR; `None` on unknown operations or missing lengths.
pub fn parse(text: &str) -> Option<Vec<(u8, i32)>> {
    let mut cigar = Vec::new();
    let mut len: i32 = 0;
    let mut has_digits = false;
    for b in text.bytes() {
        if b.is_ascii_digit() {
            len = len.checked_mul(10)?.checked_add((b - b'0') as i32)?;
            has_digits = true;
        } else {
            let op = CigarOp::from_byte(b)?;
            if !has_digits {
                return None;
            }
            cigar.push((op.to_byte(), len));
            len = 0;
            has_digits = false;
        }
    }
    if has_digits {
        return None;
    }
    Some(cigar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cigar_op_from_byte() {
        assert_eq!(CigarOp::from_byte(b'M'), Some(CigarOp::M));
        assert_eq!(CigarOp::from_byte(b'I'), Some(CigarOp::I));
        assert_eq!(CigarOp::from_byte(b'D'), Some(CigarOp::D));
        assert_eq!(CigarOp::from_byte(b'='), None);
        assert_eq!(CigarOp::from_byte(b'S'), None);
    }

    #[test]
    fn test_push_op_extends_runs() {
        let mut cigar = Vec::new();
        push_op(&mut cigar, CigarOp::M, 3);
        push_op(&mut cigar, CigarOp::M, 2);
        push_op(&mut cigar, CigarOp::I, 1);
        push_op(&mut cigar, CigarOp::D, 0);
        push_op(&mut cigar, CigarOp::M, 4);
        assert_eq!(cigar, vec![(b'M', 5), (b'I', 1), (b'M', 4)]);
    }

    #[test]
    fn test_lengths() {
        // 50M2I48M = 100 query bases, 98 target bases
        let cigar = vec![(b'M', 50), (b'I', 2), (b'M', 48)];
        assert_eq!(query_length(&cigar), 100);
        assert_eq!(target_length(&cigar), 98);

        // 10M5D10M = 20 query bases, 25 target bases
        let cigar = vec![(b'M', 10), (b'D', 5), (b'M', 10)];
        assert_eq!(query_length(&cigar), 20);
        assert_eq!(target_length(&cigar), 25);
    }

    #[test]
    fn test_to_string_and_parse() {
        let cigar = vec![(b'M', 50), (b'I', 2), (b'M', 48)];
        assert_eq!(to_string(&cigar), "50M2I48M");
        assert_eq!(parse("50M2I48M"), Some(cigar));
        assert_eq!(to_string(&[]), "");
        assert_eq!(parse(""), Some(vec![]));
        assert_eq!(parse("M"), None);
        assert_eq!(parse("12"), None);
        assert_eq!(parse("3S"), None);
    }

    #[test]
    fn test_reverse() {
        let cigar = vec![(b'M', 10), (b'I', 2), (b'M', 20)];
        assert_eq!(reverse(&cigar), vec![(b'M', 20), (b'I', 2), (b'M', 10)]);
    }
}
