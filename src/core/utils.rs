use libc;
use std::borrow::Cow;
use std::time::Instant;

/// User plus system CPU seconds consumed by this process.
pub fn cputime() -> f64 {
    let rusage = unsafe {
        let mut rusage = std::mem::MaybeUninit::uninit();
        libc::getrusage(libc::RUSAGE_SELF, rusage.as_mut_ptr());
        rusage.assume_init()
    };
    let user_time = rusage.ru_utime;
    let sys_time = rusage.ru_stime;
    (user_time.tv_sec as f64 + user_time.tv_usec as f64 * 1e-6)
        + (sys_time.tv_sec as f64 + sys_time.tv_usec as f64 * 1e-6)
}

/// Wall-clock stopwatch for pipeline runs.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTimer {
    start: Instant,
}

impl PipelineTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since `start`.
    pub fn stop(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[inline(always)]
pub const fn complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' => b'a',
        other => other,
    }
}

pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence.iter().rev().map(|&b| complement(b)).collect()
}

/// `sequence` as given, or reverse complemented when `reverse` is set.
pub fn oriented(sequence: &[u8], reverse: bool) -> Cow<'_, [u8]> {
    if reverse {
        Cow::Owned(reverse_complement(sequence))
    } else {
        Cow::Borrowed(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"ACGTN"), b"NACGT".to_vec());
        assert_eq!(reverse_complement(b"AACg"), b"cGTT".to_vec());
        assert!(reverse_complement(b"").is_empty());
    }

    #[test]
    fn test_oriented_borrows_forward_sequences() {
        assert!(matches!(oriented(b"ACG", false), Cow::Borrowed(_)));
        assert_eq!(&*oriented(b"ACG", true), b"CGT");
    }

    #[test]
    fn test_cputime_is_monotonic() {
        let before = cputime();
        let mut x = 0u64;
        for i in 0..1_000_000u64 {
            x = x.wrapping_add(i * i);
        }
        std::hint::black_box(x);
        assert!(cputime() >= before);
    }
}
