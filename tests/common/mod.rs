//! Shared fixtures for integration tests: a seeded genome simulator, a read
//! sampler and FASTA writing helpers.

#![allow(dead_code)]

use ferrous_overlap::core::utils::reverse_complement;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const BASES: [u8; 4] = *b"ACGT";

/// Row-stochastic base transition table, rows and columns in `ACGT` order.
pub type Transitions = [[f64; 4]; 4];

pub const UNIFORM_TRANSITIONS: Transitions = [[0.25; 4]; 4];

/// GC-rich and prone to homopolymer runs.
pub const HIGH_GC_HOMOPOLYMERIC_TRANSITIONS: Transitions = [
    [0.50, 0.20, 0.20, 0.10],
    [0.05, 0.60, 0.30, 0.05],
    [0.05, 0.30, 0.60, 0.05],
    [0.10, 0.20, 0.20, 0.50],
];

/// First-order Markov genome simulator.
pub struct MarkovGenomeSimulator {
    rng: StdRng,
}

impl MarkovGenomeSimulator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn build_reference(&mut self, length: usize, transitions: &Transitions) -> Vec<u8> {
        let mut reference = Vec::with_capacity(length);
        if length == 0 {
            return reference;
        }
        let mut current = self.rng.gen_range(0..4);
        reference.push(BASES[current]);
        while reference.len() < length {
            current = self.next_base(current, transitions);
            reference.push(BASES[current]);
        }
        reference
    }

    fn next_base(&mut self, current: usize, transitions: &Transitions) -> usize {
        let draw: f64 = self.rng.r#gen();
        let mut cumulative = 0.0;
        for (next, p) in transitions[current].iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                return next;
            }
        }
        3
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

/// A read sampled from a reference: `[start, start + len)` on the given strand.
#[derive(Debug, Clone)]
pub struct SimulatedRead {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub reverse: bool,
    pub sequence: Vec<u8>,
}

/// Tile `reference` with reads of `read_length` advancing by `step`, each on
/// a random strand.
pub fn tile_reads(
    reference: &[u8],
    read_length: usize,
    step: usize,
    rng: &mut StdRng,
) -> Vec<SimulatedRead> {
    let mut reads = Vec::new();
    let mut start = 0usize;
    while start + read_length <= reference.len() {
        let end = start + read_length;
        let reverse = rng.gen_bool(0.5);
        let slice = &reference[start..end];
        reads.push(SimulatedRead {
            name: format!("read{}", reads.len()),
            start,
            end,
            reverse,
            sequence: if reverse {
                reverse_complement(slice)
            } else {
                slice.to_vec()
            },
        });
        start += step;
    }
    reads
}

pub fn to_fasta(reads: &[SimulatedRead]) -> String {
    let mut fasta = String::new();
    for read in reads {
        let _ = writeln!(fasta, ">{}", read.name);
        for line in read.sequence.chunks(80) {
            let _ = writeln!(fasta, "{}", String::from_utf8_lossy(line));
        }
    }
    fasta
}

pub fn write_fasta(dir: &Path, name: &str, reads: &[SimulatedRead]) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, to_fasta(reads))?;
    Ok(path)
}

/// Pairs of read indices whose reference intervals share at least
/// `min_shared` bases, with the smaller index first.
pub fn expected_neighbours(reads: &[SimulatedRead], min_shared: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..reads.len() {
        for j in i + 1..reads.len() {
            let shared = reads[i].end.min(reads[j].end) as isize
                - reads[i].start.max(reads[j].start) as isize;
            if shared >= min_shared as isize {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// One parsed PAF line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PafRecord {
    pub query_name: String,
    pub query_length: usize,
    pub query_start: usize,
    pub query_end: usize,
    pub strand: char,
    pub target_name: String,
    pub target_length: usize,
    pub target_start: usize,
    pub target_end: usize,
    pub cigar: Option<String>,
}

pub fn parse_paf(text: &str) -> Vec<PafRecord> {
    text.lines()
        .filter(|l| !l.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            assert!(fields.len() >= 12, "short PAF line: {}", line);
            PafRecord {
                query_name: fields[0].to_string(),
                query_length: fields[1].parse().unwrap(),
                query_start: fields[2].parse().unwrap(),
                query_end: fields[3].parse().unwrap(),
                strand: fields[4].chars().next().unwrap(),
                target_name: fields[5].to_string(),
                target_length: fields[6].parse().unwrap(),
                target_start: fields[7].parse().unwrap(),
                target_end: fields[8].parse().unwrap(),
                cigar: fields[12..]
                    .iter()
                    .find_map(|f| f.strip_prefix("cg:Z:"))
                    .map(str::to_string),
            }
        })
        .collect()
}
