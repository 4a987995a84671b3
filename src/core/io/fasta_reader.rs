// FASTA parser module using bio::io::fasta
//
// Loads a whole read set into memory so reads can be fetched by id from any
// device thread. Compressed input is detected by extension and magic bytes:
// BGZF files are decompressed in parallel with noodles-bgzf, plain gzip falls
// back to flate2.

use bio::io::fasta;
use flate2::read::GzDecoder;
use noodles_bgzf as bgzf;
use std::fs::File;
use std::io::{self, BufReader, Read as IoRead};
use std::path::{Path, PathBuf};

use super::sequence_source::{Read, SequenceSource, unknown_read};
use crate::error::{MapperError, Result};

const BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB buffer

/// Detect if a gzipped file is BGZIP format by checking for BGZIP-specific header
fn is_bgzip_format(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 18]; // BGZIP header is at least 18 bytes

    if file.read(&mut header).unwrap_or(0) < 18 {
        return Ok(false);
    }

    // gzip magic bytes
    if header[0] != 0x1f || header[1] != 0x8b {
        return Ok(false);
    }

    // BGZIP uses extra field (FEXTRA flag = 0x04)
    if header[3] & 0x04 == 0 {
        return Ok(false);
    }

    // 'BC' subfield ID
    Ok(header[12] == b'B' && header[13] == b'C')
}

fn open_input(path: &Path) -> io::Result<Box<dyn IoRead>> {
    let file = File::open(path)?;
    let is_gz = path.extension().is_some_and(|ext| ext == "gz");

    let reader: Box<dyn IoRead> = if is_gz {
        if is_bgzip_format(path)? {
            log::debug!("{}: BGZF input, using parallel decompression", path.display());
            let bgzf_reader = bgzf::MultithreadedReader::new(file);
            Box::new(BufReader::with_capacity(BUFFER_SIZE, bgzf_reader))
        } else {
            log::debug!("{}: gzip input, using single-threaded decompression", path.display());
            Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(file)))
        }
    } else {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
    };
    Ok(reader)
}

/// In-memory read set loaded from a FASTA file.
#[derive(Debug, Clone, Default)]
pub struct FastaParser {
    path: Option<PathBuf>,
    reads: Vec<Read>,
    total_basepairs: u64,
}

impl FastaParser {
    /// Parse every record of `path` (plain, gzip or BGZF).
    ///
    /// Bases are upper-cased; record order defines the read ids.
    pub fn from_path(path: &Path) -> Result<Self> {
        let input = open_input(path)
            .map_err(|e| MapperError::io(format!("opening {}", path.display()), e))?;
        let reader = fasta::Reader::new(input);

        let mut reads = Vec::new();
        for (record_number, record) in reader.records().enumerate() {
            let record = record.map_err(|e| MapperError::Parse {
                path: path.to_path_buf(),
                detail: format!("record {}: {}", record_number, e),
            })?;
            if record.id().is_empty() {
                return Err(MapperError::Parse {
                    path: path.to_path_buf(),
                    detail: format!("record {} has an empty name", record_number),
                });
            }
            let sequence = record.seq().to_ascii_uppercase();
            reads.push(Read::new(record.id(), sequence));
        }

        if reads.len() > u32::MAX as usize {
            return Err(MapperError::Parse {
                path: path.to_path_buf(),
                detail: format!("{} reads exceed the supported maximum", reads.len()),
            });
        }

        let mut parser = Self::from_reads(reads);
        parser.path = Some(path.to_path_buf());
        log::info!(
            "Loaded {} reads ({} bp) from {}",
            parser.reads.len(),
            parser.total_basepairs,
            path.display()
        );
        Ok(parser)
    }

    pub fn from_reads(reads: Vec<Read>) -> Self {
        let total_basepairs = reads.iter().map(|r| r.len() as u64).sum();
        Self {
            path: None,
            reads,
            total_basepairs,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn total_basepairs(&self) -> u64 {
        self.total_basepairs
    }
}

impl SequenceSource for FastaParser {
    fn number_of_reads(&self) -> usize {
        self.reads.len()
    }

    fn get_sequence_by_id(&self, read_id: u32) -> Result<&Read> {
        self.reads
            .get(read_id as usize)
            .ok_or_else(|| unknown_read(read_id, self.reads.len()))
    }
}
