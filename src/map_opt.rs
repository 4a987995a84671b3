use clap::Args;
use std::path::PathBuf;

use crate::batching::{BatchBudgets, RoleBudget, index_bytes_per_base};
use crate::defaults::{self, MIB};
use crate::error::{MapperError, Result};
use crate::overlap::OverlapThresholds;

/// Overlap mapping options.
#[derive(Debug, Clone)]
pub struct MapOpt {
    // Indexing parameters
    pub kmer_size: usize,
    pub window_size: usize,
    pub filtering_parameter: f64, // Drop minimizers holding >= this share of an index (1.0 = off)

    // Batching budgets, in estimated index bytes
    pub query_budget: RoleBudget,
    pub target_budget: RoleBudget,

    // Device parameters
    pub num_devices: usize,
    pub device_memory_bytes: u64, // Capacity of each device
    pub num_alignment_engines: usize, // 0 = report overlaps without CIGARs
    pub aligner_threads: usize,   // Host threads per device for the engine kernel; 0 = all cores

    // Overlap detection thresholds
    pub min_residues: u32,
    pub min_overlap_len: u32,
    pub min_bases_per_residue: u32,
    pub min_overlap_fraction: f32,

    /// Query and target are the same read set
    pub all_to_all: bool,

    pub verbosity: i32,
}

impl Default for MapOpt {
    fn default() -> Self {
        let budget = RoleBudget {
            index_bytes: defaults::INDEX_SIZE_MIB * MIB,
            device_bytes: defaults::DEVICE_BATCH_SIZE_MIB * MIB,
            host_bytes: defaults::HOST_BATCH_SIZE_MIB * MIB,
        };
        MapOpt {
            kmer_size: defaults::KMER_SIZE,
            window_size: defaults::WINDOW_SIZE,
            filtering_parameter: defaults::FILTERING_PARAMETER,
            query_budget: budget,
            target_budget: budget,
            num_devices: defaults::NUM_DEVICES,
            device_memory_bytes: defaults::DEVICE_MEMORY_MIB * MIB,
            num_alignment_engines: defaults::NUM_ALIGNMENT_ENGINES,
            aligner_threads: 0,
            min_residues: defaults::MIN_RESIDUES,
            min_overlap_len: defaults::MIN_OVERLAP_LEN,
            min_bases_per_residue: defaults::MIN_BASES_PER_RESIDUE,
            min_overlap_fraction: defaults::MIN_OVERLAP_FRACTION,
            all_to_all: false,
            verbosity: defaults::VERBOSITY,
        }
    }
}

impl MapOpt {
    /// Thresholds handed to the overlapper
    pub fn thresholds(&self) -> OverlapThresholds {
        OverlapThresholds {
            min_residues: self.min_residues,
            min_overlap_len: self.min_overlap_len,
            min_bases_per_residue: self.min_bases_per_residue,
            min_overlap_fraction: self.min_overlap_fraction,
        }
    }

    pub fn batch_budgets(&self) -> BatchBudgets {
        BatchBudgets {
            query: self.query_budget,
            target: self.target_budget,
            bytes_per_base: index_bytes_per_base(self.window_size),
        }
    }

    /// Check every parameter, collecting all problems.
    pub fn validate_parameters(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Indexing validation
        if self.kmer_size < 1 || self.kmer_size > defaults::MAX_KMER_SIZE {
            errors.push(format!(
                "kmer_size must be in [1, {}], got {}",
                defaults::MAX_KMER_SIZE,
                self.kmer_size
            ));
        }
        if self.window_size < 1 {
            errors.push(format!("window_size must be >= 1, got {}", self.window_size));
        }
        if !(self.filtering_parameter > 0.0 && self.filtering_parameter <= 1.0) {
            errors.push(format!(
                "filtering_parameter must be in (0, 1], got {}",
                self.filtering_parameter
            ));
        }

        // Budget validation
        for (role, budget) in [("query", &self.query_budget), ("target", &self.target_budget)] {
            if let Err(e) = budget.validate(role) {
                errors.push(e.to_string());
            }
        }

        // Device validation
        if self.num_devices < 1 {
            errors.push(format!("num_devices must be >= 1, got {}", self.num_devices));
        }
        if self.device_memory_bytes == 0 {
            errors.push("device memory must be non-zero".to_string());
        }

        // Overlap validation
        if self.min_bases_per_residue < 1 {
            errors.push(format!(
                "min_bases_per_residue must be >= 1, got {}",
                self.min_bases_per_residue
            ));
        }
        if !(0.0..=1.0).contains(&self.min_overlap_fraction) {
            errors.push(format!(
                "min_overlap_fraction must be in [0, 1], got {}",
                self.min_overlap_fraction
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_parameters()
            .map_err(|errors| MapperError::Configuration(errors.join("; ")))
    }
}

#[derive(Debug, Clone, Args)]
pub struct MapCliOptions {
    /// Query reads (FASTA, optionally gzip or bgzip compressed)
    #[arg(value_name = "QUERY.FA")]
    pub query: PathBuf,

    /// Target reads; all-to-all mode when this is the query file
    #[arg(value_name = "TARGET.FA")]
    pub target: PathBuf,

    // ===== Indexing Options =====
    /// Length of the k-mers minimizers are chosen from
    #[arg(short = 'k', long, value_name = "INT", default_value_t = defaults::KMER_SIZE)]
    pub kmer_size: usize,

    /// Number of consecutive k-mers each minimizer is chosen from
    #[arg(short = 'w', long, value_name = "INT", default_value_t = defaults::WINDOW_SIZE)]
    pub window_size: usize,

    /// Drop minimizers making up at least FLOAT of an index (1.0 disables)
    #[arg(short = 'F', long, value_name = "FLOAT", default_value_t = defaults::FILTERING_PARAMETER)]
    pub filtering_parameter: f64,

    // ===== Batching Options =====
    /// Maximum estimated size of one query index, in MiB
    #[arg(short = 'i', long, value_name = "MIB", default_value_t = defaults::INDEX_SIZE_MIB)]
    pub index_size: u64,

    /// Maximum estimated size of one target index, in MiB [same as -i]
    #[arg(short = 't', long, value_name = "MIB")]
    pub target_index_size: Option<u64>,

    /// Query index memory per device batch, in MiB
    #[arg(short = 'd', long, value_name = "MIB", default_value_t = defaults::DEVICE_BATCH_SIZE_MIB)]
    pub device_batch_size: u64,

    /// Target index memory per device batch, in MiB [same as -d]
    #[arg(long, value_name = "MIB")]
    pub target_device_batch_size: Option<u64>,

    /// Query index memory per host batch, in MiB
    #[arg(short = 'c', long, value_name = "MIB", default_value_t = defaults::HOST_BATCH_SIZE_MIB)]
    pub host_batch_size: u64,

    /// Target index memory per host batch, in MiB [same as -c]
    #[arg(long, value_name = "MIB")]
    pub target_host_batch_size: Option<u64>,

    // ===== Device Options =====
    /// Number of devices to run on
    #[arg(short = 'g', long, value_name = "INT", default_value_t = defaults::NUM_DEVICES)]
    pub num_devices: usize,

    /// Memory of each device, in MiB
    #[arg(short = 'm', long, value_name = "MIB", default_value_t = defaults::DEVICE_MEMORY_MIB)]
    pub device_memory: u64,

    /// Alignment engines per device; 0 reports overlaps without CIGARs
    #[arg(short = 'a', long, value_name = "INT", default_value_t = defaults::NUM_ALIGNMENT_ENGINES)]
    pub alignment_engines: usize,

    /// Host threads per device running alignment kernels (default: all cores)
    #[arg(long, value_name = "INT")]
    pub aligner_threads: Option<usize>,

    // ===== Overlap Options =====
    /// Minimum number of anchors in an overlap
    #[arg(short = 'r', long, value_name = "INT", default_value_t = defaults::MIN_RESIDUES)]
    pub min_residues: u32,

    /// Minimum overlap length on both reads
    #[arg(short = 'l', long, value_name = "INT", default_value_t = defaults::MIN_OVERLAP_LEN)]
    pub min_overlap_len: u32,

    /// Discard overlaps with INT or more bases per anchor
    #[arg(short = 'b', long, value_name = "INT", default_value_t = defaults::MIN_BASES_PER_RESIDUE)]
    pub min_bases_per_residue: u32,

    /// Minimum ratio of the shorter to the longer overlap interval
    #[arg(short = 'z', long, value_name = "FLOAT", default_value_t = defaults::MIN_OVERLAP_FRACTION)]
    pub min_overlap_fraction: f32,

    /// Treat query and target as the same read set even if the paths differ
    #[arg(long)]
    pub all_to_all: bool,

    // ===== Input/Output Options =====
    /// Output PAF file (default: stdout)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Verbose level: 1=error, 2=warning, 3=message, 4=debug, 5+=trace
    #[arg(short = 'v', long, value_name = "INT", default_value_t = defaults::VERBOSITY)]
    pub verbosity: i32,
}

impl MapCliOptions {
    /// Query and target name the same file (or all-to-all was forced).
    pub fn is_all_to_all(&self) -> bool {
        if self.all_to_all || self.query == self.target {
            return true;
        }
        match (self.query.canonicalize(), self.target.canonicalize()) {
            (Ok(q), Ok(t)) => q == t,
            _ => false,
        }
    }

    pub fn to_map_opt(&self) -> MapOpt {
        let query_budget = RoleBudget {
            index_bytes: self.index_size * MIB,
            device_bytes: self.device_batch_size * MIB,
            host_bytes: self.host_batch_size * MIB,
        };
        let target_budget = RoleBudget {
            index_bytes: self.target_index_size.unwrap_or(self.index_size) * MIB,
            device_bytes: self
                .target_device_batch_size
                .unwrap_or(self.device_batch_size)
                * MIB,
            host_bytes: self.target_host_batch_size.unwrap_or(self.host_batch_size) * MIB,
        };

        MapOpt {
            kmer_size: self.kmer_size,
            window_size: self.window_size,
            filtering_parameter: self.filtering_parameter,
            query_budget,
            target_budget,
            num_devices: self.num_devices,
            device_memory_bytes: self.device_memory * MIB,
            num_alignment_engines: self.alignment_engines,
            aligner_threads: self.aligner_threads.unwrap_or(0),
            min_residues: self.min_residues,
            min_overlap_len: self.min_overlap_len,
            min_bases_per_residue: self.min_bases_per_residue,
            min_overlap_fraction: self.min_overlap_fraction,
            all_to_all: self.is_all_to_all(),
            verbosity: self.verbosity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        map: MapCliOptions,
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(MapOpt::default().validate().is_ok());
        let thresholds = MapOpt::default().thresholds();
        assert_eq!(thresholds, OverlapThresholds::default());
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let opt = MapOpt {
            kmer_size: 0,
            num_devices: 0,
            min_overlap_fraction: 1.5,
            ..MapOpt::default()
        };
        let errors = opt.validate_parameters().unwrap_err();
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(matches!(opt.validate(), Err(MapperError::Configuration(_))));
    }

    #[test]
    fn test_zero_budget_is_rejected() {
        let mut opt = MapOpt::default();
        opt.target_budget.device_bytes = 0;
        assert!(opt.validate().is_err());
    }

    #[test]
    fn test_cli_conversion() {
        let cli = TestCli::parse_from([
            "test", "reads.fa", "reads.fa", "-k", "12", "-i", "1", "-d", "2", "-c", "4",
            "--target-host-batch-size", "8", "-a", "2", "-g", "3",
        ]);
        let opt = cli.map.to_map_opt();
        assert_eq!(opt.kmer_size, 12);
        assert!(opt.all_to_all);
        assert_eq!(opt.query_budget.index_bytes, MIB);
        assert_eq!(opt.query_budget.host_bytes, 4 * MIB);
        assert_eq!(opt.target_budget.device_bytes, 2 * MIB);
        assert_eq!(opt.target_budget.host_bytes, 8 * MIB);
        assert_eq!(opt.num_alignment_engines, 2);
        assert_eq!(opt.num_devices, 3);
        assert!(opt.validate().is_ok());
    }

    #[test]
    fn test_distinct_inputs_are_not_all_to_all() {
        let cli = TestCli::parse_from(["test", "a.fa", "b.fa"]);
        assert!(!cli.map.is_all_to_all());
        let cli = TestCli::parse_from(["test", "a.fa", "b.fa", "--all-to-all"]);
        assert!(cli.map.to_map_opt().all_to_all);
    }
}
