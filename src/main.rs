use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter, Write};

use ferrous_overlap::core::alignment::CpuAlignerFactory;
use ferrous_overlap::core::io::{FastaParser, SequenceSource};
use ferrous_overlap::index::MinimizerIndexBuilder;
use ferrous_overlap::map_opt::{MapCliOptions, MapOpt};
use ferrous_overlap::pipelines::MappingOrchestrator;

#[derive(Parser)]
#[command(name = "ferrous-overlap")]
#[command(about = "FerrousOverlap - batched long-read overlapper with base-level alignment", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find overlaps between query and target reads and write them as PAF
    Map {
        #[command(flatten)]
        options: MapCliOptions,
    },
}

fn init_logging(verbosity: i32) {
    // 1=error, 2=warning, 3=message, 4=debug, 5+=trace
    let log_level = match verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn log_parameters(opt: &MapOpt) {
    log::info!("Indexing parameters:");
    log::info!(
        "  k: {}, w: {}, filtering: {}",
        opt.kmer_size,
        opt.window_size,
        opt.filtering_parameter
    );
    log::info!("Overlap parameters:");
    log::info!(
        "  Min residues: {}, min length: {}, max bases per residue: {}, min fraction: {}",
        opt.min_residues,
        opt.min_overlap_len,
        opt.min_bases_per_residue,
        opt.min_overlap_fraction
    );
    log::info!(
        "Devices: {} x {} MiB, {} alignment engine(s) each",
        opt.num_devices,
        opt.device_memory_bytes / ferrous_overlap::defaults::MIB,
        opt.num_alignment_engines
    );
}

fn run_map(options: &MapCliOptions) -> Result<()> {
    let opt = options.to_map_opt();
    opt.validate().context("invalid options")?;
    if opt.verbosity >= 3 {
        log_parameters(&opt);
    }

    let query = FastaParser::from_path(&options.query)
        .with_context(|| format!("loading query reads from {}", options.query.display()))?;
    let target = if opt.all_to_all {
        log::info!("All-to-all mode: query and target are the same read set");
        None
    } else {
        Some(
            FastaParser::from_path(&options.target).with_context(|| {
                format!("loading target reads from {}", options.target.display())
            })?,
        )
    };
    let target_source: &dyn SequenceSource = target.as_ref().unwrap_or(&query);
    log::info!(
        "Loaded {} query reads ({} bp) and {} target reads",
        query.number_of_reads(),
        query.total_basepairs(),
        target_source.number_of_reads()
    );

    let output: Box<dyn Write + Send> = match &options.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let builder = MinimizerIndexBuilder::new(opt.kmer_size, opt.window_size, opt.filtering_parameter)?;
    let aligner_factory = CpuAlignerFactory::new(opt.aligner_threads);

    MappingOrchestrator::new(&opt, &query, target_source, &builder, &aligner_factory)
        .run(output)
        .context("mapping failed")?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Map { options } => {
            init_logging(options.verbosity);

            if let Err(e) = run_map(&options) {
                log::error!("{:#}", e);
                std::process::exit(1);
            }
        }
    }
}
