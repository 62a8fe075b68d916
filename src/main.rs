use clap::Parser;
use cnvmerge::bed::parse_bed_file;
use cnvmerge::interval::Source;
use cnvmerge::merge::{MergeConfig, MergeEngine, MergeStats, ScanStrategy};
use cnvmerge::overlap::DEFAULT_OVERLAP_RATE;
use cnvmerge::pool::IntervalPool;
use cnvmerge::report::{print_summary, write_reports, write_xlsx};
use log::info;
use rayon::ThreadPoolBuilder;
use std::io;
use std::num::NonZeroUsize;

/// Common options shared between all commands
#[derive(Parser, Debug)]
struct CommonOpts {
    /// BED file with the proband's CNV calls (source bit 001)
    #[clap(long, value_parser)]
    proband: String,

    /// BED file with the father's CNV calls (source bit 010)
    #[clap(long, value_parser)]
    father: String,

    /// BED file with the mother's CNV calls (source bit 100)
    #[clap(long, value_parser)]
    mother: String,

    /// Minimum overlap, as a fraction of either call's length, for two calls to merge
    #[clap(short = 'r', long, value_parser, default_value_t = DEFAULT_OVERLAP_RATE)]
    overlap_rate: f64,

    /// Partner search: "indexed" (interval trees) or "linear" (pairwise scan)
    #[clap(long, value_parser, default_value = "indexed")]
    strategy: ScanStrategy,

    /// Number of threads for parallel processing.
    #[clap(short = 't', long, value_parser, default_value_t = NonZeroUsize::new(4).unwrap())]
    num_threads: NonZeroUsize,

    /// Verbosity level (0 = error, 1 = info, 2 = debug)
    #[clap(short, long, default_value = "0")]
    verbose: u8,
}

/// Merge overlapping CNV calls of a proband and its parents.
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand = true)]
enum Args {
    /// Merge the calls and write `<prefix>.all.tsv`, `<prefix>.tsv` and `<prefix>.xlsx`
    Merge {
        #[clap(flatten)]
        common: CommonOpts,

        /// Prefix of the output files
        #[clap(short = 'o', long, value_parser)]
        prefix: String,
    },
    /// Merge the calls and print summary statistics
    Stats {
        #[clap(flatten)]
        common: CommonOpts,
    },
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    match args {
        Args::Merge { common, prefix } => {
            let (pool, _) = run_merge(&common)?;
            let (all_path, lite_path) = write_reports(&pool, &prefix)?;
            let xlsx_path = format!("{}.xlsx", prefix);
            write_xlsx(&pool, &xlsx_path)?;
            info!(
                "Reports written to {}, {} and {}",
                all_path, lite_path, xlsx_path
            );
        }
        Args::Stats { common } => {
            let (pool, stats) = run_merge(&common)?;
            print_summary(&pool, &stats, io::stdout().lock())?;
        }
    }

    Ok(())
}

/// Initialize logging and the thread pool, load the three inputs and merge them
fn run_merge(common: &CommonOpts) -> io::Result<(IntervalPool, MergeStats)> {
    // Initialize logger based on verbosity
    env_logger::Builder::new()
        .filter_level(match common.verbose {
            0 => log::LevelFilter::Error,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    // Configure thread pool
    ThreadPoolBuilder::new()
        .num_threads(common.num_threads.into())
        .build_global()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::Other,
                format!("Failed to build thread pool: {}", e),
            )
        })?;

    let config = MergeConfig::default()
        .with_threshold(common.overlap_rate)
        .with_strategy(common.strategy);
    // Validate before touching any input
    let engine = MergeEngine::new(config)?;

    let mut pool = IntervalPool::new();
    for (source, path) in Source::ALL
        .into_iter()
        .zip([&common.proband, &common.father, &common.mother])
    {
        let intervals = parse_bed_file(path, engine.config().mask_for(source), common.num_threads)?;
        info!("Parsed {} {} calls from {}", intervals.len(), source, path);
        for interval in intervals {
            pool.append(interval);
        }
    }

    let stats = engine.run(&mut pool);
    Ok((pool, stats))
}
