use clap::Parser;
use compression_sweep_rs::benchmark_utils::print_benchmark_results;
use compression_sweep_rs::interrupt::{Interrupt, EXIT_INTERRUPTED};
use compression_sweep_rs::prerequisites::missing_tools;
use compression_sweep_rs::run::{run, RunConfig};
use compression_sweep_rs::Error;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Benchmarks bzip2, gzip, lz4 and zstd at every compression level on the given files.
#[derive(Parser, Debug)]
#[command(name = "compression_sweep", version, about)]
struct Cli {
    /// Files to benchmark
    files: Vec<PathBuf>,

    /// Directory the `<timestamp>.json` result file is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Timeout in seconds for a single compress or decompress invocation
    #[arg(long, default_value = "600")]
    timeout: u64,

    /// GNU time binary used to measure each invocation
    #[arg(long, default_value = "/usr/bin/time")]
    time_bin: PathBuf,

    /// Pin measured processes to this CPU core
    #[arg(long, value_parser = clap::value_parser!(u16).range(0..1024))]
    core: Option<u16>,

    /// Number of files benchmarked in parallel
    #[arg(short, long, default_value = "1")]
    jobs: usize,

    /// Do not print the per-file summary tables
    #[arg(long)]
    no_summary: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.files.is_empty() {
        eprintln!("Usage: compression_sweep <file1> [file2] ...");
        process::exit(1);
    }

    let missing = missing_tools(&cli.time_bin);
    if !missing.is_empty() {
        println!("Missing prerequisites:");
        for tool in &missing {
            println!("  {}", tool);
        }
        process::exit(1);
    }

    let interrupt = Interrupt::install().unwrap_or_else(|e| {
        warn!("cannot install signal handlers, Ctrl-C will not clean up: {}", e);
        Interrupt::new()
    });

    let config = RunConfig {
        output_dir: cli.output_dir,
        time_bin: cli.time_bin,
        timeout: Duration::from_secs(cli.timeout),
        core: cli.core.map(usize::from),
        jobs: cli.jobs.max(1),
        interrupt,
    };

    let summary = match run(&cli.files, &config) {
        Ok(summary) => summary,
        Err(Error::Interrupted) => {
            error!("interrupted, no results written");
            process::exit(EXIT_INTERRUPTED);
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    if !cli.no_summary {
        print_benchmark_results(&summary.result);
    }
    for (path, reason) in &summary.skipped {
        println!("Skipped {}: {}", path.display(), reason);
    }
    println!("\nResults written to {}", summary.output.display());
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
