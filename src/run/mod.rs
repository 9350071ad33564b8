use chrono::Local;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::benchmark::sweep_file;
use crate::benchmark_utils::{prepare_output_dir, write_run_result, FileEntry, RunResult};
use crate::dataset::{load_inputs, InputFile};
use crate::error::{Error, Result};
use crate::interrupt::Interrupt;
use crate::measure::{Executor, TimedExecutor, DEFAULT_TIMEOUT, DEFAULT_TIME_BIN};

/// Settings of one benchmark run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory the timestamped result file is written to.
    pub output_dir: PathBuf,
    /// GNU `time` binary used to measure each invocation.
    pub time_bin: PathBuf,
    /// Upper bound on a single compress or decompress invocation.
    pub timeout: Duration,
    /// CPU core the measured processes are pinned to.
    pub core: Option<usize>,
    /// Files swept in parallel. Levels of one file always run one at a time.
    pub jobs: usize,
    /// Raised by a termination signal; stops the running codec and the run.
    pub interrupt: Interrupt,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            output_dir: PathBuf::from("."),
            time_bin: PathBuf::from(DEFAULT_TIME_BIN),
            timeout: DEFAULT_TIMEOUT,
            core: None,
            jobs: 1,
            interrupt: Interrupt::new(),
        }
    }
}

impl RunConfig {
    pub fn executor(&self) -> TimedExecutor {
        TimedExecutor::new(&self.time_bin, self.timeout, self.core).with_interrupt(self.interrupt.clone())
    }
}

/// What a completed run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub output: PathBuf,
    pub result: RunResult,
    /// Paths that were not benchmarked, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Benchmarks `paths` with the external tools and writes the result file.
pub fn run<P: AsRef<Path>>(paths: &[P], config: &RunConfig) -> Result<RunSummary> {
    run_with_executor(paths, config, &config.executor())
}

/// Benchmarks `paths` using `executor` and writes the result file.
///
/// Invalid paths and files whose sweep cannot start are skipped; the run only fails when no
/// paths were given, the output directory is unusable, none of the paths was usable, a
/// contract violation surfaced, the run was interrupted, or the result could not be written.
pub fn run_with_executor<P, E>(paths: &[P], config: &RunConfig, executor: &E) -> Result<RunSummary>
where
    P: AsRef<Path>,
    E: Executor + ?Sized,
{
    if paths.is_empty() {
        return Err(Error::NoInputFiles);
    }
    // Checked up front so a bad directory cannot discard a finished sweep.
    prepare_output_dir(&config.output_dir).map_err(|e| output_dir_error(config, e))?;
    let started = Local::now();

    let (inputs, rejected) = load_inputs(paths);
    let mut skipped = Vec::new();
    for e in rejected {
        warn!("skipping input: {}", e);
        if let Error::InvalidInputFile { path, reason } = e {
            skipped.push((path, reason));
        }
    }
    if inputs.is_empty() {
        return Err(Error::NoValidInputs);
    }

    let outcomes = sweep_all(&inputs, config.jobs, executor);

    // Single merge point: results are appended in input order.
    let mut result = RunResult::new();
    for (input, outcome) in inputs.iter().zip(outcomes) {
        match outcome {
            Ok(entry) => {
                if !entry.failures.is_empty() {
                    warn!(file = %input.name, failed = entry.failures.len(), "some levels failed");
                }
                result.push(entry);
            }
            Err(e) if e.aborts_run() => {
                error!(file = %input.name, "aborting run: {}", e);
                return Err(e);
            }
            Err(e) => {
                warn!(file = %input.name, "skipping file: {}", e);
                skipped.push((input.path.clone(), e.to_string()));
            }
        }
    }

    let output = write_run_result(&result, &config.output_dir, &started).map_err(|e| output_dir_error(config, e))?;
    info!(
        output = %output.display(),
        files = result.len(),
        failed_levels = result.failure_count(),
        skipped = skipped.len(),
        "run complete"
    );

    Ok(RunSummary { output, result, skipped })
}

fn output_dir_error(config: &RunConfig, e: std::io::Error) -> Error {
    Error::OutputDir { path: config.output_dir.clone(), reason: e.to_string() }
}

fn sweep_all<E: Executor + ?Sized>(inputs: &[InputFile], jobs: usize, executor: &E) -> Vec<Result<FileEntry>> {
    if jobs > 1 && inputs.len() > 1 {
        match ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => {
                return pool.install(|| inputs.par_iter().map(|input| sweep_file(input, executor)).collect());
            }
            Err(e) => warn!("cannot start {} workers, running sequentially: {}", jobs, e),
        }
    }
    inputs.iter().map(|input| sweep_file(input, executor)).collect()
}
