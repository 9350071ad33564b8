use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::benchmark_utils::{
    AlgorithmResult, CompressionOutcome, DecompressionOutcome, Failure, FileEntry, FileResult, LevelResult,
};
use crate::compressor::{Codec, CODECS};
use crate::dataset::InputFile;
use crate::error::{Error, Result};
use crate::measure::{Executor, Operation};
use crate::ratio;

const SCRATCH_PREFIX: &str = "compression-sweep-";

/// Runs every algorithm at every level on `input`, one operation at a time.
///
/// Failing `(algorithm, level)` pairs are left out of the result and listed in
/// [`FileEntry::failures`]. Only contract violations and a failure to create the scratch
/// directory abort the sweep.
pub fn sweep_file<E: Executor + ?Sized>(input: &InputFile, executor: &E) -> Result<FileEntry> {
    // Removed on every exit path, including unwinding.
    let scratch = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
    sweep_in(input, executor, &scratch)
}

fn sweep_in<E: Executor + ?Sized>(input: &InputFile, executor: &E, scratch: &TempDir) -> Result<FileEntry> {
    info!(file = %input.path.display(), size = input.original_size, "benchmarking");

    let mut result = FileResult::new();
    let mut failures = Vec::new();

    for codec in CODECS.iter() {
        let levels: &mut AlgorithmResult = result.entry(codec.algorithm).or_default();

        for level in codec.levels() {
            match benchmark_level(input, codec, level, scratch.path(), executor) {
                Ok(level_result) => {
                    debug!(
                        algorithm = %codec.algorithm,
                        level,
                        ratio = level_result.compression.compression_ratio,
                        "level done"
                    );
                    levels.insert(level, level_result);
                }
                Err(e) if e.aborts_run() => return Err(e),
                Err(e) => {
                    warn!(file = %input.name, algorithm = %codec.algorithm, level, "skipping: {}", e);
                    failures.push(failure(codec, level, e));
                }
            }
        }
    }

    Ok(FileEntry { name: input.name.clone(), result, failures })
}

/// Compresses `input` with `codec` at `level`, then decompresses the artifact.
fn benchmark_level<E: Executor + ?Sized>(
    input: &InputFile,
    codec: &Codec,
    level: u32,
    scratch: &Path,
    executor: &E,
) -> Result<LevelResult> {
    let compressed_path = scratch.join(codec.artifact_name(&input.name, level));
    let restored_path = scratch.join(format!("{}.out", codec.artifact_name(&input.name, level)));

    let outcome = compress_and_restore(input, codec, level, &compressed_path, &restored_path, executor);

    // Keep the scratch directory small; it is removed wholesale at the end anyway.
    let _ = fs::remove_file(&compressed_path);
    let _ = fs::remove_file(&restored_path);

    outcome
}

fn compress_and_restore<E: Executor + ?Sized>(
    input: &InputFile,
    codec: &Codec,
    level: u32,
    compressed_path: &Path,
    restored_path: &Path,
    executor: &E,
) -> Result<LevelResult> {
    let compress = Operation::Compress { algorithm: codec.algorithm, level, input: &input.path };
    let measurement = executor.measure(&compress, compressed_path)?;
    let compressed_size = fs::metadata(compressed_path)
        .map_err(|e| compress.failure(format!("no output at {}: {}", compressed_path.display(), e)))?
        .len();
    let ratios = ratio::compute(input.original_size, compressed_size)?;
    let compression = CompressionOutcome::new(
        measurement,
        input.original_size,
        compressed_size,
        ratios,
        compressed_path.to_path_buf(),
    );

    let decompress = Operation::Decompress { algorithm: codec.algorithm, level, input: &compression.output_file };
    let decompression = DecompressionOutcome { measurement: executor.measure(&decompress, restored_path)? };

    Ok(LevelResult { compression, decompression })
}

fn failure(codec: &Codec, level: u32, error: Error) -> Failure {
    let operation = match &error {
        Error::Execution { operation, .. } => Some(*operation),
        _ => None,
    };
    Failure {
        algorithm: codec.algorithm,
        level,
        operation,
        reason: error.to_string(),
    }
}
