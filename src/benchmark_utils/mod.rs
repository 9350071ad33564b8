use chrono::{DateTime, TimeZone};
use prettytable::{row, Table};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::compressor::Algorithm;
use crate::measure::{Measurement, OperationKind};
use crate::ratio::Ratios;

/// Layout of the result file name, e.g. `2024-05-01-13-45-09`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOutcome {
    #[serde(flatten)]
    pub measurement: Measurement,
    pub original_size: u64,
    pub compressed_size: u64,
    pub compression_ratio: f64,
    /// Space saved, e.g. `"94.30%"`.
    pub compression_percentage: String,
    /// Compressed size as a percentage of the original.
    pub compressed_percentage: f64,
    /// Location of the compressed artifact; only meaningful while the sweep runs.
    #[serde(skip)]
    pub output_file: PathBuf,
}

impl CompressionOutcome {
    pub fn new(
        measurement: Measurement,
        original_size: u64,
        compressed_size: u64,
        ratios: Ratios,
        output_file: PathBuf,
    ) -> Self {
        CompressionOutcome {
            measurement,
            original_size,
            compressed_size,
            compression_ratio: ratios.ratio.as_f64(),
            compression_percentage: ratios.percentage_saved_label(),
            compressed_percentage: ratios.percentage_of_original.as_f64(),
            output_file,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecompressionOutcome {
    #[serde(flatten)]
    pub measurement: Measurement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    pub compression: CompressionOutcome,
    pub decompression: DecompressionOutcome,
}

/// Level -> result. Levels serialize as their decimal strings.
pub type AlgorithmResult = BTreeMap<u32, LevelResult>;

pub type FileResult = BTreeMap<Algorithm, AlgorithmResult>;

/// A sweep entry that produced no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub algorithm: Algorithm,
    pub level: u32,
    pub operation: Option<OperationKind>,
    pub reason: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} level {}: {}", self.algorithm, self.level, self.reason)
    }
}

/// Everything the sweep of one file produced.
///
/// Serializes as the single-entry mapping `{ "<name>": FileResult }`; failures are diagnostics
/// only and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub result: FileResult,
    pub failures: Vec<Failure>,
}

impl FileEntry {
    pub fn level_count(&self) -> usize {
        self.result.values().map(BTreeMap::len).sum()
    }
}

impl Serialize for FileEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.result)?;
        map.end()
    }
}

/// The persisted output of one run: file entries in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RunResult {
    entries: Vec<FileEntry>,
}

impl RunResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: FileEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.failures.len()).sum()
    }
}

/// Makes sure results can be written to `dir` before any benchmarking starts, creating it when
/// it does not exist yet.
pub fn prepare_output_dir(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    } else if !dir.is_dir() {
        return Err(io::Error::new(io::ErrorKind::Other, "not a directory"));
    }
    // A throwaway file proves write access; it is removed when dropped.
    tempfile::Builder::new().prefix(".compression-sweep-").tempfile_in(dir)?;
    Ok(())
}

/// Writes `result` as pretty JSON to `<dir>/<started>.json`.
///
/// An existing file is never replaced: a numeric suffix is appended instead.
pub fn write_run_result<Tz>(result: &RunResult, dir: &Path, started: &DateTime<Tz>) -> io::Result<PathBuf>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let stem = started.format(TIMESTAMP_FORMAT).to_string();
    let json = serde_json::to_string_pretty(result)?;

    let mut attempt = 0;
    loop {
        let name = if attempt == 0 { format!("{}.json", stem) } else { format!("{}-{}.json", stem, attempt) };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())?;
                file.write_all(b"\n")?;
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Prints one table per file: best ratio, fastest compression and decompression, peak memory
/// and failure count for every algorithm.
pub fn print_benchmark_results(result: &RunResult) {
    for entry in result.entries() {
        let mut table = Table::new();
        table.add_row(row![
            "Algorithm",
            "Levels",
            "Failed",
            "Best Ratio (level)",
            "Fastest Comp s (level)",
            "Fastest Decomp s (level)",
            "Peak Comp Mem (KB)"
        ]);

        for (algorithm, levels) in &entry.result {
            let failed = entry.failures.iter().filter(|f| f.algorithm == *algorithm).count();
            let best_ratio = levels
                .iter()
                .max_by(|a, b| a.1.compression.compression_ratio.total_cmp(&b.1.compression.compression_ratio));
            let fastest_comp = levels.iter().min_by(|a, b| {
                a.1.compression.measurement.real_seconds.total_cmp(&b.1.compression.measurement.real_seconds)
            });
            let fastest_decomp = levels.iter().min_by(|a, b| {
                a.1.decompression.measurement.real_seconds.total_cmp(&b.1.decompression.measurement.real_seconds)
            });
            let peak_memory = levels.values().map(|level| level.compression.measurement.max).max();

            let best_ratio = best_ratio
                .map_or("-".to_string(), |(level, r)| format!("{:.2} ({})", r.compression.compression_ratio, level));
            let fastest_comp = fastest_comp.map_or("-".to_string(), |(level, r)| {
                format!("{:.2} ({})", r.compression.measurement.real_seconds, level)
            });
            let fastest_decomp = fastest_decomp.map_or("-".to_string(), |(level, r)| {
                format!("{:.2} ({})", r.decompression.measurement.real_seconds, level)
            });
            let peak_memory = peak_memory.map_or("-".to_string(), |kb| kb.to_string());

            table.add_row(row![algorithm, levels.len(), failed, best_ratio, fastest_comp, fastest_decomp, peak_memory]);
        }

        let original_size = entry
            .result
            .values()
            .flat_map(|levels| levels.values())
            .map(|level| level.compression.original_size)
            .next();
        match original_size {
            Some(size) => println!("\nResults for {} ({} bytes):", entry.name, size),
            None => println!("\nResults for {}:", entry.name),
        }
        table.printstd();

        for failure in &entry.failures {
            println!("  failed: {}", failure);
        }
    }
}
