use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::compressor::Algorithm;
use crate::measure::OperationKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the harness can report, from a single codec invocation up to the whole run.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more external tools could not be found.
    #[error("missing prerequisites: {}", .0.join(", "))]
    PrerequisiteMissing(Vec<String>),

    #[error("invalid input file '{}': {reason}", .path.display())]
    InvalidInputFile { path: PathBuf, reason: String },

    /// A compress/decompress invocation failed or produced no usable metrics line.
    #[error("{operation} with {algorithm} at level {level} failed: {reason}")]
    Execution {
        algorithm: Algorithm,
        level: u32,
        operation: OperationKind,
        reason: String,
    },

    /// A derived statistic would be undefined (division by zero).
    #[error("degenerate sizes: original {original} bytes, compressed {compressed} bytes")]
    DegenerateOutput { original: u64, compressed: u64 },

    #[error("unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("level {level} is outside the valid range for {algorithm}")]
    InvalidLevel { algorithm: Algorithm, level: u32 },

    #[error("no input files given")]
    NoInputFiles,

    #[error("none of the input files could be benchmarked")]
    NoValidInputs,

    /// The result directory is missing and cannot be created, or cannot be written to.
    #[error("cannot write results to '{}': {reason}", .path.display())]
    OutputDir { path: PathBuf, reason: String },

    /// SIGINT, SIGTERM or SIGQUIT arrived while a codec was running.
    #[error("interrupted by signal")]
    Interrupted,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors that point at a defect in the codec table rather than at the input or the tools.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Error::UnsupportedAlgorithm(_) | Error::InvalidLevel { .. })
    }

    /// Errors that stop the whole run instead of a single pair or file.
    pub fn aborts_run(&self) -> bool {
        self.is_contract_violation() || matches!(self, Error::Interrupted)
    }
}
