use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// The compression algorithms the harness knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Bz2,
    Gz,
    Lz4,
    Zstd,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [Algorithm::Bz2, Algorithm::Gz, Algorithm::Lz4, Algorithm::Zstd];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Bz2 => "bz2",
            Algorithm::Gz => "gz",
            Algorithm::Lz4 => "lz4",
            Algorithm::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == s)
            .ok_or_else(|| Error::UnsupportedAlgorithm(s.to_string()))
    }
}

/// Describes how an external codec executable is invoked.
///
/// Every codec in the table follows the same command-line convention:
/// `-k -c -<level>` to compress (keep the input, write to stdout) and `-d -c`
/// to decompress. Adding an algorithm means adding a row to [`CODECS`].
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    pub algorithm: Algorithm,
    /// Executable looked up on `PATH`.
    pub program: &'static str,
    /// Extension appended to compressed artifacts.
    pub extension: &'static str,
    pub min_level: u32,
    pub max_level: u32,
}

pub static CODECS: [Codec; 4] = [
    Codec { algorithm: Algorithm::Bz2, program: "bzip2", extension: "bz2", min_level: 1, max_level: 9 },
    Codec { algorithm: Algorithm::Gz, program: "gzip", extension: "gz", min_level: 0, max_level: 9 },
    Codec { algorithm: Algorithm::Lz4, program: "lz4", extension: "lz4", min_level: 1, max_level: 9 },
    Codec { algorithm: Algorithm::Zstd, program: "zstd", extension: "zst", min_level: 1, max_level: 19 },
];

impl Codec {
    /// Finds the table row for `algorithm`.
    pub fn lookup(algorithm: Algorithm) -> Result<&'static Codec> {
        CODECS
            .iter()
            .find(|codec| codec.algorithm == algorithm)
            .ok_or_else(|| Error::UnsupportedAlgorithm(algorithm.to_string()))
    }

    pub fn levels(&self) -> RangeInclusive<u32> {
        self.min_level..=self.max_level
    }

    pub fn supports_level(&self, level: u32) -> bool {
        self.levels().contains(&level)
    }

    /// Arguments compressing `input` to stdout at `level`, leaving `input` in place.
    pub fn compress_args(&self, level: u32, input: &Path) -> Result<Vec<OsString>> {
        if !self.supports_level(level) {
            return Err(Error::InvalidLevel { algorithm: self.algorithm, level });
        }
        Ok(vec![
            "-k".into(),
            "-c".into(),
            format!("-{}", level).into(),
            // Ends option parsing, so a file named like a flag is still read as a file.
            "--".into(),
            input.as_os_str().to_owned(),
        ])
    }

    /// Arguments decompressing `input` to stdout.
    pub fn decompress_args(&self, input: &Path) -> Vec<OsString> {
        vec!["-d".into(), "-c".into(), "--".into(), input.as_os_str().to_owned()]
    }

    /// File name of the compressed artifact for `stem` at `level`, e.g. `notes.txt.9.zst`.
    pub fn artifact_name(&self, stem: &str, level: u32) -> String {
        format!("{}.{}.{}", stem, level, self.extension)
    }
}

/// Iterates every `(codec, level)` pair of the sweep, algorithm by algorithm.
pub fn sweep_pairs() -> impl Iterator<Item = (&'static Codec, u32)> {
    CODECS.iter().flat_map(|codec| codec.levels().map(move |level| (codec, level)))
}
