use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A file to benchmark, with its size captured once before any compression runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    /// Base name, used as the key of the file's entry in the results.
    pub name: String,
    pub original_size: u64,
}

impl InputFile {
    /// Checks that `path` is an existing regular file and records its size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| Error::InvalidInputFile { path: path.to_path_buf(), reason };

        let metadata = fs::metadata(path).map_err(|e| invalid(e.to_string()))?;
        if !metadata.is_file() {
            return Err(invalid("not a regular file".to_string()));
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| invalid("path has no file name".to_string()))?;

        Ok(InputFile {
            path: path.to_path_buf(),
            name,
            original_size: metadata.len(),
        })
    }
}

/// Validates every path, keeping input order. Paths that cannot be benchmarked are returned
/// separately as [`Error::InvalidInputFile`].
pub fn load_inputs<P: AsRef<Path>>(paths: &[P]) -> (Vec<InputFile>, Vec<Error>) {
    let mut inputs = Vec::with_capacity(paths.len());
    let mut rejected = Vec::new();

    for path in paths {
        match InputFile::open(path) {
            Ok(input) => inputs.push(input),
            Err(e) => rejected.push(e),
        }
    }

    (inputs, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_records_name_and_size() {
        let dir = tempdir().expect("create temp dir");
        let path = dir.path().join("sample.log");
        fs::write(&path, vec![b'a'; 1234]).expect("write file");

        let input = InputFile::open(&path).expect("open input");
        assert_eq!(input.name, "sample.log");
        assert_eq!(input.original_size, 1234);
        assert_eq!(input.path, path);
    }

    #[test]
    fn directories_and_missing_paths_are_rejected() {
        let dir = tempdir().expect("create temp dir");
        assert!(matches!(InputFile::open(dir.path()), Err(Error::InvalidInputFile { .. })));
        assert!(matches!(
            InputFile::open(dir.path().join("missing.bin")),
            Err(Error::InvalidInputFile { .. })
        ));
    }

    #[test]
    fn load_inputs_keeps_order_and_reports_rejects() {
        let dir = tempdir().expect("create temp dir");
        let first = dir.path().join("b.txt");
        let second = dir.path().join("a.txt");
        fs::write(&first, b"first").expect("write file");
        fs::write(&second, b"second").expect("write file");
        let missing = dir.path().join("nope.txt");

        let (inputs, rejected) = load_inputs(&[first, missing.clone(), second]);
        let names: Vec<&str> = inputs.iter().map(|input| input.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt", "a.txt"]);
        assert_eq!(rejected.len(), 1);
        assert!(matches!(&rejected[0], Error::InvalidInputFile { path, .. } if *path == missing));
    }
}
