use std::path::Path;

use crate::compressor::CODECS;
use crate::error::{Error, Result};

/// Names of the required tools that cannot be found: every codec program, then the
/// measuring wrapper.
pub fn missing_tools(time_bin: &Path) -> Vec<String> {
    let mut missing: Vec<String> = CODECS
        .iter()
        .filter(|codec| which::which(codec.program).is_err())
        .map(|codec| codec.program.to_string())
        .collect();

    if which::which(time_bin).is_err() {
        missing.push(time_bin.display().to_string());
    }

    missing
}

/// Fails with [`Error::PrerequisiteMissing`] listing every tool that is not available.
pub fn check_prerequisites(time_bin: &Path) -> Result<()> {
    let missing = missing_tools(time_bin);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::PrerequisiteMissing(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn absent_wrapper_is_listed_by_path() {
        let dir = tempdir().expect("create temp dir");
        let time_bin = dir.path().join("time");
        let missing = missing_tools(&time_bin);
        assert_eq!(missing.last().map(String::as_str), Some(time_bin.to_str().unwrap()));

        match check_prerequisites(&time_bin) {
            Err(Error::PrerequisiteMissing(tools)) => assert_eq!(tools, missing),
            other => panic!("expected missing prerequisites, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn present_wrapper_is_not_listed() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("create temp dir");
        let time_bin = dir.path().join("time");
        fs::write(&time_bin, "#!/bin/sh\n").expect("write script");
        fs::set_permissions(&time_bin, fs::Permissions::from_mode(0o755)).expect("chmod script");

        let missing = missing_tools(&time_bin);
        assert!(!missing.contains(&time_bin.display().to_string()));
    }
}
