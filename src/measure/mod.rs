pub mod time_format;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::compressor::{Algorithm, Codec};
use crate::error::{Error, Result};
use crate::interrupt::Interrupt;

pub const DEFAULT_TIME_BIN: &str = "/usr/bin/time";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Resource usage of one external invocation, as reported by the measuring wrapper.
///
/// `real` and `cpu` are kept exactly as the wrapper printed them; `real_seconds` is the same
/// elapsed time converted to seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub real: String,
    pub real_seconds: f64,
    pub cpu: String,
    pub sys: f64,
    pub user: f64,
    pub avg: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Compress,
    Decompress,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Compress => f.write_str("compress"),
            OperationKind::Decompress => f.write_str("decompress"),
        }
    }
}

/// One external codec invocation.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Compress { algorithm: Algorithm, level: u32, input: &'a Path },
    Decompress { algorithm: Algorithm, level: u32, input: &'a Path },
}

impl<'a> Operation<'a> {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Compress { .. } => OperationKind::Compress,
            Operation::Decompress { .. } => OperationKind::Decompress,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match *self {
            Operation::Compress { algorithm, .. } | Operation::Decompress { algorithm, .. } => algorithm,
        }
    }

    /// Level of the sweep entry this operation belongs to.
    pub fn level(&self) -> u32 {
        match *self {
            Operation::Compress { level, .. } | Operation::Decompress { level, .. } => level,
        }
    }

    pub fn input(&self) -> &'a Path {
        match *self {
            Operation::Compress { input, .. } | Operation::Decompress { input, .. } => input,
        }
    }

    /// Codec arguments for this operation, validated against the codec table.
    pub fn codec_args(&self, codec: &Codec) -> Result<Vec<std::ffi::OsString>> {
        match *self {
            Operation::Compress { level, input, .. } => codec.compress_args(level, input),
            Operation::Decompress { input, .. } => Ok(codec.decompress_args(input)),
        }
    }

    /// Builds the [`Error::Execution`] for this operation.
    pub fn failure(&self, reason: impl Into<String>) -> Error {
        Error::Execution {
            algorithm: self.algorithm(),
            level: self.level(),
            operation: self.kind(),
            reason: reason.into(),
        }
    }
}

/// Runs a codec operation, writing its output to `output`, and reports its resource usage.
///
/// Implementations must not run two measured operations concurrently from one call.
pub trait Executor: Sync {
    fn measure(&self, operation: &Operation<'_>, output: &Path) -> Result<Measurement>;
}

/// Executes codecs under GNU `time`, one process tree at a time.
#[derive(Debug, Clone)]
pub struct TimedExecutor {
    time_bin: PathBuf,
    timeout: Duration,
    core: Option<usize>,
    interrupt: Interrupt,
}

impl Default for TimedExecutor {
    fn default() -> Self {
        TimedExecutor {
            time_bin: PathBuf::from(DEFAULT_TIME_BIN),
            timeout: DEFAULT_TIMEOUT,
            core: None,
            interrupt: Interrupt::new(),
        }
    }
}

impl TimedExecutor {
    pub fn new(time_bin: impl Into<PathBuf>, timeout: Duration, core: Option<usize>) -> Self {
        TimedExecutor { time_bin: time_bin.into(), timeout, core, interrupt: Interrupt::new() }
    }

    /// Stops a running codec, and refuses to start new ones, once `interrupt` is raised.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    fn command(&self, codec: &Codec, args: Vec<std::ffi::OsString>) -> Command {
        let mut command = Command::new(&self.time_bin);
        command.arg("-f").arg(time_format::TIME_FORMAT).arg(codec.program).args(args);
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a timeout or an interrupt can take down the codec along with the
            // wrapper.
            command.process_group(0);
        }
        if let Some(core) = self.core {
            pin_to_core(&mut command, core);
        }
        command
    }
}

impl Executor for TimedExecutor {
    fn measure(&self, operation: &Operation<'_>, output: &Path) -> Result<Measurement> {
        let codec = Codec::lookup(operation.algorithm())?;
        let args = operation.codec_args(codec)?;
        if self.interrupt.is_raised() {
            return Err(Error::Interrupted);
        }

        let stdout = File::create(output).map_err(|e| operation.failure(format!("cannot create {}: {}", output.display(), e)))?;
        let mut stderr = tempfile::tempfile().map_err(|e| operation.failure(format!("cannot capture stderr: {}", e)))?;

        let mut command = self.command(codec, args);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr.try_clone()?));
        debug!(?command, "running {} {}", operation.kind(), operation.algorithm());

        let mut child = command
            .spawn()
            .map_err(|e| operation.failure(format!("cannot spawn {}: {}", self.time_bin.display(), e)))?;
        let status = match wait_for(&mut child, self.timeout, &self.interrupt) {
            Ok(Wait::Exited(status)) => status,
            Ok(Wait::TimedOut) => return Err(operation.failure(format!("timed out after {}s", self.timeout.as_secs()))),
            Ok(Wait::Interrupted) => return Err(Error::Interrupted),
            Err(e) => return Err(operation.failure(format!("cannot wait for {}: {}", self.time_bin.display(), e))),
        };

        let mut bytes = Vec::new();
        stderr.seek(SeekFrom::Start(0))?;
        stderr.read_to_end(&mut bytes)?;
        let captured = String::from_utf8_lossy(&bytes);

        if !status.success() {
            return Err(operation.failure(describe_failure(status, &captured)));
        }
        time_format::parse_stderr(&captured).map_err(|reason| operation.failure(reason))
    }
}

#[derive(Debug)]
enum Wait {
    Exited(ExitStatus),
    TimedOut,
    Interrupted,
}

/// Waits for `child`. On timeout, interruption or a failed poll its whole process group is
/// killed and reaped before returning, so nothing keeps running behind the next measurement.
fn wait_for(child: &mut Child, timeout: Duration, interrupt: &Interrupt) -> io::Result<Wait> {
    let deadline = Instant::now() + timeout;
    loop {
        let outcome = match child.try_wait() {
            Ok(Some(status)) => return Ok(Wait::Exited(status)),
            Ok(None) if interrupt.is_raised() => Ok(Wait::Interrupted),
            Ok(None) if Instant::now() >= deadline => Ok(Wait::TimedOut),
            Ok(None) => {
                thread::sleep(POLL_INTERVAL);
                continue;
            }
            Err(e) => Err(e),
        };
        kill_tree(child);
        let _ = child.wait();
        return outcome;
    }
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    let pgid = child.id() as libc::pid_t;
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(target_os = "linux")]
fn pin_to_core(command: &mut Command, core: usize) {
    use std::os::unix::process::CommandExt;
    unsafe {
        command.pre_exec(move || {
            let mut set: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut set);
            libc::CPU_SET(core, &mut set);
            if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(_command: &mut Command, core: usize) {
    tracing::warn!(core, "CPU pinning is only supported on Linux, ignoring");
}

/// Summarises a failed invocation from its exit status and everything but the metrics line.
fn describe_failure(status: ExitStatus, stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|line| !line.is_empty()).collect();
    let detail = match lines.split_last() {
        Some((last, rest)) if time_format::parse_line(last).is_ok() => rest.join("; "),
        _ => lines.join("; "),
    };
    if detail.is_empty() {
        format!("exited with {}", status)
    } else {
        format!("exited with {}: {}", status, detail)
    }
}
