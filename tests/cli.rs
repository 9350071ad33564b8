use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

#[cfg(target_os = "linux")]
use compression_sweep_rs::compressor::CODECS;
#[cfg(target_os = "linux")]
use std::os::unix::fs::PermissionsExt;
#[cfg(target_os = "linux")]
use std::process::Stdio;
#[cfg(target_os = "linux")]
use std::thread;
#[cfg(target_os = "linux")]
use std::time::{Duration, Instant};

fn sweep() -> Command {
    Command::new(env!("CARGO_BIN_EXE_compression_sweep"))
}

fn json_count(dir: &Path) -> usize {
    fs::read_dir(dir)
        .expect("read dir")
        .filter(|entry| {
            entry.as_ref().map(|e| e.path().extension().map(|ext| ext == "json").unwrap_or(false)).unwrap_or(false)
        })
        .count()
}

#[test]
fn no_arguments_exits_with_one_and_writes_nothing() {
    let dir = tempdir().expect("create temp dir");
    let output = sweep().current_dir(dir.path()).output().expect("run binary");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
    assert_eq!(json_count(dir.path()), 0);
}

#[test]
fn missing_prerequisite_is_listed_and_exits_with_one() {
    let dir = tempdir().expect("create temp dir");
    let time_bin = dir.path().join("no-time-here");
    let input = dir.path().join("input.txt");
    fs::write(&input, b"some text").expect("write input");

    let output = sweep()
        .current_dir(dir.path())
        .arg("--time-bin")
        .arg(&time_bin)
        .arg(&input)
        .output()
        .expect("run binary");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|line| line.trim() == time_bin.display().to_string()), "{stdout}");
    assert_eq!(json_count(dir.path()), 0);
}

/// Whether `pid` is still running; a zombie no longer counts.
#[cfg(target_os = "linux")]
fn is_running(pid: u32) -> bool {
    match fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !stat.rsplit(')').next().unwrap_or("").trim_start().starts_with('Z'),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn poll_until(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while !done() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
    true
}

#[cfg(target_os = "linux")]
#[test]
fn sigint_stops_the_codec_and_removes_scratch() {
    for codec in CODECS.iter() {
        if which::which(codec.program).is_err() {
            eprintln!("skipping: {} not installed", codec.program);
            return;
        }
    }
    let dir = tempdir().expect("create temp dir");
    let scratch_root = dir.path().join("tmp");
    fs::create_dir(&scratch_root).expect("create scratch root");
    let out = dir.path().join("out");
    let pid_file = dir.path().join("codec.pid");
    let input = dir.path().join("input.txt");
    fs::write(&input, b"some text").expect("write input");

    // Stands in for GNU time: forks a "codec" that never finishes.
    let time_bin = dir.path().join("fake-time");
    fs::write(&time_bin, format!("#!/bin/sh\nsleep 300 &\necho $! > '{}'\nwait\n", pid_file.display()))
        .expect("write script");
    fs::set_permissions(&time_bin, fs::Permissions::from_mode(0o755)).expect("chmod script");

    let mut child = sweep()
        .env("TMPDIR", &scratch_root)
        .arg("--time-bin")
        .arg(&time_bin)
        .arg("--output-dir")
        .arg(&out)
        .arg(&input)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("run binary");

    let mut codec_pid = None;
    let started = poll_until(Duration::from_secs(10), || {
        codec_pid = fs::read_to_string(&pid_file).ok().and_then(|text| text.trim().parse::<u32>().ok());
        codec_pid.is_some()
    });
    if !started {
        let _ = child.kill();
        panic!("codec never started");
    }
    let codec_pid = codec_pid.unwrap();
    let scratch_dirs = || fs::read_dir(&scratch_root).expect("read scratch root").count();
    assert!(scratch_dirs() > 0);

    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGINT);
    }
    let mut status = None;
    let exited = poll_until(Duration::from_secs(20), || {
        status = child.try_wait().expect("poll binary");
        status.is_some()
    });
    if !exited {
        let _ = child.kill();
        panic!("binary ignored SIGINT");
    }

    assert_eq!(status.unwrap().code(), Some(130));
    assert!(poll_until(Duration::from_secs(5), || !is_running(codec_pid)), "codec {} still running", codec_pid);
    assert_eq!(scratch_dirs(), 0);
    assert_eq!(json_count(&out), 0);
}
