//! Helpers for driving the binary inside temporary project directories

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

pub const CLI_BINARY: &str = env!("CARGO_BIN_EXE_mrun");

/// A temporary project containing `Runfile`
pub fn project(runfile: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Runfile"), runfile).unwrap();
    dir
}

/// Write an executable shell script into `dir`
pub fn script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn run_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(CLI_BINARY)
        .current_dir(dir)
        .args(args)
        .env_remove("MRUN_LOG")
        .env_remove("MRUN_FILE")
        .env_remove("MRUN_SHELL")
        .env_remove("MRUN_DEFAULT_TARGET")
        .output()
        .unwrap_or_else(|_| panic!("Failed to execute {CLI_BINARY}"))
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
