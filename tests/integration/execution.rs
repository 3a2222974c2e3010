//! Integration tests for planning + launching
//! Tests the runner against real processes in a scratch directory

#![cfg(unix)]

use std::fs;

use mrun::runner::LaunchOutcome;
use mrun::{Parser, RunOptions, Runner, SystemLauncher, build_scope};
use tempfile::TempDir;

fn run(source: &str, goals: &[&str], dir: &TempDir) -> mrun::RunReport {
    let runfile = Parser::new_with_filename(source, "Runfile").parse().unwrap();
    let scope = build_scope(&runfile, Vec::new(), &[]).unwrap();
    let options = RunOptions {
        silent: true,
        ..RunOptions::default()
    };
    let launcher = SystemLauncher::new().with_working_dir(dir.path());
    let goals: Vec<String> = goals.iter().map(ToString::to_string).collect();
    Runner::new(&runfile, scope, options, launcher).run(&goals).unwrap()
}

#[test]
fn test_recipes_run_in_working_dir() {
    let dir = TempDir::new().unwrap();
    let report = run("all: a b\na:\n\ttouch a.done\nb:\n\ttouch b.done\n", &["all"], &dir);

    assert!(report.success());
    assert_eq!(report.invocations, 2);
    assert!(dir.path().join("a.done").exists());
    assert!(dir.path().join("b.done").exists());
}

#[test]
fn test_failure_stops_later_targets() {
    let dir = TempDir::new().unwrap();
    let report = run(
        "all: unit doc\nunit:\n\tsh -c 'exit 5'\ndoc:\n\ttouch doc.done\n",
        &["all"],
        &dir,
    );

    assert_eq!(report.exit_code(), 5);
    assert!(!dir.path().join("doc.done").exists());
    let failure = report.failure.unwrap();
    assert_eq!(failure.target, "unit");
    assert_eq!(failure.line, 3);
}

#[test]
fn test_matrix_with_shell_lines() {
    let dir = TempDir::new().unwrap();
    let report = run(
        "t:\n\techo $(V) >> versions.txt\nm: t @each V in one two three\n",
        &["m"],
        &dir,
    );

    assert!(report.success());
    let versions = fs::read_to_string(dir.path().join("versions.txt")).unwrap();
    assert_eq!(versions, "one\ntwo\nthree\n");
}

#[test]
fn test_missing_tool() {
    let dir = TempDir::new().unwrap();
    let report = run("t:\n\tmrun_nonexistent_tool_12345 --version\n", &["t"], &dir);

    assert_eq!(report.exit_code(), 127);
    assert_eq!(report.failure.unwrap().outcome, LaunchOutcome::NotFound);
}

#[test]
fn test_signal_exit_code() {
    let dir = TempDir::new().unwrap();
    let report = run("t:\n\tsh -c 'kill -9 $$$$'\n", &["t"], &dir);

    assert_eq!(report.exit_code(), 137);
}

#[test]
fn test_shell_only_lines_succeed() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("env.sh"), "SUITE=unit\n").unwrap();
    let report = run(
        "\
checks:
\ttest a = a # same
\t. ./env.sh
\tcommand -v sh
\ttype sh
\t: placeholder
\tumask 022
\tunset PYTHONPATH
\teval true
\tif true; then touch branch.done; fi
\t{ true; }
\t! false
",
        &["checks"],
        &dir,
    );

    assert!(report.success(), "{:?}", report.failure);
    assert_eq!(report.invocations, 11);
    assert!(dir.path().join("branch.done").exists());
}
