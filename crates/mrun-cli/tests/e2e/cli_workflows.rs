//! E2E tests for command-line options, configuration and error reporting

use std::fs;

use super::support::{CLI_BINARY, project, run_in, script, stderr, stdout};

#[test]
fn test_help() {
    let output = std::process::Command::new(CLI_BINARY)
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(stdout(&output).contains("--dry-run"));
}

#[test]
fn test_list_targets() {
    let dir = project("full: test doctest\ntest:\ndoctest:\nmulti: full @each PY in a b\n");

    let output = run_in(dir.path(), &["--list"]);

    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "* full: test doctest\n  test:\n  doctest:\n  multi: full @each PY in a b\n"
    );
}

#[test]
fn test_list_json() {
    let dir = project("full: test\ntest:\n\techo hi\n");

    let output = run_in(dir.path(), &["-l", "--json"]);

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["file"], "Runfile");
    assert_eq!(json["targets"][1]["name"], "test");
    assert_eq!(json["targets"][1]["commands"], 1);
}

#[test]
fn test_dry_run_launches_nothing() {
    let dir = project("t:\n\ttouch created\n\t@false\n");

    let output = run_in(dir.path(), &["-n", "t"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "touch created\nfalse\n");
    assert!(!dir.path().join("created").exists());
}

#[test]
fn test_silent_flag() {
    let dir = project("t:\n\techo hi\n");

    let output = run_in(dir.path(), &["-s", "t"]);

    assert_eq!(stdout(&output), "hi\n");
}

#[test]
fn test_explicit_file_and_directory() {
    let dir = project("t:\n\techo from-runfile\n");
    fs::write(dir.path().join("ci.run"), "t:\n\t@echo from-ci\n").unwrap();
    let elsewhere = tempfile::TempDir::new().unwrap();
    let path = dir.path().to_str().unwrap();

    let output = run_in(elsewhere.path(), &["-C", path, "-f", "ci.run"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "from-ci\n");
}

#[test]
fn test_makefile_fallback() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(dir.path().join("Makefile"), "t:\n\t@echo from-makefile\n").unwrap();

    let output = run_in(dir.path(), &[]);

    assert_eq!(stdout(&output), "from-makefile\n");
}

#[test]
fn test_config_file() {
    let dir = project("PYTHON = python\nfirst:\n\t@echo first\nsecond:\n\t@echo second $(PYTHON)\n");
    fs::write(
        dir.path().join("mrun.toml"),
        "default_target = \"second\"\n\n[variables]\nPYTHON = \"python3\"\n",
    )
    .unwrap();

    let output = run_in(dir.path(), &[]);
    assert_eq!(stdout(&output), "second python3\n");

    let output = run_in(dir.path(), &["PYTHON=pypy"]);
    assert_eq!(stdout(&output), "second pypy\n");
}

#[test]
fn test_environment_default_target() {
    let dir = project("first:\n\t@echo first\nsecond:\n\t@echo second\n");

    let output = std::process::Command::new(CLI_BINARY)
        .current_dir(dir.path())
        .env("MRUN_DEFAULT_TARGET", "second")
        .output()
        .unwrap();

    assert_eq!(stdout(&output), "second\n");
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = project("t:\n");
    fs::write(dir.path().join("mrun.toml"), "jobs = 4\n").unwrap();

    let output = run_in(dir.path(), &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("invalid config"));
}

#[test]
fn test_unknown_target() {
    let dir = project("t:\n\ttouch created\n");

    let output = run_in(dir.path(), &["nope"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("ERR_UNKNOWN_TARGET"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_cycle_fails_before_launch() {
    let dir = project("a: b\n\ttouch created\nb: a\n");

    let output = run_in(dir.path(), &["a"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("ERR_CYCLE: a -> b -> a"));
    assert!(!dir.path().join("created").exists());
}

#[test]
fn test_syntax_error() {
    let dir = project("t:\n\techo ok\nthis line is not a rule\n");

    let output = run_in(dir.path(), &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("mrun:Runfile:3:1: ERR_SYNTAX"));
}

#[test]
fn test_missing_runfile() {
    let dir = tempfile::TempDir::new().unwrap();

    let output = run_in(dir.path(), &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(stderr(&output).contains("no Runfile found"));
}

#[test]
fn test_shell_option() {
    let dir = project("t:\n\t@echo first && echo second\n\t@echo direct\n");
    script(dir.path(), "logshell", "echo \"logshell $*\"");

    let output = run_in(dir.path(), &["--shell", "./logshell", "t"]);

    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "logshell -c echo first && echo second\ndirect\n"
    );
}

#[test]
fn test_relative_directory_with_local_tool() {
    let parent = tempfile::TempDir::new().unwrap();
    let project_dir = parent.path().join("project");
    fs::create_dir(&project_dir).unwrap();
    fs::write(project_dir.join("Runfile"), "t:\n\t@./tool suite\n").unwrap();
    script(&project_dir, "tool", "echo \"tool $* in $(basename \"$(pwd)\")\"");

    let output = run_in(parent.path(), &["-C", "project"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "tool suite in project\n");
}
