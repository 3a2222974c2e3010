//! E2E tests for running Runfile targets against real processes

use std::fs;

use super::support::{project, run_in, script, stderr, stdout};

const PEP8: &str = "\
PYTHON = ./py_ok
test:
\t@$(PYTHON) test_pep8.py
doctest:
\t@$(PYTHON) -m doctest -v pep8.py
full: test doctest
multi: full @each PYTHON in ./py25 ./py26 ./py27
";

/// Fake interpreter that logs its invocation and fails the unit suite
/// when named `py_fail`
const INTERPRETER: &str = "\
name=$(basename \"$0\")
echo \"$name $*\" >> calls.log
if [ \"$name\" = py_fail ] && [ \"$1\" = test_pep8.py ]; then exit 1; fi";

fn calls(dir: &std::path::Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn test_full_target_passes() {
    let dir = project(PEP8);
    script(dir.path(), "py_ok", INTERPRETER);

    let output = run_in(dir.path(), &["full"]);

    assert!(output.status.success());
    assert_eq!(
        calls(dir.path()),
        vec!["py_ok test_pep8.py", "py_ok -m doctest -v pep8.py"]
    );
}

#[test]
fn test_default_target_is_first() {
    let dir = project(PEP8);
    script(dir.path(), "py_ok", INTERPRETER);

    let output = run_in(dir.path(), &[]);

    assert!(output.status.success());
    assert_eq!(calls(dir.path()), vec!["py_ok test_pep8.py"]);
}

#[test]
fn test_failing_unit_suite_skips_doctest() {
    let dir = project(PEP8);
    script(dir.path(), "py_fail", INTERPRETER);

    let output = run_in(dir.path(), &["full", "PYTHON=./py_fail"]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(calls(dir.path()), vec!["py_fail test_pep8.py"]);
    assert!(stderr(&output).contains("mrun: *** [Runfile:3: test] Error 1"));
}

#[test]
fn test_matrix_runs_every_version() {
    let dir = project(PEP8);
    for name in ["py25", "py26", "py27"] {
        script(dir.path(), name, INTERPRETER);
    }

    let output = run_in(dir.path(), &["multi"]);

    assert!(output.status.success());
    assert_eq!(
        calls(dir.path()),
        vec![
            "py25 test_pep8.py",
            "py25 -m doctest -v pep8.py",
            "py26 test_pep8.py",
            "py26 -m doctest -v pep8.py",
            "py27 test_pep8.py",
            "py27 -m doctest -v pep8.py",
        ]
    );
}

#[test]
fn test_missing_interpreter_stops_matrix() {
    let dir = project(PEP8);
    script(dir.path(), "py25", INTERPRETER);
    script(dir.path(), "py27", INTERPRETER);

    let output = run_in(dir.path(), &["multi"]);

    assert_eq!(output.status.code(), Some(127));
    assert_eq!(
        calls(dir.path()),
        vec!["py25 test_pep8.py", "py25 -m doctest -v pep8.py"]
    );
    let stderr = stderr(&output);
    assert!(stderr.contains("mrun: ./py26: command not found"));
    assert!(stderr.contains("[Runfile:3: test[PYTHON=./py26]] Error 127"));
}

#[test]
fn test_commands_are_echoed() {
    let dir = project("hello:\n\techo hello\n\t@echo quiet\n");

    let output = run_in(dir.path(), &["hello"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "echo hello\nhello\nquiet\n");
}

#[test]
fn test_shell_lines() {
    let dir = project("check:\n\t@test -n \"$$HOME\" && echo shell-ok\n");

    let output = run_in(dir.path(), &["check"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "shell-ok\n");
}

#[test]
fn test_child_exit_status_propagates() {
    let dir = project("boom:\n\t@sh -c 'exit 42'\n\t@echo unreachable\n");

    let output = run_in(dir.path(), &["boom"]);

    assert_eq!(output.status.code(), Some(42));
    assert!(!stdout(&output).contains("unreachable"));
    assert!(stderr(&output).contains("Error 42"));
}

#[test]
fn test_doctest_without_examples_passes() {
    let dir = project("doctest:\n\t@true\nall: doctest\n");

    let output = run_in(dir.path(), &["all"]);

    assert!(output.status.success());
}

#[test]
fn test_exported_variables_reach_children() {
    let dir = project("export RUN_MODE = ci\nshow:\n\t@./show\n");
    script(dir.path(), "show", "echo \"mode=$RUN_MODE\"");

    let output = run_in(dir.path(), &["show"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output), "mode=ci\n");
}

#[test]
fn test_required_variable_stops_run() {
    let dir = project("t:\n\t@touch first.done\n\t${PYTHON:?set PYTHON to an interpreter}\n\t@touch never.done\n");

    let output = run_in(dir.path(), &["t"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(dir.path().join("first.done").exists());
    assert!(!dir.path().join("never.done").exists());
    let stderr = stderr(&output);
    assert!(stderr.contains("mrun:Runfile:3:1: ERR_SYNTAX"), "{stderr}");
    assert!(stderr.contains("set PYTHON to an interpreter"));
}
