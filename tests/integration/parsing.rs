//! Integration tests for parser + scope + planner
//! Tests component interactions at the planning boundary

use mrun::MrunError;
use mrun::parser::Parser;
use mrun::parser::command_line::split_command;
use mrun::parser::variable_resolver::expand;
use mrun::runner::{Planner, bound_scope, build_scope};
use proptest::prelude::*;

const PEP8: &str = "\
# pep8 test targets
PYTHON = python
PYTHONS = python2.5 python2.6 python2.7

test:
\t$(PYTHON) test_pep8.py

doctest:
\t$(PYTHON) -m doctest -v pep8.py

full: test doctest

multi: full @each PYTHON in $(PYTHONS)

.PHONY: test doctest full multi
";

fn plan_labels(source: &str, goals: &[&str], overrides: &[(&str, &str)]) -> Result<Vec<String>, MrunError> {
    let runfile = Parser::new_with_filename(source, "Runfile").parse()?;
    let overrides: Vec<(String, String)> = overrides
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect();
    let scope = build_scope(&runfile, Vec::new(), &overrides)?;
    let goals: Vec<String> = goals.iter().map(ToString::to_string).collect();
    Ok(Planner::new(&runfile, &scope).plan(&goals)?.labels())
}

#[test]
fn test_parse_and_plan_full() {
    assert_eq!(
        plan_labels(PEP8, &["full"], &[]).unwrap(),
        vec!["test", "doctest", "full"]
    );
}

#[test]
fn test_parse_and_plan_matrix() {
    let labels = plan_labels(PEP8, &["multi"], &[]).unwrap();
    assert_eq!(labels.len(), 12);
    assert_eq!(labels[0], "test[PYTHON=python2.5]");
    assert_eq!(labels[11], "multi[PYTHON=python2.7]");
}

#[test]
fn test_override_changes_matrix_labels() {
    let labels = plan_labels(PEP8, &["multi"], &[("PYTHONS", "pypy")]).unwrap();
    assert_eq!(
        labels,
        vec![
            "test[PYTHON=pypy]",
            "doctest[PYTHON=pypy]",
            "full[PYTHON=pypy]",
            "multi[PYTHON=pypy]",
        ]
    );
}

#[test]
fn test_default_target_skips_special_targets() {
    let runfile = Parser::new(".SILENT:\n.PHONY: all\nall: t\nt:\n").parse().unwrap();
    assert_eq!(runfile.default_target(), Some("all"));
    assert!(runfile.silent);
}

#[test]
fn test_recipe_expands_under_binding() {
    let runfile = Parser::new_with_filename(PEP8, "Runfile").parse().unwrap();
    let scope = build_scope(&runfile, Vec::new(), &[]).unwrap();
    let mut bindings = mrun::runner::Bindings::new();
    bindings.insert("PYTHON".to_string(), "python2.6".to_string());

    let bound = bound_scope(&scope, "test", &bindings);
    let test = runfile.target("test").unwrap();
    let expanded = expand(&test.node.recipe[0].node.text, &bound).unwrap();
    let command = split_command(&expanded).unwrap();

    assert_eq!(command.words, vec!["python2.6", "test_pep8.py"]);
    assert!(!command.requires_shell);
}

#[test]
fn test_environment_sits_below_runfile() {
    let runfile = Parser::new("PYTHON = python\nt:\n").parse().unwrap();
    let scope = build_scope(
        &runfile,
        vec![
            ("PYTHON".to_string(), "env-python".to_string()),
            ("VIRTUAL_ENV".to_string(), "/venv".to_string()),
        ],
        &[],
    )
    .unwrap();

    assert_eq!(expand("$(PYTHON) $(VIRTUAL_ENV)", &scope).unwrap(), "python /venv");
}

#[test]
fn test_errors_are_located_in_file() {
    let error = Parser::new_with_filename("t:\nt:\n", "ci.run").parse().unwrap_err();
    assert!(error.to_string().starts_with("mrun:ci.run:2:1: ERR_DUPLICATE_TARGET"));

    let error = plan_labels("all: $(SUITES)\n", &["all"], &[]).unwrap_err();
    assert!(error.to_string().starts_with("mrun:Runfile:1:1: ERR_UNDEF_VAR: SUITES"));
}

proptest! {
    #[test]
    fn composite_plans_parts_in_declared_order(parts in proptest::collection::vec("[a-z]{1,6}", 1..8)) {
        let mut unique: Vec<String> = Vec::new();
        for part in parts {
            if part != "all" && part != "export" && !unique.contains(&part) {
                unique.push(part);
            }
        }
        prop_assume!(!unique.is_empty());

        let mut source = format!("all: {}\n", unique.join(" "));
        for part in &unique {
            source.push_str(&format!("{part}:\n\ttrue\n"));
        }

        let labels = plan_labels(&source, &["all"], &[]).unwrap();
        let mut expected = unique.clone();
        expected.push("all".to_string());
        prop_assert_eq!(labels, expected);
    }
}
