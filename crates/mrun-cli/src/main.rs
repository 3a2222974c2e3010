//! mrun CLI
//!
//! Command-line interface for running Runfile targets.

mod config;
mod listing;
mod logging;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use config::{CliOverrides, MrunConfig};
use listing::Listing;
use mrun_parser::Parser;
use mrun_parser::string_utils::parse_assignment;
use mrun_runner::{LaunchOutcome, RunOptions, Runner, SystemLauncher, build_scope};
use tracing::debug;

/// Runfile names tried, in order, when no file is given
const RUNFILE_NAMES: [&str; 3] = ["Runfile", "runfile", "Makefile"];

/// Exit status for mrun's own errors
const ERROR_EXIT: i32 = 2;

fn main() {
    let matches = cli().get_matches();

    match run(&matches) {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("{e:#}");
            process::exit(ERROR_EXIT);
        }
    }
}

fn cli() -> Command {
    Command::new("mrun")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run test targets one after another, stopping at the first failure")
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("FILE")
                .help("Runfile to read")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("directory")
                .short('C')
                .long("directory")
                .value_name("DIR")
                .help("Run as if started in DIR")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .help("Print commands without running them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("silent")
                .short('s')
                .long("silent")
                .help("Do not echo commands")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("shell")
                .long("shell")
                .value_name("SHELL")
                .help("Shell for command lines that need one"),
        )
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .help("List targets and exit")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the target list as JSON")
                .requires("list")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Config file to use instead of mrun.toml")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("args")
                .value_name("TARGET|NAME=VALUE")
                .help("Targets to run and variable overrides")
                .num_args(0..)
                .action(ArgAction::Append),
        )
}

fn run(matches: &ArgMatches) -> anyhow::Result<i32> {
    let dir = matches
        .get_one::<PathBuf>("directory")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let dir = dir
        .canonicalize()
        .with_context(|| format!("mrun: {}: no such directory", dir.display()))?;
    if !dir.is_dir() {
        bail!("mrun: {}: not a directory", dir.display());
    }

    let cli_overrides = CliOverrides {
        file: matches.get_one::<PathBuf>("file").cloned(),
        shell: matches.get_one::<String>("shell").cloned(),
        silent: matches.get_flag("silent"),
    };
    let config = MrunConfig::load(
        &dir,
        matches.get_one::<PathBuf>("config").map(PathBuf::as_path),
        Some(&cli_overrides),
        |name| std::env::var(name).ok(),
    )?;
    logging::init_logging(config.log.as_deref());
    debug!(?config, "configuration loaded");

    let (goals, assignments) = split_args(
        matches
            .get_many::<String>("args")
            .into_iter()
            .flatten()
            .map(String::as_str),
    );

    let runfile_path = find_runfile(&dir, config.file.as_deref())?;
    let source = std::fs::read_to_string(dir.join(&runfile_path))
        .with_context(|| format!("mrun: cannot read {}", runfile_path.display()))?;
    let runfile = Parser::new_with_filename(&source, &runfile_path.display().to_string()).parse()?;

    if matches.get_flag("list") {
        let listing = Listing::new(&runfile, config.default_target.as_deref());
        if matches.get_flag("json") {
            println!("{}", listing.render_json()?);
        } else {
            print!("{}", listing.render_text());
        }
        return Ok(0);
    }

    let overrides: Vec<(String, String)> = config
        .variables
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .chain(assignments)
        .collect();
    let scope = build_scope(&runfile, std::env::vars(), &overrides)?;

    let goals = if goals.is_empty() {
        config.default_target.iter().cloned().collect()
    } else {
        goals
    };
    let options = RunOptions {
        dry_run: matches.get_flag("dry-run"),
        silent: !config.effective_echo(),
        shell: config.shell.clone(),
    };
    let launcher = SystemLauncher::new().with_working_dir(&dir);
    let mut runner = Runner::new(&runfile, scope, options, launcher);
    let report = runner.run(&goals)?;

    if let Some(failure) = &report.failure {
        if failure.outcome == LaunchOutcome::NotFound {
            eprintln!("mrun: {}: command not found", failure.program);
        }
        eprintln!("mrun: {failure}");
    }
    Ok(report.exit_code())
}

/// Separate `NAME=VALUE` overrides from target names
fn split_args<'a>(args: impl Iterator<Item = &'a str>) -> (Vec<String>, Vec<(String, String)>) {
    let mut goals = Vec::new();
    let mut assignments = Vec::new();
    for arg in args {
        match parse_assignment(arg) {
            Some(assignment) => assignments.push(assignment),
            None => goals.push(arg.to_string()),
        }
    }
    (goals, assignments)
}

/// Runfile path relative to `dir`: the configured one, or the first of
/// [`RUNFILE_NAMES`] that exists
fn find_runfile(dir: &Path, configured: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    RUNFILE_NAMES
        .iter()
        .map(PathBuf::from)
        .find(|name| dir.join(name).is_file())
        .with_context(|| {
            format!(
                "mrun: no Runfile found in {} (looked for {})",
                dir.display(),
                RUNFILE_NAMES.join(", ")
            )
        })
}
