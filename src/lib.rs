//! mrun
//!
//! Runs Runfile targets in declared order, fanning a target out over a
//! version matrix and stopping at the first failing command.
//!
//! The work is split across the member crates:
//! - [`ast`]: Runfile model, spans and errors
//! - [`lexer`]: command-line tokens
//! - [`parser`]: Runfile parsing and variable expansion
//! - [`runner`]: planning and sequential execution

pub use mrun_ast as ast;
pub use mrun_lexer as lexer;
pub use mrun_parser as parser;
pub use mrun_runner as runner;

pub use mrun_ast::{MrunError, Runfile};
pub use mrun_parser::Parser;
pub use mrun_runner::{RunOptions, RunReport, Runner, SystemLauncher, build_scope};
