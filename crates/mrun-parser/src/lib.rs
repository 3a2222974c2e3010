//! Runfile parser for mrun
//!
//! Line oriented: continuation lines are joined first, then every logical
//! line is classified as a recipe line, an assignment, or a rule header.

use mrun_ast::{
    AssignFlavor, Assignment, Matrix, MrunError, RecipeLine, Runfile, SourceMap, Span, Spanned,
    Target,
};
use tracing::{debug, warn};

// Recipe line tokenization
pub mod command_line;

// String processing utilities
pub mod string_utils;

// Variable resolution and expansion
pub mod variable_resolver;

use string_utils::{is_valid_variable_name, strip_comment};

/// Keyword introducing a version matrix in a rule header
pub const MATRIX_KEYWORD: &str = "@each";

/// A joined logical line
#[derive(Debug, Clone)]
struct LogicalLine {
    text: String,
    span: Span,
    recipe: bool,
}

/// Separator that classifies a non-recipe line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Rule,
    DoubleColon,
    Assign(AssignFlavor),
}

/// Which rule recipe lines currently attach to
#[derive(Debug, Clone, Copy)]
enum Current {
    None,
    Target(usize),
    /// Recipe lines of special targets are dropped
    Special,
}

pub struct Parser {
    source_map: SourceMap,
    filename: String,
    lines: Vec<LogicalLine>,
}

impl Parser {
    /// Create a new parser for the given input
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self::new_with_filename(input, "<input>")
    }

    /// Create a new parser for the given input with a filename
    #[must_use]
    pub fn new_with_filename(input: &str, filename: &str) -> Self {
        Self {
            source_map: SourceMap::new(input),
            filename: filename.to_string(),
            lines: logical_lines(input),
        }
    }

    /// Parse the input into a Runfile
    ///
    /// # Errors
    ///
    /// Returns `MrunError` if there are syntax errors or duplicate targets
    pub fn parse(&self) -> Result<Runfile, MrunError> {
        let mut runfile = Runfile {
            filename: self.filename.clone(),
            source_map: self.source_map.clone(),
            assignments: Vec::new(),
            targets: Vec::new(),
            silent: false,
        };
        let mut current = Current::None;

        for line in &self.lines {
            if line.recipe {
                self.parse_recipe_line(line, current, &mut runfile)?;
                continue;
            }

            let text = strip_comment(&line.text);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }

            current = match find_separator(text) {
                Some((index, end, Separator::Assign(flavor))) => {
                    let assignment = self.parse_assignment(text, index, end, flavor, line.span)?;
                    debug!(name = %assignment.name, ?flavor, "assignment");
                    runfile.assignments.push(Spanned::new(assignment, line.span));
                    Current::None
                }
                Some((index, _, Separator::Rule)) => {
                    self.parse_rule(text, index, line.span, &mut runfile)?
                }
                Some((_, _, Separator::DoubleColon)) => {
                    return Err(self.error("double-colon rules are not supported", line.span));
                }
                None => return Err(self.error("missing separator", line.span)),
            };
        }

        Ok(runfile)
    }

    fn parse_recipe_line(
        &self,
        line: &LogicalLine,
        current: Current,
        runfile: &mut Runfile,
    ) -> Result<(), MrunError> {
        let text = line.text.trim();
        if text.is_empty() || text.starts_with('#') {
            return Ok(());
        }

        let index = match current {
            Current::Target(index) => index,
            Current::Special => return Ok(()),
            Current::None => {
                return Err(self.error("recipe commences before first target", line.span));
            }
        };

        let recipe = self.parse_recipe_text(text, line.span)?;
        runfile.targets[index]
            .node
            .recipe
            .push(Spanned::new(recipe, line.span));
        Ok(())
    }

    fn parse_recipe_text(&self, text: &str, span: Span) -> Result<RecipeLine, MrunError> {
        let mut silent = false;
        let mut rest = text;
        loop {
            if let Some(stripped) = rest.strip_prefix('@') {
                silent = true;
                rest = stripped.trim_start();
            } else if let Some(stripped) = rest.strip_prefix('+') {
                rest = stripped.trim_start();
            } else if rest.starts_with('-') && !rest.starts_with("--") {
                return Err(self.error(
                    "ignoring recipe errors with '-' is not supported",
                    span,
                ));
            } else {
                break;
            }
        }

        Ok(RecipeLine {
            text: rest.to_string(),
            silent,
        })
    }

    fn parse_assignment(
        &self,
        text: &str,
        index: usize,
        end: usize,
        flavor: AssignFlavor,
        span: Span,
    ) -> Result<Assignment, MrunError> {
        let lhs = text[..index].trim();
        let (export, name) = match lhs.strip_prefix("export") {
            Some(rest) if rest.starts_with(char::is_whitespace) => (true, rest.trim()),
            _ => (false, lhs),
        };

        if !is_valid_variable_name(name) {
            return Err(self.error(&format!("invalid variable name '{name}'"), span));
        }

        Ok(Assignment {
            name: name.to_string(),
            value: text[end..].trim().to_string(),
            flavor,
            export,
        })
    }

    fn parse_rule(
        &self,
        text: &str,
        index: usize,
        span: Span,
        runfile: &mut Runfile,
    ) -> Result<Current, MrunError> {
        let names: Vec<&str> = text[..index].split_whitespace().collect();
        let name = match names.as_slice() {
            [] => return Err(self.error("missing target name", span)),
            [name] => *name,
            _ => {
                return Err(self.error("multiple targets per rule are not supported", span));
            }
        };

        let rest = &text[index + 1..];
        let (header, inline) = match find_unnested(rest, ';') {
            Some(semicolon) => (&rest[..semicolon], Some(rest[semicolon + 1..].trim())),
            None => (rest, None),
        };
        let words: Vec<&str> = header.split_whitespace().collect();

        if name.starts_with('.') {
            match name {
                ".PHONY" => {}
                ".SILENT" => runfile.silent = true,
                other => warn!(target_name = other, "ignoring unsupported special target"),
            }
            return Ok(Current::Special);
        }

        if runfile.target(name).is_some() {
            return Err(MrunError::duplicate_target(
                name.to_string(),
                span,
                &self.source_map,
                &self.filename,
            ));
        }

        let mut target = Target::new(name.to_string());
        match words.iter().position(|word| *word == MATRIX_KEYWORD) {
            Some(each) => {
                target.dependencies = words[..each].iter().map(ToString::to_string).collect();
                target.matrix = Some(self.parse_matrix(&words[each + 1..], span)?);
            }
            None => {
                target.dependencies = words.iter().map(ToString::to_string).collect();
            }
        }

        if let Some(command) = inline.filter(|command| !command.is_empty()) {
            let recipe = self.parse_recipe_text(command, span)?;
            target.recipe.push(Spanned::new(recipe, span));
        }

        debug!(
            target_name = %target.name,
            dependencies = target.dependencies.len(),
            matrix = target.matrix.is_some(),
            "rule"
        );
        runfile.targets.push(Spanned::new(target, span));
        Ok(Current::Target(runfile.targets.len() - 1))
    }

    fn parse_matrix(&self, words: &[&str], span: Span) -> Result<Matrix, MrunError> {
        match words {
            [variable, "in", labels @ ..] if !labels.is_empty() => {
                if !is_valid_variable_name(variable) {
                    return Err(self.error(
                        &format!("invalid matrix variable '{variable}'"),
                        span,
                    ));
                }
                Ok(Matrix {
                    variable: (*variable).to_string(),
                    labels: labels.iter().map(ToString::to_string).collect(),
                })
            }
            [_, "in"] => Err(self.error("matrix needs at least one label", span)),
            _ => Err(self.error(
                &format!("expected '{MATRIX_KEYWORD} VARIABLE in LABEL...'"),
                span,
            )),
        }
    }

    fn error(&self, message: &str, span: Span) -> MrunError {
        MrunError::syntax(message.to_string(), span, &self.source_map, &self.filename)
    }
}

/// Join backslash-continued physical lines
fn logical_lines(input: &str) -> Vec<LogicalLine> {
    let mut lines = Vec::new();
    let mut pending: Option<LogicalLine> = None;
    let mut offset = 0;

    for physical in input.split_inclusive('\n') {
        let start = offset;
        offset += physical.len();
        let content = physical.trim_end_matches(['\n', '\r']);
        let end = start + content.len();

        let mut line = match pending.take() {
            Some(mut line) => {
                line.text.push(' ');
                line.text.push_str(content.trim_start());
                line.span.end = end;
                line
            }
            None => match content.strip_prefix('\t') {
                Some(recipe) => LogicalLine {
                    text: recipe.to_string(),
                    span: Span::new(start, end),
                    recipe: true,
                },
                None => LogicalLine {
                    text: content.to_string(),
                    span: Span::new(start, end),
                    recipe: false,
                },
            },
        };

        if ends_with_continuation(&line.text) {
            line.text.pop();
            let trimmed = line.text.trim_end().len();
            line.text.truncate(trimmed);
            pending = Some(line);
        } else {
            lines.push(line);
        }
    }

    lines.extend(pending);
    lines
}

/// An odd number of trailing backslashes continues the line
fn ends_with_continuation(text: &str) -> bool {
    text.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// First `:` or `=` outside variable references
///
/// Returns the separator's start byte, the byte after it, and its kind.
fn find_separator(text: &str) -> Option<(usize, usize, Separator)> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut index = 0;

    while index < bytes.len() {
        match bytes[index] {
            b'$' if matches!(bytes.get(index + 1), Some(b'(' | b'{')) => {
                depth += 1;
                index += 1;
            }
            b')' | b'}' if depth > 0 => depth -= 1,
            b':' if depth == 0 => {
                return Some(match bytes.get(index + 1) {
                    Some(b'=') => (index, index + 2, Separator::Assign(AssignFlavor::Simple)),
                    Some(b':') => (index, index + 2, Separator::DoubleColon),
                    _ => (index, index + 1, Separator::Rule),
                });
            }
            b'=' if depth == 0 => {
                let flavor = match index.checked_sub(1).map(|prev| bytes[prev]) {
                    Some(b'?') => AssignFlavor::Conditional,
                    Some(b'+') => AssignFlavor::Append,
                    _ => return Some((index, index + 1, Separator::Assign(AssignFlavor::Recursive))),
                };
                return Some((index - 1, index + 1, Separator::Assign(flavor)));
            }
            _ => {}
        }
        index += 1;
    }
    None
}

/// First `needle` outside variable references
fn find_unnested(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut previous = None;
    for (index, ch) in text.char_indices() {
        match ch {
            '(' | '{' if previous == Some('$') => depth += 1,
            ')' | '}' if depth > 0 => depth -= 1,
            c if c == needle && depth == 0 => return Some(index),
            _ => {}
        }
        previous = Some(ch);
    }
    None
}
