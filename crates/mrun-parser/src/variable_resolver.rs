//! Variable resolution for Runfiles
//!
//! Holds variable definitions with their origin, applies Runfile
//! assignments on top of the environment and overrides, and expands
//! `$(NAME)`, `${NAME}`, `${NAME:-default}` and friends.

use std::collections::HashMap;

use mrun_ast::{AssignFlavor, MrunError, Runfile, SourceMap, Span};
use tracing::debug;

use crate::string_utils::is_valid_variable_name;

/// Name of the automatic variable holding the current target
pub const TARGET_VARIABLE: &str = "@";

/// Where a definition came from; later origins win over earlier ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    /// Process environment
    Environment,
    /// Runfile assignment
    File,
    /// Config file or command line `NAME=value`
    Override,
    /// Matrix binding or `$@`
    Automatic,
}

/// A defined variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub value: String,
    /// Expanded at use time when true, used verbatim otherwise
    pub recursive: bool,
    pub origin: Origin,
}

impl Variable {
    #[must_use]
    pub fn simple(value: impl Into<String>, origin: Origin) -> Self {
        Self {
            value: value.into(),
            recursive: false,
            origin,
        }
    }

    #[must_use]
    pub fn recursive(value: impl Into<String>, origin: Origin) -> Self {
        Self {
            value: value.into(),
            recursive: true,
            origin,
        }
    }
}

/// Variable resolution context
///
/// A child context shadows its parent; matrix bindings live in a child so
/// the shared scope is never mutated while a plan runs.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// Current variable bindings
    variables: HashMap<String, Variable>,
    /// Parent context for nested scopes
    parent: Option<Box<VariableContext>>,
}

impl VariableContext {
    /// Create a new empty variable context
    #[must_use]
    pub fn new() -> Self {
        Self {
            variables: HashMap::new(),
            parent: None,
        }
    }

    /// Create a new context with a parent for nested scoping
    #[must_use]
    pub fn with_parent(parent: VariableContext) -> Self {
        Self {
            variables: HashMap::new(),
            parent: Some(Box::new(parent)),
        }
    }

    /// Define a variable in the current context
    ///
    /// Returns false when an existing definition has a stronger origin and
    /// the new one was dropped.
    pub fn define(&mut self, name: impl Into<String>, variable: Variable) -> bool {
        let name = name.into();
        if let Some(existing) = self.get(&name) {
            if existing.origin > variable.origin {
                debug!(name = %name, origin = ?existing.origin, "keeping stronger definition");
                return false;
            }
        }
        self.variables.insert(name, variable);
        true
    }

    /// Bind a literal value that shadows every other origin
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables
            .insert(name.into(), Variable::simple(value, Origin::Automatic));
    }

    /// Get a variable, checking parent contexts if not found locally
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables
            .get(name)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.get(name)))
    }

    /// Check if a variable exists in any accessible context
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Apply a Runfile's assignments in file order
    ///
    /// # Errors
    ///
    /// Returns `MrunError` when a `:=` or `+=` value fails to expand
    pub fn load_runfile(&mut self, runfile: &Runfile) -> Result<(), MrunError> {
        for assignment in &runfile.assignments {
            let node = &assignment.node;
            let locate =
                |err: ExpansionError| err.locate(assignment.span, &runfile.source_map, &runfile.filename);

            match node.flavor {
                AssignFlavor::Recursive => {
                    self.define(node.name.clone(), Variable::recursive(&node.value, Origin::File));
                }
                AssignFlavor::Simple => {
                    let value = expand(&node.value, self).map_err(locate)?;
                    self.define(node.name.clone(), Variable::simple(value, Origin::File));
                }
                AssignFlavor::Conditional => {
                    if !self.contains(&node.name) {
                        self.define(node.name.clone(), Variable::recursive(&node.value, Origin::File));
                    }
                }
                AssignFlavor::Append => {
                    let appended = match self.get(&node.name) {
                        Some(existing) if existing.recursive => Variable::recursive(
                            join_words(&existing.value, &node.value),
                            Origin::File,
                        ),
                        Some(existing) => {
                            let value = expand(&node.value, self).map_err(locate)?;
                            Variable::simple(join_words(&existing.value, &value), Origin::File)
                        }
                        None => Variable::recursive(&node.value, Origin::File),
                    };
                    self.define(node.name.clone(), appended);
                }
            }
        }
        Ok(())
    }
}

fn join_words(existing: &str, addition: &str) -> String {
    if existing.is_empty() {
        addition.to_string()
    } else if addition.is_empty() {
        existing.to_string()
    } else {
        format!("{existing} {addition}")
    }
}

/// Parameter expansion mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    /// Normal expansion: $(var) or ${var}
    Normal,
    /// Default value: ${var:-default}
    DefaultValue,
    /// Error if unset: ${var:?message}
    ErrorIfUnset,
    /// Alternative value: ${var:+value}
    AlternativeValue,
}

/// A parsed variable reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionRequest {
    /// Variable name to expand
    pub variable_name: String,
    /// Expansion mode
    pub mode: ExpansionMode,
    /// Optional parameter for expansion modes that need it
    pub parameter: Option<String>,
    /// Whether an empty value counts as unset (`:` prefix in expansion)
    pub check_unset: bool,
}

impl ExpansionRequest {
    /// Create a simple variable expansion request
    #[must_use]
    pub fn simple(variable_name: String) -> Self {
        Self {
            variable_name,
            mode: ExpansionMode::Normal,
            parameter: None,
            check_unset: false,
        }
    }

    /// Create an expansion request with default value
    #[must_use]
    pub fn with_default(variable_name: String, default_value: String) -> Self {
        Self {
            variable_name,
            mode: ExpansionMode::DefaultValue,
            parameter: Some(default_value),
            check_unset: true,
        }
    }

    /// Parse the text between the brackets of a reference
    ///
    /// # Errors
    ///
    /// Returns `ExpansionError` for function calls and malformed references
    pub fn parse(inner: &str) -> Result<Self, ExpansionError> {
        let name_len = if inner.starts_with(TARGET_VARIABLE) {
            TARGET_VARIABLE.len()
        } else {
            inner
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(inner.len())
        };
        let (name, rest) = inner.split_at(name_len);

        if name != TARGET_VARIABLE && !is_valid_variable_name(name) {
            return Err(ExpansionError::InvalidReference(inner.to_string()));
        }

        let (check_unset, operator) = match rest.strip_prefix(':') {
            Some(stripped) => (true, stripped),
            None => (false, rest),
        };

        let mut chars = operator.chars();
        let mode = match chars.next() {
            None if !check_unset => return Ok(Self::simple(name.to_string())),
            Some('-') => ExpansionMode::DefaultValue,
            Some('?') => ExpansionMode::ErrorIfUnset,
            Some('+') => ExpansionMode::AlternativeValue,
            Some(c) if c.is_whitespace() && !check_unset => {
                return Err(ExpansionError::UnsupportedFunction(name.to_string()));
            }
            _ => return Err(ExpansionError::InvalidReference(inner.to_string())),
        };

        Ok(Self {
            variable_name: name.to_string(),
            mode,
            parameter: Some(chars.as_str().to_string()),
            check_unset,
        })
    }
}

/// Variable expansion failure, located by the caller
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpansionError {
    #[error("{0} is not set")]
    Undefined(String),

    #[error("{0} references itself")]
    Recursive(String),

    #[error("{name}: {message}")]
    Unset { name: String, message: String },

    #[error("unterminated variable reference")]
    Unterminated,

    #[error("unsupported function '{0}'")]
    UnsupportedFunction(String),

    #[error("invalid variable reference '{0}'")]
    InvalidReference(String),
}

impl ExpansionError {
    /// Attach a source location
    #[must_use]
    pub fn locate(self, span: Span, source_map: &SourceMap, filename: &str) -> MrunError {
        match self {
            Self::Undefined(var) => MrunError::undefined_variable(var, span, source_map, filename),
            Self::Recursive(var) => MrunError::recursive_variable(var, span, source_map, filename),
            other => MrunError::syntax(other.to_string(), span, source_map, filename),
        }
    }
}

/// Expand every variable reference in `text`
///
/// `$$` yields a literal `$`; a `$` not followed by `$`, `(`, `{` or `@` is
/// kept as is.
///
/// # Errors
///
/// Returns `ExpansionError` for undefined, self-referencing, or malformed
/// references
pub fn expand(text: &str, context: &VariableContext) -> Result<String, ExpansionError> {
    Expander {
        context,
        active: Vec::new(),
    }
    .expand(text)
}

struct Expander<'ctx> {
    context: &'ctx VariableContext,
    /// Recursive variables currently being expanded
    active: Vec<String>,
}

impl Expander<'_> {
    fn expand(&mut self, text: &str) -> Result<String, ExpansionError> {
        let mut output = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(dollar) = rest.find('$') {
            output.push_str(&rest[..dollar]);
            let after = &rest[dollar + 1..];

            match after.chars().next() {
                Some('$') => {
                    output.push('$');
                    rest = &after[1..];
                }
                Some('@') => {
                    let request = ExpansionRequest::simple(TARGET_VARIABLE.to_string());
                    output.push_str(&self.resolve(&request)?);
                    rest = &after[1..];
                }
                Some(open @ ('(' | '{')) => {
                    let close = if open == '(' { ')' } else { '}' };
                    let end = matching_close(&after[1..], open, close)
                        .ok_or(ExpansionError::Unterminated)?;
                    let inner = &after[1..=end];
                    output.push_str(&self.reference(inner)?);
                    rest = &after[end + 2..];
                }
                _ => {
                    output.push('$');
                    rest = after;
                }
            }
        }

        output.push_str(rest);
        Ok(output)
    }

    fn reference(&mut self, inner: &str) -> Result<String, ExpansionError> {
        match ExpansionRequest::parse(inner) {
            Ok(request) => self.resolve(&request),
            // Computed names: $($(KIND)_FLAGS)
            Err(ExpansionError::InvalidReference(_)) if inner.starts_with('$') => {
                let computed = self.expand(inner)?;
                let request = ExpansionRequest::parse(&computed)?;
                self.resolve(&request)
            }
            Err(err) => Err(err),
        }
    }

    fn resolve(&mut self, request: &ExpansionRequest) -> Result<String, ExpansionError> {
        let name = &request.variable_name;
        let context = self.context;
        let variable = context.get(name);
        let is_set = variable.is_some_and(|v| !request.check_unset || !v.value.is_empty());
        let parameter = request.parameter.as_deref().unwrap_or_default();

        match request.mode {
            ExpansionMode::Normal => match variable {
                Some(variable) => self.value_of(name, variable),
                None => Err(ExpansionError::Undefined(name.clone())),
            },
            ExpansionMode::DefaultValue => match variable {
                Some(variable) if is_set => self.value_of(name, variable),
                _ => self.expand(parameter),
            },
            ExpansionMode::ErrorIfUnset => match variable {
                Some(variable) if is_set => self.value_of(name, variable),
                _ => {
                    let message = if parameter.is_empty() {
                        "parameter null or not set".to_string()
                    } else {
                        self.expand(parameter)?
                    };
                    Err(ExpansionError::Unset {
                        name: name.clone(),
                        message,
                    })
                }
            },
            ExpansionMode::AlternativeValue => {
                if is_set {
                    self.expand(parameter)
                } else {
                    Ok(String::new())
                }
            }
        }
    }

    fn value_of(&mut self, name: &str, variable: &Variable) -> Result<String, ExpansionError> {
        if !variable.recursive {
            return Ok(variable.value.clone());
        }
        if self.active.iter().any(|active| active == name) {
            return Err(ExpansionError::Recursive(name.to_string()));
        }
        self.active.push(name.to_string());
        let value = self.expand(&variable.value);
        self.active.pop();
        value
    }
}

/// Byte index in `text` of the bracket closing an already-open reference
fn matching_close(text: &str, open: char, close: char) -> Option<usize> {
    let mut depth = 1usize;
    for (index, ch) in text.char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                return Some(index);
            }
        }
    }
    None
}
