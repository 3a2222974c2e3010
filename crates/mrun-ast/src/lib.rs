//! Runfile data model for mrun
//!
//! Every parsed node preserves location information for error reporting.

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }
}

/// Line and column position in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Convert byte span to line/column positions
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    line_starts: Vec<usize>,
}

impl SourceMap {
    #[must_use]
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (pos, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(pos + 1);
            }
        }
        Self { line_starts }
    }

    #[must_use]
    pub fn position(&self, byte_offset: usize) -> Position {
        match self.line_starts.binary_search(&byte_offset) {
            Ok(line) => Position::new(line + 1, 1),
            Err(line) => {
                let line_start = self.line_starts[line - 1];
                Position::new(line, byte_offset - line_start + 1)
            }
        }
    }
}

/// Node with location information
#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    #[must_use]
    pub const fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A parsed Runfile
#[derive(Debug, Clone)]
pub struct Runfile {
    /// Name used in diagnostics
    pub filename: String,
    pub source_map: SourceMap,
    /// Variable assignments in file order
    pub assignments: Vec<Spanned<Assignment>>,
    /// Targets in declaration order
    pub targets: Vec<Spanned<Target>>,
    /// Set by a `.SILENT:` rule
    pub silent: bool,
}

impl Runfile {
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&Spanned<Target>> {
        self.targets.iter().find(|target| target.node.name == name)
    }

    /// The first target declared in the file
    #[must_use]
    pub fn default_target(&self) -> Option<&str> {
        self.targets.first().map(|target| target.node.name.as_str())
    }

    #[must_use]
    pub fn position(&self, span: Span) -> Position {
        self.source_map.position(span.start)
    }

    /// Names of variables marked with `export`
    pub fn exported(&self) -> impl Iterator<Item = &str> {
        self.assignments
            .iter()
            .filter(|assignment| assignment.node.export)
            .map(|assignment| assignment.node.name.as_str())
    }
}

/// How an assignment combines with earlier definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignFlavor {
    /// NAME = value (expanded at use time)
    Recursive,
    /// NAME := value (expanded at definition time)
    Simple,
    /// NAME ?= value (only if not defined yet)
    Conditional,
    /// NAME += value (append with a space)
    Append,
}

/// Variable assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: String,
    pub flavor: AssignFlavor,
    /// Pass the variable to spawned invocations
    pub export: bool,
}

/// Repeat a target once per label with `variable` bound to the label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    pub variable: String,
    /// Raw labels; may contain variable references
    pub labels: Vec<String>,
}

/// A named rule: dependencies, an optional matrix, and recipe lines
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    /// Raw dependency words; may contain variable references
    pub dependencies: Vec<String>,
    pub matrix: Option<Matrix>,
    pub recipe: Vec<Spanned<RecipeLine>>,
}

impl Target {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self {
            name,
            dependencies: Vec::new(),
            matrix: None,
            recipe: Vec::new(),
        }
    }
}

/// One command of a target's recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeLine {
    /// Command text with the leading tab and prefixes removed
    pub text: String,
    /// `@` prefix: do not echo before running
    pub silent: bool,
}

/// Error types with location information
#[derive(thiserror::Error, Debug)]
pub enum MrunError {
    #[error("mrun:{filename}:{line}:{column}: ERR_SYNTAX: {message}")]
    Syntax {
        message: String,
        span: Span,
        filename: String,
        line: usize,
        column: usize,
    },

    #[error("mrun:{filename}:{line}:{column}: ERR_UNDEF_VAR: {var} is not set")]
    UndefinedVariable {
        var: String,
        span: Span,
        filename: String,
        line: usize,
        column: usize,
    },

    #[error("mrun:{filename}:{line}:{column}: ERR_RECURSIVE_VAR: {var} references itself")]
    RecursiveVariable {
        var: String,
        span: Span,
        filename: String,
        line: usize,
        column: usize,
    },

    #[error("mrun:{filename}:{line}:{column}: ERR_DUPLICATE_TARGET: {target} is already defined")]
    DuplicateTarget {
        target: String,
        span: Span,
        filename: String,
        line: usize,
        column: usize,
    },

    #[error("mrun:{filename}:{line}:{column}: ERR_UNKNOWN_TARGET: no rule to run target '{target}', needed by '{needed_by}'")]
    UnknownDependency {
        target: String,
        needed_by: String,
        span: Span,
        filename: String,
        line: usize,
        column: usize,
    },

    #[error("mrun: ERR_UNKNOWN_TARGET: no rule to run target '{target}'")]
    UnknownTarget { target: String },

    #[error("mrun:{filename}:{line}:{column}: ERR_CYCLE: {}", chain.join(" -> "))]
    Cycle {
        chain: Vec<String>,
        span: Span,
        filename: String,
        line: usize,
        column: usize,
    },

    #[error("mrun: ERR_NO_TARGETS: no targets in {filename}")]
    NoTargets { filename: String },
}

impl MrunError {
    #[must_use]
    pub fn syntax(message: String, span: Span, source_map: &SourceMap, filename: &str) -> Self {
        let pos = source_map.position(span.start);
        Self::Syntax {
            message,
            span,
            filename: filename.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    #[must_use]
    pub fn undefined_variable(
        var: String,
        span: Span,
        source_map: &SourceMap,
        filename: &str,
    ) -> Self {
        let pos = source_map.position(span.start);
        Self::UndefinedVariable {
            var,
            span,
            filename: filename.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    #[must_use]
    pub fn recursive_variable(
        var: String,
        span: Span,
        source_map: &SourceMap,
        filename: &str,
    ) -> Self {
        let pos = source_map.position(span.start);
        Self::RecursiveVariable {
            var,
            span,
            filename: filename.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    #[must_use]
    pub fn duplicate_target(
        target: String,
        span: Span,
        source_map: &SourceMap,
        filename: &str,
    ) -> Self {
        let pos = source_map.position(span.start);
        Self::DuplicateTarget {
            target,
            span,
            filename: filename.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    #[must_use]
    pub fn unknown_dependency(
        target: String,
        needed_by: String,
        span: Span,
        source_map: &SourceMap,
        filename: &str,
    ) -> Self {
        let pos = source_map.position(span.start);
        Self::UnknownDependency {
            target,
            needed_by,
            span,
            filename: filename.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    #[must_use]
    pub fn cycle(chain: Vec<String>, span: Span, source_map: &SourceMap, filename: &str) -> Self {
        let pos = source_map.position(span.start);
        Self::Cycle {
            chain,
            span,
            filename: filename.to_string(),
            line: pos.line,
            column: pos.column,
        }
    }

    /// Location of the error, if it has one
    #[must_use]
    pub const fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. }
            | Self::UndefinedVariable { span, .. }
            | Self::RecursiveVariable { span, .. }
            | Self::DuplicateTarget { span, .. }
            | Self::UnknownDependency { span, .. }
            | Self::Cycle { span, .. } => Some(*span),
            Self::UnknownTarget { .. } | Self::NoTargets { .. } => None,
        }
    }
}
