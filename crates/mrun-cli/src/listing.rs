//! `--list` output

use mrun_ast::Runfile;
use mrun_parser::MATRIX_KEYWORD;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Listing {
    pub file: String,
    pub default_target: Option<String>,
    pub targets: Vec<TargetEntry>,
}

#[derive(Debug, Serialize)]
pub struct TargetEntry {
    pub name: String,
    pub line: usize,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<MatrixEntry>,
    pub commands: usize,
}

#[derive(Debug, Serialize)]
pub struct MatrixEntry {
    pub variable: String,
    pub labels: Vec<String>,
}

impl Listing {
    /// Targets in declaration order; `default_target` replaces the
    /// Runfile's first target when set
    #[must_use]
    pub fn new(runfile: &Runfile, default_target: Option<&str>) -> Self {
        let targets = runfile
            .targets
            .iter()
            .map(|target| TargetEntry {
                name: target.node.name.clone(),
                line: runfile.position(target.span).line,
                dependencies: target.node.dependencies.clone(),
                matrix: target.node.matrix.as_ref().map(|matrix| MatrixEntry {
                    variable: matrix.variable.clone(),
                    labels: matrix.labels.clone(),
                }),
                commands: target.node.recipe.len(),
            })
            .collect();

        Self {
            file: runfile.filename.clone(),
            default_target: default_target
                .or_else(|| runfile.default_target())
                .map(ToString::to_string),
            targets,
        }
    }

    /// One `name: deps` line per target, the default marked with `*`
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for target in &self.targets {
            let marker = if self.default_target.as_deref() == Some(target.name.as_str()) {
                '*'
            } else {
                ' '
            };
            let mut words = vec![format!("{marker} {}:", target.name)];
            words.extend(target.dependencies.iter().cloned());
            if let Some(matrix) = &target.matrix {
                words.push(format!("{MATRIX_KEYWORD} {} in", matrix.variable));
                words.extend(matrix.labels.iter().cloned());
            }
            out.push_str(&words.join(" "));
            out.push('\n');
        }
        out
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails
    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
