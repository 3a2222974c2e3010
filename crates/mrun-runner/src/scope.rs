//! Building the variable scope a run starts from

use mrun_ast::{MrunError, Runfile};
use mrun_parser::string_utils::is_valid_variable_name;
use mrun_parser::variable_resolver::{Origin, Variable, VariableContext};

/// Layer the environment, overrides, and Runfile assignments
///
/// Overrides are applied in order, so a later `NAME=value` replaces an
/// earlier one; Runfile assignments never replace an override.
///
/// # Errors
///
/// Returns `MrunError` when a `:=` or `+=` assignment fails to expand
pub fn build_scope<I>(
    runfile: &Runfile,
    environment: I,
    overrides: &[(String, String)],
) -> Result<VariableContext, MrunError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut scope = VariableContext::new();

    for (name, value) in environment {
        // SHELL comes from the Runfile or config, never the environment
        if is_valid_variable_name(&name) && name != "SHELL" {
            scope.define(name, Variable::simple(value, Origin::Environment));
        }
    }

    for (name, value) in overrides {
        scope.define(name.clone(), Variable::recursive(value.clone(), Origin::Override));
    }

    scope.load_runfile(runfile)?;
    Ok(scope)
}
