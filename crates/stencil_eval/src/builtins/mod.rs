//! Functions every template can call.
//!
//! Two tables, both built once per process:
//!
//! - [`builtins`]: the base layer of every root executor (`and`, `index`,
//!   `printf`, comparisons, ...). Host functions registered on an executor
//!   shadow them.
//! - [`state_funcs`]: functions that act on the running render (`set`,
//!   `get`, `tpl_yield`, `join`, ...). They are consulted before any other
//!   layer, so hosts can't shadow them.

mod collections;
mod compare;
mod convert;
mod escape;
mod logic;
mod printf;
mod state_funcs;

use std::sync::OnceLock;

use stencil_value::{EvalError, FuncScope, Function, Value};

/// Builtin function table.
pub(crate) fn builtins() -> &'static FuncScope {
    static TABLE: OnceLock<FuncScope> = OnceLock::new();
    TABLE.get_or_init(|| {
        install(&[
            ("and", logic::and()),
            ("or", logic::or()),
            ("not", logic::not()),
            ("to_b", logic::to_b()),
            ("call", logic::call()),
            ("default", logic::default()),
            ("is_null", logic::is_null()),
            ("not_null", logic::not_null()),
            ("first_valid", logic::first_valid()),
            ("has_method", logic::has_method()),
            ("nil", logic::nil()),
            ("null", logic::nil()),
            ("exit", logic::exit()),
            ("index", collections::index()),
            ("slice", collections::slice()),
            ("len", collections::len()),
            ("contains", collections::contains()),
            ("array", collections::array()),
            ("append", collections::append()),
            ("map", collections::map()),
            ("dict", collections::dict()),
            ("new_pair", collections::new_pair()),
            ("range_callback", collections::range_callback()),
            ("html", escape::html()),
            ("js", escape::js()),
            ("urlquery", escape::urlquery()),
            ("print", convert::print()),
            ("to_s", convert::print()),
            ("println", convert::println()),
            ("printf", convert::printf()),
            ("to_i", convert::to_i()),
            ("to_u", convert::to_u()),
            ("pow", convert::pow()),
            ("floor", convert::floor()),
            ("eq", compare::eq()),
            ("ne", compare::ne()),
            ("lt", compare::lt()),
            ("le", compare::le()),
            ("gt", compare::gt()),
            ("ge", compare::ge()),
        ])
    })
}

/// Functions bound to the running render.
pub(crate) fn state_funcs() -> &'static FuncScope {
    static TABLE: OnceLock<FuncScope> = OnceLock::new();
    TABLE.get_or_init(|| {
        install(&[
            ("_tpl_state", state_funcs::tpl_state()),
            ("_tpl_funcs", state_funcs::tpl_funcs()),
            ("_tpl_data_funcs", state_funcs::tpl_data_funcs()),
            ("set", state_funcs::set()),
            ("get", state_funcs::get()),
            ("template_exec", state_funcs::template_exec()),
            ("tpl_render", state_funcs::template_exec()),
            ("tpl_yield", state_funcs::tpl_yield()),
            ("trim", state_funcs::trim()),
            ("join", state_funcs::join()),
        ])
    })
}

fn install(table: &[(&str, Function)]) -> FuncScope {
    let mut scope = FuncScope::new();
    for (name, f) in table {
        if let Err(err) = scope.set(*name, f.clone()) {
            tracing::error!(%err, "builtin not installed");
        }
    }
    scope
}

/// `args[i]` as a string, or an error naming `func`.
fn str_arg<'v>(func: &str, args: &'v [Value], i: usize) -> Result<&'v str, EvalError> {
    match args.get(i).map(Value::indirect) {
        Some(Value::Str(s)) => Ok(s.as_str()),
        Some(other) => Err(EvalError::new(format!(
            "{func}: argument {} must be a string, not {}",
            i + 1,
            other.type_name()
        ))),
        None => Err(EvalError::new(format!("{func}: missing argument {}", i + 1))),
    }
}

/// Text of the arguments of an escaping or printing function: a lone
/// string as is, anything else through `print`.
fn text_of(args: &[Value]) -> String {
    match args {
        [Value::Str(s)] => s.as_str().to_string(),
        _ => stencil_value::sprint(args),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
