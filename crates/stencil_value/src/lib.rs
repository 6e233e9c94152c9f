#![allow(
    clippy::result_large_err,
    reason = "EvalError carries location and backtrace; boxing would spread through every signature"
)]
//! Runtime model of the stencil template engine.
//!
//! This crate provides:
//! - Template values (`Value`, `Heap`, `Key`, `Record`) and the host
//!   object capabilities (`Object`, `AttrGetter`, `TemplateIterator`)
//! - Execution errors (`EvalError`, `EvalResult`) and their factories
//! - Callables (`Function`, `FuncValue`) and the layered registry
//!   (`FuncScope`) with context-bound factories (`Context`)
//! - The `Interp` trait through which stateful functions reach the
//!   running interpreter, and the executor-local `LocalData` store
//!
//! The interpreter itself lives in `stencil_eval`; keeping the seam here
//! lets host crates write functions without depending on it.

mod errors;
mod func;
mod interp;
mod local;
mod value;

pub use errors::{
    bad_operator, bad_template_args, call_failed, depth_exceeded, division_by_zero,
    empty_template, exit_signal, field_has_arguments, int_overflow, missing_key,
    modulo_by_zero, nil_data, nil_pointer, no_such_field, not_a_function, not_iterable,
    not_printable, not_testable, panicked, too_few_args, undefined_function, undefined_template,
    undefined_variable, write_failed, wrong_arg_count, BacktraceFrame, ErrorSite, EvalBacktrace,
    EvalError, EvalErrorKind, EvalResult, Signal,
};
pub use func::{
    is_valid_name, Arity, Body, Context, ContextFactory, DataFuncs, FuncError, FuncMap,
    FuncScope, FuncValue, Function, Outcome, Results, Signature,
};
pub use interp::{BlockHandle, Interp};
pub use local::LocalData;
pub use value::{
    format_float, sprint, sprintln, AttrGetter, Heap, Key, Object, Presence, RangeElemState,
    Record, TemplateIterator, Value,
};
