#![allow(
    clippy::result_large_err,
    reason = "EvalError carries location and backtrace; boxing would spread through every signature"
)]
//! Stencil Eval - execution engine for stencil templates.
//!
//! This crate walks pre-parsed template trees (`stencil_ir`) over runtime
//! values (`stencil_value`) and writes the output.
//!
//! # Architecture
//!
//! - `TemplateSet`: a namespace of named templates that call one another
//! - `Executor`: a template bound to function layers, options and a
//!   parent chain; the entry point of a render
//! - `State` (internal): one render, owning variables, output stack and
//!   per-render caches
//! - `operators::evaluate`: binary operators of expression operands
//! - builtins: the functions every template can call
//!
//! A render never mutates the trees or the set, so one `Arc<TemplateSet>`
//! serves any number of concurrent renders.
//!
//! # Re-exports
//!
//! The value and tree crates are re-exported so hosts need one dependency:
//! `stencil_eval::value::Value`, `stencil_eval::ir::build`, ...

mod builtins;
mod errors;
mod executor;
pub mod operators;
mod options;
mod stack;
mod state;
mod template;

pub use stencil_ir as ir;
pub use stencil_value as value;

pub use errors::{ExecError, RenderError, StateLocation, TemplatePath};
pub use executor::Executor;
pub use options::{BadOption, ExecOptions, MissingKey, WriteErrorPolicy, MAX_EXEC_DEPTH};
pub use stack::ensure_sufficient_stack;
pub use template::{Template, TemplateSet};

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
