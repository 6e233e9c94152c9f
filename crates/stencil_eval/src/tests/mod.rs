//! Test modules relocated from implementation files.
//!
//! Trees are built by hand with `stencil_ir::build` and rendered through
//! the public entry points.

mod exec_tests;
mod executor_tests;

use std::sync::Arc;

use stencil_ir::build::{action, cmd, ident, pipe};
use stencil_ir::{ListNode, Node, Operand, Tree};
use stencil_value::Value;

use crate::{RenderError, TemplateSet};

/// A set named after its first tree.
fn set_of(trees: impl IntoIterator<Item = Tree>) -> Arc<TemplateSet> {
    let mut trees = trees.into_iter().peekable();
    let name = trees.peek().map(|t| t.name.clone()).unwrap_or_default();
    let mut set = TemplateSet::new(name);
    for tree in trees {
        set.add_parse_tree(tree);
    }
    Arc::new(set)
}

fn try_render(root: ListNode, data: Value) -> Result<String, RenderError> {
    set_of([Tree::new("t", root)]).execute_string("t", data)
}

fn render(root: ListNode, data: Value) -> String {
    try_render(root, data).unwrap()
}

/// Full error text of a failing render.
fn render_err(root: ListNode, data: Value) -> String {
    try_render(root, data).unwrap_err().to_string()
}

/// `{{op}}`
fn show(op: Operand) -> Node {
    action(pipe([cmd([op])]))
}

/// `{{name args...}}`
fn call(name: &str, args: impl IntoIterator<Item = Operand>) -> Node {
    action(pipe([cmd(std::iter::once(ident(name)).chain(args))]))
}
