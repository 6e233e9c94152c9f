//! Syntax tree for the stencil template engine.
//!
//! This crate holds the data the interpreter walks: node types, source
//! spans, the [`Tree`] wrapper that ties a root list to its name, declared
//! arguments and source text, and [`build`] helpers for constructing trees
//! without a parser.
//!
//! Nodes are plain owned data. A [`Tree`] is shared read-only between the
//! template sets and executors that use it, so rendering never mutates it.

mod ast;
pub mod build;
mod ops;
mod span;
mod tree;

pub use ast::{
    is_empty_tree, ActionNode, Assign, BlockNode, BranchNode, CommandNode, ExprNode, ListNode,
    Node, Number, Operand, OperandKind, PipeNode, Spanned, TemplateNode, TextNode, VarDecl,
    WrapNode,
};
pub use ops::BinaryOp;
pub use span::{LineCol, Span, SpanError};
pub use tree::Tree;
