//! Parsed template bodies.

use std::fmt;
use std::sync::Arc;

use crate::{is_empty_tree, LineCol, ListNode, Span};

/// Contexts longer than this are cut and suffixed with `...`.
const MAX_CONTEXT: usize = 20;

/// One parsed template: its root list plus the metadata the interpreter
/// needs to call it and to report errors inside it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tree {
    /// Name the template is registered under.
    pub name: String,
    /// Name of the source the template was parsed from; prefixes error locations.
    pub parse_name: String,
    pub root: ListNode,
    /// Declared argument names, bound positionally after the dot by `{{template}}`.
    pub args: Vec<String>,
    /// How many of the caller's variables stay visible inside the body.
    pub inherited_vars_len: usize,
    /// Full source text, used only to turn spans into line/column.
    pub source: Arc<str>,
}

impl Tree {
    pub fn new(name: impl Into<String>, root: ListNode) -> Self {
        let name = name.into();
        Tree {
            parse_name: name.clone(),
            name,
            root,
            args: Vec::new(),
            inherited_vars_len: 0,
            source: Arc::from(""),
        }
    }

    #[must_use]
    pub fn with_source(mut self, parse_name: impl Into<String>, source: impl Into<Arc<str>>) -> Self {
        self.parse_name = parse_name.into();
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_inherited_vars(mut self, len: usize) -> Self {
        self.inherited_vars_len = len;
        self
    }

    /// Whether the body renders only whitespace.
    pub fn is_empty(&self) -> bool {
        is_empty_tree(&self.root)
    }

    /// `("parse_name:line:col", context)` for a node at `span`.
    ///
    /// The context is the node's rendered form, cut to a short prefix.
    pub fn error_context(&self, span: Span, node: &dyn fmt::Display) -> (String, String) {
        let at = LineCol::locate(&self.source, span.start);
        let location = format!("{}:{at}", self.parse_name);
        (location, truncate_context(&node.to_string()))
    }
}

fn truncate_context(context: &str) -> String {
    match context.char_indices().nth(MAX_CONTEXT) {
        Some((cut, _)) => format!("{}...", &context[..cut]),
        None => context.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::build::{action, cmd, field, list, pipe, text};

    #[test]
    fn error_context_reports_line_and_column() {
        let source = "hello\n  {{.Name}}";
        let tree = Tree::new("page", list([text("hello\n  "), action(pipe([cmd([field(".Name")])]))]))
            .with_source("page.tmpl", source);
        let node = &tree.root.nodes[1];
        let span = Span::new(8, 17);
        let (location, context) = tree.error_context(span, node);
        assert_eq!(location, "page.tmpl:2:2");
        assert_eq!(context, "{{.Name}}");
    }

    #[test]
    fn long_context_is_truncated() {
        let tree = Tree::new("t", ListNode::default());
        let node = field(".Aaaaaaaaaa.Bbbbbbbbbb.Cccccccccc");
        let (location, context) = tree.error_context(Span::DUMMY, &node);
        assert_eq!(location, "t:1:0");
        assert_eq!(context, ".Aaaaaaaaaa.Bbbbbbbb...");
    }

    #[test]
    fn whitespace_only_tree_is_empty() {
        assert!(Tree::new("t", list([text("  \n\t")])).is_empty());
        assert!(!Tree::new("t", list([text(" x ")])).is_empty());
        assert!(!Tree::new("t", list([action(pipe([cmd([field(".A")])]))])).is_empty());
    }
}
