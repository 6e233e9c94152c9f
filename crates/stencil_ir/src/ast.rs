//! Template syntax tree.
//!
//! The engine never builds these nodes while rendering; they come from a
//! parser (or from the helpers in [`crate::build`]). Every node carries the
//! [`Span`] of the source text it was parsed from and renders back to a
//! template-like string through `Display`, which error messages quote as
//! the "context" of a failure.

use std::fmt;

use crate::{BinaryOp, Span};

/// Access to the source span of a node.
pub trait Spanned {
    fn span(&self) -> Span;
}

/// A walkable node.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    /// Literal text, written verbatim.
    Text(TextNode),
    /// `{{pipeline}}`
    Action(ActionNode),
    /// `{{if pipeline}} list {{else}} list {{end}}`
    If(BranchNode),
    /// `{{with pipeline}} list {{else}} list {{end}}`
    With(BranchNode),
    /// `{{range pipeline}} list {{else}} list {{end}}`
    Range(BranchNode),
    /// `{{template "name" pipeline}}`
    Template(TemplateNode),
    /// Nested node list.
    List(ListNode),
    /// `{{wrap}} list {{begin}} list {{after}} list {{else}} list {{end}}`
    Wrap(WrapNode),
    /// `{{arg cmd... | fn}} list {{end}}`: the rendered list becomes the last argument of `fn`.
    Arg(BlockNode),
    /// `{{callback fn args...}} list {{end}}`: `fn` receives a handler that re-walks the list.
    Callback(BlockNode),
}

impl Spanned for Node {
    fn span(&self) -> Span {
        match self {
            Node::Text(n) => n.span,
            Node::Action(n) => n.span,
            Node::If(n) | Node::With(n) | Node::Range(n) => n.span,
            Node::Template(n) => n.span,
            Node::List(n) => n.span,
            Node::Wrap(n) => n.span,
            Node::Arg(n) | Node::Callback(n) => n.span,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextNode {
    pub span: Span,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionNode {
    pub span: Span,
    pub pipe: PipeNode,
}

/// Shared shape of `if`, `with` and `range`.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchNode {
    pub span: Span,
    pub pipe: PipeNode,
    pub list: ListNode,
    pub else_list: Option<ListNode>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemplateNode {
    pub span: Span,
    pub name: String,
    /// Single command: first argument becomes dot, the rest bind to the
    /// callee's declared arguments.
    pub pipe: Option<PipeNode>,
}

#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ListNode {
    pub span: Span,
    pub nodes: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WrapNode {
    pub span: Span,
    /// Only inspected for the `strip` marker and `trim_right`.
    pub pipe: Option<PipeNode>,
    pub list: ListNode,
    pub begin_list: Option<ListNode>,
    pub after_list: Option<ListNode>,
    pub else_list: Option<ListNode>,
}

impl WrapNode {
    /// Leading whitespace of the body is dropped instead of buffered.
    pub fn strip(&self) -> bool {
        self.pipe.as_ref().is_some_and(|pipe| {
            pipe.trim_right
                || matches!(
                    pipe.cmds.as_slice(),
                    [cmd] if matches!(cmd.args.as_slice(), [op] if op.kind == OperandKind::Identifier("strip".into()))
                )
        })
    }
}

/// Body of `arg` and `callback` blocks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockNode {
    pub span: Span,
    pub pipe: PipeNode,
    pub list: ListNode,
}

/// How a pipeline stores its result into a variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Assign {
    /// `$x := ...` pushes a new binding.
    Declare,
    /// `$x = ...` overwrites the nearest existing binding.
    Update,
    /// `$x += ...` and friends fold the result into the existing binding.
    Compound(BinaryOp),
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VarDecl {
    pub span: Span,
    /// Includes the leading `$`.
    pub name: String,
    pub assign: Assign,
    /// `range $s := &...`: bind per-iteration loop state instead of the element.
    pub ptr: bool,
}

#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipeNode {
    pub span: Span,
    pub decl: Vec<VarDecl>,
    pub cmds: Vec<CommandNode>,
    /// The action was closed with `-}}`.
    pub trim_right: bool,
}

#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CommandNode {
    pub span: Span,
    /// `args[0]` is the command word; the rest are its arguments.
    pub args: Vec<Operand>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operand {
    pub span: Span,
    pub kind: OperandKind,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandKind {
    /// `.A.B`; `optional` marks fields written with a trailing `?`, which
    /// resolve to the empty string when missing.
    Field { path: Vec<String>, optional: bool },
    /// `(pipeline).A.B`
    Chain { base: Box<Operand>, path: Vec<String> },
    /// Function name.
    Identifier(String),
    /// `$x` or `$x.A.B`
    Variable { name: String, path: Vec<String> },
    Dot,
    Nil,
    Bool(bool),
    Number(Number),
    String(String),
    /// Parenthesized pipeline.
    Pipe(Box<PipeNode>),
    /// `(a op b)`
    Expr(Box<ExprNode>),
}

/// Numeric literal, stored under every representation that holds it exactly.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Number {
    pub text: String,
    pub int: Option<i64>,
    pub uint: Option<u64>,
    pub float: Option<f64>,
}

impl Number {
    /// Parse a decimal, hexadecimal, octal, binary or floating point literal.
    pub fn parse(text: &str) -> Option<Number> {
        let clean = text.replace('_', "");
        let (negative, digits) = match clean.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, clean.strip_prefix('+').unwrap_or(&clean)),
        };
        let radix_digits = [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)]
            .iter()
            .find_map(|(prefix, radix)| digits.strip_prefix(prefix).map(|d| (d, *radix)));

        let magnitude = match radix_digits {
            Some((d, radix)) => u64::from_str_radix(d, radix).ok(),
            None => digits.parse::<u64>().ok(),
        };

        let (int, uint) = match magnitude {
            Some(m) if negative => {
                let int = 0i64.checked_sub_unsigned(m);
                (int, None)
            }
            Some(m) => (i64::try_from(m).ok(), Some(m)),
            None => (None, None),
        };

        #[expect(
            clippy::cast_precision_loss,
            reason = "ideal constants keep a float view of every integer"
        )]
        let float = match (int, uint) {
            (Some(i), _) => Some(i as f64),
            (None, Some(u)) => Some(u as f64),
            _ if radix_digits.is_none() => clean.parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        };

        // Integral floats such as `1e3` also count as integers.
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss,
            reason = "range checked before the cast"
        )]
        let (int, uint) = match float {
            Some(f) if f.fract() == 0.0 => (
                int.or_else(|| (f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)),
                uint.or_else(|| (f >= 0.0 && f < u64::MAX as f64).then_some(f as u64)),
            ),
            _ => (int, uint),
        };

        if int.is_none() && uint.is_none() && float.is_none() {
            return None;
        }
        Some(Number {
            text: text.to_string(),
            int,
            uint,
            float,
        })
    }

    /// Literal written in floating point syntax (`1.5`, `2e3`).
    pub fn is_float_syntax(&self) -> bool {
        let hex = self.text.starts_with("0x") || self.text.starts_with("0X");
        !hex && self.text.contains(['.', 'e', 'E'])
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExprNode {
    pub op: BinaryOp,
    pub lhs: CommandNode,
    pub rhs: CommandNode,
}

macro_rules! impl_spanned {
    ($($ty:ty),* $(,)?) => {
        $(impl Spanned for $ty {
            fn span(&self) -> Span {
                self.span
            }
        })*
    };
}

impl_spanned!(
    TextNode,
    ActionNode,
    BranchNode,
    TemplateNode,
    ListNode,
    WrapNode,
    BlockNode,
    VarDecl,
    PipeNode,
    CommandNode,
    Operand,
);

// Display: template-like rendering used as error context

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(n) => f.write_str(&n.text),
            Node::Action(n) => write!(f, "{{{{{}}}}}", n.pipe),
            Node::If(n) => fmt_branch(f, "if", n),
            Node::With(n) => fmt_branch(f, "with", n),
            Node::Range(n) => fmt_branch(f, "range", n),
            Node::Template(n) => write!(f, "{n}"),
            Node::List(n) => write!(f, "{n}"),
            Node::Wrap(n) => {
                f.write_str("{{wrap")?;
                if let Some(pipe) = &n.pipe {
                    write!(f, " {pipe}")?;
                }
                write!(f, "}}}}{}", n.list)?;
                for (word, list) in [
                    ("begin", &n.begin_list),
                    ("after", &n.after_list),
                    ("else", &n.else_list),
                ] {
                    if let Some(list) = list {
                        write!(f, "{{{{{word}}}}}{list}")?;
                    }
                }
                f.write_str("{{end}}")
            }
            Node::Arg(n) => write!(f, "{{{{arg {}}}}}{}{{{{end}}}}", n.pipe, n.list),
            Node::Callback(n) => write!(f, "{{{{callback {}}}}}{}{{{{end}}}}", n.pipe, n.list),
        }
    }
}

fn fmt_branch(f: &mut fmt::Formatter<'_>, word: &str, n: &BranchNode) -> fmt::Result {
    write!(f, "{{{{{word} {}}}}}{}", n.pipe, n.list)?;
    if let Some(else_list) = &n.else_list {
        write!(f, "{{{{else}}}}{else_list}")?;
    }
    f.write_str("{{end}}")
}

impl fmt::Display for ListNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.nodes.iter().try_for_each(|n| write!(f, "{n}"))
    }
}

impl fmt::Display for TemplateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pipe {
            Some(pipe) => write!(f, "{{{{template {:?} {pipe}}}}}", self.name),
            None => write!(f, "{{{{template {:?}}}}}", self.name),
        }
    }
}

impl fmt::Display for VarDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amp = if self.ptr { "&" } else { "" };
        match self.assign {
            Assign::Declare => write!(f, "{} := {amp}", self.name),
            Assign::Update => write!(f, "{} = {amp}", self.name),
            Assign::Compound(op) => write!(f, "{} {op}= ", self.name),
        }
    }
}

impl fmt::Display for PipeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(last) = self.decl.last() {
            let names: Vec<&str> = self.decl.iter().map(|d| d.name.as_str()).collect();
            f.write_str(&names.join(", "))?;
            let rendered = last.to_string();
            f.write_str(rendered.strip_prefix(&last.name).unwrap_or(&rendered))?;
        }
        for (i, cmd) in self.cmds.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{cmd}")?;
        }
        Ok(())
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            if let OperandKind::Pipe(pipe) = &arg.kind {
                write!(f, "({pipe})")?;
            } else {
                write!(f, "{arg}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OperandKind::Field { path, optional } => {
                for name in path {
                    write!(f, ".{name}")?;
                }
                if *optional {
                    f.write_str("?")?;
                }
                Ok(())
            }
            OperandKind::Chain { base, path } => {
                match &base.kind {
                    OperandKind::Pipe(pipe) => write!(f, "({pipe})")?,
                    _ => write!(f, "{base}")?,
                }
                path.iter().try_for_each(|name| write!(f, ".{name}"))
            }
            OperandKind::Identifier(name) => f.write_str(name),
            OperandKind::Variable { name, path } => {
                f.write_str(name)?;
                path.iter().try_for_each(|p| write!(f, ".{p}"))
            }
            OperandKind::Dot => f.write_str("."),
            OperandKind::Nil => f.write_str("nil"),
            OperandKind::Bool(b) => write!(f, "{b}"),
            OperandKind::Number(n) => f.write_str(&n.text),
            OperandKind::String(s) => write!(f, "{s:?}"),
            OperandKind::Pipe(pipe) => write!(f, "{pipe}"),
            OperandKind::Expr(expr) => write!(f, "({} {} {})", expr.lhs, expr.op, expr.rhs),
        }
    }
}

/// Whether a list renders nothing but whitespace.
///
/// A body that is empty in this sense never replaces an existing template
/// of the same name.
pub fn is_empty_tree(list: &ListNode) -> bool {
    list.nodes.iter().all(|node| match node {
        Node::Text(text) => text.text.trim().is_empty(),
        Node::List(inner) => is_empty_tree(inner),
        _ => false,
    })
}
