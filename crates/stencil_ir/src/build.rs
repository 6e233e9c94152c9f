//! Constructors for building trees by hand.
//!
//! All nodes get [`Span::DUMMY`]; use [`PipeNode`] methods to attach
//! declarations. Path helpers take the written form (`".A.B"`, `"$x.A"`).

use crate::{
    ActionNode, Assign, BinaryOp, BlockNode, BranchNode, CommandNode, ExprNode, ListNode, Node,
    Number, Operand, OperandKind, PipeNode, Span, TemplateNode, TextNode, VarDecl, WrapNode,
};

fn operand(kind: OperandKind) -> Operand {
    Operand {
        span: Span::DUMMY,
        kind,
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn text(text: impl Into<String>) -> Node {
    Node::Text(TextNode {
        span: Span::DUMMY,
        text: text.into(),
    })
}

pub fn action(pipe: PipeNode) -> Node {
    Node::Action(ActionNode {
        span: Span::DUMMY,
        pipe,
    })
}

pub fn list(nodes: impl IntoIterator<Item = Node>) -> ListNode {
    ListNode {
        span: Span::DUMMY,
        nodes: nodes.into_iter().collect(),
    }
}

fn branch(pipe: PipeNode, body: ListNode, else_list: Option<ListNode>) -> BranchNode {
    BranchNode {
        span: Span::DUMMY,
        pipe,
        list: body,
        else_list,
    }
}

pub fn if_node(pipe: PipeNode, body: ListNode, else_list: Option<ListNode>) -> Node {
    Node::If(branch(pipe, body, else_list))
}

pub fn with_node(pipe: PipeNode, body: ListNode, else_list: Option<ListNode>) -> Node {
    Node::With(branch(pipe, body, else_list))
}

pub fn range_node(pipe: PipeNode, body: ListNode, else_list: Option<ListNode>) -> Node {
    Node::Range(branch(pipe, body, else_list))
}

pub fn template_node(name: impl Into<String>, pipe: Option<PipeNode>) -> Node {
    Node::Template(TemplateNode {
        span: Span::DUMMY,
        name: name.into(),
        pipe,
    })
}

/// `{{wrap}}` with only a body; fill the other lists through the struct fields.
pub fn wrap(pipe: Option<PipeNode>, body: ListNode) -> WrapNode {
    WrapNode {
        span: Span::DUMMY,
        pipe,
        list: body,
        begin_list: None,
        after_list: None,
        else_list: None,
    }
}

pub fn arg_node(pipe: PipeNode, body: ListNode) -> Node {
    Node::Arg(BlockNode {
        span: Span::DUMMY,
        pipe,
        list: body,
    })
}

pub fn callback_node(pipe: PipeNode, body: ListNode) -> Node {
    Node::Callback(BlockNode {
        span: Span::DUMMY,
        pipe,
        list: body,
    })
}

pub fn pipe(cmds: impl IntoIterator<Item = CommandNode>) -> PipeNode {
    PipeNode {
        span: Span::DUMMY,
        decl: Vec::new(),
        cmds: cmds.into_iter().collect(),
        trim_right: false,
    }
}

pub fn cmd(args: impl IntoIterator<Item = Operand>) -> CommandNode {
    CommandNode {
        span: Span::DUMMY,
        args: args.into_iter().collect(),
    }
}

/// `".A.B"`; a trailing `?` marks the field optional.
pub fn field(path: &str) -> Operand {
    let (path, optional) = match path.strip_suffix('?') {
        Some(p) => (p, true),
        None => (path, false),
    };
    operand(OperandKind::Field {
        path: split_path(path),
        optional,
    })
}

/// `"$x"` or `"$x.A.B"`.
pub fn var(path: &str) -> Operand {
    let mut parts = path.split('.');
    let name = parts.next().unwrap_or("$").to_string();
    operand(OperandKind::Variable {
        name,
        path: parts.filter(|s| !s.is_empty()).map(str::to_string).collect(),
    })
}

pub fn ident(name: impl Into<String>) -> Operand {
    operand(OperandKind::Identifier(name.into()))
}

pub fn dot() -> Operand {
    operand(OperandKind::Dot)
}

pub fn nil() -> Operand {
    operand(OperandKind::Nil)
}

pub fn boolean(b: bool) -> Operand {
    operand(OperandKind::Bool(b))
}

/// Numeric literal; text that is not a number becomes an identifier.
pub fn number(text: &str) -> Operand {
    match Number::parse(text) {
        Some(n) => operand(OperandKind::Number(n)),
        None => ident(text),
    }
}

pub fn string(s: impl Into<String>) -> Operand {
    operand(OperandKind::String(s.into()))
}

pub fn sub_pipe(pipe: PipeNode) -> Operand {
    operand(OperandKind::Pipe(Box::new(pipe)))
}

/// `(base).A.B`
pub fn chain(base: Operand, path: &str) -> Operand {
    operand(OperandKind::Chain {
        base: Box::new(base),
        path: split_path(path),
    })
}

pub fn expr(op: BinaryOp, lhs: CommandNode, rhs: CommandNode) -> Operand {
    operand(OperandKind::Expr(Box::new(ExprNode { op, lhs, rhs })))
}

impl PipeNode {
    fn push_decl(mut self, name: &str, assign: Assign, ptr: bool) -> Self {
        self.decl.push(VarDecl {
            span: Span::DUMMY,
            name: name.to_string(),
            assign,
            ptr,
        });
        self
    }

    /// `$x := pipeline`
    #[must_use]
    pub fn declare(self, name: &str) -> Self {
        self.push_decl(name, Assign::Declare, false)
    }

    /// `$x = pipeline`
    #[must_use]
    pub fn assign(self, name: &str) -> Self {
        self.push_decl(name, Assign::Update, false)
    }

    /// `$x op= pipeline`
    #[must_use]
    pub fn compound(self, name: &str, op: BinaryOp) -> Self {
        self.push_decl(name, Assign::Compound(op), false)
    }

    /// `range $s := &pipeline`
    #[must_use]
    pub fn declare_state(self, name: &str) -> Self {
        self.push_decl(name, Assign::Declare, true)
    }

    #[must_use]
    pub fn trimmed(mut self) -> Self {
        self.trim_right = true;
        self
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;

    #[test]
    fn rendered_forms() {
        let p = pipe([cmd([ident("printf"), string("%d"), field(".A.B")]), cmd([ident("html")])])
            .declare("$x");
        assert_eq!(p.to_string(), "$x := printf \"%d\" .A.B | html");

        let v = var("$x.Name");
        assert_eq!(v.to_string(), "$x.Name");

        let c = chain(sub_pipe(pipe([cmd([ident("f")])])), ".A");
        assert_eq!(c.to_string(), "(f).A");

        let e = expr(BinaryOp::Add, cmd([field(".A")]), cmd([number("1")]));
        assert_eq!(e.to_string(), "(.A + 1)");

        let b = if_node(pipe([cmd([field(".Ok")])]), list([text("y")]), Some(list([text("n")])));
        assert_eq!(b.to_string(), "{{if .Ok}}y{{else}}n{{end}}");
    }

    #[test]
    fn compound_declaration_renders_operator() {
        let p = pipe([cmd([number("2")])]).compound("$n", BinaryOp::Mul);
        assert_eq!(p.to_string(), "$n *= 2");
    }

    #[test]
    fn numbers_keep_every_exact_view() {
        let n = Number::parse("42").unwrap();
        assert_eq!((n.int, n.uint, n.float), (Some(42), Some(42), Some(42.0)));

        let n = Number::parse("-7").unwrap();
        assert_eq!((n.int, n.uint), (Some(-7), None));

        let n = Number::parse("0x10").unwrap();
        assert_eq!(n.int, Some(16));

        let n = Number::parse("1.5").unwrap();
        assert_eq!((n.int, n.float), (None, Some(1.5)));
        assert!(n.is_float_syntax());

        let n = Number::parse("18446744073709551615").unwrap();
        assert_eq!((n.int, n.uint), (None, Some(u64::MAX)));

        assert!(Number::parse("abc").is_none());
    }

    #[test]
    fn strip_marker_on_wrap() {
        let w = wrap(Some(pipe([cmd([ident("strip")])])), list([]));
        assert!(w.strip());
        let w = wrap(None, list([]));
        assert!(!w.strip());
        let w = wrap(Some(pipe([]).trimmed()), list([]));
        assert!(w.strip());
    }
}
