//! Tree-walking interpreter.
//!
//! A [`State`] is one render: it owns the variable stack, the output stack
//! and the per-render caches, and borrows everything else (executor,
//! templates, trees) for the duration of the render. Nothing in here is
//! shared between renders.
//!
//! # Module layout
//!
//! - `pipeline`: pipelines, commands, operands, field access, calls
//! - `call`: `{{template}}` calls and nested renders (`yield`, `exec`)
//! - `range`: `{{range}}` over every iterable kind
//! - `blocks`: `{{wrap}}`, `{{arg}}` and `{{callback}}`
//! - `output`: the output stack those blocks push onto
//!
//! # Errors
//!
//! The first node boundary an error crosses pins it to that node (see
//! [`State::locate`]); template calls add a backtrace frame on the way out.

mod blocks;
mod call;
mod output;
mod pipeline;
mod range;

use std::fmt;
use std::io;

use rustc_hash::FxHashMap;
use stencil_ir::{BranchNode, ListNode, Node, PipeNode, Span, Spanned, Tree};
use stencil_value::{
    not_printable, not_testable, undefined_variable, write_failed, BlockHandle, Context,
    ContextFactory, ErrorSite, EvalError, EvalResult, FuncError, FuncScope, FuncValue, Function,
    Interp, Key, LocalData, Value,
};

use crate::builtins;
use crate::errors::StateLocation;
use crate::executor::Executor;
use crate::options::MissingKey;
use crate::stack::ensure_sufficient_stack;
use crate::template::Template;

use blocks::Block;
use output::Output;

/// Name of the `$` variable.
const DOLLAR: &str = "$";

/// A running render.
pub(crate) struct State<'a> {
    exec: &'a Executor,
    /// Template whose nodes are being walked.
    tmpl: &'a Template,
    out: Output<'a>,
    vars: Vec<(String, Value)>,
    globals: &'a [(String, Value)],
    depth: usize,
    data: Value,
    missing_key: MissingKey,
    context: Context,
    /// Context-bound functions already built for this render, by factory.
    /// The factory is held alongside so its id cannot be reused mid-render.
    resolved: FxHashMap<usize, (ContextFactory, Function)>,
    /// Functions of the templates on the call stack, innermost last.
    overrides: Vec<&'a FuncScope>,
    blocks: Vec<Block<'a>>,
    /// Node being evaluated, for error sites.
    at: Option<(Span, &'a dyn fmt::Display)>,
}

impl<'a> State<'a> {
    pub fn new(exec: &'a Executor, w: &'a mut dyn io::Write, data: Value) -> Self {
        let options = exec.options();
        let context = Context::new(exec.funcs().clone(), data.clone()).with_host(options.context.clone());
        let tmpl: &'a Template = exec.template();
        // The entry template's functions reach the templates it calls.
        let overrides = if tmpl.funcs().is_empty() { Vec::new() } else { vec![tmpl.funcs()] };
        State {
            exec,
            tmpl,
            out: Output::new(w),
            vars: vec![(DOLLAR.to_string(), data.clone())],
            globals: &options.globals,
            depth: exec.depth(),
            missing_key: options.missing_key.unwrap_or(exec.set().missing_key()),
            data,
            context,
            resolved: FxHashMap::default(),
            overrides,
            blocks: Vec::new(),
            at: None,
        }
    }

    /// Walk the executor's template.
    pub fn walk_root(&mut self, tree: &'a Tree) -> Result<(), EvalError> {
        tracing::debug!(template = %self.tmpl.name(), depth = self.depth, "render start");
        let dot = self.data.clone();
        let result = self.walk_list(&dot, &tree.root);
        tracing::debug!(template = %self.tmpl.name(), ok = result.is_ok(), "render finish");
        result
    }

    // Variables

    fn mark(&self) -> usize {
        self.vars.len()
    }

    fn pop(&mut self, mark: usize) {
        self.vars.truncate(mark);
    }

    fn push_var(&mut self, name: &str, value: Value) {
        self.vars.push((name.to_string(), value));
    }

    /// Overwrite the `n`th variable from the top of the stack.
    fn set_top_var(&mut self, n: usize, value: Value) {
        if let Some(index) = self.vars.len().checked_sub(n) {
            self.vars[index].1 = value;
        }
    }

    fn var_slot(&mut self, name: &str) -> Result<&mut Value, EvalError> {
        self.vars
            .iter_mut()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| undefined_variable(name))
    }

    fn var_value(&self, name: &str) -> Result<Value, EvalError> {
        self.vars
            .iter()
            .rev()
            .chain(self.globals.iter().rev())
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| undefined_variable(name))
    }

    /// Run `f` and drop every variable it declared.
    fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R, EvalError>) -> Result<R, EvalError> {
        let mark = self.mark();
        let result = f(self);
        self.pop(mark);
        result
    }

    // Errors

    fn at(&mut self, span: Span, node: &'a dyn fmt::Display) {
        self.at = Some((span, node));
    }

    /// Pin `err` to the node being evaluated unless it already has a site.
    pub fn locate(&self, err: EvalError) -> EvalError {
        if err.site.is_some() || err.is_signal() {
            return err;
        }
        let (location, context) = match (self.at, self.tmpl.tree()) {
            (Some((span, node)), Some(tree)) => tree.error_context(span, node),
            _ => (String::new(), String::new()),
        };
        let site = ErrorSite {
            template: self.tmpl.name().to_string(),
            location,
            context,
            path: self.exec.full_path().to_string(),
        };
        let err = err.with_site(site);
        match (err.span, self.at) {
            (None, Some((span, _))) => err.with_span(span),
            _ => err,
        }
    }

    /// Where this render currently is, as a step of a template path.
    fn location(&self) -> StateLocation {
        let (location, context) = match (self.at, self.tmpl.tree()) {
            (Some((span, node)), Some(tree)) => {
                let (location, context) = tree.error_context(span, node);
                let prefix = format!("{}:", tree.parse_name);
                let location = location.strip_prefix(&prefix).map_or(location.clone(), str::to_string);
                (location, context)
            }
            _ => (String::new(), String::new()),
        };
        StateLocation {
            template_name: self.tmpl.name().to_string(),
            template_path: self.tmpl.source_name().to_string(),
            location,
            context,
        }
    }

    // Functions

    /// Resolution order: per-render state functions, the current
    /// template's functions, those of the templates on the call stack, the
    /// executor chain, and last the data value's own methods and function
    /// fields.
    fn lookup_func(&self, name: &str) -> Option<FuncValue> {
        if let Some(f) = builtins::state_funcs().get(name) {
            return Some(f.clone());
        }
        if let Some(f) = self.tmpl.funcs().get(name) {
            return Some(f.clone());
        }
        if let Some(f) = self.overrides.iter().rev().find_map(|scope| scope.get(name)) {
            return Some(f.clone());
        }
        self.exec.find_func(name).or_else(|| self.data_func(name))
    }

    fn data_func(&self, name: &str) -> Option<FuncValue> {
        let data = self.data.indirect();
        match data {
            Value::Object(obj) => {
                if let Some(getter) = obj.attr_getter() {
                    return getter.get_attr(name).and_then(|v| v.as_func().cloned());
                }
                if let Some(method) = obj.method(name) {
                    return Some(FuncValue::Direct(method));
                }
                obj.field(name).and_then(|v| v.as_func().cloned())
            }
            Value::Record(record) => match record.get_method(name) {
                Some(method) => Some(FuncValue::Direct(method.bind(data.clone()))),
                None => record.get(name).and_then(Value::as_func).cloned(),
            },
            Value::Map(map) => map.get(&Key::from(name)).and_then(Value::as_func).cloned(),
            _ => None,
        }
    }

    /// Callable for `value`, building context-bound functions once per
    /// render.
    fn resolve(&mut self, value: &FuncValue) -> Result<Function, EvalError> {
        let FuncValue::ContextBound(factory) = value else {
            return value.resolve(&self.context);
        };
        if let Some((_, f)) = self.resolved.get(&factory.id()) {
            return Ok(f.clone());
        }
        let f = factory.build(&self.context)?;
        self.resolved.insert(factory.id(), (factory.clone(), f.clone()));
        Ok(f)
    }

    // Output

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EvalError> {
        let top = self.out.top();
        self.write_level(top, bytes)
    }

    fn write_level(&mut self, level: usize, bytes: &[u8]) -> Result<(), EvalError> {
        match self.out.write_at(level, bytes).map_err(write_failed)? {
            None => Ok(()),
            Some(trigger) => self.fire_wrap(trigger),
        }
    }

    /// Print the result of an action. Function values are called first.
    fn print_value(&mut self, pipe: &PipeNode, value: Value) -> Result<(), EvalError> {
        let value = match value {
            Value::Func(f) => {
                let f = self.resolve(&f)?;
                self.call_function(&f, "anonymous function", &[])?
            }
            value => value,
        };
        if matches!(value.indirect(), Value::Chan(_) | Value::Block(_) | Value::Func(_)) {
            return Err(not_printable(&pipe.to_string(), &value));
        }
        self.write_bytes(value.to_string().as_bytes())
    }

    // Walk

    fn walk_list(&mut self, dot: &Value, list: &'a ListNode) -> Result<(), EvalError> {
        list.nodes.iter().try_for_each(|node| self.walk(dot, node))
    }

    fn walk(&mut self, dot: &Value, node: &'a Node) -> Result<(), EvalError> {
        self.at(node.span(), node);
        ensure_sufficient_stack(|| self.walk_node(dot, node)).map_err(|err| self.locate(err))
    }

    fn walk_node(&mut self, dot: &Value, node: &'a Node) -> Result<(), EvalError> {
        match node {
            Node::Text(text) => self.write_bytes(text.text.as_bytes()),
            Node::Action(action) => {
                // Declared variables stay visible to the rest of the list.
                let value = self.eval_pipeline(dot, &action.pipe)?;
                if action.pipe.decl.is_empty() {
                    self.print_value(&action.pipe, value)?;
                }
                Ok(())
            }
            Node::If(branch) => self.walk_if_or_with(false, dot, branch),
            Node::With(branch) => self.walk_if_or_with(true, dot, branch),
            Node::Range(branch) => self.walk_range(dot, branch),
            Node::Template(call) => self.walk_template(dot, call),
            Node::List(list) => self.walk_list(dot, list),
            Node::Wrap(wrap) => self.walk_wrap(dot, wrap),
            Node::Arg(block) => self.walk_arg(dot, block),
            Node::Callback(block) => self.walk_callback(dot, block),
        }
    }

    fn walk_if_or_with(&mut self, with: bool, dot: &Value, branch: &'a BranchNode) -> Result<(), EvalError> {
        self.scoped(|s| {
            let value = s.eval_pipeline(dot, &branch.pipe)?;
            let truth = value.truth().ok_or_else(|| not_testable(&value))?;
            if truth {
                if with {
                    s.walk_list(&value, &branch.list)
                } else {
                    s.walk_list(dot, &branch.list)
                }
            } else if let Some(else_list) = &branch.else_list {
                s.walk_list(dot, else_list)
            } else {
                Ok(())
            }
        })
    }
}

impl Interp for State<'_> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), EvalError> {
        self.write_bytes(bytes)
    }

    fn data(&self) -> &Value {
        &self.data
    }

    fn variable(&self, name: &str) -> Option<Value> {
        self.var_value(name).ok()
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn template_name(&self) -> &str {
        self.tmpl.name()
    }

    fn context(&self) -> &Context {
        &self.context
    }

    fn find_func(&self, name: &str) -> Option<FuncValue> {
        self.lookup_func(name)
    }

    fn filter_funcs(&self, names: &[&str]) -> Result<FuncScope, FuncError> {
        self.exec.filter_funcs(names)
    }

    fn local(&self) -> &LocalData {
        self.exec.local()
    }

    fn call_value(&mut self, f: &Value, args: &[Value]) -> EvalResult {
        self.call_dynamic(f, args)
    }

    fn invoke_block(
        &mut self,
        handle: BlockHandle,
        dot: Value,
        args: &[Value],
        out: Option<&mut dyn io::Write>,
    ) -> Result<(), EvalError> {
        self.run_block(handle, dot, args, out)
    }

    fn render_template(&mut self, name: &str, data: Option<Value>) -> Result<String, EvalError> {
        let mut out = Vec::new();
        self.render_nested(name, data.unwrap_or_default(), &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    fn yield_template(&mut self, name: &str, data: Option<Value>) -> Result<(), EvalError> {
        let mut out = Vec::new();
        self.render_nested(name, data.unwrap_or_default(), &mut out)?;
        self.write_bytes(&out)
    }
}
