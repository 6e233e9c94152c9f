//! Pipelines, commands and operands.

use smallvec::SmallVec;
use stencil_ir::{Assign, CommandNode, Number, Operand, OperandKind, PipeNode, VarDecl};
use stencil_value::{
    call_failed, field_has_arguments, int_overflow, missing_key, nil_data, nil_pointer,
    no_such_field, not_a_function, undefined_function, EvalError, EvalResult, Function, Key,
    Value,
};

use super::State;
use crate::operators;
use crate::options::MissingKey;

/// Identifier bound to the render's data.
const GLOBALS: &str = "GLOBALS";
/// Identifier bound to `$`.
const SELF: &str = "SELF";

/// An argument that is either still a node or already a value.
#[derive(Clone)]
pub(super) enum Arg<'a> {
    Node(&'a Operand),
    Value(Value),
}

pub(super) type Args<'a> = SmallVec<[Arg<'a>; 4]>;

impl<'a> State<'a> {
    pub(super) fn eval_pipeline(&mut self, dot: &Value, pipe: &'a PipeNode) -> EvalResult {
        self.at(pipe.span, pipe);
        let mut value = Value::Invalid;
        for cmd in &pipe.cmds {
            value = self.eval_command(dot, cmd, value)?;
        }
        self.bind_decls(&pipe.decl, &value)?;
        Ok(value)
    }

    pub(super) fn bind_decls(&mut self, decls: &[VarDecl], value: &Value) -> Result<(), EvalError> {
        for decl in decls {
            match decl.assign {
                Assign::Declare => self.push_var(&decl.name, value.clone()),
                Assign::Update => *self.var_slot(&decl.name)? = value.clone(),
                Assign::Compound(op) => {
                    let slot = self.var_slot(&decl.name)?;
                    *slot = operators::evaluate(op, slot, value)?;
                }
            }
        }
        Ok(())
    }

    /// Run the commands of `cmds` as a pipeline, without declarations.
    pub(super) fn eval_commands(&mut self, dot: &Value, cmds: &'a [CommandNode]) -> EvalResult {
        let mut value = Value::Invalid;
        for cmd in cmds {
            value = self.eval_command(dot, cmd, value)?;
        }
        Ok(value)
    }

    /// Evaluate `cmd`; `last` is the previous command's result, passed as
    /// the final argument when valid.
    pub(super) fn eval_command(&mut self, dot: &Value, cmd: &'a CommandNode, last: Value) -> EvalResult {
        let args: Args<'a> = cmd.args.iter().skip(1).map(Arg::Node).collect();
        self.eval_command_with(dot, cmd, &args, last)
    }

    /// Evaluate the command word of `cmd` with `args` in place of its own
    /// arguments.
    pub(super) fn eval_command_with(
        &mut self,
        dot: &Value,
        cmd: &'a CommandNode,
        args: &[Arg<'a>],
        last: Value,
    ) -> EvalResult {
        let Some(word) = cmd.args.first() else {
            return Err(EvalError::new("empty command"));
        };
        self.eval_operand(dot, word, args, last)
    }

    fn eval_operand(&mut self, dot: &Value, op: &'a Operand, args: &[Arg<'a>], last: Value) -> EvalResult {
        self.at(op.span, op);
        match &op.kind {
            OperandKind::Field { path, optional } => {
                self.eval_field_chain(dot, dot.clone(), path, *optional, args, last)
            }
            OperandKind::Chain { base, path } => {
                let receiver = self.eval_arg(dot, &Arg::Node(base))?;
                self.at(op.span, op);
                self.eval_field_chain(dot, receiver, path, false, args, last)
            }
            OperandKind::Identifier(name) => match name.as_str() {
                GLOBALS => Ok(self.data.clone()),
                SELF => self.var_value(super::DOLLAR),
                _ => self.eval_function(dot, name, args, last),
            },
            OperandKind::Variable { name, path } => {
                let value = self.var_value(name)?;
                if path.is_empty() {
                    self.check_no_args(op, args, &last)?;
                    Ok(value)
                } else {
                    self.eval_field_chain(dot, value, path, false, args, last)
                }
            }
            // Arguments of a parenthesized pipeline are inside it.
            OperandKind::Pipe(pipe) => self.eval_pipeline(dot, pipe),
            OperandKind::Expr(expr) => {
                let lhs = self.eval_command(dot, &expr.lhs, last.clone())?;
                let rhs = self.eval_command(dot, &expr.rhs, last)?;
                self.at(op.span, op);
                operators::evaluate(expr.op, &lhs, &rhs)
            }
            OperandKind::Dot => {
                self.check_no_args(op, args, &last)?;
                Ok(dot.clone())
            }
            OperandKind::Nil => {
                self.check_no_args(op, args, &last)?;
                Ok(Value::Invalid)
            }
            OperandKind::Bool(b) => {
                self.check_no_args(op, args, &last)?;
                Ok(Value::Bool(*b))
            }
            OperandKind::Number(n) => {
                self.check_no_args(op, args, &last)?;
                ideal_number(n)
            }
            OperandKind::String(s) => {
                self.check_no_args(op, args, &last)?;
                Ok(Value::string(s.as_str()))
            }
        }
    }

    fn check_no_args(&self, op: &Operand, args: &[Arg<'a>], last: &Value) -> Result<(), EvalError> {
        if args.is_empty() && last.is_invalid() {
            Ok(())
        } else {
            Err(not_a_function(&op.to_string()))
        }
    }

    /// Value of an argument position.
    pub(super) fn eval_arg(&mut self, dot: &Value, arg: &Arg<'a>) -> EvalResult {
        let op = match arg {
            Arg::Value(v) => return Ok(v.clone()),
            Arg::Node(op) => *op,
        };
        match &op.kind {
            // An explicit nil argument is a nil value, not an absent one.
            OperandKind::Nil => Ok(Value::None),
            _ => self.eval_operand(dot, op, &[], Value::Invalid),
        }
    }

    // Fields

    fn eval_field_chain(
        &mut self,
        dot: &Value,
        receiver: Value,
        path: &[String],
        optional: bool,
        args: &[Arg<'a>],
        last: Value,
    ) -> EvalResult {
        let Some((name, init)) = path.split_last() else {
            return Ok(receiver);
        };
        let mut receiver = receiver;
        for step in init {
            receiver = self.eval_field(dot, step, optional, &[], Value::Invalid, &receiver)?;
        }
        // Only the last step receives the arguments.
        self.eval_field(dot, name, optional, args, last, &receiver)
    }

    fn eval_field(
        &mut self,
        dot: &Value,
        name: &str,
        optional: bool,
        args: &[Arg<'a>],
        last: Value,
        receiver: &Value,
    ) -> EvalResult {
        if receiver.is_invalid() {
            if self.missing_key == MissingKey::Error {
                return Err(nil_data(name));
            }
            return Ok(Value::Invalid);
        }

        // An attribute getter answers alone.
        if let Value::Object(obj) = receiver.indirect() {
            if let Some(getter) = obj.attr_getter() {
                return match getter.get_attr(name) {
                    Some(Value::Func(f)) => {
                        let f = self.resolve(&f)?;
                        self.eval_call(dot, &f, name, args, last)
                    }
                    Some(value) => Ok(value),
                    None => Ok(Value::Invalid),
                };
            }
        }

        let target = receiver.indirect();
        let method = match target {
            Value::Record(record) => record.get_method(name).map(|m| m.bind(target.clone())),
            Value::Object(obj) => obj.method(name),
            _ => None,
        };
        if let Some(method) = method {
            return self.eval_call(dot, &method, name, args, last);
        }

        let has_args = !args.is_empty() || !last.is_invalid();
        let field = match target {
            Value::Record(record) => Some(record.get(name).cloned()),
            Value::Object(obj) => Some(obj.field(name)),
            Value::Presence(p) => Some(match name {
                "Val" => Some(p.value.clone()),
                "Ok" => Some(Value::Bool(p.ok)),
                _ => None,
            }),
            Value::Map(map) => {
                return match map.get(&Key::from(name)) {
                    Some(value) => Ok(value.clone()),
                    None => self.missing_map_key(target, map.values().next(), name, optional),
                };
            }
            Value::None => return Err(nil_pointer(name)),
            _ => None,
        };
        match field {
            Some(Some(_)) if has_args => Err(field_has_arguments(name)),
            Some(Some(value)) => Ok(value),
            Some(None) => self
                .missing_field(target, name, optional)
                .ok_or_else(|| no_such_field(name, &target.type_name())),
            None => Err(no_such_field(name, &target.type_name())),
        }
    }

    /// Stand-in for a field a record or object lacks: `""` for optional
    /// fields, then whatever the missing-field hook returns.
    fn missing_field(&self, receiver: &Value, name: &str, optional: bool) -> Option<Value> {
        let options = self.exec.options();
        if optional && !options.require_fields {
            return Some(Value::string(""));
        }
        options.on_missing_field.as_ref().and_then(|hook| hook(receiver, name))
    }

    fn missing_map_key(
        &self,
        map: &Value,
        sample: Option<&Value>,
        name: &str,
        optional: bool,
    ) -> EvalResult {
        match self.missing_key {
            MissingKey::Invalid => Ok(self.missing_field(map, name, optional).unwrap_or_default()),
            MissingKey::Zero => Ok(sample.map_or(Value::None, Value::zero_like)),
            MissingKey::Error => Err(missing_key(name)),
        }
    }

    // Calls

    fn eval_function(&mut self, dot: &Value, name: &str, args: &[Arg<'a>], last: Value) -> EvalResult {
        let f = self.lookup_func(name).ok_or_else(|| undefined_function(name))?;
        let f = self.resolve(&f)?;
        self.eval_call(dot, &f, name, args, last)
    }

    /// Check the arity, then evaluate the arguments and call. The callable
    /// never runs with a wrong argument count.
    fn eval_call(&mut self, dot: &Value, f: &Function, name: &str, args: &[Arg<'a>], last: Value) -> EvalResult {
        let got = args.len() + usize::from(!last.is_invalid());
        f.check_arity(name, got)?;
        let mut argv: SmallVec<[Value; 4]> = SmallVec::with_capacity(got);
        for arg in args {
            argv.push(self.eval_arg(dot, arg)?);
        }
        if !last.is_invalid() {
            argv.push(last);
        }
        self.call_function(f, name, &argv)
    }

    /// Call `f` with evaluated arguments. Plain failures of the callable
    /// are wrapped with its name.
    pub(super) fn call_function(&mut self, f: &Function, name: &str, args: &[Value]) -> EvalResult {
        f.check_arity(name, args.len())?;
        tracing::trace!(function = name, args = args.len(), "call");
        let at = self.at;
        let result = f.call(self, args);
        self.at = at;
        match result {
            Ok(outcome) => Ok(outcome.into_value()),
            Err(err) if err.is_wrappable() => Err(call_failed(name, &err)),
            Err(err) => Err(err),
        }
    }

    /// `call`-style invocation of a function value.
    pub(super) fn call_dynamic(&mut self, f: &Value, args: &[Value]) -> EvalResult {
        let func = match f.indirect() {
            Value::Func(func) => self.resolve(func)?,
            Value::Invalid | Value::None => return Err(EvalError::new("call of nil")),
            other => {
                return Err(EvalError::new(format!(
                    "non-function of type {}",
                    other.type_name()
                )))
            }
        };
        let arity = func.arity();
        if !arity.accepts(args.len()) {
            let bound = if arity.variadic { "at least " } else { "" };
            return Err(EvalError::new(format!(
                "wrong number of args: got {} want {bound}{}",
                args.len(),
                arity.fixed
            )));
        }
        Ok(func.call(self, args)?.into_value())
    }
}

/// Value of a numeric literal whose type the context doesn't fix: floats
/// by syntax, otherwise `int`.
fn ideal_number(n: &Number) -> EvalResult {
    if n.is_float_syntax() {
        if let Some(f) = n.float {
            return Ok(Value::Float(f));
        }
    }
    match (n.int, n.uint, n.float) {
        (Some(i), _, _) => Ok(Value::Int(i)),
        (None, Some(_), _) => Err(int_overflow(&n.text)),
        (None, None, Some(f)) => Ok(Value::Float(f)),
        (None, None, None) => Err(EvalError::new(format!("illegal number syntax: {}", n.text))),
    }
}
