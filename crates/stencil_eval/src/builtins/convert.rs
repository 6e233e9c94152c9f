//! Printing, number conversion and the arithmetic builtins.

use stencil_ir::BinaryOp;
use stencil_value::{sprint, sprintln, EvalError, Function, Value};

use super::printf::sprintf;
use super::str_arg;
use crate::operators;

pub(super) fn print() -> Function {
    Function::variadic(0, |args| Ok(Value::string(sprint(args))))
}

pub(super) fn println() -> Function {
    Function::variadic(0, |args| Ok(Value::string(sprintln(args))))
}

pub(super) fn printf() -> Function {
    Function::variadic(1, |args| {
        let format = str_arg("printf", args, 0)?;
        Ok(Value::string(sprintf(format, &args[1..])))
    })
}

fn cannot_convert(value: &Value, to: &str) -> EvalError {
    EvalError::new(format!("can't convert {:?} to {to}", value.type_name()))
}

pub(super) fn to_i() -> Function {
    Function::fixed(1, |args| {
        let value = args[0].indirect();
        let n = match value {
            Value::Int(n) => *n,
            Value::Uint(n) => i64::try_from(*n).map_err(|_| cannot_convert(value, "int64"))?,
            Value::Bool(b) => i64::from(*b),
            Value::Str(s) => s
                .parse::<i64>()
                .map_err(|err| EvalError::new(format!("parsing {:?}: {err}", s.as_str())))?,
            _ => return Err(cannot_convert(value, "int64")),
        };
        Ok(Value::Int(n))
    })
}

pub(super) fn to_u() -> Function {
    Function::fixed(1, |args| {
        let value = args[0].indirect();
        let n = match value {
            Value::Uint(n) => *n,
            Value::Int(n) => u64::try_from(*n).map_err(|_| cannot_convert(value, "uint64"))?,
            Value::Bool(b) => u64::from(*b),
            Value::Str(s) => s
                .parse::<u64>()
                .map_err(|err| EvalError::new(format!("parsing {:?}: {err}", s.as_str())))?,
            _ => return Err(cannot_convert(value, "uint64")),
        };
        Ok(Value::Uint(n))
    })
}

/// `pow a b`, the same as `(a ^ b)`.
pub(super) fn pow() -> Function {
    Function::fixed(2, |args| operators::evaluate(BinaryOp::Pow, &args[0], &args[1]))
}

/// `floor a b`, the same as `(a \ b)`.
pub(super) fn floor() -> Function {
    Function::fixed(2, |args| operators::evaluate(BinaryOp::FloorDiv, &args[0], &args[1]))
}
