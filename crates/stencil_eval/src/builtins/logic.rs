//! Truth, nil handling and control builtins.

use stencil_value::{exit_signal, Arity, Function, Key, Value};

use super::str_arg;

/// First false argument, or the last one.
pub(super) fn and() -> Function {
    Function::variadic(1, |args| {
        let first_false = args.iter().find(|v| !v.is_truthy());
        Ok(first_false.or(args.last()).cloned().unwrap_or_default())
    })
}

/// First true argument, or the last one.
pub(super) fn or() -> Function {
    Function::variadic(1, |args| {
        let first_true = args.iter().find(|v| v.is_truthy());
        Ok(first_true.or(args.last()).cloned().unwrap_or_default())
    })
}

pub(super) fn not() -> Function {
    Function::fixed(1, |args| Ok(Value::Bool(!args[0].is_truthy())))
}

pub(super) fn to_b() -> Function {
    Function::fixed(1, |args| Ok(Value::Bool(args[0].is_truthy())))
}

/// `call f args...`
pub(super) fn call() -> Function {
    Function::stateful(Arity::at_least(1), |interp, args| {
        interp.call_value(&args[0], &args[1..])
    })
}

/// First true argument, or nil.
pub(super) fn default() -> Function {
    Function::variadic(0, |args| {
        Ok(args.iter().find(|v| v.is_truthy()).cloned().unwrap_or(Value::None))
    })
}

/// Whether every argument is nil.
pub(super) fn is_null() -> Function {
    Function::variadic(0, |args| Ok(Value::Bool(args.iter().all(is_nil))))
}

/// Whether some argument is not nil.
pub(super) fn not_null() -> Function {
    Function::variadic(0, |args| Ok(Value::Bool(!args.iter().all(is_nil))))
}

fn is_nil(value: &Value) -> bool {
    value.indirect().is_nil()
}

/// First argument that is not `""`, `0` or nil; `""` when there is none.
pub(super) fn first_valid() -> Function {
    Function::variadic(0, |args| {
        let valid = args.iter().find(|v| match v.indirect() {
            Value::Str(s) => !s.is_empty(),
            Value::Int(n) => *n != 0,
            other => !other.is_nil(),
        });
        Ok(valid.cloned().unwrap_or_else(|| Value::string("")))
    })
}

/// Whether `obj` has a method or a function-valued field called `name`.
pub(super) fn has_method() -> Function {
    Function::fixed(2, |args| {
        let name = str_arg("has_method", args, 1)?;
        let found = match args[0].indirect() {
            Value::Record(record) => {
                record.get_method(name).is_some() || record.get(name).is_some_and(|v| v.as_func().is_some())
            }
            Value::Object(obj) => {
                obj.method(name).is_some() || obj.field(name).is_some_and(|v| v.as_func().is_some())
            }
            Value::Map(map) => map.get(&Key::from(name)).is_some_and(|v| v.as_func().is_some()),
            _ => false,
        };
        Ok(Value::Bool(found))
    })
}

pub(super) fn nil() -> Function {
    Function::fixed(0, |_| Ok(Value::None))
}

/// Stop the render quietly.
pub(super) fn exit() -> Function {
    Function::unit(Arity::exactly(0), |_| Err(exit_signal()))
}
