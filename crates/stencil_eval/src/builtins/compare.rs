//! `eq ne lt le gt ge`.
//!
//! Only basic kinds compare: bools, integers, floats and strings. Signed
//! and unsigned integers compare by value; any other mix of kinds is an
//! error rather than `false`.

use std::cmp::Ordering;

use stencil_value::{EvalError, Function, Value};

#[derive(Copy, Clone, Debug, PartialEq)]
enum Basic<'v> {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(&'v str),
}

fn basic(value: &Value) -> Result<Basic<'_>, EvalError> {
    Ok(match value.indirect() {
        Value::Bool(b) => Basic::Bool(*b),
        Value::Int(n) => Basic::Int(*n),
        Value::Uint(n) => Basic::Uint(*n),
        Value::Float(f) => Basic::Float(*f),
        Value::Str(s) => Basic::Str(s.as_str()),
        _ => return Err(EvalError::new("invalid type for comparison")),
    })
}

fn incompatible() -> EvalError {
    EvalError::new("incompatible types for comparison")
}

#[allow(clippy::float_cmp, reason = "template equality is exact")]
fn equal(a: Basic<'_>, b: Basic<'_>) -> Result<bool, EvalError> {
    Ok(match (a, b) {
        (Basic::Bool(a), Basic::Bool(b)) => a == b,
        (Basic::Int(a), Basic::Int(b)) => a == b,
        (Basic::Uint(a), Basic::Uint(b)) => a == b,
        (Basic::Float(a), Basic::Float(b)) => a == b,
        (Basic::Str(a), Basic::Str(b)) => a == b,
        (Basic::Int(i), Basic::Uint(u)) | (Basic::Uint(u), Basic::Int(i)) => {
            u64::try_from(i).is_ok_and(|i| i == u)
        }
        _ => return Err(incompatible()),
    })
}

fn order(a: Basic<'_>, b: Basic<'_>) -> Result<Option<Ordering>, EvalError> {
    Ok(match (a, b) {
        (Basic::Int(a), Basic::Int(b)) => Some(a.cmp(&b)),
        (Basic::Uint(a), Basic::Uint(b)) => Some(a.cmp(&b)),
        (Basic::Float(a), Basic::Float(b)) => a.partial_cmp(&b),
        (Basic::Str(a), Basic::Str(b)) => Some(a.cmp(b)),
        (Basic::Int(i), Basic::Uint(u)) => Some(match u64::try_from(i) {
            Ok(i) => i.cmp(&u),
            Err(_) => Ordering::Less,
        }),
        (Basic::Uint(u), Basic::Int(i)) => Some(match u64::try_from(i) {
            Ok(i) => u.cmp(&i),
            Err(_) => Ordering::Greater,
        }),
        (Basic::Bool(_), Basic::Bool(_)) => return Err(EvalError::new("invalid type for comparison")),
        _ => return Err(incompatible()),
    })
}

/// `eq a b c...` is `a == b || a == c || ...`.
pub(super) fn eq() -> Function {
    Function::variadic(1, |args| {
        let first = basic(&args[0])?;
        if args.len() < 2 {
            return Err(EvalError::new("missing argument for comparison"));
        }
        for arg in &args[1..] {
            if equal(first, basic(arg)?)? {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    })
}

pub(super) fn ne() -> Function {
    Function::fixed(2, |args| Ok(Value::Bool(!equal(basic(&args[0])?, basic(&args[1])?)?)))
}

/// Comparison builtin that holds when the ordering of its two arguments
/// satisfies `test`. Unordered floats (NaN) satisfy nothing.
fn ordered(test: fn(Ordering) -> bool) -> Function {
    Function::fixed(2, move |args| {
        let ord = order(basic(&args[0])?, basic(&args[1])?)?;
        Ok(Value::Bool(ord.is_some_and(test)))
    })
}

pub(super) fn lt() -> Function {
    ordered(Ordering::is_lt)
}

pub(super) fn le() -> Function {
    ordered(Ordering::is_le)
}

pub(super) fn gt() -> Function {
    ordered(Ordering::is_gt)
}

pub(super) fn ge() -> Function {
    ordered(Ordering::is_ge)
}
