//! Binary operators of expression operands such as `(.Count + 1)`.
//!
//! The left operand decides the kind of the result: the right operand is
//! converted to it before the operation, so `(1 + 2.7)` is `3` and
//! `(1.5 + 2)` is `3.5`. Integer arithmetic wraps. `+` falls back to
//! string concatenation when the left operand is not a number, and appends
//! to a list.

use stencil_ir::BinaryOp;
use stencil_value::{
    bad_operator, division_by_zero, modulo_by_zero, EvalResult, Value,
};

/// A numeric operand, already reduced to one of the three numeric kinds.
#[derive(Copy, Clone, Debug)]
enum Num {
    Int(i64),
    Uint(u64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Int(n) => Some(Num::Int(*n)),
            Value::Uint(n) => Some(Num::Uint(*n)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }
}

// Conversions between numeric kinds follow the usual wrapping and
// truncating casts.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "operands are converted to the left operand's kind with wrapping casts"
)]
mod cast {
    use super::Num;

    pub(super) fn to_i64(n: Num) -> i64 {
        match n {
            Num::Int(v) => v,
            Num::Uint(v) => v as i64,
            Num::Float(v) => v as i64,
        }
    }

    pub(super) fn to_u64(n: Num) -> u64 {
        match n {
            Num::Int(v) => v as u64,
            Num::Uint(v) => v,
            Num::Float(v) => v as u64,
        }
    }

    pub(super) fn to_f64(n: Num) -> f64 {
        match n {
            Num::Int(v) => v as f64,
            Num::Uint(v) => v as f64,
            Num::Float(v) => v,
        }
    }
}

use cast::{to_f64, to_i64, to_u64};

/// Evaluate `left op right`.
///
/// An absent left operand yields `right` unchanged, so compound
/// assignments and folds can start from nothing.
pub fn evaluate(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    if left.is_invalid() {
        return Ok(right.clone());
    }
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => arith(op, left, right),
        BinaryOp::Rem => rem(left, right),
        BinaryOp::Pow | BinaryOp::FloorDiv => via_float(op, left, right),
    }
}

fn concat(left: &Value, right: &Value) -> Value {
    Value::string(format!("{}{}", left.as_arg(), right.as_arg()))
}

fn add(left: &Value, right: &Value) -> EvalResult {
    let Some(a) = Num::of(left) else {
        return Ok(match left {
            Value::List(items) => {
                let mut items = items.to_vec();
                items.push(right.clone());
                Value::list(items)
            }
            _ => concat(left, right),
        });
    };
    let Some(b) = Num::of(right) else {
        return Ok(concat(left, right));
    };
    Ok(match a {
        Num::Int(a) => Value::Int(a.wrapping_add(to_i64(b))),
        Num::Uint(a) => Value::Uint(a.wrapping_add(to_u64(b))),
        Num::Float(a) => Value::Float(a + to_f64(b)),
    })
}

fn arith(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(bad_operator(op, left, right));
    };
    Ok(match (op, a) {
        (BinaryOp::Sub, Num::Int(a)) => Value::Int(a.wrapping_sub(to_i64(b))),
        (BinaryOp::Sub, Num::Uint(a)) => Value::Uint(a.wrapping_sub(to_u64(b))),
        (BinaryOp::Sub, Num::Float(a)) => Value::Float(a - to_f64(b)),
        (BinaryOp::Mul, Num::Int(a)) => Value::Int(a.wrapping_mul(to_i64(b))),
        (BinaryOp::Mul, Num::Uint(a)) => Value::Uint(a.wrapping_mul(to_u64(b))),
        (BinaryOp::Mul, Num::Float(a)) => Value::Float(a * to_f64(b)),
        (BinaryOp::Div, Num::Int(a)) => match to_i64(b) {
            0 => return Err(division_by_zero()),
            b => Value::Int(a.wrapping_div(b)),
        },
        (BinaryOp::Div, Num::Uint(a)) => match to_u64(b) {
            0 => return Err(division_by_zero()),
            b => Value::Uint(a / b),
        },
        (BinaryOp::Div, Num::Float(a)) => Value::Float(a / to_f64(b)),
        _ => return Err(bad_operator(op, left, right)),
    })
}

fn rem(left: &Value, right: &Value) -> EvalResult {
    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(bad_operator(BinaryOp::Rem, left, right));
    };
    match a {
        Num::Int(a) => match to_i64(b) {
            0 => Err(modulo_by_zero()),
            b => Ok(Value::Int(a.wrapping_rem(b))),
        },
        Num::Uint(a) => match to_u64(b) {
            0 => Err(modulo_by_zero()),
            b => Ok(Value::Uint(a % b)),
        },
        Num::Float(_) => Err(bad_operator(BinaryOp::Rem, left, right)),
    }
}

/// `^` and `\` compute in floating point and convert back to the left
/// operand's kind.
fn via_float(op: BinaryOp, left: &Value, right: &Value) -> EvalResult {
    let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) else {
        return Err(bad_operator(op, left, right));
    };
    let (x, y) = (to_f64(a), to_f64(b));
    let result = if op == BinaryOp::Pow {
        x.powf(y)
    } else {
        (x / y).floor()
    };
    Ok(match a {
        Num::Int(_) => Value::Int(to_i64(Num::Float(result))),
        Num::Uint(_) => Value::Uint(to_u64(Num::Float(result))),
        Num::Float(_) => Value::Float(result),
    })
}
