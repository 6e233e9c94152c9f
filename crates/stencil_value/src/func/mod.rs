//! Callables exposed to templates.
//!
//! A [`Function`] is a host closure plus a [`Signature`] the interpreter
//! checks before evaluating any argument. A [`FuncValue`] is what the
//! registry stores: either a function ready to call, or a factory that
//! builds one from the render [`Context`] the first time it is used.

mod context;
mod scope;

use std::fmt;
use std::sync::Arc;

pub use context::{Context, DataFuncs};
pub use scope::{FuncMap, FuncScope};

use crate::errors::{too_few_args, wrong_arg_count, EvalError};
use crate::interp::Interp;
use crate::value::Value;

/// Registry failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FuncError {
    #[error("function name {0:?} is not a valid identifier")]
    BadName(String),
    #[error("can't install method/function {0:?}: bad return type")]
    BadReturnType(String),
    #[error("Function {0:?} doesn't exists.")]
    Undefined(String),
}

/// Accepted argument counts, excluding the interpreter handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Arity {
    /// Required leading arguments.
    pub fixed: usize,
    /// Whether any number of further arguments is accepted.
    pub variadic: bool,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Arity {
            fixed: n,
            variadic: false,
        }
    }

    pub const fn at_least(n: usize) -> Self {
        Arity {
            fixed: n,
            variadic: true,
        }
    }

    pub fn accepts(self, got: usize) -> bool {
        if self.variadic {
            got >= self.fixed
        } else {
            got == self.fixed
        }
    }
}

/// What a function hands back.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Results {
    /// Nothing; the call renders as the empty string.
    Nothing,
    Single,
    /// A value and a found/not-found flag.
    Flagged,
    /// More than two results, packed into a list.
    Tuple(usize),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub arity: Arity,
    pub results: Results,
}

/// Result of one call, shaped by [`Results`].
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Nothing,
    Value(Value),
    Flagged(Value, bool),
    Tuple(Vec<Value>),
}

impl Outcome {
    /// Normalize to a single value: nothing becomes `""`, a flagged pair
    /// becomes a presence value and tuples become lists.
    pub fn into_value(self) -> Value {
        match self {
            Outcome::Nothing => Value::string(""),
            Outcome::Value(v) => v,
            Outcome::Flagged(v, ok) => Value::presence(v, ok),
            Outcome::Tuple(items) => Value::list(items),
        }
    }
}

type PlainFn = dyn Fn(&[Value]) -> Result<Outcome, EvalError> + Send + Sync;
type StatefulFn = dyn Fn(&mut dyn Interp, &[Value]) -> Result<Outcome, EvalError> + Send + Sync;

/// Function body. Stateful bodies receive the running interpreter, which
/// is not counted in the arity.
#[derive(Clone)]
pub enum Body {
    Plain(Arc<PlainFn>),
    Stateful(Arc<StatefulFn>),
}

/// A host function callable from templates.
#[derive(Clone)]
pub struct Function {
    signature: Signature,
    body: Body,
}

impl Function {
    pub fn new(signature: Signature, body: Body) -> Self {
        Function { signature, body }
    }

    /// Single-result function.
    ///
    /// ```text
    /// let upper = Function::returning(Arity::exactly(1), |args| {
    ///     Ok(Value::string(args[0].to_string().to_uppercase()))
    /// });
    /// ```
    pub fn returning<F>(arity: Arity, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Function::new(
            Signature {
                arity,
                results: Results::Single,
            },
            Body::Plain(Arc::new(move |args: &[Value]| f(args).map(Outcome::Value))),
        )
    }

    /// Single-result function with exactly `n` arguments.
    pub fn fixed<F>(n: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Function::returning(Arity::exactly(n), f)
    }

    /// Single-result function with at least `min` arguments.
    pub fn variadic<F>(min: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Function::returning(Arity::at_least(min), f)
    }

    /// Function whose only output is its side effect or failure.
    pub fn unit<F>(arity: Arity, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<(), EvalError> + Send + Sync + 'static,
    {
        Function::new(
            Signature {
                arity,
                results: Results::Nothing,
            },
            Body::Plain(Arc::new(move |args: &[Value]| f(args).map(|()| Outcome::Nothing))),
        )
    }

    /// Function returning a value and a found flag.
    pub fn flagged<F>(arity: Arity, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<(Value, bool), EvalError> + Send + Sync + 'static,
    {
        Function::new(
            Signature {
                arity,
                results: Results::Flagged,
            },
            Body::Plain(Arc::new(move |args: &[Value]| {
                f(args).map(|(v, ok)| Outcome::Flagged(v, ok))
            })),
        )
    }

    /// Function returning `count` results. Accepted as a method only; the
    /// registry rejects it.
    pub fn tuple<F>(arity: Arity, count: usize, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, EvalError> + Send + Sync + 'static,
    {
        Function::new(
            Signature {
                arity,
                results: Results::Tuple(count),
            },
            Body::Plain(Arc::new(move |args: &[Value]| f(args).map(Outcome::Tuple))),
        )
    }

    /// Single-result function that also receives the interpreter.
    pub fn stateful<F>(arity: Arity, f: F) -> Self
    where
        F: Fn(&mut dyn Interp, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Function::new(
            Signature {
                arity,
                results: Results::Single,
            },
            Body::Stateful(Arc::new(move |interp: &mut dyn Interp, args: &[Value]| {
                f(interp, args).map(Outcome::Value)
            })),
        )
    }

    /// Side-effect-only function that receives the interpreter.
    pub fn stateful_unit<F>(arity: Arity, f: F) -> Self
    where
        F: Fn(&mut dyn Interp, &[Value]) -> Result<(), EvalError> + Send + Sync + 'static,
    {
        Function::new(
            Signature {
                arity,
                results: Results::Nothing,
            },
            Body::Stateful(Arc::new(move |interp: &mut dyn Interp, args: &[Value]| {
                f(interp, args).map(|()| Outcome::Nothing)
            })),
        )
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    pub fn arity(&self) -> Arity {
        self.signature.arity
    }

    pub fn takes_state(&self) -> bool {
        matches!(self.body, Body::Stateful(_))
    }

    /// Check `got` arguments against the arity, naming `name` on failure.
    pub fn check_arity(&self, name: &str, got: usize) -> Result<(), EvalError> {
        let arity = self.signature.arity;
        if arity.accepts(got) {
            Ok(())
        } else if arity.variadic {
            Err(too_few_args(name, arity.fixed, got))
        } else {
            Err(wrong_arg_count(name, arity.fixed, got))
        }
    }

    /// Invoke the body. Arity is the caller's responsibility.
    pub fn call(&self, interp: &mut dyn Interp, args: &[Value]) -> Result<Outcome, EvalError> {
        match &self.body {
            Body::Plain(f) => f(args),
            Body::Stateful(f) => f(interp, args),
        }
    }

    /// Invoke a plain body without an interpreter.
    ///
    /// Fails for stateful functions.
    pub fn call_plain(&self, args: &[Value]) -> Result<Outcome, EvalError> {
        match &self.body {
            Body::Plain(f) => f(args),
            Body::Stateful(_) => Err(EvalError::new(
                "function needs a running template and can't be called here",
            )),
        }
    }

    /// Fix `receiver` as the first argument, as for a method.
    #[must_use]
    pub fn bind(&self, receiver: Value) -> Function {
        let arity = Arity {
            fixed: self.signature.arity.fixed.saturating_sub(1),
            variadic: self.signature.arity.variadic,
        };
        let signature = Signature { arity, ..self.signature };
        let with_receiver = move |args: &[Value]| {
            let mut full = Vec::with_capacity(args.len().saturating_add(1));
            full.push(receiver.clone());
            full.extend_from_slice(args);
            full
        };
        let body = match &self.body {
            Body::Plain(f) => {
                let f = Arc::clone(f);
                Body::Plain(Arc::new(move |args: &[Value]| f(&with_receiver(args))))
            }
            Body::Stateful(f) => {
                let f = Arc::clone(f);
                Body::Stateful(Arc::new(move |interp: &mut dyn Interp, args: &[Value]| {
                    f(interp, &with_receiver(args))
                }))
            }
        };
        Function { signature, body }
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        match (&self.body, &other.body) {
            (Body::Plain(a), Body::Plain(b)) => Arc::ptr_eq(a, b),
            (Body::Stateful(a), Body::Stateful(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("signature", &self.signature)
            .field("takes_state", &self.takes_state())
            .finish()
    }
}

type FactoryFn = dyn Fn(&Context) -> Result<Function, EvalError> + Send + Sync;

/// Builds a function from the render context.
#[derive(Clone)]
pub struct ContextFactory(Arc<FactoryFn>);

impl ContextFactory {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Context) -> Result<Function, EvalError> + Send + Sync + 'static,
    {
        ContextFactory(Arc::new(f))
    }

    pub fn build(&self, ctx: &Context) -> Result<Function, EvalError> {
        (self.0)(ctx)
    }

    /// Identity of the factory, stable for the lifetime of its clones.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

/// A registry entry.
#[derive(Clone)]
pub enum FuncValue {
    Direct(Function),
    ContextBound(ContextFactory),
}

impl FuncValue {
    /// Produce the callable for `ctx`. Callers cache context-bound results
    /// per render.
    pub fn resolve(&self, ctx: &Context) -> Result<Function, EvalError> {
        match self {
            FuncValue::Direct(f) => Ok(f.clone()),
            FuncValue::ContextBound(factory) => factory.build(ctx),
        }
    }

    pub fn as_direct(&self) -> Option<&Function> {
        match self {
            FuncValue::Direct(f) => Some(f),
            FuncValue::ContextBound(_) => None,
        }
    }

    pub fn ptr_eq(&self, other: &FuncValue) -> bool {
        match (self, other) {
            (FuncValue::Direct(a), FuncValue::Direct(b)) => a.ptr_eq(b),
            (FuncValue::ContextBound(a), FuncValue::ContextBound(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl From<Function> for FuncValue {
    fn from(f: Function) -> Self {
        FuncValue::Direct(f)
    }
}

impl From<ContextFactory> for FuncValue {
    fn from(f: ContextFactory) -> Self {
        FuncValue::ContextBound(f)
    }
}

impl fmt::Debug for FuncValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FuncValue::Direct(func) => write!(f, "{func:?}"),
            FuncValue::ContextBound(_) => f.write_str("ContextBound"),
        }
    }
}

/// Whether `name` can be registered: a letter or `_` first, then letters,
/// digits or `_`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Registration check for one entry.
pub(crate) fn check_entry(name: &str, value: &FuncValue) -> Result<(), FuncError> {
    if !is_valid_name(name) {
        return Err(FuncError::BadName(name.to_string()));
    }
    if let FuncValue::Direct(f) = value {
        if matches!(f.signature.results, Results::Tuple(_)) {
            return Err(FuncError::BadReturnType(name.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
