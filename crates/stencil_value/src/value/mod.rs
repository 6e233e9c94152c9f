//! Runtime values seen by templates.
//!
//! # Factory Methods
//!
//! Heap-backed variants wrap their payload in [`Heap`], whose constructor
//! is private to this module, so values are built through `Value::`
//! factory methods:
//!
//! ```text
//! let s = Value::string("hello");
//! let list = Value::list(vec![Value::int(1), Value::int(2)]);
//! let m = Value::map_from([("Name", Value::string("Ada"))]);
//! ```
//!
//! # Absence
//!
//! `Invalid` is "no value at all" (a missing field, an empty pipeline) and
//! prints as `<no value>`. `None` is an explicit nil and prints as `<nil>`.
//! Both are false in conditions.

mod format;
mod heap;
mod key;
mod object;
mod record;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crossbeam::channel::Receiver;

pub use format::{format_float, sprint, sprintln};
pub use heap::Heap;
pub use key::Key;
pub use object::{AttrGetter, Object, RangeElemState, TemplateIterator};
pub use record::Record;

use crate::func::{ContextFactory, FuncValue, Function};
use crate::interp::BlockHandle;

/// A value paired with a found/not-found flag, produced by functions that
/// return `(value, bool)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Presence {
    pub value: Value,
    pub ok: bool,
}

/// Runtime value.
#[derive(Clone, Default)]
pub enum Value {
    /// No value; the result of a missing field or an empty pipeline.
    #[default]
    Invalid,
    /// Explicit nil.
    None,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(Heap<String>),
    List(Heap<Vec<Value>>),
    Map(Heap<BTreeMap<Key, Value>>),
    Record(Heap<Record>),
    /// A present optional; field access and truth look through it.
    Some(Heap<Value>),
    Presence(Heap<Presence>),
    Func(FuncValue),
    Object(Arc<dyn Object>),
    Chan(Receiver<Value>),
    /// Handler of the enclosing `{{callback}}` block.
    Block(BlockHandle),
}

impl Value {
    #[inline]
    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    #[inline]
    pub fn uint(n: u64) -> Self {
        Value::Uint(n)
    }

    #[inline]
    pub fn float(f: f64) -> Self {
        Value::Float(f)
    }

    /// Create a string value.
    ///
    /// ```text
    /// let s = Value::string("hello");
    /// let s2 = Value::string(format!("value: {x}"));
    /// ```
    #[inline]
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(Heap::new(s.into()))
    }

    #[inline]
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Heap::new(items))
    }

    #[inline]
    pub fn map(entries: BTreeMap<Key, Value>) -> Self {
        Value::Map(Heap::new(entries))
    }

    /// Create a map from key/value pairs.
    ///
    /// ```text
    /// let m = Value::map_from([("A", Value::int(1)), ("B", Value::int(2))]);
    /// ```
    pub fn map_from<K, I>(entries: I) -> Self
    where
        K: Into<Key>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    #[inline]
    pub fn record(record: Record) -> Self {
        Value::Record(Heap::new(record))
    }

    #[inline]
    pub fn some(v: Value) -> Self {
        Value::Some(Heap::new(v))
    }

    #[inline]
    pub fn presence(value: Value, ok: bool) -> Self {
        Value::Presence(Heap::new(Presence { value, ok }))
    }

    #[inline]
    pub fn func(function: Function) -> Self {
        Value::Func(FuncValue::Direct(function))
    }

    /// A function resolved against the render context on first use.
    ///
    /// ```text
    /// let f = Value::context_func(|ctx| Ok(Function::fixed(0, ...)));
    /// ```
    pub fn context_func<F>(factory: F) -> Self
    where
        F: Fn(&crate::Context) -> Result<Function, crate::EvalError> + Send + Sync + 'static,
    {
        Value::Func(FuncValue::ContextBound(ContextFactory::new(factory)))
    }

    pub fn object(obj: impl Object) -> Self {
        Value::Object(Arc::new(obj))
    }

    /// Wrap a host iterator so `range` can drive it.
    pub fn iterator(it: impl TemplateIterator) -> Self {
        Value::object(object::IterObject(it))
    }

    #[inline]
    pub fn chan(rx: Receiver<Value>) -> Self {
        Value::Chan(rx)
    }

    // Type checking

    /// Name of the value's type as shown in error messages.
    pub fn type_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(match self {
            Value::Invalid => "invalid",
            Value::None => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float64",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(r) => return Cow::Owned(r.type_name().to_string()),
            Value::Some(v) => return Cow::Owned(format!("*{}", v.type_name())),
            Value::Presence(_) => "presence",
            Value::Func(_) => "func",
            Value::Object(o) => return Cow::Owned(o.type_name().to_string()),
            Value::Chan(_) => "chan",
            Value::Block(_) => "callback",
        })
    }

    #[inline]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Value::Invalid)
    }

    /// `Invalid` or `None`.
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Invalid | Value::None)
    }

    #[inline]
    pub fn is_str(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::Float(_))
    }

    /// Look through any `Some` wrappers.
    pub fn indirect(&self) -> &Value {
        let mut v = self;
        while let Value::Some(inner) = v {
            v = inner;
        }
        v
    }

    // Accessors

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<Key, Value>> {
        match self {
            Value::Map(m) => Some(&**m),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(&**r),
            _ => None,
        }
    }

    pub fn as_func(&self) -> Option<&FuncValue> {
        match self {
            Value::Func(f) => Some(f),
            _ => None,
        }
    }

    /// Borrow a host object as its concrete type.
    pub fn downcast_object<T: Object>(&self) -> Option<&T> {
        match self {
            Value::Object(o) => o.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Truth of the value in `if`, `with`, `and`, `or` and `not`.
    ///
    /// `None` when the value has no truth (a callback handle).
    #[allow(clippy::float_cmp, reason = "zero test, not a tolerance comparison")]
    pub fn truth(&self) -> Option<bool> {
        Some(match self {
            Value::Invalid | Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Uint(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Some(v) => return v.truth(),
            Value::Presence(p) => p.ok,
            Value::Object(o) => !o.is_empty().unwrap_or(false),
            Value::Record(_) | Value::Func(_) | Value::Chan(_) => true,
            Value::Block(_) => return None,
        })
    }

    /// Truth with untestable values counted as false.
    pub fn is_truthy(&self) -> bool {
        self.truth().unwrap_or(false)
    }

    /// Length of strings (in bytes), lists, maps and queued channel items.
    pub fn len(&self) -> Option<usize> {
        match self.indirect() {
            Value::Str(s) => Some(s.len()),
            Value::List(items) => Some(items.len()),
            Value::Map(m) => Some(m.len()),
            Value::Chan(rx) => Some(rx.len()),
            _ => None,
        }
    }

    /// The zero value of this value's kind.
    pub fn zero_like(&self) -> Value {
        match self {
            Value::Bool(_) => Value::Bool(false),
            Value::Int(_) => Value::Int(0),
            Value::Uint(_) => Value::Uint(0),
            Value::Float(_) => Value::Float(0.0),
            Value::Str(_) => Value::string(""),
            Value::List(_) => Value::list(Vec::new()),
            Value::Map(_) => Value::map(BTreeMap::new()),
            _ => Value::None,
        }
    }

    /// Display adapter used for function arguments and nested elements,
    /// where an absent value reads `<nil>` rather than `<no value>`.
    pub fn as_arg(&self) -> impl fmt::Display + '_ {
        ArgDisplay(self)
    }
}

struct ArgDisplay<'a>(&'a Value);

impl fmt::Display for ArgDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Invalid => f.write_str("<nil>"),
            v => fmt::Display::fmt(v, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid => f.write_str("<no value>"),
            Value::None => f.write_str("<nil>"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Uint(n) => write!(f, "{n}"),
            Value::Float(n) => f.write_str(&format_float(*n)),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                format::write_seq(f, items.iter())?;
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("map[")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{k}:{}", v.as_arg())?;
                }
                f.write_str("]")
            }
            Value::Record(r) => write!(f, "{}", &**r),
            Value::Some(v) => write!(f, "{}", v.as_arg()),
            Value::Presence(p) => write!(f, "{{{} {}}}", p.value.as_arg(), p.ok),
            Value::Func(_) => f.write_str("<func>"),
            Value::Object(o) => o.fmt_value(f),
            Value::Chan(_) => f.write_str("<chan>"),
            Value::Block(_) => f.write_str("<callback>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Invalid => f.write_str("Invalid"),
            Value::None => f.write_str("None"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Uint(n) => write!(f, "Uint({n})"),
            Value::Float(n) => write!(f, "Float({n})"),
            Value::Str(s) => write!(f, "Str({:?})", &**s),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Map(m) => f.debug_map().entries(m.iter()).finish(),
            Value::Record(r) => write!(f, "{:?}", &**r),
            Value::Some(v) => write!(f, "Some({:?})", &**v),
            Value::Presence(p) => write!(f, "Presence({:?}, {})", p.value, p.ok),
            Value::Func(func) => write!(f, "{func:?}"),
            Value::Object(o) => write!(f, "Object({o:?})"),
            Value::Chan(_) => f.write_str("Chan"),
            Value::Block(h) => write!(f, "Block({})", h.index()),
        }
    }
}

impl PartialEq for Value {
    #[allow(clippy::float_cmp, reason = "values compare exactly, like the templates they come from")]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Invalid, Value::Invalid) | (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Some(a), Value::Some(b)) => a == b,
            (Value::Presence(a), Value::Presence(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Chan(a), Value::Chan(b)) => a.same_channel(b),
            (Value::Block(a), Value::Block(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::record(r)
    }
}

#[cfg(test)]
mod tests;
