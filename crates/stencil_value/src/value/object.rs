//! Host objects with optional capabilities.
//!
//! A host type becomes template data by implementing [`Object`] and
//! overriding only the capabilities it has. The interpreter consults them
//! in a fixed order during field access: attribute getter, then method,
//! then field.

use std::any::Any;
use std::fmt;

use super::Value;
use crate::func::Function;

/// Opaque host data visible to templates.
pub trait Object: Send + Sync + fmt::Debug + Any {
    /// Name used in error messages.
    fn type_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    /// Exclusive attribute resolution. When present, no method or field
    /// lookup is attempted.
    fn attr_getter(&self) -> Option<&dyn AttrGetter> {
        None
    }

    /// Method already bound to this object.
    fn method(&self, _name: &str) -> Option<Function> {
        None
    }

    fn field(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Emptiness for truth tests; `None` means always true.
    fn is_empty(&self) -> Option<bool> {
        None
    }

    /// Items yielded by `range`; `None` when the object is not iterable.
    fn iter(&self) -> Option<Box<dyn Iterator<Item = Value> + '_>> {
        None
    }

    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.type_name())
    }
}

/// Dynamic attribute lookup.
///
/// Returning `None` makes the field evaluate to the absent value. A
/// returned [`Value::Func`] is invoked with the field's arguments.
pub trait AttrGetter {
    fn get_attr(&self, name: &str) -> Option<Value>;
}

/// Iteration protocol for host collections driven by `range`.
///
/// `start` produces the first state, `done` tests it and `next` yields an
/// item together with the following state.
pub trait TemplateIterator: Send + Sync + 'static {
    type State;

    fn start(&self) -> Self::State;
    fn done(&self, state: &Self::State) -> bool;
    fn next(&self, state: Self::State) -> (Value, Self::State);
}

pub(super) struct IterObject<I>(pub(super) I);

impl<I> fmt::Debug for IterObject<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IterObject")
    }
}

impl<I: TemplateIterator> Object for IterObject<I> {
    fn type_name(&self) -> &str {
        "iterator"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn iter(&self) -> Option<Box<dyn Iterator<Item = Value> + '_>> {
        Some(Box::new(Drive {
            it: &self.0,
            state: Some(self.0.start()),
        }))
    }
}

struct Drive<'a, I: TemplateIterator> {
    it: &'a I,
    state: Option<I::State>,
}

impl<I: TemplateIterator> Iterator for Drive<'_, I> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let state = self.state.take()?;
        if self.it.done(&state) {
            return None;
        }
        let (item, next) = self.it.next(state);
        self.state = Some(next);
        Some(item)
    }
}

/// Per-iteration state bound by `range $s := &pipeline` and passed to
/// `range_callback` handlers.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeElemState {
    pub value: Value,
    pub index: usize,
    pub key: Value,
    pub is_first: bool,
    pub is_last: bool,
    /// The collection being ranged over.
    pub source: Value,
    /// The dot outside the range.
    pub data: Value,
}

impl Object for RangeElemState {
    fn type_name(&self) -> &str {
        "RangeElemState"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn field(&self, name: &str) -> Option<Value> {
        Some(match name {
            "Value" => self.value.clone(),
            "Index" => Value::int(i64::try_from(self.index).unwrap_or(i64::MAX)),
            "Key" => self.key.clone(),
            "IsFirst" => Value::Bool(self.is_first),
            "IsLast" => Value::Bool(self.is_last),
            "Self" => self.source.clone(),
            "Data" => self.data.clone(),
            _ => return None,
        })
    }

    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} {} {} {} {}}}",
            self.value.as_arg(),
            self.index,
            self.key.as_arg(),
            self.is_last,
            self.is_first
        )
    }
}
