//! Struct-like host data with named fields and methods.

use std::fmt;

use rustc_hash::FxHashMap;

use super::Value;
use crate::func::Function;

/// A named record: ordered fields plus methods.
///
/// Methods receive the record itself as `args[0]`; their declared arity
/// counts that receiver.
#[derive(Clone)]
pub struct Record {
    type_name: String,
    fields: Vec<(String, Value)>,
    methods: FxHashMap<String, Function>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Record {
            type_name: type_name.into(),
            fields: Vec::new(),
            methods: FxHashMap::default(),
        }
    }

    /// Add or replace a field, keeping declaration order.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
        self
    }

    #[must_use]
    pub fn method(mut self, name: impl Into<String>, function: Function) -> Self {
        self.methods.insert(name.into(), function);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_method(&self, name: &str) -> Option<&Function> {
        self.methods.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.fields == other.fields
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.type_name);
        for (name, value) in &self.fields {
            s.field(name, value);
        }
        s.finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        super::format::write_seq(f, self.fields.iter().map(|(_, v)| v))?;
        f.write_str("}")
    }
}
