//! Render context handed to context-bound function factories.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::{FuncError, FuncScope, FuncValue};
use crate::errors::{undefined_function, EvalError};
use crate::value::{Object, Value};

/// What a factory can see of the render it is resolved for.
#[derive(Clone, Default)]
pub struct Context {
    funcs: FuncScope,
    data: Value,
    host: Option<Arc<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new(funcs: FuncScope, data: Value) -> Self {
        Context {
            funcs,
            data,
            host: None,
        }
    }

    /// Attach an opaque host value (a request, a cancellation token...).
    #[must_use]
    pub fn with_host(mut self, host: Option<Arc<dyn Any + Send + Sync>>) -> Self {
        self.host = host;
        self
    }

    pub fn funcs(&self) -> &FuncScope {
        &self.funcs
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn host<T: Any>(&self) -> Option<&T> {
        self.host.as_deref().and_then(|h| h.downcast_ref::<T>())
    }

    pub fn get(&self, name: &str) -> Option<&FuncValue> {
        self.funcs.get(name)
    }

    /// Call a plain function visible in this context by name.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        let f = self.get(name).ok_or_else(|| undefined_function(name))?;
        let f = f.resolve(self)?;
        f.check_arity(name, args.len())?;
        Ok(f.call_plain(args)?.into_value())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("funcs", &self.funcs.names())
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// Data paired with functions that should be visible while rendering it.
///
/// Passed as render data, it runs the template with `data` as dot and
/// `funcs` registered for that render only.
#[derive(Clone)]
pub struct DataFuncs {
    pub data: Value,
    pub funcs: FuncScope,
}

impl DataFuncs {
    pub fn new(data: Value, funcs: FuncScope) -> Self {
        DataFuncs { data, funcs }
    }

    /// Keep `names` from `scope` alongside `data`.
    pub fn select<S: AsRef<str>>(data: Value, scope: &FuncScope, names: &[S]) -> Result<Self, FuncError> {
        Ok(DataFuncs {
            data,
            funcs: scope.filter(names)?,
        })
    }
}

impl fmt::Debug for DataFuncs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFuncs")
            .field("data", &self.data)
            .field("funcs", &self.funcs.names())
            .finish()
    }
}

impl Object for DataFuncs {
    fn type_name(&self) -> &str {
        "DataFuncs"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn field(&self, name: &str) -> Option<Value> {
        (name == "Data").then(|| self.data.clone())
    }
}
