//! Execution options.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use stencil_value::Value;

/// Template call depth at which rendering stops with an error.
pub const MAX_EXEC_DEPTH: usize = 100_000;

/// What a missing map key evaluates to.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MissingKey {
    /// The absent value, printed as `<no value>`.
    #[default]
    Invalid,
    /// The zero value of the map's other entries.
    Zero,
    /// Stop with an error.
    Error,
}

/// Error for an unrecognized `missingkey=` option.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized option: {0}")]
pub struct BadOption(pub String);

impl FromStr for MissingKey {
    type Err = BadOption;

    /// Parse the `missingkey=<mode>` form.
    fn from_str(option: &str) -> Result<Self, BadOption> {
        match option.split_once('=') {
            Some(("missingkey", "invalid" | "default")) => Ok(MissingKey::Invalid),
            Some(("missingkey", "zero")) => Ok(MissingKey::Zero),
            Some(("missingkey", "error")) => Ok(MissingKey::Error),
            _ => Err(BadOption(option.to_string())),
        }
    }
}

/// Whether a failed render writes its error text to the output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WriteErrorPolicy {
    /// Use the parent executor's policy.
    #[default]
    Inherit,
    Force,
    Suppress,
}

type MissingFieldHook = dyn Fn(&Value, &str) -> Option<Value> + Send + Sync;

/// Options of one executor, inherited by its children.
#[derive(Clone, Default)]
pub struct ExecOptions {
    /// Overrides the template set's missing-key mode.
    pub missing_key: Option<MissingKey>,
    /// Optional fields (`.Name?`) are required like any other.
    pub require_fields: bool,
    pub on_missing_field: Option<Arc<MissingFieldHook>>,
    /// Variables visible below every template's own.
    pub globals: Vec<(String, Value)>,
    pub max_depth: Option<usize>,
    /// Host payload handed to context-bound functions.
    pub context: Option<Arc<dyn Any + Send + Sync>>,
}

impl ExecOptions {
    pub fn new() -> Self {
        ExecOptions::default()
    }

    #[must_use]
    pub fn missing_key(mut self, mode: MissingKey) -> Self {
        self.missing_key = Some(mode);
        self
    }

    #[must_use]
    pub fn require_fields(mut self, require: bool) -> Self {
        self.require_fields = require;
        self
    }

    /// Called for a field a record or map doesn't have; a returned value
    /// stands in for it.
    #[must_use]
    pub fn on_missing_field<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, &str) -> Option<Value> + Send + Sync + 'static,
    {
        self.on_missing_field = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.push((name.into(), value));
        self
    }

    #[must_use]
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    #[must_use]
    pub fn context<T: Any + Send + Sync>(mut self, payload: T) -> Self {
        self.context = Some(Arc::new(payload));
        self
    }

    pub fn depth_limit(&self) -> usize {
        self.max_depth.unwrap_or(MAX_EXEC_DEPTH)
    }
}

impl fmt::Debug for ExecOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOptions")
            .field("missing_key", &self.missing_key)
            .field("require_fields", &self.require_fields)
            .field("on_missing_field", &self.on_missing_field.is_some())
            .field("globals", &self.globals)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}
