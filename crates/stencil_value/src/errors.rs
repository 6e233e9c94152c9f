//! Error types for template execution.
//!
//! `EvalErrorKind` gives every failure a typed category; the factory
//! functions below (e.g. `division_by_zero()`) are the way to build one and
//! fill in both `kind` and `message`.
//!
//! Two things travel through the same `Err` channel without being failures
//! in the usual sense:
//!
//! - [`Signal::Exit`], raised by the `exit` builtin and absorbed at the
//!   outermost render boundary.
//! - [`Signal::Write`], an I/O failure of the output sink, which is reported
//!   unchanged to the caller.
//!
//! Errors marked fatal are never downgraded: nested render boundaries,
//! callback handlers and host-call wrapping all pass them through verbatim.

use std::backtrace::Backtrace;
use std::fmt;
use std::io;
use std::sync::Arc;

use stencil_ir::{BinaryOp, Span};

use crate::value::Value;

/// Result of evaluating a node or calling a function.
pub type EvalResult = Result<Value, EvalError>;

/// Non-error conditions carried on the error path.
#[derive(Clone, Debug)]
pub enum Signal {
    /// Stop rendering; the output produced so far stands.
    Exit,
    /// The output sink failed.
    Write(Arc<io::Error>),
}

/// Typed error category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvalErrorKind {
    // Arithmetic
    DivisionByZero,
    ModuloByZero,
    BadOperator {
        op: BinaryOp,
        left: String,
        right: String,
    },
    IntOverflow {
        literal: String,
    },

    // Lookup
    UndefinedVariable {
        name: String,
    },
    UndefinedFunction {
        name: String,
    },
    UndefinedTemplate {
        name: String,
    },
    NoSuchField {
        field: String,
        type_name: String,
    },
    MissingKey {
        key: String,
    },
    NilData {
        key: String,
    },
    NilPointer {
        field: String,
    },

    // Calls
    FieldHasArguments {
        field: String,
    },
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
        variadic: bool,
    },
    NotAFunction {
        operand: String,
    },
    CallFailed {
        name: String,
        cause: String,
    },
    BadTemplateArgs {
        name: String,
        expected: usize,
        got: usize,
    },
    DepthExceeded {
        limit: usize,
    },

    // Control and output
    NotIterable {
        value: String,
    },
    NotTestable {
        value: String,
    },
    NotPrintable {
        operand: String,
        type_name: String,
    },
    EmptyTemplate {
        name: String,
    },
    Exit,
    Write {
        cause: String,
    },
    Panic {
        message: String,
    },

    /// Catch-all used by `EvalError::new(msg)`, mostly for host functions.
    Custom {
        message: String,
    },
}

impl fmt::Display for EvalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Arithmetic
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::ModuloByZero => write!(f, "modulo by zero"),
            Self::BadOperator { op, left, right } => {
                write!(f, "bad operator \"{op}\" of types {left} and {right}")
            }
            Self::IntOverflow { literal } => write!(f, "{literal} overflows int"),

            // Lookup
            Self::UndefinedVariable { name } => write!(f, "undefined variable: {name}"),
            Self::UndefinedFunction { name } => write!(f, "{name:?} is not a defined function"),
            Self::UndefinedTemplate { name } => write!(f, "template {name:?} not defined"),
            Self::NoSuchField { field, type_name } => {
                write!(f, "can't evaluate field {field} in type {type_name}")
            }
            Self::MissingKey { key } => write!(f, "map has no entry for key {key:?}"),
            Self::NilData { key } => write!(f, "nil data; no entry for key {key:?}"),
            Self::NilPointer { field } => write!(f, "nil pointer evaluating <nil>.{field}"),

            // Calls
            Self::FieldHasArguments { field } => {
                write!(f, "{field} has arguments but cannot be invoked as function")
            }
            Self::ArityMismatch {
                name,
                expected,
                got,
                variadic,
            } => {
                let bound = if *variadic { "at least " } else { "" };
                write!(
                    f,
                    "wrong number of args for {name}: want {bound}{expected} got {got}"
                )
            }
            Self::NotAFunction { operand } => {
                write!(f, "can't give argument to non-function {operand}")
            }
            Self::CallFailed { name, cause } => write!(f, "error calling {name}: {cause}"),
            Self::BadTemplateArgs {
                name,
                expected,
                got,
            } => write!(
                f,
                "bad template args {name:?}. Want {expected} but got {got}."
            ),
            Self::DepthExceeded { limit } => {
                write!(f, "exceeded maximum template depth ({limit})")
            }

            // Control and output
            Self::NotIterable { value } => write!(f, "range can't iterate over {value}"),
            Self::NotTestable { value } => write!(f, "if/with can't use {value}"),
            Self::NotPrintable { operand, type_name } => {
                write!(f, "can't print {operand} of type {type_name}")
            }
            Self::EmptyTemplate { name } => {
                write!(f, "'{name}' is an incomplete or empty template")
            }
            Self::Exit => write!(f, "execution stopped by exit"),
            Self::Write { cause } => write!(f, "error writing output: {cause}"),
            Self::Panic { message } => write!(f, "panic: {message}"),

            Self::Custom { message } => write!(f, "{message}"),
        }
    }
}

/// One template call the error travelled through.
#[derive(Clone, Debug)]
pub struct BacktraceFrame {
    /// Name of the template that was executing.
    pub name: String,
    /// `source:line:col` of the call site, when known.
    pub location: Option<String>,
}

/// Chain of template calls between the failing node and the render entry,
/// innermost first.
#[derive(Clone, Debug, Default)]
pub struct EvalBacktrace {
    frames: Vec<BacktraceFrame>,
}

impl EvalBacktrace {
    pub fn new(frames: Vec<BacktraceFrame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[BacktraceFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    fn push(&mut self, frame: BacktraceFrame) {
        self.frames.push(frame);
    }
}

impl fmt::Display for EvalBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return Ok(());
        }
        writeln!(f, "stack backtrace:")?;
        for (i, frame) in self.frames.iter().enumerate() {
            write!(f, "  {i}: {}", frame.name)?;
            if let Some(location) = &frame.location {
                write!(f, " at {location}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Where in a template an error was raised.
///
/// Filled in by the interpreter the first time an error passes a node
/// boundary, so it always names the innermost node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorSite {
    /// Name of the template that was executing.
    pub template: String,
    /// `source:line:col` of the failing node.
    pub location: String,
    /// Rendered form of the failing node, truncated.
    pub context: String,
    /// Template path from the render entry to the failing template.
    pub path: String,
}

/// Execution error.
#[derive(Clone, Debug)]
pub struct EvalError {
    /// Typed category; factory functions set the specific variant,
    /// `EvalError::new(msg)` uses `Custom`.
    pub kind: EvalErrorKind,
    /// Human-readable message, equal to `kind.to_string()` for factory errors.
    pub message: String,
    /// Exit or write signal carried on the error path.
    pub signal: Option<Signal>,
    /// Fatal errors cross every recovery boundary unchanged.
    pub fatal: bool,
    pub span: Option<Span>,
    pub site: Option<Box<ErrorSite>>,
    pub backtrace: Option<EvalBacktrace>,
    /// Native stack captured when a panic was converted into this error.
    pub trace: Option<Arc<Backtrace>>,
}

impl EvalError {
    /// Create an error with just a message.
    ///
    /// Uses `Custom` kind. This is what host functions usually return.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_kind(EvalErrorKind::Custom { message })
    }

    fn from_kind(kind: EvalErrorKind) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            signal: None,
            fatal: false,
            span: None,
            site: None,
            backtrace: None,
            trace: None,
        }
    }

    /// Mark the error fatal so no boundary wraps or absorbs it.
    #[must_use]
    pub fn into_fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    #[must_use]
    pub fn with_site(mut self, site: ErrorSite) -> Self {
        self.site = Some(Box::new(site));
        self
    }

    /// Record that the error left the template `name`, called at `location`.
    #[must_use]
    pub fn with_frame(mut self, name: impl Into<String>, location: Option<String>) -> Self {
        self.backtrace
            .get_or_insert_with(EvalBacktrace::default)
            .push(BacktraceFrame {
                name: name.into(),
                location,
            });
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.signal, Some(Signal::Exit))
    }

    pub fn is_signal(&self) -> bool {
        self.signal.is_some()
    }

    /// The sink failure, if this error is a write signal.
    pub fn write_error(&self) -> Option<&Arc<io::Error>> {
        match &self.signal {
            Some(Signal::Write(err)) => Some(err),
            _ => None,
        }
    }

    /// Whether an outer boundary may rewrap this error with its own context.
    ///
    /// Signals, fatal errors and errors already pinned to a node are left
    /// alone.
    pub fn is_wrappable(&self) -> bool {
        !self.fatal && self.signal.is_none() && self.site.is_none()
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.signal {
            Some(Signal::Write(err)) => Some(err.as_ref()),
            _ => None,
        }
    }
}

// Arithmetic

#[cold]
pub fn division_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::DivisionByZero)
}

#[cold]
pub fn modulo_by_zero() -> EvalError {
    EvalError::from_kind(EvalErrorKind::ModuloByZero)
}

/// Operator applied to a pair of types it has no meaning for.
#[cold]
pub fn bad_operator(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::from_kind(EvalErrorKind::BadOperator {
        op,
        left: left.type_name().into_owned(),
        right: right.type_name().into_owned(),
    })
}

/// Integer literal that only fits an unsigned integer.
#[cold]
pub fn int_overflow(literal: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::IntOverflow {
        literal: literal.to_string(),
    })
}

// Lookup

#[cold]
pub fn undefined_variable(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedVariable {
        name: name.to_string(),
    })
}

#[cold]
pub fn undefined_function(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedFunction {
        name: name.to_string(),
    })
}

#[cold]
pub fn undefined_template(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::UndefinedTemplate {
        name: name.to_string(),
    })
}

#[cold]
pub fn no_such_field(field: &str, type_name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NoSuchField {
        field: field.to_string(),
        type_name: type_name.to_string(),
    })
}

/// Map lookup failed under the `error` missing-key policy.
#[cold]
pub fn missing_key(key: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::MissingKey {
        key: key.to_string(),
    })
}

/// Field lookup on absent data under the `error` missing-key policy.
#[cold]
pub fn nil_data(key: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NilData {
        key: key.to_string(),
    })
}

#[cold]
pub fn nil_pointer(field: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NilPointer {
        field: field.to_string(),
    })
}

// Calls

#[cold]
pub fn field_has_arguments(field: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::FieldHasArguments {
        field: field.to_string(),
    })
}

#[cold]
pub fn wrong_arg_count(name: &str, expected: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArityMismatch {
        name: name.to_string(),
        expected,
        got,
        variadic: false,
    })
}

#[cold]
pub fn too_few_args(name: &str, at_least: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::ArityMismatch {
        name: name.to_string(),
        expected: at_least,
        got,
        variadic: true,
    })
}

#[cold]
pub fn not_a_function(operand: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotAFunction {
        operand: operand.to_string(),
    })
}

/// A host function failed; `cause` is its own message.
#[cold]
pub fn call_failed(name: &str, cause: &EvalError) -> EvalError {
    EvalError::from_kind(EvalErrorKind::CallFailed {
        name: name.to_string(),
        cause: cause.message.clone(),
    })
}

#[cold]
pub fn bad_template_args(name: &str, expected: usize, got: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::BadTemplateArgs {
        name: name.to_string(),
        expected,
        got,
    })
}

#[cold]
pub fn depth_exceeded(limit: usize) -> EvalError {
    EvalError::from_kind(EvalErrorKind::DepthExceeded { limit })
}

// Control and output

#[cold]
pub fn not_iterable(value: &Value) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotIterable {
        value: value.to_string(),
    })
}

#[cold]
pub fn not_testable(value: &Value) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotTestable {
        value: value.to_string(),
    })
}

#[cold]
pub fn not_printable(operand: &str, value: &Value) -> EvalError {
    EvalError::from_kind(EvalErrorKind::NotPrintable {
        operand: operand.to_string(),
        type_name: value.type_name().into_owned(),
    })
}

#[cold]
pub fn empty_template(name: &str) -> EvalError {
    EvalError::from_kind(EvalErrorKind::EmptyTemplate {
        name: name.to_string(),
    })
}

/// The signal raised by the `exit` builtin.
#[cold]
pub fn exit_signal() -> EvalError {
    let mut err = EvalError::from_kind(EvalErrorKind::Exit);
    err.signal = Some(Signal::Exit);
    err
}

#[cold]
pub fn write_failed(cause: io::Error) -> EvalError {
    let mut err = EvalError::from_kind(EvalErrorKind::Write {
        cause: cause.to_string(),
    });
    err.signal = Some(Signal::Write(Arc::new(cause)));
    err
}

/// A panic caught at a render boundary. Always fatal.
#[cold]
pub fn panicked(message: impl Into<String>, trace: Backtrace) -> EvalError {
    let mut err = EvalError::from_kind(EvalErrorKind::Panic {
        message: message.into(),
    });
    err.fatal = true;
    err.trace = Some(Arc::new(trace));
    err
}

#[cfg(test)]
mod tests;
