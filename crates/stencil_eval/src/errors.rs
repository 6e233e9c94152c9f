//! Errors returned by the render entry points.
//!
//! Inside the interpreter every failure is an [`EvalError`]. At the render
//! boundary it becomes a [`RenderError`]: sink failures come back as the
//! raw `io::Error`, everything else as an [`ExecError`] carrying the node
//! location and the chain of templates that led to it.

use std::fmt;
use std::io;
use std::sync::Arc;

use stencil_value::{EvalBacktrace, EvalError, FuncError};

use crate::options::BadOption;

/// One step of a [`TemplatePath`]: a template, and where in it execution
/// was when it handed over to the next one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateLocation {
    pub template_name: String,
    /// Source name of the template, when it differs from its name.
    pub template_path: String,
    /// `line:col` inside the template, empty for the last step.
    pub location: String,
    pub context: String,
}

impl fmt::Display for StateLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.template_path.as_str(), self.template_name.as_str()) {
            ("", name) => f.write_str(name)?,
            (path, "") => f.write_str(path)?,
            (path, name) if path == name => f.write_str(name)?,
            (path, name) => write!(f, "{path}[{name}]")?,
        }
        if !self.location.is_empty() {
            write!(f, ":{}", self.location)?;
        }
        if !self.context.is_empty() {
            write!(f, " at <{}>", self.context)?;
        }
        Ok(())
    }
}

/// Chain of templates from the render entry point to the failing one,
/// outermost first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplatePath(pub Vec<StateLocation>);

impl TemplatePath {
    pub fn push(&mut self, location: StateLocation) {
        self.0.push(location);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn last(&self) -> Option<&StateLocation> {
        self.0.last()
    }
}

impl fmt::Display for TemplatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" » ")?;
            }
            write!(f, "`{step}`")?;
        }
        Ok(())
    }
}

/// A failed render, with the site of the failure.
#[derive(Clone, Debug)]
pub struct ExecError {
    /// Template that was executing.
    pub template: String,
    /// `source:line:col` of the failing node; empty when unknown.
    pub location: String,
    pub context: String,
    /// Rendered [`TemplatePath`].
    pub path: String,
    cause: EvalError,
}

impl ExecError {
    /// Attach `cause` to its site, falling back to `template` and `path`
    /// when it never crossed a node.
    pub(crate) fn new(cause: EvalError, template: &str, path: &TemplatePath) -> Self {
        match cause.site.as_deref() {
            Some(site) => ExecError {
                template: site.template.clone(),
                location: site.location.clone(),
                context: site.context.clone(),
                path: site.path.clone(),
                cause,
            },
            None => ExecError {
                template: template.to_string(),
                location: String::new(),
                context: String::new(),
                path: path.to_string(),
                cause,
            },
        }
    }

    pub fn cause(&self) -> &EvalError {
        &self.cause
    }

    pub fn message(&self) -> &str {
        &self.cause.message
    }

    pub fn is_fatal(&self) -> bool {
        self.cause.is_fatal()
    }

    /// Template calls the error unwound through, innermost first.
    pub fn backtrace(&self) -> Option<&EvalBacktrace> {
        self.cause.backtrace.as_ref()
    }

    /// Native stack of a recovered panic.
    pub fn trace(&self) -> Option<&std::backtrace::Backtrace> {
        self.cause.trace.as_deref()
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "template: {}: {}", self.path, self.cause)
        } else {
            write!(
                f,
                "template: {}: executing {} at <{}>: {}",
                self.location, self.path, self.context, self.cause
            )
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Error of a render entry point.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The output sink failed.
    #[error(transparent)]
    Write(io::Error),
    #[error(transparent)]
    Exec(#[from] ExecError),
    /// Ad-hoc functions passed to the render could not be registered.
    #[error(transparent)]
    Func(#[from] FuncError),
    #[error(transparent)]
    Option(#[from] BadOption),
    #[error("template: no template {name:?} associated with template {owner:?}")]
    NoTemplate { name: String, owner: String },
}

impl RenderError {
    /// Unwrap the sink error carried by a write signal.
    pub(crate) fn from_sink(err: &Arc<io::Error>) -> Self {
        let err = Arc::clone(err);
        RenderError::Write(
            Arc::try_unwrap(err).unwrap_or_else(|shared| io::Error::new(shared.kind(), shared.to_string())),
        )
    }

    pub fn as_exec(&self) -> Option<&ExecError> {
        match self {
            RenderError::Exec(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stencil_value::{undefined_variable, ErrorSite};

    fn step(name: &str, path: &str, location: &str, context: &str) -> StateLocation {
        StateLocation {
            template_name: name.into(),
            template_path: path.into(),
            location: location.into(),
            context: context.into(),
        }
    }

    #[test]
    fn path_joins_steps() {
        let path = TemplatePath(vec![
            step("layout", "layout.tmpl", "3:4", "{{yield \"body\"}}"),
            step("body", "", "", ""),
        ]);
        assert_eq!(
            path.to_string(),
            "`layout.tmpl[layout]:3:4 at <{{yield \"body\"}}>` » `body`"
        );
    }

    #[test]
    fn located_errors_name_the_node() {
        let cause = undefined_variable("$x").with_site(ErrorSite {
            template: "page".into(),
            location: "page:1:2".into(),
            context: "{{$x}}".into(),
            path: "`page`".into(),
        });
        let err = ExecError::new(cause, "ignored", &TemplatePath::default());
        assert_eq!(
            err.to_string(),
            "template: page:1:2: executing `page` at <{{$x}}>: undefined variable: $x"
        );
        assert_eq!(err.template, "page");
    }

    #[test]
    fn unlocated_errors_fall_back_to_the_path() {
        let path = TemplatePath(vec![step("page", "", "", "")]);
        let err = ExecError::new(EvalError::new("boom"), "page", &path);
        assert_eq!(err.to_string(), "template: `page`: boom");
    }

    #[test]
    fn shared_sink_errors_keep_their_kind() {
        let shared = Arc::new(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
        let _other = Arc::clone(&shared);
        let RenderError::Write(err) = RenderError::from_sink(&shared) else {
            panic!("expected a write error");
        };
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
