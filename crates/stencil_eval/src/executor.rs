//! Executors: a template bound to functions, options and a parent chain.
//!
//! The root executor of a template carries the builtin functions. Children
//! add function layers, options or a write-error policy without touching
//! their parent, and function lookup walks from the child up to the root.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use stencil_value::{
    empty_template, panicked, DataFuncs, EvalError, FuncError, FuncMap, FuncScope, FuncValue,
    LocalData, Value,
};

use crate::builtins;
use crate::errors::{ExecError, RenderError, StateLocation, TemplatePath};
use crate::options::{ExecOptions, WriteErrorPolicy};
use crate::state::State;
use crate::template::{Template, TemplateSet};

type RawFn = dyn Fn(&mut dyn io::Write) -> io::Result<()> + Send + Sync;

/// Runs one template of a set.
#[derive(Clone)]
pub struct Executor {
    set: Arc<TemplateSet>,
    template: Arc<Template>,
    funcs: FuncScope,
    parent: Option<Arc<Executor>>,
    write_errors: WriteErrorPolicy,
    options: ExecOptions,
    /// Where the executors that handed over to this one were, outermost
    /// first.
    super_path: Vec<StateLocation>,
    raw: Option<Arc<RawFn>>,
    no_capture: bool,
    depth: usize,
    local: LocalData,
}

impl Executor {
    pub(crate) fn root(set: Arc<TemplateSet>, template: Arc<Template>) -> Self {
        Executor {
            set,
            template,
            funcs: builtins::builtins().clone(),
            parent: None,
            write_errors: WriteErrorPolicy::Inherit,
            options: ExecOptions::default(),
            super_path: Vec::new(),
            raw: None,
            no_capture: false,
            depth: 0,
            local: LocalData::new(),
        }
    }

    /// Executor that ignores its data and writes through `f`.
    pub fn raw<F>(f: F) -> Self
    where
        F: Fn(&mut dyn io::Write) -> io::Result<()> + Send + Sync + 'static,
    {
        let mut exec = Executor::root(
            Arc::new(TemplateSet::new("raw")),
            Arc::new(Template::declared("raw")),
        );
        exec.raw = Some(Arc::new(f));
        exec
    }

    /// Executor that writes `content` verbatim.
    pub fn raw_content(content: impl Into<Arc<[u8]>>) -> Self {
        let content: Arc<[u8]> = content.into();
        Executor::raw(move |w| w.write_all(&content))
    }

    /// New executor below this one, with an empty function layer.
    #[must_use]
    pub fn child(&self) -> Executor {
        tracing::debug!(template = %self.template.name(), "child executor");
        Executor {
            set: Arc::clone(&self.set),
            template: Arc::clone(&self.template),
            funcs: FuncScope::new(),
            parent: Some(Arc::new(self.clone())),
            write_errors: WriteErrorPolicy::Inherit,
            options: self.options.clone(),
            super_path: self.super_path.clone(),
            raw: self.raw.clone(),
            no_capture: self.no_capture,
            depth: self.depth,
            local: LocalData::new(),
        }
    }

    /// Child executor that adds `funcs` in front of this one's.
    pub fn with_funcs(&self, funcs: &FuncMap) -> Result<Executor, FuncError> {
        let mut child = self.child();
        child.funcs.extend(funcs)?;
        Ok(child)
    }

    /// Child executor whose own layer is `scope`.
    #[must_use]
    pub fn with_func_scope(&self, scope: &FuncScope) -> Executor {
        let mut child = self.child();
        child.funcs = scope.clone();
        child
    }

    /// Child executor running with `options`.
    #[must_use]
    pub fn with_options(&self, options: ExecOptions) -> Executor {
        let mut child = self.child();
        child.options = options;
        child
    }

    /// Add functions to this executor's own layer.
    pub fn add_funcs(&mut self, funcs: &FuncMap) -> Result<&mut Self, FuncError> {
        self.funcs.extend(funcs)?;
        Ok(self)
    }

    /// Executor whose failures are also written into the output.
    #[must_use]
    pub fn write_error(&self) -> Executor {
        self.with_policy(WriteErrorPolicy::Force)
    }

    /// Executor whose failures are only returned.
    #[must_use]
    pub fn not_write_error(&self) -> Executor {
        self.with_policy(WriteErrorPolicy::Suppress)
    }

    fn with_policy(&self, policy: WriteErrorPolicy) -> Executor {
        if self.write_errors == policy {
            return self.clone();
        }
        let mut child = self.child();
        child.write_errors = policy;
        child
    }

    /// The nearest explicit write-error policy, walking up the parents.
    pub fn is_write_error(&self) -> bool {
        let mut exec = Some(self);
        while let Some(e) = exec {
            match e.write_errors {
                WriteErrorPolicy::Force => return true,
                WriteErrorPolicy::Suppress => return false,
                WriteErrorPolicy::Inherit => exec = e.parent.as_deref(),
            }
        }
        false
    }

    /// Let exits and panics escape to an enclosing render instead of
    /// stopping at this one.
    #[must_use]
    pub fn no_capture(mut self) -> Executor {
        self.no_capture = true;
        self
    }

    /// Prefix error paths with the executors that led here.
    #[must_use]
    pub fn with_super(mut self, path: &TemplatePath) -> Executor {
        self.super_path = path.0.clone();
        self
    }

    pub fn find_func(&self, name: &str) -> Option<FuncValue> {
        let mut exec = Some(self);
        while let Some(e) = exec {
            if let Some(f) = e.funcs.get(name) {
                return Some(f.clone());
            }
            exec = e.parent.as_deref();
        }
        None
    }

    /// Functions visible through this executor, restricted to `names`
    /// (all of them when empty).
    pub fn filter_funcs<S: AsRef<str>>(&self, names: &[S]) -> Result<FuncScope, FuncError> {
        let mut chain = Vec::new();
        let mut exec = Some(self);
        while let Some(e) = exec {
            chain.push(&e.funcs);
            exec = e.parent.as_deref();
        }
        FuncScope::merged(chain).filter(names)
    }

    pub fn funcs(&self) -> &FuncScope {
        &self.funcs
    }

    pub fn parent(&self) -> Option<&Executor> {
        self.parent.as_deref()
    }

    pub fn set(&self) -> &Arc<TemplateSet> {
        &self.set
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ExecOptions {
        &mut self.options
    }

    pub fn local(&self) -> &LocalData {
        &self.local
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Chain of templates from the outermost render to this executor.
    pub fn full_path(&self) -> TemplatePath {
        let mut path = TemplatePath(self.super_path.clone());
        path.push(StateLocation {
            template_name: self.template.name().to_string(),
            template_path: self.template.source_name().to_string(),
            ..StateLocation::default()
        });
        path
    }

    /// Replace this executor's own function layer.
    pub(crate) fn set_funcs(&mut self, scope: FuncScope) {
        self.funcs = scope;
    }

    /// Executor for a `yield` or `template_exec` issued from a render of
    /// this one: `template` in the same set, seeing `globals`, starting at
    /// `depth`.
    pub(crate) fn nested(
        &self,
        template: Arc<Template>,
        globals: Vec<(String, Value)>,
        depth: usize,
        caller: StateLocation,
    ) -> Executor {
        let mut super_path = self.super_path.clone();
        super_path.push(caller);
        let mut options = self.options.clone();
        options.globals = globals;
        Executor {
            set: Arc::clone(&self.set),
            template,
            funcs: FuncScope::new(),
            parent: Some(Arc::new(self.clone())),
            write_errors: WriteErrorPolicy::Inherit,
            options,
            super_path,
            raw: None,
            no_capture: true,
            depth,
            local: LocalData::new(),
        }
    }

    /// Render into `w`.
    ///
    /// `extra` function maps are added in a child executor for this render
    /// only. Data wrapped in [`DataFuncs`] is unwrapped and its functions
    /// are added the same way.
    #[tracing::instrument(level = "debug", skip_all, fields(template = %self.template.name()))]
    pub fn execute(&self, w: &mut dyn io::Write, data: Value, extra: &[FuncMap]) -> Result<(), RenderError> {
        let mut child = None;
        for funcs in extra {
            let exec = child.get_or_insert_with(|| self.child());
            if let Err(err) = exec.funcs.extend(funcs) {
                return Err(self.report(w, RenderError::Func(err)));
            }
        }
        let (data, exec) = match data.downcast_object::<DataFuncs>() {
            Some(df) => {
                let base = child.as_ref().unwrap_or(self);
                (df.data.clone(), Some(base.with_func_scope(&df.funcs)))
            }
            None => (data, child),
        };
        let exec = exec.as_ref().unwrap_or(self);
        let result = exec.render(w, data);
        exec.finish(w, result)
    }

    /// Render into a string.
    pub fn execute_string(&self, data: Value, extra: &[FuncMap]) -> Result<String, RenderError> {
        let mut out = Vec::new();
        self.execute(&mut out, data, extra)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Run the template and hand back the raw outcome. Panics are caught
    /// here unless this executor lets them through.
    pub(crate) fn render(&self, w: &mut dyn io::Write, data: Value) -> Result<(), EvalError> {
        if let Some(raw) = &self.raw {
            return raw(w).map_err(stencil_value::write_failed);
        }
        let template: &Template = &self.template;
        let Some(tree) = template.tree() else {
            return Err(empty_template(template.name()));
        };
        let mut state = State::new(self, w, data);
        if self.no_capture {
            return state.walk_root(tree);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| state.walk_root(tree))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(template = %template.name(), %message, "panic while rendering");
                Err(state.locate(panicked(message, Backtrace::force_capture())))
            }
        }
    }

    fn finish(&self, w: &mut dyn io::Write, result: Result<(), EvalError>) -> Result<(), RenderError> {
        let err = match result {
            Ok(()) => return Ok(()),
            Err(err) if err.is_exit() && !self.no_capture => {
                tracing::debug!("render stopped by exit");
                return Ok(());
            }
            Err(err) => err,
        };
        let err = match err.write_error() {
            Some(sink) => return Err(RenderError::from_sink(sink)),
            None => RenderError::Exec(ExecError::new(err, self.template.name(), &self.full_path())),
        };
        Err(self.report(w, err))
    }

    /// Under the write-error policy, also put the error text into the
    /// output.
    fn report(&self, w: &mut dyn io::Write, err: RenderError) -> RenderError {
        if self.is_write_error() {
            tracing::warn!(error = %err, "render error written to output");
            if let Err(io) = write!(w, "{err}") {
                return RenderError::Write(io);
            }
        }
        err
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("template", &self.template.name())
            .field("funcs", &self.funcs.names())
            .field("parent", &self.parent)
            .field("write_errors", &self.write_errors)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
