//! The interpreter as seen from inside a stateful host function.

use std::io;

use crate::errors::{EvalError, EvalResult};
use crate::func::{Context, FuncError, FuncScope, FuncValue};
use crate::local::LocalData;
use crate::value::Value;

/// Handle to the body of a `{{callback}}` block, valid while the call that
/// received it is running.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockHandle(u32);

impl BlockHandle {
    pub fn new(index: u32) -> Self {
        BlockHandle(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

/// Operations a running render offers to the functions it calls.
pub trait Interp {
    /// Write to the current output, through any active wrap or capture.
    fn write(&mut self, bytes: &[u8]) -> Result<(), EvalError>;

    fn write_str(&mut self, s: &str) -> Result<(), EvalError> {
        self.write(s.as_bytes())
    }

    /// The data the render started with.
    fn data(&self) -> &Value;

    /// Innermost binding of `name` (including the leading `$`).
    fn variable(&self, name: &str) -> Option<Value>;

    /// Template call depth.
    fn depth(&self) -> usize;

    fn template_name(&self) -> &str;

    /// Render context, as given to context-bound factories.
    fn context(&self) -> &Context;

    /// Look a function up the way a template identifier would be.
    fn find_func(&self, name: &str) -> Option<FuncValue>;

    /// The executor's functions, restricted to `names` (all of them when
    /// empty).
    fn filter_funcs(&self, names: &[&str]) -> Result<FuncScope, FuncError>;

    /// Storage of the executor running this render.
    fn local(&self) -> &LocalData;

    /// Call a function value with already evaluated arguments.
    fn call_value(&mut self, f: &Value, args: &[Value]) -> EvalResult;

    /// Run a callback block with `dot`, exposing `args` as `$@` and their
    /// count as `$!`. Output goes to `out` when given, otherwise to the
    /// current output.
    fn invoke_block(
        &mut self,
        handle: BlockHandle,
        dot: Value,
        args: &[Value],
        out: Option<&mut dyn io::Write>,
    ) -> Result<(), EvalError>;

    /// Render template `name` with `data` and return its output.
    ///
    /// The template sees every variable of the caller as a global.
    fn render_template(&mut self, name: &str, data: Option<Value>) -> Result<String, EvalError>;

    /// Render template `name` into the current output.
    fn yield_template(&mut self, name: &str, data: Option<Value>) -> Result<(), EvalError>;
}
