//! Template calls.
//!
//! `{{template "name" pipeline}}` walks the callee inside this render with
//! a fresh variable frame. `yield` and `template_exec` instead run the
//! callee on a nested executor whose globals are the caller's variables.

use std::io;
use std::sync::Arc;

use stencil_ir::TemplateNode;
use stencil_value::{
    bad_template_args, depth_exceeded, empty_template, undefined_template, DataFuncs, EvalError, Value,
};

use super::pipeline::Arg;
use super::{State, DOLLAR};
use crate::stack::ensure_sufficient_stack;
use crate::template::Template;

impl<'a> State<'a> {
    fn callee(&self, name: &str) -> Result<&'a Arc<Template>, EvalError> {
        let exec = self.exec;
        let tmpl = exec.set().lookup(name).ok_or_else(|| undefined_template(name))?;
        let limit = exec.options().depth_limit();
        if self.depth >= limit {
            return Err(depth_exceeded(limit));
        }
        Ok(tmpl)
    }

    pub(super) fn walk_template(&mut self, dot: &Value, node: &'a TemplateNode) -> Result<(), EvalError> {
        let tmpl: &'a Template = self.callee(&node.name)?;
        let tree = tmpl.tree().ok_or_else(|| empty_template(&node.name))?;

        // The first operand becomes the callee's dot; the rest bind its
        // declared arguments, evaluated against the caller's dot.
        let mut new_dot = dot.clone();
        let mut values = Vec::new();
        if let Some(pipe) = &node.pipe {
            match pipe.cmds.as_slice() {
                [cmd] if !cmd.args.is_empty() => {
                    new_dot = self.eval_arg(dot, &Arg::Node(&cmd.args[0]))?;
                    self.bind_decls(&pipe.decl, &new_dot)?;
                    for arg in &cmd.args[1..] {
                        values.push(self.eval_arg(dot, &Arg::Node(arg))?);
                    }
                }
                _ => new_dot = self.eval_pipeline(dot, pipe)?,
            }
        }
        if values.len() != tree.args.len() {
            return Err(bad_template_args(&node.name, tree.args.len(), values.len()));
        }

        let inherited = tree.inherited_vars_len.min(self.vars.len());
        let mut vars = Vec::with_capacity(inherited + 1 + values.len());
        vars.extend_from_slice(&self.vars[..inherited]);
        vars.push((DOLLAR.to_string(), new_dot.clone()));
        vars.extend(tree.args.iter().cloned().zip(values));

        tracing::debug!(template = %node.name, depth = self.depth + 1, "template call");
        let saved_vars = std::mem::replace(&mut self.vars, vars);
        let saved_tmpl = std::mem::replace(&mut self.tmpl, tmpl);
        self.at(node.span, node);
        let saved_at = self.at;
        let pushed = !tmpl.funcs().is_empty();
        if pushed {
            self.overrides.push(tmpl.funcs());
        }
        self.depth += 1;

        let result = ensure_sufficient_stack(|| self.walk_list(&new_dot, &tree.root));

        self.depth -= 1;
        if pushed {
            self.overrides.pop();
        }
        self.tmpl = saved_tmpl;
        self.vars = saved_vars;
        self.at = saved_at;
        result.map_err(|err| {
            let location = self.location();
            err.with_frame(node.name.clone(), Some(location.to_string()))
        })
    }

    /// Render template `name` on a nested executor into `out`.
    pub(super) fn render_nested(&mut self, name: &str, data: Value, out: &mut dyn io::Write) -> Result<(), EvalError> {
        let tmpl = self.callee(name)?;
        let mut globals = self.globals.to_vec();
        globals.extend(self.vars.iter().cloned());
        let mut nested = self
            .exec
            .nested(Arc::clone(tmpl), globals, self.depth + 1, self.location());
        let data = match data.downcast_object::<DataFuncs>() {
            Some(df) => {
                nested.set_funcs(df.funcs.clone());
                df.data.clone()
            }
            None => data,
        };
        tracing::debug!(template = %name, depth = self.depth + 1, "nested render");
        nested
            .render(out, data)
            .map_err(|err| err.with_frame(format!("{}/{name}", self.tmpl.name()), None))
    }
}
