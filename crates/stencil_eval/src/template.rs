//! Template sets: named parse trees that can call one another.
//!
//! A [`TemplateSet`] is a namespace. Templates in the same set resolve each
//! other's names in `{{template}}`, `yield` and `template_exec`. Cloning a
//! set yields an independent namespace that shares the parsed trees.

use std::fmt;
use std::io;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use stencil_ir::Tree;
use stencil_value::{FuncError, FuncMap, FuncScope, Value};

use crate::errors::RenderError;
use crate::executor::Executor;
use crate::options::{BadOption, MissingKey};

/// One named template of a set.
#[derive(Clone)]
pub struct Template {
    name: String,
    tree: Option<Arc<Tree>>,
    funcs: FuncScope,
}

impl Template {
    /// A name with no body yet.
    pub(crate) fn declared(name: impl Into<String>) -> Self {
        Template {
            name: name.into(),
            tree: None,
            funcs: FuncScope::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> Option<&Arc<Tree>> {
        self.tree.as_ref()
    }

    /// Declared parameter names, bound after the dot.
    pub fn args(&self) -> &[String] {
        self.tree.as_deref().map_or(&[], |t| t.args.as_slice())
    }

    /// Functions that apply while this template executes.
    pub fn funcs(&self) -> &FuncScope {
        &self.funcs
    }

    pub fn is_defined(&self) -> bool {
        self.tree.is_some()
    }

    /// `source [name]`, or just the name when both agree.
    pub fn full_name(&self) -> String {
        match self.tree.as_deref() {
            Some(tree) if !tree.parse_name.is_empty() && tree.parse_name != self.name => {
                format!("{} [{}]", tree.parse_name, self.name)
            }
            _ => self.name.clone(),
        }
    }

    /// Source name, falling back to the template name.
    pub fn source_name(&self) -> &str {
        match self.tree.as_deref() {
            Some(tree) if !tree.parse_name.is_empty() => &tree.parse_name,
            _ => &self.name,
        }
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("defined", &self.is_defined())
            .field("funcs", &self.funcs.names())
            .finish()
    }
}

/// A namespace of templates.
#[derive(Clone, Default)]
pub struct TemplateSet {
    /// Template run by [`TemplateSet::execute`].
    name: String,
    templates: FxHashMap<String, Arc<Template>>,
    missing_key: MissingKey,
}

impl TemplateSet {
    pub fn new(name: impl Into<String>) -> Self {
        TemplateSet {
            name: name.into(),
            ..TemplateSet::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register `tree` under its name.
    ///
    /// A tree with an empty body does not replace one that already has
    /// content, so forward declarations never erase definitions. Functions
    /// attached to the name survive the replacement.
    pub fn add_parse_tree(&mut self, tree: Tree) -> Arc<Template> {
        let name = tree.name.clone();
        let tree = Arc::new(tree);
        let entry = self
            .templates
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Template::declared(name.clone())));
        let keep_old = entry.tree.as_deref().is_some_and(|old| !old.is_empty()) && tree.is_empty();
        if keep_old {
            tracing::trace!(template = %name, "empty redefinition ignored");
        } else {
            Arc::make_mut(entry).tree = Some(tree);
            tracing::debug!(template = %name, "template defined");
        }
        Arc::clone(entry)
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    /// Every template of the set, sorted by name.
    pub fn templates(&self) -> Vec<&Arc<Template>> {
        let mut all: Vec<_> = self.templates.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// `; defined templates are: "a", "b"`, or the empty string when the set
    /// has no template with a body.
    pub fn defined_templates(&self) -> String {
        let names: Vec<String> = self
            .templates()
            .into_iter()
            .filter(|t| t.is_defined())
            .map(|t| format!("{:?}", t.name))
            .collect();
        if names.is_empty() {
            String::new()
        } else {
            format!("; defined templates are: {}", names.join(", "))
        }
    }

    /// Apply a `missingkey=<mode>` option.
    pub fn option(&mut self, option: &str) -> Result<&mut Self, BadOption> {
        self.missing_key = option.parse()?;
        Ok(self)
    }

    pub fn missing_key(&self) -> MissingKey {
        self.missing_key
    }

    /// Attach `funcs` to template `name`. They take precedence over the
    /// executor's functions while that template runs.
    pub fn funcs(&mut self, name: &str, funcs: &FuncMap) -> Result<&mut Self, FuncError> {
        let entry = self
            .templates
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Template::declared(name)));
        Arc::make_mut(entry).funcs.extend(funcs)?;
        Ok(self)
    }

    /// Root executor for template `name`, with the builtin functions.
    pub fn executor(self: &Arc<Self>, name: &str) -> Option<Executor> {
        let template = self.lookup(name)?;
        Some(Executor::root(Arc::clone(self), Arc::clone(template)))
    }

    /// Render the set's own template.
    pub fn execute(self: &Arc<Self>, w: &mut dyn io::Write, data: Value) -> Result<(), RenderError> {
        let name = self.name.clone();
        self.execute_template(w, &name, data)
    }

    /// Render template `name` of the set.
    pub fn execute_template(
        self: &Arc<Self>,
        w: &mut dyn io::Write,
        name: &str,
        data: Value,
    ) -> Result<(), RenderError> {
        let Some(exec) = self.executor(name) else {
            return Err(RenderError::NoTemplate {
                name: name.to_string(),
                owner: self.name.clone(),
            });
        };
        exec.execute(w, data, &[])
    }

    /// Render template `name` into a string.
    pub fn execute_string(self: &Arc<Self>, name: &str, data: Value) -> Result<String, RenderError> {
        let mut out = Vec::new();
        self.execute_template(&mut out, name, data)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateSet")
            .field("name", &self.name)
            .field("templates", &self.templates())
            .field("missing_key", &self.missing_key)
            .finish()
    }
}
