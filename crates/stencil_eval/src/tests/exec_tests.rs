use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use stencil_ir::build::{
    action, boolean, chain, cmd, dot, field, ident, if_node, list, number, pipe, string, sub_pipe,
    text, var, with_node,
};
use stencil_ir::{ListNode, Tree};
use stencil_value::{
    Arity, AttrGetter, EvalError, FuncMap, Function, Object, Record, Value,
};

use super::{call, render, render_err, set_of, show, try_render};
use crate::{ExecOptions, MissingKey, RenderError, TemplateSet};

fn render_with(root: ListNode, data: Value, funcs: FuncMap) -> Result<String, RenderError> {
    let exec = set_of([Tree::new("t", root)]).executor("t").unwrap();
    exec.execute_string(data, &[funcs])
}

fn render_opts(root: ListNode, data: Value, options: ExecOptions) -> Result<String, RenderError> {
    let exec = set_of([Tree::new("t", root)]).executor("t").unwrap();
    exec.with_options(options).execute_string(data, &[])
}

fn user() -> Value {
    Value::record(
        Record::new("User")
            .field("Name", Value::string("Ada"))
            .field("Age", Value::int(36))
            .method(
                "Greet",
                Function::fixed(2, |args| {
                    let name = args[0]
                        .as_record()
                        .and_then(|r| r.get("Name"))
                        .cloned()
                        .unwrap_or_default();
                    Ok(Value::string(format!("hi {} from {name}", args[1])))
                }),
            ),
    )
}

// Text and printing

#[test]
fn text_and_actions() {
    let root = list([text("Hi "), show(field(".Name")), text("!")]);
    assert_eq!(render(root, Value::map_from([("Name", Value::string("Ada"))])), "Hi Ada!");
}

#[test]
fn printed_forms() {
    let data = Value::map_from([
        ("L", Value::list(vec![Value::int(1), Value::None, Value::string("x")])),
        ("M", Value::map_from([("b", Value::Bool(true)), ("a", Value::float(1.5))])),
        ("P", Value::presence(Value::int(3), true)),
    ]);
    let root = list([
        show(field(".L")),
        text("|"),
        show(field(".M")),
        text("|"),
        show(field(".P")),
        text("|"),
        show(field(".Missing")),
    ]);
    assert_eq!(render(root, data), "[1 <nil> x]|map[a:1.5 b:true]|{3 true}|<no value>");
}

#[test]
fn function_values_are_called_when_printed() {
    let data = Value::map_from([("F", Value::func(Function::fixed(0, |_| Ok(Value::string("called")))))]);
    assert_eq!(render(list([show(field(".F"))]), data), "called");
}

#[test]
fn channels_cannot_be_printed() {
    let (_tx, rx) = crossbeam::channel::unbounded::<Value>();
    let err = render_err(list([show(field(".C"))]), Value::map_from([("C", Value::chan(rx))]));
    assert!(err.ends_with("can't print .C of type chan"), "{err}");
}

// Conditionals

#[test]
fn if_follows_truth() {
    let root = || {
        list([if_node(
            pipe([cmd([field(".X")])]),
            list([text("yes")]),
            Some(list([text("no")])),
        )])
    };
    let falsy = [
        Value::int(0),
        Value::string(""),
        Value::list(Vec::new()),
        Value::Bool(false),
        Value::None,
        Value::presence(Value::int(1), false),
    ];
    for v in falsy {
        assert_eq!(render(root(), Value::map_from([("X", v.clone())])), "no", "{v:?}");
    }
    for v in [Value::int(-1), Value::string("x"), user()] {
        assert_eq!(render(root(), Value::map_from([("X", v.clone())])), "yes", "{v:?}");
    }
}

#[test]
fn with_rebinds_dot() {
    let root = || {
        list([with_node(
            pipe([cmd([field(".User")])]),
            list([show(field(".Name"))]),
            Some(list([text("anon")])),
        )])
    };
    assert_eq!(render(root(), Value::map_from([("User", user())])), "Ada");
    assert_eq!(render(root(), Value::map_from([("User", Value::None)])), "anon");
    assert_eq!(render(root(), Value::map_from([("Other", Value::int(1))])), "anon");
}

// Variables

#[test]
fn declare_assign_and_compound() {
    let root = list([
        action(pipe([cmd([number("1")])]).declare("$x")),
        action(pipe([cmd([number("2")])]).compound("$x", stencil_ir::BinaryOp::Add)),
        show(var("$x")),
        action(pipe([cmd([string("s")])]).assign("$x")),
        show(var("$x")),
        show(var("$.N")),
    ]);
    assert_eq!(render(root, Value::map_from([("N", Value::int(7))])), "3s7");
}

#[test]
fn variables_end_with_their_block() {
    let root = list([
        if_node(
            pipe([cmd([boolean(true)])]),
            list([action(pipe([cmd([number("1")])]).declare("$x"))]),
            None,
        ),
        show(var("$x")),
    ]);
    assert!(render_err(root, Value::Invalid).ends_with("undefined variable: $x"));
}

#[test]
fn assigning_an_undeclared_variable_fails() {
    let root = list([action(pipe([cmd([number("1")])]).assign("$y"))]);
    assert!(render_err(root, Value::Invalid).ends_with("undefined variable: $y"));
}

#[test]
fn globals_and_self() {
    let root = list([with_node(
        pipe([cmd([field(".Inner")])]),
        list([
            show(dot()),
            text(" "),
            show(chain(ident("GLOBALS"), ".N")),
            text(" "),
            show(chain(ident("SELF"), ".N")),
        ]),
        None,
    )]);
    let data = Value::map_from([("Inner", Value::string("in")), ("N", Value::int(1))]);
    assert_eq!(render(root, data), "in 1 1");
}

// Fields

#[test]
fn record_fields_and_methods() {
    let root = list([
        show(field(".Name")),
        text(" "),
        show(field(".Age")),
        text(" "),
        action(pipe([cmd([field(".Greet"), string("Bob")])])),
    ]);
    assert_eq!(render(root, user()), "Ada 36 hi Bob from Ada");
}

#[test]
fn field_errors() {
    let err = render_err(list([show(field(".Email"))]), user());
    assert!(err.ends_with("can't evaluate field Email in type User"), "{err}");

    let err = render_err(list([action(pipe([cmd([field(".Name"), string("x")])]))]), user());
    assert!(err.ends_with("Name has arguments but cannot be invoked as function"), "{err}");

    let err = render_err(list([show(field(".A.B"))]), Value::map_from([("A", Value::None)]));
    assert!(err.ends_with("nil pointer evaluating <nil>.B"), "{err}");
}

#[test]
fn error_text_names_the_site() {
    let tree = Tree::new("t", list([show(field(".A.B"))])).with_source("page.tmpl", "{{.A.B}}");
    let err = set_of([tree])
        .execute_string("t", Value::map_from([("A", Value::int(1))]))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "template: page.tmpl:1:0: executing `page.tmpl[t]` at <.A.B>: can't evaluate field B in type int"
    );
    let exec = err.as_exec().unwrap();
    assert_eq!(exec.template, "t");
    assert!(!exec.is_fatal());
}

#[test]
fn optional_fields() {
    let root = || list([text("["), show(field(".Email?")), text("]")]);
    assert_eq!(render(root(), user()), "[]");

    let err = render_opts(root(), user(), ExecOptions::new().require_fields(true)).unwrap_err();
    assert!(err.to_string().ends_with("can't evaluate field Email in type User"));

    let hooked = ExecOptions::new().on_missing_field(|receiver, name| {
        Some(Value::string(format!("{}.{name}", receiver.type_name())))
    });
    let out = render_opts(list([show(field(".Email"))]), user(), hooked).unwrap();
    assert_eq!(out, "User.Email");
}

#[test]
fn missing_key_modes() {
    let root = || list([show(field(".B"))]);
    let data = || Value::map_from([("A", Value::int(5))]);

    assert_eq!(render(root(), data()), "<no value>");

    let mut set = TemplateSet::new("t");
    set.add_parse_tree(Tree::new("t", root()));
    set.option("missingkey=zero").unwrap();
    assert_eq!(Arc::new(set).execute_string("t", data()).unwrap(), "0");

    let err = render_opts(root(), data(), ExecOptions::new().missing_key(MissingKey::Error)).unwrap_err();
    assert!(err.to_string().ends_with("map has no entry for key \"B\""), "{err}");

    let mut set = TemplateSet::new("t");
    assert!(matches!(set.option("missingkey=loud"), Err(e) if e.to_string() == "unrecognized option: missingkey=loud"));
}

#[test]
fn missing_keys_chain_to_nothing() {
    let root = || list([show(field(".A.B"))]);
    assert_eq!(render(root(), Value::map_from([("X", Value::int(1))])), "<no value>");
    let err = render_opts(
        root(),
        Value::Invalid,
        ExecOptions::new().missing_key(MissingKey::Error),
    )
    .unwrap_err();
    assert!(err.to_string().ends_with("nil data; no entry for key \"A\""), "{err}");
}

#[derive(Debug)]
struct Attrs;

impl AttrGetter for Attrs {
    fn get_attr(&self, name: &str) -> Option<Value> {
        match name {
            "x" => Some(Value::int(1)),
            "upper" => Some(Value::func(Function::fixed(1, |args| {
                Ok(Value::string(args[0].to_string().to_uppercase()))
            }))),
            _ => None,
        }
    }
}

impl Object for Attrs {
    fn type_name(&self) -> &str {
        "Attrs"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn attr_getter(&self) -> Option<&dyn AttrGetter> {
        Some(self)
    }

    fn field(&self, _name: &str) -> Option<Value> {
        Some(Value::string("never reached"))
    }
}

#[test]
fn attribute_getters_answer_alone() {
    let root = list([
        show(field(".x")),
        text(" "),
        show(field(".nope")),
        text(" "),
        action(pipe([cmd([field(".upper"), string("abc")])])),
    ]);
    assert_eq!(render(root, Value::object(Attrs)), "1 <no value> ABC");
}

// Calls

#[test]
fn pipeline_passes_the_last_value() {
    let join = Function::fixed(2, |args| Ok(Value::string(format!("{}+{}", args[0], args[1]))));
    let root = list([action(pipe([cmd([string("a")]), cmd([ident("j"), string("b")])]))]);
    assert_eq!(render_with(root, Value::Invalid, FuncMap::new().with("j", join)).unwrap(), "b+a");
}

#[test]
fn arity_is_checked_before_the_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let f = Function::fixed(1, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Invalid)
    });
    let root = list([call("f", [string("a"), string("b")])]);
    let err = render_with(root, Value::Invalid, FuncMap::new().with("f", f)).unwrap_err();
    assert!(err.to_string().ends_with("wrong number of args for f: want 1 got 2"), "{err}");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let v = Function::variadic(2, |_| Ok(Value::Invalid));
    let err = render_with(list([call("v", [])]), Value::Invalid, FuncMap::new().with("v", v)).unwrap_err();
    assert!(err.to_string().ends_with("wrong number of args for v: want at least 2 got 0"));
}

#[test]
fn function_failures_are_wrapped_with_the_name() {
    let f = Function::fixed(0, |_| Err(EvalError::new("boom")));
    let err = render_with(list([call("f", [])]), Value::Invalid, FuncMap::new().with("f", f)).unwrap_err();
    assert!(err.to_string().ends_with("error calling f: boom"), "{err}");
}

#[test]
fn calling_lookups() {
    let err = render_err(list([call("nope", [])]), Value::Invalid);
    assert!(err.ends_with("\"nope\" is not a defined function"), "{err}");

    let err = render_err(list([action(pipe([cmd([number("1"), number("2")])]))]), Value::Invalid);
    assert!(err.ends_with("can't give argument to non-function 1"), "{err}");
}

#[test]
fn flagged_results_become_presence() {
    let lookup = Function::flagged(Arity::exactly(1), |args| {
        Ok(match args[0].as_str() {
            Some("k") => (Value::string("v"), true),
            _ => (Value::Invalid, false),
        })
    });
    let found = |key: &str| {
        list([
            if_node(pipe([cmd([ident("lookup"), string(key)])]), list([text("found ")]), None),
            show(chain(sub_pipe(pipe([cmd([ident("lookup"), string(key)])])), ".Val")),
        ])
    };
    let funcs = || FuncMap::new().with("lookup", lookup.clone());
    assert_eq!(render_with(found("k"), Value::Invalid, funcs()).unwrap(), "found v");
    assert_eq!(render_with(found("z"), Value::Invalid, funcs()).unwrap(), "<no value>");
}

#[test]
fn context_bound_functions_resolve_once_per_render() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let factory = stencil_value::ContextFactory::new(move |ctx| {
        counter.fetch_add(1, Ordering::SeqCst);
        let greeting = ctx.host::<String>().cloned().unwrap_or_default();
        Ok(Function::fixed(0, move |_| Ok(Value::string(greeting.clone()))))
    });
    let root = list([call("hello", []), call("hello", []), call("hello", [])]);
    let exec = set_of([Tree::new("t", root)])
        .executor("t")
        .unwrap()
        .with_options(ExecOptions::new().context("hey".to_string()))
        .with_funcs(&FuncMap::new().with("hello", factory))
        .unwrap();
    assert_eq!(exec.execute_string(Value::Invalid, &[]).unwrap(), "heyheyhey");
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    exec.execute_string(Value::Invalid, &[]).unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

/// Hands out a new context-bound function on every lookup.
#[derive(Debug)]
struct FreshFactories(Arc<AtomicUsize>);

impl AttrGetter for FreshFactories {
    fn get_attr(&self, name: &str) -> Option<Value> {
        let builds = Arc::clone(&self.0);
        let out = name.to_uppercase();
        Some(Value::context_func(move |_| {
            builds.fetch_add(1, Ordering::SeqCst);
            let out = out.clone();
            Ok(Function::fixed(0, move |_| Ok(Value::string(out.clone()))))
        }))
    }
}

impl Object for FreshFactories {
    fn type_name(&self) -> &str {
        "FreshFactories"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn attr_getter(&self) -> Option<&dyn AttrGetter> {
        Some(self)
    }
}

#[test]
fn short_lived_factories_never_share_a_cache_entry() {
    let builds = Arc::new(AtomicUsize::new(0));
    let data = Value::object(FreshFactories(Arc::clone(&builds)));
    let root = list([call("a", []), call("b", []), call("a", []), call("b", [])]);
    assert_eq!(render(root, data), "ABAB");
    assert_eq!(builds.load(Ordering::SeqCst), 4);
}

#[test]
fn stateful_host_functions_see_the_render() {
    let peek = Function::stateful(Arity::exactly(0), |interp, _| {
        let x = interp.variable("$x").unwrap_or_default();
        Ok(Value::string(format!("{} {x}", interp.template_name())))
    });
    let root = list([action(pipe([cmd([number("4")])]).declare("$x")), call("peek", [])]);
    assert_eq!(render_with(root, Value::Invalid, FuncMap::new().with("peek", peek)).unwrap(), "t 4");
}

#[test]
fn lookup_order() {
    // Host functions shadow builtins.
    let len = Function::fixed(1, |_| Ok(Value::int(99)));
    let root = list([call("len", [string("abc")])]);
    assert_eq!(render_with(root, Value::Invalid, FuncMap::new().with("len", len)).unwrap(), "99");

    // Render-bound functions can't be shadowed.
    let get = Function::fixed(1, |_| Ok(Value::string("host")));
    let root = list([call("get", [string("k")])]);
    assert_eq!(render_with(root, Value::Invalid, FuncMap::new().with("get", get)).unwrap(), "<no value>");

    // Function fields of the data come last.
    let data = Value::record(
        Record::new("D").field("Shout", Value::func(Function::fixed(1, |args| {
            Ok(Value::string(format!("{}!", args[0])))
        }))),
    );
    assert_eq!(render(list([call("Shout", [string("hey")])]), data), "hey!");
}

#[test]
fn nothing_results_print_empty() {
    let noop = Function::unit(Arity::at_least(0), |_| Ok(()));
    let root = list([text("["), call("noop", [number("1")]), text("]")]);
    assert_eq!(render_with(root, Value::Invalid, FuncMap::new().with("noop", noop)).unwrap(), "[]");
}

#[test]
fn if_rejects_untestable_values() {
    let out = try_render(
        list([if_node(pipe([cmd([field(".X")])]), list([text("y")]), None)]),
        Value::map_from([("X", Value::Block(stencil_value::BlockHandle::new(0)))]),
    );
    assert!(out.unwrap_err().to_string().ends_with("if/with can't use <callback>"));
}
