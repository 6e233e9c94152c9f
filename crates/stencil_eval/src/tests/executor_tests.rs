use std::io;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rayon::prelude::*;
use stencil_ir::build::{dot, field, list, number, string, text};
use stencil_ir::{ListNode, Tree};
use stencil_value::{DataFuncs, FuncMap, FuncScope, Function, Value};

use super::{call, set_of, show};
use crate::{Executor, RenderError, StateLocation, TemplatePath};

fn exec_of(root: ListNode) -> Executor {
    set_of([Tree::new("t", root)]).executor("t").unwrap()
}

fn failing() -> ListNode {
    list([text("before "), show(field(".A.B"))])
}

fn bad_data() -> Value {
    Value::map_from([("A", Value::int(1))])
}

#[test]
fn write_error_puts_the_error_in_the_output() {
    let exec = exec_of(failing()).write_error();
    let mut out = Vec::new();
    let err = exec.execute(&mut out, bad_data(), &[]).unwrap_err();
    assert_eq!(String::from_utf8(out).unwrap(), format!("before {err}"));

    let quiet = exec.not_write_error();
    let mut out = Vec::new();
    quiet.execute(&mut out, bad_data(), &[]).unwrap_err();
    assert_eq!(out, b"before ".to_vec());
}

#[test]
fn write_error_policy_is_inherited() {
    let exec = exec_of(list([text("x")]));
    assert!(!exec.is_write_error());
    let loud = exec.write_error();
    assert!(loud.is_write_error());
    assert!(loud.child().is_write_error());
    assert!(!loud.child().not_write_error().is_write_error());
    assert!(loud.child().not_write_error().write_error().is_write_error());
}

#[test]
fn data_funcs_register_for_one_render() {
    let exec = exec_of(list([call("greet", [dot()])]));
    let mut scope = FuncScope::new();
    scope
        .set("greet", Function::fixed(1, |args| Ok(Value::string(format!("hi {}", args[0])))))
        .unwrap();
    let data = Value::object(DataFuncs::new(Value::string("Ada"), scope));
    assert_eq!(exec.execute_string(data, &[]).unwrap(), "hi Ada");

    let err = exec.execute_string(Value::string("Ada"), &[]).unwrap_err();
    assert!(err.to_string().ends_with("\"greet\" is not a defined function"), "{err}");
}

#[test]
fn extra_function_maps() {
    let exec = exec_of(list([call("a", []), call("b", [])]));
    let a = FuncMap::new().with("a", Function::fixed(0, |_| Ok(Value::string("A"))));
    let b = FuncMap::new().with("b", Function::fixed(0, |_| Ok(Value::string("B"))));
    assert_eq!(exec.execute_string(Value::Invalid, &[a, b]).unwrap(), "AB");

    let bad = FuncMap::new().with("1st", Function::fixed(0, |_| Ok(Value::Invalid)));
    let err = exec.execute_string(Value::Invalid, &[bad]).unwrap_err();
    assert!(matches!(err, RenderError::Func(_)), "{err:?}");
}

#[test]
fn executor_functions_shadow_builtins() {
    let exec = exec_of(list([call("len", [string("abc")])]));
    assert_eq!(exec.execute_string(Value::Invalid, &[]).unwrap(), "3");
    let exec = exec
        .with_funcs(&FuncMap::new().with("len", Function::fixed(1, |_| Ok(Value::int(-1)))))
        .unwrap();
    assert_eq!(exec.execute_string(Value::Invalid, &[]).unwrap(), "-1");
    assert!(exec.funcs().get("len").is_some());
    assert!(exec.parent().is_some_and(|p| p.find_func("html").is_some()));
}

#[test]
fn panics_become_fatal_errors() {
    let boom = FuncMap::new().with("boom", Function::fixed(0, |_| panic!("boom")));
    let exec = exec_of(list([text("a"), call("boom", []), text("b")]));
    let mut out = Vec::new();
    let err = exec.execute(&mut out, Value::Invalid, &[boom]).unwrap_err();
    assert_eq!(out, b"a".to_vec());
    let exec_err = err.as_exec().unwrap();
    assert!(exec_err.is_fatal());
    assert!(exec_err.trace().is_some());
    assert!(err.to_string().ends_with("panic: boom"), "{err}");
}

#[test]
fn exit_keeps_the_partial_output() {
    let root = || list([text("a"), call("exit", []), text("b")]);
    let mut out = Vec::new();
    exec_of(root()).execute(&mut out, Value::Invalid, &[]).unwrap();
    assert_eq!(out, b"a".to_vec());

    let err = exec_of(root())
        .no_capture()
        .execute_string(Value::Invalid, &[])
        .unwrap_err();
    assert!(err.to_string().ends_with("execution stopped by exit"), "{err}");
}

#[test]
fn raw_executors_ignore_data() {
    let raw = Executor::raw(|w| w.write_all(b"raw"));
    assert_eq!(raw.execute_string(bad_data(), &[]).unwrap(), "raw");
    let content = Executor::raw_content(b"fixed".to_vec());
    assert_eq!(content.execute_string(Value::Invalid, &[]).unwrap(), "fixed");
}

struct Broken;

impl io::Write for Broken {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn sink_failures_come_back_as_io_errors() {
    let err = exec_of(list([text("x")])).execute(&mut Broken, Value::Invalid, &[]).unwrap_err();
    match err {
        RenderError::Write(io) => assert_eq!(io.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn call_invokes_function_values() {
    let add = Function::fixed(2, |args| {
        let (a, b) = (args[0].as_int().unwrap_or(0), args[1].as_int().unwrap_or(0));
        Ok(Value::int(a + b))
    });
    let root = list([call("call", [field(".F"), number("2"), number("3")])]);
    let data = Value::map_from([("F", Value::func(add))]);
    assert_eq!(exec_of(root).execute_string(data, &[]).unwrap(), "5");

    let root = list([call("call", [field(".Missing")])]);
    let err = exec_of(root).execute_string(Value::map_from([("X", Value::int(1))]), &[]).unwrap_err();
    assert!(err.to_string().ends_with("call of nil"), "{err}");
}

#[test]
fn super_path_prefixes_error_paths() {
    let outer = StateLocation {
        template_name: "layout".to_string(),
        location: "3:4".to_string(),
        ..StateLocation::default()
    };
    let exec = exec_of(failing()).with_super(&TemplatePath(vec![outer]));
    assert_eq!(exec.full_path().to_string(), "`layout:3:4` » `t`");
    let err = exec.execute_string(bad_data(), &[]).unwrap_err();
    assert!(err.to_string().contains("executing `layout:3:4` » `t` at <.A.B>"), "{err}");
}

#[test]
fn concurrent_renders_share_one_set() {
    let root = list([
        show(dot()),
        text(":"),
        call("printf", [string("%03d"), dot()]),
    ]);
    let exec = exec_of(root);
    let outputs: Vec<String> = (0..64_i64)
        .into_par_iter()
        .map(|i| exec.execute_string(Value::int(i), &[]).unwrap())
        .collect();
    for (i, out) in outputs.iter().enumerate() {
        assert_eq!(out, &format!("{i}:{i:03}"));
    }
}

proptest! {
    #[test]
    fn renders_are_deterministic(s in "[a-zA-Z0-9 ]{0,24}") {
        let exec = exec_of(list([show(dot()), text("|"), call("len", [dot()])]));
        let first = exec.execute_string(Value::string(s.as_str()), &[]).unwrap();
        let second = exec.execute_string(Value::string(s.as_str()), &[]).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first, format!("{s}|{}", s.len()));
    }
}
