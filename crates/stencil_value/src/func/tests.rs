use super::*;
use crate::value::Object;
use pretty_assertions::assert_eq;

fn add() -> Function {
    Function::fixed(2, |args| match (&args[0], &args[1]) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::int(a.wrapping_add(*b))),
        _ => Err(EvalError::new("add expects ints")),
    })
}

// Names

#[test]
fn valid_identifiers() {
    for name in ["a", "_x", "snake_case", "CamelCase9", "é"] {
        assert!(is_valid_name(name), "{name} should be valid");
    }
    for name in ["", "9lives", "has-dash", "dot.ted", "sp ace"] {
        assert!(!is_valid_name(name), "{name} should be invalid");
    }
}

#[test]
fn registry_rejects_bad_names() {
    let mut scope = FuncScope::new();
    let err = scope.set("2bad", add()).unwrap_err();
    assert_eq!(err, FuncError::BadName("2bad".into()));
    assert_eq!(
        err.to_string(),
        r#"function name "2bad" is not a valid identifier"#
    );
    assert!(!scope.contains("2bad"));
}

#[test]
fn registry_rejects_tuple_results() {
    let mut scope = FuncScope::new();
    let f = Function::tuple(Arity::exactly(0), 3, |_| Ok(vec![Value::None; 3]));
    let err = scope.set("triple", f).unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"can't install method/function "triple": bad return type"#
    );
}

#[test]
fn registry_accepts_flagged_results() {
    let mut scope = FuncScope::new();
    let lookup = Function::flagged(Arity::exactly(1), |args| Ok((args[0].clone(), true)));
    assert!(scope.set("lookup", lookup).is_ok());
}

// Layers

#[test]
fn front_layer_shadows_later_layers() {
    let base: FuncScope = FuncMap::new()
        .with("f", Function::fixed(0, |_| Ok(Value::int(1))))
        .with("g", Function::fixed(0, |_| Ok(Value::int(2))))
        .try_into()
        .unwrap();
    let mut scope = FuncScope::merged([&base]);
    scope
        .set("f", Function::fixed(0, |_| Ok(Value::int(10))))
        .unwrap();

    let call = |name: &str| {
        scope
            .get(name)
            .and_then(FuncValue::as_direct)
            .map(|f| f.call_plain(&[]).unwrap().into_value())
    };
    assert_eq!(call("f"), Some(Value::int(10)));
    assert_eq!(call("g"), Some(Value::int(2)));
    assert_eq!(call("h"), None);
}

#[test]
fn writes_never_leak_into_shared_layers() {
    let base: FuncScope = FuncMap::new().with("f", add()).try_into().unwrap();
    let mut copy = base.clone();
    copy.set("g", add()).unwrap();
    assert!(copy.contains("g"));
    assert!(!base.contains("g"));
}

#[test]
fn merged_skips_empty_layers() {
    let empty = FuncScope::new();
    let one: FuncScope = FuncMap::new().with("f", add()).try_into().unwrap();
    let merged = FuncScope::merged([&empty, &one, &empty]);
    assert_eq!(format!("{merged:?}"), r#"FuncScope { layers: 2, names: {"f"} }"#);
    assert!(merged.contains("f"));
}

#[test]
fn filter_selects_named_functions() {
    let mut scope: FuncScope = FuncMap::new().with("a", add()).try_into().unwrap();
    let later: FuncScope = FuncMap::new().with("b", add()).try_into().unwrap();
    scope.append(&later);

    let picked = scope.filter(&["b"]).unwrap();
    assert_eq!(picked.names().into_iter().collect::<Vec<_>>(), vec!["b"]);

    let all = scope.filter::<&str>(&[]).unwrap();
    assert_eq!(all.names().into_iter().collect::<Vec<_>>(), vec!["a", "b"]);

    let err = scope.filter(&["zzz"]).unwrap_err();
    assert_eq!(err.to_string(), r#"Function "zzz" doesn't exists."#);
}

#[test]
fn extend_stops_at_first_bad_entry() {
    let mut scope = FuncScope::new();
    let map = FuncMap::new()
        .with("ok", add())
        .with("bad name", add())
        .with("later", add());
    assert!(scope.extend(&map).is_err());
    assert!(scope.contains("ok"));
    assert!(!scope.contains("later"));
}

// Arity

#[test]
fn arity_checks_name_the_function() {
    let f = add();
    assert!(f.check_arity("add", 2).is_ok());
    assert_eq!(
        f.check_arity("add", 3).unwrap_err().message,
        "wrong number of args for add: want 2 got 3"
    );

    let v = Function::variadic(1, |args| Ok(Value::list(args.to_vec())));
    assert!(v.check_arity("list", 4).is_ok());
    assert_eq!(
        v.check_arity("list", 0).unwrap_err().message,
        "wrong number of args for list: want at least 1 got 0"
    );
}

#[test]
fn bind_prepends_receiver() {
    let bound = add().bind(Value::int(40));
    assert_eq!(bound.arity(), Arity::exactly(1));
    let out = bound.call_plain(&[Value::int(2)]).unwrap();
    assert_eq!(out, Outcome::Value(Value::int(42)));
}

#[test]
fn outcomes_normalize() {
    assert_eq!(Outcome::Nothing.into_value(), Value::string(""));
    assert_eq!(
        Outcome::Flagged(Value::int(1), false).into_value(),
        Value::presence(Value::int(1), false)
    );
    assert_eq!(
        Outcome::Tuple(vec![Value::int(1), Value::int(2), Value::int(3)]).into_value(),
        Value::list(vec![Value::int(1), Value::int(2), Value::int(3)])
    );
}

#[test]
fn stateful_functions_need_an_interpreter() {
    let f = Function::stateful(Arity::exactly(0), |interp, _| {
        Ok(Value::string(interp.template_name()))
    });
    assert!(f.takes_state());
    assert!(f.call_plain(&[]).is_err());
}

// Context

#[test]
fn context_factory_sees_data_and_host() {
    let factory = ContextFactory::new(|ctx: &Context| {
        let greeting = ctx.host::<String>().cloned().unwrap_or_default();
        let data = ctx.data().clone();
        Ok(Function::fixed(0, move |_| {
            Ok(Value::string(format!("{greeting} {data}")))
        }))
    });
    let ctx = Context::new(FuncScope::new(), Value::string("world"))
        .with_host(Some(std::sync::Arc::new("hello".to_string())));
    let f = FuncValue::from(factory.clone()).resolve(&ctx).unwrap();
    assert_eq!(
        f.call_plain(&[]).unwrap().into_value(),
        Value::string("hello world")
    );
    assert!(FuncValue::from(factory.clone()).ptr_eq(&FuncValue::from(factory)));
}

#[test]
fn context_call_resolves_by_name() {
    let scope: FuncScope = FuncMap::new().with("add", add()).try_into().unwrap();
    let ctx = Context::new(scope, Value::None);
    assert_eq!(
        ctx.call("add", &[Value::int(1), Value::int(2)]).unwrap(),
        Value::int(3)
    );
    assert_eq!(
        ctx.call("missing", &[]).unwrap_err().message,
        r#""missing" is not a defined function"#
    );
    assert!(ctx.call("add", &[Value::int(1)]).is_err());
}

#[test]
fn data_funcs_select_from_scope() {
    let scope: FuncScope = FuncMap::new()
        .with("a", add())
        .with("b", add())
        .try_into()
        .unwrap();
    let df = DataFuncs::select(Value::int(1), &scope, &["a"]).unwrap();
    assert!(df.funcs.contains("a"));
    assert!(!df.funcs.contains("b"));
    assert_eq!(df.field("Data"), Some(Value::int(1)));
}
