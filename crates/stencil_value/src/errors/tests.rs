use super::*;
use pretty_assertions::assert_eq;

// Kind → message

#[test]
fn division_by_zero_has_correct_kind() {
    let err = division_by_zero();
    assert_eq!(err.kind, EvalErrorKind::DivisionByZero);
    assert_eq!(err.message, "division by zero");
}

#[test]
fn bad_operator_names_both_types() {
    let err = bad_operator(BinaryOp::Sub, &Value::string("a"), &Value::int(1));
    assert_eq!(err.message, r#"bad operator "-" of types string and int"#);
}

#[test]
fn arity_mismatch_messages() {
    assert_eq!(
        wrong_arg_count("len", 1, 2).message,
        "wrong number of args for len: want 1 got 2"
    );
    assert_eq!(
        too_few_args("printf", 1, 0).message,
        "wrong number of args for printf: want at least 1 got 0"
    );
}

#[test]
fn lookup_messages_quote_names() {
    assert_eq!(
        undefined_template("footer").message,
        r#"template "footer" not defined"#
    );
    assert_eq!(
        undefined_function("nope").message,
        r#""nope" is not a defined function"#
    );
    assert_eq!(missing_key("Name").message, r#"map has no entry for key "Name""#);
    assert_eq!(nil_data("Name").message, r#"nil data; no entry for key "Name""#);
    assert_eq!(
        no_such_field("Age", "Person").message,
        "can't evaluate field Age in type Person"
    );
}

#[test]
fn template_messages() {
    assert_eq!(
        bad_template_args("row", 2, 1).message,
        r#"bad template args "row". Want 2 but got 1."#
    );
    assert_eq!(
        depth_exceeded(100_000).message,
        "exceeded maximum template depth (100000)"
    );
    assert_eq!(
        empty_template("page").message,
        "'page' is an incomplete or empty template"
    );
}

#[test]
fn call_failed_keeps_host_message() {
    let host = EvalError::new("boom");
    let err = call_failed("explode", &host);
    assert_eq!(err.message, "error calling explode: boom");
    assert!(err.is_wrappable());
}

// Signals and wrapping

#[test]
fn exit_is_a_signal_not_wrappable() {
    let err = exit_signal();
    assert!(err.is_exit());
    assert!(err.is_signal());
    assert!(!err.is_wrappable());
}

#[test]
fn write_signal_exposes_io_error() {
    let err = write_failed(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
    assert!(err.write_error().is_some());
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(err.message, "error writing output: pipe closed");
}

#[test]
fn fatal_and_located_errors_are_not_rewrapped() {
    assert!(!EvalError::new("x").into_fatal().is_wrappable());
    let located = EvalError::new("x").with_site(ErrorSite {
        template: "t".into(),
        location: "t:1:0".into(),
        context: ".A".into(),
        path: "`t`".into(),
    });
    assert!(!located.is_wrappable());
}

#[test]
fn panics_are_fatal_with_trace() {
    let err = panicked("oops", Backtrace::disabled());
    assert!(err.is_fatal());
    assert!(err.trace.is_some());
    assert_eq!(err.message, "panic: oops");
}

// Backtrace

#[test]
fn frames_accumulate_innermost_first() {
    let err = EvalError::new("x")
        .with_frame("inner", Some("a.tmpl:3:4".into()))
        .with_frame("outer", None);
    let bt = err.backtrace.as_ref().map(ToString::to_string).unwrap_or_default();
    assert_eq!(bt, "stack backtrace:\n  0: inner at a.tmpl:3:4\n  1: outer\n");
}

#[test]
fn empty_backtrace_displays_nothing() {
    assert_eq!(EvalBacktrace::default().to_string(), "");
    assert!(EvalBacktrace::new(vec![]).is_empty());
}

#[test]
fn spans_attach() {
    let err = EvalError::new("x").with_span(Span::new(1, 2));
    assert_eq!(err.span, Some(Span::new(1, 2)));
    assert_eq!(err.to_string(), "x");
}
