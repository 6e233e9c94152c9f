//! `printf` and its verb formatting.
//!
//! Verbs: `%v %s %q %d %b %o %x %X %c %e %E %f %F %g %G %t %T %%`, flags
//! `- + 0 # space`, width and precision. Mistakes are written into the
//! result instead of failing: `%!d(MISSING)`, `%!d(string=x)` and a
//! trailing `%!(EXTRA int=1)`. Widths and precisions above a million are
//! dropped with `%!(BADWIDTH)` / `%!(BADPREC)`.

use std::fmt::Write as _;
use std::iter::Peekable;
use std::str::Chars;

use stencil_value::{format_float, Value};

const MAX_WIDTH: usize = 1_000_000;

#[derive(Default)]
struct Spec {
    minus: bool,
    plus: bool,
    zero: bool,
    space: bool,
    sharp: bool,
    width: Option<usize>,
    precision: Option<usize>,
    bad_width: bool,
    bad_precision: bool,
}

pub(super) fn sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut used = 0;
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let spec = parse_spec(&mut chars);
        if spec.bad_width {
            out.push_str("%!(BADWIDTH)");
        }
        if spec.bad_precision {
            out.push_str("%!(BADPREC)");
        }
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        let Some(arg) = args.get(used) else {
            let _ = write!(out, "%!{verb}(MISSING)");
            continue;
        };
        used += 1;
        match format_arg(verb, &spec, arg) {
            Some((body, numeric)) => pad(&mut out, &spec, &body, numeric),
            None => bad_verb(&mut out, verb, arg),
        }
    }
    if used < args.len() {
        out.push_str("%!(EXTRA ");
        for (i, arg) in args[used..].iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}={}", arg.type_name(), arg.as_arg());
        }
        out.push(')');
    }
    out
}

fn parse_spec(chars: &mut Peekable<Chars<'_>>) -> Spec {
    let mut spec = Spec::default();
    while let Some(&flag) = chars.peek() {
        match flag {
            '-' => spec.minus = true,
            '+' => spec.plus = true,
            '0' => spec.zero = true,
            ' ' => spec.space = true,
            '#' => spec.sharp = true,
            _ => break,
        }
        chars.next();
    }
    spec.width = digits(chars);
    if spec.width.is_some_and(|w| w > MAX_WIDTH) {
        spec.width = None;
        spec.bad_width = true;
    }
    if chars.peek() == Some(&'.') {
        chars.next();
        match digits(chars).unwrap_or(0) {
            p if p > MAX_WIDTH => spec.bad_precision = true,
            p => spec.precision = Some(p),
        }
    }
    spec
}

fn digits(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        chars.next();
        let d = usize::try_from(d).unwrap_or(0);
        n = Some(n.unwrap_or(0).saturating_mul(10).saturating_add(d));
    }
    n
}

fn bad_verb(out: &mut String, verb: char, arg: &Value) {
    if arg.is_nil() {
        let _ = write!(out, "%!{verb}(<nil>)");
    } else {
        let _ = write!(out, "%!{verb}({}={})", arg.type_name(), arg.as_arg());
    }
}

/// Formatted argument and whether it is a number (zero padding applies),
/// or `None` when `verb` doesn't apply to it.
fn format_arg(verb: char, spec: &Spec, arg: &Value) -> Option<(String, bool)> {
    let value = arg.indirect();
    if verb == 'T' {
        return Some((arg.type_name().into_owned(), false));
    }
    match (verb, value) {
        ('v' | 'd', Value::Int(n)) => Some((signed(spec, *n < 0, n.unsigned_abs().to_string()), true)),
        ('v' | 'd', Value::Uint(n)) => Some((signed(spec, false, n.to_string()), true)),
        ('v' | 'g' | 'G', Value::Float(f)) => Some((float_g(spec, verb, *f), true)),
        ('v', _) => Some((truncate(spec, value.as_arg().to_string()), false)),
        ('s', Value::Int(_) | Value::Uint(_) | Value::Float(_) | Value::Bool(_)) => None,
        ('s', _) => Some((truncate(spec, value.as_arg().to_string()), false)),
        ('q', Value::Str(s)) => Some((format!("{:?}", s.as_str()), false)),
        ('q', Value::Int(_) | Value::Uint(_)) => code_point(value).map(|c| (format!("{c:?}"), false)),
        ('c', Value::Int(_) | Value::Uint(_)) => code_point(value).map(|c| (c.to_string(), false)),
        ('b' | 'o' | 'x' | 'X', Value::Int(n)) => Some((radix(spec, verb, *n < 0, u128::from(n.unsigned_abs())), true)),
        ('b' | 'o' | 'x' | 'X', Value::Uint(n)) => Some((radix(spec, verb, false, u128::from(*n)), true)),
        ('x' | 'X', Value::Str(s)) => {
            let mut hex = String::with_capacity(s.len() * 2);
            for b in s.bytes() {
                let _ = if verb == 'x' { write!(hex, "{b:02x}") } else { write!(hex, "{b:02X}") };
            }
            Some((hex, false))
        }
        ('e' | 'E' | 'f' | 'F', Value::Float(f)) => Some((float_fixed(spec, verb, *f), true)),
        ('t', Value::Bool(b)) => Some((b.to_string(), false)),
        _ => None,
    }
}

fn code_point(value: &Value) -> Option<char> {
    let n = match value {
        Value::Int(n) => u32::try_from(*n).ok()?,
        Value::Uint(n) => u32::try_from(*n).ok()?,
        _ => return None,
    };
    Some(char::from_u32(n).unwrap_or('\u{FFFD}'))
}

fn sign(spec: &Spec, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

fn signed(spec: &Spec, negative: bool, magnitude: String) -> String {
    format!("{}{magnitude}", sign(spec, negative))
}

fn radix(spec: &Spec, verb: char, negative: bool, magnitude: u128) -> String {
    let (digits, prefix) = match verb {
        'b' => (format!("{magnitude:b}"), "0b"),
        'o' => (format!("{magnitude:o}"), "0"),
        'x' => (format!("{magnitude:x}"), "0x"),
        _ => (format!("{magnitude:X}"), "0X"),
    };
    let prefix = if spec.sharp { prefix } else { "" };
    format!("{}{prefix}{digits}", sign(spec, negative))
}

fn float_fixed(spec: &Spec, verb: char, f: f64) -> String {
    let precision = spec.precision.unwrap_or(6);
    let body = match verb {
        'e' | 'E' => {
            let sci = format!("{:.precision$e}", f.abs());
            let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
            let exp: i32 = exp.parse().unwrap_or(0);
            let e = if verb == 'e' { 'e' } else { 'E' };
            let exp_sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}{e}{exp_sign}{:02}", exp.unsigned_abs())
        }
        _ => format!("{:.precision$}", f.abs()),
    };
    signed(spec, f < 0.0, body)
}

fn float_g(spec: &Spec, verb: char, f: f64) -> String {
    let body = match spec.precision {
        Some(p) => {
            let text = format!("{:.*e}", p.saturating_sub(1), f.abs());
            text.parse::<f64>().map_or(text, format_float)
        }
        None => format_float(f.abs()),
    };
    let body = if verb == 'G' { body.to_uppercase() } else { body };
    signed(spec, f < 0.0, body)
}

/// Precision on strings limits the number of characters.
fn truncate(spec: &Spec, s: String) -> String {
    match spec.precision {
        Some(p) => s.chars().take(p).collect(),
        None => s,
    }
}

fn pad(out: &mut String, spec: &Spec, body: &str, numeric: bool) {
    let len = body.chars().count();
    let Some(fill) = spec.width.and_then(|w| w.checked_sub(len)).filter(|n| *n > 0) else {
        out.push_str(body);
        return;
    };
    if spec.minus {
        out.push_str(body);
        out.push_str(&" ".repeat(fill));
    } else if spec.zero && numeric {
        let split = body.find(|c: char| c.is_ascii_digit()).unwrap_or(0);
        out.push_str(&body[..split]);
        out.push_str(&"0".repeat(fill));
        out.push_str(&body[split..]);
    } else {
        out.push_str(&" ".repeat(fill));
        out.push_str(body);
    }
}
