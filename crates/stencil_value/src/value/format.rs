//! Text forms of values.
//!
//! Lists print as `[a b]`, maps as `map[k:v]`, records as `{a b}`, and
//! floats in shortest form with an exponent only outside `1e-4..1e21`.

use std::fmt::{self, Write as _};

use super::Value;

/// Shortest round-trip form of `f`, switching to exponent notation when
/// the decimal exponent is below -4 or at least 21.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let sci = format!("{f:e}");
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if (-4..21).contains(&exp) {
        return format!("{f}");
    }
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.unsigned_abs())
}

/// Joins `values` for `print`: a space goes
/// between two operands only when neither is a string.
pub fn sprint(values: &[Value]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 && !values[i - 1].is_str() && !v.is_str() {
            out.push(' ');
        }
        let _ = write!(out, "{}", v.as_arg());
    }
    out
}

/// Like [`sprint`] but always separates operands and ends with a newline.
pub fn sprintln(values: &[Value]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{}", v.as_arg());
    }
    out.push('\n');
    out
}

pub(super) fn write_seq<'a, I>(f: &mut fmt::Formatter<'_>, items: I) -> fmt::Result
where
    I: IntoIterator<Item = &'a Value>,
{
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            f.write_char(' ')?;
        }
        write!(f, "{}", item.as_arg())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn floats_use_shortest_form() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(1e20), "100000000000000000000");
    }

    #[test]
    fn floats_switch_to_exponent_outside_range() {
        assert_eq!(format_float(1e21), "1e+21");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(-2.5e100), "-2.5e+100");
    }

    #[test]
    fn non_finite_floats() {
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(f64::INFINITY), "+Inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn sprint_spaces_only_between_non_strings() {
        let vals = [Value::int(1), Value::int(2), Value::string("a"), Value::int(3)];
        assert_eq!(sprint(&vals), "1 2a3");
        assert_eq!(sprintln(&vals), "1 2 a 3\n");
    }

    #[test]
    fn absent_values_print_as_nil_inside_arguments() {
        assert_eq!(sprint(&[Value::Invalid]), "<nil>");
        assert_eq!(sprint(&[Value::list(vec![Value::None, Value::int(1)])]), "[<nil> 1]");
    }
}
