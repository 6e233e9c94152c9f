//! Functions that act on the running render.

use std::any::Any;
use std::fmt;

use stencil_value::{
    Arity, DataFuncs, EvalError, FuncScope, Function, Interp, Key, Object, Value,
};

use super::str_arg;

/// What `_tpl_state` shows of a render.
#[derive(Debug)]
struct StateInfo {
    template: String,
    depth: usize,
    data: Value,
}

impl Object for StateInfo {
    fn type_name(&self) -> &str {
        "State"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn field(&self, name: &str) -> Option<Value> {
        Some(match name {
            "Template" => Value::string(self.template.as_str()),
            "Depth" => Value::Int(i64::try_from(self.depth).unwrap_or(i64::MAX)),
            "Data" => self.data.clone(),
            _ => return None,
        })
    }
}

/// A function scope as template data: `(_tpl_funcs).name` is the function.
struct FuncsObject(FuncScope);

impl fmt::Debug for FuncsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.names()).finish()
    }
}

impl Object for FuncsObject {
    fn type_name(&self) -> &str {
        "FuncValues"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.0.get(name).map(|f| Value::Func(f.clone()))
    }

    fn is_empty(&self) -> Option<bool> {
        Some(self.0.is_empty())
    }

    fn fmt_value(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.names().into_iter().collect();
        write!(f, "[{}]", names.join(" "))
    }
}

pub(super) fn tpl_state() -> Function {
    Function::stateful(Arity::exactly(0), |interp, _| {
        Ok(Value::object(StateInfo {
            template: interp.template_name().to_string(),
            depth: interp.depth(),
            data: interp.data().clone(),
        }))
    })
}

/// `_tpl_funcs "a" "b"`: the executor's functions, or just the named ones.
pub(super) fn tpl_funcs() -> Function {
    Function::stateful(Arity::at_least(0), |interp, args| {
        let names = (0..args.len())
            .map(|i| str_arg("_tpl_funcs", args, i))
            .collect::<Result<Vec<_>, _>>()?;
        let scope = interp
            .filter_funcs(&names)
            .map_err(|err| EvalError::new(err.to_string()))?;
        Ok(Value::object(FuncsObject(scope)))
    })
}

/// `_tpl_data_funcs data "f" "g" fn_value ...`: `data` paired with
/// functions. A name followed by a function value binds that value;
/// otherwise the function visible under that name is taken.
pub(super) fn tpl_data_funcs() -> Function {
    Function::stateful(Arity::at_least(1), |interp, args| {
        let mut scope = FuncScope::new();
        let mut rest = args[1..].iter().enumerate().peekable();
        while let Some((i, arg)) = rest.next() {
            let Some(name) = arg.as_str() else {
                return Err(EvalError::new(format!(
                    "_tpl_data_funcs: invalid function name at {}: {}",
                    i + 1,
                    arg.as_arg()
                )));
            };
            let bound = match rest.peek() {
                Some((_, Value::Func(f))) => Some(f.clone()),
                _ => None,
            };
            let f = match bound {
                Some(f) => {
                    rest.next();
                    f
                }
                None => interp
                    .find_func(name)
                    .ok_or_else(|| EvalError::new(format!("{name:?} is not a defined function")))?,
            };
            scope
                .set(name, f)
                .map_err(|err| EvalError::new(err.to_string()))?;
        }
        Ok(Value::object(DataFuncs::new(args[0].clone(), scope)))
    })
}

fn local_key(value: &Value) -> Result<Key, EvalError> {
    Key::from_value(value.indirect())
        .ok_or_else(|| EvalError::new(format!("invalid key of type {}", value.type_name())))
}

/// `set "k1" v1 "k2" v2`: store in the executor's local data.
pub(super) fn set() -> Function {
    Function::stateful_unit(Arity::at_least(2), |interp, args| {
        if args.len() % 2 != 0 {
            return Err(EvalError::new("set: expected key/value pairs"));
        }
        let entries = args
            .chunks_exact(2)
            .map(|pair| Ok((local_key(&pair[0])?, pair[1].clone())))
            .collect::<Result<Vec<_>, EvalError>>()?;
        interp.local().merge(entries);
        Ok(())
    })
}

/// `get "k"`, or `get` for the whole store.
pub(super) fn get() -> Function {
    Function::stateful(Arity::at_least(0), |interp, args| match args {
        [] => Ok(interp.local().to_value()),
        [key] => Ok(interp.local().get(&local_key(key)?).unwrap_or_default()),
        _ => Err(EvalError::new(format!("get: expected at most 1 key, got {}", args.len()))),
    })
}

fn template_args<'v>(func: &str, args: &'v [Value]) -> Result<(&'v str, Option<Value>), EvalError> {
    let name = str_arg(func, args, 0)?;
    match args {
        [_] => Ok((name, None)),
        [_, data] => Ok((name, Some(data.clone()))),
        _ => Err(EvalError::new(format!(
            "{func}: expected a name and at most one data value, got {} arguments",
            args.len()
        ))),
    }
}

/// Output of another template as a string.
pub(super) fn template_exec() -> Function {
    Function::stateful(Arity::at_least(1), |interp, args| {
        let (name, data) = template_args("template_exec", args)?;
        interp.render_template(name, data).map(Value::string)
    })
}

/// Another template rendered into the current output.
pub(super) fn tpl_yield() -> Function {
    Function::stateful_unit(Arity::at_least(1), |interp, args| {
        let (name, data) = template_args("tpl_yield", args)?;
        interp.yield_template(name, data)
    })
}

/// Strip whitespace, or the first character of `cutset`, from both ends
/// of a string or of every string in a (nested) list.
pub(super) fn trim() -> Function {
    Function::variadic(1, |args| {
        let cut = match args.get(1) {
            Some(_) => Some(str_arg("trim", args, 1)?.chars().next().unwrap_or(' ')),
            None => None,
        };
        Ok(trim_value(&args[0], cut))
    })
}

fn trim_value(value: &Value, cut: Option<char>) -> Value {
    match value.indirect() {
        Value::Str(s) => Value::string(match cut {
            Some(c) => s.trim_matches(c),
            None => s.trim(),
        }),
        Value::List(items) => Value::list(items.iter().map(|v| trim_value(v, cut)).collect()),
        _ => value.clone(),
    }
}

/// `join list "sep:, " "and: or "` writes the items of `list` separated by
/// `sep` (default `", "`), with `and` (default `" and "` when the option
/// is given empty) before the last one.
pub(super) fn join() -> Function {
    Function::stateful_unit(Arity::at_least(1), |interp, args| {
        let items = match args[0].indirect() {
            Value::List(items) => items.to_vec(),
            Value::Invalid | Value::None => Vec::new(),
            other => return Err(EvalError::new(format!("join of type {}", other.type_name()))),
        };
        let mut sep = ", ".to_string();
        let mut and = None;
        for opt in &args[1..] {
            let Some(opt) = opt.as_str() else { continue };
            match opt.split_once(':') {
                None => sep = opt.to_string(),
                Some((key, value)) => match key.trim() {
                    "sep" => sep = value.to_string(),
                    "and" => and = Some(if value.is_empty() { " and " } else { value }.to_string()),
                    key => return Err(EvalError::new(format!("invalid join option {key:?}"))),
                },
            }
        }
        write_joined(interp, &items, &sep, and.as_deref())
    })
}

fn write_joined(interp: &mut dyn Interp, items: &[Value], sep: &str, and: Option<&str>) -> Result<(), EvalError> {
    let (head, last) = match (and, items.split_last()) {
        (_, None) => return Ok(()),
        (Some(and), Some((last, head))) if !head.is_empty() => (head, Some((and, last))),
        _ => (items, None),
    };
    for (i, item) in head.iter().enumerate() {
        if i > 0 {
            interp.write_str(sep)?;
        }
        interp.write_str(&item.as_arg().to_string())?;
    }
    if let Some((and, item)) = last {
        interp.write_str(and)?;
        interp.write_str(&item.as_arg().to_string())?;
    }
    Ok(())
}
