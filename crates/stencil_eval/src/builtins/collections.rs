//! Indexing, slicing and building collections.

use std::collections::BTreeMap;

use stencil_value::{Arity, EvalError, Function, Key, RangeElemState, Value};

/// An integer usable as an index into something of length `cap`.
fn index_arg(index: &Value, cap: usize) -> Result<usize, EvalError> {
    let x = match index.indirect() {
        Value::Int(n) => i128::from(*n),
        Value::Uint(n) => i128::from(*n),
        Value::Invalid | Value::None => return Err(EvalError::new("cannot index slice/array with nil")),
        other => {
            return Err(EvalError::new(format!(
                "cannot index slice/array with type {}",
                other.type_name()
            )))
        }
    };
    match usize::try_from(x) {
        Ok(i) if i <= cap => Ok(i),
        _ => Err(EvalError::new(format!("index out of range: {x}"))),
    }
}

fn map_key(value: &Value) -> Result<Key, EvalError> {
    Key::from_value(value.indirect())
        .ok_or_else(|| EvalError::new(format!("value of type {} can't be a map key", value.type_name())))
}

/// `index x 1 2` is `x[1][2]`. A missing map key gives the zero value of
/// the map's elements.
pub(super) fn index() -> Function {
    Function::variadic(1, |args| {
        let mut item = args[0].indirect().clone();
        if item.is_invalid() {
            return Err(EvalError::new("index of untyped nil"));
        }
        for index in &args[1..] {
            item = match item.indirect() {
                Value::None => return Err(EvalError::new("index of nil pointer")),
                Value::List(items) => {
                    let i = index_arg(index, items.len())?;
                    items
                        .get(i)
                        .cloned()
                        .ok_or_else(|| EvalError::new(format!("index out of range: {i}")))?
                }
                Value::Str(s) => {
                    let i = index_arg(index, s.len())?;
                    let byte = s
                        .as_bytes()
                        .get(i)
                        .ok_or_else(|| EvalError::new(format!("index out of range: {i}")))?;
                    Value::Uint(u64::from(*byte))
                }
                Value::Map(map) => match map.get(&map_key(index)?) {
                    Some(value) => value.clone(),
                    None => map.values().next().map_or(Value::Invalid, Value::zero_like),
                },
                other => {
                    return Err(EvalError::new(format!(
                        "can't index item of type {}",
                        other.type_name()
                    )))
                }
            };
        }
        Ok(item)
    })
}

/// `slice x 1 2` is `x[1:2]`; `slice x` is the whole of `x`.
pub(super) fn slice() -> Function {
    Function::variadic(1, |args| {
        let item = args[0].indirect();
        let indexes = &args[1..];
        if item.is_invalid() {
            return Err(EvalError::new("slice of untyped nil"));
        }
        if indexes.len() > 3 {
            return Err(EvalError::new(format!("too many slice indexes: {}", indexes.len())));
        }
        let len = match item {
            Value::Str(s) => {
                if indexes.len() == 3 {
                    return Err(EvalError::new("cannot 3-index slice a string"));
                }
                s.len()
            }
            Value::List(items) => items.len(),
            other => {
                return Err(EvalError::new(format!(
                    "can't slice item of type {}",
                    other.type_name()
                )))
            }
        };
        let mut idx = [0, len, len];
        for (slot, index) in idx.iter_mut().zip(indexes) {
            *slot = index_arg(index, len)?;
        }
        if idx[0] > idx[1] {
            return Err(EvalError::new(format!("invalid slice index: {} > {}", idx[0], idx[1])));
        }
        if indexes.len() == 3 && idx[1] > idx[2] {
            return Err(EvalError::new(format!("invalid slice index: {} > {}", idx[1], idx[2])));
        }
        let range = idx[0]..idx[1];
        Ok(match item {
            Value::Str(s) => match s.get(range.clone()) {
                Some(sub) => Value::string(sub),
                None => Value::string(String::from_utf8_lossy(&s.as_bytes()[range])),
            },
            Value::List(items) => Value::list(items[range].to_vec()),
            _ => Value::Invalid,
        })
    })
}

pub(super) fn len() -> Function {
    Function::fixed(1, |args| {
        let item = args[0].indirect();
        match item {
            Value::Invalid => Err(EvalError::new("len of untyped nil")),
            Value::None => Err(EvalError::new("len of nil pointer")),
            _ => item
                .len()
                .map(|n| Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))
                .ok_or_else(|| EvalError::new(format!("len of type {}", item.type_name()))),
        }
    })
}

/// Whether `item` holds every one of the other arguments: list elements,
/// substrings or map keys.
pub(super) fn contains() -> Function {
    Function::variadic(1, |args| {
        let item = args[0].indirect();
        let subs = &args[1..];
        let found = match item {
            Value::Invalid => return Err(EvalError::new("index of untyped nil")),
            Value::None => return Err(EvalError::new("index of nil pointer")),
            Value::List(items) => !items.is_empty() && subs.iter().all(|sub| items.contains(sub.indirect())),
            Value::Str(s) => {
                let mut all = true;
                for (i, sub) in subs.iter().enumerate() {
                    let Some(sub) = sub.indirect().as_str() else {
                        return Err(EvalError::new(format!("arg {} is not a string value", i + 1)));
                    };
                    all &= s.contains(sub);
                }
                all
            }
            Value::Map(map) => {
                let mut all = !map.is_empty();
                for sub in subs {
                    all &= map.contains_key(&map_key(sub)?);
                }
                all
            }
            other => {
                return Err(EvalError::new(format!(
                    "can't look for items in type {}",
                    other.type_name()
                )))
            }
        };
        Ok(Value::Bool(found))
    })
}

pub(super) fn array() -> Function {
    Function::variadic(0, |args| Ok(Value::list(args.to_vec())))
}

/// A copy of list `dest` with the other arguments added at the end.
pub(super) fn append() -> Function {
    Function::variadic(1, |args| {
        let mut items = match args[0].indirect() {
            Value::List(items) => items.to_vec(),
            Value::Invalid | Value::None => Vec::new(),
            other => return Err(EvalError::new(format!("can't append to type {}", other.type_name()))),
        };
        items.extend_from_slice(&args[1..]);
        Ok(Value::list(items))
    })
}

fn pairs(args: &[Value]) -> Result<BTreeMap<Key, Value>, EvalError> {
    args.chunks_exact(2)
        .map(|pair| Ok((map_key(&pair[0])?, pair[1].clone())))
        .collect()
}

/// Map from alternating keys and values; empty for an odd count.
pub(super) fn map() -> Function {
    Function::variadic(0, |args| {
        if args.len() % 2 != 0 {
            return Ok(Value::map(BTreeMap::new()));
        }
        Ok(Value::map(pairs(args)?))
    })
}

/// Map from alternating keys and values.
pub(super) fn dict() -> Function {
    Function::variadic(0, |args| {
        if args.len() % 2 != 0 {
            return Err(EvalError::new("dict: odd number of arguments"));
        }
        Ok(Value::map(pairs(args)?))
    })
}

/// `{K: key, V: value}`
pub(super) fn new_pair() -> Function {
    Function::fixed(2, |args| {
        Ok(Value::map_from([("K", args[0].clone()), ("V", args[1].clone())]))
    })
}

/// `{{callback range_callback .Items}}...{{end}}` runs the block once per
/// item with a [`RangeElemState`] as dot.
pub(super) fn range_callback() -> Function {
    Function::stateful_unit(Arity::at_least(3), |interp, args| {
        let (dot, handler, source, extra) = (&args[0], &args[1], &args[2], &args[3..]);
        let Value::Block(handle) = handler else {
            return Err(EvalError::new(format!(
                "range_callback: expected a callback handler, got {}",
                handler.type_name()
            )));
        };
        let items: Box<dyn Iterator<Item = (Value, Value)>> = match source.indirect() {
            Value::Invalid | Value::None => return Ok(()),
            Value::List(items) => Box::new(
                items
                    .to_vec()
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (Value::Int(i64::try_from(i).unwrap_or(i64::MAX)), v)),
            ),
            Value::Map(map) => Box::new(
                map.iter()
                    .map(|(k, v)| (k.to_value(), v.clone()))
                    .collect::<Vec<_>>()
                    .into_iter(),
            ),
            Value::Chan(rx) => Box::new(
                rx.clone()
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (Value::Uint(u64::try_from(i).unwrap_or(u64::MAX)), v)),
            ),
            other => {
                return Err(EvalError::new(format!(
                    "range can't iterate over {}",
                    other.type_name()
                )))
            }
        };
        let mut items = items.peekable();
        let mut index = 0;
        while let Some((key, value)) = items.next() {
            let state = RangeElemState {
                value,
                index,
                key,
                is_first: index == 0,
                is_last: items.peek().is_none(),
                source: source.clone(),
                data: dot.clone(),
            };
            interp.invoke_block(*handle, Value::object(state), extra, None)?;
            index += 1;
        }
        Ok(())
    })
}
