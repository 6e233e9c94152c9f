//! `{{range}}` loops.
//!
//! Every iterable kind is turned into a stream of `(key, element)` pairs
//! with one element of lookahead, which is what `is_last` needs. The
//! declared variables pick what each iteration binds:
//!
//! | declarations          | binds                              | dot      |
//! |-----------------------|------------------------------------|----------|
//! | none                  |                                    | element  |
//! | `$e :=`               | element                            | element  |
//! | `$s := &`             | a fresh [`RangeElemState`]         | outer    |
//! | `$k, $e :=`           | key, element                       | outer    |
//! | `$last, $k, $e :=`    | is-last flag, key, element         | outer    |

use std::iter::Peekable;

use stencil_ir::BranchNode;
use stencil_value::{not_iterable, EvalError, RangeElemState, Value};

use super::State;

type Items<'v> = Peekable<Box<dyn Iterator<Item = (Value, Value)> + 'v>>;

/// Pairs of `value`, or `None` when it can't be ranged over.
fn items(value: &Value) -> Option<Items<'_>> {
    let iter: Box<dyn Iterator<Item = (Value, Value)> + '_> = match value {
        Value::Invalid | Value::None => Box::new(std::iter::empty()),
        Value::List(list) => Box::new(list.iter().enumerate().map(|(i, v)| (index(i), v.clone()))),
        // Keys come out sorted.
        Value::Map(map) => Box::new(map.iter().map(|(k, v)| (k.to_value(), v.clone()))),
        Value::Chan(rx) => Box::new(rx.iter().enumerate().map(|(i, v)| (index(i), v))),
        Value::Int(n) => Box::new((0..*n).map(|i| (Value::Int(i), Value::Int(i)))),
        Value::Object(obj) => Box::new(obj.iter()?.enumerate().map(|(i, v)| (index(i), v))),
        _ => return None,
    };
    Some(iter.peekable())
}

fn index(i: usize) -> Value {
    Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
}

impl<'a> State<'a> {
    pub(super) fn walk_range(&mut self, dot: &Value, node: &'a BranchNode) -> Result<(), EvalError> {
        self.scoped(|s| {
            let value = s.eval_pipeline(dot, &node.pipe)?;
            let value = value.indirect().clone();
            let Some(mut items) = items(&value) else {
                return Err(not_iterable(&value));
            };
            let decl = &node.pipe.decl;
            if decl.len() > 3 {
                return Err(EvalError::new("too many declarations in range"));
            }
            let by_state = decl.len() == 1 && decl[0].ptr;
            // Variables declared inside the body live for one iteration.
            let mark = s.mark();
            let mut count = 0usize;
            while let Some((key, elem)) = items.next() {
                let is_last = items.peek().is_none();
                let body_dot = match decl.len() {
                    0 => elem,
                    1 if by_state => {
                        let state = RangeElemState {
                            value: elem,
                            index: count,
                            key,
                            is_first: count == 0,
                            is_last,
                            source: value.clone(),
                            data: dot.clone(),
                        };
                        s.set_top_var(1, Value::object(state));
                        dot.clone()
                    }
                    1 => {
                        s.set_top_var(1, elem.clone());
                        elem
                    }
                    n => {
                        s.set_top_var(1, elem);
                        s.set_top_var(2, key);
                        if n == 3 {
                            s.set_top_var(3, Value::Bool(is_last));
                        }
                        dot.clone()
                    }
                };
                let result = s.walk_list(&body_dot, &node.list);
                s.pop(mark);
                result?;
                count += 1;
            }
            tracing::trace!(iterations = count, "range done");
            match &node.else_list {
                Some(else_list) if count == 0 => s.walk_list(dot, else_list),
                _ => Ok(()),
            }
        })
    }
}
