//! `{{wrap}}`, `{{arg}}` and `{{callback}}` blocks.
//!
//! `wrap` renders its body through a [`WrapSink`]: the `begin` list is
//! emitted just before the first non-whitespace byte of the body, and the
//! `after` list only when that happened. `arg` captures its body and
//! passes the text as the last argument of its function. `callback` hands
//! its function a [`BlockHandle`] the function can invoke any number of
//! times.

use std::io;

use smallvec::smallvec;
use stencil_ir::{BlockNode, CommandNode, ListNode, PipeNode, WrapNode};
use stencil_value::{write_failed, BlockHandle, EvalError, Value};

use super::output::{Sink, Trigger, WrapSink};
use super::pipeline::{Arg, Args};
use super::State;

/// A callback body that can be invoked while its call runs.
#[derive(Clone, Copy)]
pub(super) struct Block<'a> {
    list: &'a ListNode,
    /// Stack index of `$0`; `$@` and `$!` follow it.
    base: usize,
    calls: i64,
}

impl<'a> State<'a> {
    pub(super) fn walk_wrap(&mut self, dot: &Value, node: &'a WrapNode) -> Result<(), EvalError> {
        self.scoped(|s| {
            let level = s.out.top();
            s.out.push(Sink::Wrap(WrapSink {
                strip: node.strip(),
                triggered: false,
                pending: Vec::new(),
                begin: node.begin_list.as_ref(),
                dot: dot.clone(),
            }));
            let result = s.walk_list(dot, &node.list);
            s.out.truncate(level + 1);
            // Whitespace still pending in an untriggered wrap is dropped.
            let triggered = matches!(s.out.pop(), Some(Sink::Wrap(WrapSink { triggered: true, .. })));
            result?;
            let tail = if triggered { &node.after_list } else { &node.else_list };
            match tail {
                Some(list) => s.walk_list(dot, list),
                None => Ok(()),
            }
        })
    }

    /// A wrap saw its first content: emit its begin list, then the held
    /// bytes, into the level below it.
    pub(super) fn fire_wrap(&mut self, trigger: Trigger) -> Result<(), EvalError> {
        let below = trigger.level.saturating_sub(1);
        let (begin, dot) = match self.out.sinks.get(below) {
            Some(Sink::Wrap(wrap)) => (wrap.begin, wrap.dot.clone()),
            _ => (None, Value::Invalid),
        };
        if let Some(begin) = begin {
            let above = self.out.sinks.split_off(below);
            let at = self.at;
            let result = self.scoped(|s| s.walk_list(&dot, begin));
            self.out.truncate(below);
            self.out.sinks.extend(above);
            self.at = at;
            result?;
        }
        self.write_level(below, &trigger.bytes)
    }

    pub(super) fn walk_arg(&mut self, dot: &Value, node: &'a BlockNode) -> Result<(), EvalError> {
        self.scoped(|s| {
            let (call, dot) = s.block_call(dot, &node.pipe)?;
            let level = s.out.top();
            s.out.push(Sink::Buffer(Vec::new()));
            let result = s.walk_list(&dot, &node.list);
            s.out.truncate(level + 1);
            let text = s.out.pop_buffer();
            result?;

            let mut args: Args<'a> = call.args.iter().skip(1).map(Arg::Node).collect();
            args.push(Arg::Value(Value::string(String::from_utf8_lossy(&text))));
            let value = s.eval_command_with(&dot, call, &args, Value::Invalid)?;
            s.print_result(&node.pipe, value)
        })
    }

    pub(super) fn walk_callback(&mut self, dot: &Value, node: &'a BlockNode) -> Result<(), EvalError> {
        self.scoped(|s| {
            let (call, dot) = s.block_call(dot, &node.pipe)?;
            let base = s.mark();
            s.push_var("$0", Value::Int(0));
            s.push_var("$@", Value::Invalid);
            s.push_var("$!", Value::Invalid);
            let handle = u32::try_from(s.blocks.len())
                .map(BlockHandle::new)
                .map_err(|_| EvalError::new("too many nested callbacks"))?;
            s.blocks.push(Block {
                list: &node.list,
                base,
                calls: 0,
            });

            // The function sees (dot, handler, its own arguments...).
            let mut args: Args<'a> = smallvec![Arg::Value(dot.clone()), Arg::Value(Value::Block(handle))];
            args.extend(call.args.iter().skip(1).map(Arg::Node));
            let result = s.eval_command_with(&dot, call, &args, Value::Invalid);
            let calls = s.blocks.pop().map_or(0, |block| block.calls);
            let value = result?;
            tracing::trace!(calls, "callback done");
            s.print_result(&node.pipe, value)
        })
    }

    /// Run the body behind `handle`.
    pub(super) fn run_block(
        &mut self,
        handle: BlockHandle,
        dot: Value,
        args: &[Value],
        out: Option<&mut dyn io::Write>,
    ) -> Result<(), EvalError> {
        let index = usize::try_from(handle.index()).unwrap_or(usize::MAX);
        let block = match self.blocks.get(index) {
            Some(block) if block.base + 3 <= self.vars.len() => *block,
            _ => return Err(EvalError::new("callback is no longer active")),
        };
        self.vars[block.base + 1].1 = Value::list(args.to_vec());
        self.vars[block.base + 2].1 = Value::Int(i64::try_from(args.len()).unwrap_or(i64::MAX));

        let mark = self.mark();
        let level = self.out.top();
        let at = self.at;
        let captured = out.is_some();
        if captured {
            self.out.push(Sink::Buffer(Vec::new()));
        }
        let result = self.walk_list(&dot, block.list);
        let bytes = if captured {
            self.out.truncate(level + 1);
            self.out.pop_buffer()
        } else {
            Vec::new()
        };
        self.out.truncate(level);
        self.pop(mark);
        self.at = at;
        result?;

        if let Some(out) = out {
            out.write_all(&bytes).map_err(write_failed)?;
        }
        let calls = block.calls + 1;
        self.blocks[index].calls = calls;
        self.vars[block.base].1 = Value::Int(calls);
        Ok(())
    }

    /// Split a block pipeline into its final command and the dot the
    /// leading commands produce.
    fn block_call(&mut self, dot: &Value, pipe: &'a PipeNode) -> Result<(&'a CommandNode, Value), EvalError> {
        self.at(pipe.span, pipe);
        let Some((call, leading)) = pipe.cmds.split_last() else {
            return Err(EvalError::new("missing function in block"));
        };
        let dot = if leading.is_empty() {
            dot.clone()
        } else {
            self.eval_commands(dot, leading)?
        };
        Ok((call, dot))
    }

    /// Print a block function's result; nil results print nothing.
    fn print_result(&mut self, pipe: &PipeNode, value: Value) -> Result<(), EvalError> {
        if value.is_nil() {
            return Ok(());
        }
        self.print_value(pipe, value)
    }
}
