//! Output stack of a render.
//!
//! Bytes go to the innermost sink. A capture buffer keeps them; a wrap
//! sink holds back leading whitespace until the first non-whitespace byte
//! arrives, at which point it reports a [`Trigger`] and becomes a
//! pass-through. Level `0` is the render's writer, level `n` the `n`th
//! sink from the bottom.

use std::io;

use stencil_ir::ListNode;
use stencil_value::Value;

pub(crate) struct WrapSink<'a> {
    pub strip: bool,
    pub triggered: bool,
    pub pending: Vec<u8>,
    pub begin: Option<&'a ListNode>,
    /// Dot for the begin list.
    pub dot: Value,
}

pub(crate) enum Sink<'a> {
    Buffer(Vec<u8>),
    Wrap(WrapSink<'a>),
}

/// A wrap sink at `level` saw its first content. `bytes` (held-back
/// whitespace plus that content) still has to be written below it, after
/// the begin list.
pub(crate) struct Trigger {
    pub level: usize,
    pub bytes: Vec<u8>,
}

pub(crate) struct Output<'a> {
    base: &'a mut dyn io::Write,
    pub(super) sinks: Vec<Sink<'a>>,
}

impl<'a> Output<'a> {
    pub fn new(base: &'a mut dyn io::Write) -> Self {
        Output {
            base,
            sinks: Vec::new(),
        }
    }

    /// Level that plain writes go to.
    pub fn top(&self) -> usize {
        self.sinks.len()
    }

    pub fn push(&mut self, sink: Sink<'a>) {
        self.sinks.push(sink);
    }

    pub fn pop(&mut self) -> Option<Sink<'a>> {
        self.sinks.pop()
    }

    /// Drop sinks above `level`.
    pub fn truncate(&mut self, level: usize) {
        self.sinks.truncate(level);
    }

    /// Pop a capture buffer and return its bytes.
    pub fn pop_buffer(&mut self) -> Vec<u8> {
        match self.sinks.pop() {
            Some(Sink::Buffer(bytes)) => bytes,
            Some(other) => {
                self.sinks.push(other);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Write `bytes` at `level`, passing through triggered wraps.
    pub fn write_at(&mut self, level: usize, bytes: &[u8]) -> io::Result<Option<Trigger>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        let Some(index) = level.checked_sub(1) else {
            return self.base.write_all(bytes).map(|()| None);
        };
        if matches!(&self.sinks[index], Sink::Wrap(wrap) if wrap.triggered) {
            return self.write_at(index, bytes);
        }
        match &mut self.sinks[index] {
            Sink::Buffer(buf) => {
                buf.extend_from_slice(bytes);
                Ok(None)
            }
            Sink::Wrap(wrap) => {
                let ws = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
                if !wrap.strip {
                    wrap.pending.extend_from_slice(&bytes[..ws]);
                }
                if ws == bytes.len() {
                    return Ok(None);
                }
                wrap.triggered = true;
                let mut flush = std::mem::take(&mut wrap.pending);
                flush.extend_from_slice(&bytes[ws..]);
                Ok(Some(Trigger { level, bytes: flush }))
            }
        }
    }
}
