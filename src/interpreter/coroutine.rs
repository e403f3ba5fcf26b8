//! Coroutine state and the resume protocol
//!
//! A coroutine owns three stacks: values, call frames and delimiters. The
//! interpreter loop in `exec_loop.rs` runs on them until the frame stack
//! empties, a `Yield` happens, or a switch to another coroutine is requested.
//! The host (normally the [`Scheduler`](crate::scheduler::Scheduler)) acts on
//! the returned [`ExecResult`] and resumes whichever coroutine comes next.
//!
//! ## States
//!
//! ```text
//! Initial --resume--> Running --return--> Stopped
//!                        |  ^
//!                  yield |  | resume
//!                        v  |
//!                      Suspend
//!
//! Running --switch to another--> InStack --set_resumable--> Suspend
//! ```

use super::types::{Frame, TryFrame};
use crate::config::VmConfig;
use crate::context::ContextRef;
use crate::error::{Error, RuntimeError, TraceFrame, UsageError, VmFault};
use crate::function::FunctionRef;
use crate::scheduler::Syscalls;
use crate::stack::GrowableStack;
use crate::value::{Value, ValueType};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

pub type CoroutineRef = Rc<RefCell<Coroutine>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineState {
    /// Created, never resumed
    Initial,
    /// Yielded; waiting for values
    Suspend,
    /// Switched away to another coroutine that has not finished yet
    InStack,
    Running,
    /// Returned or faulted
    Stopped,
}

/// Why a call to [`Coroutine::resume`] came back
#[derive(Debug)]
pub enum ExecResult {
    /// The entry function returned
    Return(Vec<Value>),
    Yield(Vec<Value>),
    /// Switch to `coroutine`, passing `args`
    Resume {
        coroutine: CoroutineRef,
        args: Vec<Value>,
    },
}

pub struct Coroutine {
    entry: Value,
    entry_context: Option<ContextRef>,
    state: CoroutineState,
    config: VmConfig,

    pub(crate) stack: GrowableStack<Value>,
    pub(crate) call_stack: GrowableStack<Frame>,
    pub(crate) delimiter_stack: GrowableStack<usize>,
    pub(crate) try_stack: GrowableStack<TryFrame>,
}

impl Coroutine {
    /// Coroutine running `entry`, a bytecode or async function
    pub fn new(entry: Value, config: VmConfig) -> Result<Coroutine, VmFault> {
        match entry {
            Value::Function(_) | Value::AsyncFunction(_) => Ok(Self::build(entry, None, config)),
            other => Err(VmFault::AssertionFailed {
                expected: ValueType::Function,
                actual: other.value_type(),
                value: other.to_string(),
            }),
        }
    }

    /// Coroutine over any invokable value, for calls made by the host
    pub(crate) fn for_call(entry: Value, config: VmConfig) -> Result<Coroutine, VmFault> {
        if !entry.is_invokable() {
            return Err(VmFault::NotCallable {
                value: entry.to_string(),
            });
        }
        Ok(Self::build(entry, None, config))
    }

    /// Coroutine whose entry frame runs directly in `context` instead of a
    /// fresh child of the function's parent
    pub fn with_context(function: FunctionRef, context: ContextRef, config: VmConfig) -> Coroutine {
        Self::build(Value::Function(function), Some(context), config)
    }

    fn build(entry: Value, entry_context: Option<ContextRef>, config: VmConfig) -> Coroutine {
        Coroutine {
            entry,
            entry_context,
            state: CoroutineState::Initial,
            config,
            stack: GrowableStack::with_capacity(config.value_stack_capacity),
            call_stack: GrowableStack::with_capacity(config.call_stack_capacity),
            delimiter_stack: GrowableStack::with_capacity(config.delimiter_stack_capacity),
            try_stack: GrowableStack::new(),
        }
    }

    pub fn into_ref(self) -> CoroutineRef {
        Rc::new(RefCell::new(self))
    }

    pub fn state(&self) -> CoroutineState {
        self.state
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Number of active frames
    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn value_stack(&self) -> &GrowableStack<Value> {
        &self.stack
    }

    /// `InStack` -> `Suspend`, once the coroutine it switched to has finished
    /// or yielded back
    pub fn set_resumable(&mut self) {
        if self.state == CoroutineState::InStack {
            self.transition(CoroutineState::Suspend);
        }
    }

    /// Run until the coroutine returns, yields or asks to switch
    ///
    /// In `Initial` the entry frame is pushed with `args`; in `Suspend` the
    /// `args` are pushed where the yielded values were taken from.
    pub fn resume(&mut self, args: &[Value], syscalls: &Syscalls) -> Result<ExecResult, Error> {
        let initial = match self.state {
            CoroutineState::Initial => true,
            CoroutineState::Suspend => false,
            state => return Err(UsageError::InvalidResume { state }.into()),
        };
        self.transition(CoroutineState::Running);

        let outcome = if initial {
            self.start(args)
        } else {
            self.stack.extend(args.iter().cloned());
            Ok(())
        }
        .and_then(|()| self.run(syscalls));

        match outcome {
            Ok(result) => {
                self.transition(match &result {
                    ExecResult::Return(_) => CoroutineState::Stopped,
                    ExecResult::Yield(_) => CoroutineState::Suspend,
                    ExecResult::Resume { .. } => CoroutineState::InStack,
                });
                Ok(result)
            }
            Err(fault) => {
                let backtrace = self.backtrace();
                warn!(%fault, depth = backtrace.len(), "fault escaped coroutine");
                self.stack.clear();
                self.call_stack.clear();
                self.delimiter_stack.clear();
                self.try_stack.clear();
                self.transition(CoroutineState::Stopped);
                Err(RuntimeError { fault, backtrace }.into())
            }
        }
    }

    fn start(&mut self, args: &[Value]) -> Result<(), VmFault> {
        let base = self.stack.len();
        self.stack.extend(args.iter().cloned());

        match (self.entry.clone(), self.entry_context.take()) {
            (Value::Function(function), Some(context)) => {
                self.push_frame(function, base, None, Some(context));
                Ok(())
            }
            (entry, _) => self.invoke(entry, base, None),
        }
    }

    fn transition(&mut self, to: CoroutineState) {
        debug!(from = ?self.state, to = ?to, "coroutine state");
        self.state = to;
    }

    /// Innermost frame first
    pub fn backtrace(&self) -> Vec<TraceFrame> {
        self.call_stack
            .iter()
            .rev()
            .map(|frame| TraceFrame {
                function: frame.name(),
                ip: frame.ip,
            })
            .collect()
    }

    /* ===================== Stack Helpers ===================== */

    pub(crate) fn frame(&self) -> &Frame {
        self.call_stack.top(0)
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        self.call_stack.top_mut(0)
    }

    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pop an operand; the frame's arguments and locals are off limits
    pub(crate) fn pop(&mut self) -> Result<Value, VmFault> {
        if self.stack.len() <= self.frame().private_stack_base {
            return Err(VmFault::StackUnderflow);
        }
        Ok(self.stack.pop())
    }

    pub(crate) fn peek(&self, offset: usize) -> Result<Value, VmFault> {
        let floor = self.frame().private_stack_base;
        if self.stack.len() <= floor + offset {
            return Err(VmFault::StackUnderflow);
        }
        Ok(self.stack.top(offset).clone())
    }

    /// Pad with nil or truncate so that exactly `size` values sit above `base`
    pub(crate) fn shape(&mut self, base: usize, size: Option<usize>) {
        if let Some(size) = size {
            if self.stack.len() > base + size {
                self.stack.truncate(base + size);
            } else {
                self.stack.fill_to(base + size);
            }
        }
    }

    /* ===================== Delimiters ===================== */

    pub(crate) fn push_delimiter(&mut self) {
        let sp = self.stack.len();
        self.delimiter_stack.push(sp);
    }

    /// Innermost delimiter of the current frame, or its private stack base
    pub(crate) fn peek_delimiter(&self) -> Result<usize, VmFault> {
        let frame = self.frame();
        let del = if self.delimiter_stack.len() > frame.delimiter_stack_base {
            *self.delimiter_stack.top(0)
        } else {
            frame.private_stack_base
        };
        self.checked_delimiter(del)
    }

    pub(crate) fn pop_delimiter(&mut self) -> Result<usize, VmFault> {
        let (owned_from, fallback) = {
            let frame = self.frame();
            (frame.delimiter_stack_base, frame.private_stack_base)
        };
        let del = if self.delimiter_stack.len() > owned_from {
            self.delimiter_stack.pop()
        } else {
            fallback
        };
        self.checked_delimiter(del)
    }

    /// A delimiter above the stack top means its run was popped away
    fn checked_delimiter(&self, del: usize) -> Result<usize, VmFault> {
        if del > self.stack.len() {
            return Err(VmFault::StackUnderflow);
        }
        Ok(del)
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("state", &self.state)
            .field("frames", &self.call_stack.len())
            .field("stack", &self.stack.len())
            .finish()
    }
}
