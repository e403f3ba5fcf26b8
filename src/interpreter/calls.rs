//! Calls, returns and async steps
//!
//! Every call site (the `Call` opcode, metamethod dispatch, async `Call`
//! steps and the coroutine entry) goes through [`Coroutine::invoke`]. The
//! arguments are already on the value stack from `base` upward; results end
//! up at `base` as well, shaped to `return_size` when it is fixed.

use super::coroutine::{Coroutine, ExecResult};
use super::types::{Frame, FrameKind, PhaseState};
use crate::context::{Context, ContextRef};
use crate::error::VmFault;
use crate::external::{AsyncCall, AsyncStep};
use crate::function::FunctionRef;
use crate::value::Value;
use tracing::debug;

impl Coroutine {
    /// Call `callee` with the arguments at `stack[base..]`
    ///
    /// Bytecode and async functions get a new frame; pure and effectful
    /// externals run to completion before this returns.
    pub(crate) fn invoke(
        &mut self,
        callee: Value,
        base: usize,
        return_size: Option<usize>,
    ) -> Result<(), VmFault> {
        match callee {
            Value::Function(function) => {
                self.push_frame(function, base, return_size, None);
                Ok(())
            }
            Value::PureFunction(f) => {
                let args = self.stack.split_off(base);
                let results = f(&args)?;
                self.stack.extend(results);
                self.shape(base, return_size);
                Ok(())
            }
            Value::EffectFunction(f) => {
                let args = self.stack.split_off(base);
                let results = f(self, &args)?;
                self.stack.extend(results);
                self.shape(base, return_size);
                Ok(())
            }
            Value::AsyncFunction(f) => {
                let call = f.call(self);
                self.push_async_frame(call, base, return_size);
                Ok(())
            }
            other => Err(VmFault::NotCallable {
                value: other.to_string(),
            }),
        }
    }

    pub(crate) fn push_frame(
        &mut self,
        function: FunctionRef,
        base: usize,
        return_size: Option<usize>,
        context: Option<ContextRef>,
    ) {
        let proto = function.prototype();
        let argument_count = self.stack.len() - base;
        let local_variables_base = base + argument_count;
        let private_stack_base = local_variables_base + proto.local_variable_size;

        let context = context.unwrap_or_else(|| Context::new(function.parent_context()));
        {
            let mut ctx = context.borrow_mut();
            for name in &proto.variables_in_context {
                if !ctx.has_local(name) {
                    ctx.create_variable(name, Value::Nil);
                }
            }
        }

        self.stack.fill_to(private_stack_base);

        debug!(
            function = %proto.name,
            args = argument_count,
            depth = self.call_stack.len() + 1,
            "push frame"
        );

        let frame = Frame {
            kind: FrameKind::Bytecode {
                function: function.clone(),
            },
            context: Some(context),
            stack_base: base,
            argument_count,
            local_variables_base,
            private_stack_base,
            ip: 0,
            next_ip: 0,
            delimiter_stack_base: self.delimiter_stack.len(),
            try_stack_base: self.try_stack.len(),
            return_size,
            phase: PhaseState::default(),
        };
        self.call_stack.push(frame);
    }

    fn push_async_frame(
        &mut self,
        call: Box<dyn AsyncCall>,
        base: usize,
        return_size: Option<usize>,
    ) {
        let sp = self.stack.len();
        debug!(args = sp - base, depth = self.call_stack.len() + 1, "push async frame");

        let frame = Frame {
            kind: FrameKind::Async { call },
            context: None,
            stack_base: base,
            argument_count: sp - base,
            local_variables_base: sp,
            private_stack_base: sp,
            ip: 0,
            next_ip: 0,
            delimiter_stack_base: self.delimiter_stack.len(),
            try_stack_base: self.try_stack.len(),
            return_size,
            phase: PhaseState::default(),
        };
        self.call_stack.push(frame);
    }

    /// Pop the current frame, leaving `values` at its stack base
    fn pop_frame_with(&mut self, values: Vec<Value>) {
        let frame = self.call_stack.pop();
        let base = frame.stack_base;

        self.stack.truncate(base);
        self.stack.extend(values);
        self.shape(base, frame.return_size);
        self.delimiter_stack.truncate(frame.delimiter_stack_base);
        self.try_stack.truncate(frame.try_stack_base);

        debug!(
            function = %frame.name(),
            returned = self.stack.len() - base,
            depth = self.call_stack.len(),
            "pop frame"
        );
    }

    /// `Ret`: the run since the innermost delimiter is the return value list
    pub(crate) fn ret(&mut self) -> Result<(), VmFault> {
        let rtb = self.pop_delimiter()?;
        let values = self.stack.split_off(rtb);
        self.pop_frame_with(values);
        Ok(())
    }

    /// Advance the async call on top of the call stack
    ///
    /// The values above the frame's base (arguments on the first step, the
    /// outcome of the previous step afterwards) are handed to the call.
    pub(crate) fn step_async(&mut self) -> Result<Option<ExecResult>, VmFault> {
        let base = self.frame().stack_base;
        let args = self.stack.split_off(base);

        let step = match &mut self.frame_mut().kind {
            FrameKind::Async { call } => call.resume(&args)?,
            FrameKind::Bytecode { .. } => unreachable!("step_async on a bytecode frame"),
        };

        match step {
            AsyncStep::Return(values) => {
                self.pop_frame_with(values);
                Ok(None)
            }
            AsyncStep::Yield(values) => Ok(Some(ExecResult::Yield(values))),
            AsyncStep::Resume(coroutine, args) => Ok(Some(ExecResult::Resume { coroutine, args })),
            AsyncStep::Call(callee, args) => {
                self.stack.extend(args);
                self.invoke(callee, base, None)?;
                Ok(None)
            }
        }
    }
}
