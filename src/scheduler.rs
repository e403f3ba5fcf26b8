//! Scheduler
//!
//! Runs coroutines depth-first on a coroutine stack. The top coroutine is
//! resumed until it returns, yields, or asks to switch:
//!
//! - **Return / Yield**: the coroutine is popped and its values resume the
//!   coroutine below it, which had switched to it.
//! - **Resume**: the requested coroutine is pushed and resumed with the
//!   supplied arguments.
//!
//! Execution ends when the stack empties; the values produced last are the
//! result.

use crate::config::VmConfig;
use crate::context::{Context, ContextRef};
use crate::error::{Result, RuntimeError, UsageError, VmFault};
use crate::function::{Function, FunctionRef, Unit};
use crate::interpreter::{Coroutine, CoroutineRef, ExecResult, Frame};
use crate::stack::GrowableStack;
use crate::value::calculator::{self, names};
use crate::value::Value;
use std::rc::Rc;
use tracing::debug;

pub const SYSCALL_SLOTS: usize = 8;

/// Host callback behind `SysC0`..`SysC7`
///
/// Receives the running coroutine's value, call and delimiter stacks.
pub type Syscall =
    Rc<dyn Fn(&mut GrowableStack<Value>, &mut GrowableStack<Frame>, &mut GrowableStack<usize>)>;

pub type Syscalls = [Option<Syscall>; SYSCALL_SLOTS];

pub struct Scheduler {
    coroutines: Vec<CoroutineRef>,
    syscalls: Syscalls,
    config: VmConfig,
}

impl Scheduler {
    pub fn new(config: VmConfig) -> Self {
        Scheduler {
            coroutines: Vec::new(),
            syscalls: Default::default(),
            config,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn syscalls(&self) -> &Syscalls {
        &self.syscalls
    }

    pub fn set_syscall(&mut self, index: usize, syscall: Option<Syscall>) -> Result<()> {
        let slot = self
            .syscalls
            .get_mut(index)
            .ok_or(UsageError::SyscallSlotOutOfRange { index })?;
        *slot = syscall;
        Ok(())
    }

    /// Run `function` in a fresh coroutine until every coroutine it started
    /// has finished
    pub fn execute_function(&mut self, function: FunctionRef, args: &[Value]) -> Result<Vec<Value>> {
        let coroutine = Coroutine::new(Value::Function(function), self.config).map_err(unstarted)?;
        self.execute(coroutine.into_ref(), args)
    }

    /// Call any invokable value and run it to completion
    pub fn call(&mut self, callee: Value, args: &[Value]) -> Result<Vec<Value>> {
        let coroutine = Coroutine::for_call(callee, self.config).map_err(unstarted)?;
        self.execute(coroutine.into_ref(), args)
    }

    /// Text for `value`: strings as they are, a table's `__str` result when
    /// it defines one, [`calculator::debug_stringify`] otherwise
    pub fn stringify(&mut self, value: &Value) -> Result<String> {
        if let Value::String(s) = value {
            return Ok(s.to_string());
        }
        let Some(method) = calculator::metamethod_of(value, names::STR) else {
            return Ok(calculator::debug_stringify(value));
        };

        let produced = self.call(method, std::slice::from_ref(value))?;
        Ok(match produced.into_iter().next() {
            Some(Value::String(s)) => s.to_string(),
            other => calculator::debug_stringify(&other.unwrap_or_default()),
        })
    }

    /// Like [`execute_function`](Self::execute_function), but the entry
    /// frame runs directly in `context`
    pub fn execute_function_with_context(
        &mut self,
        function: FunctionRef,
        context: ContextRef,
        args: &[Value],
    ) -> Result<Vec<Value>> {
        let coroutine = Coroutine::with_context(function, context, self.config);
        self.execute(coroutine.into_ref(), args)
    }

    /// Run a unit's entry function, bound to `context` or a fresh root
    pub fn execute_unit(
        &mut self,
        unit: Rc<Unit>,
        args: Option<&[Value]>,
        context: Option<ContextRef>,
    ) -> Result<Vec<Value>> {
        let context = context.unwrap_or_else(Context::new_root);
        let entry = Function::entry(unit, Some(context))?;
        self.execute_function(entry, args.unwrap_or_default())
    }

    fn execute(&mut self, root: CoroutineRef, args: &[Value]) -> Result<Vec<Value>> {
        let result = self.run(root, args);
        if result.is_err() {
            self.coroutines.clear();
        }
        result
    }

    fn run(&mut self, root: CoroutineRef, args: &[Value]) -> Result<Vec<Value>> {
        let floor = self.coroutines.len();
        self.coroutines.push(root);
        let mut values = args.to_vec();

        while self.coroutines.len() > floor {
            let top = self.coroutines[self.coroutines.len() - 1].clone();
            let result = top.borrow_mut().resume(&values, &self.syscalls)?;

            let yielded = matches!(result, ExecResult::Yield(_));
            match result {
                ExecResult::Return(produced) | ExecResult::Yield(produced) => {
                    self.coroutines.pop();
                    if self.coroutines.len() == floor {
                        if yielded {
                            return Err(UsageError::YieldFromRoot.into());
                        }
                        return Ok(produced);
                    }
                    debug!(depth = self.coroutines.len(), "coroutine finished, resuming parent");
                    self.coroutines[self.coroutines.len() - 1]
                        .borrow_mut()
                        .set_resumable();
                    values = produced;
                }
                ExecResult::Resume { coroutine, args } => {
                    debug!(depth = self.coroutines.len() + 1, "switch to coroutine");
                    self.coroutines.push(coroutine);
                    values = args;
                }
            }
        }

        Ok(values)
    }
}

/// A fault raised before the coroutine ran has no frames to trace
fn unstarted(fault: VmFault) -> RuntimeError {
    RuntimeError {
        fault,
        backtrace: Vec::new(),
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}
