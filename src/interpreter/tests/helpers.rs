//! Test helpers for interpreter tests
//!
//! Units are assembled with the bytecode builders; the first function is the
//! entry unless a test builds its own unit.

use crate::bytecode::{FunctionBuilder, UnitBuilder};
use crate::config::VmConfig;
use crate::error::{Error, RuntimeError, VmFault};
use crate::function::{Function, Unit};
use crate::interpreter::{Coroutine, ExecResult};
use crate::scheduler::{Scheduler, Syscalls};
use crate::value::Value;
use std::rc::Rc;

/// Unit with `strings` interned in order and `functions[0]` as the entry
pub fn unit_of(functions: Vec<FunctionBuilder>, strings: &[&str]) -> Rc<Unit> {
    let mut unit = UnitBuilder::new();
    for s in strings {
        unit.string(s);
    }
    for function in &functions {
        unit.add_function(function.build());
    }
    Rc::new(unit.entry(0).build())
}

/// Run through the scheduler and return what the entry returned
pub fn run(functions: Vec<FunctionBuilder>, strings: &[&str], args: &[Value]) -> Vec<Value> {
    Scheduler::default()
        .execute_unit(unit_of(functions, strings), Some(args), None)
        .expect("execution failed")
}

pub fn run_main(main: FunctionBuilder) -> Vec<Value> {
    run(vec![main], &[], &[])
}

/// Run and expect a runtime fault
pub fn run_error(functions: Vec<FunctionBuilder>, strings: &[&str], args: &[Value]) -> RuntimeError {
    match Scheduler::default().execute_unit(unit_of(functions, strings), Some(args), None) {
        Err(Error::Runtime(err)) => err,
        Err(other) => panic!("expected a runtime fault, got: {}", other),
        Ok(values) => panic!("expected a runtime fault, got values: {:?}", values),
    }
}

pub fn fault_of(main: FunctionBuilder) -> VmFault {
    run_error(vec![main], &[], &[]).fault
}

pub fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Integer).collect()
}

/// Coroutine over the unit's entry function, driven directly by the test
pub fn coroutine(functions: Vec<FunctionBuilder>, strings: &[&str]) -> Coroutine {
    let entry = Function::entry(unit_of(functions, strings), None).expect("entry in range");
    Coroutine::new(Value::Function(entry), VmConfig::default()).expect("function entry")
}

pub fn no_syscalls() -> Syscalls {
    Default::default()
}

pub fn resume(co: &mut Coroutine, args: &[Value]) -> ExecResult {
    co.resume(args, &no_syscalls()).expect("resume failed")
}

pub fn yielded(result: ExecResult) -> Vec<Value> {
    match result {
        ExecResult::Yield(values) => values,
        other => panic!("expected a yield, got {:?}", other),
    }
}

pub fn returned(result: ExecResult) -> Vec<Value> {
    match result {
        ExecResult::Return(values) => values,
        other => panic!("expected a return, got {:?}", other),
    }
}
