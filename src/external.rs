//! Host-implemented functions
//!
//! Three shapes are callable from bytecode:
//!
//! - **pure**: `(&[Value]) -> Vec<Value>`, runs synchronously
//! - **effectful**: like pure, but also receives the calling coroutine
//! - **async**: a factory producing a per-call [`AsyncCall`] object that the
//!   interpreter steps. Each step hands back an [`AsyncStep`], which lets
//!   host code yield, switch coroutines or call back into the VM without
//!   re-entering the interpreter loop.

use crate::error::VmFault;
use crate::interpreter::{Coroutine, CoroutineRef};
use crate::value::Value;
use std::rc::Rc;

pub type PureFn = Rc<dyn Fn(&[Value]) -> Result<Vec<Value>, VmFault>>;

pub type EffectFn = Rc<dyn Fn(&mut Coroutine, &[Value]) -> Result<Vec<Value>, VmFault>>;

pub type AsyncFunctionRef = Rc<dyn AsyncFunction>;

/// What an async call wants the interpreter to do next
pub enum AsyncStep {
    /// Finish, handing these values back as the call's results
    Return(Vec<Value>),
    /// Yield these values out of the running coroutine
    Yield(Vec<Value>),
    /// Switch to another coroutine, passing these arguments
    Resume(CoroutineRef, Vec<Value>),
    /// Call a VM-visible function; its results feed the next step
    Call(Value, Vec<Value>),
}

/// One in-flight invocation of an async function
pub trait AsyncCall {
    /// Advance the call
    ///
    /// `args` holds the call's arguments on the first step. On later steps it
    /// holds whatever the previous step produced: the results of a `Call`,
    /// the values a `Resume`d coroutine handed back, or the values the
    /// coroutine was resumed with after a `Yield`.
    fn resume(&mut self, args: &[Value]) -> Result<AsyncStep, VmFault>;
}

pub trait AsyncFunction {
    fn call(&self, coroutine: &Coroutine) -> Box<dyn AsyncCall>;
}

impl Value {
    pub fn async_function(f: impl AsyncFunction + 'static) -> Value {
        Value::AsyncFunction(Rc::new(f))
    }
}
