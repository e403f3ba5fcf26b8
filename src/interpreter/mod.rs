//! # Interpreter - Phased, Re-entrant Coroutine VM
//!
//! Executes Glos bytecode inside [`Coroutine`]s.
//!
//! ## Core Principles
//!
//! 1. **Explicit stacks**: values, call frames and delimiters live in the
//!    coroutine, never on the host stack. Calls, metamethods and async steps
//!    all push frames instead of recursing.
//! 2. **Phased opcodes**: an opcode that needs a metamethod records its phase
//!    in the frame, pushes the metamethod frame and is re-entered at the next
//!    phase when that frame returns.
//! 3. **Leave on switch**: `Yield`, `Resume` and async steps hand an
//!    [`ExecResult`] back to the host instead of running another coroutine
//!    inline. The [`Scheduler`](crate::scheduler::Scheduler) decides what
//!    runs next.
//!
//! ## Layout
//!
//! - coroutine.rs: state machine, resume protocol, stack helpers
//! - exec_loop.rs: driver, fetch/decode, loads, branches, calls
//! - operators.rs: operators with metamethods, tables, vectors, contexts
//! - calls.rs: invoke, frame push/pop, async steps

pub mod calls;
pub mod coroutine;
pub mod exec_loop;
pub mod operators;
pub mod types;

#[cfg(test)]
mod tests;

pub use coroutine::{Coroutine, CoroutineRef, CoroutineState, ExecResult};
pub use types::{Frame, FrameKind, PhaseState, TryFrame};
