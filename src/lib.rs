//! Glos virtual machine
//!
//! A stack-based VM for a dynamically typed scripting language:
//! tagged values with metamethods, hash tables and vectors, lexical contexts,
//! closures, and cooperative coroutines driven by a depth-first scheduler.
//!
//! ```rust
//! use glos_vm::bytecode::{FunctionBuilder, Op, UnitBuilder};
//! use glos_vm::{Scheduler, Value};
//! use std::rc::Rc;
//!
//! let mut main = FunctionBuilder::new("main");
//! main.ld(20).ld(22).op(Op::Add).op(Op::Ret);
//!
//! let mut unit = UnitBuilder::new();
//! let entry = unit.add_function(main.build());
//! let unit = Rc::new(unit.entry(entry).build());
//!
//! let result = Scheduler::default().execute_unit(unit, None, None).unwrap();
//! assert_eq!(result, vec![Value::Integer(42)]);
//! ```

pub mod bytecode;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod external;
pub mod function;
pub mod interpreter;
pub mod scheduler;
pub mod stack;
pub mod table;
pub mod unit_file;
pub mod value;
pub mod vector;

// Re-export commonly used items
pub use config::VmConfig;
pub use context::{Context, ContextRef};
pub use error::{Error, Result, RuntimeError, UnitFileError, UsageError, VmFault};
pub use external::{AsyncCall, AsyncFunction, AsyncStep};
pub use function::{Function, FunctionRef, Prototype, Unit};
pub use interpreter::{Coroutine, CoroutineRef, CoroutineState, ExecResult};
pub use scheduler::{Scheduler, Syscall, Syscalls};
pub use stack::GrowableStack;
pub use table::{Table, TableRef};
pub use value::{Value, ValueType};
pub use vector::{Vector, VectorRef};
