//! Error types
//!
//! Two categories:
//!
//! - [`VmFault`]: something the running program did wrong (bad operand,
//!   out-of-range index, malformed bytecode). Faults unwind the coroutine's
//!   loop and leave the interpreter wrapped in a [`RuntimeError`].
//! - [`UsageError`]: the host drove the VM incorrectly (resuming a stopped
//!   coroutine, registering a syscall in a slot that does not exist).
//!
//! Loading a binary unit file has its own [`UnitFileError`].

use crate::bytecode::Op;
use crate::interpreter::CoroutineState;
use crate::value::ValueType;
use std::fmt;
use thiserror::Error;

/* ===================== Runtime Faults ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmFault {
    #[error("invalid operand types for {op}: {left} and {right}")]
    InvalidBinaryOperand {
        op: Op,
        left: ValueType,
        right: ValueType,
    },

    #[error("invalid operand type for {op}: {operand}")]
    InvalidUnaryOperand { op: Op, operand: ValueType },

    #[error("local variable index {index} out of range (function has {bound} locals)")]
    LocalVariableIndexOutOfRange { index: i64, bound: usize },

    #[error("string index {index} out of range (unit has {bound} strings)")]
    StringIndexOutOfRange { index: i64, bound: usize },

    #[error("function index {index} out of range (unit has {bound} functions)")]
    FunctionIndexOutOfRange { index: i64, bound: usize },

    #[error("vector index {index} out of range (length {len})")]
    VectorIndexOutOfRange { index: i64, len: usize },

    #[error("unexpected end of code")]
    UnexpectedEndOfCode,

    #[error("unknown opcode 0x{0:02x}")]
    UnknownOp(u8),

    #[error("instruction pointer {ip} outside code of length {len}")]
    InvalidInstructionPointer { ip: i64, len: usize },

    #[error("operand stack underflow")]
    StackUnderflow,

    #[error("value is not callable: {value}")]
    NotCallable { value: String },

    #[error("expected {expected}, got {actual} ({value})")]
    AssertionFailed {
        expected: ValueType,
        actual: ValueType,
        value: String,
    },

    #[error("{op}: division by zero")]
    DivisionByZero { op: Op },

    #[error("thrown: {value}")]
    Thrown { value: String },

    #[error("external function failed: {0}")]
    External(String),
}

/* ===================== Host Usage Errors ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UsageError {
    #[error("cannot resume a coroutine in state {state:?}")]
    InvalidResume { state: CoroutineState },

    #[error("syscall slot {index} out of range (0..8)")]
    SyscallSlotOutOfRange { index: usize },

    #[error("root coroutine yielded with nothing to yield to")]
    YieldFromRoot,

    #[error("entry index {index} out of range (unit has {bound} functions)")]
    EntryIndexOutOfRange { index: usize, bound: usize },
}

/* ===================== Unit Files ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnitFileError {
    #[error("not a binary unit (magic 0x{0:08x})")]
    BadMagic(u32),

    #[error("unsupported unit file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("unit file truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("string at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("unknown section type 0x{0:04x}")]
    UnknownSection(u16),

    #[error("malformed unit file at offset {offset}")]
    Malformed { offset: usize },
}

/* ===================== Wrapped Runtime Error ===================== */

/// One entry of the call stack captured when a fault escaped
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFrame {
    pub function: String,
    pub ip: usize,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.function, self.ip)
    }
}

/// A fault together with the call stack it escaped from (innermost first)
#[derive(Debug, Clone, PartialEq, Error)]
#[error("runtime fault: {fault}")]
pub struct RuntimeError {
    #[source]
    pub fault: VmFault,
    pub backtrace: Vec<TraceFrame>,
}

/* ===================== Top-level Error ===================== */

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Usage(#[from] UsageError),
}

impl Error {
    /// The fault behind a runtime error, if this is one
    pub fn fault(&self) -> Option<&VmFault> {
        match self {
            Error::Runtime(err) => Some(&err.fault),
            Error::Usage(_) => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
