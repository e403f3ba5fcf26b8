//! Call frames

use crate::bytecode::Op;
use crate::context::ContextRef;
use crate::external::AsyncCall;
use crate::function::FunctionRef;
use std::fmt;

/* ===================== Phase State ===================== */

/// Where a frame is inside a multi-phase opcode
///
/// A new instruction is decoded only when `next_phase == phase_count`.
/// Otherwise `last_op` is re-entered at `next_phase`, which is how an opcode
/// picks up the result of a metamethod call it handed off to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseState {
    pub last_op: Option<Op>,
    pub last_imm: i64,
    pub phase: u8,
    pub next_phase: u8,
    pub phase_count: u8,
}

impl PhaseState {
    pub fn start(op: Op, imm: i64) -> Self {
        PhaseState {
            last_op: Some(op),
            last_imm: imm,
            phase: 0,
            next_phase: 0,
            phase_count: op.phase_count(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next_phase >= self.phase_count
    }
}

/* ===================== Frames ===================== */

pub enum FrameKind {
    Bytecode { function: FunctionRef },
    Async { call: Box<dyn AsyncCall> },
}

impl fmt::Debug for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Bytecode { function } => write!(f, "Bytecode({})", function.prototype().name),
            FrameKind::Async { .. } => f.write_str("Async"),
        }
    }
}

/// One activation on a coroutine's call stack
///
/// Stack layout of a bytecode frame, bottom to top:
///
/// ```text
/// stack_base                                  private_stack_base
/// | arguments ... | local variables ... | operand stack ...
///                 local_variables_base
/// ```
#[derive(Debug)]
pub struct Frame {
    pub kind: FrameKind,
    /// `None` for async frames
    pub context: Option<ContextRef>,

    pub stack_base: usize,
    pub argument_count: usize,
    pub local_variables_base: usize,
    pub private_stack_base: usize,

    /// Address of the instruction being executed
    pub ip: usize,
    /// Address after its immediate; branch targets are relative to it
    pub next_ip: usize,

    pub delimiter_stack_base: usize,
    pub try_stack_base: usize,

    /// `None` passes every produced value through
    pub return_size: Option<usize>,

    pub phase: PhaseState,
}

impl Frame {
    pub fn function(&self) -> Option<&FunctionRef> {
        match &self.kind {
            FrameKind::Bytecode { function } => Some(function),
            FrameKind::Async { .. } => None,
        }
    }

    pub fn name(&self) -> String {
        match &self.kind {
            FrameKind::Bytecode { function } => function.prototype().name.clone(),
            FrameKind::Async { .. } => "<async>".to_string(),
        }
    }

    pub fn local_variable_count(&self) -> usize {
        self.private_stack_base - self.local_variables_base
    }
}

/// A `Try` mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TryFrame {
    /// Handler address
    pub target: usize,
    pub stack_pointer: usize,
    pub call_depth: usize,
    pub delimiter_depth: usize,
}
