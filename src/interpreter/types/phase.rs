//! Phase enums for opcodes that can hand off to a metamethod
//!
//! A frame stores its phase as a `u8` (see [`PhaseState`](super::PhaseState));
//! these enums give the numbers names at the dispatch sites.

/// Arithmetic, bitwise, `Lss`/`Gtr`/`Equ`/`Neq`, `Not`/`Neg`, `Ren`/`Uen`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperatorPhase {
    /// Try the native path, or push the metamethod frame
    Operate = 0,
    /// The metamethod returned; its result is on the stack
    Finish = 1,
}

impl OperatorPhase {
    pub fn from_u8(phase: u8) -> Self {
        match phase {
            0 => OperatorPhase::Operate,
            _ => OperatorPhase::Finish,
        }
    }
}

/// `Leq` and `Geq`: `__lss` first, `__equ` only when it was falsy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderPhase {
    Less = 0,
    Equal = 1,
    Finish = 2,
}

impl OrderPhase {
    pub fn from_u8(phase: u8) -> Self {
        match phase {
            0 => OrderPhase::Less,
            1 => OrderPhase::Equal,
            _ => OrderPhase::Finish,
        }
    }
}
