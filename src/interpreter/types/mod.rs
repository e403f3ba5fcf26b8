//! Type definitions for the interpreter
//!
//! - Frames and try marks (frame.rs)
//! - Phase enums for multi-phase opcodes (phase.rs)

pub mod frame;
pub mod phase;

pub use frame::{Frame, FrameKind, PhaseState, TryFrame};
pub use phase::{OperatorPhase, OrderPhase};
