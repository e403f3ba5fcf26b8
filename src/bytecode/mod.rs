//! Bytecode format
//!
//! One opcode byte followed by an immediate whose shape is fixed per opcode.
//! Multi-byte immediates are little-endian. Branch targets are relative to
//! the address after the immediate.

pub mod builder;
pub mod decode;
pub mod opcode;

pub use builder::{FunctionBuilder, Label, UnitBuilder};
pub use decode::{decode, decode_all, Instruction};
pub use opcode::{Category, Immediate, Op};
