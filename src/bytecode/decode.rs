//! Instruction decoding

use super::opcode::{Immediate, Op};
use crate::error::VmFault;

/// One decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The raw opcode byte (kept for `UnknownOp` reporting)
    pub byte: u8,
    pub op: Option<Op>,
    pub imm: i64,
    /// The immediate must be popped from the value stack before executing
    pub imm_on_stack: bool,
    /// Address right after the immediate; branch offsets are relative to it
    pub next_ip: usize,
}

fn read_le<const N: usize>(code: &[u8], at: usize) -> Result<[u8; N], VmFault> {
    code.get(at..at + N)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(VmFault::UnexpectedEndOfCode)
}

/// Decode the instruction at `ip`
///
/// Running off the end of the code (`ip == code.len()`) is an implicit `Ret`.
/// A truncated immediate is `UnexpectedEndOfCode`; an `ip` past the end is
/// `InvalidInstructionPointer`.
pub fn decode(code: &[u8], ip: usize) -> Result<Instruction, VmFault> {
    let len = code.len();

    if ip == len {
        return Ok(Instruction {
            byte: Op::Ret.byte(),
            op: Some(Op::Ret),
            imm: 0,
            imm_on_stack: false,
            next_ip: ip,
        });
    }
    if ip > len {
        return Err(VmFault::InvalidInstructionPointer { ip: ip as i64, len });
    }

    let byte = code[ip];
    let op = Op::from_byte(byte);
    let shape = op.map_or(Immediate::None, Op::immediate);
    let at = ip + 1;

    let imm = match shape {
        Immediate::None | Immediate::OnStack => 0,
        Immediate::Embedded => (byte & 0x07) as i64,
        Immediate::Byte => i8::from_le_bytes(read_le::<1>(code, at)?) as i64,
        Immediate::Dword => i32::from_le_bytes(read_le::<4>(code, at)?) as i64,
        Immediate::Qword => i64::from_le_bytes(read_le::<8>(code, at)?),
    };

    Ok(Instruction {
        byte,
        op,
        imm,
        imm_on_stack: shape == Immediate::OnStack,
        next_ip: at + shape.size(),
    })
}

/// Decode every instruction of a function body, in order
pub fn decode_all(code: &[u8]) -> Result<Vec<Instruction>, VmFault> {
    let mut out = Vec::new();
    let mut ip = 0;
    while ip < code.len() {
        let ins = decode(code, ip)?;
        ip = ins.next_ip;
        out.push(ins);
    }
    Ok(out)
}
