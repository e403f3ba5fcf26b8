//! Opcode table
//!
//! Every opcode is one byte. The shape of the immediate that follows it is a
//! static property of the opcode (see [`Immediate`]), as is the number of
//! phases the interpreter may need to finish it.

use std::fmt;

/* ===================== Immediate Shapes ===================== */

/// How an opcode's immediate is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    /// No immediate
    None,
    /// Low three bits of the opcode byte
    Embedded,
    /// One signed byte
    Byte,
    /// Four bytes, little-endian, sign-extended
    Dword,
    /// Eight bytes, little-endian
    Qword,
    /// Popped from the value stack at execution time
    OnStack,
}

impl Immediate {
    /// Encoded size in bytes, not counting the opcode byte
    pub fn size(self) -> usize {
        match self {
            Immediate::None | Immediate::Embedded | Immediate::OnStack => 0,
            Immediate::Byte => 1,
            Immediate::Dword => 4,
            Immediate::Qword => 8,
        }
    }
}

/* ===================== Categories ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    BinaryOperator,
    TableVectorOperator,
    UnaryOperator,
    ContextOperator,
    LoadFunction,
    LoadString,
    LoadInteger,
    LoadMisc,
    LoadLocalVariable,
    StoreLocalVariable,
    LoadArgument,
    Branch,
    Try,
    ShapeReturn,
    Syscall,
    Others,
}

/* ===================== Opcodes ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    Add = 0x00,
    Sub = 0x01,
    Mul = 0x02,
    Div = 0x03,
    Mod = 0x04,
    Lsh = 0x05,
    Rsh = 0x06,
    And = 0x07,
    Orr = 0x08,
    Xor = 0x09,
    Gtr = 0x0a,
    Lss = 0x0b,
    Geq = 0x0c,
    Leq = 0x0d,
    Equ = 0x0e,
    Neq = 0x0f,

    Smt = 0x10,
    Gmt = 0x11,
    Ren = 0x12,
    Uen = 0x13,
    RenL = 0x14,
    UenL = 0x15,
    Ien = 0x16,
    Pshv = 0x18,
    Popv = 0x19,

    Not = 0x1c,
    Neg = 0x1d,
    Typeof = 0x1e,
    IsNil = 0x1f,

    Rvc = 0x20,
    Uvc = 0x21,
    Rvg = 0x22,
    Uvg = 0x23,

    LdFun = 0x28,
    LdStr = 0x29,
    LdFunS = 0x2c,
    LdStrS = 0x2d,

    Ld0 = 0x30,
    Ld1 = 0x31,
    Ld2 = 0x32,
    Ld3 = 0x33,
    LdQ = 0x34,
    Ld = 0x35,
    LdS = 0x36,
    LdNeg1 = 0x37,

    LdNTbl = 0x38,
    LdNil = 0x39,
    LdFlt = 0x3a,
    LdNVec = 0x3b,
    LdTrue = 0x3c,
    LdFalse = 0x3d,

    LdLoc0 = 0x40,
    LdLoc1 = 0x41,
    LdLoc2 = 0x42,
    LdLoc3 = 0x43,
    LdLoc4 = 0x44,
    LdLoc5 = 0x45,
    LdLoc6 = 0x46,
    LdLoc7 = 0x47,
    StLoc0 = 0x48,
    StLoc1 = 0x49,
    StLoc2 = 0x4a,
    StLoc3 = 0x4b,
    StLoc4 = 0x4c,
    StLoc5 = 0x4d,
    StLoc6 = 0x4e,
    StLoc7 = 0x4f,

    LdArg0 = 0x50,
    LdArg1 = 0x51,
    LdArg2 = 0x52,
    LdArg3 = 0x53,
    LdArg = 0x54,
    LdLoc = 0x55,
    StLoc = 0x56,
    LdArgc = 0x57,
    LdArgS = 0x58,
    LdLocS = 0x59,
    StLocS = 0x5a,
    LdArgA = 0x5c,
    LdLocA = 0x5d,
    StLocA = 0x5e,

    B = 0x80,
    Bf = 0x81,
    Bt = 0x82,
    Bn = 0x83,
    Bnn = 0x84,
    BS = 0x88,
    BfS = 0x89,
    BtS = 0x8a,
    BnS = 0x8b,
    BnnS = 0x8c,

    Try = 0x90,
    TryS = 0x91,
    EndTry = 0x92,
    Throw = 0x93,

    Dup = 0xa0,
    Pop = 0xa1,
    Mkc = 0xa5,
    Yield = 0xa6,
    Resume = 0xa7,
    LdDel = 0xa8,
    Call = 0xa9,
    Ret = 0xaa,
    Bind = 0xab,
    PopDel = 0xac,
    DupList = 0xad,
    Pkv = 0xae,
    Upv = 0xaf,

    ShpRv0 = 0xb0,
    ShpRv1 = 0xb1,
    ShpRv2 = 0xb2,
    ShpRv3 = 0xb3,
    ShpRv = 0xb4,
    ShpRvS = 0xb5,

    Nop = 0xc0,

    SysC0 = 0xe0,
    SysC1 = 0xe1,
    SysC2 = 0xe2,
    SysC3 = 0xe3,
    SysC4 = 0xe4,
    SysC5 = 0xe5,
    SysC6 = 0xe6,
    SysC7 = 0xe7,
}

impl Op {
    /// Map a raw byte to an opcode; `None` for unassigned bytes
    pub fn from_byte(byte: u8) -> Option<Op> {
        use Op::*;
        let op = match byte {
            0x00 => Add,
            0x01 => Sub,
            0x02 => Mul,
            0x03 => Div,
            0x04 => Mod,
            0x05 => Lsh,
            0x06 => Rsh,
            0x07 => And,
            0x08 => Orr,
            0x09 => Xor,
            0x0a => Gtr,
            0x0b => Lss,
            0x0c => Geq,
            0x0d => Leq,
            0x0e => Equ,
            0x0f => Neq,
            0x10 => Smt,
            0x11 => Gmt,
            0x12 => Ren,
            0x13 => Uen,
            0x14 => RenL,
            0x15 => UenL,
            0x16 => Ien,
            0x18 => Pshv,
            0x19 => Popv,
            0x1c => Not,
            0x1d => Neg,
            0x1e => Typeof,
            0x1f => IsNil,
            0x20 => Rvc,
            0x21 => Uvc,
            0x22 => Rvg,
            0x23 => Uvg,
            0x28 => LdFun,
            0x29 => LdStr,
            0x2c => LdFunS,
            0x2d => LdStrS,
            0x30 => Ld0,
            0x31 => Ld1,
            0x32 => Ld2,
            0x33 => Ld3,
            0x34 => LdQ,
            0x35 => Ld,
            0x36 => LdS,
            0x37 => LdNeg1,
            0x38 => LdNTbl,
            0x39 => LdNil,
            0x3a => LdFlt,
            0x3b => LdNVec,
            0x3c => LdTrue,
            0x3d => LdFalse,
            0x40 => LdLoc0,
            0x41 => LdLoc1,
            0x42 => LdLoc2,
            0x43 => LdLoc3,
            0x44 => LdLoc4,
            0x45 => LdLoc5,
            0x46 => LdLoc6,
            0x47 => LdLoc7,
            0x48 => StLoc0,
            0x49 => StLoc1,
            0x4a => StLoc2,
            0x4b => StLoc3,
            0x4c => StLoc4,
            0x4d => StLoc5,
            0x4e => StLoc6,
            0x4f => StLoc7,
            0x50 => LdArg0,
            0x51 => LdArg1,
            0x52 => LdArg2,
            0x53 => LdArg3,
            0x54 => LdArg,
            0x55 => LdLoc,
            0x56 => StLoc,
            0x57 => LdArgc,
            0x58 => LdArgS,
            0x59 => LdLocS,
            0x5a => StLocS,
            0x5c => LdArgA,
            0x5d => LdLocA,
            0x5e => StLocA,
            0x80 => B,
            0x81 => Bf,
            0x82 => Bt,
            0x83 => Bn,
            0x84 => Bnn,
            0x88 => BS,
            0x89 => BfS,
            0x8a => BtS,
            0x8b => BnS,
            0x8c => BnnS,
            0x90 => Try,
            0x91 => TryS,
            0x92 => EndTry,
            0x93 => Throw,
            0xa0 => Dup,
            0xa1 => Pop,
            0xa5 => Mkc,
            0xa6 => Yield,
            0xa7 => Resume,
            0xa8 => LdDel,
            0xa9 => Call,
            0xaa => Ret,
            0xab => Bind,
            0xac => PopDel,
            0xad => DupList,
            0xae => Pkv,
            0xaf => Upv,
            0xb0 => ShpRv0,
            0xb1 => ShpRv1,
            0xb2 => ShpRv2,
            0xb3 => ShpRv3,
            0xb4 => ShpRv,
            0xb5 => ShpRvS,
            0xc0 => Nop,
            0xe0 => SysC0,
            0xe1 => SysC1,
            0xe2 => SysC2,
            0xe3 => SysC3,
            0xe4 => SysC4,
            0xe5 => SysC5,
            0xe6 => SysC6,
            0xe7 => SysC7,
            _ => return None,
        };
        Some(op)
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn immediate(self) -> Immediate {
        use Op::*;
        match self {
            Ld0 | Ld1 | Ld2 | Ld3 => Immediate::Embedded,
            LdLoc0 | LdLoc1 | LdLoc2 | LdLoc3 | LdLoc4 | LdLoc5 | LdLoc6 | LdLoc7 => {
                Immediate::Embedded
            }
            StLoc0 | StLoc1 | StLoc2 | StLoc3 | StLoc4 | StLoc5 | StLoc6 | StLoc7 => {
                Immediate::Embedded
            }
            LdArg0 | LdArg1 | LdArg2 | LdArg3 => Immediate::Embedded,
            ShpRv0 | ShpRv1 | ShpRv2 | ShpRv3 => Immediate::Embedded,
            SysC0 | SysC1 | SysC2 | SysC3 | SysC4 | SysC5 | SysC6 | SysC7 => Immediate::Embedded,

            LdFunS | LdStrS | LdS | LdArgS | LdLocS | StLocS | TryS | ShpRvS => Immediate::Byte,
            BS | BfS | BtS | BnS | BnnS => Immediate::Byte,

            LdFun | LdStr | Ld | LdArg | LdLoc | StLoc | Try | ShpRv => Immediate::Dword,
            B | Bf | Bt | Bn | Bnn => Immediate::Dword,

            LdQ | LdFlt => Immediate::Qword,

            LdArgA | LdLocA | StLocA => Immediate::OnStack,

            _ => Immediate::None,
        }
    }

    pub fn category(self) -> Category {
        use Op::*;
        match self {
            Add | Sub | Mul | Div | Mod | Lsh | Rsh | And | Orr | Xor | Gtr | Lss | Geq | Leq
            | Equ | Neq => Category::BinaryOperator,
            Smt | Gmt | Ren | Uen | RenL | UenL | Ien | Pshv | Popv => {
                Category::TableVectorOperator
            }
            Not | Neg | Typeof | IsNil => Category::UnaryOperator,
            Rvc | Uvc | Rvg | Uvg => Category::ContextOperator,
            LdFun | LdFunS => Category::LoadFunction,
            LdStr | LdStrS => Category::LoadString,
            Ld0 | Ld1 | Ld2 | Ld3 | LdQ | Ld | LdS | LdNeg1 => Category::LoadInteger,
            LdNTbl | LdNil | LdFlt | LdNVec | LdTrue | LdFalse | LdArgc => Category::LoadMisc,
            LdLoc0 | LdLoc1 | LdLoc2 | LdLoc3 | LdLoc4 | LdLoc5 | LdLoc6 | LdLoc7 | LdLoc
            | LdLocS | LdLocA => Category::LoadLocalVariable,
            StLoc0 | StLoc1 | StLoc2 | StLoc3 | StLoc4 | StLoc5 | StLoc6 | StLoc7 | StLoc
            | StLocS | StLocA => Category::StoreLocalVariable,
            LdArg0 | LdArg1 | LdArg2 | LdArg3 | LdArg | LdArgS | LdArgA => Category::LoadArgument,
            B | Bf | Bt | Bn | Bnn | BS | BfS | BtS | BnS | BnnS => Category::Branch,
            Try | TryS | EndTry | Throw => Category::Try,
            ShpRv0 | ShpRv1 | ShpRv2 | ShpRv3 | ShpRv | ShpRvS => Category::ShapeReturn,
            SysC0 | SysC1 | SysC2 | SysC3 | SysC4 | SysC5 | SysC6 | SysC7 => Category::Syscall,
            Dup | Pop | Mkc | Yield | Resume | LdDel | Call | Ret | Bind | PopDel | DupList
            | Pkv | Upv | Nop => Category::Others,
        }
    }

    /// Number of phases the interpreter may need to finish this opcode
    ///
    /// Opcodes that can hand off to a metamethod need one extra phase to
    /// collect its result; `Leq`/`Geq` need two (`__lss`, then `__equ`).
    pub fn phase_count(self) -> u8 {
        use Op::*;
        match self {
            Leq | Geq => 3,
            Add | Sub | Mul | Div | Mod | Lsh | Rsh | And | Orr | Xor | Gtr | Lss | Equ | Neq => 2,
            Not | Neg => 2,
            Ren | Uen => 2,
            _ => 1,
        }
    }

    /// Branch-family opcode with the short (byte) immediate
    pub fn short_form(self) -> Option<Op> {
        use Op::*;
        Some(match self {
            B => BS,
            Bf => BfS,
            Bt => BtS,
            Bn => BnS,
            Bnn => BnnS,
            _ => return None,
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_assigned_byte_round_trips() {
        for byte in 0..=u8::MAX {
            if let Some(op) = Op::from_byte(byte) {
                assert_eq!(op.byte(), byte);
            }
        }
    }

    #[test]
    fn test_unassigned_bytes() {
        assert_eq!(Op::from_byte(0x17), None);
        assert_eq!(Op::from_byte(0xff), None);
    }

    #[test]
    fn test_embedded_immediates_follow_low_bits() {
        assert_eq!(Op::LdLoc5.immediate(), Immediate::Embedded);
        assert_eq!(Op::LdLoc5.byte() & 7, 5);
        assert_eq!(Op::SysC7.byte() & 7, 7);
        assert_eq!(Op::ShpRv2.byte() & 7, 2);
    }

    #[test]
    fn test_phase_counts() {
        assert_eq!(Op::Leq.phase_count(), 3);
        assert_eq!(Op::Add.phase_count(), 2);
        assert_eq!(Op::Uen.phase_count(), 2);
        assert_eq!(Op::UenL.phase_count(), 1);
        assert_eq!(Op::Call.phase_count(), 1);
    }
}
