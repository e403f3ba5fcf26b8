//! Bytecode assembler
//!
//! Builds prototypes and units without a front end. The high-level helpers
//! pick the most compact encoding for a logical immediate; [`FunctionBuilder::emit`]
//! writes exactly the form it is given.
//!
//! # Example
//!
//! ```rust
//! use glos_vm::bytecode::{FunctionBuilder, Op, UnitBuilder};
//!
//! let mut main = FunctionBuilder::new("main");
//! main.ld(1).ld(2).op(Op::Add).op(Op::Ret);
//!
//! let mut unit = UnitBuilder::new();
//! let entry = unit.add_function(main.build());
//! let unit = unit.entry(entry).build();
//! ```

use super::opcode::{Immediate, Op};
use crate::function::{Prototype, Unit};
use std::collections::HashMap;

/// A branch target inside one function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/* ===================== Function Builder ===================== */

#[derive(Debug, Default)]
pub struct FunctionBuilder {
    name: String,
    code: Vec<u8>,
    local_variable_size: usize,
    variables_in_context: Vec<String>,
    labels: Vec<Option<usize>>,
    /// (position of a Dword immediate, label it points to)
    fixups: Vec<(usize, Label)>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        FunctionBuilder {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Current code length (address of the next instruction)
    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Allocate a local variable slot
    pub fn local(&mut self) -> i64 {
        self.local_variable_size += 1;
        (self.local_variable_size - 1) as i64
    }

    pub fn locals(&mut self, count: usize) -> &mut Self {
        self.local_variable_size += count;
        self
    }

    /// Declare a name that must live as a cell in the frame's context
    pub fn context_variable(&mut self, name: impl Into<String>) -> &mut Self {
        self.variables_in_context.push(name.into());
        self
    }

    /// Append raw bytes verbatim
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// Opcode with no immediate
    pub fn op(&mut self, op: Op) -> &mut Self {
        self.emit(op, 0)
    }

    /// Opcode with its immediate encoded in the opcode's own shape
    ///
    /// Embedded immediates are taken from the opcode itself; `imm` is ignored
    /// for them, as it is for `None` and `OnStack`.
    pub fn emit(&mut self, op: Op, imm: i64) -> &mut Self {
        self.code.push(op.byte());
        match op.immediate() {
            Immediate::None | Immediate::Embedded | Immediate::OnStack => {}
            Immediate::Byte => self.code.push(imm as i8 as u8),
            Immediate::Dword => self.code.extend_from_slice(&(imm as i32).to_le_bytes()),
            Immediate::Qword => self.code.extend_from_slice(&imm.to_le_bytes()),
        }
        self
    }

    /* ---------- compact forms ---------- */

    pub fn ld(&mut self, value: i64) -> &mut Self {
        match value {
            -1 => self.op(Op::LdNeg1),
            0..=3 => self.embedded(Op::Ld0, value),
            v if i8::try_from(v).is_ok() => self.emit(Op::LdS, v),
            v if i32::try_from(v).is_ok() => self.emit(Op::Ld, v),
            v => self.emit(Op::LdQ, v),
        }
    }

    pub fn ld_flt(&mut self, value: f64) -> &mut Self {
        self.emit(Op::LdFlt, value.to_bits() as i64)
    }

    pub fn ld_str(&mut self, index: i64) -> &mut Self {
        if (0..=127).contains(&index) {
            self.emit(Op::LdStrS, index)
        } else {
            self.emit(Op::LdStr, index)
        }
    }

    pub fn ld_fun(&mut self, index: i64) -> &mut Self {
        if (0..=127).contains(&index) {
            self.emit(Op::LdFunS, index)
        } else {
            self.emit(Op::LdFun, index)
        }
    }

    pub fn ld_loc(&mut self, index: i64) -> &mut Self {
        self.local_access(Op::LdLoc0, Op::LdLocS, Op::LdLoc, index)
    }

    pub fn st_loc(&mut self, index: i64) -> &mut Self {
        self.local_access(Op::StLoc0, Op::StLocS, Op::StLoc, index)
    }

    pub fn ld_arg(&mut self, index: i64) -> &mut Self {
        match index {
            0..=3 => self.embedded(Op::LdArg0, index),
            i if i8::try_from(i).is_ok() => self.emit(Op::LdArgS, i),
            i => self.emit(Op::LdArg, i),
        }
    }

    pub fn shp_rv(&mut self, count: i64) -> &mut Self {
        match count {
            0..=3 => self.embedded(Op::ShpRv0, count),
            c if i8::try_from(c).is_ok() => self.emit(Op::ShpRvS, c),
            c => self.emit(Op::ShpRv, c),
        }
    }

    /// # Panics
    /// Panics unless `slot < 8`.
    pub fn syscall(&mut self, slot: u8) -> &mut Self {
        assert!(slot < 8, "syscall slot out of range");
        self.embedded(Op::SysC0, slot as i64)
    }

    fn local_access(&mut self, embedded: Op, short: Op, long: Op, index: i64) -> &mut Self {
        match index {
            0..=7 => self.embedded(embedded, index),
            i if i8::try_from(i).is_ok() => self.emit(short, i),
            i => self.emit(long, i),
        }
    }

    fn embedded(&mut self, base: Op, imm: i64) -> &mut Self {
        self.code.push(base.byte() + imm as u8);
        self
    }

    /* ---------- labels & branches ---------- */

    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current position
    pub fn mark(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len());
        self
    }

    /// Branch-family or `Try` opcode (Dword form) to `label`
    pub fn branch(&mut self, op: Op, label: Label) -> &mut Self {
        assert_eq!(op.immediate(), Immediate::Dword, "{} takes no dword target", op);
        self.code.push(op.byte());
        self.fixups.push((self.code.len(), label));
        self.code.extend_from_slice(&0i32.to_le_bytes());
        self
    }

    /// # Panics
    /// Panics if a branch targets a label that was never marked.
    pub fn build(&self) -> Prototype {
        let mut code = self.code.clone();
        for &(at, label) in &self.fixups {
            let target = self.labels[label.0]
                .unwrap_or_else(|| panic!("label {:?} never marked in {}", label, self.name));
            let offset = target as i64 - (at + 4) as i64;
            code[at..at + 4].copy_from_slice(&(offset as i32).to_le_bytes());
        }

        Prototype {
            name: self.name.clone(),
            code,
            local_variable_size: self.local_variable_size,
            variables_in_context: self.variables_in_context.clone(),
        }
    }
}

/* ===================== Unit Builder ===================== */

#[derive(Debug, Default)]
pub struct UnitBuilder {
    prototypes: Vec<Prototype>,
    strings: Vec<String>,
    string_index: HashMap<String, usize>,
    entry: usize,
}

impl UnitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `s` in the string table, interning it on first use
    pub fn string(&mut self, s: &str) -> i64 {
        if let Some(&index) = self.string_index.get(s) {
            return index as i64;
        }
        self.strings.push(s.to_string());
        self.string_index.insert(s.to_string(), self.strings.len() - 1);
        (self.strings.len() - 1) as i64
    }

    pub fn add_function(&mut self, prototype: Prototype) -> usize {
        self.prototypes.push(prototype);
        self.prototypes.len() - 1
    }

    pub fn entry(&mut self, index: usize) -> &mut Self {
        self.entry = index;
        self
    }

    pub fn build(&self) -> Unit {
        Unit {
            prototypes: self.prototypes.clone(),
            strings: self.strings.clone(),
            entry: self.entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{decode, decode_all};

    fn single(f: impl FnOnce(&mut FunctionBuilder)) -> (Option<Op>, i64) {
        let mut b = FunctionBuilder::new("t");
        f(&mut b);
        let proto = b.build();
        let ins = decode(&proto.code, 0).expect("decode");
        assert_eq!(ins.next_ip, proto.code.len(), "trailing bytes");
        (ins.op, ins.imm)
    }

    #[test]
    fn test_ld_picks_compact_forms_at_boundaries() {
        let cases = [
            (-1, Op::LdNeg1),
            (0, Op::Ld0),
            (3, Op::Ld3),
            (4, Op::LdS),
            (i8::MIN as i64, Op::LdS),
            (i8::MAX as i64, Op::LdS),
            (i8::MAX as i64 + 1, Op::Ld),
            (i32::MIN as i64, Op::Ld),
            (i32::MAX as i64, Op::Ld),
            (i32::MAX as i64 + 1, Op::LdQ),
            (i64::MIN, Op::LdQ),
            (i64::MAX, Op::LdQ),
        ];
        for (value, expected) in cases {
            let (op, imm) = single(|b| {
                b.ld(value);
            });
            assert_eq!(op, Some(expected), "value {}", value);
            if expected != Op::LdNeg1 {
                assert_eq!(imm, value, "value {}", value);
            }
        }
    }

    #[test]
    fn test_local_forms() {
        assert_eq!(single(|b| { b.ld_loc(7); }), (Some(Op::LdLoc7), 7));
        assert_eq!(single(|b| { b.st_loc(8); }), (Some(Op::StLocS), 8));
        assert_eq!(single(|b| { b.ld_loc(-129); }), (Some(Op::LdLoc), -129));
        assert_eq!(single(|b| { b.ld_arg(2); }), (Some(Op::LdArg2), 2));
        assert_eq!(single(|b| { b.shp_rv(0); }), (Some(Op::ShpRv0), 0));
        assert_eq!(single(|b| { b.shp_rv(300); }), (Some(Op::ShpRv), 300));
        assert_eq!(single(|b| { b.syscall(5); }), (Some(Op::SysC5), 5));
    }

    #[test]
    fn test_string_and_function_forms() {
        assert_eq!(single(|b| { b.ld_str(127); }), (Some(Op::LdStrS), 127));
        assert_eq!(single(|b| { b.ld_str(128); }), (Some(Op::LdStr), 128));
        assert_eq!(single(|b| { b.ld_fun(0); }), (Some(Op::LdFunS), 0));
    }

    #[test]
    fn test_float_bits_survive() {
        let (op, imm) = single(|b| {
            b.ld_flt(-2.5);
        });
        assert_eq!(op, Some(Op::LdFlt));
        assert_eq!(f64::from_bits(imm as u64), -2.5);
    }

    #[test]
    fn test_branch_offsets_are_relative_to_next_instruction() {
        let mut b = FunctionBuilder::new("loop");
        let top = b.label();
        let end = b.label();
        b.mark(top);
        b.op(Op::Nop);
        b.branch(Op::Bf, end);
        b.branch(Op::B, top);
        b.mark(end);
        let proto = b.build();

        let ins = decode_all(&proto.code).expect("decode");
        // Nop@0, Bf@1..6, B@6..11
        assert_eq!(ins[1].op, Some(Op::Bf));
        assert_eq!(ins[1].next_ip as i64 + ins[1].imm, 11);
        assert_eq!(ins[2].next_ip as i64 + ins[2].imm, 0);
    }

    #[test]
    fn test_strings_are_interned() {
        let mut unit = UnitBuilder::new();
        assert_eq!(unit.string("a"), 0);
        assert_eq!(unit.string("b"), 1);
        assert_eq!(unit.string("a"), 0);
        assert_eq!(unit.build().strings.len(), 2);
    }
}
