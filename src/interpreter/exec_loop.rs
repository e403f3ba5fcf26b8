//! Core execution loop
//!
//! [`Coroutine::run`] drives the top frame until something has to leave the
//! coroutine: the frame stack empties, a `Yield`, or a switch request.
//!
//! ## Function Organization
//! 1. run() - Top-level driver, one iteration per instruction or async step
//! 2. step() - Fetch (or re-enter) one instruction and dispatch by category
//! 3. Category handlers, in opcode-table order
//!
//! Operators and table/vector/context opcodes live in `operators.rs`; calls,
//! returns and async steps in `calls.rs`.

use super::coroutine::{Coroutine, ExecResult};
use super::types::{FrameKind, PhaseState, TryFrame};
use crate::bytecode::{decode, Category, Op};
use crate::error::VmFault;
use crate::function::Function;
use crate::scheduler::Syscalls;
use crate::value::Value;
use crate::vector::Vector;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::trace;

/* ===================== Driver ===================== */

impl Coroutine {
    pub(crate) fn run(&mut self, syscalls: &Syscalls) -> Result<ExecResult, VmFault> {
        loop {
            let is_async = match self.call_stack.last() {
                None => return Ok(ExecResult::Return(self.stack.split_off(0))),
                Some(frame) => matches!(frame.kind, FrameKind::Async { .. }),
            };

            let step = if is_async {
                self.step_async()?
            } else {
                self.step(syscalls)?
            };

            if let Some(result) = step {
                return Ok(result);
            }
        }
    }

    /// Execute one instruction, or one phase of a multi-phase instruction
    fn step(&mut self, syscalls: &Syscalls) -> Result<Option<ExecResult>, VmFault> {
        let (op, imm, phase) = self.fetch()?;

        match op.category() {
            Category::BinaryOperator => self.binary_operator(op, phase)?,
            Category::TableVectorOperator => self.table_vector_operator(op, phase)?,
            Category::UnaryOperator => self.unary_operator(op, phase)?,
            Category::ContextOperator => self.context_operator(op)?,
            Category::LoadFunction => self.load_function(imm)?,
            Category::LoadString => self.load_string(imm)?,
            Category::LoadInteger => self.push(Value::Integer(if op == Op::LdNeg1 { -1 } else { imm })),
            Category::LoadMisc => self.load_misc(op, imm),
            Category::LoadLocalVariable => {
                let slot = self.local_slot(imm)?;
                let value = self.stack[slot].clone();
                self.push(value);
            }
            Category::StoreLocalVariable => {
                let slot = self.local_slot(imm)?;
                let value = self.pop()?;
                self.stack[slot] = value;
            }
            Category::LoadArgument => {
                let frame = self.frame();
                let value = if (0..frame.argument_count as i64).contains(&imm) {
                    self.stack[frame.stack_base + imm as usize].clone()
                } else {
                    Value::Nil
                };
                self.push(value);
            }
            Category::Branch => self.branch(op, imm)?,
            Category::Try => self.try_operator(op, imm)?,
            Category::ShapeReturn => {
                let del = self.pop_delimiter()?;
                self.shape(del, Some(imm.max(0) as usize));
            }
            Category::Syscall => {
                if let Some(syscall) = syscalls[imm as usize].clone() {
                    syscall(&mut self.stack, &mut self.call_stack, &mut self.delimiter_stack);
                }
            }
            Category::Others => return self.others(op),
        }

        Ok(None)
    }

    /// Decode the next instruction, or re-enter the unfinished one
    ///
    /// Returns the opcode, its immediate and the phase to run. The frame is
    /// left marked finished; a handler that hands off to a metamethod calls
    /// [`Coroutine::continue_at`] to come back.
    fn fetch(&mut self) -> Result<(Op, i64, u8), VmFault> {
        let resumed = {
            let frame = self.frame_mut();
            if frame.phase.is_finished() {
                None
            } else {
                frame.phase.phase = frame.phase.next_phase;
                frame.phase.next_phase = frame.phase.phase_count;
                frame.phase.last_op.map(|op| (op, frame.phase.last_imm, frame.phase.phase))
            }
        };
        if let Some(resumed) = resumed {
            return Ok(resumed);
        }

        let ins = {
            let frame = self.frame_mut();
            let function = match &frame.kind {
                FrameKind::Bytecode { function } => function.clone(),
                FrameKind::Async { .. } => unreachable!("fetch on an async frame"),
            };
            frame.ip = frame.next_ip;
            let ins = decode(&function.prototype().code, frame.ip)?;
            frame.next_ip = ins.next_ip;
            trace!(
                function = %function.prototype().name,
                ip = frame.ip,
                op = ?ins.op,
                imm = ins.imm,
                "decode"
            );
            ins
        };

        let op = ins.op.ok_or(VmFault::UnknownOp(ins.byte))?;
        let imm = if ins.imm_on_stack {
            self.pop()?.assert_integer()?
        } else {
            ins.imm
        };

        let frame = self.frame_mut();
        frame.phase = PhaseState::start(op, imm);
        frame.phase.next_phase = frame.phase.phase_count;
        Ok((op, imm, 0))
    }

    /// Re-enter the current instruction at `phase` once control comes back
    /// to this frame
    pub(crate) fn continue_at(&mut self, phase: u8) {
        self.frame_mut().phase.next_phase = phase;
    }

    /* ===================== Loads ===================== */

    fn load_function(&mut self, imm: i64) -> Result<(), VmFault> {
        let unit = self.current_function().unit().clone();
        let bound = unit.prototypes.len();
        if imm < 0 || imm as usize >= bound {
            return Err(VmFault::FunctionIndexOutOfRange { index: imm, bound });
        }
        self.push(Value::Function(Function::new(unit, imm as usize, None)));
        Ok(())
    }

    fn load_string(&mut self, imm: i64) -> Result<(), VmFault> {
        let value = {
            let function = self.current_function();
            let strings = &function.unit().strings;
            match usize::try_from(imm).ok().and_then(|i| strings.get(i)) {
                Some(s) => Value::string(s),
                None => {
                    return Err(VmFault::StringIndexOutOfRange {
                        index: imm,
                        bound: strings.len(),
                    })
                }
            }
        };
        self.push(value);
        Ok(())
    }

    fn load_misc(&mut self, op: Op, imm: i64) {
        let value = match op {
            Op::LdNTbl => Value::new_table(),
            Op::LdNil => Value::Nil,
            Op::LdFlt => Value::float_from_bits(imm as u64),
            Op::LdNVec => Value::Vector(Rc::new(RefCell::new(Vector::with_capacity(
                self.config().vector_capacity,
            )))),
            Op::LdTrue => Value::Boolean(true),
            Op::LdFalse => Value::Boolean(false),
            Op::LdArgc => Value::Integer(self.frame().argument_count as i64),
            _ => unreachable!("{} is not a misc load", op),
        };
        self.push(value);
    }

    /// Absolute stack slot of local variable `imm`
    fn local_slot(&self, imm: i64) -> Result<usize, VmFault> {
        let frame = self.frame();
        let bound = frame.local_variable_count();
        if imm < 0 || imm as usize >= bound {
            return Err(VmFault::LocalVariableIndexOutOfRange { index: imm, bound });
        }
        Ok(frame.local_variables_base + imm as usize)
    }

    fn current_function(&self) -> &crate::function::FunctionRef {
        match self.frame().function() {
            Some(function) => function,
            None => unreachable!("bytecode handler on an async frame"),
        }
    }

    /* ===================== Control Flow ===================== */

    /// Absolute address `imm` bytes after the current instruction
    fn jump_target(&self, imm: i64) -> Result<usize, VmFault> {
        let len = self.current_function().prototype().code.len();
        let target = self.frame().next_ip as i64 + imm;
        if target < 0 || target as usize > len {
            return Err(VmFault::InvalidInstructionPointer { ip: target, len });
        }
        Ok(target as usize)
    }

    fn branch(&mut self, op: Op, imm: i64) -> Result<(), VmFault> {
        let jump = match op {
            Op::B | Op::BS => true,
            Op::Bf | Op::BfS => !self.pop()?.is_truthy(),
            Op::Bt | Op::BtS => self.pop()?.is_truthy(),
            Op::Bn | Op::BnS => self.pop()?.is_nil(),
            Op::Bnn | Op::BnnS => !self.pop()?.is_nil(),
            _ => unreachable!("{} is not a branch", op),
        };

        if jump {
            let target = self.jump_target(imm)?;
            self.frame_mut().next_ip = target;
        }
        Ok(())
    }

    fn try_operator(&mut self, op: Op, imm: i64) -> Result<(), VmFault> {
        match op {
            Op::Try | Op::TryS => {
                let mark = TryFrame {
                    target: self.jump_target(imm)?,
                    stack_pointer: self.stack.len(),
                    call_depth: self.call_stack.len(),
                    delimiter_depth: self.delimiter_stack.len(),
                };
                self.try_stack.push(mark);
            }
            Op::EndTry => {
                if self.try_stack.len() > self.frame().try_stack_base {
                    self.try_stack.pop();
                }
            }
            Op::Throw => {
                let value = self.pop()?;
                return Err(VmFault::Thrown {
                    value: value.to_string(),
                });
            }
            _ => unreachable!("{} is not a try opcode", op),
        }
        Ok(())
    }

    /* ===================== Stack, Calls & Coroutines ===================== */

    fn others(&mut self, op: Op) -> Result<Option<ExecResult>, VmFault> {
        match op {
            Op::Dup => {
                let top = self.peek(0)?;
                self.push(top);
            }
            Op::Pop => {
                self.pop()?;
            }
            Op::Mkc => {
                let entry = self.pop()?;
                let coroutine = Coroutine::new(entry, *self.config())?;
                self.push(Value::Coroutine(coroutine.into_ref()));
            }
            Op::Yield => {
                let del = self.peek_delimiter()?;
                let values = self.stack.split_off(del);
                return Ok(Some(ExecResult::Yield(values)));
            }
            Op::Resume => {
                let coroutine = self.pop()?.assert_coroutine()?;
                let del = self.peek_delimiter()?;
                let args = self.stack.split_off(del);
                return Ok(Some(ExecResult::Resume { coroutine, args }));
            }
            Op::LdDel => self.push_delimiter(),
            Op::Call => {
                let callee = self.pop()?;
                let base = self.peek_delimiter()?;
                self.invoke(callee, base, None)?;
            }
            Op::Ret => self.ret()?,
            Op::Bind => {
                let function = self.peek(0)?.assert_function()?;
                if let Some(context) = self.frame().context.clone() {
                    function.bind(context);
                }
            }
            Op::PopDel => {
                self.pop_delimiter()?;
            }
            Op::DupList => {
                let del = self.peek_delimiter()?;
                let run = self.stack.to_vec_from(del);
                self.push_delimiter();
                self.stack.extend(run);
            }
            Op::Pkv => {
                let del = self.pop_delimiter()?;
                let items = self.stack.split_off(del);
                self.push(Value::vector_from(items));
            }
            Op::Upv => {
                let vector = self.pop()?.assert_vector()?;
                let items = vector.borrow().as_slice().to_vec();
                self.push_delimiter();
                self.stack.extend(items);
            }
            Op::Nop => {}
            _ => unreachable!("{} is not in the Others category", op),
        }
        Ok(None)
    }
}
