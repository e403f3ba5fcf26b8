//! Operator, table/vector and context opcodes
//!
//! Operators try the native path first (see [`crate::value::calculator`]).
//! When there is none and an operand's metatable has the matching
//! metamethod, a frame for it is pushed over the operands already on the
//! stack and the opcode is re-entered at its next phase once that frame
//! returns. Nothing here calls back into the interpreter on the host stack.

use super::coroutine::Coroutine;
use super::types::{OperatorPhase, OrderPhase};
use crate::bytecode::Op;
use crate::context::Context;
use crate::error::VmFault;
use crate::value::calculator::{self, names, Native};
use crate::value::Value;
use tracing::debug;

impl Coroutine {
    /* ===================== Binary Operators ===================== */

    pub(crate) fn binary_operator(&mut self, op: Op, phase: u8) -> Result<(), VmFault> {
        if matches!(op, Op::Leq | Op::Geq) {
            return self.order_operator(op, OrderPhase::from_u8(phase));
        }

        match OperatorPhase::from_u8(phase) {
            OperatorPhase::Operate => {
                let y = self.peek(0)?;
                let x = self.peek(1)?;

                if let Native::Value(value) = calculator::binary(op, &x, &y)? {
                    return self.replace_top(2, value);
                }

                let overload = calculator::binary_overload(op);
                let (a, b) = if overload.swap { (&y, &x) } else { (&x, &y) };
                let Some(method) =
                    calculator::find_binary_metamethod(a, b, overload.name, overload.latter_first)
                else {
                    return match op {
                        Op::Equ => self.replace_top(2, calculator::identity_equals(&x, &y).into()),
                        Op::Neq => self.replace_top(2, (!calculator::identity_equals(&x, &y)).into()),
                        _ => Err(VmFault::InvalidBinaryOperand {
                            op,
                            left: x.value_type(),
                            right: y.value_type(),
                        }),
                    };
                };

                if overload.swap {
                    self.swap_top();
                }
                self.call_metamethod(op, overload.name, method, 2, 1, 1)
            }
            OperatorPhase::Finish => {
                match op {
                    Op::Lss | Op::Gtr | Op::Equ => {
                        let result = self.pop()?;
                        self.push(result.is_truthy().into());
                    }
                    Op::Neq => {
                        let result = self.pop()?;
                        self.push((!result.is_truthy()).into());
                    }
                    // arithmetic metamethods return their result as is
                    _ => {}
                }
                Ok(())
            }
        }
    }

    /// `Leq`/`Geq` through metamethods: `__lss`, then `__equ` if that was falsy
    ///
    /// `Geq` runs as `Leq` with the operands swapped. A missing `__equ`
    /// faults as `Lss` with the operands in source order.
    fn order_operator(&mut self, op: Op, phase: OrderPhase) -> Result<(), VmFault> {
        match phase {
            OrderPhase::Less => {
                let y = self.peek(0)?;
                let x = self.peek(1)?;

                if let Native::Value(value) = calculator::binary(op, &x, &y)? {
                    return self.replace_top(2, value);
                }

                let overload = calculator::binary_overload(op);
                let (a, b) = if overload.swap { (&y, &x) } else { (&x, &y) };
                let Some(method) =
                    calculator::find_binary_metamethod(a, b, overload.name, overload.latter_first)
                else {
                    return Err(VmFault::InvalidBinaryOperand {
                        op,
                        left: x.value_type(),
                        right: y.value_type(),
                    });
                };

                if overload.swap {
                    self.swap_top();
                }
                // keep a copy of the operands for the `__equ` phase
                let (lhs, rhs) = (self.peek(1)?, self.peek(0)?);
                self.push(lhs);
                self.push(rhs);
                self.call_metamethod(op, names::LSS, method, 2, 1, OrderPhase::Equal as u8)
            }
            OrderPhase::Equal => {
                let less = self.pop()?;
                if less.is_truthy() {
                    return self.replace_top(2, Value::Boolean(true));
                }

                // operands are already in call order
                let overload = calculator::binary_overload(op);
                let b = self.peek(0)?;
                let a = self.peek(1)?;
                let Some(method) =
                    calculator::find_binary_metamethod(&a, &b, names::EQU, overload.latter_first)
                else {
                    let (left, right) = if overload.swap { (b, a) } else { (a, b) };
                    return Err(VmFault::InvalidBinaryOperand {
                        op: Op::Lss,
                        left: left.value_type(),
                        right: right.value_type(),
                    });
                };
                self.call_metamethod(op, names::EQU, method, 2, 1, OrderPhase::Finish as u8)
            }
            OrderPhase::Finish => {
                let equal = self.pop()?;
                self.push(equal.is_truthy().into());
                Ok(())
            }
        }
    }

    /* ===================== Unary Operators ===================== */

    pub(crate) fn unary_operator(&mut self, op: Op, phase: u8) -> Result<(), VmFault> {
        match OperatorPhase::from_u8(phase) {
            OperatorPhase::Operate => {
                let x = self.peek(0)?;
                if let Native::Value(value) = calculator::unary(op, &x) {
                    return self.replace_top(1, value);
                }

                let name = calculator::unary_overload(op);
                let Some(method) = calculator::metamethod_of(&x, name) else {
                    return Err(VmFault::InvalidUnaryOperand {
                        op,
                        operand: x.value_type(),
                    });
                };
                self.call_metamethod(op, name, method, 1, 1, OperatorPhase::Finish as u8)
            }
            OperatorPhase::Finish => Ok(()),
        }
    }

    /* ===================== Tables & Vectors ===================== */

    pub(crate) fn table_vector_operator(&mut self, op: Op, phase: u8) -> Result<(), VmFault> {
        if OperatorPhase::from_u8(phase) == OperatorPhase::Finish {
            // `__ren` left its result, `__uen` left nothing
            return Ok(());
        }

        match op {
            Op::Smt => {
                let table = self.pop()?.assert_table()?;
                let metatable = match self.pop()? {
                    Value::Nil => None,
                    other => Some(other.assert_table()?),
                };
                table.borrow_mut().set_metatable(metatable);
            }
            Op::Gmt => {
                let table = self.pop()?.assert_table()?;
                let metatable = table.borrow().metatable();
                self.push(metatable.map_or(Value::Nil, Value::Table));
            }
            Op::Ren | Op::RenL => self.read_entry(op)?,
            Op::Uen | Op::UenL => self.update_entry(op)?,
            Op::Ien => {
                let value = self.pop()?;
                let key = self.pop()?;
                let table = self.peek(0)?.assert_table()?;
                table.borrow_mut().update_entry(key, value);
            }
            Op::Pshv => {
                let vector = self.pop()?.assert_vector()?;
                let value = self.pop()?;
                vector.borrow_mut().push(value);
            }
            Op::Popv => {
                let vector = self.pop()?.assert_vector()?;
                let tail = vector.borrow_mut().pop();
                match tail {
                    Some(value) => self.push(value),
                    None => return Err(VmFault::VectorIndexOutOfRange { index: -1, len: 0 }),
                }
            }
            _ => unreachable!("{} is not a table/vector operator", op),
        }
        Ok(())
    }

    /// `Ren`/`RenL` with stack `[container, key]`
    fn read_entry(&mut self, op: Op) -> Result<(), VmFault> {
        let key = self.peek(0)?;
        let container = self.peek(1)?;

        let value = match &container {
            Value::Vector(vector) => {
                let vector = vector.borrow();
                key.as_integer()
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| vector.get(i).cloned())
                    .unwrap_or_default()
            }
            other => {
                let table = other.assert_table()?;
                if op == Op::Ren {
                    let method = table.borrow().try_get_metamethod(names::REN);
                    if let Some(method) = method {
                        return self.call_metamethod(op, names::REN, method, 2, 1, 1);
                    }
                }
                let value = table.borrow().try_read_entry(&key);
                value.unwrap_or_default()
            }
        };

        self.replace_top(2, value)
    }

    /// `Uen`/`UenL` with stack `[value, container, key]`
    fn update_entry(&mut self, op: Op) -> Result<(), VmFault> {
        let key = self.peek(0)?;
        let container = self.peek(1)?;
        let value = self.peek(2)?;

        match &container {
            Value::Vector(vector) => {
                let index = key.assert_integer()?;
                let mut vector = vector.borrow_mut();
                let len = vector.len();
                let stored = usize::try_from(index)
                    .map(|i| vector.set(i, value))
                    .unwrap_or(false);
                if !stored {
                    return Err(VmFault::VectorIndexOutOfRange { index, len });
                }
            }
            other => {
                let table = other.assert_table()?;
                if op == Op::Uen {
                    let method = table.borrow().try_get_metamethod(names::UEN);
                    if let Some(method) = method {
                        // [value, table, key] -> [table, key, value]
                        let sp = self.stack.len();
                        self.stack.as_mut_slice()[sp - 3..].rotate_left(1);
                        return self.call_metamethod(op, names::UEN, method, 3, 0, 1);
                    }
                }
                table.borrow_mut().update_entry(key, value);
            }
        }

        self.stack.truncate(self.stack.len() - 3);
        Ok(())
    }

    /* ===================== Context ===================== */

    pub(crate) fn context_operator(&mut self, op: Op) -> Result<(), VmFault> {
        let context = match self.frame().context.clone() {
            Some(context) => context,
            None => unreachable!("context opcode on an async frame"),
        };
        let scope = match op {
            Op::Rvc | Op::Uvc => context,
            _ => Context::root(&context),
        };

        let name = self.pop()?.assert_string()?;
        match op {
            Op::Rvc | Op::Rvg => self.push(Context::read(&scope, &name)),
            Op::Uvc | Op::Uvg => {
                let value = self.pop()?;
                Context::write(&scope, &name, value);
            }
            _ => unreachable!("{} is not a context operator", op),
        }
        Ok(())
    }

    /* ===================== Helpers ===================== */

    /// Pop `count` operands and push `value`
    fn replace_top(&mut self, count: usize, value: Value) -> Result<(), VmFault> {
        for _ in 0..count {
            self.pop()?;
        }
        self.push(value);
        Ok(())
    }

    fn swap_top(&mut self) {
        let sp = self.stack.len();
        self.stack.as_mut_slice().swap(sp - 1, sp - 2);
    }

    /// Call `method` on the top `argc` operands, coming back at `resume_phase`
    fn call_metamethod(
        &mut self,
        op: Op,
        name: &str,
        method: Value,
        argc: usize,
        returns: usize,
        resume_phase: u8,
    ) -> Result<(), VmFault> {
        debug!(%op, metamethod = name, "metamethod dispatch");
        self.continue_at(resume_phase);
        let base = self.stack.len() - argc;
        self.invoke(method, base, Some(returns))
    }
}
