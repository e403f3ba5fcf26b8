//! Operator calculator
//!
//! Native semantics of every binary and unary operator, plus the metamethod
//! lookup rules used when no native path applies.
//!
//! The calculator never calls a metamethod itself. It answers with
//! [`Native::Overload`] and the interpreter pushes the metamethod frame, so
//! that the call happens inside the coroutine's own frame stack and can
//! suspend like any other call.
//!
//! ## Native paths
//! - both integer: wrapping two's-complement arithmetic
//! - both numeric (integer or float): widened to `f64`
//! - both boolean: logical `And`/`Orr`/`Xor`
//! - both string: `Add` concatenates, comparisons are ordinal
//!
//! Integer `Div`/`Mod` by zero is a `DivisionByZero` fault.

use super::{address_of, Value};
use crate::bytecode::Op;
use crate::error::VmFault;
use std::cmp::Ordering;
use std::rc::Rc;

/* ===================== Metamethod Names ===================== */

pub mod names {
    pub const ADD: &str = "__add";
    pub const SUB: &str = "__sub";
    pub const MUL: &str = "__mul";
    pub const DIV: &str = "__div";
    pub const MOD: &str = "__mod";
    pub const LSH: &str = "__lsh";
    pub const RSH: &str = "__rsh";
    pub const AND: &str = "__and";
    pub const ORR: &str = "__orr";
    pub const XOR: &str = "__xor";
    pub const LSS: &str = "__lss";
    pub const EQU: &str = "__equ";
    pub const REN: &str = "__ren";
    pub const UEN: &str = "__uen";
    pub const NOT: &str = "__not";
    pub const NEG: &str = "__neg";
    pub const STR: &str = "__str";
}

/* ===================== Outcomes ===================== */

/// Result of trying an operator natively
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Value(Value),
    /// No native path; the operator must go through a metamethod
    Overload,
}

/// How a binary operator reaches its metamethod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overload {
    pub name: &'static str,
    /// Call the metamethod as `(y, x)` instead of `(x, y)`
    pub swap: bool,
    /// Of the operands in call order, look at the second one's metatable first
    pub latter_first: bool,
}

impl Overload {
    const fn left(name: &'static str) -> Self {
        Overload {
            name,
            swap: false,
            latter_first: false,
        }
    }

    const fn flipped(name: &'static str) -> Self {
        Overload {
            name,
            swap: true,
            latter_first: true,
        }
    }
}

/* ===================== Binary Operators ===================== */

fn both_integer(x: &Value, y: &Value) -> Option<(i64, i64)> {
    match (x, y) {
        (Value::Integer(a), Value::Integer(b)) => Some((*a, *b)),
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn both_numeric(x: &Value, y: &Value) -> Option<(f64, f64)> {
    Some((as_number(x)?, as_number(y)?))
}

fn both_boolean(x: &Value, y: &Value) -> Option<(bool, bool)> {
    match (x, y) {
        (Value::Boolean(a), Value::Boolean(b)) => Some((*a, *b)),
        _ => None,
    }
}

fn both_string<'a>(x: &'a Value, y: &'a Value) -> Option<(&'a str, &'a str)> {
    match (x, y) {
        (Value::String(a), Value::String(b)) => Some((a, b)),
        _ => None,
    }
}

/// Native ordering for the comparison operators
fn native_ordering(x: &Value, y: &Value) -> Option<Option<Ordering>> {
    if let Some((a, b)) = both_integer(x, y) {
        return Some(Some(a.cmp(&b)));
    }
    if let Some((a, b)) = both_numeric(x, y) {
        return Some(a.partial_cmp(&b));
    }
    if let Some((a, b)) = both_string(x, y) {
        return Some(Some(a.cmp(b)));
    }
    None
}

/// Native equality; `None` when the operands need `__equ` or identity
///
/// Numeric operands are widened to `f64` and compared by bit pattern.
pub fn native_equals(x: &Value, y: &Value) -> Option<bool> {
    match (x, y) {
        (Value::Nil, Value::Nil) => Some(true),
        (Value::Integer(a), Value::Integer(b)) => Some(a == b),
        (Value::Boolean(a), Value::Boolean(b)) => Some(a == b),
        (Value::String(a), Value::String(b)) => Some(a == b),
        (Value::Function(a), Value::Function(b)) => Some(a.same_closure(b)),
        _ => both_numeric(x, y).map(|(a, b)| a.to_bits() == b.to_bits()),
    }
}

/// Last resort for `Equ`/`Neq`: same type and same object
pub fn identity_equals(x: &Value, y: &Value) -> bool {
    x.value_type() == y.value_type() && x.same_object(y)
}

fn shift_count(y: i64) -> u32 {
    (y as u64 & 0x3f) as u32
}

/// Apply a binary operator natively
///
/// Only `DivisionByZero` faults here. A missing native path is reported as
/// [`Native::Overload`], and the caller decides between a metamethod and an
/// `InvalidBinaryOperand` fault.
pub fn binary(op: Op, x: &Value, y: &Value) -> Result<Native, VmFault> {
    let int = both_integer(x, y);
    let num = both_numeric(x, y);

    let value = match op {
        Op::Add => match (int, num, both_string(x, y)) {
            (Some((a, b)), _, _) => Value::Integer(a.wrapping_add(b)),
            (_, Some((a, b)), _) => Value::Float(a + b),
            (_, _, Some((a, b))) => Value::string(&format!("{}{}", a, b)),
            _ => return Ok(Native::Overload),
        },
        Op::Sub => match (int, num) {
            (Some((a, b)), _) => Value::Integer(a.wrapping_sub(b)),
            (_, Some((a, b))) => Value::Float(a - b),
            _ => return Ok(Native::Overload),
        },
        Op::Mul => match (int, num) {
            (Some((a, b)), _) => Value::Integer(a.wrapping_mul(b)),
            (_, Some((a, b))) => Value::Float(a * b),
            _ => return Ok(Native::Overload),
        },
        Op::Div => match (int, num) {
            (Some((_, 0)), _) => return Err(VmFault::DivisionByZero { op }),
            (Some((a, b)), _) => Value::Integer(a.wrapping_div(b)),
            (_, Some((a, b))) => Value::Float(a / b),
            _ => return Ok(Native::Overload),
        },
        Op::Mod => match int {
            Some((_, 0)) => return Err(VmFault::DivisionByZero { op }),
            Some((a, b)) => Value::Integer(a.wrapping_rem(b)),
            None => return Ok(Native::Overload),
        },
        Op::Lsh => match int {
            Some((a, b)) => Value::Integer(((a as u64) << shift_count(b)) as i64),
            None => return Ok(Native::Overload),
        },
        Op::Rsh => match int {
            Some((a, b)) => Value::Integer(((a as u64) >> shift_count(b)) as i64),
            None => return Ok(Native::Overload),
        },
        Op::And | Op::Orr | Op::Xor => match (int, both_boolean(x, y)) {
            (Some((a, b)), _) => Value::Integer(match op {
                Op::And => a & b,
                Op::Orr => a | b,
                _ => a ^ b,
            }),
            (_, Some((a, b))) => Value::Boolean(match op {
                Op::And => a && b,
                Op::Orr => a || b,
                _ => a ^ b,
            }),
            _ => return Ok(Native::Overload),
        },
        Op::Lss | Op::Gtr | Op::Leq | Op::Geq => match native_ordering(x, y) {
            Some(ordering) => Value::Boolean(match (op, ordering) {
                (_, None) => false,
                (Op::Lss, Some(o)) => o == Ordering::Less,
                (Op::Gtr, Some(o)) => o == Ordering::Greater,
                (Op::Leq, Some(o)) => o != Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            }),
            None => return Ok(Native::Overload),
        },
        Op::Equ => match native_equals(x, y) {
            Some(eq) => Value::Boolean(eq),
            None => return Ok(Native::Overload),
        },
        Op::Neq => match native_equals(x, y) {
            Some(eq) => Value::Boolean(!eq),
            None => return Ok(Native::Overload),
        },
        _ => unreachable!("{} is not a binary operator", op),
    };

    Ok(Native::Value(value))
}

/// Metamethod routing for a binary operator
///
/// `Gtr` and `Geq` reuse `__lss` as `(y, x)`, consulting the latter of that
/// pair (the source-order left operand `x`) first. `Neq` reuses `__equ`.
pub fn binary_overload(op: Op) -> Overload {
    match op {
        Op::Add => Overload::left(names::ADD),
        Op::Sub => Overload::left(names::SUB),
        Op::Mul => Overload::left(names::MUL),
        Op::Div => Overload::left(names::DIV),
        Op::Mod => Overload::left(names::MOD),
        Op::Lsh => Overload::left(names::LSH),
        Op::Rsh => Overload::left(names::RSH),
        Op::And => Overload::left(names::AND),
        Op::Orr => Overload::left(names::ORR),
        Op::Xor => Overload::left(names::XOR),
        Op::Lss | Op::Leq => Overload::left(names::LSS),
        Op::Gtr | Op::Geq => Overload::flipped(names::LSS),
        Op::Equ | Op::Neq => Overload::left(names::EQU),
        _ => unreachable!("{} is not a binary operator", op),
    }
}

/* ===================== Unary Operators ===================== */

pub fn unary(op: Op, x: &Value) -> Native {
    let value = match (op, x) {
        (Op::Not, Value::Integer(i)) => Value::Integer(!i),
        (Op::Not, Value::Boolean(b)) => Value::Boolean(!b),
        (Op::Neg, Value::Integer(i)) => Value::Integer(i.wrapping_neg()),
        (Op::Neg, Value::Float(f)) => Value::Float(-f),
        (Op::Typeof, v) => Value::string(v.type_name()),
        (Op::IsNil, v) => Value::Boolean(v.is_nil()),
        (Op::Not | Op::Neg, _) => return Native::Overload,
        _ => unreachable!("{} is not a unary operator", op),
    };
    Native::Value(value)
}

pub fn unary_overload(op: Op) -> &'static str {
    match op {
        Op::Not => names::NOT,
        _ => names::NEG,
    }
}

/* ===================== Stringify ===================== */

/// Diagnostic rendering: strings quoted and escaped, heap objects by address
///
/// Never calls `__str`; see [`Scheduler::stringify`](crate::scheduler::Scheduler::stringify).
pub fn debug_stringify(v: &Value) -> String {
    match v {
        Value::Nil => "nil".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => format!("{:?}", f),
        Value::Boolean(b) => b.to_string(),
        Value::String(s) => format!("\"{}\"", s.escape_default()),
        Value::Table(t) => format!("<table: {:08x}>", address_of(Rc::as_ptr(t))),
        Value::Vector(vector) => format!("<vector: {:08x}>", address_of(Rc::as_ptr(vector))),
        Value::Function(f) => match f.parent_context() {
            Some(ctx) => format!(
                "<function \"{} at {:08x}\">",
                f.prototype().name,
                address_of(Rc::as_ptr(&ctx))
            ),
            None => format!("<function \"{} unbound\">", f.prototype().name),
        },
        Value::Coroutine(c) => format!("<coroutine: {:08x}>", address_of(Rc::as_ptr(c))),
        Value::PureFunction(f) => format!("<pure efunction: {:08x}>", address_of(Rc::as_ptr(f))),
        Value::EffectFunction(f) => format!("<efunction: {:08x}>", address_of(Rc::as_ptr(f))),
        Value::AsyncFunction(f) => format!("<async efunction: {:08x}>", address_of(Rc::as_ptr(f))),
    }
}

/* ===================== Metamethod Lookup ===================== */

/// Invokable metamethod `name` from the metatable of `v`, if `v` is a table
pub fn metamethod_of(v: &Value, name: &str) -> Option<Value> {
    match v {
        Value::Table(t) => t.borrow().try_get_metamethod(name),
        _ => None,
    }
}

/// Metamethod for a binary operator called as `(a, b)`
pub fn find_binary_metamethod(
    a: &Value,
    b: &Value,
    name: &str,
    latter_first: bool,
) -> Option<Value> {
    let (first, second) = if latter_first { (b, a) } else { (a, b) };
    metamethod_of(first, name).or_else(|| metamethod_of(second, name))
}
