//! Runtime value types
//!
//! `Value` is the tagged union every opcode operates on. Scalars live inline;
//! heap objects are shared handles (`Rc`), so cloning a `Value` never copies a
//! table, vector, context or coroutine.
//!
//! Floats are stored as `f64`, but their identity is the raw 64-bit pattern:
//! [`Value::raw_equals`] and [`Value::raw_hash`] compare and hash
//! `f64::to_bits`, so `NaN` equals itself and `0.0` differs from `-0.0`.

pub mod calculator;

use crate::error::VmFault;
use crate::external::{AsyncFunctionRef, EffectFn, PureFn};
use crate::function::FunctionRef;
use crate::interpreter::CoroutineRef;
use crate::table::{Table, TableRef};
use crate::vector::{Vector, VectorRef};
use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/* ===================== Types ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Nil,
    Integer,
    Float,
    Boolean,
    Table,
    String,
    Function,
    Vector,
    Coroutine,
    PureFunction,
    EffectFunction,
    AsyncFunction,
}

impl ValueType {
    /// Name reported by the `Typeof` opcode
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Nil => "nil",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::Table => "table",
            ValueType::String => "string",
            ValueType::Function
            | ValueType::PureFunction
            | ValueType::EffectFunction
            | ValueType::AsyncFunction => "function",
            ValueType::Vector => "vector",
            ValueType::Coroutine => "coroutine",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/* ===================== Value ===================== */

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Integer(i64),
    /// Identity is the raw bit pattern, see the module docs
    Float(f64),
    Boolean(bool),
    String(Rc<str>),
    Table(TableRef),
    Vector(VectorRef),
    Function(FunctionRef),
    Coroutine(CoroutineRef),
    PureFunction(PureFn),
    EffectFunction(EffectFn),
    AsyncFunction(AsyncFunctionRef),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::String(Rc::from(s))
    }

    pub fn float_from_bits(bits: u64) -> Value {
        Value::Float(f64::from_bits(bits))
    }

    pub fn new_table() -> Value {
        Value::Table(Rc::new(RefCell::new(Table::new())))
    }

    pub fn new_vector() -> Value {
        Value::Vector(Rc::new(RefCell::new(Vector::new())))
    }

    pub fn vector_from(items: Vec<Value>) -> Value {
        Value::Vector(Rc::new(RefCell::new(Vector::from(items))))
    }

    pub fn pure_function<F>(f: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, VmFault> + 'static,
    {
        Value::PureFunction(Rc::new(f))
    }

    pub fn effect_function<F>(f: F) -> Value
    where
        F: Fn(&mut crate::interpreter::Coroutine, &[Value]) -> Result<Vec<Value>, VmFault>
            + 'static,
    {
        Value::EffectFunction(Rc::new(f))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Nil => ValueType::Nil,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::Boolean(_) => ValueType::Boolean,
            Value::String(_) => ValueType::String,
            Value::Table(_) => ValueType::Table,
            Value::Vector(_) => ValueType::Vector,
            Value::Function(_) => ValueType::Function,
            Value::Coroutine(_) => ValueType::Coroutine,
            Value::PureFunction(_) => ValueType::PureFunction,
            Value::EffectFunction(_) => ValueType::EffectFunction,
            Value::AsyncFunction(_) => ValueType::AsyncFunction,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Only `nil` and `false` are falsey
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Can be the target of `Call` or serve as a metamethod
    pub fn is_invokable(&self) -> bool {
        matches!(
            self,
            Value::Function(_)
                | Value::PureFunction(_)
                | Value::EffectFunction(_)
                | Value::AsyncFunction(_)
        )
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /* ---------- assertions (opcodes that demand a shape) ---------- */

    fn assertion_failed(&self, expected: ValueType) -> VmFault {
        VmFault::AssertionFailed {
            expected,
            actual: self.value_type(),
            value: self.to_string(),
        }
    }

    pub fn assert_integer(&self) -> Result<i64, VmFault> {
        self.as_integer()
            .ok_or_else(|| self.assertion_failed(ValueType::Integer))
    }

    pub fn assert_string(&self) -> Result<Rc<str>, VmFault> {
        match self {
            Value::String(s) => Ok(s.clone()),
            _ => Err(self.assertion_failed(ValueType::String)),
        }
    }

    pub fn assert_table(&self) -> Result<TableRef, VmFault> {
        match self {
            Value::Table(t) => Ok(t.clone()),
            _ => Err(self.assertion_failed(ValueType::Table)),
        }
    }

    pub fn assert_vector(&self) -> Result<VectorRef, VmFault> {
        match self {
            Value::Vector(v) => Ok(v.clone()),
            _ => Err(self.assertion_failed(ValueType::Vector)),
        }
    }

    pub fn assert_function(&self) -> Result<FunctionRef, VmFault> {
        match self {
            Value::Function(f) => Ok(f.clone()),
            _ => Err(self.assertion_failed(ValueType::Function)),
        }
    }

    pub fn assert_coroutine(&self) -> Result<CoroutineRef, VmFault> {
        match self {
            Value::Coroutine(c) => Ok(c.clone()),
            _ => Err(self.assertion_failed(ValueType::Coroutine)),
        }
    }

    /* ---------- identity ---------- */

    /// Same type and same payload: floats by bit pattern, strings by content,
    /// functions by prototype and bound context, heap objects by identity
    pub fn raw_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.same_closure(b),
            _ => self.same_object(other),
        }
    }

    /// Reference identity for heap variants, false for everything else
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Vector(a), Value::Vector(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Coroutine(a), Value::Coroutine(b)) => Rc::ptr_eq(a, b),
            (Value::PureFunction(a), Value::PureFunction(b)) => Rc::ptr_eq(a, b),
            (Value::EffectFunction(a), Value::EffectFunction(b)) => Rc::ptr_eq(a, b),
            (Value::AsyncFunction(a), Value::AsyncFunction(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Hash consistent with [`Value::raw_equals`]
    pub fn raw_hash(&self) -> u64 {
        match self {
            Value::Nil => 0,
            Value::Integer(i) => *i as u64,
            Value::Float(f) => f.to_bits(),
            Value::Boolean(true) => u64::MAX,
            Value::Boolean(false) => 0,
            Value::String(s) => {
                let mut hasher = DefaultHasher::new();
                s.hash(&mut hasher);
                hasher.finish()
            }
            Value::Function(f) => f.closure_hash(),
            Value::Table(t) => address_of(Rc::as_ptr(t)),
            Value::Vector(v) => address_of(Rc::as_ptr(v)),
            Value::Coroutine(c) => address_of(Rc::as_ptr(c)),
            Value::PureFunction(f) => address_of(Rc::as_ptr(f)),
            Value::EffectFunction(f) => address_of(Rc::as_ptr(f)),
            Value::AsyncFunction(f) => address_of(Rc::as_ptr(f)),
        }
    }
}

pub(crate) fn address_of<T: ?Sized>(ptr: *const T) -> u64 {
    ptr.cast::<u8>() as usize as u64
}

/// Equality is raw identity; operator semantics live in [`calculator`]
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.raw_equals(other)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => f.write_str(s),
            Value::Table(t) => write!(f, "<table 0x{:x}>", address_of(Rc::as_ptr(t))),
            Value::Vector(v) => {
                f.write_str("[")?;
                for (i, item) in v.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    // one level only, vectors may contain themselves
                    match item {
                        Value::Vector(_) => f.write_str("[...]")?,
                        _ => write!(f, "{}", item)?,
                    }
                }
                f.write_str("]")
            }
            Value::Function(func) => write!(f, "<function {}>", func.prototype().name),
            Value::Coroutine(c) => write!(f, "<coroutine 0x{:x}>", address_of(Rc::as_ptr(c))),
            Value::PureFunction(_) | Value::EffectFunction(_) | Value::AsyncFunction(_) => {
                f.write_str("<external function>")
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Float(x) => write!(f, "Float({:?})", x),
            Value::Integer(i) => write!(f, "Integer({})", i),
            _ => write!(f, "{}", self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::string("").is_truthy());
    }

    #[test]
    fn test_float_identity_is_bit_pattern() {
        let nan = Value::Float(f64::NAN);
        assert!(nan.raw_equals(&nan.clone()));
        assert_eq!(nan.raw_hash(), f64::NAN.to_bits());
        assert!(!Value::Float(0.0).raw_equals(&Value::Float(-0.0)));
    }

    #[test]
    fn test_strings_compare_by_content() {
        let a = Value::string("key");
        let b = Value::string("key");
        assert!(a.raw_equals(&b));
        assert_eq!(a.raw_hash(), b.raw_hash());
    }

    #[test]
    fn test_tables_compare_by_identity() {
        let a = Value::new_table();
        let b = Value::new_table();
        assert!(a.raw_equals(&a.clone()));
        assert!(!a.raw_equals(&b));
    }

    #[test]
    fn test_assertion_names_expected_and_actual() {
        let err = Value::Integer(1).assert_table().unwrap_err();
        assert_eq!(
            err,
            VmFault::AssertionFailed {
                expected: ValueType::Table,
                actual: ValueType::Integer,
                value: "1".to_string(),
            }
        );
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::new_vector().type_name(), "vector");
        assert_eq!(
            Value::pure_function(|_| Ok(vec![])).type_name(),
            "function"
        );
    }
}
