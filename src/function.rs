//! Compiled code and closures
//!
//! A [`Unit`] is what a front end hands to the VM: prototypes, string
//! constants and the entry index. It is immutable once built and shared by
//! every function and coroutine created from it.
//!
//! A [`Function`] pairs one prototype with a parent context. `LdFun` creates
//! functions unbound; the `Bind` opcode (or the host) attaches the context.

use crate::context::ContextRef;
use crate::error::UsageError;
use crate::value::address_of;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/* ===================== Unit ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prototype {
    pub name: String,
    pub code: Vec<u8>,
    pub local_variable_size: usize,
    /// Names that must exist as cells in the frame's context
    #[serde(default)]
    pub variables_in_context: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub prototypes: Vec<Prototype>,
    pub strings: Vec<String>,
    pub entry: usize,
}

impl Unit {
    pub fn entry_prototype(&self) -> Option<&Prototype> {
        self.prototypes.get(self.entry)
    }
}

/* ===================== Function ===================== */

pub type FunctionRef = Rc<Function>;

pub struct Function {
    unit: Rc<Unit>,
    index: usize,
    parent: RefCell<Option<ContextRef>>,
}

impl Function {
    /// # Panics
    /// Panics if `index` is not a prototype of `unit`. Bytecode paths check
    /// the index first and fault with `FunctionIndexOutOfRange`.
    pub fn new(unit: Rc<Unit>, index: usize, parent: Option<ContextRef>) -> FunctionRef {
        assert!(index < unit.prototypes.len(), "prototype index out of range");
        Rc::new(Function {
            unit,
            index,
            parent: RefCell::new(parent),
        })
    }

    /// The unit's entry function, bound to `parent`
    pub fn entry(unit: Rc<Unit>, parent: Option<ContextRef>) -> Result<FunctionRef, UsageError> {
        if unit.entry >= unit.prototypes.len() {
            return Err(UsageError::EntryIndexOutOfRange {
                index: unit.entry,
                bound: unit.prototypes.len(),
            });
        }
        let index = unit.entry;
        Ok(Function::new(unit, index, parent))
    }

    pub fn prototype(&self) -> &Prototype {
        &self.unit.prototypes[self.index]
    }

    pub fn unit(&self) -> &Rc<Unit> {
        &self.unit
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn parent_context(&self) -> Option<ContextRef> {
        self.parent.borrow().clone()
    }

    pub fn bind(&self, context: ContextRef) {
        *self.parent.borrow_mut() = Some(context);
    }

    /// Same prototype of the same unit, bound to the same context
    pub fn same_closure(&self, other: &Function) -> bool {
        let same_parent = match (&*self.parent.borrow(), &*other.parent.borrow()) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        };
        Rc::ptr_eq(&self.unit, &other.unit) && self.index == other.index && same_parent
    }

    pub fn closure_hash(&self) -> u64 {
        let proto = address_of(Rc::as_ptr(&self.unit)).wrapping_add(self.index as u64);
        let parent = self
            .parent
            .borrow()
            .as_ref()
            .map_or(0, |ctx| address_of(Rc::as_ptr(ctx)));
        (proto << 32) ^ parent
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.prototype().name)
            .field("bound", &self.parent.borrow().is_some())
            .finish()
    }
}
