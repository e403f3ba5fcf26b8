//! Vector: an ordered, growable run of values
//!
//! Backed by [`GrowableStack`]. Indexed access never grows the vector; only
//! `push` does.

use crate::stack::GrowableStack;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

pub type VectorRef = Rc<RefCell<Vector>>;

pub const DEFAULT_VECTOR_CAPACITY: usize = 4;

#[derive(Debug, Clone)]
pub struct Vector {
    items: GrowableStack<Value>,
}

impl Vector {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_VECTOR_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Vector {
            items: GrowableStack::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, value: Value) {
        self.items.push(value);
    }

    /// Remove the tail element; `None` when empty
    pub fn pop(&mut self) -> Option<Value> {
        if self.items.is_empty() {
            None
        } else {
            Some(self.items.pop())
        }
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.as_slice().get(index)
    }

    /// Write an existing slot; returns `false` when `index >= len()`
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        match self.items.as_mut_slice().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        self.items.as_slice()
    }
}

impl Default for Vector {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<Value>> for Vector {
    fn from(items: Vec<Value>) -> Self {
        let mut vector = Vector::with_capacity(items.len());
        vector.items.extend(items);
        vector
    }
}
