//! Growable stack
//!
//! The single storage primitive behind the value stack, the call stack, the
//! delimiter stack, the try stack and `Vector`. Capacity doubles on demand, so
//! pushes are amortized O(1).
//!
//! Underflow is an interpreter bug, not a user error: `pop` on an empty stack
//! panics instead of producing a `VmFault`.

use std::ops::{Index, IndexMut};

/// Default capacity used when no explicit capacity is requested
pub const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug, Clone)]
pub struct GrowableStack<T> {
    items: Vec<T>,
}

impl<T> GrowableStack<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        GrowableStack {
            items: Vec::with_capacity(capacity.max(1)),
        }
    }

    /// Number of live slots (the stack pointer)
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Push a value and return a reference to its slot
    pub fn push(&mut self, value: T) -> &mut T {
        if self.items.len() == self.items.capacity() {
            // Explicit doubling keeps the growth policy independent of Vec's
            self.items.reserve_exact(self.items.capacity().max(1));
        }
        self.items.push(value);
        let top = self.items.len() - 1;
        &mut self.items[top]
    }

    /// Pop the top slot
    ///
    /// # Panics
    /// Panics on an empty stack. Underflow means the interpreter's own
    /// bookkeeping is broken and must not be caught as a VM fault.
    pub fn pop(&mut self) -> T {
        match self.items.pop() {
            Some(value) => value,
            None => panic!("GrowableStack underflow"),
        }
    }

    /// Top of stack, `offset` slots down (0 is the top)
    pub fn top(&self, offset: usize) -> &T {
        let len = self.items.len();
        assert!(offset < len, "GrowableStack underflow");
        &self.items[len - 1 - offset]
    }

    pub fn top_mut(&mut self, offset: usize) -> &mut T {
        let len = self.items.len();
        assert!(offset < len, "GrowableStack underflow");
        &mut self.items[len - 1 - offset]
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.items.last_mut()
    }

    /// Drop slots until `len() == new_len`
    pub fn truncate(&mut self, new_len: usize) {
        self.items.truncate(new_len);
    }

    /// Remove and return every slot from `start` upward
    pub fn split_off(&mut self, start: usize) -> Vec<T> {
        self.items.split_off(start)
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> GrowableStack<T> {
    /// Copy of every slot from `start` upward
    pub fn to_vec_from(&self, start: usize) -> Vec<T> {
        self.items[start..].to_vec()
    }
}

impl<T: Default> GrowableStack<T> {
    /// Push a default-initialized slot and return it for in-place writes
    pub fn push_slot(&mut self) -> &mut T {
        self.push(T::default())
    }

    /// Grow with default slots until `len() == new_len`
    pub fn fill_to(&mut self, new_len: usize) {
        while self.items.len() < new_len {
            self.push(T::default());
        }
    }
}

impl<T> Default for GrowableStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for GrowableStack<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> IndexMut<usize> for GrowableStack<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_doubles() {
        let mut stack: GrowableStack<i32> = GrowableStack::with_capacity(2);
        stack.push(1);
        stack.push(2);
        assert_eq!(stack.capacity(), 2);
        stack.push(3);
        assert!(stack.capacity() >= 4);
        assert_eq!(stack.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn test_top_offsets() {
        let mut stack = GrowableStack::new();
        stack.extend([10, 20, 30]);
        assert_eq!(*stack.top(0), 30);
        assert_eq!(*stack.top(2), 10);
        *stack.top_mut(1) = 21;
        assert_eq!(stack[1], 21);
    }

    #[test]
    fn test_push_slot_returns_writable_slot() {
        let mut stack: GrowableStack<i64> = GrowableStack::new();
        *stack.push_slot() = 7;
        stack.fill_to(3);
        assert_eq!(stack.as_slice(), &[7, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_pop_empty_panics() {
        let mut stack: GrowableStack<u8> = GrowableStack::new();
        stack.pop();
    }
}
