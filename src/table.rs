//! Hash table keyed by `Value`
//!
//! Entries live in a dense array in insertion order; buckets hold
//! `entry index + 1` so that 0 can mean "empty". Collisions chain through
//! `Entry::next`. The bucket array grows along a prime sequence once the entry
//! count reaches the bucket count, and entries are re-chained in index order.
//!
//! Hashing and key equality are not hard-coded: every probe goes through a
//! [`KeyComparer`]. [`RawKeys`] is the comparer the interpreter uses.

use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

pub type TableRef = Rc<RefCell<Table>>;

const PRIMES: &[usize] = &[
    3, 5, 7, 11, 17, 23, 29, 37, 47, 59, 71, 89, 107, 131, 163, 197, 239, 293, 353, 431, 521,
    631, 761, 919, 1103, 1327, 1597, 1931, 2333, 2801, 3371, 4049, 4861, 5839, 7013, 8419, 10103,
    12143, 14591, 17519, 21023, 25229, 30293, 36353, 43627, 52361, 62851, 75431, 90523, 108631,
    130363, 156437, 187751, 225307, 270371, 324449, 389357, 467237, 560689, 672827, 807403,
    968897, 1162687, 1395263, 1674319, 2009191, 2411033, 2893249, 3471899, 4166287, 4999559,
    5999471, 7199369, 8639249, 10367101, 12440537, 14928671, 17914409, 21497293, 25796759,
    30956117, 37147349, 44576837, 53492207, 64190669, 77028803, 92434613, 110921543, 133105859,
    159727031, 191672443, 230006941, 276008387, 331210079, 397452101, 476942527, 572331049,
    686797261, 824156741, 988988137, 1186785773, 1424142949, 1708971541, 2050765853, 2146435069,
];

/// Smallest prime in the growth sequence that is at least `n`
pub fn next_prime(n: usize) -> usize {
    PRIMES
        .iter()
        .copied()
        .find(|&p| p >= n)
        .unwrap_or(PRIMES[PRIMES.len() - 1])
}

/* ===================== Key Comparison ===================== */

pub trait KeyComparer {
    fn hash(&self, key: &Value) -> u64;
    fn equals(&self, a: &Value, b: &Value) -> bool;
}

/// Same-type, same-payload keys (`Value::raw_equals` / `Value::raw_hash`)
#[derive(Debug, Clone, Copy, Default)]
pub struct RawKeys;

impl KeyComparer for RawKeys {
    fn hash(&self, key: &Value) -> u64 {
        key.raw_hash()
    }

    fn equals(&self, a: &Value, b: &Value) -> bool {
        a.raw_equals(b)
    }
}

/* ===================== Table ===================== */

#[derive(Debug, Clone)]
pub struct Entry {
    pub hash: u64,
    next: Option<usize>,
    pub key: Value,
    pub value: Value,
}

#[derive(Clone)]
pub struct Table {
    buckets: Vec<usize>,
    entries: Vec<Entry>,
    metatable: Option<TableRef>,
}

impl Table {
    pub fn new() -> Self {
        Table {
            buckets: vec![0; PRIMES[0]],
            entries: Vec::with_capacity(PRIMES[0]),
            metatable: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// Next entry in the chain for `hash` after `prev` (`None` starts the walk)
    ///
    /// Entries whose stored hash differs are skipped.
    pub fn next_entry(&self, hash: u64, prev: Option<usize>) -> Option<usize> {
        let mut next = match prev {
            None => self.buckets[self.bucket_of(hash)].checked_sub(1),
            Some(id) => self.entries[id].next,
        };

        while let Some(id) = next {
            if self.entries[id].hash == hash {
                break;
            }
            next = self.entries[id].next;
        }

        next
    }

    pub fn entry(&self, id: usize) -> &Entry {
        &self.entries[id]
    }

    /// Append an entry; the caller must know that `key` is absent
    pub fn new_entry(&mut self, hash: u64, key: Value, value: Value) {
        if self.entries.len() >= self.buckets.len() {
            self.resize(next_prime(self.buckets.len() * 2));
        }

        let bucket = self.bucket_of(hash);
        let id = self.entries.len();
        self.entries.push(Entry {
            hash,
            next: self.buckets[bucket].checked_sub(1),
            key,
            value,
        });
        self.buckets[bucket] = id + 1;
    }

    fn resize(&mut self, size: usize) {
        self.buckets = vec![0; size];
        for id in 0..self.entries.len() {
            let bucket = self.bucket_of(self.entries[id].hash);
            self.entries[id].next = self.buckets[bucket].checked_sub(1);
            self.buckets[bucket] = id + 1;
        }
    }

    pub fn find_with(&self, key: &Value, keys: &impl KeyComparer) -> Option<usize> {
        let hash = keys.hash(key);
        let mut id = None;
        while let Some(found) = self.next_entry(hash, id) {
            if keys.equals(key, &self.entries[found].key) {
                return Some(found);
            }
            id = Some(found);
        }
        None
    }

    pub fn try_read_entry_with(&self, key: &Value, keys: &impl KeyComparer) -> Option<Value> {
        self.find_with(key, keys)
            .map(|id| self.entries[id].value.clone())
    }

    /// Overwrite the value for `key`, or append a new entry
    pub fn update_entry_with(&mut self, key: Value, value: Value, keys: &impl KeyComparer) {
        match self.find_with(&key, keys) {
            Some(id) => self.entries[id].value = value,
            None => {
                let hash = keys.hash(&key);
                self.new_entry(hash, key, value);
            }
        }
    }

    pub fn try_read_entry(&self, key: &Value) -> Option<Value> {
        self.try_read_entry_with(key, &RawKeys)
    }

    pub fn update_entry(&mut self, key: Value, value: Value) {
        self.update_entry_with(key, value, &RawKeys)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|e| (&e.key, &e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|e| &e.key)
    }

    /* ---------- metatable ---------- */

    pub fn metatable(&self) -> Option<TableRef> {
        self.metatable.clone()
    }

    pub fn set_metatable(&mut self, metatable: Option<TableRef>) {
        self.metatable = metatable;
    }

    /// Invokable entry `name` of the metatable, read locally
    pub fn try_get_metamethod(&self, name: &str) -> Option<Value> {
        let metatable = self.metatable.as_ref()?;
        let candidate = metatable.borrow().try_read_entry(&Value::string(name))?;
        candidate.is_invokable().then_some(candidate)
    }
}

// Metatables may be cyclic, so never recurse into them
impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("len", &self.entries.len())
            .field("buckets", &self.buckets.len())
            .field("has_metatable", &self.metatable.is_some())
            .finish()
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_and_update_in_place() {
        let mut table = Table::new();
        table.update_entry(Value::Integer(0), Value::string("a"));
        table.update_entry(Value::Integer(1), Value::string("b"));

        assert_eq!(table.try_read_entry(&Value::Integer(0)), Some(Value::string("a")));
        assert_eq!(table.try_read_entry(&Value::Integer(2)), None);

        table.update_entry(Value::Integer(0), Value::string("c"));
        assert_eq!(table.len(), 2);
        assert_eq!(table.try_read_entry(&Value::Integer(0)), Some(Value::string("c")));
    }

    #[test]
    fn test_growth_follows_primes_and_keeps_entries() {
        let mut table = Table::new();
        assert_eq!(table.bucket_count(), 3);

        for i in 0..40 {
            table.update_entry(Value::Integer(i), Value::Integer(i * 10));
        }

        assert_eq!(table.len(), 40);
        assert_eq!(table.bucket_count(), 89);
        for i in 0..40 {
            assert_eq!(
                table.try_read_entry(&Value::Integer(i)),
                Some(Value::Integer(i * 10))
            );
        }
        let keys: Vec<i64> = table.keys().filter_map(Value::as_integer).collect();
        assert_eq!(keys, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_colliding_hashes_chain() {
        let mut table = Table::new();
        // 1, 4 and 7 share bucket 1 of 3
        table.new_entry(1, Value::Integer(1), Value::string("one"));
        table.new_entry(4, Value::Integer(4), Value::string("four"));
        table.new_entry(7, Value::Integer(7), Value::string("seven"));

        assert_eq!(table.next_entry(4, None), Some(1));
        assert_eq!(table.next_entry(4, Some(1)), None);
        assert_eq!(
            table.try_read_entry(&Value::Integer(1)),
            Some(Value::string("one"))
        );
    }

    #[test]
    fn test_float_keys_use_bit_pattern() {
        let mut table = Table::new();
        table.update_entry(Value::Float(0.0), Value::Integer(1));
        assert_eq!(table.try_read_entry(&Value::Float(-0.0)), None);
        assert_eq!(table.try_read_entry(&Value::Integer(0)), None);
    }

    #[test]
    fn test_metamethod_requires_invokable_value() {
        let meta = Rc::new(RefCell::new(Table::new()));
        meta.borrow_mut()
            .update_entry(Value::string("__add"), Value::Integer(3));
        meta.borrow_mut().update_entry(
            Value::string("__sub"),
            Value::pure_function(|_| Ok(vec![])),
        );

        let mut table = Table::new();
        assert_eq!(table.try_get_metamethod("__sub"), None);
        table.set_metatable(Some(meta));

        assert_eq!(table.try_get_metamethod("__add"), None);
        assert!(table.try_get_metamethod("__sub").is_some());
        assert_eq!(table.try_get_metamethod("__mul"), None);
    }

    #[test]
    fn test_absent_metatable_is_none() {
        assert!(Table::new().metatable().is_none());
    }
}
