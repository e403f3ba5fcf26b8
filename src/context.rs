//! Lexical scopes
//!
//! A `Context` owns named variable cells and links to an optional parent. The
//! context without a parent is the root of its chain and doubles as the
//! global scope.
//!
//! ## Resolution
//! 1. a local cell
//! 2. the owner cache (`name -> ancestor that owns it`)
//! 3. the parent chain, caching whichever ancestor answered
//!
//! A name nobody owns is created in the root (implicit global).

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type ContextRef = Rc<RefCell<Context>>;

#[derive(Default)]
pub struct Context {
    parent: Option<ContextRef>,
    variables: HashMap<Rc<str>, Value>,
    location: HashMap<Rc<str>, ContextRef>,
}

impl Context {
    pub fn new(parent: Option<ContextRef>) -> ContextRef {
        Rc::new(RefCell::new(Context {
            parent,
            ..Context::default()
        }))
    }

    pub fn new_root() -> ContextRef {
        Self::new(None)
    }

    /// Root context pre-populated with `variables`
    pub fn from_variables(variables: HashMap<String, Value>) -> ContextRef {
        let root = Self::new_root();
        {
            let mut ctx = root.borrow_mut();
            for (name, value) in variables {
                ctx.create_variable(&name, value);
            }
        }
        root
    }

    pub fn parent(&self) -> Option<ContextRef> {
        self.parent.clone()
    }

    pub fn root(this: &ContextRef) -> ContextRef {
        let mut current = this.clone();
        loop {
            let parent = current.borrow().parent.clone();
            match parent {
                Some(p) => current = p,
                None => return current,
            }
        }
    }

    /// Create (or reset) a local cell
    pub fn create_variable(&mut self, name: &str, value: Value) {
        self.variables.insert(Rc::from(name), value);
    }

    pub fn has_local(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.variables.get(name).cloned()
    }

    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(|k| k.as_ref())
    }

    /// Context that owns `name`, creating the cell in the root if needed
    pub fn owner_of(this: &ContextRef, name: &str) -> ContextRef {
        let parent = {
            let ctx = this.borrow();
            if ctx.variables.contains_key(name) {
                return this.clone();
            }
            if let Some(owner) = ctx.location.get(name) {
                return owner.clone();
            }
            ctx.parent.clone()
        };

        match parent {
            None => {
                this.borrow_mut().create_variable(name, Value::Nil);
                this.clone()
            }
            Some(parent) => {
                let owner = Context::owner_of(&parent, name);
                this.borrow_mut()
                    .location
                    .insert(Rc::from(name), owner.clone());
                owner
            }
        }
    }

    pub fn read(this: &ContextRef, name: &str) -> Value {
        let owner = Context::owner_of(this, name);
        let value = owner.borrow().variables.get(name).cloned();
        value.unwrap_or_default()
    }

    pub fn write(this: &ContextRef, name: &str, value: Value) {
        let owner = Context::owner_of(this, name);
        owner.borrow_mut().create_variable(name, value);
    }

    /// Whether resolution of `name` is memoized here
    pub fn is_cached(&self, name: &str) -> bool {
        self.location.contains_key(name)
    }
}

// Contexts form cycles through captured closures; print a summary only
impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("variables", &self.variables.len())
            .field("cached", &self.location.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn test_local_shadows_parent() {
        let root = Context::from_variables(hashmap! {
            "x".to_string() => Value::Integer(1),
        });
        let child = Context::new(Some(root.clone()));
        child.borrow_mut().create_variable("x", Value::Integer(2));

        assert_eq!(Context::read(&child, "x"), Value::Integer(2));
        assert_eq!(Context::read(&root, "x"), Value::Integer(1));
    }

    #[test]
    fn test_write_reaches_owning_ancestor_and_caches() {
        let root = Context::new_root();
        let middle = Context::new(Some(root.clone()));
        middle.borrow_mut().create_variable("counter", Value::Integer(0));
        let leaf = Context::new(Some(middle.clone()));

        Context::write(&leaf, "counter", Value::Integer(5));

        assert!(leaf.borrow().is_cached("counter"));
        assert!(!leaf.borrow().has_local("counter"));
        assert_eq!(middle.borrow().get_local("counter"), Some(Value::Integer(5)));
        assert!(!root.borrow().has_local("counter"));
    }

    #[test]
    fn test_unknown_name_becomes_global() {
        let root = Context::new_root();
        let leaf = Context::new(Some(Context::new(Some(root.clone()))));

        assert_eq!(Context::read(&leaf, "undeclared"), Value::Nil);
        assert!(root.borrow().has_local("undeclared"));

        Context::write(&leaf, "undeclared", Value::Boolean(true));
        assert_eq!(
            root.borrow().get_local("undeclared"),
            Some(Value::Boolean(true))
        );
    }

    #[test]
    fn test_root_of_chain() {
        let root = Context::new_root();
        let leaf = Context::new(Some(Context::new(Some(root.clone()))));
        assert!(Rc::ptr_eq(&Context::root(&leaf), &root));
        assert!(Rc::ptr_eq(&Context::root(&root), &root));
    }
}
