use super::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct Binding {
    value: Value,
    mutable: bool,
}

struct ScopeInner {
    vars: RefCell<FxHashMap<String, Binding>>,
    parent: Option<Scope>,
}

/// Lexical scope chain. Closures hold their defining scope, which is what lets nested
/// components see the capability bindings of the unit that created them.
#[derive(Clone)]
pub struct Scope(Rc<ScopeInner>);

pub(crate) struct WeakScope(Weak<ScopeInner>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Undeclared,
    Constant,
}

impl Scope {
    pub fn root() -> Self {
        Scope(Rc::new(ScopeInner {
            vars: RefCell::new(FxHashMap::default()),
            parent: None,
        }))
    }

    pub fn child(&self) -> Self {
        Scope(Rc::new(ScopeInner {
            vars: RefCell::new(FxHashMap::default()),
            parent: Some(self.clone()),
        }))
    }

    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        self.0
            .vars
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let mut cur = Some(self);
        while let Some(scope) = cur {
            if let Some(binding) = scope.0.vars.borrow().get(name) {
                return Some(binding.value.clone());
            }
            cur = scope.0.parent.as_ref();
        }
        None
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn assign(&self, name: &str, value: Value) -> Result<(), AssignError> {
        let mut cur = Some(self);
        while let Some(scope) = cur {
            if let Some(binding) = scope.0.vars.borrow_mut().get_mut(name) {
                if !binding.mutable {
                    return Err(AssignError::Constant);
                }
                binding.value = value;
                return Ok(());
            }
            cur = scope.0.parent.as_ref();
        }
        Err(AssignError::Undeclared)
    }

    pub(crate) fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.0))
    }
}

impl WeakScope {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Drops every binding so closure/scope reference cycles can be freed.
    pub(crate) fn clear(&self) {
        if let Some(inner) = self.0.upgrade() {
            let vars = std::mem::take(&mut *inner.vars.borrow_mut());
            drop(vars);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_walk_the_parent_chain_and_respect_const() {
        let root = Scope::root();
        root.declare("a", Value::from(1.0), false);
        let inner = root.child();
        inner.declare("b", Value::from(2.0), true);

        assert_eq!(inner.get("a").and_then(|v| v.as_f64()), Some(1.0));
        assert_eq!(inner.assign("a", Value::Null), Err(AssignError::Constant));
        assert_eq!(inner.assign("b", Value::Null), Ok(()));
        assert_eq!(inner.assign("zz", Value::Null), Err(AssignError::Undeclared));
        assert!(root.get("b").is_none());
    }
}
