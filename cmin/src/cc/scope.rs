//! Lexical scopes.
use std::{cell::RefCell, collections::HashMap, rc::Rc};

use smol_str::SmolStr;

use super::symbol::Symbol;

/// One level of the scope chain: a name table plus a shared reference
/// to the enclosing scope.
///
/// A scope is created for the translation unit, for each function
/// (holding its parameters) and for each nested compound statement.
/// The chain is parent-directed only, so dropping a child can never
/// keep itself alive through its parent.
pub struct Scope {
    parent: Option<Rc<Scope>>,
    table: RefCell<HashMap<SmolStr, Rc<Symbol>>>,
}

impl Scope {
    pub fn new(parent: Option<Rc<Scope>>) -> Rc<Self> {
        Rc::new(Self {
            parent,
            table: RefCell::new(HashMap::new()),
        })
    }

    pub fn parent(&self) -> Option<&Rc<Scope>> {
        self.parent.as_ref()
    }

    /// Look a name up through the whole chain, innermost first.
    pub fn find(&self, name: &str) -> Option<Rc<Symbol>> {
        match self.find_local(name) {
            Some(symbol) => Some(symbol),
            None => self.parent.as_ref().and_then(|parent| parent.find(name)),
        }
    }

    /// Look a name up in this scope only. Used for redefinition checks.
    pub fn find_local(&self, name: &str) -> Option<Rc<Symbol>> {
        self.table.borrow().get(name).cloned()
    }

    /// Register a symbol under its name.
    ///
    /// Returns `false` without replacing anything when the name is
    /// already taken in this scope.
    pub fn try_register(&self, symbol: Rc<Symbol>) -> bool {
        let mut table = self.table.borrow_mut();
        if table.contains_key(symbol.name()) {
            return false;
        }
        table.insert(SmolStr::new(symbol.name()), symbol);
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cc::types::TypeInfo;

    fn symbol(name: &str) -> Rc<Symbol> {
        Symbol::new(name, Rc::new(TypeInfo::Int))
    }

    #[test]
    fn test_register_and_find() {
        let scope = Scope::new(None);
        assert!(scope.try_register(symbol("x")));
        assert!(scope.find("x").is_some());
        assert!(scope.find("y").is_none());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let scope = Scope::new(None);
        assert!(scope.try_register(symbol("x")));
        assert!(!scope.try_register(symbol("x")));
    }

    #[test]
    fn test_lookup_walks_parent_chain() {
        let root = Scope::new(None);
        root.try_register(symbol("outer"));

        let inner = Scope::new(Some(Rc::clone(&root)));
        inner.try_register(symbol("inner"));

        assert!(inner.find("outer").is_some());
        assert!(inner.find("inner").is_some());
        assert!(root.find("inner").is_none());
    }

    #[test]
    fn test_local_lookup_ignores_parents() {
        let root = Scope::new(None);
        root.try_register(symbol("outer"));

        let inner = Scope::new(Some(Rc::clone(&root)));
        assert!(inner.find_local("outer").is_none());
        // Shadowing registers fine: the inner scope has its own table.
        assert!(inner.try_register(symbol("outer")));
    }

    #[test]
    fn test_shadowing_resolves_innermost() {
        let root = Scope::new(None);
        let outer_sym = symbol("x");
        root.try_register(Rc::clone(&outer_sym));

        let inner = Scope::new(Some(Rc::clone(&root)));
        let inner_sym = symbol("x");
        inner.try_register(Rc::clone(&inner_sym));

        let found = inner.find("x").unwrap();
        assert!(Rc::ptr_eq(&found, &inner_sym));
        assert!(!Rc::ptr_eq(&found, &outer_sym));
    }
}
