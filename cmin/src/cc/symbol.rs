//! Declared names and their storage.
use std::{cell::Cell, rc::Rc};

use smol_str::SmolStr;

use crate::constants::Word;

use super::types::TypeInfo;

/// Storage assigned to a symbol during code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Storage {
    /// Globals live at an absolute address; locals at a frame offset.
    pub global: bool,
    pub address: Word,
}

/// One declared name.
///
/// A symbol is created once per declaration during semantic analysis and
/// shared between the declaring node, its scope, and every identifier
/// expression that resolves to it. The storage slot stays empty until
/// the code generator assigns it; nothing else is allowed to.
#[derive(Debug)]
pub struct Symbol {
    name: SmolStr,
    type_info: Rc<TypeInfo>,
    storage: Cell<Option<Storage>>,
}

impl Symbol {
    pub fn new(name: impl Into<SmolStr>, type_info: Rc<TypeInfo>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            type_info,
            storage: Cell::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> &Rc<TypeInfo> {
        &self.type_info
    }

    /// Storage slot, present once the code generator has run.
    pub fn storage(&self) -> Option<Storage> {
        self.storage.get()
    }

    /// Assign the storage slot. Reserved for the code generator.
    pub(crate) fn bind(&self, global: bool, address: Word) {
        self.storage.set(Some(Storage { global, address }));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_storage_starts_unassigned() {
        let symbol = Symbol::new("x", Rc::new(TypeInfo::Int));
        assert_eq!(symbol.name(), "x");
        assert!(symbol.storage().is_none());
    }

    #[test]
    fn test_bind_storage() {
        let symbol = Symbol::new("x", Rc::new(TypeInfo::Int));
        symbol.bind(true, 0x0010);
        assert_eq!(
            symbol.storage(),
            Some(Storage {
                global: true,
                address: 0x0010
            })
        );
    }
}
