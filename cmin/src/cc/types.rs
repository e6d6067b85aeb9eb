//! Type descriptors.
use std::{fmt, rc::Rc};

use crate::constants::Word;

/// Closed set of types the language knows about.
///
/// Types are immutable and shared by handle; equality is structural,
/// never handle identity, so separately built equal types compare equal.
#[derive(Debug, PartialEq, Eq)]
pub enum TypeInfo {
    /// The machine integer, one word wide.
    Int,
    /// Pointer to a base type.
    Pointer(Rc<TypeInfo>),
    /// Function signature: return type and parameter types in order.
    Function {
        ret: Rc<TypeInfo>,
        params: Vec<Rc<TypeInfo>>,
    },
}

impl TypeInfo {
    /// Storage size in words. Functions occupy no storage themselves.
    pub fn size(&self) -> Word {
        match self {
            Self::Int => 1,
            Self::Pointer(_) => 1,
            Self::Function { .. } => 0,
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Self::Int)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function { .. })
    }

    /// Base type of a pointer.
    pub fn pointee(&self) -> Option<&Rc<TypeInfo>> {
        match self {
            Self::Pointer(base) => Some(base),
            _ => None,
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Pointer(base) => write!(f, "{}*", base),
            Self::Function { ret, params } => {
                write!(f, "Func<{}, (", ret)?;
                for (position, param) in params.iter().enumerate() {
                    if position > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")>")
            }
        }
    }
}
