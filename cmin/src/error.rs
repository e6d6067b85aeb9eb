//! Result and errors.
use std::fmt::{self, Display, Formatter};

pub type CminResult<T> = std::result::Result<T, CminError>;

/// Failure raised by any phase of the pipeline.
///
/// Every front end error is fatal and carries the source file name and
/// line it was raised at. There is no recovery or multi-error
/// accumulation; the first error aborts the compilation.
#[derive(Debug, Clone)]
pub enum CminError {
    /// Malformed literal, unterminated comment or unexpected character.
    Lex {
        file: String,
        line: usize,
        message: String,
    },
    /// Unexpected token given the grammar.
    Syntax {
        file: String,
        line: usize,
        message: String,
    },
    /// Type mismatch, redeclaration, undeclared identifier and friends.
    Semantic {
        file: String,
        line: usize,
        message: String,
    },
    /// Code generation failure. Carries no source position.
    Codegen(String),
    /// The VM halted on a fault.
    Runtime(String),
    Fmt(fmt::Error),
}

impl CminError {
    /// Source line the error was raised at, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Lex { line, .. } | Self::Syntax { line, .. } | Self::Semantic { line, .. } => {
                Some(*line)
            }
            _ => None,
        }
    }
}

impl Display for CminError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex {
                file,
                line,
                message,
            }
            | Self::Syntax {
                file,
                line,
                message,
            }
            | Self::Semantic {
                file,
                line,
                message,
            } => write!(f, "{}({}): {}", file, line, message),
            Self::Codegen(message) => write!(f, "{}", message),
            Self::Runtime(message) => write!(f, "runtime error: {}", message),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for CminError {}

impl From<fmt::Error> for CminError {
    fn from(err: fmt::Error) -> Self {
        CminError::Fmt(err)
    }
}
