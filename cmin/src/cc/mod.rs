//! Compiler front end: lexing, parsing, semantic analysis and code
//! generation.
pub mod ast;
mod compiler;
mod lexer;
mod parser;
mod printer;
mod scope;
mod sema;
mod symbol;
mod token_stream;
mod tokens;
mod types;

use crate::{constants::Word, error::CminResult};

/// Compile a source file into a word image.
pub fn compile_str(name: impl Into<String>, source_code: impl Into<String>) -> CminResult<Vec<Word>> {
    let program = Parser::new(name, source_code).parse()?;
    Compiler::new().compile(&program)
}

pub use self::{
    compiler::Compiler,
    lexer::Lexer,
    parser::Parser,
    printer::Printer,
    scope::Scope,
    symbol::{Storage, Symbol},
    token_stream::TokenStream,
    tokens::{Keyword, Punct, Token, TokenKind},
    types::TypeInfo,
};
