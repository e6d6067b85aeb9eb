//! Buffered stream of tokens for look ahead.
use itertools::{multipeek, MultiPeek};

use crate::error::CminResult;

use super::{
    lexer::{Lexer, LexerIter},
    tokens::{Token, TokenKind},
};

/// Stream of tokens allowing arbitrary look ahead.
///
/// Tokens are lexed lazily; peeking or consuming triggers the internal
/// lexer. One token of lookahead is all the grammar needs, but
/// [`TokenStream::peek`] accepts any offset.
pub struct TokenStream {
    name: String,
    lexer: MultiPeek<LexerIter>,
}

impl TokenStream {
    pub fn new(lexer: Lexer) -> Self {
        Self {
            name: lexer.name().to_owned(),
            lexer: multipeek(lexer),
        }
    }

    /// Name of the source file, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the token `offset` positions ahead without consuming
    /// anything. Offset 0 is the current token.
    ///
    /// A lexical error anywhere in the peeked range is returned
    /// immediately; lexical errors are always fatal.
    pub fn peek(&mut self, offset: usize) -> CminResult<Token> {
        self.lexer.reset_peek();

        let mut remaining = offset;
        loop {
            match self.lexer.peek() {
                Some(Ok(token)) => {
                    if remaining == 0 {
                        let token = token.clone();
                        self.lexer.reset_peek();
                        return Ok(token);
                    }
                    remaining -= 1;
                }
                Some(Err(err)) => {
                    let err = err.clone();
                    self.lexer.reset_peek();
                    return Err(err);
                }
                None => unreachable!("the lexer repeats its end-of-file token"),
            }
        }
    }

    /// Pop and return the front token, lexing more as needed.
    pub fn consume(&mut self) -> CminResult<Token> {
        match self.lexer.next() {
            Some(result) => result,
            None => unreachable!("the lexer repeats its end-of-file token"),
        }
    }

    /// Consume the front token only if it has the given kind.
    pub fn consume_if(&mut self, kind: TokenKind) -> CminResult<Option<Token>> {
        if self.peek(0)?.kind == kind {
            Ok(Some(self.consume()?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cc::tokens::{Keyword, Punct};

    fn stream(source: &str) -> TokenStream {
        TokenStream::new(Lexer::new("test.c", source))
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut stream = stream("int x;");

        assert_eq!(stream.peek(0).unwrap().kind, TokenKind::Keyword(Keyword::Int));
        assert_eq!(stream.peek(0).unwrap().kind, TokenKind::Keyword(Keyword::Int));
        assert_eq!(stream.consume().unwrap().kind, TokenKind::Keyword(Keyword::Int));
        assert_eq!(stream.peek(0).unwrap().kind, TokenKind::Identifier);
    }

    #[test]
    fn test_peek_arbitrary_offset() {
        let mut stream = stream("int x;");

        assert_eq!(stream.peek(1).unwrap().kind, TokenKind::Identifier);
        assert_eq!(stream.peek(2).unwrap().kind, TokenKind::Punct(Punct::Semicolon));
        assert_eq!(stream.peek(3).unwrap().kind, TokenKind::EndOfFile);
        // Past the end the end-of-file token repeats.
        assert_eq!(stream.peek(9).unwrap().kind, TokenKind::EndOfFile);
        // The stream itself has not advanced.
        assert_eq!(stream.consume().unwrap().kind, TokenKind::Keyword(Keyword::Int));
    }

    #[test]
    fn test_consume_if() {
        let mut stream = stream("x = 1");

        assert!(stream
            .consume_if(TokenKind::Punct(Punct::Assign))
            .unwrap()
            .is_none());
        assert!(stream.consume_if(TokenKind::Identifier).unwrap().is_some());
        assert!(stream
            .consume_if(TokenKind::Punct(Punct::Assign))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_lex_error_propagates() {
        let mut stream = stream("65536");
        assert!(stream.peek(0).is_err());
        assert!(stream.consume().is_err());
    }
}
