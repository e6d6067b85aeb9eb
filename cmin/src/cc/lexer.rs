//! Lexical analysis.
use smol_str::SmolStr;

use crate::error::{CminError, CminResult};

use super::tokens::{Keyword, Token, TokenKind, PUNCTUATORS};

/// Scanner producing a forward-only token sequence terminated by an
/// end-of-file token.
///
/// Keeps the file name it was given so every diagnostic can carry
/// `{filename}({line})`.
pub struct Lexer {
    name: String,
    code: Vec<u8>,
    pos: usize,
    line: usize,
}

impl Lexer {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into().into_bytes(),
            pos: 0,
            line: 1,
        }
    }

    /// Name of the source file, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produce the next token.
    ///
    /// Once the end of the source is reached every further call returns
    /// the end-of-file token again.
    pub fn read(&mut self) -> CminResult<Token> {
        while !self.eof() {
            // space:
            //     \s+
            if is_whitespace(self.peek(0)) {
                while is_whitespace(self.peek(0)) {
                    self.consume();
                }
                continue;
            }

            // line-comment:
            //     '//' .*
            if self.skip_over(b"//") {
                while !self.eof() && self.peek(0) != b'\n' {
                    self.consume();
                }
                continue;
            }

            // block-comment:
            //     '/*' .* '*/'
            if self.skip_over(b"/*") {
                loop {
                    if self.eof() {
                        return Err(self.error("unterminated block comment `/* ... */'."));
                    }
                    if self.skip_over(b"*/") {
                        break;
                    }
                    self.consume();
                }
                continue;
            }

            // decimal-integer-literal:
            //     [0-9]+
            if self.peek(0).is_ascii_digit() {
                return self.read_integer();
            }

            // identifier / keyword:
            //     [A-Z_a-z][0-9A-Z_a-z]*
            if is_identifier_start(self.peek(0)) {
                return Ok(self.read_identifier());
            }

            // punctuator:
            //     '+' | '-' | ...
            let line = self.line;
            for (text, punct) in PUNCTUATORS {
                if self.skip_over(text.as_bytes()) {
                    return Ok(Token {
                        kind: TokenKind::Punct(*punct),
                        text: SmolStr::new(*text),
                        line,
                        value: None,
                    });
                }
            }

            return Err(self.error(format!("unexpected character `0x{:02X}'.", self.peek(0))));
        }

        Ok(Token {
            kind: TokenKind::EndOfFile,
            text: SmolStr::new("[EOF]"),
            line: self.line,
            value: None,
        })
    }

    fn read_integer(&mut self) -> CminResult<Token> {
        let line = self.line;
        let mut text = String::new();

        while self.peek(0).is_ascii_digit() {
            text.push(self.consume() as char);
        }

        match text.parse::<u64>() {
            Ok(value) if value <= 0xFFFF => Ok(Token {
                kind: TokenKind::IntegerLiteral,
                text: SmolStr::new(&text),
                line,
                value: Some(value as u16),
            }),
            _ => Err(self.error(format!("too large integer literal `{}'.", text))),
        }
    }

    fn read_identifier(&mut self) -> Token {
        let line = self.line;
        let mut text = String::new();

        while is_identifier_continuation(self.peek(0)) {
            text.push(self.consume() as char);
        }

        // A fragment matching a reserved word is a keyword, not a user
        // defined identifier.
        let kind = text
            .parse::<Keyword>()
            .map(TokenKind::Keyword)
            .unwrap_or(TokenKind::Identifier);

        Token {
            kind,
            text: SmolStr::new(&text),
            line,
            value: None,
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.code.len()
    }

    fn peek(&self, offset: usize) -> u8 {
        self.code.get(self.pos + offset).copied().unwrap_or(0)
    }

    fn consume(&mut self) -> u8 {
        if self.eof() {
            return 0;
        }

        let c = self.peek(0);
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        c
    }

    fn starts_with(&self, s: &[u8]) -> bool {
        self.code[self.pos..].starts_with(s)
    }

    fn skip_over(&mut self, s: &[u8]) -> bool {
        if !self.starts_with(s) {
            return false;
        }
        for _ in 0..s.len() {
            self.consume();
        }
        true
    }

    fn error(&self, message: impl Into<String>) -> CminError {
        CminError::Lex {
            file: self.name.clone(),
            line: self.line,
            message: message.into(),
        }
    }
}

/// Iterator adapter for feeding a token stream lazily.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct LexerIter {
    lexer: Lexer,
}

impl Iterator for LexerIter {
    type Item = CminResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        // Never runs dry: the end of the source repeats as end-of-file
        // tokens, which is what the parser's lookahead expects.
        Some(self.lexer.read())
    }
}

impl IntoIterator for Lexer {
    type Item = CminResult<Token>;
    type IntoIter = LexerIter;

    fn into_iter(self) -> Self::IntoIter {
        LexerIter { lexer: self }
    }
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b'\t' | b'\r' | b'\n' | b'\x0B' | b'\x0C' | b' ')
}

fn is_identifier_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_identifier_continuation(c: u8) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cc::tokens::Punct;

    fn lex(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new("test.c", source);
        let mut tokens = vec![];
        loop {
            let token = lexer.read().unwrap();
            let done = token.kind == TokenKind::EndOfFile;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("int main x123 _tmp while0"),
            vec![
                TokenKind::Keyword(Keyword::Int),
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_reserved_words_never_identifiers() {
        assert_eq!(
            kinds("struct volatile goto"),
            vec![
                TokenKind::Keyword(Keyword::Struct),
                TokenKind::Keyword(Keyword::Volatile),
                TokenKind::Keyword(Keyword::Goto),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_integer_literal_value() {
        let tokens = lex("0 42 65535");
        assert_eq!(tokens[0].integer(), 0);
        assert_eq!(tokens[1].integer(), 42);
        assert_eq!(tokens[2].integer(), 65535);
    }

    #[test]
    fn test_integer_literal_overflow() {
        let mut lexer = Lexer::new("test.c", "65536");
        let err = lexer.read().unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("too large integer literal `65536'"));
        assert!(rendered.starts_with("test.c(1):"));
    }

    #[test]
    fn test_punctuator_longest_match() {
        assert_eq!(
            kinds("++ + += = == & && &="),
            vec![
                TokenKind::Punct(Punct::Increment),
                TokenKind::Punct(Punct::Plus),
                TokenKind::Punct(Punct::PlusAssign),
                TokenKind::Punct(Punct::Assign),
                TokenKind::Punct(Punct::Equal),
                TokenKind::Punct(Punct::Amp),
                TokenKind::Punct(Punct::AmpAmp),
                TokenKind::Punct(Punct::AmpAssign),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_adjacent_punctuators() {
        // `+++` is `++` `+` under longest-prefix match.
        assert_eq!(
            kinds("+++"),
            vec![
                TokenKind::Punct(Punct::Increment),
                TokenKind::Punct(Punct::Plus),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 // line comment\n/* block\ncomment */ 2"),
            vec![
                TokenKind::IntegerLiteral,
                TokenKind::IntegerLiteral,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_line_comment_at_eof() {
        assert_eq!(kinds("// trailing"), vec![TokenKind::EndOfFile]);
    }

    #[test]
    fn test_unterminated_block_comment() {
        let mut lexer = Lexer::new("test.c", "/* never closed");
        let err = lexer.read().unwrap_err();
        assert!(err.to_string().contains("unterminated block comment"));
    }

    #[test]
    fn test_unexpected_character() {
        let mut lexer = Lexer::new("test.c", "@");
        let err = lexer.read().unwrap_err();
        assert!(err.to_string().contains("unexpected character `0x40'"));
    }

    #[test]
    fn test_line_numbers() {
        let tokens = lex("1\n2\n\n  3");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 4);
    }

    #[test]
    fn test_block_comment_counts_lines() {
        let tokens = lex("/* a\nb\nc */ x");
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn test_eof_repeats() {
        let mut lexer = Lexer::new("test.c", "");
        assert_eq!(lexer.read().unwrap().kind, TokenKind::EndOfFile);
        assert_eq!(lexer.read().unwrap().kind, TokenKind::EndOfFile);
    }
}
