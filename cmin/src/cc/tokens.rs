//! Tokens of the C subset.
use std::{fmt, str::FromStr};

use smol_str::SmolStr;

use crate::constants::Word;

/// One lexed token. Immutable once produced.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token, `[EOF]` for the end-of-file token.
    pub text: SmolStr,
    /// Line the token starts on, counting from 1.
    pub line: usize,
    /// Value of an integer literal token.
    pub value: Option<Word>,
}

impl Token {
    /// Value of an integer literal token; zero for any other kind.
    pub fn integer(&self) -> Word {
        debug_assert_eq!(self.kind, TokenKind::IntegerLiteral);
        self.value.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    EndOfFile,
    Identifier,
    IntegerLiteral,
    /// Identifier in the set of reserved words.
    Keyword(Keyword),
    Punct(Punct),
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EndOfFile => write!(f, "[EOF]"),
            Self::Identifier => write!(f, "identifier"),
            Self::IntegerLiteral => write!(f, "integer literal"),
            Self::Keyword(keyword) => write!(f, "{}", keyword),
            Self::Punct(punct) => write!(f, "{}", punct),
        }
    }
}

/// The reserved words of C. Only a handful drive the grammar; the rest
/// are recognized so they cannot be used as identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Keyword {
    Auto, Break, Case, Char, Const, Continue, Default, Do, Double,
    Else, Enum, Extern, Float, For, Goto, If, Int, Long, Register,
    Return, Signed, Sizeof, Short, Static, Struct, Switch, Typedef,
    Union, Unsigned, Void, Volatile, While,
}

impl Keyword {
    #[rustfmt::skip]
    pub fn text(self) -> &'static str {
        use Keyword as K;
        match self {
            K::Auto => "auto",         K::Break => "break",
            K::Case => "case",         K::Char => "char",
            K::Const => "const",       K::Continue => "continue",
            K::Default => "default",   K::Do => "do",
            K::Double => "double",     K::Else => "else",
            K::Enum => "enum",         K::Extern => "extern",
            K::Float => "float",       K::For => "for",
            K::Goto => "goto",         K::If => "if",
            K::Int => "int",           K::Long => "long",
            K::Register => "register", K::Return => "return",
            K::Signed => "signed",     K::Sizeof => "sizeof",
            K::Short => "short",       K::Static => "static",
            K::Struct => "struct",     K::Switch => "switch",
            K::Typedef => "typedef",   K::Union => "union",
            K::Unsigned => "unsigned", K::Void => "void",
            K::Volatile => "volatile", K::While => "while",
        }
    }
}

impl FromStr for Keyword {
    type Err = ();

    #[rustfmt::skip]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use Keyword as K;
        match s {
            "auto" => Ok(K::Auto),         "break" => Ok(K::Break),
            "case" => Ok(K::Case),         "char" => Ok(K::Char),
            "const" => Ok(K::Const),       "continue" => Ok(K::Continue),
            "default" => Ok(K::Default),   "do" => Ok(K::Do),
            "double" => Ok(K::Double),     "else" => Ok(K::Else),
            "enum" => Ok(K::Enum),         "extern" => Ok(K::Extern),
            "float" => Ok(K::Float),       "for" => Ok(K::For),
            "goto" => Ok(K::Goto),         "if" => Ok(K::If),
            "int" => Ok(K::Int),           "long" => Ok(K::Long),
            "register" => Ok(K::Register), "return" => Ok(K::Return),
            "signed" => Ok(K::Signed),     "sizeof" => Ok(K::Sizeof),
            "short" => Ok(K::Short),       "static" => Ok(K::Static),
            "struct" => Ok(K::Struct),     "switch" => Ok(K::Switch),
            "typedef" => Ok(K::Typedef),   "union" => Ok(K::Union),
            "unsigned" => Ok(K::Unsigned), "void" => Ok(K::Void),
            "volatile" => Ok(K::Volatile), "while" => Ok(K::While),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

/// Punctuators and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[rustfmt::skip]
pub enum Punct {
    Plus,         // `+`
    Minus,        // `-`
    Star,         // `*`
    Slash,        // `/`
    Percent,      // `%`
    Tilde,        // `~`
    Amp,          // `&`
    Pipe,         // `|`
    Caret,        // `^`
    Increment,    // `++`
    Decrement,    // `--`
    AmpAmp,       // `&&`
    PipePipe,     // `||`
    Assign,       // `=`
    PlusAssign,   // `+=`
    MinusAssign,  // `-=`
    StarAssign,   // `*=`
    SlashAssign,  // `/=`
    PercentAssign,// `%=`
    AmpAssign,    // `&=`
    PipeAssign,   // `|=`
    CaretAssign,  // `^=`
    Equal,        // `==`
    NotEqual,     // `!=`
    Less,         // `<`
    LessEqual,    // `<=`
    Greater,      // `>`
    GreaterEqual, // `>=`
    Not,          // `!`
    Question,     // `?`
    Colon,        // `:`
    Semicolon,    // `;`
    Period,       // `.`
    Comma,        // `,`
    LeftParen,    // `(`
    RightParen,   // `)`
    LeftBrace,    // `{`
    RightBrace,   // `}`
    LeftBracket,  // `[`
    RightBracket, // `]`
}

/// Punctuator table in longest-prefix-match order: the lexer takes the
/// first entry the remaining source starts with, so every two-character
/// punctuator sorts before its one-character prefix.
#[rustfmt::skip]
pub(crate) const PUNCTUATORS: &[(&str, Punct)] = &[
    ("++", Punct::Increment),
    ("--", Punct::Decrement),
    ("&&", Punct::AmpAmp),
    ("||", Punct::PipePipe),
    ("+=", Punct::PlusAssign),
    ("-=", Punct::MinusAssign),
    ("*=", Punct::StarAssign),
    ("/=", Punct::SlashAssign),
    ("%=", Punct::PercentAssign),
    ("&=", Punct::AmpAssign),
    ("|=", Punct::PipeAssign),
    ("^=", Punct::CaretAssign),
    ("==", Punct::Equal),
    ("!=", Punct::NotEqual),
    ("<=", Punct::LessEqual),
    (">=", Punct::GreaterEqual),
    ("+",  Punct::Plus),
    ("-",  Punct::Minus),
    ("*",  Punct::Star),
    ("/",  Punct::Slash),
    ("%",  Punct::Percent),
    ("~",  Punct::Tilde),
    ("&",  Punct::Amp),
    ("|",  Punct::Pipe),
    ("^",  Punct::Caret),
    ("=",  Punct::Assign),
    ("<",  Punct::Less),
    (">",  Punct::Greater),
    ("!",  Punct::Not),
    ("?",  Punct::Question),
    (":",  Punct::Colon),
    (";",  Punct::Semicolon),
    (".",  Punct::Period),
    (",",  Punct::Comma),
    ("(",  Punct::LeftParen),
    (")",  Punct::RightParen),
    ("{",  Punct::LeftBrace),
    ("}",  Punct::RightBrace),
    ("[",  Punct::LeftBracket),
    ("]",  Punct::RightBracket),
];

impl Punct {
    pub fn text(self) -> &'static str {
        PUNCTUATORS
            .iter()
            .find(|(_, punct)| *punct == self)
            .map(|(text, _)| *text)
            .unwrap_or("?")
    }
}

impl fmt::Display for Punct {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}
