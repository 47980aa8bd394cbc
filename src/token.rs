use std::{fmt, ops::Range};

#[derive(Copy, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, pos: Pos) -> Token {
        Token {
            kind,
            pos,
            len: span.len,
            lo: span.lo,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            len: self.len,
            lo: self.lo,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {}, {})", self.kind, self.span(), self.pos)
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub len: u32,
    pub lo: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        // Sources larger than 4 GiB are not supported.
        let len = u32::try_from(hi - lo).unwrap_or(u32::MAX);
        Self::new_of_length(lo, len)
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    pub fn range(&self) -> Range<usize> {
        self.lo..self.hi()
    }

    /// Shrinks or grows the span on both ends.
    pub fn offset(&self, lo_delta: isize, hi_delta: isize) -> Span {
        let lo = self.lo.saturating_add_signed(lo_delta);
        let hi = self.hi().saturating_add_signed(hi_delta).max(lo);
        Span::new_of_bounds(lo..hi)
    }

    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.range()]
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, len: {})", self.len)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

/// A line/column position in the source, as reported in diagnostics.
///
/// Lines start at 1. The column is the column of the first character of the
/// token (tabs count as the configured tab width).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub const fn new(line: u32, col: u32) -> Pos {
        Pos { line, col }
    }

    pub fn wrap<T>(self, inner: T) -> Positioned<T> {
        Positioned { pos: self, inner }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{} C{}", self.line, self.col)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Positioned<T> {
    pub pos: Pos,
    pub inner: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Program,
    Procedure,
    Is,
    Begin,
    End,
    Global,
    Variable,
    Type,
    If,
    Then,
    Else,
    For,
    While,
    Return,
    Not,
    True,
    False,

    IntegerType,
    FloatType,
    StringType,
    BoolType,
    EnumType,

    /// `&`
    Amp,
    /// `|`
    Pipe,
    Plus,
    Minus,
    Star,
    Slash,
    /// `:=`
    Assign,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,

    LBracket,
    RBracket,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
    Colon,
    Period,
    Comma,

    Identifier,
    Integer,
    Float,
    String,

    Whitespace,
    LineComment,
    BlockComment,

    Eof,

    /// A character which starts no token.
    Unknown,
    ErrorUnclosedString,
    ErrorUnclosedComment,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            TokenKind::Unknown | TokenKind::ErrorUnclosedString | TokenKind::ErrorUnclosedComment
        )
    }

    /// Whether the token names one of the builtin types.
    pub fn is_builtin_type(self) -> bool {
        matches!(
            self,
            TokenKind::IntegerType
                | TokenKind::FloatType
                | TokenKind::StringType
                | TokenKind::BoolType
        )
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "program" => TokenKind::Program,
    "procedure" => TokenKind::Procedure,
    "is" => TokenKind::Is,
    "begin" => TokenKind::Begin,
    "end" => TokenKind::End,
    "global" => TokenKind::Global,
    "type" => TokenKind::Type,
    "integer" => TokenKind::IntegerType,
    "float" => TokenKind::FloatType,
    "string" => TokenKind::StringType,
    "bool" => TokenKind::BoolType,
    "enum" => TokenKind::EnumType,
    "not" => TokenKind::Not,
    "if" => TokenKind::If,
    "then" => TokenKind::Then,
    "else" => TokenKind::Else,
    "for" => TokenKind::For,
    "while" => TokenKind::While,
    "return" => TokenKind::Return,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "variable" => TokenKind::Variable,
};

/// Digraphs, tried before falling back to single character tokens.
pub static DIGRAPHS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    ">=" => TokenKind::GreaterEq,
    "<=" => TokenKind::LessEq,
    "==" => TokenKind::EqEq,
    "!=" => TokenKind::NotEq,
    ":=" => TokenKind::Assign,
};
