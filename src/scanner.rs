use std::{
    iter::{FusedIterator, Peekable},
    num::{ParseFloatError, ParseIntError},
};

use log::trace;

use crate::token::{Pos, Span, Token, TokenKind, DIGRAPHS, KEYWORDS};

pub const DEFAULT_TAB_WIDTH: u32 = 4;

/// Scans the whole input into a new buffer, including the final EOF token.
pub fn scan_in_new(src: &str) -> Vec<Token> {
    Scanner::new(src).collect()
}

/// The source scanner.
///
/// Tokens are produced on demand, one per [`Scanner::next_token`] call. Once
/// the input is exhausted every following call yields an EOF token. When used
/// as an iterator, the EOF token is yielded exactly once.
pub struct Scanner<'src> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    current_pos: Pos,
    line: u32,
    col: u32,
    tab_width: u32,
    done: bool,
}

impl<'src> Scanner<'src> {
    pub fn new(src: &'src str) -> Scanner<'src> {
        Scanner {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            current_pos: Pos::new(1, 1),
            line: 1,
            col: 0,
            tab_width: DEFAULT_TAB_WIDTH,
            done: false,
        }
    }

    /// Sets how many columns a tab character advances.
    #[must_use]
    pub fn with_tab_width(mut self, tab_width: u32) -> Self {
        self.tab_width = tab_width;
        self
    }

    /// Scans the next token.
    pub fn next_token(&mut self) -> Token {
        let kind = self.scan_token_kind();
        let token = Token::new(kind, self.span(), self.current_pos);
        trace!("scanned {token:?}");
        token
    }

    /// Tries to scan the current character.
    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        let current = self.mark_advance();
        if let Some(digraph) = self.digraph(current) {
            return self.advance_with(digraph);
        }
        match current {
            '\0' => Eof,
            '&' => Amp,
            '|' => Pipe,
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => match self.peek() {
                '/' => self.line_comment(),
                '*' => self.block_comment(),
                _ => Slash,
            },
            '<' => Less,
            '>' => Greater,
            '[' => LBracket,
            ']' => RBracket,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            ';' => Semicolon,
            ':' => Colon,
            '.' => Period,
            ',' => Comma,
            '"' => self.string(),
            c if c.is_ascii_alphabetic() => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_whitespace() => self.whitespace(),
            _ => Unknown,
        }
    }

    /// Looks up the two-character operator starting with `first`, if any.
    fn digraph(&mut self, first: char) -> Option<TokenKind> {
        let mut buf = [0; 8];
        let first_len = first.encode_utf8(&mut buf).len();
        let second_len = self.peek().encode_utf8(&mut buf[first_len..]).len();
        let pair = std::str::from_utf8(&buf[..first_len + second_len]).ok()?;
        DIGRAPHS.get(pair).copied()
    }

    /// Scans a string literal. A quote right after a backslash never closes
    /// the string, so `\"` is the only escape. Line breaks are allowed.
    fn string(&mut self) -> TokenKind {
        let mut prev = '"';
        loop {
            match (prev, self.advance()) {
                (_, '\0') if self.is_exhausted() => return TokenKind::ErrorUnclosedString,
                ('\\', c) => prev = c,
                (_, '"') => return TokenKind::String,
                (_, c) => prev = c,
            }
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while matches!(self.peek(), c if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        self.digits();
        // `1.` is an integer followed by a period.
        if self.peek() == '.' && self.peek_second().is_ascii_digit() {
            self.advance();
            self.digits();
            return TokenKind::Float;
        }
        TokenKind::Integer
    }

    fn digits(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
    }

    fn whitespace(&mut self) -> TokenKind {
        while self.peek().is_ascii_whitespace() {
            self.advance();
        }
        TokenKind::Whitespace
    }

    fn line_comment(&mut self) -> TokenKind {
        assert_eq!(self.advance(), '/');
        while !matches!(self.peek(), '\n' | '\0') {
            self.advance();
        }
        TokenKind::LineComment
    }

    fn block_comment(&mut self) -> TokenKind {
        assert_eq!(self.advance(), '*');
        let mut depth = 1_u32;
        while depth > 0 {
            match (self.advance(), self.peek()) {
                ('\0', _) if self.is_exhausted() => return TokenKind::ErrorUnclosedComment,
                ('/', '*') => {
                    self.advance();
                    depth += 1;
                }
                ('*', '/') => {
                    self.advance();
                    depth -= 1;
                }
                _ => (),
            }
        }
        TokenKind::BlockComment
    }
}

impl<'src> Scanner<'src> {
    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.current_pos = Pos::new(self.line, self.col + 1);
        self.advance()
    }

    /// Returns the next character and advances the iterator, keeping track of
    /// the line and column.
    fn advance(&mut self) -> char {
        let Some(c) = self.iter.next() else {
            return '\0';
        };
        self.cursor += c.len_utf8();
        match c {
            '\n' => {
                self.line += 1;
                self.col = 0;
            }
            '\t' => self.col += self.tab_width,
            _ => self.col += 1,
        }
        c
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the character after the next one without advancing.
    fn peek_second(&self) -> char {
        let mut ahead = self.iter.clone();
        ahead.next();
        ahead.next().unwrap_or('\0')
    }

    fn is_exhausted(&self) -> bool {
        self.cursor >= self.src.len()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &'src str {
        self.span().substr(self.src)
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        self.done = token.is_eof();
        Some(token)
    }
}

impl FusedIterator for Scanner<'_> {}

pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Integer);
        token.span().substr(src).parse()
    }

    pub fn float(token: Token, src: &str) -> Result<f32, ParseFloatError> {
        debug_assert_eq!(token.kind, TokenKind::Float);
        token.span().substr(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.span().substr(src).into()
    }

    /// Returns the string contents, without the quotes, with `\"` unescaped.
    pub fn string(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::String);
        let raw = token.span().offset(1, -1).substr(src);
        if raw.contains("\\\"") {
            raw.replace("\\\"", "\"").into_boxed_str()
        } else {
            raw.into()
        }
    }
}
