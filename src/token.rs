use std::{fmt, ops::Range};

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token {
            kind,
            len: span.len,
            lo: span.lo,
        }
    }

    /// An end-of-input token positioned one past the last byte of `src`.
    pub fn eof_for(src: &str) -> Token {
        Token::new(TokenKind::Eof, Span::new_of_length(src.len(), 0))
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
        write!(f, "Token({:?}, {})", self.kind, self.span())
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
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap())
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { len, lo }
    }

    /// A span covering from the start of `self` to the end of `other`.
    pub fn to(self, other: Span) -> Span {
        let hi = other.lo + other.len as usize;
        Span::new_of_bounds(self.lo..hi)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.lo + self.len as usize]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }

    /// The 1-based line and column of the span's first byte, derived from the
    /// source text. Diagnostics are always reported in this form.
    pub fn line_col(self, src: &str) -> LineCol {
        let lo = self.lo.min(src.len());
        let before = &src[..lo];
        let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
        let col = lo - before.rfind('\n').map_or(0, |i| i + 1) + 1;
        LineCol {
            line: line as u32,
            col: col as u32,
        }
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
        let hi = lo + self.len as usize;
        write!(f, "{lo}..{hi}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for LineCol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A value paired with the source span it was reported at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Else,
    If,
    Int,
    Return,
    Void,
    While,

    Identifier,
    Number,

    Plus,
    Minus,
    Star,
    Slash,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `=`
    Assign,
    Semicolon,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    Whitespace,
    InlineComment,
    BlockComment,
    Eof,

    ErrorUnexpectedChar,
    /// A `!` not followed by `=`.
    ErrorLoneBang,
    ErrorUnclosedComment,
}

impl TokenKind {
    /// Whitespace and comments carry no syntax; the parser skips them.
    pub fn is_trivia(self) -> bool {
        use TokenKind::*;
        matches!(self, Whitespace | InlineComment | BlockComment)
    }

    pub fn is_error(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            ErrorUnexpectedChar | ErrorLoneBang | ErrorUnclosedComment
        )
    }

    /// Relational and equality operators form a single, non-chainable
    /// precedence level.
    pub fn is_rel_op(self) -> bool {
        use TokenKind::*;
        matches!(self, Less | LessEq | Greater | GreaterEq | EqEq | NotEq)
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "else" => TokenKind::Else,
    "if" => TokenKind::If,
    "int" => TokenKind::Int,
    "return" => TokenKind::Return,
    "void" => TokenKind::Void,
    "while" => TokenKind::While,
};
