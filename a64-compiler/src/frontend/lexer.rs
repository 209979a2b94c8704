use logos::Logos;
use std::fmt;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n]+")] // Whitespace
#[logos(skip r"//[^\n]*")] // Line comments
#[logos(skip r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")] // Block comments, non-nesting
pub enum TokenKind {
    // --- Keywords ---
    #[token("exit")]
    Exit,
    #[token("let")]
    Let,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,

    // --- Literals and identifiers ---
    #[regex(r"[0-9]+")]
    IntLit,
    #[regex(r"[A-Za-z]+")]
    Ident,

    // --- Punctuation and operators ---
    #[token(";")]
    Semi,
    #[token("=")]
    Eq,
    #[token("(")]
    OpenParen,
    #[token(")")]
    CloseParen,
    #[token("{")]
    OpenBrace,
    #[token("}")]
    CloseBrace,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
}

/// A lexed token: kind, the exact matched characters, and the 1-based
/// line/column of its first character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalError {
    pub line: usize,
    pub col: usize,
    pub unexpected_char: char,
    /// The source line the error sits on, for display alongside the message.
    pub context: String,
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unexpected character: {} at line {} column {}",
            self.unexpected_char, self.line, self.col
        )
    }
}

impl std::error::Error for LexicalError {}

/// Converts byte offsets to 1-based line/column positions. Offsets must be
/// queried in non-decreasing order, which token spans guarantee.
struct LineTracker<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> LineTracker<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn line_col(&mut self, offset: usize) -> (usize, usize) {
        for ch in self.source[self.pos..offset].chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos = offset;
        (self.line, self.col)
    }
}

/// The line containing an error position, trimmed for display.
fn error_context(source: &str, offset: usize) -> String {
    let line_start = source[..offset].rfind('\n').map(|pos| pos + 1).unwrap_or(0);
    let line_end = source[offset..]
        .find('\n')
        .map(|pos| offset + pos)
        .unwrap_or(source.len());
    source[line_start..line_end].trim().to_string()
}

/// Lex the whole source into a token vector, failing on the first character
/// that starts no token.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexicalError> {
    let mut lexer = TokenKind::lexer(source);
    let mut tracker = LineTracker::new(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let (line, col) = tracker.line_col(span.start);
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                text: lexer.slice().to_string(),
                line,
                col,
            }),
            Err(()) => {
                return Err(LexicalError {
                    line,
                    col,
                    unexpected_char: source[span.start..].chars().next().unwrap_or('\0'),
                    context: error_context(source, span.start),
                });
            }
        }
    }

    Ok(tokens)
}
