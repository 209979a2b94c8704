use crate::ast::{BinOp, Expr, IfTail, Program, Scope, Stmt};
use crate::frontend::lexer::{Token, TokenKind};
use crate::frontend::symbol_table::SymbolTable;
use std::fmt;

/// A recoverable parse or semantic problem, anchored to the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error at line {}, column {}: {}",
            self.line, self.col, self.message
        )
    }
}

/// Parsed program along with every diagnostic reported on the way. A
/// diagnostic abandons its statement; the rest of the program is still here.
pub struct ParsedProgram {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse(tokens: Vec<Token>) -> ParsedProgram {
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            symbols: SymbolTable::new(),
            diagnostics: Vec::new(),
        }
    }

    fn parse(mut self) -> ParsedProgram {
        let mut program = Program::default();
        self.symbols.enter_scope();
        while let Some(kind) = self.peek_kind() {
            if kind == TokenKind::Semi {
                // Empty statement.
                self.advance();
                continue;
            }
            if let Some(stmt) = self.parse_statement() {
                program.statements.push(stmt);
            }
        }
        self.symbols.exit_scope();
        ParsedProgram {
            program,
            diagnostics: self.diagnostics,
        }
    }

    // ── Statements ───────────────────────────────────────────────────────

    /// Dispatch on the lookahead token. On any failure the statement is
    /// abandoned and the cursor skips to the next statement boundary.
    fn parse_statement(&mut self) -> Option<Stmt> {
        let token = self.peek()?.clone();
        let stmt = match token.kind {
            TokenKind::Exit => self.parse_exit(),
            TokenKind::Let => self.parse_let(),
            TokenKind::If => self.parse_if(),
            TokenKind::OpenBrace => self.parse_block().map(Stmt::Block),
            TokenKind::Ident => self.parse_assign(),
            _ => {
                self.error_at(&token, format!("unexpected token '{}'", token.text));
                self.advance();
                None
            }
        };
        if stmt.is_none() {
            self.synchronize();
        }
        stmt
    }

    fn parse_exit(&mut self) -> Option<Stmt> {
        self.advance(); // 'exit'
        self.expect(TokenKind::OpenParen, "expected '(' after 'exit'")?;
        let value = self.parse_expr(1)?;
        self.expect(TokenKind::CloseParen, "expected ')' after expression")?;
        self.expect(TokenKind::Semi, "expected ';' after exit statement")?;
        Some(Stmt::Exit { value })
    }

    fn parse_let(&mut self) -> Option<Stmt> {
        self.advance(); // 'let'
        let ident = self.expect(TokenKind::Ident, "expected identifier after 'let'")?;
        self.expect(TokenKind::Eq, "expected '=' after identifier in let statement")?;
        let value = self.parse_expr(1)?;
        self.expect(TokenKind::Semi, "expected ';' after let statement")?;
        // Declared only now: the initializer itself sees the outer binding.
        if !self.symbols.declare(&ident.text) {
            self.error_at(
                &ident,
                format!("variable '{}' already declared in this scope", ident.text),
            );
            return None;
        }
        Some(Stmt::Let {
            name: ident.text,
            value,
        })
    }

    fn parse_assign(&mut self) -> Option<Stmt> {
        let ident = self.peek()?.clone();
        self.advance();
        if !self.symbols.is_declared(&ident.text) {
            self.error_at(
                &ident,
                format!("variable '{}' is not declared", ident.text),
            );
            return None;
        }
        self.expect(TokenKind::Eq, "expected '=' after identifier")?;
        let value = self.parse_expr(1)?;
        self.expect(TokenKind::Semi, "expected ';' after assignment")?;
        Some(Stmt::Assign {
            name: ident.text,
            value,
        })
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        self.advance(); // 'if'
        self.expect(TokenKind::OpenParen, "expected '(' after 'if'")?;
        let condition = self.parse_expr(1)?;
        self.expect(TokenKind::CloseParen, "expected ')' after condition")?;
        let then_block = self.parse_block()?;
        let tail = self.parse_if_tail()?;
        Some(Stmt::If {
            condition,
            then_block,
            tail,
        })
    }

    fn parse_if_tail(&mut self) -> Option<Option<Box<IfTail>>> {
        match self.peek_kind() {
            Some(TokenKind::Elif) => {
                self.advance();
                self.expect(TokenKind::OpenParen, "expected '(' after 'elif'")?;
                let condition = self.parse_expr(1)?;
                self.expect(TokenKind::CloseParen, "expected ')' after condition")?;
                let block = self.parse_block()?;
                let next = self.parse_if_tail()?;
                Some(Some(Box::new(IfTail::Elif {
                    condition,
                    block,
                    next,
                })))
            }
            Some(TokenKind::Else) => {
                self.advance();
                let block = self.parse_block()?;
                Some(Some(Box::new(IfTail::Else { block })))
            }
            _ => Some(None),
        }
    }

    /// `'{' statement* '}'`. Scope entry/exit is unconditional: the symbol
    /// table leaves the scope even when the block fails to close.
    fn parse_block(&mut self) -> Option<Scope> {
        self.expect(TokenKind::OpenBrace, "expected '{'")?;
        self.symbols.enter_scope();
        let mut statements = Vec::new();
        let closed = loop {
            match self.peek_kind() {
                None => break false,
                Some(TokenKind::CloseBrace) => {
                    self.advance();
                    break true;
                }
                Some(TokenKind::Semi) => {
                    self.advance();
                }
                Some(_) => {
                    if let Some(stmt) = self.parse_statement() {
                        statements.push(stmt);
                    }
                }
            }
        };
        self.symbols.exit_scope();
        if !closed {
            self.error_at_end("expected '}' at end of scope");
            return None;
        }
        Some(Scope { statements })
    }

    // ── Expressions ──────────────────────────────────────────────────────

    /// Precedence climbing. The right-hand recursion uses `prec + 1`, which
    /// makes every operator left-associative.
    fn parse_expr(&mut self, min_prec: u8) -> Option<Expr> {
        let mut left = self.parse_primary()?;
        while let Some(op) = self.peek_binop() {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_expr(prec + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Some(left)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => {
                self.error_at_end("expected expression");
                return None;
            }
        };
        match token.kind {
            TokenKind::IntLit => {
                self.advance();
                Some(Expr::IntLit(token.text))
            }
            TokenKind::Ident => {
                self.advance();
                if !self.symbols.is_declared(&token.text) {
                    self.error_at(
                        &token,
                        format!("variable '{}' is not declared", token.text),
                    );
                    return None;
                }
                Some(Expr::Ident(token.text))
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_expr(1)?;
                self.expect(TokenKind::CloseParen, "expected ')' after expression")?;
                Some(inner)
            }
            _ => {
                self.error_at(
                    &token,
                    format!("expected expression, found '{}'", token.text),
                );
                None
            }
        }
    }

    fn peek_binop(&self) -> Option<BinOp> {
        match self.peek_kind()? {
            TokenKind::Plus => Some(BinOp::Add),
            TokenKind::Minus => Some(BinOp::Sub),
            TokenKind::Star => Some(BinOp::Mul),
            TokenKind::Slash => Some(BinOp::Div),
            _ => None,
        }
    }

    // ── Cursor and recovery ──────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Option<Token> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                let token = token.clone();
                self.advance();
                Some(token)
            }
            Some(token) => {
                let token = token.clone();
                self.error_at(&token, message.to_string());
                None
            }
            None => {
                self.error_at_end(message);
                None
            }
        }
    }

    /// Skip to the next statement boundary: just past a `;`, or up to (not
    /// past) a `}` so the enclosing scope can close. Does nothing when the
    /// previous token already ended a statement.
    fn synchronize(&mut self) {
        if self.pos > 0 {
            if let Some(prev) = self.tokens.get(self.pos - 1) {
                if prev.kind == TokenKind::Semi || prev.kind == TokenKind::CloseBrace {
                    return;
                }
            }
        }
        while let Some(kind) = self.peek_kind() {
            match kind {
                TokenKind::Semi => {
                    self.advance();
                    return;
                }
                TokenKind::CloseBrace => return,
                _ => self.advance(),
            }
        }
    }

    fn error_at(&mut self, token: &Token, message: String) {
        self.diagnostics.push(Diagnostic {
            line: token.line,
            col: token.col,
            message,
        });
    }

    /// Report an error with no token left to anchor it; the last token's
    /// position is the closest thing to one.
    fn error_at_end(&mut self, message: &str) {
        let (line, col) = self
            .tokens
            .last()
            .map(|token| (token.line, token.col))
            .unwrap_or((1, 1));
        self.diagnostics.push(Diagnostic {
            line,
            col,
            message: message.to_string(),
        });
    }
}
