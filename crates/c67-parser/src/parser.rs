//! Recursive-descent parser for C67.
//!
//! The parser owns the token stream produced by the lexer and produces a
//! [`Program`]. It does no semantic analysis beyond picking AST shapes; on
//! malformed input it aborts with a `line:column`-positioned error.

mod error;
mod expr;
mod precedence;
mod stmt;

pub use error::ParseError;

use crate::ast::Program;
use crate::lexer::Lexer;
use crate::token::{Span, Token};

pub(crate) const MAX_PARSE_DEPTH: u32 = 256;

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    /// Nesting inside `(` / `[` where newlines are insignificant.
    group_depth: u32,
    /// Set while parsing a loop-header iterable so a following `{` is the
    /// loop body, never a subject-form match.
    pub(crate) no_match_braces: bool,
    pub(crate) depth: u32,
}

impl Parser {
    /// Lex `source` and build a parser over the token stream.
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self {
            tokens,
            pos: 0,
            group_depth: 0,
            no_match_braces: false,
            depth: 0,
        })
    }

    /// Parse the whole program.
    pub fn parse(mut self) -> Result<Program, ParseError> {
        let mut statements = Vec::new();
        self.skip_newlines();
        while !self.at_end() {
            statements.push(stmt::parse_statement(&mut self)?);
            self.skip_newlines();
        }
        Ok(Program { statements })
    }

    // ===== Token stream surface =====

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].0
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].1
    }

    /// Token `n` positions ahead, newlines included.
    pub(crate) fn peek(&self, n: usize) -> &Token {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].0
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.current(), Token::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].0.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        match token {
            Token::LeftParen | Token::LeftBracket => self.group_depth += 1,
            Token::RightParen | Token::RightBracket => {
                self.group_depth = self.group_depth.saturating_sub(1)
            }
            _ => {}
        }
        // Newlines inside parens/brackets are layout only.
        if self.group_depth > 0 {
            while matches!(self.current(), Token::Newline) && self.pos < self.tokens.len() - 1 {
                self.pos += 1;
            }
        }
        token
    }

    pub(crate) fn check(&self, token: &Token) -> bool {
        self.current() == token
    }

    pub(crate) fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, token: Token) -> Result<(), ParseError> {
        if self.check(&token) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                format!("'{}'", token),
                self.current().clone(),
                self.current_span(),
            ))
        }
    }

    pub(crate) fn expect_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        match self.current().clone() {
            Token::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            found => Err(ParseError::unexpected(what.to_string(), found, self.current_span())),
        }
    }

    pub(crate) fn skip_newlines(&mut self) {
        while matches!(self.current(), Token::Newline | Token::Semicolon) && !self.at_end() {
            self.advance();
        }
    }

    /// End-of-statement: newline, `;`, `}`, or EOF. Consumes separators.
    pub(crate) fn expect_statement_end(&mut self) -> Result<(), ParseError> {
        match self.current() {
            Token::Newline | Token::Semicolon => {
                self.advance();
                Ok(())
            }
            Token::Eof | Token::RightBrace => Ok(()),
            // Match arms continue on the same line.
            Token::MatchArrow | Token::DefaultArrow => Ok(()),
            found => Err(ParseError::unexpected(
                "end of statement",
                found.clone(),
                self.current_span(),
            )),
        }
    }

    /// Scan ahead from a `{` at the current position: does the brace pair
    /// contain a `=>` or `~>` at depth 1? Decides subject-form match vs
    /// plain block without consuming anything.
    pub(crate) fn brace_holds_arms(&self) -> bool {
        debug_assert!(matches!(self.current(), Token::LeftBrace));
        let mut depth = 0usize;
        for (token, _) in &self.tokens[self.pos..] {
            match token {
                Token::LeftBrace => depth += 1,
                Token::RightBrace => {
                    if depth <= 1 {
                        return false;
                    }
                    depth -= 1;
                }
                Token::MatchArrow | Token::DefaultArrow if depth == 1 => return true,
                Token::Eof => return false,
                _ => {}
            }
        }
        false
    }

    /// Lookahead for `(a, b) ->`: from a `(` at the current position, is the
    /// paren group a lambda parameter list?
    pub(crate) fn paren_starts_lambda(&self) -> bool {
        debug_assert!(matches!(self.current(), Token::LeftParen));
        let mut i = self.pos + 1;
        loop {
            match &self.tokens[i.min(self.tokens.len() - 1)].0 {
                Token::Identifier(_) | Token::Comma | Token::Newline => i += 1,
                Token::RightParen => {
                    return matches!(
                        self.tokens[(i + 1).min(self.tokens.len() - 1)].0,
                        Token::LambdaArrow
                    )
                }
                _ => return false,
            }
        }
    }
}
