//! Parse error types.

use crate::lexer::LexError;
use crate::token::{Span, Token};
use thiserror::Error;

/// A parse error. Rendering follows the compiler-wide
/// `line:column: message` convention; the driver prefixes the file name.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("{}:{}: expected {expected}, found {found}", span.line, span.column)]
    UnexpectedToken {
        expected: String,
        found: Token,
        span: Span,
    },

    #[error("{}:{}: {reason}", span.line, span.column)]
    InvalidSyntax { reason: String, span: Span },

    #[error("{}:{}: maximum expression nesting depth exceeded", span.line, span.column)]
    TooDeep { span: Span },
}

impl ParseError {
    pub fn unexpected(expected: impl Into<String>, found: Token, span: Span) -> Self {
        ParseError::UnexpectedToken {
            expected: expected.into(),
            found,
            span,
        }
    }

    pub fn invalid(reason: impl Into<String>, span: Span) -> Self {
        ParseError::InvalidSyntax {
            reason: reason.into(),
            span,
        }
    }
}
