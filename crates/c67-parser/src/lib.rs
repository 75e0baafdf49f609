//! C67 language frontend: lexer, token set, AST and parser.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use lexer::{LexError, Lexer};
pub use parser::{ParseError, Parser};
pub use token::{Span, Token};
