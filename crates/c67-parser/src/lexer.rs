//! Lexer for the C67 language.
//!
//! Built on a logos-generated tokenizer that is converted into the crate's
//! own [`Token`] enum with line/column spans. The scan is a single pass; an
//! optional shebang line is skipped before tokenization starts.

use crate::token::{Span, Token};
use logos::Logos;
use thiserror::Error;

/// Lexical errors. Every variant carries the source position; formatting
/// follows the compiler-wide `line:column: message` shape.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("{line}:{column}: unterminated string literal")]
    UnterminatedString { line: u32, column: u32 },

    #[error("{line}:{column}: bad numeric literal '{text}'")]
    BadNumber {
        text: String,
        line: u32,
        column: u32,
    },

    #[error("{line}:{column}: unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, line: u32, column: u32 },
}

/// Internal logos token set. Converted to [`Token`] after matching; keywords
/// are folded out of the identifier arm.
#[derive(Logos, Debug, Clone, PartialEq)]
enum RawToken {
    #[regex(r"[ \t\r]+", logos::skip)]
    Whitespace,

    #[regex(r"//[^\n]*", logos::skip)]
    LineComment,

    #[token("\n")]
    Newline,

    // Identifiers and keywords
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    // Numbers (all numeric-uniform doubles)
    #[regex(r"0x[0-9a-fA-F]+", parse_hex)]
    #[regex(r"0b[01]+", parse_binary)]
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", parse_float)]
    #[regex(r"[0-9]+([eE][+-]?[0-9]+)?", parse_float)]
    Number(f64),

    // A bare hex/binary prefix with no digits is a lex error, not `0` + ident.
    #[token("0x")]
    #[token("0b")]
    BadNumber,

    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    Str(String),

    // An identifier glued to an opening quote starts an f-string.
    #[regex(r#"[A-Za-z_][A-Za-z0-9_]*"([^"\\\n]|\\.)*""#, parse_fstring)]
    FString(String),

    // `&host:port` / `&:port`
    #[regex(r"&[A-Za-z0-9_.-]*:[0-9]+", parse_address)]
    Address((String, u16)),

    // Loop sigils
    #[token("@counter")]
    AtCounter,
    #[token("@first")]
    AtFirst,
    #[token("@last")]
    AtLast,
    #[token("@++")]
    AtInc,
    #[token("@@")]
    AtAt,
    #[regex(r"@i\[[0-9]+\]", parse_at_index)]
    AtIndex(u8),
    #[token("@")]
    At,

    // Compound word operators
    #[token("or!")]
    OrBang,
    #[token("and!")]
    AndBang,
    #[token("err?")]
    ErrQuery,
    #[token("val?")]
    ValQuery,

    // Bit operator family
    #[token("|b")]
    PipeB,
    #[token("&b")]
    AmpB,
    #[token("^b")]
    CaretB,
    #[token("~b")]
    TildeB,
    #[token("<<<b")]
    RolB,
    #[token(">>>b")]
    RorB,
    #[token("<<b")]
    ShlB,
    #[token(">>b")]
    ShrB,
    #[token("?b")]
    TestB,

    // Multi-character operators
    #[token("**")]
    StarStar,
    #[token("*+")]
    StarPlus,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<>")]
    LtGt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<-?")]
    UpdateTry,
    #[token("<-")]
    Update,
    #[token(":=?")]
    DeclareTry,
    #[token(":=")]
    Declare,
    #[token("=?")]
    AssignTry,
    #[token("=>")]
    MatchArrow,
    #[token("~>")]
    DefaultArrow,
    #[token("->")]
    LambdaArrow,
    #[token("::")]
    ColonColon,
    #[token("||")]
    PipePipe,
    #[token("&&")]
    AmpAmp,
    #[token("??")]
    QuestionQuestion,
    #[token("...")]
    Ellipsis,
    #[token("..<")]
    DotDotLt,
    #[token("..")]
    DotDot,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,

    // Single-character tokens
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("=")]
    Assign,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("$")]
    Dollar,
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token("[")]
    LeftBracket,
    #[token("]")]
    RightBracket,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
}

fn parse_hex(lex: &mut logos::Lexer<RawToken>) -> Option<f64> {
    i64::from_str_radix(&lex.slice()[2..], 16).ok().map(|v| v as f64)
}

fn parse_binary(lex: &mut logos::Lexer<RawToken>) -> Option<f64> {
    i64::from_str_radix(&lex.slice()[2..], 2).ok().map(|v| v as f64)
}

fn parse_float(lex: &mut logos::Lexer<RawToken>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<RawToken>) -> Option<String> {
    let s = lex.slice();
    Some(unescape(&s[1..s.len() - 1]))
}

fn parse_fstring(lex: &mut logos::Lexer<RawToken>) -> Option<String> {
    // Strip the identifier prefix and the surrounding quotes; the body is
    // kept raw so the parser can split interpolation holes out of it.
    let s = lex.slice();
    let open = s.find('"')?;
    Some(s[open + 1..s.len() - 1].to_string())
}

fn parse_address(lex: &mut logos::Lexer<RawToken>) -> Option<(String, u16)> {
    let s = &lex.slice()[1..];
    let colon = s.rfind(':')?;
    let port: u16 = s[colon + 1..].parse().ok()?;
    Some((s[..colon].to_string(), port))
}

fn parse_at_index(lex: &mut logos::Lexer<RawToken>) -> Option<u8> {
    let s = lex.slice();
    s[3..s.len() - 1].parse().ok()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('e') => out.push('\x1b'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(c) => out.push(c),
            None => break,
        }
    }
    out
}

/// Single-pass lexer over one source file.
pub struct Lexer<'a> {
    source: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// Tokenize the whole source. The first lexical error aborts the scan.
    pub fn tokenize(self) -> Result<Vec<(Token, Span)>, LexError> {
        // Skip a shebang line if present.
        let (body, mut line) = if self.source.starts_with("#!") {
            match self.source.find('\n') {
                Some(nl) => (&self.source[nl..], 1u32),
                None => ("", 1u32),
            }
        } else {
            (self.source, 1u32)
        };
        let base = self.source.len() - body.len();

        let mut tokens = Vec::new();
        let mut column = 1u32;
        let mut last_end = 0usize;
        let mut lexer = RawToken::lexer(body);

        while let Some(result) = lexer.next() {
            let range = lexer.span();
            advance_position(&body[last_end..range.start], &mut line, &mut column);
            let span = Span::new(base + range.start, base + range.end, line, column);

            match result {
                Ok(raw) => tokens.push((convert(raw, &span)?, span)),
                Err(_) => {
                    let rest = &body[range.start..];
                    if rest.starts_with('"') {
                        return Err(LexError::UnterminatedString {
                            line,
                            column,
                        });
                    }
                    let ch = rest.chars().next().unwrap_or('\0');
                    return Err(LexError::UnexpectedCharacter { ch, line, column });
                }
            }
            advance_position(&body[range.start..range.end], &mut line, &mut column);
            last_end = range.end;
        }

        let eof = Span::new(self.source.len(), self.source.len(), line, column);
        tokens.push((Token::Eof, eof));
        Ok(tokens)
    }
}

fn advance_position(text: &str, line: &mut u32, column: &mut u32) {
    for c in text.chars() {
        if c == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
    }
}

fn convert(raw: RawToken, span: &Span) -> Result<Token, LexError> {
    Ok(match raw {
        RawToken::Identifier(s) => Token::keyword(&s).unwrap_or(Token::Identifier(s)),
        RawToken::Number(n) => Token::Number(n),
        RawToken::BadNumber => {
            return Err(LexError::BadNumber {
                text: "0x".into(),
                line: span.line,
                column: span.column,
            })
        }
        RawToken::Str(s) => Token::Str(s),
        RawToken::FString(s) => Token::FString(s),
        RawToken::Address((host, port)) => Token::AddressLit { host, port },
        RawToken::Newline => Token::Newline,
        RawToken::AtCounter => Token::AtCounter,
        RawToken::AtFirst => Token::AtFirst,
        RawToken::AtLast => Token::AtLast,
        RawToken::AtInc => Token::AtInc,
        RawToken::AtAt => Token::AtAt,
        RawToken::AtIndex(n) => Token::AtIndex(n),
        RawToken::At => Token::At,
        RawToken::OrBang => Token::OrBang,
        RawToken::AndBang => Token::AndBang,
        RawToken::ErrQuery => Token::ErrQuery,
        RawToken::ValQuery => Token::ValQuery,
        RawToken::PipeB => Token::PipeB,
        RawToken::AmpB => Token::AmpB,
        RawToken::CaretB => Token::CaretB,
        RawToken::TildeB => Token::TildeB,
        RawToken::RolB => Token::RolB,
        RawToken::RorB => Token::RorB,
        RawToken::ShlB => Token::ShlB,
        RawToken::ShrB => Token::ShrB,
        RawToken::TestB => Token::TestB,
        RawToken::StarStar => Token::StarStar,
        RawToken::StarPlus => Token::StarPlus,
        RawToken::EqEq => Token::EqEq,
        RawToken::NotEq => Token::NotEq,
        RawToken::LtGt => Token::LtGt,
        RawToken::Le => Token::Le,
        RawToken::Ge => Token::Ge,
        RawToken::UpdateTry => Token::UpdateTry,
        RawToken::Update => Token::Update,
        RawToken::DeclareTry => Token::DeclareTry,
        RawToken::Declare => Token::Declare,
        RawToken::AssignTry => Token::AssignTry,
        RawToken::MatchArrow => Token::MatchArrow,
        RawToken::DefaultArrow => Token::DefaultArrow,
        RawToken::LambdaArrow => Token::LambdaArrow,
        RawToken::ColonColon => Token::ColonColon,
        RawToken::PipePipe => Token::PipePipe,
        RawToken::AmpAmp => Token::AmpAmp,
        RawToken::QuestionQuestion => Token::QuestionQuestion,
        RawToken::Ellipsis => Token::Ellipsis,
        RawToken::DotDotLt => Token::DotDotLt,
        RawToken::DotDot => Token::DotDot,
        RawToken::PlusPlus => Token::PlusPlus,
        RawToken::MinusMinus => Token::MinusMinus,
        RawToken::Plus => Token::Plus,
        RawToken::Minus => Token::Minus,
        RawToken::Star => Token::Star,
        RawToken::Slash => Token::Slash,
        RawToken::Percent => Token::Percent,
        RawToken::Caret => Token::Caret,
        RawToken::Assign => Token::Assign,
        RawToken::Lt => Token::Lt,
        RawToken::Gt => Token::Gt,
        RawToken::Pipe => Token::Pipe,
        RawToken::Amp => Token::Amp,
        RawToken::Tilde => Token::Tilde,
        RawToken::Bang => Token::Bang,
        RawToken::Dollar => Token::Dollar,
        RawToken::LeftParen => Token::LeftParen,
        RawToken::RightParen => Token::RightParen,
        RawToken::LeftBrace => Token::LeftBrace,
        RawToken::RightBrace => Token::RightBrace,
        RawToken::LeftBracket => Token::LeftBracket,
        RawToken::RightBracket => Token::RightBracket,
        RawToken::Comma => Token::Comma,
        RawToken::Dot => Token::Dot,
        RawToken::Colon => Token::Colon,
        RawToken::Semicolon => Token::Semicolon,
        RawToken::Whitespace | RawToken::LineComment => {
            unreachable!("skipped by logos")
        }
    })
}
