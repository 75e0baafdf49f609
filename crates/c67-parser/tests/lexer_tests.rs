//! Tests for the lexer.

use c67_parser::lexer::{LexError, Lexer};
use c67_parser::token::Token;

fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|(t, _)| t)
        .collect()
}

#[test]
fn test_number_forms() {
    assert_eq!(lex("42"), vec![Token::Number(42.0), Token::Eof]);
    assert_eq!(lex("3.25"), vec![Token::Number(3.25), Token::Eof]);
    assert_eq!(lex("0xFF"), vec![Token::Number(255.0), Token::Eof]);
    assert_eq!(lex("0b1010"), vec![Token::Number(10.0), Token::Eof]);
}

#[test]
fn test_bad_hex_literal() {
    let err = Lexer::new("0x").tokenize().unwrap_err();
    assert!(matches!(err, LexError::BadNumber { .. }));
}

#[test]
fn test_range_is_not_a_float() {
    // A dot followed by a dot is always a range operator.
    assert_eq!(
        lex("1..5"),
        vec![
            Token::Number(1.0),
            Token::DotDot,
            Token::Number(5.0),
            Token::Eof
        ]
    );
    assert_eq!(
        lex("0 ..< 10"),
        vec![
            Token::Number(0.0),
            Token::DotDotLt,
            Token::Number(10.0),
            Token::Eof
        ]
    );
}

#[test]
fn test_string_escapes() {
    assert_eq!(
        lex(r#""a\nb\t\"c\"""#),
        vec![Token::Str("a\nb\t\"c\"".into()), Token::Eof]
    );
}

#[test]
fn test_unterminated_string() {
    let err = Lexer::new("\"abc").tokenize().unwrap_err();
    assert!(matches!(err, LexError::UnterminatedString { .. }));
}

#[test]
fn test_fstring_needs_adjacent_quote() {
    assert_eq!(
        lex(r#"f"x = {x}""#),
        vec![Token::FString("x = {x}".into()), Token::Eof]
    );
    // With a space in between it is an identifier and a plain string.
    assert_eq!(
        lex(r#"f "y""#),
        vec![
            Token::Identifier("f".into()),
            Token::Str("y".into()),
            Token::Eof
        ]
    );
}

#[test]
fn test_assignment_shapes() {
    assert_eq!(
        lex("a = 1\nb := 2\nb <- 3"),
        vec![
            Token::Identifier("a".into()),
            Token::Assign,
            Token::Number(1.0),
            Token::Newline,
            Token::Identifier("b".into()),
            Token::Declare,
            Token::Number(2.0),
            Token::Newline,
            Token::Identifier("b".into()),
            Token::Update,
            Token::Number(3.0),
            Token::Eof
        ]
    );
    assert_eq!(
        lex("x =? f()"),
        vec![
            Token::Identifier("x".into()),
            Token::AssignTry,
            Token::Identifier("f".into()),
            Token::LeftParen,
            Token::RightParen,
            Token::Eof
        ]
    );
    assert_eq!(lex(":=?")[0], Token::DeclareTry);
    assert_eq!(lex("<-?")[0], Token::UpdateTry);
}

#[test]
fn test_compound_word_operators() {
    assert_eq!(
        lex("x or! 42"),
        vec![
            Token::Identifier("x".into()),
            Token::OrBang,
            Token::Number(42.0),
            Token::Eof
        ]
    );
    assert_eq!(lex("err?")[0], Token::ErrQuery);
    assert_eq!(lex("val?")[0], Token::ValQuery);
    assert_eq!(lex("and!")[0], Token::AndBang);
}

#[test]
fn test_bit_operator_family() {
    assert_eq!(
        lex("a |b c &b d"),
        vec![
            Token::Identifier("a".into()),
            Token::PipeB,
            Token::Identifier("c".into()),
            Token::AmpB,
            Token::Identifier("d".into()),
            Token::Eof
        ]
    );
    assert_eq!(lex("<<<b")[0], Token::RolB);
    assert_eq!(lex(">>>b")[0], Token::RorB);
    assert_eq!(lex("<<b")[0], Token::ShlB);
    assert_eq!(lex("?b")[0], Token::TestB);
    assert_eq!(lex("~b")[0], Token::TildeB);
}

#[test]
fn test_loop_sigils() {
    assert_eq!(lex("@")[0], Token::At);
    assert_eq!(lex("@@")[0], Token::AtAt);
    assert_eq!(lex("@++")[0], Token::AtInc);
    assert_eq!(lex("@first")[0], Token::AtFirst);
    assert_eq!(lex("@last")[0], Token::AtLast);
    assert_eq!(lex("@counter")[0], Token::AtCounter);
    assert_eq!(lex("@i[2]")[0], Token::AtIndex(2));
}

#[test]
fn test_arrows() {
    assert_eq!(lex("=>")[0], Token::MatchArrow);
    assert_eq!(lex("~>")[0], Token::DefaultArrow);
    assert_eq!(lex("->")[0], Token::LambdaArrow);
}

#[test]
fn test_address_literal() {
    assert_eq!(
        lex("&localhost:8080")[0],
        Token::AddressLit {
            host: "localhost".into(),
            port: 8080
        }
    );
    assert_eq!(
        lex("&:9000")[0],
        Token::AddressLit {
            host: "".into(),
            port: 9000
        }
    );
}

#[test]
fn test_comments_and_shebang() {
    assert_eq!(
        lex("#!/usr/bin/env c67\n// comment\n42"),
        vec![
            Token::Newline,
            Token::Newline,
            Token::Number(42.0),
            Token::Eof
        ]
    );
}

#[test]
fn test_keywords() {
    assert_eq!(lex("arena")[0], Token::Arena);
    assert_eq!(lex("defer")[0], Token::Defer);
    assert_eq!(lex("cstruct")[0], Token::Cstruct);
    assert_eq!(lex("spawn")[0], Token::Spawn);
    assert_eq!(lex("shadow")[0], Token::Shadow);
    // Longer identifiers are not keywords.
    assert_eq!(lex("arenas")[0], Token::Identifier("arenas".into()));
    assert_eq!(lex("infer")[0], Token::Identifier("infer".into()));
}

#[test]
fn test_line_and_column_tracking() {
    let tokens = Lexer::new("a\n  b").tokenize().unwrap();
    let (_, a_span) = &tokens[0];
    assert_eq!((a_span.line, a_span.column), (1, 1));
    let (_, b_span) = &tokens[2];
    assert_eq!((b_span.line, b_span.column), (2, 3));
}
