//! Tests for expression parsing.

use c67_parser::ast::*;
use c67_parser::parser::Parser;

fn parse(source: &str) -> Program {
    Parser::new(source).unwrap().parse().unwrap()
}

fn first_expression(program: &Program) -> &Expression {
    match &program.statements[0] {
        Statement::Expression(s) => &s.expression,
        other => panic!("expected expression statement, got {:?}", other),
    }
}

#[test]
fn test_number_literal() {
    let program = parse("42");
    match first_expression(&program) {
        Expression::Number(lit) => assert_eq!(lit.value, 42.0),
        other => panic!("expected number, got {:?}", other),
    }
}

#[test]
fn test_precedence_mul_over_add() {
    let program = parse("1 + 2 * 3");
    match first_expression(&program) {
        Expression::Binary(b) => {
            assert_eq!(b.operator, BinaryOperator::Add);
            match b.right.as_ref() {
                Expression::Binary(r) => assert_eq!(r.operator, BinaryOperator::Mul),
                other => panic!("expected multiplication on the right, got {:?}", other),
            }
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_power_is_right_associative() {
    let program = parse("2 ** 3 ** 4");
    match first_expression(&program) {
        Expression::Binary(b) => {
            assert_eq!(b.operator, BinaryOperator::Pow);
            assert!(matches!(b.left.as_ref(), Expression::Number(_)));
            assert!(matches!(b.right.as_ref(), Expression::Binary(_)));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_list_and_map_literals() {
    let program = parse("[1, 2, 3]");
    match first_expression(&program) {
        Expression::List(l) => assert_eq!(l.elements.len(), 3),
        other => panic!("expected list, got {:?}", other),
    }

    let program = parse("{1: 10, 2: 20}");
    match first_expression(&program) {
        Expression::Map(m) => assert_eq!(m.entries.len(), 2),
        other => panic!("expected map, got {:?}", other),
    }
}

#[test]
fn test_single_param_lambda() {
    let program = parse("x -> x * 2");
    match first_expression(&program) {
        Expression::Lambda(l) => {
            assert_eq!(l.params, vec!["x".to_string()]);
            assert!(matches!(l.body.as_ref(), LambdaBody::Expression(_)));
        }
        other => panic!("expected lambda, got {:?}", other),
    }
}

#[test]
fn test_multi_param_lambda() {
    let program = parse("(a, b) -> a + b");
    match first_expression(&program) {
        Expression::Lambda(l) => assert_eq!(l.params.len(), 2),
        other => panic!("expected lambda, got {:?}", other),
    }
}

#[test]
fn test_lambda_with_match_body() {
    // The factorial shape: a lambda whose body is a guard match.
    let program = parse("f = n -> { n <= 1 => 1 ~> n * f(n - 1) }");
    match &program.statements[0] {
        Statement::Assign(assign) => match &assign.value {
            Expression::Lambda(l) => match l.body.as_ref() {
                LambdaBody::Expression(e) => match e.as_ref() {
                    Expression::Match(m) => {
                        assert!(m.subject.is_none());
                        assert_eq!(m.arms.len(), 1);
                        assert!(m.default.is_some());
                    }
                    other => panic!("expected match body, got {:?}", other),
                },
                other => panic!("expected expression body, got {:?}", other),
            },
            other => panic!("expected lambda, got {:?}", other),
        },
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn test_subject_match() {
    let program = parse("x { 1 => 10\n 2 => 20\n ~> 0 }");
    match first_expression(&program) {
        Expression::Match(m) => {
            assert!(m.subject.is_some());
            assert_eq!(m.arms.len(), 2);
            assert!(m.default.is_some());
        }
        other => panic!("expected match, got {:?}", other),
    }
}

#[test]
fn test_match_guard_alternatives() {
    let program = parse("x { 1 | 2 => 10 ~> 0 }");
    match first_expression(&program) {
        Expression::Match(m) => assert_eq!(m.arms[0].guards.len(), 2),
        other => panic!("expected match, got {:?}", other),
    }
}

#[test]
fn test_parallel_map() {
    let program = parse("ns || (x -> x * x)");
    match first_expression(&program) {
        Expression::Binary(b) => {
            assert_eq!(b.operator, BinaryOperator::ParMap);
            assert!(matches!(b.right.as_ref(), Expression::Lambda(_)));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_or_bang_fallback() {
    let program = parse("x or! 42");
    match first_expression(&program) {
        Expression::Binary(b) => assert_eq!(b.operator, BinaryOperator::OrBang),
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_postfix_probes() {
    let program = parse("x err?");
    match first_expression(&program) {
        Expression::Postfix(p) => assert_eq!(p.operator, PostfixOperator::ErrProbe),
        other => panic!("expected postfix, got {:?}", other),
    }
    let program = parse("x??");
    match first_expression(&program) {
        Expression::Postfix(p) => assert_eq!(p.operator, PostfixOperator::Random),
        other => panic!("expected postfix, got {:?}", other),
    }
}

#[test]
fn test_call_index_member_chain() {
    let program = parse("sdl.init(3)[0].x");
    match first_expression(&program) {
        Expression::Member(m) => {
            assert_eq!(m.field, "x");
            assert!(matches!(m.base.as_ref(), Expression::Index(_)));
        }
        other => panic!("expected member, got {:?}", other),
    }
}

#[test]
fn test_cast() {
    let program = parse("x as i32");
    match first_expression(&program) {
        Expression::Cast(c) => assert_eq!(c.target, "i32"),
        other => panic!("expected cast, got {:?}", other),
    }
}

#[test]
fn test_range_inclusive_and_exclusive() {
    let program = parse("0 .. 10");
    match first_expression(&program) {
        Expression::Range(r) => assert!(r.inclusive),
        other => panic!("expected range, got {:?}", other),
    }
    let program = parse("0 ..< 10");
    match first_expression(&program) {
        Expression::Range(r) => assert!(!r.inclusive),
        other => panic!("expected range, got {:?}", other),
    }
}

#[test]
fn test_fstring_parts() {
    let program = parse(r#"f"x = {x}, done""#);
    match first_expression(&program) {
        Expression::FString(fs) => {
            assert_eq!(fs.parts.len(), 3);
            assert!(matches!(fs.parts[0], FStringPart::Literal(ref s) if s == "x = "));
            assert!(matches!(fs.parts[1], FStringPart::Interpolation(_)));
            assert!(matches!(fs.parts[2], FStringPart::Literal(ref s) if s == ", done"));
        }
        other => panic!("expected f-string, got {:?}", other),
    }
}

#[test]
fn test_unary_forms() {
    for (src, op) in [
        ("-x", UnaryOperator::Neg),
        ("not x", UnaryOperator::Not),
        ("~b x", UnaryOperator::BitNot),
        ("!x", UnaryOperator::Move),
        ("$x", UnaryOperator::AddressOf),
    ] {
        let program = parse(src);
        match first_expression(&program) {
            Expression::Unary(u) => assert_eq!(u.operator, op, "for {}", src),
            other => panic!("expected unary for {}, got {:?}", src, other),
        }
    }
}

#[test]
fn test_cons_operator() {
    let program = parse("1 :: xs");
    match first_expression(&program) {
        Expression::Binary(b) => assert_eq!(b.operator, BinaryOperator::Cons),
        other => panic!("expected binary, got {:?}", other),
    }
}

#[test]
fn test_loop_meta_expressions() {
    let program = parse("@counter + 1");
    match first_expression(&program) {
        Expression::Binary(b) => {
            assert!(matches!(b.left.as_ref(), Expression::LoopMeta(_)));
        }
        other => panic!("expected binary, got {:?}", other),
    }
}
