//! Expression parsing.

use super::precedence::{get_precedence, is_right_associative, Precedence};
use super::{stmt, ParseError, Parser, MAX_PARSE_DEPTH};
use crate::ast::*;
use crate::token::{Span, Token};

/// Parse an expression (entry point).
pub fn parse_expression(parser: &mut Parser) -> Result<Expression, ParseError> {
    parser.depth += 1;
    if parser.depth > MAX_PARSE_DEPTH {
        parser.depth -= 1;
        return Err(ParseError::TooDeep {
            span: parser.current_span(),
        });
    }
    let result = parse_with_precedence(parser, Precedence::None);
    parser.depth -= 1;
    result
}

/// Parse a standalone expression from raw text (used for f-string holes).
pub fn parse_expression_text(source: &str, at: Span) -> Result<Expression, ParseError> {
    let mut parser = Parser::new(source)?;
    let expr = parse_expression(&mut parser)?;
    parser.skip_newlines();
    if !parser.at_end() {
        return Err(ParseError::invalid("trailing input in interpolation", at));
    }
    Ok(expr)
}

/// Standard precedence climbing: parse a prefix, then fold infix operators
/// while their binding power holds. Postfix forms are always allowed through.
fn parse_with_precedence(
    parser: &mut Parser,
    min_precedence: Precedence,
) -> Result<Expression, ParseError> {
    let mut left = parse_prefix(parser)?;

    loop {
        let is_postfix = matches!(
            parser.current(),
            Token::LeftParen
                | Token::LeftBracket
                | Token::Dot
                | Token::PlusPlus
                | Token::MinusMinus
                | Token::QuestionQuestion
                | Token::ErrQuery
                | Token::ValQuery
                | Token::As
        ) || (matches!(parser.current(), Token::LeftBrace)
            && !parser.no_match_braces
            && parser.brace_holds_arms());

        let precedence = get_precedence(parser.current());
        if !is_postfix && (precedence == Precedence::None || precedence < min_precedence) {
            break;
        }
        left = parse_infix(parser, left, precedence)?;
    }

    Ok(left)
}

fn parse_prefix(parser: &mut Parser) -> Result<Expression, ParseError> {
    let start = parser.current_span();

    let operator = match parser.current() {
        Token::Minus => Some(UnaryOperator::Neg),
        Token::Not => Some(UnaryOperator::Not),
        Token::TildeB => Some(UnaryOperator::BitNot),
        Token::Bang => Some(UnaryOperator::Move),
        Token::Dollar => Some(UnaryOperator::AddressOf),
        _ => None,
    };
    if let Some(operator) = operator {
        parser.advance();
        let operand = parse_with_precedence(parser, Precedence::Unary)?;
        let span = start.to(operand.span());
        return Ok(Expression::Unary(UnaryExpression {
            operator,
            operand: Box::new(operand),
            span,
        }));
    }

    parse_primary(parser)
}

fn parse_primary(parser: &mut Parser) -> Result<Expression, ParseError> {
    let span = parser.current_span();
    match parser.current().clone() {
        Token::Number(value) => {
            parser.advance();
            Ok(Expression::Number(NumberLit { value, span }))
        }
        Token::Inf => {
            parser.advance();
            Ok(Expression::Number(NumberLit {
                value: f64::INFINITY,
                span,
            }))
        }
        Token::Str(value) => {
            parser.advance();
            Ok(Expression::Str(StringLit { value, span }))
        }
        Token::FString(raw) => {
            parser.advance();
            let parts = split_fstring(&raw, span)?;
            Ok(Expression::FString(FStringLit { parts, span }))
        }
        Token::AddressLit { host, port } => {
            parser.advance();
            Ok(Expression::Address(AddressLit { host, port, span }))
        }
        Token::AtCounter => {
            parser.advance();
            Ok(loop_meta(LoopMetaKind::Counter, span))
        }
        Token::AtFirst => {
            parser.advance();
            Ok(loop_meta(LoopMetaKind::First, span))
        }
        Token::AtLast => {
            parser.advance();
            Ok(loop_meta(LoopMetaKind::Last, span))
        }
        Token::AtIndex(n) => {
            parser.advance();
            Ok(loop_meta(LoopMetaKind::Index(n), span))
        }
        Token::Identifier(name) => {
            // `x -> body` is a single-parameter lambda.
            if matches!(parser.peek(1), Token::LambdaArrow) {
                parser.advance();
                parser.advance();
                return parse_lambda_body(parser, vec![name], span);
            }
            parser.advance();
            Ok(Expression::Identifier(Identifier { name, span }))
        }
        Token::LeftParen => {
            if parser.paren_starts_lambda() {
                parser.advance();
                let mut params = Vec::new();
                while !parser.check(&Token::RightParen) {
                    params.push(parser.expect_identifier("parameter name")?);
                    if !parser.eat(&Token::Comma) {
                        break;
                    }
                }
                parser.expect(Token::RightParen)?;
                parser.expect(Token::LambdaArrow)?;
                return parse_lambda_body(parser, params, span);
            }
            parser.advance();
            let inner = parse_expression(parser)?;
            parser.expect(Token::RightParen)?;
            Ok(inner)
        }
        Token::LeftBracket => {
            parser.advance();
            let mut elements = Vec::new();
            while !parser.check(&Token::RightBracket) {
                elements.push(parse_expression(parser)?);
                if !parser.eat(&Token::Comma) {
                    break;
                }
            }
            let end = parser.current_span();
            parser.expect(Token::RightBracket)?;
            Ok(Expression::List(ListLit {
                elements,
                span: span.to(&end),
            }))
        }
        Token::LeftBrace => {
            if parser.brace_holds_arms() {
                return parse_match_braces(parser, None, span);
            }
            parser.advance();
            parser.skip_newlines();
            let mut entries = Vec::new();
            while !parser.check(&Token::RightBrace) {
                let key = parse_expression(parser)?;
                parser.expect(Token::Colon)?;
                let value = parse_expression(parser)?;
                entries.push((key, value));
                if !parser.eat(&Token::Comma) {
                    parser.skip_newlines();
                    break;
                }
                parser.skip_newlines();
            }
            let end = parser.current_span();
            parser.expect(Token::RightBrace)?;
            Ok(Expression::Map(MapLit {
                entries,
                span: span.to(&end),
            }))
        }
        found => Err(ParseError::unexpected("expression", found, span)),
    }
}

fn loop_meta(kind: LoopMetaKind, span: Span) -> Expression {
    Expression::LoopMeta(LoopMetaExpression { kind, span })
}

fn parse_infix(
    parser: &mut Parser,
    left: Expression,
    precedence: Precedence,
) -> Result<Expression, ParseError> {
    let start = *left.span();

    match parser.current().clone() {
        Token::LeftParen => {
            parser.advance();
            let mut arguments = Vec::new();
            while !parser.check(&Token::RightParen) {
                arguments.push(parse_expression(parser)?);
                if !parser.eat(&Token::Comma) {
                    break;
                }
            }
            let end = parser.current_span();
            parser.expect(Token::RightParen)?;
            Ok(Expression::Call(CallExpression {
                callee: Box::new(left),
                arguments,
                span: start.to(&end),
            }))
        }
        Token::LeftBracket => {
            parser.advance();
            let index = parse_expression(parser)?;
            let end = parser.current_span();
            parser.expect(Token::RightBracket)?;
            Ok(Expression::Index(IndexExpression {
                base: Box::new(left),
                index: Box::new(index),
                span: start.to(&end),
            }))
        }
        Token::Dot => {
            parser.advance();
            let end = parser.current_span();
            let field = parser.expect_identifier("field name")?;
            Ok(Expression::Member(MemberExpression {
                base: Box::new(left),
                field,
                span: start.to(&end),
            }))
        }
        Token::As => {
            parser.advance();
            let end = parser.current_span();
            let target = parser.expect_identifier("type name")?;
            Ok(Expression::Cast(CastExpression {
                operand: Box::new(left),
                target,
                span: start.to(&end),
            }))
        }
        Token::PlusPlus => postfix(parser, left, PostfixOperator::Increment, start),
        Token::MinusMinus => postfix(parser, left, PostfixOperator::Decrement, start),
        Token::QuestionQuestion => postfix(parser, left, PostfixOperator::Random, start),
        Token::ErrQuery => postfix(parser, left, PostfixOperator::ErrProbe, start),
        Token::ValQuery => postfix(parser, left, PostfixOperator::ValProbe, start),
        Token::LeftBrace => parse_match_braces(parser, Some(Box::new(left)), start),
        Token::DotDot | Token::Ellipsis | Token::DotDotLt => {
            let inclusive = !matches!(parser.current(), Token::DotDotLt);
            parser.advance();
            let end_expr = parse_with_precedence(parser, next_tighter(precedence))?;
            let span = start.to(end_expr.span());
            Ok(Expression::Range(RangeExpression {
                start: Box::new(left),
                end: Box::new(end_expr),
                inclusive,
                span,
            }))
        }
        token => {
            let operator = binary_operator(&token).ok_or_else(|| {
                ParseError::unexpected("operator", token.clone(), parser.current_span())
            })?;
            parser.advance();
            let min = if is_right_associative(&token) {
                precedence
            } else {
                next_tighter(precedence)
            };
            let right = parse_with_precedence(parser, min)?;
            let span = start.to(right.span());
            Ok(Expression::Binary(BinaryExpression {
                operator,
                left: Box::new(left),
                right: Box::new(right),
                span,
            }))
        }
    }
}

fn postfix(
    parser: &mut Parser,
    operand: Expression,
    operator: PostfixOperator,
    start: Span,
) -> Result<Expression, ParseError> {
    let end = parser.current_span();
    parser.advance();
    Ok(Expression::Postfix(PostfixExpression {
        operator,
        operand: Box::new(operand),
        span: start.to(&end),
    }))
}

fn next_tighter(precedence: Precedence) -> Precedence {
    match precedence {
        Precedence::None => Precedence::ParMap,
        Precedence::ParMap => Precedence::Or,
        Precedence::Or => Precedence::And,
        Precedence::And => Precedence::Comparison,
        Precedence::Comparison => Precedence::Range,
        Precedence::Range => Precedence::BitOr,
        Precedence::BitOr => Precedence::BitAnd,
        Precedence::BitAnd => Precedence::Shift,
        Precedence::Shift => Precedence::Additive,
        Precedence::Additive => Precedence::Multiplicative,
        Precedence::Multiplicative => Precedence::Power,
        Precedence::Power | Precedence::Unary => Precedence::Unary,
    }
}

fn binary_operator(token: &Token) -> Option<BinaryOperator> {
    Some(match token {
        Token::Plus => BinaryOperator::Add,
        Token::Minus => BinaryOperator::Sub,
        Token::Star => BinaryOperator::Mul,
        Token::Slash => BinaryOperator::Div,
        Token::Percent => BinaryOperator::Rem,
        Token::StarStar | Token::Caret => BinaryOperator::Pow,
        Token::StarPlus => BinaryOperator::MulAdd,
        Token::EqEq => BinaryOperator::Eq,
        Token::NotEq | Token::LtGt => BinaryOperator::Ne,
        Token::Lt => BinaryOperator::Lt,
        Token::Le => BinaryOperator::Le,
        Token::Gt => BinaryOperator::Gt,
        Token::Ge => BinaryOperator::Ge,
        Token::And | Token::AmpAmp => BinaryOperator::And,
        Token::Or => BinaryOperator::Or,
        Token::Xor => BinaryOperator::Xor,
        Token::OrBang => BinaryOperator::OrBang,
        Token::AndBang => BinaryOperator::AndBang,
        Token::ColonColon => BinaryOperator::Cons,
        Token::PipeB => BinaryOperator::BitOr,
        Token::AmpB => BinaryOperator::BitAnd,
        Token::CaretB => BinaryOperator::BitXor,
        Token::ShlB => BinaryOperator::Shl,
        Token::ShrB => BinaryOperator::Shr,
        Token::RolB => BinaryOperator::Rol,
        Token::RorB => BinaryOperator::Ror,
        Token::TestB => BinaryOperator::BitTest,
        Token::In => BinaryOperator::In,
        Token::Has => BinaryOperator::Has,
        Token::PipePipe => BinaryOperator::ParMap,
        _ => return None,
    })
}

fn parse_lambda_body(
    parser: &mut Parser,
    params: Vec<String>,
    start: Span,
) -> Result<Expression, ParseError> {
    let body = if parser.check(&Token::LeftBrace) && !parser.brace_holds_arms() {
        let block = stmt::parse_block(parser)?;
        LambdaBody::Block(block)
    } else if parser.check(&Token::LeftBrace) {
        // A brace body made of match arms is the lambda's single expression.
        let span = parser.current_span();
        LambdaBody::Expression(Box::new(parse_match_braces(parser, None, span)?))
    } else {
        LambdaBody::Expression(Box::new(parse_expression(parser)?))
    };
    let span = match &body {
        LambdaBody::Expression(e) => start.to(e.span()),
        LambdaBody::Block(b) => start.to(&b.span),
    };
    Ok(Expression::Lambda(LambdaExpression {
        params,
        body: Box::new(body),
        span,
    }))
}

/// Parse `{ guard => body … ~> default }`, with or without a subject.
pub(crate) fn parse_match_braces(
    parser: &mut Parser,
    subject: Option<Box<Expression>>,
    start: Span,
) -> Result<Expression, ParseError> {
    parser.expect(Token::LeftBrace)?;
    let mut arms = Vec::new();
    let mut default = None;

    loop {
        parser.skip_newlines();
        if parser.check(&Token::RightBrace) {
            break;
        }
        if parser.eat(&Token::DefaultArrow) {
            if default.is_some() {
                return Err(ParseError::invalid(
                    "duplicate '~>' default arm",
                    parser.current_span(),
                ));
            }
            default = Some(Box::new(parse_expression(parser)?));
            continue;
        }

        let arm_start = parser.current_span();
        let mut guards = vec![parse_expression(parser)?];
        while parser.eat(&Token::Pipe) {
            guards.push(parse_expression(parser)?);
        }
        parser.expect(Token::MatchArrow)?;
        let body = parse_expression(parser)?;
        let span = arm_start.to(body.span());
        arms.push(MatchArm { guards, body, span });
    }

    let end = parser.current_span();
    parser.expect(Token::RightBrace)?;
    Ok(Expression::Match(MatchExpression {
        subject,
        arms,
        default,
        span: start.to(&end),
    }))
}

/// Split an f-string body into literal and `{…}` interpolation parts.
fn split_fstring(raw: &str, span: Span) -> Result<Vec<FStringPart>, ParseError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '{' => {
                // `{{` escapes a literal brace.
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    literal.push('{');
                    continue;
                }
                let rest = &raw[i + 1..];
                let close = rest.find('}').ok_or_else(|| {
                    ParseError::invalid("unterminated '{' in f-string", span)
                })?;
                if !literal.is_empty() {
                    parts.push(FStringPart::Literal(std::mem::take(&mut literal)));
                }
                let inner = parse_expression_text(&rest[..close], span)?;
                parts.push(FStringPart::Interpolation(Box::new(inner)));
                // Skip up to and including the closing brace.
                while let Some((j, _)) = chars.next() {
                    if j == i + 1 + close {
                        break;
                    }
                }
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                }
                literal.push('}');
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() {
        parts.push(FStringPart::Literal(literal));
    }
    Ok(parts)
}
