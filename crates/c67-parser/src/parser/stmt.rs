//! Statement parsing.

use super::expr::parse_expression;
use super::{ParseError, Parser};
use crate::ast::*;
use crate::token::{Span, Token};

pub fn parse_statement(parser: &mut Parser) -> Result<Statement, ParseError> {
    let span = parser.current_span();

    match parser.current().clone() {
        Token::Ret => {
            parser.advance();
            let value = if parser.current().ends_statement() {
                None
            } else {
                Some(parse_expression(parser)?)
            };
            parser.expect_statement_end()?;
            Ok(Statement::Ret(RetStatement { value, span }))
        }
        Token::At => {
            if matches!(parser.peek(1), Token::Identifier(_)) && matches!(parser.peek(2), Token::In)
            {
                parse_loop(parser, span)
            } else {
                parser.advance();
                parser.expect_statement_end()?;
                Ok(Statement::Continue(ContinueStatement { span }))
            }
        }
        Token::AtAt => {
            parser.advance();
            parser.expect_statement_end()?;
            Ok(Statement::Break(BreakStatement { span }))
        }
        Token::AtInc => {
            parser.advance();
            parser.expect_statement_end()?;
            Ok(Statement::LoopBump(LoopBumpStatement { span }))
        }
        Token::Arena => {
            parser.advance();
            let body = parse_block(parser)?;
            Ok(Statement::Arena(ArenaStatement { body, span }))
        }
        Token::Defer => {
            parser.advance();
            let call = parse_expression(parser)?;
            parser.expect_statement_end()?;
            Ok(Statement::Defer(DeferStatement { call, span }))
        }
        Token::Spawn => {
            parser.advance();
            let task = parse_expression(parser)?;
            parser.expect_statement_end()?;
            Ok(Statement::Spawn(SpawnStatement { task, span }))
        }
        Token::Unsafe => parse_unsafe(parser, span),
        Token::Syscall => {
            parser.advance();
            parser.expect(Token::LeftParen)?;
            let mut arguments = Vec::new();
            while !parser.check(&Token::RightParen) {
                arguments.push(parse_expression(parser)?);
                if !parser.eat(&Token::Comma) {
                    break;
                }
            }
            parser.expect(Token::RightParen)?;
            parser.expect_statement_end()?;
            Ok(Statement::Syscall(SyscallStatement { arguments, span }))
        }
        Token::Cstruct => parse_cstruct(parser, span),
        Token::Class => parse_class(parser, span),
        Token::Alias => {
            parser.advance();
            let new_name = parser.expect_identifier("alias name")?;
            parser.expect(Token::Assign)?;
            let target = parser.expect_identifier("alias target")?;
            parser.expect_statement_end()?;
            Ok(Statement::Alias(AliasStatement {
                new_name,
                target,
                span,
            }))
        }
        Token::Import | Token::Use => {
            let kind = if matches!(parser.current(), Token::Use) {
                ImportKind::Header
            } else {
                ImportKind::Library
            };
            parser.advance();
            let name = parser.expect_identifier("library name")?;
            let alias = if parser.eat(&Token::As) {
                Some(parser.expect_identifier("alias")?)
            } else {
                None
            };
            parser.expect_statement_end()?;
            Ok(Statement::Import(ImportStatement {
                name,
                alias,
                kind,
                span,
            }))
        }
        Token::Export => {
            parser.advance();
            let name = parser.expect_identifier("export name")?;
            parser.expect_statement_end()?;
            Ok(Statement::Export(ExportStatement { name, span }))
        }
        Token::Shadow => {
            parser.advance();
            let name = parser.expect_identifier("variable name")?;
            parser.expect(Token::Assign)?;
            let value = parse_expression(parser)?;
            parser.expect_statement_end()?;
            Ok(Statement::Assign(AssignStatement {
                target: AssignTarget::Name(name),
                op: AssignOp::Assign,
                propagate: false,
                shadow: true,
                value,
                span,
            }))
        }
        _ => parse_expression_or_assignment(parser, span),
    }
}

fn parse_expression_or_assignment(
    parser: &mut Parser,
    span: Span,
) -> Result<Statement, ParseError> {
    let expr = parse_expression(parser)?;

    // A `guard => body` sequence at statement level is a subject-less match.
    if matches!(parser.current(), Token::MatchArrow | Token::Pipe) {
        return parse_guard_match(parser, expr, span);
    }

    let (op, propagate) = match parser.current() {
        Token::Assign => (AssignOp::Assign, false),
        Token::AssignTry => (AssignOp::Assign, true),
        Token::Declare => (AssignOp::Declare, false),
        Token::DeclareTry => (AssignOp::Declare, true),
        Token::Update => (AssignOp::Update, false),
        Token::UpdateTry => (AssignOp::Update, true),
        _ => {
            parser.expect_statement_end()?;
            return Ok(Statement::Expression(ExpressionStatement {
                expression: expr,
                span,
            }));
        }
    };
    parser.advance();

    let target = match expr {
        Expression::Identifier(ident) => AssignTarget::Name(ident.name),
        Expression::Index(ix) => AssignTarget::Index {
            base: ix.base,
            index: ix.index,
        },
        Expression::Member(m) => AssignTarget::Member {
            base: m.base,
            field: m.field,
        },
        other => {
            return Err(ParseError::invalid(
                "invalid assignment target",
                *other.span(),
            ))
        }
    };
    let value = parse_expression(parser)?;
    parser.expect_statement_end()?;
    Ok(Statement::Assign(AssignStatement {
        target,
        op,
        propagate,
        shadow: false,
        value,
        span,
    }))
}

/// Collect `guard => body` arms (and the `~>` default) that follow an
/// already-parsed first guard.
fn parse_guard_match(
    parser: &mut Parser,
    first_guard: Expression,
    span: Span,
) -> Result<Statement, ParseError> {
    let mut arms = Vec::new();
    let mut default = None;

    let mut guards = vec![first_guard];
    while parser.eat(&Token::Pipe) {
        guards.push(parse_expression(parser)?);
    }
    parser.expect(Token::MatchArrow)?;
    let body = parse_expression(parser)?;
    let arm_span = span.to(body.span());
    arms.push(MatchArm {
        guards,
        body,
        span: arm_span,
    });

    loop {
        // Arms may continue on the same line or on following lines.
        while matches!(parser.current(), Token::Newline | Token::Semicolon) {
            parser.advance();
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
        if !line_holds_arrow(parser) {
            break;
        }
        let arm_start = parser.current_span();
        let mut guards = vec![parse_expression(parser)?];
        while parser.eat(&Token::Pipe) {
            guards.push(parse_expression(parser)?);
        }
        parser.expect(Token::MatchArrow)?;
        let body = parse_expression(parser)?;
        let arm_span = arm_start.to(body.span());
        arms.push(MatchArm {
            guards,
            body,
            span: arm_span,
        });
    }

    Ok(Statement::Expression(ExpressionStatement {
        expression: Expression::Match(MatchExpression {
            subject: None,
            arms,
            default,
            span,
        }),
        span,
    }))
}

/// Does the current statement line contain a `=>` before it ends?
fn line_holds_arrow(parser: &Parser) -> bool {
    let mut depth = 0usize;
    let mut i = 0usize;
    loop {
        match parser.peek(i) {
            Token::LeftBrace | Token::LeftParen | Token::LeftBracket => depth += 1,
            Token::RightParen | Token::RightBracket => depth = depth.saturating_sub(1),
            Token::RightBrace => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Token::MatchArrow if depth == 0 => return true,
            Token::Newline | Token::Eof => return false,
            _ => {}
        }
        i += 1;
    }
}

fn parse_loop(parser: &mut Parser, span: Span) -> Result<Statement, ParseError> {
    parser.advance(); // @
    let binding = parser.expect_identifier("loop variable")?;
    parser.expect(Token::In)?;

    let saved = parser.no_match_braces;
    parser.no_match_braces = true;
    let iterable = parse_expression(parser);
    parser.no_match_braces = saved;
    let iterable = iterable?;

    let max = if parser.eat(&Token::Max) {
        match parser.current().clone() {
            Token::Inf => {
                parser.advance();
                Some(LoopMax::Inf)
            }
            Token::Number(n) => {
                parser.advance();
                Some(LoopMax::Count(n))
            }
            found => {
                return Err(ParseError::unexpected(
                    "iteration cap (number or 'inf')",
                    found,
                    parser.current_span(),
                ))
            }
        }
    } else {
        None
    };

    let body = parse_block(parser)?;
    Ok(Statement::Loop(LoopStatement {
        binding,
        iterable,
        max,
        body,
        span,
    }))
}

pub fn parse_block(parser: &mut Parser) -> Result<Block, ParseError> {
    let start = parser.current_span();
    parser.expect(Token::LeftBrace)?;
    let mut statements = Vec::new();
    parser.skip_newlines();
    while !parser.check(&Token::RightBrace) && !parser.at_end() {
        statements.push(parse_statement(parser)?);
        parser.skip_newlines();
    }
    let end = parser.current_span();
    parser.expect(Token::RightBrace)?;
    Ok(Block {
        statements,
        span: start.to(&end),
    })
}

fn parse_unsafe(parser: &mut Parser, span: Span) -> Result<Statement, ParseError> {
    parser.advance(); // unsafe
    parser.expect(Token::LeftBrace)?;
    let mut bodies = Vec::new();

    loop {
        parser.skip_newlines();
        if parser.check(&Token::RightBrace) {
            break;
        }
        let tag_span = parser.current_span();
        let tag = parser.expect_identifier("architecture tag")?;
        let arch = match tag.as_str() {
            "x86" | "x86_64" | "amd64" => UnsafeArch::X86_64,
            "arm64" | "aarch64" => UnsafeArch::Arm64,
            "riscv" | "riscv64" => UnsafeArch::Riscv64,
            other => {
                return Err(ParseError::invalid(
                    format!("unknown architecture tag '{}'", other),
                    tag_span,
                ))
            }
        };
        bodies.push((arch, parse_asm_block(parser)?));
    }
    parser.expect(Token::RightBrace)?;
    parser.expect_statement_end()?;
    Ok(Statement::Unsafe(UnsafeStatement { bodies, span }))
}

fn asm_width(name: &str) -> Option<AsmWidth> {
    Some(match name {
        "u8" | "i8" => AsmWidth::U8,
        "u16" | "i16" => AsmWidth::U16,
        "u32" | "i32" => AsmWidth::U32,
        "u64" | "i64" => AsmWidth::U64,
        _ => return None,
    })
}

fn parse_asm_block(parser: &mut Parser) -> Result<Vec<AsmStatement>, ParseError> {
    parser.expect(Token::LeftBrace)?;
    let mut out = Vec::new();

    loop {
        parser.skip_newlines();
        if parser.check(&Token::RightBrace) {
            break;
        }
        match parser.current().clone() {
            Token::Syscall => {
                parser.advance();
                out.push(AsmStatement::Syscall);
            }
            Token::LeftBracket => {
                let (base, offset) = parse_asm_mem(parser)?;
                parser.expect(Token::Update)?;
                let src = parser.expect_identifier("source register")?;
                out.push(AsmStatement::Store {
                    src,
                    base,
                    offset,
                    width: AsmWidth::U64,
                });
            }
            Token::Identifier(first) => {
                // `u8 [base] <- src` sized store
                if let Some(width) = asm_width(&first) {
                    if matches!(parser.peek(1), Token::LeftBracket) {
                        parser.advance();
                        let (base, offset) = parse_asm_mem(parser)?;
                        parser.expect(Token::Update)?;
                        let src = parser.expect_identifier("source register")?;
                        out.push(AsmStatement::Store {
                            src,
                            base,
                            offset,
                            width,
                        });
                        continue;
                    }
                }
                parser.advance();
                parser.expect(Token::Update)?;
                match parser.current().clone() {
                    Token::Number(n) => {
                        parser.advance();
                        out.push(AsmStatement::RegImm {
                            dst: first,
                            value: n as i64,
                        });
                    }
                    Token::Minus => {
                        parser.advance();
                        let span = parser.current_span();
                        match parser.advance() {
                            Token::Number(n) => out.push(AsmStatement::RegImm {
                                dst: first,
                                value: -(n as i64),
                            }),
                            found => {
                                return Err(ParseError::unexpected("immediate", found, span))
                            }
                        }
                    }
                    Token::LeftBracket => {
                        let (base, offset) = parse_asm_mem(parser)?;
                        out.push(AsmStatement::Load {
                            dst: first,
                            base,
                            offset,
                            width: AsmWidth::U64,
                        });
                    }
                    Token::Identifier(name) => {
                        if let Some(width) = asm_width(&name) {
                            parser.advance();
                            let (base, offset) = parse_asm_mem(parser)?;
                            out.push(AsmStatement::Load {
                                dst: first,
                                base,
                                offset,
                                width,
                            });
                        } else {
                            parser.advance();
                            out.push(AsmStatement::RegReg {
                                dst: first,
                                src: name,
                            });
                        }
                    }
                    found => {
                        return Err(ParseError::unexpected(
                            "immediate, register or memory operand",
                            found,
                            parser.current_span(),
                        ))
                    }
                }
            }
            found => {
                return Err(ParseError::unexpected(
                    "unsafe-block instruction",
                    found,
                    parser.current_span(),
                ))
            }
        }
        parser.skip_newlines();
    }
    parser.expect(Token::RightBrace)?;
    Ok(out)
}

/// `[base]`, `[base + n]`, `[base - n]`
fn parse_asm_mem(parser: &mut Parser) -> Result<(String, i32), ParseError> {
    parser.expect(Token::LeftBracket)?;
    let base = parser.expect_identifier("base register")?;
    let mut offset = 0i32;
    if parser.eat(&Token::Plus) {
        if let Token::Number(n) = parser.current().clone() {
            parser.advance();
            offset = n as i32;
        }
    } else if parser.eat(&Token::Minus) {
        if let Token::Number(n) = parser.current().clone() {
            parser.advance();
            offset = -(n as i32);
        }
    }
    parser.expect(Token::RightBracket)?;
    Ok((base, offset))
}

fn parse_cstruct(parser: &mut Parser, span: Span) -> Result<Statement, ParseError> {
    parser.advance(); // cstruct
    let name = parser.expect_identifier("cstruct name")?;
    let mut packed = false;
    let mut aligned = None;

    loop {
        match parser.current() {
            Token::Packed => {
                parser.advance();
                packed = true;
            }
            Token::Aligned => {
                parser.advance();
                parser.expect(Token::LeftParen)?;
                match parser.current().clone() {
                    Token::Number(n) => {
                        parser.advance();
                        aligned = Some(n as u32);
                    }
                    found => {
                        return Err(ParseError::unexpected(
                            "alignment",
                            found,
                            parser.current_span(),
                        ))
                    }
                }
                parser.expect(Token::RightParen)?;
            }
            _ => break,
        }
    }

    parser.expect(Token::LeftBrace)?;
    let mut fields = Vec::new();
    parser.skip_newlines();
    while !parser.check(&Token::RightBrace) {
        let fname = parser.expect_identifier("field name")?;
        parser.expect(Token::Colon)?;
        let ty = parser.expect_identifier("field type")?;
        fields.push(CstructField { name: fname, ty });
        if !parser.eat(&Token::Comma) {
            parser.skip_newlines();
            if parser.check(&Token::RightBrace) {
                break;
            }
        } else {
            parser.skip_newlines();
        }
    }
    parser.expect(Token::RightBrace)?;
    parser.expect_statement_end()?;
    Ok(Statement::Cstruct(CstructStatement {
        name,
        packed,
        aligned,
        fields,
        span,
    }))
}

fn parse_class(parser: &mut Parser, span: Span) -> Result<Statement, ParseError> {
    parser.advance(); // class
    let name = parser.expect_identifier("class name")?;
    parser.expect(Token::LeftBrace)?;
    let mut methods = Vec::new();
    parser.skip_newlines();
    while !parser.check(&Token::RightBrace) {
        let method_span = parser.current_span();
        let mname = parser.expect_identifier("method name")?;
        parser.expect(Token::Assign)?;
        match parse_expression(parser)? {
            Expression::Lambda(lambda) => methods.push((mname, lambda)),
            other => {
                return Err(ParseError::invalid(
                    "class members must be lambdas",
                    *other.span(),
                ))
            }
        }
        let _ = method_span;
        parser.skip_newlines();
    }
    parser.expect(Token::RightBrace)?;
    parser.expect_statement_end()?;
    Ok(Statement::Class(ClassStatement {
        name,
        methods,
        span,
    }))
}
