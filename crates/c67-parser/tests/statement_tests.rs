//! Tests for statement parsing.

use c67_parser::ast::*;
use c67_parser::parser::Parser;

fn parse(source: &str) -> Program {
    Parser::new(source).unwrap().parse().unwrap()
}

#[test]
fn test_assignment_shapes() {
    let program = parse("a = 1\nb := 2\nb <- 3");
    match &program.statements[0] {
        Statement::Assign(s) => {
            assert_eq!(s.op, AssignOp::Assign);
            assert!(!s.propagate);
        }
        other => panic!("expected assign, got {:?}", other),
    }
    match &program.statements[1] {
        Statement::Assign(s) => assert_eq!(s.op, AssignOp::Declare),
        other => panic!("expected declare, got {:?}", other),
    }
    match &program.statements[2] {
        Statement::Assign(s) => assert_eq!(s.op, AssignOp::Update),
        other => panic!("expected update, got {:?}", other),
    }
}

#[test]
fn test_propagating_assignment() {
    let program = parse("x =? risky()");
    match &program.statements[0] {
        Statement::Assign(s) => {
            assert_eq!(s.op, AssignOp::Assign);
            assert!(s.propagate);
        }
        other => panic!("expected assign, got {:?}", other),
    }
}

#[test]
fn test_shadow_assignment() {
    let program = parse("shadow x = 7");
    match &program.statements[0] {
        Statement::Assign(s) => assert!(s.shadow),
        other => panic!("expected assign, got {:?}", other),
    }
}

#[test]
fn test_index_assignment_target() {
    let program = parse("xs[0] <- 5");
    match &program.statements[0] {
        Statement::Assign(s) => assert!(matches!(s.target, AssignTarget::Index { .. })),
        other => panic!("expected assign, got {:?}", other),
    }
}

#[test]
fn test_range_loop() {
    let program = parse("@ i in 0 ..< 10 { println(i) }");
    match &program.statements[0] {
        Statement::Loop(l) => {
            assert_eq!(l.binding, "i");
            assert!(matches!(l.iterable, Expression::Range(_)));
            assert!(l.max.is_none());
            assert_eq!(l.body.statements.len(), 1);
        }
        other => panic!("expected loop, got {:?}", other),
    }
}

#[test]
fn test_loop_with_max() {
    let program = parse("@ x in xs max 100 { x }");
    match &program.statements[0] {
        Statement::Loop(l) => assert_eq!(l.max, Some(LoopMax::Count(100.0))),
        other => panic!("expected loop, got {:?}", other),
    }
    let program = parse("@ x in xs max inf { x }");
    match &program.statements[0] {
        Statement::Loop(l) => assert_eq!(l.max, Some(LoopMax::Inf)),
        other => panic!("expected loop, got {:?}", other),
    }
}

#[test]
fn test_loop_jumps() {
    let program = parse("@ i in 0 .. 9 {\n @\n @@\n @++\n }");
    match &program.statements[0] {
        Statement::Loop(l) => {
            assert!(matches!(l.body.statements[0], Statement::Continue(_)));
            assert!(matches!(l.body.statements[1], Statement::Break(_)));
            assert!(matches!(l.body.statements[2], Statement::LoopBump(_)));
        }
        other => panic!("expected loop, got {:?}", other),
    }
}

#[test]
fn test_ret_with_and_without_value() {
    let program = parse("ret 42");
    match &program.statements[0] {
        Statement::Ret(r) => assert!(r.value.is_some()),
        other => panic!("expected ret, got {:?}", other),
    }
    let program = parse("ret");
    match &program.statements[0] {
        Statement::Ret(r) => assert!(r.value.is_none()),
        other => panic!("expected ret, got {:?}", other),
    }
}

#[test]
fn test_arena_and_defer() {
    let program = parse("arena {\n defer close(f)\n work()\n }");
    match &program.statements[0] {
        Statement::Arena(a) => {
            assert!(matches!(a.body.statements[0], Statement::Defer(_)));
            assert!(matches!(a.body.statements[1], Statement::Expression(_)));
        }
        other => panic!("expected arena, got {:?}", other),
    }
}

#[test]
fn test_spawn() {
    let program = parse("spawn worker()");
    assert!(matches!(program.statements[0], Statement::Spawn(_)));
}

#[test]
fn test_unsafe_block() {
    let source = "unsafe {\n arm64 {\n x8 <- 93\n x0 <- 0\n syscall\n }\n x86 {\n rax <- 60\n syscall\n }\n }";
    let program = parse(source);
    match &program.statements[0] {
        Statement::Unsafe(u) => {
            assert_eq!(u.bodies.len(), 2);
            let (arch, ops) = &u.bodies[0];
            assert_eq!(*arch, UnsafeArch::Arm64);
            assert_eq!(
                ops[0],
                AsmStatement::RegImm {
                    dst: "x8".into(),
                    value: 93
                }
            );
            assert_eq!(ops[2], AsmStatement::Syscall);
            assert_eq!(u.bodies[1].0, UnsafeArch::X86_64);
        }
        other => panic!("expected unsafe, got {:?}", other),
    }
}

#[test]
fn test_unsafe_sized_memory_ops() {
    let source = "unsafe {\n arm64 {\n x0 <- u32 [x1 + 8]\n u8 [x2] <- x0\n }\n }";
    let program = parse(source);
    match &program.statements[0] {
        Statement::Unsafe(u) => {
            let ops = &u.bodies[0].1;
            assert_eq!(
                ops[0],
                AsmStatement::Load {
                    dst: "x0".into(),
                    base: "x1".into(),
                    offset: 8,
                    width: AsmWidth::U32
                }
            );
            assert_eq!(
                ops[1],
                AsmStatement::Store {
                    src: "x0".into(),
                    base: "x2".into(),
                    offset: 0,
                    width: AsmWidth::U8
                }
            );
        }
        other => panic!("expected unsafe, got {:?}", other),
    }
}

#[test]
fn test_syscall_statement() {
    let program = parse("syscall(60, 0)");
    match &program.statements[0] {
        Statement::Syscall(s) => assert_eq!(s.arguments.len(), 2),
        other => panic!("expected syscall, got {:?}", other),
    }
}

#[test]
fn test_cstruct() {
    let program = parse("cstruct Point packed { x: i32, y: i32 }");
    match &program.statements[0] {
        Statement::Cstruct(c) => {
            assert_eq!(c.name, "Point");
            assert!(c.packed);
            assert_eq!(c.fields.len(), 2);
            assert_eq!(c.fields[1].ty, "i32");
        }
        other => panic!("expected cstruct, got {:?}", other),
    }
}

#[test]
fn test_cstruct_aligned() {
    let program = parse("cstruct Page aligned(16) { data: u64 }");
    match &program.statements[0] {
        Statement::Cstruct(c) => assert_eq!(c.aligned, Some(16)),
        other => panic!("expected cstruct, got {:?}", other),
    }
}

#[test]
fn test_class_with_methods() {
    let program = parse("class Vec {\n len = (v) -> v.n\n }");
    match &program.statements[0] {
        Statement::Class(c) => {
            assert_eq!(c.name, "Vec");
            assert_eq!(c.methods.len(), 1);
            assert_eq!(c.methods[0].0, "len");
        }
        other => panic!("expected class, got {:?}", other),
    }
}

#[test]
fn test_alias_import_export() {
    let program = parse("alias put = println\nimport sdl2 as sdl\nuse posix\nexport main");
    assert!(matches!(program.statements[0], Statement::Alias(_)));
    match &program.statements[1] {
        Statement::Import(i) => {
            assert_eq!(i.kind, ImportKind::Library);
            assert_eq!(i.alias.as_deref(), Some("sdl"));
        }
        other => panic!("expected import, got {:?}", other),
    }
    match &program.statements[2] {
        Statement::Import(i) => assert_eq!(i.kind, ImportKind::Header),
        other => panic!("expected use, got {:?}", other),
    }
    assert!(matches!(program.statements[3], Statement::Export(_)));
}

#[test]
fn test_statement_level_guard_match() {
    let program = parse("x > 3 => big()\n~> small()");
    match &program.statements[0] {
        Statement::Expression(s) => match &s.expression {
            Expression::Match(m) => {
                assert!(m.subject.is_none());
                assert_eq!(m.arms.len(), 1);
                assert!(m.default.is_some());
            }
            other => panic!("expected match, got {:?}", other),
        },
        other => panic!("expected expression statement, got {:?}", other),
    }
}
