//! Statement AST nodes.

use super::{Block, Expression, LambdaExpression};
use crate::token::Span;

/// Statement (leaves the value register in an unspecified state).
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(ExpressionStatement),
    Assign(AssignStatement),
    Loop(LoopStatement),
    /// `ret expr?` — return from the enclosing lambda / exit from main
    Ret(RetStatement),
    /// `@` — jump to the innermost loop's continue point
    Continue(ContinueStatement),
    /// `@@` — jump past the innermost loop's end
    Break(BreakStatement),
    /// `@++` — bump the innermost loop's index without jumping
    LoopBump(LoopBumpStatement),
    Arena(ArenaStatement),
    Defer(DeferStatement),
    Spawn(SpawnStatement),
    Unsafe(UnsafeStatement),
    Syscall(SyscallStatement),
    Cstruct(CstructStatement),
    Class(ClassStatement),
    Alias(AliasStatement),
    Import(ImportStatement),
    Export(ExportStatement),
}

impl Statement {
    pub fn span(&self) -> &Span {
        match self {
            Statement::Expression(s) => &s.span,
            Statement::Assign(s) => &s.span,
            Statement::Loop(s) => &s.span,
            Statement::Ret(s) => &s.span,
            Statement::Continue(s) => &s.span,
            Statement::Break(s) => &s.span,
            Statement::LoopBump(s) => &s.span,
            Statement::Arena(s) => &s.span,
            Statement::Defer(s) => &s.span,
            Statement::Spawn(s) => &s.span,
            Statement::Unsafe(s) => &s.span,
            Statement::Syscall(s) => &s.span,
            Statement::Cstruct(s) => &s.span,
            Statement::Class(s) => &s.span,
            Statement::Alias(s) => &s.span,
            Statement::Import(s) => &s.span,
            Statement::Export(s) => &s.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionStatement {
    pub expression: Expression,
    pub span: Span,
}

/// The three assignment shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=` — define a new immutable (may shadow) or update an existing mutable
    Assign,
    /// `:=` — introduce a new mutable; error if the name exists
    Declare,
    /// `<-` — update an existing mutable; error otherwise
    Update,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    Name(String),
    Index {
        base: Box<Expression>,
        index: Box<Expression>,
    },
    Member {
        base: Box<Expression>,
        field: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStatement {
    pub target: AssignTarget,
    pub op: AssignOp,
    /// `?`-suffixed shape: a sentinel value returns from the enclosing scope.
    pub propagate: bool,
    /// `shadow x = …` bypasses the immutable-redefinition check.
    pub shadow: bool,
    pub value: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopMax {
    Count(f64),
    Inf,
}

/// `@ x in iterable max n { … }`
#[derive(Debug, Clone, PartialEq)]
pub struct LoopStatement {
    pub binding: String,
    pub iterable: Expression,
    pub max: Option<LoopMax>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetStatement {
    pub value: Option<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContinueStatement {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakStatement {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopBumpStatement {
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArenaStatement {
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeferStatement {
    pub call: Expression,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnStatement {
    pub task: Expression,
    pub span: Span,
}

/// Architecture tag on an `unsafe` sub-body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsafeArch {
    X86_64,
    Arm64,
    Riscv64,
}

/// Memory operand width inside unsafe bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmWidth {
    U8,
    U16,
    U32,
    U64,
}

/// One raw instruction inside an `unsafe` sub-body. Register names are the
/// target's own (`rax`, `x0`, `a0`, …) or the portable aliases `a`..`f`.
#[derive(Debug, Clone, PartialEq)]
pub enum AsmStatement {
    /// `reg <- imm`
    RegImm { dst: String, value: i64 },
    /// `reg <- reg`
    RegReg { dst: String, src: String },
    /// `dst <- u32 [base + off]`
    Load {
        dst: String,
        base: String,
        offset: i32,
        width: AsmWidth,
    },
    /// `u8 [base + off] <- src`
    Store {
        src: String,
        base: String,
        offset: i32,
        width: AsmWidth,
    },
    /// raw `syscall`
    Syscall,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsafeStatement {
    pub bodies: Vec<(UnsafeArch, Vec<AsmStatement>)>,
    pub span: Span,
}

/// `syscall(n, a, b, …)` outside an unsafe block.
#[derive(Debug, Clone, PartialEq)]
pub struct SyscallStatement {
    pub arguments: Vec<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CstructField {
    pub name: String,
    pub ty: String,
}

/// `cstruct Name packed { field: u32, … }`
#[derive(Debug, Clone, PartialEq)]
pub struct CstructStatement {
    pub name: String,
    pub packed: bool,
    pub aligned: Option<u32>,
    pub fields: Vec<CstructField>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassStatement {
    pub name: String,
    pub methods: Vec<(String, LambdaExpression)>,
    pub span: Span,
}

/// `alias new = old`
#[derive(Debug, Clone, PartialEq)]
pub struct AliasStatement {
    pub new_name: String,
    pub target: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import foo` — dynamic library
    Library,
    /// `use foo` — C header constant namespace
    Header,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportStatement {
    pub name: String,
    pub alias: Option<String>,
    pub kind: ImportKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportStatement {
    pub name: String,
    pub span: Span,
}
