//! The AST-to-machine-bytes emitter.
//!
//! One emitter exists per compile. It owns the text/rodata/data
//! buffers, the symbol and label tables, the patch lists, the stack-variable
//! maps and the pending-lambda queue, and drives everything through the
//! [`Isa`](crate::isa::Isa) trait of the selected backend.

mod call;
mod expr;
mod stmt;

use crate::buffer::{CodeBuf, DataBuf};
use crate::cheader::CHeaderMap;
use crate::error::EmitError;
use crate::isa::{backend_for, FloatReg, ForwardLabel, FramePatch, IntReg, Isa, FV};
use crate::reloc::{LabelTable, SymbolKind, SymbolTable};
use crate::runtime::{self, RuntimeFn};
use crate::target::{Arch, LinkStrategy, Os, Target};
use c67_parser::ast::*;
use c67_parser::Span;
use log::debug;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

/// Context-level configuration (the verbose flag is deliberately not a
/// process-wide global).
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitOptions {
    pub verbose: bool,
}

/// Coarse compile-time type tag; picks `+` overloads and print helpers.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueTy {
    Number,
    Str,
    List,
    Map,
    Lambda,
    Struct(String),
    Unknown,
}

#[derive(Debug, Clone)]
pub(crate) struct VarInfo {
    pub slot: i32,
    pub mutable: bool,
    pub ty: ValueTy,
    /// Set when the variable is known to hold this lambda; direct calls
    /// resolve to the label instead of an indirect call.
    pub lambda: Option<String>,
}

/// Per-loop bookkeeping: jump targets for `@`/`@@` and the slots the loop
/// metadata expressions read.
#[derive(Debug)]
pub(crate) struct LoopFrame {
    pub head: usize,
    pub continue_patches: Vec<ForwardLabel>,
    pub end_patches: Vec<ForwardLabel>,
    pub idx_slot: i32,
    pub bound_slot: i32,
    pub is_range: bool,
}

/// Per-function emission state.
pub(crate) struct Frame {
    pub name: String,
    pub vars: FxHashMap<String, VarInfo>,
    pub next_slot: i32,
    pub max_slot: i32,
    pub patch: FramePatch,
    pub defers: Vec<Vec<Expression>>,
    pub body_start: usize,
    pub params: Vec<String>,
    /// Variable the lambda was assigned to, for recursion resolution.
    pub bound_var: Option<String>,
    pub is_recursive: bool,
    pub is_main: bool,
    pub loops: Vec<LoopFrame>,
    /// Pending early-return jumps from `?`-suffixed assignments.
    pub propagate_exits: Vec<ForwardLabel>,
}

impl Frame {
    pub(crate) fn new(name: &str, is_main: bool) -> Self {
        Self {
            name: name.to_string(),
            vars: FxHashMap::default(),
            next_slot: 0,
            max_slot: 0,
            patch: FramePatch::default(),
            defers: vec![Vec::new()],
            body_start: 0,
            params: Vec::new(),
            bound_var: None,
            is_recursive: false,
            is_main,
            loops: Vec::new(),
            propagate_exits: Vec::new(),
        }
    }
}

/// A lambda waiting to be materialized after the main body (its label is
/// already referenced by the code that created it).
pub(crate) struct PendingLambda {
    pub label: String,
    pub params: Vec<String>,
    pub body: LambdaBody,
    pub bound_var: Option<String>,
}

/// A C-struct layout computed from a `cstruct` statement.
#[derive(Debug, Clone)]
pub(crate) struct CStructLayout {
    pub fields: FxHashMap<String, (u32, crate::isa::MemSize)>,
    pub size: u32,
}

/// One dynamic import. Order defines IAT/PLT/GOT index.
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub symbol: String,
    pub library: String,
}

/// Everything the container writers need: payload bytes, symbols, patch
/// records and the import list.
#[derive(Debug)]
pub struct Artifact {
    pub target: Target,
    pub strategy: LinkStrategy,
    pub text: CodeBuf,
    pub rodata: Vec<u8>,
    pub data: Vec<u8>,
    pub symbols: SymbolTable,
    pub entry: String,
    pub imports: Vec<Import>,
    pub libraries: Vec<String>,
}

pub(crate) struct Emitter<'a> {
    pub target: Target,
    pub strategy: LinkStrategy,
    pub isa: Box<dyn Isa>,
    pub text: CodeBuf,
    pub rodata: DataBuf,
    pub data: DataBuf,
    pub syms: SymbolTable,
    pub labels: LabelTable,
    interned: FxHashMap<Vec<u8>, String>,
    pub frames: Vec<Frame>,
    pub pending: VecDeque<PendingLambda>,
    lambda_count: u32,
    const_count: u32,
    pub arena_depth: u32,
    pub aliases: FxHashMap<String, String>,
    /// Namespace name/alias → logical library or header name.
    pub namespaces: FxHashMap<String, String>,
    pub class_methods: FxHashMap<String, String>,
    pub cstructs: FxHashMap<String, CStructLayout>,
    pub exports: Vec<String>,
    pub imports: Vec<Import>,
    pub libraries: Vec<String>,
    pub needed: Vec<RuntimeFn>,
    pub cheaders: &'a CHeaderMap,
    pub options: EmitOptions,
    /// Name being assigned while its value expression is emitted; lambdas
    /// read it to learn the variable they are bound to.
    pub current_bind: Option<String>,
    /// Label of the most recently materialized lambda expression, consumed
    /// by assignments to enable direct calls.
    pub last_lambda_label: Option<String>,
}

/// Compile a program for `target`, producing an unlinked [`Artifact`].
pub fn compile(
    program: &Program,
    target: Target,
    cheaders: &CHeaderMap,
    options: EmitOptions,
) -> Result<Artifact, EmitError> {
    if !target.is_supported() {
        return Err(EmitError::UnsupportedTarget(target));
    }

    let has_imports = program.statements.iter().any(|s| {
        matches!(
            s,
            Statement::Import(ImportStatement {
                kind: ImportKind::Library,
                ..
            })
        )
    });
    let strategy = match target.os {
        Os::Darwin | Os::Windows => LinkStrategy::Dynamic,
        Os::Linux if has_imports => {
            if target.arch != Arch::X86_64 {
                return Err(EmitError::Unsupported {
                    message: format!(
                        "dynamic linking is x86-64 only on Linux; {} cannot import libraries",
                        target
                    ),
                    line: 1,
                    column: 1,
                });
            }
            LinkStrategy::Dynamic
        }
        Os::Linux => LinkStrategy::Static,
    };
    debug!("compiling for {} ({:?})", target, strategy);

    let mut em = Emitter {
        target,
        strategy,
        isa: backend_for(target),
        text: CodeBuf::new(),
        rodata: DataBuf::new(),
        data: DataBuf::new(),
        syms: SymbolTable::new(),
        labels: LabelTable::new(),
        interned: FxHashMap::default(),
        frames: Vec::new(),
        pending: VecDeque::new(),
        lambda_count: 0,
        const_count: 0,
        arena_depth: 1,
        aliases: FxHashMap::default(),
        namespaces: FxHashMap::default(),
        class_methods: FxHashMap::default(),
        cstructs: FxHashMap::default(),
        exports: Vec::new(),
        imports: Vec::new(),
        libraries: Vec::new(),
        needed: Vec::new(),
        cheaders,
        options,
        current_bind: None,
        last_lambda_label: None,
    };

    if target.os == Os::Windows {
        // The C runtime backs printf/exit/malloc on PE.
        em.ensure_library("c");
    }
    if target.os == Os::Darwin {
        // Every Mach-O image links libSystem; dyld wants at least one
        // LC_LOAD_DYLIB.
        em.ensure_library("c");
    }

    em.emit_program(program)?;

    // Everything labeled becomes an addressable code symbol so the patch
    // phase resolves against one table.
    let mut label_list: Vec<(String, usize)> = em
        .labels
        .iter()
        .map(|(name, &off)| (name.clone(), off))
        .collect();
    label_list.sort_by_key(|&(_, off)| off);
    for (name, off) in label_list {
        em.syms.define(&name, SymbolKind::Code, off, 0)?;
    }

    Ok(Artifact {
        target,
        strategy,
        text: em.text,
        rodata: em.rodata.into_bytes(),
        data: em.data.into_bytes(),
        symbols: em.syms,
        entry: "_start".to_string(),
        imports: em.imports,
        libraries: em.libraries,
    })
}

impl<'a> Emitter<'a> {
    fn emit_program(&mut self, program: &Program) -> Result<(), EmitError> {
        self.labels.mark("_start", 0)?;
        self.frames.push(Frame::new("_start", true));
        let patch = self.isa.prologue(&mut self.text);
        self.frame_mut().patch = patch;
        self.frame_mut().body_start = self.text.offset();

        for statement in &program.statements {
            self.emit_statement(statement)?;
        }

        // Normal end of main: run deferred calls, then exit 0.
        self.emit_scope_defers_all()?;
        self.load_f64_const(FV, 0.0);
        self.emit_exit_value()?;

        // `?`-propagation from main exits with status 1.
        let exits = std::mem::take(&mut self.frame_mut().propagate_exits);
        if !exits.is_empty() {
            for label in exits {
                self.isa.bind(&mut self.text, label)?;
            }
            self.load_f64_const(FV, 1.0);
            self.emit_exit_value()?;
        }

        self.finish_frame()?;

        // Lambdas enqueue more lambdas; drain until quiet.
        while let Some(pending) = self.pending.pop_front() {
            self.emit_lambda(pending)?;
        }

        runtime::emit_runtime(self)?;
        Ok(())
    }

    fn emit_lambda(&mut self, pending: PendingLambda) -> Result<(), EmitError> {
        debug!("emitting lambda {}", pending.label);
        self.labels.mark(&pending.label, self.text.offset())?;
        let mut frame = Frame::new(&pending.label, false);
        frame.bound_var = pending.bound_var.clone();
        frame.params = pending.params.clone();
        self.frames.push(frame);
        let patch = self.isa.prologue(&mut self.text);
        self.frame_mut().patch = patch;

        for (i, param) in pending.params.iter().enumerate() {
            let slot = self.define_var(param, false, ValueTy::Unknown, None);
            self.isa.fstore_slot(&mut self.text, FloatReg(i as u8), slot);
        }
        // Tail calls re-enter here, after the parameter stores (tail
        // recursion: the frame is reused).
        self.frame_mut().body_start = self.text.offset();

        match &pending.body {
            LambdaBody::Expression(e) => {
                self.emit_expression(e)?;
            }
            LambdaBody::Block(block) => {
                for statement in &block.statements {
                    self.emit_statement(statement)?;
                }
                // Falling off the end returns 0.0.
                self.load_f64_const(FV, 0.0);
            }
        }
        self.emit_value_return()?;

        let exits = std::mem::take(&mut self.frame_mut().propagate_exits);
        if !exits.is_empty() {
            for label in exits {
                self.isa.bind(&mut self.text, label)?;
            }
            self.emit_scope_defers_all()?;
            self.load_nan(FV);
            let mut patch = std::mem::take(&mut self.frame_mut().patch);
            self.isa.epilogue(&mut self.text, &mut patch);
            self.frame_mut().patch = patch;
        }

        self.finish_frame()
    }

    /// Deferred calls, then the epilogue, preserving the value register.
    pub(crate) fn emit_value_return(&mut self) -> Result<(), EmitError> {
        if self.has_open_defers() {
            let slot = self.alloc_temp();
            self.isa.fstore_slot(&mut self.text, FV, slot);
            self.emit_scope_defers_all()?;
            self.isa.fload_slot(&mut self.text, FV, slot);
            self.free_temp(slot);
        }
        if self.frame().is_main {
            self.emit_exit_value()?;
        } else {
            let mut patch = std::mem::take(&mut self.frame_mut().patch);
            self.isa.epilogue(&mut self.text, &mut patch);
            self.frame_mut().patch = patch;
        }
        Ok(())
    }

    pub(crate) fn finish_frame(&mut self) -> Result<(), EmitError> {
        let frame = self.frames.pop().expect("frame underflow");
        let mut size = (frame.max_slot as u32 + 15) & !15;
        if self.target.arch == Arch::X86_64 {
            // Keep rsp 16-aligned at call sites: push rbp already moved it
            // by 8.
            size += 8;
        }
        self.isa
            .patch_frame_size(&mut self.text, &frame.patch, size)
            .map_err(|e| match e {
                EmitError::FrameTooLarge { .. } => EmitError::FrameTooLarge {
                    name: frame.name.clone(),
                },
                other => other,
            })
    }

    // ===== frames, slots, variables =====

    pub(crate) fn frame(&self) -> &Frame {
        self.frames.last().expect("no active frame")
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active frame")
    }

    pub(crate) fn alloc_slot(&mut self) -> i32 {
        let frame = self.frame_mut();
        let slot = frame.next_slot;
        frame.next_slot += 8;
        frame.max_slot = frame.max_slot.max(frame.next_slot);
        slot
    }

    /// Temporaries obey stack discipline; the watermark defines the frame.
    pub(crate) fn alloc_temp(&mut self) -> i32 {
        self.alloc_slot()
    }

    pub(crate) fn free_temp(&mut self, slot: i32) {
        let frame = self.frame_mut();
        debug_assert_eq!(frame.next_slot, slot + 8, "temp freed out of order");
        frame.next_slot = slot;
    }

    pub(crate) fn define_var(
        &mut self,
        name: &str,
        mutable: bool,
        ty: ValueTy,
        lambda: Option<String>,
    ) -> i32 {
        let slot = self.alloc_slot();
        self.frame_mut().vars.insert(
            name.to_string(),
            VarInfo {
                slot,
                mutable,
                ty,
                lambda,
            },
        );
        slot
    }

    pub(crate) fn resolve_name(&self, name: &str) -> String {
        let mut name = name;
        let mut hops = 0;
        while let Some(target) = self.aliases.get(name) {
            name = target;
            hops += 1;
            if hops > 16 {
                break;
            }
        }
        name.to_string()
    }

    pub(crate) fn lookup_var(&self, name: &str) -> Option<&VarInfo> {
        self.frame().vars.get(&self.resolve_name(name))
    }

    // ===== defers =====

    pub(crate) fn push_defer_scope(&mut self) {
        self.frame_mut().defers.push(Vec::new());
    }

    pub(crate) fn pop_defer_scope(&mut self) -> Result<(), EmitError> {
        let deferred = self.frame_mut().defers.pop().unwrap_or_default();
        for expr in deferred.iter().rev() {
            self.emit_expression(expr)?;
        }
        Ok(())
    }

    fn has_open_defers(&self) -> bool {
        self.frame().defers.iter().any(|scope| !scope.is_empty())
    }

    /// Run every open defer scope innermost-first (function exit paths).
    pub(crate) fn emit_scope_defers_all(&mut self) -> Result<(), EmitError> {
        let all: Vec<Expression> = self
            .frame()
            .defers
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev().cloned())
            .collect();
        for expr in &all {
            self.emit_expression(expr)?;
        }
        Ok(())
    }

    // ===== interning =====

    fn intern(&mut self, prefix: &str, bytes: Vec<u8>) -> String {
        if let Some(existing) = self.interned.get(&bytes) {
            return existing.clone();
        }
        let name = format!("{}_{}", prefix, self.const_count);
        self.const_count += 1;
        let offset = self.rodata.append(&bytes);
        self.syms
            .define(&name, SymbolKind::Rodata, offset, bytes.len())
            .expect("interned name is fresh");
        self.interned.insert(bytes, name.clone());
        name
    }

    /// Raw 8-byte IEEE-754 image.
    pub(crate) fn intern_f64(&mut self, value: f64) -> String {
        self.intern("dbl", value.to_le_bytes().to_vec())
    }

    /// Map-string payload: 8-byte length double, then (key, char-code)
    /// double pairs.
    pub(crate) fn intern_mapstring(&mut self, s: &str) -> String {
        let chars: Vec<char> = s.chars().collect();
        let mut bytes = Vec::with_capacity(8 + chars.len() * 16);
        bytes.extend_from_slice(&(chars.len() as f64).to_le_bytes());
        for (i, c) in chars.iter().enumerate() {
            bytes.extend_from_slice(&(i as f64).to_le_bytes());
            bytes.extend_from_slice(&(*c as u32 as f64).to_le_bytes());
        }
        self.intern("str", bytes)
    }

    /// Prebuilt list/map payload bytes (count prefix already included).
    pub(crate) fn intern_list_payload(&mut self, bytes: Vec<u8>) -> String {
        self.intern("list", bytes)
    }

    /// NUL-terminated raw bytes for syscalls and libc.
    pub(crate) fn intern_cstring(&mut self, s: &str) -> String {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.intern("cstr", bytes)
    }

    /// Zero-initialized writable global, defined once.
    pub(crate) fn ensure_data(&mut self, name: &str, size: usize) {
        if !self.syms.contains(name) {
            let offset = self.data.reserve_zeroed(size);
            self.syms
                .define(name, SymbolKind::Data, offset, size)
                .expect("data symbol is fresh");
        }
    }

    // ===== imports =====

    pub(crate) fn ensure_library(&mut self, library: &str) {
        if !self.libraries.iter().any(|l| l == library) {
            self.libraries.push(library.to_string());
        }
    }

    pub(crate) fn register_import(&mut self, symbol: &str, library: &str) {
        self.ensure_library(library);
        if !self.imports.iter().any(|i| i.symbol == symbol) {
            self.imports.push(Import {
                symbol: symbol.to_string(),
                library: library.to_string(),
            });
        }
    }

    // ===== runtime helpers =====

    pub(crate) fn need(&mut self, f: RuntimeFn) {
        if !self.needed.contains(&f) {
            self.needed.push(f);
        }
    }

    pub(crate) fn next_lambda_label(&mut self) -> String {
        let label = format!("lambda_{}", self.lambda_count);
        self.lambda_count += 1;
        label
    }

    // ===== small value loads =====

    pub(crate) fn load_f64_const(&mut self, dst: FloatReg, value: f64) {
        if value == value.trunc() && value.abs() < 9.0e15 {
            // Whole numbers go through the integer register.
            self.isa
                .mov_imm_to_reg(&mut self.text, IntReg::T0, value as i64);
            self.isa.cvt_int_to_f(&mut self.text, dst, IntReg::T0);
        } else {
            let sym = self.intern_f64(value);
            self.isa.lea_symbol(&mut self.text, IntReg::T0, &sym);
            self.isa.fload(&mut self.text, dst, IntReg::T0, 0);
        }
    }

    /// The quiet-NaN error sentinel.
    pub(crate) fn load_nan(&mut self, dst: FloatReg) {
        self.isa
            .mov_imm_to_reg(&mut self.text, IntReg::T0, 0x7FF8_0000_0000_0000u64 as i64);
        self.isa.bits_int_to_f(&mut self.text, dst, IntReg::T0);
    }

    /// Record the `"dv0"` tag readable through `.error`, then load NaN.
    pub(crate) fn emit_error_sentinel(&mut self, tag: &str) {
        self.ensure_data("_c67_last_error", 8);
        let tag_sym = self.intern_mapstring(tag);
        self.isa.lea_symbol(&mut self.text, IntReg::T0, &tag_sym);
        self.isa.lea_symbol(&mut self.text, IntReg::T1, "_c67_last_error");
        self.isa.store(
            &mut self.text,
            IntReg::T0,
            IntReg::T1,
            0,
            crate::isa::MemSize::B8,
        );
        self.load_nan(FV);
    }

    // ===== process exit =====

    /// Exit with the code currently in the value register.
    pub(crate) fn emit_exit_value(&mut self) -> Result<(), EmitError> {
        let arg0 = self.isa.int_arg(0);
        match (self.strategy, self.target.os) {
            (LinkStrategy::Static, Os::Linux) => {
                let arg = self.isa.sysarg(0);
                self.isa.cvt_f_to_int(&mut self.text, arg, FV);
                let nr = syscall_nr(self.target.arch, Os::Linux, Sys::Exit);
                self.isa.mov_imm_to_reg(&mut self.text, IntReg::SysNum, nr);
                self.isa.syscall(&mut self.text);
            }
            (_, Os::Darwin) => {
                let arg = self.isa.sysarg(0);
                self.isa.cvt_f_to_int(&mut self.text, arg, FV);
                self.isa
                    .mov_imm_to_reg(&mut self.text, IntReg::SysNum, 1);
                self.isa.syscall(&mut self.text);
            }
            (_, Os::Windows) => {
                self.isa.cvt_f_to_int(&mut self.text, arg0, FV);
                self.register_import("exit", "c");
                self.emit_win_call_import("exit");
            }
            (LinkStrategy::Dynamic, Os::Linux) => {
                // libc exit flushes stdio before terminating.
                self.isa.cvt_f_to_int(&mut self.text, arg0, FV);
                self.register_import("exit", "c");
                self.isa.call_import(&mut self.text, "exit");
            }
            (LinkStrategy::Static, _) => unreachable!("static non-linux"),
        }
        Ok(())
    }

    /// Windows import call with the 32-byte shadow-space dance.
    pub(crate) fn emit_win_call_import(&mut self, symbol: &str) {
        self.isa.add_imm(&mut self.text, IntReg::Sp, -32);
        self.isa.call_import(&mut self.text, symbol);
        self.isa.add_imm(&mut self.text, IntReg::Sp, 32);
    }

    pub(crate) fn err_at(&self, message: impl Into<String>, span: &Span) -> EmitError {
        EmitError::Unsupported {
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }
}

/// Kernel call selector used by the emitter and the runtime helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Sys {
    Write,
    Exit,
    Getpid,
    Mmap,
    GetRandom,
}

pub(crate) fn syscall_nr(arch: Arch, os: Os, which: Sys) -> i64 {
    match os {
        Os::Linux => match (arch, which) {
            (Arch::X86_64, Sys::Write) => 1,
            (Arch::X86_64, Sys::Exit) => 60,
            (Arch::X86_64, Sys::Getpid) => 39,
            (Arch::X86_64, Sys::Mmap) => 9,
            (Arch::X86_64, Sys::GetRandom) => 318,
            (_, Sys::Write) => 64,
            (_, Sys::Exit) => 93,
            (_, Sys::Getpid) => 172,
            (_, Sys::Mmap) => 222,
            (_, Sys::GetRandom) => 278,
        },
        Os::Darwin => match which {
            Sys::Write => 4,
            Sys::Exit => 1,
            Sys::Getpid => 20,
            Sys::Mmap => 197,
            Sys::GetRandom => 500, // getentropy
        },
        Os::Windows => unreachable!("no raw syscalls on windows"),
    }
}
