//! Call emission: builtins, FFI through captured C signatures, direct and
//! indirect lambda calls, and `me` tail recursion.

use super::{syscall_nr, Emitter, PendingLambda, Sys, ValueTy};
use crate::cheader::{CSignature, CType};
use crate::error::EmitError;
use crate::isa::{FloatReg, IntReg, MemSize, FV};
use crate::runtime::RuntimeFn;
use crate::target::{Arch, LinkStrategy, Os};
use c67_parser::ast::*;
use c67_parser::Span;

const BUILTINS: &[&str] = &[
    "println",
    "print",
    "eprintln",
    "printf",
    "exit",
    "exitf",
    "exitln",
    "str",
    "alloc",
    "getpid",
    "call",
    "write_i8",
    "write_i16",
    "write_i32",
    "write_i64",
    "write_u8",
    "write_u16",
    "write_u32",
    "write_u64",
    "write_f64",
];

impl<'a> Emitter<'a> {
    pub(crate) fn emit_call(&mut self, call: &CallExpression) -> Result<ValueTy, EmitError> {
        match call.callee.as_ref() {
            Expression::Identifier(ident) => {
                let name = self.resolve_name(&ident.name);
                if name == "me" {
                    return self.emit_tail_call(call);
                }
                if let Some(var) = self.lookup_var(&name) {
                    let (slot, lambda) = (var.slot, var.lambda.clone());
                    return match lambda {
                        Some(label) => self.emit_direct_call(&label, &call.arguments),
                        None => self.emit_indirect_slot_call(slot, &call.arguments),
                    };
                }
                if self.frame().bound_var.as_deref() == Some(name.as_str()) {
                    // Non-tail self-recursion resolves to the entry label.
                    let label = self.frame().name.clone();
                    self.frame_mut().is_recursive = true;
                    return self.emit_direct_call(&label, &call.arguments);
                }
                if BUILTINS.contains(&name.as_str()) {
                    return self.emit_builtin(&name, call);
                }
                Err(EmitError::UndefinedIdentifier {
                    name: ident.name.clone(),
                    line: ident.span.line,
                    column: ident.span.column,
                })
            }
            Expression::Member(m) => {
                if let Expression::Identifier(base) = m.base.as_ref() {
                    let ns = self.resolve_name(&base.name);
                    if let Some(logical) = self.namespaces.get(&ns).cloned() {
                        return self.emit_ffi_call(&logical, &m.field, call);
                    }
                    let qualified = format!("{}.{}", ns, m.field);
                    if let Some(label) = self.class_methods.get(&qualified).cloned() {
                        return self.emit_direct_call(&label, &call.arguments);
                    }
                }
                Err(self.err_at("cannot call this field", &m.span))
            }
            Expression::Lambda(l) => {
                // Immediate invocation of a lambda literal.
                if l.params.len() != call.arguments.len() {
                    return Err(self.err_at(
                        format!(
                            "lambda takes {} arguments, {} given",
                            l.params.len(),
                            call.arguments.len()
                        ),
                        &call.span,
                    ));
                }
                let label = self.next_lambda_label();
                self.pending.push_back(PendingLambda {
                    label: label.clone(),
                    params: l.params.clone(),
                    body: (*l.body).clone(),
                    bound_var: None,
                });
                self.emit_direct_call(&label, &call.arguments)
            }
            other => {
                // Arbitrary callee: evaluate to a function-pointer value.
                self.emit_expression(other)?;
                let slot = self.alloc_temp();
                self.isa.fstore_slot(&mut self.text, FV, slot);
                let result = self.emit_indirect_slot_call(slot, &call.arguments);
                self.free_temp(slot);
                result
            }
        }
    }

    // ===== argument plumbing =====

    pub(crate) fn emit_args_to_temps(
        &mut self,
        args: &[Expression],
    ) -> Result<Vec<i32>, EmitError> {
        let mut temps = Vec::new();
        for argument in args {
            self.emit_expression(argument)?;
            let slot = self.alloc_temp();
            self.isa.fstore_slot(&mut self.text, FV, slot);
            temps.push(slot);
        }
        Ok(temps)
    }

    fn load_float_args(&mut self, temps: &[i32]) {
        for (i, &slot) in temps.iter().enumerate() {
            self.isa
                .fload_slot(&mut self.text, FloatReg(i as u8), slot);
        }
    }

    pub(crate) fn free_temps(&mut self, temps: Vec<i32>) {
        for slot in temps.into_iter().rev() {
            self.free_temp(slot);
        }
    }

    fn emit_direct_call(
        &mut self,
        label: &str,
        args: &[Expression],
    ) -> Result<ValueTy, EmitError> {
        if args.len() > 8 {
            return Err(self.err_at("calls take at most 8 arguments", &Span::zero()));
        }
        let temps = self.emit_args_to_temps(args)?;
        self.load_float_args(&temps);
        self.isa.call_symbol(&mut self.text, label);
        self.free_temps(temps);
        Ok(ValueTy::Unknown)
    }

    fn emit_indirect_slot_call(
        &mut self,
        slot: i32,
        args: &[Expression],
    ) -> Result<ValueTy, EmitError> {
        let temps = self.emit_args_to_temps(args)?;
        self.load_float_args(&temps);
        self.isa.load_slot(&mut self.text, IntReg::T1, slot);
        self.isa.call_reg(&mut self.text, IntReg::T1);
        self.free_temps(temps);
        Ok(ValueTy::Unknown)
    }

    /// `me(…)`: re-evaluate arguments into the temp region, refill the
    /// parameter slots and branch (no link) back to the body start, reusing
    /// the frame.
    fn emit_tail_call(&mut self, call: &CallExpression) -> Result<ValueTy, EmitError> {
        if self.frame().is_main {
            return Err(self.err_at("'me' outside a lambda", &call.span));
        }
        let params = self.frame().params.clone();
        if params.len() != call.arguments.len() {
            return Err(self.err_at(
                format!(
                    "'me' takes {} arguments here, {} given",
                    params.len(),
                    call.arguments.len()
                ),
                &call.span,
            ));
        }
        let temps = self.emit_args_to_temps(&call.arguments)?;
        for (param, &temp) in params.iter().zip(&temps) {
            let slot = self
                .lookup_var(param)
                .expect("parameters are always defined")
                .slot;
            self.isa.fload_slot(&mut self.text, FV, temp);
            self.isa.fstore_slot(&mut self.text, FV, slot);
        }
        let body_start = self.frame().body_start;
        self.isa.tail_jump_backward(&mut self.text, body_start);
        self.free_temps(temps);
        Ok(ValueTy::Unknown)
    }

    // ===== FFI =====

    fn emit_ffi_call(
        &mut self,
        library: &str,
        function: &str,
        call: &CallExpression,
    ) -> Result<ValueTy, EmitError> {
        if self.strategy == LinkStrategy::Static {
            return Err(self.err_at(
                format!(
                    "cannot call '{}': static builds have no dynamic imports",
                    function
                ),
                &call.span,
            ));
        }
        let signature = self
            .cheaders
            .get(library)
            .and_then(|h| h.functions.get(function))
            .cloned()
            .unwrap_or_else(|| CSignature {
                // Numeric-uniform default when no header was captured.
                ret: CType::Double,
                params: vec![CType::Double; call.arguments.len()],
            });
        if call.arguments.len() != signature.params.len() {
            return Err(self.err_at(
                format!(
                    "{} takes {} arguments, {} given",
                    function,
                    signature.params.len(),
                    call.arguments.len()
                ),
                &call.span,
            ));
        }
        if self.target.os == Os::Windows && call.arguments.len() > 4 {
            return Err(self.err_at(
                "win64 calls are limited to 4 register arguments",
                &call.span,
            ));
        }

        let mut temps = Vec::new();
        for (argument, ty) in call.arguments.iter().zip(&signature.params) {
            self.emit_expression(argument)?;
            if *ty == CType::String {
                // NUL-terminated copy, made before any registers are staged.
                self.need(RuntimeFn::Cstr);
                self.isa.bits_f_to_int(&mut self.text, IntReg::A0, FV);
                self.isa.call_symbol(&mut self.text, "_c67_cstr");
                self.isa.bits_int_to_f(&mut self.text, FV, IntReg::Ret);
            }
            let slot = self.alloc_temp();
            self.isa.fstore_slot(&mut self.text, FV, slot);
            temps.push(slot);
        }

        // Stage registers per the target ABI.
        let windows = self.target.os == Os::Windows;
        let mut int_idx = 0usize;
        let mut float_idx = 0usize;
        for (position, (&slot, ty)) in temps.iter().zip(&signature.params).enumerate() {
            match ty {
                CType::Float | CType::Double => {
                    let reg = if windows {
                        FloatReg(position as u8)
                    } else {
                        let r = FloatReg(float_idx as u8);
                        float_idx += 1;
                        r
                    };
                    self.isa.fload_slot(&mut self.text, reg, slot);
                }
                CType::Pointer | CType::String => {
                    let reg = self.pick_int_arg(windows, position, &mut int_idx);
                    self.isa.load_slot(&mut self.text, reg, slot);
                }
                _ => {
                    let reg = self.pick_int_arg(windows, position, &mut int_idx);
                    self.isa.fload_slot(&mut self.text, FV, slot);
                    self.isa.cvt_f_to_int(&mut self.text, reg, FV);
                }
            }
        }

        if self.target.arch == Arch::X86_64 && !windows {
            // Variadic convention wants the vector-register count in al;
            // harmless for prototyped calls.
            self.isa
                .mov_imm_to_reg(&mut self.text, IntReg::T0, float_idx as i64);
        }

        self.register_import(function, library);
        if windows {
            self.emit_win_call_import(function);
        } else {
            self.isa.call_import(&mut self.text, function);
        }
        self.free_temps(temps);

        Ok(match signature.ret {
            CType::Void => {
                self.load_f64_const(FV, 0.0);
                ValueTy::Number
            }
            CType::Double | CType::Float => ValueTy::Number,
            CType::Pointer | CType::String => {
                self.isa.bits_int_to_f(&mut self.text, FV, IntReg::Ret);
                ValueTy::Unknown
            }
            _ => {
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::Ret);
                ValueTy::Number
            }
        })
    }

    fn pick_int_arg(&mut self, windows: bool, position: usize, int_idx: &mut usize) -> IntReg {
        if windows {
            self.isa.int_arg(position)
        } else {
            let r = self.isa.int_arg(*int_idx);
            *int_idx += 1;
            r
        }
    }

    // ===== builtins =====

    fn emit_builtin(&mut self, name: &str, call: &CallExpression) -> Result<ValueTy, EmitError> {
        match name {
            "println" | "print" | "eprintln" | "exitln" => {
                let fd = if name == "eprintln" { 2 } else { 1 };
                for argument in &call.arguments {
                    self.emit_print_value(argument, fd)?;
                }
                if name != "print" {
                    self.emit_print_literal("\n", fd);
                }
                if name == "exitln" {
                    self.load_f64_const(FV, 1.0);
                    self.emit_exit_value()?;
                }
                Ok(ValueTy::Number)
            }
            "printf" | "exitf" => {
                self.emit_printf(call)?;
                if name == "exitf" {
                    self.load_f64_const(FV, 1.0);
                    self.emit_exit_value()?;
                }
                Ok(ValueTy::Number)
            }
            "exit" => {
                match call.arguments.first() {
                    Some(code) => {
                        self.emit_expression(code)?;
                    }
                    None => self.load_f64_const(FV, 0.0),
                }
                // Deferred calls still run on explicit exit.
                self.emit_scope_defers_all()?;
                self.emit_exit_value()?;
                Ok(ValueTy::Number)
            }
            "str" => {
                let argument = self.expect_one(call)?;
                let ty = self.emit_expression(&argument)?;
                if ty != ValueTy::Str {
                    self.need(RuntimeFn::Str);
                    self.isa.call_symbol(&mut self.text, "_c67_str");
                    self.isa.bits_int_to_f(&mut self.text, FV, IntReg::Ret);
                }
                Ok(ValueTy::Str)
            }
            "alloc" => {
                let argument = self.expect_one(call)?;
                self.emit_expression(&argument)?;
                self.need(RuntimeFn::Alloc);
                self.isa.cvt_f_to_int(&mut self.text, IntReg::A0, FV);
                self.isa.call_symbol(&mut self.text, "_c67_alloc");
                // The result is a pointer: bit-copied, never converted.
                self.isa.bits_int_to_f(&mut self.text, FV, IntReg::Ret);
                Ok(ValueTy::Unknown)
            }
            "getpid" => {
                if self.target.os == Os::Windows {
                    self.register_import("_getpid", "c");
                    self.emit_win_call_import("_getpid");
                } else {
                    let nr = syscall_nr(self.target.arch, self.target.os, Sys::Getpid);
                    self.isa.mov_imm_to_reg(&mut self.text, IntReg::SysNum, nr);
                    self.isa.syscall(&mut self.text);
                }
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::Ret);
                Ok(ValueTy::Number)
            }
            "call" => {
                if call.arguments.is_empty() {
                    return Err(self.err_at("call() needs a function pointer", &call.span));
                }
                self.emit_expression(&call.arguments[0])?;
                let slot = self.alloc_temp();
                self.isa.fstore_slot(&mut self.text, FV, slot);
                let result = self.emit_indirect_slot_call(slot, &call.arguments[1..]);
                self.free_temp(slot);
                result
            }
            "write_f64" => {
                self.emit_sized_write(call, None)?;
                Ok(ValueTy::Number)
            }
            _ if name.starts_with("write_") => {
                let size = match &name[7..] {
                    "8" => MemSize::B1,
                    "16" => MemSize::B2,
                    "32" => MemSize::B4,
                    "64" => MemSize::B8,
                    other => {
                        return Err(
                            self.err_at(format!("unknown write width '{}'", other), &call.span)
                        )
                    }
                };
                self.emit_sized_write(call, Some(size))?;
                Ok(ValueTy::Number)
            }
            other => Err(self.err_at(format!("unknown builtin '{}'", other), &call.span)),
        }
    }

    fn expect_one(&self, call: &CallExpression) -> Result<Expression, EmitError> {
        match call.arguments.as_slice() {
            [single] => Ok(single.clone()),
            _ => Err(self.err_at("expected exactly one argument", &call.span)),
        }
    }

    /// `write_*(address, value)`: sized store through a bit-carried
    /// address (`$x`, `alloc`, an FFI pointer).
    fn emit_sized_write(
        &mut self,
        call: &CallExpression,
        size: Option<MemSize>,
    ) -> Result<(), EmitError> {
        if call.arguments.len() != 2 {
            return Err(self.err_at("sized writes take (address, value)", &call.span));
        }
        self.emit_expression(&call.arguments[0])?;
        let addr = self.alloc_temp();
        self.isa.bits_f_to_int(&mut self.text, IntReg::T0, FV);
        self.isa.store_slot(&mut self.text, IntReg::T0, addr);
        self.emit_expression(&call.arguments[1])?;
        self.isa.load_slot(&mut self.text, IntReg::T0, addr);
        match size {
            None => self.isa.fstore(&mut self.text, FV, IntReg::T0, 0),
            Some(size) => {
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FV);
                self.isa
                    .store(&mut self.text, IntReg::T1, IntReg::T0, 0, size);
            }
        }
        self.free_temp(addr);
        Ok(())
    }

    // ===== printing =====

    /// Direct `write(2)` of an interned literal (SYSCALL strategy) or the
    /// libc equivalent, per target.
    pub(crate) fn emit_print_literal(&mut self, text: &str, fd: i64) {
        let use_syscall = self.strategy == LinkStrategy::Static
            || self.target.os == Os::Darwin
            || (fd != 1 && self.target.os == Os::Linux);
        if use_syscall {
            let sym = self.intern_cstring(text);
            let len = text.len() as i64;
            let nr = syscall_nr(self.target.arch, self.target.os, Sys::Write);
            let (a0, a1, a2) = (self.isa.sysarg(0), self.isa.sysarg(1), self.isa.sysarg(2));
            self.isa.mov_imm_to_reg(&mut self.text, a0, fd);
            self.isa.lea_symbol(&mut self.text, a1, &sym);
            self.isa.mov_imm_to_reg(&mut self.text, a2, len);
            self.isa.mov_imm_to_reg(&mut self.text, IntReg::SysNum, nr);
            self.isa.syscall(&mut self.text);
            return;
        }
        if fd != 1 && self.target.os == Os::Windows {
            // msvcrt _write(fd, buf, len) reaches stderr without a FILE*.
            let sym = self.intern_cstring(text);
            self.register_import("_write", "c");
            let (a0, a1, a2) = (
                self.isa.int_arg(0),
                self.isa.int_arg(1),
                self.isa.int_arg(2),
            );
            self.isa.mov_imm_to_reg(&mut self.text, a0, fd);
            self.isa.lea_symbol(&mut self.text, a1, &sym);
            self.isa
                .mov_imm_to_reg(&mut self.text, a2, text.len() as i64);
            self.emit_win_call_import("_write");
            return;
        }
        // printf("%s", text)
        let fmt = self.intern_cstring("%s");
        let sym = self.intern_cstring(text);
        self.register_import("printf", "c");
        let a0 = self.isa.int_arg(0);
        let a1 = self.isa.int_arg(1);
        self.isa.lea_symbol(&mut self.text, a0, &fmt);
        self.isa.lea_symbol(&mut self.text, a1, &sym);
        if self.target.arch == Arch::X86_64 && self.target.os != Os::Windows {
            self.isa.mov_imm_to_reg(&mut self.text, IntReg::T0, 0);
        }
        if self.target.os == Os::Windows {
            self.emit_win_call_import("printf");
        } else {
            self.isa.call_import(&mut self.text, "printf");
        }
    }

    fn emit_print_value(&mut self, argument: &Expression, fd: i64) -> Result<(), EmitError> {
        if let Expression::Str(lit) = argument {
            self.emit_print_literal(&lit.value, fd);
            return Ok(());
        }
        let ty = self.emit_expression(argument)?;
        let helper = match ty {
            ValueTy::Str => {
                self.need(RuntimeFn::PrintStr);
                "_c67_print_str"
            }
            ValueTy::List => {
                self.need(RuntimeFn::PrintList);
                "_c67_print_list"
            }
            ValueTy::Map => {
                self.need(RuntimeFn::PrintMap);
                "_c67_print_map"
            }
            _ => {
                self.need(RuntimeFn::PrintF64);
                "_c67_print_f64"
            }
        };
        self.isa.mov_imm_to_reg(&mut self.text, IntReg::A2, fd);
        self.isa.call_symbol(&mut self.text, helper);
        Ok(())
    }

    /// `printf(fmt, …)` with a literal format string. Static targets split
    /// the format into write/conversion segments; dynamic targets pass
    /// through to C printf with per-directive conversions.
    fn emit_printf(&mut self, call: &CallExpression) -> Result<(), EmitError> {
        let fmt = match call.arguments.first() {
            Some(Expression::Str(lit)) => lit.value.clone(),
            _ => {
                return Err(self.err_at(
                    "printf needs a literal format string",
                    &call.span,
                ))
            }
        };
        let args = &call.arguments[1..];

        if self.strategy == LinkStrategy::Static || self.target.os == Os::Darwin {
            return self.emit_printf_split(&fmt, args, call);
        }
        self.emit_printf_libc(&fmt, args, call)
    }

    fn emit_printf_split(
        &mut self,
        fmt: &str,
        args: &[Expression],
        call: &CallExpression,
    ) -> Result<(), EmitError> {
        let mut literal = String::new();
        let mut arg_iter = args.iter();
        let mut chars = fmt.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => literal.push('%'),
                Some(directive) => {
                    if !literal.is_empty() {
                        let chunk = std::mem::take(&mut literal);
                        self.emit_print_literal(&chunk, 1);
                    }
                    let argument = arg_iter.next().ok_or_else(|| {
                        self.err_at("printf has more directives than arguments", &call.span)
                    })?;
                    match directive {
                        'd' | 'i' => {
                            self.emit_expression(argument)?;
                            self.isa.cvt_f_to_int(&mut self.text, IntReg::T0, FV);
                            self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                            self.need(RuntimeFn::PrintF64);
                            self.isa.mov_imm_to_reg(&mut self.text, IntReg::A2, 1);
                            self.isa.call_symbol(&mut self.text, "_c67_print_f64");
                        }
                        'f' | 'g' | 'v' => {
                            self.emit_expression(argument)?;
                            self.need(RuntimeFn::PrintF64);
                            self.isa.mov_imm_to_reg(&mut self.text, IntReg::A2, 1);
                            self.isa.call_symbol(&mut self.text, "_c67_print_f64");
                        }
                        's' => {
                            self.emit_print_value(argument, 1)?;
                        }
                        other => {
                            return Err(self.err_at(
                                format!("unsupported printf directive '%{}'", other),
                                &call.span,
                            ))
                        }
                    }
                }
                None => literal.push('%'),
            }
        }
        if !literal.is_empty() {
            let chunk = std::mem::take(&mut literal);
            self.emit_print_literal(&chunk, 1);
        }
        Ok(())
    }

    fn emit_printf_libc(
        &mut self,
        fmt: &str,
        args: &[Expression],
        call: &CallExpression,
    ) -> Result<(), EmitError> {
        // Directive kinds drive register classes.
        #[derive(Clone, Copy, PartialEq)]
        enum Kind {
            Int,
            Float,
            Cstr,
        }
        let mut kinds = Vec::new();
        let mut chars = fmt.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                continue;
            }
            match chars.next() {
                Some('%') | None => {}
                Some('d') | Some('i') | Some('u') | Some('x') | Some('c') => kinds.push(Kind::Int),
                Some('f') | Some('g') | Some('e') => kinds.push(Kind::Float),
                Some('s') => kinds.push(Kind::Cstr),
                Some(other) => {
                    return Err(self.err_at(
                        format!("unsupported printf directive '%{}'", other),
                        &call.span,
                    ))
                }
            }
        }
        if kinds.len() != args.len() {
            return Err(self.err_at(
                format!(
                    "printf format wants {} arguments, {} given",
                    kinds.len(),
                    args.len()
                ),
                &call.span,
            ));
        }
        if self.target.os == Os::Windows && args.len() > 3 {
            return Err(self.err_at(
                "win64 printf is limited to 3 variadic register arguments",
                &call.span,
            ));
        }

        let mut temps = Vec::new();
        for (argument, kind) in args.iter().zip(&kinds) {
            self.emit_expression(argument)?;
            if *kind == Kind::Cstr {
                self.need(RuntimeFn::Cstr);
                self.isa.bits_f_to_int(&mut self.text, IntReg::A0, FV);
                self.isa.call_symbol(&mut self.text, "_c67_cstr");
                self.isa.bits_int_to_f(&mut self.text, FV, IntReg::Ret);
            }
            let slot = self.alloc_temp();
            self.isa.fstore_slot(&mut self.text, FV, slot);
            temps.push(slot);
        }

        self.register_import("printf", "c");
        let fmt_sym = self.intern_cstring(fmt);
        let windows = self.target.os == Os::Windows;
        let mut int_idx = 1usize; // slot 0 is the format pointer
        let mut float_idx = 0usize;
        for (position, (&slot, kind)) in temps.iter().zip(&kinds).enumerate() {
            match kind {
                Kind::Float => {
                    if windows {
                        // Variadic doubles ride in both register files.
                        let f = FloatReg((position + 1) as u8);
                        self.isa.fload_slot(&mut self.text, f, slot);
                        let g = self.isa.int_arg(position + 1);
                        self.isa.bits_f_to_int(&mut self.text, g, f);
                    } else {
                        let f = FloatReg(float_idx as u8);
                        float_idx += 1;
                        self.isa.fload_slot(&mut self.text, f, slot);
                    }
                }
                Kind::Cstr => {
                    let reg = if windows {
                        self.isa.int_arg(position + 1)
                    } else {
                        let r = self.isa.int_arg(int_idx);
                        int_idx += 1;
                        r
                    };
                    self.isa.load_slot(&mut self.text, reg, slot);
                }
                Kind::Int => {
                    let reg = if windows {
                        self.isa.int_arg(position + 1)
                    } else {
                        let r = self.isa.int_arg(int_idx);
                        int_idx += 1;
                        r
                    };
                    self.isa.fload_slot(&mut self.text, FV, slot);
                    self.isa.cvt_f_to_int(&mut self.text, reg, FV);
                }
            }
        }
        let a0 = self.isa.int_arg(0);
        self.isa.lea_symbol(&mut self.text, a0, &fmt_sym);
        if self.target.arch == Arch::X86_64 && !windows {
            self.isa
                .mov_imm_to_reg(&mut self.text, IntReg::T0, float_idx as i64);
        }
        if windows {
            self.emit_win_call_import("printf");
        } else {
            self.isa.call_import(&mut self.text, "printf");
        }
        self.free_temps(temps);
        Ok(())
    }
}
