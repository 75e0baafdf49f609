//! Statement emission.

use super::{CStructLayout, Emitter, LoopFrame, PendingLambda, ValueTy};
use crate::error::EmitError;
use crate::isa::{Cond, IntReg, MemSize, FSCRATCH, FV};
use c67_parser::ast::*;
use log::debug;
use rustc_hash::FxHashMap;

impl<'a> Emitter<'a> {
    pub(crate) fn emit_statement(&mut self, statement: &Statement) -> Result<(), EmitError> {
        match statement {
            Statement::Expression(s) => {
                self.emit_expression(&s.expression)?;
                Ok(())
            }
            Statement::Assign(s) => self.emit_assign(s),
            Statement::Loop(s) => self.emit_loop(s),
            Statement::Ret(s) => self.emit_ret(s),
            Statement::Continue(s) => {
                let label = self.isa.jmp_forward(&mut self.text);
                match self.frame_mut().loops.last_mut() {
                    Some(frame) => {
                        frame.continue_patches.push(label);
                        Ok(())
                    }
                    None => Err(self.err_at("'@' outside a loop", &s.span)),
                }
            }
            Statement::Break(s) => {
                let label = self.isa.jmp_forward(&mut self.text);
                match self.frame_mut().loops.last_mut() {
                    Some(frame) => {
                        frame.end_patches.push(label);
                        Ok(())
                    }
                    None => Err(self.err_at("'@@' outside a loop", &s.span)),
                }
            }
            Statement::LoopBump(s) => {
                let idx_slot = match self.frame().loops.last() {
                    Some(frame) => frame.idx_slot,
                    None => return Err(self.err_at("'@++' outside a loop", &s.span)),
                };
                self.isa.load_slot(&mut self.text, IntReg::T0, idx_slot);
                self.isa.add_imm(&mut self.text, IntReg::T0, 1);
                self.isa.store_slot(&mut self.text, IntReg::T0, idx_slot);
                Ok(())
            }
            Statement::Arena(s) => {
                // Depth bookkeeping only; `alloc` stays on the global
                // allocator in this core.
                self.arena_depth += 1;
                self.push_defer_scope();
                for statement in &s.body.statements {
                    self.emit_statement(statement)?;
                }
                self.pop_defer_scope()?;
                self.arena_depth -= 1;
                Ok(())
            }
            Statement::Defer(s) => {
                self.frame_mut()
                    .defers
                    .last_mut()
                    .expect("defer scope always open")
                    .push(s.call.clone());
                Ok(())
            }
            Statement::Spawn(s) => {
                // Reserved syntax: evaluated inline, sequentially.
                self.emit_expression(&s.task)?;
                Ok(())
            }
            Statement::Unsafe(s) => self.emit_unsafe(s),
            Statement::Syscall(s) => self.emit_syscall(s),
            Statement::Cstruct(s) => self.emit_cstruct(s),
            Statement::Class(s) => self.emit_class(s),
            Statement::Alias(s) => {
                self.aliases
                    .insert(s.new_name.clone(), s.target.clone());
                Ok(())
            }
            Statement::Import(s) => self.emit_import(s),
            Statement::Export(s) => {
                debug!("export {}", s.name);
                self.exports.push(s.name.clone());
                Ok(())
            }
        }
    }

    fn emit_assign(&mut self, s: &AssignStatement) -> Result<(), EmitError> {
        match &s.target {
            AssignTarget::Name(raw_name) => {
                let name = self.resolve_name(raw_name);
                let existing = self.frame().vars.get(&name).cloned();

                // Enforce the three assignment shapes before emitting
                // any value code.
                let line = s.span.line;
                let column = s.span.column;
                match (s.op, &existing) {
                    (AssignOp::Declare, Some(_)) if !s.shadow => {
                        return Err(EmitError::Redefinition { name, line, column });
                    }
                    (AssignOp::Update, None) => {
                        return Err(EmitError::UndefinedUpdate { name, line, column });
                    }
                    (AssignOp::Update, Some(var)) if !var.mutable => {
                        return Err(EmitError::ImmutableUpdate { name, line, column });
                    }
                    _ => {}
                }

                self.current_bind = Some(name.clone());
                self.last_lambda_label = None;
                let ty = self.emit_expression(&s.value)?;
                self.current_bind = None;
                let lambda = self.last_lambda_label.take();

                if s.propagate {
                    let nan = self.isa.fbranch_if_nan(&mut self.text, FV);
                    self.frame_mut().propagate_exits.push(nan);
                }

                let slot = match (s.op, existing) {
                    // `=` updates an existing mutable in place…
                    (AssignOp::Assign, Some(var)) if var.mutable => {
                        let info = self.frame_mut().vars.get_mut(&name).unwrap();
                        info.ty = ty;
                        info.lambda = lambda;
                        var.slot
                    }
                    // …or an explicit `<-` does the same.
                    (AssignOp::Update, Some(var)) => {
                        let info = self.frame_mut().vars.get_mut(&name).unwrap();
                        info.ty = ty;
                        info.lambda = lambda;
                        var.slot
                    }
                    // Everything else introduces a binding (shadowing gets a
                    // fresh slot).
                    (op, _) => {
                        let mutable = op == AssignOp::Declare;
                        self.define_var(&name, mutable, ty, lambda)
                    }
                };
                self.isa.fstore_slot(&mut self.text, FV, slot);
                Ok(())
            }
            AssignTarget::Index { base, index } => {
                // xs[i] <- v: address first, then the value.
                let base_ty = self.emit_expression(base)?;
                let addr = self.alloc_temp();
                self.isa.bits_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.store_slot(&mut self.text, IntReg::T0, addr);
                self.emit_expression(index)?;
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FV);
                let (stride, skip) = match base_ty {
                    ValueTy::Str | ValueTy::Map => (4u8, 16),
                    _ => (3u8, 8),
                };
                self.isa.shl_imm(&mut self.text, IntReg::T1, stride);
                self.isa.load_slot(&mut self.text, IntReg::T0, addr);
                self.isa
                    .add_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1);
                self.isa.store_slot(&mut self.text, IntReg::T0, addr);
                self.emit_expression(&s.value)?;
                self.isa.load_slot(&mut self.text, IntReg::T0, addr);
                self.isa.fstore(&mut self.text, FV, IntReg::T0, skip);
                self.free_temp(addr);
                Ok(())
            }
            AssignTarget::Member { base, field } => {
                // Sized store into a cstruct field.
                let base_ty = self.emit_expression(base)?;
                let layout = match base_ty {
                    ValueTy::Struct(name) => self.cstructs.get(&name).cloned(),
                    _ => None,
                };
                let layout = layout
                    .ok_or_else(|| self.err_at("field assignment needs a cstruct", &s.span))?;
                let (offset, size) = *layout
                    .fields
                    .get(field)
                    .ok_or_else(|| self.err_at(format!("no field '{}'", field), &s.span))?;
                let addr = self.alloc_temp();
                self.isa.bits_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.store_slot(&mut self.text, IntReg::T0, addr);
                self.emit_expression(&s.value)?;
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FV);
                self.isa.load_slot(&mut self.text, IntReg::T0, addr);
                self.isa
                    .store(&mut self.text, IntReg::T1, IntReg::T0, offset as i32, size);
                self.free_temp(addr);
                Ok(())
            }
        }
    }

    fn emit_ret(&mut self, s: &RetStatement) -> Result<(), EmitError> {
        // Inside a loop a bare `ret` value still returns from the function;
        // the loop frames just stay balanced because nothing after the
        // epilogue runs.
        match &s.value {
            Some(value) => {
                self.emit_expression(value)?;
            }
            None => self.load_f64_const(FV, 0.0),
        }
        self.emit_value_return()
    }

    fn emit_loop(&mut self, s: &LoopStatement) -> Result<(), EmitError> {
        let idx_slot = self.alloc_slot();
        let bound_slot = self.alloc_slot();
        let var_slot = self.define_var(&s.binding, true, ValueTy::Number, None);
        let is_range = matches!(s.iterable, Expression::Range(_));
        let mut ptr_slot = 0;

        match &s.iterable {
            Expression::Range(range) => {
                self.emit_expression(&range.start)?;
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.store_slot(&mut self.text, IntReg::T0, idx_slot);
                self.emit_expression(&range.end)?;
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T0, FV);
                if range.inclusive {
                    self.isa.add_imm(&mut self.text, IntReg::T0, 1);
                }
                self.isa.store_slot(&mut self.text, IntReg::T0, bound_slot);
            }
            other => {
                // List iteration: pointer and element count from the
                // prefix.
                ptr_slot = self.alloc_slot();
                self.emit_expression(other)?;
                self.isa.bits_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.store_slot(&mut self.text, IntReg::T0, ptr_slot);
                self.isa.fload(&mut self.text, FSCRATCH, IntReg::T0, 0);
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FSCRATCH);
                self.isa.store_slot(&mut self.text, IntReg::T1, bound_slot);
                self.isa.mov_imm_to_reg(&mut self.text, IntReg::T0, 0);
                self.isa.store_slot(&mut self.text, IntReg::T0, idx_slot);
            }
        }

        // Optional iteration cap.
        let cap_slot = match s.max {
            Some(LoopMax::Count(n)) => {
                let slot = self.alloc_slot();
                self.isa
                    .mov_imm_to_reg(&mut self.text, IntReg::T0, n as i64);
                self.isa.store_slot(&mut self.text, IntReg::T0, slot);
                Some(slot)
            }
            _ => None,
        };

        let head = self.text.offset();
        self.isa.load_slot(&mut self.text, IntReg::T0, idx_slot);
        self.isa.load_slot(&mut self.text, IntReg::T1, bound_slot);
        let exit = self
            .isa
            .branch_if(&mut self.text, Cond::Ge, IntReg::T0, IntReg::T1);
        let cap_exit = match cap_slot {
            Some(slot) => {
                self.isa.load_slot(&mut self.text, IntReg::T0, slot);
                Some(
                    self.isa
                        .branch_if_imm(&mut self.text, Cond::Le, IntReg::T0, 0),
                )
            }
            None => None,
        };

        // Bind the iteration variable.
        if is_range {
            self.isa.load_slot(&mut self.text, IntReg::T0, idx_slot);
            self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
            self.isa.fstore_slot(&mut self.text, FV, var_slot);
        } else {
            self.isa.load_slot(&mut self.text, IntReg::T0, ptr_slot);
            self.isa.load_slot(&mut self.text, IntReg::T1, idx_slot);
            self.isa.shl_imm(&mut self.text, IntReg::T1, 3);
            self.isa
                .add_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1);
            self.isa.fload(&mut self.text, FV, IntReg::T0, 8);
            self.isa.fstore_slot(&mut self.text, FV, var_slot);
        }

        self.frame_mut().loops.push(LoopFrame {
            head,
            continue_patches: Vec::new(),
            end_patches: Vec::new(),
            idx_slot,
            bound_slot,
            is_range,
        });

        for statement in &s.body.statements {
            self.emit_statement(statement)?;
        }

        // Continue point: bump the index (and burn the cap) then retest.
        let frame = self.frame_mut().loops.last_mut().expect("loop frame");
        let continues = std::mem::take(&mut frame.continue_patches);
        for label in continues {
            self.isa.bind(&mut self.text, label)?;
        }
        self.isa.load_slot(&mut self.text, IntReg::T0, idx_slot);
        self.isa.add_imm(&mut self.text, IntReg::T0, 1);
        self.isa.store_slot(&mut self.text, IntReg::T0, idx_slot);
        if let Some(slot) = cap_slot {
            self.isa.load_slot(&mut self.text, IntReg::T0, slot);
            self.isa.add_imm(&mut self.text, IntReg::T0, -1);
            self.isa.store_slot(&mut self.text, IntReg::T0, slot);
        }
        self.isa.jmp_backward(&mut self.text, head);

        // Loop end: every break and the head test land here. The loop stack
        // shrinks back to its entry size.
        let frame = self.frame_mut().loops.pop().expect("loop frame");
        self.isa.bind(&mut self.text, exit)?;
        if let Some(label) = cap_exit {
            self.isa.bind(&mut self.text, label)?;
        }
        for label in frame.end_patches {
            self.isa.bind(&mut self.text, label)?;
        }
        Ok(())
    }

    fn emit_unsafe(&mut self, s: &UnsafeStatement) -> Result<(), EmitError> {
        let want = match self.target.arch {
            crate::target::Arch::X86_64 => UnsafeArch::X86_64,
            crate::target::Arch::Arm64 => UnsafeArch::Arm64,
            crate::target::Arch::Riscv64 => UnsafeArch::Riscv64,
        };
        let body = match s.bodies.iter().find(|(arch, _)| *arch == want) {
            Some((_, body)) => body,
            None => {
                // No sub-body for the active target: nothing to emit.
                return Ok(());
            }
        };
        for op in body {
            match op {
                AsmStatement::RegImm { dst, value } => {
                    let dst = self.unsafe_reg(dst, &s.span)?;
                    self.isa.mov_imm_to_reg(&mut self.text, dst, *value);
                }
                AsmStatement::RegReg { dst, src } => {
                    let dst = self.unsafe_reg(dst, &s.span)?;
                    let src = self.unsafe_reg(src, &s.span)?;
                    self.isa.mov_reg_reg(&mut self.text, dst, src);
                }
                AsmStatement::Load {
                    dst,
                    base,
                    offset,
                    width,
                } => {
                    let dst = self.unsafe_reg(dst, &s.span)?;
                    let base = self.unsafe_reg(base, &s.span)?;
                    self.isa
                        .load(&mut self.text, dst, base, *offset, width_size(*width));
                }
                AsmStatement::Store {
                    src,
                    base,
                    offset,
                    width,
                } => {
                    let src = self.unsafe_reg(src, &s.span)?;
                    let base = self.unsafe_reg(base, &s.span)?;
                    self.isa
                        .store(&mut self.text, src, base, *offset, width_size(*width));
                }
                AsmStatement::Syscall => self.isa.syscall(&mut self.text),
            }
        }
        Ok(())
    }

    fn unsafe_reg(&self, name: &str, span: &c67_parser::Span) -> Result<IntReg, EmitError> {
        self.isa
            .unsafe_reg(name)
            .ok_or_else(|| self.err_at(format!("unknown register '{}'", name), span))
    }

    fn emit_syscall(&mut self, s: &SyscallStatement) -> Result<(), EmitError> {
        if self.target.os == crate::target::Os::Windows {
            return Err(self.err_at("raw syscalls are not available on Windows", &s.span));
        }
        if s.arguments.is_empty() || s.arguments.len() > 7 {
            return Err(self.err_at("syscall takes a number and up to 6 arguments", &s.span));
        }
        // Evaluate into temps first so argument registers stay intact.
        let mut temps = Vec::new();
        for argument in &s.arguments {
            self.emit_expression(argument)?;
            let slot = self.alloc_temp();
            self.isa.fstore_slot(&mut self.text, FV, slot);
            temps.push(slot);
        }
        for (i, &slot) in temps.iter().enumerate().skip(1) {
            self.isa.fload_slot(&mut self.text, FV, slot);
            let reg = self.isa.sysarg(i - 1);
            self.isa.cvt_f_to_int(&mut self.text, reg, FV);
        }
        self.isa.fload_slot(&mut self.text, FV, temps[0]);
        self.isa.cvt_f_to_int(&mut self.text, IntReg::SysNum, FV);
        self.isa.syscall(&mut self.text);
        for slot in temps.into_iter().rev() {
            self.free_temp(slot);
        }
        Ok(())
    }

    fn emit_cstruct(&mut self, s: &CstructStatement) -> Result<(), EmitError> {
        let mut fields = FxHashMap::default();
        let mut offset = 0u32;
        let mut max_align = 1u32;
        for field in &s.fields {
            let (size, bytes) = match field.ty.as_str() {
                "i8" | "u8" | "bool" | "char" => (MemSize::B1, 1u32),
                "i16" | "u16" => (MemSize::B2, 2),
                "i32" | "u32" | "int" | "float" => (MemSize::B4, 4),
                "i64" | "u64" | "long" | "f64" | "double" | "ptr" | "str" => (MemSize::B8, 8),
                other => {
                    return Err(self.err_at(
                        format!("unknown cstruct field type '{}'", other),
                        &s.span,
                    ))
                }
            };
            let align = if s.packed { 1 } else { bytes };
            max_align = max_align.max(align);
            offset = (offset + align - 1) & !(align - 1);
            fields.insert(field.name.clone(), (offset, size));
            offset += bytes;
        }
        if let Some(align) = s.aligned {
            max_align = max_align.max(align);
        }
        let size = (offset + max_align - 1) & !(max_align - 1);
        debug!("cstruct {}: {} bytes", s.name, size);
        self.cstructs
            .insert(s.name.clone(), CStructLayout { fields, size });
        Ok(())
    }

    fn emit_class(&mut self, s: &ClassStatement) -> Result<(), EmitError> {
        // Methods lower to plain lambdas reachable as `Class.method`.
        for (method, lambda) in &s.methods {
            let qualified = format!("{}.{}", s.name, method);
            let label = self.next_lambda_label();
            self.pending.push_back(PendingLambda {
                label: label.clone(),
                params: lambda.params.clone(),
                body: (*lambda.body).clone(),
                bound_var: None,
            });
            self.class_methods.insert(qualified, label);
        }
        Ok(())
    }

    fn emit_import(&mut self, s: &ImportStatement) -> Result<(), EmitError> {
        let visible = s.alias.clone().unwrap_or_else(|| s.name.clone());
        self.namespaces.insert(visible, s.name.clone());
        match s.kind {
            ImportKind::Library => {
                self.ensure_library(&s.name);
                debug!("import library {}", s.name);
            }
            ImportKind::Header => {
                if !self.cheaders.contains_key(&s.name) {
                    debug!("use {}: no header constants supplied", s.name);
                }
            }
        }
        Ok(())
    }
}

fn width_size(width: AsmWidth) -> MemSize {
    match width {
        AsmWidth::U8 => MemSize::B1,
        AsmWidth::U16 => MemSize::B2,
        AsmWidth::U32 => MemSize::B4,
        AsmWidth::U64 => MemSize::B8,
    }
}
