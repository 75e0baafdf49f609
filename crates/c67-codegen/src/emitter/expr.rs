//! Expression emission.
//!
//! Invariant: after any expression is compiled its value sits in the
//! target's canonical value register (`FV`); everything else is scratch.

use super::{Emitter, PendingLambda, ValueTy};
use crate::error::EmitError;
use crate::isa::{Cond, FCond, FloatReg, IntReg, MemSize, FSCRATCH, FSCRATCH2, FV};
use crate::runtime::RuntimeFn;
use c67_parser::ast::*;

impl<'a> Emitter<'a> {
    pub(crate) fn emit_expression(&mut self, expr: &Expression) -> Result<ValueTy, EmitError> {
        match expr {
            Expression::Number(lit) => {
                self.load_f64_const(FV, lit.value);
                Ok(ValueTy::Number)
            }
            Expression::Str(lit) => {
                let sym = self.intern_mapstring(&lit.value);
                self.isa.lea_symbol(&mut self.text, IntReg::T0, &sym);
                self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Str)
            }
            Expression::FString(lit) => self.emit_fstring(lit),
            Expression::Address(lit) => {
                // Address literals lower to their textual map-string form.
                let text = format!("{}:{}", lit.host, lit.port);
                let sym = self.intern_mapstring(&text);
                self.isa.lea_symbol(&mut self.text, IntReg::T0, &sym);
                self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Str)
            }
            Expression::Identifier(ident) => self.emit_identifier(ident),
            Expression::List(lit) => self.emit_list_literal(lit),
            Expression::Map(lit) => self.emit_map_literal(lit),
            Expression::Unary(u) => self.emit_unary(u),
            Expression::Binary(bin) => self.emit_binary(bin),
            Expression::Postfix(p) => self.emit_postfix(p),
            Expression::Range(r) => Err(self.err_at(
                "range expressions are only valid as loop iterables",
                &r.span,
            )),
            Expression::Call(call) => self.emit_call(call),
            Expression::Index(ix) => self.emit_index(ix),
            Expression::Member(m) => self.emit_member(m),
            Expression::Cast(c) => self.emit_cast(c),
            Expression::Lambda(l) => self.emit_lambda_value(l),
            Expression::Match(m) => self.emit_match(m),
            Expression::LoopMeta(meta) => self.emit_loop_meta(meta),
        }
    }

    fn emit_identifier(&mut self, ident: &Identifier) -> Result<ValueTy, EmitError> {
        let name = self.resolve_name(&ident.name);
        if let Some(var) = self.lookup_var(&name) {
            let (slot, ty) = (var.slot, var.ty.clone());
            self.isa.fload_slot(&mut self.text, FV, slot);
            return Ok(ty);
        }
        // A lambda may refer to the variable it is being bound to: that is a
        // self-reference and resolves to its own entry point.
        if self.frame().bound_var.as_deref() == Some(name.as_str()) {
            let label = self.frame().name.clone();
            self.frame_mut().is_recursive = true;
            self.isa.lea_symbol(&mut self.text, IntReg::T0, &label);
            self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
            return Ok(ValueTy::Lambda);
        }
        Err(EmitError::UndefinedIdentifier {
            name: ident.name.clone(),
            line: ident.span.line,
            column: ident.span.column,
        })
    }

    fn emit_fstring(&mut self, lit: &FStringLit) -> Result<ValueTy, EmitError> {
        if lit.parts.is_empty() {
            let sym = self.intern_mapstring("");
            self.isa.lea_symbol(&mut self.text, IntReg::T0, &sym);
            self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
            return Ok(ValueTy::Str);
        }
        let acc = self.alloc_temp();
        for (i, part) in lit.parts.iter().enumerate() {
            match part {
                FStringPart::Literal(text) => {
                    let sym = self.intern_mapstring(text);
                    self.isa.lea_symbol(&mut self.text, IntReg::T0, &sym);
                    self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
                }
                FStringPart::Interpolation(inner) => {
                    let ty = self.emit_expression(inner)?;
                    if ty != ValueTy::Str {
                        self.need(RuntimeFn::Str);
                        self.isa.call_symbol(&mut self.text, "_c67_str");
                        self.isa.bits_int_to_f(&mut self.text, FV, IntReg::Ret);
                    }
                }
            }
            if i == 0 {
                self.isa.fstore_slot(&mut self.text, FV, acc);
            } else {
                self.need(RuntimeFn::StringConcat);
                self.isa.load_slot(&mut self.text, IntReg::A0, acc);
                self.isa.bits_f_to_int(&mut self.text, IntReg::A1, FV);
                self.isa.call_symbol(&mut self.text, "_c67_string_concat");
                self.isa.store_slot(&mut self.text, IntReg::Ret, acc);
            }
        }
        self.isa.load_slot(&mut self.text, IntReg::T0, acc);
        self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
        self.free_temp(acc);
        Ok(ValueTy::Str)
    }

    fn emit_list_literal(&mut self, lit: &ListLit) -> Result<ValueTy, EmitError> {
        // All-constant lists intern straight into rodata: an 8-byte count
        // then the elements.
        let constants: Option<Vec<f64>> = lit
            .elements
            .iter()
            .map(|e| match e {
                Expression::Number(n) => Some(n.value),
                _ => None,
            })
            .collect();
        if let Some(values) = constants {
            let mut bytes = Vec::with_capacity(8 + values.len() * 8);
            bytes.extend_from_slice(&(values.len() as f64).to_le_bytes());
            for v in &values {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            let sym = self.intern_list_payload(bytes);
            self.isa.lea_symbol(&mut self.text, IntReg::T0, &sym);
            self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
            return Ok(ValueTy::List);
        }

        // Mixed contents build on the heap.
        self.need(RuntimeFn::Alloc);
        let ptr = self.alloc_temp();
        let n = lit.elements.len();
        self.isa
            .mov_imm_to_reg(&mut self.text, IntReg::A0, (8 + 8 * n) as i64);
        self.isa.call_symbol(&mut self.text, "_c67_alloc");
        self.isa.store_slot(&mut self.text, IntReg::Ret, ptr);
        self.load_f64_const(FSCRATCH, n as f64);
        self.isa.load_slot(&mut self.text, IntReg::T0, ptr);
        self.isa.fstore(&mut self.text, FSCRATCH, IntReg::T0, 0);
        for (i, element) in lit.elements.iter().enumerate() {
            self.emit_expression(element)?;
            self.isa.load_slot(&mut self.text, IntReg::T0, ptr);
            self.isa
                .fstore(&mut self.text, FV, IntReg::T0, (8 + 8 * i) as i32);
        }
        self.isa.load_slot(&mut self.text, IntReg::T0, ptr);
        self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
        self.free_temp(ptr);
        Ok(ValueTy::List)
    }

    fn emit_map_literal(&mut self, lit: &MapLit) -> Result<ValueTy, EmitError> {
        let constants: Option<Vec<(f64, f64)>> = lit
            .entries
            .iter()
            .map(|(k, v)| match (k, v) {
                (Expression::Number(k), Expression::Number(v)) => Some((k.value, v.value)),
                _ => None,
            })
            .collect();
        if let Some(pairs) = constants {
            let mut bytes = Vec::with_capacity(8 + pairs.len() * 16);
            bytes.extend_from_slice(&(pairs.len() as f64).to_le_bytes());
            for (k, v) in &pairs {
                bytes.extend_from_slice(&k.to_le_bytes());
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            let sym = self.intern_list_payload(bytes);
            self.isa.lea_symbol(&mut self.text, IntReg::T0, &sym);
            self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
            return Ok(ValueTy::Map);
        }

        self.need(RuntimeFn::Alloc);
        let ptr = self.alloc_temp();
        let n = lit.entries.len();
        self.isa
            .mov_imm_to_reg(&mut self.text, IntReg::A0, (8 + 16 * n) as i64);
        self.isa.call_symbol(&mut self.text, "_c67_alloc");
        self.isa.store_slot(&mut self.text, IntReg::Ret, ptr);
        self.load_f64_const(FSCRATCH, n as f64);
        self.isa.load_slot(&mut self.text, IntReg::T0, ptr);
        self.isa.fstore(&mut self.text, FSCRATCH, IntReg::T0, 0);
        for (i, (key, value)) in lit.entries.iter().enumerate() {
            self.emit_expression(key)?;
            self.isa.load_slot(&mut self.text, IntReg::T0, ptr);
            self.isa
                .fstore(&mut self.text, FV, IntReg::T0, (8 + 16 * i) as i32);
            self.emit_expression(value)?;
            self.isa.load_slot(&mut self.text, IntReg::T0, ptr);
            self.isa
                .fstore(&mut self.text, FV, IntReg::T0, (16 + 16 * i) as i32);
        }
        self.isa.load_slot(&mut self.text, IntReg::T0, ptr);
        self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
        self.free_temp(ptr);
        Ok(ValueTy::Map)
    }

    fn emit_unary(&mut self, u: &UnaryExpression) -> Result<ValueTy, EmitError> {
        match u.operator {
            UnaryOperator::Neg => {
                self.emit_expression(&u.operand)?;
                self.isa.fneg(&mut self.text, FV);
                Ok(ValueTy::Number)
            }
            UnaryOperator::Not => {
                self.emit_expression(&u.operand)?;
                self.load_f64_zero(FSCRATCH);
                self.isa
                    .fset_if(&mut self.text, FCond::Eq, IntReg::T0, FV, FSCRATCH);
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Number)
            }
            UnaryOperator::BitNot => {
                self.emit_expression(&u.operand)?;
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.not_reg(&mut self.text, IntReg::T0);
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Number)
            }
            UnaryOperator::Move => self.emit_expression(&u.operand),
            UnaryOperator::AddressOf => match u.operand.as_ref() {
                Expression::Identifier(ident) => {
                    let var = self.lookup_var(&ident.name).ok_or_else(|| {
                        EmitError::UndefinedIdentifier {
                            name: ident.name.clone(),
                            line: ident.span.line,
                            column: ident.span.column,
                        }
                    })?;
                    let slot = var.slot;
                    self.isa.lea_slot(&mut self.text, IntReg::T0, slot);
                    // Bit-carried like every other pointer; the sized-write
                    // builtins bit-copy it back out.
                    self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
                    Ok(ValueTy::Number)
                }
                other => Err(self.err_at("'$' takes a variable", other.span())),
            },
        }
    }

    /// Spill protocol for two-operand forms: left lands in `FV`, right in
    /// `FSCRATCH`, and the returned types drive overload choice.
    fn emit_operands(
        &mut self,
        left: &Expression,
        right: &Expression,
    ) -> Result<(ValueTy, ValueTy), EmitError> {
        let lty = self.emit_expression(left)?;
        let spill = self.alloc_temp();
        self.isa.fstore_slot(&mut self.text, FV, spill);
        let rty = self.emit_expression(right)?;
        self.isa.fmov(&mut self.text, FSCRATCH, FV);
        self.isa.fload_slot(&mut self.text, FV, spill);
        self.free_temp(spill);
        Ok((lty, rty))
    }

    fn emit_binary(&mut self, bin: &BinaryExpression) -> Result<ValueTy, EmitError> {
        use BinaryOperator::*;
        match bin.operator {
            OrBang => return self.emit_or_bang(bin),
            AndBang => return self.emit_and_bang(bin),
            ParMap => return self.emit_parallel_map(bin),
            _ => {}
        }

        let (lty, rty) = self.emit_operands(&bin.left, &bin.right)?;
        match bin.operator {
            Add => {
                if lty == ValueTy::Str && rty == ValueTy::Str {
                    self.call_ptr_pair_helper(RuntimeFn::StringConcat, "_c67_string_concat");
                    return Ok(ValueTy::Str);
                }
                if lty == ValueTy::List && rty == ValueTy::List {
                    self.call_ptr_pair_helper(RuntimeFn::ListConcat, "_c67_list_concat");
                    return Ok(ValueTy::List);
                }
                self.isa.fadd(&mut self.text, FV, FSCRATCH);
                Ok(ValueTy::Number)
            }
            Sub => {
                self.isa.fsub(&mut self.text, FV, FSCRATCH);
                Ok(ValueTy::Number)
            }
            Mul => {
                self.isa.fmul(&mut self.text, FV, FSCRATCH);
                Ok(ValueTy::Number)
            }
            MulAdd => {
                if lty == ValueTy::List && rty == ValueTy::List {
                    self.emit_dot_product()?;
                    return Ok(ValueTy::Number);
                }
                self.isa.fmul(&mut self.text, FV, FSCRATCH);
                Ok(ValueTy::Number)
            }
            Div => {
                // Division by zero produces the NaN sentinel, not ±inf.
                self.load_f64_zero(FSCRATCH2);
                let zero = self
                    .isa
                    .fbranch_if(&mut self.text, FCond::Eq, FSCRATCH, FSCRATCH2);
                self.isa.fdiv(&mut self.text, FV, FSCRATCH);
                let done = self.isa.jmp_forward(&mut self.text);
                self.isa.bind(&mut self.text, zero)?;
                self.emit_error_sentinel("dv0");
                self.isa.bind(&mut self.text, done)?;
                Ok(ValueTy::Number)
            }
            Rem => {
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FSCRATCH);
                let zero = self
                    .isa
                    .branch_if_imm(&mut self.text, Cond::Eq, IntReg::T1, 0);
                self.isa
                    .srem_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1);
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                let done = self.isa.jmp_forward(&mut self.text);
                self.isa.bind(&mut self.text, zero)?;
                self.emit_error_sentinel("dv0");
                self.isa.bind(&mut self.text, done)?;
                Ok(ValueTy::Number)
            }
            Pow => {
                self.need(RuntimeFn::Pow);
                self.isa.call_symbol(&mut self.text, "_c67_pow");
                Ok(ValueTy::Number)
            }
            Eq => self.emit_fcompare(FCond::Eq),
            Ne => self.emit_fcompare(FCond::Ne),
            Lt => self.emit_fcompare(FCond::Lt),
            Le => self.emit_fcompare(FCond::Le),
            Gt => self.emit_fcompare(FCond::Gt),
            Ge => self.emit_fcompare(FCond::Ge),
            And | Or | Xor => {
                // Boolean-ize both sides, then combine in the integer unit.
                self.load_f64_zero(FSCRATCH2);
                self.isa
                    .fset_if(&mut self.text, FCond::Ne, IntReg::T0, FV, FSCRATCH2);
                self.isa
                    .fset_if(&mut self.text, FCond::Ne, IntReg::T1, FSCRATCH, FSCRATCH2);
                match bin.operator {
                    And => self
                        .isa
                        .and_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1),
                    Or => self
                        .isa
                        .or_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1),
                    _ => self
                        .isa
                        .xor_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1),
                }
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Number)
            }
            Cons => {
                // Element stays in the float argument register, list pointer
                // rides in A0.
                self.need(RuntimeFn::ListCons);
                self.isa.bits_f_to_int(&mut self.text, IntReg::A0, FSCRATCH);
                self.isa.call_symbol(&mut self.text, "_c67_list_cons");
                self.isa.bits_int_to_f(&mut self.text, FV, IntReg::Ret);
                Ok(ValueTy::List)
            }
            BitOr | BitAnd | BitXor | Shl | Shr | Rol | Ror | BitTest => {
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FSCRATCH);
                match bin.operator {
                    BitOr => self
                        .isa
                        .or_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1),
                    BitAnd => self
                        .isa
                        .and_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1),
                    BitXor => self
                        .isa
                        .xor_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1),
                    Shl => self.isa.shl_reg(&mut self.text, IntReg::T0, IntReg::T1),
                    Shr => self.isa.shr_reg(&mut self.text, IntReg::T0, IntReg::T1),
                    Rol => self.isa.rol_reg(&mut self.text, IntReg::T0, IntReg::T1),
                    Ror => self.isa.ror_reg(&mut self.text, IntReg::T0, IntReg::T1),
                    BitTest => {
                        self.isa.shr_reg(&mut self.text, IntReg::T0, IntReg::T1);
                        self.isa.mov_imm_to_reg(&mut self.text, IntReg::T1, 1);
                        self.isa
                            .and_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1);
                    }
                    _ => unreachable!(),
                }
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Number)
            }
            In => {
                self.need(RuntimeFn::Contains);
                self.isa.bits_f_to_int(&mut self.text, IntReg::A0, FSCRATCH);
                self.isa.call_symbol(&mut self.text, "_c67_contains");
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::Ret);
                Ok(ValueTy::Number)
            }
            Has => {
                self.need(RuntimeFn::MapHas);
                // Operands arrive as (map, key); the helper wants the key in
                // the float argument and the map pointer in A0.
                self.isa.bits_f_to_int(&mut self.text, IntReg::A0, FV);
                self.isa.fmov(&mut self.text, FV, FSCRATCH);
                self.isa.call_symbol(&mut self.text, "_c67_map_has");
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::Ret);
                Ok(ValueTy::Number)
            }
            OrBang | AndBang | ParMap => unreachable!("handled above"),
        }
    }

    fn emit_fcompare(&mut self, cc: FCond) -> Result<ValueTy, EmitError> {
        self.isa
            .fset_if(&mut self.text, cc, IntReg::T0, FV, FSCRATCH);
        self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
        Ok(ValueTy::Number)
    }

    fn call_ptr_pair_helper(&mut self, f: RuntimeFn, label: &str) {
        self.need(f);
        self.isa.bits_f_to_int(&mut self.text, IntReg::A0, FV);
        self.isa.bits_f_to_int(&mut self.text, IntReg::A1, FSCRATCH);
        self.isa.call_symbol(&mut self.text, label);
        self.isa.bits_int_to_f(&mut self.text, FV, IntReg::Ret);
    }

    /// `left or! right`: right side runs when the left is the NaN sentinel
    /// or a null pointer.
    fn emit_or_bang(&mut self, bin: &BinaryExpression) -> Result<ValueTy, EmitError> {
        let lty = self.emit_expression(&bin.left)?;
        let nan = self.isa.fbranch_if_nan(&mut self.text, FV);
        self.isa.bits_f_to_int(&mut self.text, IntReg::T0, FV);
        let null = self
            .isa
            .branch_if_imm(&mut self.text, Cond::Eq, IntReg::T0, 0);
        let done = self.isa.jmp_forward(&mut self.text);
        self.isa.bind(&mut self.text, nan)?;
        self.isa.bind(&mut self.text, null)?;
        let rty = self.emit_expression(&bin.right)?;
        self.isa.bind(&mut self.text, done)?;
        Ok(if lty == rty { lty } else { ValueTy::Unknown })
    }

    /// `left and! right`: the sentinel on the left short-circuits through.
    fn emit_and_bang(&mut self, bin: &BinaryExpression) -> Result<ValueTy, EmitError> {
        self.emit_expression(&bin.left)?;
        let nan = self.isa.fbranch_if_nan(&mut self.text, FV);
        let rty = self.emit_expression(&bin.right)?;
        let done = self.isa.jmp_forward(&mut self.text);
        self.isa.bind(&mut self.text, nan)?;
        self.load_nan(FV);
        self.isa.bind(&mut self.text, done)?;
        Ok(rty)
    }

    /// `xs || f` — sequential lowering: allocate a same-length list and
    /// apply `f` element by element; there is no implicit concurrency.
    fn emit_parallel_map(&mut self, bin: &BinaryExpression) -> Result<ValueTy, EmitError> {
        self.need(RuntimeFn::Alloc);
        let src = self.alloc_temp();
        let fptr = self.alloc_temp();
        let dst = self.alloc_temp();
        let count = self.alloc_temp();
        let idx = self.alloc_temp();

        self.emit_expression(&bin.left)?;
        self.isa.fstore_slot(&mut self.text, FV, src);
        self.emit_expression(&bin.right)?;
        self.isa.fstore_slot(&mut self.text, FV, fptr);

        // count = src[0]
        self.isa.load_slot(&mut self.text, IntReg::T0, src);
        self.isa.fload(&mut self.text, FSCRATCH, IntReg::T0, 0);
        self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FSCRATCH);
        self.isa.store_slot(&mut self.text, IntReg::T1, count);

        // dst = alloc(8 + 8*count); dst[0] = count
        self.isa.mov_reg_reg(&mut self.text, IntReg::A0, IntReg::T1);
        self.isa.shl_imm(&mut self.text, IntReg::A0, 3);
        self.isa.add_imm(&mut self.text, IntReg::A0, 8);
        self.isa.call_symbol(&mut self.text, "_c67_alloc");
        self.isa.store_slot(&mut self.text, IntReg::Ret, dst);
        self.isa.load_slot(&mut self.text, IntReg::T1, count);
        self.isa.cvt_int_to_f(&mut self.text, FSCRATCH, IntReg::T1);
        self.isa.load_slot(&mut self.text, IntReg::T0, dst);
        self.isa.fstore(&mut self.text, FSCRATCH, IntReg::T0, 0);

        self.isa.mov_imm_to_reg(&mut self.text, IntReg::T0, 0);
        self.isa.store_slot(&mut self.text, IntReg::T0, idx);

        let head = self.text.offset();
        self.isa.load_slot(&mut self.text, IntReg::T0, idx);
        self.isa.load_slot(&mut self.text, IntReg::T1, count);
        let done = self
            .isa
            .branch_if(&mut self.text, Cond::Ge, IntReg::T0, IntReg::T1);

        // element -> first float argument
        self.isa.load_slot(&mut self.text, IntReg::T2, src);
        self.isa.shl_imm(&mut self.text, IntReg::T0, 3);
        self.isa
            .add_reg_to_reg(&mut self.text, IntReg::T2, IntReg::T0);
        self.isa.fload(&mut self.text, FloatReg(0), IntReg::T2, 8);
        self.isa.load_slot(&mut self.text, IntReg::T1, fptr);
        self.isa.call_reg(&mut self.text, IntReg::T1);

        // dst[idx] = result
        self.isa.load_slot(&mut self.text, IntReg::T2, dst);
        self.isa.load_slot(&mut self.text, IntReg::T0, idx);
        self.isa.shl_imm(&mut self.text, IntReg::T0, 3);
        self.isa
            .add_reg_to_reg(&mut self.text, IntReg::T2, IntReg::T0);
        self.isa.fstore(&mut self.text, FV, IntReg::T2, 8);

        self.isa.load_slot(&mut self.text, IntReg::T0, idx);
        self.isa.add_imm(&mut self.text, IntReg::T0, 1);
        self.isa.store_slot(&mut self.text, IntReg::T0, idx);
        self.isa.jmp_backward(&mut self.text, head);

        self.isa.bind(&mut self.text, done)?;
        self.isa.load_slot(&mut self.text, IntReg::T0, dst);
        self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);

        self.free_temp(idx);
        self.free_temp(count);
        self.free_temp(dst);
        self.free_temp(fptr);
        self.free_temp(src);
        Ok(ValueTy::List)
    }

    /// Dot product of two equal-length lists via the FMA primitive.
    /// Operands are already in FV (left pointer) and FSCRATCH (right).
    fn emit_dot_product(&mut self) -> Result<(), EmitError> {
        let pa = self.alloc_temp();
        let pb = self.alloc_temp();
        let count = self.alloc_temp();
        let idx = self.alloc_temp();
        let acc = self.alloc_temp();

        self.isa.fstore_slot(&mut self.text, FV, pa);
        self.isa.fstore_slot(&mut self.text, FSCRATCH, pb);
        self.isa.load_slot(&mut self.text, IntReg::T0, pa);
        self.isa.fload(&mut self.text, FSCRATCH2, IntReg::T0, 0);
        self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FSCRATCH2);
        self.isa.store_slot(&mut self.text, IntReg::T1, count);
        self.isa.mov_imm_to_reg(&mut self.text, IntReg::T0, 0);
        self.isa.store_slot(&mut self.text, IntReg::T0, idx);
        self.load_f64_zero(FV);
        self.isa.fstore_slot(&mut self.text, FV, acc);

        let head = self.text.offset();
        self.isa.load_slot(&mut self.text, IntReg::T0, idx);
        self.isa.load_slot(&mut self.text, IntReg::T1, count);
        let done = self
            .isa
            .branch_if(&mut self.text, Cond::Ge, IntReg::T0, IntReg::T1);

        self.isa.load_slot(&mut self.text, IntReg::T2, pa);
        self.isa.shl_imm(&mut self.text, IntReg::T0, 3);
        self.isa
            .add_reg_to_reg(&mut self.text, IntReg::T2, IntReg::T0);
        self.isa.fload(&mut self.text, FSCRATCH, IntReg::T2, 8);
        self.isa.load_slot(&mut self.text, IntReg::T2, pb);
        self.isa.load_slot(&mut self.text, IntReg::T0, idx);
        self.isa.shl_imm(&mut self.text, IntReg::T0, 3);
        self.isa
            .add_reg_to_reg(&mut self.text, IntReg::T2, IntReg::T0);
        self.isa.fload(&mut self.text, FSCRATCH2, IntReg::T2, 8);
        self.isa.fload_slot(&mut self.text, FV, acc);
        self.isa.fmadd(&mut self.text, FV, FSCRATCH, FSCRATCH2);
        self.isa.fstore_slot(&mut self.text, FV, acc);

        self.isa.load_slot(&mut self.text, IntReg::T0, idx);
        self.isa.add_imm(&mut self.text, IntReg::T0, 1);
        self.isa.store_slot(&mut self.text, IntReg::T0, idx);
        self.isa.jmp_backward(&mut self.text, head);

        self.isa.bind(&mut self.text, done)?;
        self.isa.fload_slot(&mut self.text, FV, acc);

        self.free_temp(acc);
        self.free_temp(idx);
        self.free_temp(count);
        self.free_temp(pb);
        self.free_temp(pa);
        Ok(())
    }

    fn emit_postfix(&mut self, p: &PostfixExpression) -> Result<ValueTy, EmitError> {
        match p.operator {
            PostfixOperator::Increment | PostfixOperator::Decrement => {
                let ident = match p.operand.as_ref() {
                    Expression::Identifier(i) => i,
                    other => {
                        return Err(self.err_at("'++'/'--' take a variable", other.span()))
                    }
                };
                let var = self.lookup_var(&ident.name).ok_or_else(|| {
                    EmitError::UndefinedIdentifier {
                        name: ident.name.clone(),
                        line: ident.span.line,
                        column: ident.span.column,
                    }
                })?;
                if !var.mutable {
                    return Err(EmitError::ImmutableUpdate {
                        name: ident.name.clone(),
                        line: ident.span.line,
                        column: ident.span.column,
                    });
                }
                let slot = var.slot;
                self.isa.fload_slot(&mut self.text, FV, slot);
                self.load_f64_const(FSCRATCH, 1.0);
                if p.operator == PostfixOperator::Increment {
                    self.isa.fadd(&mut self.text, FV, FSCRATCH);
                } else {
                    self.isa.fsub(&mut self.text, FV, FSCRATCH);
                }
                self.isa.fstore_slot(&mut self.text, FV, slot);
                Ok(ValueTy::Number)
            }
            PostfixOperator::Random => {
                self.emit_expression(&p.operand)?;
                self.need(RuntimeFn::Rand);
                self.isa.call_symbol(&mut self.text, "_c67_rand");
                Ok(ValueTy::Number)
            }
            PostfixOperator::ErrProbe | PostfixOperator::ValProbe => {
                self.emit_expression(&p.operand)?;
                let on_err = i64::from(p.operator == PostfixOperator::ErrProbe);
                let nan = self.isa.fbranch_if_nan(&mut self.text, FV);
                self.isa
                    .mov_imm_to_reg(&mut self.text, IntReg::T0, 1 - on_err);
                let done = self.isa.jmp_forward(&mut self.text);
                self.isa.bind(&mut self.text, nan)?;
                self.isa.mov_imm_to_reg(&mut self.text, IntReg::T0, on_err);
                self.isa.bind(&mut self.text, done)?;
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Number)
            }
        }
    }

    fn emit_index(&mut self, ix: &IndexExpression) -> Result<ValueTy, EmitError> {
        let base_ty = self.emit_expression(&ix.base)?;
        let base = self.alloc_temp();
        self.isa.fstore_slot(&mut self.text, FV, base);
        self.emit_expression(&ix.index)?;

        match base_ty {
            ValueTy::Map => {
                self.need(RuntimeFn::MapGet);
                self.isa.load_slot(&mut self.text, IntReg::A0, base);
                self.isa.call_symbol(&mut self.text, "_c67_map_get");
                self.free_temp(base);
                return Ok(ValueTy::Unknown);
            }
            ValueTy::Str => {
                // Character entries sit at ptr + 16 + 16*i + 8… i.e. every
                // 16 bytes starting at offset 16.
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FV);
                self.isa.load_slot(&mut self.text, IntReg::T0, base);
                self.isa.shl_imm(&mut self.text, IntReg::T1, 4);
                self.isa
                    .add_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1);
                self.isa.fload(&mut self.text, FV, IntReg::T0, 16);
                self.free_temp(base);
                return Ok(ValueTy::Number);
            }
            _ => {}
        }
        // Lists (and unknowns treated as lists): ptr + 8 + 8*i.
        self.isa.cvt_f_to_int(&mut self.text, IntReg::T1, FV);
        self.isa.load_slot(&mut self.text, IntReg::T0, base);
        self.isa.shl_imm(&mut self.text, IntReg::T1, 3);
        self.isa
            .add_reg_to_reg(&mut self.text, IntReg::T0, IntReg::T1);
        self.isa.fload(&mut self.text, FV, IntReg::T0, 8);
        self.free_temp(base);
        Ok(ValueTy::Number)
    }

    fn emit_member(&mut self, m: &MemberExpression) -> Result<ValueTy, EmitError> {
        // Namespace constants and class methods resolve without evaluating
        // the base.
        if let Expression::Identifier(base) = m.base.as_ref() {
            let ns = self.resolve_name(&base.name);
            if let Some(logical) = self.namespaces.get(&ns).cloned() {
                if let Some(header) = self.cheaders.get(&logical) {
                    if let Some(&value) = header.constants.get(&m.field) {
                        self.load_f64_const(FV, value as f64);
                        return Ok(ValueTy::Number);
                    }
                }
                return Err(self.err_at(
                    format!("unknown constant '{}' in namespace '{}'", m.field, ns),
                    &m.span,
                ));
            }
            let qualified = format!("{}.{}", ns, m.field);
            if let Some(label) = self.class_methods.get(&qualified).cloned() {
                self.isa.lea_symbol(&mut self.text, IntReg::T0, &label);
                self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
                return Ok(ValueTy::Lambda);
            }
        }

        if m.field == "error" {
            // The error-tag slot set by the last failed operation.
            self.emit_expression(&m.base)?;
            self.ensure_data("_c67_last_error", 8);
            self.isa
                .lea_symbol(&mut self.text, IntReg::T0, "_c67_last_error");
            self.isa
                .load(&mut self.text, IntReg::T1, IntReg::T0, 0, MemSize::B8);
            self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T1);
            return Ok(ValueTy::Str);
        }

        // C-struct field read through a pointer value.
        let base_ty = self.emit_expression(&m.base)?;
        if let ValueTy::Struct(name) = base_ty {
            let layout = self.cstructs.get(&name).cloned().ok_or_else(|| {
                self.err_at(format!("unknown cstruct '{}'", name), &m.span)
            })?;
            let (offset, size) = *layout.fields.get(&m.field).ok_or_else(|| {
                self.err_at(
                    format!("cstruct '{}' has no field '{}'", name, m.field),
                    &m.span,
                )
            })?;
            self.isa.bits_f_to_int(&mut self.text, IntReg::T0, FV);
            self.isa
                .load(&mut self.text, IntReg::T1, IntReg::T0, offset as i32, size);
            self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T1);
            return Ok(ValueTy::Number);
        }

        Err(self.err_at(format!("unknown field '{}'", m.field), &m.span))
    }

    fn emit_cast(&mut self, c: &CastExpression) -> Result<ValueTy, EmitError> {
        let ty = self.emit_expression(&c.operand)?;
        match c.target.as_str() {
            "f64" | "float" | "num" => Ok(ValueTy::Number),
            "str" => {
                if ty != ValueTy::Str {
                    self.need(RuntimeFn::Str);
                    self.isa.call_symbol(&mut self.text, "_c67_str");
                    self.isa.bits_int_to_f(&mut self.text, FV, IntReg::Ret);
                }
                Ok(ValueTy::Str)
            }
            "int" | "i64" => {
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Number)
            }
            "i32" | "i16" | "i8" => {
                let bits: u8 = match c.target.as_str() {
                    "i32" => 32,
                    "i16" => 48,
                    _ => 56,
                };
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.shl_imm(&mut self.text, IntReg::T0, bits);
                self.isa.mov_imm_to_reg(&mut self.text, IntReg::T1, bits as i64);
                self.isa.shr_reg(&mut self.text, IntReg::T0, IntReg::T1);
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Number)
            }
            "u32" | "u16" | "u8" => {
                let bits: u8 = match c.target.as_str() {
                    "u32" => 32,
                    "u16" => 48,
                    _ => 56,
                };
                self.isa.cvt_f_to_int(&mut self.text, IntReg::T0, FV);
                self.isa.shl_imm(&mut self.text, IntReg::T0, bits);
                self.isa.shr_imm(&mut self.text, IntReg::T0, bits);
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
                Ok(ValueTy::Number)
            }
            name if self.cstructs.contains_key(name) => Ok(ValueTy::Struct(name.to_string())),
            other => Err(self.err_at(format!("unknown cast target '{}'", other), &c.span)),
        }
    }

    fn emit_lambda_value(&mut self, l: &LambdaExpression) -> Result<ValueTy, EmitError> {
        if l.params.len() > 8 {
            return Err(self.err_at("lambdas take at most 8 parameters", &l.span));
        }
        let label = self.next_lambda_label();
        let bound_var = self.current_bind.take();
        self.pending.push_back(PendingLambda {
            label: label.clone(),
            params: l.params.clone(),
            body: (*l.body).clone(),
            bound_var,
        });
        self.last_lambda_label = Some(label.clone());
        // The expression's value is the address of the forthcoming code.
        self.isa.lea_symbol(&mut self.text, IntReg::T0, &label);
        self.isa.bits_int_to_f(&mut self.text, FV, IntReg::T0);
        Ok(ValueTy::Lambda)
    }

    fn emit_match(&mut self, m: &MatchExpression) -> Result<ValueTy, EmitError> {
        let subject = match &m.subject {
            Some(subject) => {
                self.emit_expression(subject)?;
                let slot = self.alloc_temp();
                self.isa.fstore_slot(&mut self.text, FV, slot);
                Some(slot)
            }
            None => None,
        };

        let mut end_jumps = Vec::new();
        for arm in &m.arms {
            let mut body_jumps = Vec::new();
            for guard in &arm.guards {
                self.emit_expression(guard)?;
                match subject {
                    Some(slot) => {
                        // Value-equal arm: compare against the spilled
                        // subject.
                        self.isa.fload_slot(&mut self.text, FSCRATCH, slot);
                        body_jumps.push(self.isa.fbranch_if(
                            &mut self.text,
                            FCond::Eq,
                            FV,
                            FSCRATCH,
                        ));
                    }
                    None => {
                        // Boolean guard: nonzero takes the arm.
                        self.load_f64_zero(FSCRATCH);
                        body_jumps.push(self.isa.fbranch_if(
                            &mut self.text,
                            FCond::Ne,
                            FV,
                            FSCRATCH,
                        ));
                    }
                }
            }
            let next_arm = self.isa.jmp_forward(&mut self.text);
            for jump in body_jumps {
                self.isa.bind(&mut self.text, jump)?;
            }
            self.emit_expression(&arm.body)?;
            end_jumps.push(self.isa.jmp_forward(&mut self.text));
            self.isa.bind(&mut self.text, next_arm)?;
        }

        match &m.default {
            Some(default) => {
                self.emit_expression(default)?;
            }
            None => self.load_f64_const(FV, 0.0),
        }
        for jump in end_jumps {
            self.isa.bind(&mut self.text, jump)?;
        }
        if let Some(slot) = subject {
            self.free_temp(slot);
        }
        Ok(ValueTy::Unknown)
    }

    fn emit_loop_meta(&mut self, meta: &LoopMetaExpression) -> Result<ValueTy, EmitError> {
        let depth = match meta.kind {
            LoopMetaKind::Index(n) => n as usize,
            _ => 0,
        };
        let loops = &self.frame().loops;
        if loops.len() <= depth {
            return Err(self.err_at("loop metadata used outside a loop", &meta.span));
        }
        let frame = &loops[loops.len() - 1 - depth];
        let (idx_slot, bound_slot) = (frame.idx_slot, frame.bound_slot);

        match meta.kind {
            LoopMetaKind::Counter | LoopMetaKind::Index(_) => {
                self.isa.load_slot(&mut self.text, IntReg::T0, idx_slot);
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
            }
            LoopMetaKind::First => {
                self.isa.load_slot(&mut self.text, IntReg::T0, idx_slot);
                self.isa.mov_imm_to_reg(&mut self.text, IntReg::T1, 0);
                self.isa
                    .set_if(&mut self.text, Cond::Eq, IntReg::T0, IntReg::T0, IntReg::T1);
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
            }
            LoopMetaKind::Last => {
                self.isa.load_slot(&mut self.text, IntReg::T0, idx_slot);
                self.isa.load_slot(&mut self.text, IntReg::T1, bound_slot);
                self.isa.add_imm(&mut self.text, IntReg::T1, -1);
                self.isa
                    .set_if(&mut self.text, Cond::Eq, IntReg::T0, IntReg::T0, IntReg::T1);
                self.isa.cvt_int_to_f(&mut self.text, FV, IntReg::T0);
            }
        }
        Ok(ValueTy::Number)
    }

    pub(crate) fn load_f64_zero(&mut self, dst: FloatReg) {
        self.isa.mov_imm_to_reg(&mut self.text, IntReg::T2, 0);
        self.isa.cvt_int_to_f(&mut self.text, dst, IntReg::T2);
    }
}
