//! Runtime support routines emitted into every output binary that needs
//! them.
//!
//! Each routine is written once against the [`Isa`](crate::isa::Isa)
//! surface, so the same body serves all three architectures. Routines use an
//! internal ABI: pointers in `A0`/`A1`, the fd for print helpers in `A2`,
//! float values in the float argument registers, results in `Ret`/`FV`.
//! Loop state that must survive calls or syscalls lives in frame slots.

use crate::emitter::{syscall_nr, Emitter, Frame, Sys};
use crate::error::EmitError;
use crate::isa::{Cond, FCond, IntReg, MemSize, FSCRATCH, FSCRATCH2, FV};
use crate::target::{Arch, LinkStrategy, Os};
use log::debug;

/// The helpers a compile may pull in. Order of emission follows order of
/// first need; dependencies are appended while emitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFn {
    Alloc,
    Itoa,
    Ftoa,
    Str,
    StringConcat,
    ListConcat,
    ListCons,
    Contains,
    MapHas,
    MapGet,
    Pow,
    PrintF64,
    PrintStr,
    PrintList,
    PrintMap,
    Putch,
    Cstr,
    Rand,
}

impl RuntimeFn {
    pub fn label(self) -> &'static str {
        match self {
            RuntimeFn::Alloc => "_c67_alloc",
            RuntimeFn::Itoa => "_c67_itoa",
            RuntimeFn::Ftoa => "_c67_ftoa",
            RuntimeFn::Str => "_c67_str",
            RuntimeFn::StringConcat => "_c67_string_concat",
            RuntimeFn::ListConcat => "_c67_list_concat",
            RuntimeFn::ListCons => "_c67_list_cons",
            RuntimeFn::Contains => "_c67_contains",
            RuntimeFn::MapHas => "_c67_map_has",
            RuntimeFn::MapGet => "_c67_map_get",
            RuntimeFn::Pow => "_c67_pow",
            RuntimeFn::PrintF64 => "_c67_print_f64",
            RuntimeFn::PrintStr => "_c67_print_str",
            RuntimeFn::PrintList => "_c67_print_list",
            RuntimeFn::PrintMap => "_c67_print_map",
            RuntimeFn::Putch => "_c67_putch",
            RuntimeFn::Cstr => "_c67_cstr",
            RuntimeFn::Rand => "_c67_rand",
        }
    }
}

/// Emit every needed helper; helpers may need further helpers, so the list
/// is walked by index until quiet.
pub(crate) fn emit_runtime(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    let mut i = 0;
    while i < em.needed.len() {
        let f = em.needed[i];
        debug!("emitting runtime helper {}", f.label());
        begin(em, f.label())?;
        match f {
            RuntimeFn::Alloc => body_alloc(em),
            RuntimeFn::Itoa => body_itoa(em)?,
            RuntimeFn::Ftoa => body_ftoa(em)?,
            RuntimeFn::Str => body_str(em)?,
            RuntimeFn::StringConcat => body_concat(em, true)?,
            RuntimeFn::ListConcat => body_concat(em, false)?,
            RuntimeFn::ListCons => body_list_cons(em)?,
            RuntimeFn::Contains => body_search(em, SearchKind::ListContains)?,
            RuntimeFn::MapHas => body_search(em, SearchKind::MapHas)?,
            RuntimeFn::MapGet => body_search(em, SearchKind::MapGet)?,
            RuntimeFn::Pow => body_pow(em)?,
            RuntimeFn::PrintF64 => body_print_f64(em)?,
            RuntimeFn::PrintStr => body_print_str(em)?,
            RuntimeFn::PrintList => body_print_seq(em, false)?,
            RuntimeFn::PrintMap => body_print_seq(em, true)?,
            RuntimeFn::Putch => body_putch(em)?,
            RuntimeFn::Cstr => body_cstr(em)?,
            RuntimeFn::Rand => body_rand(em)?,
        }
        finish(em)?;
        i += 1;
    }
    Ok(())
}

fn begin(em: &mut Emitter<'_>, label: &str) -> Result<(), EmitError> {
    em.labels.mark(label, em.text.offset())?;
    em.frames.push(Frame::new(label, false));
    let patch = em.isa.prologue(&mut em.text);
    em.frame_mut().patch = patch;
    Ok(())
}

fn finish(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    let mut patch = std::mem::take(&mut em.frame_mut().patch);
    em.isa.epilogue(&mut em.text, &mut patch);
    em.frame_mut().patch = patch;
    em.finish_frame()
}

/// `_c67_alloc(A0 = size) -> Ret`: anonymous mmap on syscall targets,
/// `malloc` import elsewhere.
fn body_alloc(em: &mut Emitter<'_>) {
    let syscall_path = em.strategy == LinkStrategy::Static || em.target.os == Os::Darwin;
    if syscall_path {
        let flags: i64 = if em.target.os == Os::Darwin {
            0x1002 // MAP_ANON | MAP_PRIVATE
        } else {
            0x22 // MAP_PRIVATE | MAP_ANONYMOUS
        };
        let (s0, s1, s2, s3, s4, s5) = (
            em.isa.sysarg(0),
            em.isa.sysarg(1),
            em.isa.sysarg(2),
            em.isa.sysarg(3),
            em.isa.sysarg(4),
            em.isa.sysarg(5),
        );
        em.isa.mov_reg_reg(&mut em.text, s1, IntReg::A0);
        em.isa.mov_imm_to_reg(&mut em.text, s0, 0);
        em.isa.mov_imm_to_reg(&mut em.text, s2, 3); // PROT_READ | PROT_WRITE
        em.isa.mov_imm_to_reg(&mut em.text, s3, flags);
        em.isa.mov_imm_to_reg(&mut em.text, s4, -1);
        em.isa.mov_imm_to_reg(&mut em.text, s5, 0);
        let nr = syscall_nr(em.target.arch, em.target.os, Sys::Mmap);
        em.isa.mov_imm_to_reg(&mut em.text, IntReg::SysNum, nr);
        em.isa.syscall(&mut em.text);
    } else if em.target.os == Os::Windows {
        em.register_import("malloc", "c");
        let arg0 = em.isa.int_arg(0);
        em.isa.mov_reg_reg(&mut em.text, arg0, IntReg::A0);
        em.emit_win_call_import("malloc");
    } else {
        em.register_import("malloc", "c");
        em.isa.call_import(&mut em.text, "malloc");
    }
}

/// Shared backward-building digit loop. The cursor is predecremented into
/// `_itoa_buffer + 128`; `value_reg` is destroyed. Divisor 10 sits in A1.
fn emit_digit_loop(em: &mut Emitter<'_>, value_reg: IntReg) -> Result<(), EmitError> {
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::A1, 10);
    let head = em.text.offset();
    em.isa.mov_reg_reg(&mut em.text, IntReg::T0, value_reg);
    em.isa.srem_reg_to_reg(&mut em.text, IntReg::T0, IntReg::A1);
    em.isa.add_imm(&mut em.text, IntReg::T0, 48);
    em.isa.add_imm(&mut em.text, IntReg::T2, -1);
    em.isa
        .store(&mut em.text, IntReg::T0, IntReg::T2, 0, MemSize::B1);
    em.isa.sdiv_reg_to_reg(&mut em.text, value_reg, IntReg::A1);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T1, 0);
    em.isa
        .branch_if_backward(&mut em.text, Cond::Ne, value_reg, IntReg::T1, head);
    Ok(())
}

/// Finish a backward build: `Ret = cursor`, `A1 = end - cursor` (length).
fn emit_backward_epilogue(em: &mut Emitter<'_>) {
    em.isa.lea_symbol(&mut em.text, IntReg::A1, "_itoa_buffer");
    em.isa.add_imm(&mut em.text, IntReg::A1, 128);
    em.isa.sub_reg_to_reg(&mut em.text, IntReg::A1, IntReg::T2);
    em.isa.mov_reg_reg(&mut em.text, IntReg::Ret, IntReg::T2);
}

/// `_c67_itoa(A0 = integer) -> Ret = text ptr, A1 = length`. Owns the
/// 128-byte `_itoa_buffer` global.
fn body_itoa(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    em.ensure_data("_itoa_buffer", 128);
    let sign = em.alloc_slot();

    em.isa.lea_symbol(&mut em.text, IntReg::T2, "_itoa_buffer");
    em.isa.add_imm(&mut em.text, IntReg::T2, 128);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
    em.isa.store_slot(&mut em.text, IntReg::T0, sign);

    let nonneg = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Ge, IntReg::A0, 0);
    em.isa.neg_reg(&mut em.text, IntReg::A0);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 1);
    em.isa.store_slot(&mut em.text, IntReg::T0, sign);
    em.isa.bind(&mut em.text, nonneg)?;

    em.isa.mov_reg_reg(&mut em.text, IntReg::A4, IntReg::A0);
    emit_digit_loop(em, IntReg::A4)?;

    em.isa.load_slot(&mut em.text, IntReg::T0, sign);
    let unsigned = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Eq, IntReg::T0, 0);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, b'-' as i64);
    em.isa.add_imm(&mut em.text, IntReg::T2, -1);
    em.isa
        .store(&mut em.text, IntReg::T0, IntReg::T2, 0, MemSize::B1);
    em.isa.bind(&mut em.text, unsigned)?;

    emit_backward_epilogue(em);
    Ok(())
}

/// `_c67_ftoa(FV = value) -> Ret = text ptr, A1 = length`. Integral values
/// print without a decimal part; up to six fractional digits otherwise,
/// trailing zeros trimmed.
fn body_ftoa(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    em.ensure_data("_itoa_buffer", 128);
    let sign = em.alloc_slot();

    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
    em.isa.store_slot(&mut em.text, IntReg::T0, sign);

    // Fold the sign into a flag so digits see a nonnegative value. This
    // happens before the cursor claims T2: the float branch may scratch it.
    em.load_f64_zero(FSCRATCH);
    let nonneg = em.isa.fbranch_if(&mut em.text, FCond::Ge, FV, FSCRATCH);
    em.isa.fneg(&mut em.text, FV);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 1);
    em.isa.store_slot(&mut em.text, IntReg::T0, sign);
    em.isa.bind(&mut em.text, nonneg)?;

    // Build backward from the end of the buffer; T2 is the cursor from
    // here on.
    em.isa.lea_symbol(&mut em.text, IntReg::T2, "_itoa_buffer");
    em.isa.add_imm(&mut em.text, IntReg::T2, 128);

    // A4 = integer part; FSCRATCH = fractional part.
    em.isa.cvt_f_to_int(&mut em.text, IntReg::A4, FV);
    em.isa.cvt_int_to_f(&mut em.text, FSCRATCH2, IntReg::A4);
    em.isa.fmov(&mut em.text, FSCRATCH, FV);
    em.isa.fsub(&mut em.text, FSCRATCH, FSCRATCH2);

    // A5 = round(frac * 1e6)
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 1_000_000);
    em.isa.cvt_int_to_f(&mut em.text, FSCRATCH2, IntReg::T0);
    em.isa.fmul(&mut em.text, FSCRATCH, FSCRATCH2);
    let half = em.intern_f64(0.5);
    em.isa.lea_symbol(&mut em.text, IntReg::T0, &half);
    em.isa.fload(&mut em.text, FSCRATCH2, IntReg::T0, 0);
    em.isa.fadd(&mut em.text, FSCRATCH, FSCRATCH2);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::A5, FSCRATCH);

    // Rounding carry into the integer part. The comparison goes through a
    // register so no backend touches the cursor in T2.
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T1, 1_000_000);
    let no_carry = em
        .isa
        .branch_if(&mut em.text, Cond::Lt, IntReg::A5, IntReg::T1);
    em.isa.add_imm(&mut em.text, IntReg::A4, 1);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::A5, 0);
    em.isa.bind(&mut em.text, no_carry)?;

    // Fractional digits, built backward with trailing zeros skipped.
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::A3, 6);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::A1, 10);
    // Phase 1: drop trailing zeros.
    let skip_head = em.text.offset();
    let no_frac = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Le, IntReg::A3, 0);
    em.isa.mov_reg_reg(&mut em.text, IntReg::T0, IntReg::A5);
    em.isa.srem_reg_to_reg(&mut em.text, IntReg::T0, IntReg::A1);
    let digits_start = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Ne, IntReg::T0, 0);
    em.isa.sdiv_reg_to_reg(&mut em.text, IntReg::A5, IntReg::A1);
    em.isa.add_imm(&mut em.text, IntReg::A3, -1);
    em.isa.jmp_backward(&mut em.text, skip_head);

    // Phase 2: remaining fractional digits, then the point.
    em.isa.bind(&mut em.text, digits_start)?;
    let frac_head = em.text.offset();
    em.isa.mov_reg_reg(&mut em.text, IntReg::T0, IntReg::A5);
    em.isa.srem_reg_to_reg(&mut em.text, IntReg::T0, IntReg::A1);
    em.isa.add_imm(&mut em.text, IntReg::T0, 48);
    em.isa.add_imm(&mut em.text, IntReg::T2, -1);
    em.isa
        .store(&mut em.text, IntReg::T0, IntReg::T2, 0, MemSize::B1);
    em.isa.sdiv_reg_to_reg(&mut em.text, IntReg::A5, IntReg::A1);
    em.isa.add_imm(&mut em.text, IntReg::A3, -1);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T1, 0);
    em.isa
        .branch_if_backward(&mut em.text, Cond::Gt, IntReg::A3, IntReg::T1, frac_head);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, b'.' as i64);
    em.isa.add_imm(&mut em.text, IntReg::T2, -1);
    em.isa
        .store(&mut em.text, IntReg::T0, IntReg::T2, 0, MemSize::B1);
    em.isa.bind(&mut em.text, no_frac)?;

    // Integer digits and sign.
    emit_digit_loop(em, IntReg::A4)?;
    em.isa.load_slot(&mut em.text, IntReg::T0, sign);
    let unsigned = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Eq, IntReg::T0, 0);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, b'-' as i64);
    em.isa.add_imm(&mut em.text, IntReg::T2, -1);
    em.isa
        .store(&mut em.text, IntReg::T0, IntReg::T2, 0, MemSize::B1);
    em.isa.bind(&mut em.text, unsigned)?;

    emit_backward_epilogue(em);
    Ok(())
}

/// `_c67_str(FV = value) -> Ret = map-string`.
fn body_str(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    em.need(RuntimeFn::Ftoa);
    em.need(RuntimeFn::Alloc);
    let text_ptr = em.alloc_slot();
    let len = em.alloc_slot();
    let dst = em.alloc_slot();
    let i = em.alloc_slot();

    em.isa.call_symbol(&mut em.text, "_c67_ftoa");
    em.isa.store_slot(&mut em.text, IntReg::Ret, text_ptr);
    em.isa.store_slot(&mut em.text, IntReg::A1, len);

    // dst = alloc(8 + 16*len); dst[0] = len
    em.isa.mov_reg_reg(&mut em.text, IntReg::A0, IntReg::A1);
    em.isa.shl_imm(&mut em.text, IntReg::A0, 4);
    em.isa.add_imm(&mut em.text, IntReg::A0, 8);
    em.isa.call_symbol(&mut em.text, "_c67_alloc");
    em.isa.store_slot(&mut em.text, IntReg::Ret, dst);
    em.isa.load_slot(&mut em.text, IntReg::T0, len);
    em.isa.cvt_int_to_f(&mut em.text, FSCRATCH, IntReg::T0);
    em.isa.load_slot(&mut em.text, IntReg::T1, dst);
    em.isa.fstore(&mut em.text, FSCRATCH, IntReg::T1, 0);

    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);
    let head = em.text.offset();
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.load_slot(&mut em.text, IntReg::T1, len);
    let done = em
        .isa
        .branch_if(&mut em.text, Cond::Ge, IntReg::T0, IntReg::T1);

    // char code
    em.isa.load_slot(&mut em.text, IntReg::T2, text_ptr);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa
        .load(&mut em.text, IntReg::T1, IntReg::T2, 0, MemSize::B1);
    em.isa.cvt_int_to_f(&mut em.text, FSCRATCH, IntReg::T1);
    // entry address
    em.isa.load_slot(&mut em.text, IntReg::T2, dst);
    em.isa.shl_imm(&mut em.text, IntReg::T0, 4);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.cvt_int_to_f(&mut em.text, FSCRATCH2, IntReg::T0);
    em.isa.fstore(&mut em.text, FSCRATCH2, IntReg::T2, 8);
    em.isa.fstore(&mut em.text, FSCRATCH, IntReg::T2, 16);

    em.isa.add_imm(&mut em.text, IntReg::T0, 1);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);
    em.isa.jmp_backward(&mut em.text, head);
    em.isa.bind(&mut em.text, done)?;

    em.isa.load_slot(&mut em.text, IntReg::Ret, dst);
    Ok(())
}

/// `_c67_string_concat` / `_c67_list_concat` (A0, A1 pointers) -> Ret.
/// Strings carry (key, value) pairs and reindex the right operand's keys;
/// lists copy values only.
fn body_concat(em: &mut Emitter<'_>, keyed: bool) -> Result<(), EmitError> {
    em.need(RuntimeFn::Alloc);
    let pa = em.alloc_slot();
    let pb = em.alloc_slot();
    let la = em.alloc_slot();
    let lb = em.alloc_slot();
    let dst = em.alloc_slot();
    let i = em.alloc_slot();
    let stride: u8 = if keyed { 4 } else { 3 };

    em.isa.store_slot(&mut em.text, IntReg::A0, pa);
    em.isa.store_slot(&mut em.text, IntReg::A1, pb);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::A0, 0);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::T0, FSCRATCH);
    em.isa.store_slot(&mut em.text, IntReg::T0, la);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::A1, 0);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::T0, FSCRATCH);
    em.isa.store_slot(&mut em.text, IntReg::T0, lb);

    // dst = alloc(8 + entry*(la+lb)); dst[0] = la+lb
    em.isa.load_slot(&mut em.text, IntReg::A0, la);
    em.isa.load_slot(&mut em.text, IntReg::T0, lb);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::A0, IntReg::T0);
    em.isa.shl_imm(&mut em.text, IntReg::A0, stride);
    em.isa.add_imm(&mut em.text, IntReg::A0, 8);
    em.isa.call_symbol(&mut em.text, "_c67_alloc");
    em.isa.store_slot(&mut em.text, IntReg::Ret, dst);
    em.isa.load_slot(&mut em.text, IntReg::T0, la);
    em.isa.load_slot(&mut em.text, IntReg::T1, lb);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T0, IntReg::T1);
    em.isa.cvt_int_to_f(&mut em.text, FSCRATCH, IntReg::T0);
    em.isa.load_slot(&mut em.text, IntReg::T1, dst);
    em.isa.fstore(&mut em.text, FSCRATCH, IntReg::T1, 0);

    // Two copy passes share this little loop body.
    for pass in 0..2 {
        let (src, count) = if pass == 0 { (pa, la) } else { (pb, lb) };
        em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
        em.isa.store_slot(&mut em.text, IntReg::T0, i);
        let head = em.text.offset();
        em.isa.load_slot(&mut em.text, IntReg::T0, i);
        em.isa.load_slot(&mut em.text, IntReg::T1, count);
        let done = em
            .isa
            .branch_if(&mut em.text, Cond::Ge, IntReg::T0, IntReg::T1);

        // value from src[i]
        em.isa.load_slot(&mut em.text, IntReg::T2, src);
        em.isa.shl_imm(&mut em.text, IntReg::T0, stride);
        em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
        let value_off = if keyed { 16 } else { 8 };
        em.isa.fload(&mut em.text, FSCRATCH, IntReg::T2, value_off);

        // output index = i (+ la on the second pass)
        em.isa.load_slot(&mut em.text, IntReg::T0, i);
        if pass == 1 {
            em.isa.load_slot(&mut em.text, IntReg::T1, la);
            em.isa.add_reg_to_reg(&mut em.text, IntReg::T0, IntReg::T1);
        }
        em.isa.load_slot(&mut em.text, IntReg::T2, dst);
        if keyed {
            em.isa.cvt_int_to_f(&mut em.text, FSCRATCH2, IntReg::T0);
        }
        em.isa.shl_imm(&mut em.text, IntReg::T0, stride);
        em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
        if keyed {
            em.isa.fstore(&mut em.text, FSCRATCH2, IntReg::T2, 8);
        }
        em.isa.fstore(&mut em.text, FSCRATCH, IntReg::T2, value_off);

        em.isa.load_slot(&mut em.text, IntReg::T0, i);
        em.isa.add_imm(&mut em.text, IntReg::T0, 1);
        em.isa.store_slot(&mut em.text, IntReg::T0, i);
        em.isa.jmp_backward(&mut em.text, head);
        em.isa.bind(&mut em.text, done)?;
    }

    em.isa.load_slot(&mut em.text, IntReg::Ret, dst);
    Ok(())
}

/// `_c67_list_cons(FV = element, A0 = list) -> Ret`: new list with the
/// element prepended.
fn body_list_cons(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    em.need(RuntimeFn::Alloc);
    let elem = em.alloc_slot();
    let src = em.alloc_slot();
    let n = em.alloc_slot();
    let dst = em.alloc_slot();
    let i = em.alloc_slot();

    em.isa.fstore_slot(&mut em.text, FV, elem);
    em.isa.store_slot(&mut em.text, IntReg::A0, src);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::A0, 0);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::T0, FSCRATCH);
    em.isa.store_slot(&mut em.text, IntReg::T0, n);

    em.isa.mov_reg_reg(&mut em.text, IntReg::A0, IntReg::T0);
    em.isa.add_imm(&mut em.text, IntReg::A0, 1);
    em.isa.shl_imm(&mut em.text, IntReg::A0, 3);
    em.isa.add_imm(&mut em.text, IntReg::A0, 8);
    em.isa.call_symbol(&mut em.text, "_c67_alloc");
    em.isa.store_slot(&mut em.text, IntReg::Ret, dst);

    em.isa.load_slot(&mut em.text, IntReg::T0, n);
    em.isa.add_imm(&mut em.text, IntReg::T0, 1);
    em.isa.cvt_int_to_f(&mut em.text, FSCRATCH, IntReg::T0);
    em.isa.load_slot(&mut em.text, IntReg::T1, dst);
    em.isa.fstore(&mut em.text, FSCRATCH, IntReg::T1, 0);
    em.isa.fload_slot(&mut em.text, FSCRATCH, elem);
    em.isa.fstore(&mut em.text, FSCRATCH, IntReg::T1, 8);

    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);
    let head = em.text.offset();
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.load_slot(&mut em.text, IntReg::T1, n);
    let done = em
        .isa
        .branch_if(&mut em.text, Cond::Ge, IntReg::T0, IntReg::T1);
    em.isa.load_slot(&mut em.text, IntReg::T2, src);
    em.isa.shl_imm(&mut em.text, IntReg::T0, 3);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::T2, 8);
    em.isa.load_slot(&mut em.text, IntReg::T2, dst);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa.fstore(&mut em.text, FSCRATCH, IntReg::T2, 16);
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.add_imm(&mut em.text, IntReg::T0, 1);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);
    em.isa.jmp_backward(&mut em.text, head);
    em.isa.bind(&mut em.text, done)?;

    em.isa.load_slot(&mut em.text, IntReg::Ret, dst);
    Ok(())
}

enum SearchKind {
    ListContains,
    MapHas,
    MapGet,
}

/// Linear search over a container: membership (`in`, `has`) and map lookup.
fn body_search(em: &mut Emitter<'_>, kind: SearchKind) -> Result<(), EmitError> {
    let needle = em.alloc_slot();
    let ptr = em.alloc_slot();
    let n = em.alloc_slot();
    let i = em.alloc_slot();
    let (stride, probe_off) = match kind {
        SearchKind::ListContains => (3u8, 8),
        SearchKind::MapHas | SearchKind::MapGet => (4u8, 8),
    };

    em.isa.fstore_slot(&mut em.text, FV, needle);
    em.isa.store_slot(&mut em.text, IntReg::A0, ptr);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::A0, 0);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::T0, FSCRATCH);
    em.isa.store_slot(&mut em.text, IntReg::T0, n);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);

    let head = em.text.offset();
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.load_slot(&mut em.text, IntReg::T1, n);
    let missing = em
        .isa
        .branch_if(&mut em.text, Cond::Ge, IntReg::T0, IntReg::T1);
    em.isa.load_slot(&mut em.text, IntReg::T2, ptr);
    em.isa.shl_imm(&mut em.text, IntReg::T0, stride);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::T2, probe_off);
    em.isa.fload_slot(&mut em.text, FV, needle);
    let hit = em.isa.fbranch_if(&mut em.text, FCond::Eq, FV, FSCRATCH);
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.add_imm(&mut em.text, IntReg::T0, 1);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);
    em.isa.jmp_backward(&mut em.text, head);

    em.isa.bind(&mut em.text, hit)?;
    match kind {
        SearchKind::MapGet => {
            // Recompute the entry address: the float branch may have used
            // T2 as scratch.
            em.isa.load_slot(&mut em.text, IntReg::T2, ptr);
            em.isa.load_slot(&mut em.text, IntReg::T0, i);
            em.isa.shl_imm(&mut em.text, IntReg::T0, stride);
            em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
            em.isa.fload(&mut em.text, FV, IntReg::T2, probe_off + 8);
        }
        _ => em.isa.mov_imm_to_reg(&mut em.text, IntReg::Ret, 1),
    }
    let out = em.isa.jmp_forward(&mut em.text);
    em.isa.bind(&mut em.text, missing)?;
    match kind {
        SearchKind::MapGet => em.load_nan(FV),
        _ => em.isa.mov_imm_to_reg(&mut em.text, IntReg::Ret, 0),
    }
    em.isa.bind(&mut em.text, out)?;
    Ok(())
}

/// `_c67_pow(FV = base, FSCRATCH = exponent) -> FV`: exponent truncated to
/// an integer, computed by squaring; negative exponents via reciprocal.
fn body_pow(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    let acc = em.alloc_slot();
    let base = em.alloc_slot();
    let neg = em.alloc_slot();

    em.isa.fstore_slot(&mut em.text, FV, base);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::A3, FSCRATCH);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
    em.isa.store_slot(&mut em.text, IntReg::T0, neg);
    let nonneg = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Ge, IntReg::A3, 0);
    em.isa.neg_reg(&mut em.text, IntReg::A3);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 1);
    em.isa.store_slot(&mut em.text, IntReg::T0, neg);
    em.isa.bind(&mut em.text, nonneg)?;

    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 1);
    em.isa.cvt_int_to_f(&mut em.text, FV, IntReg::T0);
    em.isa.fstore_slot(&mut em.text, FV, acc);

    let head = em.text.offset();
    let done = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Eq, IntReg::A3, 0);
    em.isa.mov_reg_reg(&mut em.text, IntReg::T1, IntReg::A3);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 1);
    em.isa.and_reg_to_reg(&mut em.text, IntReg::T1, IntReg::T0);
    let even = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Eq, IntReg::T1, 0);
    em.isa.fload_slot(&mut em.text, FV, acc);
    em.isa.fload_slot(&mut em.text, FSCRATCH, base);
    em.isa.fmul(&mut em.text, FV, FSCRATCH);
    em.isa.fstore_slot(&mut em.text, FV, acc);
    em.isa.bind(&mut em.text, even)?;
    em.isa.fload_slot(&mut em.text, FV, base);
    em.isa.fmov(&mut em.text, FSCRATCH, FV);
    em.isa.fmul(&mut em.text, FV, FSCRATCH);
    em.isa.fstore_slot(&mut em.text, FV, base);
    em.isa.shr_imm(&mut em.text, IntReg::A3, 1);
    em.isa.jmp_backward(&mut em.text, head);
    em.isa.bind(&mut em.text, done)?;

    em.isa.fload_slot(&mut em.text, FV, acc);
    em.isa.load_slot(&mut em.text, IntReg::T0, neg);
    let positive = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Eq, IntReg::T0, 0);
    em.isa.fmov(&mut em.text, FSCRATCH, FV);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 1);
    em.isa.cvt_int_to_f(&mut em.text, FV, IntReg::T0);
    em.isa.fdiv(&mut em.text, FV, FSCRATCH);
    em.isa.bind(&mut em.text, positive)?;
    Ok(())
}

/// Write the text at `Ret`/`A1` (pointer/length) to the fd saved in a slot.
fn emit_write_text(em: &mut Emitter<'_>, fd_slot: i32) {
    if em.target.os == Os::Windows {
        em.register_import("_write", "c");
        let (c0, c1, c2) = (
            em.isa.int_arg(0),
            em.isa.int_arg(1),
            em.isa.int_arg(2),
        );
        em.isa.mov_reg_reg(&mut em.text, c2, IntReg::A1);
        em.isa.mov_reg_reg(&mut em.text, c1, IntReg::Ret);
        em.isa.load_slot(&mut em.text, c0, fd_slot);
        em.emit_win_call_import("_write");
        return;
    }
    let (s0, s1, s2) = (em.isa.sysarg(0), em.isa.sysarg(1), em.isa.sysarg(2));
    em.isa.mov_reg_reg(&mut em.text, s2, IntReg::A1);
    em.isa.mov_reg_reg(&mut em.text, s1, IntReg::Ret);
    em.isa.load_slot(&mut em.text, s0, fd_slot);
    let nr = syscall_nr(em.target.arch, em.target.os, Sys::Write);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::SysNum, nr);
    em.isa.syscall(&mut em.text);
}

/// `_c67_print_f64(FV = value, A2 = fd)`: `%g`-style printf on dynamic
/// stdout, ftoa plus a raw write elsewhere.
fn body_print_f64(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    em.need(RuntimeFn::Ftoa);
    let fd = em.alloc_slot();
    em.isa.store_slot(&mut em.text, IntReg::A2, fd);

    let libc_stdout = em.strategy == LinkStrategy::Dynamic && em.target.os != Os::Darwin;
    if libc_stdout {
        let raw = em
            .isa
            .branch_if_imm(&mut em.text, Cond::Ne, IntReg::A2, 1);
        em.register_import("printf", "c");
        let fmt = em.intern_cstring("%g");
        let arg0 = em.isa.int_arg(0);
        if em.target.os == Os::Windows {
            em.isa.fmov(&mut em.text, crate::isa::FloatReg(1), FV);
            let arg1 = em.isa.int_arg(1);
            em.isa
                .bits_f_to_int(&mut em.text, arg1, crate::isa::FloatReg(1));
            em.isa.lea_symbol(&mut em.text, arg0, &fmt);
            em.emit_win_call_import("printf");
        } else {
            em.isa.lea_symbol(&mut em.text, arg0, &fmt);
            em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 1);
            em.isa.call_import(&mut em.text, "printf");
        }
        let mut patch = std::mem::take(&mut em.frame_mut().patch);
        em.isa.epilogue(&mut em.text, &mut patch);
        em.frame_mut().patch = patch;
        em.isa.bind(&mut em.text, raw)?;
    }

    em.isa.call_symbol(&mut em.text, "_c67_ftoa");
    emit_write_text(em, fd);
    Ok(())
}

/// `_c67_putch(A0 = char, A2 = fd)`.
fn body_putch(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    em.ensure_data("_c67_putc_buf", 8);
    let fd = em.alloc_slot();
    em.isa.store_slot(&mut em.text, IntReg::A2, fd);

    let libc_stdout = em.strategy == LinkStrategy::Dynamic && em.target.os != Os::Darwin;
    if libc_stdout {
        let raw = em
            .isa
            .branch_if_imm(&mut em.text, Cond::Ne, IntReg::A2, 1);
        em.register_import("printf", "c");
        let fmt = em.intern_cstring("%c");
        let arg1 = em.isa.int_arg(1);
        em.isa.mov_reg_reg(&mut em.text, arg1, IntReg::A0);
        let arg0 = em.isa.int_arg(0);
        em.isa.lea_symbol(&mut em.text, arg0, &fmt);
        if em.target.os == Os::Windows {
            em.emit_win_call_import("printf");
        } else {
            em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
            em.isa.call_import(&mut em.text, "printf");
        }
        let mut patch = std::mem::take(&mut em.frame_mut().patch);
        em.isa.epilogue(&mut em.text, &mut patch);
        em.frame_mut().patch = patch;
        em.isa.bind(&mut em.text, raw)?;
    }

    em.isa.lea_symbol(&mut em.text, IntReg::T2, "_c67_putc_buf");
    em.isa
        .store(&mut em.text, IntReg::A0, IntReg::T2, 0, MemSize::B1);
    em.isa.mov_reg_reg(&mut em.text, IntReg::Ret, IntReg::T2);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::A1, 1);
    emit_write_text(em, fd);
    Ok(())
}

/// `_c67_print_str(FV = map-string, A2 = fd)`: one character at a time
/// through `_c67_putch`.
fn body_print_str(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    em.need(RuntimeFn::Putch);
    let ptr = em.alloc_slot();
    let n = em.alloc_slot();
    let i = em.alloc_slot();
    let fd = em.alloc_slot();

    em.isa.store_slot(&mut em.text, IntReg::A2, fd);
    em.isa.bits_f_to_int(&mut em.text, IntReg::T0, FV);
    em.isa.store_slot(&mut em.text, IntReg::T0, ptr);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::T0, 0);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::T1, FSCRATCH);
    em.isa.store_slot(&mut em.text, IntReg::T1, n);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);

    let head = em.text.offset();
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.load_slot(&mut em.text, IntReg::T1, n);
    let done = em
        .isa
        .branch_if(&mut em.text, Cond::Ge, IntReg::T0, IntReg::T1);
    em.isa.load_slot(&mut em.text, IntReg::T2, ptr);
    em.isa.shl_imm(&mut em.text, IntReg::T0, 4);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::T2, 16);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::A0, FSCRATCH);
    em.isa.load_slot(&mut em.text, IntReg::A2, fd);
    em.isa.call_symbol(&mut em.text, "_c67_putch");
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.add_imm(&mut em.text, IntReg::T0, 1);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);
    em.isa.jmp_backward(&mut em.text, head);
    em.isa.bind(&mut em.text, done)?;
    Ok(())
}

/// `_c67_print_list` / `_c67_print_map` (FV = pointer, A2 = fd): bracketed,
/// comma-separated element dump through `_c67_print_f64`.
fn body_print_seq(em: &mut Emitter<'_>, keyed: bool) -> Result<(), EmitError> {
    em.need(RuntimeFn::Putch);
    em.need(RuntimeFn::PrintF64);
    let ptr = em.alloc_slot();
    let n = em.alloc_slot();
    let i = em.alloc_slot();
    let fd = em.alloc_slot();
    let (open, close) = if keyed { (b'{', b'}') } else { (b'[', b']') };
    let stride: u8 = if keyed { 4 } else { 3 };

    em.isa.store_slot(&mut em.text, IntReg::A2, fd);
    em.isa.bits_f_to_int(&mut em.text, IntReg::T0, FV);
    em.isa.store_slot(&mut em.text, IntReg::T0, ptr);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::T0, 0);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::T1, FSCRATCH);
    em.isa.store_slot(&mut em.text, IntReg::T1, n);

    let putch = |em: &mut Emitter<'_>, c: u8, fd: i32| {
        em.isa.mov_imm_to_reg(&mut em.text, IntReg::A0, c as i64);
        em.isa.load_slot(&mut em.text, IntReg::A2, fd);
        em.isa.call_symbol(&mut em.text, "_c67_putch");
    };

    putch(em, open, fd);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);

    let head = em.text.offset();
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.load_slot(&mut em.text, IntReg::T1, n);
    let done = em
        .isa
        .branch_if(&mut em.text, Cond::Ge, IntReg::T0, IntReg::T1);
    let first = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Eq, IntReg::T0, 0);
    putch(em, b',', fd);
    putch(em, b' ', fd);
    em.isa.bind(&mut em.text, first)?;

    if keyed {
        em.isa.load_slot(&mut em.text, IntReg::T2, ptr);
        em.isa.load_slot(&mut em.text, IntReg::T0, i);
        em.isa.shl_imm(&mut em.text, IntReg::T0, stride);
        em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
        em.isa.fload(&mut em.text, FV, IntReg::T2, 8);
        em.isa.load_slot(&mut em.text, IntReg::A2, fd);
        em.isa.call_symbol(&mut em.text, "_c67_print_f64");
        putch(em, b':', fd);
        putch(em, b' ', fd);
    }
    em.isa.load_slot(&mut em.text, IntReg::T2, ptr);
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.shl_imm(&mut em.text, IntReg::T0, stride);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa
        .fload(&mut em.text, FV, IntReg::T2, if keyed { 16 } else { 8 });
    em.isa.load_slot(&mut em.text, IntReg::A2, fd);
    em.isa.call_symbol(&mut em.text, "_c67_print_f64");

    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.add_imm(&mut em.text, IntReg::T0, 1);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);
    em.isa.jmp_backward(&mut em.text, head);
    em.isa.bind(&mut em.text, done)?;
    putch(em, close, fd);
    Ok(())
}

/// `_c67_cstr(A0 = map-string) -> Ret`: freshly allocated NUL-terminated
/// byte copy.
fn body_cstr(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    em.need(RuntimeFn::Alloc);
    let src = em.alloc_slot();
    let n = em.alloc_slot();
    let dst = em.alloc_slot();
    let i = em.alloc_slot();

    em.isa.store_slot(&mut em.text, IntReg::A0, src);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::A0, 0);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::T0, FSCRATCH);
    em.isa.store_slot(&mut em.text, IntReg::T0, n);
    em.isa.mov_reg_reg(&mut em.text, IntReg::A0, IntReg::T0);
    em.isa.add_imm(&mut em.text, IntReg::A0, 1);
    em.isa.call_symbol(&mut em.text, "_c67_alloc");
    em.isa.store_slot(&mut em.text, IntReg::Ret, dst);

    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T0, 0);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);
    let head = em.text.offset();
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.load_slot(&mut em.text, IntReg::T1, n);
    let done = em
        .isa
        .branch_if(&mut em.text, Cond::Ge, IntReg::T0, IntReg::T1);
    em.isa.load_slot(&mut em.text, IntReg::T2, src);
    em.isa.shl_imm(&mut em.text, IntReg::T0, 4);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa.fload(&mut em.text, FSCRATCH, IntReg::T2, 16);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::T1, FSCRATCH);
    em.isa.load_slot(&mut em.text, IntReg::T2, dst);
    em.isa.load_slot(&mut em.text, IntReg::T0, i);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa
        .store(&mut em.text, IntReg::T1, IntReg::T2, 0, MemSize::B1);
    em.isa.add_imm(&mut em.text, IntReg::T0, 1);
    em.isa.store_slot(&mut em.text, IntReg::T0, i);
    em.isa.jmp_backward(&mut em.text, head);
    em.isa.bind(&mut em.text, done)?;

    // Terminator.
    em.isa.load_slot(&mut em.text, IntReg::T2, dst);
    em.isa.load_slot(&mut em.text, IntReg::T0, n);
    em.isa.add_reg_to_reg(&mut em.text, IntReg::T2, IntReg::T0);
    em.isa.mov_imm_to_reg(&mut em.text, IntReg::T1, 0);
    em.isa
        .store(&mut em.text, IntReg::T1, IntReg::T2, 0, MemSize::B1);
    em.isa.load_slot(&mut em.text, IntReg::Ret, dst);
    Ok(())
}

/// `_c67_rand(FV = bound) -> FV`: whole number in `[0, bound)` from the
/// kernel entropy source (or msvcrt `rand`).
fn body_rand(em: &mut Emitter<'_>) -> Result<(), EmitError> {
    let bound = em.alloc_slot();
    em.isa.fstore_slot(&mut em.text, FV, bound);

    if em.target.os == Os::Windows {
        em.register_import("rand", "c");
        em.emit_win_call_import("rand");
        em.isa.mov_reg_reg(&mut em.text, IntReg::T0, IntReg::Ret);
    } else {
        em.ensure_data("_c67_rand_buf", 8);
        let (s0, s1, s2) = (em.isa.sysarg(0), em.isa.sysarg(1), em.isa.sysarg(2));
        em.isa.lea_symbol(&mut em.text, s0, "_c67_rand_buf");
        em.isa.mov_imm_to_reg(&mut em.text, s1, 8);
        em.isa.mov_imm_to_reg(&mut em.text, s2, 0);
        let nr = syscall_nr(em.target.arch, em.target.os, Sys::GetRandom);
        em.isa.mov_imm_to_reg(&mut em.text, IntReg::SysNum, nr);
        em.isa.syscall(&mut em.text);
        em.isa.lea_symbol(&mut em.text, IntReg::T2, "_c67_rand_buf");
        em.isa
            .load(&mut em.text, IntReg::T0, IntReg::T2, 0, MemSize::B8);
    }

    // Nonnegative raw value, reduced modulo the bound.
    em.isa.shr_imm(&mut em.text, IntReg::T0, 1);
    em.isa.fload_slot(&mut em.text, FV, bound);
    em.isa.cvt_f_to_int(&mut em.text, IntReg::T1, FV);
    let zero = em
        .isa
        .branch_if_imm(&mut em.text, Cond::Le, IntReg::T1, 0);
    em.isa.srem_reg_to_reg(&mut em.text, IntReg::T0, IntReg::T1);
    em.isa.cvt_int_to_f(&mut em.text, FV, IntReg::T0);
    let out = em.isa.jmp_forward(&mut em.text);
    em.isa.bind(&mut em.text, zero)?;
    em.load_f64_zero(FV);
    em.isa.bind(&mut em.text, out)?;
    Ok(())
}
