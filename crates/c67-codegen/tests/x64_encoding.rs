//! Golden encoding tests for the x86-64 backend: emitted bytes against
//! hand-assembled references.

use c67_codegen::buffer::CodeBuf;
use c67_codegen::isa::{Cond, FCond, FloatReg, IntReg, Isa, MemSize, X64};
use c67_codegen::target::Os;

fn isa() -> X64 {
    X64::new(Os::Linux)
}

fn emit(f: impl FnOnce(&X64, &mut CodeBuf)) -> Vec<u8> {
    let isa = isa();
    let mut buf = CodeBuf::new();
    f(&isa, &mut buf);
    buf.into_bytes()
}

#[test]
fn test_mov_reg_reg() {
    // mov rdi, r10
    let bytes = emit(|i, b| i.mov_reg_reg(b, IntReg::A0, IntReg::T1));
    assert_eq!(bytes, [0x4C, 0x89, 0xD7]);
    // mov rsi, rax
    let bytes = emit(|i, b| i.mov_reg_reg(b, IntReg::A1, IntReg::T0));
    assert_eq!(bytes, [0x48, 0x89, 0xC6]);
    // Same register: nothing emitted.
    let bytes = emit(|i, b| i.mov_reg_reg(b, IntReg::T0, IntReg::Ret));
    assert!(bytes.is_empty());
}

#[test]
fn test_mov_imm() {
    // mov rax, 60 (sign-extended imm32 form)
    let bytes = emit(|i, b| i.mov_imm_to_reg(b, IntReg::T0, 60));
    assert_eq!(bytes, [0x48, 0xC7, 0xC0, 0x3C, 0x00, 0x00, 0x00]);
    // movabs rax, 0x7FF8000000000000 (the NaN sentinel image)
    let bytes = emit(|i, b| i.mov_imm_to_reg(b, IntReg::T0, 0x7FF8_0000_0000_0000));
    assert_eq!(
        bytes,
        [0x48, 0xB8, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF8, 0x7F]
    );
}

#[test]
fn test_int_alu() {
    // add rax, r10
    assert_eq!(
        emit(|i, b| i.add_reg_to_reg(b, IntReg::T0, IntReg::T1)),
        [0x4C, 0x01, 0xD0]
    );
    // sub rax, r10
    assert_eq!(
        emit(|i, b| i.sub_reg_to_reg(b, IntReg::T0, IntReg::T1)),
        [0x4C, 0x29, 0xD0]
    );
    // imul rax, r10
    assert_eq!(
        emit(|i, b| i.mul_reg_to_reg(b, IntReg::T0, IntReg::T1)),
        [0x49, 0x0F, 0xAF, 0xC2]
    );
    // neg rax
    assert_eq!(emit(|i, b| i.neg_reg(b, IntReg::T0)), [0x48, 0xF7, 0xD8]);
    // not rax
    assert_eq!(emit(|i, b| i.not_reg(b, IntReg::T0)), [0x48, 0xF7, 0xD0]);
    // xor rax, r10
    assert_eq!(
        emit(|i, b| i.xor_reg_to_reg(b, IntReg::T0, IntReg::T1)),
        [0x4C, 0x31, 0xD0]
    );
}

#[test]
fn test_division_claims_rax_rdx() {
    // sdiv T0, T1: cqo + idiv r10, result stays in rax.
    let bytes = emit(|i, b| i.sdiv_reg_to_reg(b, IntReg::T0, IntReg::T1));
    assert_eq!(bytes, [0x48, 0x99, 0x49, 0xF7, 0xFA]);
}

#[test]
fn test_shifts() {
    // shl rax, 3
    assert_eq!(
        emit(|i, b| i.shl_imm(b, IntReg::T0, 3)),
        [0x48, 0xC1, 0xE0, 0x03]
    );
    // shr rax, 1 (logical)
    assert_eq!(
        emit(|i, b| i.shr_imm(b, IntReg::T0, 1)),
        [0x48, 0xC1, 0xE8, 0x01]
    );
}

#[test]
fn test_ret_and_syscall() {
    assert_eq!(emit(|i, b| i.ret(b)), [0xC3]);
    assert_eq!(emit(|i, b| i.syscall(b)), [0x0F, 0x05]);
}

#[test]
fn test_prologue_shape() {
    // push rbp; mov rbp, rsp; sub rsp, imm32(placeholder 0)
    let isa = isa();
    let mut buf = CodeBuf::new();
    let frame = isa.prologue(&mut buf);
    assert_eq!(
        buf.bytes(),
        [0x55, 0x48, 0x89, 0xE5, 0x48, 0x81, 0xEC, 0, 0, 0, 0]
    );
    isa.patch_frame_size(&mut buf, &frame, 0x40).unwrap();
    assert_eq!(&buf.bytes()[7..11], [0x40, 0, 0, 0]);
}

#[test]
fn test_scalar_double_ops() {
    // addsd xmm0, xmm1
    assert_eq!(
        emit(|i, b| i.fadd(b, FloatReg(0), FloatReg(1))),
        [0xF2, 0x0F, 0x58, 0xC1]
    );
    // subsd xmm0, xmm1
    assert_eq!(
        emit(|i, b| i.fsub(b, FloatReg(0), FloatReg(1))),
        [0xF2, 0x0F, 0x5C, 0xC1]
    );
    // mulsd xmm0, xmm1
    assert_eq!(
        emit(|i, b| i.fmul(b, FloatReg(0), FloatReg(1))),
        [0xF2, 0x0F, 0x59, 0xC1]
    );
    // divsd xmm0, xmm1
    assert_eq!(
        emit(|i, b| i.fdiv(b, FloatReg(0), FloatReg(1))),
        [0xF2, 0x0F, 0x5E, 0xC1]
    );
}

#[test]
fn test_conversions_and_bit_transport() {
    // cvttsd2si rax, xmm0
    assert_eq!(
        emit(|i, b| i.cvt_f_to_int(b, IntReg::T0, FloatReg(0))),
        [0xF2, 0x48, 0x0F, 0x2C, 0xC0]
    );
    // cvtsi2sd xmm0, rax
    assert_eq!(
        emit(|i, b| i.cvt_int_to_f(b, FloatReg(0), IntReg::T0)),
        [0xF2, 0x48, 0x0F, 0x2A, 0xC0]
    );
    // movq rax, xmm0 — a bit copy, not a numeric conversion
    assert_eq!(
        emit(|i, b| i.bits_f_to_int(b, IntReg::T0, FloatReg(0))),
        [0x66, 0x48, 0x0F, 0x7E, 0xC0]
    );
    // movq xmm0, rax
    assert_eq!(
        emit(|i, b| i.bits_int_to_f(b, FloatReg(0), IntReg::T0)),
        [0x66, 0x48, 0x0F, 0x6E, 0xC0]
    );
}

#[test]
fn test_frame_slots() {
    // movsd xmm0, [rbp-8] (slot 0)
    assert_eq!(
        emit(|i, b| i.fload_slot(b, FloatReg(0), 0)),
        [0xF2, 0x0F, 0x10, 0x85, 0xF8, 0xFF, 0xFF, 0xFF]
    );
    // movsd [rbp-16], xmm0 (slot 8)
    assert_eq!(
        emit(|i, b| i.fstore_slot(b, FloatReg(0), 8)),
        [0xF2, 0x0F, 0x11, 0x85, 0xF0, 0xFF, 0xFF, 0xFF]
    );
}

#[test]
fn test_rsp_base_needs_sib() {
    // mov rax, [rsp+16]
    assert_eq!(
        emit(|i, b| i.load(b, IntReg::T0, IntReg::Sp, 16, MemSize::B8)),
        [0x48, 0x8B, 0x84, 0x24, 0x10, 0x00, 0x00, 0x00]
    );
}

#[test]
fn test_call_placeholder_and_patch_record() {
    let isa = isa();
    let mut buf = CodeBuf::new();
    isa.call_symbol(&mut buf, "_c67_itoa");
    assert_eq!(buf.bytes()[0], 0xE8);
    assert_eq!(&buf.bytes()[1..5], [0x78, 0x56, 0x34, 0x12]);
    assert_eq!(buf.call_patches.len(), 1);
    assert_eq!(buf.call_patches[0].offset, 1);
    assert_eq!(buf.call_patches[0].target, "_c67_itoa");
}

#[test]
fn test_lea_placeholder_and_reloc_record() {
    let isa = isa();
    let mut buf = CodeBuf::new();
    isa.lea_symbol(&mut buf, IntReg::T0, "str_0");
    assert_eq!(&buf.bytes()[..3], [0x48, 0x8D, 0x05]);
    assert_eq!(&buf.bytes()[3..7], [0xEF, 0xBE, 0xAD, 0xDE]);
    assert_eq!(buf.pc_relocs.len(), 1);
    assert_eq!(buf.pc_relocs[0].offset, 3);
}

#[test]
fn test_import_call_is_indirect_on_windows() {
    let isa = X64::new(Os::Windows);
    let mut buf = CodeBuf::new();
    isa.call_import(&mut buf, "printf");
    // ff 15 <disp32> through the IAT
    assert_eq!(&buf.bytes()[..2], [0xFF, 0x15]);
    assert_eq!(buf.call_patches[0].target, "printf$stub");
}

#[test]
fn test_forward_branch_binds_once() {
    let isa = isa();
    let mut buf = CodeBuf::new();
    let label = isa.branch_if(&mut buf, Cond::Eq, IntReg::T0, IntReg::T1);
    isa.ret(&mut buf);
    let bind_at = buf.offset();
    isa.bind(&mut buf, label).unwrap();
    // cmp rax, r10 is 3 bytes, jcc opcode 2, disp 4: disp must skip the ret.
    let disp = buf.read_u32(5) as i32;
    assert_eq!(disp as usize, bind_at - 9);
}

#[test]
fn test_float_compare_falls_through_on_nan() {
    // FCond::Lt swaps operands and uses ja: ucomisd xmm1, xmm0; ja
    let bytes = emit(|i, b| {
        let l = i.fbranch_if(b, FCond::Lt, FloatReg(0), FloatReg(1));
        i.bind(b, l).unwrap();
    });
    assert_eq!(&bytes[..4], [0x66, 0x0F, 0x2E, 0xC8]);
    assert_eq!(bytes[5], 0x87); // ja rel32
}
