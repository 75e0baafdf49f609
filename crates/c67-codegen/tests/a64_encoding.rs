//! Golden encoding tests for the ARM64 backend.

use c67_codegen::buffer::CodeBuf;
use c67_codegen::isa::{A64, Cond, FloatReg, IntReg, Isa, MemSize};
use c67_codegen::target::Os;

fn words(f: impl FnOnce(&A64, &mut CodeBuf)) -> Vec<u32> {
    let isa = A64::new(Os::Linux);
    let mut buf = CodeBuf::new();
    f(&isa, &mut buf);
    buf.bytes()
        .chunks(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

#[test]
fn test_mov_forms() {
    // orr x0, xzr, x9
    assert_eq!(
        words(|i, b| i.mov_reg_reg(b, IntReg::A0, IntReg::T0)),
        [0xAA09_03E0]
    );
    // movz x0, #42
    assert_eq!(
        words(|i, b| i.mov_imm_to_reg(b, IntReg::A0, 42)),
        [0xD280_0540]
    );
    // movn x0, #0 (-1 in one word)
    assert_eq!(
        words(|i, b| i.mov_imm_to_reg(b, IntReg::A0, -1)),
        [0x9280_0000]
    );
    // mov to sp goes through add #0
    assert_eq!(
        words(|i, b| i.mov_reg_reg(b, IntReg::Sp, IntReg::Fp)),
        [0x9100_03BF]
    );
}

#[test]
fn test_int_alu() {
    // add x0, x0, x9
    assert_eq!(
        words(|i, b| i.add_reg_to_reg(b, IntReg::A0, IntReg::T0)),
        [0x8B09_0000]
    );
    // sub x0, x0, x9
    assert_eq!(
        words(|i, b| i.sub_reg_to_reg(b, IntReg::A0, IntReg::T0)),
        [0xCB09_0000]
    );
    // madd x0, x0, x9, xzr
    assert_eq!(
        words(|i, b| i.mul_reg_to_reg(b, IntReg::A0, IntReg::T0)),
        [0x9B09_7C00]
    );
    // sdiv x0, x0, x9
    assert_eq!(
        words(|i, b| i.sdiv_reg_to_reg(b, IntReg::A0, IntReg::T0)),
        [0x9AC9_0C00]
    );
}

#[test]
fn test_ret_and_svc() {
    assert_eq!(words(|i, b| i.ret(b)), [0xD65F_03C0]);
    // Linux svc #0
    assert_eq!(words(|i, b| i.syscall(b)), [0xD400_0001]);
    // Darwin svc #0x80
    let isa = A64::new(Os::Darwin);
    let mut buf = CodeBuf::new();
    isa.syscall(&mut buf);
    assert_eq!(buf.bytes(), 0xD400_1001u32.to_le_bytes());
}

#[test]
fn test_prologue_epilogue_frame_patch() {
    let isa = A64::new(Os::Linux);
    let mut buf = CodeBuf::new();
    let mut frame = isa.prologue(&mut buf);
    isa.epilogue(&mut buf, &mut frame);
    isa.patch_frame_size(&mut buf, &frame, 0x30).unwrap();
    let words: Vec<u32> = buf
        .bytes()
        .chunks(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    assert_eq!(words[0], 0xA9BF_7BFD); // stp x29, x30, [sp, #-16]!
    assert_eq!(words[1], 0xD100_03FF | 0x30 << 10); // sub sp, sp, #0x30
    assert_eq!(words[2], 0x9100_03FD); // mov x29, sp
    assert_eq!(words[3], 0x9100_03FF | 0x30 << 10); // add sp, sp, #0x30
    assert_eq!(words[4], 0xA8C1_7BFD); // ldp x29, x30, [sp], #16
    assert_eq!(words[5], 0xD65F_03C0); // ret
}

#[test]
fn test_frame_too_large_is_rejected() {
    let isa = A64::new(Os::Linux);
    let mut buf = CodeBuf::new();
    let frame = isa.prologue(&mut buf);
    assert!(isa.patch_frame_size(&mut buf, &frame, 0x2000).is_err());
}

#[test]
fn test_scalar_double_ops() {
    // fadd d0, d0, d1
    assert_eq!(
        words(|i, b| i.fadd(b, FloatReg(0), FloatReg(1))),
        [0x1E61_2800]
    );
    // fmul d0, d0, d1
    assert_eq!(
        words(|i, b| i.fmul(b, FloatReg(0), FloatReg(1))),
        [0x1E61_0800]
    );
    // fdiv d0, d0, d1
    assert_eq!(
        words(|i, b| i.fdiv(b, FloatReg(0), FloatReg(1))),
        [0x1E61_1800]
    );
    // fneg d0, d0
    assert_eq!(words(|i, b| i.fneg(b, FloatReg(0))), [0x1E61_4000]);
    // fmadd d0, d1, d2, d0
    assert_eq!(
        words(|i, b| i.fmadd(b, FloatReg(0), FloatReg(1), FloatReg(2))),
        [0x1F42_0020]
    );
}

#[test]
fn test_conversions_and_bit_transport() {
    // fcvtzs x9, d0
    assert_eq!(
        words(|i, b| i.cvt_f_to_int(b, IntReg::T0, FloatReg(0))),
        [0x9E78_0009]
    );
    // scvtf d0, x9
    assert_eq!(
        words(|i, b| i.cvt_int_to_f(b, FloatReg(0), IntReg::T0)),
        [0x9E62_0120]
    );
    // fmov x9, d0
    assert_eq!(
        words(|i, b| i.bits_f_to_int(b, IntReg::T0, FloatReg(0))),
        [0x9E66_0009]
    );
    // fmov d0, x9
    assert_eq!(
        words(|i, b| i.bits_int_to_f(b, FloatReg(0), IntReg::T0)),
        [0x9E67_0120]
    );
}

#[test]
fn test_slot_accesses_use_positive_offsets() {
    // ldr d0, [x29, #8]
    assert_eq!(
        words(|i, b| i.fload_slot(b, FloatReg(0), 8)),
        [0xFD40_0000 | 1 << 10 | 29 << 5]
    );
    // str x9, [x29, #16]
    assert_eq!(
        words(|i, b| i.store_slot(b, IntReg::T0, 16)),
        [0xF900_0000 | 2 << 10 | 29 << 5 | 9]
    );
    // ldrb w9, [x0]
    assert_eq!(
        words(|i, b| i.load(b, IntReg::T0, IntReg::A0, 0, MemSize::B1)),
        [0x3940_0009]
    );
}

#[test]
fn test_bl_and_adrp_records() {
    let isa = A64::new(Os::Linux);
    let mut buf = CodeBuf::new();
    isa.call_symbol(&mut buf, "lambda_0");
    assert_eq!(buf.read_u32(0), 0x9400_0000);
    assert_eq!(buf.call_patches[0].offset, 0);

    isa.lea_symbol(&mut buf, IntReg::T0, "str_0");
    assert_eq!(buf.read_u32(4), 0x9000_0009); // adrp x9, 0
    assert_eq!(buf.read_u32(8), 0x9100_0129); // add x9, x9, #0
    assert_eq!(buf.pc_relocs[0].offset, 4);
}

#[test]
fn test_forward_branch_imm19() {
    let isa = A64::new(Os::Linux);
    let mut buf = CodeBuf::new();
    let label = isa.branch_if(&mut buf, Cond::Lt, IntReg::T0, IntReg::T1);
    isa.ret(&mut buf);
    isa.bind(&mut buf, label).unwrap();
    // subs xzr, x9, x10 then b.lt +2 words
    assert_eq!(buf.read_u32(0), 0xEB0A_013F);
    assert_eq!(buf.read_u32(4), 0x5400_0000 | 2 << 5 | 11);
}
