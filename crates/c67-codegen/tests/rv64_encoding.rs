//! Golden encoding tests for the RISC-V 64 backend.

use c67_codegen::buffer::CodeBuf;
use c67_codegen::isa::{Cond, FloatReg, IntReg, Isa, MemSize, Rv64};
use c67_codegen::target::Os;

fn words(f: impl FnOnce(&Rv64, &mut CodeBuf)) -> Vec<u32> {
    let isa = Rv64::new(Os::Linux);
    let mut buf = CodeBuf::new();
    f(&isa, &mut buf);
    buf.bytes()
        .chunks(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

#[test]
fn test_li_forms() {
    // addi a0, x0, 42
    assert_eq!(
        words(|i, b| i.mov_imm_to_reg(b, IntReg::A0, 42)),
        [0x02A0_0513]
    );
    // addi a0, x0, -1
    assert_eq!(
        words(|i, b| i.mov_imm_to_reg(b, IntReg::A0, -1)),
        [0xFFF0_0513]
    );
    // lui + addi for a 20+12 bit value: 0x12345 << 12 | 0x678
    let w = words(|i, b| i.mov_imm_to_reg(b, IntReg::A0, 0x1234_5678));
    assert_eq!(w.len(), 2);
    assert_eq!(w[0] & 0x7F, 0x37); // lui
    assert_eq!(w[1] & 0x707F, 0x13); // addi
}

#[test]
fn test_mov_reg_reg() {
    // addi a1, a0, 0
    assert_eq!(
        words(|i, b| i.mov_reg_reg(b, IntReg::A1, IntReg::A0)),
        [0x0005_0593]
    );
}

#[test]
fn test_int_alu() {
    // add a0, a0, t0
    assert_eq!(
        words(|i, b| i.add_reg_to_reg(b, IntReg::A0, IntReg::T0)),
        [0x0055_0533]
    );
    // sub a0, a0, t0
    assert_eq!(
        words(|i, b| i.sub_reg_to_reg(b, IntReg::A0, IntReg::T0)),
        [0x4055_0533]
    );
    // mul a0, a0, t0
    assert_eq!(
        words(|i, b| i.mul_reg_to_reg(b, IntReg::A0, IntReg::T0)),
        [0x0255_0533]
    );
    // div a0, a0, t0
    assert_eq!(
        words(|i, b| i.sdiv_reg_to_reg(b, IntReg::A0, IntReg::T0)),
        [0x0255_4533]
    );
    // rem a0, a0, t0
    assert_eq!(
        words(|i, b| i.srem_reg_to_reg(b, IntReg::A0, IntReg::T0)),
        [0x0255_6533]
    );
}

#[test]
fn test_ret_and_ecall() {
    assert_eq!(words(|i, b| i.ret(b)), [0x0000_8067]);
    assert_eq!(words(|i, b| i.syscall(b)), [0x0000_0073]);
}

#[test]
fn test_loads_and_stores() {
    // ld t0, 16(s0)
    assert_eq!(
        words(|i, b| i.load_slot(b, IntReg::T0, 16)),
        [0x0104_3283]
    );
    // sd t0, 16(s0)
    assert_eq!(
        words(|i, b| i.store_slot(b, IntReg::T0, 16)),
        [0x0054_3823]
    );
    // lbu t0, 0(a0)
    assert_eq!(
        words(|i, b| i.load(b, IntReg::T0, IntReg::A0, 0, MemSize::B1)),
        [0x0005_4283]
    );
    // fld fa0, 8(s0)
    assert_eq!(
        words(|i, b| i.fload_slot(b, FloatReg(10), 8)),
        [0x0084_3507]
    );
}

#[test]
fn test_scalar_double_ops() {
    // fadd.d fa0, fa0, fa1 (dynamic rounding)
    assert_eq!(
        words(|i, b| i.fadd(b, FloatReg(10), FloatReg(11))),
        [0x02B5_7553]
    );
    // fdiv.d fa0, fa0, fa1
    assert_eq!(
        words(|i, b| i.fdiv(b, FloatReg(10), FloatReg(11))),
        [0x1AB5_7553]
    );
    // fsgnjn.d fa0, fa0, fa0 (fneg)
    assert_eq!(words(|i, b| i.fneg(b, FloatReg(10))), [0x22A5_1553]);
}

#[test]
fn test_conversions_and_bit_transport() {
    // fcvt.l.d t0, fa0, rtz
    assert_eq!(
        words(|i, b| i.cvt_f_to_int(b, IntReg::T0, FloatReg(10))),
        [0xC225_12D3]
    );
    // fcvt.d.l fa0, t0
    assert_eq!(
        words(|i, b| i.cvt_int_to_f(b, FloatReg(10), IntReg::T0)),
        [0xD222_F553]
    );
    // fmv.x.d t0, fa0
    assert_eq!(
        words(|i, b| i.bits_f_to_int(b, IntReg::T0, FloatReg(10))),
        [0xE205_02D3]
    );
    // fmv.d.x fa0, t0
    assert_eq!(
        words(|i, b| i.bits_int_to_f(b, FloatReg(10), IntReg::T0)),
        [0xF202_8553]
    );
}

#[test]
fn test_forward_branch_is_skip_plus_jal() {
    let isa = Rv64::new(Os::Linux);
    let mut buf = CodeBuf::new();
    let label = isa.branch_if(&mut buf, Cond::Eq, IntReg::T0, IntReg::T1);
    isa.ret(&mut buf);
    isa.bind(&mut buf, label).unwrap();
    // bne t0, t1, +8 skips the jal; the jal reaches the bound target.
    let skip = buf.read_u32(0);
    assert_eq!(skip & 0x707F, 0x1063); // bne
    let jal = buf.read_u32(4);
    assert_eq!(jal & 0xFF, 0x6F); // jal x0
    // delta from the jal to the bind point is 8 bytes.
    assert_eq!((jal >> 21) & 0x3FF, 4); // imm[10:1] = 4 → offset 8
}

#[test]
fn test_call_is_auipc_jalr_pair() {
    let isa = Rv64::new(Os::Linux);
    let mut buf = CodeBuf::new();
    isa.call_symbol(&mut buf, "_c67_alloc");
    assert_eq!(buf.read_u32(0), 0x0000_0097); // auipc ra, 0
    assert_eq!(buf.read_u32(4), 0x0000_80E7); // jalr ra, ra, 0
    assert_eq!(buf.call_patches[0].offset, 0);
}

#[test]
fn test_prologue_frame_patch_negates() {
    let isa = Rv64::new(Os::Linux);
    let mut buf = CodeBuf::new();
    let mut frame = isa.prologue(&mut buf);
    isa.epilogue(&mut buf, &mut frame);
    isa.patch_frame_size(&mut buf, &frame, 32).unwrap();
    // Word 3 is `addi sp, sp, -32`, the epilogue's first word is +32.
    assert_eq!(buf.read_u32(12), 0x13 | 2 << 7 | 2 << 15 | (0xFE0 << 20));
    assert_eq!(buf.read_u32(20), 0x13 | 2 << 7 | 2 << 15 | (32 << 20));
}
