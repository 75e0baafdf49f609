//! x86-64 instruction encodings.
//!
//! REX-prefixed 64-bit forms throughout. Stack slots live below rbp; the
//! canonical value register is xmm0. Placeholder displacements are
//! `0x12345678` for calls and `0xDEADBEEF` for RIP-relative LEA, replaced
//! during the patch phase.

use super::{
    BranchShape, Cond, FCond, FloatReg, ForwardLabel, FramePatch, IntReg, Isa, MemSize,
    CALL_PLACEHOLDER, LEA_PLACEHOLDER,
};
use crate::buffer::CodeBuf;
use crate::error::EmitError;
use crate::reloc::{CallKind, CallPatch, PcRelKind, PcRelocation, STUB_SUFFIX};
use crate::target::{Arch, Os};

pub struct X64 {
    os: Os,
}

impl X64 {
    pub fn new(os: Os) -> Self {
        Self { os }
    }

    fn enc(r: IntReg) -> u8 {
        match r {
            IntReg::A0 => 7,  // rdi
            IntReg::A1 => 6,  // rsi
            IntReg::A2 => 2,  // rdx
            IntReg::A3 => 1,  // rcx
            IntReg::A4 => 8,  // r8
            IntReg::A5 => 9,  // r9
            IntReg::T0 => 0,  // rax
            IntReg::T1 => 10, // r10
            IntReg::T2 => 11, // r11
            IntReg::Ret => 0,
            IntReg::SysNum => 0,
            IntReg::Fp => 5, // rbp
            IntReg::Sp => 4, // rsp
            IntReg::Phys(n) => n,
        }
    }
}

const RAX: u8 = 0;
const RCX: u8 = 1;
const RDX: u8 = 2;
const RBP: u8 = 5;
const R11: u8 = 11;

fn rex(b: &mut CodeBuf, w: bool, reg: u8, rm: u8) {
    let mut byte = 0x40u8;
    if w {
        byte |= 0x08;
    }
    if reg >= 8 {
        byte |= 0x04;
    }
    if rm >= 8 {
        byte |= 0x01;
    }
    b.emit_u8(byte);
}

fn modrm(b: &mut CodeBuf, md: u8, reg: u8, rm: u8) {
    b.emit_u8((md << 6) | ((reg & 7) << 3) | (rm & 7));
}

/// ModRM + optional SIB + disp32 for a `[base + disp]` operand.
fn modrm_mem(b: &mut CodeBuf, reg: u8, base: u8, disp: i32) {
    modrm(b, 0b10, reg, base);
    if base & 7 == 4 {
        // rsp/r12 need a SIB byte.
        b.emit_u8(0x24);
    }
    b.emit_i32(disp);
}

/// Two-register ALU instruction: `op /r` with reg=src, rm=dst.
fn alu_rr(b: &mut CodeBuf, opcode: u8, dst: u8, src: u8) {
    rex(b, true, src, dst);
    b.emit_u8(opcode);
    modrm(b, 0b11, src, dst);
}

fn jcc_code(cc: Cond) -> u8 {
    match cc {
        Cond::Eq => 0x84,
        Cond::Ne => 0x85,
        Cond::Lt => 0x8C,
        Cond::Le => 0x8E,
        Cond::Gt => 0x8F,
        Cond::Ge => 0x8D,
        Cond::Ult => 0x82,
        Cond::Ule => 0x86,
        Cond::Ugt => 0x87,
        Cond::Uge => 0x83,
    }
}

fn setcc_code(cc: Cond) -> u8 {
    jcc_code(cc) + 0x10
}

impl X64 {
    fn cmp_rr(&self, b: &mut CodeBuf, x: IntReg, y: IntReg) {
        alu_rr(b, 0x39, Self::enc(x), Self::enc(y));
    }

    fn cmp_imm(&self, b: &mut CodeBuf, x: IntReg, imm: i32) {
        let rm = Self::enc(x);
        rex(b, true, 0, rm);
        b.emit_u8(0x81);
        modrm(b, 0b11, 7, rm);
        b.emit_i32(imm);
    }

    fn jcc_forward(&self, b: &mut CodeBuf, cc: Cond) -> ForwardLabel {
        b.emit_u8(0x0F);
        b.emit_u8(jcc_code(cc));
        let at = b.offset();
        b.emit_u32(0);
        ForwardLabel {
            at,
            shape: BranchShape::X64Rel32,
        }
    }

    fn ucomisd(&self, b: &mut CodeBuf, x: FloatReg, y: FloatReg) {
        b.emit_u8(0x66);
        b.emit_u8(0x0F);
        b.emit_u8(0x2E);
        modrm(b, 0b11, x.0, y.0);
    }

    fn movsd_rr(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        b.emit_u8(0xF2);
        b.emit_u8(0x0F);
        b.emit_u8(0x10);
        modrm(b, 0b11, dst.0, src.0);
    }

    /// `cmpsd dst, src, predicate` — dst becomes an all-ones/zero mask.
    fn cmpsd(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg, predicate: u8) {
        b.emit_u8(0xF2);
        b.emit_u8(0x0F);
        b.emit_u8(0xC2);
        modrm(b, 0b11, dst.0, src.0);
        b.emit_u8(predicate);
    }

    fn float_arith(&self, b: &mut CodeBuf, opcode: u8, dst: FloatReg, src: FloatReg) {
        b.emit_u8(0xF2);
        b.emit_u8(0x0F);
        b.emit_u8(opcode);
        modrm(b, 0b11, dst.0, src.0);
    }
}

impl Isa for X64 {
    fn arch(&self) -> Arch {
        Arch::X86_64
    }

    fn mov_reg_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (Self::enc(dst), Self::enc(src));
        if d == s {
            return;
        }
        alu_rr(b, 0x89, d, s);
    }

    fn mov_imm_to_reg(&self, b: &mut CodeBuf, dst: IntReg, imm: i64) {
        let rm = Self::enc(dst);
        if imm >= i32::MIN as i64 && imm <= i32::MAX as i64 {
            rex(b, true, 0, rm);
            b.emit_u8(0xC7);
            modrm(b, 0b11, 0, rm);
            b.emit_i32(imm as i32);
        } else {
            rex(b, true, 0, rm);
            b.emit_u8(0xB8 + (rm & 7));
            b.emit_u64(imm as u64);
        }
    }

    fn add_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        alu_rr(b, 0x01, Self::enc(dst), Self::enc(src));
    }

    fn sub_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        alu_rr(b, 0x29, Self::enc(dst), Self::enc(src));
    }

    fn mul_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        // imul reg, r/m — reg field is the destination here.
        let (d, s) = (Self::enc(dst), Self::enc(src));
        rex(b, true, d, s);
        b.emit_u8(0x0F);
        b.emit_u8(0xAF);
        modrm(b, 0b11, d, s);
    }

    fn sdiv_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        // idiv claims rax:rdx; route the divisor through r11 when it would
        // collide.
        let d = Self::enc(dst);
        let mut s = Self::enc(src);
        if s == RAX || s == RDX {
            alu_rr(b, 0x89, R11, s);
            s = R11;
        }
        if d != RAX {
            alu_rr(b, 0x89, RAX, d);
        }
        b.emit_u8(0x48); // cqo
        b.emit_u8(0x99);
        rex(b, true, 0, s);
        b.emit_u8(0xF7);
        modrm(b, 0b11, 7, s);
        if d != RAX {
            alu_rr(b, 0x89, d, RAX);
        }
    }

    fn srem_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let d = Self::enc(dst);
        let mut s = Self::enc(src);
        if s == RAX || s == RDX {
            alu_rr(b, 0x89, R11, s);
            s = R11;
        }
        if d != RAX {
            alu_rr(b, 0x89, RAX, d);
        }
        b.emit_u8(0x48);
        b.emit_u8(0x99);
        rex(b, true, 0, s);
        b.emit_u8(0xF7);
        modrm(b, 0b11, 7, s);
        alu_rr(b, 0x89, d, RDX);
    }

    fn add_imm(&self, b: &mut CodeBuf, dst: IntReg, imm: i32) {
        if imm == 0 {
            return;
        }
        let rm = Self::enc(dst);
        rex(b, true, 0, rm);
        b.emit_u8(0x81);
        modrm(b, 0b11, 0, rm);
        b.emit_i32(imm);
    }

    fn neg_reg(&self, b: &mut CodeBuf, r: IntReg) {
        let rm = Self::enc(r);
        rex(b, true, 0, rm);
        b.emit_u8(0xF7);
        modrm(b, 0b11, 3, rm);
    }

    fn not_reg(&self, b: &mut CodeBuf, r: IntReg) {
        let rm = Self::enc(r);
        rex(b, true, 0, rm);
        b.emit_u8(0xF7);
        modrm(b, 0b11, 2, rm);
    }

    fn and_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        alu_rr(b, 0x21, Self::enc(dst), Self::enc(src));
    }

    fn or_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        alu_rr(b, 0x09, Self::enc(dst), Self::enc(src));
    }

    fn xor_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        alu_rr(b, 0x31, Self::enc(dst), Self::enc(src));
    }

    fn shl_imm(&self, b: &mut CodeBuf, dst: IntReg, n: u8) {
        let rm = Self::enc(dst);
        rex(b, true, 0, rm);
        b.emit_u8(0xC1);
        modrm(b, 0b11, 4, rm);
        b.emit_u8(n);
    }

    fn shr_imm(&self, b: &mut CodeBuf, dst: IntReg, n: u8) {
        let rm = Self::enc(dst);
        rex(b, true, 0, rm);
        b.emit_u8(0xC1);
        modrm(b, 0b11, 5, rm);
        b.emit_u8(n);
    }

    fn shl_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let a = Self::enc(amount);
        if a != RCX {
            alu_rr(b, 0x89, RCX, a);
        }
        let rm = Self::enc(dst);
        rex(b, true, 0, rm);
        b.emit_u8(0xD3);
        modrm(b, 0b11, 4, rm);
    }

    fn shr_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let a = Self::enc(amount);
        if a != RCX {
            alu_rr(b, 0x89, RCX, a);
        }
        let rm = Self::enc(dst);
        rex(b, true, 0, rm);
        b.emit_u8(0xD3);
        modrm(b, 0b11, 7, rm); // sar
    }

    fn rol_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let a = Self::enc(amount);
        if a != RCX {
            alu_rr(b, 0x89, RCX, a);
        }
        let rm = Self::enc(dst);
        rex(b, true, 0, rm);
        b.emit_u8(0xD3);
        modrm(b, 0b11, 0, rm);
    }

    fn ror_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let a = Self::enc(amount);
        if a != RCX {
            alu_rr(b, 0x89, RCX, a);
        }
        let rm = Self::enc(dst);
        rex(b, true, 0, rm);
        b.emit_u8(0xD3);
        modrm(b, 0b11, 1, rm);
    }

    fn branch_if(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, y: IntReg) -> ForwardLabel {
        self.cmp_rr(b, x, y);
        self.jcc_forward(b, cc)
    }

    fn branch_if_imm(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, imm: i32) -> ForwardLabel {
        self.cmp_imm(b, x, imm);
        self.jcc_forward(b, cc)
    }

    fn branch_if_backward(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, y: IntReg, target: usize) {
        self.cmp_rr(b, x, y);
        b.emit_u8(0x0F);
        b.emit_u8(jcc_code(cc));
        let next = b.offset() + 4;
        b.emit_i32(target as i32 - next as i32);
    }

    fn jmp_forward(&self, b: &mut CodeBuf) -> ForwardLabel {
        b.emit_u8(0xE9);
        let at = b.offset();
        b.emit_u32(0);
        ForwardLabel {
            at,
            shape: BranchShape::X64Rel32,
        }
    }

    fn jmp_backward(&self, b: &mut CodeBuf, target: usize) {
        b.emit_u8(0xE9);
        let next = b.offset() + 4;
        b.emit_i32(target as i32 - next as i32);
    }

    fn bind(&self, b: &mut CodeBuf, label: ForwardLabel) -> Result<(), EmitError> {
        debug_assert_eq!(label.shape, BranchShape::X64Rel32);
        let disp = b.offset() as i64 - (label.at as i64 + 4);
        if disp > i32::MAX as i64 || disp < i32::MIN as i64 {
            return Err(EmitError::BranchOutOfRange { at: label.at });
        }
        b.patch_i32(label.at, disp as i32);
        Ok(())
    }

    fn set_if(&self, b: &mut CodeBuf, cc: Cond, dst: IntReg, x: IntReg, y: IntReg) {
        self.cmp_rr(b, x, y);
        let rm = Self::enc(dst);
        rex(b, false, 0, rm);
        b.emit_u8(0x0F);
        b.emit_u8(setcc_code(cc));
        modrm(b, 0b11, 0, rm);
        // movzx dst, dst_low
        rex(b, true, rm, rm);
        b.emit_u8(0x0F);
        b.emit_u8(0xB6);
        modrm(b, 0b11, rm, rm);
    }

    fn call_symbol(&self, b: &mut CodeBuf, target: &str) {
        b.emit_u8(0xE8);
        let offset = b.offset();
        b.emit_u32(CALL_PLACEHOLDER);
        b.call_patches.push(CallPatch {
            offset,
            target: target.to_string(),
            kind: CallKind::Rel32,
        });
    }

    fn call_import(&self, b: &mut CodeBuf, symbol: &str) {
        let target = format!("{}{}", symbol, STUB_SUFFIX);
        if self.os == Os::Windows {
            // Indirect through the IAT slot.
            b.emit_u8(0xFF);
            b.emit_u8(0x15);
            let offset = b.offset();
            b.emit_u32(CALL_PLACEHOLDER);
            b.call_patches.push(CallPatch {
                offset,
                target,
                kind: CallKind::IatIndirect,
            });
        } else {
            self.call_symbol(b, &target);
        }
    }

    fn call_reg(&self, b: &mut CodeBuf, r: IntReg) {
        let rm = Self::enc(r);
        if rm >= 8 {
            b.emit_u8(0x41);
        }
        b.emit_u8(0xFF);
        modrm(b, 0b11, 2, rm);
    }

    fn tail_jump_backward(&self, b: &mut CodeBuf, target: usize) {
        self.jmp_backward(b, target);
    }

    fn ret(&self, b: &mut CodeBuf) {
        b.emit_u8(0xC3);
    }

    fn syscall(&self, b: &mut CodeBuf) {
        b.emit_u8(0x0F);
        b.emit_u8(0x05);
    }

    fn load(&self, b: &mut CodeBuf, dst: IntReg, base: IntReg, disp: i32, size: MemSize) {
        let (d, base) = (Self::enc(dst), Self::enc(base));
        match size {
            MemSize::B8 => {
                rex(b, true, d, base);
                b.emit_u8(0x8B);
                modrm_mem(b, d, base, disp);
            }
            MemSize::B4 => {
                // 32-bit mov zero-extends.
                rex(b, false, d, base);
                b.emit_u8(0x8B);
                modrm_mem(b, d, base, disp);
            }
            MemSize::B2 => {
                rex(b, true, d, base);
                b.emit_u8(0x0F);
                b.emit_u8(0xB7);
                modrm_mem(b, d, base, disp);
            }
            MemSize::B1 => {
                rex(b, true, d, base);
                b.emit_u8(0x0F);
                b.emit_u8(0xB6);
                modrm_mem(b, d, base, disp);
            }
        }
    }

    fn store(&self, b: &mut CodeBuf, src: IntReg, base: IntReg, disp: i32, size: MemSize) {
        let (s, base) = (Self::enc(src), Self::enc(base));
        match size {
            MemSize::B8 => {
                rex(b, true, s, base);
                b.emit_u8(0x89);
                modrm_mem(b, s, base, disp);
            }
            MemSize::B4 => {
                rex(b, false, s, base);
                b.emit_u8(0x89);
                modrm_mem(b, s, base, disp);
            }
            MemSize::B2 => {
                b.emit_u8(0x66);
                rex(b, false, s, base);
                b.emit_u8(0x89);
                modrm_mem(b, s, base, disp);
            }
            MemSize::B1 => {
                rex(b, false, s, base);
                b.emit_u8(0x88);
                modrm_mem(b, s, base, disp);
            }
        }
    }

    fn lea_symbol(&self, b: &mut CodeBuf, dst: IntReg, symbol: &str) {
        let d = Self::enc(dst);
        rex(b, true, d, 0);
        b.emit_u8(0x8D);
        modrm(b, 0b00, d, 0b101); // RIP-relative
        let offset = b.offset();
        b.emit_u32(LEA_PLACEHOLDER);
        b.pc_relocs.push(PcRelocation {
            offset,
            symbol: symbol.to_string(),
            kind: PcRelKind::X64Lea,
        });
    }

    fn lea_slot(&self, b: &mut CodeBuf, dst: IntReg, slot: i32) {
        let d = Self::enc(dst);
        rex(b, true, d, RBP);
        b.emit_u8(0x8D);
        modrm_mem(b, d, RBP, -(slot + 8));
    }

    fn prologue(&self, b: &mut CodeBuf) -> FramePatch {
        b.emit_u8(0x55); // push rbp
        b.emit_u8(0x48); // mov rbp, rsp
        b.emit_u8(0x89);
        b.emit_u8(0xE5);
        b.emit_u8(0x48); // sub rsp, imm32
        b.emit_u8(0x81);
        b.emit_u8(0xEC);
        let site = super::FrameSite {
            at: b.offset(),
            negate: false,
        };
        b.emit_u32(0);
        FramePatch { sites: vec![site] }
    }

    fn epilogue(&self, b: &mut CodeBuf, _frame: &mut FramePatch) {
        b.emit_u8(0x48); // mov rsp, rbp
        b.emit_u8(0x89);
        b.emit_u8(0xEC);
        b.emit_u8(0x5D); // pop rbp
        b.emit_u8(0xC3);
    }

    fn patch_frame_size(
        &self,
        b: &mut CodeBuf,
        frame: &FramePatch,
        size: u32,
    ) -> Result<(), EmitError> {
        for site in &frame.sites {
            b.patch_u32(site.at, size);
        }
        Ok(())
    }

    fn load_slot(&self, b: &mut CodeBuf, dst: IntReg, slot: i32) {
        self.load(b, dst, IntReg::Fp, -(slot + 8), MemSize::B8);
    }

    fn store_slot(&self, b: &mut CodeBuf, src: IntReg, slot: i32) {
        self.store(b, src, IntReg::Fp, -(slot + 8), MemSize::B8);
    }

    fn fload_slot(&self, b: &mut CodeBuf, dst: FloatReg, slot: i32) {
        self.fload(b, dst, IntReg::Fp, -(slot + 8));
    }

    fn fstore_slot(&self, b: &mut CodeBuf, src: FloatReg, slot: i32) {
        self.fstore(b, src, IntReg::Fp, -(slot + 8));
    }

    fn fmov(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        if dst != src {
            self.movsd_rr(b, dst, src);
        }
    }

    fn fload(&self, b: &mut CodeBuf, dst: FloatReg, base: IntReg, disp: i32) {
        b.emit_u8(0xF2);
        let base = Self::enc(base);
        if base >= 8 {
            b.emit_u8(0x41);
        }
        b.emit_u8(0x0F);
        b.emit_u8(0x10);
        modrm_mem(b, dst.0, base, disp);
    }

    fn fstore(&self, b: &mut CodeBuf, src: FloatReg, base: IntReg, disp: i32) {
        b.emit_u8(0xF2);
        let base = Self::enc(base);
        if base >= 8 {
            b.emit_u8(0x41);
        }
        b.emit_u8(0x0F);
        b.emit_u8(0x11);
        modrm_mem(b, src.0, base, disp);
    }

    fn fadd(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        self.float_arith(b, 0x58, dst, src);
    }

    fn fsub(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        self.float_arith(b, 0x5C, dst, src);
    }

    fn fmul(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        self.float_arith(b, 0x59, dst, src);
    }

    fn fdiv(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        self.float_arith(b, 0x5E, dst, src);
    }

    fn fmadd(&self, b: &mut CodeBuf, dst: FloatReg, x: FloatReg, y: FloatReg) {
        // No FMA extension dependence: xmm3 carries the product.
        let t = FloatReg(3);
        self.movsd_rr(b, t, x);
        self.float_arith(b, 0x59, t, y);
        self.float_arith(b, 0x58, dst, t);
    }

    fn fneg(&self, b: &mut CodeBuf, r: FloatReg) {
        // Flip the sign bit through r11.
        self.bits_f_to_int(b, IntReg::T2, r);
        rex(b, true, 0, R11);
        b.emit_u8(0x0F);
        b.emit_u8(0xBA);
        modrm(b, 0b11, 7, R11); // btc r11, 63
        b.emit_u8(63);
        self.bits_int_to_f(b, r, IntReg::T2);
    }

    fn fbranch_if(&self, b: &mut CodeBuf, cc: FCond, x: FloatReg, y: FloatReg) -> ForwardLabel {
        // Unsigned-style flags from ucomisd; swap operands for lt/le so NaN
        // falls through.
        let (a, c, cond) = match cc {
            FCond::Eq => (x, y, Cond::Eq),
            FCond::Ne => (x, y, Cond::Ne),
            FCond::Gt => (x, y, Cond::Ugt),
            FCond::Ge => (x, y, Cond::Uge),
            FCond::Lt => (y, x, Cond::Ugt),
            FCond::Le => (y, x, Cond::Uge),
        };
        self.ucomisd(b, a, c);
        self.jcc_forward(b, cond)
    }

    fn fbranch_if_nan(&self, b: &mut CodeBuf, x: FloatReg) -> ForwardLabel {
        self.ucomisd(b, x, x);
        b.emit_u8(0x0F);
        b.emit_u8(0x8A); // jp
        let at = b.offset();
        b.emit_u32(0);
        ForwardLabel {
            at,
            shape: BranchShape::X64Rel32,
        }
    }

    fn fset_if(&self, b: &mut CodeBuf, cc: FCond, dst: IntReg, x: FloatReg, y: FloatReg) {
        // cmpsd builds an all-ones mask in xmm2; mask & 1 is the boolean.
        let t = super::FSCRATCH2;
        match cc {
            FCond::Eq => {
                self.movsd_rr(b, t, x);
                self.cmpsd(b, t, y, 0);
            }
            FCond::Ne => {
                self.movsd_rr(b, t, x);
                self.cmpsd(b, t, y, 4);
            }
            FCond::Lt => {
                self.movsd_rr(b, t, x);
                self.cmpsd(b, t, y, 1);
            }
            FCond::Le => {
                self.movsd_rr(b, t, x);
                self.cmpsd(b, t, y, 2);
            }
            FCond::Gt => {
                self.movsd_rr(b, t, y);
                self.cmpsd(b, t, x, 1);
            }
            FCond::Ge => {
                self.movsd_rr(b, t, y);
                self.cmpsd(b, t, x, 2);
            }
        }
        self.bits_f_to_int(b, dst, t);
        let rm = Self::enc(dst);
        rex(b, true, 0, rm);
        b.emit_u8(0x83);
        modrm(b, 0b11, 4, rm); // and dst, 1
        b.emit_u8(1);
    }

    fn cvt_f_to_int(&self, b: &mut CodeBuf, dst: IntReg, src: FloatReg) {
        let d = Self::enc(dst);
        b.emit_u8(0xF2);
        rex(b, true, d, src.0);
        b.emit_u8(0x0F);
        b.emit_u8(0x2C); // cvttsd2si
        modrm(b, 0b11, d, src.0);
    }

    fn cvt_int_to_f(&self, b: &mut CodeBuf, dst: FloatReg, src: IntReg) {
        let s = Self::enc(src);
        b.emit_u8(0xF2);
        rex(b, true, dst.0, s);
        b.emit_u8(0x0F);
        b.emit_u8(0x2A); // cvtsi2sd
        modrm(b, 0b11, dst.0, s);
    }

    fn bits_f_to_int(&self, b: &mut CodeBuf, dst: IntReg, src: FloatReg) {
        let d = Self::enc(dst);
        b.emit_u8(0x66);
        rex(b, true, src.0, d);
        b.emit_u8(0x0F);
        b.emit_u8(0x7E); // movq r64, xmm
        modrm(b, 0b11, src.0, d);
    }

    fn bits_int_to_f(&self, b: &mut CodeBuf, dst: FloatReg, src: IntReg) {
        let s = Self::enc(src);
        b.emit_u8(0x66);
        rex(b, true, dst.0, s);
        b.emit_u8(0x0F);
        b.emit_u8(0x6E); // movq xmm, r64
        modrm(b, 0b11, dst.0, s);
    }

    fn int_arg(&self, i: usize) -> IntReg {
        if self.os == Os::Windows {
            [IntReg::A3, IntReg::A2, IntReg::A4, IntReg::A5][i]
        } else {
            [
                IntReg::A0,
                IntReg::A1,
                IntReg::A2,
                IntReg::A3,
                IntReg::A4,
                IntReg::A5,
            ][i]
        }
    }

    fn sysarg(&self, i: usize) -> IntReg {
        [
            IntReg::A0, // rdi
            IntReg::A1, // rsi
            IntReg::A2, // rdx
            IntReg::T1, // r10
            IntReg::A4, // r8
            IntReg::A5, // r9
        ][i]
    }

    fn unsafe_reg(&self, name: &str) -> Option<IntReg> {
        let n = match name {
            "rax" | "a" => 0,
            "rcx" | "c" => 1,
            "rdx" | "d" => 2,
            "rbx" | "b" => 3,
            "rsp" => 4,
            "rbp" => 5,
            "rsi" | "e" => 6,
            "rdi" | "f" => 7,
            "r8" => 8,
            "r9" => 9,
            "r10" => 10,
            "r11" => 11,
            "r12" => 12,
            "r13" => 13,
            "r14" => 14,
            "r15" => 15,
            _ => return None,
        };
        Some(IntReg::Phys(n))
    }
}
