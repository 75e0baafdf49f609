//! RISC-V 64 (RV64IMD) instruction encodings.
//!
//! Conditional branches pair an inverted B-type skip with a JAL so forward
//! targets get the JAL's ±1 MiB reach instead of the branch's ±4 KiB.
//! Address materialization is AUIPC+ADDI with zeroed immediates.

use super::{
    BranchShape, Cond, FCond, FloatReg, ForwardLabel, FramePatch, FrameSite, IntReg, Isa, MemSize,
};
use crate::buffer::CodeBuf;
use crate::error::EmitError;
use crate::reloc::{CallKind, CallPatch, PcRelKind, PcRelocation, STUB_SUFFIX};
use crate::target::{Arch, Os};

pub struct Rv64 {
    #[allow(dead_code)]
    os: Os,
}

const X0: u32 = 0;
const RA: u32 = 1;
const SP: u32 = 2;
const S0: u32 = 8;

impl Rv64 {
    pub fn new(os: Os) -> Self {
        Self { os }
    }

    fn enc(&self, r: IntReg) -> u32 {
        match r {
            IntReg::A0 => 10,
            IntReg::A1 => 11,
            IntReg::A2 => 12,
            IntReg::A3 => 13,
            IntReg::A4 => 14,
            IntReg::A5 => 15,
            IntReg::T0 => 5,
            IntReg::T1 => 6,
            IntReg::T2 => 7,
            IntReg::Ret => 10,
            IntReg::SysNum => 17, // a7
            IntReg::Fp => 8,      // s0
            IntReg::Sp => 2,
            IntReg::Phys(n) => n as u32,
        }
    }

    fn r_type(&self, b: &mut CodeBuf, op: u32, f3: u32, f7: u32, rd: u32, rs1: u32, rs2: u32) {
        b.emit_u32(f7 << 25 | rs2 << 20 | rs1 << 15 | f3 << 12 | rd << 7 | op);
    }

    fn i_type(&self, b: &mut CodeBuf, op: u32, f3: u32, rd: u32, rs1: u32, imm: i32) {
        b.emit_u32(((imm as u32) & 0xFFF) << 20 | rs1 << 15 | f3 << 12 | rd << 7 | op);
    }

    fn s_type(&self, b: &mut CodeBuf, f3: u32, rs1: u32, rs2: u32, imm: i32) {
        let imm = imm as u32;
        b.emit_u32(
            (imm >> 5 & 0x7F) << 25 | rs2 << 20 | rs1 << 15 | f3 << 12 | (imm & 0x1F) << 7 | 0x23,
        );
    }

    fn b_type(&self, b: &mut CodeBuf, f3: u32, rs1: u32, rs2: u32, imm: i32) {
        let imm = imm as u32;
        b.emit_u32(
            (imm >> 12 & 1) << 31
                | (imm >> 5 & 0x3F) << 25
                | rs2 << 20
                | rs1 << 15
                | f3 << 12
                | (imm >> 1 & 0xF) << 8
                | (imm >> 11 & 1) << 7
                | 0x63,
        );
    }

    fn jal(&self, b: &mut CodeBuf, rd: u32, imm: i32) {
        let imm = imm as u32;
        b.emit_u32(
            (imm >> 20 & 1) << 31
                | (imm >> 1 & 0x3FF) << 21
                | (imm >> 11 & 1) << 20
                | (imm >> 12 & 0xFF) << 12
                | rd << 7
                | 0x6F,
        );
    }

    fn addi(&self, b: &mut CodeBuf, rd: u32, rs1: u32, imm: i32) {
        self.i_type(b, 0x13, 0, rd, rs1, imm);
    }

    fn load_imm(&self, b: &mut CodeBuf, rd: u32, imm: i64) {
        if (-2048..2048).contains(&imm) {
            self.addi(b, rd, X0, imm as i32);
        } else if imm >= i32::MIN as i64 && imm <= i32::MAX as i64 {
            let lo = ((imm as i32) << 20) >> 20;
            let hi = ((imm as i32).wrapping_sub(lo) as u32) >> 12;
            b.emit_u32(hi << 12 | rd << 7 | 0x37); // lui
            if lo != 0 {
                self.addi(b, rd, rd, lo);
            }
        } else {
            // li expansion: materialize the upper part, shift, add the rest.
            let lo = ((imm << 52) >> 52) as i32;
            let hi = (imm - lo as i64) >> 12;
            self.load_imm(b, rd, hi);
            self.i_type(b, 0x13, 1, rd, rd, 12); // slli rd, rd, 12
            if lo != 0 {
                self.addi(b, rd, rd, lo);
            }
        }
    }

    /// Branch condition: (funct3, swap operands).
    fn bcc(cc: Cond) -> (u32, bool) {
        match cc {
            Cond::Eq => (0, false),
            Cond::Ne => (1, false),
            Cond::Lt => (4, false),
            Cond::Ge => (5, false),
            Cond::Ult => (6, false),
            Cond::Uge => (7, false),
            Cond::Gt => (4, true),  // blt swapped
            Cond::Le => (5, true),  // bge swapped
            Cond::Ugt => (6, true),
            Cond::Ule => (7, true),
        }
    }

    fn invert(cc: Cond) -> Cond {
        match cc {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Lt => Cond::Ge,
            Cond::Ge => Cond::Lt,
            Cond::Gt => Cond::Le,
            Cond::Le => Cond::Gt,
            Cond::Ult => Cond::Uge,
            Cond::Uge => Cond::Ult,
            Cond::Ugt => Cond::Ule,
            Cond::Ule => Cond::Ugt,
        }
    }

    /// Skip-over-JAL forward branch: taken when `cc` holds.
    fn branch_jal_forward(&self, b: &mut CodeBuf, cc: Cond, x: u32, y: u32) -> ForwardLabel {
        let (f3, swap) = Self::bcc(Self::invert(cc));
        let (rs1, rs2) = if swap { (y, x) } else { (x, y) };
        self.b_type(b, f3, rs1, rs2, 8);
        let at = b.offset();
        self.jal(b, X0, 0);
        ForwardLabel {
            at,
            shape: BranchShape::Rv64Jal20,
        }
    }

    /// `dst = (x cc y) ? 1 : 0` on raw register numbers; may clobber t2.
    fn set_cc(&self, b: &mut CodeBuf, cc: Cond, dst: u32, x: u32, y: u32) {
        const T2: u32 = 7;
        match cc {
            Cond::Eq => {
                self.r_type(b, 0x33, 4, 0, T2, x, y); // xor t2, x, y
                self.i_type(b, 0x13, 3, dst, T2, 1); // sltiu dst, t2, 1
            }
            Cond::Ne => {
                self.r_type(b, 0x33, 4, 0, T2, x, y);
                self.r_type(b, 0x33, 3, 0, dst, X0, T2); // sltu dst, x0, t2
            }
            Cond::Lt => self.r_type(b, 0x33, 2, 0, dst, x, y),
            Cond::Gt => self.r_type(b, 0x33, 2, 0, dst, y, x),
            Cond::Ult => self.r_type(b, 0x33, 3, 0, dst, x, y),
            Cond::Ugt => self.r_type(b, 0x33, 3, 0, dst, y, x),
            Cond::Ge => {
                self.r_type(b, 0x33, 2, 0, dst, x, y);
                self.i_type(b, 0x13, 4, dst, dst, 1); // xori dst, dst, 1
            }
            Cond::Le => {
                self.r_type(b, 0x33, 2, 0, dst, y, x);
                self.i_type(b, 0x13, 4, dst, dst, 1);
            }
            Cond::Uge => {
                self.r_type(b, 0x33, 3, 0, dst, x, y);
                self.i_type(b, 0x13, 4, dst, dst, 1);
            }
            Cond::Ule => {
                self.r_type(b, 0x33, 3, 0, dst, y, x);
                self.i_type(b, 0x13, 4, dst, dst, 1);
            }
        }
    }

    /// Float compare producing 0/1 in an integer register.
    fn fset_cc(&self, b: &mut CodeBuf, cc: FCond, dst: u32, x: u32, y: u32) {
        match cc {
            // feq.d / flt.d / fle.d; NaN operands give 0.
            FCond::Eq => self.r_type(b, 0x53, 2, 0x51, dst, x, y),
            FCond::Ne => {
                self.r_type(b, 0x53, 2, 0x51, dst, x, y);
                self.i_type(b, 0x13, 4, dst, dst, 1);
            }
            FCond::Lt => self.r_type(b, 0x53, 1, 0x51, dst, x, y),
            FCond::Le => self.r_type(b, 0x53, 0, 0x51, dst, x, y),
            FCond::Gt => self.r_type(b, 0x53, 1, 0x51, dst, y, x),
            FCond::Ge => self.r_type(b, 0x53, 0, 0x51, dst, y, x),
        }
    }
}

impl Isa for Rv64 {
    fn arch(&self) -> Arch {
        Arch::Riscv64
    }

    fn mov_reg_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        if d != s {
            self.addi(b, d, s, 0);
        }
    }

    fn mov_imm_to_reg(&self, b: &mut CodeBuf, dst: IntReg, imm: i64) {
        self.load_imm(b, self.enc(dst), imm);
    }

    fn add_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        self.r_type(b, 0x33, 0, 0, d, d, s);
    }

    fn sub_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        self.r_type(b, 0x33, 0, 0x20, d, d, s);
    }

    fn mul_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        self.r_type(b, 0x33, 0, 1, d, d, s);
    }

    fn sdiv_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        self.r_type(b, 0x33, 4, 1, d, d, s);
    }

    fn srem_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        self.r_type(b, 0x33, 6, 1, d, d, s);
    }

    fn add_imm(&self, b: &mut CodeBuf, dst: IntReg, imm: i32) {
        if imm == 0 {
            return;
        }
        let d = self.enc(dst);
        if (-2048..2048).contains(&imm) {
            self.addi(b, d, d, imm);
        } else {
            const T2: u32 = 7;
            self.load_imm(b, T2, imm as i64);
            self.r_type(b, 0x33, 0, 0, d, d, T2);
        }
    }

    fn neg_reg(&self, b: &mut CodeBuf, r: IntReg) {
        let d = self.enc(r);
        self.r_type(b, 0x33, 0, 0x20, d, X0, d);
    }

    fn not_reg(&self, b: &mut CodeBuf, r: IntReg) {
        let d = self.enc(r);
        self.i_type(b, 0x13, 4, d, d, -1);
    }

    fn and_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        self.r_type(b, 0x33, 7, 0, d, d, s);
    }

    fn or_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        self.r_type(b, 0x33, 6, 0, d, d, s);
    }

    fn xor_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        self.r_type(b, 0x33, 4, 0, d, d, s);
    }

    fn shl_imm(&self, b: &mut CodeBuf, dst: IntReg, n: u8) {
        let d = self.enc(dst);
        self.i_type(b, 0x13, 1, d, d, n as i32);
    }

    fn shr_imm(&self, b: &mut CodeBuf, dst: IntReg, n: u8) {
        let d = self.enc(dst);
        self.i_type(b, 0x13, 5, d, d, n as i32); // srli
    }

    fn shl_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let (d, a) = (self.enc(dst), self.enc(amount));
        self.r_type(b, 0x33, 1, 0, d, d, a);
    }

    fn shr_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let (d, a) = (self.enc(dst), self.enc(amount));
        self.r_type(b, 0x33, 5, 0x20, d, d, a); // sra
    }

    fn rol_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        // rol = (x << n) | (x >> (64-n)); clobbers t2 and the amount register.
        let (d, a) = (self.enc(dst), self.enc(amount));
        const T2: u32 = 7;
        self.addi(b, T2, d, 0);
        self.r_type(b, 0x33, 1, 0, d, d, a); // sll d, d, a
        self.r_type(b, 0x33, 0, 0x20, a, X0, a); // neg a
        self.r_type(b, 0x33, 5, 0, T2, T2, a); // srl t2, t2, a
        self.r_type(b, 0x33, 6, 0, d, d, T2); // or
    }

    fn ror_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let (d, a) = (self.enc(dst), self.enc(amount));
        const T2: u32 = 7;
        self.addi(b, T2, d, 0);
        self.r_type(b, 0x33, 5, 0, d, d, a); // srl d, d, a
        self.r_type(b, 0x33, 0, 0x20, a, X0, a); // neg a
        self.r_type(b, 0x33, 1, 0, T2, T2, a); // sll t2, t2, a
        self.r_type(b, 0x33, 6, 0, d, d, T2);
    }

    fn branch_if(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, y: IntReg) -> ForwardLabel {
        self.branch_jal_forward(b, cc, self.enc(x), self.enc(y))
    }

    fn branch_if_imm(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, imm: i32) -> ForwardLabel {
        if imm == 0 {
            return self.branch_jal_forward(b, cc, self.enc(x), X0);
        }
        const T2: u32 = 7;
        self.load_imm(b, T2, imm as i64);
        self.branch_jal_forward(b, cc, self.enc(x), T2)
    }

    fn branch_if_backward(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, y: IntReg, target: usize) {
        let (f3, swap) = Self::bcc(Self::invert(cc));
        let (x, y) = (self.enc(x), self.enc(y));
        let (rs1, rs2) = if swap { (y, x) } else { (x, y) };
        self.b_type(b, f3, rs1, rs2, 8);
        let delta = target as i64 - b.offset() as i64;
        self.jal(b, X0, delta as i32);
    }

    fn jmp_forward(&self, b: &mut CodeBuf) -> ForwardLabel {
        let at = b.offset();
        self.jal(b, X0, 0);
        ForwardLabel {
            at,
            shape: BranchShape::Rv64Jal20,
        }
    }

    fn jmp_backward(&self, b: &mut CodeBuf, target: usize) {
        let delta = target as i64 - b.offset() as i64;
        self.jal(b, X0, delta as i32);
    }

    fn bind(&self, b: &mut CodeBuf, label: ForwardLabel) -> Result<(), EmitError> {
        debug_assert_eq!(label.shape, BranchShape::Rv64Jal20);
        let delta = b.offset() as i64 - label.at as i64;
        if delta >= 1 << 20 || delta < -(1 << 20) {
            return Err(EmitError::BranchOutOfRange { at: label.at });
        }
        let imm = delta as u32;
        let word = b.read_u32(label.at)
            | (imm >> 20 & 1) << 31
            | (imm >> 1 & 0x3FF) << 21
            | (imm >> 11 & 1) << 20
            | (imm >> 12 & 0xFF) << 12;
        b.patch_u32(label.at, word);
        Ok(())
    }

    fn set_if(&self, b: &mut CodeBuf, cc: Cond, dst: IntReg, x: IntReg, y: IntReg) {
        self.set_cc(b, cc, self.enc(dst), self.enc(x), self.enc(y));
    }

    fn call_symbol(&self, b: &mut CodeBuf, target: &str) {
        let offset = b.offset();
        b.emit_u32(0x17 | RA << 7); // auipc ra, 0
        self.i_type(b, 0x67, 0, RA, RA, 0); // jalr ra, ra, 0
        b.call_patches.push(CallPatch {
            offset,
            target: target.to_string(),
            kind: CallKind::AuipcJalr,
        });
    }

    fn call_import(&self, b: &mut CodeBuf, symbol: &str) {
        let offset = b.offset();
        b.emit_u32(0x17 | RA << 7);
        self.i_type(b, 0x67, 0, RA, RA, 0);
        b.call_patches.push(CallPatch {
            offset,
            target: format!("{}{}", symbol, STUB_SUFFIX),
            kind: CallKind::AuipcJalr,
        });
    }

    fn call_reg(&self, b: &mut CodeBuf, r: IntReg) {
        self.i_type(b, 0x67, 0, RA, self.enc(r), 0);
    }

    fn tail_jump_backward(&self, b: &mut CodeBuf, target: usize) {
        self.jmp_backward(b, target);
    }

    fn ret(&self, b: &mut CodeBuf) {
        b.emit_u32(0x0000_8067); // jalr x0, ra, 0
    }

    fn syscall(&self, b: &mut CodeBuf) {
        b.emit_u32(0x0000_0073); // ecall
    }

    fn load(&self, b: &mut CodeBuf, dst: IntReg, base: IntReg, disp: i32, size: MemSize) {
        let (d, n) = (self.enc(dst), self.enc(base));
        let f3 = match size {
            MemSize::B8 => 3,
            MemSize::B4 => 6, // lwu
            MemSize::B2 => 5, // lhu
            MemSize::B1 => 4, // lbu
        };
        self.i_type(b, 0x03, f3, d, n, disp);
    }

    fn store(&self, b: &mut CodeBuf, src: IntReg, base: IntReg, disp: i32, size: MemSize) {
        let (s, n) = (self.enc(src), self.enc(base));
        let f3 = match size {
            MemSize::B8 => 3,
            MemSize::B4 => 2,
            MemSize::B2 => 1,
            MemSize::B1 => 0,
        };
        self.s_type(b, f3, n, s, disp);
    }

    fn lea_symbol(&self, b: &mut CodeBuf, dst: IntReg, symbol: &str) {
        let d = self.enc(dst);
        let offset = b.offset();
        b.emit_u32(0x17 | d << 7); // auipc
        self.addi(b, d, d, 0);
        b.pc_relocs.push(PcRelocation {
            offset,
            symbol: symbol.to_string(),
            kind: PcRelKind::Rv64AuipcAddi,
        });
    }

    fn lea_slot(&self, b: &mut CodeBuf, dst: IntReg, slot: i32) {
        self.addi(b, self.enc(dst), S0, slot);
    }

    fn prologue(&self, b: &mut CodeBuf) -> FramePatch {
        self.addi(b, SP, SP, -16);
        self.s_type(b, 3, SP, RA, 8); // sd ra, 8(sp)
        self.s_type(b, 3, SP, S0, 0); // sd s0, 0(sp)
        let site = FrameSite {
            at: b.offset(),
            negate: true,
        };
        self.addi(b, SP, SP, 0); // addi sp, sp, -frame
        self.addi(b, S0, SP, 0); // mv s0, sp
        FramePatch { sites: vec![site] }
    }

    fn epilogue(&self, b: &mut CodeBuf, frame: &mut FramePatch) {
        frame.sites.push(FrameSite {
            at: b.offset(),
            negate: false,
        });
        self.addi(b, SP, SP, 0); // addi sp, sp, frame
        self.i_type(b, 0x03, 3, RA, SP, 8); // ld ra, 8(sp)
        self.i_type(b, 0x03, 3, S0, SP, 0); // ld s0, 0(sp)
        self.addi(b, SP, SP, 16);
        self.ret(b);
    }

    fn patch_frame_size(
        &self,
        b: &mut CodeBuf,
        frame: &FramePatch,
        size: u32,
    ) -> Result<(), EmitError> {
        if size > 2032 {
            return Err(EmitError::FrameTooLarge {
                name: String::new(),
            });
        }
        for site in &frame.sites {
            let imm: i32 = if site.negate {
                -(size as i32)
            } else {
                size as i32
            };
            let word = b.read_u32(site.at) | ((imm as u32) & 0xFFF) << 20;
            b.patch_u32(site.at, word);
        }
        Ok(())
    }

    fn load_slot(&self, b: &mut CodeBuf, dst: IntReg, slot: i32) {
        self.load(b, dst, IntReg::Fp, slot, MemSize::B8);
    }

    fn store_slot(&self, b: &mut CodeBuf, src: IntReg, slot: i32) {
        self.store(b, src, IntReg::Fp, slot, MemSize::B8);
    }

    fn fload_slot(&self, b: &mut CodeBuf, dst: FloatReg, slot: i32) {
        self.fload(b, dst, IntReg::Fp, slot);
    }

    fn fstore_slot(&self, b: &mut CodeBuf, src: FloatReg, slot: i32) {
        self.fstore(b, src, IntReg::Fp, slot);
    }

    fn fmov(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        if dst != src {
            // fsgnj.d fd, fs, fs
            self.r_type(b, 0x53, 0, 0x11, dst.0 as u32, src.0 as u32, src.0 as u32);
        }
    }

    fn fload(&self, b: &mut CodeBuf, dst: FloatReg, base: IntReg, disp: i32) {
        self.i_type(b, 0x07, 3, dst.0 as u32, self.enc(base), disp);
    }

    fn fstore(&self, b: &mut CodeBuf, src: FloatReg, base: IntReg, disp: i32) {
        let imm = disp as u32;
        b.emit_u32(
            (imm >> 5 & 0x7F) << 25
                | (src.0 as u32) << 20
                | self.enc(base) << 15
                | 3 << 12
                | (imm & 0x1F) << 7
                | 0x27,
        );
    }

    fn fadd(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        let (d, s) = (dst.0 as u32, src.0 as u32);
        self.r_type(b, 0x53, 7, 0x01, d, d, s); // fadd.d, dynamic rounding
    }

    fn fsub(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        let (d, s) = (dst.0 as u32, src.0 as u32);
        self.r_type(b, 0x53, 7, 0x05, d, d, s);
    }

    fn fmul(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        let (d, s) = (dst.0 as u32, src.0 as u32);
        self.r_type(b, 0x53, 7, 0x09, d, d, s);
    }

    fn fdiv(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        let (d, s) = (dst.0 as u32, src.0 as u32);
        self.r_type(b, 0x53, 7, 0x0D, d, d, s);
    }

    fn fmadd(&self, b: &mut CodeBuf, dst: FloatReg, x: FloatReg, y: FloatReg) {
        // fmadd.d fd, fx, fy, fd
        let w = (dst.0 as u32) << 27
            | 1 << 25
            | (y.0 as u32) << 20
            | (x.0 as u32) << 15
            | 7 << 12
            | (dst.0 as u32) << 7
            | 0x43;
        b.emit_u32(w);
    }

    fn fneg(&self, b: &mut CodeBuf, r: FloatReg) {
        // fsgnjn.d fd, fs, fs
        let d = r.0 as u32;
        self.r_type(b, 0x53, 1, 0x11, d, d, d);
    }

    fn fbranch_if(&self, b: &mut CodeBuf, cc: FCond, x: FloatReg, y: FloatReg) -> ForwardLabel {
        const T2: u32 = 7;
        self.fset_cc(b, cc, T2, x.0 as u32, y.0 as u32);
        self.branch_jal_forward(b, Cond::Ne, T2, X0)
    }

    fn fbranch_if_nan(&self, b: &mut CodeBuf, x: FloatReg) -> ForwardLabel {
        const T2: u32 = 7;
        // feq.d t2, x, x — zero iff NaN
        self.r_type(b, 0x53, 2, 0x51, T2, x.0 as u32, x.0 as u32);
        self.branch_jal_forward(b, Cond::Eq, T2, X0)
    }

    fn fset_if(&self, b: &mut CodeBuf, cc: FCond, dst: IntReg, x: FloatReg, y: FloatReg) {
        self.fset_cc(b, cc, self.enc(dst), x.0 as u32, y.0 as u32);
    }

    fn cvt_f_to_int(&self, b: &mut CodeBuf, dst: IntReg, src: FloatReg) {
        // fcvt.l.d rd, fs, rtz
        self.r_type(b, 0x53, 1, 0x61, self.enc(dst), src.0 as u32, 2);
    }

    fn cvt_int_to_f(&self, b: &mut CodeBuf, dst: FloatReg, src: IntReg) {
        // fcvt.d.l fd, rs
        self.r_type(b, 0x53, 7, 0x69, dst.0 as u32, self.enc(src), 2);
    }

    fn bits_f_to_int(&self, b: &mut CodeBuf, dst: IntReg, src: FloatReg) {
        // fmv.x.d
        self.r_type(b, 0x53, 0, 0x71, self.enc(dst), src.0 as u32, 0);
    }

    fn bits_int_to_f(&self, b: &mut CodeBuf, dst: FloatReg, src: IntReg) {
        // fmv.d.x
        self.r_type(b, 0x53, 0, 0x79, dst.0 as u32, self.enc(src), 0);
    }

    fn int_arg(&self, i: usize) -> IntReg {
        [
            IntReg::A0,
            IntReg::A1,
            IntReg::A2,
            IntReg::A3,
            IntReg::A4,
            IntReg::A5,
        ][i]
    }

    fn sysarg(&self, i: usize) -> IntReg {
        [
            IntReg::A0,
            IntReg::A1,
            IntReg::A2,
            IntReg::A3,
            IntReg::A4,
            IntReg::A5,
        ][i]
    }

    fn unsafe_reg(&self, name: &str) -> Option<IntReg> {
        let n: u32 = match name {
            "zero" => 0,
            "ra" => 1,
            "sp" => 2,
            "gp" => 3,
            "tp" => 4,
            "fp" | "s0" => 8,
            "s1" => 9,
            "a" => 10,
            "b" => 11,
            "c" => 12,
            "d" => 13,
            "e" => 14,
            "f" => 15,
            _ => {
                if let Some(rest) = name.strip_prefix('a') {
                    let i: u32 = rest.parse().ok()?;
                    if i > 7 {
                        return None;
                    }
                    10 + i
                } else if let Some(rest) = name.strip_prefix('t') {
                    let i: u32 = rest.parse().ok()?;
                    match i {
                        0..=2 => 5 + i,
                        3..=6 => 25 + i,
                        _ => return None,
                    }
                } else if let Some(rest) = name.strip_prefix('s') {
                    let i: u32 = rest.parse().ok()?;
                    match i {
                        2..=11 => 16 + i,
                        _ => return None,
                    }
                } else if let Some(rest) = name.strip_prefix('x') {
                    let i: u32 = rest.parse().ok()?;
                    if i > 31 {
                        return None;
                    }
                    i
                } else {
                    return None;
                }
            }
        };
        Some(IntReg::Phys(n as u8))
    }
}
