//! ARM64 (AArch64) instruction encodings.
//!
//! Fixed 32-bit little-endian words. The frame pointer x29 sits at the
//! bottom of the frame so every slot is a positive scaled offset. Address
//! materialization is ADRP+ADD with zeroed immediates until the patch phase.

use super::{
    BranchShape, Cond, FCond, FloatReg, ForwardLabel, FramePatch, FrameSite, IntReg, Isa, MemSize,
};
use crate::buffer::CodeBuf;
use crate::error::EmitError;
use crate::reloc::{CallKind, CallPatch, PcRelKind, PcRelocation, STUB_SUFFIX};
use crate::target::{Arch, Os};

pub struct A64 {
    os: Os,
}

const XZR: u8 = 31;
const LR: u8 = 30;

impl A64 {
    pub fn new(os: Os) -> Self {
        Self { os }
    }

    fn enc(&self, r: IntReg) -> u8 {
        match r {
            IntReg::A0 => 0,
            IntReg::A1 => 1,
            IntReg::A2 => 2,
            IntReg::A3 => 3,
            IntReg::A4 => 4,
            IntReg::A5 => 5,
            IntReg::T0 => 9,
            IntReg::T1 => 10,
            IntReg::T2 => 11,
            IntReg::Ret => 0,
            // Linux syscalls number in x8, Darwin in x16.
            IntReg::SysNum => {
                if self.os == Os::Darwin {
                    16
                } else {
                    8
                }
            }
            IntReg::Fp => 29,
            IntReg::Sp => 31,
            IntReg::Phys(n) => n,
        }
    }

    fn word(&self, b: &mut CodeBuf, w: u32) {
        b.emit_u32(w);
    }

    fn cond_code(cc: Cond) -> u32 {
        match cc {
            Cond::Eq => 0,
            Cond::Ne => 1,
            Cond::Uge => 2,  // HS
            Cond::Ult => 3,  // LO
            Cond::Ugt => 8,  // HI
            Cond::Ule => 9,  // LS
            Cond::Ge => 10,
            Cond::Lt => 11,
            Cond::Gt => 12,
            Cond::Le => 13,
        }
    }

    fn fcond_code(cc: FCond) -> u32 {
        match cc {
            FCond::Eq => 0,   // EQ
            FCond::Ne => 1,   // NE
            FCond::Lt => 4,   // MI — false on NaN
            FCond::Le => 9,   // LS
            FCond::Gt => 12,  // GT
            FCond::Ge => 10,  // GE
        }
    }

    fn subs_discard(&self, b: &mut CodeBuf, x: IntReg, y: IntReg) {
        // subs xzr, x, y
        let w = 0xEB00_0000 | (self.enc(y) as u32) << 16 | (self.enc(x) as u32) << 5 | XZR as u32;
        self.word(b, w);
    }

    fn bcond_forward(&self, b: &mut CodeBuf, cond: u32) -> ForwardLabel {
        let at = b.offset();
        self.word(b, 0x5400_0000 | cond);
        ForwardLabel {
            at,
            shape: BranchShape::A64Cond19,
        }
    }

    fn fcmp(&self, b: &mut CodeBuf, x: FloatReg, y: FloatReg) {
        self.word(b, 0x1E60_2000 | (y.0 as u32) << 16 | (x.0 as u32) << 5);
    }

    /// cset xd, cond (CSINC xd, xzr, xzr, !cond)
    fn cset(&self, b: &mut CodeBuf, dst: IntReg, cond: u32) {
        let w = 0x9A9F_07E0 | (cond ^ 1) << 12 | self.enc(dst) as u32;
        self.word(b, w);
    }
}

impl Isa for A64 {
    fn arch(&self) -> Arch {
        Arch::Arm64
    }

    fn mov_reg_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst), self.enc(src));
        if d == s {
            return;
        }
        if d == 31 || s == 31 {
            // Register 31 means sp here: add xd, xn, #0.
            self.word(b, 0x9100_0000 | (s as u32) << 5 | d as u32);
        } else {
            // orr xd, xzr, xm
            self.word(b, 0xAA00_03E0 | (s as u32) << 16 | d as u32);
        }
    }

    fn mov_imm_to_reg(&self, b: &mut CodeBuf, dst: IntReg, imm: i64) {
        let d = self.enc(dst) as u32;
        let u = imm as u64;
        if imm < 0 && (!u & !0xFFFF) == 0 {
            // movn covers small negatives in one word.
            self.word(b, 0x9280_0000 | ((!u & 0xFFFF) as u32) << 5 | d);
            return;
        }
        // movz + movk chain over nonzero half-words.
        self.word(b, 0xD280_0000 | ((u & 0xFFFF) as u32) << 5 | d);
        for hw in 1..4u32 {
            let part = (u >> (16 * hw)) & 0xFFFF;
            let needed = if imm < 0 { part != 0xFFFF } else { part != 0 };
            if needed {
                self.word(b, 0xF280_0000 | hw << 21 | (part as u32) << 5 | d);
            }
        }
        // Negative values needed their high half-words as well.
        if imm < 0 {
            for hw in 1..4u32 {
                let part = (u >> (16 * hw)) & 0xFFFF;
                if part == 0xFFFF {
                    self.word(b, 0xF280_0000 | hw << 21 | (part as u32) << 5 | d);
                }
            }
        }
    }

    fn add_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst) as u32, self.enc(src) as u32);
        self.word(b, 0x8B00_0000 | s << 16 | d << 5 | d);
    }

    fn sub_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst) as u32, self.enc(src) as u32);
        self.word(b, 0xCB00_0000 | s << 16 | d << 5 | d);
    }

    fn mul_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        // madd xd, xd, xm, xzr
        let (d, s) = (self.enc(dst) as u32, self.enc(src) as u32);
        self.word(b, 0x9B00_7C00 | s << 16 | d << 5 | d);
    }

    fn sdiv_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst) as u32, self.enc(src) as u32);
        self.word(b, 0x9AC0_0C00 | s << 16 | d << 5 | d);
    }

    fn srem_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        // t2 = dst / src; dst = dst - t2 * src  (sdiv + msub)
        let (d, s) = (self.enc(dst) as u32, self.enc(src) as u32);
        let t = self.enc(IntReg::T2) as u32;
        self.word(b, 0x9AC0_0C00 | s << 16 | d << 5 | t);
        self.word(b, 0x9B00_8000 | s << 16 | d << 10 | t << 5 | d);
    }

    fn add_imm(&self, b: &mut CodeBuf, dst: IntReg, imm: i32) {
        if imm == 0 {
            return;
        }
        let d = self.enc(dst) as u32;
        let (base, mag) = if imm > 0 {
            (0x9100_0000u32, imm as u32)
        } else {
            (0xD100_0000u32, (-imm) as u32)
        };
        if mag <= 0xFFF {
            self.word(b, base | mag << 10 | d << 5 | d);
        } else {
            // Split across the shifted-immediate form.
            self.word(b, base | 1 << 22 | (mag >> 12) << 10 | d << 5 | d);
            let low = mag & 0xFFF;
            if low != 0 {
                self.word(b, base | low << 10 | d << 5 | d);
            }
        }
    }

    fn neg_reg(&self, b: &mut CodeBuf, r: IntReg) {
        let d = self.enc(r) as u32;
        self.word(b, 0xCB00_03E0 | d << 16 | d); // sub xd, xzr, xd
    }

    fn not_reg(&self, b: &mut CodeBuf, r: IntReg) {
        let d = self.enc(r) as u32;
        self.word(b, 0xAA20_03E0 | d << 16 | d); // orn xd, xzr, xd
    }

    fn and_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst) as u32, self.enc(src) as u32);
        self.word(b, 0x8A00_0000 | s << 16 | d << 5 | d);
    }

    fn or_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst) as u32, self.enc(src) as u32);
        self.word(b, 0xAA00_0000 | s << 16 | d << 5 | d);
    }

    fn xor_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg) {
        let (d, s) = (self.enc(dst) as u32, self.enc(src) as u32);
        self.word(b, 0xCA00_0000 | s << 16 | d << 5 | d);
    }

    fn shl_imm(&self, b: &mut CodeBuf, dst: IntReg, n: u8) {
        // ubfm xd, xd, #(64-n) % 64, #(63-n)
        let d = self.enc(dst) as u32;
        let immr = ((64 - n as u32) & 63) << 16;
        let imms = ((63 - n as u32) & 63) << 10;
        self.word(b, 0xD340_0000 | immr | imms | d << 5 | d);
    }

    fn shr_imm(&self, b: &mut CodeBuf, dst: IntReg, n: u8) {
        // lsr xd, xd, #n
        let d = self.enc(dst) as u32;
        self.word(b, 0xD340_0000 | (n as u32) << 16 | 63 << 10 | d << 5 | d);
    }

    fn shl_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let (d, a) = (self.enc(dst) as u32, self.enc(amount) as u32);
        self.word(b, 0x9AC0_2000 | a << 16 | d << 5 | d);
    }

    fn shr_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let (d, a) = (self.enc(dst) as u32, self.enc(amount) as u32);
        self.word(b, 0x9AC0_2800 | a << 16 | d << 5 | d); // asrv
    }

    fn rol_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        // ror by (64 - n); clobbers T2.
        let t = self.enc(IntReg::T2) as u32;
        let a = self.enc(amount) as u32;
        let d = self.enc(dst) as u32;
        self.word(b, 0xCB00_03E0 | a << 16 | t); // neg t2, amount
        self.word(b, 0x9AC0_2C00 | t << 16 | d << 5 | d); // rorv
    }

    fn ror_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg) {
        let (d, a) = (self.enc(dst) as u32, self.enc(amount) as u32);
        self.word(b, 0x9AC0_2C00 | a << 16 | d << 5 | d);
    }

    fn branch_if(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, y: IntReg) -> ForwardLabel {
        self.subs_discard(b, x, y);
        self.bcond_forward(b, Self::cond_code(cc))
    }

    fn branch_if_imm(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, imm: i32) -> ForwardLabel {
        let n = self.enc(x) as u32;
        if (0..=0xFFF).contains(&imm) {
            // subs xzr, xn, #imm
            self.word(b, 0xF100_001F | (imm as u32) << 10 | n << 5);
        } else if (-0xFFF..0).contains(&imm) {
            // cmn xn, #-imm
            self.word(b, 0xB100_001F | ((-imm) as u32) << 10 | n << 5);
        } else {
            self.mov_imm_to_reg(b, IntReg::T2, imm as i64);
            self.subs_discard(b, x, IntReg::T2);
        }
        self.bcond_forward(b, Self::cond_code(cc))
    }

    fn branch_if_backward(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, y: IntReg, target: usize) {
        self.subs_discard(b, x, y);
        let delta = (target as i64 - b.offset() as i64) / 4;
        let imm19 = (delta as u32) & 0x7FFFF;
        self.word(b, 0x5400_0000 | imm19 << 5 | Self::cond_code(cc));
    }

    fn jmp_forward(&self, b: &mut CodeBuf) -> ForwardLabel {
        let at = b.offset();
        self.word(b, 0x1400_0000);
        ForwardLabel {
            at,
            shape: BranchShape::A64Branch26,
        }
    }

    fn jmp_backward(&self, b: &mut CodeBuf, target: usize) {
        let delta = (target as i64 - b.offset() as i64) / 4;
        self.word(b, 0x1400_0000 | (delta as u32 & 0x03FF_FFFF));
    }

    fn bind(&self, b: &mut CodeBuf, label: ForwardLabel) -> Result<(), EmitError> {
        let delta = (b.offset() as i64 - label.at as i64) / 4;
        let word = b.read_u32(label.at);
        match label.shape {
            BranchShape::A64Cond19 => {
                if delta >= 1 << 18 || delta < -(1 << 18) {
                    return Err(EmitError::BranchOutOfRange { at: label.at });
                }
                b.patch_u32(label.at, word | ((delta as u32) & 0x7FFFF) << 5);
            }
            BranchShape::A64Branch26 => {
                if delta >= 1 << 25 || delta < -(1 << 25) {
                    return Err(EmitError::BranchOutOfRange { at: label.at });
                }
                b.patch_u32(label.at, word | (delta as u32) & 0x03FF_FFFF);
            }
            _ => unreachable!("foreign label bound on arm64"),
        }
        Ok(())
    }

    fn set_if(&self, b: &mut CodeBuf, cc: Cond, dst: IntReg, x: IntReg, y: IntReg) {
        self.subs_discard(b, x, y);
        self.cset(b, dst, Self::cond_code(cc));
    }

    fn call_symbol(&self, b: &mut CodeBuf, target: &str) {
        let offset = b.offset();
        self.word(b, 0x9400_0000);
        b.call_patches.push(CallPatch {
            offset,
            target: target.to_string(),
            kind: CallKind::Bl26,
        });
    }

    fn call_import(&self, b: &mut CodeBuf, symbol: &str) {
        let offset = b.offset();
        self.word(b, 0x9400_0000);
        b.call_patches.push(CallPatch {
            offset,
            target: format!("{}{}", symbol, STUB_SUFFIX),
            kind: CallKind::Bl26,
        });
    }

    fn call_reg(&self, b: &mut CodeBuf, r: IntReg) {
        self.word(b, 0xD63F_0000 | (self.enc(r) as u32) << 5);
    }

    fn tail_jump_backward(&self, b: &mut CodeBuf, target: usize) {
        self.jmp_backward(b, target);
    }

    fn ret(&self, b: &mut CodeBuf) {
        self.word(b, 0xD65F_03C0);
    }

    fn syscall(&self, b: &mut CodeBuf) {
        if self.os == Os::Darwin {
            self.word(b, 0xD400_1001); // svc #0x80
        } else {
            self.word(b, 0xD400_0001); // svc #0
        }
    }

    fn load(&self, b: &mut CodeBuf, dst: IntReg, base: IntReg, disp: i32, size: MemSize) {
        let (t, n) = (self.enc(dst) as u32, self.enc(base) as u32);
        let (scaled, unscaled, scale) = match size {
            MemSize::B8 => (0xF940_0000u32, 0xF840_0000u32, 3),
            MemSize::B4 => (0xB940_0000, 0xB840_0000, 2),
            MemSize::B2 => (0x7940_0000, 0x7840_0000, 1),
            MemSize::B1 => (0x3940_0000, 0x3840_0000, 0),
        };
        if disp >= 0 && disp % (1 << scale) == 0 && (disp >> scale) <= 0xFFF {
            self.word(b, scaled | ((disp as u32) >> scale) << 10 | n << 5 | t);
        } else {
            debug_assert!((-256..256).contains(&disp));
            self.word(b, unscaled | ((disp as u32) & 0x1FF) << 12 | n << 5 | t);
        }
    }

    fn store(&self, b: &mut CodeBuf, src: IntReg, base: IntReg, disp: i32, size: MemSize) {
        let (t, n) = (self.enc(src) as u32, self.enc(base) as u32);
        let (scaled, unscaled, scale) = match size {
            MemSize::B8 => (0xF900_0000u32, 0xF800_0000u32, 3),
            MemSize::B4 => (0xB900_0000, 0xB800_0000, 2),
            MemSize::B2 => (0x7900_0000, 0x7800_0000, 1),
            MemSize::B1 => (0x3900_0000, 0x3800_0000, 0),
        };
        if disp >= 0 && disp % (1 << scale) == 0 && (disp >> scale) <= 0xFFF {
            self.word(b, scaled | ((disp as u32) >> scale) << 10 | n << 5 | t);
        } else {
            debug_assert!((-256..256).contains(&disp));
            self.word(b, unscaled | ((disp as u32) & 0x1FF) << 12 | n << 5 | t);
        }
    }

    fn lea_symbol(&self, b: &mut CodeBuf, dst: IntReg, symbol: &str) {
        let d = self.enc(dst) as u32;
        let offset = b.offset();
        self.word(b, 0x9000_0000 | d); // adrp xd, page
        self.word(b, 0x9100_0000 | d << 5 | d); // add xd, xd, #lo12
        b.pc_relocs.push(PcRelocation {
            offset,
            symbol: symbol.to_string(),
            kind: PcRelKind::A64AdrpAdd,
        });
    }

    fn lea_slot(&self, b: &mut CodeBuf, dst: IntReg, slot: i32) {
        let d = self.enc(dst) as u32;
        self.word(b, 0x9100_0000 | (slot as u32) << 10 | 29 << 5 | d);
    }

    fn prologue(&self, b: &mut CodeBuf) -> FramePatch {
        self.word(b, 0xA9BF_7BFD); // stp x29, x30, [sp, #-16]!
        let site = FrameSite {
            at: b.offset(),
            negate: false,
        };
        self.word(b, 0xD100_03FF); // sub sp, sp, #frame
        self.word(b, 0x9100_03FD); // mov x29, sp
        FramePatch { sites: vec![site] }
    }

    fn epilogue(&self, b: &mut CodeBuf, frame: &mut FramePatch) {
        frame.sites.push(FrameSite {
            at: b.offset(),
            negate: false,
        });
        self.word(b, 0x9100_03FF); // add sp, sp, #frame
        self.word(b, 0xA8C1_7BFD); // ldp x29, x30, [sp], #16
        self.ret(b);
    }

    fn patch_frame_size(
        &self,
        b: &mut CodeBuf,
        frame: &FramePatch,
        size: u32,
    ) -> Result<(), EmitError> {
        if size > 0xFFF {
            return Err(EmitError::FrameTooLarge {
                name: String::new(),
            });
        }
        for site in &frame.sites {
            let word = b.read_u32(site.at);
            b.patch_u32(site.at, word | size << 10);
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
            self.word(b, 0x1E60_4000 | (src.0 as u32) << 5 | dst.0 as u32);
        }
    }

    fn fload(&self, b: &mut CodeBuf, dst: FloatReg, base: IntReg, disp: i32) {
        let n = self.enc(base) as u32;
        if disp >= 0 && disp % 8 == 0 && (disp / 8) <= 0xFFF {
            self.word(b, 0xFD40_0000 | ((disp as u32) / 8) << 10 | n << 5 | dst.0 as u32);
        } else {
            debug_assert!((-256..256).contains(&disp));
            self.word(b, 0xFC40_0000 | ((disp as u32) & 0x1FF) << 12 | n << 5 | dst.0 as u32);
        }
    }

    fn fstore(&self, b: &mut CodeBuf, src: FloatReg, base: IntReg, disp: i32) {
        let n = self.enc(base) as u32;
        if disp >= 0 && disp % 8 == 0 && (disp / 8) <= 0xFFF {
            self.word(b, 0xFD00_0000 | ((disp as u32) / 8) << 10 | n << 5 | src.0 as u32);
        } else {
            debug_assert!((-256..256).contains(&disp));
            self.word(b, 0xFC00_0000 | ((disp as u32) & 0x1FF) << 12 | n << 5 | src.0 as u32);
        }
    }

    fn fadd(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        let (d, m) = (dst.0 as u32, src.0 as u32);
        self.word(b, 0x1E60_2800 | m << 16 | d << 5 | d);
    }

    fn fsub(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        let (d, m) = (dst.0 as u32, src.0 as u32);
        self.word(b, 0x1E60_3800 | m << 16 | d << 5 | d);
    }

    fn fmul(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        let (d, m) = (dst.0 as u32, src.0 as u32);
        self.word(b, 0x1E60_0800 | m << 16 | d << 5 | d);
    }

    fn fdiv(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg) {
        let (d, m) = (dst.0 as u32, src.0 as u32);
        self.word(b, 0x1E60_1800 | m << 16 | d << 5 | d);
    }

    fn fmadd(&self, b: &mut CodeBuf, dst: FloatReg, x: FloatReg, y: FloatReg) {
        // fmadd dd, dn, dm, da: dd = da + dn*dm
        let w = 0x1F40_0000
            | (y.0 as u32) << 16
            | (dst.0 as u32) << 10
            | (x.0 as u32) << 5
            | dst.0 as u32;
        self.word(b, w);
    }

    fn fneg(&self, b: &mut CodeBuf, r: FloatReg) {
        self.word(b, 0x1E61_4000 | (r.0 as u32) << 5 | r.0 as u32);
    }

    fn fbranch_if(&self, b: &mut CodeBuf, cc: FCond, x: FloatReg, y: FloatReg) -> ForwardLabel {
        self.fcmp(b, x, y);
        self.bcond_forward(b, Self::fcond_code(cc))
    }

    fn fbranch_if_nan(&self, b: &mut CodeBuf, x: FloatReg) -> ForwardLabel {
        self.fcmp(b, x, x);
        self.bcond_forward(b, 6) // VS: unordered
    }

    fn fset_if(&self, b: &mut CodeBuf, cc: FCond, dst: IntReg, x: FloatReg, y: FloatReg) {
        self.fcmp(b, x, y);
        self.cset(b, dst, Self::fcond_code(cc));
    }

    fn cvt_f_to_int(&self, b: &mut CodeBuf, dst: IntReg, src: FloatReg) {
        self.word(b, 0x9E78_0000 | (src.0 as u32) << 5 | self.enc(dst) as u32);
    }

    fn cvt_int_to_f(&self, b: &mut CodeBuf, dst: FloatReg, src: IntReg) {
        self.word(b, 0x9E62_0000 | (self.enc(src) as u32) << 5 | dst.0 as u32);
    }

    fn bits_f_to_int(&self, b: &mut CodeBuf, dst: IntReg, src: FloatReg) {
        self.word(b, 0x9E66_0000 | (src.0 as u32) << 5 | self.enc(dst) as u32);
    }

    fn bits_int_to_f(&self, b: &mut CodeBuf, dst: FloatReg, src: IntReg) {
        self.word(b, 0x9E67_0000 | (self.enc(src) as u32) << 5 | dst.0 as u32);
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
        let n = match name {
            "sp" => 31,
            "fp" | "x29" => 29,
            "lr" | "x30" => LR,
            "a" => 0,
            "b" => 1,
            "c" => 2,
            "d" => 3,
            "e" => 4,
            "f" => 5,
            _ => {
                let rest = name.strip_prefix('x')?;
                let n: u8 = rest.parse().ok()?;
                if n > 30 {
                    return None;
                }
                n
            }
        };
        Some(IntReg::Phys(n))
    }
}
