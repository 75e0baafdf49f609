//! The per-architecture instruction surface.
//!
//! Every backend implements [`Isa`]: one method per instruction primitive,
//! emitting raw bytes into a [`CodeBuf`] and recording patch records where a
//! target address is not yet known. Expression compilation dispatches
//! through this trait and never encodes an instruction itself.

mod a64;
mod rv64;
mod x64;

pub use a64::A64;
pub use rv64::Rv64;
pub use x64::X64;

use crate::buffer::CodeBuf;
use crate::error::EmitError;
use crate::target::{Arch, Target};

/// Portable integer register roles. `A0..A5` follow the C calling
/// convention of the target (`int_arg` reorders them on Windows); `T0..T2`
/// are caller-saved scratch; `Phys` names a raw encoding for unsafe blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntReg {
    A0,
    A1,
    A2,
    A3,
    A4,
    A5,
    T0,
    T1,
    T2,
    /// Integer return register.
    Ret,
    /// Syscall-number register (`rax`, `x8`, `a7`).
    SysNum,
    Fp,
    Sp,
    /// Raw architectural register number (unsafe blocks).
    Phys(u8),
}

/// Float registers are numbered uniformly: n maps to `xmm<n>` / `d<n>` /
/// `fa<n>`. Register 0 is the canonical value register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatReg(pub u8);

/// The expression value register.
pub const FV: FloatReg = FloatReg(0);
/// Scratch for binary operands.
pub const FSCRATCH: FloatReg = FloatReg(1);
/// Second scratch (compares, FMA accumulation).
pub const FSCRATCH2: FloatReg = FloatReg(2);

/// Integer condition codes (signed and unsigned forms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

/// Float condition codes; NaN operands make every condition except `Ne`
/// evaluate false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FCond {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Memory operand width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemSize {
    B1,
    B2,
    B4,
    B8,
}

/// Internal shape of a pending forward branch, fixed per architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BranchShape {
    /// 4-byte rel32 at `at`.
    X64Rel32,
    /// B.cond imm19 instruction word at `at`.
    A64Cond19,
    /// B imm26 instruction word at `at`.
    A64Branch26,
    /// JAL imm20 instruction word at `at`.
    Rv64Jal20,
}

/// A branch whose target is not known yet. Returned by the
/// `*_forward` emitters and consumed exactly once by [`Isa::bind`]; the type
/// is deliberately neither `Clone` nor `Copy` so a label cannot be bound
/// twice.
#[derive(Debug)]
pub struct ForwardLabel {
    pub(crate) at: usize,
    pub(crate) shape: BranchShape,
}

/// One stack-allocation immediate awaiting the final frame size. `negate`
/// marks sites whose encoding takes the negated size (risc-v `addi sp`).
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameSite {
    pub(crate) at: usize,
    pub(crate) negate: bool,
}

/// Frame-size patch sites created by `prologue` (and, on arm64/riscv, each
/// `epilogue`). The final size is written once the body is fully emitted.
#[derive(Debug, Default)]
pub struct FramePatch {
    pub(crate) sites: Vec<FrameSite>,
}

/// One method per instruction primitive. All methods append at the current
/// text offset; `dst`/`src` scratch contracts are noted where an
/// architecture claims fixed registers (x86 division and shifts).
#[allow(clippy::too_many_arguments)]
pub trait Isa {
    fn arch(&self) -> Arch;

    // ===== integer moves and ALU =====

    fn mov_reg_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg);
    fn mov_imm_to_reg(&self, b: &mut CodeBuf, dst: IntReg, imm: i64);
    fn add_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg);
    fn sub_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg);
    fn mul_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg);
    /// Signed division. On x86-64 this claims rax/rdx; operands must be
    /// caller-saved scratch registers.
    fn sdiv_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg);
    /// Signed remainder; same register contract as `sdiv_reg_to_reg`.
    fn srem_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg);
    fn add_imm(&self, b: &mut CodeBuf, dst: IntReg, imm: i32);
    fn neg_reg(&self, b: &mut CodeBuf, r: IntReg);
    fn not_reg(&self, b: &mut CodeBuf, r: IntReg);
    fn and_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg);
    fn or_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg);
    fn xor_reg_to_reg(&self, b: &mut CodeBuf, dst: IntReg, src: IntReg);
    fn shl_imm(&self, b: &mut CodeBuf, dst: IntReg, n: u8);
    fn shr_imm(&self, b: &mut CodeBuf, dst: IntReg, n: u8);
    /// Shift left by register. On x86-64 the amount is moved through rcx.
    fn shl_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg);
    /// Arithmetic shift right by register (same rcx contract on x86-64).
    fn shr_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg);
    fn rol_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg);
    fn ror_reg(&self, b: &mut CodeBuf, dst: IntReg, amount: IntReg);

    // ===== compares and branches =====

    /// Branch forward when `x cc y` holds.
    fn branch_if(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, y: IntReg) -> ForwardLabel;
    /// Branch forward when `x cc imm` holds. The immediate goes through a
    /// scratch register on risc-v.
    fn branch_if_imm(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, imm: i32) -> ForwardLabel;
    /// Branch backward to `target` when `x cc y` holds.
    fn branch_if_backward(&self, b: &mut CodeBuf, cc: Cond, x: IntReg, y: IntReg, target: usize);
    fn jmp_forward(&self, b: &mut CodeBuf) -> ForwardLabel;
    fn jmp_backward(&self, b: &mut CodeBuf, target: usize);
    /// Bind a forward label to the current offset.
    fn bind(&self, b: &mut CodeBuf, label: ForwardLabel) -> Result<(), EmitError>;
    /// `dst = (x cc y) ? 1 : 0`
    fn set_if(&self, b: &mut CodeBuf, cc: Cond, dst: IntReg, x: IntReg, y: IntReg);

    // ===== calls =====

    /// Call an internal code label (records a `CallPatch`).
    fn call_symbol(&self, b: &mut CodeBuf, target: &str);
    /// Call a dynamic import: records a `<name>$stub` patch. On PE targets
    /// the site is an indirect `ff 15` call through the IAT.
    fn call_import(&self, b: &mut CodeBuf, symbol: &str);
    fn call_reg(&self, b: &mut CodeBuf, r: IntReg);
    /// Branch-no-link backward to a body entry, reusing the frame (`me`).
    fn tail_jump_backward(&self, b: &mut CodeBuf, target: usize);
    fn ret(&self, b: &mut CodeBuf);
    fn syscall(&self, b: &mut CodeBuf);

    // ===== memory =====

    fn load(&self, b: &mut CodeBuf, dst: IntReg, base: IntReg, disp: i32, size: MemSize);
    fn store(&self, b: &mut CodeBuf, src: IntReg, base: IntReg, disp: i32, size: MemSize);
    /// PC-relative address of a rodata/data/code symbol (records a
    /// `PcRelocation`).
    fn lea_symbol(&self, b: &mut CodeBuf, dst: IntReg, symbol: &str);
    /// Address of a frame slot.
    fn lea_slot(&self, b: &mut CodeBuf, dst: IntReg, slot: i32);

    // ===== frame =====

    /// Emit the prologue; the stack-allocation immediate is a placeholder
    /// patched by `patch_frame_size` once the body is complete.
    fn prologue(&self, b: &mut CodeBuf) -> FramePatch;
    /// Emit an epilogue and `ret`. May append additional patch sites.
    fn epilogue(&self, b: &mut CodeBuf, frame: &mut FramePatch);
    /// Write the final frame size into every recorded site.
    fn patch_frame_size(
        &self,
        b: &mut CodeBuf,
        frame: &FramePatch,
        size: u32,
    ) -> Result<(), EmitError>;
    fn load_slot(&self, b: &mut CodeBuf, dst: IntReg, slot: i32);
    fn store_slot(&self, b: &mut CodeBuf, src: IntReg, slot: i32);
    fn fload_slot(&self, b: &mut CodeBuf, dst: FloatReg, slot: i32);
    fn fstore_slot(&self, b: &mut CodeBuf, src: FloatReg, slot: i32);

    // ===== floating point =====

    fn fmov(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg);
    fn fload(&self, b: &mut CodeBuf, dst: FloatReg, base: IntReg, disp: i32);
    fn fstore(&self, b: &mut CodeBuf, src: FloatReg, base: IntReg, disp: i32);
    fn fadd(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg);
    fn fsub(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg);
    fn fmul(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg);
    fn fdiv(&self, b: &mut CodeBuf, dst: FloatReg, src: FloatReg);
    /// `dst += x * y`
    fn fmadd(&self, b: &mut CodeBuf, dst: FloatReg, x: FloatReg, y: FloatReg);
    fn fneg(&self, b: &mut CodeBuf, r: FloatReg);
    /// Branch forward when `x cc y` holds (ordered; NaN falls through,
    /// except `Ne`).
    fn fbranch_if(&self, b: &mut CodeBuf, cc: FCond, x: FloatReg, y: FloatReg) -> ForwardLabel;
    /// Branch forward when `x` is NaN.
    fn fbranch_if_nan(&self, b: &mut CodeBuf, x: FloatReg) -> ForwardLabel;
    /// `dst = (x cc y) ? 1 : 0`. May clobber `FSCRATCH2`.
    fn fset_if(&self, b: &mut CodeBuf, cc: FCond, dst: IntReg, x: FloatReg, y: FloatReg);
    /// Truncating double → signed 64-bit.
    fn cvt_f_to_int(&self, b: &mut CodeBuf, dst: IntReg, src: FloatReg);
    fn cvt_int_to_f(&self, b: &mut CodeBuf, dst: FloatReg, src: IntReg);
    /// Bit-copy (pointer transport), not a numeric conversion.
    fn bits_f_to_int(&self, b: &mut CodeBuf, dst: IntReg, src: FloatReg);
    fn bits_int_to_f(&self, b: &mut CodeBuf, dst: FloatReg, src: IntReg);

    // ===== register roles =====

    /// C-ABI integer argument register `i` (OS-aware on x86-64).
    fn int_arg(&self, i: usize) -> IntReg;
    /// Syscall argument register `i`.
    fn sysarg(&self, i: usize) -> IntReg;
    /// Resolve an unsafe-block register name (`rax`, `x0`, `a0`, or the
    /// portable aliases `a`..`f`).
    fn unsafe_reg(&self, name: &str) -> Option<IntReg>;
}

/// Pick the backend for a target.
pub fn backend_for(target: Target) -> Box<dyn Isa> {
    match target.arch {
        Arch::X86_64 => Box::new(X64::new(target.os)),
        Arch::Arm64 => Box::new(A64::new(target.os)),
        Arch::Riscv64 => Box::new(Rv64::new(target.os)),
    }
}

/// x86 placeholder for call displacements; the final text must not contain
/// it anymore.
pub const CALL_PLACEHOLDER: u32 = 0x1234_5678;
/// x86 placeholder for address-LEA displacements.
pub const LEA_PLACEHOLDER: u32 = 0xDEAD_BEEF;
