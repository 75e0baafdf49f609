//! Phase B of the two-phase pipeline: assign virtual addresses, resolve
//! call patches and PC-relocations, and verify no placeholder bytes remain.
//!
//! Phase A (emission) recorded patches against text offsets only; this
//! module is handed the container's segment plan and fixes the bytes up in
//! place. Address arithmetic goes through dedicated newtypes so file
//! offsets, virtual addresses and text offsets cannot be mixed up silently.

use crate::emitter::Artifact;
use crate::error::LinkError;
use crate::isa::{CALL_PLACEHOLDER, LEA_PLACEHOLDER};
use crate::reloc::{CallKind, PcRelKind, SymbolKind, STUB_SUFFIX};
use crate::target::Arch;
use log::debug;
use rustc_hash::FxHashMap;

/// Byte offset inside the text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextOff(pub usize);

/// Absolute file offset inside the output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FileOff(pub u64);

/// Virtual address in the loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Vaddr(pub u64);

impl Vaddr {
    pub fn offset(self, delta: usize) -> Vaddr {
        Vaddr(self.0 + delta as u64)
    }
}

/// The container's segment plan: where each payload kind lands in the
/// address space, plus one callable address per dynamic import (a PLT
/// entry, a Mach-O stub, or a PE IAT slot).
#[derive(Debug, Default)]
pub struct AddressPlan {
    pub text: u64,
    pub rodata: u64,
    pub data: u64,
    /// import symbol name (without `$stub`) → callable address.
    pub stubs: FxHashMap<String, u64>,
    /// PE only: IAT slots are data, so `ff 15` disp math needs them
    /// distinct from executable stubs. Others leave this empty and the
    /// resolver falls back to `stubs`.
    pub iat_slots: FxHashMap<String, u64>,
}

/// Assign every symbol its virtual address (per-kind base plus offset,
/// preserving definition order), then resolve all patch records. Unresolved
/// names, out-of-range displacements and surviving placeholders are fatal.
pub fn resolve(artifact: &mut Artifact, plan: &AddressPlan) -> Result<(), LinkError> {
    for def in artifact.symbols.iter_mut() {
        let base = match def.kind {
            SymbolKind::Rodata => plan.rodata,
            SymbolKind::Data => plan.data,
            SymbolKind::Code => plan.text,
        };
        def.addr = Some(base + def.offset as u64);
    }
    debug!(
        "layout: text={:#x} rodata={:#x} data={:#x}, {} call patches, {} pc-relocs",
        plan.text,
        plan.rodata,
        plan.data,
        artifact.text.call_patches.len(),
        artifact.text.pc_relocs.len()
    );

    let call_patches = std::mem::take(&mut artifact.text.call_patches);
    for patch in &call_patches {
        let target = match patch.target.strip_suffix(STUB_SUFFIX) {
            Some(symbol) => {
                let table = if patch.kind == CallKind::IatIndirect {
                    &plan.iat_slots
                } else {
                    &plan.stubs
                };
                *table
                    .get(symbol)
                    .or_else(|| plan.stubs.get(symbol))
                    .ok_or_else(|| LinkError::UnresolvedCall(patch.target.clone()))?
            }
            None => artifact
                .symbols
                .addr_of(&patch.target)
                .ok_or_else(|| LinkError::UnresolvedCall(patch.target.clone()))?,
        };

        match patch.kind {
            CallKind::Rel32 | CallKind::IatIndirect => {
                debug_assert_eq!(artifact.text.read_u32(patch.offset), CALL_PLACEHOLDER);
                let next = plan.text + patch.offset as u64 + 4;
                let disp = target as i64 - next as i64;
                if disp > i32::MAX as i64 || disp < i32::MIN as i64 {
                    return Err(LinkError::DisplacementOverflow {
                        symbol: patch.target.clone(),
                        distance: disp,
                    });
                }
                artifact.text.patch_i32(patch.offset, disp as i32);
            }
            CallKind::Bl26 => {
                let pc = plan.text + patch.offset as u64;
                let delta = (target as i64 - pc as i64) / 4;
                if delta >= 1 << 25 || delta < -(1 << 25) {
                    return Err(LinkError::DisplacementOverflow {
                        symbol: patch.target.clone(),
                        distance: delta * 4,
                    });
                }
                let word = artifact.text.read_u32(patch.offset);
                artifact
                    .text
                    .patch_u32(patch.offset, word | (delta as u32) & 0x03FF_FFFF);
            }
            CallKind::AuipcJalr => {
                let pc = plan.text + patch.offset as u64;
                let delta = target as i64 - pc as i64;
                patch_auipc_pair(artifact, patch.offset, delta, &patch.target)?;
            }
        }
    }
    artifact.text.call_patches = call_patches;

    let pc_relocs = std::mem::take(&mut artifact.text.pc_relocs);
    for reloc in &pc_relocs {
        let target = artifact
            .symbols
            .addr_of(&reloc.symbol)
            .ok_or_else(|| LinkError::UnresolvedSymbol(reloc.symbol.clone()))?;
        match reloc.kind {
            PcRelKind::X64Lea => {
                debug_assert_eq!(artifact.text.read_u32(reloc.offset), LEA_PLACEHOLDER);
                let next = plan.text + reloc.offset as u64 + 4;
                let disp = target as i64 - next as i64;
                if disp > i32::MAX as i64 || disp < i32::MIN as i64 {
                    return Err(LinkError::DisplacementOverflow {
                        symbol: reloc.symbol.clone(),
                        distance: disp,
                    });
                }
                artifact.text.patch_i32(reloc.offset, disp as i32);
            }
            PcRelKind::A64AdrpAdd => {
                let pc = plan.text + reloc.offset as u64;
                let page_delta = ((target >> 12) as i64) - ((pc >> 12) as i64);
                if page_delta >= 1 << 20 || page_delta < -(1 << 20) {
                    return Err(LinkError::PageRangeExceeded {
                        symbol: reloc.symbol.clone(),
                    });
                }
                let adrp = artifact.text.read_u32(reloc.offset);
                let immlo = (page_delta as u32 & 0x3) << 29;
                let immhi = ((page_delta >> 2) as u32 & 0x7FFFF) << 5;
                artifact.text.patch_u32(reloc.offset, adrp | immlo | immhi);
                let add = artifact.text.read_u32(reloc.offset + 4);
                let lo12 = (target & 0xFFF) as u32;
                artifact
                    .text
                    .patch_u32(reloc.offset + 4, add | lo12 << 10);
            }
            PcRelKind::Rv64AuipcAddi => {
                let pc = plan.text + reloc.offset as u64;
                let delta = target as i64 - pc as i64;
                patch_auipc_pair(artifact, reloc.offset, delta, &reloc.symbol)?;
            }
        }
    }
    artifact.text.pc_relocs = pc_relocs;

    verify_no_placeholders(artifact)
}

/// AUIPC + (JALR | ADDI) pair: split a 32-bit pc-relative delta into a
/// sign-adjusted upper 20 and lower 12 bits.
fn patch_auipc_pair(
    artifact: &mut Artifact,
    offset: usize,
    delta: i64,
    symbol: &str,
) -> Result<(), LinkError> {
    if delta > i32::MAX as i64 || delta < i32::MIN as i64 {
        return Err(LinkError::DisplacementOverflow {
            symbol: symbol.to_string(),
            distance: delta,
        });
    }
    let delta = delta as i32;
    let hi = (delta.wrapping_add(0x800) >> 12) as u32;
    let lo = delta.wrapping_sub((hi << 12) as i32);
    let auipc = artifact.text.read_u32(offset);
    artifact.text.patch_u32(offset, auipc | hi << 12);
    let second = artifact.text.read_u32(offset + 4);
    artifact
        .text
        .patch_u32(offset + 4, second | ((lo as u32) & 0xFFF) << 20);
    Ok(())
}

/// The final text must contain neither the call placeholder
/// `0x12345678` nor the LEA placeholder `0xDEADBEEF`. Checked on x86 only —
/// the fixed-word architectures use zeroed immediate fields instead of
/// magic byte patterns.
fn verify_no_placeholders(artifact: &Artifact) -> Result<(), LinkError> {
    if artifact.target.arch != Arch::X86_64 {
        return Ok(());
    }
    let call = CALL_PLACEHOLDER.to_le_bytes();
    let lea = LEA_PLACEHOLDER.to_le_bytes();
    let bytes = artifact.text.bytes();
    for (offset, window) in bytes.windows(4).enumerate() {
        if window == call || window == lea {
            return Err(LinkError::PlaceholderRemains(offset));
        }
    }
    Ok(())
}
