//! Mach-O arm64 executable writer.
//!
//! `__PAGEZERO` / `__TEXT` / `__DATA` / `__LINKEDIT` segments on 16 KiB
//! pages; each import gets a 12-byte ADRP+LDR+BR stub whose `__got` slot is
//! bound by dyld through a bind-opcode stream. The image carries an ad-hoc
//! code signature (SHA-256 page hashes) so it runs on arm64 without an
//! external signing step; a signer tool may still re-sign it afterwards.

use crate::error::ObjectError;
use crate::layout::{align_up, align_up_usize};
use c67_codegen::{link, AddressPlan, Artifact, Os};
use log::debug;
use rustc_hash::FxHashMap;
use scroll::{Pwrite, BE, LE};
use sha2::{Digest, Sha256};

use crate::resolve::resolve_library;

pub const MH_MAGIC_64: u32 = 0xFEED_FACF;
pub const MH_EXECUTE: u32 = 2;
pub const MH_NOUNDEFS: u32 = 0x1;
pub const MH_DYLDLINK: u32 = 0x4;
pub const MH_PIE: u32 = 0x20_0000;
pub const CPU_TYPE_ARM64: u32 = 0x0100_000C;
pub const CPU_SUBTYPE_ARM64_ALL: u32 = 0;

pub const LC_SEGMENT_64: u32 = 0x19;
pub const LC_SYMTAB: u32 = 0x2;
pub const LC_DYSYMTAB: u32 = 0xB;
pub const LC_LOAD_DYLINKER: u32 = 0xE;
pub const LC_UUID: u32 = 0x1B;
pub const LC_LOAD_DYLIB: u32 = 0xC;
pub const LC_MAIN: u32 = 0x8000_0028;
pub const LC_BUILD_VERSION: u32 = 0x32;
pub const LC_DYLD_INFO_ONLY: u32 = 0x8000_0022;
pub const LC_CODE_SIGNATURE: u32 = 0x1D;

pub const VM_PROT_READ: u32 = 1;
pub const VM_PROT_WRITE: u32 = 2;
pub const VM_PROT_EXECUTE: u32 = 4;

pub const S_ATTR_PURE_INSTRUCTIONS: u32 = 0x8000_0000;
pub const S_ATTR_SOME_INSTRUCTIONS: u32 = 0x0000_0400;
pub const S_SYMBOL_STUBS: u32 = 0x8;

pub const PLATFORM_MACOS: u32 = 1;

pub const BIND_OPCODE_SET_DYLIB_ORDINAL_IMM: u8 = 0x10;
pub const BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM: u8 = 0x40;
pub const BIND_OPCODE_SET_TYPE_IMM: u8 = 0x50;
pub const BIND_OPCODE_SET_SEGMENT_AND_OFFSET_ULEB: u8 = 0x70;
pub const BIND_OPCODE_DO_BIND: u8 = 0x90;
pub const BIND_TYPE_POINTER: u8 = 1;

pub const CSMAGIC_EMBEDDED_SIGNATURE: u32 = 0xFADE_0CC0;
pub const CSMAGIC_CODEDIRECTORY: u32 = 0xFADE_0C02;
pub const CS_ADHOC: u32 = 0x2;
pub const CS_HASHTYPE_SHA256: u8 = 2;

pub const PAGEZERO_SIZE: u64 = 0x1_0000_0000;
pub const PAGE: u64 = 0x4000;
pub const SIGN_PAGE: usize = 0x1000;

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct MachHeader64 {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub reserved: u32,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct SegmentCommand64 {
    pub cmd: u32,
    pub cmdsize: u32,
    pub segname: [u8; 16],
    pub vmaddr: u64,
    pub vmsize: u64,
    pub fileoff: u64,
    pub filesize: u64,
    pub maxprot: u32,
    pub initprot: u32,
    pub nsects: u32,
    pub flags: u32,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct Section64 {
    pub sectname: [u8; 16],
    pub segname: [u8; 16],
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    pub reserved1: u32,
    pub reserved2: u32,
    pub reserved3: u32,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct DyldInfoCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub rebase_off: u32,
    pub rebase_size: u32,
    pub bind_off: u32,
    pub bind_size: u32,
    pub weak_bind_off: u32,
    pub weak_bind_size: u32,
    pub lazy_bind_off: u32,
    pub lazy_bind_size: u32,
    pub export_off: u32,
    pub export_size: u32,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct SymtabCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub symoff: u32,
    pub nsyms: u32,
    pub stroff: u32,
    pub strsize: u32,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct DysymtabCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub ilocalsym: u32,
    pub nlocalsym: u32,
    pub iextdefsym: u32,
    pub nextdefsym: u32,
    pub iundefsym: u32,
    pub nundefsym: u32,
    pub tocoff: u32,
    pub ntoc: u32,
    pub modtaboff: u32,
    pub nmodtab: u32,
    pub extrefsymoff: u32,
    pub nextrefsyms: u32,
    pub indirectsymoff: u32,
    pub nindirectsyms: u32,
    pub extreloff: u32,
    pub nextrel: u32,
    pub locreloff: u32,
    pub nlocrel: u32,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct EntryPointCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub entryoff: u64,
    pub stacksize: u64,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct BuildVersionCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub platform: u32,
    pub minos: u32,
    pub sdk: u32,
    pub ntools: u32,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct LinkeditDataCommand {
    pub cmd: u32,
    pub cmdsize: u32,
    pub dataoff: u32,
    pub datasize: u32,
}

/// Big-endian CodeDirectory header (version 0x20100).
#[derive(Debug, Clone, Copy, Pwrite)]
pub struct CodeDirectory {
    pub magic: u32,
    pub length: u32,
    pub version: u32,
    pub flags: u32,
    pub hash_offset: u32,
    pub ident_offset: u32,
    pub n_special_slots: u32,
    pub n_code_slots: u32,
    pub code_limit: u32,
    pub hash_size: u8,
    pub hash_type: u8,
    pub platform: u8,
    pub page_size: u8,
    pub spare2: u32,
    pub scatter_offset: u32,
}

fn name16(name: &str) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

fn uleb(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn write(artifact: &mut Artifact) -> Result<Vec<u8>, ObjectError> {
    let nimports = artifact.imports.len();
    let dylibs: Vec<String> = artifact
        .libraries
        .iter()
        .map(|l| resolve_library(l, Os::Darwin))
        .collect();

    // Load-command sizes decide where __text starts.
    let dylinker_size = align_up_usize(12 + "/usr/lib/dyld".len() + 1, 8);
    let dylib_sizes: Vec<usize> = dylibs
        .iter()
        .map(|p| align_up_usize(24 + p.len() + 1, 8))
        .collect();
    let sizeofcmds = (72 // __PAGEZERO
        + 72 + 2 * 80 // __TEXT
        + 72 + 3 * 80 // __DATA
        + 72 // __LINKEDIT
        + 48 // LC_DYLD_INFO_ONLY
        + 24 // LC_SYMTAB
        + 80 // LC_DYSYMTAB
        + dylinker_size
        + 24 // LC_UUID
        + 24 // LC_BUILD_VERSION
        + 24 // LC_MAIN
        + dylib_sizes.iter().sum::<usize>()
        + 16) as u32; // LC_CODE_SIGNATURE
    let ncmds = (12 + dylibs.len()) as u32;

    let text_off = align_up(32 + sizeofcmds as u64, 16);
    let text_len = artifact.text.bytes().len() as u64;
    let stubs_off = align_up(text_off + text_len, 4);
    let stubs_len = (12 * nimports) as u64;
    let text_seg_file_end = align_up(stubs_off + stubs_len, PAGE);

    let data_off = text_seg_file_end;
    let rodata_len = artifact.rodata.len() as u64;
    let data2_off = align_up(data_off + rodata_len, 8);
    let data_len = artifact.data.len() as u64;
    let got_off = align_up(data2_off + data_len, 8);
    let got_len = (8 * nimports) as u64;
    let data_seg_file_end = align_up(got_off + got_len.max(8), PAGE);

    let linkedit_off = data_seg_file_end;

    let text_base = PAGEZERO_SIZE;
    let va = |off: u64| text_base + off;

    // Bind stream: one pointer bind per import into __got.
    let mut bind = Vec::new();
    for (i, import) in artifact.imports.iter().enumerate() {
        let ordinal = artifact
            .libraries
            .iter()
            .position(|l| *l == import.library)
            .unwrap_or(0) as u8
            + 1;
        bind.push(BIND_OPCODE_SET_DYLIB_ORDINAL_IMM | (ordinal & 0x0F));
        bind.push(BIND_OPCODE_SET_SYMBOL_TRAILING_FLAGS_IMM);
        bind.extend_from_slice(format!("_{}", import.symbol).as_bytes());
        bind.push(0);
        bind.push(BIND_OPCODE_SET_TYPE_IMM | BIND_TYPE_POINTER);
        bind.push(BIND_OPCODE_SET_SEGMENT_AND_OFFSET_ULEB | 2); // __DATA
        uleb(got_off - data_off + (8 * i) as u64, &mut bind);
        bind.push(BIND_OPCODE_DO_BIND);
    }
    bind.push(0); // BIND_OPCODE_DONE
    let bind_off = linkedit_off;
    let bind_size = align_up(bind.len() as u64, 8);

    let symtab_off = bind_off + bind_size;
    let strtab_off = symtab_off; // no symbols
    let strtab_size = 8u64; // a padded empty table keeps tools happy
    let sig_off = align_up(strtab_off + strtab_size, 16);

    // Code signature size: header + directory + ident + page hashes.
    let ident = b"c67.out\0";
    let n_code_slots = (sig_off as usize).div_ceil(SIGN_PAGE);
    let cd_header = 44 + 4; // CodeDirectory with scatter_offset
    let cd_length = cd_header + ident.len() + n_code_slots * 32;
    let sig_size = (12 + 8 + cd_length) as u64;
    let total_len = sig_off + sig_size;
    let linkedit_size = total_len - linkedit_off;

    // Stub code: ADRP x16, got@page; LDR x16, [x16, #off]; BR x16.
    let mut stub_words: Vec<u32> = Vec::with_capacity(nimports * 3);
    let mut stub_map = FxHashMap::default();
    for (i, import) in artifact.imports.iter().enumerate() {
        let stub_va = va(stubs_off) + (12 * i) as u64;
        let slot_va = va(got_off) + (8 * i) as u64;
        stub_map.insert(import.symbol.clone(), stub_va);
        let page_delta = ((slot_va >> 12) as i64) - ((stub_va >> 12) as i64);
        if page_delta >= 1 << 20 || page_delta < -(1 << 20) {
            return Err(ObjectError::AddressRange("__got adrp span".into()));
        }
        let immlo = ((page_delta as u32) & 3) << 29;
        let immhi = (((page_delta >> 2) as u32) & 0x7FFFF) << 5;
        stub_words.push(0x9000_0010 | immlo | immhi); // adrp x16, page
        let lo12 = (slot_va & 0xFFF) as u32;
        stub_words.push(0xF940_0210 | (lo12 / 8) << 10); // ldr x16, [x16, #lo]
        stub_words.push(0xD61F_0200); // br x16
    }

    let plan = AddressPlan {
        text: va(text_off),
        rodata: va(data_off),
        data: va(data2_off),
        stubs: stub_map,
        iat_slots: FxHashMap::default(),
    };
    link::resolve(artifact, &plan)?;
    debug!(
        "mach-o: text at {:#x}, {} imports, signature at {:#x}",
        va(text_off),
        nimports,
        sig_off
    );

    let mut out = vec![0u8; total_len as usize];
    let header = MachHeader64 {
        magic: MH_MAGIC_64,
        cputype: CPU_TYPE_ARM64,
        cpusubtype: CPU_SUBTYPE_ARM64_ALL,
        filetype: MH_EXECUTE,
        ncmds,
        sizeofcmds,
        flags: MH_NOUNDEFS | MH_DYLDLINK | MH_PIE,
        reserved: 0,
    };
    out.pwrite_with(header, 0, LE)?;
    let mut cmd_off = 32usize;

    // __PAGEZERO
    out.pwrite_with(
        SegmentCommand64 {
            cmd: LC_SEGMENT_64,
            cmdsize: 72,
            segname: name16("__PAGEZERO"),
            vmaddr: 0,
            vmsize: PAGEZERO_SIZE,
            fileoff: 0,
            filesize: 0,
            maxprot: 0,
            initprot: 0,
            nsects: 0,
            flags: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 72;

    // __TEXT with __text and __stubs
    out.pwrite_with(
        SegmentCommand64 {
            cmd: LC_SEGMENT_64,
            cmdsize: 72 + 2 * 80,
            segname: name16("__TEXT"),
            vmaddr: text_base,
            vmsize: text_seg_file_end,
            fileoff: 0,
            filesize: text_seg_file_end,
            maxprot: VM_PROT_READ | VM_PROT_EXECUTE,
            initprot: VM_PROT_READ | VM_PROT_EXECUTE,
            nsects: 2,
            flags: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 72;
    out.pwrite_with(
        Section64 {
            sectname: name16("__text"),
            segname: name16("__TEXT"),
            addr: va(text_off),
            size: text_len,
            offset: text_off as u32,
            align: 4,
            reloff: 0,
            nreloc: 0,
            flags: S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 80;
    out.pwrite_with(
        Section64 {
            sectname: name16("__stubs"),
            segname: name16("__TEXT"),
            addr: va(stubs_off),
            size: stubs_len,
            offset: stubs_off as u32,
            align: 2,
            reloff: 0,
            nreloc: 0,
            flags: S_SYMBOL_STUBS | S_ATTR_PURE_INSTRUCTIONS | S_ATTR_SOME_INSTRUCTIONS,
            reserved1: 0,
            reserved2: 12,
            reserved3: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 80;

    // __DATA with __const, __data, __got
    out.pwrite_with(
        SegmentCommand64 {
            cmd: LC_SEGMENT_64,
            cmdsize: 72 + 3 * 80,
            segname: name16("__DATA"),
            vmaddr: va(data_off),
            vmsize: data_seg_file_end - data_off,
            fileoff: data_off,
            filesize: data_seg_file_end - data_off,
            maxprot: VM_PROT_READ | VM_PROT_WRITE,
            initprot: VM_PROT_READ | VM_PROT_WRITE,
            nsects: 3,
            flags: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 72;
    for (name, addr, size, offset) in [
        ("__const", va(data_off), rodata_len, data_off),
        ("__data", va(data2_off), data_len, data2_off),
        ("__got", va(got_off), got_len, got_off),
    ] {
        out.pwrite_with(
            Section64 {
                sectname: name16(name),
                segname: name16("__DATA"),
                addr,
                size,
                offset: offset as u32,
                align: 3,
                reloff: 0,
                nreloc: 0,
                flags: 0,
                reserved1: 0,
                reserved2: 0,
                reserved3: 0,
            },
            cmd_off,
            LE,
        )?;
        cmd_off += 80;
    }

    // __LINKEDIT
    out.pwrite_with(
        SegmentCommand64 {
            cmd: LC_SEGMENT_64,
            cmdsize: 72,
            segname: name16("__LINKEDIT"),
            vmaddr: va(linkedit_off),
            vmsize: align_up(linkedit_size, PAGE),
            fileoff: linkedit_off,
            filesize: linkedit_size,
            maxprot: VM_PROT_READ,
            initprot: VM_PROT_READ,
            nsects: 0,
            flags: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 72;

    out.pwrite_with(
        DyldInfoCommand {
            cmd: LC_DYLD_INFO_ONLY,
            cmdsize: 48,
            rebase_off: 0,
            rebase_size: 0,
            bind_off: bind_off as u32,
            bind_size: bind_size as u32,
            weak_bind_off: 0,
            weak_bind_size: 0,
            lazy_bind_off: 0,
            lazy_bind_size: 0,
            export_off: 0,
            export_size: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 48;

    out.pwrite_with(
        SymtabCommand {
            cmd: LC_SYMTAB,
            cmdsize: 24,
            symoff: symtab_off as u32,
            nsyms: 0,
            stroff: strtab_off as u32,
            strsize: strtab_size as u32,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 24;

    out.pwrite_with(
        DysymtabCommand {
            cmd: LC_DYSYMTAB,
            cmdsize: 80,
            ilocalsym: 0,
            nlocalsym: 0,
            iextdefsym: 0,
            nextdefsym: 0,
            iundefsym: 0,
            nundefsym: 0,
            tocoff: 0,
            ntoc: 0,
            modtaboff: 0,
            nmodtab: 0,
            extrefsymoff: 0,
            nextrefsyms: 0,
            indirectsymoff: 0,
            nindirectsyms: 0,
            extreloff: 0,
            nextrel: 0,
            locreloff: 0,
            nlocrel: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 80;

    // LC_LOAD_DYLINKER
    out.pwrite_with(LC_LOAD_DYLINKER, cmd_off, LE)?;
    out.pwrite_with(dylinker_size as u32, cmd_off + 4, LE)?;
    out.pwrite_with(12u32, cmd_off + 8, LE)?;
    out[cmd_off + 12..cmd_off + 12 + 13].copy_from_slice(b"/usr/lib/dyld");
    cmd_off += dylinker_size;

    // LC_UUID: derived from the text bytes so rebuilds are stable.
    out.pwrite_with(LC_UUID, cmd_off, LE)?;
    out.pwrite_with(24u32, cmd_off + 4, LE)?;
    let digest = Sha256::digest(artifact.text.bytes());
    out[cmd_off + 8..cmd_off + 24].copy_from_slice(&digest[..16]);
    cmd_off += 24;

    out.pwrite_with(
        BuildVersionCommand {
            cmd: LC_BUILD_VERSION,
            cmdsize: 24,
            platform: PLATFORM_MACOS,
            minos: 12 << 16,
            sdk: 12 << 16,
            ntools: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 24;

    out.pwrite_with(
        EntryPointCommand {
            cmd: LC_MAIN,
            cmdsize: 24,
            entryoff: text_off,
            stacksize: 0,
        },
        cmd_off,
        LE,
    )?;
    cmd_off += 24;

    for (path, size) in dylibs.iter().zip(&dylib_sizes) {
        out.pwrite_with(LC_LOAD_DYLIB, cmd_off, LE)?;
        out.pwrite_with(*size as u32, cmd_off + 4, LE)?;
        out.pwrite_with(24u32, cmd_off + 8, LE)?; // name offset
        out.pwrite_with(0u32, cmd_off + 12, LE)?; // timestamp
        out.pwrite_with(0x1_0000u32, cmd_off + 16, LE)?; // current version
        out.pwrite_with(0x1_0000u32, cmd_off + 20, LE)?; // compat version
        out[cmd_off + 24..cmd_off + 24 + path.len()].copy_from_slice(path.as_bytes());
        cmd_off += size;
    }

    out.pwrite_with(
        LinkeditDataCommand {
            cmd: LC_CODE_SIGNATURE,
            cmdsize: 16,
            dataoff: sig_off as u32,
            datasize: sig_size as u32,
        },
        cmd_off,
        LE,
    )?;

    // Payloads.
    out[text_off as usize..(text_off + text_len) as usize]
        .copy_from_slice(artifact.text.bytes());
    for (i, word) in stub_words.iter().enumerate() {
        out.pwrite_with(*word, stubs_off as usize + i * 4, LE)?;
    }
    out[data_off as usize..data_off as usize + artifact.rodata.len()]
        .copy_from_slice(&artifact.rodata);
    out[data2_off as usize..data2_off as usize + artifact.data.len()]
        .copy_from_slice(&artifact.data);
    out[bind_off as usize..bind_off as usize + bind.len()].copy_from_slice(&bind);

    write_signature(&mut out, sig_off as usize, ident, n_code_slots, cd_length)?;
    Ok(out)
}

/// Ad-hoc signature: a SuperBlob wrapping one CodeDirectory whose slots are
/// SHA-256 hashes of each 4 KiB page up to the signature itself.
fn write_signature(
    out: &mut Vec<u8>,
    sig_off: usize,
    ident: &[u8],
    n_code_slots: usize,
    cd_length: usize,
) -> Result<(), ObjectError> {
    let cd_header = 48usize;
    // SuperBlob header (big-endian): magic, length, count, then one index.
    out.pwrite_with(CSMAGIC_EMBEDDED_SIGNATURE, sig_off, BE)?;
    out.pwrite_with((12 + 8 + cd_length) as u32, sig_off + 4, BE)?;
    out.pwrite_with(1u32, sig_off + 8, BE)?;
    out.pwrite_with(0u32, sig_off + 12, BE)?; // CSSLOT_CODEDIRECTORY
    out.pwrite_with(20u32, sig_off + 16, BE)?; // blob offset

    let cd_off = sig_off + 20;
    let directory = CodeDirectory {
        magic: CSMAGIC_CODEDIRECTORY,
        length: cd_length as u32,
        version: 0x2_0100,
        flags: CS_ADHOC,
        hash_offset: (cd_header + ident.len()) as u32,
        ident_offset: cd_header as u32,
        n_special_slots: 0,
        n_code_slots: n_code_slots as u32,
        code_limit: sig_off as u32,
        hash_size: 32,
        hash_type: CS_HASHTYPE_SHA256,
        platform: 0,
        page_size: 12, // log2(4096)
        spare2: 0,
        scatter_offset: 0,
    };
    out.pwrite_with(directory, cd_off, BE)?;
    out[cd_off + cd_header..cd_off + cd_header + ident.len()].copy_from_slice(ident);

    let hashes_off = cd_off + cd_header + ident.len();
    for slot in 0..n_code_slots {
        let start = slot * SIGN_PAGE;
        let end = (start + SIGN_PAGE).min(sig_off);
        let digest = Sha256::digest(&out[start..end]);
        out[hashes_off + slot * 32..hashes_off + (slot + 1) * 32].copy_from_slice(&digest);
    }
    Ok(())
}
