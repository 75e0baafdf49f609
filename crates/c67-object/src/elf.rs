//! Static ELF64 executable writer.
//!
//! ET_EXEC at base 0x400000 with three PT_LOAD segments (R-X text including
//! the headers, R-- rodata, RW- data). No section headers are emitted; the
//! kernel only reads program headers.

use crate::error::ObjectError;
use crate::layout::align_up;
use c67_codegen::{link, AddressPlan, Arch, Artifact};
use log::debug;
use rustc_hash::FxHashMap;
use scroll::{Pwrite, LE};

pub const ELF_BASE: u64 = 0x400000;
pub const PAGE: u64 = 0x1000;

// e_ident indexes and values
pub const ELFMAG: [u8; 4] = [0x7F, b'E', b'L', b'F'];
pub const ELFCLASS64: u8 = 2;
pub const ELFDATA2LSB: u8 = 1;
pub const EV_CURRENT: u8 = 1;

pub const ET_EXEC: u16 = 2;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;
pub const EM_RISCV: u16 = 243;

pub const PT_LOAD: u32 = 1;
pub const PT_DYNAMIC: u32 = 2;
pub const PT_INTERP: u32 = 3;
pub const PT_PHDR: u32 = 6;

pub const PF_X: u32 = 1;
pub const PF_W: u32 = 2;
pub const PF_R: u32 = 4;

pub const SIZEOF_EHDR: usize = 64;
pub const SIZEOF_PHDR: usize = 56;

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct Header {
    pub e_ident: [u8; 16],
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
    pub p_align: u64,
}

pub fn machine_of(arch: Arch) -> u16 {
    match arch {
        Arch::X86_64 => EM_X86_64,
        Arch::Arm64 => EM_AARCH64,
        Arch::Riscv64 => EM_RISCV,
    }
}

pub fn ident() -> [u8; 16] {
    let mut ident = [0u8; 16];
    ident[..4].copy_from_slice(&ELFMAG);
    ident[4] = ELFCLASS64;
    ident[5] = ELFDATA2LSB;
    ident[6] = EV_CURRENT;
    ident
}

/// RISC-V executables advertise RVC+double-float ABI bits.
pub fn flags_of(arch: Arch) -> u32 {
    match arch {
        Arch::Riscv64 => 0x4, // EF_RISCV_FLOAT_ABI_DOUBLE
        _ => 0,
    }
}

/// Serialize a fully linked static executable.
pub fn write(artifact: &mut Artifact) -> Result<Vec<u8>, ObjectError> {
    let text_off = PAGE;
    let text_len = artifact.text.bytes().len() as u64;
    let rodata_off = align_up(text_off + text_len, PAGE);
    let rodata_len = artifact.rodata.len() as u64;
    let data_off = align_up(rodata_off + rodata_len.max(1), PAGE);
    let data_len = artifact.data.len() as u64;
    let total = (data_off + data_len.max(1)) as usize;

    let plan = AddressPlan {
        text: ELF_BASE + text_off,
        rodata: ELF_BASE + rodata_off,
        data: ELF_BASE + data_off,
        stubs: FxHashMap::default(),
        iat_slots: FxHashMap::default(),
    };
    link::resolve(artifact, &plan)?;

    let entry = artifact
        .symbols
        .addr_of(&artifact.entry)
        .expect("entry label resolved");
    debug!(
        "static elf: entry {:#x}, text {:#x}+{:#x}",
        entry, plan.text, text_len
    );

    let mut out = vec![0u8; total];
    let header = Header {
        e_ident: ident(),
        e_type: ET_EXEC,
        e_machine: machine_of(artifact.target.arch),
        e_version: 1,
        e_entry: entry,
        e_phoff: SIZEOF_EHDR as u64,
        e_shoff: 0,
        e_flags: flags_of(artifact.target.arch),
        e_ehsize: SIZEOF_EHDR as u16,
        e_phentsize: SIZEOF_PHDR as u16,
        e_phnum: 3,
        e_shentsize: 0,
        e_shnum: 0,
        e_shstrndx: 0,
    };
    out.pwrite_with(header, 0, LE)?;

    let phdrs = [
        ProgramHeader {
            p_type: PT_LOAD,
            p_flags: PF_R | PF_X,
            p_offset: 0,
            p_vaddr: ELF_BASE,
            p_paddr: ELF_BASE,
            p_filesz: text_off + text_len,
            p_memsz: text_off + text_len,
            p_align: PAGE,
        },
        ProgramHeader {
            p_type: PT_LOAD,
            p_flags: PF_R,
            p_offset: rodata_off,
            p_vaddr: ELF_BASE + rodata_off,
            p_paddr: ELF_BASE + rodata_off,
            p_filesz: rodata_len,
            p_memsz: rodata_len,
            p_align: PAGE,
        },
        ProgramHeader {
            p_type: PT_LOAD,
            p_flags: PF_R | PF_W,
            p_offset: data_off,
            p_vaddr: ELF_BASE + data_off,
            p_paddr: ELF_BASE + data_off,
            p_filesz: data_len,
            p_memsz: data_len,
            p_align: PAGE,
        },
    ];
    for (i, phdr) in phdrs.iter().enumerate() {
        out.pwrite_with(*phdr, SIZEOF_EHDR + i * SIZEOF_PHDR, LE)?;
    }

    out[text_off as usize..(text_off + text_len) as usize]
        .copy_from_slice(artifact.text.bytes());
    out[rodata_off as usize..rodata_off as usize + artifact.rodata.len()]
        .copy_from_slice(&artifact.rodata);
    out[data_off as usize..data_off as usize + artifact.data.len()]
        .copy_from_slice(&artifact.data);
    Ok(out)
}
