//! Dynamic ELF64 executable writer (x86-64).
//!
//! Adds the dynamic-linking furniture to the static layout: `.interp`, a
//! SYSV `.hash`, `.dynsym`/`.dynstr`, `.rela.plt` with `R_X86_64_JUMP_SLOT`
//! entries, PLT0 plus one PLT entry per import, a lazily-initialized
//! `.got.plt` and the `PT_DYNAMIC` table with `DT_NEEDED` per shared object.

use crate::elf::{
    flags_of, ident, machine_of, Header, ProgramHeader, ELF_BASE, ET_EXEC, PAGE, PF_R, PF_W,
    PF_X, PT_DYNAMIC, PT_INTERP, PT_LOAD, PT_PHDR, SIZEOF_EHDR, SIZEOF_PHDR,
};
use crate::error::ObjectError;
use crate::layout::align_up;
use crate::resolve::resolve_library;
use c67_codegen::{link, AddressPlan, Artifact, Os};
use log::debug;
use rustc_hash::FxHashMap;
use scroll::{Pwrite, LE};

const INTERP: &[u8] = b"/lib64/ld-linux-x86-64.so.2\0";

const DT_NEEDED: u64 = 1;
const DT_PLTRELSZ: u64 = 2;
const DT_PLTGOT: u64 = 3;
const DT_HASH: u64 = 4;
const DT_STRTAB: u64 = 5;
const DT_SYMTAB: u64 = 6;
const DT_STRSZ: u64 = 10;
const DT_SYMENT: u64 = 11;
const DT_PLTREL: u64 = 20;
const DT_JMPREL: u64 = 23;
const DT_RELA_TAG: u64 = 7;

const R_X86_64_JUMP_SLOT: u32 = 7;
const SIZEOF_SYM: usize = 24;
const SIZEOF_RELA: usize = 24;
const SIZEOF_DYN: usize = 16;
const PLT_ENTRY: usize = 16;

#[derive(Debug, Clone, Copy, Pwrite)]
struct Sym {
    st_name: u32,
    st_info: u8,
    st_other: u8,
    st_shndx: u16,
    st_value: u64,
    st_size: u64,
}

#[derive(Debug, Clone, Copy, Pwrite)]
struct Rela {
    r_offset: u64,
    r_info: u64,
    r_addend: i64,
}

#[derive(Debug, Clone, Copy, Pwrite)]
struct Dyn {
    d_tag: u64,
    d_val: u64,
}

struct Strtab {
    bytes: Vec<u8>,
}

impl Strtab {
    fn new() -> Self {
        Self { bytes: vec![0] }
    }

    fn push(&mut self, s: &str) -> u32 {
        let offset = self.bytes.len() as u32;
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        offset
    }
}

pub fn write(artifact: &mut Artifact) -> Result<Vec<u8>, ObjectError> {
    let nimports = artifact.imports.len();
    let nsyms = nimports + 1;

    // String and symbol tables.
    let mut dynstr = Strtab::new();
    let mut syms = vec![Sym {
        st_name: 0,
        st_info: 0,
        st_other: 0,
        st_shndx: 0,
        st_value: 0,
        st_size: 0,
    }];
    for import in &artifact.imports {
        let st_name = dynstr.push(&import.symbol);
        syms.push(Sym {
            st_name,
            st_info: 0x12, // GLOBAL | FUNC
            st_other: 0,
            st_shndx: 0,
            st_value: 0,
            st_size: 0,
        });
    }
    let mut needed = Vec::new();
    for library in &artifact.libraries {
        let soname = resolve_library(library, Os::Linux);
        needed.push(dynstr.push(&soname));
    }

    // File layout: metadata rides inside the R-X load, like the headers.
    let interp_off = (SIZEOF_EHDR + 6 * SIZEOF_PHDR) as u64;
    let hash_off = align_up(interp_off + INTERP.len() as u64, 8);
    let hash_len = (4 + nsyms) as u64 * 4; // nbucket, nchain, bucket0, chain[]
    let dynsym_off = align_up(hash_off + hash_len, 8);
    let dynsym_len = (nsyms * SIZEOF_SYM) as u64;
    let dynstr_off = dynsym_off + dynsym_len;
    let dynstr_len = dynstr.bytes.len() as u64;
    let rela_off = align_up(dynstr_off + dynstr_len, 8);
    let rela_len = (nimports * SIZEOF_RELA) as u64;

    let plt_off = align_up(rela_off + rela_len, PAGE);
    let plt_len = (PLT_ENTRY * (nimports + 1)) as u64;
    let text_off = plt_off + plt_len;
    let text_len = artifact.text.bytes().len() as u64;

    let rodata_off = align_up(text_off + text_len, PAGE);
    let rodata_len = artifact.rodata.len() as u64;

    let got_off = align_up(rodata_off + rodata_len.max(1), PAGE);
    let got_len = ((3 + nimports) * 8) as u64;
    let data_off = got_off + got_len;
    let data_len = artifact.data.len() as u64;
    let dynamic_off = align_up(data_off + data_len, 8);
    let ndyn = needed.len() + 10;
    let dynamic_len = (ndyn * SIZEOF_DYN) as u64;
    let total = (dynamic_off + dynamic_len) as usize;

    let va = |off: u64| ELF_BASE + off;
    let plt_va = va(plt_off);
    let got_va = va(got_off);

    // Import call sites resolve to their PLT entries.
    let mut stubs = FxHashMap::default();
    for (i, import) in artifact.imports.iter().enumerate() {
        stubs.insert(
            import.symbol.clone(),
            plt_va + (PLT_ENTRY * (i + 1)) as u64,
        );
    }
    let plan = AddressPlan {
        text: va(text_off),
        rodata: va(rodata_off),
        data: va(data_off),
        stubs,
        iat_slots: FxHashMap::default(),
    };
    link::resolve(artifact, &plan)?;
    let entry = artifact.symbols.addr_of(&artifact.entry).expect("entry");
    debug!(
        "dynamic elf: {} imports, plt {:#x}, got {:#x}",
        nimports, plt_va, got_va
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
        e_phnum: 6,
        e_shentsize: 0,
        e_shnum: 0,
        e_shstrndx: 0,
    };
    out.pwrite_with(header, 0, LE)?;

    let phdrs = [
        ProgramHeader {
            p_type: PT_PHDR,
            p_flags: PF_R,
            p_offset: SIZEOF_EHDR as u64,
            p_vaddr: va(SIZEOF_EHDR as u64),
            p_paddr: va(SIZEOF_EHDR as u64),
            p_filesz: (6 * SIZEOF_PHDR) as u64,
            p_memsz: (6 * SIZEOF_PHDR) as u64,
            p_align: 8,
        },
        ProgramHeader {
            p_type: PT_INTERP,
            p_flags: PF_R,
            p_offset: interp_off,
            p_vaddr: va(interp_off),
            p_paddr: va(interp_off),
            p_filesz: INTERP.len() as u64,
            p_memsz: INTERP.len() as u64,
            p_align: 1,
        },
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
            p_vaddr: va(rodata_off),
            p_paddr: va(rodata_off),
            p_filesz: rodata_len,
            p_memsz: rodata_len,
            p_align: PAGE,
        },
        ProgramHeader {
            p_type: PT_LOAD,
            p_flags: PF_R | PF_W,
            p_offset: got_off,
            p_vaddr: got_va,
            p_paddr: got_va,
            p_filesz: (total as u64) - got_off,
            p_memsz: (total as u64) - got_off,
            p_align: PAGE,
        },
        ProgramHeader {
            p_type: PT_DYNAMIC,
            p_flags: PF_R | PF_W,
            p_offset: dynamic_off,
            p_vaddr: va(dynamic_off),
            p_paddr: va(dynamic_off),
            p_filesz: dynamic_len,
            p_memsz: dynamic_len,
            p_align: 8,
        },
    ];
    for (i, phdr) in phdrs.iter().enumerate() {
        out.pwrite_with(*phdr, SIZEOF_EHDR + i * SIZEOF_PHDR, LE)?;
    }

    out[interp_off as usize..interp_off as usize + INTERP.len()].copy_from_slice(INTERP);

    // SYSV hash: one bucket chaining through every symbol.
    let mut offset = hash_off as usize;
    for word in hash_words(nsyms) {
        out.pwrite_with(word, offset, LE)?;
        offset += 4;
    }

    for (i, sym) in syms.iter().enumerate() {
        out.pwrite_with(*sym, dynsym_off as usize + i * SIZEOF_SYM, LE)?;
    }
    out[dynstr_off as usize..dynstr_off as usize + dynstr.bytes.len()]
        .copy_from_slice(&dynstr.bytes);

    for i in 0..nimports {
        let rela = Rela {
            r_offset: got_va + ((3 + i) * 8) as u64,
            r_info: ((i as u64 + 1) << 32) | R_X86_64_JUMP_SLOT as u64,
            r_addend: 0,
        };
        out.pwrite_with(rela, rela_off as usize + i * SIZEOF_RELA, LE)?;
    }

    write_plt(&mut out, plt_off as usize, plt_va, got_va, nimports);

    out[text_off as usize..(text_off + text_len) as usize]
        .copy_from_slice(artifact.text.bytes());
    out[rodata_off as usize..rodata_off as usize + artifact.rodata.len()]
        .copy_from_slice(&artifact.rodata);

    // .got.plt: dynamic table address, two loader slots, then lazy entries
    // pointing back at each PLT entry's push instruction.
    out.pwrite_with(va(dynamic_off), got_off as usize, LE)?;
    for i in 0..nimports {
        let lazy = plt_va + (PLT_ENTRY * (i + 1)) as u64 + 6;
        out.pwrite_with(lazy, got_off as usize + (3 + i) * 8, LE)?;
    }

    out[data_off as usize..data_off as usize + artifact.data.len()]
        .copy_from_slice(&artifact.data);

    let mut dyns = Vec::with_capacity(ndyn);
    for name in needed {
        dyns.push(Dyn {
            d_tag: DT_NEEDED,
            d_val: name as u64,
        });
    }
    dyns.extend_from_slice(&[
        Dyn {
            d_tag: DT_HASH,
            d_val: va(hash_off),
        },
        Dyn {
            d_tag: DT_STRTAB,
            d_val: va(dynstr_off),
        },
        Dyn {
            d_tag: DT_SYMTAB,
            d_val: va(dynsym_off),
        },
        Dyn {
            d_tag: DT_STRSZ,
            d_val: dynstr_len,
        },
        Dyn {
            d_tag: DT_SYMENT,
            d_val: SIZEOF_SYM as u64,
        },
        Dyn {
            d_tag: DT_PLTGOT,
            d_val: got_va,
        },
        Dyn {
            d_tag: DT_PLTRELSZ,
            d_val: rela_len,
        },
        Dyn {
            d_tag: DT_PLTREL,
            d_val: DT_RELA_TAG,
        },
        Dyn {
            d_tag: DT_JMPREL,
            d_val: va(rela_off),
        },
        Dyn { d_tag: 0, d_val: 0 },
    ]);
    for (i, dyn_entry) in dyns.iter().enumerate() {
        out.pwrite_with(*dyn_entry, dynamic_off as usize + i * SIZEOF_DYN, LE)?;
    }

    Ok(out)
}

fn hash_words(nsyms: usize) -> Vec<u32> {
    let mut words = vec![1u32, nsyms as u32];
    // bucket[0] → first real symbol; chain[i] → i+1, last → STN_UNDEF.
    words.push(if nsyms > 1 { 1 } else { 0 });
    for i in 0..nsyms {
        let next = if i + 1 < nsyms { i as u32 + 1 } else { 0 };
        words.push(if i == 0 { 0 } else { next });
    }
    words
}

/// PLT0 plus one entry per import, from the classic two-instruction
/// template.
fn write_plt(out: &mut [u8], off: usize, plt_va: u64, got_va: u64, nimports: usize) {
    let rel = |from: u64, to: u64| (to as i64 - from as i64) as i32;

    // PLT0: push [got+8]; jmp [got+16]; pad
    out[off] = 0xFF;
    out[off + 1] = 0x35;
    out[off + 2..off + 6].copy_from_slice(&rel(plt_va + 6, got_va + 8).to_le_bytes());
    out[off + 6] = 0xFF;
    out[off + 7] = 0x25;
    out[off + 8..off + 12].copy_from_slice(&rel(plt_va + 12, got_va + 16).to_le_bytes());
    out[off + 12..off + 16].copy_from_slice(&[0x0F, 0x1F, 0x40, 0x00]);

    for i in 0..nimports {
        let entry_off = off + PLT_ENTRY * (i + 1);
        let entry_va = plt_va + (PLT_ENTRY * (i + 1)) as u64;
        let got_slot = got_va + ((3 + i) * 8) as u64;
        // jmp [got+slot]
        out[entry_off] = 0xFF;
        out[entry_off + 1] = 0x25;
        out[entry_off + 2..entry_off + 6]
            .copy_from_slice(&rel(entry_va + 6, got_slot).to_le_bytes());
        // push <reloc index>
        out[entry_off + 6] = 0x68;
        out[entry_off + 7..entry_off + 11].copy_from_slice(&(i as u32).to_le_bytes());
        // jmp plt0
        out[entry_off + 11] = 0xE9;
        out[entry_off + 12..entry_off + 16]
            .copy_from_slice(&rel(entry_va + 16, plt_va).to_le_bytes());
    }
}
