//! PE32+ (x86-64 Windows) executable writer.
//!
//! DOS header and stub, COFF header, PE32+ optional header with image base
//! 0x140000000, and three sections: `.text`, `.data` (rodata + writable
//! data), `.idata` with the import directory. Import call sites were
//! emitted as `ff 15 <disp32>` indirect calls and resolve straight into
//! the IAT.

use crate::error::ObjectError;
use crate::layout::align_up;
use crate::resolve::resolve_library;
use c67_codegen::{link, AddressPlan, Artifact, Os};
use log::debug;
use rustc_hash::FxHashMap;
use scroll::{Pwrite, LE};

pub const IMAGE_BASE: u64 = 0x1_4000_0000;
pub const SECTION_ALIGN: u64 = 0x1000;
pub const FILE_ALIGN: u64 = 0x200;

pub const IMAGE_DOS_SIGNATURE: u16 = 0x5A4D; // MZ
pub const IMAGE_NT_SIGNATURE: u32 = 0x0000_4550; // PE\0\0
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
pub const IMAGE_FILE_EXECUTABLE_IMAGE: u16 = 0x0002;
pub const IMAGE_FILE_LARGE_ADDRESS_AWARE: u16 = 0x0020;
pub const IMAGE_NT_OPTIONAL_HDR64_MAGIC: u16 = 0x20B;
pub const IMAGE_SUBSYSTEM_WINDOWS_CUI: u16 = 3;

pub const IMAGE_SCN_CNT_CODE: u32 = 0x0000_0020;
pub const IMAGE_SCN_CNT_INITIALIZED_DATA: u32 = 0x0000_0040;
pub const IMAGE_SCN_MEM_EXECUTE: u32 = 0x2000_0000;
pub const IMAGE_SCN_MEM_READ: u32 = 0x4000_0000;
pub const IMAGE_SCN_MEM_WRITE: u32 = 0x8000_0000;

const SIZEOF_DOS: usize = 64;
const SIZEOF_DOS_STUB: usize = 64;
const SIZEOF_COFF: usize = 20;
const SIZEOF_OPTIONAL: usize = 240;
const SIZEOF_SECTION: usize = 40;
const SIZEOF_IMPORT_DESCRIPTOR: usize = 20;

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct CoffHeader {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct OptionalHeader64 {
    pub magic: u16,
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    pub size_of_code: u32,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub major_operating_system_version: u16,
    pub minor_operating_system_version: u16,
    pub major_image_version: u16,
    pub minor_image_version: u16,
    pub major_subsystem_version: u16,
    pub minor_subsystem_version: u16,
    pub win32_version_value: u32,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: u16,
    pub dll_characteristics: u16,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub loader_flags: u32,
    pub number_of_rva_and_sizes: u32,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct SectionHeader {
    pub name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations: u16,
    pub number_of_linenumbers: u16,
    pub characteristics: u32,
}

#[derive(Debug, Clone, Copy, Pwrite)]
pub struct ImportDirectoryEntry {
    pub import_lookup_table_rva: u32,
    pub time_date_stamp: u32,
    pub forwarder_chain: u32,
    pub name_rva: u32,
    pub import_address_table_rva: u32,
}

fn name8(name: &str) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out
}

/// The import directory payload plus where each symbol's IAT slot landed.
struct Idata {
    bytes: Vec<u8>,
    iat_rva_of: FxHashMap<String, u32>,
    iat_rva: u32,
    iat_size: u32,
}

/// Per library: directory entry, ILT, IAT, hint/name entries, name string.
fn build_idata(artifact: &Artifact, idata_rva: u32) -> Idata {
    let mut libs: Vec<(String, Vec<&str>)> = Vec::new();
    for library in &artifact.libraries {
        let symbols: Vec<&str> = artifact
            .imports
            .iter()
            .filter(|i| i.library == *library)
            .map(|i| i.symbol.as_str())
            .collect();
        if !symbols.is_empty() {
            libs.push((resolve_library(library, Os::Windows), symbols));
        }
    }

    let dir_size = (libs.len() + 1) * SIZEOF_IMPORT_DESCRIPTOR;
    let mut tables_off = dir_size;
    let mut layouts = Vec::new(); // (ilt_off, iat_off) per lib
    for (_, symbols) in &libs {
        let table_len = (symbols.len() + 1) * 8;
        layouts.push((tables_off, tables_off + table_len));
        tables_off += table_len * 2;
    }
    let names_off = tables_off;

    let mut bytes = vec![0u8; dir_size];
    bytes.resize(tables_off, 0);
    let mut iat_rva_of = FxHashMap::default();

    let mut name_bytes = Vec::new();
    for (lib_index, ((dll, symbols), (ilt_off, iat_off))) in
        libs.iter().zip(&layouts).enumerate()
    {
        // Hint/name entries for each imported function.
        let mut entries = Vec::new();
        for symbol in symbols {
            let rva = (names_off + name_bytes.len()) as u32;
            name_bytes.extend_from_slice(&0u16.to_le_bytes()); // hint
            name_bytes.extend_from_slice(symbol.as_bytes());
            name_bytes.push(0);
            if name_bytes.len() % 2 == 1 {
                name_bytes.push(0);
            }
            entries.push(rva);
        }
        let dll_rva = (names_off + name_bytes.len()) as u32;
        name_bytes.extend_from_slice(dll.as_bytes());
        name_bytes.push(0);
        if name_bytes.len() % 2 == 1 {
            name_bytes.push(0);
        }

        let entry = ImportDirectoryEntry {
            import_lookup_table_rva: idata_rva + *ilt_off as u32,
            time_date_stamp: 0,
            forwarder_chain: 0,
            name_rva: idata_rva + dll_rva,
            import_address_table_rva: idata_rva + *iat_off as u32,
        };
        bytes
            .pwrite_with(entry, lib_index * SIZEOF_IMPORT_DESCRIPTOR, LE)
            .expect("descriptor fits");

        for (i, (symbol, hint_rva)) in symbols.iter().zip(&entries).enumerate() {
            let by_name = (idata_rva + hint_rva) as u64;
            bytes[ilt_off + i * 8..ilt_off + i * 8 + 8]
                .copy_from_slice(&by_name.to_le_bytes());
            bytes[iat_off + i * 8..iat_off + i * 8 + 8]
                .copy_from_slice(&by_name.to_le_bytes());
            iat_rva_of.insert(
                symbol.to_string(),
                idata_rva + (*iat_off + i * 8) as u32,
            );
        }
    }
    bytes.extend_from_slice(&name_bytes);

    // One contiguous IAT region directory: from the first IAT to the end of
    // the last.
    let (iat_rva, iat_size) = match (layouts.first(), layouts.last()) {
        (Some(first), Some(last)) => {
            let start = first.1;
            let end = last.1 + (libs.last().map(|(_, s)| s.len() + 1).unwrap_or(0)) * 8;
            ((idata_rva + start as u32), (end - start) as u32)
        }
        _ => (0, 0),
    };

    Idata {
        bytes,
        iat_rva_of,
        iat_rva,
        iat_size,
    }
}

pub fn write(artifact: &mut Artifact) -> Result<Vec<u8>, ObjectError> {
    let headers_size = align_up(
        (SIZEOF_DOS + SIZEOF_DOS_STUB + 4 + SIZEOF_COFF + SIZEOF_OPTIONAL + 3 * SIZEOF_SECTION)
            as u64,
        FILE_ALIGN,
    );

    let text_rva = SECTION_ALIGN;
    let text_len = artifact.text.bytes().len() as u64;
    let data_rva = align_up(text_rva + text_len, SECTION_ALIGN);
    let rodata_len = artifact.rodata.len() as u64;
    let wdata_sub_off = align_up(rodata_len, 8);
    let data_len = wdata_sub_off + artifact.data.len() as u64;
    let idata_rva = align_up(data_rva + data_len.max(1), SECTION_ALIGN);

    let idata = build_idata(artifact, idata_rva as u32);
    let idata_len = idata.bytes.len() as u64;
    let image_size = align_up(idata_rva + idata_len.max(1), SECTION_ALIGN);

    let text_raw = headers_size;
    let data_raw = align_up(text_raw + text_len, FILE_ALIGN);
    let idata_raw = align_up(data_raw + data_len.max(1), FILE_ALIGN);
    let total = align_up(idata_raw + idata_len, FILE_ALIGN) as usize;

    let mut iat_slots = FxHashMap::default();
    for (symbol, rva) in &idata.iat_rva_of {
        iat_slots.insert(symbol.clone(), IMAGE_BASE + *rva as u64);
    }
    let plan = AddressPlan {
        text: IMAGE_BASE + text_rva,
        rodata: IMAGE_BASE + data_rva,
        data: IMAGE_BASE + data_rva + wdata_sub_off,
        stubs: FxHashMap::default(),
        iat_slots,
    };
    link::resolve(artifact, &plan)?;
    debug!(
        "pe: entry rva {:#x}, iat rva {:#x} ({} bytes)",
        text_rva, idata.iat_rva, idata.iat_size
    );

    let mut out = vec![0u8; total];

    // DOS header: magic, unused fields, e_lfanew at 0x3C.
    out.pwrite_with(IMAGE_DOS_SIGNATURE, 0, LE)?;
    out.pwrite_with(0x80u32, 0x3C, LE)?;
    // Classic stub message for tools that run the DOS program.
    let stub: &[u8] = &[
        0x0E, 0x1F, 0xBA, 0x0E, 0x00, 0xB4, 0x09, 0xCD, 0x21, 0xB8, 0x01, 0x4C, 0xCD, 0x21,
    ];
    out[SIZEOF_DOS..SIZEOF_DOS + stub.len()].copy_from_slice(stub);
    let message = b"This program cannot be run in DOS mode.\r\r\n$";
    out[SIZEOF_DOS + stub.len()..SIZEOF_DOS + stub.len() + message.len()]
        .copy_from_slice(message);

    let pe_off = 0x80usize;
    out.pwrite_with(IMAGE_NT_SIGNATURE, pe_off, LE)?;
    out.pwrite_with(
        CoffHeader {
            machine: IMAGE_FILE_MACHINE_AMD64,
            number_of_sections: 3,
            time_date_stamp: 0,
            pointer_to_symbol_table: 0,
            number_of_symbols: 0,
            size_of_optional_header: SIZEOF_OPTIONAL as u16,
            characteristics: IMAGE_FILE_EXECUTABLE_IMAGE | IMAGE_FILE_LARGE_ADDRESS_AWARE,
        },
        pe_off + 4,
        LE,
    )?;

    let opt_off = pe_off + 4 + SIZEOF_COFF;
    out.pwrite_with(
        OptionalHeader64 {
            magic: IMAGE_NT_OPTIONAL_HDR64_MAGIC,
            major_linker_version: 0,
            minor_linker_version: 1,
            size_of_code: align_up(text_len, FILE_ALIGN) as u32,
            size_of_initialized_data: align_up(data_len + idata_len, FILE_ALIGN) as u32,
            size_of_uninitialized_data: 0,
            address_of_entry_point: text_rva as u32,
            base_of_code: text_rva as u32,
            image_base: IMAGE_BASE,
            section_alignment: SECTION_ALIGN as u32,
            file_alignment: FILE_ALIGN as u32,
            major_operating_system_version: 6,
            minor_operating_system_version: 0,
            major_image_version: 0,
            minor_image_version: 0,
            major_subsystem_version: 6,
            minor_subsystem_version: 0,
            win32_version_value: 0,
            size_of_image: image_size as u32,
            size_of_headers: headers_size as u32,
            check_sum: 0,
            subsystem: IMAGE_SUBSYSTEM_WINDOWS_CUI,
            dll_characteristics: 0,
            size_of_stack_reserve: 0x10_0000,
            size_of_stack_commit: 0x1000,
            size_of_heap_reserve: 0x10_0000,
            size_of_heap_commit: 0x1000,
            loader_flags: 0,
            number_of_rva_and_sizes: 16,
        },
        opt_off,
        LE,
    )?;

    // Data directories: [1] import table, [12] IAT.
    let dirs_off = opt_off + 112;
    out.pwrite_with(idata_rva as u32, dirs_off + 8, LE)?;
    out.pwrite_with(idata_len as u32, dirs_off + 12, LE)?;
    out.pwrite_with(idata.iat_rva, dirs_off + 12 * 8, LE)?;
    out.pwrite_with(idata.iat_size, dirs_off + 12 * 8 + 4, LE)?;

    let sections_off = opt_off + SIZEOF_OPTIONAL;
    let sections = [
        SectionHeader {
            name: name8(".text"),
            virtual_size: text_len as u32,
            virtual_address: text_rva as u32,
            size_of_raw_data: align_up(text_len, FILE_ALIGN) as u32,
            pointer_to_raw_data: text_raw as u32,
            pointer_to_relocations: 0,
            pointer_to_linenumbers: 0,
            number_of_relocations: 0,
            number_of_linenumbers: 0,
            characteristics: IMAGE_SCN_CNT_CODE | IMAGE_SCN_MEM_EXECUTE | IMAGE_SCN_MEM_READ,
        },
        SectionHeader {
            name: name8(".data"),
            virtual_size: data_len as u32,
            virtual_address: data_rva as u32,
            size_of_raw_data: align_up(data_len.max(1), FILE_ALIGN) as u32,
            pointer_to_raw_data: data_raw as u32,
            pointer_to_relocations: 0,
            pointer_to_linenumbers: 0,
            number_of_relocations: 0,
            number_of_linenumbers: 0,
            characteristics: IMAGE_SCN_CNT_INITIALIZED_DATA
                | IMAGE_SCN_MEM_READ
                | IMAGE_SCN_MEM_WRITE,
        },
        SectionHeader {
            name: name8(".idata"),
            virtual_size: idata_len as u32,
            virtual_address: idata_rva as u32,
            size_of_raw_data: align_up(idata_len, FILE_ALIGN) as u32,
            pointer_to_raw_data: idata_raw as u32,
            pointer_to_relocations: 0,
            pointer_to_linenumbers: 0,
            number_of_relocations: 0,
            number_of_linenumbers: 0,
            characteristics: IMAGE_SCN_CNT_INITIALIZED_DATA
                | IMAGE_SCN_MEM_READ
                | IMAGE_SCN_MEM_WRITE,
        },
    ];
    for (i, section) in sections.iter().enumerate() {
        out.pwrite_with(*section, sections_off + i * SIZEOF_SECTION, LE)?;
    }

    out[text_raw as usize..text_raw as usize + text_len as usize]
        .copy_from_slice(artifact.text.bytes());
    out[data_raw as usize..data_raw as usize + artifact.rodata.len()]
        .copy_from_slice(&artifact.rodata);
    let wdata_raw = data_raw + wdata_sub_off;
    out[wdata_raw as usize..wdata_raw as usize + artifact.data.len()]
        .copy_from_slice(&artifact.data);
    out[idata_raw as usize..idata_raw as usize + idata.bytes.len()]
        .copy_from_slice(&idata.bytes);

    Ok(out)
}
