//! Relocation-engine properties: PC-relative and call-patch resolution
//! against a fixed layout plan, placeholder elimination, layout stability.

use c67_codegen::emitter::{compile, Artifact, EmitOptions};
use c67_codegen::link::{resolve, AddressPlan};
use c67_codegen::reloc::SymbolKind;
use c67_codegen::target::{Arch, Os, Target};
use c67_parser::Parser;
use rustc_hash::FxHashMap;

fn build(source: &str, target: Target) -> Artifact {
    let program = Parser::new(source).unwrap().parse().unwrap();
    compile(&program, target, &FxHashMap::default(), EmitOptions::default()).unwrap()
}

fn plan() -> AddressPlan {
    AddressPlan {
        text: 0x401000,
        rodata: 0x402000,
        data: 0x403000,
        stubs: FxHashMap::default(),
        iat_slots: FxHashMap::default(),
    }
}

#[test]
fn test_symbols_receive_contiguous_addresses_in_definition_order() {
    let mut artifact = build(
        "a = \"one\"\nb = \"two\"\nc = \"three\"",
        Target::new(Arch::X86_64, Os::Linux),
    );
    resolve(&mut artifact, &plan()).unwrap();

    // Rodata symbols keep their write order and tile the segment.
    let rodata: Vec<_> = artifact
        .symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::Rodata)
        .collect();
    let mut expected = 0x402000u64;
    for sym in rodata {
        assert_eq!(sym.addr.unwrap(), expected);
        expected += sym.size as u64;
    }
}

#[test]
fn test_x64_pc_relocation_resolves_to_symbol_va() {
    let mut artifact = build("println(\"hi\")", Target::new(Arch::X86_64, Os::Linux));
    let plan = plan();
    resolve(&mut artifact, &plan).unwrap();

    // Every rip-relative displacement must land on its symbol.
    assert!(!artifact.text.pc_relocs.is_empty());
    for reloc in &artifact.text.pc_relocs {
        let disp = artifact.text.read_u32(reloc.offset) as i32 as i64;
        let next = plan.text + reloc.offset as u64 + 4;
        let effective = (next as i64 + disp) as u64;
        assert_eq!(
            effective,
            artifact.symbols.addr_of(&reloc.symbol).unwrap(),
            "reloc against {}",
            reloc.symbol
        );
    }
}

#[test]
fn test_x64_call_patches_land_in_text() {
    let mut artifact = build(
        "f = x -> x + 1\ny = f(2)\nprintln(y)",
        Target::new(Arch::X86_64, Os::Linux),
    );
    let plan = plan();
    resolve(&mut artifact, &plan).unwrap();

    // Internal calls resolve to addresses inside the text section.
    let text_end = plan.text + artifact.text.bytes().len() as u64;
    assert!(!artifact.text.call_patches.is_empty());
    for patch in &artifact.text.call_patches {
        let disp = artifact.text.read_u32(patch.offset) as i32 as i64;
        let target = (plan.text as i64 + patch.offset as i64 + 4 + disp) as u64;
        assert!(
            (plan.text..text_end).contains(&target),
            "call to {} resolves outside text",
            patch.target
        );
        assert_eq!(target, artifact.symbols.addr_of(&patch.target).unwrap());
    }
}

#[test]
fn test_no_placeholders_survive_linking() {
    let mut artifact = build(
        "f = n -> { n <= 1 => 1 ~> n * f(n - 1) }\nprintln(f(5))",
        Target::new(Arch::X86_64, Os::Linux),
    );
    resolve(&mut artifact, &plan()).unwrap();

    // Neither placeholder byte pattern remains.
    let text = artifact.text.bytes();
    for window in text.windows(4) {
        assert_ne!(window, 0x1234_5678u32.to_le_bytes());
        assert_ne!(window, 0xDEAD_BEEFu32.to_le_bytes());
    }
}

#[test]
fn test_unresolved_import_stub_is_fatal() {
    let mut artifact = build("println(42)", Target::new(Arch::X86_64, Os::Windows));
    // A plan with no stub addresses cannot satisfy the printf import.
    let err = resolve(&mut artifact, &plan()).unwrap_err();
    assert!(matches!(
        err,
        c67_codegen::error::LinkError::UnresolvedCall(_)
    ));
}

#[test]
fn test_import_calls_resolve_through_iat() {
    let mut artifact = build("println(42)", Target::new(Arch::X86_64, Os::Windows));
    let mut plan = plan();
    for import in &artifact.imports {
        plan.iat_slots
            .insert(import.symbol.clone(), 0x404000 + 8 * plan.iat_slots.len() as u64);
    }
    resolve(&mut artifact, &plan).unwrap();

    for patch in &artifact.text.call_patches {
        if let Some(symbol) = patch.target.strip_suffix("$stub") {
            let disp = artifact.text.read_u32(patch.offset) as i32 as i64;
            let target = (plan.text as i64 + patch.offset as i64 + 4 + disp) as u64;
            assert_eq!(target, plan.iat_slots[symbol]);
        }
    }
}

#[test]
fn test_arm64_adrp_pair_resolves_page_and_offset() {
    let mut artifact = build("println(\"hi\")", Target::new(Arch::Arm64, Os::Linux));
    let plan = AddressPlan {
        text: 0x400000,
        rodata: 0x475000, // force a nonzero page delta and low bits
        data: 0x480000,
        stubs: FxHashMap::default(),
        iat_slots: FxHashMap::default(),
    };
    resolve(&mut artifact, &plan).unwrap();

    for reloc in &artifact.text.pc_relocs {
        let target = artifact.symbols.addr_of(&reloc.symbol).unwrap();
        let adrp = artifact.text.read_u32(reloc.offset);
        let add = artifact.text.read_u32(reloc.offset + 4);
        let immlo = (adrp >> 29) & 0x3;
        let immhi = (adrp >> 5) & 0x7FFFF;
        let page_delta = (((immhi << 2 | immlo) as i64) << 43) >> 43; // sign-extend 21 bits
        let pc_page = (plan.text + reloc.offset as u64) & !0xFFF;
        let lo12 = ((add >> 10) & 0xFFF) as u64;
        let effective = (pc_page as i64 + (page_delta << 12)) as u64 + lo12;
        assert_eq!(effective, target, "adrp+add against {}", reloc.symbol);
    }
}

#[test]
fn test_riscv_auipc_pair_resolves() {
    let mut artifact = build("println(\"hi\")", Target::new(Arch::Riscv64, Os::Linux));
    let plan = plan();
    resolve(&mut artifact, &plan).unwrap();

    for reloc in &artifact.text.pc_relocs {
        let target = artifact.symbols.addr_of(&reloc.symbol).unwrap();
        let auipc = artifact.text.read_u32(reloc.offset);
        let addi = artifact.text.read_u32(reloc.offset + 4);
        let hi = (auipc >> 12) as i64; // 20-bit immediate, always small here
        let hi = (hi << 44) >> 44;
        let lo = (((addi >> 20) as i64) << 52) >> 52;
        let pc = plan.text + reloc.offset as u64;
        let effective = (pc as i64 + (hi << 12) + lo) as u64;
        assert_eq!(effective, target, "auipc+addi against {}", reloc.symbol);
    }
}

#[test]
fn test_oversized_displacement_is_fatal() {
    let mut artifact = build("println(\"hi\")", Target::new(Arch::X86_64, Os::Linux));
    let plan = AddressPlan {
        text: 0x400000,
        rodata: 0x4_0000_0000, // > ±2^31 away from text
        data: 0x4_0001_0000,
        stubs: FxHashMap::default(),
        iat_slots: FxHashMap::default(),
    };
    let err = resolve(&mut artifact, &plan).unwrap_err();
    assert!(matches!(
        err,
        c67_codegen::error::LinkError::DisplacementOverflow { .. }
    ));
}
