//! Container smoke tests: compile small end-to-end programs and check the
//! serialized images structurally.

use c67_codegen::emitter::{compile, Artifact, EmitOptions};
use c67_codegen::target::{Arch, Os, Target};
use c67_object::write_executable;
use c67_parser::Parser;
use rustc_hash::FxHashMap;
use std::io::Write;

fn build(source: &str, target: Target) -> Artifact {
    let program = Parser::new(source).unwrap().parse().unwrap();
    compile(&program, target, &FxHashMap::default(), EmitOptions::default()).unwrap()
}

fn image(source: &str, target: Target) -> Vec<u8> {
    write_executable(&mut build(source, target)).unwrap()
}

fn u16_at(image: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(image[off..off + 2].try_into().unwrap())
}

fn u32_at(image: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(image[off..off + 4].try_into().unwrap())
}

fn u64_at(image: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(image[off..off + 8].try_into().unwrap())
}

// ===== static ELF =====

#[test]
fn test_exit_zero_elf_shape() {
    let image = image("exit(0)", Target::new(Arch::X86_64, Os::Linux));
    // A minimal static binary stays small but real.
    assert!(image.len() >= 200 && image.len() <= 16000, "{}", image.len());
    assert_eq!(&image[..4], &[0x7F, b'E', b'L', b'F']);
    assert_eq!(image[4], 2); // ELFCLASS64
    assert_eq!(u16_at(&image, 16), 2); // ET_EXEC
    assert_eq!(u16_at(&image, 18), 62); // EM_X86_64
    // Entry points at the text base.
    assert_eq!(u64_at(&image, 24), 0x401000);
    // Three program headers.
    assert_eq!(u16_at(&image, 56), 3);
}

#[test]
fn test_static_elf_segment_permissions() {
    let image = image("println(\"hello\")", Target::new(Arch::X86_64, Os::Linux));
    let phoff = u64_at(&image, 32) as usize;
    // PT_LOAD R-X, R--, RW- in order.
    let flags: Vec<u32> = (0..3).map(|i| u32_at(&image, phoff + i * 56 + 4)).collect();
    assert_eq!(flags, vec![5, 4, 6]);
    // The interned literal and the newline chunk land in rodata.
    let needle = b"hello\0";
    assert!(image.windows(needle.len()).any(|window| window == needle));
    let newline = b"\0\n\0";
    assert!(image.windows(newline.len()).any(|window| window == newline));
}

#[test]
fn test_static_elf_arm64_and_riscv_machines() {
    let arm = image("exit(0)", Target::new(Arch::Arm64, Os::Linux));
    assert_eq!(u16_at(&arm, 18), 183); // EM_AARCH64
    let rv = image("exit(0)", Target::new(Arch::Riscv64, Os::Linux));
    assert_eq!(u16_at(&rv, 18), 243); // EM_RISCV
    // RISC-V double-float ABI flag.
    assert_eq!(u32_at(&rv, 48) & 0x4, 0x4);
}

// ===== dynamic ELF =====

#[test]
fn test_dynamic_elf_has_interp_and_needed() {
    let source = "import sdl2\nprintln(42)";
    let image = image(source, Target::new(Arch::X86_64, Os::Linux));
    assert_eq!(&image[..4], &[0x7F, b'E', b'L', b'F']);
    assert_eq!(u16_at(&image, 56), 6); // PHDR, INTERP, 3 LOAD, DYNAMIC
    let needle = b"/lib64/ld-linux-x86-64.so.2";
    assert!(image.windows(needle.len()).any(|w| w == needle));
    // DT_NEEDED strings for the imported library and libc.
    let needle = b"libsdl2.so";
    assert!(image.windows(needle.len()).any(|w| w == needle));
    let libc = b"libc.so.6";
    assert!(image.windows(libc.len()).any(|w| w == libc));
}

// ===== Mach-O =====

#[test]
fn test_macho_magic_and_lc_main() {
    let image = image("exit(42)", Target::new(Arch::Arm64, Os::Darwin));
    assert_eq!(u32_at(&image, 0), 0xFEED_FACF);
    assert_eq!(u32_at(&image, 4), 0x0100_000C); // CPU_TYPE_ARM64
    assert_eq!(u32_at(&image, 12), 2); // MH_EXECUTE

    // Walk load commands for LC_MAIN and check entryoff points inside
    // __TEXT.
    let ncmds = u32_at(&image, 16) as usize;
    let mut off = 32usize;
    let mut entryoff = None;
    let mut text_range = None;
    for _ in 0..ncmds {
        let cmd = u32_at(&image, off);
        let cmdsize = u32_at(&image, off + 4) as usize;
        if cmd == 0x19 {
            let name = &image[off + 8..off + 24];
            if name.starts_with(b"__TEXT") {
                let fileoff = u64_at(&image, off + 40);
                let filesize = u64_at(&image, off + 48);
                text_range = Some(fileoff..fileoff + filesize);
            }
        }
        if cmd == 0x8000_0028 {
            entryoff = Some(u64_at(&image, off + 8));
        }
        off += cmdsize;
    }
    let entryoff = entryoff.expect("LC_MAIN present");
    assert!(text_range.expect("__TEXT present").contains(&entryoff));
}

#[test]
fn test_macho_has_code_signature() {
    let image = image("exit(0)", Target::new(Arch::Arm64, Os::Darwin));
    // CSMAGIC_EMBEDDED_SIGNATURE, big-endian, somewhere near the end.
    let magic = 0xFADE_0CC0u32.to_be_bytes();
    assert!(image.windows(4).any(|w| w == magic));
}

// ===== PE =====

#[test]
fn test_pe_signature_chain() {
    let image = image("println(42)", Target::new(Arch::X86_64, Os::Windows));
    assert_eq!(&image[..2], b"MZ");
    let e_lfanew = u32_at(&image, 0x3C) as usize;
    assert_eq!(&image[e_lfanew..e_lfanew + 4], b"PE\0\0");
    assert_eq!(u16_at(&image, e_lfanew + 4), 0x8664);
    // PE32+ magic.
    assert_eq!(u16_at(&image, e_lfanew + 24), 0x20B);
    // Image base.
    assert_eq!(u64_at(&image, e_lfanew + 24 + 24), 0x1_4000_0000);
    // msvcrt.dll appears in the import directory.
    let needle = b"msvcrt.dll";
    assert!(image.windows(needle.len()).any(|w| w == needle));
    // The printf hint/name entry exists.
    let needle = b"printf";
    assert!(image.windows(needle.len()).any(|w| w == needle));
}

#[test]
fn test_pe_entry_rva_in_text() {
    let image = image("exit(0)", Target::new(Arch::X86_64, Os::Windows));
    let e_lfanew = u32_at(&image, 0x3C) as usize;
    let entry = u32_at(&image, e_lfanew + 24 + 16);
    assert_eq!(entry, 0x1000);
}

// ===== end-to-end scenario artifacts =====

#[test]
fn test_scenarios_build_for_all_supported_targets() {
    let programs = [
        "exit(0)",
        "println(\"hello\")",
        "x := 10 / 0\ny := x or! 42\nprintln(y)",
        "f = n -> { n <= 1 => 1 ~> n * f(n - 1) }\nprintln(f(5))",
        "ns := [1, 2, 3]\nsq := ns || (x -> x * x)\nprintln(sq[2])",
    ];
    let targets = [
        Target::new(Arch::X86_64, Os::Linux),
        Target::new(Arch::Arm64, Os::Linux),
        Target::new(Arch::Riscv64, Os::Linux),
        Target::new(Arch::Arm64, Os::Darwin),
        Target::new(Arch::X86_64, Os::Windows),
    ];
    for program in programs {
        for target in targets {
            let image = image(program, target);
            assert!(!image.is_empty(), "{} for {}", program, target);
        }
    }
}

#[test]
fn test_written_file_round_trips() {
    let image = image("exit(0)", Target::new(Arch::X86_64, Os::Linux));
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();
    let read_back = std::fs::read(file.path()).unwrap();
    assert_eq!(read_back, image);
}
