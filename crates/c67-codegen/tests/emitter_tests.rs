//! Emitter-level behavior: mutability rules, loop scoping, defer ordering,
//! tail-call shape, lambda materialization.

use c67_codegen::emitter::{compile, Artifact, EmitOptions};
use c67_codegen::error::EmitError;
use c67_codegen::target::{Arch, Os, Target};
use c67_parser::Parser;
use rustc_hash::FxHashMap;

fn build(source: &str, target: Target) -> Result<Artifact, EmitError> {
    let program = Parser::new(source).unwrap().parse().unwrap();
    compile(&program, target, &FxHashMap::default(), EmitOptions::default())
}

fn linux_x64() -> Target {
    Target::new(Arch::X86_64, Os::Linux)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ===== mutability rules =====

#[test]
fn test_declare_after_assign_is_rejected() {
    let err = build("a = 1\na := 2", linux_x64()).unwrap_err();
    assert!(matches!(err, EmitError::Redefinition { .. }), "{:?}", err);
}

#[test]
fn test_declare_twice_is_rejected() {
    let err = build("a := 1\na := 2", linux_x64()).unwrap_err();
    assert!(matches!(err, EmitError::Redefinition { .. }));
}

#[test]
fn test_update_of_immutable_is_rejected() {
    let err = build("a = 1\na <- 2", linux_x64()).unwrap_err();
    assert!(matches!(err, EmitError::ImmutableUpdate { .. }));
}

#[test]
fn test_update_of_undefined_is_rejected() {
    let err = build("a <- 2", linux_x64()).unwrap_err();
    assert!(matches!(err, EmitError::UndefinedUpdate { .. }));
}

#[test]
fn test_legal_assignment_shapes_compile() {
    // `=` may shadow an immutable; `<-` updates a mutable; shadow is
    // explicit.
    build("a = 1\na = 2\nb := 3\nb <- 4\nshadow a = 5", linux_x64()).unwrap();
}

#[test]
fn test_undefined_identifier_is_rejected() {
    let err = build("println(nope)", linux_x64()).unwrap_err();
    assert!(matches!(err, EmitError::UndefinedIdentifier { .. }));
}

// ===== loop scoping =====

#[test]
fn test_nested_loops_compile_and_balance() {
    build(
        "@ i in 0 .. 3 {\n @ j in 0 .. 3 {\n x = i + j\n }\n }",
        linux_x64(),
    )
    .unwrap();
}

#[test]
fn test_loop_jumps_outside_loop_are_rejected() {
    assert!(build("@", linux_x64()).is_err());
    assert!(build("@@", linux_x64()).is_err());
    assert!(build("@++", linux_x64()).is_err());
}

#[test]
fn test_loop_metadata_outside_loop_is_rejected() {
    assert!(build("x = @counter", linux_x64()).is_err());
}

// ===== defer ordering =====

#[test]
fn test_defers_run_lifo() {
    // Two deferred sized writes with distinct immediates: the second defer
    // must be materialized before the first at scope exit.
    let artifact = build(
        "x := 0\ndefer write_i64($x, 41)\ndefer write_i64($x, 42)",
        linux_x64(),
    )
    .unwrap();
    let text = artifact.text.bytes();
    // mov rax, imm32 for each constant
    let first = find(text, &[0x48, 0xC7, 0xC0, 42, 0, 0, 0]).expect("42 emitted");
    let second = find(text, &[0x48, 0xC7, 0xC0, 41, 0, 0, 0]).expect("41 emitted");
    assert!(
        first < second,
        "defer bodies must flush in reverse registration order"
    );
}

#[test]
fn test_arena_defers_flush_before_outer() {
    let artifact = build(
        "x := 0\ndefer write_i64($x, 7)\narena {\n defer write_i64($x, 9)\n}\n",
        linux_x64(),
    )
    .unwrap();
    let text = artifact.text.bytes();
    let inner = find(text, &[0x48, 0xC7, 0xC0, 9, 0, 0, 0]).expect("inner defer");
    let outer = find(text, &[0x48, 0xC7, 0xC0, 7, 0, 0, 0]).expect("outer defer");
    assert!(inner < outer, "inner arena defers run before outer defers");
}

// ===== tail calls =====

#[test]
fn test_me_is_a_branch_without_link() {
    let artifact = build("f = n -> { n <= 0 => 0 ~> me(n - 1) }", linux_x64()).unwrap();
    // No call patch may target the lambda itself: the self-call reuses the
    // frame through a plain jmp.
    assert!(artifact
        .text
        .call_patches
        .iter()
        .all(|p| !p.target.starts_with("lambda_")));
    // And a backward E9 jump exists (negative rel32).
    let text = artifact.text.bytes();
    let mut found_backward_jmp = false;
    for (i, &byte) in text.iter().enumerate() {
        if byte == 0xE9 && i + 5 <= text.len() {
            let disp = i32::from_le_bytes(text[i + 1..i + 5].try_into().unwrap());
            if disp < 0 {
                found_backward_jmp = true;
            }
        }
    }
    assert!(found_backward_jmp, "me(…) must lower to a backward jump");
}

#[test]
fn test_me_arity_mismatch_is_rejected() {
    let err = build("f = n -> me(n, n)", linux_x64()).unwrap_err();
    assert!(matches!(err, EmitError::Unsupported { .. }));
}

#[test]
fn test_named_recursion_is_a_real_call() {
    let artifact = build("f = n -> { n <= 1 => 1 ~> n * f(n - 1) }", linux_x64()).unwrap();
    assert!(artifact
        .text
        .call_patches
        .iter()
        .any(|p| p.target == "lambda_0"));
}

// ===== general shape =====

#[test]
fn test_lambdas_are_materialized_after_main() {
    let artifact = build("sq = x -> x * x\ny = sq(3)", linux_x64()).unwrap();
    let entry = artifact.symbols.get("_start").unwrap();
    let lambda = artifact.symbols.get("lambda_0").unwrap();
    assert!(lambda.offset > entry.offset);
}

#[test]
fn test_runtime_helpers_emitted_once() {
    let artifact = build("a = \"x\" + \"y\"\nb = \"p\" + \"q\"", linux_x64()).unwrap();
    assert!(artifact.symbols.get("_c67_string_concat").is_some());
    let helper_calls = artifact
        .text
        .call_patches
        .iter()
        .filter(|p| p.target == "_c67_string_concat")
        .count();
    assert_eq!(helper_calls, 2);
}

#[test]
fn test_string_literals_are_interned_by_content() {
    let artifact = build("a = \"hello\"\nb = \"hello\"", linux_x64()).unwrap();
    let strings: Vec<_> = artifact
        .symbols
        .iter()
        .filter(|s| s.name.starts_with("str_"))
        .collect();
    assert_eq!(strings.len(), 1, "identical literals share one payload");
    // Map-string payload: 8-byte count plus 16 bytes per character.
    assert_eq!(strings[0].size, 8 + 5 * 16);
}

#[test]
fn test_dynamic_linking_requires_x86_64_on_linux() {
    let err = build("import sdl2", Target::new(Arch::Arm64, Os::Linux)).unwrap_err();
    assert!(matches!(err, EmitError::Unsupported { .. }));
}

#[test]
fn test_imports_collected_for_dynamic_targets() {
    let artifact = build("println(42)", Target::new(Arch::X86_64, Os::Windows)).unwrap();
    assert!(artifact.imports.iter().any(|i| i.symbol == "printf"));
    assert!(artifact.libraries.iter().any(|l| l == "c"));
}

#[test]
fn test_static_build_has_no_imports() {
    let artifact = build("println(42)", linux_x64()).unwrap();
    assert!(artifact.imports.is_empty());
}

#[test]
fn test_unsafe_block_picks_matching_arch() {
    let source = "unsafe {\n x86 {\n rax <- 60\n rdi <- 0\n syscall\n }\n arm64 {\n x8 <- 93\n syscall\n }\n }";
    let artifact = build(source, linux_x64()).unwrap();
    // mov rax, 60 from the x86 body must be present…
    assert!(find(artifact.text.bytes(), &[0x48, 0xC7, 0xC0, 60, 0, 0, 0]).is_some());
    // …and the arm64 body must not leak in as 93.
    let arm = build(source, Target::new(Arch::Arm64, Os::Linux)).unwrap();
    let movz_93 = 0xD280_0000u32 | 93 << 5 | 8;
    let words: Vec<u8> = movz_93.to_le_bytes().to_vec();
    assert!(find(arm.text.bytes(), &words).is_some());
}
