//! Executable container writers for the C67 compiler.
//!
//! Each writer is a function from a linked-up emitter state to a byte blob:
//! it computes the segment plan for its format, hands the virtual addresses
//! to the relocation engine, then serializes headers and payloads around
//! the patched text. Content decisions all happened during emission; only
//! layout and serialization live here.

pub mod elf;
pub mod elf_dynamic;
pub mod error;
mod layout;
pub mod macho;
pub mod pe;
pub mod resolve;

pub use error::ObjectError;
pub use resolve::resolve_library;

use c67_codegen::{Arch, Artifact, LinkStrategy, Os};
use log::debug;

/// Serialize `artifact` into a complete executable image for its target.
pub fn write_executable(artifact: &mut Artifact) -> Result<Vec<u8>, ObjectError> {
    let target = artifact.target;
    debug!("writing container for {}", target);
    match (target.os, target.arch, artifact.strategy) {
        (Os::Linux, _, LinkStrategy::Static) => elf::write(artifact),
        (Os::Linux, Arch::X86_64, LinkStrategy::Dynamic) => elf_dynamic::write(artifact),
        (Os::Darwin, Arch::Arm64, _) => macho::write(artifact),
        (Os::Windows, Arch::X86_64, _) => pe::write(artifact),
        _ => Err(ObjectError::NoContainer(target)),
    }
}
