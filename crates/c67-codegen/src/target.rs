//! Compilation target descriptors.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X86_64,
    Arm64,
    Riscv64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    Darwin,
    Windows,
}

/// (architecture, operating system) pair selecting an emitter backend and a
/// container writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub arch: Arch,
    pub os: Os,
}

impl Target {
    pub const fn new(arch: Arch, os: Os) -> Self {
        Self { arch, os }
    }

    /// Parse `<arch>-<os>` strings such as `x86_64-linux` or `arm64-darwin`.
    pub fn parse(s: &str) -> Option<Target> {
        let (arch, os) = s.split_once('-')?;
        let arch = match arch {
            "x86_64" | "x86-64" | "amd64" => Arch::X86_64,
            "arm64" | "aarch64" => Arch::Arm64,
            "riscv64" | "riscv" => Arch::Riscv64,
            _ => return None,
        };
        let os = match os {
            "linux" => Os::Linux,
            "darwin" | "macos" => Os::Darwin,
            "windows" | "win" => Os::Windows,
            _ => return None,
        };
        Some(Target { arch, os })
    }

    /// Supported (arch, os) combinations. Mach-O output is arm64-only and
    /// PE output is x86-64-only; ELF covers all three architectures.
    pub fn is_supported(&self) -> bool {
        match self.os {
            Os::Linux => true,
            Os::Darwin => self.arch == Arch::Arm64,
            Os::Windows => self.arch == Arch::X86_64,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arch = match self.arch {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
            Arch::Riscv64 => "riscv64",
        };
        let os = match self.os {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Windows => "windows",
        };
        write!(f, "{}-{}", arch, os)
    }
}

/// How the output binary reaches functions outside itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    /// Freestanding: I/O and allocation through raw syscalls.
    Static,
    /// Imports resolved through PLT / Mach-O stubs / the PE IAT.
    Dynamic,
}
