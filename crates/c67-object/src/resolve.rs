//! Compile-time dynamic-library path resolution.
//!
//! `import foo` becomes a concrete on-disk name per OS. The logical name
//! `"c"` stands for the platform C runtime.

use c67_codegen::Os;
use std::path::Path;

/// Linux: `libfoo.so` (or a versioned sibling) under the usual directories.
const LINUX_DIRS: &[&str] = &[
    "/lib",
    "/lib64",
    "/usr/lib",
    "/usr/lib64",
    "/usr/local/lib",
    "/usr/lib/x86_64-linux-gnu",
];

/// macOS: Homebrew and /usr/local first, then the frameworks pattern;
/// libSystem backs the standard functions.
const DARWIN_DIRS: &[&str] = &["/opt/homebrew/lib", "/usr/local/lib", "/usr/lib"];

pub fn resolve_library(name: &str, os: Os) -> String {
    match os {
        Os::Linux => {
            if name == "c" {
                return "libc.so.6".to_string();
            }
            let bare = format!("lib{}.so", name);
            for dir in LINUX_DIRS {
                let candidate = format!("{}/{}", dir, bare);
                if Path::new(&candidate).exists() {
                    return bare;
                }
                // Versioned sonames are common for distribution packages.
                for version in 0..10 {
                    let versioned = format!("{}/{}.{}", dir, bare, version);
                    if Path::new(&versioned).exists() {
                        return format!("{}.{}", bare, version);
                    }
                }
            }
            // DT_NEEDED takes a soname; the loader re-runs the search.
            bare
        }
        Os::Darwin => {
            if name == "c" || name == "System" {
                return "/usr/lib/libSystem.B.dylib".to_string();
            }
            for dir in DARWIN_DIRS {
                let candidate = format!("{}/lib{}.dylib", dir, name);
                if Path::new(&candidate).exists() {
                    return candidate;
                }
            }
            let framework = format!(
                "/Library/Frameworks/{0}.framework/Versions/A/{0}",
                name
            );
            if Path::new(&framework).exists() {
                return framework;
            }
            // Fall back to libSystem for standard functions.
            "/usr/lib/libSystem.B.dylib".to_string()
        }
        Os::Windows => {
            if name == "c" {
                return "msvcrt.dll".to_string();
            }
            format!("{}.dll", name)
        }
    }
}
