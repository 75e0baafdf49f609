//! Error types for emission and linking.

use thiserror::Error;

/// Errors raised while translating the AST to machine bytes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmitError {
    #[error("{line}:{column}: undefined identifier '{name}'")]
    UndefinedIdentifier { name: String, line: u32, column: u32 },

    #[error("{line}:{column}: '{name}' already exists; ':=' cannot redefine it")]
    Redefinition { name: String, line: u32, column: u32 },

    #[error("{line}:{column}: '{name}' is immutable; '<-' cannot update it")]
    ImmutableUpdate { name: String, line: u32, column: u32 },

    #[error("{line}:{column}: '{name}' is undefined; '<-' cannot update it")]
    UndefinedUpdate { name: String, line: u32, column: u32 },

    #[error("{line}:{column}: {message}")]
    Unsupported {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("stack frame of '{name}' exceeds the target's immediate range")]
    FrameTooLarge { name: String },

    #[error("label '{0}' defined twice")]
    DuplicateLabel(String),

    #[error("forward branch at {at:#x} lands out of range")]
    BranchOutOfRange { at: usize },

    #[error("target {0:?} is not supported")]
    UnsupportedTarget(crate::target::Target),
}

/// Errors raised while resolving patch records against final addresses.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    #[error("unresolved call target '{0}'")]
    UnresolvedCall(String),

    #[error("unresolved symbol '{0}' in pc-relative fixup")]
    UnresolvedSymbol(String),

    #[error("displacement to '{symbol}' out of range ({distance:#x})")]
    DisplacementOverflow { symbol: String, distance: i64 },

    #[error("page delta to '{symbol}' exceeds the adrp immediate range")]
    PageRangeExceeded { symbol: String },

    #[error("placeholder bytes remain in text at offset {0:#x}")]
    PlaceholderRemains(usize),
}
