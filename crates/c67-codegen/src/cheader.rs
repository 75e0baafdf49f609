//! C-header constant maps supplied by the driver.
//!
//! Imported headers are summarized out-of-band into integer constants and
//! function signatures; the emitter uses signatures to pick register classes
//! and conversions at each FFI call site.

use rustc_hash::FxHashMap;
use serde::Deserialize;

/// Parameter / return classes a C signature may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CType {
    Void,
    Int,
    Long,
    Float,
    Double,
    Bool,
    Pointer,
    /// `char *` fed from a C67 string value (converted to NUL-terminated
    /// bytes at the call site).
    String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CSignature {
    pub ret: CType,
    #[serde(default)]
    pub params: Vec<CType>,
}

/// One namespace's worth of header knowledge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CHeaderConstants {
    #[serde(default)]
    pub constants: FxHashMap<String, i64>,
    #[serde(default)]
    pub functions: FxHashMap<String, CSignature>,
}

/// All namespaces visible to one compile.
pub type CHeaderMap = FxHashMap<String, CHeaderConstants>;
