//! The growing text buffer and its patch records.
//!
//! The buffer is append-only; bytes already written are only modified
//! through the explicit patch operations, which serve placeholder-then-patch
//! branch emission and the final relocation pass.

use crate::reloc::{CallPatch, PcRelocation};

/// Machine-code buffer plus the patch tables that grow alongside it. One
/// `CodeBuf` backs the text section; rodata and data are plain byte vectors.
#[derive(Debug, Default)]
pub struct CodeBuf {
    bytes: Vec<u8>,
    pub pc_relocs: Vec<PcRelocation>,
    pub call_patches: Vec<CallPatch>,
}

impl CodeBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    // ===== Append =====

    pub fn emit_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn emit_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    // ===== Patch-in-place =====

    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_le_bytes(self.bytes[offset..offset + 4].try_into().unwrap())
    }

    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        self.patch_u32(offset, value as u32);
    }
}

/// Append-only payload buffer for rodata / writable data.
#[derive(Debug, Default)]
pub struct DataBuf {
    bytes: Vec<u8>,
}

impl DataBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Append raw bytes, returning the payload's start offset.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(bytes);
        offset
    }

    /// Append `len` zero bytes, returning the start offset.
    pub fn reserve_zeroed(&mut self, len: usize) -> usize {
        let offset = self.bytes.len();
        self.bytes.resize(offset + len, 0);
        offset
    }

    /// Pad with zeros to the given alignment.
    pub fn align_to(&mut self, align: usize) {
        while self.bytes.len() % align != 0 {
            self.bytes.push(0);
        }
    }
}
