//! Binary/text classification of a file's first block.
//!
//! Follows the classic `-T`/`-B` file test: an empty file is both text and
//! binary, a NUL byte means binary, otherwise the block is binary when more
//! than a third of it looks like non-text.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of bytes inspected at the start of a file.
pub const BLOCK_SIZE: usize = 512;

/// Outcome of sniffing a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sniff {
    /// Zero bytes: counts as both text and binary.
    Empty,
    Text,
    Binary,
}

impl Sniff {
    pub fn is_text(self) -> bool {
        matches!(self, Sniff::Empty | Sniff::Text)
    }

    pub fn is_binary(self) -> bool {
        matches!(self, Sniff::Empty | Sniff::Binary)
    }
}

/// Classify a block of bytes.
pub fn classify(block: &[u8]) -> Sniff {
    if block.is_empty() {
        return Sniff::Empty;
    }

    if block.contains(&0) {
        return Sniff::Binary;
    }

    if looks_like_utf8(block) {
        return Sniff::Text;
    }

    let odd = block.iter().filter(|&&b| is_odd_byte(b)).count();
    if odd * 3 > block.len() {
        Sniff::Binary
    } else {
        Sniff::Text
    }
}

/// Read the first block of `path` and classify it.
pub fn sniff_file(path: &Path) -> std::io::Result<Sniff> {
    let file = File::open(path)?;
    let mut block = Vec::with_capacity(BLOCK_SIZE);
    file.take(BLOCK_SIZE as u64).read_to_end(&mut block)?;
    Ok(classify(&block))
}

/// Valid UTF-8, tolerating a multi-byte sequence cut off by the block end.
fn looks_like_utf8(block: &[u8]) -> bool {
    match std::str::from_utf8(block) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none() && block.len() - e.valid_up_to() < 4,
    }
}

fn is_odd_byte(b: u8) -> bool {
    match b {
        b'\t' | b'\n' | b'\r' | 0x08 | 0x0c | 0x1b => false,
        0x00..=0x1f | 0x7f => true,
        0x80..=0xff => true,
        _ => false,
    }
}
