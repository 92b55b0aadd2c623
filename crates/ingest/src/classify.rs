//! Binary detection and permissive decoding.
//!
//! Detection is a heuristic: a null byte in the first [`PROBE_LEN`] bytes
//! marks a file as binary. Anything past the probe is never inspected.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Number of leading bytes inspected per file.
pub const PROBE_LEN: usize = 1024;

/// Outcome of probing a single file.
#[derive(Debug)]
pub enum FileKind {
    Text,
    Binary,
    Unreadable(io::Error),
}

/// Pure check over an already-read prefix.
pub fn looks_binary(prefix: &[u8]) -> bool {
    prefix.contains(&0)
}

/// Probe the head of `path`.
pub fn classify(path: &Path) -> FileKind {
    match read_prefix(path) {
        Ok(prefix) if looks_binary(&prefix) => FileKind::Binary,
        Ok(_) => FileKind::Text,
        Err(e) => FileKind::Unreadable(e),
    }
}

/// True for binary files and for files that cannot be opened or read.
pub fn is_binary(path: &Path) -> bool {
    !matches!(classify(path), FileKind::Text)
}

/// Decode bytes as UTF-8, replacing invalid sequences with U+FFFD.
pub fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn read_prefix(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut prefix = Vec::with_capacity(PROBE_LEN);
    file.take(PROBE_LEN as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}
