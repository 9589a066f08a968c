//! Hashing - SHA-256 digests of rendered documents
//!
//! A digest travels with every saved artifact so a receipt or contract on
//! disk can be checked against what the service reported.

use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Digest a stored artifact
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let data = std::fs::read(path)?;
    Ok(sha256_hex(&data))
}

/// True when the file on disk still hashes to `expected` (hex, any case)
pub fn verify_file(path: &Path, expected: &str) -> io::Result<bool> {
    Ok(sha256_file(path)?.eq_ignore_ascii_case(expected.trim()))
}

/// Leading 12 hex chars, enough to tell artifacts apart in logs
pub fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}
