// src/hash.rs

//! Content digests for distribution comparison
//!
//! Files are compared by SHA-256 digest only. Two flavours exist:
//! - **raw**: digest of the exact bytes
//! - **normalized**: for text resources, digest of the content with line
//!   endings unified and trailing whitespace stripped, so that rebuild noise
//!   does not show up as a modification under detailed inspection

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Extensions treated as text resources by [`normalized_digest`]
pub const TEXT_EXTENSIONS: &[&str] = &["xml", "properties", "txt", "conf", "sh", "bat", "ps1"];

/// Compute SHA-256 of a byte slice as lowercase hex
#[inline]
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA-256 of everything a reader yields
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute SHA-256 of a file on disk
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    sha256_reader(&mut file)
}

/// Whether a path looks like a text resource
pub fn is_text_resource(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| TEXT_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Digest a file, normalising text resources
///
/// Non-text files, and text files that are not valid UTF-8, fall back to the
/// raw digest.
pub fn normalized_digest(path: &Path) -> io::Result<String> {
    if !is_text_resource(path) {
        return sha256_file(path);
    }

    let bytes = std::fs::read(path)?;
    match std::str::from_utf8(&bytes) {
        Ok(text) => Ok(sha256(normalize_text(text).as_bytes())),
        Err(_) => Ok(sha256(&bytes)),
    }
}

/// Unify line endings and strip trailing whitespace and trailing blank lines
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    while out.ends_with("\n\n") {
        out.pop();
    }
    out
}

/// Combine an ordered list of (name, digest) pairs into a single digest
pub fn combine<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut hasher = Sha256::new();
    for (name, digest) in entries {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(digest.as_bytes());
        hasher.update([b'\n']);
    }
    hex::encode(hasher.finalize())
}
