//! Miscellaneous helper utilities.
use std::path::Path;

use base64::Engine;

/// Standard alphabet Base64 encoding with padding.
#[must_use]
pub fn b64_encode(data: impl AsRef<[u8]>) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Standard alphabet Base64 decoding, padding required.
pub fn b64_decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(data)
}

/// Right-pad a Base64 string with `=` until its length is a multiple of 4.
///
/// Strings that are already aligned are returned unchanged.
#[must_use]
pub fn pad_b64(data: &str) -> String {
    let mut padded = data.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    padded
}

/// Turn a JWK style Base64 value into the padded standard form used as
/// registry key. Only `-` is rewritten; `_` passes through untouched.
#[must_use]
pub fn jwk_to_standard_b64(data: &str) -> String {
    pad_b64(&data.replace('-', "+"))
}

/// Ensure a file path's parent directory exists.
pub fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Write a debug artifact, overwriting any previous file.
///
/// Failures are logged and swallowed.
pub fn save_debug_file(path: &Path, contents: &[u8]) {
    let result = ensure_parent_dir(path).and_then(|()| std::fs::write(path, contents));
    match result {
        Ok(()) => debug!("Saved debug file {}", path.display()),
        Err(e) => warn!("Could not save debug file {}: {}", path.display(), e),
    }
}
