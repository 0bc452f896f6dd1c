//! Content keys and kid/key bindings.
use std::fmt;

use crate::error::{Error, Result};
use crate::kid::KeyId;
use crate::utils::{b64_decode, pad_b64};

/// Raw 16-byte AES-128 content key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ContentKey([u8; 16]);

impl ContentKey {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build from raw bytes. Anything other than 16 bytes cannot drive
    /// AES-128 and is rejected as a cipher init failure.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 16] = bytes.try_into().map_err(|_| {
            Error::CipherInitFailed(format!(
                "invalid key length: expected 16, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Decode a Base64 key, as stored in a key registry. URL-safe `-`/`_`
    /// and missing padding are accepted.
    pub fn from_base64(s: &str) -> Result<Self> {
        let standard = pad_b64(&s.trim().replace('-', "+").replace('_', "/"));
        Self::from_slice(&b64_decode(&standard)?)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        Self::from_slice(&hex::decode(s.trim())?)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// Keys never show up in debug output.
impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentKey(..)")
    }
}

/// A kid bound to the key that decrypts it.
///
/// `Display` prints `kid_hex:key_hex`, the format used by most packagers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    pub kid: KeyId,
    pub key: ContentKey,
}

impl KeyPair {
    pub fn new(kid: KeyId, key: ContentKey) -> Self {
        Self { kid, key }
    }
}

impl fmt::Display for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kid.to_hex(), self.key.to_hex())
    }
}
