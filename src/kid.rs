//! Key identifiers.
//!
//! A kid is 16 opaque bytes. It shows up as raw bytes in init data, as hex in
//! provisioned key maps, as a UUID in manifests and as Base64 in license
//! messages.
use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::utils::{b64_decode, b64_encode, pad_b64};

/// 16-byte content key identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId([u8; 16]);

impl KeyId {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build from a byte slice, which must be exactly 16 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKeyId(format!("expected 16 bytes, got {}", bytes.len())))?;
        Ok(Self(bytes))
    }

    /// Parse a hex string. Hyphens are stripped first, so UUID formatted
    /// ids are accepted as well.
    pub fn from_hex(s: &str) -> Result<Self> {
        let cleaned = s.trim().replace('-', "");
        let bytes = hex::decode(&cleaned)?;
        Self::from_slice(&bytes)
    }

    /// Parse a Base64 string, with or without padding. URL-safe `-` is
    /// accepted in place of `+`.
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = b64_decode(&pad_b64(&s.trim().replace('-', "+").replace('_', "/")))?;
        Self::from_slice(&bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Lowercase hex, as used for provisioned key maps.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Padded standard Base64, the form license registries are keyed by.
    #[must_use]
    pub fn to_base64(&self) -> String {
        b64_encode(self.0)
    }

    /// Standard Base64 with the trailing `=` removed, as sent in `kids`.
    #[must_use]
    pub fn to_base64_unpadded(&self) -> String {
        self.to_base64().trim_end_matches('=').to_string()
    }

    /// Same bytes as a UUID, the form manifests use for `default_KID`.
    pub fn to_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.0)
    }
}

impl From<[u8; 16]> for KeyId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl From<Uuid> for KeyId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.into_bytes())
    }
}

impl AsRef<[u8]> for KeyId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Accepts 32 hex digits (optionally hyphenated like a UUID) or Base64.
impl FromStr for KeyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(uuid) = Uuid::parse_str(s) {
            return Ok(uuid.into());
        }
        if s.len() == 32 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Self::from_hex(s);
        }
        Self::from_base64(s).map_err(|_| Error::InvalidKeyId(s.to_string()))
    }
}
