//! Key registry filled from license responses or provisioned keys.
//!
//! Entries are stored the way the license response carries them: kid and key
//! both as padded standard Base64 strings. Lookups must use the same
//! representation, see [`KeyId::to_base64`].
use std::collections::HashMap;

use crate::error::Result;
use crate::key::{ContentKey, KeyPair};
use crate::kid::KeyId;

/// Kid to key bindings of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRegistry {
    keys: HashMap<String, String>,
}

impl KeyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a kid/key binding, replacing any previous key for that kid.
    pub fn add_key(&mut self, kid: impl Into<String>, key: impl Into<String>) {
        self.keys.insert(kid.into(), key.into());
    }

    /// Insert a raw binding in its registry representation.
    pub fn add_key_pair(&mut self, pair: &KeyPair) {
        self.add_key(
            pair.kid.to_base64(),
            crate::utils::b64_encode(pair.key.as_bytes()),
        );
    }

    /// Exact match on the stored kid string.
    pub fn lookup(&self, kid: &str) -> Option<&str> {
        self.keys.get(kid).map(String::as_str)
    }

    /// Resolve a kid to its decoded key, `Ok(None)` when it is absent.
    pub fn resolve(&self, kid: &KeyId) -> Result<Option<ContentKey>> {
        self.lookup(&kid.to_base64())
            .map(ContentKey::from_base64)
            .transpose()
    }

    /// Number of stored kids.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is stored.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Stored `(kid, key)` strings in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Decode every entry into raw key pairs, skipping entries that are not
    /// 16-byte kid/key values.
    pub fn key_pairs(&self) -> Vec<KeyPair> {
        self.iter()
            .filter_map(|(kid, key)| {
                let kid = KeyId::from_base64(kid).ok()?;
                let key = ContentKey::from_base64(key).ok()?;
                Some(KeyPair::new(kid, key))
            })
            .collect()
    }
}
