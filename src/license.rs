//! ClearKey license messages.
//!
//! Request and response follow the W3C EME ClearKey JSON format:
//!
//! ```text
//! request:  {"kids":["nrQFDeRLSAKTLifXUIPiZg"],"type":"temporary"}
//! response: {"keys":[{"k":"FmY0xnWCPCNaSpRG-tUuTQ","kid":"nrQFDeRLSAKTLifXUIPiZg","kty":"oct"}]}
//! error:    {"Message":"..."}
//! ```
use serde::de::{Deserializer, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::kid::KeyId;
use crate::registry::KeyRegistry;
use crate::utils::jwk_to_standard_b64;

/// Session type sent with every request.
pub const LICENSE_TYPE_TEMPORARY: &str = "temporary";

/// License request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseRequest {
    /// Unpadded standard Base64 kids.
    pub kids: Vec<String>,
    #[serde(rename = "type")]
    pub license_type: String,
}

impl LicenseRequest {
    /// Build a single-kid temporary license request.
    pub fn new(kid: &KeyId) -> Self {
        Self {
            kids: vec![kid.to_base64_unpadded()],
            license_type: LICENSE_TYPE_TEMPORARY.to_string(),
        }
    }

    /// Serialize to the compact JSON body sent to the license server.
    #[must_use]
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

/// Build the JSON license request for `kid`.
#[must_use]
pub fn create_license_request(kid: &KeyId) -> Vec<u8> {
    LicenseRequest::new(kid).to_json()
}

/// One fully formed entry of a license response, values as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonWebKey {
    /// URL-safe Base64 key, possibly unpadded.
    pub k: String,
    /// URL-safe Base64 kid, possibly unpadded.
    pub kid: String,
    /// Informational key type, usually `oct`.
    pub kty: Option<String>,
}

/// A decoded license response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseResponse {
    /// Usable key entries in document order. May be empty.
    Keys(Vec<JsonWebKey>),
    /// Server reported an error through `Message`.
    Error { message: String },
}

/// Accepts any JSON value, keeping the typed form when it matches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Valid(T),
    Invalid(IgnoredAny),
}

impl<T> Lenient<T> {
    fn valid(self) -> Option<T> {
        match self {
            Lenient::Valid(v) => Some(v),
            Lenient::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(rename = "Message", default)]
    message: Option<Lenient<String>>,
    #[serde(default, deserialize_with = "present")]
    keys: Option<Lenient<Vec<Value>>>,
}

#[derive(Debug, Deserialize)]
struct KeyEntry {
    #[serde(default)]
    k: Option<Lenient<String>>,
    #[serde(default)]
    kid: Option<Lenient<String>>,
    #[serde(default)]
    kty: Option<Lenient<String>>,
}

/// A field that exists counts as present even when it is `null`.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

fn non_empty(field: Option<Lenient<String>>) -> Option<String> {
    field.and_then(Lenient::valid).filter(|s| !s.is_empty())
}

impl LicenseResponse {
    /// Decode and classify a license response body.
    ///
    /// A string `Message` wins over `keys`. Entries that are not objects or
    /// lack a non-empty string `k`/`kid` are dropped.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(data).map_err(|_| Error::MalformedResponse)?;
        if !value.is_object() {
            return Err(Error::MalformedResponse);
        }
        let body = ResponseBody::deserialize(&value).map_err(|_| Error::MalformedResponse)?;

        if let Some(message) = body.message.and_then(Lenient::valid) {
            return Ok(LicenseResponse::Error { message });
        }

        let keys = body.keys.ok_or(Error::NoKeysInResponse)?;
        let entries = keys
            .valid()
            .unwrap_or_default()
            .iter()
            .filter(|entry| entry.is_object())
            .filter_map(|entry| KeyEntry::deserialize(entry).ok())
            .filter_map(|entry| {
                Some(JsonWebKey {
                    k: non_empty(entry.k)?,
                    kid: non_empty(entry.kid)?,
                    kty: entry.kty.and_then(Lenient::valid),
                })
            })
            .collect();

        Ok(LicenseResponse::Keys(entries))
    }
}

/// Parse a license response into a key registry.
///
/// Only the first usable entry is taken, a response is expected to answer a
/// single kid. Kid and key are stored as padded standard Base64. A response
/// without usable entries yields an empty registry.
pub fn parse_license_response(data: &[u8]) -> Result<KeyRegistry> {
    let keys = match LicenseResponse::from_slice(data)? {
        LicenseResponse::Error { message } => return Err(Error::ServerError(message)),
        LicenseResponse::Keys(keys) => keys,
    };

    let mut registry = KeyRegistry::new();
    if let Some(jwk) = keys.first() {
        trace!("Accepted license key entry kid={}", jwk.kid);
        registry.add_key(jwk_to_standard_b64(&jwk.kid), jwk_to_standard_b64(&jwk.k));
    }
    Ok(registry)
}
