//! Session and host configuration.
//!
//! [`SessionConfig`] carries the host settings a session needs (debug dumps
//! and where to put them). [`ClearKeyConfig`] is the full set of inputs a
//! host provides, loadable from YAML or JSON.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kid::KeyId;

/// File name of the request debug dump.
pub const DEBUG_REQUEST_FILE: &str = "ClearKey.init";
/// File name of the response debug dump.
pub const DEBUG_RESPONSE_FILE: &str = "ClearKey.response";

/// Host settings read by a session during construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Save raw license request/response bodies.
    #[serde(default)]
    pub debug_license: bool,
    /// Directory receiving the debug dumps.
    #[serde(default)]
    pub library_path: PathBuf,
}

impl SessionConfig {
    pub fn new(library_path: impl Into<PathBuf>) -> Self {
        Self {
            debug_license: false,
            library_path: library_path.into(),
        }
    }

    pub fn with_debug_license(mut self, enabled: bool) -> Self {
        self.debug_license = enabled;
        self
    }

    pub fn debug_request_path(&self) -> PathBuf {
        self.library_path.join(DEBUG_REQUEST_FILE)
    }

    pub fn debug_response_path(&self) -> PathBuf {
        self.library_path.join(DEBUG_RESPONSE_FILE)
    }
}

/// Hex kid to hex key map supplied by the host.
///
/// Lookups ignore the case of the stored kids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisionedKeys(HashMap<String, String>);

impl ProvisionedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kid_hex: impl Into<String>, key_hex: impl Into<String>) {
        self.0.insert(kid_hex.into(), key_hex.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Find the hex key configured for `kid`.
    pub fn get(&self, kid: &KeyId) -> Option<&str> {
        let kid_hex = kid.to_hex();
        self.0
            .get(&kid_hex)
            .or_else(|| {
                self.0
                    .iter()
                    .find(|(k, _)| k.replace('-', "").eq_ignore_ascii_case(&kid_hex))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }
}

impl FromIterator<(String, String)> for ProvisionedKeys {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything a host supplies to open ClearKey sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearKeyConfig {
    /// License server URL, empty when keys are provisioned locally.
    #[serde(default)]
    pub license_url: String,
    /// Default kid as hex, UUID or Base64.
    #[serde(default)]
    pub default_kid: Option<String>,
    /// Provisioned hex kid to hex key map.
    #[serde(default)]
    pub keys: ProvisionedKeys,
    #[serde(flatten)]
    pub session: SessionConfig,
}

impl ClearKeyConfig {
    /// Parse a YAML document. JSON is valid YAML and is accepted too.
    #[cfg(feature = "cli")]
    pub fn from_yaml(data: &str) -> Result<Self> {
        serde_yaml::from_str(data).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Parse a JSON document.
    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Load from a file; `.json` files are read as JSON, everything else as
    /// YAML when the `cli` feature is enabled.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            return Self::from_json(&data);
        }
        #[cfg(feature = "cli")]
        {
            Self::from_yaml(&data)
        }
        #[cfg(not(feature = "cli"))]
        {
            Self::from_json(&data)
        }
    }

    /// Parsed default kid, if configured.
    pub fn default_kid(&self) -> Result<Option<KeyId>> {
        self.default_kid.as_deref().map(str::parse::<KeyId>).transpose()
    }
}
