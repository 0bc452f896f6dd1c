//! ClearKey decryption session.
//!
//! A session is built for one default kid, either by fetching its key from a
//! license server or from keys the host provisioned. Construction always
//! yields a session: it is ready when a cipher could be set up and failed
//! otherwise, with the reason kept for inspection. A failed session refuses
//! every decrypt call.
use std::io::Read;

use crate::config::{ProvisionedKeys, SessionConfig};
use crate::decrypter::{Aes128CtrCipher, SampleCipher, IV_SIZE};
use crate::error::{Error, Result};
use crate::key::{ContentKey, KeyPair};
use crate::kid::KeyId;
use crate::license::{create_license_request, parse_license_response};
use crate::registry::KeyRegistry;
use crate::transport::{HttpRequest, LicenseTransport};
use crate::utils::save_debug_file;

/// Session lifecycle state.
#[derive(Debug)]
pub enum SessionState {
    /// Cipher is set up, samples can be decrypted.
    Ready,
    /// Construction failed for the given reason.
    Failed(Error),
}

/// A ClearKey CENC decryption session.
pub struct Session {
    key_ids: Vec<KeyId>,
    registry: KeyRegistry,
    decrypter: Option<Box<dyn SampleCipher>>,
    state: SessionState,
}

impl Session {
    fn failed(error: Error) -> Self {
        Self {
            key_ids: Vec::new(),
            registry: KeyRegistry::new(),
            decrypter: None,
            state: SessionState::Failed(error),
        }
    }

    fn ready(default_kid: KeyId, registry: KeyRegistry, cipher: impl SampleCipher + 'static) -> Self {
        let mut session = Self {
            key_ids: Vec::new(),
            registry,
            decrypter: Some(Box::new(cipher)),
            state: SessionState::Ready,
        };
        session.add_session_key(default_kid);
        session
    }

    fn settle(result: Result<Self>) -> Self {
        result.unwrap_or_else(|e| {
            error!("ClearKey session construction failed: {}", e);
            Self::failed(e)
        })
    }

    /// Open a session by requesting the key for `default_kid` from a
    /// ClearKey license server.
    ///
    /// The call blocks for the whole license round trip. Failures are logged
    /// and leave the session in [`SessionState::Failed`].
    pub fn from_license_server<T: LicenseTransport>(
        license_url: &str,
        default_kid: KeyId,
        config: &SessionConfig,
        transport: &T,
    ) -> Self {
        Self::settle(Self::try_from_license_server(
            license_url,
            default_kid,
            config,
            transport,
        ))
    }

    /// Like [`Session::from_license_server`], returning the failure instead
    /// of a failed session.
    pub fn try_from_license_server<T: LicenseTransport>(
        license_url: &str,
        default_kid: KeyId,
        config: &SessionConfig,
        transport: &T,
    ) -> Result<Self> {
        if license_url.is_empty() {
            return Err(Error::MissingLicenseUrl);
        }

        let post_data = create_license_request(&default_kid);
        if config.debug_license {
            save_debug_file(&config.debug_request_path(), &post_data);
        }

        let request = HttpRequest::clearkey_license(license_url, post_data);
        debug!("Requesting ClearKey license for kid {} from {}", default_kid, license_url);
        let mut response = transport.open(&request);
        if response.is_error() {
            return Err(Error::LicenseServerHttpError(response.status));
        }

        let mut body = Vec::new();
        response
            .body
            .read_to_end(&mut body)
            .map_err(|_| Error::IncompleteResponse)?;

        if config.debug_license {
            save_debug_file(&config.debug_response_path(), &body);
        }

        let registry = parse_license_response(&body)?;
        let key = registry
            .lookup(&default_kid.to_base64())
            .ok_or(Error::KeyNotFoundInResponse)?;
        let key = ContentKey::from_base64(key)
            .map_err(|e| Error::CipherInitFailed(format!("license key is unusable: {}", e)))?;

        info!("Obtained ClearKey license for kid {}", default_kid);
        Ok(Self::ready(default_kid, registry, Aes128CtrCipher::new(&key)))
    }

    /// Open a session from locally provided keys.
    ///
    /// With an empty `keys` map, `init_data` is the raw key (the key came
    /// embedded in the manifest). Otherwise the key configured for the hex
    /// `default_kid` is used, and a missing entry fails the session.
    pub fn from_provisioned_keys(init_data: &[u8], default_kid: KeyId, keys: &ProvisionedKeys) -> Self {
        Self::settle(Self::try_from_provisioned_keys(init_data, default_kid, keys))
    }

    /// Like [`Session::from_provisioned_keys`], returning the failure
    /// instead of a failed session.
    pub fn try_from_provisioned_keys(
        init_data: &[u8],
        default_kid: KeyId,
        keys: &ProvisionedKeys,
    ) -> Result<Self> {
        let key = if keys.is_empty() {
            ContentKey::from_slice(init_data)?
        } else {
            let key_hex = keys
                .get(&default_kid)
                .ok_or_else(|| Error::MissingConfiguredKey(default_kid.to_hex()))?;
            let bytes = hex::decode(key_hex.trim()).map_err(|e| Error::InvalidConfiguredKey {
                kid: default_kid.to_hex(),
                reason: e.to_string(),
            })?;
            ContentKey::from_slice(&bytes)?
        };

        let mut registry = KeyRegistry::new();
        registry.add_key_pair(&KeyPair::new(default_kid, key));
        debug!("Loaded provisioned key for kid {}", default_kid);
        Ok(Self::ready(default_kid, registry, Aes128CtrCipher::new(&key)))
    }

    /// Associate a kid with this session. Already known kids are ignored.
    pub fn add_session_key(&mut self, kid: KeyId) {
        if !self.key_ids.contains(&kid) {
            self.key_ids.push(kid);
        }
    }

    /// Whether `kid` is associated with this session.
    pub fn has_key_id(&self, kid: &KeyId) -> bool {
        self.key_ids.contains(kid)
    }

    /// Raw-byte variant of [`Session::has_key_id`]; an empty slice never
    /// matches.
    pub fn has_key_id_bytes(&self, kid: &[u8]) -> bool {
        if kid.is_empty() {
            return false;
        }
        KeyId::from_slice(kid).is_ok_and(|kid| self.has_key_id(&kid))
    }

    /// Associated kids in insertion order.
    pub fn key_ids(&self) -> &[KeyId] {
        &self.key_ids
    }

    /// Keys obtained while constructing the session.
    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether samples can be decrypted.
    pub fn is_ready(&self) -> bool {
        self.decrypter.is_some()
    }

    /// Reason the session failed, if it did.
    pub fn failure(&self) -> Option<&Error> {
        match &self.state {
            SessionState::Failed(e) => Some(e),
            SessionState::Ready => None,
        }
    }

    /// Decrypt one sample.
    ///
    /// `pool_id` identifies the caller's buffer pool and is only used for
    /// diagnostics. The subsample tables are handed to the cipher as is.
    #[allow(clippy::too_many_arguments)]
    pub fn decrypt_sample_data(
        &self,
        pool_id: u32,
        data_in: &[u8],
        data_out: &mut Vec<u8>,
        iv: &[u8; IV_SIZE],
        subsample_count: usize,
        bytes_of_cleartext_data: &[u16],
        bytes_of_encrypted_data: &[u32],
    ) -> Result<()> {
        let decrypter = self
            .decrypter
            .as_ref()
            .ok_or(Error::DecryptorNotInitialized)?;

        trace!(
            "Decrypting sample of {} bytes ({} subsamples, pool {})",
            data_in.len(),
            subsample_count,
            pool_id
        );
        decrypter.decrypt_sample_data(
            data_in,
            data_out,
            iv,
            subsample_count,
            bytes_of_cleartext_data,
            bytes_of_encrypted_data,
        )
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("key_ids", &self.key_ids)
            .field("keys", &self.registry.len())
            .field("state", &self.state)
            .finish()
    }
}
