//! ClearKey CDM host.
//!
//! Owns the open decryption sessions, one per default key id, and hands out
//! the session able to decrypt a given kid.
use std::collections::HashMap;

use crate::config::{ClearKeyConfig, ProvisionedKeys, SessionConfig};
use crate::error::{Error, Result};
use crate::kid::KeyId;
use crate::session::Session;
use crate::transport::LicenseTransport;

/// ClearKey system id.
pub const CLEARKEY_SYSTEM_ID: uuid::Uuid = uuid::Uuid::from_u128(0xe2719d58a985b3c9781ab030af78d30e);
/// ClearKey system URN.
pub const CLEARKEY_URN: &str = "urn:uuid:e2719d58-a985-b3c9-781a-b030af78d30e";

/// ClearKey Content Decryption Module.
#[derive(Debug)]
pub struct ClearKeyCdm<T> {
    license_url: String,
    keys: ProvisionedKeys,
    config: SessionConfig,
    transport: T,
    sessions: HashMap<KeyId, Session>,
}

impl<T: LicenseTransport> ClearKeyCdm<T> {
    /// Maximum number of concurrently opened sessions.
    pub const MAX_NUM_OF_SESSIONS: usize = 16;

    /// Create a CDM. An empty `license_url` together with provisioned keys
    /// (or init data carrying the key) selects local provisioning.
    pub fn new(
        license_url: impl Into<String>,
        keys: ProvisionedKeys,
        config: SessionConfig,
        transport: T,
    ) -> Self {
        Self {
            license_url: license_url.into(),
            keys,
            config,
            transport,
            sessions: HashMap::new(),
        }
    }

    /// Create a CDM from a loaded host configuration.
    pub fn from_config(config: ClearKeyConfig, transport: T) -> Self {
        Self::new(config.license_url, config.keys, config.session, transport)
    }

    fn uses_license_server(&self) -> bool {
        !self.license_url.is_empty()
    }

    /// Open (or reuse) the session for `default_kid`.
    ///
    /// With a license URL configured the key is fetched from the server,
    /// otherwise it comes from the provisioned keys or `init_data`. A session
    /// that fails to construct is not kept and its failure is returned.
    pub fn open(&mut self, init_data: &[u8], default_kid: KeyId) -> Result<&Session> {
        if self.sessions.contains_key(&default_kid) {
            return self.get(&default_kid);
        }
        if self.sessions.len() >= Self::MAX_NUM_OF_SESSIONS {
            return Err(Error::TooManySessions {
                max: Self::MAX_NUM_OF_SESSIONS,
            });
        }

        let result = if self.uses_license_server() {
            Session::try_from_license_server(&self.license_url, default_kid, &self.config, &self.transport)
        } else {
            Session::try_from_provisioned_keys(init_data, default_kid, &self.keys)
        };
        let session =
            result.inspect_err(|e| error!("Failed to open session for kid {}: {}", default_kid, e))?;

        info!("Opened ClearKey session for kid {}", default_kid);
        Ok(self.sessions.entry(default_kid).or_insert(session))
    }

    /// Session opened for `default_kid`.
    pub fn get(&self, default_kid: &KeyId) -> Result<&Session> {
        self.sessions
            .get(default_kid)
            .ok_or_else(|| Error::InvalidSession(default_kid.to_hex()))
    }

    /// Any open session associated with `kid`.
    pub fn find_session(&self, kid: &KeyId) -> Option<&Session> {
        self.sessions.get(kid).or_else(|| {
            self.sessions
                .values()
                .find(|session| session.has_key_id(kid))
        })
    }

    /// Close the session opened for `default_kid`.
    pub fn close(&mut self, default_kid: &KeyId) -> Result<()> {
        if self.sessions.remove(default_kid).is_none() {
            return Err(Error::InvalidSession(default_kid.to_hex()));
        }
        debug!("Closed ClearKey session for kid {}", default_kid);
        Ok(())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io;

    use super::{ClearKeyCdm, CLEARKEY_SYSTEM_ID, CLEARKEY_URN};
    use crate::config::{ClearKeyConfig, ProvisionedKeys, SessionConfig};
    use crate::error::Error;
    use crate::kid::KeyId;
    use crate::transport::{HttpRequest, HttpResponse, LicenseTransport};
    use crate::utils::b64_encode;

    /// Answers every request with a license for the requested kid.
    struct EchoLicenseServer {
        calls: Cell<usize>,
    }

    impl EchoLicenseServer {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    impl LicenseTransport for EchoLicenseServer {
        fn open(&self, request: &HttpRequest) -> HttpResponse {
            self.calls.set(self.calls.get() + 1);
            let json: serde_json::Value = match serde_json::from_slice(&request.body) {
                Ok(json) => json,
                Err(_) => return HttpResponse::new(400, io::empty()),
            };
            let kid = json["kids"][0].as_str().unwrap_or_default().to_string();
            let body = serde_json::json!({
                "keys": [{"k": b64_encode([7u8; 16]), "kid": kid, "kty": "oct"}],
                "type": "temporary",
            });
            HttpResponse::new(200, io::Cursor::new(body.to_string().into_bytes()))
        }
    }

    fn server_cdm() -> ClearKeyCdm<EchoLicenseServer> {
        ClearKeyCdm::new(
            "https://example/license",
            ProvisionedKeys::new(),
            SessionConfig::default(),
            EchoLicenseServer::new(),
        )
    }

    #[test]
    fn system_id_matches_urn() {
        assert_eq!(format!("urn:uuid:{}", CLEARKEY_SYSTEM_ID), CLEARKEY_URN);
    }

    #[test]
    fn open_and_find_sessions() {
        let mut cdm = server_cdm();
        let first = KeyId::new([1; 16]);
        let second = KeyId::new([2; 16]);

        assert!(cdm.open(&[], first).expect("open").is_ready());
        assert!(cdm.open(&[], second).expect("open").is_ready());
        assert_eq!(cdm.session_count(), 2);

        assert!(cdm.find_session(&first).is_some_and(|s| s.has_key_id(&first)));
        assert!(cdm.find_session(&KeyId::new([3; 16])).is_none());
    }

    #[test]
    fn reopening_reuses_session() {
        let mut cdm = server_cdm();
        let kid = KeyId::new([1; 16]);
        cdm.open(&[], kid).expect("open");
        cdm.open(&[], kid).expect("reopen");
        assert_eq!(cdm.session_count(), 1);
        assert_eq!(cdm.transport.calls.get(), 1);
    }

    #[test]
    fn close_session() {
        let mut cdm = server_cdm();
        let kid = KeyId::new([1; 16]);
        cdm.open(&[], kid).expect("open");
        cdm.close(&kid).expect("close");
        assert!(matches!(cdm.close(&kid), Err(Error::InvalidSession(_))));
        assert!(matches!(cdm.get(&kid), Err(Error::InvalidSession(_))));
    }

    #[test]
    fn session_limit() {
        let mut cdm = server_cdm();
        for i in 0..ClearKeyCdm::<EchoLicenseServer>::MAX_NUM_OF_SESSIONS {
            cdm.open(&[], KeyId::new([i as u8; 16])).expect("open");
        }
        let err = cdm.open(&[], KeyId::new([0xff; 16])).unwrap_err();
        assert!(matches!(err, Error::TooManySessions { max: 16 }));
    }

    #[test]
    fn failed_construction_is_not_kept() {
        let kid = KeyId::new([1; 16]);
        let mut keys = ProvisionedKeys::new();
        keys.insert("ff".repeat(16), "00".repeat(16));
        let mut cdm = ClearKeyCdm::new("", keys, SessionConfig::default(), EchoLicenseServer::new());

        let err = cdm.open(&[], kid).unwrap_err();
        assert!(matches!(err, Error::MissingConfiguredKey(_)));
        assert_eq!(cdm.session_count(), 0);
        assert_eq!(cdm.transport.calls.get(), 0);
    }

    #[test]
    fn provisioned_from_config() {
        let config = ClearKeyConfig::from_json(
            r#"{"keys": {"01010101010101010101010101010101": "07070707070707070707070707070707"}}"#,
        )
        .expect("config");
        let mut cdm = ClearKeyCdm::from_config(config, EchoLicenseServer::new());

        let session = cdm.open(&[], KeyId::new([1; 16])).expect("open");
        assert!(session.is_ready());
        assert_eq!(cdm.transport.calls.get(), 0);
    }
}
